//! Compound v2 subgraph client for borrower account discovery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Public Compound v2 subgraph endpoint.
pub const COMPOUND_V2_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/graphprotocol/compound-v2";

/// Accounts requested per scan when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1;

/// Borrower account snapshot as reported by the indexer.
///
/// Numeric fields are kept as the raw decimal strings from the response so
/// that a malformed value fails evaluation of this account only, rather than
/// the whole scan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Protocol-assigned identifier (the borrower address for Compound v2)
    pub id: String,

    /// Total borrowed value denominated in ETH
    #[serde(default)]
    pub total_borrow_value_in_eth: Option<String>,

    /// Health factor (collateral / borrow risk ratio)
    #[serde(default)]
    pub health: Option<String>,
}

/// Errors from a single subgraph scan.
#[derive(Debug, Error)]
pub enum SubgraphError {
    #[error("subgraph request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected http status code: {0}")]
    Status(u16),

    #[error("malformed subgraph response: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("subgraph query rejected: {0}")]
    Query(String),

    #[error("subgraph response has no data")]
    MissingData,

    #[error("subgraph request cancelled")]
    Cancelled,
}

/// Source of borrower accounts for one scan cycle.
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Fetch the current borrower accounts, ordered by id.
    async fn fetch_accounts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Account>, SubgraphError>;
}

/// Subgraph API client.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
    endpoint: String,
    page_size: usize,
}

impl SubgraphClient {
    /// Create a client for the public Compound v2 subgraph.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: COMPOUND_V2_SUBGRAPH.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use a custom subgraph endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set how many accounts a single scan requests.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// GraphQL request body for borrowers with an outstanding borrow.
    pub fn query_body(&self) -> serde_json::Value {
        let query = format!(
            "{{ accounts(first: {}, orderBy: id, where: {{hasBorrowed: true}}) {{ id totalBorrowValueInEth health }} }}",
            self.page_size
        );
        serde_json::json!({ "query": query, "variables": {} })
    }

    async fn post_query(&self) -> Result<Vec<Account>, SubgraphError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.query_body())
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SubgraphError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        parse_response(&body)
    }
}

#[async_trait]
impl AccountSource for SubgraphClient {
    #[instrument(skip(self, cancel), fields(endpoint = %self.endpoint, first = self.page_size))]
    async fn fetch_accounts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Account>, SubgraphError> {
        let accounts = cancel
            .run_until_cancelled(self.post_query())
            .await
            .ok_or(SubgraphError::Cancelled)??;

        // Only one page is ever requested; a full page means borrowers past it went unseen.
        if accounts.len() >= self.page_size {
            warn!(
                returned = accounts.len(),
                page_size = self.page_size,
                "Subgraph page is full, accounts beyond the first page are not scanned"
            );
        }

        debug!(count = accounts.len(), "Fetched subgraph accounts");
        Ok(accounts)
    }
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

fn parse_response(body: &[u8]) -> Result<Vec<Account>, SubgraphError> {
    let response: GraphResponse = serde_json::from_slice(body)?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(SubgraphError::Query(messages.join("; ")));
    }

    response
        .data
        .map(|data| data.accounts)
        .ok_or(SubgraphError::MissingData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve_once, LogCapture};

    #[test]
    fn test_parse_accounts() {
        let json = r#"{
            "data": {
                "accounts": [
                    { "id": "0xabc", "totalBorrowValueInEth": "2.5", "health": "0.8" },
                    { "id": "0xdef", "totalBorrowValueInEth": "0", "health": "1.2" }
                ]
            }
        }"#;

        let accounts = parse_response(json.as_bytes()).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "0xabc");
        assert_eq!(accounts[0].total_borrow_value_in_eth.as_deref(), Some("2.5"));
        assert_eq!(accounts[1].health.as_deref(), Some("1.2"));
    }

    #[test]
    fn test_null_health_is_kept_per_account() {
        let json = r#"{"data":{"accounts":[{"id":"0x1","totalBorrowValueInEth":"1.0","health":null}]}}"#;

        let accounts = parse_response(json.as_bytes()).unwrap();
        assert_eq!(accounts[0].health, None);
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let json = r#"{"data":{"accounts":{"id":"0x1"}}}"#;
        assert!(matches!(
            parse_response(json.as_bytes()),
            Err(SubgraphError::Shape(_))
        ));

        assert!(matches!(
            parse_response(b"<html>bad gateway</html>"),
            Err(SubgraphError::Shape(_))
        ));
    }

    #[test]
    fn test_graphql_errors_are_reported() {
        let json = r#"{"errors":[{"message":"indexer unavailable"}]}"#;
        match parse_response(json.as_bytes()) {
            Err(SubgraphError::Query(msg)) => assert!(msg.contains("indexer unavailable")),
            other => panic!("expected query error, got {other:?}"),
        }

        assert!(matches!(
            parse_response(br#"{"data":null}"#),
            Err(SubgraphError::MissingData)
        ));
    }

    #[test]
    fn test_query_body() {
        let client = SubgraphClient::new(reqwest::Client::new()).with_page_size(25);
        let body = client.query_body();
        let query = body["query"].as_str().unwrap();

        assert!(query.contains("first: 25"));
        assert!(query.contains("orderBy: id"));
        assert!(query.contains("hasBorrowed: true"));
        assert!(query.contains("totalBorrowValueInEth"));
        assert!(body["variables"].is_object());
    }

    #[test]
    fn test_page_size_floor() {
        let client = SubgraphClient::new(reqwest::Client::new()).with_page_size(0);
        assert_eq!(client.page_size(), 1);
        assert_eq!(client.endpoint(), COMPOUND_V2_SUBGRAPH);
    }

    #[tokio::test]
    async fn test_non_success_status_fails_scan() {
        let url = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = SubgraphClient::new(reqwest::Client::new()).with_endpoint(url);

        let result = client.fetch_accounts(&CancellationToken::new()).await;
        assert!(matches!(result, Err(SubgraphError::Status(500))));
    }

    #[tokio::test]
    async fn test_accepted_status_fails_scan() {
        let url = serve_once(
            "202 Accepted",
            r#"{"data":{"accounts":[{"id":"0xabc","totalBorrowValueInEth":"2.5","health":"0.8"}]}}"#,
        )
        .await;
        let client = SubgraphClient::new(reqwest::Client::new()).with_endpoint(url);

        let result = client.fetch_accounts(&CancellationToken::new()).await;
        assert!(matches!(result, Err(SubgraphError::Status(202))));
    }

    #[tokio::test]
    async fn test_full_page_is_warned() {
        let logs = LogCapture::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let url = serve_once(
            "200 OK",
            r#"{"data":{"accounts":[{"id":"0xabc","totalBorrowValueInEth":"2.5","health":"0.8"}]}}"#,
        )
        .await;
        let client = SubgraphClient::new(reqwest::Client::new()).with_endpoint(url);

        let accounts = client.fetch_accounts(&CancellationToken::new()).await.unwrap();
        assert_eq!(accounts.len(), client.page_size());

        let output = logs.contents();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("Subgraph page is full"), "{output}");
    }

    #[tokio::test]
    async fn test_partial_page_is_not_warned() {
        let logs = LogCapture::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let url = serve_once(
            "200 OK",
            r#"{"data":{"accounts":[{"id":"0xabc","totalBorrowValueInEth":"2.5","health":"0.8"}]}}"#,
        )
        .await;
        let client = SubgraphClient::new(reqwest::Client::new())
            .with_endpoint(url)
            .with_page_size(2);

        let accounts = client.fetch_accounts(&CancellationToken::new()).await.unwrap();
        assert_eq!(accounts.len(), 1);

        let output = logs.contents();
        assert!(!output.contains("Subgraph page is full"), "{output}");
        assert!(output.contains("Fetched subgraph accounts"), "{output}");
    }

    #[tokio::test]
    async fn test_fetch_accounts_over_http() {
        let url = serve_once(
            "200 OK",
            r#"{"data":{"accounts":[{"id":"0xabc","totalBorrowValueInEth":"2.5","health":"0.8"}]}}"#,
        )
        .await;
        let client = SubgraphClient::new(reqwest::Client::new())
            .with_endpoint(url)
            .with_page_size(10);

        let accounts = client.fetch_accounts(&CancellationToken::new()).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, "0xabc");
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = SubgraphClient::new(reqwest::Client::new()).with_endpoint("http://127.0.0.1:9");
        let result = client.fetch_accounts(&cancel).await;
        assert!(matches!(result, Err(SubgraphError::Cancelled)));
    }
}
