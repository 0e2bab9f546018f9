//! Spot price sources.
//!
//! Every provider implements [`PriceSource`]: one request, one numeric quote or
//! a typed failure naming the provider. The [`PriceSourceRegistry`] holds the
//! providers built at startup and calls each independently; merging quotes
//! from several providers is left to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use liqbot_api::PriceSourceRegistry;
//!
//! let registry = PriceSourceRegistry::with_defaults(reqwest::Client::new());
//! for result in registry.quote_all(&cancel).await {
//!     match result {
//!         Ok(quote) => info!(provider = %quote.provider, price = quote.price, "Quote"),
//!         Err(e) => warn!(provider = e.provider(), error = %e, "Quote failed"),
//!     }
//! }
//! ```

mod bitstamp;
mod blockchain;
mod coinbase;
mod coindesk;
mod coingecko;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// A single price observation from one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Provider name
    pub provider: String,
    /// Last traded price, always finite and strictly positive
    pub price: f64,
}

impl Quote {
    /// Build a quote, rejecting zero, negative and non-finite prices.
    pub fn new(provider: impl Into<String>, price: f64) -> Result<Self, PriceError> {
        let provider = provider.into();
        if !price.is_finite() || price <= 0.0 {
            return Err(PriceError::NonPositive { provider, price });
        }
        Ok(Self { provider, price })
    }
}

/// Quote failure, always attributed to the provider that produced it.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("{provider}: request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: unexpected http status code: {status}")]
    Status { provider: String, status: u16 },

    #[error("{provider}: malformed response: {reason}")]
    Malformed { provider: String, reason: String },

    #[error("{provider}: currency rate is not positive: {price}")]
    NonPositive { provider: String, price: f64 },

    #[error("{provider}: request cancelled")]
    Cancelled { provider: String },
}

impl PriceError {
    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            PriceError::Transport { provider, .. }
            | PriceError::Status { provider, .. }
            | PriceError::Malformed { provider, .. }
            | PriceError::NonPositive { provider, .. }
            | PriceError::Cancelled { provider } => provider,
        }
    }
}

/// Capability shared by all spot price providers.
///
/// A call makes exactly one attempt. Retry policy, if any, belongs to the caller.
#[async_trait]
pub trait PriceSource: Send + Sync + Debug {
    /// Provider name used in quotes and errors.
    fn name(&self) -> &str;

    /// Fetch the current spot price.
    async fn quote(&self, cancel: &CancellationToken) -> Result<Quote, PriceError>;
}

/// The closed set of supported spot price providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Bitstamp,
    Coinbase,
    Blockchain,
    CoinGecko,
    CoinDesk,
}

impl Exchange {
    /// All providers, in default registration order.
    pub const ALL: [Exchange; 5] = [
        Exchange::Bitstamp,
        Exchange::Coinbase,
        Exchange::Blockchain,
        Exchange::CoinGecko,
        Exchange::CoinDesk,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Bitstamp => "Bitstamp",
            Exchange::Coinbase => "Coinbase",
            Exchange::Blockchain => "Blockchain.com",
            Exchange::CoinGecko => "CoinGecko",
            Exchange::CoinDesk => "CoinDesk",
        }
    }

    /// Default ticker endpoint for this provider.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Exchange::Bitstamp => bitstamp::ENDPOINT,
            Exchange::Coinbase => coinbase::ENDPOINT,
            Exchange::Blockchain => blockchain::ENDPOINT,
            Exchange::CoinGecko => coingecko::ENDPOINT,
            Exchange::CoinDesk => coindesk::ENDPOINT,
        }
    }

    /// Extract the last price from a provider response body.
    ///
    /// Sign is not checked here; [`Quote::new`] rejects non-positive values.
    pub fn parse_last_price(&self, body: &[u8]) -> Result<f64, String> {
        match self {
            Exchange::Bitstamp => bitstamp::parse_last_price(body),
            Exchange::Coinbase => coinbase::parse_last_price(body),
            Exchange::Blockchain => blockchain::parse_last_price(body),
            Exchange::CoinGecko => coingecko::parse_last_price(body),
            Exchange::CoinDesk => coindesk::parse_last_price(body),
        }
    }
}

/// Parse a decimal price delivered as a JSON string.
fn parse_decimal(field: &str, raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| format!("{field} {raw:?}: {e}"))
}

/// HTTP price source for one [`Exchange`].
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    exchange: Exchange,
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPriceSource {
    /// Create a source using the exchange's default endpoint.
    pub fn new(exchange: Exchange, client: reqwest::Client) -> Self {
        Self {
            exchange,
            client,
            endpoint: exchange.endpoint().to_string(),
        }
    }

    /// Use a custom endpoint (mirrors, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    async fn fetch_body(&self) -> Result<Vec<u8>, PriceError> {
        let provider = self.exchange.name();
        let transport = |source| PriceError::Transport {
            provider: provider.to_string(),
            source,
        };

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(PriceError::Status {
                provider: provider.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    fn name(&self) -> &str {
        self.exchange.name()
    }

    #[instrument(skip(self, cancel), fields(provider = self.exchange.name()))]
    async fn quote(&self, cancel: &CancellationToken) -> Result<Quote, PriceError> {
        let body = cancel
            .run_until_cancelled(self.fetch_body())
            .await
            .ok_or_else(|| PriceError::Cancelled {
                provider: self.name().to_string(),
            })??;

        let price = self
            .exchange
            .parse_last_price(&body)
            .map_err(|reason| PriceError::Malformed {
                provider: self.name().to_string(),
                reason,
            })?;

        let quote = Quote::new(self.name(), price)?;
        debug!(price = quote.price, "Fetched spot price");
        Ok(quote)
    }
}

/// Ordered collection of price sources built at startup.
///
/// Order is registration order only; it does not rank providers.
#[derive(Debug, Default, Clone)]
pub struct PriceSourceRegistry {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl PriceSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every supported exchange sharing one HTTP client.
    pub fn with_defaults(client: reqwest::Client) -> Self {
        let mut registry = Self::new();
        for exchange in Exchange::ALL {
            registry.register(Arc::new(HttpPriceSource::new(exchange, client.clone())));
        }
        registry
    }

    pub fn register(&mut self, source: Arc<dyn PriceSource>) {
        debug!(provider = source.name(), "Registering price source");
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn sources(&self) -> &[Arc<dyn PriceSource>] {
        &self.sources
    }

    /// Query every source once. Results come back in registration order,
    /// one per source, unmerged.
    pub async fn quote_all(&self, cancel: &CancellationToken) -> Vec<Result<Quote, PriceError>> {
        futures::future::join_all(self.sources.iter().map(|source| source.quote(cancel))).await
    }
}
