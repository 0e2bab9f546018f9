//! Blockchain.com ticker.

use serde::Deserialize;

pub(super) const ENDPOINT: &str = "https://www.blockchain.com/ticker";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(rename = "USD")]
    usd: UsdTicker,
}

#[derive(Debug, Deserialize)]
struct UsdTicker {
    last: f64,
}

pub(super) fn parse_last_price(body: &[u8]) -> Result<f64, String> {
    let ticker: TickerResponse = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    Ok(ticker.usd.last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticker() {
        let json = r#"{
            "USD": {"15m": 64300.1, "last": 64300.1, "buy": 64300.1, "sell": 64300.1, "symbol": "$"},
            "EUR": {"15m": 59000.0, "last": 59000.0, "buy": 59000.0, "sell": 59000.0, "symbol": "€"}
        }"#;
        let price = parse_last_price(json.as_bytes()).unwrap();
        assert!((price - 64300.1).abs() < 1e-9);
    }

    #[test]
    fn test_parse_missing_usd() {
        assert!(parse_last_price(br#"{"EUR": {"last": 1.0}}"#).is_err());
    }
}
