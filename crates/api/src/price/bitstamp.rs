//! Bitstamp BTC/USD ticker.

use serde::Deserialize;

pub(super) const ENDPOINT: &str = "https://www.bitstamp.net/api/v2/ticker/btcusd/";

#[derive(Debug, Deserialize)]
struct TickerResponse {
    last: String,
}

pub(super) fn parse_last_price(body: &[u8]) -> Result<f64, String> {
    let ticker: TickerResponse = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    super::parse_decimal("last", &ticker.last)
}
