//! CoinGecko markets endpoint (bitcoin only).

use serde::Deserialize;

pub(super) const ENDPOINT: &str =
    "https://api.coingecko.com/api/v3/coins/markets?vs_currency=usd&ids=bitcoin";

#[derive(Debug, Deserialize)]
struct Market {
    current_price: f64,
}

pub(super) fn parse_last_price(body: &[u8]) -> Result<f64, String> {
    let markets: Vec<Market> = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    match markets.as_slice() {
        [market] => Ok(market.current_price),
        other => Err(format!("unexpected response array length: {}", other.len())),
    }
}
