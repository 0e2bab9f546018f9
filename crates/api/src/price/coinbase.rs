//! Coinbase spot price.

use serde::Deserialize;

pub(super) const ENDPOINT: &str = "https://api.coinbase.com/v2/prices/spot?currency=USD";

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: String,
}

pub(super) fn parse_last_price(body: &[u8]) -> Result<f64, String> {
    let spot: SpotResponse = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    super::parse_decimal("data.amount", &spot.data.amount)
}
