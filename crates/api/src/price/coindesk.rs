//! CoinDesk bitcoin price index.

use serde::Deserialize;

pub(super) const ENDPOINT: &str = "https://api.coindesk.com/v1/bpi/currentprice/USD.json";

#[derive(Debug, Deserialize)]
struct CurrentPriceResponse {
    bpi: Bpi,
}

#[derive(Debug, Deserialize)]
struct Bpi {
    #[serde(rename = "USD")]
    usd: BpiRate,
}

#[derive(Debug, Deserialize)]
struct BpiRate {
    rate_float: f64,
}

pub(super) fn parse_last_price(body: &[u8]) -> Result<f64, String> {
    let response: CurrentPriceResponse =
        serde_json::from_slice(body).map_err(|e| e.to_string())?;
    Ok(response.bpi.usd.rate_float)
}
