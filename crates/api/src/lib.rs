//! liqbot API clients for external HTTP services.
//!
//! This crate provides HTTP clients for:
//! - Compound subgraph: borrower account discovery with risk metrics
//! - Spot price providers: Bitstamp, Coinbase, Blockchain.com, CoinGecko, CoinDesk

pub mod price;
mod subgraph;

pub use price::{Exchange, HttpPriceSource, PriceError, PriceSource, PriceSourceRegistry, Quote};
pub use subgraph::{
    Account, AccountSource, SubgraphClient, SubgraphError, COMPOUND_V2_SUBGRAPH, DEFAULT_PAGE_SIZE,
};
