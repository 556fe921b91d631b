//! Raw per-instrument fundamentals as fetched from the data provider

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A snapshot of one instrument's fundamentals. Every financial field is
/// optional since providers report them sparsely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub symbol: String,
    pub name: String,
    pub raw_price: f64,
    pub currency: String,
    pub dividend_rate: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_debt: Option<f64>,
    pub ebitda: Option<f64>,
    pub insider_ownership: Option<f64>,
    pub forward_pe: Option<f64>,
}

impl InstrumentRecord {
    pub fn new(symbol: &str, name: &str, raw_price: f64, currency: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            raw_price,
            currency: currency.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<InstrumentRecord>;
}
