//! Sequential scan over the ticker universe.
//!
//! Cached queries go through [`ScanCaches`] explicitly: the spot rate and
//! each instrument's fundamentals here, index membership lists in
//! [`crate::core::universe::resolve_universe`].
//! Per-instrument failures never abort a scan; they are collected in the
//! [`ScanReport`] alongside the extracted rows.

use crate::core::cache::Cache;
use crate::core::currency::{CurrencyRateProvider, SpotRate};
use crate::core::instrument::{FundamentalsProvider, InstrumentRecord};
use crate::core::metrics::{MetricsRow, extract};
use crate::store::memory::MemoryCache;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The cache collections a scan reads and refreshes.
#[derive(Clone)]
pub struct ScanCaches {
    pub rates: Arc<dyn Cache<String, f64>>,
    pub fundamentals: Arc<dyn Cache<String, InstrumentRecord>>,
    pub universe: Arc<dyn Cache<String, Vec<String>>>,
    pub ttl: Option<Duration>,
}

impl ScanCaches {
    pub fn in_memory(ttl: Option<Duration>) -> Self {
        Self {
            rates: Arc::new(MemoryCache::<String, f64>::new()),
            fundamentals: Arc::new(MemoryCache::<String, InstrumentRecord>::new()),
            universe: Arc::new(MemoryCache::<String, Vec<String>>::new()),
            ttl,
        }
    }

    pub async fn clear(&self) {
        self.rates.clear().await;
        self.fundamentals.clear().await;
        self.universe.clear().await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub symbol: String,
    pub reason: String,
}

/// What happened to one instrument of the scan.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    Extracted(MetricsRow),
    Skipped(SkippedInstrument),
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Extracted rows in scan order.
    pub rows: Vec<MetricsRow>,
    pub skipped: Vec<SkippedInstrument>,
    pub spot: SpotRate,
}

impl ScanReport {
    pub fn scanned(&self) -> usize {
        self.rows.len() + self.skipped.len()
    }

    /// True when not a single instrument produced data.
    pub fn has_no_data(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct Scanner<'a> {
    fundamentals: &'a dyn FundamentalsProvider,
    rates: &'a dyn CurrencyRateProvider,
    caches: &'a ScanCaches,
    reference_currency: String,
    foreign_currency: String,
}

impl<'a> Scanner<'a> {
    pub fn new(
        fundamentals: &'a dyn FundamentalsProvider,
        rates: &'a dyn CurrencyRateProvider,
        caches: &'a ScanCaches,
        reference_currency: &str,
        foreign_currency: &str,
    ) -> Self {
        Self {
            fundamentals,
            rates,
            caches,
            reference_currency: reference_currency.to_string(),
            foreign_currency: foreign_currency.to_string(),
        }
    }

    /// Fetches the foreign→reference rate once, cache first. A failed fetch
    /// yields a spot without a rate.
    pub async fn spot_rate(&self) -> SpotRate {
        if self.foreign_currency == self.reference_currency {
            return SpotRate::new(&self.foreign_currency, Some(1.0));
        }

        let key = SpotRate::pair_symbol(&self.foreign_currency, &self.reference_currency);
        if let Some(rate) = self.caches.rates.get(&key).await {
            return SpotRate::new(&self.foreign_currency, Some(rate));
        }

        match self
            .rates
            .get_rate(&self.foreign_currency, &self.reference_currency)
            .await
        {
            Ok(rate) => {
                info!(pair = %key, rate, "Fetched spot rate");
                self.caches.rates.put(key, rate, self.caches.ttl).await;
                SpotRate::new(&self.foreign_currency, Some(rate))
            }
            Err(e) => {
                warn!(pair = %key, error = %e, "Spot rate unavailable");
                SpotRate::new(&self.foreign_currency, None)
            }
        }
    }

    async fn fetch_record(&self, symbol: &str) -> Result<InstrumentRecord> {
        let key = symbol.to_string();
        if let Some(record) = self.caches.fundamentals.get(&key).await {
            return Ok(record);
        }
        let record = self.fundamentals.fetch_fundamentals(symbol).await?;
        self.caches
            .fundamentals
            .put(key, record.clone(), self.caches.ttl)
            .await;
        Ok(record)
    }

    pub async fn scan_symbol(&self, symbol: &str, spot: &SpotRate) -> InstrumentOutcome {
        let outcome = self
            .fetch_record(symbol)
            .await
            .and_then(|record| extract(&record, spot));

        match outcome {
            Ok(row) => InstrumentOutcome::Extracted(row),
            Err(e) => {
                warn!(symbol = %symbol, reason = %e, "Skipping instrument");
                InstrumentOutcome::Skipped(SkippedInstrument {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Scans `symbols` one after another. `on_progress` is called with each
    /// symbol once it has been processed.
    pub async fn scan(&self, symbols: &[String], on_progress: &(dyn Fn(&str))) -> ScanReport {
        let spot = self.spot_rate().await;
        let mut rows = Vec::new();
        let mut skipped = Vec::new();

        for symbol in symbols {
            match self.scan_symbol(symbol, &spot).await {
                InstrumentOutcome::Extracted(row) => rows.push(row),
                InstrumentOutcome::Skipped(s) => skipped.push(s),
            }
            on_progress(symbol);
        }

        info!(
            extracted = rows.len(),
            skipped = skipped.len(),
            "Scan complete"
        );
        ScanReport {
            rows,
            skipped,
            spot,
        }
    }
}
