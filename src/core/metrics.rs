//! Derives the normalized quality metrics for a single instrument.
//!
//! Unknown inputs stay unknown (`None`) in the [`MetricsRow`]. The documented
//! fallback for each column is applied by [`Metric::value`], which is what
//! scoring, filtering and sorting read.

use crate::core::currency::{SpotRate, normalize_price};
use crate::core::instrument::InstrumentRecord;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Debt/EBITDA reported when EBITDA is zero or negative, and the fallback
/// when it is unknown.
pub const DEBT_EBITDA_SENTINEL: f64 = 99.0;

/// P/E fallback when the forward estimate is unknown.
pub const PE_FALLBACK: f64 = 99.0;

/// Return on assets is scaled by this factor as a stand-in for ROIC.
pub const ROIC_PROXY_SCALE: f64 = 200.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub symbol: String,
    pub name: String,
    /// Price in the reference currency.
    pub price: f64,
    pub yield_pct: Option<f64>,
    pub roic_pct: Option<f64>,
    pub op_margin_pct: Option<f64>,
    pub fcf_yield_pct: Option<f64>,
    pub debt_to_ebitda: Option<f64>,
    pub insider_pct: Option<f64>,
    pub pe: Option<f64>,
    pub score: Option<u32>,
}

/// Derives a metrics row from a raw record.
///
/// Fails only when the price cannot be normalized; callers treat that as a
/// skipped instrument.
pub fn extract(record: &InstrumentRecord, spot: &SpotRate) -> Result<MetricsRow> {
    if !record.raw_price.is_finite() {
        return Err(anyhow!("price is not a number"));
    }
    let price = normalize_price(record.raw_price, &record.currency, spot)?;

    let yield_pct = record.dividend_rate.map(|rate| {
        if price.local > 0.0 {
            rate / price.local * 100.0
        } else {
            0.0
        }
    });

    let fcf_yield_pct = match (record.free_cash_flow, record.market_cap) {
        (Some(fcf), Some(cap)) if cap > 0.0 => Some(fcf / cap * 100.0),
        (Some(_), Some(_)) => Some(0.0),
        _ => None,
    };

    let debt_to_ebitda = record.ebitda.map(|ebitda| {
        if ebitda > 0.0 {
            record.total_debt.unwrap_or(0.0) / ebitda
        } else {
            DEBT_EBITDA_SENTINEL
        }
    });

    Ok(MetricsRow {
        symbol: record.symbol.clone(),
        name: record.name.clone(),
        price: price.reference,
        yield_pct,
        roic_pct: record.return_on_assets.map(|roa| roa * ROIC_PROXY_SCALE),
        op_margin_pct: record.operating_margin.map(|m| m * 100.0),
        fcf_yield_pct,
        debt_to_ebitda,
        insider_pct: record.insider_ownership.map(|f| f * 100.0),
        pe: record.forward_pe,
        score: None,
    })
}

/// A numeric column of the scan table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Price,
    Yield,
    Roic,
    Margin,
    FcfYield,
    DebtEbitda,
    Insider,
    Pe,
    Score,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Price,
        Metric::Yield,
        Metric::Roic,
        Metric::Margin,
        Metric::FcfYield,
        Metric::DebtEbitda,
        Metric::Insider,
        Metric::Pe,
        Metric::Score,
    ];

    /// Value substituted when the row does not know this metric.
    pub fn fallback(&self) -> f64 {
        match self {
            Metric::DebtEbitda => DEBT_EBITDA_SENTINEL,
            Metric::Pe => PE_FALLBACK,
            _ => 0.0,
        }
    }

    /// The value as recorded, `None` when unknown.
    pub fn raw(&self, row: &MetricsRow) -> Option<f64> {
        match self {
            Metric::Price => Some(row.price),
            Metric::Yield => row.yield_pct,
            Metric::Roic => row.roic_pct,
            Metric::Margin => row.op_margin_pct,
            Metric::FcfYield => row.fcf_yield_pct,
            Metric::DebtEbitda => row.debt_to_ebitda,
            Metric::Insider => row.insider_pct,
            Metric::Pe => row.pe,
            Metric::Score => row.score.map(f64::from),
        }
    }

    /// The value with the fallback applied.
    pub fn value(&self, row: &MetricsRow) -> f64 {
        self.raw(row).unwrap_or_else(|| self.fallback())
    }

    /// Column label used in tables and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Price => "Price",
            Metric::Yield => "Yield %",
            Metric::Roic => "ROIC %",
            Metric::Margin => "Op. Margin %",
            Metric::FcfYield => "FCF Yield %",
            Metric::DebtEbitda => "Debt/EBITDA",
            Metric::Insider => "Insider %",
            Metric::Pe => "P/E",
            Metric::Score => "Score",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Metric::Price => "price",
            Metric::Yield => "yield",
            Metric::Roic => "roic",
            Metric::Margin => "margin",
            Metric::FcfYield => "fcf_yield",
            Metric::DebtEbitda => "debt_ebitda",
            Metric::Insider => "insider",
            Metric::Pe => "pe",
            Metric::Score => "score",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '/'], "_");
        Metric::ALL
            .into_iter()
            .find(|m| m.key() == normalized)
            .ok_or_else(|| anyhow!("Unknown metric: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> SpotRate {
        SpotRate::new("GBP", Some(1.27))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_extract_full_record() {
        let record = InstrumentRecord {
            dividend_rate: Some(2.0),
            operating_margin: Some(0.25),
            return_on_assets: Some(0.1),
            free_cash_flow: Some(5.0e9),
            market_cap: Some(100.0e9),
            total_debt: Some(100.0),
            ebitda: Some(50.0),
            insider_ownership: Some(0.06),
            forward_pe: Some(12.0),
            ..InstrumentRecord::new("KO", "Coca-Cola", 50.0, "USD")
        };

        let row = extract(&record, &usd()).unwrap();
        assert_eq!(row.symbol, "KO");
        assert_eq!(row.name, "Coca-Cola");
        assert!(close(row.price, 50.0));
        assert!(close(row.yield_pct.unwrap(), 4.0));
        assert!(close(row.roic_pct.unwrap(), 20.0));
        assert!(close(row.op_margin_pct.unwrap(), 25.0));
        assert!(close(row.fcf_yield_pct.unwrap(), 5.0));
        assert!(close(row.debt_to_ebitda.unwrap(), 2.0));
        assert!(close(row.insider_pct.unwrap(), 6.0));
        assert_eq!(row.pe, Some(12.0));
        assert_eq!(row.score, None);
    }

    #[test]
    fn test_debt_ebitda_sentinel_for_non_positive_ebitda() {
        for ebitda in [0.0, -10.0] {
            let record = InstrumentRecord {
                total_debt: Some(100.0),
                ebitda: Some(ebitda),
                ..InstrumentRecord::new("X", "X", 10.0, "USD")
            };
            let row = extract(&record, &usd()).unwrap();
            assert_eq!(row.debt_to_ebitda, Some(DEBT_EBITDA_SENTINEL));
        }
    }

    #[test]
    fn test_missing_debt_with_positive_ebitda_is_debt_free() {
        let record = InstrumentRecord {
            ebitda: Some(10.0),
            ..InstrumentRecord::new("X", "X", 10.0, "USD")
        };
        let row = extract(&record, &usd()).unwrap();
        assert_eq!(row.debt_to_ebitda, Some(0.0));
    }

    #[test]
    fn test_yield_is_zero_for_non_positive_price() {
        let record = InstrumentRecord {
            dividend_rate: Some(1.0),
            ..InstrumentRecord::new("X", "X", 0.0, "USD")
        };
        let row = extract(&record, &usd()).unwrap();
        assert_eq!(row.yield_pct, Some(0.0));
        assert_eq!(Metric::Yield.value(&row), 0.0);
    }

    #[test]
    fn test_fcf_yield_is_zero_for_non_positive_market_cap() {
        let record = InstrumentRecord {
            free_cash_flow: Some(1.0e6),
            market_cap: Some(0.0),
            ..InstrumentRecord::new("X", "X", 10.0, "USD")
        };
        let row = extract(&record, &usd()).unwrap();
        assert_eq!(row.fcf_yield_pct, Some(0.0));
    }

    #[test]
    fn test_yield_uses_major_unit_price() {
        let record = InstrumentRecord {
            dividend_rate: Some(4.95),
            ..InstrumentRecord::new("ULVR.L", "Unilever", 9900.0, "GBp")
        };
        let row = extract(&record, &usd()).unwrap();
        assert!(close(row.yield_pct.unwrap(), 5.0));
        assert!(close(row.price, 125.73));
    }

    #[test]
    fn test_sparse_record_falls_back_per_metric() {
        let record = InstrumentRecord::new("NEW", "Newco", 10.0, "USD");
        let row = extract(&record, &usd()).unwrap();

        assert_eq!(row.yield_pct, None);
        assert_eq!(row.debt_to_ebitda, None);
        assert_eq!(row.pe, None);

        assert_eq!(Metric::Yield.value(&row), 0.0);
        assert_eq!(Metric::Roic.value(&row), 0.0);
        assert_eq!(Metric::Margin.value(&row), 0.0);
        assert_eq!(Metric::FcfYield.value(&row), 0.0);
        assert_eq!(Metric::DebtEbitda.value(&row), DEBT_EBITDA_SENTINEL);
        assert_eq!(Metric::Insider.value(&row), 0.0);
        assert_eq!(Metric::Pe.value(&row), PE_FALLBACK);
        assert_eq!(Metric::Score.value(&row), 0.0);
        for metric in Metric::ALL {
            assert!(metric.value(&row).is_finite(), "{metric} is not numeric");
        }
    }

    #[test]
    fn test_foreign_quote_without_rate_is_an_error() {
        let record = InstrumentRecord::new("ULVR.L", "Unilever", 9900.0, "GBp");
        let result = extract(&record, &SpotRate::new("GBP", None));
        assert!(result.is_err());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("yield".parse::<Metric>().unwrap(), Metric::Yield);
        assert_eq!("Debt/EBITDA".parse::<Metric>().unwrap(), Metric::DebtEbitda);
        assert_eq!("fcf-yield".parse::<Metric>().unwrap(), Metric::FcfYield);
        assert_eq!(" PE ".parse::<Metric>().unwrap(), Metric::Pe);
        assert!("beta".parse::<Metric>().is_err());
    }
}
