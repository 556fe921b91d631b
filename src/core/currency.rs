//! Currency conversion abstractions and price normalization

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    /// Units of `to` per one unit of `from`.
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}

/// Quote currencies that are the minor unit of another currency.
const MINOR_UNITS: &[(&str, &str)] = &[("GBp", "GBP"), ("GBX", "GBP")];

/// Factor between a minor unit and its major unit.
pub const MINOR_UNIT_DIVISOR: f64 = 100.0;

/// Returns the major currency of `code` when it is a minor-unit code.
pub fn major_unit_of(code: &str) -> Option<&'static str> {
    MINOR_UNITS
        .iter()
        .find(|(minor, _)| *minor == code)
        .map(|(_, major)| *major)
}

/// Currency to convert quotes from, with the spot rate into the reference
/// currency when one is known.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRate {
    pub foreign: String,
    pub rate: Option<f64>,
}

impl SpotRate {
    pub fn new(foreign: &str, rate: Option<f64>) -> Self {
        Self {
            foreign: foreign.to_string(),
            rate,
        }
    }

    /// The symbol the rate is quoted under, e.g. `GBPUSD=X`.
    pub fn pair_symbol(foreign: &str, reference: &str) -> String {
        format!("{foreign}{reference}=X")
    }
}

/// A price expressed in its major unit and in the reference currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPrice {
    /// Price in the major unit of the quote currency (pence become pounds).
    pub local: f64,
    /// Price in the reference currency.
    pub reference: f64,
}

/// Converts `raw_price` quoted in `currency` into the reference currency.
///
/// Minor units are divided down to their major unit first. A major unit equal
/// to the spot rate's foreign currency is multiplied by the rate; any other
/// currency is assumed to already be in the reference currency and passes
/// through. Fails only when a conversion is needed but no rate is known.
pub fn normalize_price(raw_price: f64, currency: &str, spot: &SpotRate) -> Result<NormalizedPrice> {
    let (local, major) = match major_unit_of(currency) {
        Some(major) => (raw_price / MINOR_UNIT_DIVISOR, major),
        None => (raw_price, currency),
    };

    if major != spot.foreign {
        return Ok(NormalizedPrice {
            local,
            reference: local,
        });
    }

    let rate = spot
        .rate
        .ok_or_else(|| anyhow::anyhow!("exchange rate unavailable for {}", spot.foreign))?;
    Ok(NormalizedPrice {
        local,
        reference: local * rate,
    })
}
