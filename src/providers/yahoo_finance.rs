use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{StatusCode, Url, header};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::core::currency::CurrencyRateProvider;
use crate::core::instrument::{FundamentalsProvider, InstrumentRecord};

// quoteSummary and getcrumb turn away non-browser user agents
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const SUMMARY_MODULES: &str = "price,summaryDetail,financialData,defaultKeyStatistics";

fn build_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Session cookie and the crumb Yahoo issued for it.
#[derive(Debug, Clone)]
struct Crumb {
    cookie: String,
    value: String,
}

/// Fundamentals from Yahoo's quoteSummary endpoint.
///
/// quoteSummary requires a crumb: a session cookie is obtained from
/// `cookie_url`, exchanged for a crumb at `/v1/test/getcrumb`, and both are
/// sent with every request. The crumb is kept until Yahoo rejects it.
pub struct YahooFundamentalsProvider {
    base_url: String,
    cookie_url: String,
    reference_currency: String,
    crumb: RwLock<Option<Crumb>>,
}

impl YahooFundamentalsProvider {
    /// `reference_currency` is assumed for quotes that report no currency.
    pub fn new(base_url: &str, cookie_url: &str, reference_currency: &str) -> Self {
        YahooFundamentalsProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.to_string(),
            reference_currency: reference_currency.to_string(),
            crumb: RwLock::new(None),
        }
    }

    async fn ensure_crumb(&self, client: &reqwest::Client) -> Result<Crumb> {
        let cached = self.crumb.read().await.clone();
        if let Some(crumb) = cached {
            return Ok(crumb);
        }

        let crumb = self.fetch_crumb(client).await?;
        *self.crumb.write().await = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self, client: &reqwest::Client) -> Result<Crumb> {
        debug!("Requesting Yahoo session cookie from {}", self.cookie_url);
        // The cookie endpoint answers 404 but still sets the cookie
        let response = client
            .get(&self.cookie_url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to get Yahoo cookie: {}", e))?;
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.split_once(';').map_or(s, |(value, _)| value).to_string())
            .ok_or_else(|| anyhow!("Failed to parse Yahoo cookie"))?;

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let response = client
            .get(&url)
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to get Yahoo crumb: {}", e))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} while getting Yahoo crumb",
                response.status()
            ));
        }
        let value = response
            .text()
            .await
            .context("Failed to read Yahoo crumb")?
            .trim()
            .to_string();
        if value.is_empty() {
            return Err(anyhow!("Yahoo returned an empty crumb"));
        }

        debug!("Obtained Yahoo crumb");
        Ok(Crumb { cookie, value })
    }

    async fn clear_crumb(&self) {
        *self.crumb.write().await = None;
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<QuoteSummaryError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryError {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetailModule>,
    financial_data: Option<FinancialDataModule>,
    default_key_statistics: Option<KeyStatisticsModule>,
}

/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`, or `{}` when absent.
#[derive(Debug, Deserialize, Default, Clone, Copy)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.and_then(|v| v.raw).filter(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    currency: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    currency: Option<String>,
    dividend_rate: Option<RawValue>,
    market_cap: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialDataModule {
    current_price: Option<RawValue>,
    operating_margins: Option<RawValue>,
    return_on_assets: Option<RawValue>,
    free_cashflow: Option<RawValue>,
    total_debt: Option<RawValue>,
    ebitda: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatisticsModule {
    held_percent_insiders: Option<RawValue>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawValue>,
}

impl YahooFundamentalsProvider {
    fn map_result(&self, symbol: &str, result: QuoteSummaryResult) -> Result<InstrumentRecord> {
        let price = result.price.as_ref();
        let detail = result.summary_detail.as_ref();
        let financial = result.financial_data.as_ref();
        let stats = result.default_key_statistics.as_ref();

        let raw_price = financial
            .and_then(|f| raw(&f.current_price))
            .or_else(|| price.and_then(|p| raw(&p.regular_market_price)))
            .ok_or_else(|| anyhow!("No price found for symbol: {}", symbol))?;

        let currency = price
            .and_then(|p| p.currency.clone())
            .or_else(|| detail.and_then(|d| d.currency.clone()))
            .unwrap_or_else(|| self.reference_currency.clone());

        let name = price
            .and_then(|p| p.short_name.clone().or_else(|| p.long_name.clone()))
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(InstrumentRecord {
            symbol: symbol.to_string(),
            name,
            raw_price,
            currency,
            dividend_rate: detail.and_then(|d| raw(&d.dividend_rate)),
            operating_margin: financial.and_then(|f| raw(&f.operating_margins)),
            return_on_assets: financial.and_then(|f| raw(&f.return_on_assets)),
            free_cash_flow: financial.and_then(|f| raw(&f.free_cashflow)),
            market_cap: detail
                .and_then(|d| raw(&d.market_cap))
                .or_else(|| price.and_then(|p| raw(&p.market_cap))),
            total_debt: financial.and_then(|f| raw(&f.total_debt)),
            ebitda: financial.and_then(|f| raw(&f.ebitda)),
            insider_ownership: stats.and_then(|s| raw(&s.held_percent_insiders)),
            forward_pe: detail
                .and_then(|d| raw(&d.forward_pe))
                .or_else(|| stats.and_then(|s| raw(&s.forward_pe))),
        })
    }
}

#[async_trait]
impl FundamentalsProvider for YahooFundamentalsProvider {
    #[instrument(
        name = "YahooFundamentalsFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<InstrumentRecord> {
        let client = build_client()?;
        let crumb = self.ensure_crumb(&client).await?;

        let url = Url::parse_with_params(
            &format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol),
            &[("modules", SUMMARY_MODULES), ("crumb", crumb.value.as_str())],
        )
        .with_context(|| format!("Invalid quoteSummary URL for symbol: {symbol}"))?;
        debug!("Requesting fundamentals from {}", url);

        let response = client
            .get(url)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(symbol = %symbol, "Yahoo rejected the crumb, requesting a new one");
            self.clear_crumb().await;
            return Err(anyhow!("Yahoo authentication expired for symbol: {}", symbol));
        }

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response for symbol: {symbol}"))?;
        let data: QuoteSummaryResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        if let Some(error) = data.quote_summary.error {
            return Err(anyhow!(
                "Provider error for symbol {}: {}",
                symbol,
                error.description.unwrap_or_else(|| "unknown".to_string())
            ));
        }

        let result = data
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| anyhow!("No fundamentals found for symbol: {}", symbol))?;

        let record = self.map_result(symbol, result)?;
        debug!(record = ?record, "Parsed fundamentals");
        Ok(record)
    }
}

/// Spot rates from Yahoo's chart endpoint, quoted as `{FROM}{TO}=X`.
pub struct YahooCurrencyProvider {
    base_url: String,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str) -> Self {
        YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooCurrencyResponse {
    chart: CurrencyChartResult,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartResult {
    result: Vec<CurrencyChartItem>,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartItem {
    meta: CurrencyChartMeta,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let symbol = format!("{from}{to}=X");
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!("Requesting currency rate from {}", url);

        let client = build_client()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for currency pair: {}", e, symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency pair: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;

        let data: YahooCurrencyResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let item = data
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", symbol))?;

        let rate = item.meta.regular_market_price;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(anyhow!(
                "Invalid rate {} for currency pair: {}",
                rate,
                symbol
            ));
        }
        Ok(rate)
    }
}
