use super::ui;
use crate::core::config::{AppConfig, ScanDepth, ScreenConfig};
use crate::core::currency::SpotRate;
use crate::core::export;
use crate::core::metrics::MetricsRow;
use crate::core::scan::{ScanCaches, ScanReport, Scanner};
use crate::core::score;
use crate::core::screen::{Predicate, ScreenCriteria};
use crate::core::universe::resolve_universe;
use crate::core::{CurrencyRateProvider, FundamentalsProvider, IndexMembershipProvider};
use anyhow::Result;
use comfy_table::Cell;
use std::path::PathBuf;
use tracing::{debug, info};

const NO_DATA_MESSAGE: &str = "No data available from the market data provider.";
const EMPTY_SHORTLIST_MESSAGE: &str = "No stocks currently meet your requirements. Try lowering the 'Min Yield' or increasing 'Scan Depth'.";
const DISCLAIMER: &str = "For educational use only. Not financial advice; the score is a heuristic, not a verified indicator of performance.";

/// Per-run overrides of the configured screen.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub min_yield: Option<f64>,
    pub min_roic: Option<f64>,
    pub min_margin: Option<f64>,
    pub max_debt_ebitda: Option<f64>,
    pub min_insider: Option<f64>,
    pub max_pe: Option<f64>,
    pub min_score: Option<f64>,
    pub depth: Option<ScanDepth>,
    pub sort: Option<Vec<String>>,
    pub filters: Vec<Predicate>,
    pub output: Option<PathBuf>,
    pub refresh: bool,
}

impl ScanOptions {
    /// The configured screen with this run's overrides applied.
    pub fn apply_to(&self, screen: &ScreenConfig) -> ScreenConfig {
        ScreenConfig {
            min_yield: self.min_yield.unwrap_or(screen.min_yield),
            min_roic: self.min_roic.or(screen.min_roic),
            min_margin: self.min_margin.or(screen.min_margin),
            max_debt_ebitda: self.max_debt_ebitda.or(screen.max_debt_ebitda),
            min_insider: self.min_insider.or(screen.min_insider),
            max_pe: self.max_pe.or(screen.max_pe),
            min_score: self.min_score.or(screen.min_score),
            depth: self.depth.unwrap_or(screen.depth),
            sort: self.sort.clone().unwrap_or_else(|| screen.sort.clone()),
        }
    }
}

/// The outcome of one scan: everything scanned and the rows that made it.
pub struct Shortlist {
    pub report: ScanReport,
    pub criteria: ScreenCriteria,
    pub rows: Vec<MetricsRow>,
}

/// Runs universe → extraction → scoring → filter/sort.
pub async fn build_shortlist(
    config: &AppConfig,
    options: &ScanOptions,
    fundamentals: &dyn FundamentalsProvider,
    rates: &dyn CurrencyRateProvider,
    index_provider: &dyn IndexMembershipProvider,
    caches: &ScanCaches,
) -> Result<Shortlist> {
    let screen = options.apply_to(&config.screen);
    let criteria = screen.criteria(&options.filters)?;
    debug!(?criteria, depth = %screen.depth, "Screen criteria");

    if options.refresh {
        info!("Clearing cached market data");
        caches.clear().await;
    }

    let scanner = Scanner::new(
        fundamentals,
        rates,
        caches,
        &config.currency,
        &config.foreign_currency,
    );
    let universe = resolve_universe(
        index_provider,
        &config.universe.symbols,
        caches.universe.as_ref(),
        caches.ttl,
    )
    .await;
    let symbols = screen.depth.take(&universe);
    info!(
        universe = universe.len(),
        scanning = symbols.len(),
        "Resolved universe"
    );

    let pb = ui::new_progress_bar(symbols.len() as u64);
    pb.set_message("Fetching fundamentals...");
    let mut report = scanner
        .scan(symbols, &|symbol| {
            pb.set_message(symbol.to_string());
            pb.inc(1);
        })
        .await;
    pb.finish_and_clear();

    score::apply_scores(&mut report.rows, screen.min_yield);
    let rows = criteria.apply(report.rows.clone());

    Ok(Shortlist {
        report,
        criteria,
        rows,
    })
}

pub fn display_shortlist(rows: &[MetricsRow], reference_currency: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell(&format!("Price ({reference_currency})")),
        ui::header_cell("Yield %"),
        ui::header_cell("ROIC %"),
        ui::header_cell("Op. Margin %"),
        ui::header_cell("FCF Yield %"),
        ui::header_cell("Debt/EBITDA"),
        ui::header_cell("Insider %"),
        ui::header_cell("P/E"),
        ui::header_cell("Score"),
    ]);

    let percent = |v: f64| format!("{v:.2}%");
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.symbol),
            Cell::new(&row.name),
            ui::format_optional_cell(Some(row.price), |p| format!("{p:.2}")),
            ui::format_optional_cell(row.yield_pct, percent),
            ui::format_optional_cell(row.roic_pct, percent),
            ui::format_optional_cell(row.op_margin_pct, percent),
            ui::format_optional_cell(row.fcf_yield_pct, percent),
            ui::format_optional_cell(row.debt_to_ebitda, |d| format!("{d:.1}x")),
            ui::format_optional_cell(row.insider_pct, percent),
            ui::format_optional_cell(row.pe, |pe| format!("{pe:.1}")),
            ui::score_cell(row.score),
        ]);
    }

    table.to_string()
}

/// Which spot rate the prices were converted with, if any conversion applied.
pub fn conversion_note(spot: &SpotRate, reference_currency: &str) -> Option<String> {
    if spot.foreign == reference_currency {
        return None;
    }
    Some(match spot.rate {
        Some(rate) => format!(
            "{} prices converted to {} at {rate:.4}.",
            spot.foreign, reference_currency
        ),
        None => format!(
            "No {}{} rate was available; {} quotes were skipped.",
            spot.foreign, reference_currency, spot.foreign
        ),
    })
}

pub async fn run(
    config: &AppConfig,
    options: &ScanOptions,
    fundamentals: &dyn FundamentalsProvider,
    rates: &dyn CurrencyRateProvider,
    index_provider: &dyn IndexMembershipProvider,
    caches: &ScanCaches,
) -> Result<()> {
    let shortlist =
        build_shortlist(config, options, fundamentals, rates, index_provider, caches).await?;
    let report = &shortlist.report;

    if report.has_no_data() {
        println!("{}", ui::style_text(NO_DATA_MESSAGE, ui::StyleType::Error));
        return Ok(());
    }

    if shortlist.rows.is_empty() {
        println!(
            "{}",
            ui::style_text(EMPTY_SHORTLIST_MESSAGE, ui::StyleType::Warning)
        );
    } else {
        println!(
            "\n{}\n",
            ui::style_text(
                &format!(
                    "Found {} of {} stocks meeting your requirements",
                    shortlist.rows.len(),
                    report.rows.len()
                ),
                ui::StyleType::Title
            )
        );
        println!("{}", display_shortlist(&shortlist.rows, &config.currency));

        if let Some(path) = &options.output {
            export::export_to_path(path, &shortlist.rows, &config.currency)?;
            println!("\nSaved shortlist to {}", path.display());
        }
    }

    if !report.skipped.is_empty() {
        println!(
            "\n{}",
            ui::style_text(
                &format!(
                    "Skipped {} of {} instruments with missing or unreadable data (use --verbose for details).",
                    report.skipped.len(),
                    report.scanned()
                ),
                ui::StyleType::Subtle
            )
        );
    }

    if let Some(note) = conversion_note(&report.spot, &config.currency) {
        println!("{}", ui::style_text(&note, ui::StyleType::Subtle));
    }

    ui::print_separator();
    println!("{}", ui::style_text(DISCLAIMER, ui::StyleType::Subtle));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::IndexConfig;
    use crate::core::instrument::InstrumentRecord;
    use crate::core::metrics::Metric;
    use crate::providers::index_list::ConfigIndexProvider;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct StaticFundamentals(Vec<InstrumentRecord>);

    #[async_trait]
    impl FundamentalsProvider for StaticFundamentals {
        async fn fetch_fundamentals(&self, symbol: &str) -> Result<InstrumentRecord> {
            self.0
                .iter()
                .find(|r| r.symbol == symbol)
                .cloned()
                .ok_or_else(|| anyhow!("No fundamentals found for symbol: {}", symbol))
        }
    }

    struct FixedRate(f64);

    #[async_trait]
    impl CurrencyRateProvider for FixedRate {
        async fn get_rate(&self, _from: &str, _to: &str) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn record(symbol: &str, dividend: f64, debt: f64, insider: f64, pe: f64) -> InstrumentRecord {
        InstrumentRecord {
            dividend_rate: Some(dividend),
            total_debt: Some(debt),
            ebitda: Some(1.0),
            insider_ownership: Some(insider),
            forward_pe: Some(pe),
            return_on_assets: Some(0.1),
            ..InstrumentRecord::new(symbol, symbol, 100.0, "USD")
        }
    }

    fn config() -> AppConfig {
        let mut config: AppConfig = serde_yaml::from_str("currency: USD").unwrap();
        config.universe.indices = vec![IndexConfig {
            name: "test".to_string(),
            symbols: ["D", "C", "B", "A"].iter().map(|s| s.to_string()).collect(),
        }];
        config
    }

    fn fundamentals() -> StaticFundamentals {
        StaticFundamentals(vec![
            record("A", 4.0, 1.0, 0.06, 12.0), // 100
            record("B", 5.0, 3.0, 0.02, 20.0), // 30 + 15 + 10 + 10 = 65
            record("C", 1.0, 1.0, 0.06, 12.0), // yield too low
            // "D" is unknown to the provider
        ])
    }

    #[tokio::test]
    async fn test_build_shortlist_defaults() {
        let config = config();
        let index_provider = ConfigIndexProvider::new(config.universe.indices.clone());
        let caches = ScanCaches::in_memory(None);

        let shortlist = build_shortlist(
            &config,
            &ScanOptions::default(),
            &fundamentals(),
            &FixedRate(1.27),
            &index_provider,
            &caches,
        )
        .await
        .unwrap();

        assert_eq!(shortlist.report.scanned(), 4);
        assert_eq!(shortlist.report.skipped.len(), 1);
        assert_eq!(shortlist.report.skipped[0].symbol, "D");

        let symbols: Vec<&str> = shortlist.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B"]);
        assert_eq!(shortlist.rows[0].score, Some(100));
        assert_eq!(shortlist.rows[1].score, Some(65));
    }

    #[tokio::test]
    async fn test_build_shortlist_with_overrides() {
        let config = config();
        let index_provider = ConfigIndexProvider::new(config.universe.indices.clone());
        let caches = ScanCaches::in_memory(None);
        let options = ScanOptions {
            min_yield: Some(0.5),
            max_pe: Some(15.0),
            depth: Some(ScanDepth::Limit(3)),
            sort: Some(vec!["yield:asc".to_string()]),
            ..ScanOptions::default()
        };

        let shortlist = build_shortlist(
            &config,
            &options,
            &fundamentals(),
            &FixedRate(1.27),
            &index_provider,
            &caches,
        )
        .await
        .unwrap();

        assert_eq!(shortlist.report.scanned(), 3);
        assert!(shortlist.report.skipped.is_empty());
        let symbols: Vec<&str> = shortlist.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["C", "A"]);
        assert!(
            shortlist
                .criteria
                .predicates
                .contains(&Predicate::at_most(Metric::Pe, 15.0))
        );
    }

    #[tokio::test]
    async fn test_invalid_sort_is_an_error() {
        let config = config();
        let index_provider = ConfigIndexProvider::new(vec![]);
        let caches = ScanCaches::in_memory(None);
        let options = ScanOptions {
            sort: Some(vec!["beta".to_string()]),
            ..ScanOptions::default()
        };

        let result = build_shortlist(
            &config,
            &options,
            &fundamentals(),
            &FixedRate(1.0),
            &index_provider,
            &caches,
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_display_shortlist() {
        let row = MetricsRow {
            symbol: "KO".to_string(),
            name: "Coca-Cola".to_string(),
            price: 50.0,
            yield_pct: Some(4.0),
            roic_pct: None,
            op_margin_pct: Some(25.0),
            fcf_yield_pct: Some(3.456),
            debt_to_ebitda: Some(2.0),
            insider_pct: Some(6.0),
            pe: Some(12.0),
            score: Some(100),
        };
        let output = console::strip_ansi_codes(&display_shortlist(&[row], "USD")).to_string();
        assert!(output.contains("Price (USD)"));
        assert!(output.contains("4.00%"));
        assert!(output.contains("3.46%"));
        assert!(output.contains("2.0x"));
        assert!(output.contains("12.0"));
        assert!(output.contains("N/A"));
        assert!(output.contains("100"));
    }

    #[test]
    fn test_conversion_note() {
        assert_eq!(
            conversion_note(&SpotRate::new("GBP", Some(1.27)), "USD").as_deref(),
            Some("GBP prices converted to USD at 1.2700.")
        );
        assert_eq!(
            conversion_note(&SpotRate::new("GBP", None), "USD").as_deref(),
            Some("No GBPUSD rate was available; GBP quotes were skipped.")
        );
        assert_eq!(conversion_note(&SpotRate::new("USD", Some(1.0)), "USD"), None);
    }

    #[tokio::test]
    async fn test_shortlist_reports_rate_used() {
        let config = config();
        let index_provider = ConfigIndexProvider::new(config.universe.indices.clone());
        let caches = ScanCaches::in_memory(None);

        let shortlist = build_shortlist(
            &config,
            &ScanOptions::default(),
            &fundamentals(),
            &FixedRate(1.27),
            &index_provider,
            &caches,
        )
        .await
        .unwrap();

        assert_eq!(shortlist.report.spot, SpotRate::new("GBP", Some(1.27)));
        assert_eq!(
            conversion_note(&shortlist.report.spot, &config.currency).as_deref(),
            Some("GBP prices converted to USD at 1.2700.")
        );
    }
}
