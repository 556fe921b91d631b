//! CSV export of the shortlist.

use crate::core::metrics::{Metric, MetricsRow};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Metric columns in export order, after ticker and name.
pub const EXPORT_METRICS: [Metric; 9] = Metric::ALL;

pub fn headers(reference_currency: &str) -> Vec<String> {
    let mut headers = vec!["Ticker".to_string(), "Name".to_string()];
    headers.extend(EXPORT_METRICS.iter().map(|m| match m {
        Metric::Price => format!("Price ({reference_currency})"),
        other => other.label().to_string(),
    }));
    headers
}

/// Writes the rows as CSV. Unknown values are left empty.
pub fn write_csv<W: Write>(writer: W, rows: &[MetricsRow], reference_currency: &str) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(headers(reference_currency))?;

    for row in rows {
        let mut record = vec![row.symbol.clone(), row.name.clone()];
        record.extend(
            EXPORT_METRICS
                .iter()
                .map(|m| m.raw(row).map_or_else(String::new, |v| v.to_string())),
        );
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_to_path(path: &Path, rows: &[MetricsRow], reference_currency: &str) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    write_csv(file, rows, reference_currency)
        .with_context(|| format!("Failed to write export file: {}", path.display()))
}
