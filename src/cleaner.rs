use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::config::CleanerConfig;
use crate::constants::UNKNOWN;
use crate::dates::parse_day_first;
use crate::error::Result;
use crate::table::Table;
use crate::types::FieldValue;

static HEADER_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-_]+").expect("valid regex"));

/// Canonical header form: lower-cased with spaces, hyphens and underscores removed,
/// so `Host Name`, `host-name` and `hostname` compare equal.
fn normalize_header(header: &str) -> String {
    HEADER_SEPARATORS.replace_all(header, "").to_lowercase()
}

/// Counts of what a cleaning pass changed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub rows_read: usize,
    pub rows_written: usize,
    pub duplicates_dropped: usize,
    pub cells_filled: usize,
    pub dates_normalized: usize,
    pub dates_rejected: usize,
}

pub struct Cleaner {
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    fn key_column(&self, table: &Table) -> Option<usize> {
        let wanted = normalize_header(&self.config.key_column);
        table.headers.iter().position(|h| normalize_header(h) == wanted)
    }

    fn date_column(&self, table: &Table) -> Option<usize> {
        let wanted = normalize_header(&self.config.date_column);
        table.headers.iter().position(|h| normalize_header(h) == wanted)
    }

    /// Keep the first row per normalized key, in input order.
    fn dedupe(rows: Vec<Vec<FieldValue>>, key: usize) -> (Vec<Vec<FieldValue>>, usize) {
        let mut seen = HashSet::new();
        let before = rows.len();
        let kept: Vec<Vec<FieldValue>> = rows
            .into_iter()
            .filter(|row| {
                let cell = clean_cell(row[key].clone()).0;
                seen.insert(cell.to_csv_cell())
            })
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }

    fn normalize_date(cell: &FieldValue) -> Option<FieldValue> {
        let parsed = match cell {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_day_first(s),
            FieldValue::Integer(_) | FieldValue::Float(_) => parse_day_first(&cell.to_string()),
            _ => None,
        };
        parsed.map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string()))
    }

    /// Clean a table in memory; the input is consumed and a new table returned.
    pub fn clean(&self, table: Table) -> (Table, CleanReport) {
        let mut report = CleanReport {
            rows_read: table.rows.len(),
            ..Default::default()
        };
        let key = self.key_column(&table);
        let date = self.date_column(&table);
        let Table { headers, rows } = table;

        let rows = match key {
            Some(k) => {
                let (rows, dropped) = Self::dedupe(rows, k);
                report.duplicates_dropped = dropped;
                rows
            }
            None => {
                debug!("No '{}' column, skipping deduplication", self.config.key_column);
                rows
            }
        };

        let mut cleaned = Vec::with_capacity(rows.len());
        for row in rows {
            let mut out = Vec::with_capacity(row.len());
            for (i, cell) in row.into_iter().enumerate() {
                let (cell, filled) = clean_cell(cell);
                if filled {
                    report.cells_filled += 1;
                }
                let cell = if Some(i) == date {
                    match Self::normalize_date(&cell) {
                        Some(normalized) => {
                            report.dates_normalized += 1;
                            normalized
                        }
                        None => {
                            report.dates_rejected += 1;
                            FieldValue::text(UNKNOWN)
                        }
                    }
                } else {
                    cell
                };
                out.push(cell);
            }
            cleaned.push(out);
        }

        report.rows_written = cleaned.len();
        (
            Table {
                headers,
                rows: cleaned,
            },
            report,
        )
    }

    /// Read `input`, clean it, write the result to a new file at `output`.
    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn clean_file(&self, input: &Path, output: &Path) -> Result<CleanReport> {
        info!("🧹 Cleaning {}", input.display());
        let table = Table::read_csv(input)?;
        let (cleaned, report) = self.clean(table);
        cleaned.write_csv(output)?;

        counter!("assets_rows_cleaned_total").increment(report.rows_written as u64);
        info!(
            "✅ Cleaned {} rows ({} duplicates dropped, {} cells filled, {} dates rejected)",
            report.rows_written, report.duplicates_dropped, report.cells_filled, report.dates_rejected
        );
        Ok(report)
    }
}

/// Trim, fill blanks with the sentinel, then lower-case. Returns whether the cell was filled.
fn clean_cell(cell: FieldValue) -> (FieldValue, bool) {
    match cell {
        FieldValue::Null => (FieldValue::text(UNKNOWN), true),
        FieldValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                (FieldValue::text(UNKNOWN), true)
            } else {
                (FieldValue::Text(trimmed.to_lowercase()), false)
            }
        }
        other => (other, false),
    }
}
