use metrics::counter;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::storage::SearchIndex;
use crate::table::Table;
use crate::types::{BulkFailure, Document};

/// Result of loading one file into a collection
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub index: String,
    pub total_rows: usize,
    pub dropped: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Human-readable reason per failed document or chunk
    pub failures: Vec<String>,
}

pub struct Loader {
    index: Arc<dyn SearchIndex>,
    config: LoaderConfig,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("index", &"<Arc<dyn SearchIndex>>")
            .field("config", &self.config)
            .finish()
    }
}

fn describe(failure: &BulkFailure) -> String {
    match &failure.id {
        Some(id) => format!("{id}: {}", failure.reason),
        None => failure.reason.clone(),
    }
}

impl Loader {
    pub fn new(index: Arc<dyn SearchIndex>, config: LoaderConfig) -> Self {
        Self { index, config }
    }

    /// Read a CSV file and load every row as a document.
    #[instrument(skip_all, fields(path = %path.display(), index = %index_name))]
    pub async fn load_file(&self, path: &Path, index_name: &str) -> Result<LoadReport> {
        info!("📄 Reading {}", path.display());
        let table = Table::read_csv(path)?;
        self.load_table(&table, index_name).await
    }

    pub async fn load_table(&self, table: &Table, index_name: &str) -> Result<LoadReport> {
        let mut report = LoadReport {
            index: index_name.to_string(),
            total_rows: table.rows.len(),
            ..Default::default()
        };

        if self.config.recreate_index && self.index.index_exists(index_name).await? {
            info!("♻️  Dropping existing collection {}", index_name);
            self.index.delete_index(index_name).await?;
        }
        if !self.index.index_exists(index_name).await? {
            info!("Creating collection {}", index_name);
            self.index.create_index(index_name).await?;
        }

        let documents: Vec<Document> = table
            .documents()
            .filter(|doc| {
                let empty = doc.iter().all(|(_, v)| v.is_null());
                if empty && self.config.drop_empty_rows {
                    report.dropped += 1;
                    return false;
                }
                true
            })
            .collect();
        if report.dropped > 0 {
            debug!("Dropped {} all-null rows", report.dropped);
        }

        info!("📤 Loading {} documents into {}...", documents.len(), index_name);
        println!("📤 Loading {} documents into {}...", documents.len(), index_name);

        for (n, chunk) in documents.chunks(self.config.batch_size.max(1)).enumerate() {
            match self.index.bulk_insert(index_name, chunk).await {
                Ok(response) => {
                    report.succeeded += response.succeeded;
                    report.failed += response.failures.len();
                    for failure in &response.failures {
                        warn!("Document rejected: {}", describe(failure));
                        report.failures.push(describe(failure));
                    }
                    debug!("Chunk {} loaded ({} ok)", n, response.succeeded);
                }
                Err(e) => {
                    warn!("Bulk request for chunk {} failed: {}", n, e);
                    report.failed += chunk.len();
                    report.failures.push(format!("chunk {n}: {e}"));
                }
            }
        }

        counter!("assets_documents_loaded_total", "index" => index_name.to_string())
            .increment(report.succeeded as u64);
        counter!("assets_documents_failed_total", "index" => index_name.to_string())
            .increment(report.failed as u64);

        if report.failed > 0 {
            warn!(
                "⚠️  {} documents failed to load into {}",
                report.failed, index_name
            );
        }
        info!(
            "✅ Loaded {} documents into {} ({} failed, {} dropped)",
            report.succeeded, index_name, report.failed, report.dropped
        );
        Ok(report)
    }
}
