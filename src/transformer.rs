use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TransformerConfig;
use crate::enrich::Enricher;
use crate::error::{PipelineError, Result};
use crate::purge::PurgeRule;
use crate::storage::SearchIndex;
use crate::types::{PartialUpdate, RiskLevel, ScrollPage};

/// Outcome of the enrichment step
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichReport {
    pub scanned: usize,
    pub updated: usize,
    pub failed: usize,
    pub unparseable_dates: usize,
    pub high_risk: usize,
}

/// Outcome of a full copy → purge → enrich → count run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformReport {
    pub source: String,
    pub target: String,
    pub copied: u64,
    pub purged: Option<u64>,
    pub enrich: Option<EnrichReport>,
    pub final_count: Option<u64>,
    /// Recoverable step failures, in the order they happened
    pub errors: Vec<String>,
}

/// Builds the derived collection from the loaded one
pub struct Transformer {
    index: Arc<dyn SearchIndex>,
    config: TransformerConfig,
    source: String,
    target: String,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("index", &"<Arc<dyn SearchIndex>>")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl Transformer {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        config: TransformerConfig,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            index,
            config,
            source: source.into(),
            target: target.into(),
        }
    }

    /// Step 1: replace the target with a fresh copy of the source.
    #[instrument(skip(self), fields(source = %self.source, target = %self.target))]
    pub async fn copy(&self) -> Result<u64> {
        if !self.index.index_exists(&self.source).await? {
            return Err(PipelineError::MissingIndex(self.source.clone()));
        }
        if self.index.index_exists(&self.target).await? {
            info!("Dropping stale {}", self.target);
            self.index.delete_index(&self.target).await?;
        }

        // explicit create so the target carries the collection settings
        self.index.create_index(&self.target).await?;

        info!("🔁 Reindexing from '{}' to '{}'...", self.source, self.target);
        println!("🔁 Reindexing from '{}' to '{}'...", self.source, self.target);
        let copied = self.index.reindex(&self.source, &self.target).await?;
        info!("✅ Reindex complete: {} documents", copied);
        Ok(copied)
    }

    /// Step 2: delete documents with a missing hostname or a sentinel provider.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn purge(&self) -> Result<u64> {
        let rule = PurgeRule::from_config(&self.config);
        info!("🗑️  Deleting invalid records from {}...", self.target);
        println!("🗑️  Deleting invalid records (missing hostname or unknown provider)...");
        let deleted = self.index.delete_by_query(&self.target, &rule).await?;
        counter!("assets_documents_purged_total").increment(deleted);
        info!("✅ Deleted {} invalid records", deleted);
        Ok(deleted)
    }

    async fn enrich_page(
        &self,
        enricher: &Enricher<'_>,
        page: &ScrollPage,
        now: DateTime<Utc>,
        report: &mut EnrichReport,
    ) -> Result<()> {
        let updates: Vec<PartialUpdate> = page
            .hits
            .iter()
            .map(|hit| {
                let derived = enricher.derive(&hit.source, now);
                if derived.unparseable_date {
                    report.unparseable_dates += 1;
                }
                if derived.risk_level == RiskLevel::High {
                    report.high_risk += 1;
                }
                PartialUpdate {
                    id: hit.id.clone(),
                    doc: derived.to_partial(),
                }
            })
            .collect();
        report.scanned += updates.len();

        let response = self.index.bulk_update(&self.target, &updates).await?;
        report.updated += response.succeeded;
        report.failed += response.failures.len();
        for failure in &response.failures {
            warn!(
                "Update failed for {}: {}",
                failure.id.as_deref().unwrap_or("?"),
                failure.reason
            );
        }
        Ok(())
    }

    /// Step 3: add `risk_level` and `system_age` to every remaining document.
    ///
    /// Pages are flushed as they are read; a failed bulk request stops the
    /// step but earlier pages stay committed.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn enrich(&self, now: DateTime<Utc>) -> Result<EnrichReport> {
        info!("🧮 Adding risk_level and system_age to {}...", self.target);
        println!("🧮 Adding risk_level and system_age...");
        let enricher = Enricher::new(&self.config);
        let mut report = EnrichReport::default();

        let mut page = self
            .index
            .open_scroll(&self.target, self.config.batch_size)
            .await?;
        let mut scroll_id = page.scroll_id.clone();

        let outcome = loop {
            if page.hits.is_empty() {
                break Ok(());
            }
            if let Err(e) = self.enrich_page(&enricher, &page, now, &mut report).await {
                break Err(e);
            }
            debug!("Enriched {} documents so far", report.scanned);

            let Some(id) = scroll_id.as_deref() else {
                break Ok(());
            };
            page = match self.index.next_scroll(id).await {
                Ok(next) => next,
                Err(e) => break Err(e),
            };
            if page.scroll_id.is_some() {
                scroll_id = page.scroll_id.clone();
            }
        };

        if let Some(id) = scroll_id {
            if let Err(e) = self.index.clear_scroll(&id).await {
                warn!("Could not clear scroll context: {}", e);
            }
        }
        outcome?;

        counter!("assets_documents_enriched_total").increment(report.updated as u64);
        info!(
            "✅ Enriched {} documents ({} failed, {} high risk, {} unparseable dates)",
            report.updated, report.failed, report.high_risk, report.unparseable_dates
        );
        Ok(report)
    }

    pub async fn count(&self) -> Result<u64> {
        self.index.count(&self.target).await
    }

    fn record(report: &mut TransformReport, step: &str, e: PipelineError) -> Result<()> {
        if e.is_fatal() {
            return Err(e);
        }
        error!("Error during {}: {}", step, e);
        println!("❌ Error during {step}: {e}");
        report.errors.push(format!("{step}: {e}"));
        Ok(())
    }

    /// Copy, purge, enrich and count. A failed copy aborts; later steps
    /// record recoverable failures and carry on.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<TransformReport> {
        let mut report = TransformReport {
            source: self.source.clone(),
            target: self.target.clone(),
            ..Default::default()
        };

        report.copied = self.copy().await?;

        match self.purge().await {
            Ok(n) => report.purged = Some(n),
            Err(e) => Self::record(&mut report, "purge", e)?,
        }
        match self.enrich(now).await {
            Ok(r) => report.enrich = Some(r),
            Err(e) => Self::record(&mut report, "enrich", e)?,
        }
        match self.count().await {
            Ok(n) => {
                info!("Total documents after transformation: {}", n);
                report.final_count = Some(n);
            }
            Err(e) => Self::record(&mut report, "count", e)?,
        }

        Ok(report)
    }
}
