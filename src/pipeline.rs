use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::cleaner::{CleanReport, Cleaner};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::loader::{LoadReport, Loader};
use crate::storage::SearchIndex;
use crate::transformer::{TransformReport, Transformer};

/// Result of a complete clean → load → transform run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub clean: CleanReport,
    pub load: LoadReport,
    pub transform: TransformReport,
}

pub struct Pipeline;

impl Pipeline {
    /// Fail fast when the service does not answer.
    pub async fn ensure_connected(index: &dyn SearchIndex) -> Result<()> {
        match index.ping().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(PipelineError::Connection(
                "search service did not answer the ping".to_string(),
            )),
            Err(e) => Err(PipelineError::Connection(e.to_string())),
        }
    }

    /// Run all three stages in order against the configured names.
    #[instrument(skip_all, fields(input = %input.display()))]
    pub async fn run(
        config: &Config,
        index: Arc<dyn SearchIndex>,
        input: &Path,
        now: DateTime<Utc>,
    ) -> Result<PipelineResult> {
        Self::ensure_connected(index.as_ref()).await?;

        // Step 1: clean
        println!("\n🧹 Step 1: Cleaning {}...", input.display());
        let cleaner = Cleaner::new(config.cleaner.clone());
        let clean = cleaner.clean_file(input, &config.cleaner.output)?;

        // Step 2: load
        println!("\n📥 Step 2: Loading into {}...", config.collections.source);
        let loader = Loader::new(index.clone(), config.loader.clone());
        let load = loader
            .load_file(&config.cleaner.output, &config.collections.source)
            .await?;

        // Step 3: transform
        println!("\n🔧 Step 3: Transforming into {}...", config.collections.target);
        let transformer = Transformer::new(
            index,
            config.transformer.clone(),
            config.collections.source.clone(),
            config.collections.target.clone(),
        );
        let transform = transformer.run(now).await?;

        info!("Pipeline finished");
        Ok(PipelineResult {
            clean,
            load,
            transform,
        })
    }
}
