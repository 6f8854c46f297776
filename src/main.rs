use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

use it_assets::cleaner::Cleaner;
use it_assets::config::Config;
use it_assets::elastic::ElasticClient;
use it_assets::loader::{LoadReport, Loader};
use it_assets::logging;
use it_assets::pipeline::Pipeline;
use it_assets::storage::SearchIndex;
use it_assets::transformer::{TransformReport, Transformer};

#[derive(Parser)]
#[command(name = "it_assets")]
#[command(about = "Clean, load and enrich the IT asset inventory")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a raw inventory CSV into a new file
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Bulk-load a cleaned CSV into a collection
    Load {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Target collection (defaults to the configured source collection)
        #[arg(long)]
        index: Option<String>,
        /// Drop the collection before loading
        #[arg(long)]
        recreate: bool,
    },
    /// Copy, purge and enrich the derived collection
    Transform {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
    },
    /// Run clean, load and transform sequentially
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the number of documents in a collection
    Count {
        #[arg(long)]
        index: Option<String>,
    },
}

async fn connect(config: &Config) -> anyhow::Result<Arc<dyn SearchIndex>> {
    let client = ElasticClient::connect(&config.search).await?;
    println!("✅ Connected to search service");
    Ok(Arc::new(client))
}

fn print_load(report: &LoadReport) {
    println!("\n📊 Load results for {}:", report.index);
    println!("   Rows: {}", report.total_rows);
    println!("   Inserted: {}", report.succeeded);
    println!("   Failed: {}", report.failed);
    println!("   Dropped (empty): {}", report.dropped);
    if !report.failures.is_empty() {
        warn!("{} documents failed to load", report.failed);
        println!("\n⚠️  Failures:");
        for failure in &report.failures {
            println!("   - {}", failure);
        }
    }
}

fn print_transform(report: &TransformReport) {
    println!("\n📊 Transform results {} → {}:", report.source, report.target);
    println!("   Copied: {}", report.copied);
    if let Some(purged) = report.purged {
        println!("   Purged: {}", purged);
    }
    if let Some(enrich) = &report.enrich {
        println!("   Enriched: {} ({} failed)", enrich.updated, enrich.failed);
        println!("   High risk: {}", enrich.high_risk);
        println!("   Unparseable dates: {}", enrich.unparseable_dates);
    }
    if let Some(count) = report.final_count {
        println!("   Total documents after transformation: {}", count);
    }
    for e in &report.errors {
        println!("   ⚠️  {}", e);
    }
}

async fn execute(cli: Cli, mut config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Clean { input, output } => {
            let input = input.unwrap_or_else(|| config.cleaner.input.clone());
            let output = output.unwrap_or_else(|| config.cleaner.output.clone());
            let report = Cleaner::new(config.cleaner.clone()).clean_file(&input, &output)?;
            println!("✅ Cleaned data saved as '{}'", output.display());
            println!("   Rows: {} → {}", report.rows_read, report.rows_written);
            println!("   Duplicates dropped: {}", report.duplicates_dropped);
            println!("   Cells filled: {}", report.cells_filled);
            println!("   Dates rejected: {}", report.dates_rejected);
        }
        Commands::Load { file, index, recreate } => {
            let file = file.unwrap_or_else(|| config.cleaner.output.clone());
            let index_name = index.unwrap_or_else(|| config.collections.source.clone());
            config.loader.recreate_index |= recreate;

            let client = connect(&config).await?;
            let loader = Loader::new(client, config.loader.clone());
            let report = loader.load_file(&file, &index_name).await?;
            print_load(&report);
        }
        Commands::Transform { source, target } => {
            let source = source.unwrap_or_else(|| config.collections.source.clone());
            let target = target.unwrap_or_else(|| config.collections.target.clone());

            let client = connect(&config).await?;
            let transformer = Transformer::new(client, config.transformer.clone(), source, target);
            let report = transformer.run(Utc::now()).await?;
            print_transform(&report);
        }
        Commands::Run { input } => {
            let input = input.unwrap_or_else(|| config.cleaner.input.clone());
            println!("🚀 Running full pipeline (clean + load + transform)...");

            let client = connect(&config).await?;
            let result = Pipeline::run(&config, client, &input, Utc::now()).await?;
            print_load(&result.load);
            print_transform(&result.transform);
            println!("\n✅ Full pipeline completed");
        }
        Commands::Count { index } => {
            let index_name = index.unwrap_or_else(|| config.collections.target.clone());
            let client = connect(&config).await?;
            let count = client.count(&index_name).await?;
            println!("Total documents in '{}': {}", index_name, count);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    let guard = logging::init_logging(&config.logging);

    let code = match execute(cli, config).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            1
        }
    };
    // flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}
