use it_assets::config::Config;
use it_assets::elastic::ElasticClient;
use it_assets::storage::SearchIndex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::load()?;
    let index = match std::env::args().nth(1) {
        Some(name) => name,
        None => {
            eprintln!("usage: clear-index <collection>");
            std::process::exit(2);
        }
    };

    println!("⚠️  WARNING: This will delete the collection '{}' and all its documents!", index);
    println!("Press Enter to continue or Ctrl+C to cancel...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    let client = ElasticClient::connect(&config.search).await?;
    if !client.index_exists(&index).await? {
        println!("Collection '{}' does not exist, nothing to do", index);
        return Ok(());
    }

    println!("🗑️  Deleting '{}'...", index);
    client.delete_index(&index).await?;

    println!("✅ Collection deleted successfully!");
    Ok(())
}
