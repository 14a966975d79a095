use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use wren::analytics::AnalyticsAggregator;
use wren::config::Config;
use wren::models::millis_to_datetime;
use wren::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "wren-admin")]
#[command(about = "Wren link maintenance CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a tenant's links, newest first
    List {
        #[arg(long)]
        tenant: String,
    },
    /// Show one link
    Show {
        id: String,
        #[arg(long)]
        tenant: String,
    },
    /// Click statistics of one link
    Stats {
        id: String,
        #[arg(long)]
        tenant: String,
    },
    /// Delete a link and its clicks
    Delete {
        id: String,
        #[arg(long)]
        tenant: String,
    },
    /// Report links whose click_count disagrees with their click rows
    CheckCounts,
    /// Reset every drifted click_count to its click-row count
    ReconcileCounts,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let sqlite = SqliteStorage::new(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open {}", config.database.url))?;
    let storage: Arc<dyn Storage> = Arc::new(sqlite);

    // Ensure database is initialized
    storage.init().await?;

    run(cli.command, storage, &config).await
}

async fn run(command: Commands, storage: Arc<dyn Storage>, config: &Config) -> Result<()> {
    match command {
        Commands::List { tenant } => {
            let links = storage.list_links(&tenant).await?;
            if links.is_empty() {
                println!("No links found for tenant '{tenant}'.");
            } else {
                println!(
                    "{:<34} {:<20} {:>8}  {:<25} {}",
                    "ID", "Short code", "Clicks", "Created", "URL"
                );
                println!("{}", "-".repeat(110));
                for link in links {
                    println!(
                        "{:<34} {:<20} {:>8}  {:<25} {}",
                        link.id,
                        link.short_code,
                        link.click_count,
                        millis_to_datetime(link.created_at).to_rfc3339(),
                        link.original_url
                    );
                }
            }
        }
        Commands::Show { id, tenant } => {
            let link = storage
                .get_link(&id, &tenant)
                .await?
                .with_context(|| format!("link '{id}' not found for tenant '{tenant}'"))?;
            println!("{}", serde_json::to_string_pretty(&link)?);
        }
        Commands::Stats { id, tenant } => {
            let aggregator =
                AnalyticsAggregator::new(Arc::clone(&storage), config.analytics.recent_limit);
            let analytics = aggregator
                .get_analytics(&id, &tenant)
                .await
                .with_context(|| format!("no analytics for link '{id}'"))?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
        }
        Commands::Delete { id, tenant } => {
            let Some(link) = storage.delete_link(&id, &tenant).await? else {
                bail!("link '{id}' not found for tenant '{tenant}'");
            };
            println!("✓ Deleted link '{}' ({})", link.short_code, link.id);
        }
        Commands::CheckCounts => {
            let drift = storage.click_count_drift().await?;
            let orphans = storage.count_orphan_clicks().await?;

            if drift.is_empty() {
                println!("✓ All click counters match their click rows");
            } else {
                println!("{:<34} {:<20} {:>10} {:>10}", "ID", "Short code", "Counter", "Rows");
                println!("{}", "-".repeat(78));
                for entry in &drift {
                    println!(
                        "{:<34} {:<20} {:>10} {:>10}",
                        entry.id, entry.short_code, entry.click_count, entry.actual
                    );
                }
                println!("⚠ {} link(s) drifted; run reconcile-counts to repair", drift.len());
            }

            if orphans > 0 {
                println!("⚠ {orphans} click row(s) reference missing links");
            }
        }
        Commands::ReconcileCounts => {
            let repaired = storage.reconcile_click_counts().await?;
            println!("✓ Reconciled {repaired} link(s)");
        }
    }

    Ok(())
}
