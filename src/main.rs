mod config;
mod models;
mod pipeline;
mod scraper;
mod snapshot;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scraper::{Credentials, cleaner, parsers};
use crate::snapshot::{Page, SnapshotError, SnapshotStore};
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "siriust-etl", about = "Siriust wishlist scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Log in, scrape the profile and wishlist, persist everything
    Run,

    /// Re-parse the cached page snapshots without logging in
    Extract,

    /// Show database statistics
    Stats,

    /// List stored products with their store/post counts
    Products,

    /// Apply schema migrations without scraping
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "siriust_etl=info,warn",
        1 => "siriust_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Run => {
            let _t = utils::Timer::start("Wishlist scrape");
            let credentials = resolve_credentials(&config)?;
            let stats = Pipeline::new(config).run(&credentials).await?;
            info!(
                "Done: {} products, {} stores, {} posts, {} errors",
                stats.products_saved, stats.stores_saved, stats.posts_saved, stats.errors
            );
        }

        Command::Extract => {
            let snapshots = SnapshotStore::new(&config.snapshots.dir);

            let profile_html = load_snapshot(&snapshots, Page::Profile)?;
            let raw = parsers::parse_profile_page(&profile_html)?;
            let profile = cleaner::raw_to_profile(&raw, Utc::now().naive_utc());
            println!(
                "Profile: {} {} <{}>, {}",
                profile.first_name, profile.surname, profile.email, profile.city
            );

            let wishlist_html = load_snapshot(&snapshots, Page::Wishlist)?;
            let links = parsers::parse_wishlist_links(&wishlist_html)?;
            if links.is_empty() {
                println!("Wishlist snapshot holds no products.");
            } else {
                println!("{} wishlist products:", links.len());
                for link in &links {
                    println!("  {}", link);
                }
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            println!("─────────────────────────────────");
            println!("  Siriust ETL — Database Stats");
            println!("─────────────────────────────────");
            println!("  Profiles : {}", utils::fmt_number(repo.profile_count()?));
            println!("  Products : {}", utils::fmt_number(repo.product_count()?));
            println!("  Stores   : {}", utils::fmt_number(repo.store_count()?));
            println!("  Posts    : {}", utils::fmt_number(repo.feedback_count()?));
            match repo.last_run()? {
                Some((started, status)) => println!("  Last run : {} ({})", started, status),
                None => println!("  Last run : —"),
            }
            println!("─────────────────────────────────");
        }

        Command::Products => {
            let repo = Repository::open(&config.storage.db_path)?;
            let products = repo.list_products()?;
            if products.is_empty() {
                println!("No products — run `siriust-etl run` first.");
            } else {
                println!("{} products:", products.len());
                for p in &products {
                    let stores = repo.stores_for_product(p.id)?.len();
                    let posts = repo.posts_for_product(p.id)?.len();
                    println!(
                        "  [{}] {} ({} stores, {} posts, feedback: {})",
                        p.id, p.title, stores, posts, p.feedback_num
                    );
                }
            }
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}

/// Credentials come from config/env when present, interactive prompts
/// otherwise.
fn resolve_credentials(config: &AppConfig) -> Result<Credentials> {
    let login = match &config.auth.login {
        Some(login) => login.clone(),
        None => prompt("Login: ")?,
    };
    let password = match &config.auth.password {
        Some(password) => password.clone(),
        None => prompt("Password: ")?,
    };
    Ok(Credentials { login, password })
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut buf = String::new();
    std::io::stdin()
        .read_line(&mut buf)
        .context("Failed to read input")?;
    Ok(buf.trim().to_string())
}

fn load_snapshot(snapshots: &SnapshotStore, page: Page) -> Result<String> {
    match snapshots.load(page) {
        Ok(html) => Ok(html),
        Err(SnapshotError::Missing(path)) => {
            anyhow::bail!("No snapshot at {:?} — run `siriust-etl run` first", path)
        }
        Err(e) => Err(e.into()),
    }
}
