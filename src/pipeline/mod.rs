//! Pipeline orchestrator: login → snapshot → extract → persist.
//!
//! The flow is deliberately sequential: the shop is small and a polite
//! per-request delay matters more than throughput. Page bodies are
//! snapshotted to disk before extraction so `extract` can re-parse the
//! last run offline.
//!
//! Profile and wishlist failures abort the run; a broken product page is
//! logged and counted, and the loop moves on.

use crate::config::AppConfig;
use crate::models::Product;
use crate::scraper::{Credentials, ShopSource, SiriustScraper, cleaner, parsers};
use crate::snapshot::{Page, SnapshotStore};
use crate::storage::Repository;
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, credentials: &Credentials) -> Result<PipelineStats> {
        let repo = Repository::open(&self.config.storage.db_path)
            .context("Failed to open DuckDB")?;

        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let scraper = SiriustScraper::new(&self.config.scraper)
            .context("Failed to build scraper")?;
        let snapshots = SnapshotStore::new(&self.config.snapshots.dir);

        let run_id = repo.begin_scrape_run().unwrap_or(0);

        // ── 1. Login ──────────────────────────────────────────────────────────
        info!("=== Step 1: Login ===");
        scraper.login(credentials).await.context("Login failed")?;

        // ── 2. Snapshot the profile and wishlist pages ────────────────────────
        info!("=== Step 2: Profile and wishlist pages ===");
        let profile_html = self
            .fetch_and_snapshot(&scraper, &snapshots, Page::Profile, &scraper.profile_url())
            .await?;
        let wishlist_html = self
            .fetch_and_snapshot(&scraper, &snapshots, Page::Wishlist, &scraper.wishlist_url())
            .await?;

        let now = Utc::now().naive_utc();
        let profile = cleaner::raw_to_profile(
            &parsers::parse_profile_page(&profile_html)
                .context("Profile extraction failed")?,
            now,
        );
        info!("Profile: {} {} <{}>", profile.first_name, profile.surname, profile.email);

        let links = parsers::parse_wishlist_links(&wishlist_html)?;
        info!("{} products in the wishlist", links.len());

        // ── 3. Product pages ──────────────────────────────────────────────────
        info!("=== Step 3: Fetching product pages ===");
        let mut products = Vec::new();
        let mut errors = 0usize;

        for href in &links {
            match self.scrape_product(&scraper, href).await {
                Ok(product) => {
                    info!(
                        "{}: {} stores, {} posts, feedback {:?}",
                        product.title,
                        product.stores.len(),
                        product.posts.len(),
                        product.feedback_count,
                    );
                    products.push(product);
                }
                Err(e) => {
                    warn!("{}: {:#}", href, e);
                    errors += 1;
                }
            }
        }

        // ── 4. Persist ────────────────────────────────────────────────────────
        info!("=== Step 4: Persisting ===");
        let profile_id = repo.insert_profile(&profile)?;
        debug!("Profile stored as row {}", profile_id);

        let mut stores_saved = 0usize;
        let mut posts_saved = 0usize;
        for product in &products {
            let product_id = repo.insert_product(product)?;
            debug!("{} stored as row {}", product.title, product_id);
            stores_saved += product.stores.len();
            posts_saved += product.posts.len();
        }

        let stats = PipelineStats {
            products_saved: products.len(),
            stores_saved,
            posts_saved,
            errors,
        };

        let rows = 1 + stats.products_saved + stats.stores_saved + stats.posts_saved;
        let error_msg = (errors > 0).then(|| format!("{} product pages failed", errors));
        repo.finish_scrape_run(run_id, stats.products_saved, rows, error_msg.as_deref())
            .ok();

        info!(
            "=== Done: {} of {} products | {} stores | {} posts | {} errors ===",
            stats.products_saved,
            links.len(),
            stats.stores_saved,
            stats.posts_saved,
            stats.errors,
        );

        Ok(stats)
    }

    /// Fetch one page and write its snapshot. A failed write is an error:
    /// continuing against a stale snapshot would silently corrupt the run.
    async fn fetch_and_snapshot(
        &self,
        scraper: &SiriustScraper,
        snapshots: &SnapshotStore,
        page: Page,
        url: &str,
    ) -> Result<String> {
        let html = scraper
            .fetch_page(url)
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        snapshots
            .save(page, &html)
            .with_context(|| format!("Failed to snapshot {}", url))?;
        Ok(html)
    }

    async fn scrape_product(&self, scraper: &SiriustScraper, href: &str) -> Result<Product> {
        let url = scraper.resolve(href)?;
        let html = scraper
            .fetch_page(&url)
            .await
            .context("product page fetch failed")?;
        let raw = parsers::parse_product_page(&html)?;
        cleaner::raw_to_product(&raw, Utc::now().naive_utc())
    }
}

#[derive(Debug)]
pub struct PipelineStats {
    pub products_saved: usize,
    pub stores_saved: usize,
    pub posts_saved: usize,
    pub errors: usize,
}
