pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;
use url::Url;

use self::http_client::HttpClient;

/// Path of the account-settings page, relative to the site root.
pub const PROFILE_PATH: &str = "/profiles-update/";
/// Path of the saved-products page.
pub const WISHLIST_PATH: &str = "/wishlist/";

/// Shop account credentials, prompted or configured.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable authenticated-page source. The pipeline only needs "log in"
/// and "give me this URL as text".
#[async_trait]
pub trait ShopSource: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<()>;
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

// ── siriust.ru scraper ────────────────────────────────────────────────────────

pub struct SiriustScraper {
    client: HttpClient,
    base_url: Url,
}

impl SiriustScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid base URL {:?}", config.base_url))?;
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url,
        })
    }

    pub fn profile_url(&self) -> String {
        format!("{}{}", self.base_url, PROFILE_PATH.trim_start_matches('/'))
    }

    pub fn wishlist_url(&self) -> String {
        format!("{}{}", self.base_url, WISHLIST_PATH.trim_start_matches('/'))
    }

    /// Resolve a wishlist href against the site root. The shop usually
    /// emits absolute links, but relative ones appear on some themes.
    pub fn resolve(&self, href: &str) -> Result<String> {
        let url = self
            .base_url
            .join(href)
            .with_context(|| format!("Unresolvable product link {:?}", href))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl ShopSource for SiriustScraper {
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let form = [
            ("return_url", "index.php"),
            ("redirect_url", "index.php"),
            ("user_login", credentials.login.as_str()),
            ("password", credentials.password.as_str()),
            ("dispatch[auth.login]", ""),
        ];

        let (status, body) = self
            .client
            .post_form(self.base_url.as_str(), &form)
            .await
            .context("Login request failed")?;

        if !status.is_success() {
            anyhow::bail!("Login returned HTTP {}", status);
        }

        // The shop answers 200 even for rejected credentials; the session
        // cookie is what actually matters for the authenticated pages.
        info!(
            "Logged in as {} (HTTP {}, {} bytes)",
            credentials.login,
            status,
            body.len()
        );
        Ok(())
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        self.client.get_text(url).await
    }
}
