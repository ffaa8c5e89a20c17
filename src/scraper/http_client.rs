use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use rand::RngExt;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Browser accept header; the shop serves trimmed-down markup without it.
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Pool to draw a per-run user-agent from when none is configured.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
];

/// Cookie-carrying HTTP session shared by the login POST and all page GETs.
pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(random_user_agent);

        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // The login state lives in session cookies
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text through the session.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.polite_delay().await;
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned HTTP {}", url, status);
        }

        resp.text().await.context("Failed to read response body")
    }

    /// POST a form and return the response status plus body.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<(StatusCode, String)> {
        self.polite_delay().await;
        debug!("POST {}", url);

        let resp = self
            .inner
            .post(url)
            .form(form)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read response body")?;
        Ok((status, body))
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.config.jitter_ms);
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        sleep(total).await;
    }
}

fn random_user_agent() -> String {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
        .to_string()
}
