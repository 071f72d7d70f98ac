// Detail-page scraping: one strategy per platform, all behind a shared
// rate-limited fetcher.

pub mod ashby;
pub mod greenhouse;
pub mod lever;

use std::time::Duration;

use async_trait::async_trait;
use scraper::Selector;
use tokio::sync::Semaphore;

use crate::error::AppError;
use crate::sites::Platform;

const PAGE_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Cap on concurrent outbound page fetches across all ingest workers.
const MAX_CONCURRENT_FETCHES: usize = 8;

/// Fetch capability: one URL to one response body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, AppError>;
}

/// Normalized detail-page fields for one posting.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingDetails {
    pub company: String,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub location: String,
    /// Platform-specific freshness signal folded into the record id; empty
    /// when the platform page carries no stable posting timestamp.
    pub freshness: String,
}

/// Shared HTTP client behind the fetch capability, with a concurrency cap.
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: Semaphore,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(PAGE_USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            limiter: Semaphore::new(MAX_CONCURRENT_FETCHES),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("Fetch limiter closed: {e}")))?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Fetch(format!("{url} returned {}", resp.status())));
        }

        resp.text()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to read body from {url}: {e}")))
    }
}

/// Dispatch a canonical URL to its platform's scrape strategy.
pub async fn scrape(
    fetcher: &dyn PageFetcher,
    platform: Platform,
    url: &str,
) -> Result<PostingDetails, AppError> {
    match platform {
        Platform::Lever => lever::scrape(fetcher, url).await,
        Platform::Greenhouse => greenhouse::scrape(fetcher, url).await,
        Platform::Ashby => ashby::scrape(fetcher, url).await,
    }
}

/// Compile a CSS selector, surfacing bad literals as internal errors.
pub(crate) fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::Internal(format!("Invalid selector '{css}': {e}")))
}
