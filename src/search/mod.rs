pub mod google;
pub mod proxies;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::AppError;
use crate::sites::{Platform, SiteTable, TimeWindow, cleaner};

pub use google::GoogleSearch;
pub use proxies::ProxyPool;

/// Capability to run one web search and return the raw result links.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        window: TimeWindow,
        proxy: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<String>, AppError>;
}

/// One discovery round: which platforms to cover, how fresh, how many.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub query: String,
    pub platforms: Vec<Platform>,
    pub window: TimeWindow,
    pub max_results: usize,
}

/// Compose the search query: user keywords restricted to the platforms'
/// hosting domains, OR-joined.
pub fn build_query(keywords: &str, platforms: &[Platform]) -> String {
    let scopes = platforms
        .iter()
        .map(|p| format!("site:{}", p.search_scope()))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("{keywords} {scopes}")
}

/// Run one discovery round and return the cleaned, canonical posting URLs
/// grouped by platform.
///
/// Proxy candidates are tried in order (direct connection first); the first
/// attempt that completes wins, even if it found nothing. Only when every
/// candidate fails is the round itself an error.
pub async fn discover(
    backend: &dyn SearchBackend,
    sites: &SiteTable,
    proxies: &ProxyPool,
    request: &DiscoveryRequest,
) -> Result<HashMap<Platform, Vec<String>>, AppError> {
    let query = build_query(&request.query, &request.platforms);

    let mut raw_links = None;
    for proxy in proxies.candidates() {
        match backend
            .search(&query, request.window, proxy, request.max_results)
            .await
        {
            Ok(links) => {
                info!(
                    "Search via {} returned {} links",
                    proxy.unwrap_or("direct connection"),
                    links.len()
                );
                raw_links = Some(links);
                break;
            }
            Err(e) => {
                warn!(
                    "Search via {} failed: {e}",
                    proxy.unwrap_or("direct connection")
                );
            }
        }
    }
    let raw_links = raw_links.ok_or(AppError::ProxyExhausted)?;

    let mut batches = HashMap::new();
    for &platform in &request.platforms {
        let urls = cleaner::clean(sites, platform, &raw_links);
        if !urls.is_empty() {
            info!("{platform}: {} candidate postings", urls.len());
        }
        batches.insert(platform, urls);
    }
    Ok(batches)
}
