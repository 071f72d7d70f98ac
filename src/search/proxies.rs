//! Egress candidates for search calls: a direct attempt first, then
//! whatever the public proxy listing is serving right now.

use std::time::Duration;

use scraper::Html;

use crate::error::AppError;
use crate::scrapers::selector;

const PROXY_LIST_URL: &str = "https://free-proxy-list.net/";
const PROXY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Prioritized egress candidates for one discovery call. The list is
/// consumed in order and never reused across calls.
pub struct ProxyPool {
    proxies: Vec<String>,
}

impl ProxyPool {
    pub fn direct_only() -> Self {
        Self {
            proxies: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_proxies(proxies: Vec<String>) -> Self {
        Self { proxies }
    }

    /// Fetch fresh proxy candidates from the public listing. A failed or
    /// empty fetch degrades to a direct-only pool; it never fails the
    /// discovery call on its own.
    pub async fn load() -> Self {
        match fetch_proxies().await {
            Ok(proxies) => {
                tracing::info!("Loaded {} proxy candidates", proxies.len());
                Self { proxies }
            }
            Err(e) => {
                tracing::warn!("Proxy list fetch failed, using direct egress only: {e}");
                Self::direct_only()
            }
        }
    }

    /// Candidates in priority order: None for the direct attempt, then
    /// each proxy as host:port.
    pub fn candidates(&self) -> impl Iterator<Item = Option<&str>> {
        std::iter::once(None).chain(self.proxies.iter().map(|p| Some(p.as_str())))
    }
}

async fn fetch_proxies() -> Result<Vec<String>, AppError> {
    let client = reqwest::Client::builder()
        .timeout(PROXY_FETCH_TIMEOUT)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let resp = client
        .get(PROXY_LIST_URL)
        .send()
        .await
        .map_err(|e| AppError::Fetch(format!("Proxy list request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(AppError::Fetch(format!(
            "Proxy list returned {}",
            resp.status()
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| AppError::Fetch(format!("Proxy list read failed: {e}")))?;
    parse_proxy_rows(&body)
}

/// Pull host:port pairs out of the listing's striped table, skipping rows
/// that do not hold an address.
fn parse_proxy_rows(html: &str) -> Result<Vec<String>, AppError> {
    let document = Html::parse_document(html);
    let rows = selector("table.table.table-striped.table-bordered tbody tr")?;
    let cells = selector("td")?;

    let mut proxies = Vec::new();
    for row in document.select(&rows) {
        let mut cols = row.select(&cells);
        let (Some(host), Some(port)) = (cols.next(), cols.next()) else {
            continue;
        };
        let host = host.text().collect::<String>().trim().to_string();
        let port = port.text().collect::<String>().trim().to_string();
        if !host.is_empty() && port.parse::<u16>().is_ok() {
            proxies.push(format!("{host}:{port}"));
        }
    }
    Ok(proxies)
}
