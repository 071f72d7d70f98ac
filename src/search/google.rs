use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use scraper::Html;

use crate::error::AppError;
use crate::scrapers::selector;
use crate::search::SearchBackend;
use crate::sites::TimeWindow;

/// Characters that encodeURIComponent does NOT encode.
/// RFC 3986 unreserved: A-Z a-z 0-9 - _ . ! ~ * ' ( )
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const SEARCH_URL: &str = "https://www.google.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The results page serves at most this many entries per request.
const RESULT_PAGE_CAP: usize = 100;

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:130.0) Gecko/20100101 Firefox/130.0",
];

/// Production search capability: scrapes a Google results page, optionally
/// through a forward proxy, with a rotated browser User-Agent.
pub struct GoogleSearch;

#[async_trait]
impl SearchBackend for GoogleSearch {
    async fn search(
        &self,
        query: &str,
        window: TimeWindow,
        proxy: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<String>, AppError> {
        let mut builder = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .user_agent(random_user_agent());
        if let Some(addr) = proxy {
            let proxy = reqwest::Proxy::all(format!("http://{addr}"))
                .map_err(|e| AppError::Fetch(format!("Invalid proxy {addr}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let num = max_results.min(RESULT_PAGE_CAP);
        let url = format!(
            "{SEARCH_URL}?q={}&num={num}&hl=en&tbs={}",
            urlencoded(query),
            window.filter_token()
        );

        let resp = client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Search request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Fetch(format!(
                "Search returned {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Fetch(format!("Search read failed: {e}")))?;
        parse_result_links(&body, max_results)
    }
}

fn random_user_agent() -> &'static str {
    use rand::Rng;
    USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())]
}

/// URL-encode a string for use in query parameters.
fn urlencoded(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_URI_COMPONENT_SET).to_string()
}

/// Collect candidate result links from a results page: unwrap the
/// `/url?q=` redirect form, accept direct anchors, skip the backend's own
/// hosts, and deduplicate preserving first-seen order.
fn parse_result_links(html: &str, max_results: usize) -> Result<Vec<String>, AppError> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(candidate) = resolve_result_href(href) else {
            continue;
        };
        if is_search_host(&candidate) {
            continue;
        }
        if links.len() >= max_results {
            break;
        }
        if seen.insert(candidate.clone()) {
            links.push(candidate);
        }
    }
    Ok(links)
}

fn resolve_result_href(href: &str) -> Option<String> {
    if let Some(rest) = href.strip_prefix("/url?q=") {
        let encoded = rest.split('&').next().unwrap_or(rest);
        let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
        return Some(decoded.into_owned());
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    None
}

fn is_search_host(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.contains("google.")))
        .unwrap_or(true)
}
