use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use scraper::Html;

use crate::error::AppError;
use crate::scrapers::{PageFetcher, PostingDetails, selector};

// Ashby renders posting metadata into inline JSON app state rather than
// the DOM, so these fields come out of the raw page text.
static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""locationName"\s*:\s*"([^"]+)""#).unwrap());
static UPDATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""updatedAt"\s*:\s*"([^"]+)""#).unwrap());

/// Scrape an Ashby posting. The posting view (canonical URL with the
/// `/application` segment collapsed) carries the description, location,
/// and last-updated timestamp; the application page carries the headline.
pub async fn scrape(fetcher: &dyn PageFetcher, url: &str) -> Result<PostingDetails, AppError> {
    let posting_url = url.replace("/application?", "?");
    let posting_page = fetcher.fetch(&posting_url).await?;
    let (description, location, freshness) = parse_posting_page(&posting_page)?;

    let application_page = fetcher.fetch(url).await?;
    let (company, title, image) = parse_application_page(&application_page)?;

    Ok(PostingDetails {
        company,
        title,
        image,
        description,
        location,
        freshness,
    })
}

/// Description from the meta tag, location and updated timestamp from the
/// inline app state.
fn parse_posting_page(html: &str) -> Result<(String, String, String), AppError> {
    let document = Html::parse_document(html);

    let metas = selector(r#"meta[name="description"]"#)?;
    let description = document
        .select(&metas)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Parse("Ashby description meta missing".to_string()))?
        .to_string();

    let location = LOCATION_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let scripts = selector("script")?;
    let updated = document
        .select(&scripts)
        .map(|el| el.text().collect::<String>())
        .filter(|text| text.contains("window.__appData"))
        .find_map(|text| {
            UPDATED_RE
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .ok_or_else(|| AppError::Parse("Ashby updated timestamp missing".to_string()))?;
    let freshness = DateTime::parse_from_rfc3339(&updated)
        .map_err(|e| AppError::Parse(format!("Bad Ashby timestamp '{updated}': {e}")))?
        .date_naive()
        .to_string();

    Ok((description, location, freshness))
}

/// Company and role split out of the application page title.
fn parse_application_page(html: &str) -> Result<(String, String, Option<String>), AppError> {
    let document = Html::parse_document(html);

    let titles = selector("title")?;
    let page_title = document
        .select(&titles)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| AppError::Parse("Ashby page title missing".to_string()))?;

    let (title, company) = match page_title.split_once(" @ ") {
        Some((role, company)) => (role.trim().to_string(), company.trim().to_string()),
        None => ("Unknown".to_string(), page_title.trim().to_string()),
    };

    let images = selector(r#"meta[property="og:image"]"#)?;
    let image = document
        .select(&images)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(String::from);

    Ok((company, title, image))
}
