use scraper::Html;
use serde_json::Value;

use crate::error::AppError;
use crate::scrapers::{PageFetcher, PostingDetails, selector};

const LEVER_LOGO: &str = "/img/lever-logo-full.svg";

/// Scrape a Lever posting. The posting page (canonical URL minus `/apply`)
/// carries the description and the structured posting date; the apply page
/// carries the headline fields.
pub async fn scrape(fetcher: &dyn PageFetcher, url: &str) -> Result<PostingDetails, AppError> {
    let posting_url = url.strip_suffix("/apply").unwrap_or(url);
    let posting_page = fetcher.fetch(posting_url).await?;
    let (description, posted) = parse_posting_page(&posting_page)?;

    let apply_page = fetcher.fetch(url).await?;
    let (company, title, location, image) = parse_apply_page(&apply_page)?;

    Ok(PostingDetails {
        company,
        title,
        image,
        description,
        location,
        freshness: posted,
    })
}

/// Description text plus the ld+json posting date.
fn parse_posting_page(html: &str) -> Result<(String, String), AppError> {
    let document = Html::parse_document(html);

    let sections = selector("div.section-wrapper.page-full-width")?;
    let description = document
        .select(&sections)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::Parse("Lever description section missing".to_string()))?;

    let scripts = selector(r#"script[type="application/ld+json"]"#)?;
    let posted = document
        .select(&scripts)
        .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
        .find_map(|data| {
            data.get("datePosted")
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .ok_or_else(|| AppError::Parse("Lever posting date missing".to_string()))?;

    Ok((description, posted))
}

/// Headline fields from the apply page: company and role split out of the
/// page title, the category-label location, the first non-logo image.
fn parse_apply_page(html: &str) -> Result<(String, String, String, Option<String>), AppError> {
    let document = Html::parse_document(html);

    let titles = selector("title")?;
    let page_title = document
        .select(&titles)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| AppError::Parse("Lever page title missing".to_string()))?;

    let (company, title) = match page_title.split_once('-') {
        Some((company, rest)) => {
            let role = rest.trim();
            (
                company.trim().to_string(),
                if role.is_empty() {
                    "Unknown".to_string()
                } else {
                    role.to_string()
                },
            )
        }
        None => (page_title.trim().to_string(), "Unknown".to_string()),
    };

    let locations = selector(
        "div.sort-by-time.posting-category.medium-category-label.width-full.capitalize-labels.location",
    )?;
    let location = document
        .select(&locations)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let images = selector("img")?;
    let image = document
        .select(&images)
        .next()
        .and_then(|el| el.value().attr("src"))
        .filter(|src| !src.contains(LEVER_LOGO))
        .map(String::from);

    Ok((company, title, location, image))
}
