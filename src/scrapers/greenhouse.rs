use scraper::Html;

use crate::error::AppError;
use crate::scrapers::{PageFetcher, PostingDetails, selector};

/// Scrape a Greenhouse posting. A single fetch of the embedded application
/// page carries every field. The page exposes no stable posting timestamp
/// (its render date moves with every fetch), so the freshness slot stays
/// empty and the record id comes from the canonical URL alone.
pub async fn scrape(fetcher: &dyn PageFetcher, url: &str) -> Result<PostingDetails, AppError> {
    let page = fetcher.fetch(url).await?;
    parse_embed_page(&page)
}

fn parse_embed_page(html: &str) -> Result<PostingDetails, AppError> {
    let document = Html::parse_document(html);

    let og_titles = selector(r#"meta[property="og:title"]"#)?;
    let title = document
        .select(&og_titles)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Parse("Greenhouse posting title missing".to_string()))?
        .to_string();

    let page_titles = selector("title")?;
    let company = document
        .select(&page_titles)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|text| match text.rsplit_once(" at ") {
            Some((_, company)) => company.trim().to_string(),
            None => text.trim().to_string(),
        })
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Parse("Greenhouse company missing from page title".to_string()))?;

    let contents = selector("div#content")?;
    let description = document
        .select(&contents)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    if description.is_empty() {
        return Err(AppError::Parse("Greenhouse description missing".to_string()));
    }

    let locations = selector("div.location")?;
    let location = document
        .select(&locations)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let images = selector(r#"meta[property="og:image"]"#)?;
    let image = document
        .select(&images)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(String::from);

    Ok(PostingDetails {
        company,
        title,
        image,
        description,
        location,
        freshness: String::new(),
    })
}
