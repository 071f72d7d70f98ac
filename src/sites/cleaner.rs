//! Pure URL-cleaning pipeline: prune raw search results down to one
//! platform's posting links, deduplicate, then canonicalize.

use std::collections::HashSet;

use crate::sites::{Platform, SiteTable};

/// Reduce a raw result batch to canonical posting URLs for one platform.
///
/// Prune extracts the minimal job-identifying substring from each
/// decorated URL and discards non-matches; dedupe applies set semantics
/// (output order is unspecified); canonicalize rewrites each survivor into
/// the platform's direct-application form, dropping anything malformed.
pub fn clean(sites: &SiteTable, platform: Platform, raw: &[String]) -> Vec<String> {
    let pattern = sites.pattern(platform);
    let pruned: HashSet<String> = raw
        .iter()
        .filter_map(|url| pattern.find(url).map(|m| m.as_str().to_string()))
        .collect();

    pruned
        .into_iter()
        .filter_map(|url| sites.canonicalize(platform, &url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sites() -> SiteTable {
        SiteTable::new().unwrap()
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prune_extracts_minimal_link_from_decoration() {
        let raw = strings(&[
            "https://jobs.lever.co/acme/123/apply?lever-origin=applied&ref=search",
        ]);
        let cleaned = clean(&sites(), Platform::Lever, &raw);
        assert_eq!(cleaned, vec!["https://jobs.lever.co/acme/123/apply"]);
    }

    #[test]
    fn prune_drops_non_matching_urls() {
        let raw = strings(&[
            "https://www.google.com/search?q=jobs",
            "https://jobs.lever.co/acme",
            "https://boards.greenhouse.io/acme/jobs/456",
        ]);
        let cleaned = clean(&sites(), Platform::Lever, &raw);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn dedupe_collapses_exact_and_decorated_duplicates() {
        let raw = strings(&[
            "https://jobs.lever.co/acme/123",
            "https://jobs.lever.co/acme/123?utm=a",
            "https://jobs.lever.co/acme/123/apply",
        ]);
        let cleaned = clean(&sites(), Platform::Lever, &raw);
        assert_eq!(cleaned, vec!["https://jobs.lever.co/acme/123/apply"]);
    }

    #[test]
    fn output_set_is_order_independent() {
        let forward = strings(&[
            "https://jobs.ashbyhq.com/acme/a1",
            "https://jobs.ashbyhq.com/acme/b2",
        ]);
        let backward = strings(&[
            "https://jobs.ashbyhq.com/acme/b2",
            "https://jobs.ashbyhq.com/acme/a1",
        ]);

        let table = sites();
        let as_set = |urls: Vec<String>| urls.into_iter().collect::<HashSet<_>>();
        assert_eq!(
            as_set(clean(&table, Platform::Ashby, &forward)),
            as_set(clean(&table, Platform::Ashby, &backward))
        );
    }

    #[test]
    fn routes_only_own_platform_links() {
        let raw = strings(&[
            "https://jobs.lever.co/acme/123",
            "https://boards.greenhouse.io/initech/jobs/456?gh_src=abc",
            "https://jobs.ashbyhq.com/globex/a1b2",
        ]);
        let table = sites();

        assert_eq!(
            clean(&table, Platform::Greenhouse, &raw),
            vec!["https://boards.greenhouse.io/embed/job_app?for=initech&token=456"]
        );
        assert_eq!(
            clean(&table, Platform::Ashby, &raw),
            vec!["https://jobs.ashbyhq.com/globex/a1b2/application?embed=js"]
        );
    }
}
