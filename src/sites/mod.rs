// Per-platform routing rules: which hosts to search, how to recognize a
// posting link, and how to rewrite it into the direct-application form.

pub mod cleaner;

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Applicant-tracking platforms the pipeline discovers and scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Lever,
    Greenhouse,
    Ashby,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Lever, Platform::Greenhouse, Platform::Ashby];

    /// Stable identifier stored in the job_board column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Lever => "lever",
            Platform::Greenhouse => "greenhouse",
            Platform::Ashby => "ashby",
        }
    }

    /// Host scope for the `site:` operator in search queries.
    pub fn search_scope(&self) -> &'static str {
        match self {
            Platform::Lever => "lever.co",
            Platform::Greenhouse => "boards.greenhouse.io/*/jobs/*",
            Platform::Ashby => "ashbyhq.com",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookback windows accepted by the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeWindow {
    PastTwelveHours,
    PastDay,
    PastWeek,
    PastMonth,
    PastYear,
}

impl TimeWindow {
    /// Token for the search backend's `tbs` recency filter.
    pub fn filter_token(&self) -> &'static str {
        match self {
            TimeWindow::PastTwelveHours => "qdr:h12",
            TimeWindow::PastDay => "qdr:d",
            TimeWindow::PastWeek => "qdr:w",
            TimeWindow::PastMonth => "qdr:m",
            TimeWindow::PastYear => "qdr:y",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PAST_TWELVE_HOURS" => Ok(TimeWindow::PastTwelveHours),
            "PAST_DAY" => Ok(TimeWindow::PastDay),
            "PAST_WEEK" => Ok(TimeWindow::PastWeek),
            "PAST_MONTH" => Ok(TimeWindow::PastMonth),
            "PAST_YEAR" => Ok(TimeWindow::PastYear),
            other => Err(format!("Unknown time window: {other}")),
        }
    }
}

/// Immutable per-platform table of posting-link patterns. Built once at
/// startup and passed explicitly to whoever routes URLs.
pub struct SiteTable {
    lever: Regex,
    greenhouse: Regex,
    ashby: Regex,
}

impl SiteTable {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            lever: compile(r"https://jobs\.lever\.co/[^/?#\s]+/[^/?#\s]+")?,
            greenhouse: compile(r"https://boards\.greenhouse\.io/[^/?#\s]+/jobs/[^/?#\s]+")?,
            ashby: compile(r"https://jobs\.ashbyhq\.com/[^/?#\s]+/[^/?#\s]+")?,
        })
    }

    /// Pattern matching the minimal job-identifying substring of a
    /// decorated result URL.
    pub fn pattern(&self, platform: Platform) -> &Regex {
        match platform {
            Platform::Lever => &self.lever,
            Platform::Greenhouse => &self.greenhouse,
            Platform::Ashby => &self.ashby,
        }
    }

    /// Rewrite a pruned posting URL into the platform's direct-application
    /// form. Applying the rewrite to its own output is a no-op; anything
    /// malformed beyond the pattern match yields None and is dropped.
    pub fn canonicalize(&self, platform: Platform, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        match platform {
            Platform::Lever => canonicalize_lever(&parsed),
            Platform::Greenhouse => canonicalize_greenhouse(&parsed),
            Platform::Ashby => canonicalize_ashby(&parsed),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern).map_err(|e| AppError::Internal(format!("Invalid site pattern: {e}")))
}

fn path_segments(url: &Url) -> Option<Vec<&str>> {
    Some(url.path_segments()?.filter(|s| !s.is_empty()).collect())
}

fn canonicalize_lever(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let segments = path_segments(url)?;
    match segments.as_slice() {
        [org, id] | [org, id, "apply"] => Some(format!("https://{host}/{org}/{id}/apply")),
        _ => None,
    }
}

fn canonicalize_greenhouse(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let segments = path_segments(url)?;
    match segments.as_slice() {
        [org, "jobs", id] => Some(format!("https://{host}/embed/job_app?for={org}&token={id}")),
        ["embed", "job_app"] => {
            let mut org = None;
            let mut token = None;
            for (key, value) in url.query_pairs() {
                match key.as_ref() {
                    "for" => org = Some(value.into_owned()),
                    "token" => token = Some(value.into_owned()),
                    _ => {}
                }
            }
            Some(format!(
                "https://{host}/embed/job_app?for={}&token={}",
                org?,
                token?
            ))
        }
        _ => None,
    }
}

fn canonicalize_ashby(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let segments = path_segments(url)?;
    match segments.as_slice() {
        [org, id] | [org, id, "application"] => {
            Some(format!("https://{host}/{org}/{id}/application?embed=js"))
        }
        _ => None,
    }
}
