use crate::tools::url_parts::{strip_extension, UrlDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MIN_FILENAME_CHARS: usize = 4;
const PATH_TAIL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryScope {
    /// `site:<domain> ...`; results are confirmed by scraping.
    Site,
    /// Unscoped; results are ranked by the confidence scorer.
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedQuery {
    pub text: String,
    pub scope: QueryScope,
}

impl PlannedQuery {
    fn site(text: String) -> Self {
        Self {
            text,
            scope: QueryScope::Site,
        }
    }

    fn open(text: String) -> Self {
        Self {
            text,
            scope: QueryScope::Open,
        }
    }
}

/// Search queries for a broken URL, narrowest first.
///
/// Site-scoped queries come first; unscoped ones are added only when `strict_domain` is off.
/// An empty plan means there is nothing to search for.
pub fn plan_queries(desc: &UrlDescriptor, strict_domain: bool) -> Vec<PlannedQuery> {
    let mut out = Vec::new();
    let domain = desc.domain.as_str();
    let name = desc.readable_file_name();
    let has_name = name.chars().count() >= MIN_FILENAME_CHARS;

    if has_name {
        out.push(PlannedQuery::site(format!("site:{} \"{}\"", domain, name)));
        out.push(PlannedQuery::site(format!("site:{} {}", domain, name)));
    }

    if desc.path_segments.len() > 1 {
        let segs = desc.readable_segments();
        let tail = &segs[segs.len().saturating_sub(PATH_TAIL)..];
        if !tail.is_empty() {
            out.push(PlannedQuery::site(format!("site:{} {}", domain, tail.join(" "))));
        }
    }

    if !strict_domain {
        if has_name {
            out.push(PlannedQuery::open(format!("\"{}\" {}", name, domain)));
            out.push(PlannedQuery::open(name.clone()));
        }
        let last_dir = desc
            .parent_segment()
            .or_else(|| desc.path_segments.last().map(|s| s.as_str()))
            .map(|s| strip_extension(s).replace(['-', '_', '+', '.'], " "))
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty());
        if let Some(seg) = last_dir {
            out.push(PlannedQuery::open(format!("{} {}", seg, domain)));
        }
    }

    let mut seen = HashSet::new();
    out.retain(|q| seen.insert(q.text.clone()));
    out
}

/// Queries for the last-resort search on the original URL's name.
pub fn fallback_queries(desc: &UrlDescriptor) -> Vec<String> {
    let name = desc.readable_file_name();
    if name.is_empty() {
        return Vec::new();
    }
    let mut out = vec![format!("\"{}\" {}", name, desc.domain)];
    let spaced = format!("{} {}", name, desc.domain);
    if !out.contains(&spaced) {
        out.push(spaced);
    }
    out
}
