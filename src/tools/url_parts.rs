use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

/// Structured view of a URL used by query planning and scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlDescriptor {
    /// Lower-cased host without a leading `www.`.
    pub domain: String,
    pub protocol: String,
    /// Non-empty, percent-decoded path segments, filename included.
    pub path_segments: Vec<String>,
    /// Last path segment, empty for a bare host.
    pub file_name: String,
    pub file_name_no_ext: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl UrlDescriptor {
    /// Path segments with extensions dropped and separators turned into spaces.
    pub fn readable_segments(&self) -> Vec<String> {
        self.path_segments
            .iter()
            .map(|s| spaced(strip_extension(s)))
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Filename stem with separators turned into spaces.
    pub fn readable_file_name(&self) -> String {
        spaced(&self.file_name_no_ext)
    }

    /// Directory segment directly above the filename, if any.
    pub fn parent_segment(&self) -> Option<&str> {
        let n = self.path_segments.len();
        if n >= 2 {
            Some(self.path_segments[n - 2].as_str())
        } else {
            None
        }
    }
}

/// Split a URL into its parts. `None` means the URL cannot drive a search.
pub fn decompose(raw: &str) -> Option<UrlDescriptor> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let domain = normalize_host(&host);
    if domain.is_empty() {
        return None;
    }

    let path_segments: Vec<String> = parsed
        .path_segments()
        .map(|segs| {
            segs.filter(|s| !s.trim().is_empty())
                .map(|s| percent_decode_str(s).decode_utf8_lossy().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let file_name = path_segments.last().cloned().unwrap_or_default();
    let file_name_no_ext = strip_extension(&file_name).to_string();

    Some(UrlDescriptor {
        domain,
        protocol: parsed.scheme().to_string(),
        path_segments,
        file_name,
        file_name_no_ext,
        query: parsed.query().map(|q| q.to_string()).filter(|q| !q.is_empty()),
        fragment: parsed
            .fragment()
            .map(|f| f.to_string())
            .filter(|f| !f.is_empty()),
    })
}

/// Host of `raw` in the same normalized form as [`UrlDescriptor::domain`].
pub fn domain_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    parsed
        .host_str()
        .map(|h| normalize_host(&h.to_ascii_lowercase()))
}

pub(crate) fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.')
        .strip_prefix("www.")
        .unwrap_or(host.trim_end_matches('.'))
        .to_string()
}

/// Drop a trailing `.ext` of 1–5 alphanumeric characters.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                &name[..idx]
            } else {
                name
            }
        }
        _ => name,
    }
}

fn spaced(s: &str) -> String {
    s.split(|c: char| c == '-' || c == '_' || c == '.' || c == '+' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Comparable form of a URL: no fragment, no `www.`, no trailing slash.
pub fn url_key(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.trim().to_ascii_lowercase();
    };
    parsed.set_fragment(None);
    let host = parsed.host_str().map(|h| normalize_host(&h.to_ascii_lowercase()));
    let path = parsed.path().trim_end_matches('/').to_string();
    format!(
        "{}{}{}",
        host.unwrap_or_default(),
        path,
        parsed.query().map(|q| format!("?{}", q)).unwrap_or_default()
    )
}
