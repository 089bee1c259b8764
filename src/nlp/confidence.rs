use crate::tools::url_parts::{decompose, UrlDescriptor};
use crate::types::{ScoredCandidate, SearchCandidate};
use std::collections::HashSet;

const DOMAIN_EXACT: f64 = 0.5;
const DOMAIN_PARTIAL_SCALE: f64 = 0.2;
const FILENAME_EXACT: f64 = 0.3;
const FILENAME_PARTIAL: f64 = 0.15;
const PATH_SCALE: f64 = 0.2;
const TEXT_SCALE: f64 = 0.1;

/// Candidates at or below this are dropped before ranking.
pub const MIN_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceBreakdown {
    pub score: f64,
    pub domain_score: f64,
    pub filename_score: f64,
    pub path_similarity: f64,
    pub text_relevance: f64,
}

fn labels(domain: &str) -> HashSet<&str> {
    domain.split('.').filter(|l| !l.is_empty()).collect()
}

/// Shared labels over the larger label count.
pub(crate) fn label_overlap(a: &str, b: &str) -> f64 {
    let la = labels(a);
    let lb = labels(b);
    let denom = la.len().max(lb.len());
    if denom == 0 {
        return 0.0;
    }
    la.intersection(&lb).count() as f64 / denom as f64
}

fn normalized_segments(desc: &UrlDescriptor) -> Vec<String> {
    desc.readable_segments()
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect()
}

/// Fraction of the original's path segments that reappear in the candidate path.
pub fn path_similarity(original: &UrlDescriptor, candidate: &UrlDescriptor) -> f64 {
    let orig = normalized_segments(original);
    if orig.is_empty() {
        return 0.0;
    }
    let cand: HashSet<String> = normalized_segments(candidate).into_iter().collect();
    let shared = orig.iter().filter(|s| cand.contains(*s)).count();
    shared as f64 / orig.len() as f64
}

/// 1.0 when the whole term phrase appears in title+snippet, otherwise the share of terms
/// that do.
pub fn text_relevance(candidate: &SearchCandidate, search_terms: &[String]) -> f64 {
    if search_terms.is_empty() {
        return 0.0;
    }
    let text = format!("{} {}", candidate.title, candidate.snippet).to_lowercase();
    let phrase = search_terms.join(" ").to_lowercase();
    if !phrase.is_empty() && text.contains(&phrase) {
        return 1.0;
    }
    let present = search_terms
        .iter()
        .filter(|t| text.contains(&t.to_lowercase()))
        .count();
    present as f64 / search_terms.len() as f64
}

/// Strict-mode domain rule: the candidate's host, `www.` aside, equals the original's.
pub fn same_domain(original: &UrlDescriptor, candidate_url: &str) -> bool {
    decompose(candidate_url).is_some_and(|c| c.domain == original.domain)
}

/// Rank a generic (not site-scoped) search result against the broken URL.
pub fn score_candidate(
    original: &UrlDescriptor,
    candidate: &SearchCandidate,
    search_terms: &[String],
    strict_domain: bool,
) -> ConfidenceBreakdown {
    let Some(cand) = decompose(&candidate.url) else {
        return ConfidenceBreakdown::default();
    };

    let mut out = ConfidenceBreakdown::default();
    if cand.domain == original.domain {
        out.domain_score = DOMAIN_EXACT;
    } else if strict_domain {
        return out;
    } else {
        out.domain_score = label_overlap(&cand.domain, &original.domain) * DOMAIN_PARTIAL_SCALE;
    }

    let orig_name = original.file_name_no_ext.to_lowercase();
    let cand_name = cand.file_name_no_ext.to_lowercase();
    if !orig_name.is_empty() && !cand_name.is_empty() {
        if orig_name == cand_name {
            out.filename_score = FILENAME_EXACT;
        } else if orig_name.contains(&cand_name) || cand_name.contains(&orig_name) {
            out.filename_score = FILENAME_PARTIAL;
        }
    }

    out.path_similarity = path_similarity(original, &cand);
    out.text_relevance = text_relevance(candidate, search_terms);

    out.score = (out.domain_score
        + out.filename_score
        + out.path_similarity * PATH_SCALE
        + out.text_relevance * TEXT_SCALE)
        .clamp(0.0, 1.0);
    out
}

/// Attach a breakdown to its candidate.
pub fn into_scored(
    candidate: &SearchCandidate,
    breakdown: &ConfidenceBreakdown,
    search_terms: &[String],
) -> ScoredCandidate {
    let text = format!("{} {}", candidate.title, candidate.snippet).to_lowercase();
    ScoredCandidate {
        candidate: candidate.clone(),
        confidence: breakdown.score,
        matched_terms: search_terms
            .iter()
            .filter(|t| text.contains(&t.to_lowercase()))
            .cloned()
            .collect(),
        domain_relevance: breakdown.domain_score,
        path_similarity: breakdown.path_similarity,
        validation: Default::default(),
    }
}

/// Score, drop weak candidates, and sort best-first. Ties keep provider order.
pub fn rank_candidates(
    original: &UrlDescriptor,
    candidates: &[SearchCandidate],
    search_terms: &[String],
    strict_domain: bool,
) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .iter()
        .filter_map(|c| {
            let b = score_candidate(original, c, search_terms, strict_domain);
            (b.score > MIN_CONFIDENCE).then(|| into_scored(c, &b, search_terms))
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(url: &str, title: &str, snippet: &str) -> SearchCandidate {
        SearchCandidate {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            source_provider: "test".into(),
        }
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_strict_mismatch_is_exactly_zero() {
        let orig = decompose("https://example.com/guides/setup.html").unwrap();
        let c = cand("https://other.net/guides/setup.html", "setup", "setup guide");
        let b = score_candidate(&orig, &c, &terms(&["setup"]), true);
        assert_eq!(b.score, 0.0);
    }

    #[test]
    fn test_strict_never_below_lenient_for_same_domain_and_file() {
        let orig = decompose("https://example.com/a/b/report-2020.html").unwrap();
        let cases = [
            cand("https://example.com/x/report-2020.html", "Report", ""),
            cand("https://www.example.com/a/b/report-2020.htm", "", "report 2020"),
            cand("https://example.com/report-2020", "annual report", "the report"),
        ];
        for c in &cases {
            let t = terms(&["report", "reports"]);
            let strict = score_candidate(&orig, c, &t, true).score;
            let lenient = score_candidate(&orig, c, &t, false).score;
            assert!(strict >= lenient, "{}: {} < {}", c.url, strict, lenient);
        }
    }

    #[test]
    fn test_full_match_caps_at_one() {
        let orig = decompose("https://example.com/docs/install.html").unwrap();
        let c = cand(
            "https://example.com/docs/install.html",
            "install docs",
            "install",
        );
        let b = score_candidate(&orig, &c, &terms(&["install"]), false);
        // 0.5 + 0.3 + 1.0×0.2 + 1.0×0.1 = 1.1 → 1.0
        assert_eq!(b.score, 1.0);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let orig = decompose("https://blog.example.co.uk/2020/10/post-title").unwrap();
        let urls = [
            "https://example.co.uk/post-title",
            "https://blog.example.co.uk/post",
            "https://unrelated.org/",
            "not a url",
        ];
        for u in urls {
            for strict in [true, false] {
                let b = score_candidate(&orig, &cand(u, "post title", ""), &terms(&["post", "title"]), strict);
                assert!((0.0..=1.0).contains(&b.score), "{u}: {}", b.score);
            }
        }
    }

    #[test]
    fn test_rank_drops_weak_and_sorts() {
        let orig = decompose("https://example.com/guides/deploy-app.html").unwrap();
        let candidates = vec![
            cand("https://example.com/about", "About us", ""),
            cand("https://example.com/guides/deploy-app", "Deploy app", "deploy"),
            cand("https://example.com/docs/deploy", "Deploy", ""),
        ];
        let ranked = rank_candidates(&orig, &candidates, &terms(&["deploy", "app"]), true);
        assert_eq!(ranked[0].url(), "https://example.com/guides/deploy-app");
        assert!(ranked.iter().all(|r| r.confidence > MIN_CONFIDENCE));
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_partial_domain_overlap_in_lenient_mode() {
        let orig = decompose("https://docs.example.com/x.html").unwrap();
        let c = cand("https://example.com/x.html", "", "");
        let b = score_candidate(&orig, &c, &[], false);
        // labels {docs, example, com} vs {example, com}: 2/3 × 0.2
        assert!((b.domain_score - 0.2 * 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(b.filename_score, FILENAME_EXACT);
    }

    #[test]
    fn test_same_domain_is_exact_up_to_www() {
        let orig = decompose("https://example.com/old/doc.html").unwrap();
        assert!(same_domain(&orig, "https://www.example.com/new/doc"));
        assert!(same_domain(&orig, "http://EXAMPLE.com/doc"));
        assert!(!same_domain(&orig, "https://example.com.au/doc"));
        assert!(!same_domain(&orig, "https://docs.example.com/doc"));
        assert!(!same_domain(&orig, "not a url"));
    }
}
