use crate::nlp::confidence::label_overlap;

/// Second-level labels under which registrations happen one level deeper (`example.co.uk`).
const SECOND_LEVEL: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu", "ne", "or"];

/// Registrable part of a host: the last two labels, or three under `co.uk`-style suffixes.
pub fn registrable_domain(host: &str) -> &str {
    let labels: Vec<&str> = host.split('.').collect();
    let n = labels.len();
    if n <= 2 {
        return host;
    }
    let keep = if labels[n - 1].len() == 2 && SECOND_LEVEL.contains(&labels[n - 2]) {
        3
    } else {
        2
    };
    if n <= keep {
        return host;
    }
    let skip: usize = labels[..n - keep].iter().map(|l| l.len() + 1).sum();
    &host[skip..]
}

fn is_subdomain_of(child: &str, parent: &str) -> bool {
    child.len() > parent.len()
        && child.ends_with(parent)
        && child.as_bytes()[child.len() - parent.len() - 1] == b'.'
}

/// How closely a candidate's host matches the broken link's host.
///
/// 1.0 same host, 0.8 one is a subdomain of the other, 0.6 same registrable domain,
/// otherwise half the label overlap (0 when nothing is shared).
pub fn domain_relevance(original: &str, candidate: &str) -> f64 {
    let original = original.trim_end_matches('.').to_ascii_lowercase();
    let candidate = candidate.trim_end_matches('.').to_ascii_lowercase();
    if original.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if original == candidate {
        return 1.0;
    }
    if is_subdomain_of(&candidate, &original) || is_subdomain_of(&original, &candidate) {
        return 0.8;
    }
    if registrable_domain(&original) == registrable_domain(&candidate) {
        return 0.6;
    }
    0.5 * label_overlap(&original, &candidate)
}
