use crate::core::error::LinkScoutError;

/// Pages with less body text than this are treated as failed scrapes.
pub const MIN_CONTENT_CHARS: usize = 50;

pub(super) fn is_substantial(text: &str) -> bool {
    text.chars().count() >= MIN_CONTENT_CHARS
}

/// Reject empty shells (consent walls, JS-only pages) so they never count as a content match.
pub(super) fn check_content(text: &str) -> Result<(), LinkScoutError> {
    let chars = text.chars().count();
    if chars < MIN_CONTENT_CHARS {
        return Err(LinkScoutError::ScrapeRejected(format!(
            "only {} chars of text (minimum {})",
            chars, MIN_CONTENT_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        assert!(check_content(&"x".repeat(MIN_CONTENT_CHARS)).is_ok());
        assert!(check_content(&"x".repeat(MIN_CONTENT_CHARS - 1)).is_err());
        assert!(!is_substantial(""));
    }
}
