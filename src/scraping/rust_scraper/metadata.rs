use super::RustScraper;
use scraper::{Html, Selector};

impl RustScraper {
    /// Extract page title with fallback to og:title, then h1
    pub(super) fn extract_title(&self, document: &Html) -> String {
        // Try title tag first
        if let Ok(title_selector) = Selector::parse("title") {
            if let Some(title_element) = document.select(&title_selector).next() {
                let title = title_element.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return title;
                }
            }
        }

        if let Some(og) = meta_content(document, "meta[property=\"og:title\"]") {
            return og;
        }

        // Fallback to h1
        if let Ok(h1_selector) = Selector::parse("h1") {
            if let Some(h1_element) = document.select(&h1_selector).next() {
                let h1_text = h1_element.text().collect::<String>().trim().to_string();
                if !h1_text.is_empty() {
                    return h1_text;
                }
            }
        }

        String::new()
    }

    /// Extract meta description (OpenGraph fallback)
    pub(super) fn extract_meta_description(&self, document: &Html) -> String {
        meta_content(document, "meta[name=\"description\"]")
            .or_else(|| meta_content(document, "meta[property=\"og:description\"]"))
            .unwrap_or_default()
    }
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_fallbacks() {
        let s = RustScraper::new(reqwest::Client::new());
        let doc = Html::parse_document(
            r#"<html><head><meta property="og:title" content="OG Title"></head><body><h1>H</h1></body></html>"#,
        );
        assert_eq!(s.extract_title(&doc), "OG Title");

        let doc = Html::parse_document("<html><body><h1> Heading </h1></body></html>");
        assert_eq!(s.extract_title(&doc), "Heading");

        let doc = Html::parse_document("<html><body><p>x</p></body></html>");
        assert_eq!(s.extract_title(&doc), "");
    }

    #[test]
    fn test_meta_description_fallback() {
        let s = RustScraper::new(reqwest::Client::new());
        let doc = Html::parse_document(
            r#"<html><head><meta property="og:description" content=" From OG "></head></html>"#,
        );
        assert_eq!(s.extract_meta_description(&doc), "From OG");
    }
}
