// src/services/extractor.rs

//! Turns a fetched body into the bytes that get compared between cycles.

use scraper::{Html, Selector};

use crate::error::ExtractError;
use crate::models::ExtractConfig;
use crate::utils::normalize_whitespace;

/// Selector-driven content extractor.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    normalize_whitespace: bool,
}

impl ContentExtractor {
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            normalize_whitespace: config.normalize_whitespace,
        }
    }

    /// Extract comparable content from `body`.
    ///
    /// An empty selector returns the body verbatim, byte for byte. Otherwise
    /// the body is decoded as UTF-8 (invalid sequences replaced), the selector
    /// is applied to the parsed document and the text of the first match is
    /// returned.
    pub fn extract(&self, body: &[u8], selector: &str) -> Result<Vec<u8>, ExtractError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Ok(body.to_vec());
        }

        let sel = Self::parse_selector(selector)?;
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);
        let element = document
            .select(&sel)
            .next()
            .ok_or_else(|| ExtractError::NoMatch {
                selector: selector.to_string(),
            })?;

        let text: String = element.text().collect();
        if self.normalize_whitespace {
            Ok(normalize_whitespace(&text).into_bytes())
        } else {
            Ok(text.into_bytes())
        }
    }

    fn parse_selector(s: &str) -> Result<Selector, ExtractError> {
        Selector::parse(s).map_err(|e| ExtractError::selector(s, format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div id="price"><span>$</span>42</div>
          <ul class="items"><li>first</li><li>second</li></ul>
          <p class="note">  spaced
             out  </p>
        </body></html>"#;

    fn text(extractor: &ContentExtractor, body: &str, selector: &str) -> Result<String, ExtractError> {
        extractor
            .extract(body.as_bytes(), selector)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_empty_selector_returns_body_verbatim() {
        let extractor = ContentExtractor::default();
        assert_eq!(text(&extractor, PAGE, "").unwrap(), PAGE);
        assert_eq!(text(&extractor, "not html at all", "   ").unwrap(), "not html at all");
    }

    #[test]
    fn test_empty_selector_keeps_invalid_utf8() {
        let extractor = ContentExtractor::default();
        let a = extractor.extract(&[0xff, b'x'], "").unwrap();
        let b = extractor.extract(&[0xfe, b'x'], "").unwrap();
        assert_eq!(a, vec![0xff, b'x']);
        assert_ne!(a, b);
    }

    #[test]
    fn test_selector_returns_text_of_first_match() {
        let extractor = ContentExtractor::default();
        assert_eq!(text(&extractor, PAGE, "#price").unwrap(), "$42");
        assert_eq!(text(&extractor, PAGE, "ul.items li").unwrap(), "first");
    }

    #[test]
    fn test_no_match_is_an_error() {
        let extractor = ContentExtractor::default();
        let err = text(&extractor, PAGE, "#missing").unwrap_err();
        assert_eq!(
            err,
            ExtractError::NoMatch {
                selector: "#missing".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        let extractor = ContentExtractor::default();
        let err = text(&extractor, PAGE, "[[invalid").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidSelector { .. }));
    }

    #[test]
    fn test_whitespace_normalization() {
        let raw = ContentExtractor::default();
        assert_ne!(text(&raw, PAGE, "p.note").unwrap(), "spaced out");

        let normalized = ContentExtractor::new(&ExtractConfig {
            normalize_whitespace: true,
        });
        assert_eq!(text(&normalized, PAGE, "p.note").unwrap(), "spaced out");
        // Whole-document bodies are never rewritten.
        assert_eq!(text(&normalized, " a  b ", "").unwrap(), " a  b ");
    }
}
