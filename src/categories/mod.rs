//! Document categories.
//!
//! Documents carry a `category` mapping in their metadata: category name to
//! classifier confidence. Category names are Polish; the published English
//! list is aligned with the Polish one line by line, which is how English
//! names are translated.

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::SpeakleashError;
use crate::reader::Metadata;
use crate::transport::Transport;

/// Aligned Polish and English category name lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryCatalog {
    pl: Vec<String>,
    en: Vec<String>,
}

impl CategoryCatalog {
    pub fn new(pl: Vec<String>, en: Vec<String>) -> Self {
        Self { pl, en }
    }

    /// Fetches both lists from the URLs configured under `pl` and `en`.
    pub fn fetch(transport: &dyn Transport, config: &Config) -> Result<Self, SpeakleashError> {
        let pl = fetch_list(transport, config, "pl")?;
        let en = fetch_list(transport, config, "en")?;
        if pl.len() != en.len() {
            debug!(pl = pl.len(), en = en.len(), "category lists differ in length");
        }
        Ok(Self::new(pl, en))
    }

    /// Category names for a language (`pl` or `en`), empty for others.
    pub fn categories(&self, lang: &str) -> &[String] {
        match lang.to_ascii_lowercase().as_str() {
            "pl" => &self.pl,
            "en" => &self.en,
            _ => &[],
        }
    }

    fn to_polish<'a>(&'a self, category: &'a str, lang: &str) -> Option<&'a str> {
        if lang.eq_ignore_ascii_case("pl") {
            return Some(category);
        }
        if !lang.eq_ignore_ascii_case("en") {
            return None;
        }
        let index = self.en.iter().position(|name| name == category)?;
        self.pl.get(index).map(String::as_str)
    }

    /// True when any of `categories` (named in `lang`) appears in the
    /// document's `category` metadata with confidence of at least
    /// `min_confidence`. Names compare case-insensitively.
    pub fn matches(&self, meta: &Metadata, categories: &[String], min_confidence: f64, lang: &str) -> bool {
        let Some(scores) = meta.get("category").and_then(Value::as_object) else {
            return false;
        };

        categories
            .iter()
            .filter_map(|category| self.to_polish(category, lang))
            .any(|wanted| {
                scores.iter().any(|(name, confidence)| {
                    name.to_uppercase() == wanted.to_uppercase()
                        && confidence.as_f64().is_some_and(|c| c >= min_confidence)
                })
            })
    }
}

/// Splits a newline-separated list, trimming entries and dropping blanks.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn fetch_list(transport: &dyn Transport, config: &Config, lang: &str) -> Result<Vec<String>, SpeakleashError> {
    let fail = |message: String| SpeakleashError::CategoriesUnavailable {
        lang: lang.to_string(),
        message,
    };

    let url = config
        .category_lists
        .get(lang)
        .ok_or_else(|| fail("no category list URL configured".to_string()))?;
    let bytes = transport
        .fetch(url)
        .and_then(|fetched| fetched.into_bytes(url))
        .map_err(|err| fail(err.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|err| fail(format!("not UTF-8: {err}")))?;
    Ok(parse_list(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn catalog() -> CategoryCatalog {
        CategoryCatalog::new(
            parse_list("Sport\nPolityka\n\n  Nauka  \n"),
            parse_list("Sports\nPolitics\nScience\n"),
        )
    }

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        assert_eq!(catalog().categories("pl"), ["Sport", "Polityka", "Nauka"]);
        assert_eq!(catalog().categories("EN").len(), 3);
        assert!(catalog().categories("de").is_empty());
    }

    #[test]
    fn polish_names_match_case_insensitively_above_threshold() {
        let doc = meta(json!({"category": {"SPORT": 0.97, "Polityka": 0.2}}));
        let c = catalog();
        assert!(c.matches(&doc, &["sport".to_string()], 0.95, "pl"));
        assert!(!c.matches(&doc, &["Polityka".to_string()], 0.95, "pl"));
        assert!(c.matches(&doc, &["Polityka".to_string()], 0.1, "pl"));
    }

    #[test]
    fn english_names_are_translated_by_position() {
        let doc = meta(json!({"category": {"Nauka": 0.99}}));
        let c = catalog();
        assert!(c.matches(&doc, &["Science".to_string()], 0.95, "en"));
        assert!(!c.matches(&doc, &["Unknown".to_string()], 0.0, "en"));
    }

    #[test]
    fn missing_metadata_never_matches() {
        let c = catalog();
        assert!(!c.matches(&Metadata::new(), &["Sport".to_string()], 0.0, "pl"));
        assert!(!c.matches(&meta(json!({"category": {"Sport": 1.0}})), &[], 0.0, "pl"));
    }

    #[test]
    fn fetch_requires_configured_urls() {
        let transport = crate::transport::HttpTransport::default();
        let err = CategoryCatalog::fetch(&transport, &Config::default()).expect_err("should fail");
        match err {
            SpeakleashError::CategoriesUnavailable { lang, .. } => assert_eq!(lang, "pl"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
