//! One catalog entry and typed views over its free-form fields.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Quality bucket advertised for a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityLevel {
    High,
    Medium,
    Low,
}

impl QualityLevel {
    /// Manifest keys in priority order.
    const ORDER: [(&'static str, QualityLevel); 3] = [
        ("HIGH", QualityLevel::High),
        ("MEDIUM", QualityLevel::Medium),
        ("LOW", QualityLevel::Low),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::High => "HIGH",
            QualityLevel::Medium => "MEDIUM",
            QualityLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset as listed in the catalog. Read-only once parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetDescriptor {
    pub name: String,
    pub documents: u64,
    pub characters: u64,
    /// Where the archive is downloaded from.
    pub url: String,
    /// Declared archive size in bytes; `0` means unknown.
    pub file_size: u64,
    /// Lowercase hex SHA-256 of the archive, when published.
    pub sha256: Option<String>,
    /// The catalog entry exactly as received.
    pub manifest: Map<String, Value>,
}

impl DatasetDescriptor {
    /// Builds a descriptor from a catalog entry.
    ///
    /// Returns `None` when the entry has no string `name`. `default_url` is
    /// used when the entry does not carry its own `url`.
    pub fn from_entry(entry: Map<String, Value>, default_url: impl FnOnce(&str) -> String) -> Option<Self> {
        let name = entry.get("name")?.as_str()?.to_string();
        let stats = entry.get("stats").and_then(Value::as_object);
        let stat = |key: &str| stats.and_then(|s| s.get(key)).and_then(Value::as_u64).unwrap_or(0);

        let url = entry
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default_url(&name));
        let sha256 = entry
            .get("sha256")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase);

        Some(Self {
            documents: stat("documents"),
            characters: stat("characters"),
            file_size: entry.get("file_size").and_then(Value::as_u64).unwrap_or(0),
            url,
            sha256,
            name,
            manifest: entry,
        })
    }

    fn stats(&self) -> Option<&Map<String, Value>> {
        self.manifest.get("stats").and_then(Value::as_object)
    }

    fn text_field(&self, key: &str) -> &str {
        self.manifest.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Reads a numeric entry of the `stats` object, `0` when absent.
    pub fn stat(&self, key: &str) -> u64 {
        self.stats()
            .and_then(|stats| stats.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn description(&self) -> &str {
        self.text_field("description")
    }

    pub fn license(&self) -> &str {
        self.text_field("license")
    }

    /// Primary category of the dataset.
    pub fn category(&self) -> &str {
        self.text_field("category")
    }

    /// Upstream sources the dataset was derived from.
    pub fn sources(&self) -> Vec<Value> {
        match self.manifest.get("sources") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(map)) => map.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn stopwords(&self) -> u64 {
        self.stat("stopwords")
    }

    pub fn nouns(&self) -> u64 {
        self.stat("nouns")
    }

    pub fn verbs(&self) -> u64 {
        self.stat("verbs")
    }

    pub fn symbols(&self) -> u64 {
        self.stat("symbols")
    }

    pub fn punctuations(&self) -> u64 {
        self.stat("punctuations")
    }

    pub fn sentences(&self) -> u64 {
        self.stat("sentences")
    }

    pub fn words(&self) -> u64 {
        self.stat("words")
    }

    /// Share of documents per quality bucket.
    pub fn quality(&self) -> BTreeMap<String, f64> {
        self.stats()
            .and_then(|stats| stats.get("quality"))
            .map(number_map)
            .unwrap_or_default()
    }

    /// Highest quality bucket with a non-zero share.
    pub fn quality_metrics(&self) -> Option<QualityLevel> {
        let quality = self.quality();
        QualityLevel::ORDER
            .iter()
            .find(|(key, _)| quality.get(*key).is_some_and(|share| *share != 0.0))
            .map(|(_, level)| *level)
    }

    /// Categories covering at least 95% confidence, with their shares.
    pub fn categories(&self) -> BTreeMap<String, f64> {
        self.manifest
            .get("category=95%")
            .map(number_map)
            .unwrap_or_default()
    }

    /// True when any confident category has a positive share.
    pub fn categorization(&self) -> bool {
        self.categories().values().any(|share| *share > 0.0)
    }
}

fn number_map(value: &Value) -> BTreeMap<String, f64> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| value.as_f64().map(|number| (key.clone(), number)))
                .collect()
        })
        .unwrap_or_default()
}
