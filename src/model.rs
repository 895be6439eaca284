use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Extraction strategy key for a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    HtmlList,
    HtmlHeadingPairs,
    Pdf,
    Other(String),
}

impl SourceType {
    pub fn key(&self) -> &str {
        match self {
            SourceType::HtmlList => "html_list",
            SourceType::HtmlHeadingPairs => "heading_pairs",
            SourceType::Pdf => "pdf",
            SourceType::Other(key) => key,
        }
    }
}

impl From<String> for SourceType {
    fn from(key: String) -> Self {
        let known = match key.trim() {
            "html_list" => Some(SourceType::HtmlList),
            "heading_pairs" => Some(SourceType::HtmlHeadingPairs),
            "pdf" => Some(SourceType::Pdf),
            _ => None,
        };
        known.unwrap_or(SourceType::Other(key))
    }
}

impl From<SourceType> for String {
    fn from(t: SourceType) -> Self {
        t.key().to_string()
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-source settings: selectors, patterns and optional extras.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(BTreeMap<String, String>);

impl ConfigMap {
    /// Optional key. Blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// First present key among `key` and its legacy aliases.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn require(&self, key: &str) -> Result<&str, SourceError> {
        self.get(key)
            .ok_or_else(|| SourceError::ConfigIncomplete { key: key.to_string() })
    }
}

#[cfg(test)]
impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

/// One restaurant menu to scrape.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub display_name: String,
    pub location: String,
    pub source_type: SourceType,
    pub config: ConfigMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DishRecord {
    pub name: String,
    pub price: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub extracted_at: DateTime<Utc>,
}

impl DishRecord {
    pub fn new(name: String, price: String, tags: Vec<String>, ingredients: Vec<String>) -> Self {
        DishRecord {
            name,
            price,
            tags,
            ingredients,
            extracted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuResult {
    pub restaurant_name: String,
    pub dishes: Vec<DishRecord>,
}

pub type AggregateResult = Vec<MenuResult>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_keys() {
        assert_eq!(SourceType::from("pdf".to_string()), SourceType::Pdf);
        assert_eq!(SourceType::from("html_list".to_string()), SourceType::HtmlList);
        assert_eq!(
            SourceType::from("heading_pairs".to_string()),
            SourceType::HtmlHeadingPairs
        );
        let other = SourceType::from("selenium".to_string());
        assert_eq!(other, SourceType::Other("selenium".into()));
        assert_eq!(other.key(), "selenium");
    }

    #[test]
    fn blank_config_value_is_missing() {
        let cfg = ConfigMap::new().with("item_selector", "  ");
        assert!(cfg.get("item_selector").is_none());
        assert!(matches!(
            cfg.require("item_selector"),
            Err(SourceError::ConfigIncomplete { key }) if key == "item_selector"
        ));
    }

    #[test]
    fn alias_lookup_prefers_first_key() {
        let cfg = ConfigMap::new()
            .with("span_detall_class", "legacy")
            .with("detail_class", "desc");
        assert_eq!(cfg.get_any(&["detail_class", "span_detall_class"]), Some("desc"));
        let legacy = ConfigMap::new().with("span_detall_class", "legacy");
        assert_eq!(legacy.get_any(&["detail_class", "span_detall_class"]), Some("legacy"));
    }
}
