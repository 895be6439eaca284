pub mod heading_pairs;
pub mod html_list;
pub mod pdf;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::enrich::Enricher;
use crate::error::SourceError;
use crate::fetch::Fetcher;
use crate::model::{ConfigMap, DishRecord, SourceType};

pub use heading_pairs::HeadingPairsStrategy;
pub use html_list::HtmlListStrategy;
pub use pdf::{PdfExtractText, PdfStrategy, PdfText};

pub type ExtractFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<DishRecord>, SourceError>> + Send + 'a>>;

/// Collaborators shared by every strategy for the length of a run.
pub struct ExtractContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub enricher: Enricher,
}

/// One way of turning a source location into dish records.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Check the config without touching the network.
    fn validate(&self, config: &ConfigMap) -> Result<(), SourceError>;

    fn extract<'a>(
        &'a self,
        location: &'a str,
        config: &'a ConfigMap,
        ctx: &'a ExtractContext,
    ) -> ExtractFuture<'a>;
}

/// Strategies keyed by source type. Adding a source shape is one `register` call.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<SourceType, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(pdf_backend: Arc<dyn PdfText>) -> Self {
        let mut registry = Self::new();
        registry.register(SourceType::HtmlList, Arc::new(HtmlListStrategy));
        registry.register(SourceType::HtmlHeadingPairs, Arc::new(HeadingPairsStrategy));
        registry.register(SourceType::Pdf, Arc::new(PdfStrategy::new(pdf_backend)));
        registry
    }

    pub fn register(&mut self, source_type: SourceType, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(source_type, strategy);
    }

    pub fn get(&self, source_type: &SourceType) -> Option<&Arc<dyn Strategy>> {
        self.strategies.get(source_type)
    }
}

/// Compile a name/price pattern; it needs at least two capture groups.
pub(crate) fn compile_pattern(config: &ConfigMap, key: &str) -> Result<Regex, SourceError> {
    let raw = config.require(key)?;
    let re = Regex::new(raw).map_err(|e| SourceError::InvalidConfig {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    if re.captures_len() < 3 {
        return Err(SourceError::InvalidConfig {
            key: key.to_string(),
            reason: "pattern needs a name group and a price group".into(),
        });
    }
    Ok(re)
}

pub(crate) fn parse_selector(key: &str, raw: &str) -> Result<Selector, SourceError> {
    Selector::parse(raw).map_err(|e| SourceError::InvalidConfig {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Trimmed text nodes of an element joined by `sep`.
pub(crate) fn flatten_text(el: &ElementRef<'_>, sep: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Group 1 and 2 of a match, trimmed.
pub(crate) fn name_and_price(caps: &regex::Captures<'_>) -> Option<(String, String)> {
    let name = caps.get(1)?.as_str().trim().to_string();
    let price = caps.get(2)?.as_str().trim().to_string();
    Some((name, price))
}
