use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::{
    compile_pattern, flatten_text, name_and_price, parse_selector, ExtractContext, ExtractFuture,
    Strategy,
};
use crate::error::SourceError;
use crate::fetch::fetch_ok;
use crate::model::{ConfigMap, DishRecord};

/// Menu laid out as a list of items inside one container, each item holding "name ... price".
pub struct HtmlListStrategy;

struct ListSettings {
    container: Selector,
    item: Selector,
    pattern: Regex,
    detail_class: Option<String>,
}

impl ListSettings {
    fn from_config(config: &ConfigMap) -> Result<Self, SourceError> {
        let container = parse_selector(
            "container_selector",
            config.require("container_selector")?,
        )?;
        let item = parse_selector("item_selector", config.require("item_selector")?)?;
        let pattern = compile_pattern(config, "plat_preu_regex")?;
        let detail_class = config
            .get_any(&["detail_class", "span_detall_class"])
            .map(|c| c.trim().trim_start_matches('.').to_string());
        Ok(ListSettings {
            container,
            item,
            pattern,
            detail_class,
        })
    }
}

/// A matched item: name (plus detail text) and price, before enrichment.
#[derive(Debug, PartialEq)]
struct ListCandidate {
    text: String,
    price: String,
}

impl Strategy for HtmlListStrategy {
    fn name(&self) -> &str {
        "html_list"
    }

    fn validate(&self, config: &ConfigMap) -> Result<(), SourceError> {
        ListSettings::from_config(config).map(|_| ())
    }

    fn extract<'a>(
        &'a self,
        location: &'a str,
        config: &'a ConfigMap,
        ctx: &'a ExtractContext,
    ) -> ExtractFuture<'a> {
        Box::pin(async move {
            let settings = ListSettings::from_config(config)?;
            let page = fetch_ok(ctx.fetcher.as_ref(), location, config.get("referer")).await?;
            let candidates = collect_candidates(&page.text(), &settings, location);
            info!("{} list items matched at {}", candidates.len(), location);

            let mut dishes = Vec::with_capacity(candidates.len());
            for c in candidates {
                let (tags, ingredients) = ctx.enricher.extract_tags_and_ingredients(&c.text).await;
                dishes.push(DishRecord::new(c.text, c.price, tags, ingredients));
            }
            Ok(dishes)
        })
    }
}

fn collect_candidates(html: &str, settings: &ListSettings, location: &str) -> Vec<ListCandidate> {
    let doc = Html::parse_document(html);

    let Some(container) = doc.select(&settings.container).next() else {
        warn!("Menu container not found at {}", location);
        return Vec::new();
    };

    let mut out = Vec::new();
    for item in container.select(&settings.item) {
        let text = flatten_text(&item, " ");
        let Some((name, price)) = settings
            .pattern
            .captures(&text)
            .and_then(|caps| name_and_price(&caps))
        else {
            warn!("No name/price match in item: {}", text);
            continue;
        };

        let detail = settings
            .detail_class
            .as_deref()
            .and_then(|class| find_detail(&item, class))
            .unwrap_or_default();
        let full = format!("{} {}", name, detail).trim().to_string();
        debug!("Candidate '{}' at {}", full, price);

        out.push(ListCandidate { text: full, price });
    }
    out
}

/// Text of the first descendant element carrying `class`.
fn find_detail(item: &ElementRef<'_>, class: &str) -> Option<String> {
    item.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|c| c == class))
        .map(|el| flatten_text(&el, " "))
        .filter(|t| !t.is_empty())
}
