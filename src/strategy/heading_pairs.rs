use std::mem;

use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::{flatten_text, parse_selector, ExtractContext, ExtractFuture, Strategy};
use crate::error::SourceError;
use crate::fetch::fetch_ok;
use crate::model::{ConfigMap, DishRecord};

const DEFAULT_HEADING_SELECTOR: &str = "h2.elementor-heading-title";
const DEFAULT_CURRENCY_MARKER: &str = "€";

/// Menu written as a run of headings: name, optional description lines, then a price line.
pub struct HeadingPairsStrategy;

/// Dish being assembled from consecutive headings.
#[derive(Debug, Default, PartialEq)]
enum Accumulator {
    #[default]
    Empty,
    Named {
        name: String,
        description: Vec<String>,
    },
}

/// Name and description joined, with the price line that closed them.
#[derive(Debug, PartialEq)]
pub(crate) struct PendingDish {
    pub text: String,
    pub price: String,
}

impl Accumulator {
    /// Feed one heading. Returns a dish when `line` is a price line closing a named dish.
    fn feed(&mut self, line: &str, marker: &str) -> Option<PendingDish> {
        if line.ends_with(marker) {
            return match mem::take(self) {
                Accumulator::Named { name, description } => {
                    let mut parts = vec![name];
                    parts.extend(description);
                    Some(PendingDish {
                        text: parts.join(" ").trim().to_string(),
                        price: line.to_string(),
                    })
                }
                Accumulator::Empty => {
                    warn!("Price line '{}' has no dish name before it, skipped", line);
                    None
                }
            };
        }

        *self = match mem::take(self) {
            Accumulator::Empty => Accumulator::Named {
                name: line.to_string(),
                description: Vec::new(),
            },
            Accumulator::Named {
                name,
                mut description,
            } => {
                description.push(line.to_string());
                Accumulator::Named { name, description }
            }
        };
        None
    }
}

/// Run the accumulator over headings in document order.
///
/// A dish still open when the headings run out never saw its price line and is dropped
/// without a report.
pub(crate) fn pair_headings(lines: &[String], marker: &str) -> Vec<PendingDish> {
    let mut acc = Accumulator::default();
    let mut out = Vec::new();
    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if let Some(dish) = acc.feed(line, marker) {
            out.push(dish);
        }
    }
    if let Accumulator::Named { name, .. } = &acc {
        debug!("Discarding unpriced trailing dish '{}'", name);
    }
    out
}

struct HeadingSettings {
    selector: Selector,
    marker: String,
}

impl HeadingSettings {
    fn from_config(config: &ConfigMap) -> Result<Self, SourceError> {
        let raw = config
            .get("heading_selector")
            .unwrap_or(DEFAULT_HEADING_SELECTOR);
        Ok(HeadingSettings {
            selector: parse_selector("heading_selector", raw)?,
            marker: config
                .get("currency_marker")
                .unwrap_or(DEFAULT_CURRENCY_MARKER)
                .trim()
                .to_string(),
        })
    }
}

/// Text of each heading with its nodes glued together, so `8.50<span>€</span>` stays `8.50€`.
fn heading_texts(html: &str, selector: &Selector) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(selector).map(|h| flatten_text(&h, "")).collect()
}

impl Strategy for HeadingPairsStrategy {
    fn name(&self) -> &str {
        "heading_pairs"
    }

    fn validate(&self, config: &ConfigMap) -> Result<(), SourceError> {
        HeadingSettings::from_config(config).map(|_| ())
    }

    fn extract<'a>(
        &'a self,
        location: &'a str,
        config: &'a ConfigMap,
        ctx: &'a ExtractContext,
    ) -> ExtractFuture<'a> {
        Box::pin(async move {
            let settings = HeadingSettings::from_config(config)?;
            let page = fetch_ok(ctx.fetcher.as_ref(), location, config.get("referer")).await?;
            let headings = heading_texts(&page.text(), &settings.selector);
            if headings.is_empty() {
                warn!("No headings matched at {}", location);
                return Ok(Vec::new());
            }

            let pending = pair_headings(&headings, &settings.marker);
            info!(
                "{} headings paired into {} dishes at {}",
                headings.len(),
                pending.len(),
                location
            );

            let mut dishes = Vec::with_capacity(pending.len());
            for p in pending {
                let normalized = ctx.enricher.normalize_dish_name(&p.text).await;
                let name = if normalized.is_empty() {
                    p.text
                } else {
                    normalized
                };
                info!("Processing dish: {}", name);
                let (tags, ingredients) = ctx.enricher.extract_tags_and_ingredients(&name).await;
                dishes.push(DishRecord::new(name, p.price, tags, ingredients));
            }
            Ok(dishes)
        })
    }
}
