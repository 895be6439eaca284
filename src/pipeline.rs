use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::SourceError;
use crate::model::{AggregateResult, MenuResult, SourceDescriptor};
use crate::strategy::{ExtractContext, StrategyRegistry};

/// Per-run counts, one bucket per source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub with_dishes: usize,
    pub empty: usize,
    pub failed: usize,
    pub skipped: usize,
    pub dishes: usize,
}

/// Walks the configured sources one at a time and aggregates their menus.
pub struct Pipeline {
    registry: StrategyRegistry,
    ctx: ExtractContext,
    delay: Duration,
    progress: bool,
}

impl Pipeline {
    pub fn new(registry: StrategyRegistry, ctx: ExtractContext, delay: Duration) -> Self {
        Pipeline {
            registry,
            ctx,
            delay,
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Extract one source with its registered strategy.
    pub async fn run_source(&self, source: &SourceDescriptor) -> Result<MenuResult, SourceError> {
        let strategy = self
            .registry
            .get(&source.source_type)
            .ok_or_else(|| SourceError::UnknownSourceType(source.source_type.clone()))?;

        info!(
            "Scraping {} ({}) with {}...",
            source.display_name,
            source.location,
            strategy.name()
        );
        let dishes = strategy
            .extract(&source.location, &source.config, &self.ctx)
            .await?;

        Ok(MenuResult {
            restaurant_name: source.display_name.clone(),
            dishes,
        })
    }

    /// Run every source in order. Failures stay with their source; the run always finishes.
    ///
    /// Sources that were actually contacted are spaced by `delay`, failures included.
    /// Unknown source types are skipped without a request, so they add no delay.
    pub async fn run(&self, sources: &[SourceDescriptor]) -> (AggregateResult, RunSummary) {
        let pb = if self.progress {
            let pb = ProgressBar::new(sources.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("=> "));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut menus = AggregateResult::new();
        let mut summary = RunSummary {
            total: sources.len(),
            ..Default::default()
        };
        let mut contacted_any = false;

        for source in sources {
            pb.set_message(source.display_name.clone());

            if self.registry.get(&source.source_type).is_none() {
                warn!(
                    "No strategy for type '{}', skipping {}",
                    source.source_type, source.display_name
                );
                summary.skipped += 1;
                pb.inc(1);
                continue;
            }

            if contacted_any && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            contacted_any = true;

            match self.run_source(source).await {
                Ok(menu) if menu.dishes.is_empty() => {
                    info!("No data found for {}", source.display_name);
                    summary.empty += 1;
                }
                Ok(menu) => {
                    info!(
                        "{}: {} dishes",
                        menu.restaurant_name,
                        menu.dishes.len()
                    );
                    summary.with_dishes += 1;
                    summary.dishes += menu.dishes.len();
                    menus.push(menu);
                }
                Err(e) => {
                    warn!("[{}] {}: {}", source.display_name, source.location, e);
                    summary.failed += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            "Run finished: {} sources, {} with dishes, {} empty, {} failed, {} skipped",
            summary.total, summary.with_dishes, summary.empty, summary.failed, summary.skipped
        );
        (menus, summary)
    }
}
