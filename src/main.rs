mod enrich;
mod error;
mod fetch;
mod model;
mod pipeline;
mod settings;
mod sink;
mod sources;
mod strategy;
#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use enrich::{Enricher, HttpService};
use fetch::HttpFetcher;
use model::SourceDescriptor;
use pipeline::{Pipeline, RunSummary};
use settings::Settings;
use strategy::{ExtractContext, PdfExtractText, StrategyRegistry};

#[derive(Parser)]
#[command(name = "menu_scraper", about = "Restaurant menu scraper with dish tagging")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Inputs {
    /// Restaurant list (JSON array of {name, url, type})
    #[arg(long)]
    sources: Option<PathBuf>,
    /// Per-type extraction settings (JSON object keyed by type)
    #[arg(long)]
    configs: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every configured source and write the CSV
    Run {
        #[command(flatten)]
        inputs: Inputs,
        /// Output CSV path (overwritten)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pause between sources in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Validate the source list and configs without touching the network
    Check {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Scrape a single source by name and print its menu as JSON
    Probe {
        /// Display name as written in the source list
        name: String,
        #[command(flatten)]
        inputs: Inputs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run {
            inputs,
            output,
            delay_ms,
        } => {
            let sources = load_sources(&settings, &inputs)?;
            if sources.is_empty() {
                println!("No sources configured.");
            }
            let delay = delay_ms.map(Duration::from_millis).unwrap_or(settings.delay());
            let output = output.unwrap_or_else(|| settings.output_path.clone());

            let pipeline = build_pipeline(&settings, delay)?.with_progress(true);
            let summary = scrape_to_csv(&pipeline, &sources, &output).await?;

            if summary.total > 0 && summary.with_dishes == 0 {
                bail!("no source produced any dishes");
            }
            Ok(())
        }
        Commands::Check { inputs } => {
            let sources = load_sources(&settings, &inputs)?;
            let registry = StrategyRegistry::with_defaults(Arc::new(PdfExtractText));

            println!(
                "{:>3} | {:<24} | {:<14} | {:<40}",
                "#", "Restaurant", "Type", "Status"
            );
            println!("{}", "-".repeat(90));

            let mut problems = 0;
            for (i, s) in sources.iter().enumerate() {
                let status = match registry.get(&s.source_type) {
                    None => "no strategy for this type".to_string(),
                    Some(strategy) => match strategy.validate(&s.config) {
                        Ok(()) => "ok".to_string(),
                        Err(e) => e.to_string(),
                    },
                };
                if status != "ok" {
                    problems += 1;
                }
                println!(
                    "{:>3} | {:<24} | {:<14} | {}",
                    i + 1,
                    truncate(&s.display_name, 24),
                    truncate(s.source_type.key(), 14),
                    status
                );
            }

            println!("\n{} sources, {} with problems", sources.len(), problems);
            Ok(())
        }
        Commands::Probe { name, inputs } => {
            let sources = load_sources(&settings, &inputs)?;
            let source = sources
                .iter()
                .find(|s| s.display_name.eq_ignore_ascii_case(&name))
                .with_context(|| format!("No source named '{}'", name))?;

            let pipeline = build_pipeline(&settings, Duration::ZERO)?;
            let menu = pipeline.run_source(source).await?;
            println!("{}", serde_json::to_string_pretty(&menu)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_sources(settings: &Settings, inputs: &Inputs) -> anyhow::Result<Vec<SourceDescriptor>> {
    let sources_path = inputs
        .sources
        .clone()
        .unwrap_or_else(|| settings.sources_path.clone());
    let configs_path = inputs
        .configs
        .clone()
        .unwrap_or_else(|| settings.configs_path.clone());
    sources::load(&sources_path, &configs_path)
}

/// Run every source and replace `output` with the result, even when nothing was scraped.
async fn scrape_to_csv(
    pipeline: &Pipeline,
    sources: &[SourceDescriptor],
    output: &Path,
) -> anyhow::Result<RunSummary> {
    if !sources.is_empty() {
        println!("Scraping {} sources...", sources.len());
    }
    let (menus, summary) = pipeline.run(sources).await;
    let rows = sink::write_csv(output, &menus)?;

    println!(
        "Done: {} sources ({} with dishes, {} empty, {} failed, {} skipped).",
        summary.total, summary.with_dishes, summary.empty, summary.failed, summary.skipped
    );
    println!(
        "Wrote {} rows ({} dishes extracted) to {}",
        rows,
        summary.dishes,
        output.display()
    );
    Ok(summary)
}

fn build_pipeline(settings: &Settings, delay: Duration) -> anyhow::Result<Pipeline> {
    let fetcher = HttpFetcher::new(&settings.user_agent, settings.fetch_timeout())
        .context("Failed to build HTTP client")?;
    let service = HttpService::new(&settings.llm_url, settings.llm_timeout())
        .context("Failed to build enrichment client")?;

    let ctx = ExtractContext {
        fetcher: Arc::new(fetcher),
        enricher: Enricher::new(Arc::new(service), &settings.canonical_language),
    };
    let registry = StrategyRegistry::with_defaults(Arc::new(PdfExtractText));
    Ok(Pipeline::new(registry, ctx, delay))
}

/// Cut to `max` characters for the fixed-width `check` table.
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, _) => format!("{:.1}s", d.as_secs_f64()),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, s) => format!("{h}h {m}m {s}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigMap, SourceType};
    use crate::testing::{context, FakePdfText, MockFetcher, MockService};

    fn pipeline(fetcher: MockFetcher) -> Pipeline {
        let registry = StrategyRegistry::with_defaults(Arc::new(FakePdfText::default()));
        let ctx = context(Arc::new(fetcher), Arc::new(MockService::failing(500)));
        Pipeline::new(registry, ctx, Duration::ZERO)
    }

    #[tokio::test]
    async fn empty_source_list_still_replaces_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("menus.csv");
        std::fs::write(&output, "stale,row\n").unwrap();

        let summary = scrape_to_csv(&pipeline(MockFetcher::new()), &[], &output)
            .await
            .unwrap();
        assert_eq!(summary.total, 0);

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(!written.contains("stale"));
        assert_eq!(written.lines().collect::<Vec<_>>(), vec!["Restaurant,Dish,Price,Tags,Ingredients,ScrapedAt"]);
    }

    #[tokio::test]
    async fn scraped_dishes_land_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("menus.csv");
        let fetcher = MockFetcher::new().html(
            "https://b.test/",
            "<h2 class=\"elementor-heading-title\">Soup</h2>\
             <h2 class=\"elementor-heading-title\">8.50€</h2>",
        );
        let sources = vec![SourceDescriptor {
            display_name: "B".into(),
            location: "https://b.test/".into(),
            source_type: SourceType::HtmlHeadingPairs,
            config: ConfigMap::new(),
        }];

        let summary = scrape_to_csv(&pipeline(fetcher), &sources, &output)
            .await
            .unwrap();
        assert_eq!(summary.with_dishes, 1);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.lines().nth(1).unwrap().starts_with("B,Soup,8.50€,,,"));
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Can Roca", 24), "Can Roca");
        assert_eq!(truncate("Cal Pepàs", 3), "Cal...");
        assert_eq!(truncate("Ca l'Isidre", 11), "Ca l'Isidre");
    }

    #[test]
    fn durations_pick_largest_unit() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
