use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use serde::Deserialize;

const DEFAULT_LLM_URL: &str = "http://localhost:8080/api/llm/query";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Run settings: defaults, then `menu_scraper.toml`, then `MENU_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub llm_url: String,
    pub llm_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub delay_ms: u64,
    pub user_agent: String,
    pub canonical_language: String,
    pub sources_path: PathBuf,
    pub configs_path: PathBuf,
    pub output_path: PathBuf,
}

impl Settings {
    pub fn load() -> Result<Self> {
        builder()?
            .add_source(config::File::with_name("menu_scraper").required(false))
            .add_source(config::Environment::with_prefix("MENU").try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .context("Failed to load settings")
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn builder() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("llm_url", DEFAULT_LLM_URL)?
        .set_default("llm_timeout_secs", 10_i64)?
        .set_default("fetch_timeout_secs", 30_i64)?
        .set_default("delay_ms", 2000_i64)?
        .set_default("user_agent", DEFAULT_USER_AGENT)?
        .set_default("canonical_language", "Catalan")?
        .set_default("sources_path", "urls.json")?
        .set_default("configs_path", "config.json")?
        .set_default("output_path", "menus.csv")?)
}
