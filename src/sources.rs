use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::model::{ConfigMap, SourceDescriptor, SourceType};

#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(alias = "nom")]
    name: String,
    url: String,
    #[serde(rename = "type", alias = "config")]
    source_type: SourceType,
}

/// Load the restaurant list and per-type configs, joining them into descriptors.
pub fn load(sources_path: &Path, configs_path: &Path) -> Result<Vec<SourceDescriptor>> {
    let sources_json = std::fs::read_to_string(sources_path)
        .with_context(|| format!("Failed to read {}", sources_path.display()))?;
    let configs_json = std::fs::read_to_string(configs_path)
        .with_context(|| format!("Failed to read {}", configs_path.display()))?;

    let descriptors = from_json(&sources_json, &configs_json)?;
    info!(
        "Loaded {} sources from {}",
        descriptors.len(),
        sources_path.display()
    );
    Ok(descriptors)
}

pub fn from_json(sources_json: &str, configs_json: &str) -> Result<Vec<SourceDescriptor>> {
    let entries: Vec<SourceEntry> =
        serde_json::from_str(sources_json).context("Invalid source list")?;
    let configs: HashMap<String, ConfigMap> =
        serde_json::from_str(configs_json).context("Invalid source type configs")?;

    Ok(entries
        .into_iter()
        .map(|e| {
            let config = match configs.get(e.source_type.key()) {
                Some(c) => c.clone(),
                None => {
                    warn!(
                        "No config entry for type '{}' (source {})",
                        e.source_type, e.name
                    );
                    ConfigMap::default()
                }
            };
            SourceDescriptor {
                display_name: e.name,
                location: e.url,
                source_type: e.source_type,
                config,
            }
        })
        .collect())
}
