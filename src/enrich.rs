use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EnrichmentError;

/// First `{` through last `}`: the service likes to wrap its JSON in prose or code fences.
static JSON_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Remote text-understanding capability: prompt in, free-text answer out.
pub trait UnderstandingService: Send + Sync {
    fn ask<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>>;
}

#[derive(Serialize)]
struct Query<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    answer: String,
}

/// `POST {"prompt": ..}` → `{"answer": ..}` over HTTP.
pub struct HttpService {
    client: reqwest::Client,
    url: String,
}

impl HttpService {
    pub fn new(url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpService {
            client,
            url: url.to_string(),
        })
    }
}

impl UnderstandingService for HttpService {
    fn ask<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(&self.url)
                .json(&Query { prompt })
                .send()
                .await?;

            let status = resp.status();
            if status.as_u16() != 200 {
                return Err(EnrichmentError::Status(status.as_u16()));
            }

            let reply: Reply = resp.json().await?;
            Ok(reply.answer)
        })
    }
}

#[derive(Deserialize)]
struct TagPayload {
    tags: Vec<String>,
    ingredients: Vec<String>,
}

/// Tagging and name normalization on top of an [`UnderstandingService`].
///
/// Every failure here is soft: callers get empty values and a log line, never an error.
pub struct Enricher {
    service: Arc<dyn UnderstandingService>,
    language: String,
}

impl Enricher {
    pub fn new(service: Arc<dyn UnderstandingService>, language: &str) -> Self {
        Enricher {
            service,
            language: language.to_string(),
        }
    }

    /// Ask for tags and main ingredients of a dish. `([], [])` when anything goes wrong.
    pub async fn extract_tags_and_ingredients(&self, dish_text: &str) -> (Vec<String>, Vec<String>) {
        let prompt = tags_prompt(dish_text);
        let result = match self.service.ask(&prompt).await {
            Ok(answer) => parse_tags_answer(&answer),
            Err(e) => Err(e),
        };

        match result {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Enrichment unavailable for '{}': {}", dish_text, e);
                (Vec::new(), Vec::new())
            }
        }
    }

    /// Canonical single-language dish name, or `""` when the service fails.
    ///
    /// The empty string is a sentinel for "normalization unavailable", not a valid name.
    pub async fn normalize_dish_name(&self, raw_name: &str) -> String {
        let prompt = normalize_prompt(raw_name, &self.language);
        match self.service.ask(&prompt).await {
            Ok(answer) => {
                let name = answer.trim().to_string();
                debug!("Normalized '{}' -> '{}'", raw_name, name);
                name
            }
            Err(e) => {
                warn!("Normalization unavailable for '{}': {}", raw_name, e);
                String::new()
            }
        }
    }
}

fn tags_prompt(dish_text: &str) -> String {
    format!(
        "You are a gastronomy expert. Analyse the following dish and produce a list of relevant tags:\n\
         - Category (starter, main course, dessert, etc.)\n\
         - Kind of dish (soup, salad, meat, fish, pasta, etc.)\n\
         - Main ingredients\n\
         - Diet (vegan, vegetarian, gluten free, etc.)\n\n\
         Return only a JSON object with a key \"tags\" holding a list of strings and a key \
         \"ingredients\" holding the main ingredients as a list of strings.\n\n\
         Dish: \"{}\"",
        dish_text
    )
}

fn normalize_prompt(raw_name: &str, language: &str) -> String {
    format!(
        "You are a gastronomy expert. Normalize the name of the following dish into a single \
         language ({language}).\n\
         Remove unnecessary words, duplicates and fragments in other languages.\n\
         Do not change the meaning of the dish, and make sure nothing is lost or added when \
         translating.\n\
         Reply with the normalized name only.\n\n\
         Dish: \"{raw_name}\""
    )
}

/// Pull `{"tags": [..], "ingredients": [..]}` out of a free-text answer.
fn parse_tags_answer(answer: &str) -> Result<(Vec<String>, Vec<String>), EnrichmentError> {
    let span = JSON_SPAN_RE
        .find(answer)
        .ok_or_else(|| EnrichmentError::Malformed("no JSON object in answer".into()))?;
    let payload: TagPayload = serde_json::from_str(span.as_str())
        .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;
    Ok((payload.tags, payload.ingredients))
}
