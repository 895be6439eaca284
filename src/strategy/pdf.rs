use std::io::Write;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::{compile_pattern, name_and_price, ExtractContext, ExtractFuture, Strategy};
use crate::error::SourceError;
use crate::fetch::{fetch_ok, FetchedPage};
use crate::model::{ConfigMap, DishRecord};

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static EMBED_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("object[data], embed[src], iframe[src]").unwrap());

/// Page-ordered text of a PDF on disk.
pub trait PdfText: Send + Sync {
    fn pages(&self, path: &Path) -> Result<Vec<String>, SourceError>;
}

/// [`PdfText`] backed by the pure-Rust `pdf-extract` crate.
pub struct PdfExtractText;

impl PdfText for PdfExtractText {
    fn pages(&self, path: &Path) -> Result<Vec<String>, SourceError> {
        pdf_extract::extract_text_by_pages(path).map_err(|e| SourceError::Pdf(e.to_string()))
    }
}

/// Menu published as a PDF, one "name  price" per text line.
pub struct PdfStrategy {
    backend: Arc<dyn PdfText>,
}

impl PdfStrategy {
    pub fn new(backend: Arc<dyn PdfText>) -> Self {
        PdfStrategy { backend }
    }

    /// Write the document to a temp file and read its text page by page.
    ///
    /// The temp file is deleted when this returns, on every path.
    async fn document_text(&self, bytes: &[u8]) -> Result<String, SourceError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("menu-")
            .suffix(".pdf")
            .tempfile()?;
        tmp.write_all(bytes)?;
        tmp.flush()?;

        let path = tmp.path().to_path_buf();
        let backend = Arc::clone(&self.backend);
        let pages = tokio::task::spawn_blocking(move || backend.pages(&path))
            .await
            .map_err(|e| SourceError::Pdf(format!("extraction task failed: {}", e)))??;

        debug!("Read {} pages from {}", pages.len(), tmp.path().display());
        Ok(pages.join("\n"))
    }
}

impl Strategy for PdfStrategy {
    fn name(&self) -> &str {
        "pdf"
    }

    fn validate(&self, config: &ConfigMap) -> Result<(), SourceError> {
        compile_pattern(config, "plat_preu_regex").map(|_| ())
    }

    fn extract<'a>(
        &'a self,
        location: &'a str,
        config: &'a ConfigMap,
        ctx: &'a ExtractContext,
    ) -> ExtractFuture<'a> {
        Box::pin(async move {
            let pattern = compile_pattern(config, "plat_preu_regex")?;
            let referer = config.get("referer");

            let mut page = fetch_ok(ctx.fetcher.as_ref(), location, referer).await?;
            if is_wrapper_page(&page) {
                let pdf_url = find_pdf_link(&page.text(), &page.url)
                    .ok_or_else(|| SourceError::NoPdfLink(location.to_string()))?;
                info!("Found PDF menu behind {}: {}", location, pdf_url);
                page = fetch_ok(ctx.fetcher.as_ref(), &pdf_url, referer).await?;
            }

            let text = self.document_text(&page.body).await?;
            let matched = match_lines(&text, &pattern);
            info!("{} PDF lines matched at {}", matched.len(), location);

            let mut dishes = Vec::with_capacity(matched.len());
            for (name, price) in matched {
                let (tags, ingredients) = ctx.enricher.extract_tags_and_ingredients(&name).await;
                dishes.push(DishRecord::new(name, price, tags, ingredients));
            }
            Ok(dishes)
        })
    }
}

fn is_wrapper_page(page: &FetchedPage) -> bool {
    !page.looks_like_pdf()
        && (page.looks_like_html() || page.text().trim_start().starts_with('<'))
}

/// Name/price pairs for lines matching `pattern` at their start, in line order.
fn match_lines(text: &str, pattern: &Regex) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let hit = pattern
            .captures(line)
            .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))
            .and_then(|caps| name_and_price(&caps));
        match hit {
            Some(pair) => out.push(pair),
            None => warn!("No name/price match in PDF line: {}", line),
        }
    }
    out
}

/// First link to a `.pdf` in a wrapper page: anchors first, then embedded objects.
fn find_pdf_link(html: &str, base_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    let anchors = doc
        .select(&ANCHOR_SEL)
        .filter_map(|el| el.value().attr("href"));
    let embedded = doc.select(&EMBED_SEL).filter_map(|el| {
        let v = el.value();
        v.attr("data").or_else(|| v.attr("src"))
    });

    let raw = anchors
        .chain(embedded)
        .map(str::trim)
        .find(|href| is_pdf_href(href))?;

    match Url::parse(base_url).and_then(|base| base.join(raw)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(raw.to_string()),
    }
}

fn is_pdf_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".pdf")
}
