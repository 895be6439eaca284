use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, REFERER};

use crate::error::SourceError;

/// Raw HTTP response for a source location.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn looks_like_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("html"))
    }

    pub fn looks_like_pdf(&self) -> bool {
        self.body.starts_with(b"%PDF")
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
    }
}

pub trait Fetcher: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        referer: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage, SourceError>> + Send + 'a>>;
}

/// reqwest-backed fetcher with a browser-like identity and a request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
        referer: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let network = |e: reqwest::Error| SourceError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            };

            let mut req = self.client.get(url);
            if let Some(r) = referer {
                req = req.header(REFERER, r);
            }
            let resp = req.send().await.map_err(network)?;

            let status = resp.status().as_u16();
            let content_type = resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let final_url = resp.url().to_string();
            let body = resp.bytes().await.map_err(network)?.to_vec();

            Ok(FetchedPage {
                url: final_url,
                status,
                content_type,
                body,
            })
        })
    }
}

/// Fetch and turn any non-2xx status into [`SourceError::Unavailable`].
pub async fn fetch_ok(
    fetcher: &dyn Fetcher,
    url: &str,
    referer: Option<&str>,
) -> Result<FetchedPage, SourceError> {
    let page = fetcher.get(url, referer).await?;
    if !page.is_success() {
        return Err(SourceError::Unavailable {
            url: url.to_string(),
            status: page.status,
        });
    }
    Ok(page)
}
