//! Hand-rolled test doubles for the network and PDF seams.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::enrich::{Enricher, UnderstandingService};
use crate::error::{EnrichmentError, SourceError};
use crate::fetch::{FetchedPage, Fetcher};
use crate::strategy::{ExtractContext, PdfText};

/// Serves canned pages by URL; anything unknown is a 404.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, FetchedPage>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_page(mut self, url: &str, status: u16, content_type: &str, body: &[u8]) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                url: url.to_string(),
                status,
                content_type: Some(content_type.to_string()),
                body: body.to_vec(),
            },
        );
        self
    }

    pub fn html(self, url: &str, body: &str) -> Self {
        self.with_page(url, 200, "text/html; charset=utf-8", body.as_bytes())
    }

    pub fn pdf(self, url: &str, body: &[u8]) -> Self {
        self.with_page(url, 200, "application/pdf", body)
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.with_page(url, status, "text/html", b"")
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
        _referer: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedPage, SourceError>> + Send + 'a>> {
        self.calls.lock().unwrap().push(url.to_string());
        let page = self.pages.get(url).cloned().unwrap_or_else(|| FetchedPage {
            url: url.to_string(),
            status: 404,
            content_type: None,
            body: Vec::new(),
        });
        Box::pin(async move { Ok(page) })
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, EnrichmentError> + Send + Sync>;

/// Answers prompts through a closure and records every prompt it saw.
pub struct MockService {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl MockService {
    pub fn from_fn(
        f: impl Fn(&str) -> Result<String, EnrichmentError> + Send + Sync + 'static,
    ) -> Self {
        MockService {
            responder: Box::new(f),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(answer: &str) -> Self {
        let answer = answer.to_string();
        Self::from_fn(move |_| Ok(answer.clone()))
    }

    pub fn failing(status: u16) -> Self {
        Self::from_fn(move |_| Err(EnrichmentError::Status(status)))
    }

    pub fn unreachable() -> Self {
        Self::from_fn(|_| Err(EnrichmentError::Transport("connection refused".into())))
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl UnderstandingService for MockService {
    fn ask<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let result = (self.responder)(prompt);
        Box::pin(async move { result })
    }
}

/// Treats the temp file as UTF-8 text with form feeds between pages.
#[derive(Default)]
pub struct FakePdfText {
    fail: bool,
    seen: Mutex<Vec<PathBuf>>,
}

impl FakePdfText {
    pub fn failing() -> Self {
        FakePdfText {
            fail: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Paths handed to the backend, in call order.
    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl PdfText for FakePdfText {
    fn pages(&self, path: &Path) -> Result<Vec<String>, SourceError> {
        self.seen.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(SourceError::Pdf("unsupported encryption".into()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(text.split('\x0c').map(str::to_string).collect())
    }
}

pub fn context(fetcher: Arc<dyn Fetcher>, service: Arc<dyn UnderstandingService>) -> ExtractContext {
    ExtractContext {
        fetcher,
        enricher: Enricher::new(service, "Catalan"),
    }
}

/// Raw HTTP/1.1 response with a body and `Connection: close`.
pub fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Loopback server that answers one connection per canned response, in order.
///
/// Returns the base URL and a handle yielding the raw requests it received.
pub async fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut stream).await);
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        }
        requests
    });
    (base, handle)
}

/// Head plus `Content-Length` bytes of body.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
