// Single page fetch with a browser-like request profile

use crate::error::{Result, ScanError};
use crate::proxy::{ProxyEndpoint, ProxyPool};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENTS: [&str; 9] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

const BROWSER_HEADERS: [(&str, &str); 11] = [
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate, br"),
    ("dnt", "1"),
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("cache-control", "max-age=0"),
];

const CHROME_VERSIONS: [&str; 4] = ["120.0.0.0", "119.0.0.0", "118.0.0.0", "117.0.0.0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            max_body_bytes: 5 * 1024 * 1024,
            max_redirects: 10,
        }
    }
}

/// Classified result of one attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    Success { final_url: String, body: String },
    HttpError { status: u16 },
    Failed(ScanError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Whether the proxy that carried this attempt behaved.
    fn proxy_succeeded(&self) -> bool {
        match self {
            FetchOutcome::Success { .. } => true,
            FetchOutcome::HttpError { status } => *status != 407 && *status < 500,
            FetchOutcome::Failed(_) => false,
        }
    }
}

/// Anything that can fetch a page, optionally through a proxy.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> FetchOutcome;
}

/// reqwest-backed fetcher. Keeps one client for direct connections and one per proxy.
pub struct HttpFetcher {
    config: FetchConfig,
    direct: Client,
    proxied: DashMap<ProxyEndpoint, Client>,
    pool: Arc<ProxyPool>,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig, pool: Arc<ProxyPool>) -> Result<Self> {
        let direct = build_client(&config, None)?;
        Ok(Self {
            config,
            direct,
            proxied: DashMap::new(),
            pool,
        })
    }

    pub fn config(&self) -> FetchConfig {
        self.config
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };
        if let Some(client) = self.proxied.get(proxy) {
            return Ok(client.value().clone());
        }
        let client = build_client(&self.config, Some(proxy))?;
        self.proxied.insert(proxy.clone(), client.clone());
        Ok(client)
    }

    async fn fetch_once(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> Result<FetchOutcome> {
        let parsed = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        let client = self.client_for(proxy)?;

        let mut request = client
            .get(parsed)
            .header(USER_AGENT, random_user_agent());
        if fastrand::bool() {
            request = request.header("sec-ch-ua", random_sec_ch_ua());
        }

        let mut response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!("{} answered {}", url, status.as_u16());
            return Ok(FetchOutcome::HttpError {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            let room = self.config.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!("Body of {} truncated at {} bytes", url, self.config.max_body_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchOutcome::Success {
            final_url,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    fn classify(&self, error: reqwest::Error) -> ScanError {
        if error.is_timeout() {
            ScanError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            ScanError::Network(error)
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> FetchOutcome {
        let outcome = match self.fetch_once(url, proxy).await {
            Ok(outcome) => outcome,
            Err(e) => FetchOutcome::Failed(e),
        };

        if let Some(proxy) = proxy {
            self.pool.record_outcome(proxy, outcome.proxy_succeeded());
        }

        outcome
    }
}

fn build_client(config: &FetchConfig, proxy: Option<&ProxyEndpoint>) -> Result<Client> {
    let mut builder = Client::builder()
        .default_headers(browser_headers())
        .timeout(config.timeout)
        .connect_timeout(config.timeout / 2)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .cookie_store(true)
        .pool_idle_timeout(Duration::from_secs(90));

    builder = match proxy {
        Some(endpoint) => {
            let mut proxy = reqwest::Proxy::all(endpoint.proxy_url())?;
            if let (Some(username), Some(password)) = (&endpoint.username, &endpoint.password) {
                proxy = proxy.basic_auth(username, password);
            }
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    Ok(builder.build()?)
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in BROWSER_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

fn random_sec_ch_ua() -> String {
    let version = CHROME_VERSIONS[fastrand::usize(..CHROME_VERSIONS.len())];
    format!(
        r#""Not_A Brand";v="8", "Chromium";v="{0}", "Google Chrome";v="{0}""#,
        version
    )
}
