use crate::config::CrawlOptions;
use crate::people::{InferenceClient, NameDatabase};
use crate::pipeline::ExtractionPipeline;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trawler_scanner::error::Result;
use trawler_scanner::{
    CrawlResult, DomainThrottle, FetchOutcome, HttpFetcher, PageFetcher, ProxyPool,
    RetryOrchestrator, ScanError,
};
use url::Url;

/// Query parameters that only track where a visitor came from.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ref", "source"];

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callback for reporting individual crawl results as they come in
pub type CrawlResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

/// Fetches a list of URLs with bounded concurrency and extracts contacts
/// from each page. One result per input URL, in input order.
pub struct CrawlOrchestrator {
    options: CrawlOptions,
    pool: Arc<ProxyPool>,
    throttle: Arc<DomainThrottle>,
    fetcher: Arc<dyn PageFetcher>,
    pipeline: Arc<ExtractionPipeline>,
    cancel: CancellationToken,
    progress_callback: Option<CrawlProgressCallback>,
    result_callback: Option<CrawlResultCallback>,
}

impl CrawlOrchestrator {
    pub fn new(
        options: CrawlOptions,
        names: Arc<NameDatabase>,
        inference: Option<Arc<dyn InferenceClient>>,
    ) -> Result<Self> {
        let pool = Arc::new(build_pool(&options));
        Self::with_proxy_pool(options, names, inference, pool)
    }

    /// Like [`CrawlOrchestrator::new`] with a ready-made pool. The default
    /// fetcher records every proxied attempt in this pool.
    pub fn with_proxy_pool(
        options: CrawlOptions,
        names: Arc<NameDatabase>,
        inference: Option<Arc<dyn InferenceClient>>,
        pool: Arc<ProxyPool>,
    ) -> Result<Self> {
        let throttle = Arc::new(DomainThrottle::new(options.throttle_config()));
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(options.fetch_config(), pool.clone())?);
        let pipeline = Arc::new(ExtractionPipeline::new(&options, names, inference));

        Ok(Self {
            options,
            pool,
            throttle,
            fetcher,
            pipeline,
            cancel: CancellationToken::new(),
            progress_callback: None,
            result_callback: None,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_progress_callback(mut self, callback: CrawlProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_result_callback(mut self, callback: CrawlResultCallback) -> Self {
        self.result_callback = Some(callback);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn pool(&self) -> Arc<ProxyPool> {
        self.pool.clone()
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    pub async fn crawl(&self, urls: &[String]) -> Vec<CrawlResult> {
        let workers = self.options.workers.max(1);
        info!("Starting crawl of {} URLs with {} workers", urls.len(), workers);

        let retry = Arc::new(RetryOrchestrator::new(
            self.fetcher.clone(),
            self.pool.clone(),
            self.throttle.clone(),
            self.options.retry_policy(),
        ));
        let semaphore = Arc::new(Semaphore::new(workers));
        let completed = Arc::new(AtomicUsize::new(0));
        let total = urls.len();

        let mut handles = Vec::with_capacity(total);
        for raw in urls {
            let url = normalize_url(raw);
            let retry = retry.clone();
            let pipeline = self.pipeline.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            let completed = completed.clone();
            let progress_cb = self.progress_callback.clone();
            let result_cb = self.result_callback.clone();
            let task_url = url.clone();

            let handle = tokio::spawn(async move {
                let url = task_url;
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let result = match permit {
                    Some(_permit) if !cancel.is_cancelled() => {
                        crawl_one(&retry, &pipeline, &url, &cancel).await
                    }
                    _ => CrawlResult::failed(url.clone(), "cancelled"),
                };

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = progress_cb {
                    cb(format!("[{}/{}] {} {}", done, total, result.status, url));
                }
                if let Some(cb) = result_cb {
                    cb(result.clone());
                }
                result
            });
            handles.push((url, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (url, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Crawl task for {} failed: {}", url, e);
                    CrawlResult::failed(url, ScanError::from(e))
                }
            };
            results.push(result);
        }

        log_summary(&results);
        results
    }
}

async fn crawl_one(
    retry: &RetryOrchestrator,
    pipeline: &ExtractionPipeline,
    url: &str,
    cancel: &CancellationToken,
) -> CrawlResult {
    match retry.fetch_with_retry(url, cancel).await {
        FetchOutcome::Success { body, .. } => pipeline.process(url, &body).await,
        FetchOutcome::HttpError { status } => {
            warn!("{} returned HTTP {}", url, status);
            CrawlResult::http_error(url.to_string(), status)
        }
        FetchOutcome::Failed(e) => {
            warn!("Failed to crawl {}: {}", url, e);
            CrawlResult::failed(url.to_string(), e)
        }
    }
}

fn build_pool(options: &CrawlOptions) -> ProxyPool {
    let proxy_file = match &options.proxy_file {
        Some(path) if !options.use_direct_connection => path,
        _ => return ProxyPool::direct(),
    };

    match ProxyPool::from_file(proxy_file, options.rotation) {
        Ok(pool) if pool.is_empty() => {
            warn!("No proxies in {}, connecting directly", proxy_file.display());
            pool
        }
        Ok(pool) => pool,
        Err(e) => {
            warn!("Failed to load proxies from {}: {}, connecting directly", proxy_file.display(), e);
            ProxyPool::direct()
        }
    }
}

fn log_summary(results: &[CrawlResult]) {
    let successes = results.iter().filter(|r| r.status.is_success()).count();
    let people: usize = results.iter().map(|r| r.people.len()).sum();
    let emails: usize = results.iter().map(|r| r.emails.len()).sum();
    let phones: usize = results.iter().map(|r| r.phones.len()).sum();
    let rate = if results.is_empty() {
        0.0
    } else {
        successes as f64 / results.len() as f64 * 100.0
    };

    info!(
        "Crawl complete: {} URLs, {} successful, {} people, {} emails, {} phones, {:.1}% success rate",
        results.len(),
        successes,
        people,
        emails,
        phones,
        rate
    );
}

/// Add `https://` when there is no scheme, drop the fragment and tracking parameters.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let Ok(mut url) = Url::parse(&with_scheme) else {
        return with_scheme;
    };
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else if url.query_pairs().count() != kept.len() {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Execute a crawl with the given options.
/// Ctrl-C cancels outstanding work; every URL still gets a result.
pub async fn execute_crawl(
    urls: Vec<String>,
    options: CrawlOptions,
    names: Arc<NameDatabase>,
    inference: Option<Arc<dyn InferenceClient>>,
    show_progress: bool,
) -> Result<Vec<CrawlResult>> {
    let progress_bar = if show_progress {
        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let mut orchestrator = CrawlOrchestrator::new(options, names, inference)?;
    if let Some(pb) = &progress_bar {
        let pb = pb.clone();
        orchestrator = orchestrator.with_progress_callback(Arc::new(move |message: String| {
            pb.inc(1);
            pb.set_message(message);
        }));
    }

    let cancel = orchestrator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling crawl");
            cancel.cancel();
        }
    });

    let results = orchestrator.crawl(&urls).await;
    interrupt.abort();

    if let Some(pb) = &progress_bar {
        let successes = results.iter().filter(|r| r.status.is_success()).count();
        pb.finish_with_message(format!(
            "Crawl complete! {}/{} URLs succeeded",
            successes,
            results.len()
        ));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_scheme() {
        assert_eq!(normalize_url("acme.io"), "https://acme.io/");
        assert_eq!(normalize_url("  http://acme.io/about "), "http://acme.io/about");
    }

    #[test]
    fn test_normalize_strips_tracking_and_fragment() {
        assert_eq!(
            normalize_url("https://acme.io/team?utm_source=x&utm_medium=y&fbclid=abc#staff"),
            "https://acme.io/team"
        );
        assert_eq!(
            normalize_url("https://acme.io/search?q=rust&ref=home&page=2"),
            "https://acme.io/search?q=rust&page=2"
        );
        assert_eq!(normalize_url("https://acme.io/p?id=7"), "https://acme.io/p?id=7");
    }

    #[test]
    fn test_normalize_keeps_unparseable_input() {
        assert_eq!(normalize_url("http://"), "http://");
    }

    #[test]
    fn test_tracking_params() {
        assert!(is_tracking_param("utm_campaign"));
        assert!(is_tracking_param("GCLID"));
        assert!(!is_tracking_param("q"));
    }

    #[test]
    fn test_direct_pool_without_proxy_file() {
        let pool = build_pool(&CrawlOptions::default());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_unreadable_proxy_file_falls_back_to_direct() {
        let options = CrawlOptions::default().with_proxy_file("/nonexistent/proxies.txt".into());
        let pool = build_pool(&options);
        assert!(pool.is_empty());
    }
}
