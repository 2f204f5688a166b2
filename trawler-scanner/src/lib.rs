pub mod error;
pub mod fetcher;
pub mod proxy;
pub mod result;
pub mod retry;
pub mod throttle;

pub use error::ScanError;
pub use fetcher::{FetchConfig, FetchOutcome, HttpFetcher, PageFetcher};
pub use proxy::{ProxyEndpoint, ProxyHealth, ProxyPool, RotationStrategy};
pub use result::{CrawlResult, CrawlStatus, Person};
pub use retry::{RetryOrchestrator, RetryPolicy};
pub use throttle::{DomainThrottle, ThrottleConfig};
