// Proxy endpoints, per-proxy health and rotation

use crate::error::{Result, ScanError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Endpoints with fewer recorded requests than this are always considered healthy.
const MIN_REQUESTS_FOR_HEALTH: u64 = 5;
const HEALTHY_SUCCESS_RATE: f64 = 0.3;
const WARN_FAILURE_RATE: f64 = 0.7;
const WARN_MIN_REQUESTS: u64 = 10;

/// A proxy server. Identity is (host, port); credentials are carried but never compared.
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// `http://host:port`, without credentials.
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl PartialEq for ProxyEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for ProxyEndpoint {}

impl Hash for ProxyEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.has_credentials() {
            write!(f, " (auth)")?;
        }
        Ok(())
    }
}

/// Counters for one endpoint. Lives as long as the pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyHealth {
    pub success_count: u64,
    pub failure_count: u64,
    pub total_requests: u64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ProxyHealth {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.success_count as f64 / self.total_requests as f64
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.total_requests as f64
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.total_requests < MIN_REQUESTS_FOR_HEALTH || self.success_rate() > HEALTHY_SUCCESS_RATE
    }
}

/// How the next proxy is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationStrategy {
    /// Always connect directly
    None,
    Random,
    #[default]
    RoundRobin,
    /// Highest observed success rate
    Smart,
}

impl FromStr for RotationStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(RotationStrategy::None),
            "random" => Ok(RotationStrategy::Random),
            "round-robin" => Ok(RotationStrategy::RoundRobin),
            "smart" => Ok(RotationStrategy::Smart),
            other => Err(format!("unknown rotation strategy '{}'", other)),
        }
    }
}

struct PooledProxy {
    endpoint: ProxyEndpoint,
    health: Mutex<ProxyHealth>,
}

impl PooledProxy {
    fn health(&self) -> MutexGuard<'_, ProxyHealth> {
        // A poisoned counter is still a usable counter
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed set of proxies with health tracking. Shared behind an `Arc`.
pub struct ProxyPool {
    proxies: Vec<PooledProxy>,
    strategy: RotationStrategy,
    cursor: AtomicUsize,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>, strategy: RotationStrategy) -> Self {
        let mut seen = HashSet::new();
        let proxies = endpoints
            .into_iter()
            .filter(|endpoint| seen.insert(endpoint.clone()))
            .map(|endpoint| PooledProxy {
                endpoint,
                health: Mutex::new(ProxyHealth::default()),
            })
            .collect();

        Self {
            proxies,
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// A pool that never hands out a proxy.
    pub fn direct() -> Self {
        Self::new(Vec::new(), RotationStrategy::None)
    }

    pub fn from_file(path: &Path, strategy: RotationStrategy) -> Result<Self> {
        let endpoints = load_proxies(path)?;
        info!(
            "Loaded {} proxies from {} ({:?} rotation)",
            endpoints.len(),
            path.display(),
            strategy
        );
        Ok(Self::new(endpoints, strategy))
    }

    pub fn strategy(&self) -> RotationStrategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn endpoints(&self) -> Vec<ProxyEndpoint> {
        self.proxies.iter().map(|p| p.endpoint.clone()).collect()
    }

    /// Pick a proxy for the next attempt, or `None` for a direct connection.
    ///
    /// Healthy endpoints outside `tried` are preferred. When every healthy
    /// endpoint has been tried the restriction is dropped; when none are
    /// healthy the caller connects directly.
    pub fn select(&self, tried: &HashSet<ProxyEndpoint>) -> Option<ProxyEndpoint> {
        if self.strategy == RotationStrategy::None || self.proxies.is_empty() {
            return None;
        }

        let healthy: Vec<&PooledProxy> = self
            .proxies
            .iter()
            .filter(|p| p.health().is_healthy())
            .collect();
        let untried: Vec<&PooledProxy> = healthy
            .iter()
            .copied()
            .filter(|p| !tried.contains(&p.endpoint))
            .collect();
        let candidates = if untried.is_empty() { healthy } else { untried };

        if candidates.is_empty() {
            debug!("No healthy proxies left, falling back to direct connection");
            return None;
        }

        let chosen = match self.strategy {
            RotationStrategy::None => return None,
            RotationStrategy::Random => candidates[fastrand::usize(..candidates.len())],
            RotationStrategy::RoundRobin => {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                candidates[index]
            }
            RotationStrategy::Smart => {
                let mut best = candidates[0];
                let mut best_rate = best.health().success_rate();
                for candidate in &candidates[1..] {
                    let rate = candidate.health().success_rate();
                    if rate > best_rate {
                        best = *candidate;
                        best_rate = rate;
                    }
                }
                best
            }
        };

        Some(chosen.endpoint.clone())
    }

    /// Record the result of one attempt made through `endpoint`.
    pub fn record_outcome(&self, endpoint: &ProxyEndpoint, success: bool) {
        let Some(proxy) = self.proxies.iter().find(|p| &p.endpoint == endpoint) else {
            return;
        };

        let mut health = proxy.health();
        health.total_requests += 1;
        if success {
            health.success_count += 1;
        } else {
            health.failure_count += 1;
        }
        health.last_used_at = Some(Utc::now());

        if health.failure_rate() > WARN_FAILURE_RATE && health.total_requests > WARN_MIN_REQUESTS {
            warn!(
                "Proxy {} has a high failure rate: {:.1}% over {} requests",
                proxy.endpoint,
                health.failure_rate() * 100.0,
                health.total_requests
            );
        }
    }

    pub fn health(&self, endpoint: &ProxyEndpoint) -> Option<ProxyHealth> {
        self.proxies
            .iter()
            .find(|p| &p.endpoint == endpoint)
            .map(|p| p.health().clone())
    }
}

impl fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyPool")
            .field("proxies", &self.proxies.len())
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Parse `host:port`, `host:port:user:pass` or `user:pass@host:port`.
pub fn parse_proxy_line(line: &str) -> Result<ProxyEndpoint> {
    let line = line.trim();

    if let Some((credentials, address)) = line.rsplit_once('@') {
        let (username, password) = credentials
            .split_once(':')
            .ok_or_else(|| ScanError::InvalidProxy("credentials must be user:pass".into()))?;
        let (host, port) = parse_host_port(address)?;
        return Ok(ProxyEndpoint::new(host, port).with_credentials(
            non_empty(username, "empty username")?,
            password,
        ));
    }

    let parts: Vec<&str> = line.split(':').collect();
    match parts.as_slice() {
        [host, port] => {
            let (host, port) = parse_host_port(&format!("{}:{}", host, port))?;
            Ok(ProxyEndpoint::new(host, port))
        }
        [host, port, username, password] => {
            let (host, port) = parse_host_port(&format!("{}:{}", host, port))?;
            Ok(ProxyEndpoint::new(host, port)
                .with_credentials(non_empty(username, "empty username")?, *password))
        }
        _ => Err(ScanError::InvalidProxy(format!(
            "expected host:port, host:port:user:pass or user:pass@host:port ({} fields)",
            parts.len()
        ))),
    }
}

fn parse_host_port(address: &str) -> Result<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ScanError::InvalidProxy("missing port".into()))?;
    let host = non_empty(host, "empty host")?;
    if host.chars().any(char::is_whitespace) {
        return Err(ScanError::InvalidProxy("host contains whitespace".into()));
    }
    let port = port
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ScanError::InvalidProxy(format!("bad port '{}'", port.trim())))?;
    Ok((host.to_string(), port))
}

fn non_empty<'a>(value: &'a str, reason: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(ScanError::InvalidProxy(reason.to_string()))
    } else {
        Ok(value)
    }
}

/// Load a proxy list file. Blank lines and `#` comments are ignored,
/// malformed lines are skipped with a warning.
pub fn load_proxies(path: &Path) -> Result<Vec<ProxyEndpoint>> {
    let content = fs::read_to_string(path)?;
    let mut endpoints = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_proxy_line(line) {
            Ok(endpoint) => endpoints.push(endpoint),
            Err(e) => warn!("Skipping proxy on line {} of {}: {}", idx + 1, path.display(), e),
        }
    }

    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn endpoints(n: u16) -> Vec<ProxyEndpoint> {
        (0..n).map(|i| ProxyEndpoint::new(format!("10.0.0.{}", i + 1), 8080)).collect()
    }

    // ============================================================================
    // Selection
    // ============================================================================

    #[test]
    fn test_round_robin_visits_each_endpoint_once() {
        let pool = ProxyPool::new(endpoints(4), RotationStrategy::RoundRobin);

        let picked: Vec<ProxyEndpoint> = (0..4)
            .map(|_| pool.select(&HashSet::new()).unwrap())
            .collect();
        let unique: HashSet<&ProxyEndpoint> = picked.iter().collect();
        assert_eq!(unique.len(), 4);

        // Fifth pick wraps around to the first
        assert_eq!(pool.select(&HashSet::new()).unwrap(), picked[0]);
    }

    #[test]
    fn test_none_strategy_is_direct() {
        let pool = ProxyPool::new(endpoints(3), RotationStrategy::None);
        assert!(pool.select(&HashSet::new()).is_none());
        assert!(ProxyPool::direct().select(&HashSet::new()).is_none());
    }

    #[test]
    fn test_random_prefers_untried() {
        let pool = ProxyPool::new(endpoints(3), RotationStrategy::Random);
        let all = pool.endpoints();
        let tried: HashSet<ProxyEndpoint> = all[..2].iter().cloned().collect();

        for _ in 0..20 {
            assert_eq!(pool.select(&tried).unwrap(), all[2]);
        }
    }

    #[test]
    fn test_all_tried_drops_restriction() {
        let pool = ProxyPool::new(endpoints(2), RotationStrategy::Random);
        let tried: HashSet<ProxyEndpoint> = pool.endpoints().into_iter().collect();
        assert!(pool.select(&tried).is_some());
    }

    #[test]
    fn test_smart_picks_best_success_rate() {
        let pool = ProxyPool::new(endpoints(3), RotationStrategy::Smart);
        let all = pool.endpoints();

        pool.record_outcome(&all[0], true);
        pool.record_outcome(&all[0], false);
        pool.record_outcome(&all[1], true);
        pool.record_outcome(&all[2], false);

        assert_eq!(pool.select(&HashSet::new()).unwrap(), all[1]);
    }

    #[test]
    fn test_smart_ties_go_to_first() {
        let pool = ProxyPool::new(endpoints(3), RotationStrategy::Smart);
        let all = pool.endpoints();
        assert_eq!(pool.select(&HashSet::new()).unwrap(), all[0]);
    }

    #[test]
    fn test_unhealthy_proxies_are_skipped() {
        let pool = ProxyPool::new(endpoints(2), RotationStrategy::RoundRobin);
        let all = pool.endpoints();
        for _ in 0..5 {
            pool.record_outcome(&all[0], false);
        }

        for _ in 0..6 {
            assert_eq!(pool.select(&HashSet::new()).unwrap(), all[1]);
        }
    }

    #[test]
    fn test_no_healthy_proxies_falls_back_to_direct() {
        let pool = ProxyPool::new(endpoints(1), RotationStrategy::RoundRobin);
        let only = &pool.endpoints()[0];
        for _ in 0..5 {
            pool.record_outcome(only, false);
        }
        assert!(pool.select(&HashSet::new()).is_none());
    }

    // ============================================================================
    // Health
    // ============================================================================

    #[test]
    fn test_health_defaults() {
        let health = ProxyHealth::default();
        assert_eq!(health.success_rate(), 1.0);
        assert_eq!(health.failure_rate(), 0.0);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_record_outcome_updates_counters() {
        let pool = ProxyPool::new(endpoints(1), RotationStrategy::RoundRobin);
        let proxy = pool.endpoints()[0].clone();

        pool.record_outcome(&proxy, true);
        pool.record_outcome(&proxy, false);
        pool.record_outcome(&proxy, true);

        let health = pool.health(&proxy).unwrap();
        assert_eq!(health.total_requests, 3);
        assert_eq!(health.success_count, 2);
        assert_eq!(health.failure_count, 1);
        assert!(health.last_used_at.is_some());
    }

    #[test]
    fn test_health_threshold() {
        let health = ProxyHealth {
            success_count: 1,
            failure_count: 4,
            total_requests: 5,
            last_used_at: None,
        };
        assert!(!health.is_healthy());

        let health = ProxyHealth {
            success_count: 2,
            failure_count: 3,
            total_requests: 5,
            last_used_at: None,
        };
        assert!(health.is_healthy());
    }

    // ============================================================================
    // Parsing
    // ============================================================================

    #[test]
    fn test_parse_host_port() {
        let proxy = parse_proxy_line("proxy.example.com:3128").unwrap();
        assert_eq!(proxy.host, "proxy.example.com");
        assert_eq!(proxy.port, 3128);
        assert!(!proxy.has_credentials());
    }

    #[test]
    fn test_parse_host_port_user_pass() {
        let proxy = parse_proxy_line("10.1.1.1:8000:alice:s3cret").unwrap();
        assert_eq!(proxy.host, "10.1.1.1");
        assert_eq!(proxy.port, 8000);
        assert_eq!(proxy.username.as_deref(), Some("alice"));
        assert_eq!(proxy.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_parse_user_pass_at_host() {
        let proxy = parse_proxy_line("bob:hunter2@gate.example.net:9000").unwrap();
        assert_eq!(proxy.host, "gate.example.net");
        assert_eq!(proxy.port, 9000);
        assert_eq!(proxy.username.as_deref(), Some("bob"));
        assert_eq!(proxy.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_proxy_line("just-a-host").is_err());
        assert!(parse_proxy_line("host:notaport").is_err());
        assert!(parse_proxy_line("host:0").is_err());
        assert!(parse_proxy_line("a:1:b").is_err());
        assert!(parse_proxy_line(":8080").is_err());
        assert!(parse_proxy_line("nopass@host:80").is_err());
    }

    #[test]
    fn test_identity_ignores_credentials() {
        let plain = ProxyEndpoint::new("h", 1);
        let authed = ProxyEndpoint::new("h", 1).with_credentials("u", "p");
        assert_eq!(plain, authed);

        let set: HashSet<ProxyEndpoint> = [plain, authed].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_display_hides_credentials() {
        let proxy = ProxyEndpoint::new("h", 1).with_credentials("user", "secret");
        assert_eq!(proxy.to_string(), "h:1 (auth)");
    }

    #[test]
    fn test_load_proxies_skips_comments_and_bad_lines() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# residential pool")?;
        writeln!(file, "1.2.3.4:8080")?;
        writeln!(file)?;
        writeln!(file, "garbage line")?;
        writeln!(file, "u:p@5.6.7.8:3128")?;
        writeln!(file, "9.9.9.9:1080:user:pass")?;

        let proxies = load_proxies(file.path())?;
        assert_eq!(proxies.len(), 3);
        assert_eq!(proxies[0].host, "1.2.3.4");
        assert_eq!(proxies[1].host, "5.6.7.8");
        assert_eq!(proxies[2].port, 1080);
        Ok(())
    }

    #[test]
    fn test_load_proxies_missing_file() {
        let result = load_proxies(Path::new("/definitely/not/here.txt"));
        assert!(matches!(result, Err(ScanError::Io(_))));
    }

    #[test]
    fn test_pool_deduplicates_endpoints() {
        let pool = ProxyPool::new(
            vec![
                ProxyEndpoint::new("h", 1),
                ProxyEndpoint::new("h", 1).with_credentials("u", "p"),
                ProxyEndpoint::new("h", 2),
            ],
            RotationStrategy::Random,
        );
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_rotation_strategy_from_str() {
        assert_eq!("round_robin".parse::<RotationStrategy>(), Ok(RotationStrategy::RoundRobin));
        assert_eq!("SMART".parse::<RotationStrategy>(), Ok(RotationStrategy::Smart));
        assert!("fastest".parse::<RotationStrategy>().is_err());
    }
}
