use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use trawler_core::config::{CrawlOptions, expand_path, load_config};
use trawler_core::people::{ChatCompletionsClient, InferenceClient, NameDatabase};
use trawler_core::{execute_crawl, generate_crawl_report};
use trawler_scanner::{CrawlResult, RotationStrategy};
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content.lines().filter_map(parse_url_line).collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, adding https:// when there is no scheme.
/// Blank lines and `#` comments yield `None` quietly.
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let candidate = if line.contains("://") {
        line.to_string()
    } else {
        format!("https://{}", line)
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() && matches!(url.scheme(), "http" | "https") => {
            Some(candidate)
        }
        _ => {
            warn!("Skipping invalid URL '{}'", line);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Command-line overrides for [`CrawlOptions`]. `None` and `false` leave the
/// configured value alone.
#[derive(Debug, Clone, Default)]
pub struct CrawlFlags {
    pub workers: Option<usize>,
    pub proxy_file: Option<PathBuf>,
    pub rotation: Option<RotationStrategy>,
    pub retries: Option<usize>,
    pub cooldown_ms: Option<u64>,
    pub min_delay_ms: Option<u64>,
    pub names_db: Option<PathBuf>,
    pub no_people: bool,
    pub no_social: bool,
    pub no_facebook: bool,
    pub no_inference: bool,
}

impl CrawlFlags {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, String> {
        let rotation = matches
            .get_one::<String>("rotation")
            .map(|s| s.parse::<RotationStrategy>())
            .transpose()?;

        Ok(Self {
            workers: matches.get_one::<usize>("threads").copied(),
            proxy_file: matches.get_one::<PathBuf>("proxy-file").cloned(),
            rotation,
            retries: matches.get_one::<usize>("retries").copied(),
            cooldown_ms: matches.get_one::<u64>("cooldown-ms").copied(),
            min_delay_ms: matches.get_one::<u64>("min-delay-ms").copied(),
            names_db: matches.get_one::<PathBuf>("names-db").cloned(),
            no_people: matches.get_flag("no-people"),
            no_social: matches.get_flag("no-social"),
            no_facebook: matches.get_flag("no-facebook"),
            no_inference: matches.get_flag("no-inference"),
        })
    }

    pub fn apply(self, mut options: CrawlOptions) -> CrawlOptions {
        if let Some(workers) = self.workers {
            options = options.with_workers(workers);
        }
        if let Some(path) = self.proxy_file {
            options = options.with_proxy_file(path);
        }
        if let Some(rotation) = self.rotation {
            options = options.with_rotation(rotation);
        }
        if let Some(retries) = self.retries {
            options = options.with_max_retries(retries);
        }
        if let Some(cooldown_ms) = self.cooldown_ms {
            options.throttle.cooldown_ms = cooldown_ms;
        }
        if let Some(min_delay_ms) = self.min_delay_ms {
            options.throttle.min_delay_ms = min_delay_ms;
        }
        if let Some(path) = self.names_db {
            options.names_db = Some(path);
        }
        options.extract_people &= !self.no_people;
        options.extract_social &= !self.no_social;
        options.extract_facebook &= !self.no_facebook;
        options.inference.enabled &= !self.no_inference;
        options.expand_paths()
    }
}

/// Merge a config file (when given) with command-line flags.
pub fn apply_crawl_flags(config: Option<&PathBuf>, flags: CrawlFlags) -> anyhow::Result<CrawlOptions> {
    let options = match config {
        Some(path) => load_config(path)?,
        None => CrawlOptions::default(),
    };
    Ok(flags.apply(options))
}

/// The inference client, when people detection wants one and a key is set.
pub fn build_inference_client(options: &CrawlOptions) -> Option<Arc<dyn InferenceClient>> {
    if !options.extract_people || !options.inference.enabled {
        return None;
    }

    let Some(api_key) = options.inference.api_key() else {
        info!(
            "{} is not set, people inference disabled",
            options.inference.api_key_env
        );
        return None;
    };

    match ChatCompletionsClient::new(&options.inference.endpoint, &options.inference.model, api_key) {
        Ok(client) => {
            info!("People inference enabled with model {}", client.model());
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("Failed to create inference client: {}", e);
            None
        }
    }
}

pub fn render_report(results: &[CrawlResult], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(generate_crawl_report(results)),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(results)?;
            json.push('\n');
            Ok(json)
        }
    }
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let output = sub_matches.get_one::<PathBuf>("output");
    let format = sub_matches
        .get_one::<String>("format")
        .map(|s| s.parse::<OutputFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    // Load URLs from source
    let urls = load_urls_from_source(url, hosts_file).map_err(anyhow::Error::msg)?;

    let flags = CrawlFlags::from_matches(sub_matches).map_err(anyhow::Error::msg)?;
    let options = apply_crawl_flags(sub_matches.get_one::<PathBuf>("config"), flags)?;

    if !quiet {
        // Print crawl configuration
        eprintln!("\n{} Crawling {} URL(s)", "→".blue(), urls.len());
        eprintln!("Workers: {}", options.workers);
        eprintln!("Attempts per URL: {}", options.max_retries.max(1));
        let connection = match (&options.proxy_file, options.use_direct_connection) {
            (Some(path), false) => format!("proxies from {}", path.display()),
            _ => "direct".to_string(),
        };
        eprintln!("Connection: {}\n", connection);
    }

    let names = Arc::new(NameDatabase::load_or_builtin(options.names_db.as_deref()));
    let inference = build_inference_client(&options);

    let results = execute_crawl(urls, options, names, inference, !quiet)
        .await
        .context("Crawl failed")?;

    if !quiet {
        eprintln!("\n{} Crawl complete!\n", "✓".green().bold());
    }

    match output {
        Some(path) => {
            let path = expand_path(path);
            if format == OutputFormat::Text {
                colored::control::set_override(false);
            }
            let report = render_report(&results, format)?;
            fs::write(&path, &report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !quiet {
                eprintln!("{} Report saved to {}", "✓".green().bold(), path.display());
            }
        }
        None => print!("{}", render_report(&results, format)?),
    }

    Ok(())
}
