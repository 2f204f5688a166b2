pub mod config;
pub mod crawl;
pub mod extract;
pub mod people;
pub mod pipeline;
pub mod report;

use colored::Colorize;
use std::io::{self, Write};

pub use config::{ConfigError, CrawlOptions, load_config};
pub use crawl::{
    CrawlOrchestrator, CrawlProgressCallback, CrawlResultCallback, execute_crawl, normalize_url,
};
pub use pipeline::ExtractionPipeline;
pub use report::{extract_url_path, generate_crawl_report};

const BANNER: &str = r#"
  ████████╗██████╗  █████╗ ██╗    ██╗██╗     ███████╗██████╗
  ╚══██╔══╝██╔══██╗██╔══██╗██║    ██║██║     ██╔════╝██╔══██╗
     ██║   ██████╔╝███████║██║ █╗ ██║██║     █████╗  ██████╔╝
     ██║   ██╔══██╗██╔══██║██║███╗██║██║     ██╔══╝  ██╔══██╗
     ██║   ██║  ██║██║  ██║╚███╔███╔╝███████╗███████╗██║  ██║
     ╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝ ╚══╝╚══╝ ╚══════╝╚══════╝╚═╝  ╚═╝
"#;

/// Print the banner to stderr. Stdout carries only the report.
pub fn print_banner() {
    let _ = write_banner(&mut io::stderr().lock());
}

pub fn write_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", BANNER.cyan())?;
    writeln!(
        out,
        "  {} v{}\n",
        "polite contact and personnel crawler".bright_black(),
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_names_the_tool_and_version() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        write_banner(&mut out).unwrap();

        let banner = String::from_utf8(out).unwrap();
        assert!(banner.contains("████████╗"));
        assert!(banner.contains(&format!(
            "polite contact and personnel crawler v{}",
            env!("CARGO_PKG_VERSION")
        )));
    }
}
