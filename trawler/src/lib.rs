pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    CrawlFlags, OutputFormat, apply_crawl_flags, build_inference_client, load_urls_from_file,
    load_urls_from_source, parse_url_line, render_report,
};

// Re-export crawl functionality from trawler-core
pub use trawler_core::{
    CrawlOptions, CrawlProgressCallback, execute_crawl, extract_url_path, generate_crawl_report,
};
