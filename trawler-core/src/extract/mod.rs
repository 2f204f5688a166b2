// Contact extractors. Each one is independent and stateless.

pub mod email;
pub mod phone;
pub mod social;

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

pub use email::{EmailExtractor, extract_emails};
pub use phone::{PhoneExtractor, extract_phones};
pub use social::{
    FacebookExtractor, GitHubExtractor, LinkedInExtractor, extract_facebook_urls,
    extract_github_urls, extract_linkedin_urls,
};

/// Elements whose text never reaches a reader.
pub(crate) const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Everything a text-only reader would see, `<noscript>` fallbacks included.
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style", "template", "svg"];

static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("static selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    Email,
    Phone,
    LinkedIn,
    GitHub,
    Facebook,
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContactKind::Email => "email",
            ContactKind::Phone => "phone",
            ContactKind::LinkedIn => "LinkedIn",
            ContactKind::GitHub => "GitHub",
            ContactKind::Facebook => "Facebook",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{kind} extraction failed: {reason}")]
    Failed { kind: ContactKind, reason: String },
}

/// A fetched page, pre-digested once for every extractor.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: String,
    pub html: String,
    /// Visible text, whitespace-collapsed
    pub text: String,
    pub has_forms: bool,
    /// Any text, fallbacks included, mentions JavaScript
    pub mentions_javascript: bool,
}

impl PageContent {
    pub fn parse(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut text = String::new();
        collect_text(document.root_element(), HIDDEN_ELEMENTS, &mut text);
        let has_forms = document.select(&FORM_SELECTOR).next().is_some();

        let mut all_text = String::new();
        collect_text(document.root_element(), NON_TEXT_ELEMENTS, &mut all_text);
        let mentions_javascript = all_text.to_lowercase().contains("javascript");

        Self {
            url: url.to_string(),
            html: html.to_string(),
            text,
            has_forms,
            mentions_javascript,
        }
    }
}

pub trait ContactExtractor: Send + Sync {
    fn kind(&self) -> ContactKind;
    fn extract(&self, page: &PageContent) -> Result<HashSet<String>, ExtractError>;
}

/// Append the text below `element` to `out`, skipping `skip` subtrees.
pub(crate) fn collect_text(element: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                for word in text.split_whitespace() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(word);
                }
            }
            Node::Element(el) if !skip.contains(&el.name()) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, skip, out);
                }
            }
            _ => {}
        }
    }
}

/// Drop blank entries and trim the rest.
pub(crate) fn clean_set(values: HashSet<String>) -> HashSet<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_skips_scripts() {
        let page = PageContent::parse(
            "https://example.com",
            r#"<html><head><title>T</title><style>.a{}</style></head>
               <body><h1>Our   Team</h1><script>var x = "hidden";</script><p>Jane Doe</p></body></html>"#,
        );
        assert_eq!(page.text, "Our Team Jane Doe");
        assert!(!page.has_forms);
    }

    #[test]
    fn test_form_detection() {
        let page = PageContent::parse(
            "https://example.com",
            "<html><body><form action='/contact'><input name='q'></form></body></html>",
        );
        assert!(page.has_forms);
    }

    #[test]
    fn test_noscript_fallback_counts_as_javascript_mention() {
        let page = PageContent::parse(
            "https://example.com",
            "<html><body><noscript>Please enable JavaScript to continue.</noscript><div id='root'></div></body></html>",
        );
        assert!(page.mentions_javascript);
        assert!(page.text.is_empty());
    }

    #[test]
    fn test_clean_set_drops_blanks() {
        let values: HashSet<String> = ["a".to_string(), " ".to_string(), "".to_string(), " b ".to_string()]
            .into_iter()
            .collect();
        let cleaned = clean_set(values);
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.contains("b"));
    }
}
