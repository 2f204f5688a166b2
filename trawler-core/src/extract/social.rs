use super::{ContactExtractor, ContactKind, ExtractError, PageContent};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

static LINKEDIN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://([a-z]{2,3}\.)?linkedin\.com/in/[^"'?\s<>#]+"#).expect("static linkedin pattern")
});

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://(www\.)?github\.com/[^"'?\s<>#]+"#).expect("static github pattern")
});

static FACEBOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)https?://(?:(?:www|web|m)\.)?(?:facebook|fb)\.com/(?:profile\.php\?id=\d+|[a-z0-9._/-]+)",
    )
    .expect("static facebook pattern")
});

static FACEBOOK_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:(?:www|web|m)\.)?(?:facebook|fb)\.com/").expect("static facebook href pattern")
});

static PERSONAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+ [a-z]+$").expect("static name pattern"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// First path segments that belong to Facebook itself rather than a profile.
const FACEBOOK_SITE_PAGES: &[&str] = &[
    "home",
    "login",
    "login.php",
    "signup",
    "about",
    "help",
    "policies",
    "legal",
    "terms",
    "privacy",
    "careers",
    "business",
    "sharer",
    "sharer.php",
    "share",
    "dialog",
    "plugins",
];

const FACEBOOK_SECTIONS: &[&str] = &["pages", "groups", "events", "hashtag"];

const PROFILE_INDICATORS: &[&str] = &["profile", "timeline", "wall", "friend", "follow", "like"];

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkedInExtractor;

#[derive(Debug, Default, Clone, Copy)]
pub struct GitHubExtractor;

#[derive(Debug, Default, Clone, Copy)]
pub struct FacebookExtractor;

impl ContactExtractor for LinkedInExtractor {
    fn kind(&self) -> ContactKind {
        ContactKind::LinkedIn
    }

    fn extract(&self, page: &PageContent) -> Result<HashSet<String>, ExtractError> {
        Ok(extract_linkedin_urls(&page.html))
    }
}

impl ContactExtractor for GitHubExtractor {
    fn kind(&self) -> ContactKind {
        ContactKind::GitHub
    }

    fn extract(&self, page: &PageContent) -> Result<HashSet<String>, ExtractError> {
        Ok(extract_github_urls(&page.html))
    }
}

impl ContactExtractor for FacebookExtractor {
    fn kind(&self) -> ContactKind {
        ContactKind::Facebook
    }

    fn extract(&self, page: &PageContent) -> Result<HashSet<String>, ExtractError> {
        Ok(extract_facebook_urls(&page.html))
    }
}

pub fn extract_linkedin_urls(html: &str) -> HashSet<String> {
    LINKEDIN_URL
        .find_iter(html)
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .filter(|url| !url.ends_with("/in"))
        .collect()
}

pub fn extract_github_urls(html: &str) -> HashSet<String> {
    GITHUB_URL
        .find_iter(html)
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .collect()
}

/// Facebook profile links, from raw URLs plus anchors whose text reads like a person.
pub fn extract_facebook_urls(html: &str) -> HashSet<String> {
    let mut urls: HashSet<String> = FACEBOOK_URL
        .find_iter(html)
        .map(|m| normalize_facebook_url(m.as_str()))
        .filter(|url| is_profile_url(url))
        .collect();

    urls.extend(profile_anchors(html));
    urls
}

fn profile_anchors(html: &str) -> Vec<String> {
    let document = Html::parse_fragment(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            if !FACEBOOK_HREF.is_match(href) {
                return None;
            }
            let text = anchor.text().collect::<String>().trim().to_lowercase();
            if !is_profile_link_text(&text) {
                return None;
            }
            let url = normalize_facebook_url(href);
            is_profile_url(&url).then_some(url)
        })
        .collect()
}

/// Drop the query, fragment and trailing slash. `profile.php?id=N` keeps its id.
fn normalize_facebook_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if let Some(pos) = lower.find("profile.php?id=") {
        let id_start = pos + "profile.php?id=".len();
        let id_len = url[id_start..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(url.len() - id_start);
        return url[..id_start + id_len].to_string();
    }

    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/').to_string()
}

fn is_profile_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let Some(path) = lower.split_once(".com/").map(|(_, path)| path) else {
        return false;
    };
    if path.is_empty() {
        return false;
    }
    if path.starts_with("profile.php?id=") {
        return true;
    }

    let first = path.split('/').next().unwrap_or_default();
    if FACEBOOK_SITE_PAGES.contains(&first) || FACEBOOK_SECTIONS.contains(&first) {
        return false;
    }

    !path.contains('/') || path.contains("/posts/") || path.contains("/photos/")
}

fn is_profile_link_text(text: &str) -> bool {
    !text.is_empty()
        && (PERSONAL_NAME.is_match(text) || PROFILE_INDICATORS.iter().any(|i| text.contains(i)))
}
