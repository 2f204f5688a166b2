use super::{ContactExtractor, ContactKind, ExtractError, PageContent};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static EMAIL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // basic
        r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}",
        // multi-level TLDs such as .co.uk
        r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\.[a-z]{2,}",
        r"(?i)mailto:([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static email pattern"))
    .collect()
});

static MAILTO_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)mailto:([^"'\s?<>]+)"#).expect("static mailto pattern"));

const DISPOSABLE_DOMAINS: &[&str] = &[
    "tempmail.com",
    "guerrillamail.com",
    "mailinator.com",
    "10minutemail.com",
    "throwaway.com",
    "fakeinbox.com",
    "yopmail.com",
    "trashmail.com",
    "temp-mail.org",
    "getairmail.com",
    "dispostable.com",
];

const PLACEHOLDER_DOMAINS: &[&str] = &["example.com", "domain.com", "test.com"];

const PLACEHOLDER_ADDRESSES: &[&str] = &[
    "email@example.com",
    "info@example.com",
    "test@example.com",
    "user@example.com",
    "admin@example.com",
    "name@company.com",
    "you@yourdomain.com",
];

/// Image and asset names that look like addresses, e.g. `logo@2x.png`.
const ASSET_SUFFIXES: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js"];

#[derive(Debug, Default, Clone, Copy)]
pub struct EmailExtractor;

impl ContactExtractor for EmailExtractor {
    fn kind(&self) -> ContactKind {
        ContactKind::Email
    }

    fn extract(&self, page: &PageContent) -> Result<HashSet<String>, ExtractError> {
        Ok(extract_emails(&page.html))
    }
}

/// Every plausible, non-throwaway address in `content`, lowercased.
pub fn extract_emails(content: &str) -> HashSet<String> {
    let mut emails = HashSet::new();

    for pattern in EMAIL_PATTERNS.iter() {
        for captures in pattern.captures_iter(content) {
            let matched = captures.get(1).or_else(|| captures.get(0));
            if let Some(m) = matched {
                let email = m.as_str().to_lowercase();
                if is_valid_email(&email) {
                    emails.insert(email);
                }
            }
        }
    }

    for captures in MAILTO_LINK.captures_iter(content) {
        let email = captures[1].to_lowercase();
        if is_valid_email(&email) {
            emails.insert(email);
        }
    }

    emails
}

pub fn is_valid_email(email: &str) -> bool {
    if !is_well_formed(email) {
        return false;
    }

    let Some((_, domain)) = email.rsplit_once('@') else {
        return false;
    };
    let domain = domain.to_lowercase();

    if DISPOSABLE_DOMAINS.contains(&domain.as_str()) || PLACEHOLDER_DOMAINS.contains(&domain.as_str()) {
        return false;
    }
    if PLACEHOLDER_ADDRESSES.contains(&email.to_lowercase().as_str()) {
        return false;
    }
    let tld = domain.rsplit('.').next().unwrap_or_default();
    !ASSET_SUFFIXES.contains(&tld)
}

fn is_well_formed(email: &str) -> bool {
    if email.len() > 254 || email.matches('@').count() != 1 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local.len() <= 64
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..")
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));

    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    let tld_ok = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    local_ok && domain_ok && tld_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_disposable_domains() {
        let emails = extract_emails("contact: jane.doe@company.com and spam@mailinator.com");
        assert!(emails.contains("jane.doe@company.com"));
        assert!(!emails.contains("spam@mailinator.com"));
        assert_eq!(emails.len(), 1);
    }

    #[test]
    fn test_mailto_links() {
        let html = r#"<a href="mailto:Sales@Acme.io?subject=Hi">Email us</a>"#;
        let emails = extract_emails(html);
        assert_eq!(emails, HashSet::from(["sales@acme.io".to_string()]));
    }

    #[test]
    fn test_multi_level_tld() {
        let emails = extract_emails("write to press@agency.co.uk today");
        assert!(emails.contains("press@agency.co.uk"));
    }

    #[test]
    fn test_rejects_placeholders() {
        let emails = extract_emails("email@example.com someone@domain.com qa@test.com real@corp.net");
        assert_eq!(emails, HashSet::from(["real@corp.net".to_string()]));
    }

    #[test]
    fn test_rejects_asset_names() {
        let emails = extract_emails(r#"<img src="/img/logo@2x.png"> <img src="hero@3x.webp">"#);
        assert!(emails.is_empty());
    }

    #[test]
    fn test_validation_rules() {
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email(".lead@corp.com"));
        assert!(!is_valid_email("a..b@corp.com"));
        assert!(!is_valid_email("a@-corp.com"));
        assert!(!is_valid_email("a@corp.c0m"));
        assert!(!is_valid_email("a@b@corp.com"));
    }

    #[test]
    fn test_addresses_are_lowercased() {
        let emails = extract_emails("Reach Jane.Doe@Company.COM");
        assert!(emails.contains("jane.doe@company.com"));
    }
}
