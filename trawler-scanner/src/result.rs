use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Terminal status of one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CrawlStatus {
    Success,
    HttpError(u16),
    Failed,
}

impl CrawlStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CrawlStatus::Success)
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlStatus::Success => write!(f, "SUCCESS"),
            CrawlStatus::HttpError(code) => write!(f, "HTTP_{}", code),
            CrawlStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl From<CrawlStatus> for String {
    fn from(status: CrawlStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for CrawlStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "SUCCESS" => Ok(CrawlStatus::Success),
            "FAILED" => Ok(CrawlStatus::Failed),
            other => other
                .strip_prefix("HTTP_")
                .and_then(|code| code.parse().ok())
                .map(CrawlStatus::HttpError)
                .ok_or_else(|| format!("unknown crawl status '{}'", other)),
        }
    }
}

/// A named person found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Person {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: role.into(),
            email: None,
            phone: None,
        }
    }

    /// Identity used for deduplication: lowercased "first last".
    pub fn key(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_lowercase()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Everything learned about one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub status: CrawlStatus,
    pub emails: BTreeSet<String>,
    pub phones: BTreeSet<String>,
    pub linkedin_profiles: BTreeSet<String>,
    pub github_profiles: BTreeSet<String>,
    pub facebook_profiles: BTreeSet<String>,
    pub people: Vec<Person>,
    pub notes: Option<String>,
}

impl CrawlResult {
    pub fn new(url: String, status: CrawlStatus) -> Self {
        Self {
            url,
            status,
            emails: BTreeSet::new(),
            phones: BTreeSet::new(),
            linkedin_profiles: BTreeSet::new(),
            github_profiles: BTreeSet::new(),
            facebook_profiles: BTreeSet::new(),
            people: Vec::new(),
            notes: None,
        }
    }

    pub fn failed(url: String, error: impl fmt::Display) -> Self {
        let mut result = Self::new(url, CrawlStatus::Failed);
        result.notes = Some(format!("ERROR: {}", error));
        result
    }

    pub fn http_error(url: String, code: u16) -> Self {
        let mut result = Self::new(url, CrawlStatus::HttpError(code));
        result.notes = Some(format!("HTTP Error: {}", code));
        result
    }

    /// Number of contact values of any kind, people excluded.
    pub fn contact_count(&self) -> usize {
        self.emails.len()
            + self.phones.len()
            + self.linkedin_profiles.len()
            + self.github_profiles.len()
            + self.facebook_profiles.len()
    }

    pub fn has_findings(&self) -> bool {
        self.contact_count() > 0 || !self.people.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(CrawlStatus::Success.to_string(), "SUCCESS");
        assert_eq!(CrawlStatus::HttpError(404).to_string(), "HTTP_404");
        assert_eq!(CrawlStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            CrawlStatus::try_from("HTTP_503".to_string()),
            Ok(CrawlStatus::HttpError(503))
        );
        assert!(CrawlStatus::try_from("HTTP_abc".to_string()).is_err());
    }

    #[test]
    fn test_person_key_ignores_case_and_role() {
        let a = Person::new("John", "Smith", "CEO");
        let b = Person::new("john", "SMITH", "Founder");
        assert_eq!(a.key(), "john smith");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_failed_result_notes() {
        let result = CrawlResult::failed("https://example.com".into(), "boom");
        assert_eq!(result.status, CrawlStatus::Failed);
        assert_eq!(result.notes.as_deref(), Some("ERROR: boom"));
        assert!(!result.has_findings());
    }

    #[test]
    fn test_http_error_result_notes() {
        let result = CrawlResult::http_error("https://example.com".into(), 404);
        assert_eq!(result.status, CrawlStatus::HttpError(404));
        assert_eq!(result.notes.as_deref(), Some("HTTP Error: 404"));
    }
}
