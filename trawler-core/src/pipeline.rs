use crate::config::CrawlOptions;
use crate::extract::{
    ContactExtractor, ContactKind, EmailExtractor, FacebookExtractor, GitHubExtractor,
    LinkedInExtractor, PageContent, PhoneExtractor, clean_set,
};
use crate::people::{InferenceClient, NameDatabase, PersonExtractor};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use trawler_scanner::{CrawlResult, CrawlStatus};

/// Turns a fetched page into a [`CrawlResult`].
pub struct ExtractionPipeline {
    extractors: Vec<Box<dyn ContactExtractor>>,
    people: Option<PersonExtractor>,
}

impl ExtractionPipeline {
    pub fn new(
        options: &CrawlOptions,
        names: Arc<NameDatabase>,
        inference: Option<Arc<dyn InferenceClient>>,
    ) -> Self {
        let mut extractors: Vec<Box<dyn ContactExtractor>> =
            vec![Box::new(EmailExtractor), Box::new(PhoneExtractor)];
        if options.extract_social {
            extractors.push(Box::new(LinkedInExtractor));
            extractors.push(Box::new(GitHubExtractor));
        }
        if options.extract_facebook {
            extractors.push(Box::new(FacebookExtractor));
        }

        let people = options
            .extract_people
            .then(|| PersonExtractor::new(names, inference));

        Self { extractors, people }
    }

    pub fn extractor_kinds(&self) -> Vec<ContactKind> {
        self.extractors.iter().map(|e| e.kind()).collect()
    }

    pub async fn process(&self, url: &str, html: &str) -> CrawlResult {
        let page = PageContent::parse(url, html);
        let mut result = CrawlResult::new(url.to_string(), CrawlStatus::Success);

        for extractor in &self.extractors {
            let found = match extractor.extract(&page) {
                Ok(found) => clean_set(found),
                Err(e) => {
                    warn!("{} on {}", e, url);
                    HashSet::new()
                }
            };
            debug!("{} {} value(s) on {}", found.len(), extractor.kind(), url);
            contacts_for(&mut result, extractor.kind()).extend(found);
        }

        if let Some(people) = &self.people {
            result.people = people.extract_people(html, url).await;
        }

        result.notes = Some(compose_notes(&result, &page));
        result
    }
}

fn contacts_for(result: &mut CrawlResult, kind: ContactKind) -> &mut BTreeSet<String> {
    match kind {
        ContactKind::Email => &mut result.emails,
        ContactKind::Phone => &mut result.phones,
        ContactKind::LinkedIn => &mut result.linkedin_profiles,
        ContactKind::GitHub => &mut result.github_profiles,
        ContactKind::Facebook => &mut result.facebook_profiles,
    }
}

/// Summary of what was found, or a hint at why nothing was.
pub fn compose_notes(result: &CrawlResult, page: &PageContent) -> String {
    if !result.has_findings() {
        return if page.has_forms {
            "No contact info found - page has forms, might require interaction".to_string()
        } else if page.mentions_javascript {
            "No contact info found - page might be JavaScript-heavy".to_string()
        } else {
            "No contact info found".to_string()
        };
    }

    let counts = [
        (result.emails.len(), "email(s)"),
        (result.phones.len(), "phone(s)"),
        (result.linkedin_profiles.len(), "LinkedIn profile(s)"),
        (result.github_profiles.len(), "GitHub profile(s)"),
        (result.facebook_profiles.len(), "Facebook profile(s)"),
        (result.people.len(), "person(s) identified"),
    ];
    let parts: Vec<String> = counts
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| format!("{} {}", count, label))
        .collect();

    format!("Found: {}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(options: &CrawlOptions) -> ExtractionPipeline {
        ExtractionPipeline::new(options, Arc::new(NameDatabase::builtin()), None)
    }

    #[tokio::test]
    async fn test_contacts_and_notes() {
        let html = r#"<html><body>
            <p>Write to hello@acme.io or call (415) 867-5309.</p>
            <a href="https://github.com/acme">GitHub</a>
        </body></html>"#;

        let result = pipeline(&CrawlOptions::default()).process("https://acme.io", html).await;

        assert_eq!(result.status, CrawlStatus::Success);
        assert!(result.emails.contains("hello@acme.io"));
        assert!(result.phones.contains("+14158675309"));
        assert!(result.github_profiles.contains("https://github.com/acme"));
        assert_eq!(
            result.notes.as_deref(),
            Some("Found: 1 email(s), 1 phone(s), 1 GitHub profile(s)")
        );
    }

    #[tokio::test]
    async fn test_disabled_extractors_do_not_run() {
        let options = CrawlOptions {
            extract_social: false,
            extract_facebook: false,
            extract_people: false,
            ..CrawlOptions::default()
        };
        let pipeline = pipeline(&options);
        assert_eq!(pipeline.extractor_kinds(), vec![ContactKind::Email, ContactKind::Phone]);

        let html = r#"<a href="https://github.com/acme">x</a> <a href="https://facebook.com/acme">y</a> John Smith, CEO"#;
        let result = pipeline.process("https://acme.io", html).await;
        assert!(result.github_profiles.is_empty());
        assert!(result.facebook_profiles.is_empty());
        assert!(result.people.is_empty());
    }

    #[tokio::test]
    async fn test_people_counted_in_notes() {
        let html = "<html><body><div class='team'><p>John Smith, CEO of Acme Widgets since the company was founded.</p></div></body></html>";
        let result = pipeline(&CrawlOptions::default()).process("https://acme.io/team", html).await;

        assert_eq!(result.people.len(), 1);
        assert_eq!(result.people[0].role, "CEO");
        assert_eq!(result.notes.as_deref(), Some("Found: 1 person(s) identified"));
    }

    #[tokio::test]
    async fn test_empty_page_with_form() {
        let html = "<html><body><form><input name='email'></form></body></html>";
        let result = pipeline(&CrawlOptions::default()).process("https://acme.io", html).await;
        assert_eq!(
            result.notes.as_deref(),
            Some("No contact info found - page has forms, might require interaction")
        );
    }

    #[tokio::test]
    async fn test_empty_javascript_page() {
        let html = "<html><body><noscript>You need to enable JavaScript to run this app.</noscript></body></html>";
        let result = pipeline(&CrawlOptions::default()).process("https://acme.io", html).await;
        assert_eq!(
            result.notes.as_deref(),
            Some("No contact info found - page might be JavaScript-heavy")
        );
    }

    #[tokio::test]
    async fn test_empty_page() {
        let result = pipeline(&CrawlOptions::default())
            .process("https://acme.io", "<html><body><p>Nothing here.</p></body></html>")
            .await;
        assert_eq!(result.notes.as_deref(), Some("No contact info found"));
        assert!(!result.has_findings());
    }
}
