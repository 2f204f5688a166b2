use colored::Colorize;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use trawler_scanner::{CrawlResult, CrawlStatus};
use url::Url;

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let mut path = u.path().to_string();
            if path.is_empty() {
                path.push('/');
            }
            if let Some(query) = u.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        })
        .unwrap_or_else(|| url.to_string())
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

fn colored_status(status: &CrawlStatus) -> String {
    let label = status.to_string();
    match status {
        CrawlStatus::Success => label.green().to_string(),
        CrawlStatus::HttpError(code) if *code < 500 => label.yellow().to_string(),
        CrawlStatus::HttpError(_) | CrawlStatus::Failed => label.red().to_string(),
    }
}

fn push_list(report: &mut String, label: &str, values: &BTreeSet<String>) {
    if values.is_empty() {
        return;
    }
    let joined = values.iter().cloned().collect::<Vec<_>>().join(", ");
    report.push_str(&format!("    {} {}\n", format!("{}:", label).bright_black(), joined));
}

/// Generate a crawl report from results
pub fn generate_crawl_report(results: &[CrawlResult]) -> String {
    let successes = results.iter().filter(|r| r.status.is_success()).count();
    let sum = |f: fn(&CrawlResult) -> usize| -> usize { results.iter().map(f).sum() };

    let mut report = String::new();
    report.push_str(DIVIDER);
    report.push_str("\n\n# Summary:\n");
    report.push_str(&format!("  URLs crawled: {}\n", results.len()));
    report.push_str(&format!("  Successful: {}\n", successes));
    report.push_str(&format!("  Failed: {}\n", results.len() - successes));
    report.push_str(&format!("  Emails found: {}\n", sum(|r| r.emails.len())));
    report.push_str(&format!("  Phones found: {}\n", sum(|r| r.phones.len())));
    report.push_str(&format!(
        "  Social profiles found: {}\n",
        sum(|r| r.linkedin_profiles.len() + r.github_profiles.len() + r.facebook_profiles.len())
    ));
    report.push_str(&format!("  People identified: {}\n", sum(|r| r.people.len())));
    report.push('\n');
    report.push_str(DIVIDER);
    report.push_str("\n\n");

    // Group results by host, in crawl order
    let mut by_host: IndexMap<String, Vec<&CrawlResult>> = IndexMap::new();
    for result in results {
        by_host.entry(host_of(&result.url)).or_default().push(result);
    }

    for (host, host_results) in &by_host {
        report.push_str(&format!("## {}\n", host.bold()));
        report.push_str(&format!("  {} URL(s)\n\n", host_results.len()));

        for result in host_results {
            report.push_str(&format!(
                "  {} {}\n",
                colored_status(&result.status),
                extract_url_path(&result.url)
            ));

            push_list(&mut report, "emails", &result.emails);
            push_list(&mut report, "phones", &result.phones);
            push_list(&mut report, "LinkedIn", &result.linkedin_profiles);
            push_list(&mut report, "GitHub", &result.github_profiles);
            push_list(&mut report, "Facebook", &result.facebook_profiles);

            if !result.people.is_empty() {
                let people: Vec<String> = result
                    .people
                    .iter()
                    .map(|p| {
                        if p.role.is_empty() {
                            p.full_name()
                        } else {
                            format!("{} ({})", p.full_name(), p.role)
                        }
                    })
                    .collect();
                report.push_str(&format!("    {} {}\n", "people:".bright_black(), people.join(", ")));
            }

            if let Some(notes) = &result.notes {
                report.push_str(&format!("    {}\n", notes.italic()));
            }
        }
        report.push('\n');
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawler_scanner::Person;

    fn sample() -> Vec<CrawlResult> {
        let mut found = CrawlResult::new("https://acme.io/team".into(), CrawlStatus::Success);
        found.emails.insert("jane@acme.io".into());
        found.phones.insert("+14158675309".into());
        found.people.push(Person::new("Jane", "Doe", "CEO"));
        found.people.push(Person::new("Sam", "Lee", ""));
        found.notes = Some("Found: 1 email(s), 1 phone(s), 2 person(s) identified".into());

        vec![
            found,
            CrawlResult::http_error("https://acme.io/old".into(), 404),
            CrawlResult::failed("https://other.org/".into(), "Request timed out after 15000 ms"),
        ]
    }

    #[test]
    fn test_summary_counts() {
        colored::control::set_override(false);
        let report = generate_crawl_report(&sample());

        assert!(report.contains("URLs crawled: 3"));
        assert!(report.contains("Successful: 1"));
        assert!(report.contains("Failed: 2"));
        assert!(report.contains("Emails found: 1"));
        assert!(report.contains("People identified: 2"));
    }

    #[test]
    fn test_grouped_by_host_in_order() {
        colored::control::set_override(false);
        let report = generate_crawl_report(&sample());

        let acme = report.find("## acme.io").unwrap();
        let other = report.find("## other.org").unwrap();
        assert!(acme < other);
        assert!(report.contains("  2 URL(s)"));
        assert!(report.contains("SUCCESS /team"));
        assert!(report.contains("HTTP_404 /old"));
        assert!(report.contains("FAILED /"));
    }

    #[test]
    fn test_result_details() {
        colored::control::set_override(false);
        let report = generate_crawl_report(&sample());

        assert!(report.contains("emails: jane@acme.io"));
        assert!(report.contains("people: Jane Doe (CEO), Sam Lee"));
        assert!(report.contains("ERROR: Request timed out after 15000 ms"));
        assert!(report.contains("HTTP Error: 404"));
    }

    #[test]
    fn test_extract_url_path() {
        assert_eq!(extract_url_path("https://acme.io"), "/");
        assert_eq!(extract_url_path("https://acme.io/a/b?x=1"), "/a/b?x=1");
        assert_eq!(extract_url_path("not a url"), "not a url");
    }
}
