// People detection. Strategies run in order and each sees what the
// earlier ones found; the first sighting of a person wins.

pub mod inference;
pub mod names;
mod patterns;
mod strategies;

use crate::extract::collect_text;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::debug;
use trawler_scanner::Person;

pub use inference::{ChatCompletionsClient, InferenceClient, InferenceError};
pub use names::{NameDatabase, NameDbError};
pub use strategies::{DatabaseStrategy, InferenceStrategy, PatternStrategy};

/// Subtrees that never hold people.
const NOISE_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "svg", "template", "head",
];

const CONTENT_SELECTORS: &[&str] = &[
    "div[class*='team']",
    "div[class*='about']",
    "div[class*='leadership']",
    "div[class*='executive']",
    "div[class*='staff']",
    "div[class*='employee']",
    "section[class*='team']",
    "section[class*='about']",
    "section[class*='leadership']",
    "main",
    "article",
    ".content",
    "#content",
    "body",
];

/// Text chunks shorter than this are navigation crumbs, not content.
const MIN_CHUNK_CHARS: usize = 50;

static CONTENT: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("static selector"))
        .collect()
});

/// What a strategy gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct PersonPage<'a> {
    pub url: &'a str,
    pub html: &'a str,
    /// Text from team, about and main content areas
    pub text: &'a str,
}

#[async_trait]
pub trait PersonStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether to run, given the people found by earlier strategies.
    fn should_run(&self, _page: &PersonPage<'_>, _found: &[Person]) -> bool {
        true
    }

    async fn extract(&self, page: &PersonPage<'_>) -> Vec<Person>;
}

pub struct PersonExtractor {
    strategies: Vec<Box<dyn PersonStrategy>>,
}

impl PersonExtractor {
    /// Database, then inference when a client is given, then patterns.
    pub fn new(names: Arc<NameDatabase>, inference: Option<Arc<dyn InferenceClient>>) -> Self {
        let mut strategies: Vec<Box<dyn PersonStrategy>> = vec![Box::new(DatabaseStrategy::new(names.clone()))];
        if let Some(client) = inference {
            strategies.push(Box::new(InferenceStrategy::new(client)));
        }
        strategies.push(Box::new(PatternStrategy::new(names)));
        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn PersonStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn extract_people(&self, html: &str, url: &str) -> Vec<Person> {
        let text = relevant_text(html);
        let page = PersonPage {
            url,
            html,
            text: &text,
        };

        let mut people = Vec::new();
        let mut seen = HashSet::new();
        for strategy in &self.strategies {
            if !strategy.should_run(&page, &people) {
                debug!("Skipping {} strategy for {}", strategy.name(), url);
                continue;
            }
            let found = strategy.extract(&page).await;
            debug!("{} strategy found {} people on {}", strategy.name(), found.len(), url);
            merge_people(&mut people, &mut seen, found);
        }

        debug!("{} people identified on {}", people.len(), url);
        people
    }
}

/// Append `found` to `people`, skipping keys already seen and blank first names.
pub fn merge_people(people: &mut Vec<Person>, seen: &mut HashSet<String>, found: Vec<Person>) {
    for person in found {
        if person.first_name.trim().is_empty() {
            continue;
        }
        if seen.insert(person.key()) {
            people.push(person);
        }
    }
}

/// Readable text from the parts of a page most likely to name people.
pub fn relevant_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut content = String::new();

    for selector in CONTENT.iter() {
        for element in document.select(selector) {
            let mut chunk = String::new();
            collect_text(element, NOISE_ELEMENTS, &mut chunk);
            if chunk.chars().count() > MIN_CHUNK_CHARS && !content.contains(&chunk) {
                content.push_str(&chunk);
                content.push_str("\n\n");
            }
        }
    }

    content
}
