use super::inference::{InferenceClient, capitalize_role};
use super::names::NameDatabase;
use super::patterns::{card_people, titled_people};
use super::{PersonPage, PersonStrategy};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;
use trawler_scanner::Person;

/// Tokens either side of a name searched for a role.
const ROLE_WINDOW: usize = 5;

/// Inference only runs when fewer people than this were found.
const INFERENCE_BELOW: usize = 2;

/// Inference needs more text than this to be worth a request.
const INFERENCE_MIN_TEXT: usize = 100;

/// Adjacent known first and last names, with a nearby known role.
pub struct DatabaseStrategy {
    names: Arc<NameDatabase>,
}

impl DatabaseStrategy {
    pub fn new(names: Arc<NameDatabase>) -> Self {
        Self { names }
    }

    fn find_people(&self, text: &str) -> Vec<Person> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let role_tokens: Vec<String> = words.iter().map(|w| role_token(w)).collect();
        let mut people = Vec::new();
        let mut seen = HashSet::new();

        for i in 0..words.len().saturating_sub(1) {
            let first = clean_word(words[i]);
            let last = clean_word(words[i + 1]);
            if !is_capitalized_name(&first) || !is_capitalized_name(&last) {
                continue;
            }
            if !self.names.is_first_name(&first) || !self.names.is_last_name(&last) {
                continue;
            }

            let person = Person::new(
                self.names.canonical_first(&first).unwrap_or(&first),
                self.names.canonical_last(&last).unwrap_or(&last),
                self.role_near(&role_tokens, i).unwrap_or_default(),
            );
            if seen.insert(person.key()) {
                people.push(person);
            }
        }

        people
    }

    /// Closest known role to the name at `index..=index + 1`, looking after
    /// the name first on ties. Two-word roles beat one-word roles.
    fn role_near(&self, tokens: &[String], index: usize) -> Option<String> {
        let last = index + 1;
        let window_end = (last + ROLE_WINDOW).min(tokens.len().saturating_sub(1));
        let mut positions: Vec<usize> = (index.saturating_sub(ROLE_WINDOW)..=window_end)
            .filter(|p| *p != index && *p != last)
            .collect();
        positions.sort_by_key(|&p| if p > last { (p - last, false) } else { (index - p, true) });

        for p in positions {
            let word = &tokens[p];
            if word.is_empty() {
                continue;
            }
            if p < window_end && !tokens[p + 1].is_empty() {
                let bigram = format!("{} {}", word, tokens[p + 1]);
                if self.names.is_role(&bigram) {
                    return Some(capitalize_role(&bigram));
                }
            }
            if self.names.is_role(word) {
                return Some(capitalize_role(word));
            }
        }
        None
    }
}

#[async_trait]
impl PersonStrategy for DatabaseStrategy {
    fn name(&self) -> &'static str {
        "database"
    }

    fn should_run(&self, _page: &PersonPage<'_>, _found: &[Person]) -> bool {
        self.names.first_name_count() > 0
    }

    async fn extract(&self, page: &PersonPage<'_>) -> Vec<Person> {
        self.find_people(page.text)
    }
}

/// Asks an [`InferenceClient`] when cheaper strategies came up short.
pub struct InferenceStrategy {
    client: Arc<dyn InferenceClient>,
}

impl InferenceStrategy {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PersonStrategy for InferenceStrategy {
    fn name(&self) -> &'static str {
        "inference"
    }

    fn should_run(&self, page: &PersonPage<'_>, found: &[Person]) -> bool {
        found.len() < INFERENCE_BELOW && page.text.trim().chars().count() > INFERENCE_MIN_TEXT
    }

    async fn extract(&self, page: &PersonPage<'_>) -> Vec<Person> {
        match self.client.infer_people(page.text, page.url).await {
            Ok(people) => people,
            Err(e) => {
                warn!("People inference failed for {}: {}", page.url, e);
                Vec::new()
            }
        }
    }
}

/// "Name, Title" phrasing and team-card markup.
pub struct PatternStrategy {
    names: Arc<NameDatabase>,
}

impl PatternStrategy {
    pub fn new(names: Arc<NameDatabase>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl PersonStrategy for PatternStrategy {
    fn name(&self) -> &'static str {
        "pattern"
    }

    async fn extract(&self, page: &PersonPage<'_>) -> Vec<Person> {
        let mut people = titled_people(page.text, &self.names);
        people.extend(card_people(page.html));
        people
    }
}

fn role_token(word: &str) -> String {
    word.chars()
        .filter(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_lowercase()
}

fn clean_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '-' || *c == '\'')
        .collect()
}

fn is_capitalized_name(word: &str) -> bool {
    word.chars().count() >= 2 && word.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}
