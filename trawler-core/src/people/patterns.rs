use super::inference::capitalize_role;
use super::names::{NameDatabase, is_valid_name};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use trawler_scanner::Person;

const NAME: &str = r"(?P<first>[A-Z][a-z]+(?:-[A-Z][a-z]+)?)\s+(?P<last>[A-Z][a-z]+(?:['-][A-Z][a-z]+)?)";

/// "Jane Doe, CEO" and "Jane Doe - Head of Sales"
static NAME_THEN_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{NAME}\s*(?:,|-|–|\|)\s*(?P<title>[^,.;:|()\n]{{2,80}})"))
        .expect("static name-title pattern")
});

/// "CEO: Jane Doe"
static TITLE_THEN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<title>\b(?:[A-Z][A-Za-z-]*|of|and|for|&)(?:\s+(?:[A-Z][A-Za-z-]*|of|and|for|&)){{0,5}})\s*:\s*{NAME}\b"
    ))
    .expect("static title-name pattern")
});

static NAME_CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class*='name']").expect("static selector"));

const CARD_TITLE_CLASSES: &[&str] = &["title", "role", "position", "job"];

/// Words that start or carry a job title.
const ROLE_WORDS: &[&str] = &[
    "ceo", "cto", "cfo", "coo", "cmo", "cio", "vp", "chief", "head", "vice", "senior", "lead",
    "managing", "executive", "founder", "co-founder", "cofounder", "director", "manager",
    "president", "officer", "engineer", "partner", "owner", "designer", "developer", "analyst",
    "consultant", "coordinator", "specialist", "principal", "associate", "assistant",
    "secretary", "treasurer", "chair", "chairman", "chairwoman", "chairperson", "advisor",
    "architect", "scientist", "editor", "producer", "recruiter",
];

const CONNECTIVES: &[&str] = &["of", "and", "for", "&"];

/// Capitalized words that open sentences and headings rather than names.
const NOT_NAMES: &[&str] = &[
    "about", "contact", "meet", "our", "the", "team", "read", "more", "learn", "call", "email",
    "follow", "join", "view", "see", "leadership", "welcome", "home", "company",
];

/// People named next to a job title in running text.
pub(crate) fn titled_people(text: &str, names: &NameDatabase) -> Vec<Person> {
    let mut people = Vec::new();

    for captures in NAME_THEN_TITLE.captures_iter(text) {
        let (first, last) = (&captures["first"], &captures["last"]);
        if !is_plausible_name(first, last) {
            continue;
        }
        let words: Vec<&str> = captures["title"].split_whitespace().collect();
        if let Some(title) = trim_title(&words, names) {
            people.push(Person::new(first, last, capitalize_role(&title)));
        }
    }

    for captures in TITLE_THEN_NAME.captures_iter(text) {
        let (first, last) = (&captures["first"], &captures["last"]);
        if !is_plausible_name(first, last) {
            continue;
        }
        let words: Vec<&str> = captures["title"].split_whitespace().collect();
        let start = words
            .iter()
            .position(|w| is_role_word(w, names))
            .unwrap_or(words.len());
        if let Some(title) = trim_title(&words[start..], names) {
            people.push(Person::new(first, last, capitalize_role(&title)));
        }
    }

    people
}

/// Team cards: an element classed like `name` next to one classed like a title.
pub(crate) fn card_people(html: &str) -> Vec<Person> {
    if html.is_empty() {
        return Vec::new();
    }
    let document = Html::parse_document(html);
    let mut people = Vec::new();

    for name_el in document.select(&NAME_CARD) {
        let full_name = element_text(name_el);
        let parts: Vec<&str> = full_name.split_whitespace().collect();
        if !(2..=4).contains(&parts.len()) || !parts.iter().all(|p| is_card_name_part(p)) {
            continue;
        }

        let Some(role) = sibling_title(name_el) else {
            continue;
        };
        people.push(Person::new(parts[0], parts[1..].join(" "), capitalize_role(&role)));
    }

    people
}

fn sibling_title(name_el: ElementRef<'_>) -> Option<String> {
    let parent = name_el.parent().and_then(ElementRef::wrap)?;
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.id() != name_el.id())
        .find(|el| {
            el.value().attr("class").is_some_and(|class| {
                let class = class.to_lowercase();
                CARD_TITLE_CLASSES.iter().any(|c| class.contains(c))
            })
        })
        .map(element_text)
        .filter(|title| !title.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep title words up to the last one that is a role word or follows a
/// connective ("Head of Sales"), so trailing names are cut off.
fn trim_title(words: &[&str], names: &NameDatabase) -> Option<String> {
    let mut end = 0;
    for (i, word) in words.iter().take(6).enumerate() {
        let lower = word.to_lowercase();
        let acronym = word.len() >= 2 && word.chars().all(|c| c.is_ascii_uppercase());
        let capitalized = word.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        let connective = CONNECTIVES.contains(&lower.as_str());
        if !(acronym || capitalized || connective) {
            break;
        }
        let after_connective = i > 0 && CONNECTIVES.contains(&words[i - 1].to_lowercase().as_str());
        if is_role_word(word, names) || (after_connective && !connective) {
            end = i + 1;
        }
    }

    let title = words[..end].join(" ");
    let has_role = words[..end].iter().any(|w| is_role_word(w, names));
    (has_role || names.is_role(&title)).then_some(title)
}

fn is_role_word(word: &str, names: &NameDatabase) -> bool {
    let lower = word.to_lowercase();
    ROLE_WORDS.contains(&lower.as_str()) || names.is_role(&lower)
}

fn is_plausible_name(first: &str, last: &str) -> bool {
    [first, last].iter().all(|part| {
        let lower = part.to_lowercase();
        is_valid_name(part) && !NOT_NAMES.contains(&lower.as_str()) && !ROLE_WORDS.contains(&lower.as_str())
    })
}

fn is_card_name_part(part: &str) -> bool {
    part.chars().next().is_some_and(|c| c.is_uppercase()) && is_valid_name(part.trim_end_matches('.'))
}
