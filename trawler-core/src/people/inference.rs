use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use trawler_scanner::Person;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "nvidia/nemotron-nano-9b-v2:free";

/// Characters of page text sent with each request.
pub const MAX_PROMPT_TEXT: usize = 3000;

const ROLE_ACRONYMS: &[&str] = &["ceo", "cto", "cfo", "coo", "cmo", "cio", "vp"];
const ROLE_CONNECTIVES: &[&str] = &["and", "of", "the", "for", "in", "at", "to", "&"];

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("static object pattern"));

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;

/// Something that can name the people mentioned in a page's text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer_people(&self, text: &str, url: &str) -> Result<Vec<Person>>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InferredPerson {
    #[serde(default, alias = "firstName")]
    first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    last_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl InferenceClient for ChatCompletionsClient {
    async fn infer_people(&self, text: &str, url: &str) -> Result<Vec<Person>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(text, url),
            }],
            max_tokens: 2000,
            temperature: 0.1,
        };

        debug!("Requesting people inference for {} from {}", url, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| InferenceError::MalformedResponse("no choices in response".into()))?;

        Ok(parse_people(&content))
    }
}

pub fn build_prompt(text: &str, url: &str) -> String {
    let excerpt: String = text.chars().take(MAX_PROMPT_TEXT).collect();
    format!(
        "Analyze the following website text and extract ALL person names with their roles/job titles. \
         Focus on executive team members, founders, employees, and any people mentioned.\n\n\
         Website: {url}\n\n\
         Text Content:\n{excerpt}\n\n\
         IMPORTANT: Return ONLY a valid JSON array with objects containing firstName, lastName, role. \
         Example: [{{\"firstName\":\"John\",\"lastName\":\"Doe\",\"role\":\"CEO\"}}]\n\
         If no people found, return empty array [].\n\
         Extract as many people as you can find."
    )
}

/// People from a model reply. Tolerates prose around the array and
/// malformed JSON; entries without a first name are dropped.
pub fn parse_people(reply: &str) -> Vec<Person> {
    let reply = reply.trim();
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    let array = &reply[start..=end];

    let inferred = match serde_json::from_str::<Vec<InferredPerson>>(array) {
        Ok(people) => people,
        Err(e) => {
            warn!("Inference reply is not valid JSON ({}), scanning entries", e);
            JSON_OBJECT
                .find_iter(array)
                .map(|m| scan_entry(m.as_str()))
                .collect()
        }
    };

    inferred
        .into_iter()
        .filter_map(|p| {
            let first = p.first_name.filter(|f| !f.trim().is_empty())?;
            Some(Person::new(
                capitalize_name(&first),
                p.last_name.as_deref().map(capitalize_name).unwrap_or_default(),
                p.role.as_deref().map(capitalize_role).unwrap_or_default(),
            ))
        })
        .collect()
}

fn scan_entry(entry: &str) -> InferredPerson {
    InferredPerson {
        first_name: field_value(entry, &["firstName", "first_name"]),
        last_name: field_value(entry, &["lastName", "last_name"]),
        role: field_value(entry, &["role"]),
    }
}

fn field_value(entry: &str, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let key = regex::escape(key);
        [
            format!(r#""{key}"\s*:\s*"([^"]+)""#),
            format!(r#""{key}"\s*:\s*'([^']+)'"#),
            format!(r#""{key}"\s*:\s*([^,}}\s]+)"#),
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .find_map(|re| re.captures(entry).map(|c| c[1].trim().to_string()))
        .filter(|value| value != "null")
    })
}

/// Title-case each word; spaces and hyphens both separate words.
pub fn capitalize_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case a job title, keeping executive acronyms upper and connectives lower.
pub fn capitalize_role(role: &str) -> String {
    role.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            if ROLE_ACRONYMS.contains(&lower.as_str()) {
                word.to_uppercase()
            } else if ROLE_CONNECTIVES.contains(&lower.as_str()) {
                lower
            } else {
                title_case(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
