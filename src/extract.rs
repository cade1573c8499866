//! The extract module turns fetched page content into opportunity fields
//! using an LLM model. Its output is untrusted and validated by callers.

use anyhow::{Context, Result};
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatProvider};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::str::FromStr;
use url::Url;

use crate::constants::{
    CODE_FENCE_END, CODE_FENCE_START, DEFAULT_PROMPT_TEMPLATE, MAX_TOKENS,
    MODEL_API_KEY_ENV_NAME, SYSTEM_PROMPT, TEMPERATURE, THINK_STRIPPER,
};
use crate::parse::PageContent;

static THINK_STRIPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(THINK_STRIPPER).expect("Failed to compile THINK_STRIPPER regex"));

static CODE_FENCE_START_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(CODE_FENCE_START).expect("Failed to compile CODE_FENCE_START regex")
});

static CODE_FENCE_END_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(CODE_FENCE_END).expect("Failed to compile CODE_FENCE_END regex"));

/// Shared data for extraction calls
pub struct ExtractContext<'a> {
    /// LLM model answering the extraction prompt
    pub model: &'a dyn ChatProvider,
    /// Prompt template to use instead of the built-in one
    pub prompt_template: Option<&'a str>,
}

/// Fields the model reported, read leniently from its JSON object.
///
/// Values of the wrong JSON type are treated as absent.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedFields {
    pub company_name: Option<String>,
    pub title: Option<String>,
    pub locations: Option<Vec<String>>,
    pub category: Option<String>,
    pub opportunity_type: Option<String>,
    pub field: Option<String>,
    pub season: Option<String>,
    pub sponsorship: Option<String>,
    pub is_underclassmen: bool,
    /// The JSON object as returned, for reporting.
    pub raw: Value,
}

impl ExtractedFields {
    pub fn from_value(raw: Value) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let locations = raw.get("locations").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });

        Self {
            company_name: text("company_name"),
            title: text("title"),
            locations,
            category: text("category"),
            opportunity_type: text("opportunity_type"),
            field: text("field"),
            season: text("season"),
            sponsorship: text("sponsorship"),
            is_underclassmen: raw
                .get("is_underclassmen")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            raw,
        }
    }
}

/// Builds the extraction model from a model URL such as `openai://gpt-4o-mini`:
/// the scheme selects the backend, the host (and user part) names the model.
///
/// # Errors
///
/// Returns an error if the API key is missing, the URL is invalid,
/// or the model fails to build
pub fn build_model(model: &str, api_key: Option<String>) -> Result<Box<dyn llm::LLMProvider>> {
    let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
        anyhow::bail!(
            "{MODEL_API_KEY_ENV_NAME} environment variable not set. Add it as a repository secret."
        );
    };

    let model_url = Url::parse(model).map_err(|e| anyhow::anyhow!("Invalid model URL: {}", e))?;
    let model_name = [
        model_url
            .host_str()
            .context("Specify model name as host URL.")?,
        model_url.username(),
    ]
    .iter()
    .filter(|x| !x.is_empty())
    .cloned()
    .collect::<Vec<_>>()
    .join(":");

    info!("Using {} model {model_name}", model_url.scheme());

    LLMBuilder::new()
        .backend(
            LLMBackend::from_str(model_url.scheme())
                .map_err(|e| anyhow::anyhow!("Invalid LLM backend: {}", e))?,
        )
        .model(model_name)
        .api_key(api_key)
        .system(SYSTEM_PROMPT)
        .temperature(TEMPERATURE)
        .max_tokens(MAX_TOKENS)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))
}

/// Fills the prompt template with the page and the submitter's notes.
pub fn build_prompt(page: &PageContent, notes: &str, prompt_template: Option<&str>) -> String {
    prompt_template
        .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
        .replace("{title}", &page.title)
        .replace("{url}", &page.url)
        .replace("{notes}", notes)
        .replace("{text}", &page.text)
}

/// Asks the model for the opportunity fields of `page`.
///
/// # Arguments
///
/// * `page` - Fetched page content
/// * `notes` - Free-form notes from the submitter
/// * `ctx` - Context containing the model and prompt template
///
/// # Errors
///
/// Returns an error if:
/// * LLM chat operation fails
/// * The answer is not a JSON object; the message includes the raw answer
pub async fn extract_fields(
    page: &PageContent,
    notes: &str,
    ctx: &ExtractContext<'_>,
) -> Result<ExtractedFields> {
    let prompt = build_prompt(page, notes, ctx.prompt_template);
    let mut messages = vec![ChatMessage::user().content(prompt).build()];

    if let Some(template) = ctx.prompt_template
        && !template.contains("{text}")
    {
        messages.push(ChatMessage::user().content(page.text.as_str()).build());
    }

    let response = ctx
        .model
        .chat(&messages)
        .await
        .map_err(|err| anyhow::anyhow!("AI completion error: {err}"))?
        .to_string();

    debug!("Model answered: {response}");

    parse_response(&response)
}

/// Parses a model answer, tolerating reasoning blocks and code fences.
///
/// # Errors
///
/// Returns an error if the answer is not a JSON object
pub fn parse_response(response: &str) -> Result<ExtractedFields> {
    let stripped = THINK_STRIPPER_REGEX.replace_all(response, "");
    let stripped = stripped.trim();
    let stripped = CODE_FENCE_START_REGEX.replace(stripped, "");
    let stripped = CODE_FENCE_END_REGEX.replace(&stripped, "");
    let stripped = stripped.trim();

    let value: Value = serde_json::from_str(stripped).map_err(|e| {
        anyhow::anyhow!("Failed to parse AI response as JSON: {e}\nResponse: {stripped}")
    })?;

    if !value.is_object() {
        anyhow::bail!("AI response is not a JSON object\nResponse: {stripped}");
    }

    Ok(ExtractedFields::from_value(value))
}
