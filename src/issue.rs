//! GitHub issue events and the `### Heading` issue-form body they carry.

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::constants::{NO_RESPONSE, UNKNOWN_AUTHOR, URL_PATTERN};

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(URL_PATTERN).expect("Failed to compile URL_PATTERN regex"));

const HEADING_MARKER: &str = "### ";

/// The subset of a GitHub `issues` event payload the bot reads.
#[derive(Debug, Default, Deserialize)]
pub struct IssueEvent {
    #[serde(default)]
    pub issue: Issue,
}

#[derive(Debug, Default, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub login: String,
}

impl IssueEvent {
    /// Reads an event payload from the file GitHub Actions points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not an event payload
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?;
        Self::from_json(&content)
    }

    /// # Errors
    ///
    /// Returns an error if `content` is not a JSON event payload
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Event file is not a valid issue event")
    }

    pub fn body(&self) -> &str {
        self.issue.body.as_deref().unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.issue
            .labels
            .iter()
            .map(|label| label.name.as_str())
            .collect()
    }

    /// Login of the issue author, `unknown` when the payload has none.
    pub fn author(&self) -> &str {
        self.issue
            .user
            .as_ref()
            .map(|user| user.login.as_str())
            .filter(|login| !login.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR)
    }
}

/// Fields of an issue-form body keyed by their normalized heading.
///
/// A key is present only when the form section held an actual answer, so
/// `get` returning `None` means "not provided" for every caller alike.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssueFields {
    fields: BTreeMap<String, String>,
}

impl IssueFields {
    /// Parses an issue body. Never fails: unknown headings are kept,
    /// absent ones simply have no entry.
    pub fn parse(body: &str) -> Self {
        let mut fields = BTreeMap::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in body.lines() {
            if let Some(heading) = line.strip_prefix(HEADING_MARKER) {
                if let Some((key, value)) = current.take() {
                    insert_field(&mut fields, key, &value);
                }
                current = Some((field_key(heading), Vec::new()));
            } else if let Some((_, value)) = current.as_mut()
                && line.trim() != NO_RESPONSE
            {
                value.push(line);
            }
        }

        if let Some((key, value)) = current {
            insert_field(&mut fields, key, &value);
        }

        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value of the first alias present, trying aliases in order.
    pub fn first_of(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.get(alias))
    }

    /// Like [`IssueFields::first_of`] but a missing value is an input error.
    ///
    /// # Errors
    ///
    /// Returns "Missing required field: {label}" when no alias is present
    pub fn require(&self, aliases: &[&str], label: &str) -> Result<&str> {
        match self.first_of(aliases) {
            Some(value) => Ok(value),
            None => bail!("Missing required field: {label}"),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Turns `Company/Organization Name (optional)?` into
/// `company/organization_name_optional`.
pub fn field_key(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['?', '(', ')'], "")
}

fn insert_field(fields: &mut BTreeMap<String, String>, key: String, lines: &[&str]) {
    let value = lines.join("\n").trim().to_string();
    if !value.is_empty() {
        fields.insert(key, value);
    }
}

/// Field names the URL of an opportunity may be submitted under.
pub const URL_ALIASES: [&str; 5] = [
    "link_to_opportunity",
    "link",
    "url",
    "link_to_opportunity_posting",
    "application_link",
];

pub const NOTES_ALIASES: [&str; 2] = ["any_additional_context_optional", "notes"];

/// Finds the opportunity URL of an auto-extract issue: a known URL field
/// first, otherwise the first http(s) URL anywhere in the body.
pub fn find_url(body: &str, fields: &IssueFields) -> Option<String> {
    URL_ALIASES
        .iter()
        .filter_map(|alias| fields.get(alias))
        .map(str::trim)
        .find(|value| value.starts_with("http"))
        .map(str::to_string)
        .or_else(|| URL_REGEX.find(body).map(|found| found.as_str().to_string()))
}
