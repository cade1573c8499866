//! The listing record persisted in the listings document, and the
//! per-category schemas it is validated against before rendering.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields every listing must carry, whatever its category.
pub const REQUIRED_FIELDS: [&str; 15] = [
    "id",
    "company_name",
    "title",
    "url",
    "locations",
    "season",
    "category",
    "opportunity_type",
    "target_year",
    "sponsorship",
    "active",
    "is_visible",
    "date_posted",
    "date_updated",
    "source",
];

/// Section of the README a listing is published under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Internship,
    Program,
    Research,
    Scholarship,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Internship,
        Category::Program,
        Category::Research,
        Category::Scholarship,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Internship => "Internship",
            Category::Program => "Program",
            Category::Research => "Research",
            Category::Scholarship => "Scholarship",
        }
    }

    /// Required and optional fields for listings of this category.
    pub fn schema(self) -> Schema {
        match self {
            Category::Research => Schema {
                required: &REQUIRED_FIELDS,
                optional: &["field"],
            },
            Category::Internship | Category::Program | Category::Scholarship => Schema {
                required: &REQUIRED_FIELDS,
                optional: &[],
            },
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "internship" | "internships" => Ok(Category::Internship),
            "program" | "programs" => Ok(Category::Program),
            "research" => Ok(Category::Research),
            "scholarship" | "scholarships" => Ok(Category::Scholarship),
            _ => Err(format!(
                "Invalid category '{}'. Expected one of: {}",
                input.trim(),
                Category::ALL.map(Category::as_str).join(", ")
            )),
        }
    }
}

/// Field requirements of one category.
#[derive(Clone, Copy, Debug)]
pub struct Schema {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// Fields only some categories may carry.
const CATEGORY_FIELDS: [&str; 1] = ["field"];

impl Schema {
    pub fn allows(&self, field: &str) -> bool {
        self.required.contains(&field) || self.optional.contains(&field)
    }

    /// Returns the first category-specific field set in `document` that
    /// this schema does not allow.
    pub fn unexpected_field(
        &self,
        document: &serde_json::Map<String, Value>,
    ) -> Option<&'static str> {
        CATEGORY_FIELDS
            .iter()
            .find(|field| {
                document.get(**field).is_some_and(|value| !value.is_null()) && !self.allows(field)
            })
            .copied()
    }

    /// Returns the first required field missing from `document`.
    pub fn missing_field(&self, document: &serde_json::Map<String, Value>) -> Option<&'static str> {
        self.required
            .iter()
            .find(|field| !document.contains_key(**field))
            .copied()
    }
}

/// Checks every raw listing document against its category schema.
///
/// # Errors
///
/// Fails on the first listing that is not an object, has an unknown
/// category, lacks a required field or sets a field its category does not
/// allow. The message names the listing id.
pub fn check_schema(documents: &[Value]) -> Result<()> {
    for document in documents {
        let Some(object) = document.as_object() else {
            bail!("Listing is not a JSON object: {document}");
        };
        let id = object.get("id").and_then(Value::as_str).unwrap_or("unknown");

        let category = match object.get("category").and_then(Value::as_str) {
            Some(category) => category
                .parse::<Category>()
                .map_err(|e| anyhow::anyhow!("Listing {id}: {e}"))?,
            None => bail!("Listing {id} missing field: category"),
        };

        let schema = category.schema();
        if let Some(field) = schema.missing_field(object) {
            bail!("Listing {id} missing field: {field}");
        }
        if let Some(field) = schema.unexpected_field(object) {
            bail!("Listing {id}: field '{field}' is not allowed for category {category}");
        }
    }

    Ok(())
}

/// One opportunity as stored in the listings document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub company_name: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default = "default_season")]
    pub season: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_opportunity_type")]
    pub opportunity_type: String,
    /// Only meaningful for research listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub target_year: Vec<String>,
    #[serde(default = "default_sponsorship")]
    pub sponsorship: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub date_posted: i64,
    #[serde(default)]
    pub date_updated: i64,
    #[serde(default)]
    pub source: String,
}

impl Listing {
    /// Case-insensitive company and title comparison.
    pub fn is_same_role(&self, company_name: &str, title: &str) -> bool {
        self.company_name.to_lowercase() == company_name.to_lowercase()
            && self.title.to_lowercase() == title.to_lowercase()
    }

    pub fn touch(&mut self, now: i64) {
        self.date_updated = now;
    }

    pub fn close(&mut self, now: i64) {
        self.active = false;
        self.touch(now);
    }
}

fn default_season() -> String {
    crate::constants::DEFAULT_SEASON.to_string()
}

fn default_opportunity_type() -> String {
    crate::constants::DEFAULT_OPPORTUNITY_TYPE.to_string()
}

fn default_sponsorship() -> String {
    crate::constants::DEFAULT_SPONSORSHIP.to_string()
}

fn default_true() -> bool {
    true
}

/// Generates a fresh listing id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
