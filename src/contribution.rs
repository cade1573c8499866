//! The contribution module applies approved issues to the listings: adding,
//! editing or closing an opportunity, either from a filled-in issue form
//! or from fields extracted from the opportunity page by a model.

use anyhow::{Result, bail};
use log::{info, warn};

use crate::constants::{
    BOT_EMAIL, DEFAULT_LOCATION, DEFAULT_OPPORTUNITY_TYPE, DEFAULT_SEASON, DEFAULT_SPONSORSHIP,
    DEFAULT_TARGET_YEARS, REVIEW_WARNING,
};
use crate::extract::{ExtractContext, ExtractedFields, extract_fields};
use crate::issue::{IssueEvent, IssueFields, NOTES_ALIASES, find_url};
use crate::listing::{Category, Listing, generate_id};
use crate::normalize::{clean_url, is_same_url};
use crate::outputs::Outputs;
use crate::parse::PageContent;
use crate::storage::Storage;

// Heading keys of the detailed template come first, quick-add keys after.
const COMPANY_ALIASES: [&str; 4] = [
    "company/organization_name",
    "company_name",
    "company",
    "organization",
];
const TITLE_ALIASES: [&str; 5] = [
    "program/role_title",
    "role_title",
    "title",
    "role",
    "program",
];
const ADD_URL_ALIASES: [&str; 5] = [
    "link_to_opportunity_posting",
    "link_to_opportunity",
    "application_link",
    "link",
    "url",
];
const LOCATION_ALIASES: [&str; 2] = ["location", "locations"];
const CATEGORY_ALIASES: [&str; 2] = ["category", "opportunity_category"];
const TYPE_ALIASES: [&str; 3] = ["type_of_opportunity", "opportunity_type", "type"];
const SEASON_ALIASES: [&str; 2] = ["what_season_is_this_opportunity_for", "season"];
const SPONSORSHIP_ALIASES: [&str; 2] = ["sponsorship/citizenship_requirements", "sponsorship"];
const TARGET_YEAR_ALIASES: [&str; 2] = ["target_year", "class_year"];
const ACTIVE_ALIASES: [&str; 2] = [
    "is_this_opportunity_currently_accepting_applications",
    "accepting_applications",
];
const EMAIL_ALIASES: [&str; 2] = ["email_associated_with_your_github_account_optional", "email"];
const FIELD_ALIASES: [&str; 2] = ["research_field", "field"];
const EDIT_URL_ALIASES: [&str; 3] = ["url_of_the_opportunity_to_edit", "url", "link"];
const CHANGES_ALIASES: [&str; 2] = ["what_changes_need_to_be_made", "changes"];
const CLOSE_URL_ALIASES: [&str; 4] = ["job_url_optional", "job_url", "url", "link"];

/// Placeholder some models answer with instead of leaving a field empty.
const UNKNOWN_VALUE: &str = "Unknown";

/// Kind of contribution an issue asks for, chosen by its label.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContributionKind {
    New,
    Edit,
    Close,
}

impl ContributionKind {
    /// # Errors
    ///
    /// Returns an error when no label names a known contribution kind
    pub fn from_labels(labels: &[&str]) -> Result<Self> {
        if labels.contains(&"new_opportunity") {
            Ok(Self::New)
        } else if labels.contains(&"edit_opportunity") {
            Ok(Self::Edit)
        } else if labels.contains(&"close_opportunity") {
            Ok(Self::Close)
        } else {
            bail!("Unknown issue type. Labels: {labels:?}")
        }
    }
}

/// How edit requests are treated.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EditMode {
    /// Only bump `date_updated`; the requested changes are applied by hand.
    Bump,
    /// Reject every edit and ask for close-then-readd.
    #[default]
    Disabled,
}

impl std::str::FromStr for EditMode {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "bump" => Ok(EditMode::Bump),
            "disabled" => Ok(EditMode::Disabled),
            _ => Err(format!("Invalid edit mode: {}", input)),
        }
    }
}

/// What to do when a new listing duplicates an existing one.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DuplicatePolicy {
    /// Fail the run.
    #[default]
    Reject,
    /// Report `is_duplicate` outputs and finish without changes.
    Flag,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "reject" => Ok(DuplicatePolicy::Reject),
            "flag" => Ok(DuplicatePolicy::Flag),
            _ => Err(format!("Invalid duplicate policy: {}", input)),
        }
    }
}

/// What to do when the model does not confirm the opportunity targets underclassmen.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ReviewPolicy {
    /// Hold the listing back until a maintainer re-approves.
    #[default]
    Hold,
    /// Publish with a warning attached.
    Warn,
}

impl std::str::FromStr for ReviewPolicy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "hold" => Ok(ReviewPolicy::Hold),
            "warn" => Ok(ReviewPolicy::Warn),
            _ => Err(format!("Invalid review policy: {}", input)),
        }
    }
}

/// Behaviour switches of the handlers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct HandlerConfig {
    pub edit_mode: EditMode,
    pub duplicates: DuplicatePolicy,
    pub review: ReviewPolicy,
}

/// Result of a handler: its outputs, and whether the listings changed and
/// must be saved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub outputs: Outputs,
    pub changed: bool,
}

/// Commit metadata handed to the workflow for persisting a change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub message: String,
    pub contributor_name: String,
    pub contributor_email: String,
}

impl CommitInfo {
    fn new(verb: &str, listing: &Listing, author: &str, email: Option<&str>) -> Self {
        Self {
            message: format!("{verb} {} - {}", listing.company_name, listing.title),
            contributor_name: author.to_string(),
            contributor_email: email
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .unwrap_or(BOT_EMAIL)
                .to_string(),
        }
    }

    fn into_outcome(self) -> Outcome {
        let mut outputs = Outputs::new();
        outputs
            .set("commit_message", self.message)
            .set("contributor_name", self.contributor_name)
            .set("contributor_email", self.contributor_email);
        Outcome {
            outputs,
            changed: true,
        }
    }
}

/// An existing listing a new one collides with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Duplicate {
    pub id: String,
    pub reason: String,
}

impl Duplicate {
    fn into_outcome(self) -> Outcome {
        let mut outputs = Outputs::new();
        outputs
            .set("is_duplicate", "true")
            .set("duplicate_id", self.id)
            .set("duplicate_reason", self.reason)
            .set("commit_message", "");
        Outcome {
            outputs,
            changed: false,
        }
    }
}

/// Looks for a listing with the same normalized URL, or else the same
/// company and title ignoring case.
pub fn find_duplicate(
    listings: &[Listing],
    url: &str,
    company_name: &str,
    title: &str,
) -> Option<Duplicate> {
    listings.iter().find_map(|listing| {
        if is_same_url(&listing.url, url) {
            Some(Duplicate {
                id: listing.id.clone(),
                reason: "This URL already exists in the repository".to_string(),
            })
        } else if listing.is_same_role(company_name, title) {
            Some(Duplicate {
                id: listing.id.clone(),
                reason: format!("'{company_name} - {title}' already exists in the repository"),
            })
        } else {
            None
        }
    })
}

/// A listing about to be added, before it gets an id and timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewListing {
    pub company_name: String,
    pub title: String,
    pub url: String,
    pub locations: Vec<String>,
    pub season: String,
    pub category: Category,
    pub opportunity_type: String,
    pub field: Option<String>,
    pub target_year: Vec<String>,
    pub sponsorship: String,
    pub active: bool,
}

impl NewListing {
    fn into_listing(self, source: &str, now: i64) -> Listing {
        let field = self.field.filter(|_| self.category.schema().allows("field"));
        Listing {
            id: generate_id(),
            company_name: self.company_name,
            title: self.title,
            url: self.url,
            locations: self.locations,
            season: self.season,
            category: self.category,
            opportunity_type: self.opportunity_type,
            field,
            target_year: self.target_year,
            sponsorship: self.sponsorship,
            active: self.active,
            is_visible: true,
            date_posted: now,
            date_updated: now,
            source: source.to_string(),
        }
    }
}

/// Builds a new listing from an issue form, accepting both the detailed
/// and the quick-add templates.
///
/// # Errors
///
/// Returns an error if the URL, company or title is missing, or the
/// category is not one of the known categories
pub fn listing_from_issue(fields: &IssueFields) -> Result<NewListing> {
    let url = clean_url(fields.first_of(&ADD_URL_ALIASES).unwrap_or_default())?;

    let company_name = fields
        .first_of(&COMPANY_ALIASES)
        .map(str::trim)
        .unwrap_or_default();
    if company_name.is_empty() {
        bail!("Missing required field: Company Name");
    }
    let title = fields
        .first_of(&TITLE_ALIASES)
        .map(str::trim)
        .unwrap_or_default();
    if title.is_empty() {
        bail!("Missing required field: Title");
    }

    let opportunity_type = fields
        .first_of(&TYPE_ALIASES)
        .unwrap_or(DEFAULT_OPPORTUNITY_TYPE)
        .to_string();
    let category = match fields.first_of(&CATEGORY_ALIASES) {
        Some(category) => category.parse::<Category>().map_err(anyhow::Error::msg)?,
        None => infer_category(&opportunity_type),
    };

    let target_year = fields
        .first_of(&TARGET_YEAR_ALIASES)
        .map(split_target_years)
        .filter(|years| !years.is_empty())
        .unwrap_or_else(default_target_years);

    Ok(NewListing {
        company_name: company_name.to_string(),
        title: title.to_string(),
        url,
        locations: fields
            .first_of(&LOCATION_ALIASES)
            .map(split_locations)
            .unwrap_or_default(),
        season: fields
            .first_of(&SEASON_ALIASES)
            .unwrap_or(DEFAULT_SEASON)
            .to_string(),
        category,
        opportunity_type,
        field: fields.first_of(&FIELD_ALIASES).map(str::to_string),
        target_year,
        sponsorship: fields
            .first_of(&SPONSORSHIP_ALIASES)
            .unwrap_or(DEFAULT_SPONSORSHIP)
            .to_string(),
        active: fields
            .first_of(&ACTIVE_ALIASES)
            .is_none_or(|answer| answer.trim().to_lowercase().starts_with("yes")),
    })
}

/// Validates model output and builds a new listing from it.
///
/// # Errors
///
/// Returns an error if the company or title could not be determined or
/// the category is not one of the known categories
pub fn listing_from_extraction(extracted: &ExtractedFields, url: String) -> Result<NewListing> {
    let known = |value: &Option<String>| {
        value
            .as_deref()
            .filter(|value| *value != UNKNOWN_VALUE)
            .map(str::to_string)
    };

    let Some(company_name) = known(&extracted.company_name) else {
        bail!(
            "AI extraction failed: could not determine the company name. Please use the Quick Add template instead."
        );
    };
    let Some(title) = known(&extracted.title) else {
        bail!(
            "AI extraction failed: could not determine the role/program title. Please use the Quick Add template instead."
        );
    };

    let category_name = extracted.category.as_deref().unwrap_or_default();
    let category = match Category::ALL
        .into_iter()
        .find(|category| category.as_str() == category_name)
    {
        Some(category) => category,
        None => bail!(
            "AI extraction returned invalid category '{category_name}'. Expected one of: {}. Please use the Quick Add template instead.",
            Category::ALL.map(Category::as_str).join(", ")
        ),
    };

    let mut locations: Vec<String> = extracted
        .locations
        .iter()
        .flatten()
        .map(|location| location.trim())
        .filter(|location| !location.is_empty())
        .filter(|location| !location.starts_with("http") && !location.contains('<'))
        .map(str::to_string)
        .collect();
    if locations.is_empty() {
        locations.push(DEFAULT_LOCATION.to_string());
    }

    Ok(NewListing {
        company_name,
        title,
        url,
        locations,
        season: extracted
            .season
            .clone()
            .unwrap_or_else(|| DEFAULT_SEASON.to_string()),
        category,
        opportunity_type: extracted
            .opportunity_type
            .clone()
            .unwrap_or_else(|| DEFAULT_OPPORTUNITY_TYPE.to_string()),
        field: extracted.field.clone(),
        target_year: default_target_years(),
        sponsorship: extracted
            .sponsorship
            .clone()
            .unwrap_or_else(|| DEFAULT_SPONSORSHIP.to_string()),
        active: true,
    })
}

fn infer_category(opportunity_type: &str) -> Category {
    match opportunity_type.trim().to_lowercase().as_str() {
        "internship" => Category::Internship,
        "research" => Category::Research,
        "scholarship" => Category::Scholarship,
        _ => Category::Program,
    }
}

fn default_target_years() -> Vec<String> {
    DEFAULT_TARGET_YEARS.map(str::to_string).to_vec()
}

fn split_locations(value: &str) -> Vec<String> {
    value
        .split(['|', '\n'])
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits a comma list or a checkbox list (`- [X] Freshman`), skipping
/// unchecked boxes.
fn split_target_years(value: &str) -> Vec<String> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|year| !year.starts_with("- [ ]"))
        .map(|year| {
            year.strip_prefix("- [x]")
                .or_else(|| year.strip_prefix("- [X]"))
                .unwrap_or(year)
                .trim()
        })
        .filter(|year| !year.is_empty())
        .map(str::to_string)
        .collect()
}

/// Appends `candidate` unless it duplicates an existing listing.
///
/// # Errors
///
/// Returns an error on a duplicate when `policy` is [`DuplicatePolicy::Reject`]
pub fn add_listing(
    listings: &mut Vec<Listing>,
    candidate: NewListing,
    author: &str,
    email: Option<&str>,
    policy: DuplicatePolicy,
    now: i64,
) -> Result<Outcome> {
    if let Some(duplicate) = find_duplicate(
        listings,
        &candidate.url,
        &candidate.company_name,
        &candidate.title,
    ) {
        return match policy {
            DuplicatePolicy::Reject => bail!(
                "Duplicate: This opportunity already exists (ID: {}). {}",
                duplicate.id,
                duplicate.reason
            ),
            DuplicatePolicy::Flag => {
                warn!("DUPLICATE DETECTED: {} (ID: {})", duplicate.reason, duplicate.id);
                Ok(duplicate.into_outcome())
            }
        };
    }

    let listing = candidate.into_listing(author, now);
    let commit = CommitInfo::new("Add", &listing, author, email);
    info!(
        "Successfully added: {} - {}",
        listing.company_name, listing.title
    );
    listings.push(listing);

    Ok(commit.into_outcome())
}

/// Adds the opportunity described by a new-opportunity issue form.
///
/// # Errors
///
/// Returns an error on missing or invalid fields, or a rejected duplicate
pub fn handle_new(
    fields: &IssueFields,
    author: &str,
    listings: &mut Vec<Listing>,
    config: &HandlerConfig,
    now: i64,
) -> Result<Outcome> {
    let candidate = listing_from_issue(fields)?;
    add_listing(
        listings,
        candidate,
        author,
        fields.first_of(&EMAIL_ALIASES),
        config.duplicates,
        now,
    )
}

/// Handles an edit request according to `mode`.
///
/// # Errors
///
/// Returns an error when editing is disabled, the URL is missing, or it
/// does not identify exactly one listing
pub fn handle_edit(
    fields: &IssueFields,
    author: &str,
    listings: &mut [Listing],
    mode: EditMode,
    now: i64,
) -> Result<Outcome> {
    if mode == EditMode::Disabled {
        bail!(
            "Editing listings is not supported. Please close the existing listing with the Close Opportunity template and submit the updated opportunity as a new one."
        );
    }

    let url = clean_url(fields.require(&EDIT_URL_ALIASES, "URL of opportunity to edit")?)?;

    let mut matches = listings
        .iter_mut()
        .filter(|listing| is_same_url(&listing.url, &url));
    let (Some(listing), None) = (matches.next(), matches.next()) else {
        bail!("Could not find a unique opportunity with URL: {url}");
    };

    if let Some(changes) = fields.first_of(&CHANGES_ALIASES) {
        info!("Requested changes for {url}: {changes}");
    }
    listing.touch(now);

    let commit = CommitInfo::new("Edit", listing, author, None);
    info!(
        "Successfully edited: {} - {}",
        listing.company_name, listing.title
    );

    Ok(commit.into_outcome())
}

/// Marks the listing named by a close-opportunity issue as inactive.
///
/// # Errors
///
/// Returns an error if company or title is missing, nothing matches, or
/// several listings match and no URL narrows them down
pub fn handle_close(
    fields: &IssueFields,
    author: &str,
    listings: &mut [Listing],
    now: i64,
) -> Result<Outcome> {
    let company_name = fields.first_of(&COMPANY_ALIASES).map(str::trim);
    let title = fields.first_of(&TITLE_ALIASES).map(str::trim);
    let (Some(company_name), Some(title)) = (company_name, title) else {
        bail!("Missing required fields: Company Name and Title");
    };

    let url = match fields.first_of(&CLOSE_URL_ALIASES) {
        Some(url) => Some(clean_url(url)?),
        None => None,
    };

    let mut matches: Vec<&mut Listing> = listings
        .iter_mut()
        .filter(|listing| listing.is_same_role(company_name, title))
        .filter(|listing| {
            url.as_deref()
                .is_none_or(|url| is_same_url(&listing.url, url))
        })
        .collect();

    if matches.len() > 1 {
        bail!(
            "Found multiple matches for {company_name} - {title}. Please provide the URL to identify the specific listing."
        );
    }
    let Some(listing) = matches.pop() else {
        bail!("Could not find opportunity: {company_name} - {title}");
    };

    listing.close(now);

    let commit = CommitInfo::new("Close", listing, author, None);
    info!("Successfully closed: {company_name} - {title}");

    Ok(commit.into_outcome())
}

/// Dispatches an approved issue to the handler its label selects.
///
/// # Errors
///
/// Returns an error if the label is unknown or the handler fails
pub fn handle_issue(
    event: &IssueEvent,
    listings: &mut Vec<Listing>,
    config: &HandlerConfig,
    now: i64,
) -> Result<Outcome> {
    let fields = IssueFields::parse(event.body());
    let author = event.author();

    match ContributionKind::from_labels(&event.labels())? {
        ContributionKind::New => handle_new(&fields, author, listings, config, now),
        ContributionKind::Edit => handle_edit(&fields, author, listings, config.edit_mode, now),
        ContributionKind::Close => handle_close(&fields, author, listings, now),
    }
}

/// Applies an approved issue to the listings document.
///
/// # Errors
///
/// Returns an error if the document cannot be read or written, or the
/// issue cannot be applied. Nothing is saved on error.
pub fn process_approved(
    event: &IssueEvent,
    storage: &Storage,
    config: &HandlerConfig,
    now: i64,
) -> Result<Outputs> {
    let mut snapshot = storage.load_snapshot()?;
    let outcome = handle_issue(event, &mut snapshot.listings, config, now)?;

    if outcome.changed {
        storage.save_snapshot(&snapshot)?;
    }

    Ok(outcome.outputs)
}

/// URL and notes an auto-extract issue submits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub url: String,
    pub notes: String,
}

impl ExtractionRequest {
    /// # Errors
    ///
    /// Returns an error if the issue body holds no usable URL
    pub fn from_event(event: &IssueEvent) -> Result<Self> {
        let body = event.body();
        let fields = IssueFields::parse(body);

        let Some(url) = find_url(body, &fields) else {
            bail!("No URL found in issue body. Please make sure to include a valid URL.");
        };

        Ok(Self {
            url: clean_url(&url)?,
            notes: fields
                .first_of(&NOTES_ALIASES)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Adds the opportunity on a fetched page, as extracted by the model.
///
/// Unconfirmed underclassmen targeting is handled by `config.review`,
/// duplicates by `config.duplicates`.
///
/// # Errors
///
/// Returns an error if the fetch failed, the model fails or answers with
/// unusable fields, or a duplicate is rejected
pub async fn add_extracted(
    page: &PageContent,
    notes: &str,
    author: &str,
    listings: &mut Vec<Listing>,
    ctx: &ExtractContext<'_>,
    config: &HandlerConfig,
    now: i64,
) -> Result<Outcome> {
    if let Some(error) = &page.error {
        bail!("Failed to fetch page: {error}");
    }

    info!("Page title: {}", page.title);
    info!("Content length: {} chars", page.text.chars().count());
    info!("Extracting details with AI...");

    let extracted = extract_fields(page, notes, ctx).await?;
    info!("Extracted: {}", extracted.raw);

    let candidate = listing_from_extraction(&extracted, page.url.clone())?;

    let mut outputs = Outputs::new();
    if !extracted.is_underclassmen {
        match config.review {
            ReviewPolicy::Hold => {
                warn!("Not confirmed as underclassmen-specific. Skipping auto-add.");
                outputs
                    .set("needs_review", "true")
                    .set("warning", REVIEW_WARNING)
                    .set("commit_message", "");
                return Ok(Outcome {
                    outputs,
                    changed: false,
                });
            }
            ReviewPolicy::Warn => {
                warn!("Not confirmed as underclassmen-specific. Adding with a warning.");
                outputs.set("warning", REVIEW_WARNING);
            }
        }
    }

    let mut outcome = add_listing(listings, candidate, author, None, config.duplicates, now)?;
    if outcome.changed {
        outputs.set("extracted_data", extracted.raw.to_string());
    }
    for (name, value) in outcome.outputs.iter() {
        outputs.set(name, value);
    }
    outcome.outputs = outputs;

    Ok(outcome)
}

/// Runs the auto-extract flow: find the URL, fetch the page, extract and add.
///
/// # Errors
///
/// Returns an error if any step fails. Nothing is saved on error.
pub async fn auto_extract(
    event: &IssueEvent,
    storage: &Storage,
    ctx: &ExtractContext<'_>,
    text_by: crate::TextBy,
    config: &HandlerConfig,
    now: i64,
) -> Result<Outputs> {
    let request = ExtractionRequest::from_event(event)?;
    info!("Extracted URL: {}", request.url);
    info!("Fetching content from: {}", request.url);

    let page = crate::parse::fetch_page_content(&request.url, text_by).await;

    let mut snapshot = storage.load_snapshot()?;
    let outcome = add_extracted(
        &page,
        &request.notes,
        event.author(),
        &mut snapshot.listings,
        ctx,
        config,
        now,
    )
    .await?;

    if outcome.changed {
        storage.save_snapshot(&snapshot)?;
    }

    Ok(outcome.outputs)
}
