//! The compose module renders the visible listings as markdown tables, one
//! per category, and splices them into the README between marker comments.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use chrono_tz::America::Los_Angeles;
use log::info;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::constants::{APPLY_BUTTON_URL, CONTINUATION_ARROW, LOCK_BADGE, SPONSORSHIP_BADGES};
use crate::listing::{Category, Listing, check_schema};
use crate::outputs::Outputs;
use crate::storage::Storage;

/// Column layout of one category's table.
struct TableLayout {
    header: &'static str,
    separator: &'static str,
    /// Extra column between the title and the location.
    extra: Option<fn(&Listing) -> String>,
}

impl Category {
    fn layout(self) -> TableLayout {
        match self {
            Category::Internship => TableLayout {
                header: "| Company | Role | Location | Application | Date Posted |",
                separator: "| ------- | ---- | -------- | ----------- | ----------- |",
                extra: None,
            },
            Category::Program => TableLayout {
                header: "| Company | Program | Type | Location | Application | Date Posted |",
                separator: "| ------- | ------- | ---- | -------- | ----------- | ----------- |",
                extra: Some(opportunity_type_cell),
            },
            Category::Research => TableLayout {
                header: "| University/Organization | Program | Field | Location | Application | Date Posted |",
                separator: "| ----------------------- | ------- | ----- | -------- | ----------- | ----------- |",
                extra: Some(field_cell),
            },
            Category::Scholarship => TableLayout {
                header: "| Organization | Scholarship | Location | Application | Date Posted |",
                separator: "| ------------ | ----------- | -------- | ----------- | ----------- |",
                extra: None,
            },
        }
    }

    /// README markers delimiting this category's table.
    pub fn markers(self) -> (&'static str, &'static str) {
        match self {
            Category::Internship => (
                "<!-- INTERNSHIPS_TABLE_START -->",
                "<!-- INTERNSHIPS_TABLE_END -->",
            ),
            Category::Program => (
                "<!-- PROGRAMS_TABLE_START -->",
                "<!-- PROGRAMS_TABLE_END -->",
            ),
            Category::Research => (
                "<!-- RESEARCH_TABLE_START -->",
                "<!-- RESEARCH_TABLE_END -->",
            ),
            Category::Scholarship => (
                "<!-- SCHOLARSHIPS_TABLE_START -->",
                "<!-- SCHOLARSHIPS_TABLE_END -->",
            ),
        }
    }
}

fn opportunity_type_cell(listing: &Listing) -> String {
    listing.opportunity_type.clone()
}

fn field_cell(listing: &Listing) -> String {
    listing.field.clone().unwrap_or_default()
}

/// Orders listings: active first, then newest post, then company name
/// ignoring case. The sort is stable.
pub fn sort_listings(listings: &mut [&Listing]) {
    listings.sort_by(|a, b| compare_listings(a, b));
}

fn compare_listings(a: &Listing, b: &Listing) -> Ordering {
    b.active
        .cmp(&a.active)
        .then_with(|| b.date_posted.cmp(&a.date_posted))
        .then_with(|| {
            a.company_name
                .to_lowercase()
                .cmp(&b.company_name.to_lowercase())
        })
}

/// Escapes a value for use inside a markdown table cell.
pub fn sanitize_table_cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

pub fn format_locations(locations: &[String]) -> String {
    let cells: Vec<String> = locations
        .iter()
        .map(|location| sanitize_table_cell(location))
        .collect();

    match cells.len() {
        0 => "N/A".to_string(),
        1..=3 => cells.join(", "),
        count => format!(
            "<details><summary>{count} locations</summary>{}</details>",
            cells.join(", ")
        ),
    }
}

/// Badge for a sponsorship value; unknown values get none.
pub fn sponsorship_badge(sponsorship: &str) -> &'static str {
    SPONSORSHIP_BADGES
        .iter()
        .find(|(value, _)| *value == sponsorship)
        .map(|(_, badge)| *badge)
        .unwrap_or_default()
}

pub fn status_badge(active: bool) -> String {
    if active {
        String::new()
    } else {
        format!(" {LOCK_BADGE}")
    }
}

/// Apply button for active listings, a lock otherwise.
pub fn format_link(listing: &Listing) -> String {
    if listing.active {
        format!(
            r#"<a href="{}"><img src="{APPLY_BUTTON_URL}" alt="Apply"></a>"#,
            listing.url.replace('"', "%22")
        )
    } else {
        LOCK_BADGE.to_string()
    }
}

/// Formats a Unix timestamp as `Mon DD` in Pacific time.
pub fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|date| date.with_timezone(&Los_Angeles).format("%b %d").to_string())
        .unwrap_or_default()
}

/// Renders the table of one category from listings already sorted.
///
/// A company repeated on consecutive rows with a different title is shown
/// as an arrow; identical company and title pairs are kept in full.
pub fn render_table(category: Category, listings: &[&Listing]) -> String {
    let layout = category.layout();
    let mut rows = vec![layout.header.to_string(), layout.separator.to_string()];
    let mut previous: Option<&Listing> = None;

    for listing in listings.iter().copied() {
        let collapse = previous.is_some_and(|previous| {
            previous.company_name == listing.company_name && previous.title != listing.title
        });
        previous = Some(listing);

        let company = if collapse {
            CONTINUATION_ARROW.to_string()
        } else {
            sanitize_table_cell(&listing.company_name)
        };
        let title = format!(
            "{}{}{}",
            sanitize_table_cell(&listing.title),
            sponsorship_badge(&listing.sponsorship),
            status_badge(listing.active)
        );

        let mut cells = vec![company, title];
        if let Some(extra) = layout.extra {
            cells.push(sanitize_table_cell(&extra(listing)));
        }
        cells.push(format_locations(&listing.locations));
        cells.push(format_link(listing));
        cells.push(format_date(listing.date_posted));

        rows.push(format!("| {} |", cells.join(" | ")));
    }

    rows.join("\n")
}

/// Visible listings of `category` in display order.
pub fn select_listings(listings: &[Listing], category: Category) -> Vec<&Listing> {
    let mut selected: Vec<&Listing> = listings
        .iter()
        .filter(|listing| listing.is_visible && listing.category == category)
        .collect();
    sort_listings(&mut selected);
    selected
}

/// Replaces the text between `start_marker` and `end_marker` with `table`.
/// Everything outside the markers is kept byte for byte.
///
/// # Errors
///
/// Returns an error if either marker is missing or the end marker comes
/// before the start marker
pub fn embed_table(
    content: &str,
    table: &str,
    start_marker: &str,
    end_marker: &str,
) -> Result<String> {
    let (Some(start), Some(end)) = (content.find(start_marker), content.find(end_marker)) else {
        bail!("Could not find markers {start_marker} and {end_marker}");
    };
    let span_start = start + start_marker.len();
    if end < span_start {
        bail!("Marker {end_marker} appears before {start_marker}");
    }

    let (Some(before), Some(after)) = (content.get(..span_start), content.get(end..)) else {
        bail!("Markers {start_marker} and {end_marker} split a character");
    };

    Ok(format!("{before}\n{table}\n{after}"))
}

/// Validates the listings document, renders every category table and
/// embeds them in the README.
///
/// # Arguments
///
/// * `storage` - Listings document to render
/// * `readme_path` - README containing the table markers
/// * `now` - Time stamped into the commit message
///
/// # Errors
///
/// Returns an error if:
/// * A listing fails its schema
/// * File operations fail
/// * The README lacks a marker
pub fn update_readme(storage: &Storage, readme_path: &Path, now: DateTime<Utc>) -> Result<Outputs> {
    let documents = storage.load_documents()?;
    check_schema(&documents)?;
    let listings = storage.load()?;

    let mut content = fs::read_to_string(readme_path)
        .with_context(|| format!("Failed to read {}", readme_path.display()))?;

    for category in Category::ALL {
        let selected = select_listings(&listings, category);
        let (start_marker, end_marker) = category.markers();
        let table = render_table(category, &selected);
        content = embed_table(&content, &table, start_marker, end_marker)
            .with_context(|| format!("Could not find markers in {}", readme_path.display()))?;
        info!("  - {} {} listings", selected.len(), category);
    }

    fs::write(readme_path, content)
        .with_context(|| format!("Failed to write {}", readme_path.display()))?;

    let timestamp = now.with_timezone(&Los_Angeles).format("%Y-%m-%d %H:%M PST");
    let mut outputs = Outputs::new();
    outputs.set("commit_message", format!("Update README ({timestamp})"));

    info!("Successfully updated README: {}", readme_path.display());
    Ok(outputs)
}
