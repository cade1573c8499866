#![allow(dead_code)]

use opportunity_bot::{Category, Listing};

pub const DAY: i64 = 86_400;

/// Noon UTC on 2025-01-01.
pub const JAN_1: i64 = 1_735_732_800;

pub fn listing(id: &str, company_name: &str, title: &str) -> Listing {
    Listing {
        id: id.to_owned(),
        company_name: company_name.to_owned(),
        title: title.to_owned(),
        url: format!("https://example.com/jobs/{id}"),
        locations: vec!["Remote".to_owned()],
        season: "Summer".to_owned(),
        category: Category::Internship,
        opportunity_type: "Internship".to_owned(),
        field: None,
        target_year: vec![
            "Freshman (1st year)".to_owned(),
            "Sophomore (2nd year)".to_owned(),
        ],
        sponsorship: "Not Specified".to_owned(),
        active: true,
        is_visible: true,
        date_posted: JAN_1,
        date_updated: JAN_1,
        source: "octocat".to_owned(),
    }
}

pub fn posted(mut listing: Listing, day: i64) -> Listing {
    listing.date_posted = JAN_1 + day * DAY;
    listing.date_updated = listing.date_posted;
    listing
}

pub fn inactive(mut listing: Listing) -> Listing {
    listing.active = false;
    listing
}

pub fn with_url(mut listing: Listing, url: &str) -> Listing {
    listing.url = url.to_owned();
    listing
}

pub fn in_category(mut listing: Listing, category: Category) -> Listing {
    listing.category = category;
    listing
}

/// Renders an issue-form body from heading/answer pairs.
pub fn issue_body(sections: &[(&str, &str)]) -> String {
    sections
        .iter()
        .map(|(heading, answer)| format!("### {heading}\n\n{answer}\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A GitHub issue event payload as JSON.
pub fn event_json(body: &str, labels: &[&str], login: &str) -> String {
    serde_json::json!({
        "action": "labeled",
        "issue": {
            "number": 42,
            "body": body,
            "labels": labels.iter().map(|name| serde_json::json!({ "name": name })).collect::<Vec<_>>(),
            "user": { "login": login },
        },
    })
    .to_string()
}
