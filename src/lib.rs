//! The opportunity_bot library maintains a curated list of underclassmen
//! opportunities: it applies approved GitHub issues to a JSON listings
//! document and renders the listings as markdown tables in the README.

pub mod compose;
pub mod constants;
pub mod contribution;
pub mod extract;
pub mod issue;
pub mod listing;
pub mod normalize;
pub mod outputs;
pub mod parse;
pub mod storage;

/// Enum representing the page text extraction method.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TextBy {
    /// Visible text nodes in document order, chrome and scripts removed
    #[default]
    Visible,
    /// Use dom_smoothie readability for text extraction
    Readability,
    /// Use fast_html2md for text extraction
    Markdown,
}

impl std::str::FromStr for TextBy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "visible" => Ok(TextBy::Visible),
            "readability" | "dom_smoothie" => Ok(TextBy::Readability),
            "markdown" | "fast_html2md" => Ok(TextBy::Markdown),
            _ => Err(format!("Invalid text extraction method: {}", input)),
        }
    }
}

pub use compose::{embed_table, render_table, update_readme};
pub use contribution::{HandlerConfig, auto_extract, process_approved};
pub use issue::{IssueEvent, IssueFields};
pub use listing::{Category, Listing};
pub use normalize::clean_url;
pub use parse::{PageContent, fetch_page_content};
pub use storage::Storage;
