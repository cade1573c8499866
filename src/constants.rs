pub const MODEL_API_KEY_ENV_NAME: &str = "OPENAI_API_KEY";

pub const DEFAULT_MODEL: &str = "openai://gpt-4o-mini";

pub const DEFAULT_LISTINGS_PATH: &str = ".github/scripts/listings.json";

pub const DEFAULT_README_PATH: &str = "README.md";

/// Identity used when a contributor left no reachable email.
pub const BOT_EMAIL: &str = "actions@github.com";

pub const UNKNOWN_AUTHOR: &str = "unknown";

pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub(crate) const FETCH_TIMEOUT_SECS: u64 = 30;

/// Upper bound on body characters handed to the model.
pub(crate) const PAGE_TEXT_BUDGET: usize = 12_000;

pub(crate) const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Below this many body characters the page most likely needs JavaScript.
pub(crate) const MIN_PAGE_TEXT: usize = 200;

pub(crate) const STRUCTURED_DATA_BUDGET: usize = 3_000;

pub(crate) const TRACKING_PARAMS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

pub(crate) const NO_RESPONSE: &str = "_No response_";

pub(crate) const THINK_STRIPPER: &str = r"<think>[\s\S]*</think>\s*";

pub(crate) const CODE_FENCE_START: &str = r"^```(?:json|JSON)?\s*";

pub(crate) const CODE_FENCE_END: &str = r"\s*```$";

pub(crate) const URL_PATTERN: &str = r#"https?://[^\s<>"')\]]+"#;

pub(crate) const TEMPERATURE: f32 = 0.1;

pub(crate) const MAX_TOKENS: u32 = 1000;

pub(crate) const SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts structured data from job postings. Return only valid JSON.";

pub(crate) const DEFAULT_PROMPT_TEMPLATE: &str = r#"Analyze this job/internship posting and extract the following information.
This is for a repository tracking UNDERCLASSMEN opportunities (freshman/sophomore students).

Page Title: {title}
URL: {url}
Additional Notes from submitter: {notes}

Page Content:
{text}

---

Extract and return a JSON object with these fields:
- company_name: The company or organization name
- title: The role/program title (e.g., "STEP Intern", "Explore Program", "REU")
- locations: Array of locations (e.g., ["San Francisco, CA", "Remote"]). Use ["Multiple Locations"] if many or unspecified.
- category: One of "Internship", "Program", "Research", or "Scholarship"
  - "Internship" = traditional internship programs (STEP, Explore, etc.)
  - "Program" = fellowships, externships, bootcamps (Code2040, MLH Fellowship)
  - "Research" = university/lab research programs (REU, SURF)
  - "Scholarship" = scholarships and awards that fund students
- opportunity_type: More specific type (e.g., "Internship", "Fellowship", "Externship", "Research")
- field: For research programs, what field (e.g., "Computer Science", "STEM"). Empty string for non-research.
- season: "Summer", "Fall", "Winter", "Spring", "Multiple", or "Year-Round"
- sponsorship: "Offers Sponsorship", "Does Not Offer Sponsorship", "U.S. Citizenship Required", or "Not Specified"
- is_underclassmen: true if this is specifically for freshmen/sophomores, false otherwise

IMPORTANT: Only set is_underclassmen to true if the posting EXPLICITLY mentions it's for freshmen, sophomores, first-year, second-year, or underclassmen students.
If the page content is sparse, rely on the page metadata and the URL itself.

Return ONLY valid JSON, no other text."#;

pub const DEFAULT_SEASON: &str = "Summer";

pub const DEFAULT_SPONSORSHIP: &str = "Not Specified";

pub const DEFAULT_OPPORTUNITY_TYPE: &str = "Internship";

pub const DEFAULT_LOCATION: &str = "Multiple Locations";

pub const DEFAULT_TARGET_YEARS: [&str; 2] = ["Freshman (1st year)", "Sophomore (2nd year)"];

pub(crate) const SPONSORSHIP_BADGES: [(&str, &str); 3] = [
    ("Does Not Offer Sponsorship", " :no_entry_sign:"),
    ("U.S. Citizenship Required", " :us:"),
    ("U.S. Work Authorization Required", " :no_entry_sign:"),
];

pub(crate) const LOCK_BADGE: &str = ":lock:";

pub(crate) const CONTINUATION_ARROW: &str = "↳";

pub(crate) const APPLY_BUTTON_URL: &str = "https://img.shields.io/badge/Apply-blue?style=for-the-badge";

pub(crate) const REVIEW_WARNING: &str = "This opportunity may not be specifically for underclassmen. A maintainer needs to verify before it can be added. Add the 'approved' label again after review.";
