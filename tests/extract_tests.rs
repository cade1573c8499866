use opportunity_bot::constants::DEFAULT_MODEL;
use opportunity_bot::contribution::{
    DuplicatePolicy, ExtractionRequest, HandlerConfig, ReviewPolicy, add_extracted,
};
use opportunity_bot::extract::{ExtractContext, build_model, build_prompt, extract_fields};
use opportunity_bot::{Category, IssueEvent, Listing, PageContent};
use spectral::prelude::*;

mod listing_extras;
mod llm_extras;

use listing_extras::{JAN_1, event_json, issue_body, listing, with_url};
use llm_extras::StubLlmProvider;

const ANSWER: &str = r#"{
  "company_name": "Acme",
  "title": "Explore Intern",
  "locations": ["Seattle, WA", "https://acme.com/locations", "<b>Remote</b>", "  "],
  "category": "Internship",
  "opportunity_type": "Internship",
  "season": "Summer",
  "sponsorship": "Not Specified",
  "is_underclassmen": true
}"#;

assert_extractions! {
    plain_json_answer: response => ANSWER, check => |result| {
        let fields = result.expect("Answer should parse");
        assert_that(&fields.company_name).is_equal_to(Some("Acme".to_owned()));
        assert_that(&fields.is_underclassmen).is_true();
    },
    fenced_json_answer: response => "```json\n{\"company_name\": \"Acme\", \"title\": \"Intern\"}\n```", check => |result| {
        let fields = result.expect("Fenced answer should parse");
        assert_that(&fields.title).is_equal_to(Some("Intern".to_owned()));
        assert_that(&fields.is_underclassmen).is_false();
    },
    reasoning_is_stripped: response => "<think>The page says first-year.</think>\n{\"company_name\": \"Acme\", \"is_underclassmen\": true}", check => |result| {
        let fields = result.expect("Answer after reasoning should parse");
        assert_that(&fields.is_underclassmen).is_true();
    },
    wrong_types_are_absent: response => r#"{"company_name": 42, "title": "  ", "locations": "Remote"}"#, check => |result| {
        let fields = result.expect("Answer should parse");
        assert_that(&fields.company_name).is_none();
        assert_that(&fields.title).is_none();
        assert_that(&fields.locations).is_none();
    },
    invalid_json_reports_answer: response => "Sorry, I cannot help with that.", check => |result| {
        let error = result.expect_err("Prose should fail");
        assert_that(&error.to_string()).starts_with("Failed to parse AI response as JSON");
        assert_that(&error.to_string()).contains("Response: Sorry, I cannot help with that.");
    },
    non_object_answer_fails: response => "[1, 2, 3]", check => |result| {
        let error = result.expect_err("Array should fail");
        assert_that(&error.to_string()).contains("not a JSON object");
    },
}

fn page() -> PageContent {
    PageContent {
        url: "https://acme.com/careers/explore".to_owned(),
        title: "Explore Program".to_owned(),
        text: "Explore is an internship for first and second year students.".to_owned(),
        error: None,
    }
}

fn answer_with(key: &str, value: serde_json::Value) -> String {
    let mut answer: serde_json::Value = serde_json::from_str(ANSWER).expect("Fixture is JSON");
    answer[key] = value;
    answer.to_string()
}

async fn run(
    model: &StubLlmProvider,
    listings: &mut Vec<Listing>,
    config: HandlerConfig,
) -> anyhow::Result<opportunity_bot::contribution::Outcome> {
    let context = ExtractContext {
        model,
        prompt_template: None,
    };
    add_extracted(&page(), "", "octocat", listings, &context, &config, JAN_1).await
}

#[test]
fn missing_api_key_is_reported() {
    let Err(error) = build_model(DEFAULT_MODEL, None) else {
        panic!("Building without a key should fail");
    };

    assert_that(&error.to_string()).starts_with("OPENAI_API_KEY environment variable not set");
}

#[test]
fn prompt_includes_page_and_notes() {
    let prompt = build_prompt(&page(), "Found on a club newsletter", None);

    assert_that(&prompt).contains("https://acme.com/careers/explore");
    assert_that(&prompt).contains("Explore Program");
    assert_that(&prompt).contains("Found on a club newsletter");
    assert_that(&prompt).contains("first and second year students");
    assert_that(&prompt.contains("{text}")).is_false();
}

#[tokio::test]
async fn custom_template_without_text_sends_page_separately() {
    let model = StubLlmProvider::new(ANSWER);
    let context = ExtractContext {
        model: &model,
        prompt_template: Some("Extract the opportunity at {url}."),
    };

    extract_fields(&page(), "", &context)
        .await
        .expect("Extraction should succeed");

    assert_that(&model.prompts()).is_equal_to(vec![
        "Extract the opportunity at https://acme.com/careers/explore.".to_owned(),
        page().text,
    ]);
}

#[tokio::test]
async fn confirmed_answer_adds_listing() {
    let model = StubLlmProvider::new(ANSWER);
    let mut listings = Vec::new();

    let outcome = run(&model, &mut listings, HandlerConfig::default())
        .await
        .expect("Extraction should add");

    assert_that(&outcome.changed).is_true();
    assert_that(&listings).has_length(1);
    let added = &listings[0];
    assert_that(&added.url).is_equal_to("https://acme.com/careers/explore".to_owned());
    assert_that(&added.locations).is_equal_to(vec!["Seattle, WA".to_owned()]);
    assert_that(&added.target_year)
        .is_equal_to(vec!["Freshman (1st year)".to_owned(), "Sophomore (2nd year)".to_owned()]);
    assert_that(&added.source).is_equal_to("octocat".to_owned());
    assert_that(&outcome.outputs.get("commit_message")).is_equal_to(Some("Add Acme - Explore Intern"));
    assert_that(&outcome.outputs.get("extracted_data").is_some()).is_true();
}

#[tokio::test]
async fn unconfirmed_answer_is_held_for_review() {
    let model = StubLlmProvider::new(&answer_with("is_underclassmen", false.into()));
    let mut listings = Vec::new();

    let outcome = run(&model, &mut listings, HandlerConfig::default())
        .await
        .expect("Held extraction is not an error");

    assert_that(&outcome.changed).is_false();
    assert_that(&listings).has_length(0);
    assert_that(&outcome.outputs.get("needs_review")).is_equal_to(Some("true"));
    assert_that(&outcome.outputs.get("commit_message")).is_equal_to(Some(""));
    assert_that(&outcome.outputs.get("warning").is_some()).is_true();
}

#[tokio::test]
async fn unconfirmed_answer_is_added_with_warning_when_configured() {
    let model = StubLlmProvider::new(&answer_with("is_underclassmen", false.into()));
    let mut listings = Vec::new();
    let config = HandlerConfig {
        review: ReviewPolicy::Warn,
        ..HandlerConfig::default()
    };

    let outcome = run(&model, &mut listings, config).await.expect("Extraction should add");

    assert_that(&outcome.changed).is_true();
    assert_that(&listings).has_length(1);
    assert_that(&outcome.outputs.get("warning").is_some()).is_true();
    assert_that(&outcome.outputs.get("needs_review")).is_none();
}

#[tokio::test]
async fn duplicate_is_flagged_without_changes() {
    let model = StubLlmProvider::new(ANSWER);
    let mut listings = vec![with_url(
        listing("existing", "Other", "Role"),
        "https://acme.com/careers/explore",
    )];
    let config = HandlerConfig {
        duplicates: DuplicatePolicy::Flag,
        ..HandlerConfig::default()
    };

    let outcome = run(&model, &mut listings, config).await.expect("Flagging is not an error");

    assert_that(&outcome.changed).is_false();
    assert_that(&listings).has_length(1);
    assert_that(&outcome.outputs.get("is_duplicate")).is_equal_to(Some("true"));
    assert_that(&outcome.outputs.get("duplicate_id")).is_equal_to(Some("existing"));
    assert_that(&outcome.outputs.get("extracted_data")).is_none();
}

#[tokio::test]
async fn invalid_category_is_rejected() {
    let model = StubLlmProvider::new(&answer_with("category", "Bootcamp".into()));
    let mut listings = Vec::new();

    let error = run(&model, &mut listings, HandlerConfig::default())
        .await
        .expect_err("Unknown category should fail");

    assert_that(&error.to_string()).starts_with("AI extraction returned invalid category 'Bootcamp'");
    assert_that(&listings).has_length(0);
}

#[tokio::test]
async fn unknown_company_is_rejected() {
    let model = StubLlmProvider::new(&answer_with("company_name", "Unknown".into()));
    let mut listings = Vec::new();

    let error = run(&model, &mut listings, HandlerConfig::default())
        .await
        .expect_err("Unknown company should fail");

    assert_that(&error.to_string()).contains("could not determine the company name");
}

#[tokio::test]
async fn research_field_is_kept_only_for_research() {
    let research = serde_json::json!({
        "company_name": "State University",
        "title": "Summer REU",
        "category": "Research",
        "field": "Biology",
        "is_underclassmen": true,
    });
    let model = StubLlmProvider::new(&research.to_string());
    let mut listings = Vec::new();

    run(&model, &mut listings, HandlerConfig::default())
        .await
        .expect("Extraction should add");

    assert_that(&listings[0].category).is_equal_to(Category::Research);
    assert_that(&listings[0].field).is_equal_to(Some("Biology".to_owned()));
    assert_that(&listings[0].locations).is_equal_to(vec!["Multiple Locations".to_owned()]);

    let model = StubLlmProvider::new(&answer_with("field", "Biology".into()));
    let mut internships = Vec::new();
    run(&model, &mut internships, HandlerConfig::default())
        .await
        .expect("Extraction should add");
    assert_that(&internships[0].field).is_none();
}

#[tokio::test]
async fn fetch_error_stops_before_the_model() {
    let model = StubLlmProvider::new(ANSWER);
    let context = ExtractContext {
        model: &model,
        prompt_template: None,
    };
    let failed = PageContent {
        error: Some("connection refused".to_owned()),
        text: "Error fetching page: connection refused".to_owned(),
        ..page()
    };

    let error = add_extracted(
        &failed,
        "",
        "octocat",
        &mut Vec::new(),
        &context,
        &HandlerConfig::default(),
        JAN_1,
    )
    .await
    .expect_err("Fetch failure should fail");

    assert_that(&error.to_string()).is_equal_to("Failed to fetch page: connection refused".to_owned());
    assert_that(&model.prompts()).has_length(0);
}

#[tokio::test]
async fn completion_failure_is_reported() {
    let model = StubLlmProvider::failing("rate limited");
    let mut listings = Vec::new();

    let error = run(&model, &mut listings, HandlerConfig::default())
        .await
        .expect_err("Completion failure should fail");

    assert_that(&error.to_string()).starts_with("AI completion error:");
    assert_that(&error.to_string()).contains("rate limited");
}

#[test]
fn extraction_request_reads_url_and_notes() {
    let body = issue_body(&[
        ("Link to Opportunity", "https://acme.com/explore?utm_source=discord"),
        ("Any additional context (optional)", "Deadline is soon"),
    ]);
    let event = IssueEvent::from_json(&event_json(&body, &["auto_extract", "approved"], "octocat"))
        .expect("Event should parse");

    let request = ExtractionRequest::from_event(&event).expect("Request should parse");

    assert_that(&request.url).is_equal_to("https://acme.com/explore".to_owned());
    assert_that(&request.notes).is_equal_to("Deadline is soon".to_owned());
}

#[test]
fn extraction_request_without_url_fails() {
    let event = IssueEvent::from_json(&event_json("Please add the Acme program", &["auto_extract"], "octocat"))
        .expect("Event should parse");

    let error = ExtractionRequest::from_event(&event).expect_err("Missing URL should fail");

    assert_that(&error.to_string()).starts_with("No URL found in issue body");
}
