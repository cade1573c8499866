use opportunity_bot::clean_url;
use spectral::prelude::*;

#[test]
fn adds_scheme_and_strips_tracking_params() {
    let url = clean_url("example.com/job?utm_source=x&id=5").expect("URL should normalize");

    assert_that(&url).is_equal_to("https://example.com/job?id=5".to_owned());
}

#[test]
fn normalizing_twice_is_stable() {
    let once = clean_url("  https://careers.example.com/apply?utm_campaign=fall&ref=board&utm_term=intern#top ")
        .expect("URL should normalize");
    let twice = clean_url(&once).expect("Normalized URL should normalize");

    assert_that(&twice).is_equal_to(once);
}

#[test]
fn keeps_non_tracking_params_in_order() {
    let url = clean_url("https://example.com/a?b=2&utm_medium=email&a=1&utm_content=c")
        .expect("URL should normalize");

    assert_that(&url).is_equal_to("https://example.com/a?b=2&a=1".to_owned());
}

#[test]
fn only_known_tracking_keys_are_dropped() {
    let url = clean_url("https://example.com/a?utm_id=7&gh_src=abc").expect("URL should normalize");

    assert_that(&url).is_equal_to("https://example.com/a?utm_id=7&gh_src=abc".to_owned());
}

#[test]
fn removes_query_when_only_tracking_params() {
    let url = clean_url("http://example.com/job?utm_source=linkedin").expect("URL should normalize");

    assert_that(&url).is_equal_to("http://example.com/job".to_owned());
}

#[test]
fn blank_url_is_an_input_error() {
    let error = clean_url("   ").expect_err("Blank URL should fail");

    assert_that(&error.to_string()).is_equal_to("Missing required field: URL".to_owned());
}
