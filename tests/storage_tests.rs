use opportunity_bot::Storage;
use opportunity_bot::listing::check_schema;
use serde_json::json;
use spectral::prelude::*;

mod listing_extras;

use listing_extras::listing;

#[test]
fn missing_document_loads_empty() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let storage = Storage::new(dir.path().join("listings.json"));

    assert_that(&storage.new).is_true();
    assert_that(&storage.load().expect("Load should succeed")).has_length(0);
}

#[test]
fn save_then_load_keeps_listings_and_order() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let path = dir.path().join("nested").join("listings.json");
    let storage = Storage::new(&path);
    let listings = vec![listing("b", "Beta", "Intern"), listing("a", "Alpha", "Intern")];

    storage.save(&listings).expect("Save should succeed");

    assert_that(&Storage::new(&path).new).is_false();
    assert_that(&storage.load().expect("Load should succeed")).is_equal_to(listings);
}

#[test]
fn saved_document_is_pretty_and_complete() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let storage = Storage::new(dir.path().join("listings.json"));
    storage
        .save(&[listing("a", "Alpha", "Intern")])
        .expect("Save should succeed");

    let content = std::fs::read_to_string(storage.path()).expect("Document should exist");
    let documents = storage.load_documents().expect("Load should succeed");

    assert_that(&content.starts_with("[\n  {")).is_true();
    assert_that(&check_schema(&documents).is_ok()).is_true();
}

#[test]
fn invalid_json_fails_to_load() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let path = dir.path().join("listings.json");
    std::fs::write(&path, "{ not json").expect("Write fixture");

    assert_that(&Storage::new(&path).load().is_err()).is_true();
}

fn document(id: &str) -> serde_json::Value {
    serde_json::to_value(listing(id, "Acme", "Intern")).expect("Listing serializes")
}

#[test]
fn schema_accepts_complete_listings() {
    let documents = vec![document("1"), document("2")];

    assert_that(&check_schema(&documents).is_ok()).is_true();
}

#[test]
fn schema_names_listing_missing_sponsorship() {
    let mut broken = document("broken-id");
    broken
        .as_object_mut()
        .expect("Listing is an object")
        .remove("sponsorship");
    let documents = vec![document("ok"), broken];

    let error = check_schema(&documents).expect_err("Missing sponsorship should fail");

    assert_that(&error.to_string())
        .is_equal_to("Listing broken-id missing field: sponsorship".to_owned());
}

#[test]
fn schema_rejects_unknown_category() {
    let mut odd = document("odd");
    odd["category"] = json!("Bootcamp");

    let error = check_schema(&[odd]).expect_err("Unknown category should fail");

    assert_that(&error.to_string()).starts_with("Listing odd: Invalid category 'Bootcamp'");
}

#[test]
fn research_field_is_optional() {
    let mut research = document("r");
    research["category"] = json!("Research");

    assert_that(&check_schema(&[research]).is_ok()).is_true();
}

#[test]
fn schema_reports_unknown_id_when_id_missing() {
    let mut anonymous = document("x");
    anonymous.as_object_mut().expect("Listing is an object").remove("id");

    let error = check_schema(&[anonymous]).expect_err("Missing id should fail");

    assert_that(&error.to_string()).is_equal_to("Listing unknown missing field: id".to_owned());
}

#[test]
fn research_only_field_is_rejected_elsewhere() {
    let mut internship = document("misfiled");
    internship["field"] = json!("Biology");

    let error = check_schema(&[internship]).expect_err("Field on an internship should fail");

    assert_that(&error.to_string())
        .is_equal_to("Listing misfiled: field 'field' is not allowed for category Internship".to_owned());
}

fn legacy_document() -> serde_json::Value {
    let mut legacy = document("legacy-1");
    let fields = legacy.as_object_mut().expect("Listing is an object");
    fields.remove("sponsorship");
    fields.insert("degrees".to_owned(), json!(["CS"]));
    legacy
}

#[test]
fn snapshot_keeps_untouched_documents_as_stored() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let path = dir.path().join("listings.json");
    std::fs::write(&path, json!([legacy_document()]).to_string()).expect("Write fixture");
    let storage = Storage::new(&path);

    let mut snapshot = storage.load_snapshot().expect("Load should succeed");
    snapshot.listings.push(listing("new", "Acme", "Intern"));
    storage.save_snapshot(&snapshot).expect("Save should succeed");

    let documents = storage.load_documents().expect("Load should succeed");
    assert_that(&documents).is_equal_to(vec![legacy_document(), document("new")]);
    assert_that(&check_schema(&documents).is_err()).is_true();
}

#[test]
fn snapshot_patches_only_changed_fields() {
    let dir = tempfile::tempdir().expect("Temp dir");
    let path = dir.path().join("listings.json");
    std::fs::write(&path, json!([legacy_document()]).to_string()).expect("Write fixture");
    let storage = Storage::new(&path);

    let mut snapshot = storage.load_snapshot().expect("Load should succeed");
    snapshot.listings[0].close(1_800_000_000);
    storage.save_snapshot(&snapshot).expect("Save should succeed");

    let mut expected = legacy_document();
    expected["active"] = json!(false);
    expected["date_updated"] = json!(1_800_000_000);
    assert_that(&storage.load_documents().expect("Load should succeed"))
        .is_equal_to(vec![expected]);
}
