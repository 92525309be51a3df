mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn object_id_lookup_returns_field_value() {
    let (app, _) = common::test_app().await;

    let (status, body) = common::get(&app, "/run/objectid/abc123/data/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "x": 1 }));
}

#[tokio::test]
async fn run_number_and_timestamp_reach_the_same_document() {
    let (app, _) = common::test_app().await;

    let (by_number, number_body) = common::get(&app, "/run/runnumber/7/data/").await;
    let (by_name, name_body) = common::get(&app, "/run/timestamp/200101_0101/data/").await;

    assert_eq!(by_number, StatusCode::OK);
    assert_eq!(by_name, StatusCode::OK);
    assert_eq!(number_body, name_body);
}

#[tokio::test]
async fn runs_prefix_and_missing_trailing_slash_are_equivalent() {
    let (app, _) = common::test_app().await;

    let (_, canonical) = common::get(&app, "/run/runnumber/18432/detector/").await;
    for uri in [
        "/run/runnumber/18432/detector",
        "/runs/runnumber/18432/detector/",
        "/runs/runnumber/18432/detector",
    ] {
        let (status, body) = common::get(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body, canonical, "{}", uri);
    }
    assert_eq!(canonical, json!("tpc"));
}

#[tokio::test]
async fn values_of_every_shape_are_returned_verbatim() {
    let (app, _) = common::test_app().await;

    let (_, tags) = common::get(&app, "/run/runnumber/18432/tags/").await;
    assert_eq!(tags[0]["name"], "_sciencerun1");
    assert_eq!(tags.as_array().map(Vec::len), Some(2));

    let (_, versions) = common::get(&app, "/run/runnumber/18432/processing_versions/").await;
    assert_eq!(versions, json!({ "pax": "6.8.0", "hax": "2.4.0" }));

    let (status, comments) = common::get(&app, "/run/runnumber/18432/comments/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(comments.is_null());
}

#[tokio::test]
async fn extended_json_wrappers_are_flattened() {
    let (app, _) = common::test_app().await;

    let (status, start) = common::get(&app, "/run/runnumber/18432/start/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(start, json!("2018-04-23T10:29:00.000Z"));

    let (status, id) = common::get(&app, "/run/runnumber/18432/_id/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id, json!("5b8ff2a7e44de8a1e7c9a1f0"));
}

#[tokio::test]
async fn object_id_match_ignores_case() {
    let (app, _) = common::test_app().await;

    let (status, body) = common::get(&app, "/run/objectid/5B8FF2A7E44DE8A1E7C9A1F0/number/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(18432));
}

#[tokio::test]
async fn missing_run_and_missing_field_are_both_not_found() {
    let (app, _) = common::test_app().await;

    let (missing_run, run_body) = common::get(&app, "/run/runnumber/99999/data/").await;
    let (missing_field, field_body) = common::get(&app, "/run/runnumber/7/nonexistent/").await;

    assert_eq!(missing_run, StatusCode::NOT_FOUND);
    assert_eq!(missing_field, StatusCode::NOT_FOUND);
    assert_eq!(run_body, field_body);
    assert_eq!(run_body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn dotted_field_is_not_traversed() {
    let (app, _) = common::test_app().await;

    let (status, _) = common::get(&app, "/run/runnumber/7/data.x/").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_identifiers_are_rejected() {
    let (app, _) = common::test_app().await;

    for uri in [
        "/run/objectid/not-hex/data/",
        "/run/objectid/0123456789abcdef0123456789/data/",
        "/run/runnumber/abc/data/",
        "/run/runnumber/-4/data/",
        "/runs/runnumber/99999999999999999999/data",
    ] {
        let (status, body) = common::get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], true, "{}", uri);
        assert_eq!(body["code"], "INVALID_IDENTIFIER", "{}", uri);
    }
}

#[tokio::test]
async fn repeated_lookups_are_stable() {
    let (app, _) = common::test_app().await;

    let (_, first) = common::get(&app, "/run/objectid/abc123/data/").await;
    let (_, second) = common::get(&app, "/run/objectid/abc123/data/").await;

    assert_eq!(first, second);
}
