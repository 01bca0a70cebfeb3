//! Federated search over every resource kind

mod helpers;

use axum::http::StatusCode;
use helpers::{fixture, get, DJ_KEY, SEARCH_KEY};
use serde_json::{json, Value};
use std::collections::HashSet;

fn bucket<'a>(body: &'a Value, name: &str) -> &'a Value {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["attributes"]["type"] == name)
        .unwrap_or_else(|| panic!("no {} bucket in {}", name, body))
}

#[tokio::test]
async fn test_search_requires_scope() {
    let (store, app) = fixture();
    store.clear_reads();

    let anonymous = get(&app, "/api/v2/search?filter[*]=Miles", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let unscoped = get(&app, "/api/v2/search?filter[*]=Miles", Some(DJ_KEY)).await;
    assert_eq!(unscoped.status, StatusCode::FORBIDDEN);
    assert_eq!(unscoped.body["errors"][0]["title"], json!("Forbidden"));

    // refused before any fan-out
    assert!(store.reads().is_empty());
}

#[tokio::test]
async fn test_search_buckets_by_type() {
    let (_, app) = fixture();

    let result = get(&app, "/api/v2/search?filter[*]=Miles", Some(SEARCH_KEY)).await;
    assert_eq!(result.status, StatusCode::OK);

    let names: Vec<&str> = result
        .data()
        .iter()
        .map(|b| b["attributes"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["albums", "artists", "playlists"]);
    assert!(result.data().iter().all(|b| b["type"] == "search"));
    assert_eq!(result.body["meta"]["total"], json!(25));

    let artists = bucket(&result.body, "artists");
    assert_eq!(artists["attributes"]["total"], json!(12));
    assert_eq!(
        artists["relationships"]["artists"]["data"].as_array().unwrap().len(),
        12
    );
}

#[tokio::test]
async fn test_bucket_members_are_included() {
    let (_, app) = fixture();

    let result = get(&app, "/api/v2/search?filter[*]=Miles", Some(SEARCH_KEY)).await;

    // albums and artists buckets share the same twelve album resources
    assert_eq!(result.included("album").len(), 12);
    let shows = result.included("show");
    assert_eq!(shows.len(), 1);
    let events = shows[0]["attributes"]["events"].as_array().unwrap();
    assert_eq!(events[0]["track"], json!("So What"));
}

#[tokio::test]
async fn test_bucket_first_link_and_template() {
    let (_, app) = fixture();

    let result = get(
        &app,
        "/api/v2/search?filter[*]=Miles&page[size]=5",
        Some(SEARCH_KEY),
    )
    .await;

    let artists = bucket(&result.body, "artists");
    assert_eq!(
        artists["relationships"]["artists"]["data"].as_array().unwrap().len(),
        5
    );

    let first = &artists["links"]["first"];
    assert_eq!(first["meta"]["total"], json!(12));
    assert_eq!(first["meta"]["more"], json!(7));
    assert_eq!(first["meta"]["offset"], json!(0));

    let template = first["meta"]["template"].as_str().unwrap();
    assert!(template.starts_with("/api/v2/album?"), "{}", template);
    assert!(template.contains("filter[match(artist)]=Miles"));
    assert!(template.contains("page[size]=5"));
    assert!(template.contains("{offset}"));
}

#[tokio::test]
async fn test_bucket_ids_are_stable() {
    let (_, app) = fixture();
    let uri = "/api/v2/search?filter[*]=Miles";

    let one = get(&app, uri, Some(SEARCH_KEY)).await;
    let two = get(&app, uri, Some(SEARCH_KEY)).await;

    assert_eq!(one.ids(), two.ids());
    for id in one.ids() {
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // different content, different fingerprint
    let other = get(&app, "/api/v2/search?filter[*]=Blakey", Some(SEARCH_KEY)).await;
    let artists = bucket(&other.body, "artists")["id"].as_str().unwrap();
    let miles = bucket(&one.body, "artists")["id"].as_str().unwrap();
    assert_ne!(artists, miles);
}

#[tokio::test]
async fn test_bucket_ids_are_unique_within_response() {
    let (_, app) = fixture();

    // albums and artists hold the same rows for this query
    let result = get(&app, "/api/v2/search?filter[*]=Miles", Some(SEARCH_KEY)).await;
    let albums = bucket(&result.body, "albums");
    let artists = bucket(&result.body, "artists");
    assert_eq!(
        albums["relationships"]["albums"]["data"],
        artists["relationships"]["artists"]["data"]
    );

    let ids = result.ids();
    let distinct: HashSet<&String> = ids.iter().collect();
    assert_eq!(distinct.len(), ids.len(), "{:?}", ids);
}

#[tokio::test]
async fn test_bucket_first_link_can_be_followed() {
    let (_, app) = fixture();

    let result = get(
        &app,
        "/api/v2/search?filter[*]=Miles&page[size]=5",
        Some(SEARCH_KEY),
    )
    .await;

    let artists = bucket(&result.body, "artists");
    let href = artists["links"]["first"]["href"].as_str().unwrap();
    assert!(href.contains("page[offset]=0"), "{}", href);
    let page = get(&app, href, Some(SEARCH_KEY)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.ids(), vec!["1001", "1002", "1003", "1004", "1005"]);

    for data in result.data() {
        let href = data["links"]["first"]["href"].as_str().unwrap();
        let followed = get(&app, href, Some(SEARCH_KEY)).await;
        assert_eq!(followed.status, StatusCode::OK, "{}: {}", href, followed.body);
        assert!(!followed.data().is_empty());
    }
}

#[tokio::test]
async fn test_tag_bucket_first_link_repeats_search() {
    let (_, app) = fixture();

    let result = get(&app, "/api/v2/search?filter[*]=1006", Some(SEARCH_KEY)).await;
    let href = bucket(&result.body, "tags")["links"]["first"]["href"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(href.starts_with("/api/v2/search?filter[*]=1006"), "{}", href);

    let again = get(&app, &href, Some(SEARCH_KEY)).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.ids(), result.ids());
}

#[tokio::test]
async fn test_tag_bucket_has_no_template() {
    let (_, app) = fixture();

    let result = get(&app, "/api/v2/search?filter[*]=1006", Some(SEARCH_KEY)).await;

    let tags = bucket(&result.body, "tags");
    assert_eq!(tags["relationships"]["tags"]["data"][0]["id"], json!("1006"));
    assert!(tags["links"]["first"]["meta"].get("template").is_none());
}

#[tokio::test]
async fn test_search_without_query() {
    let (_, app) = fixture();

    let missing = get(&app, "/api/v2/search", Some(SEARCH_KEY)).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let blank = get(&app, "/api/v2/search?filter[*]=+", Some(SEARCH_KEY)).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_with_no_matches() {
    let (_, app) = fixture();

    let result = get(&app, "/api/v2/search?filter[*]=Coltrane", Some(SEARCH_KEY)).await;

    assert_eq!(result.status, StatusCode::OK);
    assert!(result.data().is_empty());
    assert_eq!(result.body["meta"]["total"], json!(0));
}
