// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// The router is driven via tower::ServiceExt::oneshot against a stubbed
// upstream transport and a manual clock.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use portfolio_site::activity::http::{StubFetch, StubReply};
use portfolio_site::activity::providers::lastfm::API_URL;
use portfolio_site::api::AppState;
use portfolio_site::cache::ManualClock;
use portfolio_site::{Activity, SiteConfig};

const BODY_LIMIT: usize = 1024 * 1024;
const LASTFM_JSON: &str = include_str!("fixtures/lastfm_recent.json");
const LETTERBOXD_XML: &str = include_str!("fixtures/letterboxd_rss.xml");
const PIXEL: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

fn stub() -> StubFetch {
    StubFetch::new()
        .with_route(
            API_URL,
            StubReply::ok(LASTFM_JSON.replace("__SECOND_UTS__", "1740830300")),
        )
        .with_route("https://letterboxd.com/", StubReply::ok(LETTERBOXD_XML))
        .with_route(
            "https://lastfm.freetls.fastly.net/",
            StubReply::ok_typed("image/jpeg", PIXEL),
        )
        .with_route(
            "https://a.ltrbxd.com/",
            StubReply::ok_typed("image/jpeg", PIXEL),
        )
}

/// Same router the binary serves, minus `/metrics`.
fn test_router(http: StubFetch) -> Router {
    test_router_shared(Arc::new(http))
}

fn test_router_shared(http: Arc<StubFetch>) -> Router {
    let cfg = SiteConfig {
        lastfm_api_key: Some("k".into()),
        github_token: Some("t".into()),
        ..SiteConfig::default()
    };
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));
    let activity = Activity::new(cfg, http, clock);
    portfolio_site::router(AppState::new(activity))
}

async fn get(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, headers, bytes)
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, _, body) = get(test_router(stub()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap().trim(), "OK");
}

#[tokio::test]
async fn songs_endpoint_returns_json_with_cache_policy() {
    let (status, headers, body) = get(test_router(stub()), "/api/songs?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("max-age=60")));

    let v: Json = serde_json::from_slice(&body).expect("json");
    let songs = v.as_array().expect("array");
    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0]["title"], "Time (You and I)");
    assert_eq!(songs[0]["playing"], true);
    assert!(songs[0]["date"].is_null());
    assert_eq!(songs[1]["title"], "Numb");
}

#[tokio::test]
async fn films_endpoint_uses_default_limit() {
    let (status, _, body) = get(test_router(stub()), "/api/films").await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&body).unwrap();
    let films = v.as_array().unwrap();
    assert_eq!(films.len(), 3);
    assert_eq!(films[0]["title"], "Amélie");
    assert_eq!(films[0]["date"], "2025-03-07");
    assert_eq!(films[2]["rewatch"], true);
}

#[tokio::test]
async fn upstream_failure_is_an_empty_500() {
    let http = stub();
    http.set_route(API_URL, StubReply::status(503));

    let (status, _, body) = get(test_router(http), "/api/songs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
}

#[tokio::test]
async fn repository_route_joins_owner_and_name() {
    let http = stub().with_route(
        "https://api.github.com/repos/someone/site",
        StubReply::ok(
            r#"{"created_at":"2021-05-01T10:00:00Z","updated_at":"2025-02-27T08:30:00Z",
                "pushed_at":"2025-02-28T19:45:00Z","forks_count":1,"open_issues_count":0,
                "stargazers_count":9,"subscribers_count":2}"#,
        ),
    );

    let (status, _, body) = get(test_router(http), "/api/repos/someone/site").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["stars"], 9);
    assert_eq!(v["watchers"], 2);
    assert_eq!(v["pushed"], "2025-02-28T19:45:00Z");
}

#[tokio::test]
async fn time_endpoint_reports_beats_for_the_clock() {
    let (status, headers, body) = get(test_router(stub()), "/api/time").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap().to_str().unwrap(),
        "no-store"
    );
    let v: Json = serde_json::from_slice(&body).unwrap();
    // 12:00 UTC == 13:00 in Biel
    assert_eq!(v["beats"], "541.67");
}

#[tokio::test]
async fn song_widget_is_svg_with_inlined_cover() {
    let (status, headers, body) = get(test_router(stub()), "/widgets/song.svg?dark=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
        "image/svg+xml"
    );

    let svg = String::from_utf8(body).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("Time (You and I)"));
    assert!(svg.contains("Listening now"));
    assert!(svg.contains("data:image/jpeg;base64,"));
    // dark background
    assert!(svg.contains("#09090b"));
}

#[tokio::test]
async fn film_widget_light_by_default() {
    let (status, _, body) = get(test_router(stub()), "/widgets/film.svg").await;
    assert_eq!(status, StatusCode::OK);

    let svg = String::from_utf8(body).unwrap();
    assert!(svg.contains("Amélie"));
    assert!(svg.contains("2001"));
    assert!(svg.contains("#ffffff"));
    assert!(svg.contains("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn widget_without_activity_is_500() {
    let http = stub();
    http.set_route(
        "https://letterboxd.com/",
        StubReply::ok(r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#),
    );

    let (status, _, body) = get(test_router(http), "/widgets/film.svg").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
}

#[tokio::test]
async fn widget_images_are_fetched_once_per_url() {
    let http = Arc::new(stub());
    let app = test_router_shared(http.clone());

    for uri in ["/widgets/film.svg", "/widgets/film.svg?dark", "/widgets/song.svg"] {
        let (status, _, body) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("data:image/jpeg;base64,"));
    }

    // one poster + one cover
    assert_eq!(http.calls_to("image"), 2);
    assert_eq!(http.calls_to("letterboxd"), 1);
}
