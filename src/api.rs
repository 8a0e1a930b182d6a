use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::activity::types::FetchError;
use crate::activity::Activity;
use crate::internet_time::internet_time;
use crate::widget::{self, Theme};

pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 50;

const CACHE_SONGS: &str = "public, max-age=60, stale-while-revalidate=60";
const CACHE_HOURS: &str = "public, max-age=3600, stale-while-revalidate=600";
const CACHE_NONE: &str = "no-store";

#[derive(Clone)]
pub struct AppState {
    pub activity: Arc<Activity>,
}

impl AppState {
    pub fn new(activity: Activity) -> Self {
        Self {
            activity: Arc::new(activity),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/songs", get(songs))
        .route("/api/films", get(films))
        .route("/api/repos/{owner}/{name}", get(repository))
        .route("/api/time", get(time))
        .route("/widgets/song.svg", get(song_widget))
        .route("/widgets/film.svg", get(film_widget))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Empty-body 500; upstream details stay in the logs.
#[derive(Debug)]
pub struct ApiError;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        tracing::warn!(error = %err, kind = err.kind(), "api upstream failure");
        ApiError
    }
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Deserialize)]
struct WidgetQuery {
    dark: Option<String>,
}

fn with_cache_control(mut resp: Response, policy: &'static str) -> Response {
    resp.headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(policy));
    resp
}

fn svg_response(svg: String, policy: &'static str) -> Response {
    let resp = (
        [(header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"))],
        svg,
    )
        .into_response();
    with_cache_control(resp, policy)
}

async fn songs(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let songs = state.activity.try_latest_songs(q.resolve()).await?;
    Ok(with_cache_control(Json(songs).into_response(), CACHE_SONGS))
}

async fn films(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let films = state.activity.try_latest_films(q.resolve()).await?;
    Ok(with_cache_control(Json(films).into_response(), CACHE_HOURS))
}

async fn repository(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let repo = state
        .activity
        .try_repository(&format!("{owner}/{name}"))
        .await?;
    Ok(with_cache_control(Json(repo).into_response(), CACHE_HOURS))
}

#[derive(Serialize)]
struct TimeOut {
    beats: String,
}

async fn time(State(state): State<AppState>) -> Response {
    let beats = internet_time(state.activity.clock().now());
    with_cache_control(Json(TimeOut { beats }).into_response(), CACHE_NONE)
}

async fn song_widget(
    State(state): State<AppState>,
    Query(q): Query<WidgetQuery>,
) -> Result<Response, ApiError> {
    let theme = Theme::from_query_flag(q.dark.as_deref());
    let activity = &state.activity;

    let song = activity
        .try_latest_songs(1)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError)?;
    let cover = match song.cover.as_deref() {
        Some(url) => activity.image_data_uri(url).await,
        None => None,
    };

    let svg = widget::render_song_widget(&song, cover.as_deref(), theme, activity.clock().now());
    Ok(svg_response(svg, CACHE_SONGS))
}

async fn film_widget(
    State(state): State<AppState>,
    Query(q): Query<WidgetQuery>,
) -> Result<Response, ApiError> {
    let theme = Theme::from_query_flag(q.dark.as_deref());
    let activity = &state.activity;

    let film = activity
        .try_latest_films(1)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError)?;
    let poster = match film.poster.as_deref() {
        Some(url) => activity.image_data_uri(url).await,
        None => None,
    };

    let today = activity.clock().now().date_naive();
    let svg = widget::render_film_widget(&film, poster.as_deref(), theme, today);
    Ok(svg_response(svg, CACHE_HOURS))
}
