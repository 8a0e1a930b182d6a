use chrono::NaiveDate;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::activity::http::UpstreamRequest;
use crate::activity::types::{FetchError, Film};

pub const FILM_URL_TEMPLATE: &str = "https://letterboxd.com/film/{slug}/";

static RE_POSTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?:)([\s\w./|-])*\.jpg").expect("poster regex"));
static RE_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"film/([^/?#]+)").expect("slug regex"));

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

// Prefixed names are matched as written; the aliases cover readers that
// strip namespace prefixes.
#[derive(Debug, Deserialize)]
struct Item {
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "letterboxd:watchedDate", alias = "watchedDate")]
    watched_date: Option<String>,
    #[serde(rename = "letterboxd:rewatch", alias = "rewatch")]
    rewatch: Option<String>,
    #[serde(rename = "letterboxd:filmTitle", alias = "filmTitle")]
    film_title: Option<String>,
    #[serde(rename = "letterboxd:filmYear", alias = "filmYear")]
    film_year: Option<String>,
    #[serde(rename = "letterboxd:memberRating", alias = "memberRating")]
    member_rating: Option<String>,
}

pub fn feed_url(username: &str) -> String {
    format!("https://letterboxd.com/{username}/rss/")
}

pub fn request(username: &str) -> UpstreamRequest {
    UpstreamRequest::get("letterboxd", feed_url(username))
}

/// Parse the RSS feed into at most `limit` diary entries, newest first.
///
/// Items without a watched date (lists, plain reviews) are dropped. Diary
/// items that cannot be normalized are skipped with a warning.
pub fn parse_feed(xml: &str, limit: usize) -> Result<Vec<Film>, FetchError> {
    let rss: Rss = from_str(xml).map_err(FetchError::malformed)?;

    let mut diary: Vec<Item> = rss
        .channel
        .item
        .into_iter()
        .filter(|it| {
            it.watched_date
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
        })
        .collect();

    // Zero-padded YYYY-MM-DD, so string order is date order. Stable sort
    // keeps feed order for same-day entries.
    diary.sort_by(|a, b| b.watched_date.cmp(&a.watched_date));

    let films = diary
        .into_iter()
        .filter_map(|it| match to_film(it) {
            Ok(film) => Some(film),
            Err(e) => {
                tracing::warn!(error = %e, provider = "letterboxd", "skipping diary entry");
                None
            }
        })
        .take(limit)
        .collect();

    Ok(films)
}

fn to_film(it: Item) -> Result<Film, FetchError> {
    let raw_title = it
        .film_title
        .ok_or_else(|| FetchError::Malformed("diary entry without film title".into()))?;
    let title = html_escape::decode_html_entities(raw_title.trim()).to_string();

    let year = it
        .film_year
        .as_deref()
        .map(str::trim)
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| FetchError::Malformed(format!("bad film year for {title:?}")))?;

    let watched = it.watched_date.unwrap_or_default();
    let date = NaiveDate::parse_from_str(watched.trim(), "%Y-%m-%d")
        .map_err(|e| FetchError::Malformed(format!("bad watched date {watched:?}: {e}")))?;

    let link = it.link.unwrap_or_default();
    let slug = film_slug(&link)
        .ok_or_else(|| FetchError::Malformed(format!("no film slug in link {link:?}")))?;

    // Zero passes through as given; only unparsable values are dropped.
    let rating = it
        .member_rating
        .as_deref()
        .and_then(|r| r.trim().parse::<f32>().ok())
        .filter(|r| r.is_finite() && *r >= 0.0);

    Ok(Film {
        title,
        year,
        url: film_url(slug),
        date,
        rating,
        rewatch: it.rewatch.as_deref().map(str::trim) == Some("Yes"),
        poster: it.description.as_deref().and_then(poster_url),
    })
}

/// Path segment after `film/` in a diary permalink.
pub fn film_slug(link: &str) -> Option<&str> {
    RE_SLUG
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn film_url(slug: &str) -> String {
    FILM_URL_TEMPLATE.replace("{slug}", slug)
}

/// First `http(s)://….jpg` found in the item description.
pub fn poster_url(description: &str) -> Option<String> {
    RE_POSTER
        .find(description)
        .map(|m| m.as_str().to_string())
}
