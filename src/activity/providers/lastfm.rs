// src/activity/providers/lastfm.rs
use serde::Deserialize;

use crate::activity::http::UpstreamRequest;
use crate::activity::types::{FetchError, Song};

pub const API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// A logged track this close to "now" next to an identical now-playing
/// entry is the same play listed twice.
pub const NOW_PLAYING_DEDUP_WINDOW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Deserialize)]
struct Envelope {
    recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: OneOrMany<Track>,
}

/// Last.fm collapses single-element arrays into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    artist: TextField,
    url: String,
    #[serde(default)]
    image: Vec<Image>,
    date: Option<TrackDate>,
    #[serde(rename = "@attr")]
    attr: Option<TrackAttr>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Image {
    size: String,
    #[serde(rename = "#text")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct TrackDate {
    uts: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    nowplaying: Option<String>,
}

/// Request for `limit + 1` tracks; the extra one absorbs a duplicated
/// now-playing entry.
pub fn request(username: &str, api_key: &str, limit: usize) -> UpstreamRequest {
    UpstreamRequest::get("lastfm", API_URL)
        .query("method", "user.getrecenttracks")
        .query("user", username)
        .query("api_key", api_key)
        .query("format", "json")
        .query("limit", limit + 1)
}

/// Parse a `user.getrecenttracks` JSON body into at most `limit` songs.
/// Tracks that cannot be normalized are skipped with a warning.
pub fn parse_recent_tracks(body: &str, now_ms: i64, limit: usize) -> Result<Vec<Song>, FetchError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(FetchError::malformed)?;

    let songs = envelope
        .recenttracks
        .track
        .into_vec()
        .into_iter()
        .filter_map(|track| match to_song(track) {
            Ok(song) => Some(song),
            Err(e) => {
                tracing::warn!(error = %e, provider = "lastfm", "skipping track");
                None
            }
        })
        .collect();

    let mut songs = dedup_now_playing(songs, now_ms);
    songs.truncate(limit);
    Ok(songs)
}

fn to_song(track: Track) -> Result<Song, FetchError> {
    let date = match track.date {
        Some(d) => {
            let secs: i64 = d
                .uts
                .trim()
                .parse()
                .map_err(|_| FetchError::Malformed(format!("bad track timestamp {:?}", d.uts)))?;
            Some(secs * 1000)
        }
        None => None,
    };

    // An explicit attribute decides; only its absence falls back to the date.
    let playing = match track.attr.and_then(|a| a.nowplaying) {
        Some(flag) => is_truthy(&flag),
        None => date.is_none(),
    };

    let cover = track
        .image
        .into_iter()
        .find(|img| img.size == "large")
        .map(|img| img.url)
        .filter(|url| !url.is_empty());

    Ok(Song {
        title: track.name,
        artist: track.artist.text,
        cover,
        date,
        playing,
        url: track.url,
    })
}

fn is_truthy(flag: &str) -> bool {
    matches!(flag.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// Drop the logged twin of a now-playing track.
pub fn dedup_now_playing(mut songs: Vec<Song>, now_ms: i64) -> Vec<Song> {
    let duplicate = match (songs.first(), songs.get(1)) {
        (Some(first), Some(second)) => {
            first.playing
                && first.url == second.url
                && second
                    .date
                    .is_some_and(|d| (now_ms - d).abs() <= NOW_PLAYING_DEDUP_WINDOW_MS)
        }
        _ => false,
    };
    if duplicate {
        songs.remove(1);
    }
    songs
}
