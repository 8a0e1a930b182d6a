//! Embeddable SVG cards for the latest song and film.

pub mod image;

use chrono::{DateTime, NaiveDate, Utc};

use crate::activity::types::{Film, Song};
use crate::format::{escape_xml, rating_stars, relative_day, relative_time, truncate};

pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 120;

const TITLE_MAX: usize = 32;
const SUBTITLE_MAX: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// `?dark`, `?dark=1`, `?dark=true`, `?dark=yes` select the dark theme.
    pub fn from_query_flag(flag: Option<&str>) -> Self {
        match flag.map(|f| f.trim().to_ascii_lowercase()) {
            Some(f) if f.is_empty() || matches!(f.as_str(), "1" | "true" | "yes" | "on") => {
                Theme::Dark
            }
            _ => Theme::Light,
        }
    }

    fn palette(self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: "#ffffff",
                border: "#e4e4e7",
                text: "#18181b",
                muted: "#71717a",
                accent: "#16a34a",
                placeholder: "#f4f4f5",
            },
            Theme::Dark => Palette {
                background: "#09090b",
                border: "#27272a",
                text: "#fafafa",
                muted: "#a1a1aa",
                accent: "#4ade80",
                placeholder: "#18181b",
            },
        }
    }
}

struct Palette {
    background: &'static str,
    border: &'static str,
    text: &'static str,
    muted: &'static str,
    accent: &'static str,
    placeholder: &'static str,
}

/// Song card. `cover` is an already inlined data URI.
pub fn render_song_widget(
    song: &Song,
    cover: Option<&str>,
    theme: Theme,
    now: DateTime<Utc>,
) -> String {
    let p = theme.palette();
    let status = match (song.playing, song.date) {
        (true, _) | (false, None) => "Listening now".to_string(),
        (false, Some(ms)) => DateTime::<Utc>::from_timestamp_millis(ms)
            .map(|then| relative_time(then, now))
            .unwrap_or_default(),
    };
    let status_color = if song.playing { p.accent } else { p.muted };

    let art = artwork(cover, 10, 10, 100, 100, &p);
    let lines = [
        text_line(125, 42, 17, "600", p.text, &truncate(&song.title, TITLE_MAX)),
        text_line(125, 66, 14, "400", p.muted, &truncate(&song.artist, SUBTITLE_MAX)),
        text_line(125, 96, 12, "500", status_color, &status),
    ];

    frame(&p, &song.title, &format!("{art}{}", lines.concat()))
}

/// Film card. `poster` is an already inlined data URI.
pub fn render_film_widget(
    film: &Film,
    poster: Option<&str>,
    theme: Theme,
    today: NaiveDate,
) -> String {
    let p = theme.palette();
    let mut watched = format!("Watched {}", relative_day(film.date, today));
    if film.rewatch {
        watched.push_str(" · rewatch");
    }
    let stars = film.rating.map(rating_stars).unwrap_or_default();

    let art = artwork(poster, 10, 10, 67, 100, &p);
    let lines = [
        text_line(92, 38, 17, "600", p.text, &truncate(&film.title, TITLE_MAX)),
        text_line(92, 60, 13, "400", p.muted, &film.year.to_string()),
        text_line(92, 84, 15, "400", p.accent, &stars),
        text_line(92, 106, 12, "500", p.muted, &watched),
    ];

    frame(&p, &film.title, &format!("{art}{}", lines.concat()))
}

fn frame(p: &Palette, title: &str, body: &str) -> String {
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img">"#,
            r#"<title>{title}</title>"#,
            r#"<rect x="0.5" y="0.5" width="{rw}" height="{rh}" rx="12" fill="{bg}" stroke="{border}"/>"#,
            r#"{body}"#,
            "</svg>"
        ),
        w = WIDTH,
        h = HEIGHT,
        rw = WIDTH - 1,
        rh = HEIGHT - 1,
        title = escape_xml(title),
        bg = p.background,
        border = p.border,
        body = body,
    )
}

fn artwork(uri: Option<&str>, x: u32, y: u32, w: u32, h: u32, p: &Palette) -> String {
    match uri {
        Some(href) => format!(
            r#"<image x="{x}" y="{y}" width="{w}" height="{h}" href="{}" preserveAspectRatio="xMidYMid slice"/>"#,
            escape_xml(href)
        ),
        None => format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="6" fill="{}"/>"#,
            p.placeholder
        ),
    }
}

fn text_line(x: u32, y: u32, size: u32, weight: &str, fill: &str, text: &str) -> String {
    format!(
        r#"<text x="{x}" y="{y}" font-family="system-ui, sans-serif" font-size="{size}" font-weight="{weight}" fill="{fill}">{}</text>"#,
        escape_xml(text)
    )
}
