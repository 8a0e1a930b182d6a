use base64::Engine as _;

use crate::activity::http::{HttpFetch, UpstreamRequest};
use crate::activity::types::FetchError;

const BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Images above this size are not inlined.
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_ENGINE.encode(bytes))
}

/// MIME type from a URL's file extension (query/fragment ignored).
pub fn mime_from_url(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Fetch an image and inline it as a data URI. External embedders (README
/// renderers) do not load remote images from inside an SVG.
pub async fn try_embed_image(http: &dyn HttpFetch, url: &str) -> Result<String, FetchError> {
    let resp = http
        .get(&UpstreamRequest::get("image", url))
        .await?
        .error_for_status()?;
    if resp.body.is_empty() || resp.body.len() > MAX_IMAGE_BYTES {
        return Err(FetchError::Malformed(format!(
            "image of {} bytes",
            resp.body.len()
        )));
    }

    let mime = resp
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_string())
        .filter(|ct| ct.starts_with("image/"))
        .or_else(|| mime_from_url(url).map(str::to_string))
        .ok_or_else(|| FetchError::Malformed("not an image".into()))?;

    Ok(data_uri(&mime, &resp.body))
}
