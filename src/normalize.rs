//! Canonical form of opportunity URLs, used as the duplicate-detection key.

use anyhow::{Result, bail};
use url::Url;

use crate::constants::TRACKING_PARAMS;

/// Cleans a user-supplied URL: trims it, defaults the scheme to `https://`
/// and drops tracking query parameters. Other parameters keep their order.
///
/// Normalizing an already normalized URL returns it unchanged.
///
/// # Errors
///
/// Returns an error if the input is blank or cannot be parsed as a URL.
pub fn clean_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Missing required field: URL");
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url =
        Url::parse(&with_scheme).map_err(|e| anyhow::anyhow!("Invalid URL {trimmed}: {e}"))?;

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url.to_string())
}

/// Whether a stored URL denotes `normalized`. Stored URLs may predate the
/// current normalization, so they are normalized before comparing.
pub fn is_same_url(stored: &str, normalized: &str) -> bool {
    stored == normalized || clean_url(stored).is_ok_and(|stored| stored == normalized)
}
