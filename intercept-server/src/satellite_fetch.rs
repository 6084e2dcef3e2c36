//! CelesTrak TLE fetch, the network half of C9.
//!
//! Grounded on `original_source/routes/satellite.py`'s `fetch_celestrak`
//! (host allow-list, response-size cap) with the triplet parsing and cache
//! update delegated to `intercept_core::tle` (pure, unit-testable without
//! network access).

use std::sync::Arc;

use intercept_core::tle::{internal_name_for_display, parse_tle_triplets, TleCache};
use log::{info, warn};
use thiserror::Error;
use tokio::sync::Mutex;

const ALLOWED_HOSTS: &[&str] = &["celestrak.org", "www.celestrak.org", "celestrak.com", "www.celestrak.com"];
const MAX_RESPONSE_BYTES: usize = 1024 * 1024;
const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("host not allow-listed for TLE fetch")]
    HostNotAllowed,
    #[error("response exceeded {MAX_RESPONSE_BYTES} bytes")]
    ResponseTooLarge,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

fn celestrak_url(group: &str) -> String {
    format!("https://celestrak.org/NORAD/elements/gp.php?GROUP={group}&FORMAT=tle")
}

fn check_host_allowed(url: &str) -> Result<(), FetchError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::HostNotAllowed)?;
    match parsed.host_str() {
        Some(host) if ALLOWED_HOSTS.contains(&host) => Ok(()),
        _ => Err(FetchError::HostNotAllowed),
    }
}

async fn fetch_capped(url: &str) -> Result<String, FetchError> {
    check_host_allowed(url)?;
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let response = client.get(url).send().await?;
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(FetchError::ResponseTooLarge);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Fetches `group` (e.g. `"stations"`, `"weather"`) from CelesTrak,
/// parses the TLE triplets, and overwrites matching entries in `cache`.
/// Returns the number of entries updated.
pub async fn update_from_celestrak(cache: &Arc<Mutex<TleCache>>, group: &str) -> Result<usize, FetchError> {
    let url = celestrak_url(group);
    let text = fetch_capped(&url).await?;
    let triplets = parse_tle_triplets(&text);
    let mut guard = cache.lock().await;
    let mut updated = 0;
    for triplet in &triplets {
        let internal_name = internal_name_for_display(&triplet.name);
        if guard.update(internal_name, &triplet.name, &triplet.line1, &triplet.line2).is_ok() {
            updated += 1;
        }
    }
    if updated == 0 {
        warn!("celestrak fetch for group '{group}' matched no known satellites");
    } else {
        info!("updated {updated} TLE entries from celestrak group '{group}'");
    }
    Ok(updated)
}

/// Fetches and parses `category` without mutating the cache, for the
/// `/satellite/celestrak/<category>` read-only endpoint.
pub async fn fetch_category(category: &str) -> Result<Vec<intercept_core::tle::TleTriplet>, FetchError> {
    let url = celestrak_url(category);
    let text = fetch_capped(&url).await?;
    Ok(parse_tle_triplets(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_allowlisted_host() {
        assert!(check_host_allowed("https://evil.example.com/tle.txt").is_err());
    }

    #[test]
    fn accepts_celestrak_org() {
        assert!(check_host_allowed("https://celestrak.org/NORAD/elements/gp.php?GROUP=stations").is_ok());
    }

    #[test]
    fn accepts_www_subdomain() {
        assert!(check_host_allowed("https://www.celestrak.com/NORAD/elements/gp.php?GROUP=weather").is_ok());
    }
}
