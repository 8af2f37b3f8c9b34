use serde::Deserialize;
use std::time::Duration;

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_URL: &str = "https://crates.io/api/v1/crates/sessions-cli";
const USER_AGENT: &str = concat!("sessions/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(2);

/// Set to skip the network check entirely.
pub const SKIP_ENV: &str = "SESSIONS_SKIP_UPDATE_CHECK";
/// Overrides the registry endpoint queried for the latest version.
pub const URL_ENV: &str = "SESSIONS_UPDATE_URL";

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    max_version: String,
}

/// A one-line notice when a newer release is published. Any failure (offline,
/// timeout, unexpected payload) yields `None`.
pub fn notice() -> Option<String> {
    if std::env::var_os(SKIP_ENV).is_some() {
        return None;
    }
    let url = std::env::var(URL_ENV).unwrap_or_else(|_| DEFAULT_URL.to_string());
    let latest = fetch_latest(&url)?;
    is_newer(&latest, CURRENT_VERSION).then(|| {
        format!("Update available: sessions {latest} (installed {CURRENT_VERSION}).")
    })
}

fn fetch_latest(url: &str) -> Option<String> {
    let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
    let response = match agent.get(url).set("User-Agent", USER_AGENT).call() {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!(error = %e, "update check failed");
            return None;
        }
    };
    match response.into_json::<CrateResponse>() {
        Ok(body) => Some(body.krate.max_version),
        Err(e) => {
            tracing::debug!(error = %e, "unexpected update check response");
            None
        }
    }
}

fn parse_version(v: &str) -> Option<(u64, u64, u64)> {
    let core = v.trim().trim_start_matches('v');
    let core = core.split(['-', '+']).next()?;
    let mut parts = core.split('.').map(|p| p.parse::<u64>().ok());
    Some((parts.next()??, parts.next()??, parts.next().flatten().unwrap_or(0)))
}

fn is_newer(candidate: &str, installed: &str) -> bool {
    match (parse_version(candidate), parse_version(installed)) {
        (Some(c), Some(i)) => c > i,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison() {
        assert!(is_newer("0.2.0", "0.1.9"));
        assert!(is_newer("1.0.0", "0.9"));
        assert!(!is_newer("0.1.0", "0.1.0"));
        assert!(!is_newer("0.1.0-beta", "0.1.0"));
        assert!(!is_newer("garbage", "0.1.0"));
        assert!(is_newer("v0.1.1", "0.1.0"));
    }

    #[test]
    fn unreachable_endpoint_is_silent() {
        assert_eq!(fetch_latest("http://127.0.0.1:9/nothing"), None);
    }
}
