use url::Url;

use crate::config::DEFAULT_SIDECAR_BASE_URL;
use crate::error::SidecarApiError;

/// Resolves `path` against the sidecar base URL.
///
/// A blank base falls back to [`DEFAULT_SIDECAR_BASE_URL`]. Any path prefix on
/// the base is kept, so `http://host/api` + `chat` becomes `http://host/api/chat`.
pub fn endpoint_url(base_url: &str, path: &str) -> Result<Url, SidecarApiError> {
    let base = match base_url.trim() {
        "" => DEFAULT_SIDECAR_BASE_URL,
        trimmed => trimmed,
    };

    let mut parsed = Url::parse(base).map_err(|error| SidecarApiError::InvalidBaseUrl {
        url: base.to_string(),
        reason: error.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
        return Err(SidecarApiError::InvalidBaseUrl {
            url: base.to_string(),
            reason: "expected an http(s) base URL".to_string(),
        });
    }

    if !parsed.path().ends_with('/') {
        let with_slash = format!("{}/", parsed.path());
        parsed.set_path(&with_slash);
    }

    parsed
        .join(path.trim_start_matches('/'))
        .map_err(|error| SidecarApiError::InvalidBaseUrl {
            url: base.to_string(),
            reason: error.to_string(),
        })
}
