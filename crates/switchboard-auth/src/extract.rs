use std::net::IpAddr;

use http::HeaderMap;

/// Credential material found on a request
///
/// A bearer token can be either an API key or a session token; the
/// authenticator tries the session store first and falls back to the
/// credential catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSources {
    /// `Authorization: Bearer` value
    pub bearer: Option<String>,
    /// `X-API-Key` header or `api_key` query parameter
    pub api_key: Option<String>,
    /// `X-Session-Token` header or `session_token` query parameter
    pub session_token: Option<String>,
}

impl CredentialSources {
    /// Whether the request carried any credential material at all
    pub fn is_empty(&self) -> bool {
        self.bearer.is_none() && self.api_key.is_none() && self.session_token.is_none()
    }

    /// Candidate session tokens in priority order
    pub fn session_candidates(&self) -> impl Iterator<Item = &str> {
        self.bearer.as_deref().into_iter().chain(self.session_token.as_deref())
    }

    /// Candidate API keys in priority order
    pub fn api_key_candidates(&self) -> impl Iterator<Item = &str> {
        self.bearer.as_deref().into_iter().chain(self.api_key.as_deref())
    }
}

/// Pull credential material out of headers and query parameters
///
/// Priority: `Authorization: Bearer`, `X-API-Key`, `X-Session-Token`,
/// `session_token` query parameter, `api_key` query parameter.
pub fn extract_sources(headers: &HeaderMap, query: Option<&str>) -> CredentialSources {
    let bearer = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());

    let mut api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());

    let mut session_token = headers
        .get("x-session-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty());

    if let Some(query) = query {
        for pair in query.split('&') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default().trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "session_token" if session_token.is_none() => session_token = Some(value.to_owned()),
                "api_key" if api_key.is_none() => api_key = Some(value.to_owned()),
                _ => {}
            }
        }
    }

    CredentialSources {
        bearer,
        api_key,
        session_token,
    }
}

/// Whether the peer address is the loopback interface
///
/// IPv4 `127.0.0.0/8`, IPv6 `::1`, and IPv4-mapped loopback all count.
pub fn is_loopback(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}
