use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use switchboard_auth::extract_sources;

use crate::error::error_response;
use crate::state::AppState;

/// Paths served without a resolved principal
///
/// The session routes validate their own token so unknown tokens map to
/// 404 instead of a blanket middleware 403; health is public.
const PUBLIC_PATHS: &[&str] = &["/health", "/auth/login", "/auth/logout", "/auth/bind-model"];

/// Resolve the request to a principal and stash it in the extensions
///
/// Credential sources are kept alongside so the session routes can see
/// the presented token (the principal itself never exposes it).
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let sources = extract_sources(request.headers(), request.uri().query());
    let peer = peer_ip(&request);

    match state.auth.authenticate(&sources, peer) {
        Ok(principal) => {
            let mut request = request;
            request.extensions_mut().insert(principal);
            request.extensions_mut().insert(sources);
            next.run(request).await
        }
        Err(error) => {
            tracing::debug!(%path, error = %error, "authentication rejected");
            error_response(&error)
        }
    }
}

/// Peer IP from the connection info
///
/// Absent connection info (embedded test routers) is treated as local,
/// matching the lenient behavior for unidentifiable peers.
fn peer_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| IpAddr::from([127, 0, 0, 1]), |info| info.0.ip())
}
