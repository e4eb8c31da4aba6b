use std::time::Duration;

use switchboard_auth::Authenticator;
use switchboard_core::Deadline;
use switchboard_router::RouterEngine;

/// Shared state for all route handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: RouterEngine,
    pub auth: Authenticator,
    /// Budget given to each inbound request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: RouterEngine, auth: Authenticator, request_timeout: Duration) -> Self {
        Self {
            engine,
            auth,
            request_timeout,
        }
    }

    /// Fresh deadline for a request arriving now
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}
