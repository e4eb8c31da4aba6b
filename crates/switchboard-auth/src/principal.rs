use std::net::IpAddr;
use std::sync::Arc;

use switchboard_catalog::{Catalog, Credential, ParameterLimits};

use crate::error::AuthError;
use crate::extract::{CredentialSources, is_loopback};
use crate::session::{Session, SessionStore};

/// What a request resolved to
#[derive(Debug, Clone)]
pub enum Principal {
    /// Credential-backed identity, possibly via a session
    Credential {
        credential: Arc<Credential>,
        /// Present when the credential arrived through a session token
        session: Option<Session>,
    },
    /// Uncredentialed request from the loopback interface
    AnonymousLocal,
}

impl Principal {
    /// Allow-list check for a target model
    ///
    /// Anonymous-local principals bypass the allow-lists.
    pub fn authorize(&self, provider: &str, model: &str) -> Result<(), AuthError> {
        match self {
            Self::AnonymousLocal => Ok(()),
            Self::Credential { credential, .. } => {
                if credential.allows_model(provider, model) {
                    Ok(())
                } else {
                    Err(AuthError::Forbidden(format!(
                        "credential does not allow model {provider}/{model}"
                    )))
                }
            }
        }
    }

    /// Parameter caps to apply for this principal
    pub fn parameter_limits(&self) -> Option<ParameterLimits> {
        match self {
            Self::AnonymousLocal => None,
            Self::Credential { credential, .. } => credential.parameter_limits.clone(),
        }
    }

    /// Model bound to the backing session, if any
    pub fn bound_model(&self) -> Option<&(String, String)> {
        match self {
            Self::Credential { session, .. } => session.as_ref().and_then(|s| s.bound_model.as_ref()),
            Self::AnonymousLocal => None,
        }
    }

    /// Session token is only known to the caller; expose the session data
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Credential { session, .. } => session.as_ref(),
            Self::AnonymousLocal => None,
        }
    }
}

/// Resolves requests to principals and serves the login flow
#[derive(Clone)]
pub struct Authenticator {
    catalog: Catalog,
    sessions: Arc<SessionStore>,
    /// When false (or when no credential is configured), remote requests
    /// pass unauthenticated like local ones
    require_auth: bool,
}

impl Authenticator {
    pub fn new(catalog: Catalog, sessions: Arc<SessionStore>, require_auth: bool) -> Self {
        Self {
            catalog,
            sessions,
            require_auth,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Whether enforcement is actually in effect
    fn enforced(&self) -> bool {
        self.require_auth && self.catalog.has_active_credentials()
    }

    /// Resolve a request to a principal
    ///
    /// Credentialed requests are validated regardless of origin: a bad
    /// key from loopback is forbidden, not silently bypassed. Only a
    /// credential-free loopback request gets the anonymous-local path.
    pub fn authenticate(&self, sources: &CredentialSources, peer: IpAddr) -> Result<Principal, AuthError> {
        // A presented session token always resolves if live
        for token in sources.session_candidates() {
            if let Some(session) = self.sessions.get(token) {
                let credential = self
                    .catalog
                    .get_credential_by_id(&session.credential_id)
                    .map_err(|_| AuthError::Forbidden("session credential no longer exists".to_owned()))?;
                return Ok(Principal::Credential {
                    credential,
                    session: Some(session),
                });
            }
        }

        // Then a presented API key
        let mut presented_key = false;
        for key in sources.api_key_candidates() {
            presented_key = true;
            if let Ok(credential) = self.catalog.get_credential_by_secret(key) {
                return Ok(Principal::Credential {
                    credential,
                    session: None,
                });
            }
        }

        if !sources.is_empty() && presented_key {
            // Material was supplied but nothing matched
            return Err(AuthError::Forbidden("invalid API key or session token".to_owned()));
        }
        if !sources.is_empty() {
            // Only an unknown session token was supplied
            return Err(AuthError::Forbidden("invalid or expired session token".to_owned()));
        }

        if is_loopback(peer) || !self.enforced() {
            return Ok(Principal::AnonymousLocal);
        }

        Err(AuthError::Required)
    }

    /// Validate a secret and mint a session token
    ///
    /// The comparison is constant-time inside the catalog. An optional
    /// `(provider, model)` pre-binds the session.
    pub fn login(&self, secret: &str, bind: Option<(String, String)>) -> Result<String, AuthError> {
        let credential = self
            .catalog
            .get_credential_by_secret(secret)
            .map_err(|_| AuthError::Forbidden("invalid API key".to_owned()))?;

        if let Some((provider, model)) = &bind
            && !credential.allows_model(provider, model)
        {
            return Err(AuthError::Forbidden(format!(
                "credential does not allow model {provider}/{model}"
            )));
        }

        tracing::info!(credential_id = %credential.id, "session issued");
        Ok(self.sessions.create(&credential.id, bind))
    }

    /// Revoke a session
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        if self.sessions.delete(token) {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    /// Bind a model to a live session after validating the target exists
    /// and the session's credential allows it
    pub fn bind_model(&self, token: &str, provider: &str, model: &str) -> Result<(), AuthError> {
        let session = self.sessions.get(token).ok_or(AuthError::SessionNotFound)?;

        self.catalog
            .get_model(provider, model)
            .map_err(|_| AuthError::Forbidden(format!("model {provider}/{model} does not exist")))?;

        let credential = self
            .catalog
            .get_credential_by_id(&session.credential_id)
            .map_err(|_| AuthError::Forbidden("session credential no longer exists".to_owned()))?;
        if !credential.allows_model(provider, model) {
            return Err(AuthError::Forbidden(format!(
                "credential does not allow model {provider}/{model}"
            )));
        }

        self.sessions.bind(token, provider, model)
    }
}
