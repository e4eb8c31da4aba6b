use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

/// Default session lifetime
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24);
/// How often the sweeper scans for expired sessions
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Token entropy in bytes (256 bits)
const TOKEN_BYTES: usize = 32;

/// One live session
///
/// State machine: issued → (bound) → expired/revoked. Binding is optional
/// and a re-bind replaces the previous binding.
#[derive(Debug, Clone)]
pub struct Session {
    /// Credential this session was minted from
    pub credential_id: String,
    pub created_at: Instant,
    pub expires_at: Instant,
    /// At most one bound (provider, model) pair
    pub bound_model: Option<(String, String)>,
}

impl Session {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// In-memory session map
///
/// One lock, taken briefly by every operation. Expired entries behave as
/// if they never existed; the background sweeper reclaims their memory.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Session lifetime in seconds, for login responses
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Mint a session for a credential, optionally pre-bound
    pub fn create(&self, credential_id: &str, bound_model: Option<(String, String)>) -> String {
        let token = new_token();
        let now = Instant::now();
        let session = Session {
            credential_id: credential_id.to_owned(),
            created_at: now,
            expires_at: now + self.ttl,
            bound_model,
        };
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .insert(token.clone(), session);
        token
    }

    /// Look up a live session; expired entries are evicted on the spot
    pub fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        match sessions.get(token) {
            Some(session) if session.is_expired() => {
                sessions.remove(token);
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// Revoke a session; true when a live entry was removed
    pub fn delete(&self, token: &str) -> bool {
        self.sessions.lock().expect("session lock poisoned").remove(token).is_some()
    }

    /// Bind (or re-bind) a model to a session
    pub fn bind(&self, token: &str, provider: &str, model: &str) -> Result<(), AuthError> {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        match sessions.get_mut(token) {
            Some(session) if !session.is_expired() => {
                session.bound_model = Some((provider.to_owned(), model.to_owned()));
                Ok(())
            }
            Some(_) => {
                sessions.remove(token);
                Err(AuthError::SessionNotFound)
            }
            None => Err(AuthError::SessionNotFound),
        }
    }

    /// Evict expired sessions, returning how many were removed
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        before - sessions.len()
    }

    /// Live session count (expired-but-unswept entries excluded)
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .values()
            .filter(|s| !s.is_expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the eviction sweeper until cancelled
    pub async fn run_sweeper(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = self.sweep();
                    if evicted > 0 {
                        tracing::debug!(evicted, "swept expired sessions");
                    }
                }
                () = shutdown.cancelled() => break,
            }
        }
    }
}

/// URL-safe token with 256 bits of OS randomness
fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
