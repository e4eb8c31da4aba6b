//! Credential and session authentication
//!
//! Resolves incoming requests to a principal: a credential-backed
//! identity, the anonymous-local principal for uncredentialed loopback
//! traffic, or a rejection. Sessions are in-memory bearer tokens minted
//! from credentials; they do not survive a restart.

mod error;
mod extract;
mod principal;
mod session;

pub use error::AuthError;
pub use extract::{CredentialSources, extract_sources, is_loopback};
pub use principal::{Authenticator, Principal};
pub use session::{Session, SessionStore};
