//! Caller identity seam.
//!
//! Token validation lives in the HTTP layer. Route operations only need the
//! resolved user id, which they obtain through [`CallerIdentity`].

use notesync_core::{Error, Result};

/// Something that can name the user behind a request.
pub trait CallerIdentity: Send + Sync {
    /// The authenticated user id, or `None` when the request carries no
    /// valid identity.
    fn caller_id(&self) -> Option<String>;
}

/// Resolve the caller or fail with `Unauthenticated`.
pub fn require_caller(identity: &dyn CallerIdentity) -> Result<String> {
    match identity.caller_id() {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(Error::Unauthenticated(
            "No valid caller identity on request".to_string(),
        )),
    }
}

/// Fixed identity, for tests and command-line tooling.
#[derive(Debug, Clone, Default)]
pub struct StaticCaller(pub Option<String>);

impl StaticCaller {
    pub fn user(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CallerIdentity for StaticCaller {
    fn caller_id(&self) -> Option<String> {
        self.0.clone()
    }
}
