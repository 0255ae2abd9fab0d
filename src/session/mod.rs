//! Authentication: the identity seam, the auth flows and the auth state.

mod auth;
mod identity;

pub use auth::{AuthEvent, AuthFlow, AuthState};
pub use identity::{AuthUser, IdentityProvider, RestIdentityProvider, UserSnapshot};

use thiserror::Error;

use crate::util::{BodyError, UrlValidationError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The identity service refused the request; the text is user-facing.
    #[error("{0}")]
    Rejected(String),

    /// The stored tokens are no longer accepted and could not be renewed.
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,

    #[error("Identity service returned status {0}")]
    HttpStatus(u16),

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("Unexpected identity service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session storage failed: {0}")]
    Storage(String),
}
