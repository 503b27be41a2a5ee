//! External store abstraction layer.
//!
//! Provisioning spans two platform services plus an audit endpoint, each
//! reached over HTTP:
//!
//! - **[`IdentityStore`]**: credential accounts. Verifies bearer tokens and
//!   exposes the privileged create/delete admin API.
//! - **[`ProfileStore`]**: application profile rows, keyed by the identity
//!   id, including the role consulted for authorization.
//! - **[`AuditSink`]**: append-only audit event endpoint.
//!
//! Each store is a trait so callers can be tested without the network; the
//! `Http*` implementations speak JSON over `reqwest` and authenticate with
//! the service key from [`crate::config::StoreConfig`].

use serde::Deserialize;
use url::Url;

pub mod audit;
pub mod identity;
pub mod profile;

pub use audit::{AuditLogEntry, AuditSink, HttpAuditSink};
pub use identity::{HttpIdentityStore, IdentityCreate, IdentityMetadata, IdentityRecord, IdentityStore};
pub use profile::{HttpProfileStore, ProfileRecord, ProfileStore};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur talking to an external store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered and refused the operation. The message is the
    /// store's own reason and is safe to show to an administrator.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The store could not be reached or the request failed in transit
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered but the answer was not usable
    #[error("unexpected store response: {0}")]
    InvalidResponse(String),

    /// A store endpoint URL could not be constructed
    #[error("failed to construct store URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Makes sure a url has a trailing slash.
///
/// This fixes a weird idiosyncracy in rusts 'join' method on urls, where joining URLs like
/// '/hello', 'world' gives you '/world', but '/hello/', 'world' gives you '/hello/world'.
/// Basically, call this before calling .join
pub(crate) fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// Turn a non-success response into a [`StoreError::Rejected`], pulling the
/// store's reason out of whichever error field it uses.
pub(crate) async fn error_from_response(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = extract_message(&body).unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else {
            body.clone()
        }
    });

    StoreError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Error payload fields seen across the platform services. The identity
/// store uses `msg`/`error_description`, the profile store uses `message`.
fn extract_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        msg: Option<String>,
        error_description: Option<String>,
        error: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.or(parsed.msg).or(parsed.error_description).or(parsed.error)
}
