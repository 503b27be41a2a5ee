use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    stores::StoreError,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument};

/// Extract the bearer token from the Authorization header if present
/// Returns:
/// - None: No Authorization header present
/// - Some(Ok(token)): A bearer token was supplied
/// - Some(Err(error)): Header present but not a usable bearer credential
fn try_bearer_token(parts: &Parts) -> Option<Result<&str>> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let value = match header.to_str() {
        Ok(value) => value,
        Err(_) => {
            return Some(Err(Error::Unauthenticated {
                message: Some("Invalid token".to_string()),
            }));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Some(Ok(token)),
        _ => Some(Err(Error::Unauthenticated {
            message: Some("Invalid token".to_string()),
        })),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = match try_bearer_token(parts) {
            Some(Ok(token)) => token,
            Some(Err(e)) => return Err(e),
            None => return Err(Error::Unauthenticated { message: None }),
        };

        // The identity store is the only judge of the credential. A clean
        // rejection means the token is bad; anything else is a server
        // fault and must not look like an auth verdict.
        let identity = match state.identity.verify_token(token).await {
            Ok(identity) => identity,
            Err(StoreError::Rejected { .. }) => {
                return Err(Error::Unauthenticated {
                    message: Some("Invalid token".to_string()),
                });
            }
            Err(err) => return Err(err.into()),
        };

        debug!("Verified caller {}", identity.id);

        // The role lives in the profile store. A lookup failure is a
        // server fault; a missing row merely leaves the caller
        // unprivileged.
        let role = state.profiles.role_of(identity.id).await?;

        Ok(CurrentUser {
            id: identity.id,
            email: identity.email,
            role,
        })
    }
}
