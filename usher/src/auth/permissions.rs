use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::ops::Deref;
use tracing::instrument;

/// Extractor that admits only administrators.
///
/// Wraps [`CurrentUser`] resolution and rejects any caller whose profile
/// role is not `admin`. A caller without a profile row is rejected the
/// same way: the absence of a role never grants anything.
#[derive(Debug)]
pub struct RequiresAdmin(pub CurrentUser);

impl Deref for RequiresAdmin {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for RequiresAdmin {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(Error::InsufficientPermissions { required: Role::Admin });
        }

        Ok(Self(user))
    }
}
