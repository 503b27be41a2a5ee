//! The account provisioning saga.
//!
//! Creating a platform account touches two stores that cannot be updated
//! atomically: the identity store assigns the account id (step A), then the
//! profile store gets a row keyed by that id (step B). When step B fails
//! the identity record is deleted again (step B'), so a profile row never
//! exists without its identity record and a failed request leaves nothing
//! behind. The compensation's own outcome is carried in the returned error
//! rather than swallowed, so callers and tests can see whether the rollback
//! actually happened.

use crate::api::models::users::UserCreate;
use crate::stores::{IdentityCreate, IdentityMetadata, IdentityStore, ProfileRecord, ProfileStore, StoreError};
use crate::types::UserId;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of the compensating delete after a failed profile insert.
#[derive(Debug)]
pub enum Compensation {
    /// The step A identity record was deleted again.
    RolledBack,
    /// The delete failed too; the identity record is orphaned.
    Failed(StoreError),
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::RolledBack => write!(f, "identity rolled back"),
            Compensation::Failed(err) => write!(f, "rollback failed: {err}"),
        }
    }
}

/// Errors that can occur while provisioning an account
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The request is missing the fields every account needs
    #[error("email and password are required")]
    MissingCredentials,

    /// Step A failed; nothing was created
    #[error("identity account creation failed: {0}")]
    Identity(StoreError),

    /// Step B failed after step A succeeded; the compensation outcome says
    /// whether the identity record was cleaned up
    #[error("profile insert failed ({compensation}): {source}")]
    Profile {
        source: StoreError,
        compensation: Compensation,
    },
}

/// A successfully provisioned account.
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    pub id: UserId,
    pub email: String,
    /// The profile row as written, with defaults applied.
    pub profile: ProfileRecord,
}

/// Coordinates account creation across the identity and profile stores.
#[derive(Clone)]
pub struct Provisioner {
    identity: Arc<dyn IdentityStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl Provisioner {
    pub fn new(identity: Arc<dyn IdentityStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    /// Run the saga for one request.
    ///
    /// Validates the request first so a rejected request performs no store
    /// calls at all. Duplicate emails are arbitrated by the identity
    /// store's uniqueness: there is no idempotency, a replay fails step A.
    #[instrument(skip_all)]
    pub async fn provision(&self, request: &UserCreate) -> Result<ProvisionedUser, ProvisionError> {
        let (email, password) = match (&request.email, &request.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => (email, password),
            _ => return Err(ProvisionError::MissingCredentials),
        };

        // Step A. The identity store assigns the account id and sends the
        // verification mail unless the account starts confirmed.
        let identity = self
            .identity
            .create_user(&IdentityCreate {
                email: email.clone(),
                password: password.clone(),
                email_confirm: !request.send_verification_email,
                metadata: IdentityMetadata {
                    full_name: request.full_name.clone(),
                },
            })
            .await
            .map_err(ProvisionError::Identity)?;

        info!(user_id = %identity.id, "Created identity account");

        // Step B. The profile row reuses the identity id as its key.
        let profile = ProfileRecord {
            id: identity.id,
            full_name: request.full_name.clone(),
            role: request.role.unwrap_or_default(),
            status: request.status.unwrap_or_default(),
            updated_at: Utc::now(),
        };

        if let Err(source) = self.profiles.insert(&profile).await {
            let compensation = match self.identity.delete_user(identity.id).await {
                Ok(()) => {
                    info!(user_id = %identity.id, "Rolled back identity account after profile failure");
                    Compensation::RolledBack
                }
                Err(err) => {
                    // Orphaned identity record; operators find it by this id.
                    warn!(user_id = %identity.id, error = %err, "Failed to roll back identity account");
                    Compensation::Failed(err)
                }
            };
            return Err(ProvisionError::Profile { source, compensation });
        }

        Ok(ProvisionedUser {
            id: identity.id,
            email: identity.email,
            profile,
        })
    }
}
