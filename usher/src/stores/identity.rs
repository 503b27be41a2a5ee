//! Identity store client.
//!
//! The identity store owns credential accounts: it verifies access tokens
//! and exposes a privileged admin API for creating and deleting accounts.
//! Account creation here is step A of the provisioning saga; the delete
//! endpoint doubles as the compensating action when step B fails.

use crate::config::StoreConfig;
use crate::stores::{Result, StoreError, ensure_slash, error_from_response};
use crate::types::UserId;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Free-form account attributes stored alongside the credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityMetadata {
    pub full_name: Option<String>,
}

/// The identity store's view of an account.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityRecord {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub metadata: IdentityMetadata,
}

/// Request payload for the privileged account-creation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityCreate {
    pub email: String,
    pub password: String,
    /// When true the account starts with a confirmed address and the store
    /// sends no verification mail.
    pub email_confirm: bool,
    pub metadata: IdentityMetadata,
}

/// Credential account operations backing authentication and provisioning.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve the account a bearer access token belongs to. A store
    /// rejection means the token is invalid or expired.
    async fn verify_token(&self, token: &str) -> Result<IdentityRecord>;

    /// Create an account through the store's admin API.
    async fn create_user(&self, request: &IdentityCreate) -> Result<IdentityRecord>;

    /// Delete an account. Used as the compensating action for half-finished
    /// provisioning, and must succeed for accounts that exist.
    async fn delete_user(&self, id: UserId) -> Result<()>;
}

/// The concrete `reqwest` implementation of [`IdentityStore`].
pub struct HttpIdentityStore {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl HttpIdentityStore {
    pub fn new(config: &StoreConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url: config.url.clone(),
            service_key: config.service_key.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(ensure_slash(&self.base_url).join(path)?)
    }
}

#[async_trait]
impl IdentityStore for HttpIdentityStore {
    #[instrument(skip_all)]
    async fn verify_token(&self, token: &str) -> Result<IdentityRecord> {
        let url = self.endpoint("user")?;
        let response = self.client.get(url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            // Only the store's own auth verdict is a rejection. An outage
            // during verification must not read as a bad credential.
            return Err(match error_from_response(response).await {
                err @ StoreError::Rejected { status: 401 | 403, .. } => err,
                StoreError::Rejected { status, message } => {
                    StoreError::InvalidResponse(format!("verify endpoint answered {status}: {message}"))
                }
                other => other,
            });
        }

        response
            .json::<IdentityRecord>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("account payload: {e}")))
    }

    #[instrument(skip_all, fields(email = %request.email))]
    async fn create_user(&self, request: &IdentityCreate) -> Result<IdentityRecord> {
        let url = self.endpoint("admin/users")?;
        debug!("Creating identity account at {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        // An account id must come back; a 2xx without one is unusable.
        response
            .json::<IdentityRecord>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("created account payload: {e}")))
    }

    #[instrument(skip_all, fields(user_id = %id))]
    async fn delete_user(&self, id: UserId) -> Result<()> {
        let url = self.endpoint(&format!("admin/users/{id}"))?;
        debug!("Deleting identity account at {}", url);

        let response = self.client.delete(url).bearer_auth(&self.service_key).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}
