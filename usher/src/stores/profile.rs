//! Profile store client.
//!
//! The profile store holds the application-level row for each account,
//! including the role consulted for authorization. Rows are keyed by the
//! identity store's account id. Queries use the store's filter syntax
//! (`?id=eq.<uuid>&select=role`) and answer with a JSON array of rows.

use crate::api::models::users::{AccountStatus, Role};
use crate::config::StoreConfig;
use crate::stores::{Result, StoreError, ensure_slash, error_from_response};
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// A profile row as inserted during provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    pub id: UserId,
    pub full_name: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub updated_at: DateTime<Utc>,
}

/// Profile row operations backing authorization and provisioning.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Role recorded for an account, or `None` when the account has no
    /// profile row (or a role this service does not recognize).
    async fn role_of(&self, id: UserId) -> Result<Option<Role>>;

    /// Insert the profile row for a freshly created account. Step B of the
    /// provisioning saga.
    async fn insert(&self, profile: &ProfileRecord) -> Result<()>;
}

/// The concrete `reqwest` implementation of [`ProfileStore`].
pub struct HttpProfileStore {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl HttpProfileStore {
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
impl ProfileStore for HttpProfileStore {
    #[instrument(skip_all, fields(user_id = %id))]
    async fn role_of(&self, id: UserId) -> Result<Option<Role>> {
        let mut url = self.endpoint("profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("select", "role");

        let response = self.client.get(url).bearer_auth(&self.service_key).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        #[derive(Deserialize)]
        struct RoleRow {
            role: serde_json::Value,
        }

        let rows = response
            .json::<Vec<RoleRow>>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("role rows payload: {e}")))?;

        // Roles this service does not know are simply not the admin role.
        Ok(rows.into_iter().next().and_then(|row| serde_json::from_value(row.role).ok()))
    }

    #[instrument(skip_all, fields(user_id = %profile.id))]
    async fn insert(&self, profile: &ProfileRecord) -> Result<()> {
        let url = self.endpoint("profiles")?;
        debug!("Inserting profile row at {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=minimal")
            .json(profile)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}
