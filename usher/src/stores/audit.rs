//! Audit sink client.
//!
//! Successful provisioning is recorded through an append-only RPC endpoint.
//! Appending is best effort; the [`crate::audit`] module decides what to do
//! when it fails (log and move on), this client only reports the failure.

use crate::config::StoreConfig;
use crate::stores::{Result, ensure_slash, error_from_response};
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::instrument;
use url::Url;

/// What happened, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    UserCreated,
}

/// One audit trail event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    /// The administrator who performed the action.
    pub admin_user_id: UserId,
    pub action_type: ActionType,
    /// Which logical table the action touched.
    pub table_name: String,
    /// The row the action created or changed.
    pub record_id: UserId,
    pub timestamp: DateTime<Utc>,
    /// The values as written, for later inspection.
    pub new_values: serde_json::Value,
    /// Request context that is not part of the written row.
    pub metadata: serde_json::Value,
}

/// Append-only audit event recording.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()>;
}

/// The concrete `reqwest` implementation of [`AuditSink`].
pub struct HttpAuditSink {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl HttpAuditSink {
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
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    #[instrument(skip_all, fields(record_id = %entry.record_id))]
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        let url = ensure_slash(&self.base_url).join("rpc/append_audit_log")?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .json(entry)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }
}
