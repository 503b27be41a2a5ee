//! Best-effort audit trail for provisioning actions.
//!
//! Audit events are appended after the saga commits and before the response
//! is written. A lost audit event never fails the request: the account
//! exists either way, so the failure is logged with enough context to
//! reconstruct the event and the response goes out unchanged.

use crate::api::models::users::CurrentUser;
use crate::provisioning::ProvisionedUser;
use crate::stores::AuditSink;
use crate::stores::audit::{ActionType, AuditLogEntry};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Records provisioning actions through an [`AuditSink`].
#[derive(Clone)]
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record a successful account creation.
    #[instrument(skip_all, fields(record_id = %user.id))]
    pub async fn user_created(&self, admin: &CurrentUser, user: &ProvisionedUser, send_verification_email: bool) {
        let entry = AuditLogEntry {
            admin_user_id: admin.id,
            action_type: ActionType::UserCreated,
            table_name: "profiles".to_string(),
            record_id: user.id,
            timestamp: Utc::now(),
            new_values: json!({
                "email": user.email,
                "full_name": user.profile.full_name,
                "role": user.profile.role,
                "status": user.profile.status,
            }),
            metadata: json!({
                "send_verification_email": send_verification_email,
            }),
        };

        if let Err(err) = self.sink.append(&entry).await {
            warn!(
                admin_user_id = %admin.id,
                record_id = %user.id,
                error = %err,
                "Failed to record audit event; the provisioned account is unaffected"
            );
        }
    }
}
