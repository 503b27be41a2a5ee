//! Test utilities: in-memory store doubles and app builders (available with
//! the `test-utils` feature).
//!
//! The mock stores record every call so tests can assert on side effects,
//! and each mutating operation can be scripted to fail, which is how the
//! saga's compensation paths are exercised.

use crate::api::models::users::{CurrentUser, Role};
use crate::config::Config;
use crate::stores::audit::AuditLogEntry;
use crate::stores::{AuditSink, IdentityCreate, IdentityRecord, IdentityStore, ProfileRecord, ProfileStore, Result, StoreError};
use crate::AppState;
use crate::types::UserId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A failure a mock store should produce on its next calls.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// The store answers and refuses the operation
    Reject { status: u16, message: String },
    /// The store answers but the payload is unusable
    Invalid(String),
}

impl ScriptedFailure {
    fn to_store_error(&self) -> StoreError {
        match self {
            ScriptedFailure::Reject { status, message } => StoreError::Rejected {
                status: *status,
                message: message.clone(),
            },
            ScriptedFailure::Invalid(message) => StoreError::InvalidResponse(message.clone()),
        }
    }
}

/// In-memory [`IdentityStore`] with call recording and scripted failures.
///
/// Enforces email uniqueness under a single lock, like the real store's
/// constraint, so concurrent duplicate requests have exactly one winner.
#[derive(Default)]
pub struct MockIdentityStore {
    /// Known bearer tokens and the accounts they resolve to
    pub tokens: Mutex<HashMap<String, IdentityRecord>>,
    /// Live accounts by email, the uniqueness domain
    accounts: Mutex<HashMap<String, UserId>>,
    /// Every create request received, in order
    pub created: Mutex<Vec<IdentityCreate>>,
    /// Every deleted account id, in order
    pub deleted: Mutex<Vec<UserId>>,
    pub verify_failure: Mutex<Option<ScriptedFailure>>,
    pub create_failure: Mutex<Option<ScriptedFailure>>,
    pub delete_failure: Mutex<Option<ScriptedFailure>>,
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn verify_token(&self, token: &str) -> Result<IdentityRecord> {
        if let Some(failure) = self.verify_failure.lock().unwrap().as_ref() {
            return Err(failure.to_store_error());
        }

        self.tokens.lock().unwrap().get(token).cloned().ok_or(StoreError::Rejected {
            status: 401,
            message: "invalid JWT".to_string(),
        })
    }

    async fn create_user(&self, request: &IdentityCreate) -> Result<IdentityRecord> {
        if let Some(failure) = self.create_failure.lock().unwrap().as_ref() {
            return Err(failure.to_store_error());
        }

        // Check-and-insert under one lock: the uniqueness arbitration.
        let id = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(&request.email) {
                return Err(StoreError::Rejected {
                    status: 422,
                    message: "A user with this email address has already been registered".to_string(),
                });
            }
            let id = Uuid::new_v4();
            accounts.insert(request.email.clone(), id);
            id
        };

        self.created.lock().unwrap().push(request.clone());

        Ok(IdentityRecord {
            id,
            email: request.email.clone(),
            metadata: request.metadata.clone(),
        })
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        if let Some(failure) = self.delete_failure.lock().unwrap().as_ref() {
            return Err(failure.to_store_error());
        }

        self.accounts.lock().unwrap().retain(|_, account_id| *account_id != id);
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }
}

/// In-memory [`ProfileStore`] with call recording and scripted failures.
#[derive(Default)]
pub struct MockProfileStore {
    /// Roles by account id; absent means no profile row
    pub roles: Mutex<HashMap<UserId, Role>>,
    /// Every inserted profile row, in order
    pub inserted: Mutex<Vec<ProfileRecord>>,
    pub role_failure: Mutex<Option<ScriptedFailure>>,
    pub insert_failure: Mutex<Option<ScriptedFailure>>,
}

#[async_trait]
impl ProfileStore for MockProfileStore {
    async fn role_of(&self, id: UserId) -> Result<Option<Role>> {
        if let Some(failure) = self.role_failure.lock().unwrap().as_ref() {
            return Err(failure.to_store_error());
        }
        Ok(self.roles.lock().unwrap().get(&id).copied())
    }

    async fn insert(&self, profile: &ProfileRecord) -> Result<()> {
        if let Some(failure) = self.insert_failure.lock().unwrap().as_ref() {
            return Err(failure.to_store_error());
        }
        self.inserted.lock().unwrap().push(profile.clone());
        Ok(())
    }
}

/// [`AuditSink`] that records appended entries, or fails when scripted.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub entries: Mutex<Vec<AuditLogEntry>>,
    pub failure: Mutex<Option<ScriptedFailure>>,
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        if let Some(failure) = self.failure.lock().unwrap().as_ref() {
            return Err(failure.to_store_error());
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Handles to the mock stores behind a test [`AppState`].
#[derive(Clone, Default)]
pub struct MockStores {
    pub identity: Arc<MockIdentityStore>,
    pub profiles: Arc<MockProfileStore>,
    pub audit: Arc<RecordingAuditSink>,
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    };
    config.identity_store.service_key = "test-identity-key".to_string();
    config.profile_store.service_key = "test-profiles-key".to_string();
    config.audit_sink.service_key = "test-audit-key".to_string();
    config
}

/// Build an [`AppState`] over fresh mock stores.
pub fn create_test_state() -> (AppState, MockStores) {
    let stores = MockStores::default();

    let identity: Arc<dyn IdentityStore> = stores.identity.clone();
    let profiles: Arc<dyn ProfileStore> = stores.profiles.clone();
    let audit: Arc<dyn AuditSink> = stores.audit.clone();

    let state = AppState::builder()
        .config(create_test_config())
        .identity(identity)
        .profiles(profiles)
        .audit(audit)
        .build();

    (state, stores)
}

/// Register an authenticated caller: the token resolves at the identity
/// store, and the role (when given) becomes the caller's profile row.
pub fn register_caller(stores: &MockStores, token: &str, email: &str, role: Option<Role>) -> CurrentUser {
    let id = Uuid::new_v4();

    stores.identity.tokens.lock().unwrap().insert(
        token.to_string(),
        IdentityRecord {
            id,
            email: email.to_string(),
            metadata: Default::default(),
        },
    );

    if let Some(role) = role {
        stores.profiles.roles.lock().unwrap().insert(id, role);
    }

    CurrentUser {
        id,
        email: email.to_string(),
        role,
    }
}

/// An administrator caller for tests that bypass the HTTP layer.
pub fn test_admin() -> CurrentUser {
    CurrentUser {
        id: Uuid::new_v4(),
        email: "admin@example.com".to_string(),
        role: Some(Role::Admin),
    }
}

/// Full router behind an `axum-test` server, over fresh mock stores.
#[cfg(test)]
pub fn create_test_server() -> (axum_test::TestServer, MockStores) {
    let (state, stores) = create_test_state();
    let router = crate::build_router(state).expect("Failed to build test router");
    let server = axum_test::TestServer::new(router).expect("Failed to create test server");
    (server, stores)
}
