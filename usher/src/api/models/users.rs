//! API request/response models for account provisioning.

use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account role recorded in the profile store. Only `admin` may provision
/// accounts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// Account lifecycle state recorded in the profile store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
}

/// Request body for provisioning an account.
///
/// `email` and `password` stay optional at the decoding layer so a missing
/// field is reported as the provisioning validation error, not as a decode
/// failure. `role` and `status` default during provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    /// When set, the account starts unconfirmed and the identity store
    /// sends its verification mail.
    #[serde(default)]
    pub send_verification_email: bool,
}

/// Response for a successfully provisioned account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreateResponse {
    pub success: bool,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub email: String,
}

/// The authenticated caller, resolved from the identity and profile stores.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    /// `None` when the caller has no profile row.
    pub role: Option<Role>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}
