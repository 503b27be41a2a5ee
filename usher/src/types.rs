//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety.
//! The same id names an account in both external stores: the Identity Store
//! assigns it on creation and the Profile Store row is keyed by it.

use uuid::Uuid;

/// User account identifier, shared across the identity and profile stores.
pub type UserId = Uuid;
