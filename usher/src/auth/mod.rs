//! Authentication and authorization.
//!
//! Callers authenticate with a bearer token minted by the identity store;
//! this service never mints or refreshes credentials, it only verifies
//! them. Authorization is role-based: the provisioning surface is gated on
//! the `admin` role from the profile store, and anything that prevents
//! establishing the role fails closed.
//!
//! Both concerns are implemented as extractors so handlers declare their
//! requirements in their signatures: [`crate::api::models::users::CurrentUser`]
//! resolves the caller, [`permissions::RequiresAdmin`] additionally
//! enforces the role.

pub mod current_user;
pub mod permissions;

pub use permissions::RequiresAdmin;
