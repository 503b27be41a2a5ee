//! API request and response data models.
//!
//! These models define the public API contract. They are distinct from the
//! store-level records in [`crate::stores`] so the API surface and the
//! external stores' wire formats can evolve independently. All models are
//! annotated with `utoipa` for the generated API docs.

pub mod users;
