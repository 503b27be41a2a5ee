//! HTTP request handlers.
//!
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks via the [`crate::auth`] extractors
//! - Business logic execution via the provisioning saga and stores
//! - Response serialization
//!
//! Handlers return [`crate::errors::Error`] which converts to the
//! appropriate HTTP status code and JSON error body.

pub mod users;
