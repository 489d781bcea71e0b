//! Hosted database access
//!
//! Thin pass-through to the database's REST surface. Errors are surfaced to
//! the caller as-is; nothing is retried here.

pub mod rest;

pub use rest::RestGateway;
