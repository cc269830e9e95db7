//! Credential handling.
//!
//! - [`jwt`] -- HS256 token parsing, validation and issuance.
//! - [`revocation`] -- durable registry of revoked credential ids.

pub mod jwt;
pub mod revocation;
