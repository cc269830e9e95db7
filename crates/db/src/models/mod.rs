//! Row structs and create DTOs.

pub mod message;
pub mod revoked_token;
