//! Domain logic for the SocialChat real-time gateway.
//!
//! Everything here is free of I/O: the destination grammar, the STOMP frame
//! codec, the per-conversation rate limiter, message validation, and the
//! event payloads delivered to clients.

pub mod chat;
pub mod destination;
pub mod error;
pub mod events;
pub mod rate_limit;
pub mod roles;
pub mod stomp;
pub mod types;
