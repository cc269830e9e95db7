//! SocialChat gateway server library.
//!
//! Exposes the building blocks (config, state, error handling, the frame
//! authorizer, presence, WebSocket infrastructure, routes) so integration
//! tests and the binary entrypoint can both access them.

pub mod auth;
pub mod background;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod lookup;
pub mod middleware;
pub mod presence;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
