//! Per-frame authorization for the real-time protocol.
//!
//! - [`principal`] -- the identity attached to an authenticated connection.
//! - [`authorizer`] -- the CONNECT / SUBSCRIBE / SEND decision procedure.

pub mod authorizer;
pub mod principal;

pub use authorizer::{Admission, Decision, FrameAuthorizer, Rejection, RejectionKind};
pub use principal::Principal;
