//! Online-user directory and friend-scoped presence fan-out.
//!
//! Presence is never published on a shared topic: each transition is
//! delivered point-to-point to the `/user/queue/presence` of online friends.

pub mod broadcaster;
pub mod directory;

pub use broadcaster::PresenceBroadcaster;
pub use directory::{ConnectionRecord, PresenceDirectory};
