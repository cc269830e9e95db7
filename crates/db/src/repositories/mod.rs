//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod friendship_repo;
pub mod message_repo;
pub mod participant_repo;
pub mod revoked_token_repo;

pub use friendship_repo::FriendshipRepo;
pub use message_repo::MessageRepo;
pub use participant_repo::ParticipantRepo;
pub use revoked_token_repo::RevokedTokenRepo;
