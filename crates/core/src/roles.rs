//! Well-known role name constants.
//!
//! Tokens carry bare role names (no `ROLE_` prefix).

/// Role granted to every authenticated principal whose token carries none.
pub const ROLE_USER: &str = "USER";
