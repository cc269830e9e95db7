use std::collections::BTreeSet;

use socialchat_core::roles::ROLE_USER;
use socialchat_core::types::DbId;

use crate::auth::jwt::Claims;

/// Identity attached to a connection after an admitted CONNECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: DbId,
    pub username: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    /// Build from validated claims; a credential without roles gets `USER`.
    pub fn from_claims(claims: &Claims) -> Self {
        let mut roles: BTreeSet<String> = claims
            .roles
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if roles.is_empty() {
            roles.insert(ROLE_USER.to_string());
        }
        Self {
            user_id: claims.sub,
            username: claims.username.clone(),
            roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenKind;

    fn claims(roles: &[&str]) -> Claims {
        Claims {
            jti: "j".into(),
            sub: 7,
            username: "alice".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            token_type: TokenKind::Access,
            iat: 0,
            exp: 1,
        }
    }

    #[test]
    fn missing_roles_default_to_user() {
        let principal = Principal::from_claims(&claims(&[]));
        assert_eq!(principal.user_id, 7);
        assert!(principal.roles.contains(ROLE_USER));
        assert_eq!(principal.roles.len(), 1);
    }

    #[test]
    fn explicit_roles_are_kept() {
        let principal = Principal::from_claims(&claims(&["ADMIN", "USER", "ADMIN"]));
        assert!(principal.roles.contains("ADMIN"));
        assert_eq!(principal.roles.len(), 2);
    }
}
