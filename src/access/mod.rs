//! Access control - who may read or write a board
//!
//! Two-tier design: private boards require resolved membership; non-private
//! boards implicitly grant write access to anyone who can reach them.

use crate::board::{Board, Role};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolved identity of the connection issuing an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Caller {
    Authenticated { user_id: Uuid, display_name: String },
    Anonymous { anon_id: Option<String> },
}

impl Caller {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated { .. })
    }

    /// Identity recorded in element audit fields.
    ///
    /// Anonymous callers collapse to a distinguished identity rather than
    /// anything client-supplied.
    pub fn audit_id(&self) -> String {
        match self {
            Caller::Authenticated { user_id, .. } => user_id.to_string(),
            Caller::Anonymous { .. } => "anonymous".to_string(),
        }
    }

    /// Display name shown to other participants.
    ///
    /// Derived server-side only: a verified anonymous identifier when
    /// present, else a deterministic fallback keyed on the connection id.
    /// Client-supplied names for anonymous callers are never trusted.
    pub fn display_name(&self, connection_id: Uuid) -> String {
        match self {
            Caller::Authenticated { display_name, .. } => display_name.clone(),
            Caller::Anonymous { anon_id: Some(id) } if !id.is_empty() => {
                let short: String = id.chars().take(6).collect();
                format!("Guest-{short}")
            }
            Caller::Anonymous { .. } => {
                let simple = connection_id.simple().to_string();
                format!("Guest-{}", &simple[..6])
            }
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow { role: Role },
    /// The board is private and the caller has no membership there
    DenyPrivate,
    /// The caller is known on the board but below the required role
    DenyInsufficientRole,
}

impl AccessDecision {
    pub fn allowed_role(&self) -> Option<Role> {
        match self {
            AccessDecision::Allow { role } => Some(*role),
            _ => None,
        }
    }
}

/// Decide whether `caller` may act on `board` at `required` strength.
///
/// Authenticated callers resolve to their explicit role (owner beats
/// collaborator entry); on Public/Unlisted boards every authenticated
/// caller is granted at least Collaborator. Anonymous callers get
/// Collaborator on anything that is not private.
pub fn authorize(caller: &Caller, board: &Board, required: Role) -> AccessDecision {
    match caller {
        Caller::Authenticated { user_id, .. } => {
            let explicit = board.role_of(*user_id);
            let implicit = match board.visibility {
                crate::board::Visibility::Public | crate::board::Visibility::Unlisted => {
                    Some(Role::Collaborator)
                }
                _ => None,
            };
            let role = match (explicit, implicit) {
                (Some(e), Some(i)) => Some(e.max(i)),
                (role, None) | (None, role) => role,
            };
            match role {
                None if board.visibility.is_private() => AccessDecision::DenyPrivate,
                Some(role) if role < required && board.visibility.is_private() => {
                    AccessDecision::DenyInsufficientRole
                }
                // Non-private boards admit anyone who can reach them;
                // LinkSharing reports Collaborator as the effective role.
                Some(role) => AccessDecision::Allow { role },
                None => AccessDecision::Allow {
                    role: Role::Collaborator,
                },
            }
        }
        Caller::Anonymous { .. } => {
            if board.visibility.is_private() {
                AccessDecision::DenyPrivate
            } else {
                AccessDecision::Allow {
                    role: Role::Collaborator,
                }
            }
        }
    }
}

/// External identity collaborator: turns connection-supplied tokens into a
/// resolved caller.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, auth_token: Option<&str>, anon_token: Option<&str>) -> Result<Caller>;
}

/// Development resolver: an auth token of the form `<user-uuid>:<name>`
/// authenticates; anything else falls back to anonymous.
pub struct LocalIdentity;

#[async_trait]
impl IdentityResolver for LocalIdentity {
    async fn resolve(&self, auth_token: Option<&str>, anon_token: Option<&str>) -> Result<Caller> {
        if let Some(token) = auth_token {
            if let Some((id, name)) = token.split_once(':') {
                if let Ok(user_id) = Uuid::parse_str(id) {
                    return Ok(Caller::Authenticated {
                        user_id,
                        display_name: name.to_string(),
                    });
                }
            }
            tracing::warn!("Ignoring malformed auth token");
        }
        Ok(Caller::Anonymous {
            anon_id: anon_token.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Visibility;

    fn board(visibility: Visibility) -> Board {
        Board::new("test", Uuid::new_v4(), visibility)
    }

    fn user() -> Caller {
        Caller::Authenticated {
            user_id: Uuid::new_v4(),
            display_name: "alice".to_string(),
        }
    }

    #[test]
    fn anonymous_denied_on_private() {
        let caller = Caller::Anonymous { anon_id: None };
        let decision = authorize(&caller, &board(Visibility::Private), Role::Viewer);
        assert_eq!(decision, AccessDecision::DenyPrivate);
    }

    #[test]
    fn anonymous_gets_collaborator_on_non_private() {
        let caller = Caller::Anonymous { anon_id: None };
        for visibility in [Visibility::Public, Visibility::Unlisted, Visibility::LinkSharing] {
            let decision = authorize(&caller, &board(visibility), Role::Collaborator);
            assert_eq!(
                decision,
                AccessDecision::Allow {
                    role: Role::Collaborator
                }
            );
        }
    }

    #[test]
    fn authenticated_stranger_denied_on_private() {
        let decision = authorize(&user(), &board(Visibility::Private), Role::Viewer);
        assert_eq!(decision, AccessDecision::DenyPrivate);
    }

    #[test]
    fn authenticated_stranger_collaborates_on_unlisted() {
        let decision = authorize(&user(), &board(Visibility::Unlisted), Role::Collaborator);
        assert_eq!(
            decision,
            AccessDecision::Allow {
                role: Role::Collaborator
            }
        );
    }

    #[test]
    fn viewer_cannot_write_private_board() {
        let user_id = Uuid::new_v4();
        let mut b = board(Visibility::Private);
        b.collaborators.insert(user_id, Role::Viewer);
        let caller = Caller::Authenticated {
            user_id,
            display_name: "bob".to_string(),
        };
        assert_eq!(
            authorize(&caller, &b, Role::Viewer),
            AccessDecision::Allow { role: Role::Viewer }
        );
        assert_eq!(
            authorize(&caller, &b, Role::Collaborator),
            AccessDecision::DenyInsufficientRole
        );
    }

    #[test]
    fn owner_outranks_everything() {
        let mut b = board(Visibility::Private);
        let caller = Caller::Authenticated {
            user_id: b.owner_id,
            display_name: "owner".to_string(),
        };
        // An accidental collaborator entry must not demote the owner
        b.collaborators.insert(b.owner_id, Role::Viewer);
        assert_eq!(
            authorize(&caller, &b, Role::Owner),
            AccessDecision::Allow { role: Role::Owner }
        );
    }

    #[test]
    fn anonymous_display_name_is_server_derived() {
        let conn = Uuid::new_v4();
        let verified = Caller::Anonymous {
            anon_id: Some("abcdef123456".to_string()),
        };
        assert_eq!(verified.display_name(conn), "Guest-abcdef");

        let fallback = Caller::Anonymous { anon_id: None };
        let name = fallback.display_name(conn);
        assert!(name.starts_with("Guest-"));
        assert_eq!(name, fallback.display_name(conn), "deterministic per connection");
    }
}
