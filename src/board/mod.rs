//! Board domain model - elements, visibility, roles, payload helpers

mod element;
mod payload;

pub use element::{classify_type_tag, Element, ElementType};
pub use payload::{
    line_endpoints, merge_patch, normalize_rotation, number_field, parse_number,
    set_line_endpoints, translate_line_endpoints, LINE_ENDPOINT_KEYS,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Who can see (and by default edit) a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Only the owner and explicit collaborators
    Private,
    /// Reachable by anyone with the id, not listed publicly
    Unlisted,
    /// Reachable through a share link
    LinkSharing,
    /// Listed and open to everyone
    Public,
}

impl Visibility {
    /// Private boards require a resolved membership; everything else grants
    /// implicit access to whoever can reach the board.
    pub fn is_private(&self) -> bool {
        matches!(self, Visibility::Private)
    }
}

/// Per-user permission on a board, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Collaborator,
    Owner,
}

impl Role {
    /// Whether this role may mutate board content
    pub fn can_edit(&self) -> bool {
        *self >= Role::Collaborator
    }
}

/// A named canvas with a visibility level and an owner.
///
/// Boards are owned by the persistence collaborator; the coordination layer
/// only reads them to make access decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    /// Explicit per-user roles granted by the owner
    pub collaborators: HashMap<Uuid, Role>,
}

impl Board {
    pub fn new(name: impl Into<String>, owner_id: Uuid, visibility: Visibility) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            owner_id,
            visibility,
            collaborators: HashMap::new(),
        }
    }

    /// Explicit role of a user on this board, if any
    pub fn role_of(&self, user_id: Uuid) -> Option<Role> {
        if user_id == self.owner_id {
            return Some(Role::Owner);
        }
        self.collaborators.get(&user_id).copied()
    }
}
