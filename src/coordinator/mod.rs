//! Mutation orchestration against the persistence collaborator
//!
//! Coordinators perform non-atomic fetch/mutate/save cycles with no locking
//! across the fetch and save: concurrent mutations of the same element race
//! and the later save wins wholesale. Group operations are multi-element
//! but not transactional; a failure mid-group leaves earlier members
//! updated and is not rolled back.

mod element;
mod group;

pub use element::{ElementCoordinator, NewElement};
pub use group::GroupCoordinator;

use thiserror::Error;
use uuid::Uuid;

/// Domain-validation failures reported back to the caller
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("element {0} not found")]
    ElementNotFound(Uuid),

    #[error("element {element} does not belong to board {board}")]
    ForeignElement { element: Uuid, board: Uuid },

    #[error("cannot group an empty element list")]
    EmptyGroup,
}
