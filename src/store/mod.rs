//! Persistence collaborator boundary
//!
//! The coordination layer never owns durable state; it talks to whatever
//! implements these traits. [`MemoryStore`] is the bundled implementation
//! used by the development server and the test suite.

mod memory;

pub use memory::MemoryStore;

use crate::board::{Board, Element};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Element CRUD plus the aggregate z-index queries the layering scheme
/// depends on.
#[async_trait]
pub trait ElementStore: Send + Sync {
    async fn element(&self, id: Uuid) -> Result<Option<Element>>;

    async fn insert_element(&self, element: Element) -> Result<()>;

    /// Whole-element save: the last writer wins at element granularity
    async fn update_element(&self, element: Element) -> Result<()>;

    /// True iff the element existed and was removed
    async fn delete_element(&self, id: Uuid) -> Result<bool>;

    /// Elements of a board in stacking order, ties broken by creation time
    async fn board_elements(&self, board_id: Uuid) -> Result<Vec<Element>>;

    /// Members of a group ordered by intra-group order
    async fn group_elements(&self, group_id: Uuid) -> Result<Vec<Element>>;

    async fn max_z_index(&self, board_id: Uuid) -> Result<Option<i32>>;

    async fn min_z_index(&self, board_id: Uuid) -> Result<Option<i32>>;
}

/// Board lookups consumed for access decisions and join validation
#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn board(&self, id: Uuid) -> Result<Option<Board>>;

    async fn board_exists(&self, id: Uuid) -> Result<bool>;
}
