//! In-memory store backing the development server and tests

use super::{BoardStore, ElementStore};
use crate::board::{Board, Element};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Hash-map backed implementation of both store traits.
///
/// Lock scope never spans an await; per-call atomicity only, matching the
/// contract real persistence backends offer.
#[derive(Default)]
pub struct MemoryStore {
    elements: Mutex<HashMap<Uuid, Element>>,
    boards: Mutex<HashMap<Uuid, Board>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a board (test and dev-server setup)
    pub fn add_board(&self, board: Board) {
        self.boards_lock().insert(board.id, board);
    }

    fn elements_lock(&self) -> MutexGuard<'_, HashMap<Uuid, Element>> {
        self.elements.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn boards_lock(&self) -> MutexGuard<'_, HashMap<Uuid, Board>> {
        self.boards.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ElementStore for MemoryStore {
    async fn element(&self, id: Uuid) -> Result<Option<Element>> {
        Ok(self.elements_lock().get(&id).cloned())
    }

    async fn insert_element(&self, element: Element) -> Result<()> {
        self.elements_lock().insert(element.id, element);
        Ok(())
    }

    async fn update_element(&self, element: Element) -> Result<()> {
        self.elements_lock().insert(element.id, element);
        Ok(())
    }

    async fn delete_element(&self, id: Uuid) -> Result<bool> {
        Ok(self.elements_lock().remove(&id).is_some())
    }

    async fn board_elements(&self, board_id: Uuid) -> Result<Vec<Element>> {
        let elements = self.elements_lock();
        let mut found: Vec<Element> = elements
            .values()
            .filter(|e| e.board_id == board_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.z_index
                .cmp(&b.z_index)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(found)
    }

    async fn group_elements(&self, group_id: Uuid) -> Result<Vec<Element>> {
        let elements = self.elements_lock();
        let mut found: Vec<Element> = elements
            .values()
            .filter(|e| e.group_id == Some(group_id))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.group_order.unwrap_or(i32::MAX));
        Ok(found)
    }

    async fn max_z_index(&self, board_id: Uuid) -> Result<Option<i32>> {
        Ok(self
            .elements_lock()
            .values()
            .filter(|e| e.board_id == board_id)
            .map(|e| e.z_index)
            .max())
    }

    async fn min_z_index(&self, board_id: Uuid) -> Result<Option<i32>> {
        Ok(self
            .elements_lock()
            .values()
            .filter(|e| e.board_id == board_id)
            .map(|e| e.z_index)
            .min())
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn board(&self, id: Uuid) -> Result<Option<Board>> {
        Ok(self.boards_lock().get(&id).cloned())
    }

    async fn board_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.boards_lock().contains_key(&id))
    }
}
