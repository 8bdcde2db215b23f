//! Multi-element group operations

use super::CoordinationError;
use crate::board::Element;
use crate::store::ElementStore;
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Manages groups: sets of elements sharing a group id, ordered by a
/// contiguous intra-group order assigned at creation.
pub struct GroupCoordinator {
    store: Arc<dyn ElementStore>,
}

impl GroupCoordinator {
    pub fn new(store: Arc<dyn ElementStore>) -> Self {
        Self { store }
    }

    /// Group the given elements, in input order.
    ///
    /// All-or-nothing: every id must exist and belong to `board_id`, and
    /// validation completes before any member is written.
    pub async fn create_group(
        &self,
        board_id: Uuid,
        element_ids: &[Uuid],
        actor: &str,
    ) -> Result<(Uuid, Vec<Element>)> {
        if element_ids.is_empty() {
            return Err(CoordinationError::EmptyGroup.into());
        }

        let mut members = Vec::with_capacity(element_ids.len());
        for &id in element_ids {
            let element = self
                .store
                .element(id)
                .await?
                .ok_or(CoordinationError::ElementNotFound(id))?;
            if element.board_id != board_id {
                return Err(CoordinationError::ForeignElement {
                    element: id,
                    board: board_id,
                }
                .into());
            }
            members.push(element);
        }

        let group_id = Uuid::new_v4();
        for (order, element) in members.iter_mut().enumerate() {
            element.group_id = Some(group_id);
            element.group_order = Some(order as i32);
            element.touch(actor);
            self.store.update_element(element.clone()).await?;
        }
        Ok((group_id, members))
    }

    /// Clear group membership on all members; `None` when the group is empty
    pub async fn ungroup(&self, group_id: Uuid, actor: &str) -> Result<Option<Vec<Uuid>>> {
        let members = self.store.group_elements(group_id).await?;
        if members.is_empty() {
            return Ok(None);
        }
        let mut ids = Vec::with_capacity(members.len());
        for mut element in members {
            element.group_id = None;
            element.group_order = None;
            element.touch(actor);
            ids.push(element.id);
            self.store.update_element(element).await?;
        }
        Ok(Some(ids))
    }

    /// Translate every member's position by the same delta.
    ///
    /// Line members' payload endpoints are NOT re-derived here, unlike the
    /// single-element move. Known divergence, kept as observed behavior.
    pub async fn move_group(
        &self,
        group_id: Uuid,
        dx: f64,
        dy: f64,
        actor: &str,
    ) -> Result<Option<Vec<Element>>> {
        let members = self.store.group_elements(group_id).await?;
        if members.is_empty() {
            return Ok(None);
        }
        let mut moved = Vec::with_capacity(members.len());
        for mut element in members {
            element.x += dx;
            element.y += dy;
            element.touch(actor);
            self.store.update_element(element.clone()).await?;
            moved.push(element);
        }
        Ok(Some(moved))
    }

    /// Delete every member element; `None` when the group is empty
    pub async fn delete_group(&self, group_id: Uuid) -> Result<Option<Vec<Uuid>>> {
        let members = self.store.group_elements(group_id).await?;
        if members.is_empty() {
            return Ok(None);
        }
        let mut ids = Vec::with_capacity(members.len());
        for element in members {
            self.store.delete_element(element.id).await?;
            ids.push(element.id);
        }
        Ok(Some(ids))
    }

    /// Reassign member z-indexes to `base + group_order`, preserving the
    /// relative stacking within the group
    pub async fn set_group_z_index(
        &self,
        group_id: Uuid,
        base: i32,
        actor: &str,
    ) -> Result<Option<Vec<Element>>> {
        let members = self.store.group_elements(group_id).await?;
        if members.is_empty() {
            return Ok(None);
        }
        let mut updated = Vec::with_capacity(members.len());
        for (index, mut element) in members.into_iter().enumerate() {
            let order = element.group_order.unwrap_or(index as i32);
            element.z_index = base + order;
            element.touch(actor);
            self.store.update_element(element.clone()).await?;
            updated.push(element);
        }
        Ok(Some(updated))
    }

    /// Stack the whole group above everything currently on its board
    pub async fn bring_group_to_front(
        &self,
        group_id: Uuid,
        actor: &str,
    ) -> Result<Option<Vec<Element>>> {
        let members = self.store.group_elements(group_id).await?;
        let Some(first) = members.first() else {
            return Ok(None);
        };
        let base = self
            .store
            .max_z_index(first.board_id)
            .await?
            .map_or(0, |max| max + 1);
        self.set_group_z_index(group_id, base, actor).await
    }

    /// Stack the whole group below everything currently on its board
    pub async fn send_group_to_back(
        &self,
        group_id: Uuid,
        actor: &str,
    ) -> Result<Option<Vec<Element>>> {
        let members = self.store.group_elements(group_id).await?;
        let Some(first) = members.first() else {
            return Ok(None);
        };
        let base = self
            .store
            .min_z_index(first.board_id)
            .await?
            .map_or(0, |min| min - members.len() as i32);
        self.set_group_z_index(group_id, base, actor).await
    }
}
