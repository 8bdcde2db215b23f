//! Single-element mutation orchestration

use super::CoordinationError;
use crate::board::{
    classify_type_tag, line_endpoints, merge_patch, normalize_rotation, parse_number,
    set_line_endpoints, translate_line_endpoints, Element, ElementType, LINE_ENDPOINT_KEYS,
};
use crate::store::ElementStore;
use anyhow::Result;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Request to create an element from client-supplied fields
#[derive(Debug, Clone)]
pub struct NewElement {
    /// Free-form type tag; classified via the mapping table
    pub type_tag: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub data: Value,
}

/// Applies create/move/resize/style/lock/delete operations, recomputing
/// derived geometry and placing elements in the z order.
pub struct ElementCoordinator {
    store: Arc<dyn ElementStore>,
}

impl ElementCoordinator {
    pub fn new(store: Arc<dyn ElementStore>) -> Self {
        Self { store }
    }

    async fn fetch(&self, id: Uuid) -> Result<Element> {
        self.store
            .element(id)
            .await?
            .ok_or_else(|| CoordinationError::ElementNotFound(id).into())
    }

    /// Create an element on a board.
    ///
    /// The type tag is classified into the canonical type; shape subtype
    /// tags keep their visual kind in the payload's `shapeType`. New
    /// elements land on top of the board's stack.
    pub async fn add_element(
        &self,
        board_id: Uuid,
        request: NewElement,
        actor: &str,
    ) -> Result<Element> {
        let (element_type, subtype) = classify_type_tag(&request.type_tag);

        let mut data = match request.data {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Map::new()),
        };
        if let Some(subtype) = subtype {
            if let Some(map) = data.as_object_mut() {
                map.entry("shapeType").or_insert_with(|| subtype.into());
            }
        }

        let z_index = self
            .store
            .max_z_index(board_id)
            .await?
            .map_or(0, |max| max + 1);

        let now = Utc::now();
        let element = Element {
            id: Uuid::new_v4(),
            board_id,
            element_type,
            x: request.x,
            y: request.y,
            width: request.width,
            height: request.height,
            z_index,
            data,
            created_by: actor.to_string(),
            modified_by: actor.to_string(),
            created_at: now,
            modified_at: now,
            group_id: None,
            group_order: None,
        };
        self.store.insert_element(element.clone()).await?;
        Ok(element)
    }

    /// Create a freehand drawing stroke; the payload carries the path points.
    pub async fn add_drawing_path(
        &self,
        board_id: Uuid,
        mut request: NewElement,
        actor: &str,
    ) -> Result<Element> {
        request.type_tag = "drawing".to_string();
        self.add_element(board_id, request, actor).await
    }

    /// Move an element to an absolute position.
    ///
    /// Line elements carry absolute endpoint coordinates in their payload;
    /// those are translated by the same delta so the line geometry tracks
    /// its bounding box.
    pub async fn move_element(&self, id: Uuid, new_x: f64, new_y: f64, actor: &str) -> Result<Element> {
        let mut element = self.fetch(id).await?;
        let dx = new_x - element.x;
        let dy = new_y - element.y;
        element.x = new_x;
        element.y = new_y;
        if element.element_type == ElementType::Line
            && !translate_line_endpoints(&mut element.data, dx, dy)
        {
            tracing::debug!(element = %id, "Line payload has no usable endpoints; moved box only");
        }
        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(element)
    }

    pub async fn resize_element(
        &self,
        id: Uuid,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        actor: &str,
    ) -> Result<Element> {
        let mut element = self.fetch(id).await?;
        element.x = x;
        element.y = y;
        element.width = width;
        element.height = height;
        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(element)
    }

    /// Set absolute line endpoints.
    ///
    /// Canonical form: position = start point, size = end - start as a
    /// signed vector. Direction is preserved; width/height may be negative.
    pub async fn update_line_endpoints(
        &self,
        id: Uuid,
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
        actor: &str,
    ) -> Result<Element> {
        let mut element = self.fetch(id).await?;
        element.x = start_x;
        element.y = start_y;
        element.width = end_x - start_x;
        element.height = end_y - start_y;
        set_line_endpoints(&mut element.data, start_x, start_y, end_x, end_y);
        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(element)
    }

    /// Merge a style patch into the payload.
    ///
    /// `rotation` is parsed as a number and normalized into [0, 360); an
    /// unparsable value is dropped so a prior rotation stays intact. A patch
    /// touching line endpoint fields triggers a bounding-box recompute from
    /// the merged payload.
    pub async fn update_style(&self, id: Uuid, patch: &Value, actor: &str) -> Result<Element> {
        let mut element = self.fetch(id).await?;

        let mut patch = patch.clone();
        if let Some(map) = patch.as_object_mut() {
            if let Some(raw) = map.get("rotation") {
                match parse_number(raw) {
                    Some(rotation) => {
                        map.insert("rotation".into(), normalize_rotation(rotation).into());
                    }
                    None => {
                        map.remove("rotation");
                    }
                }
            }
        }

        let touches_endpoints = patch
            .as_object()
            .map(|m| LINE_ENDPOINT_KEYS.iter().any(|k| m.contains_key(*k)))
            .unwrap_or(false);

        merge_patch(&mut element.data, &patch);

        if touches_endpoints {
            if let Some((sx, sy, ex, ey)) = line_endpoints(&element.data) {
                element.x = sx;
                element.y = sy;
                element.width = ex - sx;
                element.height = ey - sy;
            }
        }

        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(element)
    }

    /// Set the boolean `locked` flag inside the payload
    pub async fn update_lock(&self, id: Uuid, locked: bool, actor: &str) -> Result<Element> {
        let mut element = self.fetch(id).await?;
        merge_patch(&mut element.data, &serde_json::json!({ "locked": locked }));
        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(element)
    }

    /// Merge-patch restricted to elements of `expected` type.
    ///
    /// A type mismatch is a silent no-op: the caller gets `None` and nothing
    /// is broadcast.
    pub async fn update_typed(
        &self,
        id: Uuid,
        expected: ElementType,
        patch: &Value,
        actor: &str,
    ) -> Result<Option<Element>> {
        let mut element = self.fetch(id).await?;
        if element.element_type != expected {
            return Ok(None);
        }
        merge_patch(&mut element.data, patch);
        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(Some(element))
    }

    /// True iff the element existed and was removed
    pub async fn delete_element(&self, id: Uuid) -> Result<bool> {
        self.store.delete_element(id).await
    }

    /// Bring to front / send to back via the board's current extreme.
    ///
    /// O(1) monotonic layering: concurrent extreme-setting may tie, which is
    /// acceptable - the result is only "more extreme than observed at read
    /// time".
    pub async fn set_z_extreme(&self, id: Uuid, to_front: bool, actor: &str) -> Result<Element> {
        let mut element = self.fetch(id).await?;
        element.z_index = if to_front {
            self.store
                .max_z_index(element.board_id)
                .await?
                .map_or(0, |max| max + 1)
        } else {
            self.store
                .min_z_index(element.board_id)
                .await?
                .map_or(0, |min| min - 1)
        };
        element.touch(actor);
        self.store.update_element(element.clone()).await?;
        Ok(element)
    }
}
