//! Element model and type-tag classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Canonical element type.
///
/// Clients send free-form type tags (including legacy aliases and shape
/// subtype names); [`classify_type_tag`] maps them onto this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Drawing,
    Text,
    Shape,
    Line,
    StickyNote,
    Image,
}

/// Map a client-supplied type tag to its canonical type.
///
/// Shape subtype tags (rectangle, circle, ...) normalize to `Shape` and
/// return the subtype so it can be preserved in the payload - round-tripping
/// must not lose the visual kind. Path-like and unrecognized tags default to
/// `Drawing`.
pub fn classify_type_tag(tag: &str) -> (ElementType, Option<&'static str>) {
    match tag.trim().to_ascii_lowercase().as_str() {
        "text" => (ElementType::Text, None),
        "shape" => (ElementType::Shape, None),
        "rectangle" => (ElementType::Shape, Some("rectangle")),
        "circle" => (ElementType::Shape, Some("circle")),
        "triangle" => (ElementType::Shape, Some("triangle")),
        "diamond" => (ElementType::Shape, Some("diamond")),
        "ellipse" => (ElementType::Shape, Some("ellipse")),
        "star" => (ElementType::Shape, Some("star")),
        "line" => (ElementType::Line, None),
        "stickynote" | "sticky_note" | "sticky-note" | "sticky" => (ElementType::StickyNote, None),
        "image" => (ElementType::Image, None),
        // Path-like tags and anything unrecognized land on Drawing
        _ => (ElementType::Drawing, None),
    }
}

/// One visual object on a board.
///
/// Position and size are first-class columns; everything type-specific
/// (path points, shape subtype, style, rotation, lock flag, line endpoints)
/// lives in the open `data` document so merge-patches preserve keys this
/// layer has never heard of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: Uuid,
    pub board_id: Uuid,
    pub element_type: ElementType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Stacking order; not unique, ties break by creation time
    pub z_index: i32,
    /// Open type-specific payload document
    pub data: Value,
    pub created_by: String,
    pub modified_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub group_id: Option<Uuid>,
    pub group_order: Option<i32>,
}

impl Element {
    /// Stamp a mutation: who touched the element, and when
    pub fn touch(&mut self, actor: &str) {
        self.modified_by = actor.to_string();
        self.modified_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_subtypes_normalize_to_shape() {
        for tag in ["rectangle", "circle", "triangle", "diamond", "ellipse", "star"] {
            let (kind, subtype) = classify_type_tag(tag);
            assert_eq!(kind, ElementType::Shape, "tag {tag}");
            assert_eq!(subtype, Some(tag), "tag {tag}");
        }
    }

    #[test]
    fn canonical_tags_map_directly() {
        assert_eq!(classify_type_tag("text"), (ElementType::Text, None));
        assert_eq!(classify_type_tag("shape"), (ElementType::Shape, None));
        assert_eq!(classify_type_tag("line"), (ElementType::Line, None));
        assert_eq!(classify_type_tag("image"), (ElementType::Image, None));
        assert_eq!(classify_type_tag("sticky_note"), (ElementType::StickyNote, None));
        assert_eq!(classify_type_tag("stickyNote"), (ElementType::StickyNote, None));
    }

    #[test]
    fn path_like_and_unknown_tags_default_to_drawing() {
        for tag in ["drawing", "path", "pen", "freehand", "wiggle", ""] {
            assert_eq!(classify_type_tag(tag), (ElementType::Drawing, None), "tag {tag}");
        }
    }

    #[test]
    fn classification_ignores_case_and_whitespace() {
        assert_eq!(classify_type_tag(" Rectangle "), (ElementType::Shape, Some("rectangle")));
        assert_eq!(classify_type_tag("TEXT"), (ElementType::Text, None));
    }
}
