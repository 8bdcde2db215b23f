//! Integration tests for single-element mutation orchestration

use easel::board::{line_endpoints, number_field, ElementType};
use easel::coordinator::{ElementCoordinator, NewElement};
use easel::store::{ElementStore, MemoryStore};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn coordinator() -> (ElementCoordinator, Arc<MemoryStore>, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let coordinator = ElementCoordinator::new(store.clone());
    (coordinator, store, Uuid::new_v4())
}

fn new_element(type_tag: &str, data: serde_json::Value) -> NewElement {
    NewElement {
        type_tag: type_tag.to_string(),
        x: 10.0,
        y: 20.0,
        width: 100.0,
        height: 50.0,
        data,
    }
}

#[tokio::test]
async fn rectangle_tag_becomes_shape_with_subtype() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();

    let element = coordinator
        .add_element(board, new_element("rectangle", json!({})), "alice")
        .await?;

    assert_eq!(element.element_type, ElementType::Shape);
    assert_eq!(element.data["shapeType"], json!("rectangle"));
    assert_eq!(element.created_by, "alice");
    assert_eq!(element.modified_by, "alice");
    Ok(())
}

#[tokio::test]
async fn unknown_tag_defaults_to_drawing() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();

    let element = coordinator
        .add_element(board, new_element("scribble3000", json!({})), "alice")
        .await?;

    assert_eq!(element.element_type, ElementType::Drawing);
    Ok(())
}

#[tokio::test]
async fn new_elements_stack_on_top() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();

    let first = coordinator
        .add_element(board, new_element("shape", json!({})), "a")
        .await?;
    let second = coordinator
        .add_element(board, new_element("shape", json!({})), "a")
        .await?;

    assert!(second.z_index > first.z_index);
    Ok(())
}

#[tokio::test]
async fn drawing_path_keeps_its_points() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();

    let element = coordinator
        .add_drawing_path(
            board,
            new_element("", json!({"points": [[0, 0], [5, 5], [10, 0]]})),
            "a",
        )
        .await?;

    assert_eq!(element.element_type, ElementType::Drawing);
    assert_eq!(element.data["points"].as_array().unwrap().len(), 3);
    Ok(())
}

#[tokio::test]
async fn moving_a_line_translates_its_endpoints() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let line = coordinator
        .add_element(
            board,
            new_element(
                "line",
                json!({"startX": 10.0, "startY": 20.0, "endX": 40.0, "endY": 60.0}),
            ),
            "a",
        )
        .await?;

    let moved = coordinator
        .move_element(line.id, line.x + 7.0, line.y - 3.0, "a")
        .await?;

    let (sx, sy, ex, ey) = line_endpoints(&moved.data).unwrap();
    // Pure translation: the end-start vector is unchanged
    assert_eq!(ex - sx, 30.0);
    assert_eq!(ey - sy, 40.0);
    assert_eq!(sx, 17.0);
    assert_eq!(sy, 17.0);
    Ok(())
}

#[tokio::test]
async fn malformed_endpoints_skip_translation_but_still_move() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let line = coordinator
        .add_element(
            board,
            new_element("line", json!({"startX": "garbage", "startY": 1.0})),
            "a",
        )
        .await?;

    let moved = coordinator.move_element(line.id, 99.0, 99.0, "a").await?;

    assert_eq!((moved.x, moved.y), (99.0, 99.0));
    assert_eq!(moved.data["startX"], json!("garbage"));
    assert_eq!(moved.data["startY"], json!(1.0));
    Ok(())
}

#[tokio::test]
async fn update_line_endpoints_preserves_direction() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let line = coordinator
        .add_element(board, new_element("line", json!({})), "a")
        .await?;

    // End is up-left of start: width/height stay signed
    let updated = coordinator
        .update_line_endpoints(line.id, 50.0, 50.0, 10.0, 30.0, "a")
        .await?;

    assert_eq!((updated.x, updated.y), (50.0, 50.0));
    assert_eq!((updated.width, updated.height), (-40.0, -20.0));
    assert_eq!(line_endpoints(&updated.data), Some((50.0, 50.0, 10.0, 30.0)));
    Ok(())
}

#[tokio::test]
async fn style_patch_normalizes_rotation() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let shape = coordinator
        .add_element(board, new_element("shape", json!({})), "a")
        .await?;

    let updated = coordinator
        .update_style(shape.id, &json!({"rotation": 370}), "a")
        .await?;
    assert_eq!(number_field(&updated.data, "rotation"), Some(10.0));

    let updated = coordinator
        .update_style(shape.id, &json!({"rotation": -10}), "a")
        .await?;
    assert_eq!(number_field(&updated.data, "rotation"), Some(350.0));

    // Unparsable rotation is dropped; the prior value stays
    let updated = coordinator
        .update_style(shape.id, &json!({"rotation": "abc", "color": "red"}), "a")
        .await?;
    assert_eq!(number_field(&updated.data, "rotation"), Some(350.0));
    assert_eq!(updated.data["color"], json!("red"));
    Ok(())
}

#[tokio::test]
async fn style_patch_preserves_lock_flag() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let shape = coordinator
        .add_element(board, new_element("shape", json!({})), "a")
        .await?;

    coordinator.update_lock(shape.id, true, "a").await?;
    let updated = coordinator
        .update_style(shape.id, &json!({"color": "blue"}), "a")
        .await?;

    assert_eq!(updated.data["locked"], json!(true));
    assert_eq!(updated.data["color"], json!("blue"));
    Ok(())
}

#[tokio::test]
async fn endpoint_style_patch_recomputes_bounding_box() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let line = coordinator
        .add_element(
            board,
            new_element(
                "line",
                json!({"startX": 0.0, "startY": 0.0, "endX": 10.0, "endY": 10.0}),
            ),
            "a",
        )
        .await?;

    let updated = coordinator
        .update_style(line.id, &json!({"endX": 30.0, "endY": 5.0}), "a")
        .await?;

    assert_eq!((updated.x, updated.y), (0.0, 0.0));
    assert_eq!((updated.width, updated.height), (30.0, 5.0));
    Ok(())
}

#[tokio::test]
async fn typed_update_skips_mismatched_elements() -> anyhow::Result<()> {
    let (coordinator, store, board) = coordinator();
    let shape = coordinator
        .add_element(board, new_element("shape", json!({"color": "red"})), "a")
        .await?;

    let result = coordinator
        .update_typed(shape.id, ElementType::StickyNote, &json!({"text": "hi"}), "a")
        .await?;

    assert!(result.is_none());
    let untouched = store.element(shape.id).await?.unwrap();
    assert!(untouched.data.get("text").is_none());

    let sticky = coordinator
        .add_element(board, new_element("sticky_note", json!({})), "a")
        .await?;
    let result = coordinator
        .update_typed(sticky.id, ElementType::StickyNote, &json!({"text": "hi"}), "a")
        .await?;
    assert_eq!(result.unwrap().data["text"], json!("hi"));
    Ok(())
}

#[tokio::test]
async fn z_extremes_move_past_the_current_stack() -> anyhow::Result<()> {
    let (coordinator, _, board) = coordinator();
    let bottom = coordinator
        .add_element(board, new_element("shape", json!({})), "a")
        .await?;
    let top = coordinator
        .add_element(board, new_element("shape", json!({})), "a")
        .await?;

    let raised = coordinator.set_z_extreme(bottom.id, true, "a").await?;
    assert!(raised.z_index > top.z_index);

    let lowered = coordinator.set_z_extreme(top.id, false, "a").await?;
    assert!(lowered.z_index < raised.z_index);
    Ok(())
}

#[tokio::test]
async fn missing_element_is_an_error_not_a_panic() {
    let (coordinator, _, _) = coordinator();
    let missing = Uuid::new_v4();

    let err = coordinator
        .move_element(missing, 0.0, 0.0, "a")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));

    assert!(!coordinator.delete_element(missing).await.unwrap());
}

proptest! {
    #[test]
    fn normalized_rotation_always_lands_in_range(rotation in -100_000.0f64..100_000.0) {
        let normalized = easel::board::normalize_rotation(rotation);
        prop_assert!((0.0..360.0).contains(&normalized));
    }
}
