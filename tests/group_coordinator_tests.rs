//! Integration tests for multi-element group operations

use easel::board::line_endpoints;
use easel::coordinator::{ElementCoordinator, GroupCoordinator, NewElement};
use easel::store::{ElementStore, MemoryStore};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    elements: ElementCoordinator,
    groups: GroupCoordinator,
    store: Arc<MemoryStore>,
    board: Uuid,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    Fixture {
        elements: ElementCoordinator::new(store.clone()),
        groups: GroupCoordinator::new(store.clone()),
        store,
        board: Uuid::new_v4(),
    }
}

impl Fixture {
    async fn add(&self, type_tag: &str, x: f64, y: f64, data: serde_json::Value) -> Uuid {
        self.elements
            .add_element(
                self.board,
                NewElement {
                    type_tag: type_tag.to_string(),
                    x,
                    y,
                    width: 10.0,
                    height: 10.0,
                    data,
                },
                "alice",
            )
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn grouping_assigns_contiguous_order_in_input_order() -> anyhow::Result<()> {
    let f = fixture();
    let a = f.add("shape", 0.0, 0.0, json!({})).await;
    let b = f.add("shape", 1.0, 0.0, json!({})).await;
    let c = f.add("shape", 2.0, 0.0, json!({})).await;

    let (group_id, members) = f.groups.create_group(f.board, &[c, a, b], "alice").await?;

    let orders: Vec<(Uuid, i32)> = members
        .iter()
        .map(|e| (e.id, e.group_order.unwrap()))
        .collect();
    assert_eq!(orders, vec![(c, 0), (a, 1), (b, 2)]);
    assert!(members.iter().all(|e| e.group_id == Some(group_id)));
    Ok(())
}

#[tokio::test]
async fn foreign_element_fails_the_whole_grouping() -> anyhow::Result<()> {
    let f = fixture();
    let local = f.add("shape", 0.0, 0.0, json!({})).await;

    let other_board = Uuid::new_v4();
    let foreign = f
        .elements
        .add_element(
            other_board,
            NewElement {
                type_tag: "shape".to_string(),
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                data: json!({}),
            },
            "alice",
        )
        .await?
        .id;

    assert!(f
        .groups
        .create_group(f.board, &[local, foreign], "alice")
        .await
        .is_err());

    // All-or-nothing: the local element was not mutated
    let untouched = f.store.element(local).await?.unwrap();
    assert!(untouched.group_id.is_none());
    assert!(untouched.group_order.is_none());
    Ok(())
}

#[tokio::test]
async fn missing_element_fails_the_whole_grouping() -> anyhow::Result<()> {
    let f = fixture();
    let local = f.add("shape", 0.0, 0.0, json!({})).await;

    assert!(f
        .groups
        .create_group(f.board, &[local, Uuid::new_v4()], "alice")
        .await
        .is_err());
    assert!(f.store.element(local).await?.unwrap().group_id.is_none());
    Ok(())
}

#[tokio::test]
async fn move_group_translates_every_member_exactly() -> anyhow::Result<()> {
    let f = fixture();
    let a = f.add("shape", 0.0, 0.0, json!({})).await;
    let b = f.add("shape", 100.0, 50.0, json!({})).await;
    let bystander = f.add("shape", 7.0, 7.0, json!({})).await;
    let (group_id, _) = f.groups.create_group(f.board, &[a, b], "alice").await?;

    let moved = f
        .groups
        .move_group(group_id, 5.0, -3.0, "alice")
        .await?
        .unwrap();

    let positions: Vec<(f64, f64)> = moved.iter().map(|e| (e.x, e.y)).collect();
    assert_eq!(positions, vec![(5.0, -3.0), (105.0, 47.0)]);

    let untouched = f.store.element(bystander).await?.unwrap();
    assert_eq!((untouched.x, untouched.y), (7.0, 7.0));
    Ok(())
}

#[tokio::test]
async fn move_group_leaves_line_endpoints_alone() -> anyhow::Result<()> {
    // Divergence from single-element move, preserved on purpose: grouped
    // lines keep their payload endpoints while the bounding box moves.
    let f = fixture();
    let line = f
        .add(
            "line",
            0.0,
            0.0,
            json!({"startX": 0.0, "startY": 0.0, "endX": 10.0, "endY": 10.0}),
        )
        .await;
    let (group_id, _) = f.groups.create_group(f.board, &[line], "alice").await?;

    f.groups.move_group(group_id, 5.0, 5.0, "alice").await?;

    let moved = f.store.element(line).await?.unwrap();
    assert_eq!((moved.x, moved.y), (5.0, 5.0));
    assert_eq!(line_endpoints(&moved.data), Some((0.0, 0.0, 10.0, 10.0)));
    Ok(())
}

#[tokio::test]
async fn ungroup_clears_membership() -> anyhow::Result<()> {
    let f = fixture();
    let a = f.add("shape", 0.0, 0.0, json!({})).await;
    let b = f.add("shape", 1.0, 1.0, json!({})).await;
    let (group_id, _) = f.groups.create_group(f.board, &[a, b], "alice").await?;

    let ids = f.groups.ungroup(group_id, "alice").await?.unwrap();
    assert_eq!(ids.len(), 2);
    for id in [a, b] {
        let element = f.store.element(id).await?.unwrap();
        assert!(element.group_id.is_none());
        assert!(element.group_order.is_none());
    }

    // Second ungroup finds nothing
    assert!(f.groups.ungroup(group_id, "alice").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn delete_group_removes_all_members() -> anyhow::Result<()> {
    let f = fixture();
    let a = f.add("shape", 0.0, 0.0, json!({})).await;
    let b = f.add("shape", 1.0, 1.0, json!({})).await;
    let survivor = f.add("shape", 2.0, 2.0, json!({})).await;
    let (group_id, _) = f.groups.create_group(f.board, &[a, b], "alice").await?;

    let deleted = f.groups.delete_group(group_id).await?.unwrap();
    assert_eq!(deleted.len(), 2);
    assert!(f.store.element(a).await?.is_none());
    assert!(f.store.element(b).await?.is_none());
    assert!(f.store.element(survivor).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn group_z_reassignment_preserves_relative_stacking() -> anyhow::Result<()> {
    let f = fixture();
    let bottom = f.add("shape", 0.0, 0.0, json!({})).await;
    let top = f.add("shape", 1.0, 1.0, json!({})).await;
    let outsider = f.add("shape", 2.0, 2.0, json!({})).await;
    let (group_id, _) = f.groups.create_group(f.board, &[bottom, top], "alice").await?;

    let raised = f
        .groups
        .bring_group_to_front(group_id, "alice")
        .await?
        .unwrap();
    let outsider_z = f.store.element(outsider).await?.unwrap().z_index;
    assert!(raised.iter().all(|e| e.z_index > outsider_z));
    assert_eq!(raised[1].z_index, raised[0].z_index + 1);

    let lowered = f
        .groups
        .send_group_to_back(group_id, "alice")
        .await?
        .unwrap();
    assert!(lowered.iter().all(|e| e.z_index < outsider_z));
    assert_eq!(lowered[1].z_index, lowered[0].z_index + 1);
    Ok(())
}

#[tokio::test]
async fn empty_group_operations_report_no_members() -> anyhow::Result<()> {
    let f = fixture();
    let nobody = Uuid::new_v4();

    assert!(f.groups.move_group(nobody, 1.0, 1.0, "a").await?.is_none());
    assert!(f.groups.delete_group(nobody).await?.is_none());
    assert!(f.groups.bring_group_to_front(nobody, "a").await?.is_none());
    assert!(f.groups.send_group_to_back(nobody, "a").await?.is_none());
    assert!(f.groups.create_group(f.board, &[], "a").await.is_err());
    Ok(())
}
