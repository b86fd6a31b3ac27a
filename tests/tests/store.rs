
use common::*;
use std::time::Duration;

use strata::{EntitySchema, FieldRequest, FieldSchema, Value, ValueType};

#[tokio::test]
async fn create_then_read_returns_declared_zero() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;

    let id = store.create_entity("Widget", None, "w").await.expect("entity should be created");

    let mut request = FieldRequest::new(id, "count");
    store.read(std::slice::from_mut(&mut request)).await;
    assert!(request.success);
    assert_eq!(request.value, Some(Value::Int(0)));

    let mut request = FieldRequest::new(id, "name");
    store.read(std::slice::from_mut(&mut request)).await;
    assert!(request.success);
    assert_eq!(request.value, Some(Value::String(String::new())));
}

#[tokio::test]
async fn write_then_read_round_trips_with_bookkeeping() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let mut write = FieldRequest::with_value(id, "count", Value::Int(42));
    write.writer_id = Some("writer-1".to_string());
    store.write(std::slice::from_mut(&mut write)).await;
    assert!(write.success);
    assert!(write.write_time.is_some());

    let mut read = FieldRequest::new(id, "count");
    store.read(std::slice::from_mut(&mut read)).await;
    assert!(read.success);
    assert_eq!(read.value, Some(Value::Int(42)));
    assert_eq!(read.writer_id.as_deref(), Some("writer-1"));
}

#[tokio::test]
async fn mismatched_write_coerces_to_declared_zero() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let mut write = FieldRequest::with_value(id, "count", Value::String("not an int".into()));
    store.write(std::slice::from_mut(&mut write)).await;
    assert!(write.success);
    assert_eq!(write.value, Some(Value::Int(0)));
}

#[tokio::test]
async fn write_to_undeclared_field_fails_without_aborting_batch() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let mut requests =
        vec![FieldRequest::with_value(id, "ghost", Value::Int(1)), FieldRequest::with_value(id, "count", Value::Int(2))];
    store.write(&mut requests).await;

    assert!(!requests[0].success);
    assert!(requests[1].success);
}

#[tokio::test]
async fn delete_cascades_to_descendants() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;

    let parent = store.create_entity("Widget", None, "p").await.unwrap();
    let child = store.create_entity("Widget", Some(&parent), "c").await.unwrap();
    let grandchild = store.create_entity("Widget", Some(&child), "g").await.unwrap();

    assert_eq!(store.get_entity(&parent).await.unwrap().children, vec![child]);

    store.delete_entity(&parent).await;

    for id in [parent, child, grandchild] {
        assert!(!store.entity_exists(&id).await);
        let mut request = FieldRequest::new(id, "count");
        store.read(std::slice::from_mut(&mut request)).await;
        assert!(!request.success, "field cells must not survive their entity");
    }
    assert!(store.find_entities("Widget").await.is_empty());
}

#[tokio::test]
async fn delete_unlinks_from_parent() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;

    let parent = store.create_entity("Widget", None, "p").await.unwrap();
    let kept = store.create_entity("Widget", Some(&parent), "kept").await.unwrap();
    let dropped = store.create_entity("Widget", Some(&parent), "dropped").await.unwrap();

    store.delete_entity(&dropped).await;

    let parent_record = store.get_entity(&parent).await.unwrap();
    assert_eq!(parent_record.children, vec![kept]);
    assert!(store.entity_exists(&kept).await);
}

#[tokio::test]
async fn create_with_missing_parent_still_creates() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;

    let phantom = strata::EntityId::new();
    let id = store.create_entity("Widget", Some(&phantom), "orphan").await.unwrap();

    let entity = store.get_entity(&id).await.unwrap();
    assert_eq!(entity.parent, Some(phantom));
    assert!(store.entity_exists(&id).await);
}

#[tokio::test]
async fn create_without_schema_is_rejected() {
    let (_backend, store) = fresh_store();
    assert!(store.create_entity("Undeclared", None, "x").await.is_none());
}

#[tokio::test]
async fn field_exists_checks_type_then_entity() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    assert!(store.field_exists("count", "Widget").await);
    assert!(!store.field_exists("ghost", "Widget").await);
    assert!(store.field_exists("count", &id.to_base64()).await);
    assert!(!store.field_exists("count", "NoSuchType").await);
}

#[tokio::test]
async fn entity_types_lists_populated_types() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    store.set_entity_schema(&EntitySchema::new("Gadget", ["name"])).await;

    store.create_entity("Widget", None, "w").await.unwrap();
    store.create_entity("Gadget", None, "g").await.unwrap();

    let mut types = store.entity_types().await;
    types.sort();
    assert_eq!(types, vec!["Gadget".to_string(), "Widget".to_string()]);
}

#[tokio::test]
async fn resolve_indirection_through_parent() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;

    let parent = store.create_entity("Widget", None, "root").await.unwrap();
    let child = store.create_entity("Widget", Some(&parent), "leaf").await.unwrap();

    let mut write = FieldRequest::with_value(parent, "name", Value::String("root".into()));
    store.write(std::slice::from_mut(&mut write)).await;
    assert!(write.success);

    let mut read = FieldRequest::new(child, "parent->name");
    store.read(std::slice::from_mut(&mut read)).await;
    assert!(read.success);
    assert_eq!(read.value, Some(Value::String("root".into())));

    let resolved = store.resolve_indirection("parent->name", &child).await;
    assert_eq!(resolved, Some(("name".to_string(), parent)));
}

#[tokio::test]
async fn resolve_indirection_through_reference_field_and_children() {
    let (_backend, store) = fresh_store();
    store.set_entity_schema(&EntitySchema::new("Node", ["label", "peer"])).await;
    store.set_field_schema(&FieldSchema::new("label", ValueType::String)).await;
    store.set_field_schema(&FieldSchema::new("peer", ValueType::EntityReference)).await;

    let hub = store.create_entity("Node", None, "hub").await.unwrap();
    let spoke = store.create_entity("Node", Some(&hub), "spoke").await.unwrap();
    let friend = store.create_entity("Node", None, "friend").await.unwrap();

    let mut write = FieldRequest::with_value(spoke, "peer", Value::EntityReference(friend));
    store.write(std::slice::from_mut(&mut write)).await;
    let mut write = FieldRequest::with_value(friend, "label", Value::String("over there".into()));
    store.write(std::slice::from_mut(&mut write)).await;

    let mut read = FieldRequest::new(spoke, "peer->label");
    store.read(std::slice::from_mut(&mut read)).await;
    assert_eq!(read.value, Some(Value::String("over there".into())));

    assert_eq!(store.resolve_indirection("children[0]->label", &hub).await, Some(("label".to_string(), spoke)));
    // Unset reference and bad hops resolve to nothing.
    assert_eq!(store.resolve_indirection("peer->label", &friend).await, None);
    assert_eq!(store.resolve_indirection("children[5]->label", &hub).await, None);
    assert_eq!(store.resolve_indirection("label->label", &hub).await, None);
}

#[tokio::test]
async fn temp_keys_are_ttl_bound() {
    let (_backend, store) = fresh_store();

    assert!(store.temp_set("job:claim", "me", Duration::from_millis(40)).await);
    assert!(!store.temp_set("job:claim", "other", Duration::from_millis(40)).await);
    assert_eq!(store.temp_get("job:claim").await.as_deref(), Some("me"));

    assert!(store.temp_expire("job:claim", Duration::from_millis(10)).await);
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(store.temp_get("job:claim").await, None);

    assert!(store.temp_set("job:claim", "me", Duration::from_secs(5)).await);
    store.temp_del("job:claim").await;
    assert_eq!(store.temp_get("job:claim").await, None);

    assert!(store.temp_set("probe:a", "1", Duration::from_secs(5)).await);
    assert!(store.temp_set("probe:b", "2", Duration::from_secs(5)).await);
    assert_eq!(store.temp_scan("probe:*").await.len(), 2);
}

#[tokio::test]
async fn sorted_set_utilities() {
    let (_backend, store) = fresh_store();

    assert_eq!(store.sorted_set_add("board", "first", 1.0).await, 1);
    assert_eq!(store.sorted_set_add("board", "second", 2.0).await, 1);
    assert_eq!(store.sorted_set_add("board", "first", 1.5).await, 0);

    let members = store.sorted_set_range_by_score_with_scores("board", f64::NEG_INFINITY, f64::INFINITY).await;
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].member, "first");
    assert_eq!(members[0].score, 1.5);

    assert_eq!(store.sorted_set_remove("board", "second").await, 1);
    assert_eq!(store.sorted_set_remove_range_by_rank("board", 0, 0).await, 1);
    assert!(store.sorted_set_range_by_score_with_scores("board", f64::NEG_INFINITY, f64::INFINITY).await.is_empty());
}
