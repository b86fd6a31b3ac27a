
use common::*;

use strata::{FieldRequest, SubscriptionConfig, Value};

fn count_config(entity_id: Option<strata::EntityId>, notify_on_change: bool) -> SubscriptionConfig {
    SubscriptionConfig {
        entity_id,
        entity_type: "Widget".to_string(),
        field: "count".to_string(),
        notify_on_change,
        context_fields: Vec::new(),
        service_id: "test-service".to_string(),
    }
}

async fn write_count(store: &strata::EntityStore, id: strata::EntityId, value: i64) {
    let mut request = FieldRequest::with_value(id, "count", Value::Int(value));
    store.write(std::slice::from_mut(&mut request)).await;
    assert!(request.success);
}

#[tokio::test]
async fn notify_on_change_drops_identical_writes() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let recorder = Recorder::new();
    let token = store.notifier().notify(&count_config(Some(id), true), recorder.callback()).await.expect("subscription");
    assert!(!token.is_empty());

    write_count(&store, id, 5).await;
    write_count(&store, id, 5).await;
    write_count(&store, id, 6).await;

    store.notifier().process_notifications().await;

    let delivered = recorder.take();
    assert_eq!(delivered.len(), 2, "the bitwise-equal second write must be dropped");

    assert_eq!(int_value(&delivered[0].current.value), 5);
    assert_eq!(int_value(&delivered[0].previous.as_ref().unwrap().value), 0);
    assert_eq!(int_value(&delivered[1].current.value), 6);
    assert_eq!(int_value(&delivered[1].previous.as_ref().unwrap().value), 5);
}

#[tokio::test]
async fn without_notify_on_change_every_write_delivers() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let recorder = Recorder::new();
    store.notifier().notify(&count_config(Some(id), false), recorder.callback()).await.unwrap();

    write_count(&store, id, 7).await;
    write_count(&store, id, 7).await;

    store.notifier().process_notifications().await;
    assert_eq!(recorder.len(), 2);
}

#[tokio::test]
async fn delivery_is_ordered_and_not_repeated() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let recorder = Recorder::new();
    store.notifier().notify(&count_config(Some(id), true), recorder.callback()).await.unwrap();

    for value in 1..=5 {
        write_count(&store, id, value).await;
    }

    store.notifier().process_notifications().await;
    let first_batch = recorder.take();
    let currents: Vec<i64> = first_batch.iter().map(|n| int_value(&n.current.value)).collect();
    assert_eq!(currents, vec![1, 2, 3, 4, 5]);

    // The cursor has advanced; polling again redelivers nothing.
    store.notifier().process_notifications().await;
    assert_eq!(recorder.len(), 0);

    write_count(&store, id, 6).await;
    store.notifier().process_notifications().await;
    let next = recorder.take();
    assert_eq!(next.len(), 1);
    assert_eq!(int_value(&next[0].current.value), 6);
}

#[tokio::test]
async fn subscription_starts_from_newest() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    // A previous incarnation left entries on the stream.
    let recorder_old = Recorder::new();
    let token = store.notifier().notify(&count_config(Some(id), true), recorder_old.callback()).await.unwrap();
    write_count(&store, id, 1).await;
    write_count(&store, id, 2).await;
    store.notifier().unnotify(&token);

    let recorder = Recorder::new();
    store.notifier().notify(&count_config(Some(id), true), recorder.callback()).await.unwrap();
    store.notifier().process_notifications().await;
    assert_eq!(recorder.len(), 0, "entries appended before registration are not replayed");

    write_count(&store, id, 3).await;
    store.notifier().process_notifications().await;
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn type_scoped_subscription_sees_every_instance() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let a = store.create_entity("Widget", None, "a").await.unwrap();
    let b = store.create_entity("Widget", None, "b").await.unwrap();

    let recorder = Recorder::new();
    store.notifier().notify(&count_config(None, true), recorder.callback()).await.unwrap();

    write_count(&store, a, 10).await;
    write_count(&store, b, 20).await;

    store.notifier().process_notifications().await;
    let delivered = recorder.take();
    assert_eq!(delivered.len(), 2);
    let mut ids = vec![delivered[0].current.entity_id, delivered[1].current.entity_id];
    ids.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn context_fields_snapshot_at_trigger_time() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let mut request = FieldRequest::with_value(id, "name", Value::String("gizmo".into()));
    store.write(std::slice::from_mut(&mut request)).await;

    let mut config = count_config(Some(id), true);
    config.context_fields = vec!["name".to_string(), "missing".to_string()];

    let recorder = Recorder::new();
    store.notifier().notify(&config, recorder.callback()).await.unwrap();

    write_count(&store, id, 1).await;
    store.notifier().process_notifications().await;

    let delivered = recorder.take();
    assert_eq!(delivered.len(), 1);
    // The unreadable context field is dropped, not fatal.
    assert_eq!(delivered[0].context.len(), 1);
    assert_eq!(delivered[0].context[0].field, "name");
    assert_eq!(delivered[0].context[0].value, Value::String("gizmo".into()));
}

#[tokio::test]
async fn unknown_field_subscription_is_rejected() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    store.create_entity("Widget", None, "w").await.unwrap();

    let mut config = count_config(None, true);
    config.field = "ghost".to_string();

    let recorder = Recorder::new();
    assert!(store.notifier().notify(&config, recorder.callback()).await.is_none());
    assert_eq!(store.notifier().subscription_count(), 0);
}

#[tokio::test]
async fn identical_configs_collapse_to_one_token() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let first = Recorder::new();
    let second = Recorder::new();
    let token_a = store.notifier().notify(&count_config(Some(id), true), first.callback()).await.unwrap();
    let token_b = store.notifier().notify(&count_config(Some(id), true), second.callback()).await.unwrap();

    assert_eq!(token_a, token_b);
    assert_eq!(store.notifier().subscription_count(), 1);
}

#[tokio::test]
async fn unnotify_stops_delivery() {
    let (_backend, store) = fresh_store();
    declare_widget(&store).await;
    let id = store.create_entity("Widget", None, "w").await.unwrap();

    let recorder = Recorder::new();
    let token = store.notifier().notify(&count_config(Some(id), true), recorder.callback()).await.unwrap();

    write_count(&store, id, 1).await;
    store.notifier().process_notifications().await;
    assert_eq!(recorder.take().len(), 1);

    store.notifier().unnotify(&token);
    write_count(&store, id, 2).await;
    store.notifier().process_notifications().await;
    assert_eq!(recorder.len(), 0);
}
