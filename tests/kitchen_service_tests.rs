//! # Kitchen Worker Behaviour
//!
//! Order processing, duplicate handling, registration and heartbeats for a
//! single worker over the in-memory store.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::*;
use kitchen_core::messaging::broker::{BrokerConnection, PublishProperties};
use kitchen_core::messaging::{MessageHandler, OrderMessage};
use kitchen_core::models::{OrderType, Specialization, WorkerStatus};
use kitchen_core::state_machine::OrderStatus;
use kitchen_core::{FailureClass, KitchenError};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn test_process_order_cooks_for_type_duration() {
    let harness = KitchenHarness::new();
    let order = harness.submit(OrderRequestBuilder::takeout().build()).await;
    let service = harness.kitchen_service("chef_anna", Specialization::general());
    service.start(CancellationToken::new()).await.unwrap();

    let started = tokio::time::Instant::now();
    service
        .process_order(&OrderMessage::from_order(&order), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(started.elapsed(), OrderType::Takeout.cooking_duration());

    let cooked = harness.orders.order(&order.number).unwrap();
    assert_eq!(cooked.status, OrderStatus::Ready);
    assert_eq!(cooked.processed_by.as_deref(), Some("chef_anna"));
    assert_eq!(harness.workers.worker("chef_anna").unwrap().orders_processed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_delivery_is_acknowledged_without_side_effects() {
    let harness = KitchenHarness::new();
    harness.declare_work_topology().await;
    let order = harness.submit(OrderRequestBuilder::takeout().build()).await;

    // Second copy of the same order message
    harness
        .publisher
        .publish_order(&OrderMessage::from_order(&order), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(harness.broker.queue_depth(KITCHEN_QUEUE), 2);

    let worker = harness.spawn_worker(harness.kitchen_service("chef_anna", Specialization::general()));
    harness.wait_for_status(&order.number, OrderStatus::Ready).await;
    harness.wait_for_idle_queue().await;
    worker.stop().await.unwrap();

    assert_eq!(harness.orders.status_log().len(), 3);
    assert_eq!(harness.workers.worker("chef_anna").unwrap().orders_processed, 1);
    assert_eq!(harness.broker.queue_depth(KITCHEN_DLQ), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_status_race_is_treated_as_duplicate() {
    let harness = KitchenHarness::new();
    let order = harness.submit(OrderRequestBuilder::takeout().build()).await;
    let service = harness.kitchen_service("chef_anna", Specialization::general());

    harness.orders.lose_next_updates(1);
    let started = tokio::time::Instant::now();
    service
        .process_order(&OrderMessage::from_order(&order), &CancellationToken::new())
        .await
        .unwrap();

    // Backed off before cooking
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(
        harness.orders.order(&order.number).unwrap().status,
        OrderStatus::Received
    );
    assert_eq!(harness.orders.status_log().len(), 1);
}

#[tokio::test]
async fn test_specialization_mismatch_leaves_order_untouched() {
    let harness = KitchenHarness::new();
    let order = harness
        .submit(OrderRequestBuilder::delivery("10 Downing Street, London").build())
        .await;
    let service = harness.kitchen_service(
        "pastry_chef",
        Specialization::only([OrderType::DineIn, OrderType::Takeout]),
    );

    let err = service
        .process_order(&OrderMessage::from_order(&order), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, KitchenError::SpecializationMismatch { .. }));
    assert_eq!(err.failure_class(), FailureClass::SpecializationMismatch);
    assert_eq!(
        harness.orders.order(&order.number).unwrap().status,
        OrderStatus::Received
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_cook_leaves_order_cooking() {
    let harness = KitchenHarness::new();
    let order = harness.submit(OrderRequestBuilder::dine_in(7).build()).await;
    let service = harness.kitchen_service("chef_anna", Specialization::general());

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        canceller.cancel();
    });

    let err = service
        .process_order(&OrderMessage::from_order(&order), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, KitchenError::Cancelled));

    let stuck = harness.orders.order(&order.number).unwrap();
    assert_eq!(stuck.status, OrderStatus::Cooking);
    assert_eq!(stuck.completed_at, None);
}

#[tokio::test(start_paused = true)]
async fn test_processed_count_failure_does_not_fail_the_order() {
    let harness = KitchenHarness::new();
    let order = harness.submit(OrderRequestBuilder::takeout().build()).await;
    let service = harness.kitchen_service("chef_anna", Specialization::general());
    service.start(CancellationToken::new()).await.unwrap();

    harness.workers.fail_increments(true);
    service
        .process_order(&OrderMessage::from_order(&order), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        harness.orders.order(&order.number).unwrap().status,
        OrderStatus::Ready
    );
    assert_eq!(harness.workers.worker("chef_anna").unwrap().orders_processed, 0);
}

#[tokio::test]
async fn test_malformed_payload_is_dead_lettered() {
    let harness = KitchenHarness::new();
    harness.declare_work_topology().await;
    let worker = harness.spawn_worker(harness.kitchen_service("chef_anna", Specialization::general()));
    harness.wait_for_consumers(1).await;

    let channel = harness.broker.open_channel().await.unwrap();
    channel
        .publish(
            "orders_topic",
            "kitchen.takeout.1",
            br#"{"order_number": 7}"#,
            PublishProperties::persistent(),
        )
        .await
        .unwrap();
    channel.close().await.unwrap();

    wait_until(|| harness.broker.queue_depth(KITCHEN_DLQ) == 1).await;
    harness.wait_for_idle_queue().await;
    worker.stop().await.unwrap();

    let parked = harness.broker.drain_queue(KITCHEN_DLQ);
    assert_eq!(parked[0].payload, br#"{"order_number": 7}"#.to_vec());

    // The same payload handed straight to the handler
    let err = harness
        .kitchen_service("chef_backup", Specialization::general())
        .handle(&parked[0].routing_key, &parked[0].payload, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.failure_class(), FailureClass::PermanentProcessing);
}

#[tokio::test]
async fn test_start_rejects_name_that_is_still_online() {
    let harness = KitchenHarness::new();
    harness
        .workers
        .put(worker_row("chef_anna", WorkerStatus::Online, Utc::now()));

    let service = harness.kitchen_service("chef_anna", Specialization::general());
    let err = service.start(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, KitchenError::WorkerAlreadyOnline(name) if name == "chef_anna"));

    // A worker that cannot register never consumes
    let worker = harness.spawn_worker(harness.kitchen_service("chef_anna", Specialization::general()));
    let result = worker.handle.await.unwrap();
    assert!(matches!(result, Err(KitchenError::WorkerAlreadyOnline(_))));
    assert_eq!(harness.broker.consumer_count(KITCHEN_QUEUE), 0);
}

#[tokio::test]
async fn test_restart_reactivates_offline_worker_with_new_specialization() {
    let harness = KitchenHarness::new();
    let mut stored = worker_row("chef_anna", WorkerStatus::Offline, Utc::now());
    stored.orders_processed = 41;
    harness.workers.put(stored);

    let service =
        harness.kitchen_service("chef_anna", Specialization::only([OrderType::Delivery]));
    let cancel = CancellationToken::new();
    let heartbeat = service.start(cancel.clone()).await.unwrap();

    let worker = harness.workers.worker("chef_anna").unwrap();
    assert_eq!(worker.status, WorkerStatus::Online);
    assert_eq!(worker.specialization.to_string(), "delivery");
    assert_eq!(worker.orders_processed, 41);

    cancel.cancel();
    heartbeat.await.unwrap();
    service.shutdown().await.unwrap();
    assert_eq!(
        harness.workers.worker("chef_anna").unwrap().status,
        WorkerStatus::Offline
    );
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_refreshes_last_seen_on_interval() {
    let harness = KitchenHarness::new();
    let service = harness
        .kitchen_service("chef_anna", Specialization::general())
        .with_heartbeat_interval(Duration::from_secs(30));

    let cancel = CancellationToken::new();
    let heartbeat = service.start(cancel.clone()).await.unwrap();
    let registered_at = harness.workers.worker("chef_anna").unwrap().last_seen;

    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(harness.workers.heartbeat_count(), 3);
    let last_seen = harness.workers.worker("chef_anna").unwrap().last_seen;
    assert_eq!(last_seen - registered_at, chrono::Duration::seconds(90));

    cancel.cancel();
    heartbeat.await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.workers.heartbeat_count(), 3);
}
