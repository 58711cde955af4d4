/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod support;

use integration_test_utils::{announcement, wait_for_count, RecordingPayloadObserver};
use mesh_router::channel::MeshChannelProxy;
use mesh_router::{MeshError, MeshMessage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Price {
    v: u32,
}

#[tokio::test]
async fn inbound_message_lands_on_local_queue_and_reaches_observers() {
    integration_test_utils::init_logging();
    let service = support::make_service(Duration::ZERO, 0, vec![]);
    let prices = MeshChannelProxy::<Price>::input("prices");
    let observer = RecordingPayloadObserver::<Price>::new();
    let _subscription = prices.subscribe(observer.clone());
    service.manager.register_channels(prices.clone());

    let inbound = MeshMessage::new(r#"{"v":1}"#).with_channel("prices");
    service.transport.inject(inbound.clone()).await;

    let queue = service.state.input_channels().get("prices").unwrap();
    assert_eq!(queue.snapshot(), vec![inbound]);
    assert!(wait_for_count(&observer, 1, Duration::from_secs(1)).await);
    assert_eq!(observer.values().await, vec![Price { v: 1 }]);
    assert_eq!(prices.metrics().received(), 1);
}

#[tokio::test]
async fn broken_observer_does_not_block_delivery() {
    integration_test_utils::init_logging();
    let service = support::make_service(Duration::ZERO, 0, vec![]);
    let prices = MeshChannelProxy::<Price>::input("prices");
    let broken = RecordingPayloadObserver::<Price>::failing();
    let healthy = RecordingPayloadObserver::<Price>::new();
    let _broken = prices.subscribe(broken.clone());
    let _healthy = prices.subscribe(healthy.clone());
    service.manager.register_channels(prices.clone());

    service
        .manager
        .on_next(MeshMessage::new(r#"{"v":1}"#).with_channel("prices"))
        .await
        .unwrap();
    service
        .manager
        .on_next(MeshMessage::new("not json").with_channel("prices"))
        .await
        .unwrap();
    service
        .manager
        .on_next(MeshMessage::new(r#"{"v":2}"#).with_channel("prices"))
        .await
        .unwrap();

    assert_eq!(healthy.values().await, vec![Price { v: 1 }, Price { v: 2 }]);
    assert_eq!(broken.values().await.len(), 2);
    let metrics = prices.metrics().snapshot();
    assert_eq!(metrics.received, 2);
    assert_eq!(metrics.errors, 3);
}

#[tokio::test]
async fn inbound_for_unregistered_channel_is_an_error() {
    let service = support::make_service(Duration::ZERO, 0, vec![]);

    let result = service
        .manager
        .on_next(MeshMessage::new("{}").with_channel("unregistered"))
        .await;

    assert_eq!(
        result,
        Err(MeshError::UnknownChannel("unregistered".to_string()))
    );
}

#[tokio::test]
async fn post_without_target_is_routed_to_every_subscriber() {
    integration_test_utils::init_logging();
    let service = support::make_service(Duration::ZERO, 0, vec![]);
    let updates = MeshChannelProxy::<Price>::output("updates");
    service.manager.register_channels(updates.clone());
    service.state.apply_announcements(&[
        announcement("tcp://a:5000", &["updates"], &[]),
        announcement("tcp://b:5000", &["updates"], &[]),
    ]);

    updates.on_post(&Price { v: 7 }, None).await.unwrap();

    let sent = service.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel.as_deref(), Some("updates"));
    assert_eq!(sent[0].service_address.as_deref(), Some(support::SELF_ADDRESS));
    assert_eq!(
        sent[0].routes,
        Some(vec!["tcp://a:5000".to_string(), "tcp://b:5000".to_string()])
    );
    assert_eq!(sent[0].graph_id, mesh_router::DEFAULT_GRAPH_ID);
    assert_eq!(updates.metrics().sent(), 1);
}

#[tokio::test]
async fn stale_target_is_forwarded_with_original_routes() {
    integration_test_utils::init_logging();
    let service = support::make_service(Duration::ZERO, 0, vec![]);
    let updates = MeshChannelProxy::<Price>::output("updates");
    service.manager.register_channels(updates.clone());
    service
        .state
        .apply_announcements(&[announcement("tcp://a:5000", &["updates"], &[])]);

    updates
        .on_post(&Price { v: 7 }, Some("tcp://c:5000"))
        .await
        .unwrap();

    let sent = service.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].routes, Some(vec!["tcp://c:5000".to_string()]));
}

#[tokio::test]
async fn post_on_unknown_or_unsubscribed_channel_sends_nothing() {
    let service = support::make_service(Duration::ZERO, 0, vec![]);
    let updates = MeshChannelProxy::<Price>::output("updates");
    service.manager.register_channels(updates.clone());

    updates.on_post(&Price { v: 1 }, None).await.unwrap();
    service
        .manager
        .on_publish("ghost", MeshMessage::new("{}"))
        .await;

    assert!(service.transport.sent().is_empty());
}

#[tokio::test]
async fn input_only_proxy_cannot_post() {
    let service = support::make_service(Duration::ZERO, 0, vec![]);
    let prices = MeshChannelProxy::<Price>::input("prices");
    service.manager.register_channels(prices.clone());

    assert_eq!(
        prices.on_post(&Price { v: 1 }, None).await,
        Err(MeshError::MissingOutputAlias)
    );
}
