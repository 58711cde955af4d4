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

//! Typed adapter between business observers and the untyped wire-message world.

use crate::channel::metrics::ChannelMetrics;
use crate::channel::monitor::Monitor;
use crate::channel::observer::{MessageObserver, ObserverList, PayloadObserver, Subscription};
use crate::channel::route_register::{ChannelPublisher, OutputEndpoint, RouteRegister};
use crate::control_plane::{InputChannels, OutputChannels};
use crate::error::{MeshError, MeshResult};
use crate::observability::events;
use crate::wire_message::MeshMessage;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

const COMPONENT: &str = "channel_proxy";

type OnConnectCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Bridges one input alias and/or one output alias to locally typed observers.
///
/// Inbound: wire messages from the input queue are decoded into `T` and fanned out to
/// every subscribed [`PayloadObserver`]. Outbound: [`on_post`](Self::on_post) encodes a
/// `T` and hands it to the attached [`ChannelPublisher`].
///
/// Decode and observer failures never escape the proxy; they are counted and reported
/// to the registered [`Monitor`].
pub struct MeshChannelProxy<T> {
    input_alias: Option<String>,
    output_alias: Option<String>,
    metrics: ChannelMetrics,
    observers: ObserverList<dyn PayloadObserver<T>>,
    publisher: ArcSwapOption<Arc<dyn ChannelPublisher>>,
    monitor: ArcSwapOption<Arc<dyn Monitor>>,
    on_connect: ArcSwapOption<OnConnectCallback>,
    input_subscription: Mutex<Option<Subscription>>,
    _payload: PhantomData<fn() -> T>,
}

fn non_empty(alias: Option<&str>) -> Option<String> {
    alias.filter(|alias| !alias.is_empty()).map(str::to_string)
}

impl<T> MeshChannelProxy<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Empty aliases are treated as absent.
    pub fn new(input_alias: Option<&str>, output_alias: Option<&str>) -> Arc<Self> {
        let input_alias = non_empty(input_alias);
        let output_alias = non_empty(output_alias);
        let metrics_name = output_alias
            .as_deref()
            .or(input_alias.as_deref())
            .unwrap_or_default()
            .to_string();

        Arc::new(Self {
            input_alias,
            output_alias,
            metrics: ChannelMetrics::new(metrics_name, std::any::type_name::<T>()),
            observers: ObserverList::new(),
            publisher: ArcSwapOption::empty(),
            monitor: ArcSwapOption::empty(),
            on_connect: ArcSwapOption::empty(),
            input_subscription: Mutex::new(None),
            _payload: PhantomData,
        })
    }

    pub fn input(alias: &str) -> Arc<Self> {
        Self::new(Some(alias), None)
    }

    pub fn output(alias: &str) -> Arc<Self> {
        Self::new(None, Some(alias))
    }

    pub fn input_alias(&self) -> Option<&str> {
        self.input_alias.as_deref()
    }

    pub fn output_alias(&self) -> Option<&str> {
        self.output_alias.as_deref()
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    pub fn register_monitor(&self, monitor: Arc<dyn Monitor>) {
        self.monitor.store(Some(Arc::new(monitor)));
    }

    /// Installs the callback fired when a subscriber of the output alias comes online.
    pub fn set_on_connect<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_connect.store(Some(Arc::new(Box::new(callback))));
    }

    pub fn subscribe(&self, observer: Arc<dyn PayloadObserver<T>>) -> Subscription {
        self.observers.add(observer)
    }

    /// Detaches the proxy from its input queue. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        let subscription = self
            .input_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    pub fn is_subscribed_to_input(&self) -> bool {
        self.input_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Registers the input queue and the output publish target, skipping aliases that are
    /// already present in the given tables.
    pub fn register_dependencies(
        self: &Arc<Self>,
        inputs: Option<&InputChannels>,
        outputs: Option<&OutputChannels>,
    ) {
        if let Some(inputs) = inputs {
            self.clone().register_receiver_channels(inputs);
        }
        if let Some(outputs) = outputs {
            self.clone().register_publisher_channels(outputs);
        }
    }

    /// Encodes `payload` and posts it on the output alias, optionally pinned to one
    /// target address.
    pub async fn on_post(&self, payload: &T, target_address: Option<&str>) -> MeshResult<()> {
        let Some(output_alias) = self.output_alias.as_deref() else {
            return Err(MeshError::MissingOutputAlias);
        };

        let encoded = match serde_json::to_string(payload) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(
                    event = events::PROXY_SERIALIZE_FAILED,
                    component = COMPONENT,
                    channel = output_alias,
                    err = %err,
                    "unable to encode payload"
                );
                self.on_error(&err);
                return Err(err.into());
            }
        };
        let mut message = MeshMessage::new(encoded);
        self.metrics.record_sent();
        if let Some(target) = target_address {
            message.routes = Some(vec![target.to_string()]);
        }

        match self.publisher.load_full() {
            Some(publisher) => publisher.publish(output_alias, message).await,
            None => {
                debug!(
                    event = events::PUBLISH_NO_PUBLISHER,
                    component = COMPONENT,
                    channel = output_alias,
                    xid = message.transaction_id.as_str(),
                    "no publisher attached; dropping post"
                );
            }
        }
        Ok(())
    }

    /// Counts the failure and reports it to the monitor, if any.
    pub fn on_error(&self, error: &(dyn Error + 'static)) {
        self.metrics.record_error();
        if let Some(monitor) = self.monitor.load_full() {
            monitor.on_error(error, self.report_alias());
        }
    }

    fn report_alias(&self) -> &str {
        self.input_alias
            .as_deref()
            .or(self.output_alias.as_deref())
            .unwrap_or_default()
    }
}

#[async_trait]
impl<T> MessageObserver for MeshChannelProxy<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn on_next(&self, message: &MeshMessage) {
        let value: T = match serde_json::from_str(&message.payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    event = events::PROXY_DESERIALIZE_FAILED,
                    component = COMPONENT,
                    channel = self.report_alias(),
                    xid = message.transaction_id.as_str(),
                    err = %err,
                    "unable to decode payload"
                );
                self.on_error(&err);
                return;
            }
        };

        self.metrics.record_received();
        for observer in self.observers.snapshot() {
            if let Err(err) = observer.on_next(value.clone()).await {
                warn!(
                    event = events::PROXY_OBSERVER_FAILED,
                    component = COMPONENT,
                    channel = self.report_alias(),
                    xid = message.transaction_id.as_str(),
                    err = %err,
                    "payload observer failed"
                );
                self.on_error(err.as_ref());
            }
        }
    }

    async fn on_completed(&self) {
        self.unsubscribe();
    }
}

impl<T> RouteRegister for MeshChannelProxy<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn register_receiver_channels(self: Arc<Self>, inputs: &InputChannels) {
        let Some(alias) = self.input_alias.as_deref() else {
            return;
        };
        if let Some(queue) = inputs.register(alias) {
            let subscription = queue.subscribe(self.clone());
            *self
                .input_subscription
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
        }
    }

    fn register_publisher_channels(self: Arc<Self>, outputs: &OutputChannels) {
        if self.output_alias.is_none() {
            return;
        }
        outputs.register(self);
    }

    fn attach_publisher(&self, publisher: Arc<dyn ChannelPublisher>) {
        self.publisher.store(Some(Arc::new(publisher)));
    }
}

impl<T> OutputEndpoint for MeshChannelProxy<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn alias(&self) -> &str {
        self.output_alias.as_deref().unwrap_or_default()
    }

    fn on_connect(&self, address: &str) {
        if let Some(callback) = self.on_connect.load_full() {
            (**callback)(address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MeshChannelProxy;
    use crate::channel::monitor::{Monitor, TracingMonitor};
    use crate::channel::observer::{MessageObserver, PayloadObserver};
    use crate::channel::route_register::{ChannelPublisher, OutputEndpoint};
    use crate::control_plane::{InputChannels, OutputChannels};
    use crate::error::ObserverError;
    use crate::{MeshError, MeshMessage, DEFAULT_GRAPH_ID};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Quote {
        v: u32,
    }

    #[derive(Default)]
    struct CollectingObserver {
        values: Mutex<Vec<Quote>>,
    }

    #[async_trait]
    impl PayloadObserver<Quote> for CollectingObserver {
        async fn on_next(&self, value: Quote) -> Result<(), ObserverError> {
            self.values.lock().unwrap().push(value);
            Ok(())
        }
    }

    struct FailingObserver;

    #[async_trait]
    impl PayloadObserver<Quote> for FailingObserver {
        async fn on_next(&self, _value: Quote) -> Result<(), ObserverError> {
            Err("observer exploded".into())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        posts: Mutex<Vec<(String, MeshMessage)>>,
    }

    #[async_trait]
    impl ChannelPublisher for RecordingPublisher {
        async fn publish(&self, channel: &str, message: MeshMessage) {
            self.posts
                .lock()
                .unwrap()
                .push((channel.to_string(), message));
        }
    }

    #[derive(Default)]
    struct CountingMonitor {
        reports: Mutex<Vec<String>>,
    }

    impl Monitor for CountingMonitor {
        fn on_error(&self, error: &(dyn Error + 'static), alias: &str) {
            self.reports
                .lock()
                .unwrap()
                .push(format!("{alias}: {error}"));
        }
    }

    #[test]
    fn registering_twice_keeps_one_queue_per_alias() {
        let inputs = InputChannels::new(8);
        let outputs = OutputChannels::new();
        let first: Arc<MeshChannelProxy<Quote>> =
            MeshChannelProxy::new(Some("prices"), Some("updates"));
        let second: Arc<MeshChannelProxy<Quote>> =
            MeshChannelProxy::new(Some("prices"), Some("updates"));

        first.register_dependencies(Some(&inputs), Some(&outputs));
        let queue = inputs.get("prices").expect("queue registered");
        first.register_dependencies(Some(&inputs), Some(&outputs));
        second.register_dependencies(Some(&inputs), Some(&outputs));

        assert_eq!(inputs.len(), 1);
        assert!(Arc::ptr_eq(&queue, &inputs.get("prices").unwrap()));
        assert_eq!(queue.observer_count(), 1);
        assert!(first.is_subscribed_to_input());
        assert!(!second.is_subscribed_to_input());
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn empty_aliases_register_nothing() {
        let inputs = InputChannels::new(8);
        let outputs = OutputChannels::new();
        let proxy: Arc<MeshChannelProxy<Quote>> = MeshChannelProxy::new(Some(""), Some(""));

        proxy.register_dependencies(Some(&inputs), Some(&outputs));

        assert!(inputs.is_empty());
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn inbound_payload_fans_out_to_every_observer() {
        let proxy = MeshChannelProxy::<Quote>::input("prices");
        let first = Arc::new(CollectingObserver::default());
        let second = Arc::new(CollectingObserver::default());
        proxy.subscribe(first.clone());
        proxy.subscribe(second.clone());

        proxy
            .on_next(&MeshMessage::new("{\"v\":1}").with_channel("prices"))
            .await;

        assert_eq!(*first.values.lock().unwrap(), vec![Quote { v: 1 }]);
        assert_eq!(*second.values.lock().unwrap(), vec![Quote { v: 1 }]);
        assert_eq!(proxy.metrics().received(), 1);
        assert_eq!(proxy.metrics().errors(), 0);
    }

    #[tokio::test]
    async fn failing_observer_does_not_block_others_or_later_delivery() {
        let proxy = MeshChannelProxy::<Quote>::input("prices");
        let monitor = Arc::new(CountingMonitor::default());
        proxy.register_monitor(monitor.clone());
        proxy.subscribe(Arc::new(FailingObserver));
        let healthy = Arc::new(CollectingObserver::default());
        proxy.subscribe(healthy.clone());

        proxy.on_next(&MeshMessage::new("{\"v\":1}")).await;
        proxy.on_next(&MeshMessage::new("{\"v\":2}")).await;

        assert_eq!(healthy.values.lock().unwrap().len(), 2);
        assert_eq!(proxy.metrics().received(), 2);
        assert_eq!(proxy.metrics().errors(), 2);
        assert_eq!(
            monitor.reports.lock().unwrap()[0],
            "prices: observer exploded"
        );
    }

    #[tokio::test]
    async fn undecodable_payload_is_counted_as_error() {
        let proxy = MeshChannelProxy::<Quote>::input("prices");
        let observer = Arc::new(CollectingObserver::default());
        proxy.subscribe(observer.clone());

        proxy.on_next(&MeshMessage::new("not json")).await;

        assert!(observer.values.lock().unwrap().is_empty());
        assert_eq!(proxy.metrics().received(), 0);
        assert_eq!(proxy.metrics().errors(), 1);
    }

    #[tokio::test]
    async fn on_post_builds_message_and_invokes_publisher() {
        let proxy = MeshChannelProxy::<Quote>::output("updates");
        let publisher = Arc::new(RecordingPublisher::default());
        crate::channel::RouteRegister::attach_publisher(proxy.as_ref(), publisher.clone());

        proxy.on_post(&Quote { v: 7 }, None).await.unwrap();
        proxy
            .on_post(&Quote { v: 8 }, Some("tcp://c:3"))
            .await
            .unwrap();

        let posts = publisher.posts.lock().unwrap();
        assert_eq!(posts.len(), 2);
        let (channel, first) = &posts[0];
        assert_eq!(channel, "updates");
        assert_eq!(first.graph_id, DEFAULT_GRAPH_ID);
        assert_eq!(first.payload, "{\"v\":7}");
        assert!(first.routes.is_none());
        assert_eq!(posts[1].1.routes, Some(vec!["tcp://c:3".to_string()]));
        assert_ne!(first.transaction_id, posts[1].1.transaction_id);
        assert_eq!(proxy.metrics().sent(), 2);
    }

    #[tokio::test]
    async fn unencodable_payload_is_reported_and_not_counted_as_sent() {
        let proxy = MeshChannelProxy::<HashMap<(u32, u32), u32>>::output("updates");
        let monitor = Arc::new(CountingMonitor::default());
        proxy.register_monitor(monitor.clone());
        let publisher = Arc::new(RecordingPublisher::default());
        crate::channel::RouteRegister::attach_publisher(proxy.as_ref(), publisher.clone());

        let result = proxy.on_post(&HashMap::from([((1, 2), 3)]), None).await;

        assert!(matches!(result, Err(MeshError::Serialization(_))));
        assert_eq!(proxy.metrics().sent(), 0);
        assert_eq!(proxy.metrics().errors(), 1);
        assert_eq!(monitor.reports.lock().unwrap().len(), 1);
        assert!(monitor.reports.lock().unwrap()[0].starts_with("updates: "));
        assert!(publisher.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn queue_completion_detaches_subscribed_proxy() {
        let inputs = InputChannels::new(8);
        let proxy = MeshChannelProxy::<Quote>::input("prices");
        let observer = Arc::new(CollectingObserver::default());
        proxy.subscribe(observer.clone());
        proxy.register_dependencies(Some(&inputs), None);
        let queue = inputs.get("prices").unwrap();
        assert!(proxy.is_subscribed_to_input());

        queue.complete().await;
        queue.add(MeshMessage::new("{\"v\":1}")).await;

        assert!(!proxy.is_subscribed_to_input());
        assert_eq!(queue.observer_count(), 0);
        assert!(observer.values.lock().unwrap().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn tracing_monitor_logs_reported_errors() {
        let proxy = MeshChannelProxy::<Quote>::input("prices");
        proxy.register_monitor(Arc::new(TracingMonitor));

        proxy.on_next(&MeshMessage::new("not json")).await;

        assert_eq!(proxy.metrics().errors(), 1);
        assert!(logs_contain("proxy_error_reported"));
        assert!(logs_contain("prices"));
    }

    #[tokio::test]
    async fn on_post_without_output_alias_fails() {
        let proxy = MeshChannelProxy::<Quote>::input("prices");

        let result = proxy.on_post(&Quote { v: 1 }, None).await;

        assert_eq!(result, Err(MeshError::MissingOutputAlias));
        assert_eq!(proxy.metrics().sent(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_detaches_from_input_queue_once() {
        let inputs = InputChannels::new(8);
        let proxy = MeshChannelProxy::<Quote>::input("prices");
        proxy.register_dependencies(Some(&inputs), None);
        let queue = inputs.get("prices").unwrap();

        proxy.unsubscribe();
        proxy.unsubscribe();
        queue.add(MeshMessage::new("{\"v\":1}")).await;

        assert_eq!(queue.observer_count(), 0);
        assert_eq!(proxy.metrics().received(), 0);
    }

    #[test]
    fn on_connect_callback_receives_address() {
        let proxy = MeshChannelProxy::<Quote>::output("updates");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        proxy.set_on_connect(move |address| {
            assert_eq!(address, "tcp://a:1");
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        OutputEndpoint::on_connect(proxy.as_ref(), "tcp://a:1");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(OutputEndpoint::alias(proxy.as_ref()), "updates");
    }
}
