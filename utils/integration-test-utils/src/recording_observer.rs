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

use async_trait::async_trait;
use mesh_router::channel::PayloadObserver;
use mesh_router::ObserverError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_condvar::Condvar;

/// Payload observer that stores every value it is handed.
///
/// A failing observer still records the value before reporting an error, so tests can
/// check that a broken subscriber does not stop delivery to its neighbours.
pub struct RecordingPayloadObserver<T> {
    values: Mutex<Vec<T>>,
    condvar: Condvar,
    fail: bool,
}

impl<T: Clone + Send + Sync + 'static> RecordingPayloadObserver<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(Vec::new()),
            condvar: Condvar::new(),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(Vec::new()),
            condvar: Condvar::new(),
            fail: true,
        })
    }

    pub async fn values(&self) -> Vec<T> {
        self.values.lock().await.clone()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PayloadObserver<T> for RecordingPayloadObserver<T> {
    async fn on_next(&self, value: T) -> Result<(), ObserverError> {
        let mut values = self.values.lock().await;
        values.push(value);
        self.condvar.notify_all();
        drop(values);
        if self.fail {
            return Err("recording observer configured to fail".into());
        }
        Ok(())
    }
}

/// Waits until `observer` holds at least `count` values. Returns `false` on timeout.
pub async fn wait_for_count<T>(
    observer: &RecordingPayloadObserver<T>,
    count: usize,
    timeout: Duration,
) -> bool {
    tokio::time::timeout(timeout, async {
        let mut values = observer.values.lock().await;
        while values.len() < count {
            values = observer.condvar.wait(values).await;
        }
    })
    .await
    .is_ok()
}
