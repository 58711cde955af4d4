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

//! Observer traits and the dynamic subscriber lists behind queues and proxies.

use crate::error::ObserverError;
use crate::wire_message::MeshMessage;
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Receives untyped wire messages, e.g. a channel proxy subscribed to a local queue.
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_next(&self, message: &MeshMessage);

    async fn on_completed(&self) {}
}

/// Receives typed payloads fanned out by a channel proxy.
#[async_trait]
pub trait PayloadObserver<T>: Send + Sync {
    async fn on_next(&self, value: T) -> Result<(), ObserverError>;
}

trait SubscriptionRegistry: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

struct ObserverEntries<O: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Arc<O>)>>,
}

impl<O: ?Sized + Send + Sync> SubscriptionRegistry for ObserverEntries<O> {
    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Registered observers of one queue or proxy.
///
/// Fan-out always walks a [`snapshot`](Self::snapshot), so observers may unsubscribe
/// while a delivery is in flight.
pub struct ObserverList<O: ?Sized> {
    inner: Arc<ObserverEntries<O>>,
}

impl<O: ?Sized + Send + Sync + 'static> ObserverList<O> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObserverEntries {
                next_id: AtomicU64::new(0),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn add(&self, observer: Arc<O>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));

        let registry: Weak<dyn SubscriptionRegistry> = Arc::downgrade(&self.inner) as _;
        Subscription {
            id,
            registry,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Vec<Arc<O>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O: ?Sized + Send + Sync + 'static> Default for ObserverList<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer token returned for every registered observer.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn SubscriptionRegistry>,
    disposed: AtomicBool,
}

impl Subscription {
    /// Removes the observer. Only the first call has an effect; it returns `true` when an
    /// entry was actually removed.
    pub fn unsubscribe(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.registry
            .upgrade()
            .map(|registry| registry.remove(self.id))
            .unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        !self.disposed.load(Ordering::Acquire)
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
