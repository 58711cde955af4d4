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

//! Shared handle over the combined outcome of the three service lifecycles.

use crate::error::{MeshError, MeshResult};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};

/// Completes once the discovery, listening and publish/refresh lifecycles have all
/// finished.
///
/// Resolves to the first lifecycle error (in discovery, listening, publishing order),
/// or `Ok(())` when every lifecycle ended cleanly. Clones observe the same outcome.
#[derive(Clone)]
pub struct ServiceHandle {
    outcome: Shared<BoxFuture<'static, MeshResult<()>>>,
}

impl ServiceHandle {
    pub(crate) fn join(
        discovery: JoinHandle<MeshResult<()>>,
        listening: JoinHandle<MeshResult<()>>,
        publishing: JoinHandle<MeshResult<()>>,
    ) -> Self {
        let outcome = async move {
            let (discovery, listening, publishing) =
                futures::join!(discovery, listening, publishing);
            combine([discovery, listening, publishing])
        }
        .boxed()
        .shared();
        Self { outcome }
    }

    pub(crate) fn ready(outcome: MeshResult<()>) -> Self {
        Self {
            outcome: futures::future::ready(outcome).boxed().shared(),
        }
    }

    /// Outcome, if it has already been observed by some awaiting party.
    pub fn peek(&self) -> Option<MeshResult<()>> {
        self.outcome.peek().cloned()
    }
}

impl Future for ServiceHandle {
    type Output = MeshResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx)
    }
}

fn combine<const N: usize>(results: [Result<MeshResult<()>, JoinError>; N]) -> MeshResult<()> {
    let mut first_error = None;
    for result in results {
        let outcome = result.unwrap_or_else(|err| Err(MeshError::LifecycleJoin(err.to_string())));
        if let Err(err) = outcome {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
