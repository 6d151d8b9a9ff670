// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress watcher: a long-running watch on cluster ingresses that delivers
//! typed add/modify/delete events to a handler.
//!
//! The raw watch stream only carries the current object, so a local store
//! keeps the last known state of every ingress and the translation into
//! [`IngressEvent`] fills in the prior object: ADDED carries the new object,
//! MODIFIED carries old and new, DELETED carries the last known object.
//! Relists after a watch desync are folded into the same event vocabulary.
//!
//! Every `resync_period` the watcher re-emits MODIFIED with `old == new` for
//! each live ingress so that divergent zone state converges without any
//! durable queue. The ownership index is updated before each event is
//! delivered; the handler always observes an index consistent with the
//! event. Handler invocations are serialized.

use crate::ingress::{ingress_id, OwnershipIndex};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher;
use kube::runtime::watcher::Config;
use kube::{Api, Client};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// A typed ingress lifecycle event.
#[derive(Clone, Debug)]
pub enum IngressEvent {
    /// The ingress was created (or first seen)
    Added(Ingress),
    /// The ingress changed; `old` is the prior state. Resyncs re-emit this
    /// with `old` equal to `new`.
    Modified {
        /// The last known prior state
        old: Ingress,
        /// The current state
        new: Ingress,
    },
    /// The ingress was removed; carries the last known state
    Deleted(Ingress),
}

/// Receives ingress events from the watcher, one at a time.
///
/// Implementations must not block indefinitely; the watcher awaits each
/// invocation before processing the next event.
#[async_trait]
pub trait IngressEventHandler: Send + Sync {
    /// Handle one ingress event.
    async fn handle(&self, event: IngressEvent);
}

/// Pure translation of raw watch events into [`IngressEvent`]s.
///
/// Keeps the last known state of every ingress keyed by `namespace/name`.
/// During a relist the store is reconciled against the freshly listed set:
/// objects the relist did not mention are reported as deleted.
#[derive(Debug, Default)]
pub(crate) struct WatchState {
    store: HashMap<String, Ingress>,
    relist: Option<HashSet<String>>,
}

impl WatchState {
    /// Fold one raw watch event into the store, returning the events to
    /// deliver.
    pub(crate) fn apply(&mut self, event: watcher::Event<Ingress>) -> Vec<IngressEvent> {
        match event {
            watcher::Event::Init => {
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = &mut self.relist {
                    seen.insert(ingress_id(&obj));
                }
                self.upsert(obj)
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relist.take() else {
                    return Vec::new();
                };
                let gone: Vec<String> = self
                    .store
                    .keys()
                    .filter(|id| !seen.contains(*id))
                    .cloned()
                    .collect();
                gone.into_iter()
                    .filter_map(|id| self.store.remove(&id))
                    .map(IngressEvent::Deleted)
                    .collect()
            }
            watcher::Event::Apply(obj) => self.upsert(obj),
            watcher::Event::Delete(obj) => {
                let id = ingress_id(&obj);
                let old = self.store.remove(&id).unwrap_or(obj);
                vec![IngressEvent::Deleted(old)]
            }
        }
    }

    fn upsert(&mut self, obj: Ingress) -> Vec<IngressEvent> {
        let id = ingress_id(&obj);
        match self.store.insert(id, obj.clone()) {
            Some(old) => vec![IngressEvent::Modified { old, new: obj }],
            None => vec![IngressEvent::Added(obj)],
        }
    }

    /// Re-emit MODIFIED with `old == new` for every live ingress.
    pub(crate) fn resync(&self) -> Vec<IngressEvent> {
        self.store
            .values()
            .map(|obj| IngressEvent::Modified {
                old: obj.clone(),
                new: obj.clone(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.store.len()
    }
}

/// Watches cluster ingresses and delivers events to a handler.
pub struct IngressWatcher {
    api: Api<Ingress>,
    ownership: Arc<OwnershipIndex>,
    label_name: String,
    resync_period: Duration,
    stop: tokio::sync::watch::Receiver<bool>,
}

impl IngressWatcher {
    /// Create a watcher over all namespaces.
    ///
    /// `label_name` restricts the server-side watch to ingresses carrying
    /// that label key; this only reduces load, correctness does not depend
    /// on it. A zero `resync_period` disables the periodic resync.
    #[must_use]
    pub fn new(
        client: Client,
        ownership: Arc<OwnershipIndex>,
        label_name: String,
        resync_period: Duration,
        stop: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        Self {
            api: Api::all(client),
            ownership,
            label_name,
            resync_period,
            stop,
        }
    }

    /// Run the watch loop until the stop channel is signalled or the stream
    /// ends. In-flight events are delivered before returning.
    pub async fn run(self, handler: Arc<dyn IngressEventHandler>) {
        let config = Config::default().labels(&self.label_name);
        let mut stream = watcher(self.api.clone(), config).boxed();
        let mut state = WatchState::default();
        let mut stop = self.stop.clone();

        let resync_enabled = !self.resync_period.is_zero();
        let period = if resync_enabled {
            self.resync_period
        } else {
            Duration::from_secs(86_400)
        };
        let mut resync =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        info!(
            "starting ingress watch with label filter '{}'",
            self.label_name
        );

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = stop.changed() => break,
                _ = resync.tick(), if resync_enabled => {
                    let events = state.resync();
                    debug!("resync: re-emitting {} live ingress(es)", events.len());
                    for event in events {
                        self.deliver(event, handler.as_ref()).await;
                    }
                }
                item = stream.try_next() => match item {
                    Ok(Some(event)) => {
                        for event in state.apply(event) {
                            self.deliver(event, handler.as_ref()).await;
                        }
                    }
                    Ok(None) => {
                        info!("ingress watch stream ended");
                        break;
                    }
                    Err(e) => {
                        error!("ingress watch error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("ingress watcher stopped");
    }

    /// Update the ownership index for `event`, then hand it to the handler.
    async fn deliver(&self, event: IngressEvent, handler: &dyn IngressEventHandler) {
        match &event {
            IngressEvent::Added(new) => self.ownership.insert(new),
            IngressEvent::Modified { old, new } => self.ownership.replace(old, new),
            IngressEvent::Deleted(old) => self.ownership.remove(old),
        }
        handler.handle(event).await;
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod watcher_tests;
