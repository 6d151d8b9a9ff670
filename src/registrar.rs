// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The reconciliation core: event handler, change queue, batcher and the
//! prune-then-apply loop.
//!
//! The watcher task calls [`Registrar::handle`] for every ingress event; the
//! handler translates the event into CNAME changes and enqueues them on a
//! bounded queue (sends block when it is full, providing backpressure
//! against the cluster API). A single reconciler task drains the queue into
//! action-homogeneous batches, prunes each batch against live DNS and the
//! ownership index, and hands the survivors to the zone mutator.
//!
//! Mutator failures are logged and dropped; the periodic resync re-derives
//! the desired state, so the loop is self-healing without any durable queue.

use crate::config::RegistrarConfig;
use crate::constants::{BATCH_IDLE_SLEEP_MS, UPDATE_QUEUE_CAPACITY};
use crate::errors::ConfigError;
use crate::ingress::{self, OwnershipIndex};
use crate::metrics;
use crate::record::{in_zone_scope, trim_dots, ChangeAction, CnameChange, CnameRecord};
use crate::resolver::CnameResolver;
use crate::selector::{self, SelectorAndTarget};
use crate::watcher::{IngressEvent, IngressEventHandler};
use crate::zone::DnsZone;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// The reconciliation engine tying watcher events to zone mutations.
pub struct Registrar {
    zone: Arc<dyn DnsZone>,
    resolver: Arc<dyn CnameResolver>,
    ownership: Arc<OwnershipIndex>,
    sats: Vec<SelectorAndTarget>,
    target_label: String,
    queue_tx: mpsc::Sender<CnameChange>,
    dry_run: bool,
}

impl Registrar {
    /// Build a registrar from validated configuration and its collaborators.
    ///
    /// Returns the registrar together with the receiving end of the change
    /// queue; pass the receiver to [`Registrar::process_update_queue`] on a
    /// dedicated task.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if required options are missing or the
    /// target selectors do not parse.
    pub fn with_config(
        config: &RegistrarConfig,
        zone: Arc<dyn DnsZone>,
        resolver: Arc<dyn CnameResolver>,
        ownership: Arc<OwnershipIndex>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<CnameChange>), ConfigError> {
        config.validate()?;
        let sats = selector::build_selectors(&config.target_label_name, &config.targets)?;
        let (queue_tx, queue_rx) = mpsc::channel(UPDATE_QUEUE_CAPACITY);
        Ok((
            Arc::new(Self {
                zone,
                resolver,
                ownership,
                sats,
                target_label: config.target_label_name.clone(),
                queue_tx,
                dry_run: config.dry_run,
            }),
            queue_rx,
        ))
    }

    /// The target selected for an ingress, if any.
    #[must_use]
    pub fn target_for_ingress<'a>(&'a self, ingress: &Ingress) -> Option<&'a str> {
        selector::select_target(&self.sats, ingress.labels())
    }

    async fn queue_updates(&self, action: ChangeAction, hostnames: &[String], target: &str) {
        for hostname in hostnames {
            let change = CnameChange {
                action,
                record: CnameRecord::new(hostname.clone(), target),
            };
            if self.queue_tx.send(change).await.is_err() {
                warn!("change queue closed, dropping {} for {}", action, hostname);
            }
        }
    }

    /// Drain the change queue until the stop channel signals.
    ///
    /// Changes are collected into an action-homogeneous buffer: an arrival
    /// with a different action flushes the buffer first, an idle queue
    /// flushes whatever is pending, and stop flushes before returning.
    pub async fn process_update_queue(
        self: Arc<Self>,
        mut queue_rx: mpsc::Receiver<CnameChange>,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut batch: Vec<CnameChange> = Vec::new();
        loop {
            if *stop.borrow() {
                if !batch.is_empty() {
                    self.apply_batch(std::mem::take(&mut batch)).await;
                }
                return;
            }
            match queue_rx.try_recv() {
                Ok(change) => {
                    if !batch.is_empty() && batch[0].action != change.action {
                        let full = std::mem::take(&mut batch);
                        self.apply_batch(full).await;
                    }
                    batch.push(change);
                }
                Err(TryRecvError::Empty) => {
                    if !batch.is_empty() {
                        self.apply_batch(std::mem::take(&mut batch)).await;
                    }
                    tokio::select! {
                        _ = stop.changed() => {}
                        () = tokio::time::sleep(Duration::from_millis(BATCH_IDLE_SLEEP_MS)) => {}
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    if !batch.is_empty() {
                        self.apply_batch(std::mem::take(&mut batch)).await;
                    }
                    return;
                }
            }
        }
    }

    /// Prune a homogeneous batch and hand the survivors to the mutator.
    async fn apply_batch(&self, batch: Vec<CnameChange>) {
        let action = batch[0].action;
        let records: Vec<CnameRecord> = batch.into_iter().map(|change| change.record).collect();
        let pruned = self.prune_batch(action, records).await;
        if pruned.is_empty() {
            return;
        }

        let hostnames: Vec<&str> = pruned.iter().map(|r| r.hostname.as_str()).collect();
        match action {
            ChangeAction::Delete => {
                info!("deleting {} record(s): {:?}", pruned.len(), hostnames);
                if self.dry_run {
                    info!("dry-run enabled, not deleting");
                    return;
                }
                match self.zone.delete_cnames(&pruned).await {
                    Err(e) => error!("error deleting records: {e}"),
                    Ok(()) => {
                        info!("records were deleted");
                        for record in &pruned {
                            metrics::record_update_applied(&record.hostname, "delete");
                        }
                    }
                }
            }
            ChangeAction::Upsert => {
                info!("modifying {} record(s): {:?}", pruned.len(), hostnames);
                if self.dry_run {
                    info!("dry-run enabled, not modifying");
                    return;
                }
                match self.zone.upsert_cnames(&pruned).await {
                    Err(e) => error!("error modifying records: {e}"),
                    Ok(()) => {
                        info!("records were modified");
                        for record in &pruned {
                            metrics::record_update_applied(&record.hostname, "upsert");
                        }
                    }
                }
            }
        }
    }

    /// Drop the records of a batch that must not, or need not, reach the
    /// mutator.
    ///
    /// A record survives only if it is in zone scope, live DNS disagrees
    /// with the desired state (or the truth is unknown), no live ingress
    /// still claims a hostname being deleted, and its hostname is not
    /// claimed with conflicting targets within the batch.
    async fn prune_batch(
        &self,
        action: ChangeAction,
        records: Vec<CnameRecord>,
    ) -> Vec<CnameRecord> {
        let mut pruned = Vec::new();
        for record in records {
            if !in_zone_scope(&record.hostname, self.zone.domain()) {
                metrics::record_updates_rejected(1);
                info!("cannot handle dns record {}, will ignore it", record.hostname);
                continue;
            }
            let fqdn = format!("{}.", trim_dots(&record.hostname));
            let resolved = self
                .resolver
                .resolve_cname(&fqdn, self.zone.list_nameservers())
                .await;
            match action {
                ChangeAction::Delete => {
                    let owners = self.ownership.owners(&record.hostname);
                    if !owners.is_empty() {
                        debug!(
                            "will not delete record {} because it is still claimed by: {}",
                            record.hostname,
                            owners.join(",")
                        );
                        continue;
                    }
                    match resolved {
                        Ok(_) => pruned.push(record),
                        Err(e) if e.is_empty_answer() => {
                            debug!("{} does not resolve, no-op", record.hostname);
                        }
                        Err(e) => {
                            debug!(
                                "error resolving {}: {}, will try to delete the record",
                                record.hostname, e
                            );
                            pruned.push(record);
                        }
                    }
                }
                ChangeAction::Upsert => match resolved {
                    Err(e) => {
                        debug!(
                            "error resolving {}: {}, will try to update the record",
                            record.hostname, e
                        );
                        pruned.push(record);
                    }
                    Ok(target) if trim_dots(&target) != trim_dots(&record.target) => {
                        pruned.push(record);
                    }
                    Ok(_) => debug!("{} resolves correctly, no-op", record.hostname),
                },
            }
        }
        unique_records(pruned)
    }
}

#[async_trait]
impl IngressEventHandler for Registrar {
    async fn handle(&self, event: IngressEvent) {
        match event {
            IngressEvent::Added(new) => {
                let name = new.name_any();
                debug!("received ADDED event for {name}");
                metrics::record_update_received(&name, "add");

                let hostnames = ingress::hostnames(&new);
                match self.target_for_ingress(&new) {
                    None => info!(
                        "invalid ingress target for new ingress {}: {:?}",
                        name,
                        ingress::label_value(&new, &self.target_label)
                    ),
                    Some(_) if hostnames.is_empty() => {
                        info!("could not extract hostnames from new ingress {name}");
                    }
                    Some(target) => {
                        debug!(
                            "queued update of {} record(s) for new ingress {}, pointing to {}",
                            hostnames.len(),
                            name,
                            target
                        );
                        let target = target.to_string();
                        self.queue_updates(ChangeAction::Upsert, &hostnames, &target)
                            .await;
                    }
                }
            }
            IngressEvent::Modified { old, new } => {
                let name = new.name_any();
                debug!("received MODIFIED event for {name}");
                metrics::record_update_received(&name, "modify");

                let new_hostnames = ingress::hostnames(&new);
                let old_hostnames = ingress::hostnames(&old);
                let removed_hostnames = diff_hostnames(&old_hostnames, &new_hostnames);

                if removed_hostnames.is_empty()
                    && ingress::label_value(&old, &self.target_label)
                        == ingress::label_value(&new, &self.target_label)
                {
                    debug!("no changes for ingress {name}, looks like a no-op resync");
                    return;
                }

                match self.target_for_ingress(&new) {
                    None => info!(
                        "invalid ingress target for modified ingress {}: {:?}",
                        name,
                        ingress::label_value(&new, &self.target_label)
                    ),
                    Some(_) if new_hostnames.is_empty() => {
                        info!("could not extract hostnames from modified ingress {name}");
                    }
                    Some(target) => {
                        debug!(
                            "queued update of {} record(s) for modified ingress {}, pointing to {}",
                            new_hostnames.len(),
                            name,
                            target
                        );
                        let target = target.to_string();
                        self.queue_updates(ChangeAction::Upsert, &new_hostnames, &target)
                            .await;
                    }
                }

                match self.target_for_ingress(&old) {
                    None => info!(
                        "invalid ingress target for previous ingress {}: {:?}",
                        name,
                        ingress::label_value(&old, &self.target_label)
                    ),
                    Some(_) if removed_hostnames.is_empty() => {
                        debug!("no difference in hostnames from previous ingress {name}");
                    }
                    Some(target) => {
                        debug!(
                            "queued deletion of {} record(s) for previous ingress {}",
                            removed_hostnames.len(),
                            name
                        );
                        let target = target.to_string();
                        self.queue_updates(ChangeAction::Delete, &removed_hostnames, &target)
                            .await;
                    }
                }
            }
            IngressEvent::Deleted(old) => {
                let name = old.name_any();
                debug!("received DELETED event for {name}");
                metrics::record_update_received(&name, "delete");

                let hostnames = ingress::hostnames(&old);
                match self.target_for_ingress(&old) {
                    None => info!(
                        "invalid ingress target for old ingress {}: {:?}",
                        name,
                        ingress::label_value(&old, &self.target_label)
                    ),
                    Some(_) if hostnames.is_empty() => {
                        info!("could not extract hostnames from old ingress {name}");
                    }
                    Some(target) => {
                        debug!(
                            "queued deletion of {} record(s) for old ingress {}",
                            hostnames.len(),
                            name
                        );
                        let target = target.to_string();
                        self.queue_updates(ChangeAction::Delete, &hostnames, &target)
                            .await;
                    }
                }
            }
        }
    }
}

/// Order-preserving set difference: elements of `old` absent from `new`.
fn diff_hostnames(old: &[String], new: &[String]) -> Vec<String> {
    old.iter()
        .filter(|hostname| !new.contains(hostname))
        .cloned()
        .collect()
}

/// Deduplicate a pruned batch by hostname.
///
/// A hostname appearing more than once survives as a single record only if
/// every occurrence agrees on the target; conflicting occurrences are all
/// dropped and counted as rejected. Order of the survivors is preserved.
fn unique_records(records: Vec<CnameRecord>) -> Vec<CnameRecord> {
    let mut unique: Vec<CnameRecord> = Vec::new();
    let mut rejected_hostnames: Vec<String> = Vec::new();
    let mut rejected_count: u64 = 0;

    for record in &records {
        if rejected_hostnames.contains(&record.hostname)
            || unique.iter().any(|u| u.hostname == record.hostname)
        {
            continue;
        }
        let conflicting = records
            .iter()
            .any(|other| other.hostname == record.hostname && other.target != record.target);
        if conflicting {
            rejected_count += records
                .iter()
                .filter(|other| other.hostname == record.hostname)
                .count() as u64;
            rejected_hostnames.push(record.hostname.clone());
        } else {
            unique.push(record.clone());
        }
    }

    if !rejected_hostnames.is_empty() {
        metrics::record_updates_rejected(rejected_count);
        info!(
            "refusing to modify the following records: [{}]: they are claimed by multiple ingresses but are pointing to different targets",
            rejected_hostnames.join(", ")
        );
    }
    unique
}

#[cfg(test)]
#[path = "registrar_tests.rs"]
mod registrar_tests;
