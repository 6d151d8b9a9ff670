// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress field extraction and the hostname ownership index.
//!
//! Only three facets of an ingress are consumed: its identity
//! (`namespace/name`), its labels, and the hostnames of its rules. The
//! [`OwnershipIndex`] answers "which live ingresses still claim hostname H?"
//! and is what keeps the prune stage from deleting records that another
//! ingress still depends on.

use crate::record::trim_dots;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// Stable identity of an ingress: `namespace/name`.
#[must_use]
pub fn ingress_id(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.namespace().unwrap_or_default(),
        ingress.name_any()
    )
}

/// Extract the hostnames an ingress exposes.
///
/// Returns the rule hosts in rule order, deduplicated to the first
/// occurrence. Rules without a host contribute nothing.
#[must_use]
pub fn hostnames(ingress: &Ingress) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();

    if let Some(spec) = &ingress.spec {
        if let Some(rules) = &spec.rules {
            for rule in rules {
                if let Some(host) = &rule.host {
                    if !host.is_empty() && !hosts.iter().any(|h| h == host) {
                        hosts.push(host.clone());
                    }
                }
            }
        }
    }

    hosts
}

/// Look up a single label value on an ingress.
#[must_use]
pub fn label_value<'a>(ingress: &'a Ingress, key: &str) -> Option<&'a str> {
    ingress.labels().get(key).map(String::as_str)
}

/// Index from hostname to the set of live ingresses claiming it.
///
/// Written only by the watcher task (before each event is delivered) and
/// read by the reconciler during prune, so a plain read/write lock is
/// sufficient. Hostnames are stored in normalized form (surrounding dots
/// stripped).
#[derive(Debug, Default)]
pub struct OwnershipIndex {
    claims: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl OwnershipIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every hostname of `ingress` as claimed by it.
    pub fn insert(&self, ingress: &Ingress) {
        let id = ingress_id(ingress);
        let mut claims = self.claims.write().unwrap_or_else(|e| e.into_inner());
        for host in hostnames(ingress) {
            claims
                .entry(trim_dots(&host).to_string())
                .or_default()
                .insert(id.clone());
        }
    }

    /// Drop every claim `ingress` holds.
    pub fn remove(&self, ingress: &Ingress) {
        let id = ingress_id(ingress);
        let mut claims = self.claims.write().unwrap_or_else(|e| e.into_inner());
        for host in hostnames(ingress) {
            let key = trim_dots(&host);
            if let Some(owners) = claims.get_mut(key) {
                owners.remove(&id);
                if owners.is_empty() {
                    claims.remove(key);
                }
            }
        }
    }

    /// Replace the claims of an ingress after a modification.
    pub fn replace(&self, old: &Ingress, new: &Ingress) {
        self.remove(old);
        self.insert(new);
    }

    /// The identities of all live ingresses claiming `hostname`, sorted.
    #[must_use]
    pub fn owners(&self, hostname: &str) -> Vec<String> {
        let claims = self.claims.read().unwrap_or_else(|e| e.into_inner());
        claims
            .get(trim_dots(hostname))
            .map(|owners| owners.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
