// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The zone mutator contract.
//!
//! Everything the reconciler needs from the authoritative zone: batched
//! CNAME mutations plus the zone apex and nameserver list used by the prune
//! stage. Every batch handed to a mutator is action-homogeneous, belongs to
//! this zone, and is deduplicated by hostname. Both mutations are
//! at-least-once and idempotent; deleting an absent record is not an error.

use crate::errors::ZoneError;
use crate::record::CnameRecord;
use async_trait::async_trait;

/// An authoritative DNS zone that accepts batched CNAME mutations.
#[async_trait]
pub trait DnsZone: Send + Sync {
    /// Create or overwrite the given CNAME records.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError`] if the provider rejects the batch; the batch is
    /// treated as all-or-nothing by the caller.
    async fn upsert_cnames(&self, records: &[CnameRecord]) -> Result<(), ZoneError>;

    /// Remove the given CNAME records.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError`] if the provider rejects the batch.
    async fn delete_cnames(&self, records: &[CnameRecord]) -> Result<(), ZoneError>;

    /// The zone apex in trailing-dot form, e.g. `example.com.`.
    fn domain(&self) -> &str;

    /// The zone's authoritative nameservers as `host:port` endpoints.
    fn list_nameservers(&self) -> &[String];
}
