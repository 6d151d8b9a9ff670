// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Route 53 implementation of the zone mutator.
//!
//! The hosted zone's apex and delegation-set nameservers are discovered once
//! at bootstrap via `GetHostedZone`; each batch of changes becomes a single
//! `ChangeResourceRecordSets` call.

use crate::constants::{DEFAULT_CNAME_TTL_SECS, DNS_PORT};
use crate::errors::ZoneError;
use crate::record::CnameRecord;
use crate::zone::DnsZone;
use async_trait::async_trait;
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53Action, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client;
use tracing::{debug, info};

/// A Route 53 hosted zone accepting batched CNAME mutations.
pub struct Route53Zone {
    client: Client,
    zone_id: String,
    apex: String,
    nameservers: Vec<String>,
}

impl Route53Zone {
    /// Look up the hosted zone and build a mutator for it.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::ZoneLookupFailed`] if the provider call fails
    /// and [`ZoneError::ZoneIncomplete`] if the response carries no zone
    /// name or delegation set.
    pub async fn discover(client: Client, zone_id: &str) -> Result<Self, ZoneError> {
        let output = client
            .get_hosted_zone()
            .id(zone_id)
            .send()
            .await
            .map_err(|e| ZoneError::ZoneLookupFailed {
                zone_id: zone_id.to_string(),
                reason: e.to_string(),
            })?;

        let apex = output
            .hosted_zone()
            .map(|zone| zone.name().to_string())
            .ok_or(ZoneError::ZoneIncomplete {
                zone_id: zone_id.to_string(),
                what: "a hosted zone",
            })?;

        let nameservers: Vec<String> = output
            .delegation_set()
            .map(|ds| {
                ds.name_servers()
                    .iter()
                    .map(|ns| format!("{ns}:{DNS_PORT}"))
                    .collect()
            })
            .ok_or(ZoneError::ZoneIncomplete {
                zone_id: zone_id.to_string(),
                what: "a delegation set",
            })?;

        info!(
            "discovered hosted zone {} ({}) with {} nameserver(s)",
            apex,
            zone_id,
            nameservers.len()
        );

        Ok(Self {
            client,
            zone_id: zone_id.to_string(),
            apex,
            nameservers,
        })
    }

    async fn change(
        &self,
        action: Route53Action,
        records: &[CnameRecord],
    ) -> Result<(), ZoneError> {
        let failed = |reason: String| ZoneError::ChangeFailed {
            count: records.len(),
            reason,
        };

        let mut changes = Vec::with_capacity(records.len());
        for record in records {
            let value = ResourceRecord::builder()
                .value(&record.target)
                .build()
                .map_err(|e| failed(e.to_string()))?;
            let record_set = ResourceRecordSet::builder()
                .name(&record.hostname)
                .r#type(RrType::Cname)
                .ttl(DEFAULT_CNAME_TTL_SECS)
                .resource_records(value)
                .build()
                .map_err(|e| failed(e.to_string()))?;
            let change = Change::builder()
                .action(action.clone())
                .resource_record_set(record_set)
                .build()
                .map_err(|e| failed(e.to_string()))?;
            changes.push(change);
        }

        let batch = ChangeBatch::builder()
            .set_changes(Some(changes))
            .build()
            .map_err(|e| failed(e.to_string()))?;

        debug!(
            "submitting {} change batch of {} record(s) to zone {}",
            action.as_str(),
            records.len(),
            self.zone_id
        );

        self.client
            .change_resource_record_sets()
            .hosted_zone_id(&self.zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl DnsZone for Route53Zone {
    async fn upsert_cnames(&self, records: &[CnameRecord]) -> Result<(), ZoneError> {
        self.change(Route53Action::Upsert, records).await
    }

    async fn delete_cnames(&self, records: &[CnameRecord]) -> Result<(), ZoneError> {
        self.change(Route53Action::Delete, records).await
    }

    fn domain(&self) -> &str {
        &self.apex
    }

    fn list_nameservers(&self) -> &[String] {
        &self.nameservers
    }
}
