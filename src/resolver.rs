// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Live CNAME resolution against the zone's authoritative nameservers.
//!
//! The prune stage uses this as best-effort ground truth: an answer means
//! the record exists with that target, an empty answer means it
//! authoritatively does not, and a transport failure means the truth is
//! unknown. Queries fall through the nameserver list in order and stop at
//! the first server that produces an answer; there are no retries beyond
//! that.

use crate::errors::ResolveError;
use async_trait::async_trait;
use hickory_client::client::{AsyncClient, ClientHandle};
use hickory_client::rr::{DNSClass, Name, RData, RecordType};
use hickory_client::udp::UdpClientStream;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::debug;

/// Resolves the CNAME target of a fully-qualified name.
#[async_trait]
pub trait CnameResolver: Send + Sync {
    /// Query `fqdn` (trailing-dot form) for a CNAME against each of
    /// `nameservers` (`host:port`) in order.
    ///
    /// # Errors
    ///
    /// [`ResolveError::EmptyAnswer`] if the last server tried answered with
    /// zero records, a transport error otherwise.
    async fn resolve_cname(
        &self,
        fqdn: &str,
        nameservers: &[String],
    ) -> Result<String, ResolveError>;
}

/// [`CnameResolver`] backed by plain UDP DNS queries.
#[derive(Debug, Default)]
pub struct UdpCnameResolver;

impl UdpCnameResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn query_server(&self, fqdn: &str, server: &str) -> Result<String, ResolveError> {
        let exchange_err = |reason: String| ResolveError::Exchange {
            server: server.to_string(),
            reason,
        };

        // Nameservers are hostnames, not addresses; resolve via the system.
        let addr: SocketAddr = tokio::net::lookup_host(server)
            .await
            .map_err(|e| exchange_err(e.to_string()))?
            .next()
            .ok_or_else(|| exchange_err("no address found".to_string()))?;

        let stream = UdpClientStream::<tokio::net::UdpSocket>::new(addr);
        let (mut client, bg) = AsyncClient::connect(stream)
            .await
            .map_err(|e| exchange_err(e.to_string()))?;
        tokio::spawn(bg);

        let name = Name::from_str(fqdn).map_err(|e| exchange_err(e.to_string()))?;
        let response = client
            .query(name, DNSClass::IN, RecordType::CNAME)
            .await
            .map_err(|e| exchange_err(e.to_string()))?;

        response
            .answers()
            .iter()
            .find_map(|record| match record.data() {
                Some(RData::CNAME(target)) => Some(target.0.to_utf8()),
                _ => None,
            })
            .ok_or(ResolveError::EmptyAnswer)
    }
}

#[async_trait]
impl CnameResolver for UdpCnameResolver {
    async fn resolve_cname(
        &self,
        fqdn: &str,
        nameservers: &[String],
    ) -> Result<String, ResolveError> {
        let mut last_error = ResolveError::NoNameservers;
        for server in nameservers {
            match self.query_server(fqdn, server).await {
                Ok(target) => return Ok(target),
                Err(e) => {
                    debug!("querying {} on {} failed: {}", fqdn, server, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
