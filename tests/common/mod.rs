// Common test utilities for reconciliation tests

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use registrar::config::RegistrarConfig;
use registrar::errors::{ResolveError, ZoneError};
use registrar::ingress::OwnershipIndex;
use registrar::record::{ChangeAction, CnameChange, CnameRecord};
use registrar::registrar::Registrar;
use registrar::resolver::CnameResolver;
use registrar::zone::DnsZone;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// In-memory zone that applies changes to a map and records every call.
pub struct MockZone {
    domain: String,
    nameservers: Vec<String>,
    data: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<(ChangeAction, Vec<CnameRecord>)>>,
}

impl MockZone {
    pub fn new(domain: &str) -> Arc<Self> {
        Arc::new(Self {
            domain: domain.to_string(),
            nameservers: Vec::new(),
            data: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every mutator call in order, with its records.
    pub fn calls(&self) -> Vec<(ChangeAction, Vec<CnameRecord>)> {
        self.calls.lock().unwrap().clone()
    }

    /// The current zone contents as hostname -> target.
    pub fn data(&self) -> HashMap<String, String> {
        self.data.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsZone for MockZone {
    async fn upsert_cnames(&self, records: &[CnameRecord]) -> Result<(), ZoneError> {
        self.calls
            .lock()
            .unwrap()
            .push((ChangeAction::Upsert, records.to_vec()));
        let mut data = self.data.lock().unwrap();
        for record in records {
            data.insert(record.hostname.clone(), record.target.clone());
        }
        Ok(())
    }

    async fn delete_cnames(&self, records: &[CnameRecord]) -> Result<(), ZoneError> {
        self.calls
            .lock()
            .unwrap()
            .push((ChangeAction::Delete, records.to_vec()));
        let mut data = self.data.lock().unwrap();
        for record in records {
            data.remove(&record.hostname);
        }
        Ok(())
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn list_nameservers(&self) -> &[String] {
        &self.nameservers
    }
}

/// Resolver answering from a fixed map; unknown names are empty answers.
pub struct MockResolver {
    answers: Mutex<HashMap<String, String>>,
}

impl MockResolver {
    /// A resolver that answers every query with an empty answer.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(HashMap::new()),
        })
    }

    /// Record an answer for a hostname (normalized, no trailing dot).
    pub fn answer(&self, hostname: &str, target: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(hostname.to_string(), target.to_string());
    }

    /// Forget an answer.
    pub fn clear(&self, hostname: &str) {
        self.answers.lock().unwrap().remove(hostname);
    }
}

#[async_trait]
impl CnameResolver for MockResolver {
    async fn resolve_cname(
        &self,
        fqdn: &str,
        _nameservers: &[String],
    ) -> Result<String, ResolveError> {
        self.answers
            .lock()
            .unwrap()
            .get(fqdn.trim_matches('.'))
            .cloned()
            .ok_or(ResolveError::EmptyAnswer)
    }
}

/// Build an ingress fixture with the given labels and rule hosts.
pub fn test_ingress(name: &str, labels: &[(&str, &str)], hosts: &[&str]) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(
                hosts
                    .iter()
                    .map(|h| IngressRule {
                        host: Some((*h).to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        status: None,
    }
}

/// Standard test configuration: label `tier`, targets `public`/`private`.
pub fn test_config() -> RegistrarConfig {
    RegistrarConfig {
        target_label_name: "tier".to_string(),
        targets: vec!["public".to_string(), "private".to_string()],
        route53_zone_id: "Z123".to_string(),
        resync_period: Duration::from_secs(900),
        dry_run: false,
    }
}

/// Build a registrar wired to the given mocks.
pub fn build_registrar(
    zone: Arc<MockZone>,
    resolver: Arc<MockResolver>,
    ownership: Arc<OwnershipIndex>,
) -> (Arc<Registrar>, mpsc::Receiver<CnameChange>) {
    Registrar::with_config(&test_config(), zone, resolver, ownership)
        .expect("test configuration is valid")
}

/// Run the reconciler loop long enough to drain the queue, then stop it.
pub async fn drain_queue(registrar: Arc<Registrar>, queue_rx: mpsc::Receiver<CnameChange>) {
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(registrar.process_update_queue(queue_rx, stop_rx));
    tokio::time::sleep(Duration::from_millis(500)).await;
    stop_tx.send(true).expect("reconciler is listening");
    handle.await.expect("reconciler loop completes");
}
