// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Registrar - Ingress CNAME Controller for Kubernetes
//!
//! Registrar is a Kubernetes controller written in Rust that keeps the CNAME
//! records of a Route 53 hosted zone in step with the hostnames exposed by
//! cluster ingresses.
//!
//! ## Overview
//!
//! For every ingress carrying the configured target label, each hostname in
//! its rules gets a CNAME pointing at the load-balancer target selected by
//! the label's value. When ingresses are modified or removed, records that
//! are no longer claimed by any live ingress are withdrawn.
//!
//! ## Modules
//!
//! - [`watcher`] - ingress watch stream with periodic resync
//! - [`registrar`] - event handler, change queue and the batch/prune/apply loop
//! - [`selector`] - label-to-target selection
//! - [`resolver`] - live CNAME resolution used by the prune stage
//! - [`zone`] / [`route53`] - the zone mutator contract and its Route 53 adapter
//! - [`ingress`] - ingress field extraction and the hostname ownership index
//!
//! ## Safety rails
//!
//! Mutations are pruned against live DNS before they reach the provider:
//! records that already match are skipped, deletions are withheld while any
//! live ingress still claims the hostname, and hostnames claimed with
//! conflicting targets are rejected outright.

pub mod config;
pub mod constants;
pub mod errors;
pub mod ingress;
pub mod metrics;
pub mod record;
pub mod registrar;
pub mod resolver;
pub mod route53;
pub mod selector;
pub mod watcher;
pub mod zone;
