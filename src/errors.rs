// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for configuration, DNS resolution and zone mutation.
//!
//! Only [`ConfigError`] is fatal; it surfaces from startup and aborts the
//! process. Resolution and zone errors are absorbed by the reconciliation
//! loop, which is self-healing via the periodic resync.

use thiserror::Error;

/// Errors raised while loading or validating the registrar configuration.
///
/// All of these are fatal at startup.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// A required option was not provided
    #[error("missing required registrar option: {name}")]
    MissingOption {
        /// Name of the missing option
        name: &'static str,
    },

    /// The target label name or one of the target values does not form a
    /// valid Kubernetes label selector
    #[error("invalid target selector '{key}={value}': {reason}")]
    InvalidSelector {
        /// The label key of the selector
        key: String,
        /// The label value of the selector
        value: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// An option was provided but could not be parsed
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Name of the offending option
        name: &'static str,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors returned by the CNAME resolver client.
///
/// The reconciler distinguishes an authoritative empty answer (ground truth:
/// the record does not exist) from transport-level failures (truth unknown).
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Every queried nameserver answered authoritatively with zero records
    #[error("DNS nameserver returned an empty answer")]
    EmptyAnswer,

    /// The DNS exchange with a nameserver failed at the transport level
    #[error("DNS exchange with {server} failed: {reason}")]
    Exchange {
        /// The nameserver endpoint that failed
        server: String,
        /// Reason for the failure
        reason: String,
    },

    /// The nameserver list was empty, nothing could be queried
    #[error("no nameservers available to query")]
    NoNameservers,
}

impl ResolveError {
    /// Returns true if this error is an authoritative "no such record".
    ///
    /// An empty answer is ground truth; every other variant means the state
    /// of the zone is unknown and mutations should be attempted anyway.
    #[must_use]
    pub fn is_empty_answer(&self) -> bool {
        matches!(self, Self::EmptyAnswer)
    }
}

/// Errors returned by the zone mutator.
#[derive(Error, Debug)]
pub enum ZoneError {
    /// The hosted zone could not be looked up at bootstrap
    #[error("failed to look up hosted zone '{zone_id}': {reason}")]
    ZoneLookupFailed {
        /// The opaque provider zone identifier
        zone_id: String,
        /// Reason for the failure
        reason: String,
    },

    /// The hosted zone lookup succeeded but the response was incomplete
    #[error("hosted zone '{zone_id}' is missing {what} in the provider response")]
    ZoneIncomplete {
        /// The opaque provider zone identifier
        zone_id: String,
        /// The missing piece (e.g. "a delegation set")
        what: &'static str,
    },

    /// The provider rejected or failed a change batch
    #[error("change batch of {count} record(s) failed: {reason}")]
    ChangeFailed {
        /// Number of records in the failed batch
        count: usize,
        /// Reason reported by the provider
        reason: String,
    },
}
