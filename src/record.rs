// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Core value types for CNAME changes, plus hostname normalization helpers.
//!
//! A [`CnameChange`] is the unit that flows from the event handler through
//! the change queue to the batcher. Hostnames are compared in a single
//! normal form with surrounding dots stripped; the fully-qualified trailing
//! dot is re-added only at the DNS query boundary.

use std::fmt;

/// The action a change applies to the zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeAction {
    /// Create or overwrite a CNAME record
    Upsert,
    /// Remove a CNAME record
    Delete,
}

impl ChangeAction {
    /// Lowercase operation name, used as the `op` metrics label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single CNAME record: `hostname` aliases `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CnameRecord {
    /// The record name (left-hand side of the alias)
    pub hostname: String,
    /// The canonical name the record points at
    pub target: String,
}

impl CnameRecord {
    /// Create a record from hostname and target.
    pub fn new(hostname: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            target: target.into(),
        }
    }
}

/// A pending mutation against the zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CnameChange {
    /// Whether the record is being written or withdrawn
    pub action: ChangeAction,
    /// The record the action applies to
    pub record: CnameRecord,
}

/// Strip surrounding dots from a DNS name for comparisons.
///
/// `foo.example.com.` and `foo.example.com` compare equal after
/// normalization.
#[must_use]
pub fn trim_dots(name: &str) -> &str {
    name.trim_matches('.')
}

/// Check whether `hostname` sits exactly one label below the zone apex.
///
/// The apex is compared literally after both sides are stripped of
/// surrounding dots. The apex itself, names in other zones, and names nested
/// deeper than one label are all out of scope.
#[must_use]
pub fn in_zone_scope(hostname: &str, apex: &str) -> bool {
    let apex = trim_dots(apex);
    if apex.is_empty() {
        return false;
    }
    let hostname = trim_dots(hostname);
    let Some(prefix) = hostname.strip_suffix(apex) else {
        return false;
    };
    let Some(label) = prefix.strip_suffix('.') else {
        return false;
    };
    !label.is_empty() && !label.contains('.')
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
