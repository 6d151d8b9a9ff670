// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Target selection from ingress labels.
//!
//! At startup the configured `(target_label_name, targets)` pair is expanded
//! into an ordered list of equality selectors, one per target: the selector
//! for target `T` is `target_label_name == T`. The list is immutable after
//! construction and selection walks it in order, first match wins.

use crate::errors::ConfigError;
use std::collections::BTreeMap;

/// An equality label selector paired with the target it selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorAndTarget {
    /// Label key the selector matches on
    pub key: String,
    /// Label value the selector requires
    pub value: String,
    /// Target hostname produced when the selector matches
    pub target: String,
}

/// Build the ordered selector-and-target list from configuration.
///
/// Each target becomes both the expected label value and the produced
/// target. The label key and every value are validated against Kubernetes
/// label syntax.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSelector`] if the key or any target value
/// is not valid label syntax.
pub fn build_selectors(
    label_name: &str,
    targets: &[String],
) -> Result<Vec<SelectorAndTarget>, ConfigError> {
    let mut sats = Vec::with_capacity(targets.len());
    for target in targets {
        if let Err(reason) = validate_label_key(label_name) {
            return Err(ConfigError::InvalidSelector {
                key: label_name.to_string(),
                value: target.clone(),
                reason,
            });
        }
        if let Err(reason) = validate_label_value(target) {
            return Err(ConfigError::InvalidSelector {
                key: label_name.to_string(),
                value: target.clone(),
                reason,
            });
        }
        sats.push(SelectorAndTarget {
            key: label_name.to_string(),
            value: target.clone(),
            target: target.clone(),
        });
    }
    Ok(sats)
}

/// Select the target for a set of labels.
///
/// Walks the selector list in configured order and returns the first target
/// whose selector matches. `None` means the labels select no target and the
/// caller should drop the event.
#[must_use]
pub fn select_target<'a>(
    sats: &'a [SelectorAndTarget],
    labels: &BTreeMap<String, String>,
) -> Option<&'a str> {
    sats.iter()
        .find(|sat| labels.get(&sat.key).is_some_and(|v| *v == sat.value))
        .map(|sat| sat.target.as_str())
}

/// Validate a Kubernetes label key: an optional DNS-subdomain prefix
/// followed by a name segment.
fn validate_label_key(key: &str) -> Result<(), String> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > 253 {
                return Err("prefix must be a DNS subdomain of at most 253 characters".to_string());
            }
            if !prefix.split('.').all(|part| {
                !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            }) {
                return Err(format!("invalid label key prefix '{prefix}'"));
            }
            name
        }
        None => key,
    };
    validate_label_segment(name, "key")
}

/// Validate a Kubernetes label value. Empty values are allowed.
fn validate_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    validate_label_segment(value, "value")
}

fn validate_label_segment(segment: &str, what: &str) -> Result<(), String> {
    if segment.is_empty() || segment.len() > 63 {
        return Err(format!("label {what} must be between 1 and 63 characters"));
    }
    let valid_inner = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.';
    let first = segment.chars().next().unwrap_or('-');
    let last = segment.chars().last().unwrap_or('-');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(format!(
            "label {what} must start and end with an alphanumeric character"
        ));
    }
    if !segment.chars().all(valid_inner) {
        return Err(format!(
            "label {what} may only contain alphanumerics, '-', '_' and '.'"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
