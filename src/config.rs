// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registrar configuration, loaded from environment variables.
//!
//! Respects the `REGISTRAR_*` variables documented on each field. Required
//! options without a value fail validation and abort startup.

use crate::constants::DEFAULT_RESYNC_PERIOD_SECS;
use crate::errors::ConfigError;
use std::time::Duration;

/// Environment variable naming the label key used to select a target.
pub const ENV_TARGET_LABEL_NAME: &str = "REGISTRAR_TARGET_LABEL_NAME";

/// Environment variable holding the ordered, comma-separated target list.
pub const ENV_TARGETS: &str = "REGISTRAR_TARGETS";

/// Environment variable holding the hosted zone identifier.
pub const ENV_ROUTE53_ZONE_ID: &str = "REGISTRAR_ROUTE53_ZONE_ID";

/// Environment variable overriding the resync period, in seconds.
pub const ENV_RESYNC_PERIOD_SECONDS: &str = "REGISTRAR_RESYNC_PERIOD_SECONDS";

/// Environment variable enabling dry-run mode.
pub const ENV_DRY_RUN: &str = "REGISTRAR_DRY_RUN";

/// Runtime configuration of the registrar.
#[derive(Clone, Debug)]
pub struct RegistrarConfig {
    /// Label key whose value selects the target (required)
    pub target_label_name: String,
    /// Ordered candidate target hostnames; each is also the expected label
    /// value (required, at least one)
    pub targets: Vec<String>,
    /// Hosted zone identifier for the mutator (required)
    pub route53_zone_id: String,
    /// Period of the watcher's full resync
    pub resync_period: Duration,
    /// When true, prune still runs but the mutator is never called
    pub dry_run: bool,
}

impl RegistrarConfig {
    /// Load the configuration from `REGISTRAR_*` environment variables.
    ///
    /// A missing or zero resync period falls back to the default; missing
    /// required options are rejected by validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on unparsable or missing options.
    pub fn from_env() -> Result<Self, ConfigError> {
        let target_label_name = std::env::var(ENV_TARGET_LABEL_NAME).unwrap_or_default();
        let targets: Vec<String> = std::env::var(ENV_TARGETS)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        let route53_zone_id = std::env::var(ENV_ROUTE53_ZONE_ID).unwrap_or_default();

        let resync_secs = match std::env::var(ENV_RESYNC_PERIOD_SECONDS) {
            Err(_) => DEFAULT_RESYNC_PERIOD_SECS,
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: ENV_RESYNC_PERIOD_SECONDS,
                    reason: format!("'{raw}' is not a number of seconds"),
                })?;
                if secs == 0 {
                    DEFAULT_RESYNC_PERIOD_SECS
                } else {
                    secs
                }
            }
        };

        let dry_run = match std::env::var(ENV_DRY_RUN) {
            Err(_) => false,
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: ENV_DRY_RUN,
                reason: format!("'{raw}' is not a boolean"),
            })?,
        };

        let config = Self {
            target_label_name,
            targets,
            route53_zone_id,
            resync_period: Duration::from_secs(resync_secs),
            dry_run,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every required option is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingOption`] naming the first missing
    /// option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_label_name.is_empty() {
            return Err(ConfigError::MissingOption {
                name: ENV_TARGET_LABEL_NAME,
            });
        }
        if self.targets.is_empty() {
            return Err(ConfigError::MissingOption { name: ENV_TARGETS });
        }
        if self.route53_zone_id.is_empty() {
            return Err(ConfigError::MissingOption {
                name: ENV_ROUTE53_ZONE_ID,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
