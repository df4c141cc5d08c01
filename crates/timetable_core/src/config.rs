//! Core configuration.
//!
//! # Responsibility
//! - Carry the tunables shared by services and store adapters.
//! - Load them from JSON with per-field defaults.
//!
//! # Invariants
//! - `max_transaction_attempts >= 1`.
//! - `default_group.id` and `legacy_collection` are valid path segments.

use crate::store::{CollectionPath, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_GROUP_ID: &str = "758_ITS";
pub const DEFAULT_LEGACY_COLLECTION: &str = "absences";

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config does not parse: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Group seeded under every new semester and used for migrated students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSeed {
    pub id: String,
    pub name: String,
    pub course: i64,
}

impl Default for GroupSeed {
    fn default() -> Self {
        Self {
            id: DEFAULT_GROUP_ID.to_string(),
            name: DEFAULT_GROUP_ID.to_string(),
            course: 1,
        }
    }
}

/// How `StudentService::resolve_student` finds or creates identities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStrategy {
    /// Query by `(fullName, groupId)`, create with a generated id when absent.
    /// Concurrent first-time resolutions may create duplicates.
    #[default]
    Lookup,
    /// Id derived from `(groupId, fullName)`, created inside a transaction.
    Deterministic,
}

/// Id scheme for global-log entries written by the legacy migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationLogIds {
    /// Fresh id per run; re-running duplicates every entry.
    #[default]
    Generated,
    /// `legacy_<legacy id>`, overwritten on re-run.
    FromLegacyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub max_transaction_attempts: u32,
    pub default_group: GroupSeed,
    pub legacy_collection: String,
    pub identity_strategy: IdentityStrategy,
    pub migration_log_ids: MigrationLogIds,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_transaction_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            default_group: GroupSeed::default(),
            legacy_collection: DEFAULT_LEGACY_COLLECTION.to_string(),
            identity_strategy: IdentityStrategy::default(),
            migration_log_ids: MigrationLogIds::default(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config; absent fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transaction_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_transaction_attempts must be at least 1".to_string(),
            ));
        }
        if self.default_group.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_group.name cannot be blank".to_string(),
            ));
        }
        CollectionPath::root(&self.default_group.id)
            .map_err(|err| ConfigError::Invalid(format!("default_group.id: {err}")))?;
        CollectionPath::root(&self.legacy_collection)
            .map_err(|err| ConfigError::Invalid(format!("legacy_collection: {err}")))?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_transaction_attempts)
    }
}
