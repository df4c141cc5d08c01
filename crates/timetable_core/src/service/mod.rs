//! Use-case services over a `DocumentStore`.
//!
//! # Responsibility
//! - Identity resolution, semester lifecycle, schedule transactions,
//!   absence logging and the one-shot legacy migration.
//! - Map store failures onto the service error taxonomy.
//!
//! # Invariants
//! - Schedule mutations fail loudly on missing groups and exhausted retries.
//! - Archiving a previous semester is best-effort and never fails creation.
//! - Batch migration skips bad records instead of aborting.

use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod absence_service;
pub mod migration_service;
pub mod schedule_service;
pub mod semester_service;
pub mod student_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Caller input failed validation before any store call.
    InvalidInput(String),
    GroupNotFound { semester_id: String, group_id: String },
    SemesterNotFound(String),
    /// Concurrent writers kept winning until the retry budget ran out.
    Conflict { path: String, attempts: u32 },
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::GroupNotFound {
                semester_id,
                group_id,
            } => write!(f, "group `{group_id}` not found in semester `{semester_id}`"),
            Self::SemesterNotFound(id) => write!(f, "semester not found: {id}"),
            Self::Conflict { path, attempts } => write!(
                f,
                "concurrent update conflict on `{path}` after {attempts} attempts"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict { path, attempts } => Self::Conflict { path, attempts },
            other => Self::Store(other),
        }
    }
}

/// Trims `value` and rejects it when blank.
pub(crate) fn require_text(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} cannot be blank")));
    }
    Ok(trimmed.to_string())
}

/// Rejects blank `value` but returns it unchanged; identity keys match
/// stored data byte for byte.
pub(crate) fn require_key(field: &str, value: &str) -> ServiceResult<String> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} cannot be blank")));
    }
    Ok(value.to_string())
}
