//! Academic scheduling core: semester lifecycle, group schedules, student
//! identity and absence logging over a document store.
//!
//! Correctness-sensitive paths are the active-semester pointer
//! (`SemesterService`), the transactional schedule updates
//! (`ScheduleService`) and idempotent student resolution (`StudentService`),
//! which the legacy migration reuses.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig, GroupSeed, IdentityStrategy, MigrationLogIds};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::absence::{AbsenceLogEntry, AbsenceRecord, LegacyAbsence};
pub use model::group::{DayIndex, Group, Schedule, WeekType};
pub use model::semester::{ActivePointer, Semester, SemesterStatus};
pub use model::student::Student;
pub use service::absence_service::{
    AbsenceLogQuery, AbsenceReceipt, AbsenceRequest, AbsenceService,
};
pub use service::migration_service::MigrationService;
pub use service::schedule_service::ScheduleService;
pub use service::semester_service::SemesterService;
pub use service::student_service::StudentService;
pub use service::{ServiceError, ServiceResult};
pub use store::{
    DocumentStore, InMemoryDocumentStore, RetryPolicy, SqliteDocumentStore, StoreError,
    StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
