//! Persistence boundary of the attendance core.
//!
//! Reads are plain lookups. Each write method is one atomic unit: the MySQL
//! implementation wraps the multi-row ones in a transaction.

#[cfg(test)]
pub mod memory;
pub mod mysql;

use std::future::Future;

use async_trait::async_trait;
use chrono::NaiveDate;
use derive_more::Display;
use sqlx::error::ErrorKind;
use sqlx::mysql::MySqlDatabaseError;
use tracing::warn;

use crate::model::attendance::{
    AttendanceOverride, AttendanceRecord, AttendanceStatus, CheckIn, CheckOut,
};
use crate::model::employee::Employee;
use crate::model::regularization::{
    Approval, AttendanceRegularization, MissingAttendance, NewRegularization, Rejection,
    RegularizationStatus,
};
use crate::model::settings::CompanySettings;
use crate::model::shift::{AssignedShift, Shift};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[display(fmt = "Unique constraint violated: {}", _0)]
    UniqueViolation(String),
    /// The transaction was rolled back as a deadlock victim and may be retried.
    #[display(fmt = "Deadlock: {}", _0)]
    Deadlock(String),
    #[display(fmt = "Database error: {}", _0)]
    Database(String),
    /// A row could not be mapped onto a domain type.
    #[display(fmt = "Corrupt row: {}", _0)]
    Corrupt(String),
}

/// MySQL error number of a transaction rolled back to break a deadlock.
const ER_LOCK_DEADLOCK: u16 = 1213;

fn classify(kind: ErrorKind, mysql_number: Option<u16>, message: &str) -> Option<StoreError> {
    if matches!(kind, ErrorKind::UniqueViolation) {
        return Some(StoreError::UniqueViolation(message.to_string()));
    }
    if mysql_number == Some(ER_LOCK_DEADLOCK) {
        return Some(StoreError::Deadlock(message.to_string()));
    }
    None
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let number = db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number);
            if let Some(classified) = classify(db_err.kind(), number, db_err.message()) {
                return classified;
            }
        }
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Attempts a write gets before a deadlock is reported to the caller.
pub const DEADLOCK_ATTEMPTS: u32 = 3;

/// Re-runs a transactional write that MySQL chose as a deadlock victim.
/// The whole transaction was rolled back, so `write` must start a fresh one.
pub async fn retry_on_deadlock<T, F, Fut>(mut write: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Err(StoreError::Deadlock(message)) if attempt < DEADLOCK_ATTEMPTS => {
                warn!(attempt, error = %message, "Write rolled back by deadlock, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

/// Outcome of submitting a regularization for an attendance row.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The request was inserted, or a rejected one was re-opened in place.
    Saved(AttendanceRegularization),
    /// A pending or approved request already holds the row. It was left as is.
    Blocked(RegularizationStatus),
}

/// Which regularizations a listing may return.
#[derive(Debug, Clone, Default)]
pub struct RegularizationFilter {
    pub organization_id: u64,
    /// `None` means every employee of the organization.
    pub employee_ids: Option<Vec<u64>>,
    pub status: Option<RegularizationStatus>,
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    // ---- employees & configuration ----
    async fn employee(&self, employee_id: u64) -> StoreResult<Option<Employee>>;
    async fn active_employees(&self, organization_id: u64) -> StoreResult<Vec<Employee>>;
    async fn company_settings(
        &self,
        organization_id: u64,
    ) -> StoreResult<Option<CompanySettings>>;
    async fn shift_assignments(&self, employee_id: u64) -> StoreResult<Vec<AssignedShift>>;
    async fn default_shift(&self, organization_id: u64) -> StoreResult<Option<Shift>>;

    // ---- attendance ----
    async fn attendance(&self, attendance_id: u64) -> StoreResult<Option<AttendanceRecord>>;
    async fn attendance_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;
    async fn attendance_for_employee(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>>;
    async fn attendance_for_organization(
        &self,
        organization_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    /// Fills the (employee, date) row with a check-in, creating it if needed.
    /// Fails with `UniqueViolation` when that row already has a check-in.
    /// Two concurrent calls for the same row never both succeed.
    async fn upsert_check_in(&self, check_in: CheckIn) -> StoreResult<AttendanceRecord>;

    /// Applies a check-out to a row that has none yet.
    /// Returns `None` when the row was already checked out.
    async fn record_check_out(
        &self,
        attendance_id: u64,
        check_out: CheckOut,
    ) -> StoreResult<Option<AttendanceRecord>>;

    /// Moves an open row from `from` to `to`. Returns false when the row is
    /// no longer open or no longer in `from`.
    async fn transition_status(
        &self,
        attendance_id: u64,
        from: AttendanceStatus,
        to: AttendanceStatus,
    ) -> StoreResult<bool>;

    async fn override_attendance(
        &self,
        correction: AttendanceOverride,
    ) -> StoreResult<AttendanceRecord>;

    // ---- regularization ----
    async fn regularization(
        &self,
        regularization_id: u64,
    ) -> StoreResult<Option<AttendanceRegularization>>;
    async fn list_regularizations(
        &self,
        filter: RegularizationFilter,
    ) -> StoreResult<Vec<AttendanceRegularization>>;

    /// Inserts the request keyed by attendance id, or re-opens it when the
    /// existing one was rejected. The status check and the write are atomic.
    async fn submit_regularization(&self, request: NewRegularization) -> StoreResult<Submission>;

    /// Creates an `ABSENT` placeholder and its pending request together.
    async fn create_missing_attendance(
        &self,
        request: MissingAttendance,
    ) -> StoreResult<(AttendanceRecord, AttendanceRegularization)>;

    /// Returns `None` when the regularization was no longer pending.
    async fn approve_regularization(
        &self,
        approval: Approval,
    ) -> StoreResult<Option<AttendanceRegularization>>;

    /// Returns `None` when the regularization was no longer pending.
    async fn reject_regularization(
        &self,
        rejection: Rejection,
    ) -> StoreResult<Option<AttendanceRegularization>>;
}
