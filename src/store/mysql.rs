use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;
use tracing::warn;

use super::{
    AttendanceStore, RegularizationFilter, StoreError, StoreResult, Submission, retry_on_deadlock,
};
use crate::model::attendance::{
    AttendanceOverride, AttendanceRecord, AttendanceStatus, CheckIn, CheckOut, GeoPoint,
};
use crate::model::employee::Employee;
use crate::model::regularization::{
    Approval, AttendanceRegularization, MissingAttendance, NewRegularization, Rejection,
    RegularizationStatus,
};
use crate::model::role::Role;
use crate::model::settings::{CompanySettings, parse_work_days};
use crate::model::shift::{AssignedShift, EmployeeShiftAssignment, Shift};
use crate::service::access::{AccessScope, Permission, Principal, Scope};

const EMPLOYEE_COLUMNS: &str =
    "id, employee_code, first_name, last_name, organization_id, manager_id, status";

const ATTENDANCE_COLUMNS: &str = r#"
    a.id, a.employee_id, a.date, a.check_in, a.check_out, a.status, a.total_hours,
    a.late_minutes, a.overtime_minutes, a.is_wfh, a.shift_id,
    a.check_in_latitude, a.check_in_longitude, a.check_out_latitude, a.check_out_longitude
"#;

const REGULARIZATION_COLUMNS: &str = r#"
    r.id, r.employee_id, r.attendance_id, r.original_check_in, r.original_check_out,
    r.requested_check_in, r.requested_check_out, r.reason, r.status, r.approver_id,
    r.approved_at, r.rejection_reason, r.created_at
"#;

#[derive(FromRow)]
struct SettingsRow {
    organization_id: u64,
    work_start_time: NaiveTime,
    work_end_time: NaiveTime,
    grace_period_mins: u32,
    work_days: String,
    half_day_hours: Decimal,
    full_day_hours: Decimal,
    timezone: Option<String>,
}

#[derive(FromRow)]
struct AssignedShiftRow {
    assignment_id: u64,
    employee_id: u64,
    shift_id: u64,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
    assignment_active: bool,
    created_at: NaiveDateTime,
    organization_id: u64,
    name: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    grace_period_mins: u32,
    break_mins: u32,
    is_overnight: bool,
    is_default: bool,
    is_active: bool,
    deleted_at: Option<NaiveDateTime>,
}

impl From<AssignedShiftRow> for AssignedShift {
    fn from(row: AssignedShiftRow) -> Self {
        AssignedShift {
            assignment: EmployeeShiftAssignment {
                id: row.assignment_id,
                employee_id: row.employee_id,
                shift_id: row.shift_id,
                effective_from: row.effective_from,
                effective_to: row.effective_to,
                is_active: row.assignment_active,
                created_at: row.created_at,
            },
            shift: Shift {
                id: row.shift_id,
                organization_id: row.organization_id,
                name: row.name,
                start_time: row.start_time,
                end_time: row.end_time,
                grace_period_mins: row.grace_period_mins,
                break_mins: row.break_mins,
                is_overnight: row.is_overnight,
                is_default: row.is_default,
                is_active: row.is_active,
                deleted_at: row.deleted_at,
            },
        }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    employee_id: u64,
    date: NaiveDate,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    status: String,
    total_hours: Decimal,
    late_minutes: u32,
    overtime_minutes: u32,
    is_wfh: bool,
    shift_id: Option<u64>,
    check_in_latitude: Option<f64>,
    check_in_longitude: Option<f64>,
    check_out_latitude: Option<f64>,
    check_out_longitude: Option<f64>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| {
            StoreError::Corrupt(format!("attendance {} has status {:?}", row.id, row.status))
        })?;
        Ok(AttendanceRecord {
            id: row.id,
            employee_id: row.employee_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            status,
            total_hours: row.total_hours,
            late_minutes: row.late_minutes,
            overtime_minutes: row.overtime_minutes,
            is_wfh: row.is_wfh,
            shift_id: row.shift_id,
            check_in_location: GeoPoint::from_columns(row.check_in_latitude, row.check_in_longitude),
            check_out_location: GeoPoint::from_columns(
                row.check_out_latitude,
                row.check_out_longitude,
            ),
        })
    }
}

#[derive(FromRow)]
struct RegularizationRow {
    id: u64,
    employee_id: u64,
    attendance_id: u64,
    original_check_in: Option<NaiveDateTime>,
    original_check_out: Option<NaiveDateTime>,
    requested_check_in: NaiveDateTime,
    requested_check_out: NaiveDateTime,
    reason: String,
    status: String,
    approver_id: Option<u64>,
    approved_at: Option<NaiveDateTime>,
    rejection_reason: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<RegularizationRow> for AttendanceRegularization {
    type Error = StoreError;

    fn try_from(row: RegularizationRow) -> Result<Self, Self::Error> {
        let status = RegularizationStatus::from_str(&row.status).map_err(|_| {
            StoreError::Corrupt(format!(
                "regularization {} has status {:?}",
                row.id, row.status
            ))
        })?;
        Ok(AttendanceRegularization {
            id: row.id,
            employee_id: row.employee_id,
            attendance_id: row.attendance_id,
            original_check_in: row.original_check_in,
            original_check_out: row.original_check_out,
            requested_check_in: row.requested_check_in,
            requested_check_out: row.requested_check_out,
            reason: row.reason,
            status,
            approver_id: row.approver_id,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

fn records(rows: Vec<AttendanceRow>) -> StoreResult<Vec<AttendanceRecord>> {
    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

fn regularizations(rows: Vec<RegularizationRow>) -> StoreResult<Vec<AttendanceRegularization>> {
    rows.into_iter()
        .map(AttendanceRegularization::try_from)
        .collect()
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

/// MySQL-backed store; also answers role and team lookups.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    default_timezone: Tz,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool, default_timezone: Tz) -> Self {
        Self {
            pool,
            default_timezone,
        }
    }

    async fn fetch_attendance<'e, E>(executor: E, id: u64) -> StoreResult<Option<AttendanceRecord>>
    where
        E: sqlx::Executor<'e, Database = sqlx::MySql>,
    {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.id = ?");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn fetch_regularization<'e, E>(
        executor: E,
        id: u64,
    ) -> StoreResult<Option<AttendanceRegularization>>
    where
        E: sqlx::Executor<'e, Database = sqlx::MySql>,
    {
        let sql = format!(
            "SELECT {REGULARIZATION_COLUMNS} FROM attendance_regularizations r WHERE r.id = ?"
        );
        sqlx::query_as::<_, RegularizationRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(AttendanceRegularization::try_from)
            .transpose()
    }

    async fn fetch_regularization_for<'e, E>(
        executor: E,
        attendance_id: u64,
    ) -> StoreResult<Option<AttendanceRegularization>>
    where
        E: sqlx::Executor<'e, Database = sqlx::MySql>,
    {
        let sql = format!(
            "SELECT {REGULARIZATION_COLUMNS} FROM attendance_regularizations r WHERE r.attendance_id = ?"
        );
        sqlx::query_as::<_, RegularizationRow>(&sql)
            .bind(attendance_id)
            .fetch_optional(executor)
            .await?
            .map(AttendanceRegularization::try_from)
            .transpose()
    }

    // A locking read on a missing (employee, date) row takes a gap lock, and two
    // gap locks followed by inserts deadlock. Insert first and lock the existing
    // row only on a duplicate key.
    async fn check_in_once(&self, check_in: &CheckIn) -> StoreResult<AttendanceRecord> {
        let (latitude, longitude) = check_in
            .location
            .map_or((None, None), |p| (Some(p.latitude), Some(p.longitude)));
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, date, check_in, status, late_minutes, is_wfh, shift_id,
                 check_in_latitude, check_in_longitude)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(check_in.employee_id)
        .bind(check_in.date)
        .bind(check_in.check_in)
        .bind(check_in.status.as_ref())
        .bind(check_in.late_minutes)
        .bind(check_in.is_wfh)
        .bind(check_in.shift_id)
        .bind(latitude)
        .bind(longitude)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from);

        let id = match inserted {
            Ok(done) => done.last_insert_id(),
            Err(StoreError::UniqueViolation(_)) => {
                let (id, existing): (u64, Option<NaiveDateTime>) = sqlx::query_as(
                    "SELECT id, check_in FROM attendance WHERE employee_id = ? AND date = ? FOR UPDATE",
                )
                .bind(check_in.employee_id)
                .bind(check_in.date)
                .fetch_one(&mut *tx)
                .await?;

                if existing.is_some() {
                    tx.rollback().await?;
                    return Err(StoreError::UniqueViolation(format!(
                        "attendance ({}, {}) already checked in",
                        check_in.employee_id, check_in.date
                    )));
                }

                // placeholder row without a check-in
                sqlx::query(
                    r#"
                    UPDATE attendance
                    SET check_in = ?, status = ?, late_minutes = ?, is_wfh = ?, shift_id = ?,
                        check_in_latitude = ?, check_in_longitude = ?
                    WHERE id = ?
                    "#,
                )
                .bind(check_in.check_in)
                .bind(check_in.status.as_ref())
                .bind(check_in.late_minutes)
                .bind(check_in.is_wfh)
                .bind(check_in.shift_id)
                .bind(latitude)
                .bind(longitude)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            Err(e) => return Err(e),
        };

        let record = Self::fetch_attendance(&mut *tx, id)
            .await?
            .ok_or_else(|| Self::missing("attendance", id))?;
        tx.commit().await?;
        Ok(record)
    }

    /// Re-opens only a rejected request; a pending or approved one is reported back.
    async fn submit_once(&self, request: &NewRegularization) -> StoreResult<Submission> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO attendance_regularizations
                (employee_id, attendance_id, original_check_in, original_check_out,
                 requested_check_in, requested_check_out, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(request.employee_id)
        .bind(request.attendance_id)
        .bind(request.original_check_in)
        .bind(request.original_check_out)
        .bind(request.requested_check_in)
        .bind(request.requested_check_out)
        .bind(&request.reason)
        .bind(request.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from);

        match inserted {
            Ok(_) => {}
            Err(StoreError::UniqueViolation(_)) => {
                let (id, status): (u64, String) = sqlx::query_as(
                    "SELECT id, status FROM attendance_regularizations WHERE attendance_id = ? FOR UPDATE",
                )
                .bind(request.attendance_id)
                .fetch_one(&mut *tx)
                .await?;
                let status = RegularizationStatus::from_str(&status).map_err(|_| {
                    StoreError::Corrupt(format!("regularization {id} has status {status:?}"))
                })?;

                if status != RegularizationStatus::Rejected {
                    tx.rollback().await?;
                    return Ok(Submission::Blocked(status));
                }

                sqlx::query(
                    r#"
                    UPDATE attendance_regularizations
                    SET original_check_in = ?, original_check_out = ?,
                        requested_check_in = ?, requested_check_out = ?, reason = ?,
                        status = 'pending', approver_id = NULL, approved_at = NULL,
                        rejection_reason = NULL, created_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(request.original_check_in)
                .bind(request.original_check_out)
                .bind(request.requested_check_in)
                .bind(request.requested_check_out)
                .bind(&request.reason)
                .bind(request.created_at)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            Err(e) => return Err(e),
        }

        let saved = Self::fetch_regularization_for(&mut *tx, request.attendance_id)
            .await?
            .ok_or_else(|| Self::missing("regularization for attendance", request.attendance_id))?;
        tx.commit().await?;
        Ok(Submission::Saved(saved))
    }

    async fn override_once(&self, correction: &AttendanceOverride) -> StoreResult<AttendanceRecord> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, date, check_in, check_out, status, total_hours, late_minutes,
                 overtime_minutes, is_wfh, shift_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                check_in = VALUES(check_in),
                check_out = VALUES(check_out),
                status = VALUES(status),
                total_hours = VALUES(total_hours),
                late_minutes = VALUES(late_minutes),
                overtime_minutes = VALUES(overtime_minutes),
                is_wfh = VALUES(is_wfh),
                shift_id = VALUES(shift_id)
            "#,
        )
        .bind(correction.employee_id)
        .bind(correction.date)
        .bind(correction.check_in)
        .bind(correction.check_out)
        .bind(correction.status.as_ref())
        .bind(correction.total_hours)
        .bind(correction.late_minutes)
        .bind(correction.overtime_minutes)
        .bind(correction.is_wfh)
        .bind(correction.shift_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.employee_id = ? AND a.date = ?"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(correction.employee_id)
            .bind(correction.date)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        AttendanceRecord::try_from(row)
    }

    async fn create_missing_once(
        &self,
        request: &MissingAttendance,
    ) -> StoreResult<(AttendanceRecord, AttendanceRegularization)> {
        let mut tx = self.pool.begin().await?;

        let attendance_id = sqlx::query(
            "INSERT INTO attendance (employee_id, date, status) VALUES (?, ?, ?)",
        )
        .bind(request.employee_id)
        .bind(request.date)
        .bind(AttendanceStatus::Absent.as_ref())
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        let regularization_id = sqlx::query(
            r#"
            INSERT INTO attendance_regularizations
                (employee_id, attendance_id, requested_check_in, requested_check_out, reason,
                 status, created_at)
            VALUES (?, ?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(request.employee_id)
        .bind(attendance_id)
        .bind(request.requested_check_in)
        .bind(request.requested_check_out)
        .bind(&request.reason)
        .bind(request.created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        let record = Self::fetch_attendance(&mut *tx, attendance_id)
            .await?
            .ok_or_else(|| Self::missing("attendance", attendance_id))?;
        let regularization = Self::fetch_regularization(&mut *tx, regularization_id)
            .await?
            .ok_or_else(|| Self::missing("regularization", regularization_id))?;
        tx.commit().await?;
        Ok((record, regularization))
    }

    async fn approve_once(&self, approval: &Approval) -> StoreResult<Option<AttendanceRegularization>> {
        let mut tx = self.pool.begin().await?;

        let status: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM attendance_regularizations WHERE id = ? FOR UPDATE",
        )
        .bind(approval.regularization_id)
        .fetch_optional(&mut *tx)
        .await?;
        let pending = RegularizationStatus::Pending.as_ref();
        if status.as_ref().map(|(s,)| s.as_str()) != Some(pending) {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE attendance
            SET check_in = ?, check_out = ?, total_hours = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(approval.check_in)
        .bind(approval.check_out)
        .bind(approval.total_hours)
        .bind(AttendanceStatus::Present.as_ref())
        .bind(approval.attendance_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE attendance_regularizations
            SET status = 'approved', approver_id = ?, approved_at = ?
            WHERE id = ?
            "#,
        )
        .bind(approval.approver_id)
        .bind(approval.approved_at)
        .bind(approval.regularization_id)
        .execute(&mut *tx)
        .await?;

        let approved = Self::fetch_regularization(&mut *tx, approval.regularization_id).await?;
        tx.commit().await?;
        Ok(approved)
    }

    fn missing(what: &str, id: u64) -> StoreError {
        StoreError::Database(format!("{what} {id} vanished after write"))
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn employee(&self, employee_id: u64) -> StoreResult<Option<Employee>> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? AND deleted_at IS NULL");
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_employees(&self, organization_id: u64) -> StoreResult<Vec<Employee>> {
        let sql = format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS}
            FROM employees
            WHERE organization_id = ? AND status = 'active' AND deleted_at IS NULL
            ORDER BY id
            "#
        );
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn company_settings(&self, organization_id: u64) -> StoreResult<Option<CompanySettings>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT organization_id, work_start_time, work_end_time, grace_period_mins,
                   work_days, half_day_hours, full_day_hours, timezone
            FROM company_settings
            WHERE organization_id = ?
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let timezone = match row.timezone.as_deref().map(Tz::from_str) {
                Some(Ok(tz)) => tz,
                Some(Err(_)) => {
                    warn!(organization_id, timezone = ?row.timezone, "Unknown company timezone, using default");
                    self.default_timezone
                }
                None => self.default_timezone,
            };
            CompanySettings {
                organization_id: Some(row.organization_id),
                configured: true,
                work_start_time: row.work_start_time,
                work_end_time: row.work_end_time,
                grace_period_mins: row.grace_period_mins,
                work_days: parse_work_days(&row.work_days),
                half_day_hours: row.half_day_hours,
                full_day_hours: row.full_day_hours,
                timezone,
            }
        }))
    }

    async fn shift_assignments(&self, employee_id: u64) -> StoreResult<Vec<AssignedShift>> {
        let rows = sqlx::query_as::<_, AssignedShiftRow>(
            r#"
            SELECT es.id AS assignment_id, es.employee_id, es.shift_id, es.effective_from,
                   es.effective_to, es.is_active AS assignment_active, es.created_at,
                   s.organization_id, s.name, s.start_time, s.end_time, s.grace_period_mins,
                   s.break_mins, s.is_overnight, s.is_default, s.is_active, s.deleted_at
            FROM employee_shifts es
            JOIN shifts s ON s.id = es.shift_id
            WHERE es.employee_id = ? AND s.is_active = TRUE AND s.deleted_at IS NULL
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AssignedShift::from).collect())
    }

    async fn default_shift(&self, organization_id: u64) -> StoreResult<Option<Shift>> {
        Ok(sqlx::query_as::<_, Shift>(
            r#"
            SELECT id, organization_id, name, start_time, end_time, grace_period_mins,
                   break_mins, is_overnight, is_default, is_active, deleted_at
            FROM shifts
            WHERE organization_id = ? AND is_default = TRUE
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn attendance(&self, attendance_id: u64) -> StoreResult<Option<AttendanceRecord>> {
        Self::fetch_attendance(&self.pool, attendance_id).await
    }

    async fn attendance_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.employee_id = ? AND a.date = ?"
        );
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn attendance_for_employee(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            r#"
            SELECT {ATTENDANCE_COLUMNS}
            FROM attendance a
            WHERE a.employee_id = ? AND a.date BETWEEN ? AND ?
            ORDER BY a.date
            "#
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        records(rows)
    }

    async fn attendance_for_organization(
        &self,
        organization_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            r#"
            SELECT {ATTENDANCE_COLUMNS}
            FROM attendance a
            JOIN employees e ON e.id = a.employee_id
            WHERE e.organization_id = ? AND a.date BETWEEN ? AND ?
            ORDER BY a.employee_id, a.date
            "#
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(organization_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        records(rows)
    }

    async fn upsert_check_in(&self, check_in: CheckIn) -> StoreResult<AttendanceRecord> {
        let check_in = &check_in;
        retry_on_deadlock(move || self.check_in_once(check_in)).await
    }

    async fn record_check_out(
        &self,
        attendance_id: u64,
        check_out: CheckOut,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let (latitude, longitude) = check_out
            .location
            .map_or((None, None), |p| (Some(p.latitude), Some(p.longitude)));
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?, total_hours = ?, overtime_minutes = ?, status = ?,
                check_out_latitude = ?, check_out_longitude = ?
            WHERE id = ? AND check_out IS NULL
            "#,
        )
        .bind(check_out.check_out)
        .bind(check_out.total_hours)
        .bind(check_out.overtime_minutes)
        .bind(check_out.status.as_ref())
        .bind(latitude)
        .bind(longitude)
        .bind(attendance_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::fetch_attendance(&self.pool, attendance_id).await
    }

    async fn transition_status(
        &self,
        attendance_id: u64,
        from: AttendanceStatus,
        to: AttendanceStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET status = ?
            WHERE id = ? AND status = ? AND check_in IS NOT NULL AND check_out IS NULL
            "#,
        )
        .bind(to.as_ref())
        .bind(attendance_id)
        .bind(from.as_ref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn override_attendance(
        &self,
        correction: AttendanceOverride,
    ) -> StoreResult<AttendanceRecord> {
        let correction = &correction;
        retry_on_deadlock(move || self.override_once(correction)).await
    }

    async fn regularization(
        &self,
        regularization_id: u64,
    ) -> StoreResult<Option<AttendanceRegularization>> {
        Self::fetch_regularization(&self.pool, regularization_id).await
    }

    async fn list_regularizations(
        &self,
        filter: RegularizationFilter,
    ) -> StoreResult<Vec<AttendanceRegularization>> {
        // -------------------------
        // WHERE clause
        // -------------------------
        let mut where_sql = String::from(" WHERE e.organization_id = ?");
        let mut args: Vec<FilterValue> = vec![FilterValue::U64(filter.organization_id)];

        if let Some(ids) = &filter.employee_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            where_sql.push_str(&format!(" AND r.employee_id IN ({placeholders})"));
            args.extend(ids.iter().map(|id| FilterValue::U64(*id)));
        }

        if let Some(status) = filter.status {
            where_sql.push_str(" AND r.status = ?");
            args.push(FilterValue::Str(status.to_string()));
        }

        let data_sql = format!(
            r#"
            SELECT {REGULARIZATION_COLUMNS}
            FROM attendance_regularizations r
            JOIN employees e ON e.id = r.employee_id
            {where_sql}
            ORDER BY r.created_at DESC, r.id DESC
            "#
        );

        let mut data_q = sqlx::query_as::<_, RegularizationRow>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Str(s) => data_q.bind(s),
            };
        }
        let rows = data_q.fetch_all(&self.pool).await?;
        regularizations(rows)
    }

    async fn submit_regularization(&self, request: NewRegularization) -> StoreResult<Submission> {
        let request = &request;
        retry_on_deadlock(move || self.submit_once(request)).await
    }

    async fn create_missing_attendance(
        &self,
        request: MissingAttendance,
    ) -> StoreResult<(AttendanceRecord, AttendanceRegularization)> {
        let request = &request;
        retry_on_deadlock(move || self.create_missing_once(request)).await
    }

    async fn approve_regularization(
        &self,
        approval: Approval,
    ) -> StoreResult<Option<AttendanceRegularization>> {
        let approval = &approval;
        retry_on_deadlock(move || self.approve_once(approval)).await
    }

    async fn reject_regularization(
        &self,
        rejection: Rejection,
    ) -> StoreResult<Option<AttendanceRegularization>> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_regularizations
            SET status = 'rejected', approver_id = ?, approved_at = ?, rejection_reason = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(rejection.approver_id)
        .bind(rejection.rejected_at)
        .bind(&rejection.reason)
        .bind(rejection.regularization_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::fetch_regularization(&self.pool, rejection.regularization_id).await
    }
}

#[async_trait]
impl AccessScope for MySqlStore {
    async fn resolve_scope(&self, actor: &Principal) -> StoreResult<Scope> {
        let role_id: Option<u8> = sqlx::query_scalar(
            "SELECT role_id FROM users WHERE employee_id = ? ORDER BY id LIMIT 1",
        )
        .bind(actor.employee_id)
        .fetch_optional(&self.pool)
        .await?;
        if role_id.and_then(Role::from_id).is_some_and(|r| r.is_company_wide()) {
            return Ok(Scope::Company);
        }

        let reports: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM employees WHERE manager_id = ? AND deleted_at IS NULL",
        )
        .bind(actor.employee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(if reports > 0 { Scope::Team } else { Scope::Own })
    }

    async fn team_members(&self, actor_id: u64, organization_id: u64) -> StoreResult<Vec<u64>> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT id FROM employees
            WHERE manager_id = ? AND organization_id = ? AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(actor_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn has_permission(
        &self,
        actor_id: u64,
        organization_id: u64,
        permission: Permission,
    ) -> StoreResult<bool> {
        let granted: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM users u
            JOIN employees e ON e.id = u.employee_id
            JOIN role_permissions rp ON rp.role_id = u.role_id
            WHERE u.employee_id = ? AND e.organization_id = ? AND rp.permission = ?
            "#,
        )
        .bind(actor_id)
        .bind(organization_id)
        .bind(permission.as_ref())
        .fetch_one(&self.pool)
        .await?;
        Ok(granted > 0)
    }
}
