//! In-process store used by the engine tests. Writes take the lock once, so
//! each one is atomic; `yield_before_writes` lets concurrent callers
//! interleave between their reads and their writes.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{AttendanceStore, RegularizationFilter, StoreError, StoreResult, Submission};
use crate::model::attendance::{
    AttendanceOverride, AttendanceRecord, AttendanceStatus, CheckIn, CheckOut,
};
use crate::model::employee::Employee;
use crate::model::regularization::{
    Approval, AttendanceRegularization, MissingAttendance, NewRegularization, Rejection,
    RegularizationStatus,
};
use crate::model::settings::CompanySettings;
use crate::model::shift::{AssignedShift, EmployeeShiftAssignment, Shift, hm};
use crate::service::access::{AccessScope, Permission, Principal, Scope};
use crate::service::time_math::total_hours;

#[derive(Default)]
struct State {
    employees: BTreeMap<u64, Employee>,
    settings: HashMap<u64, CompanySettings>,
    shifts: BTreeMap<u64, Shift>,
    assignments: Vec<EmployeeShiftAssignment>,
    attendance: BTreeMap<u64, AttendanceRecord>,
    regularizations: BTreeMap<u64, AttendanceRegularization>,
    scopes: HashMap<u64, Scope>,
    grants: HashSet<(u64, Permission)>,
    next_attendance_id: u64,
    next_regularization_id: u64,
}

impl State {
    fn attendance_id_on(&self, employee_id: u64, date: NaiveDate) -> Option<u64> {
        self.attendance
            .values()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .map(|r| r.id)
    }

    fn new_attendance(&mut self, employee_id: u64, date: NaiveDate) -> AttendanceRecord {
        self.next_attendance_id += 1;
        AttendanceRecord {
            id: self.next_attendance_id,
            employee_id,
            date,
            check_in: None,
            check_out: None,
            status: AttendanceStatus::Absent,
            total_hours: Decimal::ZERO,
            late_minutes: 0,
            overtime_minutes: 0,
            is_wfh: false,
            shift_id: None,
            check_in_location: None,
            check_out_location: None,
        }
    }

    fn in_organization(&self, employee_id: u64, organization_id: u64) -> bool {
        self.employees
            .get(&employee_id)
            .is_some_and(|e| e.organization_id == Some(organization_id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    yield_before_writes: AtomicBool,
    fail_regularization_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn before_write(&self) {
        if self.yield_before_writes.load(Ordering::SeqCst) {
            actix_web::rt::task::yield_now().await;
        }
    }

    fn regularization_write_allowed(&self) -> StoreResult<()> {
        if self.fail_regularization_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("regularization table unavailable".into()));
        }
        Ok(())
    }

    pub fn yield_before_writes(&self, enabled: bool) {
        self.yield_before_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_regularization_writes(&self, enabled: bool) {
        self.fail_regularization_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn add_employee(&self, id: u64, organization_id: Option<u64>, manager_id: Option<u64>) {
        self.state().employees.insert(
            id,
            Employee {
                id,
                employee_code: format!("EMP-{id:04}"),
                first_name: "Employee".into(),
                last_name: id.to_string(),
                organization_id,
                manager_id,
                status: "active".into(),
            },
        );
    }

    pub fn deactivate_employee(&self, id: u64) {
        if let Some(employee) = self.state().employees.get_mut(&id) {
            employee.status = "terminated".into();
        }
    }

    pub fn set_settings(&self, settings: CompanySettings) {
        if let Some(org) = settings.organization_id {
            self.state().settings.insert(org, settings);
        }
    }

    pub fn add_shift(&self, shift: Shift) {
        self.state().shifts.insert(shift.id, shift);
    }

    pub fn add_night_shift(&self, id: u64, organization_id: u64, start: (u32, u32), end: (u32, u32)) {
        self.add_shift(Shift {
            id,
            organization_id,
            name: "Night".into(),
            start_time: hm(start),
            end_time: hm(end),
            grace_period_mins: 15,
            break_mins: 60,
            is_overnight: true,
            is_default: false,
            is_active: true,
            deleted_at: None,
        });
    }

    pub fn assign_shift(
        &self,
        employee_id: u64,
        shift_id: u64,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) {
        let mut state = self.state();
        let id = state.assignments.len() as u64 + 1;
        let created_at = effective_from.and_time(hm((0, 0))) + chrono::Duration::seconds(id as i64);
        state.assignments.push(EmployeeShiftAssignment {
            id,
            employee_id,
            shift_id,
            effective_from,
            effective_to,
            is_active: true,
            created_at,
        });
    }

    pub fn set_scope(&self, employee_id: u64, scope: Scope) {
        self.state().scopes.insert(employee_id, scope);
    }

    pub fn grant(&self, employee_id: u64, permission: Permission) {
        self.state().grants.insert((employee_id, permission));
    }

    /// Seeds a row directly, bypassing the clock rules.
    pub fn insert_attendance(
        &self,
        employee_id: u64,
        date: NaiveDate,
        check_in: Option<NaiveDateTime>,
        check_out: Option<NaiveDateTime>,
        status: AttendanceStatus,
    ) -> AttendanceRecord {
        let mut state = self.state();
        let mut record = state.new_attendance(employee_id, date);
        record.check_in = check_in;
        record.check_out = check_out;
        record.status = status;
        if let (Some(i), Some(o)) = (check_in, check_out) {
            record.total_hours = total_hours(i, o);
        }
        state.attendance.insert(record.id, record.clone());
        record
    }

    /// Applies `edit` to a seeded row.
    pub fn edit_attendance(&self, attendance_id: u64, edit: impl FnOnce(&mut AttendanceRecord)) {
        if let Some(record) = self.state().attendance.get_mut(&attendance_id) {
            edit(record);
        }
    }

    pub fn attendance_count(&self) -> usize {
        self.state().attendance.len()
    }

    pub fn regularization_count(&self) -> usize {
        self.state().regularizations.len()
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn employee(&self, employee_id: u64) -> StoreResult<Option<Employee>> {
        Ok(self.state().employees.get(&employee_id).cloned())
    }

    async fn active_employees(&self, organization_id: u64) -> StoreResult<Vec<Employee>> {
        Ok(self
            .state()
            .employees
            .values()
            .filter(|e| e.organization_id == Some(organization_id) && e.is_active())
            .cloned()
            .collect())
    }

    async fn company_settings(&self, organization_id: u64) -> StoreResult<Option<CompanySettings>> {
        Ok(self.state().settings.get(&organization_id).cloned())
    }

    async fn shift_assignments(&self, employee_id: u64) -> StoreResult<Vec<AssignedShift>> {
        let state = self.state();
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .filter_map(|a| {
                let shift = state.shifts.get(&a.shift_id)?;
                (shift.is_active && shift.deleted_at.is_none()).then(|| AssignedShift {
                    assignment: a.clone(),
                    shift: shift.clone(),
                })
            })
            .collect())
    }

    async fn default_shift(&self, organization_id: u64) -> StoreResult<Option<Shift>> {
        Ok(self
            .state()
            .shifts
            .values()
            .rev()
            .find(|s| s.organization_id == organization_id && s.is_default)
            .cloned())
    }

    async fn attendance(&self, attendance_id: u64) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.state().attendance.get(&attendance_id).cloned())
    }

    async fn attendance_on(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let state = self.state();
        Ok(state
            .attendance_id_on(employee_id, date)
            .and_then(|id| state.attendance.get(&id).cloned()))
    }

    async fn attendance_for_employee(
        &self,
        employee_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(self
            .state()
            .attendance
            .values()
            .filter(|r| r.employee_id == employee_id && r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }

    async fn attendance_for_organization(
        &self,
        organization_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let state = self.state();
        Ok(state
            .attendance
            .values()
            .filter(|r| r.date >= from && r.date <= to)
            .filter(|r| state.in_organization(r.employee_id, organization_id))
            .cloned()
            .collect())
    }

    async fn upsert_check_in(&self, check_in: CheckIn) -> StoreResult<AttendanceRecord> {
        self.before_write().await;
        let mut state = self.state();
        let mut record = match state.attendance_id_on(check_in.employee_id, check_in.date) {
            Some(id) => state.attendance[&id].clone(),
            None => state.new_attendance(check_in.employee_id, check_in.date),
        };
        if record.check_in.is_some() {
            return Err(StoreError::UniqueViolation(format!(
                "attendance ({}, {})",
                check_in.employee_id, check_in.date
            )));
        }
        record.check_in = Some(check_in.check_in);
        record.status = check_in.status;
        record.late_minutes = check_in.late_minutes;
        record.is_wfh = check_in.is_wfh;
        record.shift_id = check_in.shift_id;
        record.check_in_location = check_in.location;
        state.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn record_check_out(
        &self,
        attendance_id: u64,
        check_out: CheckOut,
    ) -> StoreResult<Option<AttendanceRecord>> {
        self.before_write().await;
        let mut state = self.state();
        let Some(record) = state.attendance.get_mut(&attendance_id) else {
            return Ok(None);
        };
        if record.check_out.is_some() {
            return Ok(None);
        }
        record.check_out = Some(check_out.check_out);
        record.total_hours = check_out.total_hours;
        record.overtime_minutes = check_out.overtime_minutes;
        record.status = check_out.status;
        record.check_out_location = check_out.location;
        Ok(Some(record.clone()))
    }

    async fn transition_status(
        &self,
        attendance_id: u64,
        from: AttendanceStatus,
        to: AttendanceStatus,
    ) -> StoreResult<bool> {
        self.before_write().await;
        let mut state = self.state();
        match state.attendance.get_mut(&attendance_id) {
            Some(record) if record.is_open() && record.status == from => {
                record.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn override_attendance(
        &self,
        correction: AttendanceOverride,
    ) -> StoreResult<AttendanceRecord> {
        self.before_write().await;
        let mut state = self.state();
        let mut record = match state.attendance_id_on(correction.employee_id, correction.date) {
            Some(id) => state.attendance[&id].clone(),
            None => state.new_attendance(correction.employee_id, correction.date),
        };
        record.check_in = Some(correction.check_in);
        record.check_out = correction.check_out;
        record.status = correction.status;
        record.total_hours = correction.total_hours;
        record.late_minutes = correction.late_minutes;
        record.overtime_minutes = correction.overtime_minutes;
        record.is_wfh = correction.is_wfh;
        record.shift_id = correction.shift_id;
        state.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn regularization(
        &self,
        regularization_id: u64,
    ) -> StoreResult<Option<AttendanceRegularization>> {
        Ok(self.state().regularizations.get(&regularization_id).cloned())
    }

    async fn list_regularizations(
        &self,
        filter: RegularizationFilter,
    ) -> StoreResult<Vec<AttendanceRegularization>> {
        let state = self.state();
        let mut found: Vec<_> = state
            .regularizations
            .values()
            .filter(|r| state.in_organization(r.employee_id, filter.organization_id))
            .filter(|r| {
                filter
                    .employee_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&r.employee_id))
            })
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn submit_regularization(&self, request: NewRegularization) -> StoreResult<Submission> {
        self.before_write().await;
        self.regularization_write_allowed()?;
        let mut state = self.state();
        let existing = state
            .regularizations
            .values()
            .find(|r| r.attendance_id == request.attendance_id)
            .map(|r| (r.id, r.status));
        let id = match existing {
            Some((_, status)) if status != RegularizationStatus::Rejected => {
                return Ok(Submission::Blocked(status));
            }
            Some((id, _)) => id,
            None => {
                state.next_regularization_id += 1;
                state.next_regularization_id
            }
        };
        let row = AttendanceRegularization {
            id,
            employee_id: request.employee_id,
            attendance_id: request.attendance_id,
            original_check_in: request.original_check_in,
            original_check_out: request.original_check_out,
            requested_check_in: request.requested_check_in,
            requested_check_out: request.requested_check_out,
            reason: request.reason,
            status: RegularizationStatus::Pending,
            approver_id: None,
            approved_at: None,
            rejection_reason: None,
            created_at: request.created_at,
        };
        state.regularizations.insert(id, row.clone());
        Ok(Submission::Saved(row))
    }

    async fn create_missing_attendance(
        &self,
        request: MissingAttendance,
    ) -> StoreResult<(AttendanceRecord, AttendanceRegularization)> {
        self.before_write().await;
        let mut state = self.state();
        if state.attendance_id_on(request.employee_id, request.date).is_some() {
            return Err(StoreError::UniqueViolation(format!(
                "attendance ({}, {})",
                request.employee_id, request.date
            )));
        }
        // both rows are staged before either is stored
        let record = state.new_attendance(request.employee_id, request.date);
        self.regularization_write_allowed()?;
        state.next_regularization_id += 1;
        let regularization = AttendanceRegularization {
            id: state.next_regularization_id,
            employee_id: request.employee_id,
            attendance_id: record.id,
            original_check_in: None,
            original_check_out: None,
            requested_check_in: request.requested_check_in,
            requested_check_out: request.requested_check_out,
            reason: request.reason,
            status: RegularizationStatus::Pending,
            approver_id: None,
            approved_at: None,
            rejection_reason: None,
            created_at: request.created_at,
        };
        state.attendance.insert(record.id, record.clone());
        state
            .regularizations
            .insert(regularization.id, regularization.clone());
        Ok((record, regularization))
    }

    async fn approve_regularization(
        &self,
        approval: Approval,
    ) -> StoreResult<Option<AttendanceRegularization>> {
        self.before_write().await;
        let mut state = self.state();
        let pending = state
            .regularizations
            .get(&approval.regularization_id)
            .is_some_and(|r| r.status == RegularizationStatus::Pending);
        if !pending || !state.attendance.contains_key(&approval.attendance_id) {
            return Ok(None);
        }

        if let Some(record) = state.attendance.get_mut(&approval.attendance_id) {
            record.check_in = Some(approval.check_in);
            record.check_out = Some(approval.check_out);
            record.total_hours = approval.total_hours;
            record.status = AttendanceStatus::Present;
        }
        let Some(row) = state.regularizations.get_mut(&approval.regularization_id) else {
            return Ok(None);
        };
        row.status = RegularizationStatus::Approved;
        row.approver_id = Some(approval.approver_id);
        row.approved_at = Some(approval.approved_at);
        Ok(Some(row.clone()))
    }

    async fn reject_regularization(
        &self,
        rejection: Rejection,
    ) -> StoreResult<Option<AttendanceRegularization>> {
        self.before_write().await;
        let mut state = self.state();
        match state.regularizations.get_mut(&rejection.regularization_id) {
            Some(row) if row.status == RegularizationStatus::Pending => {
                row.status = RegularizationStatus::Rejected;
                row.approver_id = Some(rejection.approver_id);
                row.approved_at = Some(rejection.rejected_at);
                row.rejection_reason = Some(rejection.reason);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl AccessScope for MemoryStore {
    async fn resolve_scope(&self, actor: &Principal) -> StoreResult<Scope> {
        let state = self.state();
        if let Some(scope) = state.scopes.get(&actor.employee_id) {
            return Ok(*scope);
        }
        let manages = state
            .employees
            .values()
            .any(|e| e.manager_id == Some(actor.employee_id));
        Ok(if manages { Scope::Team } else { Scope::Own })
    }

    async fn team_members(&self, actor_id: u64, organization_id: u64) -> StoreResult<Vec<u64>> {
        Ok(self
            .state()
            .employees
            .values()
            .filter(|e| e.manager_id == Some(actor_id) && e.organization_id == Some(organization_id))
            .map(|e| e.id)
            .collect())
    }

    async fn has_permission(
        &self,
        actor_id: u64,
        organization_id: u64,
        permission: Permission,
    ) -> StoreResult<bool> {
        let state = self.state();
        Ok(state.in_organization(actor_id, organization_id)
            && state.grants.contains(&(actor_id, permission)))
    }
}
