use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, DayStatus};
use crate::model::employee::Employee;
use crate::service::access::{Permission, Principal, Scope, Visibility};
use crate::service::attendance::month_bounds;
use crate::service::AttendanceEngine;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyReportQuery {
    /// Defaults to today in the company timezone.
    #[param(value_type = Option<String>, format = "date", example = "2026-01-05")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthQuery {
    #[param(example = 1, minimum = 1, maximum = 12)]
    pub month: u32,
    #[param(example = 2026)]
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyReportRow {
    pub employee_id: u64,
    pub employee_code: String,
    pub name: String,
    pub status: DayStatus,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    #[schema(value_type = String)]
    pub total_hours: Decimal,
    pub late_minutes: u32,
    pub overtime_minutes: u32,
    pub is_wfh: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct DailySummary {
    pub total_employees: u32,
    pub present: u32,
    pub late: u32,
    pub on_break: u32,
    pub half_day: u32,
    pub absent: u32,
    pub not_checked_in: u32,
    pub wfh: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyReport {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub rows: Vec<DailyReportRow>,
    pub summary: DailySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlySummaryRow {
    pub employee_id: u64,
    pub employee_code: String,
    pub name: String,
    /// Days worked: present, late or still on break.
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub half_days: u32,
    pub wfh_days: u32,
    pub total_late_minutes: u32,
    pub total_overtime_minutes: u32,
    #[schema(value_type = String, example = "168.50")]
    pub total_hours: Decimal,
    #[schema(value_type = String, example = "95.45")]
    pub attendance_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyReport {
    pub month: u32,
    pub year: i32,
    pub working_days: u32,
    pub rows: Vec<MonthlySummaryRow>,
}

impl DailySummary {
    fn count(&mut self, status: DayStatus, is_wfh: bool) {
        self.total_employees += 1;
        match status {
            DayStatus::Present => self.present += 1,
            DayStatus::Late => self.late += 1,
            DayStatus::OnBreak => self.on_break += 1,
            DayStatus::HalfDay => self.half_day += 1,
            DayStatus::Absent => self.absent += 1,
            DayStatus::NotCheckedIn => self.not_checked_in += 1,
        }
        if is_wfh {
            self.wfh += 1;
        }
    }
}

impl DailyReportRow {
    fn new(employee: &Employee, record: Option<&AttendanceRecord>) -> Self {
        Self {
            employee_id: employee.id,
            employee_code: employee.employee_code.clone(),
            name: employee.full_name(),
            status: DayStatus::of(record),
            check_in: record.and_then(|r| r.check_in),
            check_out: record.and_then(|r| r.check_out),
            total_hours: record.map_or(Decimal::ZERO, |r| r.total_hours),
            late_minutes: record.map_or(0, |r| r.late_minutes),
            overtime_minutes: record.map_or(0, |r| r.overtime_minutes),
            is_wfh: record.is_some_and(|r| r.is_wfh),
        }
    }
}

/// `(present + half_days / 2) / working_days * 100`, two places. Zero when
/// the month has no working days.
pub fn attendance_rate(present_days: u32, half_days: u32, working_days: u32) -> Decimal {
    if working_days == 0 {
        return Decimal::ZERO;
    }
    let attended = Decimal::from(present_days) + Decimal::from(half_days) / Decimal::TWO;
    (attended / Decimal::from(working_days) * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn monthly_row(employee: &Employee, records: &[&AttendanceRecord], working_days: u32) -> MonthlySummaryRow {
    let mut row = MonthlySummaryRow {
        employee_id: employee.id,
        employee_code: employee.employee_code.clone(),
        name: employee.full_name(),
        present_days: 0,
        late_days: 0,
        absent_days: 0,
        half_days: 0,
        wfh_days: 0,
        total_late_minutes: 0,
        total_overtime_minutes: 0,
        total_hours: Decimal::ZERO,
        attendance_rate: Decimal::ZERO,
    };
    for record in records {
        match record.status {
            AttendanceStatus::Present | AttendanceStatus::OnBreak => row.present_days += 1,
            AttendanceStatus::Late => {
                row.present_days += 1;
                row.late_days += 1;
            }
            AttendanceStatus::HalfDay => row.half_days += 1,
            AttendanceStatus::Absent => row.absent_days += 1,
        }
        if record.is_wfh {
            row.wfh_days += 1;
        }
        row.total_late_minutes += record.late_minutes;
        row.total_overtime_minutes += record.overtime_minutes;
        row.total_hours += record.total_hours;
    }
    row.attendance_rate = attendance_rate(row.present_days, row.half_days, working_days);
    row
}

impl AttendanceEngine {
    pub async fn daily_report(
        &self,
        actor: &Principal,
        query: DailyReportQuery,
        now: DateTime<Utc>,
    ) -> Result<DailyReport, AttendanceError> {
        let (org, visibility) = self.report_scope(actor).await?;
        let settings = self.settings_for(Some(org)).await?;
        let date = query
            .date
            .unwrap_or_else(|| Self::local_now(&settings, now).date());

        let employees = self.store.active_employees(org).await?;
        let records: HashMap<u64, AttendanceRecord> = self
            .store
            .attendance_for_organization(org, date, date)
            .await?
            .into_iter()
            .map(|r| (r.employee_id, r))
            .collect();

        let mut summary = DailySummary::default();
        let rows: Vec<DailyReportRow> = employees
            .iter()
            .filter(|e| visibility.includes(e.id))
            .map(|e| DailyReportRow::new(e, records.get(&e.id)))
            .inspect(|row| summary.count(row.status, row.is_wfh))
            .collect();
        debug!(organization_id = org, %date, rows = rows.len(), "Daily report built");
        Ok(DailyReport {
            date,
            rows,
            summary,
        })
    }

    pub async fn monthly_summary(
        &self,
        actor: &Principal,
        query: MonthQuery,
    ) -> Result<MonthlyReport, AttendanceError> {
        let (from, to) = month_bounds(query.month, query.year)?;
        let (org, visibility) = self.report_scope(actor).await?;
        let settings = self.settings_for(Some(org)).await?;
        let working_days = settings.working_days_in_month(query.year, query.month);

        let employees = self.store.active_employees(org).await?;
        let records = self
            .store
            .attendance_for_organization(org, from, to)
            .await?;
        let mut by_employee: HashMap<u64, Vec<&AttendanceRecord>> = HashMap::new();
        for record in &records {
            by_employee.entry(record.employee_id).or_default().push(record);
        }

        let rows = employees
            .iter()
            .filter(|e| visibility.includes(e.id))
            .map(|e| {
                let mine = by_employee.get(&e.id).map(Vec::as_slice).unwrap_or_default();
                monthly_row(e, mine, working_days)
            })
            .collect();
        Ok(MonthlyReport {
            month: query.month,
            year: query.year,
            working_days,
            rows,
        })
    }

    /// Company scope or the report permission sees the organization; team
    /// scope sees itself and its direct reports; anyone else is refused.
    async fn report_scope(&self, actor: &Principal) -> Result<(u64, Visibility), AttendanceError> {
        let org = Self::organization_of(actor)?;
        let scope = self.access.resolve_scope(actor).await?;
        if scope == Scope::Own
            && !self
                .access
                .has_permission(actor.employee_id, org, Permission::AttendanceViewReports)
                .await?
        {
            return Err(AttendanceError::unauthorized(
                "You are not allowed to view attendance reports",
            ));
        }
        let visibility = self
            .visibility(actor, Some(Permission::AttendanceViewReports))
            .await?;
        Ok((org, visibility))
    }
}
