use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceOverride, AttendanceRecord, AttendanceStatus, CheckIn, CheckOut, DayStatus, GeoPoint,
};
use crate::model::settings::CompanySettings;
use crate::model::shift::ShiftView;
use crate::service::access::{Permission, Principal, Scope};
use crate::service::time_math::{late_minutes_for_shift, overtime_minutes_for_shift, total_hours};
use crate::service::AttendanceEngine;
use crate::store::StoreError;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockInRequest {
    #[schema(example = false)]
    pub is_wfh: Option<bool>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockOutRequest {
    pub location: Option<GeoPoint>,
}

/// HR correction of one employee's day.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OverrideRequest {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2026-01-05T09:00:00", value_type = String, format = "date-time")]
    pub check_in: NaiveDateTime,
    #[schema(example = "2026-01-05T18:00:00", value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub status: Option<AttendanceStatus>,
    pub is_wfh: Option<bool>,
}

/// The caller's day at a glance.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TodayView {
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: DayStatus,
    pub is_checked_in: bool,
    pub is_checked_out: bool,
    pub is_on_break: bool,
    pub shift_name: String,
    pub shift: ShiftView,
    pub attendance: Option<AttendanceRecord>,
}

/// Final status at check-out. Between the half-day and full-day thresholds
/// the working status (late or present) is kept. The half-day threshold is
/// capped at the full-day one, so a full day is never a half day.
pub fn closing_status(
    worked: Decimal,
    late_minutes: u32,
    settings: &CompanySettings,
) -> AttendanceStatus {
    let half_day = settings.half_day_hours.min(settings.full_day_hours);
    if worked < half_day {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::working(late_minutes)
    }
}

impl AttendanceEngine {
    pub async fn clock_in(
        &self,
        actor: &Principal,
        request: ClockInRequest,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);
        let today = now.date();

        if let Some(existing) = self.store.attendance_on(actor.employee_id, today).await? {
            if existing.check_in.is_some() {
                debug!(employee_id = actor.employee_id, %today, "Duplicate clock-in");
                return Err(AttendanceError::AlreadyClockedIn);
            }
        }
        if !settings.is_work_day(today) {
            return Err(AttendanceError::NonWorkDay);
        }

        let shift = self
            .resolve_shift(actor.employee_id, actor.organization_id, today)
            .await?;
        let late_minutes = late_minutes_for_shift(today, now, &shift);
        let check_in = CheckIn {
            employee_id: actor.employee_id,
            date: today,
            check_in: now,
            status: AttendanceStatus::working(late_minutes),
            late_minutes,
            is_wfh: request.is_wfh.unwrap_or(false),
            shift_id: shift.shift_id,
            location: request.location,
        };

        match self.store.upsert_check_in(check_in).await {
            Ok(record) => {
                info!(
                    employee_id = actor.employee_id,
                    attendance_id = record.id,
                    status = %record.status,
                    late_minutes,
                    "Clocked in"
                );
                Ok(record)
            }
            // lost a race against a concurrent clock-in
            Err(StoreError::UniqueViolation(_)) => Err(AttendanceError::AlreadyClockedIn),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn clock_out(
        &self,
        actor: &Principal,
        request: ClockOutRequest,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);

        let record = self.current_record(actor, now.date()).await?;
        if record.check_out.is_some() {
            return Err(AttendanceError::AlreadyClockedOut);
        }
        let Some(checked_in_at) = record.check_in else {
            return Err(AttendanceError::NotClockedIn);
        };

        let shift = self
            .resolve_shift(actor.employee_id, actor.organization_id, record.date)
            .await?;
        let worked = total_hours(checked_in_at, now);
        let overtime_minutes = overtime_minutes_for_shift(record.date, now, &shift);
        let status = closing_status(worked, record.late_minutes, &settings);

        let check_out = CheckOut {
            check_out: now,
            total_hours: worked,
            overtime_minutes,
            status,
            location: request.location,
        };
        let closed = self
            .store
            .record_check_out(record.id, check_out)
            .await?
            .ok_or(AttendanceError::AlreadyClockedOut)?;

        info!(
            employee_id = actor.employee_id,
            attendance_id = closed.id,
            status = %closed.status,
            total_hours = %closed.total_hours,
            overtime_minutes,
            "Clocked out"
        );
        Ok(closed)
    }

    pub async fn start_break(
        &self,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);

        let record = self.current_record(actor, now.date()).await?;
        if !record.is_open() {
            return Err(AttendanceError::NotClockedIn);
        }
        if record.status == AttendanceStatus::OnBreak {
            return Err(AttendanceError::AlreadyOnBreak);
        }
        self.transition(&record, AttendanceStatus::OnBreak).await
    }

    pub async fn end_break(
        &self,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);

        let record = match self.current_record(actor, now.date()).await {
            Ok(record) => record,
            Err(AttendanceError::NotClockedIn) => return Err(AttendanceError::NotOnBreak),
            Err(e) => return Err(e),
        };
        if !record.is_open() || record.status != AttendanceStatus::OnBreak {
            return Err(AttendanceError::NotOnBreak);
        }
        self.transition(&record, AttendanceStatus::working(record.late_minutes))
            .await
    }

    /// Read-only view of the caller's day. Absence of a record is not an error.
    pub async fn get_today(
        &self,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<TodayView, AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let today = Self::local_now(&settings, now).date();

        let record = self.store.attendance_on(actor.employee_id, today).await?;
        let shift = self
            .resolve_shift(actor.employee_id, actor.organization_id, today)
            .await?;
        Ok(TodayView {
            date: today,
            status: DayStatus::today(record.as_ref()),
            is_checked_in: record.as_ref().is_some_and(|r| r.check_in.is_some()),
            is_checked_out: record.as_ref().is_some_and(|r| r.check_out.is_some()),
            is_on_break: record
                .as_ref()
                .is_some_and(|r| r.status == AttendanceStatus::OnBreak),
            shift_name: shift.name.clone(),
            shift,
            attendance: record,
        })
    }

    /// The caller's own records for one month, oldest first.
    pub async fn attendance_history(
        &self,
        actor: &Principal,
        month: u32,
        year: i32,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let (from, to) = month_bounds(month, year)?;
        let mut records = self
            .store
            .attendance_for_employee(actor.employee_id, from, to)
            .await?;
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    /// HR correction: writes the given times onto the (employee, date) row,
    /// creating it when missing, and recomputes the derived fields.
    pub async fn override_attendance(
        &self,
        actor: &Principal,
        request: OverrideRequest,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let org = Self::organization_of(actor)?;
        let scope = self.access.resolve_scope(actor).await?;
        if scope != Scope::Company
            && !self
                .access
                .has_permission(actor.employee_id, org, Permission::AttendanceOverride)
                .await?
        {
            return Err(AttendanceError::unauthorized(
                "Only HR can override attendance",
            ));
        }

        let target = self
            .store
            .employee(request.employee_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Employee".into()))?;
        if target.organization_id != Some(org) {
            return Err(AttendanceError::CrossOrgAccess);
        }
        if request.check_in.date() != request.date {
            return Err(AttendanceError::validation(
                "Check-in must fall on the attendance date",
            ));
        }
        if let Some(check_out) = request.check_out {
            if check_out <= request.check_in {
                return Err(AttendanceError::validation(
                    "Check-out must be after check-in",
                ));
            }
        }

        let settings = self.settings_for(Some(org)).await?;
        let shift = self
            .resolve_shift(target.id, Some(org), request.date)
            .await?;
        let late_minutes = late_minutes_for_shift(request.date, request.check_in, &shift);
        let (worked, overtime_minutes) = match request.check_out {
            Some(out) => (
                total_hours(request.check_in, out),
                overtime_minutes_for_shift(request.date, out, &shift),
            ),
            None => (Decimal::ZERO, 0),
        };
        let status = request.status.unwrap_or(match request.check_out {
            Some(_) => closing_status(worked, late_minutes, &settings),
            None => AttendanceStatus::working(late_minutes),
        });

        let record = self
            .store
            .override_attendance(AttendanceOverride {
                employee_id: target.id,
                date: request.date,
                check_in: request.check_in,
                check_out: request.check_out,
                status,
                total_hours: worked,
                late_minutes,
                overtime_minutes,
                is_wfh: request.is_wfh.unwrap_or(false),
                shift_id: shift.shift_id,
            })
            .await?;
        info!(
            actor_id = actor.employee_id,
            employee_id = target.id,
            attendance_id = record.id,
            status = %record.status,
            "Attendance overridden"
        );
        Ok(record)
    }

    /// Today's checked-in record, or yesterday's still-open record when
    /// yesterday's shift runs past midnight.
    async fn current_record(
        &self,
        actor: &Principal,
        today: NaiveDate,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if let Some(record) = self.store.attendance_on(actor.employee_id, today).await? {
            if record.check_in.is_some() {
                return Ok(record);
            }
        }
        let Some(yesterday) = today.pred_opt() else {
            return Err(AttendanceError::NotClockedIn);
        };
        if let Some(record) = self.store.attendance_on(actor.employee_id, yesterday).await? {
            if record.is_open() {
                let shift = self
                    .resolve_shift(actor.employee_id, actor.organization_id, yesterday)
                    .await?;
                if shift.spans_midnight() {
                    return Ok(record);
                }
            }
        }
        Err(AttendanceError::NotClockedIn)
    }

    async fn transition(
        &self,
        record: &AttendanceRecord,
        to: AttendanceStatus,
    ) -> Result<AttendanceRecord, AttendanceError> {
        if !self.store.transition_status(record.id, record.status, to).await? {
            // someone else moved the row first; report from its current state
            let current = self.store.attendance(record.id).await?;
            return Err(match current {
                Some(r) if r.check_out.is_some() => AttendanceError::AlreadyClockedOut,
                Some(r) if r.status == AttendanceStatus::OnBreak => AttendanceError::AlreadyOnBreak,
                _ => AttendanceError::NotOnBreak,
            });
        }
        info!(
            employee_id = record.employee_id,
            attendance_id = record.id,
            from = %record.status,
            to = %to,
            "Attendance status changed"
        );
        Ok(AttendanceRecord {
            status: to,
            ..record.clone()
        })
    }
}

/// First and last day of a month.
pub(crate) fn month_bounds(month: u32, year: i32) -> Result<(NaiveDate, NaiveDate), AttendanceError> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AttendanceError::validation("Invalid month or year"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let to = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AttendanceError::validation("Invalid month or year"))?;
    debug_assert_eq!(to.month(), month);
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testkit::*;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveTime;
    use chrono_tz::Tz;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const EMP: u64 = 7;

    fn setup() -> (Arc<MemoryStore>, AttendanceEngine) {
        let store = Arc::new(MemoryStore::new());
        store.add_employee(EMP, Some(ORG), None);
        let engine = engine_for(&store);
        (store, engine)
    }

    // 2026-03-02 is a Monday
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        utc(2026, 3, 2, h, m)
    }

    #[actix_web::test]
    async fn late_check_in_is_marked_late() {
        let (_, engine) = setup();
        let record = engine
            .clock_in(&principal(EMP), ClockInRequest::default(), monday(9, 20))
            .await
            .unwrap();
        assert_eq!(record.late_minutes, 5);
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.date, date(2026, 3, 2));
        assert_eq!(record.check_in, Some(local(2026, 3, 2, 9, 20)));
    }

    #[actix_web::test]
    async fn on_time_check_in_records_wfh_and_location() {
        let (_, engine) = setup();
        let request = ClockInRequest {
            is_wfh: Some(true),
            location: Some(GeoPoint {
                latitude: 23.81,
                longitude: 90.41,
            }),
        };
        let record = engine
            .clock_in(&principal(EMP), request, monday(9, 15))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.late_minutes, 0);
        assert!(record.is_wfh);
        assert_eq!(record.check_in_location.map(|p| p.latitude), Some(23.81));
    }

    #[actix_web::test]
    async fn second_clock_in_fails_without_a_duplicate() {
        let (store, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 0))
            .await
            .unwrap();
        let again = engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 5))
            .await;
        assert_eq!(again, Err(AttendanceError::AlreadyClockedIn));
        assert_eq!(store.attendance_count(), 1);
    }

    #[actix_web::test]
    async fn concurrent_clock_ins_yield_exactly_one_record() {
        let (store, engine) = setup();
        store.yield_before_writes(true);
        let actor = principal(EMP);

        let (first, second) = futures::join!(
            engine.clock_in(&actor, ClockInRequest::default(), monday(9, 0)),
            engine.clock_in(&actor, ClockInRequest::default(), monday(9, 0)),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| r == &Err(AttendanceError::AlreadyClockedIn))
        );
        assert_eq!(store.attendance_count(), 1);
    }

    #[actix_web::test]
    async fn concurrent_clock_ins_over_a_placeholder_fill_it_once() {
        let (store, engine) = setup();
        let placeholder =
            store.insert_attendance(EMP, date(2026, 3, 2), None, None, AttendanceStatus::Absent);
        store.yield_before_writes(true);
        let actor = principal(EMP);

        let (first, second) = futures::join!(
            engine.clock_in(&actor, ClockInRequest::default(), monday(9, 0)),
            engine.clock_in(&actor, ClockInRequest::default(), monday(9, 20)),
        );
        assert!(first.is_ok() != second.is_ok());
        let loser = first.as_ref().err().or(second.as_ref().err());
        assert_eq!(loser, Some(&AttendanceError::AlreadyClockedIn));
        let filled = first.or(second).unwrap();
        assert_eq!(filled.id, placeholder.id);
        assert_eq!(store.attendance_count(), 1);
    }

    #[actix_web::test]
    async fn weekend_clock_in_is_rejected() {
        let (store, engine) = setup();
        // 2026-03-01 is a Sunday
        let result = engine
            .clock_in(&principal(EMP), ClockInRequest::default(), utc(2026, 3, 1, 9, 0))
            .await;
        assert_eq!(result, Err(AttendanceError::NonWorkDay));
        assert_eq!(store.attendance_count(), 0);
    }

    #[actix_web::test]
    async fn clock_in_fills_an_absent_placeholder() {
        let (store, engine) = setup();
        let placeholder = store.insert_attendance(EMP, date(2026, 3, 2), None, None, AttendanceStatus::Absent);
        let record = engine
            .clock_in(&principal(EMP), ClockInRequest::default(), monday(8, 55))
            .await
            .unwrap();
        assert_eq!(record.id, placeholder.id);
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(store.attendance_count(), 1);
    }

    #[actix_web::test]
    async fn full_day_with_overtime_stays_present() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 0))
            .await
            .unwrap();
        let record = engine
            .clock_out(&actor, ClockOutRequest::default(), monday(19, 10))
            .await
            .unwrap();
        assert_eq!(record.total_hours, dec!(10.17));
        assert_eq!(record.overtime_minutes, 70);
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.check_out, Some(local(2026, 3, 2, 19, 10)));
    }

    #[actix_web::test]
    async fn short_day_becomes_half_day() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 40))
            .await
            .unwrap();
        let record = engine
            .clock_out(&actor, ClockOutRequest::default(), monday(12, 0))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::HalfDay);
        assert_eq!(record.total_hours, dec!(2.33));
        assert_eq!(record.overtime_minutes, 0);
    }

    #[actix_web::test]
    async fn between_thresholds_keeps_late_status() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(10, 0))
            .await
            .unwrap();
        let record = engine
            .clock_out(&actor, ClockOutRequest::default(), monday(16, 0))
            .await
            .unwrap();
        assert_eq!(record.total_hours, dec!(6.00));
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.late_minutes, 45);
    }

    #[test]
    fn half_day_threshold_never_exceeds_a_full_day() {
        let mut settings = CompanySettings::defaults(Some(ORG), Tz::UTC);
        settings.half_day_hours = dec!(9);
        settings.full_day_hours = dec!(8);
        assert_eq!(closing_status(dec!(8.50), 0, &settings), AttendanceStatus::Present);
        assert_eq!(closing_status(dec!(7.99), 0, &settings), AttendanceStatus::HalfDay);

        settings.half_day_hours = dec!(4);
        assert_eq!(closing_status(dec!(5), 20, &settings), AttendanceStatus::Late);
    }

    #[actix_web::test]
    async fn clock_out_errors() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        assert_eq!(
            engine
                .clock_out(&actor, ClockOutRequest::default(), monday(18, 0))
                .await,
            Err(AttendanceError::NotClockedIn)
        );
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 0))
            .await
            .unwrap();
        engine
            .clock_out(&actor, ClockOutRequest::default(), monday(18, 0))
            .await
            .unwrap();
        assert_eq!(
            engine
                .clock_out(&actor, ClockOutRequest::default(), monday(18, 5))
                .await,
            Err(AttendanceError::AlreadyClockedOut)
        );
    }

    #[actix_web::test]
    async fn break_cycle() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        assert_eq!(
            engine.start_break(&actor, monday(8, 0)).await,
            Err(AttendanceError::NotClockedIn)
        );
        assert_eq!(
            engine.end_break(&actor, monday(8, 0)).await,
            Err(AttendanceError::NotOnBreak)
        );

        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 30))
            .await
            .unwrap();
        assert_eq!(
            engine.end_break(&actor, monday(12, 0)).await,
            Err(AttendanceError::NotOnBreak)
        );
        let on_break = engine.start_break(&actor, monday(13, 0)).await.unwrap();
        assert_eq!(on_break.status, AttendanceStatus::OnBreak);
        assert_eq!(
            engine.start_break(&actor, monday(13, 5)).await,
            Err(AttendanceError::AlreadyOnBreak)
        );
        let back = engine.end_break(&actor, monday(14, 0)).await.unwrap();
        // arrived 15 minutes past grace
        assert_eq!(back.status, AttendanceStatus::Late);

        engine
            .clock_out(&actor, ClockOutRequest::default(), monday(18, 0))
            .await
            .unwrap();
        assert_eq!(
            engine.start_break(&actor, monday(18, 30)).await,
            Err(AttendanceError::NotClockedIn)
        );
    }

    #[actix_web::test]
    async fn clock_out_during_break_closes_the_day() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 0))
            .await
            .unwrap();
        engine.start_break(&actor, monday(17, 0)).await.unwrap();
        let record = engine
            .clock_out(&actor, ClockOutRequest::default(), monday(18, 0))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn overnight_shift_clocks_out_the_next_morning() {
        let (store, engine) = setup();
        store.add_night_shift(30, ORG, (22, 0), (6, 0));
        store.assign_shift(EMP, 30, date(2026, 3, 1), None);
        let actor = principal(EMP);

        let record = engine
            .clock_in(&actor, ClockInRequest::default(), monday(22, 5))
            .await
            .unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);

        let closed = engine
            .clock_out(&actor, ClockOutRequest::default(), utc(2026, 3, 3, 7, 0))
            .await
            .unwrap();
        assert_eq!(closed.id, record.id);
        assert_eq!(closed.date, date(2026, 3, 2));
        assert_eq!(closed.overtime_minutes, 60);
        assert_eq!(closed.total_hours, dec!(8.92));
    }

    #[actix_web::test]
    async fn day_shift_does_not_carry_over() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 0))
            .await
            .unwrap();
        assert_eq!(
            engine
                .clock_out(&actor, ClockOutRequest::default(), utc(2026, 3, 3, 1, 0))
                .await,
            Err(AttendanceError::NotClockedIn)
        );
    }

    #[actix_web::test]
    async fn get_today_without_record() {
        let (_, engine) = setup();
        let view = engine.get_today(&principal(EMP), monday(8, 0)).await.unwrap();
        assert_eq!(view.status, DayStatus::NotCheckedIn);
        assert!(!view.is_checked_in);
        assert!(view.attendance.is_none());
        assert_eq!(view.shift_name, "Default");
    }

    #[actix_web::test]
    async fn absent_placeholder_reads_as_not_checked_in() {
        let (store, engine) = setup();
        let placeholder =
            store.insert_attendance(EMP, date(2026, 3, 2), None, None, AttendanceStatus::Absent);
        let view = engine.get_today(&principal(EMP), monday(8, 0)).await.unwrap();
        assert_eq!(view.status, DayStatus::NotCheckedIn);
        assert!(!view.is_checked_in && !view.is_checked_out);
        assert_eq!(view.attendance.map(|r| r.id), Some(placeholder.id));
    }

    #[actix_web::test]
    async fn get_today_is_stable_without_writes() {
        let (_, engine) = setup();
        let actor = principal(EMP);
        engine
            .clock_in(&actor, ClockInRequest::default(), monday(9, 0))
            .await
            .unwrap();
        engine.start_break(&actor, monday(12, 0)).await.unwrap();
        let first = engine.get_today(&actor, monday(12, 10)).await.unwrap();
        let second = engine.get_today(&actor, monday(12, 10)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, DayStatus::OnBreak);
        assert!(first.is_on_break && first.is_checked_in && !first.is_checked_out);
    }

    #[actix_web::test]
    async fn company_timezone_decides_the_day() {
        let (store, engine) = setup();
        let mut settings = CompanySettings::defaults(Some(ORG), Tz::Asia__Dhaka);
        settings.configured = true;
        settings.work_start_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        // nothing has been cached yet
        store.set_settings(settings);
        // 2026-03-01 22:30 UTC is Monday 04:30 in Dhaka
        let record = engine
            .clock_in(&principal(EMP), ClockInRequest::default(), utc(2026, 3, 1, 22, 30))
            .await
            .unwrap();
        assert_eq!(record.date, date(2026, 3, 2));
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn history_lists_the_month_in_order() {
        let (store, engine) = setup();
        store.insert_attendance(EMP, date(2026, 3, 5), Some(local(2026, 3, 5, 9, 0)), Some(local(2026, 3, 5, 18, 0)), AttendanceStatus::Present);
        store.insert_attendance(EMP, date(2026, 3, 3), Some(local(2026, 3, 3, 9, 0)), Some(local(2026, 3, 3, 18, 0)), AttendanceStatus::Present);
        store.insert_attendance(EMP, date(2026, 4, 1), Some(local(2026, 4, 1, 9, 0)), None, AttendanceStatus::Present);

        let history = engine.attendance_history(&principal(EMP), 3, 2026).await.unwrap();
        let dates: Vec<_> = history.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2026, 3, 3), date(2026, 3, 5)]);

        assert!(matches!(
            engine.attendance_history(&principal(EMP), 13, 2026).await,
            Err(AttendanceError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn override_requires_company_scope_or_permission() {
        let (store, engine) = setup();
        store.add_employee(50, Some(ORG), None);
        let request = || OverrideRequest {
            employee_id: EMP,
            date: date(2026, 3, 2),
            check_in: local(2026, 3, 2, 9, 30),
            check_out: Some(local(2026, 3, 2, 18, 30)),
            status: None,
            is_wfh: None,
        };

        assert!(matches!(
            engine.override_attendance(&principal(50), request()).await,
            Err(AttendanceError::Unauthorized(_))
        ));

        store.set_scope(50, Scope::Company);
        let record = engine.override_attendance(&principal(50), request()).await.unwrap();
        assert_eq!(record.late_minutes, 15);
        assert_eq!(record.overtime_minutes, 30);
        assert_eq!(record.total_hours, dec!(9.00));
        assert_eq!(record.status, AttendanceStatus::Late);

        // a second override updates the same row
        let mut again = request();
        again.status = Some(AttendanceStatus::Present);
        let updated = engine.override_attendance(&principal(50), again).await.unwrap();
        assert_eq!(updated.id, record.id);
        assert_eq!(updated.status, AttendanceStatus::Present);
        assert_eq!(store.attendance_count(), 1);

        // times on another day are refused before anything is written
        let mut shifted = request();
        shifted.date = date(2026, 3, 3);
        assert_eq!(
            engine.override_attendance(&principal(50), shifted).await,
            Err(AttendanceError::validation("Check-in must fall on the attendance date"))
        );
        assert_eq!(store.attendance_count(), 1);
    }

    #[actix_web::test]
    async fn override_rejects_other_organizations() {
        let (store, engine) = setup();
        store.add_employee(50, Some(ORG), None);
        store.add_employee(60, Some(OTHER_ORG), None);
        store.grant(50, Permission::AttendanceOverride);
        let request = OverrideRequest {
            employee_id: 60,
            date: date(2026, 3, 2),
            check_in: local(2026, 3, 2, 9, 0),
            check_out: None,
            status: None,
            is_wfh: None,
        };
        assert_eq!(
            engine.override_attendance(&principal(50), request).await,
            Err(AttendanceError::CrossOrgAccess)
        );
    }
}
