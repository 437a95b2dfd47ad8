//! Late, overtime and worked-hours arithmetic. No I/O.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::shift::ShiftView;

/// Whole minutes by which `at` is past `threshold`, rounded up. Zero when not past.
fn minutes_past(at: NaiveDateTime, threshold: NaiveDateTime) -> u32 {
    if at <= threshold {
        return 0;
    }
    let millis = (at - threshold).num_milliseconds();
    let minutes = (millis + 59_999) / 60_000;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Minutes late against `shift_start + grace` on the check-in's own date.
pub fn late_minutes(check_in: NaiveDateTime, shift_start: NaiveTime, grace_minutes: u32) -> u32 {
    let threshold = check_in.date().and_time(shift_start) + Duration::minutes(grace_minutes.into());
    minutes_past(check_in, threshold)
}

/// Minutes past `shift_end` on the check-out's own date.
///
/// `_break_minutes` is accepted but not deducted.
pub fn overtime_minutes(check_out: NaiveDateTime, shift_end: NaiveTime, _break_minutes: u32) -> u32 {
    minutes_past(check_out, check_out.date().and_time(shift_end))
}

/// Elapsed hours rounded half away from zero to 2 places. Never negative.
pub fn total_hours(check_in: NaiveDateTime, check_out: NaiveDateTime) -> Decimal {
    let seconds = (check_out - check_in).num_seconds().max(0);
    (Decimal::from(seconds) / Decimal::from(3600))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Start and end of `shift` when worked on `work_date`. The end moves to the
/// next day for shifts that span midnight.
pub fn shift_window(work_date: NaiveDate, shift: &ShiftView) -> (NaiveDateTime, NaiveDateTime) {
    let start = work_date.and_time(shift.start_time);
    let end_date = if shift.spans_midnight() {
        work_date.succ_opt().unwrap_or(work_date)
    } else {
        work_date
    };
    (start, end_date.and_time(shift.end_time))
}

/// Late minutes anchored to the attendance date instead of the clock date.
/// Same as [`late_minutes`] whenever the check-in happens on `work_date`.
pub fn late_minutes_for_shift(work_date: NaiveDate, check_in: NaiveDateTime, shift: &ShiftView) -> u32 {
    let (start, _) = shift_window(work_date, shift);
    minutes_past(check_in, start + Duration::minutes(shift.grace_period_mins.into()))
}

/// Overtime anchored to the end of the shift that started on `work_date`.
/// Same as [`overtime_minutes`] for day shifts checked out on `work_date`.
pub fn overtime_minutes_for_shift(work_date: NaiveDate, check_out: NaiveDateTime, shift: &ShiftView) -> u32 {
    let (_, end) = shift_window(work_date, shift);
    minutes_past(check_out, end)
}
