use chrono::{Datelike, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::model::shift::{FALLBACK_END, FALLBACK_GRACE_MINS, FALLBACK_START, hm};

/// Monday..Friday, numbered 1=Mon..7=Sun.
pub const DEFAULT_WORK_DAYS: [u8; 5] = [1, 2, 3, 4, 5];

/// Per-organization attendance policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanySettings {
    pub organization_id: Option<u64>,
    /// False when no `company_settings` row exists and the values are defaults.
    pub configured: bool,
    pub work_start_time: NaiveTime,
    pub work_end_time: NaiveTime,
    pub grace_period_mins: u32,
    pub work_days: Vec<u8>,
    pub half_day_hours: Decimal,
    pub full_day_hours: Decimal,
    pub timezone: Tz,
}

impl CompanySettings {
    pub fn defaults(organization_id: Option<u64>, timezone: Tz) -> Self {
        Self {
            organization_id,
            configured: false,
            work_start_time: hm(FALLBACK_START),
            work_end_time: hm(FALLBACK_END),
            grace_period_mins: FALLBACK_GRACE_MINS,
            work_days: DEFAULT_WORK_DAYS.to_vec(),
            half_day_hours: Decimal::from(4),
            full_day_hours: Decimal::from(8),
            timezone,
        }
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().number_from_monday() as u8;
        self.work_days.contains(&weekday)
    }

    /// Number of configured work days in a calendar month.
    pub fn working_days_in_month(&self, year: i32, month: u32) -> u32 {
        let Some(mut day) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return 0;
        };
        let mut count = 0;
        while day.month() == month {
            if self.is_work_day(day) {
                count += 1;
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        count
    }
}

/// Parses the stored `"1,2,3,4,5"` form, dropping anything outside 1..=7.
pub fn parse_work_days(raw: &str) -> Vec<u8> {
    let mut days: Vec<u8> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<u8>().ok())
        .filter(|day| (1..=7).contains(day))
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_work_days_and_ignores_garbage() {
        assert_eq!(parse_work_days("1, 2,3,4,5"), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_work_days("7,6,x,9,6"), vec![6, 7]);
        assert!(parse_work_days("").is_empty());
    }

    #[test]
    fn counts_working_days_in_month() {
        let settings = CompanySettings::defaults(Some(1), Tz::UTC);
        // March 2026 starts on a Sunday: 22 weekdays.
        assert_eq!(settings.working_days_in_month(2026, 3), 22);
        // February 2026: 20 weekdays.
        assert_eq!(settings.working_days_in_month(2026, 2), 20);
        assert_eq!(settings.working_days_in_month(2026, 13), 0);
    }

    #[test]
    fn weekend_is_not_a_work_day_by_default() {
        let settings = CompanySettings::defaults(None, Tz::UTC);
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(!settings.is_work_day(sunday));
        assert!(settings.is_work_day(monday));
    }
}
