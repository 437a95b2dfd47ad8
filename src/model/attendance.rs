use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Statuses that are persisted on an attendance row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    OnBreak,
    HalfDay,
    Absent,
}

impl AttendanceStatus {
    /// Working status for a checked-in employee who is not on a break.
    pub fn working(late_minutes: u32) -> Self {
        if late_minutes > 0 {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }
}

/// Status as shown to callers. `NotCheckedIn` is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    NotCheckedIn,
    Present,
    Late,
    OnBreak,
    HalfDay,
    Absent,
}

impl From<AttendanceStatus> for DayStatus {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Present => DayStatus::Present,
            AttendanceStatus::Late => DayStatus::Late,
            AttendanceStatus::OnBreak => DayStatus::OnBreak,
            AttendanceStatus::HalfDay => DayStatus::HalfDay,
            AttendanceStatus::Absent => DayStatus::Absent,
        }
    }
}

impl DayStatus {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        record.map_or(DayStatus::NotCheckedIn, |r| r.status.into())
    }

    /// Like [`DayStatus::of`], but a row nobody has checked into yet (the
    /// `ABSENT` placeholder of a pending backfill) reads as `NotCheckedIn`.
    pub fn today(record: Option<&AttendanceRecord>) -> Self {
        Self::of(record.filter(|r| r.check_in.is_some()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    #[schema(example = 23.8103)]
    pub latitude: f64,
    #[schema(example = 90.4125)]
    pub longitude: f64,
}

impl GeoPoint {
    pub(crate) fn from_columns(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2026-01-05T09:20:00", value_type = Option<String>, format = "date-time")]
    pub check_in: Option<NaiveDateTime>,
    #[schema(example = "2026-01-05T18:05:00", value_type = Option<String>, format = "date-time")]
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    #[schema(example = "8.75", value_type = String)]
    pub total_hours: Decimal,
    pub late_minutes: u32,
    pub overtime_minutes: u32,
    pub is_wfh: bool,
    pub shift_id: Option<u64>,
    pub check_in_location: Option<GeoPoint>,
    pub check_out_location: Option<GeoPoint>,
}

impl AttendanceRecord {
    /// Checked in and not yet checked out.
    pub fn is_open(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_none()
    }
}

/// Write issued by clock-in; fills a placeholder row or creates a new one.
#[derive(Debug, Clone)]
pub struct CheckIn {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: NaiveDateTime,
    pub status: AttendanceStatus,
    pub late_minutes: u32,
    pub is_wfh: bool,
    pub shift_id: Option<u64>,
    pub location: Option<GeoPoint>,
}

/// Write issued by clock-out; only applies to a row without check-out.
#[derive(Debug, Clone)]
pub struct CheckOut {
    pub check_out: NaiveDateTime,
    pub total_hours: Decimal,
    pub overtime_minutes: u32,
    pub status: AttendanceStatus,
    pub location: Option<GeoPoint>,
}

/// Full replacement of the timing fields of an (employee, date) row.
#[derive(Debug, Clone)]
pub struct AttendanceOverride {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: NaiveDateTime,
    pub check_out: Option<NaiveDateTime>,
    pub status: AttendanceStatus,
    pub total_hours: Decimal,
    pub late_minutes: u32,
    pub overtime_minutes: u32,
    pub is_wfh: bool,
    pub shift_id: Option<u64>,
}
