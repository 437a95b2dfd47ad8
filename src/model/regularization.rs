use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RegularizationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRegularization {
    pub id: u64,
    pub employee_id: u64,
    pub attendance_id: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub original_check_in: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub original_check_out: Option<NaiveDateTime>,
    #[schema(example = "2026-01-05T09:00:00", value_type = String, format = "date-time")]
    pub requested_check_in: NaiveDateTime,
    #[schema(example = "2026-01-05T18:00:00", value_type = String, format = "date-time")]
    pub requested_check_out: NaiveDateTime,
    #[schema(example = "Forgot to clock in, was at the client site")]
    pub reason: String,
    pub status: RegularizationStatus,
    pub approver_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// A fresh request, or a re-submission over a rejected one. A successful write
/// leaves the row pending with approver and rejection fields cleared.
#[derive(Debug, Clone)]
pub struct NewRegularization {
    pub employee_id: u64,
    pub attendance_id: u64,
    pub original_check_in: Option<NaiveDateTime>,
    pub original_check_out: Option<NaiveDateTime>,
    pub requested_check_in: NaiveDateTime,
    pub requested_check_out: NaiveDateTime,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

/// Backfill request for a day with no attendance row yet.
#[derive(Debug, Clone)]
pub struct MissingAttendance {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub requested_check_in: NaiveDateTime,
    pub requested_check_out: NaiveDateTime,
    pub reason: String,
    pub created_at: NaiveDateTime,
}

/// Approval applies the requested times to the attendance row and closes the
/// regularization in one transaction.
#[derive(Debug, Clone)]
pub struct Approval {
    pub regularization_id: u64,
    pub attendance_id: u64,
    pub approver_id: u64,
    pub approved_at: NaiveDateTime,
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub total_hours: rust_decimal::Decimal,
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub regularization_id: u64,
    pub approver_id: u64,
    pub rejected_at: NaiveDateTime,
    pub reason: String,
}
