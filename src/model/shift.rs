use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const FALLBACK_START: (u32, u32) = (9, 0);
pub const FALLBACK_END: (u32, u32) = (18, 0);
pub const FALLBACK_GRACE_MINS: u32 = 15;
pub const FALLBACK_BREAK_MINS: u32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shift {
    pub id: u64,
    pub organization_id: u64,
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_period_mins: u32,
    pub break_mins: u32,
    pub is_overnight: bool,
    pub is_default: bool,
    pub is_active: bool,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Shift {
    pub fn is_usable_default(&self) -> bool {
        self.is_default && self.is_active && self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeShiftAssignment {
    pub id: u64,
    pub employee_id: u64,
    pub shift_id: u64,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl EmployeeShiftAssignment {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_from <= date
            && self.effective_to.is_none_or(|to| to >= date)
    }
}

/// An assignment joined with the shift it points at.
#[derive(Debug, Clone)]
pub struct AssignedShift {
    pub assignment: EmployeeShiftAssignment,
    pub shift: Shift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSource {
    Assignment,
    CompanyDefault,
    CompanySettings,
    Fallback,
}

/// The effective working window for one employee on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftView {
    pub shift_id: Option<u64>,
    #[schema(example = "General")]
    pub name: String,
    #[schema(example = "09:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "18:00:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = 15)]
    pub grace_period_mins: u32,
    #[schema(example = 60)]
    pub break_mins: u32,
    pub is_overnight: bool,
    pub source: ShiftSource,
}

impl ShiftView {
    pub fn from_shift(shift: &Shift, source: ShiftSource) -> Self {
        Self {
            shift_id: Some(shift.id),
            name: shift.name.clone(),
            start_time: shift.start_time,
            end_time: shift.end_time,
            grace_period_mins: shift.grace_period_mins,
            break_mins: shift.break_mins,
            is_overnight: shift.is_overnight,
            source,
        }
    }

    pub fn fallback() -> Self {
        Self {
            shift_id: None,
            name: "Default".to_string(),
            start_time: hm(FALLBACK_START),
            end_time: hm(FALLBACK_END),
            grace_period_mins: FALLBACK_GRACE_MINS,
            break_mins: FALLBACK_BREAK_MINS,
            is_overnight: false,
            source: ShiftSource::Fallback,
        }
    }

    /// A shift whose end is not after its start runs into the next day,
    /// whether or not the overnight flag was set.
    pub fn spans_midnight(&self) -> bool {
        self.is_overnight || self.end_time <= self.start_time
    }
}

pub(crate) fn hm((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}
