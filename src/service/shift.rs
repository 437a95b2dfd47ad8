use chrono::NaiveDate;
use tracing::debug;

use crate::error::AttendanceError;
use crate::model::settings::CompanySettings;
use crate::model::shift::{AssignedShift, FALLBACK_BREAK_MINS, ShiftSource, ShiftView};
use crate::service::AttendanceEngine;

/// Assignment effective on `date`; the latest `effective_from` wins, then
/// the most recently created.
pub fn select_assignment(assignments: &[AssignedShift], date: NaiveDate) -> Option<&AssignedShift> {
    assignments
        .iter()
        .filter(|a| a.assignment.covers(date))
        .max_by_key(|a| {
            (
                a.assignment.effective_from,
                a.assignment.created_at,
                a.assignment.id,
            )
        })
}

/// Shift built from the scalar company settings.
pub fn shift_from_settings(settings: &CompanySettings) -> ShiftView {
    ShiftView {
        shift_id: None,
        name: "Company hours".to_string(),
        start_time: settings.work_start_time,
        end_time: settings.work_end_time,
        grace_period_mins: settings.grace_period_mins,
        break_mins: FALLBACK_BREAK_MINS,
        is_overnight: false,
        source: ShiftSource::CompanySettings,
    }
}

impl AttendanceEngine {
    /// Effective shift for an employee on a date:
    /// assignment, then company default shift, then company settings, then 09:00-18:00.
    pub async fn resolve_shift(
        &self,
        employee_id: u64,
        organization_id: Option<u64>,
        date: NaiveDate,
    ) -> Result<ShiftView, AttendanceError> {
        let assignments = self.store.shift_assignments(employee_id).await?;
        if let Some(found) = select_assignment(&assignments, date) {
            debug!(employee_id, shift_id = found.shift.id, %date, "Shift from assignment");
            return Ok(ShiftView::from_shift(&found.shift, ShiftSource::Assignment));
        }

        let Some(org) = organization_id else {
            return Ok(ShiftView::fallback());
        };

        if let Some(shift) = self.store.default_shift(org).await? {
            if shift.is_usable_default() {
                return Ok(ShiftView::from_shift(&shift, ShiftSource::CompanyDefault));
            }
        }

        let settings = self.settings_for(Some(org)).await?;
        if settings.configured {
            return Ok(shift_from_settings(&settings));
        }
        Ok(ShiftView::fallback())
    }
}
