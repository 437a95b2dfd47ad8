use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::AttendanceError;
use crate::model::attendance::AttendanceRecord;
use crate::model::regularization::{
    Approval, AttendanceRegularization, MissingAttendance, NewRegularization, Rejection,
    RegularizationStatus,
};
use crate::service::access::{Permission, Principal, Visibility};
use crate::service::time_math::total_hours;
use crate::service::AttendanceEngine;
use crate::store::{RegularizationFilter, StoreError, Submission};

pub const MIN_REASON_CHARS: usize = 10;
/// Oldest attendance date that can still be corrected, in days before today.
pub const REGULARIZATION_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegularizationRequest {
    #[schema(example = 42)]
    pub attendance_id: u64,
    #[schema(example = "2026-01-05T09:00:00", value_type = String, format = "date-time")]
    pub requested_check_in: NaiveDateTime,
    #[schema(example = "2026-01-05T18:00:00", value_type = String, format = "date-time")]
    pub requested_check_out: NaiveDateTime,
    #[schema(example = "Biometric device was offline in the morning")]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MissingAttendanceRequest {
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "2026-01-05T09:00:00", value_type = String, format = "date-time")]
    pub requested_check_in: NaiveDateTime,
    #[schema(example = "2026-01-05T18:00:00", value_type = String, format = "date-time")]
    pub requested_check_out: NaiveDateTime,
    #[schema(example = "Was at the client site all day")]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[schema(example = "Badge logs show no entry that day")]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegularizationQuery {
    /// pending, approved or rejected
    pub status: Option<RegularizationStatus>,
}

fn validate_reason(reason: &str) -> Result<String, AttendanceError> {
    let reason = reason.trim();
    if reason.chars().count() < MIN_REASON_CHARS {
        return Err(AttendanceError::validation(format!(
            "Reason must be at least {MIN_REASON_CHARS} characters"
        )));
    }
    Ok(reason.to_string())
}

fn validate_times(
    date: NaiveDate,
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
) -> Result<(), AttendanceError> {
    if check_out <= check_in {
        return Err(AttendanceError::validation(
            "Requested check-out must be after requested check-in",
        ));
    }
    if check_in.date() != date {
        return Err(AttendanceError::validation(
            "Requested check-in must fall on the attendance date",
        ));
    }
    Ok(())
}

/// Accepts dates from `today - 30 days` through `today`, both inclusive.
fn validate_window(date: NaiveDate, today: NaiveDate) -> Result<(), AttendanceError> {
    if date > today {
        return Err(AttendanceError::validation(
            "Cannot regularize a future date",
        ));
    }
    if date < today - Duration::days(REGULARIZATION_WINDOW_DAYS) {
        return Err(AttendanceError::validation(format!(
            "Can only regularize attendance from the last {REGULARIZATION_WINDOW_DAYS} days"
        )));
    }
    Ok(())
}

impl AttendanceEngine {
    pub async fn request_regularization(
        &self,
        actor: &Principal,
        request: RegularizationRequest,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRegularization, AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);
        let reason = validate_reason(&request.reason)?;

        let record = self
            .store
            .attendance(request.attendance_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Attendance record".into()))?;
        if record.employee_id != actor.employee_id {
            return Err(AttendanceError::unauthorized(
                "You can only regularize your own attendance",
            ));
        }
        validate_window(record.date, now.date())?;
        validate_times(record.date, request.requested_check_in, request.requested_check_out)?;

        let submitted = self
            .store
            .submit_regularization(NewRegularization {
                employee_id: actor.employee_id,
                attendance_id: record.id,
                original_check_in: record.check_in,
                original_check_out: record.check_out,
                requested_check_in: request.requested_check_in,
                requested_check_out: request.requested_check_out,
                reason,
                created_at: now,
            })
            .await?;
        let saved = match submitted {
            Submission::Saved(saved) => saved,
            Submission::Blocked(RegularizationStatus::Approved) => {
                return Err(AttendanceError::AlreadyApproved);
            }
            Submission::Blocked(status) => {
                debug!(attendance_id = record.id, %status, "Regularization already open");
                return Err(AttendanceError::AlreadyPending);
            }
        };
        info!(
            employee_id = actor.employee_id,
            attendance_id = record.id,
            regularization_id = saved.id,
            "Regularization requested"
        );
        Ok(saved)
    }

    /// Backfills a day with no attendance row: an `ABSENT` placeholder and
    /// its pending request are stored together.
    pub async fn request_missing_attendance(
        &self,
        actor: &Principal,
        request: MissingAttendanceRequest,
        now: DateTime<Utc>,
    ) -> Result<(AttendanceRecord, AttendanceRegularization), AttendanceError> {
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);
        let reason = validate_reason(&request.reason)?;
        validate_window(request.date, now.date())?;
        validate_times(request.date, request.requested_check_in, request.requested_check_out)?;

        let exists = || {
            AttendanceError::validation(
                "Attendance already exists for this date; submit a regularization request instead",
            )
        };
        if self
            .store
            .attendance_on(actor.employee_id, request.date)
            .await?
            .is_some()
        {
            return Err(exists());
        }

        let created = self
            .store
            .create_missing_attendance(MissingAttendance {
                employee_id: actor.employee_id,
                date: request.date,
                requested_check_in: request.requested_check_in,
                requested_check_out: request.requested_check_out,
                reason,
                created_at: now,
            })
            .await;
        match created {
            Ok((record, regularization)) => {
                info!(
                    employee_id = actor.employee_id,
                    date = %request.date,
                    attendance_id = record.id,
                    regularization_id = regularization.id,
                    "Missing attendance requested"
                );
                Ok((record, regularization))
            }
            Err(StoreError::UniqueViolation(_)) => Err(exists()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn approve_regularization(
        &self,
        actor: &Principal,
        regularization_id: u64,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRegularization, AttendanceError> {
        let regularization = self.decidable(actor, regularization_id).await?;
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);

        let approval = Approval {
            regularization_id,
            attendance_id: regularization.attendance_id,
            approver_id: actor.employee_id,
            approved_at: now,
            check_in: regularization.requested_check_in,
            check_out: regularization.requested_check_out,
            total_hours: total_hours(
                regularization.requested_check_in,
                regularization.requested_check_out,
            ),
        };
        let Some(approved) = self.store.approve_regularization(approval).await? else {
            return Err(self.no_longer_pending(regularization_id).await);
        };
        info!(
            approver_id = actor.employee_id,
            regularization_id,
            attendance_id = approved.attendance_id,
            "Regularization approved"
        );
        Ok(approved)
    }

    pub async fn reject_regularization(
        &self,
        actor: &Principal,
        regularization_id: u64,
        request: RejectRequest,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRegularization, AttendanceError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AttendanceError::validation("Rejection reason is required"));
        }
        self.decidable(actor, regularization_id).await?;
        let settings = self.settings_for(actor.organization_id).await?;
        let now = Self::local_now(&settings, now);

        let rejection = Rejection {
            regularization_id,
            approver_id: actor.employee_id,
            rejected_at: now,
            reason: reason.to_string(),
        };
        let Some(rejected) = self.store.reject_regularization(rejection).await? else {
            return Err(self.no_longer_pending(regularization_id).await);
        };
        info!(
            approver_id = actor.employee_id,
            regularization_id,
            "Regularization rejected"
        );
        Ok(rejected)
    }

    /// Requests the actor may see, newest first. Approvers see the whole
    /// organization.
    pub async fn list_regularizations(
        &self,
        actor: &Principal,
        query: RegularizationQuery,
    ) -> Result<Vec<AttendanceRegularization>, AttendanceError> {
        let org = Self::organization_of(actor)?;
        let visibility = self
            .visibility(actor, Some(Permission::AttendanceApproveRegularization))
            .await?;
        let employee_ids = match visibility {
            Visibility::Organization => None,
            Visibility::Employees(ids) => Some(ids),
        };
        let found = self
            .store
            .list_regularizations(RegularizationFilter {
                organization_id: org,
                employee_ids,
                status: query.status,
            })
            .await?;
        Ok(found)
    }

    pub async fn get_regularization(
        &self,
        actor: &Principal,
        regularization_id: u64,
    ) -> Result<AttendanceRegularization, AttendanceError> {
        let regularization = self
            .store
            .regularization(regularization_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Regularization".into()))?;
        if regularization.employee_id == actor.employee_id {
            return Ok(regularization);
        }
        self.same_organization(actor, regularization.employee_id)
            .await?;
        let visibility = self
            .visibility(actor, Some(Permission::AttendanceApproveRegularization))
            .await?;
        if !visibility.includes(regularization.employee_id) {
            return Err(AttendanceError::unauthorized(
                "You cannot view this regularization",
            ));
        }
        Ok(regularization)
    }

    /// Checks shared by approve and reject, in order: existence,
    /// organization, authority, then pending state.
    async fn decidable(
        &self,
        actor: &Principal,
        regularization_id: u64,
    ) -> Result<AttendanceRegularization, AttendanceError> {
        let regularization = self
            .store
            .regularization(regularization_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Regularization".into()))?;
        let org = self
            .same_organization(actor, regularization.employee_id)
            .await?;
        if !self
            .can_approve_for(actor, org, regularization.employee_id)
            .await?
        {
            warn!(
                actor_id = actor.employee_id,
                regularization_id, "Regularization decision denied"
            );
            return Err(AttendanceError::unauthorized(
                "You are not allowed to decide this regularization",
            ));
        }
        if regularization.status != RegularizationStatus::Pending {
            return Err(AttendanceError::NotPending(regularization.status));
        }
        Ok(regularization)
    }

    /// Organization shared by the actor and the target employee.
    async fn same_organization(
        &self,
        actor: &Principal,
        employee_id: u64,
    ) -> Result<u64, AttendanceError> {
        let target = self
            .store
            .employee(employee_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Employee".into()))?;
        match (actor.organization_id, target.organization_id) {
            (Some(mine), Some(theirs)) if mine == theirs => Ok(mine),
            _ => Err(AttendanceError::CrossOrgAccess),
        }
    }

    /// Error for a conditional write that found the row already decided.
    async fn no_longer_pending(&self, regularization_id: u64) -> AttendanceError {
        match self.store.regularization(regularization_id).await {
            Ok(Some(current)) => AttendanceError::NotPending(current.status),
            Ok(None) => AttendanceError::NotFound("Regularization".into()),
            Err(e) => e.into(),
        }
    }
}
