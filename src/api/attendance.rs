use crate::api::optional_json;
use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::service::AttendanceEngine;
use crate::service::attendance::{ClockInRequest, ClockOutRequest, OverrideRequest};
use crate::service::report::MonthQuery;
use crate::utils::envelope::success;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use tracing::instrument;

/// Clock in for today
///
/// The body is optional; without one the day is recorded as an office day.
/// A body that is present must be valid JSON.
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body(content = ClockInRequest, description = "Optional", content_type = "application/json"),
    responses(
        (status = 200, description = "Clocked in", body = Object, example = json!({
            "success": true,
            "data": {
                "id": 42, "employee_id": 1001, "date": "2026-01-05",
                "check_in": "2026-01-05T09:20:00", "check_out": null,
                "status": "LATE", "total_hours": "0", "late_minutes": 5,
                "overtime_minutes": 0, "is_wfh": false, "shift_id": 3,
                "check_in_location": null, "check_out_location": null
            }
        })),
        (status = 409, description = "Already clocked in today", body = Object, example = json!({
            "success": false, "error": "Already clocked in today"
        })),
        (status = 422, description = "Today is not a working day"),
        (status = 401, description = "Unauthenticated"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn clock_in(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    body: web::Bytes,
) -> Result<HttpResponse, AttendanceError> {
    let request: ClockInRequest = optional_json(&body)?;
    let actor = engine.current_employee(auth.employee_id).await?;
    let record = engine.clock_in(&actor, request, Utc::now()).await?;
    Ok(success(record))
}

/// Clock out of the open attendance day
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body(content = ClockOutRequest, description = "Optional", content_type = "application/json"),
    responses(
        (status = 200, description = "Clocked out", body = Object),
        (status = 409, description = "Not clocked in, or already clocked out", body = Object, example = json!({
            "success": false, "error": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthenticated"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn clock_out(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    body: web::Bytes,
) -> Result<HttpResponse, AttendanceError> {
    let request: ClockOutRequest = optional_json(&body)?;
    let actor = engine.current_employee(auth.employee_id).await?;
    let record = engine.clock_out(&actor, request, Utc::now()).await?;
    Ok(success(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/break/start",
    responses(
        (status = 200, description = "Break started", body = Object),
        (status = 409, description = "Not clocked in, or already on break", body = Object),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn start_break(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let record = engine.start_break(&actor, Utc::now()).await?;
    Ok(success(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/break/end",
    responses(
        (status = 200, description = "Break ended", body = Object),
        (status = 409, description = "Not on break", body = Object, example = json!({
            "success": false, "error": "Not on break"
        })),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn end_break(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let record = engine.end_break(&actor, Utc::now()).await?;
    Ok(success(record))
}

/// Today's status, flags and effective shift for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance", body = Object, example = json!({
            "success": true,
            "data": {
                "date": "2026-01-05", "status": "NOT_CHECKED_IN",
                "is_checked_in": false, "is_checked_out": false, "is_on_break": false,
                "shift_name": "General",
                "shift": {
                    "shift_id": 3, "name": "General", "start_time": "09:00:00",
                    "end_time": "18:00:00", "grace_period_mins": 15, "break_mins": 60,
                    "is_overnight": false, "source": "assignment"
                },
                "attendance": null
            }
        })),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn today(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let view = engine.get_today(&actor, Utc::now()).await?;
    Ok(success(view))
}

#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(MonthQuery),
    responses(
        (status = 200, description = "The caller's records for the month, oldest first", body = Object),
        (status = 400, description = "Invalid month or year"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn history(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let MonthQuery { month, year } = query.into_inner();
    let records = engine.attendance_history(&actor, month, year).await?;
    Ok(success(records))
}

/// HR correction of an employee's day
#[utoipa::path(
    put,
    path = "/api/attendance/override",
    request_body = OverrideRequest,
    responses(
        (status = 200, description = "Attendance overwritten", body = Object),
        (status = 400, description = "check_out is not after check_in"),
        (status = 403, description = "Missing override rights or another organization"),
        (status = 404, description = "Employee not found"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, employee_id = body.employee_id))]
pub async fn override_attendance(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    body: web::Json<OverrideRequest>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let record = engine.override_attendance(&actor, body.into_inner()).await?;
    Ok(success(record))
}
