use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::model::attendance::AttendanceRecord;
use crate::model::regularization::AttendanceRegularization;
use crate::service::AttendanceEngine;
use crate::service::regularization::{
    MissingAttendanceRequest, RegularizationQuery, RegularizationRequest, RejectRequest,
};
use crate::utils::envelope::success;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

/// Placeholder row and the pending request created with it.
#[derive(Debug, Serialize, ToSchema)]
pub struct MissingAttendanceResponse {
    pub attendance: AttendanceRecord,
    pub regularization: AttendanceRegularization,
}

/// Ask for an existing attendance day to be corrected
#[utoipa::path(
    post,
    path = "/api/regularization",
    request_body = RegularizationRequest,
    responses(
        (status = 200, description = "Request is pending", body = Object),
        (status = 400, description = "Reason too short, bad times or outside the 30 day window", body = Object, example = json!({
            "success": false, "error": "Reason must be at least 10 characters"
        })),
        (status = 403, description = "Attendance belongs to someone else"),
        (status = 404, description = "Attendance not found"),
        (status = 409, description = "Already pending or already approved"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Regularization"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, attendance_id = body.attendance_id))]
pub async fn request_regularization(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    body: web::Json<RegularizationRequest>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let request = engine
        .request_regularization(&actor, body.into_inner(), Utc::now())
        .await?;
    Ok(success(request))
}

/// Backfill a day that has no attendance row
#[utoipa::path(
    post,
    path = "/api/regularization/missing",
    request_body = MissingAttendanceRequest,
    responses(
        (status = 200, description = "Placeholder and request created", body = MissingAttendanceResponse),
        (status = 400, description = "Invalid request, or the day already has attendance"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Regularization"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn request_missing_attendance(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    body: web::Json<MissingAttendanceRequest>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let (attendance, regularization) = engine
        .request_missing_attendance(&actor, body.into_inner(), Utc::now())
        .await?;
    Ok(success(MissingAttendanceResponse {
        attendance,
        regularization,
    }))
}

#[utoipa::path(
    get,
    path = "/api/regularization",
    params(RegularizationQuery),
    responses(
        (status = 200, description = "Requests visible to the caller, newest first", body = Object),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Regularization"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list_regularizations(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<RegularizationQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let requests = engine.list_regularizations(&actor, query.into_inner()).await?;
    Ok(success(requests))
}

#[utoipa::path(
    get,
    path = "/api/regularization/{id}",
    params(
        ("id" = u64, Path, description = "Regularization id")
    ),
    responses(
        (status = 200, description = "Regularization", body = AttendanceRegularization),
        (status = 403, description = "Not visible to the caller"),
        (status = 404, description = "Not found"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Regularization"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, regularization_id = *path))]
pub async fn get_regularization(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let request = engine.get_regularization(&actor, path.into_inner()).await?;
    Ok(success(request))
}

/// Approve a pending request and apply its times
#[utoipa::path(
    put,
    path = "/api/regularization/{id}/approve",
    params(
        ("id" = u64, Path, description = "Regularization id")
    ),
    responses(
        (status = 200, description = "Approved", body = AttendanceRegularization),
        (status = 403, description = "Not the requester's manager and no approval permission"),
        (status = 404, description = "Not found"),
        (status = 409, description = "No longer pending", body = Object, example = json!({
            "success": false, "error": "Regularization is not pending (current status: approved)"
        })),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Regularization"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, regularization_id = *path))]
pub async fn approve_regularization(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let approved = engine
        .approve_regularization(&actor, path.into_inner(), Utc::now())
        .await?;
    Ok(success(approved))
}

#[utoipa::path(
    put,
    path = "/api/regularization/{id}/reject",
    params(
        ("id" = u64, Path, description = "Regularization id")
    ),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected", body = AttendanceRegularization),
        (status = 400, description = "Rejection reason missing"),
        (status = 403, description = "Not the requester's manager and no approval permission"),
        (status = 404, description = "Not found"),
        (status = 409, description = "No longer pending"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Regularization"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, regularization_id = *path))]
pub async fn reject_regularization(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<u64>,
    body: web::Json<RejectRequest>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let rejected = engine
        .reject_regularization(&actor, path.into_inner(), body.into_inner(), Utc::now())
        .await?;
    Ok(success(rejected))
}
