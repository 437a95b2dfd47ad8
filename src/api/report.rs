use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::service::AttendanceEngine;
use crate::service::report::{DailyReportQuery, MonthQuery};
use crate::utils::envelope::success;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use tracing::instrument;

/// Every visible active employee with their status for one day
#[utoipa::path(
    get,
    path = "/api/reports/daily",
    params(DailyReportQuery),
    responses(
        (status = 200, description = "Daily report", body = crate::service::report::DailyReport),
        (status = 403, description = "Caller may only see their own attendance", body = Object, example = json!({
            "success": false, "error": "Not allowed to view attendance reports"
        })),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Reports"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn daily_report(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<DailyReportQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let report = engine
        .daily_report(&actor, query.into_inner(), Utc::now())
        .await?;
    Ok(success(report))
}

/// Per-employee monthly totals and attendance rate
#[utoipa::path(
    get,
    path = "/api/reports/monthly",
    params(MonthQuery),
    responses(
        (status = 200, description = "Monthly summary", body = crate::service::report::MonthlyReport),
        (status = 400, description = "Invalid month or year"),
        (status = 403, description = "Caller may only see their own attendance"),
        (status = 401, description = "Unauthenticated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Reports"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn monthly_summary(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let actor = engine.current_employee(auth.employee_id).await?;
    let report = engine.monthly_summary(&actor, query.into_inner()).await?;
    Ok(success(report))
}
