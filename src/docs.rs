use crate::api::regularization::MissingAttendanceResponse;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, DayStatus, GeoPoint};
use crate::model::regularization::{AttendanceRegularization, RegularizationStatus};
use crate::model::shift::{ShiftSource, ShiftView};
use crate::service::attendance::{ClockInRequest, ClockOutRequest, OverrideRequest, TodayView};
use crate::service::regularization::{
    MissingAttendanceRequest, RegularizationRequest, RejectRequest,
};
use crate::service::report::{
    DailyReport, DailyReportRow, DailySummary, MonthlyReport, MonthlySummaryRow,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance lifecycle and regularization

Daily clock-in / break / clock-out tracking against the employee's effective shift,
employee-initiated corrections approved by managers or HR, and daily / monthly reports.

### 🔐 Security
Every endpoint requires a **JWT Bearer** access token whose user is linked to an employee.
Visibility follows the caller's scope: self, team (direct reports) or company.

### 📦 Response Format
Every response is `{ "success": bool, "data"?: ..., "error"?: "..." }`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::start_break,
        crate::api::attendance::end_break,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::override_attendance,

        crate::api::regularization::request_regularization,
        crate::api::regularization::request_missing_attendance,
        crate::api::regularization::list_regularizations,
        crate::api::regularization::get_regularization,
        crate::api::regularization::approve_regularization,
        crate::api::regularization::reject_regularization,

        crate::api::report::daily_report,
        crate::api::report::monthly_summary
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceStatus,
            DayStatus,
            GeoPoint,
            ShiftView,
            ShiftSource,
            TodayView,
            ClockInRequest,
            ClockOutRequest,
            OverrideRequest,
            AttendanceRegularization,
            RegularizationStatus,
            RegularizationRequest,
            MissingAttendanceRequest,
            MissingAttendanceResponse,
            RejectRequest,
            DailyReport,
            DailyReportRow,
            DailySummary,
            MonthlyReport,
            MonthlySummaryRow
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Clock-in, breaks, clock-out and HR overrides"),
        (name = "Regularization", description = "Attendance correction requests"),
        (name = "Reports", description = "Daily and monthly attendance reports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
