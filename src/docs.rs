use crate::api::attendance::{
    ActionsResponse, HistoryResponse, LeaveSnapshot, RecordAttendance, StatsResponse,
};
use crate::api::employee::{EmployeeListResponse, ProfileResponse};
use crate::api::kiosk::{CardScan, CardSession};
use crate::api::leave_request::{
    BulkLeaveAction, CreateLeave, LeaveListResponse, LeaveResponse, LeaveStats,
};
use crate::auth::handlers::LoginResponse;
use crate::model::attendance::{
    AttendanceRecord, ClockAction, DayHistory, DaySummary, HistoryEntry, MonthStats, Period,
    RecordType,
};
use crate::model::department::Department;
use crate::model::employee::{Employee, EmployeeCard};
use crate::model::job_title::JobTitle;
use crate::model::leave_request::{LeaveAction, LeaveBalance, LeaveStatus, LeaveType};
use crate::models::{LoginReqDto, RegisterReq};
use crate::repo::employee::NewEmployee;
use crate::repo::organization::NewOrgUnit;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Attendance API",
        version = "1.0.0",
        description = r#"
## HR attendance & leave service

### Key Features
- **Attendance**
  - Clock in/out and breaks from a kiosk badge scan or the employee's own session
  - Next valid actions derived from the last recorded event
  - Daily history with worked time, monthly presence statistics
- **Leave Management**
  - Apply for leave, cancel pending requests
  - Approve / reject (single or bulk) for HR
  - Yearly balance against the annual quota
- **Directory**
  - Employees, departments and job titles

### Security
Endpoints under `/api` require a **JWT Bearer** access token.
HR and Admin roles unlock the management operations.

### Response Format
- JSON responses; errors are `{"message": "..."}`
- Pagination via `page` / `per_page` on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::register,

        crate::api::kiosk::authenticate_card,

        crate::api::attendance::actions,
        crate::api::attendance::record,
        crate::api::attendance::history,
        crate::api::attendance::stats,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::bulk_action,
        crate::api::leave_request::leave_stats,

        crate::api::employee::profile,
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,

        crate::api::organization::list_departments,
        crate::api::organization::create_department,
        crate::api::organization::list_job_titles,
        crate::api::organization::create_job_title
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            RegisterReq,
            CardScan,
            CardSession,
            RecordType,
            ClockAction,
            AttendanceRecord,
            RecordAttendance,
            ActionsResponse,
            Period,
            HistoryEntry,
            DaySummary,
            DayHistory,
            HistoryResponse,
            MonthStats,
            LeaveSnapshot,
            StatsResponse,
            LeaveType,
            LeaveStatus,
            LeaveAction,
            LeaveBalance,
            CreateLeave,
            LeaveResponse,
            LeaveListResponse,
            BulkLeaveAction,
            LeaveStats,
            Employee,
            EmployeeCard,
            NewEmployee,
            EmployeeListResponse,
            ProfileResponse,
            Department,
            JobTitle,
            NewOrgUnit
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and account registration"),
        (name = "Kiosk", description = "Badge scanning"),
        (name = "Attendance", description = "Clock events, history and statistics"),
        (name = "Leave", description = "Leave request lifecycle"),
        (name = "Employee", description = "Employee directory"),
        (name = "Organization", description = "Departments and job titles"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/auth/login",
            "/kiosk/authenticate-card",
            "/api/attendance",
            "/api/attendance/actions",
            "/api/leave/{leave_id}/cancel",
            "/api/leave/bulk",
            "/api/job-title",
        ] {
            assert!(paths.contains_key(path), "{path} missing");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
