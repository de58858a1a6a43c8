use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::api::Pagination;
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::employee::{Employee, display_name};
use crate::repo::employee::{self as employee_repo, EmployeeFilter, NewEmployee};
use crate::utils::directory_cache;

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub per_page: Option<u64>,
    pub department_id: Option<u64>,
    pub job_title_id: Option<u64>,
    pub status: Option<String>,
    /// Matches first name, last name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 42)]
    pub total: i64,
}

fn validate_new_employee(payload: &NewEmployee) -> Result<(), AppError> {
    if payload.employee_code.trim().is_empty() {
        return Err(AppError::validation("employee_code must not be empty"));
    }
    if !payload.email.contains('@') {
        return Err(AppError::validation("email is not valid"));
    }
    Ok(())
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = NewEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Employee code, NFC id or QR code already in use")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    validate_new_employee(&payload)?;

    let employee = employee_repo::create(pool.get_ref(), &payload).await?;
    directory_cache::remember(employee.card()).await;

    info!(employee_id = employee.id, code = %employee.employee_code, "Employee created");

    Ok(HttpResponse::Created().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let pagination = Pagination::new(query.page, query.per_page);
    let query = query.into_inner();
    let filter = EmployeeFilter {
        department_id: query.department_id,
        job_title_id: query.job_title_id,
        status: query.status,
        search: query.search.filter(|s| !s.trim().is_empty()),
        limit: pagination.per_page,
        offset: pagination.offset(),
    };

    let (data, total) = employee_repo::list(pool.get_ref(), &filter)
        .await
        .inspect_err(|e| error!(error = %e, "Employee list query failed"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data,
        page: pagination.page,
        per_page: pagination.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/employee/{id}",
    params(
        ("id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let employee = employee_repo::find(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
    #[schema(example = "Developer", nullable = true)]
    pub job_title: Option<String>,
    /// Payload encoded in the employee's badge QR code
    #[schema(example = "EMP-001-7f3a", nullable = true)]
    pub qr_code: Option<String>,
}

/// Caller's own employee profile
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Own profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;

    let employee = employee_repo::find(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(ProfileResponse {
        username: auth.username,
        employee_id,
        name: display_name(&employee.first_name, &employee.last_name, &employee.employee_code),
        employee_code: employee.employee_code,
        email: employee.email,
        department: employee.department,
        job_title: employee.job_title,
        qr_code: employee.qr_code,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::json;

    #[actix_web::test]
    async fn employees_cannot_list_staff() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/employee")
            .peer_addr("127.0.0.1:40002".parse().unwrap())
            .insert_header(testing::bearer(Role::Employee, Some(7)))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn create_rejects_invalid_email() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/employee")
            .peer_addr("127.0.0.1:40002".parse().unwrap())
            .insert_header(testing::bearer(Role::Hr, Some(2)))
            .set_json(json!({
                "employee_code": "EMP-100",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "not-an-email"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn profile_needs_linked_employee() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::get()
            .uri("/api/profile")
            .peer_addr("127.0.0.1:40002".parse().unwrap())
            .insert_header(testing::bearer(Role::Admin, None))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
