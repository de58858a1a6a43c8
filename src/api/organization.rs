use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::department::Department;
use crate::model::job_title::JobTitle;
use crate::repo::organization::{self as org_repo, NewOrgUnit};

fn validate(payload: &NewOrgUnit) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/department",
    responses(
        (status = 200, description = "All departments", body = Vec<Department>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Organization",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let departments: Vec<Department> = org_repo::list_departments(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    post,
    path = "/api/department",
    request_body = NewOrgUnit,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Empty name"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Department already exists")
    ),
    tag = "Organization",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewOrgUnit>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    validate(&payload)?;

    let department: Department = org_repo::create_department(pool.get_ref(), &payload).await?;
    tracing::info!(department_id = department.id, "Department created");

    Ok(HttpResponse::Created().json(department))
}

#[utoipa::path(
    get,
    path = "/api/job-title",
    responses(
        (status = 200, description = "All job titles", body = Vec<JobTitle>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Organization",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_job_titles(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let job_titles: Vec<JobTitle> = org_repo::list_job_titles(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(job_titles))
}

#[utoipa::path(
    post,
    path = "/api/job-title",
    request_body = NewOrgUnit,
    responses(
        (status = 201, description = "Job title created", body = JobTitle),
        (status = 400, description = "Empty name"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Job title already exists")
    ),
    tag = "Organization",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_job_title(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<NewOrgUnit>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    validate(&payload)?;

    let job_title: JobTitle = org_repo::create_job_title(pool.get_ref(), &payload).await?;
    tracing::info!(job_title_id = job_title.id, "Job title created");

    Ok(HttpResponse::Created().json(job_title))
}
