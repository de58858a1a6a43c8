use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::api::{Pagination, today};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::leave_request::{
    DateRange, LeaveAction, LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, validate_dates,
};
use crate::repo::leave_request::{self as leave_repo, LeaveFilter, NewLeave};
use crate::config::Config;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "SICK")]
    pub leave_type: LeaveType,
    #[serde(default)]
    #[schema(example = "Flu")]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    #[schema(example = "Sick leave")]
    pub leave_type_display: String,
    pub reason: String,
    pub status: LeaveStatus,
    #[schema(example = "Pending")]
    pub status_display: String,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub request_date: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub response_date: Option<DateTime<Utc>>,
    /// Name of the employee who approved or rejected the request
    #[schema(example = "Jane Roe", nullable = true)]
    pub processed_by: Option<String>,
    /// Inclusive number of days
    #[schema(example = 3)]
    pub duration: i64,
    pub can_cancel: bool,
}

impl From<LeaveRequest> for LeaveResponse {
    fn from(l: LeaveRequest) -> Self {
        Self {
            duration: l.duration(),
            can_cancel: l.can_cancel(),
            leave_type_display: l.leave_type.label().to_string(),
            status_display: l.status.label().to_string(),
            id: l.id,
            employee_id: l.employee_id,
            start_date: l.start_date,
            end_date: l.end_date,
            leave_type: l.leave_type,
            reason: l.reason,
            status: l.status,
            request_date: l.request_date,
            response_date: l.response_date,
            processed_by: l.processed_by,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct LeaveQuery {
    /// Filter by employee (HR/Admin only)
    pub employee_id: Option<u64>,
    /// PENDING, APPROVED, REJECTED, CANCELLED or ALL
    pub status: Option<String>,
    /// Year of the start date
    pub year: Option<i32>,
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page (max 100)
    pub per_page: Option<u64>,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<LeaveStatus>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("ALL") => Ok(None),
        Some(s) => s
            .to_ascii_uppercase()
            .parse::<LeaveStatus>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("Unknown leave status: {s}"))),
    }
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = Object, example = json!({
            "message": "Leave request submitted",
            "id": 12,
            "duration": 3,
            "status": "PENDING"
        })),
        (status = 400, description = "Start date in the past or end before start"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Overlaps an approved leave")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();

    let range = DateRange::new(payload.start_date, payload.end_date);
    validate_dates(&range, today())?;

    let leave = leave_repo::create(
        pool.get_ref(),
        employee_id,
        NewLeave {
            range,
            leave_type: payload.leave_type,
            reason: payload.reason.trim().to_string(),
        },
    )
    .await
    .inspect_err(|e| tracing::info!(error = %e, employee_id, "Leave request rejected"))?;

    tracing::info!(employee_id, leave_id = leave.id, "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": leave.id,
        "duration": leave.duration(),
        "status": leave.status,
    })))
}

/* =========================
List leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveQuery),
    responses(
        (status = 200, description = "Paginated leave requests, newest first", body = LeaveListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveQuery>,
) -> Result<HttpResponse, AppError> {
    // Employees only ever see their own requests
    let employee_id = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let pagination = Pagination::new(query.page, query.per_page);
    let filter = LeaveFilter {
        employee_id,
        status: parse_status_filter(query.status.as_deref())?,
        year: query.year,
        limit: pagination.per_page,
        offset: pagination.offset(),
    };

    let (leaves, total) = leave_repo::list(pool.get_ref(), &filter)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Leave list query failed"))?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves.into_iter().map(LeaveResponse::from).collect(),
        page: pagination.page,
        per_page: pagination.per_page,
        total,
    }))
}

/* =========================
Leave detail
========================= */
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request")
    ),
    responses(
        (status = 200, description = "Leave request", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();

    let leave = leave_repo::find(pool.get_ref(), leave_id)
        .await?
        .filter(|l| auth.is_hr_or_admin() || Some(l.employee_id) == auth.employee_id)
        .ok_or_else(|| AppError::not_found("Leave request not found"))?;

    Ok(HttpResponse::Ok().json(LeaveResponse::from(leave)))
}

async fn respond_one(
    auth: AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    action: LeaveAction,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let affected = leave_repo::respond(pool, &[leave_id], action, auth.employee_id)
        .await
        .inspect_err(|e| tracing::error!(error = %e, leave_id, %action, "Leave response failed"))?;

    if affected == 0 {
        // Unknown id is an error; an already resolved request is a no-op
        let status = leave_repo::status_of(pool, leave_id)
            .await?
            .ok_or_else(|| AppError::not_found("Leave request not found"))?;

        return Ok(HttpResponse::Ok().json(json!({
            "message": format!("Leave request already {}", status.label().to_lowercase()),
            "status": status,
            "affected": 0
        })));
    }

    let target = action.target();
    tracing::info!(leave_id, user_id = auth.user_id, status = %target, "Leave request resolved");

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave {}", target.label().to_lowercase()),
        "status": target,
        "affected": affected
    })))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved, or already resolved (affected = 0)", body = Object, example = json!({
            "message": "Leave approved",
            "status": "APPROVED",
            "affected": 1
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    respond_one(auth, pool.get_ref(), path.into_inner(), LeaveAction::Approve).await
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected, or already resolved (affected = 0)", body = Object, example = json!({
            "message": "Leave rejected",
            "status": "REJECTED",
            "affected": 1
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    respond_one(auth, pool.get_ref(), path.into_inner(), LeaveAction::Reject).await
}

/* =========================
Cancel own leave
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the caller's pending leave request")
    ),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave request cancelled",
            "status": "CANCELLED"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request is no longer pending")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let leave_id = path.into_inner();

    leave_repo::cancel(pool.get_ref(), leave_id, employee_id).await?;

    tracing::info!(leave_id, employee_id, "Leave request cancelled");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request cancelled",
        "status": LeaveStatus::Cancelled
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct BulkLeaveAction {
    #[schema(example = "approve")]
    pub action: LeaveAction,
    #[schema(example = json!([1, 2, 3]))]
    pub ids: Vec<u64>,
}

/* =========================
Bulk approve / reject (HR/Admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/leave/bulk",
    request_body = BulkLeaveAction,
    responses(
        (status = 200, description = "Pending requests among ids resolved", body = Object, example = json!({
            "action": "approve",
            "requested": 3,
            "affected": 2
        })),
        (status = 400, description = "Empty id list or unsupported action"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn bulk_action(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<BulkLeaveAction>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let BulkLeaveAction { action, mut ids } = payload.into_inner();

    if action == LeaveAction::Cancel {
        return Err(AppError::validation("Only approve or reject can be applied in bulk"));
    }

    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(AppError::validation("ids must not be empty"));
    }

    let affected = leave_repo::respond(pool.get_ref(), &ids, action, auth.employee_id)
        .await
        .inspect_err(|e| tracing::error!(error = %e, %action, "Bulk leave response failed"))?;

    tracing::info!(user_id = auth.user_id, %action, requested = ids.len(), affected, "Bulk leave action");

    Ok(HttpResponse::Ok().json(json!({
        "action": action.to_string(),
        "requested": ids.len(),
        "affected": affected
    })))
}

#[derive(Serialize, ToSchema)]
pub struct LeaveStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub cancelled: i64,
    pub total: i64,
    #[schema(example = 2026)]
    pub year: i32,
    #[serde(flatten)]
    pub balance: LeaveBalance,
}

/* =========================
Leave stats for the caller
========================= */
#[utoipa::path(
    get,
    path = "/api/leave/stats",
    responses(
        (status = 200, description = "Per-status counts and yearly balance", body = LeaveStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let year = today().year();

    let counts = leave_repo::status_counts(pool.get_ref(), employee_id).await?;
    let count = |wanted: LeaveStatus| {
        counts
            .iter()
            .filter(|(status, _)| *status == wanted)
            .map(|(_, n)| *n)
            .sum::<i64>()
    };

    let approved = leave_repo::approved_in_year(pool.get_ref(), employee_id, year).await?;

    Ok(HttpResponse::Ok().json(LeaveStats {
        pending: count(LeaveStatus::Pending),
        approved: count(LeaveStatus::Approved),
        rejected: count(LeaveStatus::Rejected),
        cancelled: count(LeaveStatus::Cancelled),
        total: counts.iter().map(|(_, n)| n).sum(),
        year,
        balance: LeaveBalance::compute(config.annual_leave_quota, &approved),
    }))
}
