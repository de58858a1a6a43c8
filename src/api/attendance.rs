use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::api::{local_window, today};
use crate::auth::auth::{AuthUser, ClockUser};
use crate::config::Config;
use crate::error::AppError;
use crate::model::attendance::{
    AttendanceRecord, ClockAction, DayHistory, MonthStats, Period, RecordType, available_actions,
    group_by_day, month_stats, resolve_range,
};
use crate::model::employee::EmployeeCard;
use crate::model::leave_request::{LeaveBalance, LeaveStatus};
use crate::repo::attendance::{self as attendance_repo, NewAttendance};
use crate::repo::leave_request as leave_repo;
use crate::utils::directory_cache;

fn local_time(record: &AttendanceRecord) -> NaiveDateTime {
    record.timestamp.with_timezone(&Local).naive_local()
}

#[derive(Deserialize, IntoParams)]
pub struct ActionsQuery {
    /// Employee to inspect; HR/Admin only when it is not the caller
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct ActionsResponse {
    pub employee: EmployeeCard,
    #[schema(nullable = true)]
    pub last_record_type: Option<RecordType>,
    pub available_actions: Vec<ClockAction>,
}

/// Valid next clock actions for an employee
#[utoipa::path(
    get,
    path = "/api/attendance/actions",
    params(ActionsQuery),
    responses(
        (status = 200, description = "Next permitted actions", body = ActionsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn actions(
    ClockUser(auth): ClockUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActionsQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = match query.employee_id {
        Some(id) if Some(id) != auth.employee_id => {
            auth.require_hr_or_admin()?;
            id
        }
        _ => auth.require_employee()?,
    };

    let employee = directory_cache::card(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    let last = attendance_repo::last_record_type(pool.get_ref(), employee_id).await?;

    Ok(HttpResponse::Ok().json(ActionsResponse {
        employee,
        last_record_type: last,
        available_actions: available_actions(last),
    }))
}

#[derive(Deserialize, ToSchema)]
pub struct RecordAttendance {
    #[schema(example = "IN")]
    pub record_type: RecordType,
    #[schema(example = "Main entrance", nullable = true)]
    pub location: Option<String>,
    #[schema(nullable = true)]
    pub note: Option<String>,
}

/// Record a clock event for the caller
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = RecordAttendance,
    responses(
        (status = 201, description = "Event recorded", body = Object, example = json!({
            "message": "Clock In recorded",
            "record": {
                "id": 10,
                "employee_id": 1000,
                "timestamp": "2026-01-05T08:58:12Z",
                "record_type": "IN",
                "location": "Main entrance",
                "note": null
            },
            "available_actions": [
                { "value": "OUT", "label": "Clock Out", "description": "Record your departure" },
                { "value": "BREAK_START", "label": "Break Start", "description": "Start a break" }
            ]
        })),
        (status = 400, description = "Malformed payload or unknown record type"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Record type inconsistent with the current state")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn record(
    ClockUser(auth): ClockUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RecordAttendance>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let payload = payload.into_inner();

    let new = NewAttendance {
        record_type: payload.record_type,
        location: payload.location.filter(|s| !s.trim().is_empty()),
        note: payload.note.filter(|s| !s.trim().is_empty()),
    };

    let record = attendance_repo::record(pool.get_ref(), employee_id, new)
        .await
        .inspect_err(|e| {
            tracing::info!(error = %e, employee_id, "Attendance record rejected");
        })?;

    tracing::info!(
        employee_id,
        record_id = record.id,
        record_type = %record.record_type,
        "Attendance recorded"
    );

    Ok(HttpResponse::Created().json(json!({
        "message": format!("{} recorded", record.record_type.label()),
        "available_actions": available_actions(Some(record.record_type)),
        "record": record,
    })))
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// day | week | month | year (default week)
    pub period: Option<Period>,
    /// YYYY-MM-DD, used together with `end_date`
    pub start_date: Option<String>,
    /// YYYY-MM-DD, used together with `start_date`
    pub end_date: Option<String>,
    /// IN, OUT, BREAK_START, BREAK_END or ALL
    pub record_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub employee: EmployeeCard,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub end_date: Option<NaiveDate>,
    pub total_records: usize,
    pub days: Vec<DayHistory>,
}

pub(crate) fn parse_record_filter(raw: Option<&str>) -> Result<Option<RecordType>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("ALL") => Ok(None),
        Some(s) => s
            .to_ascii_uppercase()
            .parse::<RecordType>()
            .map(Some)
            .map_err(|_| AppError::validation(format!("Unknown record type: {s}"))),
    }
}

/// Caller's attendance grouped per day
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Attendance per day, newest first", body = HistoryResponse),
        (status = 400, description = "Unknown record type"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let record_type = parse_record_filter(query.record_type.as_deref())?;

    let range = resolve_range(
        query.period,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        today(),
    );

    let employee = directory_cache::card(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    let window = range.map(|(start, end)| local_window(start, end));
    let records = attendance_repo::history(pool.get_ref(), employee_id, window, record_type).await?;

    let local: Vec<_> = records.iter().map(|r| (local_time(r), r)).collect();
    let days = group_by_day(&local);

    Ok(HttpResponse::Ok().json(HistoryResponse {
        employee,
        start_date: range.map(|(s, _)| s),
        end_date: range.map(|(_, e)| e),
        total_records: records.len(),
        days,
    }))
}

#[derive(Serialize, ToSchema)]
pub struct LeaveSnapshot {
    #[serde(flatten)]
    pub balance: LeaveBalance,
    pub pending_requests: i64,
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub employee: EmployeeCard,
    pub month: MonthStats,
    pub leave: LeaveSnapshot,
}

/// Presence figures for the current month and leave balance for the year
#[utoipa::path(
    get,
    path = "/api/attendance/stats",
    responses(
        (status = 200, description = "Monthly attendance and yearly leave figures", body = StatsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn stats(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.require_employee()?;
    let today = today();
    let month_start = today.with_day(1).unwrap_or(today);

    let employee = directory_cache::card(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    let records = attendance_repo::history(
        pool.get_ref(),
        employee_id,
        Some(local_window(month_start, today)),
        None,
    )
    .await?;
    let events: Vec<_> = records.iter().map(|r| (local_time(r), r.record_type)).collect();

    let approved = leave_repo::approved_in_year(pool.get_ref(), employee_id, today.year()).await?;
    let pending_requests = leave_repo::status_counts(pool.get_ref(), employee_id)
        .await?
        .into_iter()
        .find(|(status, _)| *status == LeaveStatus::Pending)
        .map(|(_, n)| n)
        .unwrap_or(0);

    Ok(HttpResponse::Ok().json(StatsResponse {
        employee,
        month: month_stats(&events, month_start, today),
        leave: LeaveSnapshot {
            balance: LeaveBalance::compute(config.annual_leave_quota, &approved),
            pending_requests,
        },
    }))
}
