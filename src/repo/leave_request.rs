use chrono::{SubsecRound, Utc};
use sqlx::MySqlPool;

use crate::error::AppError;
use crate::model::leave_request::{
    DateRange, LeaveAction, LeaveRequest, LeaveStatus, LeaveType, check_overlap, transition,
};
use crate::repo::{FilterValue, bind_all, employee};

macro_rules! select_leave {
    () => {
        r#"
        SELECT l.id, l.employee_id, l.start_date, l.end_date, l.leave_type, l.reason,
               l.status, l.request_date, l.response_date, l.response_by,
               NULLIF(TRIM(CONCAT(r.first_name, ' ', r.last_name)), '') AS processed_by
        FROM leave_requests l
        LEFT JOIN employees r ON r.id = l.response_by
        "#
    };
}

pub struct NewLeave {
    pub range: DateRange,
    pub leave_type: LeaveType,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LeaveFilter {
    pub employee_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub year: Option<i32>,
    pub limit: u64,
    pub offset: u64,
}

/// Persists a PENDING request once it is known not to overlap an approved one.
/// Date sanity (past start, reversed range) is the caller's job.
pub async fn create(
    pool: &MySqlPool,
    employee_id: u64,
    new: NewLeave,
) -> Result<LeaveRequest, AppError> {
    let mut tx = pool.begin().await?;

    if !employee::lock(&mut *tx, employee_id).await? {
        return Err(AppError::not_found("Employee not found"));
    }

    let approved = sqlx::query_as::<_, DateRange>(
        r#"
        SELECT start_date, end_date
        FROM leave_requests
        WHERE employee_id = ? AND status = ?
        "#,
    )
    .bind(employee_id)
    .bind(LeaveStatus::Approved.as_ref())
    .fetch_all(&mut *tx)
    .await?;

    check_overlap(&new.range, &approved)?;

    let request_date = Utc::now().trunc_subsecs(0);
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, start_date, end_date, leave_type, reason, status, request_date)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(new.range.start_date)
    .bind(new.range.end_date)
    .bind(new.leave_type.as_ref())
    .bind(&new.reason)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(request_date)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(LeaveRequest {
        id: result.last_insert_id(),
        employee_id,
        start_date: new.range.start_date,
        end_date: new.range.end_date,
        leave_type: new.leave_type,
        reason: new.reason,
        status: LeaveStatus::Pending,
        request_date,
        response_date: None,
        response_by: None,
        processed_by: None,
    })
}

pub async fn find(pool: &MySqlPool, leave_id: u64) -> Result<Option<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(concat!(select_leave!(), " WHERE l.id = ?"))
        .bind(leave_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &MySqlPool,
    filter: &LeaveFilter,
) -> Result<(Vec<LeaveRequest>, i64), sqlx::Error> {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = filter.employee_id {
        where_sql.push_str(" AND l.employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = filter.status.as_ref() {
        where_sql.push_str(" AND l.status = ?");
        args.push(FilterValue::Str(status.as_ref()));
    }

    if let Some(year) = filter.year {
        where_sql.push_str(" AND YEAR(l.start_date) = ?");
        args.push(FilterValue::I32(year));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests l{}", where_sql);
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "{}{} ORDER BY l.request_date DESC, l.id DESC LIMIT ? OFFSET ?",
        select_leave!(),
        where_sql
    );
    let leaves = bind_all!(sqlx::query_as::<_, LeaveRequest>(&data_sql), &args)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await?;

    Ok((leaves, total))
}

/// Approves or rejects every PENDING request among `ids` in one statement.
/// Already resolved ids are left untouched; returns how many rows changed.
pub async fn respond(
    pool: &MySqlPool,
    ids: &[u64],
    action: LeaveAction,
    responder: Option<u64>,
) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        r#"
        UPDATE leave_requests
        SET status = ?, response_date = ?, response_by = ?
        WHERE status = ? AND id IN ({})
        "#,
        placeholders
    );

    let mut query = sqlx::query(&sql)
        .bind(action.target().to_string())
        .bind(Utc::now().trunc_subsecs(0))
        .bind(responder)
        .bind(LeaveStatus::Pending.to_string());
    for id in ids {
        query = query.bind(*id);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn status_of(pool: &MySqlPool, leave_id: u64) -> Result<Option<LeaveStatus>, sqlx::Error> {
    sqlx::query_scalar::<_, LeaveStatus>("SELECT status FROM leave_requests WHERE id = ?")
        .bind(leave_id)
        .fetch_optional(pool)
        .await
}

/// Owner-initiated PENDING → CANCELLED.
pub async fn cancel(pool: &MySqlPool, leave_id: u64, employee_id: u64) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, response_date = ?, response_by = ?
        WHERE id = ? AND employee_id = ? AND status = ?
        "#,
    )
    .bind(LeaveAction::Cancel.target().as_ref())
    .bind(Utc::now().trunc_subsecs(0))
    // Nobody responded; the owner withdrew it
    .bind(None::<u64>)
    .bind(leave_id)
    .bind(employee_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current = sqlx::query_scalar::<_, LeaveStatus>(
        "SELECT status FROM leave_requests WHERE id = ? AND employee_id = ?",
    )
    .bind(leave_id)
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    match current {
        None => Err(AppError::not_found("Leave request not found")),
        Some(status) => {
            transition(status, LeaveAction::Cancel)?;
            // Still pending yet nothing was updated: lost a race with another writer
            Err(AppError::Conflict("Leave request changed concurrently, retry".into()))
        }
    }
}

/// APPROVED intervals starting in `year`
pub async fn approved_in_year(
    pool: &MySqlPool,
    employee_id: u64,
    year: i32,
) -> Result<Vec<DateRange>, sqlx::Error> {
    sqlx::query_as::<_, DateRange>(
        r#"
        SELECT start_date, end_date
        FROM leave_requests
        WHERE employee_id = ? AND status = ? AND YEAR(start_date) = ?
        "#,
    )
    .bind(employee_id)
    .bind(LeaveStatus::Approved.as_ref())
    .bind(year)
    .fetch_all(pool)
    .await
}

pub async fn status_counts(
    pool: &MySqlPool,
    employee_id: u64,
) -> Result<Vec<(LeaveStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (LeaveStatus, i64)>(
        r#"
        SELECT status, COUNT(*)
        FROM leave_requests
        WHERE employee_id = ?
        GROUP BY status
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::fixtures;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vacation(start: NaiveDate, end: NaiveDate) -> NewLeave {
        NewLeave {
            range: DateRange::new(start, end),
            leave_type: LeaveType::Vacation,
            reason: "Family trip".into(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn approving_twice_changes_one_row_then_none(pool: MySqlPool) {
        let emp = fixtures::employee(&pool, "EMP-L1").await;
        let hr = fixtures::employee(&pool, "EMP-HR").await;
        let leave = create(&pool, emp, vacation(date(2030, 3, 2), date(2030, 3, 4)))
            .await
            .unwrap();

        assert_eq!(respond(&pool, &[leave.id], LeaveAction::Approve, Some(hr)).await.unwrap(), 1);
        assert_eq!(respond(&pool, &[leave.id], LeaveAction::Approve, Some(hr)).await.unwrap(), 0);
        assert_eq!(respond(&pool, &[leave.id], LeaveAction::Reject, Some(hr)).await.unwrap(), 0);

        let stored = find(&pool, leave.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeaveStatus::Approved);
        assert_eq!(stored.response_by, Some(hr));
        assert_eq!(stored.processed_by.as_deref(), Some("EMP-HR Tester"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bulk_respond_skips_resolved_requests(pool: MySqlPool) {
        let emp = fixtures::employee(&pool, "EMP-L2").await;
        let first = create(&pool, emp, vacation(date(2030, 4, 1), date(2030, 4, 2)))
            .await
            .unwrap();
        let second = create(&pool, emp, vacation(date(2030, 5, 1), date(2030, 5, 2)))
            .await
            .unwrap();

        respond(&pool, &[first.id], LeaveAction::Reject, None).await.unwrap();
        let affected = respond(&pool, &[first.id, second.id], LeaveAction::Approve, None)
            .await
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(status_of(&pool, first.id).await.unwrap(), Some(LeaveStatus::Rejected));
        assert_eq!(status_of(&pool, second.id).await.unwrap(), Some(LeaveStatus::Approved));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn overlapping_an_approved_leave_is_refused(pool: MySqlPool) {
        let emp = fixtures::employee(&pool, "EMP-L3").await;
        sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_id, start_date, end_date, leave_type, reason, status, request_date)
            VALUES (?, ?, ?, 'VACATION', 'Summer', 'APPROVED', ?)
            "#,
        )
        .bind(emp)
        .bind(date(2030, 6, 14))
        .bind(date(2030, 6, 20))
        .bind(Utc::now().trunc_subsecs(0))
        .execute(&pool)
        .await
        .unwrap();

        let err = create(&pool, emp, vacation(date(2030, 6, 10), date(2030, 6, 15)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        let filter = LeaveFilter {
            employee_id: Some(emp),
            limit: 10,
            ..Default::default()
        };
        let (_, total) = list(&pool, &filter).await.unwrap();
        assert_eq!(total, 1);

        // Adjacent days do not overlap
        create(&pool, emp, vacation(date(2030, 6, 21), date(2030, 6, 22)))
            .await
            .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn cancel_leaves_no_responder(pool: MySqlPool) {
        let emp = fixtures::employee(&pool, "EMP-L4").await;
        let other = fixtures::employee(&pool, "EMP-L5").await;
        let leave = create(&pool, emp, vacation(date(2030, 7, 1), date(2030, 7, 3)))
            .await
            .unwrap();

        let err = cancel(&pool, leave.id, other).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{err:?}");

        cancel(&pool, leave.id, emp).await.unwrap();

        let stored = find(&pool, leave.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeaveStatus::Cancelled);
        assert!(stored.response_date.is_some());
        assert_eq!(stored.response_by, None);
        assert_eq!(stored.processed_by, None);

        let err = cancel(&pool, leave.id, emp).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    }
}
