use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{MySqlExecutor, MySqlPool};

use crate::error::AppError;
use crate::model::attendance::{AttendanceRecord, RecordType, ensure_transition};
use crate::repo::employee;

pub struct NewAttendance {
    pub record_type: RecordType,
    pub location: Option<String>,
    pub note: Option<String>,
}

pub async fn last_record_type<'e, E>(ex: E, employee_id: u64) -> Result<Option<RecordType>, sqlx::Error>
where
    E: MySqlExecutor<'e>,
{
    sqlx::query_scalar::<_, RecordType>(
        r#"
        SELECT record_type
        FROM attendance_records
        WHERE employee_id = ?
        ORDER BY timestamp DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(ex)
    .await
}

/// Appends a clock event after re-checking it against the latest record.
/// The employee row stays locked until commit, so two submissions for the same
/// employee are applied one after the other.
pub async fn record(
    pool: &MySqlPool,
    employee_id: u64,
    new: NewAttendance,
) -> Result<AttendanceRecord, AppError> {
    let mut tx = pool.begin().await?;

    if !employee::lock(&mut *tx, employee_id).await? {
        return Err(AppError::not_found("Employee not found"));
    }

    let last = last_record_type(&mut *tx, employee_id).await?;
    ensure_transition(last, new.record_type)?;

    let timestamp = Utc::now().trunc_subsecs(0);
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (employee_id, timestamp, record_type, location, note)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(timestamp)
    .bind(new.record_type.as_ref())
    .bind(&new.location)
    .bind(&new.note)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(AttendanceRecord {
        id: result.last_insert_id(),
        employee_id,
        timestamp,
        record_type: new.record_type,
        location: new.location,
        note: new.note,
    })
}

/// Records in chronological order. `window` is a half-open `[from, to)` range.
pub async fn history(
    pool: &MySqlPool,
    employee_id: u64,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    record_type: Option<RecordType>,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let mut sql = String::from(
        r#"
        SELECT id, employee_id, timestamp, record_type, location, note
        FROM attendance_records
        WHERE employee_id = ?
        "#,
    );
    if window.is_some() {
        sql.push_str(" AND timestamp >= ? AND timestamp < ?");
    }
    if record_type.is_some() {
        sql.push_str(" AND record_type = ?");
    }
    sql.push_str(" ORDER BY timestamp ASC, id ASC");

    let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql).bind(employee_id);
    if let Some((from, to)) = window {
        query = query.bind(from).bind(to);
    }
    if let Some(kind) = record_type {
        query = query.bind(kind.to_string());
    }

    query.fetch_all(pool).await
}
