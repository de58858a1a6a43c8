use chrono::NaiveDate;
use futures_util::stream::BoxStream;
use serde::Deserialize;
use sqlx::{MySqlConnection, MySqlPool};
use utoipa::ToSchema;

use crate::error::{AppError, constraint_error};
use crate::model::employee::Employee;
use crate::repo::{FilterValue, bind_all};

macro_rules! select_employee {
    () => {
        r#"
        SELECT e.id, e.employee_code, e.first_name, e.last_name, e.email, e.phone,
               e.department_id, d.name AS department,
               e.job_title_id, j.name AS job_title,
               e.nfc_id, e.qr_code, e.hire_date, e.status
        FROM employees e
        LEFT JOIN departments d ON d.id = e.department_id
        LEFT JOIN job_titles j ON j.id = e.job_title_id
        "#
    };
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678")]
    pub phone: Option<String>,
    #[schema(example = 1)]
    pub department_id: Option<u64>,
    #[schema(example = 2)]
    pub job_title_id: Option<u64>,
    #[schema(example = "04:A2:3B:1C")]
    pub nfc_id: Option<String>,
    #[schema(example = "EMP-001-7f3a")]
    pub qr_code: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Default)]
pub struct EmployeeFilter {
    pub department_id: Option<u64>,
    pub job_title_id: Option<u64>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

pub async fn find(pool: &MySqlPool, employee_id: u64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(concat!(select_employee!(), " WHERE e.id = ?"))
        .bind(employee_id)
        .fetch_optional(pool)
        .await
}

/// Looks an employee up by badge: NFC id first, then QR payload.
pub async fn find_by_badge(
    pool: &MySqlPool,
    nfc_id: Option<&str>,
    qr_code: Option<&str>,
) -> Result<Option<Employee>, sqlx::Error> {
    if let Some(nfc_id) = nfc_id {
        let found = sqlx::query_as::<_, Employee>(concat!(select_employee!(), " WHERE e.nfc_id = ?"))
            .bind(nfc_id)
            .fetch_optional(pool)
            .await?;
        if found.is_some() {
            return Ok(found);
        }
    }

    if let Some(qr_code) = qr_code {
        return sqlx::query_as::<_, Employee>(concat!(select_employee!(), " WHERE e.qr_code = ?"))
            .bind(qr_code)
            .fetch_optional(pool)
            .await;
    }

    Ok(None)
}

pub fn stream_active(pool: &MySqlPool) -> BoxStream<'_, Result<Employee, sqlx::Error>> {
    sqlx::query_as::<_, Employee>(concat!(select_employee!(), " WHERE e.status = 'active'"))
        .fetch(pool)
}

/// Locks the employee row for the rest of the transaction.
/// Returns `false` when the employee does not exist.
pub async fn lock(conn: &mut MySqlConnection, employee_id: u64) -> Result<bool, sqlx::Error> {
    let row: Option<(u64,)> = sqlx::query_as("SELECT id FROM employees WHERE id = ? FOR UPDATE")
        .bind(employee_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn create(pool: &MySqlPool, new: &NewEmployee) -> Result<Employee, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, phone,
             department_id, job_title_id, nfc_id, qr_code, hire_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.employee_code)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(new.department_id)
    .bind(new.job_title_id)
    .bind(&new.nfc_id)
    .bind(&new.qr_code)
    .bind(new.hire_date)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "Employee code, NFC id or QR code already in use"))?;

    find(pool, result.last_insert_id())
        .await?
        .ok_or_else(|| AppError::Internal("Created employee not found".into()))
}

pub async fn list(pool: &MySqlPool, filter: &EmployeeFilter) -> Result<(Vec<Employee>, i64), sqlx::Error> {
    let mut conditions = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(department_id) = filter.department_id {
        conditions.push("e.department_id = ?");
        args.push(FilterValue::U64(department_id));
    }

    if let Some(job_title_id) = filter.job_title_id {
        conditions.push("e.job_title_id = ?");
        args.push(FilterValue::U64(job_title_id));
    }

    if let Some(status) = filter.status.as_deref() {
        conditions.push("e.status = ?");
        args.push(FilterValue::Str(status));
    }

    let like = filter.search.as_deref().map(|s| format!("%{}%", s));
    if let Some(like) = like.as_deref() {
        conditions.push("(e.first_name LIKE ? OR e.last_name LIKE ? OR e.email LIKE ?)");
        args.push(FilterValue::Str(like));
        args.push(FilterValue::Str(like));
        args.push(FilterValue::Str(like));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employees e{}", where_clause);
    tracing::debug!(sql = %count_sql, "Counting employees");
    let total = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), &args)
        .fetch_one(pool)
        .await?;

    let data_sql = format!(
        "{}{} ORDER BY e.id DESC LIMIT ? OFFSET ?",
        select_employee!(),
        where_clause
    );
    let employees = bind_all!(sqlx::query_as::<_, Employee>(&data_sql), &args)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await?;

    Ok((employees, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_employee(code: &str, department_id: Option<u64>) -> NewEmployee {
        NewEmployee {
            employee_code: code.into(),
            first_name: "Jane".into(),
            last_name: "Roe".into(),
            email: format!("{}@example.com", code.to_lowercase()),
            phone: None,
            department_id,
            job_title_id: None,
            nfc_id: Some(format!("NFC-{code}")),
            qr_code: None,
            hire_date: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_department_is_a_validation_error(pool: MySqlPool) {
        let err = create(&pool, &new_employee("EMP-E1", Some(9999)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{err:?}");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_code_conflicts_and_badge_resolves(pool: MySqlPool) {
        let created = create(&pool, &new_employee("EMP-E2", None)).await.unwrap();

        let err = create(&pool, &new_employee("EMP-E2", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        let found = find_by_badge(&pool, Some("NFC-EMP-E2"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
    }
}
