use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::error::{AppError, constraint_error};
use crate::model::department::Department;
use crate::model::job_title::JobTitle;

/// Payload shared by departments and job titles
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewOrgUnit {
    #[schema(example = "Engineering")]
    pub name: String,
    #[schema(example = "Builds and runs the product", nullable = true)]
    pub description: Option<String>,
}

pub async fn list_departments(pool: &MySqlPool) -> Result<Vec<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>("SELECT id, name, description FROM departments ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn create_department(pool: &MySqlPool, new: &NewOrgUnit) -> Result<Department, AppError> {
    let result = sqlx::query("INSERT INTO departments (name, description) VALUES (?, ?)")
        .bind(new.name.trim())
        .bind(&new.description)
        .execute(pool)
        .await
        .map_err(|e| constraint_error(e, "Department already exists"))?;

    Ok(Department {
        id: result.last_insert_id(),
        name: new.name.trim().to_string(),
        description: new.description.clone(),
    })
}

pub async fn list_job_titles(pool: &MySqlPool) -> Result<Vec<JobTitle>, sqlx::Error> {
    sqlx::query_as::<_, JobTitle>("SELECT id, name, description FROM job_titles ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn create_job_title(pool: &MySqlPool, new: &NewOrgUnit) -> Result<JobTitle, AppError> {
    let result = sqlx::query("INSERT INTO job_titles (name, description) VALUES (?, ?)")
        .bind(new.name.trim())
        .bind(&new.description)
        .execute(pool)
        .await
        .map_err(|e| constraint_error(e, "Job title already exists"))?;

    Ok(JobTitle {
        id: result.last_insert_id(),
        name: new.name.trim().to_string(),
        description: new.description.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> NewOrgUnit {
        NewOrgUnit {
            name: name.into(),
            description: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_names_conflict(pool: MySqlPool) {
        create_department(&pool, &unit("Engineering")).await.unwrap();
        let err = create_department(&pool, &unit(" Engineering ")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        create_job_title(&pool, &unit("Developer")).await.unwrap();
        let err = create_job_title(&pool, &unit("Developer")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        assert_eq!(list_departments(&pool).await.unwrap().len(), 1);
    }
}
