use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department_id": 10,
        "department": "Engineering",
        "job_title_id": 3,
        "job_title": "Developer",
        "nfc_id": "04:A2:3B:1C",
        "qr_code": "EMP-001-7f3a",
        "hire_date": "2024-01-01",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = 10, nullable = true)]
    pub department_id: Option<u64>,

    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,

    #[schema(example = 3, nullable = true)]
    pub job_title_id: Option<u64>,

    #[schema(example = "Developer", nullable = true)]
    pub job_title: Option<String>,

    #[schema(nullable = true)]
    pub nfc_id: Option<String>,

    #[schema(nullable = true)]
    pub qr_code: Option<String>,

    #[schema(
        example = "2024-01-01",
        value_type = String,
        format = "date",
        nullable = true
    )]
    pub hire_date: Option<NaiveDate>,

    #[schema(example = "active")]
    pub status: String,
}

impl Employee {
    pub fn card(&self) -> EmployeeCard {
        EmployeeCard {
            id: self.id,
            employee_code: self.employee_code.clone(),
            name: display_name(&self.first_name, &self.last_name, &self.employee_code),
            department: self.department.clone(),
            job_title: self.job_title.clone(),
        }
    }
}

/// Short identity of an employee as shown on kiosks and leave screens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EmployeeCard {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
    #[schema(example = "Developer", nullable = true)]
    pub job_title: Option<String>,
}

/// "first last", or the employee code when both names are blank.
pub fn display_name(first: &str, last: &str, fallback: &str) -> String {
    let full = format!("{} {}", first.trim(), last.trim());
    let full = full.trim();
    if full.is_empty() {
        fallback.to_string()
    } else {
        full.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_code() {
        assert_eq!(display_name("Jane", "Roe", "EMP-9"), "Jane Roe");
        assert_eq!(display_name("Jane", "", "EMP-9"), "Jane");
        assert_eq!(display_name("  ", "", "EMP-9"), "EMP-9");
    }
}
