use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Position held by an employee (distinct from the login role)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct JobTitle {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = "Senior Developer")]
    pub name: String,
    #[schema(nullable = true)]
    pub description: Option<String>,
}
