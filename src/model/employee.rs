use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Employee as returned by the API: joined with its department and annotated
/// with the attendance record for the requested day, if one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "emp_id": "E100",
        "full_name": "Jane Doe",
        "email": "e100@x.com",
        "department": 1,
        "department_name": "Engineering",
        "today_attendance": "Present",
        "today_attendance_id": 12
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "E100")]
    pub emp_id: String,

    #[schema(example = "Jane Doe")]
    pub full_name: String,

    #[schema(example = "e100@x.com", format = "email")]
    pub email: String,

    #[serde(rename = "department")]
    #[schema(example = 1)]
    pub department_id: u64,

    #[schema(example = "Engineering")]
    pub department_name: String,

    #[schema(example = "Present", nullable = true)]
    pub today_attendance: Option<String>,

    #[schema(example = 12, nullable = true)]
    pub today_attendance_id: Option<u64>,
}
