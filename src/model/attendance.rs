use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttendanceStatus> for crate::utils::db_utils::SqlValue {
    fn from(status: AttendanceStatus) -> Self {
        status.as_ref().into()
    }
}

/// One employee's status for one day; unique per (employee, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "date": "2026-10-19",
    "employee": 1,
    "status": "Present"
}))]
pub struct Attendance {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "2026-10-19", format = "date", value_type = String)]
    pub date: NaiveDate,

    #[serde(rename = "employee")]
    #[schema(example = 1)]
    pub employee_id: u64,

    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
}
