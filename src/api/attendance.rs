use crate::{
    error::{ApiError, is_foreign_key_violation, is_unique_violation},
    model::attendance::{Attendance, AttendanceStatus},
    utils::{
        db_utils::{SqlValue, UpdateBuilder, bind_query_as, execute_update},
        filters::{Ordering, search_condition, search_terms, where_clause},
        validation::{self, FieldErrors},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_SELECT: &str = r#"
    SELECT a.id, a.date, a.employee_id, a.status
    FROM attendances a
    INNER JOIN employees e ON e.id = a.employee_id
"#;

const SEARCH_COLUMNS: &[&str] = &[
    "CAST(e.id AS CHAR)",
    "e.emp_id",
    "e.full_name",
    "DATE_FORMAT(a.date, '%Y-%m-%d')",
];

const ORDERING: Ordering<'static> = Ordering {
    fields: &[("date", "a.date")],
    default: &["a.date ASC"],
    tiebreak: "a.id ASC",
};

const DUPLICATE_DAY: &str = "The fields date, employee must make a unique set.";

#[derive(Deserialize, ToSchema)]
pub struct AttendancePayload {
    #[schema(example = "2026-10-19", format = "date", value_type = String)]
    pub date: Option<String>,
    /// Employee id
    #[serde(alias = "employee_id")]
    #[schema(example = 1)]
    pub employee: Option<u64>,
    #[schema(example = "Present", value_type = AttendanceStatus)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// Exact employee id
    pub employee: Option<u64>,
    /// Exact status (`Present` or `Absent`)
    pub status: Option<AttendanceStatus>,
    /// Inclusive lower date bound
    #[param(value_type = Option<String>)]
    pub date_after: Option<NaiveDate>,
    /// Inclusive upper date bound
    #[param(value_type = Option<String>)]
    pub date_before: Option<NaiveDate>,
    /// Terms matched against employee id, emp_id, full_name and date
    pub search: Option<String>,
    /// `date` (default) or `-date`
    pub ordering: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
struct AttendanceChanges {
    date: Option<NaiveDate>,
    employee_id: Option<u64>,
    status: Option<AttendanceStatus>,
}

impl AttendancePayload {
    fn validate(self, partial: bool) -> Result<AttendanceChanges, ApiError> {
        let mut errors = FieldErrors::default();

        let changes = AttendanceChanges {
            date: validation::date(&mut errors, "date", self.date, partial),
            employee_id: validation::reference(&mut errors, "employee", self.employee, partial),
            status: validation::choice(&mut errors, "status", self.status, partial),
        };

        errors.into_result()?;
        Ok(changes)
    }
}

fn attendance_select_sql(query: &AttendanceQuery) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    if let Some(employee_id) = query.employee {
        conditions.push("a.employee_id = ?".to_string());
        bindings.push(SqlValue::U64(employee_id));
    }

    if let Some(status) = query.status {
        conditions.push("a.status = ?".to_string());
        bindings.push(status.into());
    }

    if let Some(after) = query.date_after {
        conditions.push("a.date >= ?".to_string());
        bindings.push(SqlValue::Date(after));
    }

    if let Some(before) = query.date_before {
        conditions.push("a.date <= ?".to_string());
        bindings.push(SqlValue::Date(before));
    }

    let terms = search_terms(query.search.as_deref());
    if let Some((condition, values)) = search_condition(&terms, SEARCH_COLUMNS) {
        conditions.push(condition);
        bindings.extend(values);
    }

    let sql = format!(
        "{} {} {}",
        ATTENDANCE_SELECT,
        where_clause(&conditions),
        ORDERING.order_by(query.ordering.as_deref())
    );

    (sql, bindings)
}

async fn fetch_attendance(pool: &MySqlPool, id: u64) -> Result<Attendance, ApiError> {
    sqlx::query_as::<_, Attendance>(
        "SELECT id, date, employee_id, status FROM attendances WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound("Attendance"))
}

fn duplicate_day() -> ApiError {
    let mut errors = FieldErrors::default();
    errors.add("non_field_errors", DUPLICATE_DAY);
    ApiError::conflict_on("Attendance already recorded for this employee and date", errors)
}

/// Checks the employee reference and the one-record-per-day rule for the
/// record as it would look after the write.
async fn check_constraints(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
    employee_changed: bool,
    exclude_id: u64,
) -> Result<(), ApiError> {
    if employee_changed {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(pool)
            .await?;
        if found == 0 {
            return Err(ApiError::invalid(
                "employee",
                format!("Invalid pk \"{employee_id}\" - object does not exist."),
            ));
        }
    }

    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendances WHERE employee_id = ? AND date = ? AND id <> ?",
    )
    .bind(employee_id)
    .bind(date)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;

    if taken > 0 {
        return Err(duplicate_day());
    }
    Ok(())
}

// Concurrent writers that both pass `check_constraints` are settled by the
// unique (employee, date) constraint.
fn write_error(e: sqlx::Error, employee_id: u64) -> ApiError {
    if is_unique_violation(&e) {
        return duplicate_day();
    }
    if is_foreign_key_violation(&e) {
        return ApiError::invalid(
            "employee",
            format!("Invalid pk \"{employee_id}\" - object does not exist."),
        );
    }
    ApiError::from(e)
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/attendances",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance records ordered by date", body = [Attendance]),
        (status = 400, description = "Malformed query parameters")
    ),
    tag = "Attendance"
)]
pub async fn list_attendances(
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let (sql, bindings) = attendance_select_sql(&query);
    debug!(sql = %sql, bindings = ?bindings, "Fetching attendance records");

    let records = bind_query_as(sqlx::query_as::<_, Attendance>(&sql), bindings)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, sql = %sql, "Failed to fetch attendance records");
            ApiError::Internal
        })?;

    Ok(HttpResponse::Ok().json(records))
}

/// Record attendance
#[utoipa::path(
    post,
    path = "/api/attendances",
    request_body = AttendancePayload,
    responses(
        (status = 201, description = "Attendance recorded", body = Attendance),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": { "status": ["\"Late\" is not a valid choice."] }
        })),
        (status = 409, description = "Already recorded for this employee and date", body = Object, example = json!({
            "message": "Attendance already recorded for this employee and date",
            "errors": { "non_field_errors": ["The fields date, employee must make a unique set."] }
        }))
    ),
    tag = "Attendance"
)]
pub async fn create_attendance(
    pool: web::Data<MySqlPool>,
    payload: web::Json<AttendancePayload>,
) -> Result<HttpResponse, ApiError> {
    let AttendanceChanges {
        date: Some(date),
        employee_id: Some(employee_id),
        status: Some(status),
    } = payload.into_inner().validate(false)?
    else {
        return Err(ApiError::Internal);
    };

    check_constraints(pool.get_ref(), employee_id, date, true, 0).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendances (date, employee_id, status)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(date)
    .bind(employee_id)
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| write_error(e, employee_id))?;

    let record = fetch_attendance(pool.get_ref(), result.last_insert_id()).await?;
    info!(attendance_id = record.id, employee_id, %date, %status, "Attendance recorded");

    Ok(HttpResponse::Created().json(record))
}

/// Get attendance record by ID
#[utoipa::path(
    get,
    path = "/api/attendances/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "Attendance ID")
    ),
    responses(
        (status = 200, description = "Attendance record found", body = Attendance),
        (status = 404, description = "Attendance not found", body = Object, example = json!({
            "message": "Attendance not found"
        }))
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let record = fetch_attendance(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn apply_update(
    pool: &MySqlPool,
    attendance_id: u64,
    payload: AttendancePayload,
    partial: bool,
) -> Result<HttpResponse, ApiError> {
    let current = fetch_attendance(pool, attendance_id).await?;
    let changes = payload.validate(partial)?;

    let employee_id = changes.employee_id.unwrap_or(current.employee_id);
    let date = changes.date.unwrap_or(current.date);
    let employee_changed = employee_id != current.employee_id;

    if employee_changed || date != current.date {
        check_constraints(pool, employee_id, date, employee_changed, attendance_id).await?;
    }

    let update = UpdateBuilder::new("attendances")
        .set_opt("date", changes.date)
        .set_opt("employee_id", changes.employee_id)
        .set_opt("status", changes.status)
        .build("id", attendance_id);

    if let Some(update) = update {
        execute_update(pool, update)
            .await
            .map_err(|e| write_error(e, employee_id))?;
    }

    let record = fetch_attendance(pool, attendance_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Update attendance record
#[utoipa::path(
    put,
    path = "/api/attendances/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "Attendance ID")
    ),
    request_body = AttendancePayload,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Attendance not found"),
        (status = 409, description = "Already recorded for this employee and date")
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AttendancePayload>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool.get_ref(), path.into_inner(), payload.into_inner(), false).await
}

/// Partially update attendance record
#[utoipa::path(
    patch,
    path = "/api/attendances/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "Attendance ID")
    ),
    request_body = AttendancePayload,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Attendance not found"),
        (status = 409, description = "Already recorded for this employee and date")
    ),
    tag = "Attendance"
)]
pub async fn patch_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AttendancePayload>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool.get_ref(), path.into_inner(), payload.into_inner(), true).await
}

/// Delete attendance record
#[utoipa::path(
    delete,
    path = "/api/attendances/{attendance_id}",
    params(
        ("attendance_id" = u64, Path, description = "Attendance ID")
    ),
    responses(
        (status = 204, description = "Successfully deleted"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let attendance_id = path.into_inner();

    let result = sqlx::query("DELETE FROM attendances WHERE id = ?")
        .bind(attendance_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, attendance_id, "Failed to delete attendance");
            ApiError::Internal
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Attendance"));
    }

    Ok(HttpResponse::NoContent().finish())
}
