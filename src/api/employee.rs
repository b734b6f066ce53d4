use crate::{
    error::{ApiError, is_foreign_key_violation, is_unique_violation},
    model::employee::Employee,
    utils::{
        db_utils::{SqlValue, UpdateBuilder, bind_query_as, execute_update},
        filters::{Ordering, search_condition, search_terms, where_clause},
        validation::{self, FieldErrors},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const FULL_NAME_MAX: usize = 120;

// Attendance is unique per (employee, date), so the LEFT JOIN adds at most
// one row per employee: the whole page is annotated in a single query.
const EMPLOYEE_SELECT: &str = r#"
    SELECT
        e.id,
        e.emp_id,
        e.full_name,
        e.email,
        e.department_id,
        d.name AS department_name,
        ta.status AS today_attendance,
        ta.id AS today_attendance_id
    FROM employees e
    INNER JOIN departments d ON d.id = e.department_id
    LEFT JOIN attendances ta ON ta.employee_id = e.id AND ta.date = ?
"#;

const SEARCH_COLUMNS: &[&str] = &[
    "e.emp_id",
    "e.full_name",
    "e.email",
    "CAST(d.id AS CHAR)",
    "d.name",
];

const ORDERING: Ordering<'static> = Ordering {
    fields: &[
        ("emp_id", "e.emp_id"),
        ("full_name", "e.full_name"),
        ("email", "e.email"),
        ("department__name", "d.name"),
        ("department_name", "d.name"),
    ],
    default: &[],
    tiebreak: "e.id ASC",
};

#[derive(Deserialize, Serialize, ToSchema)]
pub struct EmployeePayload {
    #[schema(example = "E100")]
    pub emp_id: Option<String>,
    #[schema(example = "Jane Doe")]
    pub full_name: Option<String>,
    #[schema(example = "e100@x.com", format = "email")]
    pub email: Option<String>,
    /// Department id
    #[serde(alias = "department_id")]
    #[schema(example = 1)]
    pub department: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    /// Terms matched against emp_id, full_name, email, department id and name
    pub search: Option<String>,
    /// `emp_id`, `full_name`, `email`, `department__name`; prefix `-` for descending
    pub ordering: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
struct EmployeeChanges {
    emp_id: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    department_id: Option<u64>,
}

impl EmployeePayload {
    fn validate(self, partial: bool) -> Result<EmployeeChanges, ApiError> {
        let mut errors = FieldErrors::default();

        let changes = EmployeeChanges {
            emp_id: validation::emp_id(&mut errors, self.emp_id, partial),
            full_name: validation::text(&mut errors, "full_name", self.full_name, FULL_NAME_MAX, partial),
            email: validation::email(&mut errors, self.email, partial),
            department_id: validation::reference(&mut errors, "department", self.department, partial),
        };

        errors.into_result()?;
        Ok(changes)
    }
}

/// SQL and bindings for the annotated employee query. `today` is always the first binding.
fn employee_select_sql(today: NaiveDate, query: &EmployeeQuery, id: Option<u64>) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut bindings = vec![SqlValue::Date(today)];

    if let Some(id) = id {
        conditions.push("e.id = ?".to_string());
        bindings.push(SqlValue::U64(id));
    }

    let terms = search_terms(query.search.as_deref());
    if let Some((condition, values)) = search_condition(&terms, SEARCH_COLUMNS) {
        conditions.push(condition);
        bindings.extend(values);
    }

    let sql = format!(
        "{} {} {}",
        EMPLOYEE_SELECT,
        where_clause(&conditions),
        ORDERING.order_by(query.ordering.as_deref())
    );

    (sql, bindings)
}

/// Employees matching `query`, each annotated with its attendance on `today`.
pub async fn fetch_employees(
    pool: &MySqlPool,
    today: NaiveDate,
    query: &EmployeeQuery,
) -> Result<Vec<Employee>, sqlx::Error> {
    let (sql, bindings) = employee_select_sql(today, query, None);
    debug!(sql = %sql, bindings = ?bindings, "Fetching employees");

    bind_query_as(sqlx::query_as::<_, Employee>(&sql), bindings)
        .fetch_all(pool)
        .await
}

pub async fn fetch_employee(
    pool: &MySqlPool,
    today: NaiveDate,
    employee_id: u64,
) -> Result<Option<Employee>, sqlx::Error> {
    let (sql, bindings) = employee_select_sql(today, &EmployeeQuery::default(), Some(employee_id));

    bind_query_as(sqlx::query_as::<_, Employee>(&sql), bindings)
        .fetch_optional(pool)
        .await
}

async fn load_employee(pool: &MySqlPool, employee_id: u64) -> Result<Employee, ApiError> {
    fetch_employee(pool, Local::now().date_naive(), employee_id)
        .await?
        .ok_or(ApiError::NotFound("Employee"))
}

/// Reference and uniqueness checks that need the database.
async fn check_constraints(
    pool: &MySqlPool,
    changes: &EmployeeChanges,
    exclude_id: u64,
) -> Result<(), ApiError> {
    if let Some(department_id) = changes.department_id {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments WHERE id = ?")
            .bind(department_id)
            .fetch_one(pool)
            .await?;
        if found == 0 {
            return Err(ApiError::invalid(
                "department",
                format!("Invalid pk \"{department_id}\" - object does not exist."),
            ));
        }
    }

    let mut conflicts = FieldErrors::default();

    if let Some(emp_id) = &changes.emp_id {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM employees WHERE emp_id = ? AND id <> ?",
        )
        .bind(emp_id)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        if taken > 0 {
            conflicts.add("emp_id", "employee with this emp id already exists.");
        }
    }

    if let Some(email) = &changes.email {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM employees WHERE email = ? AND id <> ?",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        if taken > 0 {
            conflicts.add("email", "employee with this email already exists.");
        }
    }

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(ApiError::conflict_on("Employee already exists", conflicts))
    }
}

// Races past `check_constraints` still end up here through the table constraints.
fn write_error(e: sqlx::Error, department_id: Option<u64>) -> ApiError {
    if is_foreign_key_violation(&e) {
        let id = department_id.map(|id| id.to_string()).unwrap_or_default();
        return ApiError::invalid(
            "department",
            format!("Invalid pk \"{id}\" - object does not exist."),
        );
    }
    if is_unique_violation(&e) {
        return ApiError::conflict("An employee with this emp_id or email already exists");
    }
    ApiError::from(e)
}

/// List Employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Employees with today's attendance", body = [Employee])
    ),
    tag = "Employee"
)]
pub async fn list_employees(
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, ApiError> {
    let today = Local::now().date_naive();

    let employees = fetch_employees(pool.get_ref(), today, &query)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch employees");
            ApiError::Internal
        })?;

    Ok(HttpResponse::Ok().json(employees))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = EmployeePayload,
    responses(
        (status = 201, description = "Employee created successfully", body = Employee),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": { "emp_id": ["This field cannot contain spaces."] }
        })),
        (status = 409, description = "emp_id or email already taken", body = Object, example = json!({
            "message": "Employee already exists",
            "errors": { "email": ["employee with this email already exists."] }
        }))
    ),
    tag = "Employee"
)]
pub async fn create_employee(
    pool: web::Data<MySqlPool>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, ApiError> {
    let changes = payload.into_inner().validate(false)?;
    check_constraints(pool.get_ref(), &changes, 0).await?;

    let EmployeeChanges {
        emp_id: Some(emp_id),
        full_name: Some(full_name),
        email: Some(email),
        department_id: Some(department_id),
    } = changes
    else {
        return Err(ApiError::Internal);
    };

    let result = sqlx::query(
        r#"
        INSERT INTO employees (emp_id, full_name, email, department_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&emp_id)
    .bind(&full_name)
    .bind(&email)
    .bind(department_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| write_error(e, Some(department_id)))?;

    let employee = load_employee(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id = employee.id, emp_id = %employee.emp_id, "Employee created");

    Ok(HttpResponse::Created().json(employee))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee"
)]
pub async fn get_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let employee = load_employee(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

async fn apply_update(
    pool: &MySqlPool,
    employee_id: u64,
    payload: EmployeePayload,
    partial: bool,
) -> Result<HttpResponse, ApiError> {
    load_employee(pool, employee_id).await?;

    let changes = payload.validate(partial)?;
    check_constraints(pool, &changes, employee_id).await?;

    let department_id = changes.department_id;
    let update = UpdateBuilder::new("employees")
        .set_opt("emp_id", changes.emp_id)
        .set_opt("full_name", changes.full_name)
        .set_opt("email", changes.email)
        .set_opt("department_id", changes.department_id)
        .build("id", employee_id);

    if let Some(update) = update {
        execute_update(pool, update)
            .await
            .map_err(|e| write_error(e, department_id))?;
    }

    let employee = load_employee(pool, employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = EmployeePayload,
    responses(
        (status = 200, description = "Employee updated successfully", body = Employee),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "emp_id or email already taken")
    ),
    tag = "Employee"
)]
pub async fn update_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool.get_ref(), path.into_inner(), payload.into_inner(), false).await
}

/// Partially update Employee
#[utoipa::path(
    patch,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = EmployeePayload,
    responses(
        (status = 200, description = "Employee updated successfully", body = Employee),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "emp_id or email already taken")
    ),
    tag = "Employee"
)]
pub async fn patch_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool.get_ref(), path.into_inner(), payload.into_inner(), true).await
}

/// Delete Employee
///
/// Attendance records of the employee are removed with it.
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 204, description = "Successfully deleted"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee"
)]
pub async fn delete_employee(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to delete employee");
            ApiError::Internal
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Employee"));
    }

    Ok(HttpResponse::NoContent().finish())
}
