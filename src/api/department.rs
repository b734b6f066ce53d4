use crate::{
    error::{ApiError, is_foreign_key_violation, is_unique_violation},
    model::department::Department,
    utils::{
        db_utils::{UpdateBuilder, bind_query_as, execute_update},
        filters::{Ordering, search_condition, search_terms, where_clause},
        validation::{self, FieldErrors},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

const NAME_MAX: usize = 50;

const ORDERING: Ordering<'static> = Ordering {
    fields: &[("id", "id"), ("name", "name")],
    default: &[],
    tiebreak: "id ASC",
};

#[derive(Deserialize, ToSchema)]
pub struct DepartmentPayload {
    #[schema(example = "Engineering")]
    pub name: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct DepartmentQuery {
    /// Case-insensitive substring match on name
    pub search: Option<String>,
    /// `name`, `id`; prefix with `-` for descending
    pub ordering: Option<String>,
}

impl DepartmentPayload {
    fn validate(self, partial: bool) -> Result<Option<String>, ApiError> {
        let mut errors = FieldErrors::default();
        let name = validation::text(&mut errors, "name", self.name, NAME_MAX, partial);
        errors.into_result()?;
        Ok(name)
    }
}

async fn fetch_department(pool: &MySqlPool, id: u64) -> Result<Department, ApiError> {
    sqlx::query_as::<_, Department>("SELECT id, name FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("Department"))
}

async fn ensure_name_free(pool: &MySqlPool, name: &str, exclude_id: u64) -> Result<(), ApiError> {
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM departments WHERE name = ? AND id <> ?",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;

    if taken > 0 {
        let mut errors = FieldErrors::default();
        errors.add("name", "department with this name already exists.");
        return Err(ApiError::conflict_on("Department already exists", errors));
    }
    Ok(())
}

fn write_error(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        let mut errors = FieldErrors::default();
        errors.add("name", "department with this name already exists.");
        return ApiError::conflict_on("Department already exists", errors);
    }
    ApiError::from(e)
}

/// List departments
#[utoipa::path(
    get,
    path = "/api/departments",
    params(DepartmentQuery),
    responses(
        (status = 200, description = "All departments", body = [Department])
    ),
    tag = "Department"
)]
pub async fn list_departments(
    pool: web::Data<MySqlPool>,
    query: web::Query<DepartmentQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    let terms = search_terms(query.search.as_deref());
    if let Some((condition, values)) = search_condition(&terms, &["name"]) {
        conditions.push(condition);
        bindings.extend(values);
    }

    let sql = format!(
        "SELECT id, name FROM departments {} {}",
        where_clause(&conditions),
        ORDERING.order_by(query.ordering.as_deref())
    );
    debug!(sql = %sql, bindings = ?bindings, "Fetching departments");

    let departments = bind_query_as(sqlx::query_as::<_, Department>(&sql), bindings)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(departments))
}

/// Create Department
#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentPayload,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": { "name": ["This field may not be blank."] }
        })),
        (status = 409, description = "Name already taken")
    ),
    tag = "Department"
)]
pub async fn create_department(
    pool: web::Data<MySqlPool>,
    payload: web::Json<DepartmentPayload>,
) -> Result<HttpResponse, ApiError> {
    let Some(name) = payload.into_inner().validate(false)? else {
        return Err(ApiError::invalid("name", validation::REQUIRED));
    };

    ensure_name_free(pool.get_ref(), &name, 0).await?;

    let result = sqlx::query("INSERT INTO departments (name) VALUES (?)")
        .bind(&name)
        .execute(pool.get_ref())
        .await
        .map_err(write_error)?;

    let department = fetch_department(pool.get_ref(), result.last_insert_id()).await?;
    info!(department_id = department.id, "Department created");

    Ok(HttpResponse::Created().json(department))
}

/// Get Department by ID
#[utoipa::path(
    get,
    path = "/api/departments/{department_id}",
    params(
        ("department_id" = u64, Path, description = "Department ID")
    ),
    responses(
        (status = 200, description = "Department found", body = Department),
        (status = 404, description = "Department not found", body = Object, example = json!({
            "message": "Department not found"
        }))
    ),
    tag = "Department"
)]
pub async fn get_department(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let department = fetch_department(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(department))
}

async fn apply_update(
    pool: &MySqlPool,
    department_id: u64,
    payload: DepartmentPayload,
    partial: bool,
) -> Result<HttpResponse, ApiError> {
    fetch_department(pool, department_id).await?;

    let name = payload.validate(partial)?;
    if let Some(name) = &name {
        ensure_name_free(pool, name, department_id).await?;
    }

    if let Some(update) = UpdateBuilder::new("departments")
        .set_opt("name", name)
        .build("id", department_id)
    {
        execute_update(pool, update).await.map_err(write_error)?;
    }

    let department = fetch_department(pool, department_id).await?;
    Ok(HttpResponse::Ok().json(department))
}

/// Update Department
#[utoipa::path(
    put,
    path = "/api/departments/{department_id}",
    params(
        ("department_id" = u64, Path, description = "Department ID")
    ),
    request_body = DepartmentPayload,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Name already taken")
    ),
    tag = "Department"
)]
pub async fn update_department(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentPayload>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool.get_ref(), path.into_inner(), payload.into_inner(), false).await
}

/// Partially update Department
#[utoipa::path(
    patch,
    path = "/api/departments/{department_id}",
    params(
        ("department_id" = u64, Path, description = "Department ID")
    ),
    request_body = DepartmentPayload,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Name already taken")
    ),
    tag = "Department"
)]
pub async fn patch_department(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentPayload>,
) -> Result<HttpResponse, ApiError> {
    apply_update(pool.get_ref(), path.into_inner(), payload.into_inner(), true).await
}

/// Delete Department
///
/// Rejected while any employee still belongs to the department.
#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}",
    params(
        ("department_id" = u64, Path, description = "Department ID")
    ),
    responses(
        (status = 204, description = "Successfully deleted"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department still has employees", body = Object, example = json!({
            "message": "Cannot delete department: it still has employees"
        }))
    ),
    tag = "Department"
)]
pub async fn delete_department(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let department_id = path.into_inner();

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return ApiError::conflict("Cannot delete department: it still has employees");
            }
            error!(error = %e, department_id, "Failed to delete department");
            ApiError::Internal
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Department"));
    }

    Ok(HttpResponse::NoContent().finish())
}
