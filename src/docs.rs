use crate::api::attendance::AttendancePayload;
use crate::api::department::DepartmentPayload;
use crate::api::employee::EmployeePayload;
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::department::Department;
use crate::model::employee::Employee;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS Lite API",
        version = "1.0.0",
        description = r#"
## HRMS Lite

Departments, employees and their daily attendance.

### 🔹 Resources
- **Departments**
  - Create, update, list, view and delete departments
  - A department cannot be deleted while employees belong to it
- **Employees**
  - Search by emp_id, name, email or department; order by emp_id, name, email or department name
  - Every employee carries `today_attendance` / `today_attendance_id` for the current day
  - Deleting an employee removes their attendance records
- **Attendance**
  - One record per employee per day, status `Present` or `Absent`
  - Filter by employee, status and date range; ordered by date

### 📦 Response Format
- JSON bodies; lists are plain arrays
- Errors: `{ "message": "...", "errors": { "field": ["..."] } }`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::department::list_departments,
        crate::api::department::create_department,
        crate::api::department::get_department,
        crate::api::department::update_department,
        crate::api::department::patch_department,
        crate::api::department::delete_department,

        crate::api::employee::list_employees,
        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::patch_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::list_attendances,
        crate::api::attendance::create_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::patch_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::health::health
    ),
    components(
        schemas(
            Department,
            DepartmentPayload,
            Employee,
            EmployeePayload,
            Attendance,
            AttendanceStatus,
            AttendancePayload
        )
    ),
    tags(
        (name = "Department", description = "Department management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;
