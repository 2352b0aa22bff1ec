//! Employee directory lookups.
//!
//! Department values are always read live; nothing here caches them, so a
//! transfer takes effect on the next call.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::user::Employee;
use crate::types::EmployeeId;

const EMPLOYEE_COLUMNS: &str = "emp_id, full_name, email, department, role, created_at";

/// Read-only view over the employee directory.
///
/// Use `MockEmployeeDirectoryTrait` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmployeeDirectoryTrait: Send + Sync {
    async fn find_employee(&self, emp_id: EmployeeId) -> Result<Option<Employee>, AppError>;

    /// Current department of `emp_id`, `None` if unknown or unassigned.
    async fn department_of(&self, emp_id: EmployeeId) -> Result<Option<String>, AppError>;

    /// Batched form of [`department_of`](Self::department_of). Employees
    /// without a department are absent from the map.
    async fn departments_of(
        &self,
        emp_ids: Vec<EmployeeId>,
    ) -> Result<HashMap<EmployeeId, String>, AppError>;

    /// Managers currently assigned to `department`.
    async fn find_managers(&self, department: String) -> Result<Vec<Employee>, AppError>;
}

#[derive(Debug, Clone)]
pub struct EmployeeDirectory {
    pool: PgPool,
}

impl EmployeeDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeDirectoryTrait for EmployeeDirectory {
    async fn find_employee(&self, emp_id: EmployeeId) -> Result<Option<Employee>, AppError> {
        let query = format!("SELECT {} FROM employees WHERE emp_id = $1", EMPLOYEE_COLUMNS);
        let employee = sqlx::query_as::<_, Employee>(&query)
            .bind(emp_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    async fn department_of(&self, emp_id: EmployeeId) -> Result<Option<String>, AppError> {
        let department = sqlx::query_scalar::<_, Option<String>>(
            "SELECT department FROM employees WHERE emp_id = $1",
        )
        .bind(emp_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(department.flatten())
    }

    async fn departments_of(
        &self,
        emp_ids: Vec<EmployeeId>,
    ) -> Result<HashMap<EmployeeId, String>, AppError> {
        if emp_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<String> = emp_ids.iter().map(ToString::to_string).collect();
        let rows = sqlx::query_as::<_, (EmployeeId, String)>(
            "SELECT emp_id, department FROM employees \
             WHERE emp_id = ANY($1) AND department IS NOT NULL",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn find_managers(&self, department: String) -> Result<Vec<Employee>, AppError> {
        let query = format!(
            "SELECT {} FROM employees WHERE department = $1 AND LOWER(role) = 'manager' ORDER BY full_name",
            EMPLOYEE_COLUMNS
        );
        let managers = sqlx::query_as::<_, Employee>(&query)
            .bind(department)
            .fetch_all(&self.pool)
            .await?;
        Ok(managers)
    }
}
