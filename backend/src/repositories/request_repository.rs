//! Request store trait for dependency injection and testing.
//!
//! Every state-changing write is conditional on the row still being
//! `pending`. A `false` return means the guard did not match: the request is
//! gone or has already been decided, and the caller must re-read to find out
//! which.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::models::{
    request::{Request, RequestChanges, RequestStatus, RequestType, StatusCount},
    user::UserRole,
};
use crate::repositories::common::{push_clause, REQUEST_COLUMNS};
use crate::types::{EmployeeId, RequestId};

/// Optional list filters shared by the "mine" and "for approval" views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub request_type: Option<RequestType>,
    pub status: Option<RequestStatus>,
}

/// Repository trait for request persistence.
///
/// Use `MockRequestRepositoryTrait` in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestRepositoryTrait: Send + Sync {
    /// Insert a new request and return the stored row.
    async fn create(&self, request: &Request) -> Result<Request, AppError>;

    async fn find_by_id(&self, id: RequestId) -> Result<Option<Request>, AppError>;

    /// Requests submitted by `emp_id`, newest first.
    async fn find_by_employee_id(
        &self,
        emp_id: EmployeeId,
        filter: RequestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Request>, AppError>;

    async fn count_by_employee_id(
        &self,
        emp_id: EmployeeId,
        filter: RequestFilter,
    ) -> Result<i64, AppError>;

    /// Pending requests a reviewer may decide. Managers only see their own
    /// department; any other non-admin role sees nothing.
    async fn find_for_approval(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Request>, AppError>;

    async fn count_for_approval(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
    ) -> Result<i64, AppError>;

    /// Write the editable fields. No-op returning `false` unless pending.
    async fn update(
        &self,
        id: RequestId,
        changes: &RequestChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn approve(
        &self,
        id: RequestId,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn reject(
        &self,
        id: RequestId,
        reason: &str,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Delete a request that is still pending.
    async fn delete(&self, id: RequestId) -> Result<bool, AppError>;

    /// Row counts per status, optionally narrowed to one employee and/or the
    /// owners' current department. Statuses without rows may be omitted.
    async fn get_statistics(
        &self,
        emp_id: Option<EmployeeId>,
        department: Option<String>,
    ) -> Result<Vec<StatusCount>, AppError>;
}

/// PostgreSQL implementation of [`RequestRepositoryTrait`].
#[derive(Debug, Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Which rows an approval query may see, or `None` when the role sees nothing.
fn approval_scope(role: UserRole, department: Option<String>) -> Option<Option<String>> {
    match role {
        UserRole::Admin => Some(None),
        UserRole::Manager => department.map(Some),
        UserRole::Employee | UserRole::Unknown => None,
    }
}

fn apply_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filter: RequestFilter,
) {
    if let Some(request_type) = filter.request_type {
        push_clause(builder, has_clause);
        builder
            .push("r.request_type = ")
            .push_bind(request_type.db_value());
    }
    if let Some(status) = filter.status {
        push_clause(builder, has_clause);
        builder.push("r.status = ").push_bind(status.db_value());
    }
}

fn push_approval_scope(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    department: Option<String>,
) {
    push_clause(builder, has_clause);
    builder.push("r.status = 'pending'");
    if let Some(department) = department {
        push_clause(builder, has_clause);
        builder.push("e.department = ").push_bind(department);
    }
}

#[async_trait]
impl RequestRepositoryTrait for RequestRepository {
    async fn create(&self, request: &Request) -> Result<Request, AppError> {
        let query = format!(
            "INSERT INTO requests AS r (request_id, emp_id, request_type, title, content, request_date, \
             status, approved_by, approved_date, approver_role, rejection_reason, attached_file, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {}",
            REQUEST_COLUMNS
        );
        let row = sqlx::query_as::<_, Request>(&query)
            .bind(request.request_id)
            .bind(request.emp_id)
            .bind(request.request_type.db_value())
            .bind(&request.title)
            .bind(&request.content)
            .bind(request.request_date)
            .bind(request.status.db_value())
            .bind(request.approved_by)
            .bind(request.approved_date)
            .bind(request.approver_role)
            .bind(&request.rejection_reason)
            .bind(&request.attached_file)
            .bind(request.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<Request>, AppError> {
        let query = format!(
            "SELECT {} FROM requests r WHERE r.request_id = $1",
            REQUEST_COLUMNS
        );
        let row = sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_employee_id(
        &self,
        emp_id: EmployeeId,
        filter: RequestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Request>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM requests r", REQUEST_COLUMNS));
        let mut has_clause = false;
        push_clause(&mut builder, &mut has_clause);
        builder.push("r.emp_id = ").push_bind(emp_id);
        apply_filter(&mut builder, &mut has_clause, filter);
        builder
            .push(" ORDER BY r.request_date DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = builder
            .build_query_as::<Request>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_by_employee_id(
        &self,
        emp_id: EmployeeId,
        filter: RequestFilter,
    ) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM requests r");
        let mut has_clause = false;
        push_clause(&mut builder, &mut has_clause);
        builder.push("r.emp_id = ").push_bind(emp_id);
        apply_filter(&mut builder, &mut has_clause, filter);
        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn find_for_approval(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Request>, AppError> {
        let Some(department) = approval_scope(role, department) else {
            return Ok(Vec::new());
        };
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM requests r JOIN employees e ON e.emp_id = r.emp_id",
            REQUEST_COLUMNS
        ));
        let mut has_clause = false;
        push_approval_scope(&mut builder, &mut has_clause, department);
        apply_filter(
            &mut builder,
            &mut has_clause,
            RequestFilter {
                status: None,
                ..filter
            },
        );
        builder
            .push(" ORDER BY r.request_date ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = builder
            .build_query_as::<Request>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_for_approval(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
    ) -> Result<i64, AppError> {
        let Some(department) = approval_scope(role, department) else {
            return Ok(0);
        };
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM requests r JOIN employees e ON e.emp_id = r.emp_id",
        );
        let mut has_clause = false;
        push_approval_scope(&mut builder, &mut has_clause, department);
        apply_filter(
            &mut builder,
            &mut has_clause,
            RequestFilter {
                status: None,
                ..filter
            },
        );
        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn update(
        &self,
        id: RequestId,
        changes: &RequestChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE requests SET ");
        {
            let mut assignments = builder.separated(", ");
            if let Some(title) = &changes.title {
                assignments.push("title = ");
                assignments.push_bind_unseparated(title.clone());
            }
            if let Some(content) = &changes.content {
                assignments.push("content = ");
                assignments.push_bind_unseparated(content.clone());
            }
            if let Some(attached_file) = &changes.attached_file {
                assignments.push("attached_file = ");
                assignments.push_bind_unseparated(attached_file.clone());
            }
            assignments.push("updated_at = ");
            assignments.push_bind_unseparated(at);
        }
        builder
            .push(" WHERE request_id = ")
            .push_bind(id)
            .push(" AND status = 'pending'");
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn approve(
        &self,
        id: RequestId,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE requests SET status = $1, approved_by = $2, approved_date = $3, approver_role = $4, \
             rejection_reason = NULL, updated_at = $3 WHERE request_id = $5 AND status = 'pending'",
        )
        .bind(RequestStatus::Approved.db_value())
        .bind(approver)
        .bind(at)
        .bind(approver_role)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reject(
        &self,
        id: RequestId,
        reason: &str,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE requests SET status = $1, approved_by = $2, approved_date = $3, approver_role = $4, \
             rejection_reason = $5, updated_at = $3 WHERE request_id = $6 AND status = 'pending'",
        )
        .bind(RequestStatus::Rejected.db_value())
        .bind(approver)
        .bind(at)
        .bind(approver_role)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: RequestId) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM requests WHERE request_id = $1 AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_statistics(
        &self,
        emp_id: Option<EmployeeId>,
        department: Option<String>,
    ) -> Result<Vec<StatusCount>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT r.status, COUNT(*) AS count FROM requests r \
             LEFT JOIN employees e ON e.emp_id = r.emp_id",
        );
        let mut has_clause = false;
        if let Some(emp_id) = emp_id {
            push_clause(&mut builder, &mut has_clause);
            builder.push("r.emp_id = ").push_bind(emp_id);
        }
        if let Some(department) = department {
            push_clause(&mut builder, &mut has_clause);
            builder.push("e.department = ").push_bind(department);
        }
        builder.push(" GROUP BY r.status");
        let rows = builder
            .build_query_as::<StatusCount>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_request_repository_is_send_sync() {
        fn check_send_sync<T: Send + Sync>() {}
        check_send_sync::<MockRequestRepositoryTrait>();
    }

    #[test]
    fn approval_scope_fails_closed() {
        assert_eq!(approval_scope(UserRole::Admin, None), Some(None));
        assert_eq!(
            approval_scope(UserRole::Manager, Some("Sales".into())),
            Some(Some("Sales".to_string()))
        );
        assert_eq!(approval_scope(UserRole::Manager, None), None);
        assert_eq!(approval_scope(UserRole::Employee, Some("Sales".into())), None);
        assert_eq!(approval_scope(UserRole::Unknown, Some("Sales".into())), None);
    }

    #[test]
    fn approval_query_restricts_to_pending_and_department() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM requests r");
        let mut has_clause = false;
        push_approval_scope(&mut builder, &mut has_clause, Some("Sales".into()));
        apply_filter(
            &mut builder,
            &mut has_clause,
            RequestFilter {
                request_type: Some(RequestType::Support),
                status: None,
            },
        );
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM requests r WHERE r.status = 'pending' AND e.department = $1 \
             AND r.request_type = $2"
        );
    }
}
