//! Request lifecycle orchestration.
//!
//! Each operation loads the request, asks the policy, runs the entity
//! transition, and persists it through a write that only matches pending
//! rows. If that write loses a race the row is read again so the caller
//! learns the status that won. Notifications run on detached tasks.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use validator::Validate;

use crate::error::AppError;
use crate::models::request::{
    CreateRequestPayload, NewRequest, PageInfo, RejectPayload, Request, RequestListQuery,
    RequestListResponse, RequestResponse, RequestStatistics, RequestStatus, RequestType,
    UpdateRequestPayload, ViewType,
};
use crate::models::user::{Actor, UserRole};
use crate::repositories::common::page_window;
use crate::repositories::{EmployeeDirectoryTrait, RequestFilter, RequestRepositoryTrait};
use crate::services::notification::NotificationDispatcher;
use crate::services::request_policy::{authorize, permissions_for, RequestAction};
use crate::types::{EmployeeId, RequestId};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct RequestLifecycleService {
    requests: Arc<dyn RequestRepositoryTrait>,
    directory: Arc<dyn EmployeeDirectoryTrait>,
    notifier: Arc<dyn NotificationDispatcher>,
}

/// Runs a notification on its own task and logs failures.
fn spawn_notification<F>(event: &'static str, request_id: RequestId, task: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = task.await {
            tracing::warn!(
                request_id = %request_id,
                event,
                error = %err,
                "Failed to send request notification"
            );
        }
    });
}

fn ensure_known_role(actor: &Actor) -> Result<(), AppError> {
    if matches!(actor.role, UserRole::Unknown) {
        return Err(AppError::forbidden("Your role does not permit this action"));
    }
    Ok(())
}

fn present(actor: &Actor, request: Request, owner_department: Option<String>) -> RequestResponse {
    let permissions = permissions_for(actor, &request, owner_department.as_deref());
    RequestResponse {
        request_id: request.request_id,
        emp_id: request.emp_id,
        employee_department: owner_department,
        request_type: request.request_type,
        title: request.title,
        content: request.content,
        request_date: request.request_date,
        status: request.status,
        approved_by: request.approved_by,
        approved_date: request.approved_date,
        approver_role: request.approver_role,
        rejection_reason: request.rejection_reason,
        attached_file: request.attached_file,
        can_edit: permissions.can_edit,
        can_delete: permissions.can_delete,
        can_approve: permissions.can_approve,
    }
}

fn ensure_valid(request: &Request) -> Result<(), AppError> {
    let violations = request.validate();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(violations))
    }
}

fn parse_filter(query: &RequestListQuery) -> Result<(RequestFilter, ViewType), AppError> {
    let request_type = query
        .request_type
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.parse::<RequestType>()
                .map_err(|e| AppError::validation(format!("requestType: {e}")))
        })
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.parse::<RequestStatus>()
                .map_err(|e| AppError::validation(format!("status: {e}")))
        })
        .transpose()?;
    let view_type = query
        .view_type
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.parse::<ViewType>()
                .map_err(|e| AppError::validation(format!("viewType: {e}")))
        })
        .transpose()?
        .unwrap_or_default();
    Ok((
        RequestFilter {
            request_type,
            status,
        },
        view_type,
    ))
}

impl RequestLifecycleService {
    pub fn new(
        requests: Arc<dyn RequestRepositoryTrait>,
        directory: Arc<dyn EmployeeDirectoryTrait>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            requests,
            directory,
            notifier,
        }
    }

    async fn load(&self, id: RequestId) -> Result<(Request, Option<String>), AppError> {
        let request = self
            .requests
            .find_by_id(id)
            .await?
            .ok_or_else(AppError::request_not_found)?;
        let owner_department = self.directory.department_of(request.emp_id).await?;
        Ok((request, owner_department))
    }

    /// Explains why a pending-only write matched no row.
    async fn lost_write(&self, id: RequestId) -> AppError {
        match self.requests.find_by_id(id).await {
            Ok(None) => AppError::request_not_found(),
            Ok(Some(current)) if !current.is_pending() => AppError::not_pending(current.status),
            Ok(Some(_)) => AppError::InternalServerError(anyhow!(
                "conditional write on pending request {id} affected no rows"
            )),
            Err(err) => err,
        }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        payload: CreateRequestPayload,
    ) -> Result<RequestResponse, AppError> {
        ensure_known_role(actor)?;
        payload.validate()?;
        let request_type = payload
            .request_type
            .parse::<RequestType>()
            .map_err(|e| AppError::validation(format!("requestType: {e}")))?;

        let request = Request::new(
            actor.emp_id,
            NewRequest {
                request_type,
                title: payload.title,
                content: payload.content,
                attached_file: payload.attached_file,
            },
            Utc::now(),
        );
        ensure_valid(&request)?;

        let created = self.requests.create(&request).await?;
        tracing::info!(
            request_id = %created.request_id,
            emp_id = %actor.emp_id,
            request_type = %created.request_type,
            "Request created"
        );

        let directory = self.directory.clone();
        let notifier = self.notifier.clone();
        let submitter_id = actor.emp_id;
        let snapshot = created.clone();
        spawn_notification("request_created", created.request_id, async move {
            let submitter = directory
                .find_employee(submitter_id)
                .await?
                .ok_or_else(|| anyhow!("submitter {submitter_id} not found in directory"))?;
            notifier
                .notify_managers_of_new_request(&snapshot, &submitter)
                .await
        });

        // The row is committed; nothing fallible may follow.
        Ok(present(actor, created, actor.department.clone()))
    }

    pub async fn list(
        &self,
        actor: &Actor,
        query: RequestListQuery,
    ) -> Result<RequestListResponse, AppError> {
        ensure_known_role(actor)?;
        let (filter, view_type) = parse_filter(&query)?;
        let page = query.page.unwrap_or(1).max(1);
        let (limit, offset) = page_window(
            page,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            MAX_PAGE_SIZE,
        );

        let (rows, total) = match view_type {
            ViewType::Mine => {
                let rows = self
                    .requests
                    .find_by_employee_id(actor.emp_id, filter, limit, offset)
                    .await?;
                let total = self
                    .requests
                    .count_by_employee_id(actor.emp_id, filter)
                    .await?;
                (rows, total)
            }
            ViewType::ForApproval => {
                if !actor.role.is_reviewer() {
                    return Err(AppError::forbidden(
                        "Only managers and admins can view requests awaiting approval",
                    ));
                }
                let department = actor.department.clone();
                let rows = self
                    .requests
                    .find_for_approval(actor.role, department.clone(), filter, limit, offset)
                    .await?;
                let total = self
                    .requests
                    .count_for_approval(actor.role, department, filter)
                    .await?;
                (rows, total)
            }
        };

        let owners: Vec<EmployeeId> = rows
            .iter()
            .map(|r| r.emp_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let departments: HashMap<EmployeeId, String> =
            self.directory.departments_of(owners).await?;

        let requests = rows
            .into_iter()
            .map(|request| {
                let department = departments.get(&request.emp_id).cloned();
                present(actor, request, department)
            })
            .collect();

        Ok(RequestListResponse {
            requests,
            pagination: PageInfo { page, limit, total },
        })
    }

    pub async fn get(&self, actor: &Actor, id: RequestId) -> Result<RequestResponse, AppError> {
        ensure_known_role(actor)?;
        let (request, owner_department) = self.load(id).await?;
        authorize(actor, RequestAction::View, &request, owner_department.as_deref())?;
        Ok(present(actor, request, owner_department))
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: RequestId,
        payload: UpdateRequestPayload,
    ) -> Result<RequestResponse, AppError> {
        ensure_known_role(actor)?;
        payload.validate()?;
        let changes = payload.into_changes();
        if changes.is_empty() {
            return Err(AppError::validation(
                "at least one of title, content or attachedFile is required",
            ));
        }

        let (mut request, owner_department) = self.load(id).await?;
        authorize(actor, RequestAction::Edit, &request, owner_department.as_deref())?;

        let now = Utc::now();
        let applied = request.update(changes, now)?;
        if applied.is_empty() {
            return Ok(present(actor, request, owner_department));
        }
        ensure_valid(&request)?;

        if !self.requests.update(id, &applied, now).await? {
            return Err(self.lost_write(id).await);
        }
        tracing::info!(request_id = %id, emp_id = %actor.emp_id, "Request updated");
        Ok(present(actor, request, owner_department))
    }

    pub async fn delete(&self, actor: &Actor, id: RequestId) -> Result<(), AppError> {
        ensure_known_role(actor)?;
        let (request, owner_department) = self.load(id).await?;
        authorize(actor, RequestAction::Delete, &request, owner_department.as_deref())?;

        if !self.requests.delete(id).await? {
            return Err(self.lost_write(id).await);
        }
        tracing::info!(request_id = %id, emp_id = %actor.emp_id, "Request deleted");
        Ok(())
    }

    pub async fn approve(&self, actor: &Actor, id: RequestId) -> Result<RequestResponse, AppError> {
        ensure_known_role(actor)?;
        let (mut request, owner_department) = self.load(id).await?;
        authorize(actor, RequestAction::Approve, &request, owner_department.as_deref())?;

        let now = Utc::now();
        request.approve(actor.emp_id, actor.role, now)?;
        ensure_valid(&request)?;

        if !self.requests.approve(id, actor.emp_id, actor.role, now).await? {
            return Err(self.lost_write(id).await);
        }
        tracing::info!(
            request_id = %id,
            approver = %actor.emp_id,
            approver_role = actor.role.as_str(),
            "Request approved"
        );

        let directory = self.directory.clone();
        let notifier = self.notifier.clone();
        let approver_id = actor.emp_id;
        let snapshot = request.clone();
        spawn_notification("request_approved", id, async move {
            let approver = directory
                .find_employee(approver_id)
                .await?
                .ok_or_else(|| anyhow!("approver {approver_id} not found in directory"))?;
            notifier.notify_approval(&snapshot, &approver).await
        });

        Ok(present(actor, request, owner_department))
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: RequestId,
        payload: RejectPayload,
    ) -> Result<RequestResponse, AppError> {
        ensure_known_role(actor)?;
        payload.validate()?;
        let (mut request, owner_department) = self.load(id).await?;
        authorize(actor, RequestAction::Reject, &request, owner_department.as_deref())?;

        let now = Utc::now();
        let reason = request.reject(actor.emp_id, actor.role, &payload.reason, now)?;
        ensure_valid(&request)?;

        if !self
            .requests
            .reject(id, &reason, actor.emp_id, actor.role, now)
            .await?
        {
            return Err(self.lost_write(id).await);
        }
        tracing::info!(
            request_id = %id,
            approver = %actor.emp_id,
            approver_role = actor.role.as_str(),
            "Request rejected"
        );

        let directory = self.directory.clone();
        let notifier = self.notifier.clone();
        let approver_id = actor.emp_id;
        let snapshot = request.clone();
        spawn_notification("request_rejected", id, async move {
            let approver = directory
                .find_employee(approver_id)
                .await?
                .ok_or_else(|| anyhow!("approver {approver_id} not found in directory"))?;
            notifier
                .notify_rejection(&snapshot, &approver, &reason)
                .await
        });

        Ok(present(actor, request, owner_department))
    }

    /// Counts per status: admins see everything, managers their department,
    /// everyone else (including managers without a department) their own.
    pub async fn statistics(&self, actor: &Actor) -> Result<RequestStatistics, AppError> {
        ensure_known_role(actor)?;
        let (emp_id, department) = match (actor.role, actor.department.clone()) {
            (UserRole::Admin, _) => (None, None),
            (UserRole::Manager, Some(department)) => (None, Some(department)),
            _ => (Some(actor.emp_id), None),
        };
        let counts = self.requests.get_statistics(emp_id, department).await?;
        Ok(RequestStatistics::from_counts(&counts))
    }
}
