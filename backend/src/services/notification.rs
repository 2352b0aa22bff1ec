//! Mail notifications for request lifecycle events.
//!
//! Callers run these on detached tasks and only log failures; nothing here
//! may affect the outcome of the operation that triggered it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono_tz::Tz;

use crate::models::request::Request;
use crate::models::user::Employee;
use crate::repositories::EmployeeDirectoryTrait;
use crate::utils::{format_local, EmailService};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Tells the managers of the submitter's department about a new request.
    /// A failed send to one manager is logged and the rest still get mail.
    async fn notify_managers_of_new_request(
        &self,
        request: &Request,
        submitter: &Employee,
    ) -> Result<()>;

    /// Tells the owner their request was approved.
    async fn notify_approval(&self, request: &Request, approver: &Employee) -> Result<()>;

    /// Tells the owner their request was rejected and why.
    async fn notify_rejection(
        &self,
        request: &Request,
        approver: &Employee,
        reason: &str,
    ) -> Result<()>;
}

/// SMTP-backed dispatcher. Recipients are resolved through the directory at
/// send time.
pub struct EmailNotificationDispatcher {
    email: EmailService,
    directory: Arc<dyn EmployeeDirectoryTrait>,
    portal_url: String,
    time_zone: Tz,
}

impl EmailNotificationDispatcher {
    pub fn new(
        email: EmailService,
        directory: Arc<dyn EmployeeDirectoryTrait>,
        portal_url: String,
        time_zone: Tz,
    ) -> Self {
        Self {
            email,
            directory,
            portal_url: portal_url.trim_end_matches('/').to_string(),
            time_zone,
        }
    }

    fn request_link(&self, request: &Request) -> String {
        format!("{}/requests/{}", self.portal_url, request.request_id)
    }

    async fn owner_of(&self, request: &Request) -> Result<Option<Employee>> {
        let owner = self.directory.find_employee(request.emp_id).await?;
        Ok(owner.filter(|e| !e.email.trim().is_empty()))
    }
}

#[async_trait]
impl NotificationDispatcher for EmailNotificationDispatcher {
    async fn notify_managers_of_new_request(
        &self,
        request: &Request,
        submitter: &Employee,
    ) -> Result<()> {
        let Some(department) = submitter.department.clone() else {
            tracing::debug!(
                request_id = %request.request_id,
                "submitter has no department, no managers to notify"
            );
            return Ok(());
        };

        let managers = self.directory.find_managers(department).await?;
        let subject = format!("New request awaiting approval: {}", request.title);
        let body = format!(
            "{} submitted a {} request.\n\nTitle: {}\nSubmitted: {}\n\nReview it at {}\n",
            submitter.full_name,
            request.request_type,
            request.title,
            format_local(request.request_date, &self.time_zone),
            self.request_link(request),
        );

        for manager in managers
            .iter()
            .filter(|m| m.emp_id != submitter.emp_id && !m.email.trim().is_empty())
        {
            if let Err(err) = self.email.send(&manager.email, &subject, body.clone()).await {
                tracing::warn!(
                    request_id = %request.request_id,
                    manager = %manager.emp_id,
                    error = %err,
                    "Failed to notify manager of new request"
                );
            }
        }
        Ok(())
    }

    async fn notify_approval(&self, request: &Request, approver: &Employee) -> Result<()> {
        let Some(owner) = self.owner_of(request).await? else {
            return Ok(());
        };
        let decided_at = request.approved_date.unwrap_or(request.updated_at);
        let body = format!(
            "Hello {},\n\nYour request \"{}\" was approved by {} on {}.\n\n{}\n",
            owner.full_name,
            request.title,
            approver.full_name,
            format_local(decided_at, &self.time_zone),
            self.request_link(request),
        );
        self.email
            .send(&owner.email, &format!("Request approved: {}", request.title), body)
            .await
    }

    async fn notify_rejection(
        &self,
        request: &Request,
        approver: &Employee,
        reason: &str,
    ) -> Result<()> {
        let Some(owner) = self.owner_of(request).await? else {
            return Ok(());
        };
        let decided_at = request.approved_date.unwrap_or(request.updated_at);
        let body = format!(
            "Hello {},\n\nYour request \"{}\" was rejected by {} on {}.\n\nReason: {}\n\n{}\n",
            owner.full_name,
            request.title,
            approver.full_name,
            format_local(decided_at, &self.time_zone),
            reason,
            self.request_link(request),
        );
        self.email
            .send(&owner.email, &format!("Request rejected: {}", request.title), body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpConfig;
    use crate::models::request::{NewRequest, RequestType};
    use crate::models::user::UserRole;
    use crate::repositories::employee_directory::MockEmployeeDirectoryTrait;
    use crate::types::EmployeeId;
    use chrono::Utc;

    fn employee(role: UserRole, department: Option<&str>, email: &str) -> Employee {
        Employee {
            emp_id: EmployeeId::new(),
            full_name: format!("{} user", role.as_str()),
            email: email.into(),
            department: department.map(str::to_string),
            role,
            created_at: Utc::now(),
        }
    }

    fn dispatcher(directory: MockEmployeeDirectoryTrait) -> EmailNotificationDispatcher {
        let email = EmailService::new(&SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@portal.local".into(),
            skip_send: true,
        })
        .expect("email service");
        EmailNotificationDispatcher::new(
            email,
            Arc::new(directory),
            "http://portal.local/".into(),
            chrono_tz::UTC,
        )
    }

    fn request_for(owner: &Employee) -> Request {
        Request::new(
            owner.emp_id,
            NewRequest {
                request_type: RequestType::Support,
                title: "Laptop replacement".into(),
                content: "Screen is broken".into(),
                attached_file: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn new_request_looks_up_managers_of_submitter_department() {
        let submitter = employee(UserRole::Employee, Some("IT"), "staff@portal.local");
        let manager = employee(UserRole::Manager, Some("IT"), "boss@portal.local");
        let mut directory = MockEmployeeDirectoryTrait::new();
        directory
            .expect_find_managers()
            .withf(|dept| dept == "IT")
            .times(1)
            .returning(move |_| Ok(vec![manager.clone()]));

        let dispatcher = dispatcher(directory);
        dispatcher
            .notify_managers_of_new_request(&request_for(&submitter), &submitter)
            .await
            .expect("notify");
    }

    #[tokio::test]
    async fn bad_manager_address_does_not_stop_the_others() {
        let submitter = employee(UserRole::Employee, Some("IT"), "staff@portal.local");
        let broken = employee(UserRole::Manager, Some("IT"), "not an address");
        let healthy = employee(UserRole::Manager, Some("IT"), "boss@portal.local");
        let mut directory = MockEmployeeDirectoryTrait::new();
        directory
            .expect_find_managers()
            .times(1)
            .returning(move |_| Ok(vec![broken.clone(), healthy.clone()]));

        let dispatcher = dispatcher(directory);
        dispatcher
            .notify_managers_of_new_request(&request_for(&submitter), &submitter)
            .await
            .expect("one bad recipient is logged, not returned");
    }

    #[tokio::test]
    async fn submitter_without_department_notifies_nobody() {
        let submitter = employee(UserRole::Employee, None, "staff@portal.local");
        let mut directory = MockEmployeeDirectoryTrait::new();
        directory.expect_find_managers().never();

        let dispatcher = dispatcher(directory);
        dispatcher
            .notify_managers_of_new_request(&request_for(&submitter), &submitter)
            .await
            .expect("notify");
    }

    #[tokio::test]
    async fn decision_mail_skips_owner_without_address() {
        let owner = employee(UserRole::Employee, Some("IT"), "");
        let approver = employee(UserRole::Admin, None, "admin@portal.local");
        let returned = owner.clone();
        let mut directory = MockEmployeeDirectoryTrait::new();
        directory
            .expect_find_employee()
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));

        let dispatcher = dispatcher(directory);
        dispatcher
            .notify_rejection(&request_for(&owner), &approver, "Budget frozen")
            .await
            .expect("notify");
    }

    #[tokio::test]
    async fn directory_failure_surfaces_as_error() {
        let owner = employee(UserRole::Employee, Some("IT"), "staff@portal.local");
        let approver = employee(UserRole::Admin, None, "admin@portal.local");
        let mut directory = MockEmployeeDirectoryTrait::new();
        directory
            .expect_find_employee()
            .returning(|_| Err(crate::error::AppError::InternalServerError(anyhow::anyhow!("db down"))));

        let dispatcher = dispatcher(directory);
        assert!(dispatcher
            .notify_approval(&request_for(&owner), &approver)
            .await
            .is_err());
    }
}
