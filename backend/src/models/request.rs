//! Employee request aggregate and the payloads exchanged over the API.
//!
//! A request starts out `Pending` and is decided exactly once. Everything in
//! this module is pure; persistence and authorization live elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::user::UserRole;
use crate::types::{EmployeeId, RequestId};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MIN_REJECTION_REASON_CHARS: usize = 5;
pub const MAX_REJECTION_REASON_CHARS: usize = 500;
pub const MAX_ATTACHED_FILE_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
/// Closed set of request categories.
pub enum RequestType {
    LeaveOfAbsence,
    BusinessTrip,
    Support,
    SalaryIncrease,
    Other,
}

impl RequestType {
    pub const ALL: [RequestType; 5] = [
        RequestType::LeaveOfAbsence,
        RequestType::BusinessTrip,
        RequestType::Support,
        RequestType::SalaryIncrease,
        RequestType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::LeaveOfAbsence => "LeaveOfAbsence",
            RequestType::BusinessTrip => "BusinessTrip",
            RequestType::Support => "Support",
            RequestType::SalaryIncrease => "SalaryIncrease",
            RequestType::Other => "Other",
        }
    }

    pub fn db_value(&self) -> &'static str {
        match self {
            RequestType::LeaveOfAbsence => "leave_of_absence",
            RequestType::BusinessTrip => "business_trip",
            RequestType::Support => "support",
            RequestType::SalaryIncrease => "salary_increase",
            RequestType::Other => "other",
        }
    }
}

impl FromStr for RequestType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        RequestType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value) || t.db_value() == value)
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema, Default,
)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
/// Workflow state of a request. `Approved` and `Rejected` are terminal.
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        }
    }

    pub fn db_value(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        RequestStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

/// Reasons an entity transition is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("request is already {0}")]
    NotPending(RequestStatus),
    #[error("rejection reason must be at least {} characters", MIN_REJECTION_REASON_CHARS)]
    ReasonTooShort,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Request {
    pub request_id: RequestId,
    pub emp_id: EmployeeId,
    pub request_type: RequestType,
    pub title: String,
    pub content: String,
    pub request_date: DateTime<Utc>,
    pub status: RequestStatus,
    pub approved_by: Option<EmployeeId>,
    pub approved_date: Option<DateTime<Utc>>,
    pub approver_role: Option<UserRole>,
    pub rejection_reason: Option<String>,
    pub attached_file: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a new request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub request_type: RequestType,
    pub title: String,
    pub content: String,
    pub attached_file: Option<String>,
}

/// Editable fields of a pending request. `attached_file: Some(None)` removes
/// the attachment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub attached_file: Option<Option<String>>,
}

impl RequestChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.attached_file.is_none()
    }
}

impl Request {
    pub fn new(emp_id: EmployeeId, input: NewRequest, now: DateTime<Utc>) -> Self {
        Self {
            request_id: RequestId::new(),
            emp_id,
            request_type: input.request_type,
            title: input.title.trim().to_string(),
            content: input.content.trim().to_string(),
            request_date: now,
            status: RequestStatus::Pending,
            approved_by: None,
            approved_date: None,
            approver_role: None,
            rejection_reason: None,
            attached_file: normalize_attachment(input.attached_file),
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self.status, RequestStatus::Approved)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.status, RequestStatus::Rejected)
    }

    pub fn is_owned_by(&self, emp_id: EmployeeId) -> bool {
        self.emp_id == emp_id
    }

    /// Only the owner may edit, and only while the request is pending.
    pub fn can_be_edited_by(&self, actor_emp_id: EmployeeId, _actor_role: UserRole) -> bool {
        self.is_owned_by(actor_emp_id) && self.is_pending()
    }

    /// Role and self-approval check. Department scoping needs the owner's
    /// department and is applied by the authorization policy.
    pub fn can_be_approved_by(
        &self,
        actor_emp_id: EmployeeId,
        actor_role: UserRole,
        _actor_department: Option<&str>,
    ) -> bool {
        actor_role.is_reviewer() && !self.is_owned_by(actor_emp_id)
    }

    pub fn approve(
        &mut self,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        self.status = RequestStatus::Approved;
        self.stamp_decision(approver, approver_role, at);
        self.rejection_reason = None;
        Ok(())
    }

    /// Returns the trimmed reason as stored on the request.
    pub fn reject(
        &mut self,
        approver: EmployeeId,
        approver_role: UserRole,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<String, TransitionError> {
        self.ensure_pending()?;
        let reason = reason.trim();
        if reason.chars().count() < MIN_REJECTION_REASON_CHARS {
            return Err(TransitionError::ReasonTooShort);
        }
        self.status = RequestStatus::Rejected;
        self.stamp_decision(approver, approver_role, at);
        self.rejection_reason = Some(reason.to_string());
        Ok(reason.to_string())
    }

    /// Applies `changes` and returns the subset that actually differed from
    /// the stored values.
    pub fn update(
        &mut self,
        changes: RequestChanges,
        at: DateTime<Utc>,
    ) -> Result<RequestChanges, TransitionError> {
        self.ensure_pending()?;
        let mut applied = RequestChanges::default();

        if let Some(title) = changes.title.map(|t| t.trim().to_string()) {
            if title != self.title {
                self.title = title.clone();
                applied.title = Some(title);
            }
        }
        if let Some(content) = changes.content.map(|c| c.trim().to_string()) {
            if content != self.content {
                self.content = content.clone();
                applied.content = Some(content);
            }
        }
        if let Some(attachment) = changes.attached_file.map(normalize_attachment) {
            if attachment != self.attached_file {
                self.attached_file = attachment.clone();
                applied.attached_file = Some(attachment);
            }
        }

        if !applied.is_empty() {
            self.updated_at = at;
        }
        Ok(applied)
    }

    /// Lists every violated invariant; empty means the request may be
    /// persisted.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let title_len = self.title.trim().chars().count();
        if title_len == 0 {
            violations.push("title: required".to_string());
        } else if self.title.chars().count() > MAX_TITLE_CHARS {
            violations.push(format!("title: must be at most {MAX_TITLE_CHARS} characters"));
        }

        let content_len = self.content.trim().chars().count();
        if content_len == 0 {
            violations.push("content: required".to_string());
        } else if self.content.chars().count() > MAX_CONTENT_CHARS {
            violations.push(format!(
                "content: must be at most {MAX_CONTENT_CHARS} characters"
            ));
        }

        if let Some(file) = &self.attached_file {
            if file.chars().count() > MAX_ATTACHED_FILE_CHARS {
                violations.push(format!(
                    "attachedFile: must be at most {MAX_ATTACHED_FILE_CHARS} characters"
                ));
            }
        }

        let stamped = [
            self.approved_by.is_some(),
            self.approved_date.is_some(),
            self.approver_role.is_some(),
        ];
        match self.status {
            RequestStatus::Pending => {
                if stamped.iter().any(|s| *s) {
                    violations.push("approver fields must be empty while pending".to_string());
                }
                if self.rejection_reason.is_some() {
                    violations.push("rejectionReason: must be empty while pending".to_string());
                }
            }
            RequestStatus::Approved | RequestStatus::Rejected => {
                if !stamped.iter().all(|s| *s) {
                    violations.push("approver fields must be set on a decided request".to_string());
                }
            }
        }

        match (self.status, self.rejection_reason.as_deref()) {
            (RequestStatus::Rejected, None) => {
                violations.push("rejectionReason: required when rejected".to_string());
            }
            (RequestStatus::Rejected, Some(reason))
                if reason.trim().chars().count() < MIN_REJECTION_REASON_CHARS =>
            {
                violations.push(format!(
                    "rejectionReason: must be at least {MIN_REJECTION_REASON_CHARS} characters"
                ));
            }
            (RequestStatus::Approved, Some(_)) => {
                violations.push("rejectionReason: must be empty when approved".to_string());
            }
            _ => {}
        }

        violations
    }

    fn ensure_pending(&self) -> Result<(), TransitionError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TransitionError::NotPending(self.status))
        }
    }

    fn stamp_decision(&mut self, approver: EmployeeId, role: UserRole, at: DateTime<Utc>) {
        self.approved_by = Some(approver);
        self.approver_role = Some(role);
        self.approved_date = Some(at);
        self.updated_at = at;
    }
}

fn normalize_attachment(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload for submitting a new request.
pub struct CreateRequestPayload {
    #[validate(custom(function = "crate::validation::rules::validate_request_type"))]
    #[schema(example = "LeaveOfAbsence")]
    pub request_type: String,
    #[validate(custom(function = "crate::validation::rules::validate_title"))]
    pub title: String,
    #[validate(custom(function = "crate::validation::rules::validate_content"))]
    pub content: String,
    #[validate(custom(function = "crate::validation::rules::validate_attached_file"))]
    pub attached_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Partial update of a pending request. An empty `attachedFile` removes the
/// attachment.
pub struct UpdateRequestPayload {
    #[validate(custom(function = "crate::validation::rules::validate_title"))]
    pub title: Option<String>,
    #[validate(custom(function = "crate::validation::rules::validate_content"))]
    pub content: Option<String>,
    #[validate(custom(function = "crate::validation::rules::validate_attached_file"))]
    pub attached_file: Option<String>,
}

impl UpdateRequestPayload {
    pub fn into_changes(self) -> RequestChanges {
        RequestChanges {
            title: self.title,
            content: self.content,
            attached_file: self.attached_file.map(Some),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
/// Payload for rejecting a request.
pub struct RejectPayload {
    #[validate(custom(function = "crate::validation::rules::validate_rejection_reason"))]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ViewType {
    #[default]
    Mine,
    ForApproval,
}

impl FromStr for ViewType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mine" => Ok(ViewType::Mine),
            "forApproval" | "for_approval" => Ok(ViewType::ForApproval),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
/// Raw list query as received over HTTP.
pub struct RequestListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub request_type: Option<String>,
    pub status: Option<String>,
    pub view_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// A request as returned to a particular actor, with the actions that actor
/// may take on it.
pub struct RequestResponse {
    #[schema(value_type = String)]
    pub request_id: RequestId,
    #[schema(value_type = String)]
    pub emp_id: EmployeeId,
    pub employee_department: Option<String>,
    pub request_type: RequestType,
    pub title: String,
    pub content: String,
    pub request_date: DateTime<Utc>,
    pub status: RequestStatus,
    #[schema(value_type = Option<String>)]
    pub approved_by: Option<EmployeeId>,
    pub approved_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub approver_role: Option<UserRole>,
    pub rejection_reason: Option<String>,
    pub attached_file: Option<String>,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_approve: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestListResponse {
    pub requests: Vec<RequestResponse>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
/// Number of requests in one status.
pub struct StatusCount {
    pub status: RequestStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Request counts for the actor's scope. Every status is listed, including
/// those with no requests.
pub struct RequestStatistics {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
}

impl RequestStatistics {
    pub fn from_counts(counts: &[StatusCount]) -> Self {
        let by_status: Vec<StatusCount> = RequestStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counts
                    .iter()
                    .filter(|c| c.status == status)
                    .map(|c| c.count)
                    .sum(),
            })
            .collect();
        Self {
            total: by_status.iter().map(|c| c.count).sum(),
            by_status,
        }
    }
}
