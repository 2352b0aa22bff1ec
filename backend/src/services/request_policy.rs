//! Who may do what to a request.
//!
//! Every check is a pure function of the actor, the request and the owner's
//! current department. Roles outside the known set are denied everything,
//! and a missing department never equals another missing department.

use crate::error::AppError;
use crate::models::request::{Request, RequestStatus};
use crate::models::user::{Actor, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    View,
    Edit,
    Delete,
    Approve,
    Reject,
}

/// Why [`authorize`] refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDenial {
    NotPermitted,
    NotPending(RequestStatus),
}

impl From<PolicyDenial> for AppError {
    fn from(denial: PolicyDenial) -> Self {
        match denial {
            PolicyDenial::NotPermitted => {
                AppError::forbidden("You are not allowed to perform this action on the request")
            }
            PolicyDenial::NotPending(status) => AppError::not_pending(status),
        }
    }
}

/// Action flags attached to a request in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestPermissions {
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_approve: bool,
}

fn same_department(actor: &Actor, owner_department: Option<&str>) -> bool {
    match (actor.department.as_deref(), owner_department) {
        (Some(mine), Some(theirs)) => mine == theirs,
        _ => false,
    }
}

fn is_known_role(actor: &Actor) -> bool {
    !matches!(actor.role, UserRole::Unknown)
}

pub fn can_view(actor: &Actor, request: &Request, owner_department: Option<&str>) -> bool {
    if !is_known_role(actor) {
        return false;
    }
    if request.is_owned_by(actor.emp_id) {
        return true;
    }
    match actor.role {
        UserRole::Admin => true,
        UserRole::Manager => same_department(actor, owner_department),
        UserRole::Employee | UserRole::Unknown => false,
    }
}

pub fn can_edit(actor: &Actor, request: &Request) -> bool {
    is_known_role(actor) && request.can_be_edited_by(actor.emp_id, actor.role)
}

pub fn can_delete(actor: &Actor, request: &Request) -> bool {
    is_known_role(actor) && request.is_owned_by(actor.emp_id) && request.is_pending()
}

/// Role, department and self-approval rules, ignoring the request status.
pub fn is_eligible_approver(
    actor: &Actor,
    request: &Request,
    owner_department: Option<&str>,
) -> bool {
    if !request.can_be_approved_by(actor.emp_id, actor.role, actor.department.as_deref()) {
        return false;
    }
    match actor.role {
        UserRole::Admin => true,
        UserRole::Manager => same_department(actor, owner_department),
        UserRole::Employee | UserRole::Unknown => false,
    }
}

pub fn can_decide(actor: &Actor, request: &Request, owner_department: Option<&str>) -> bool {
    request.is_pending() && is_eligible_approver(actor, request, owner_department)
}

pub fn permissions_for(
    actor: &Actor,
    request: &Request,
    owner_department: Option<&str>,
) -> RequestPermissions {
    RequestPermissions {
        can_edit: can_edit(actor, request),
        can_delete: can_delete(actor, request),
        can_approve: can_decide(actor, request, owner_department),
    }
}

/// Checks `action` and reports the reason for a refusal.
///
/// Edit and delete check the status first, so a decided request is always a
/// conflict. Approve and reject check eligibility first, so an outsider never
/// learns the status of a request they could not decide anyway.
pub fn authorize(
    actor: &Actor,
    action: RequestAction,
    request: &Request,
    owner_department: Option<&str>,
) -> Result<(), PolicyDenial> {
    match action {
        RequestAction::View => {
            if can_view(actor, request, owner_department) {
                Ok(())
            } else {
                Err(PolicyDenial::NotPermitted)
            }
        }
        RequestAction::Edit | RequestAction::Delete => {
            if !request.is_pending() {
                return Err(PolicyDenial::NotPending(request.status));
            }
            let allowed = match action {
                RequestAction::Edit => can_edit(actor, request),
                _ => can_delete(actor, request),
            };
            if allowed {
                Ok(())
            } else {
                Err(PolicyDenial::NotPermitted)
            }
        }
        RequestAction::Approve | RequestAction::Reject => {
            if !is_eligible_approver(actor, request, owner_department) {
                return Err(PolicyDenial::NotPermitted);
            }
            if !request.is_pending() {
                return Err(PolicyDenial::NotPending(request.status));
            }
            Ok(())
        }
    }
}
