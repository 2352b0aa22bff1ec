use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::Actor,
    repositories::EmployeeDirectoryTrait,
    state::AppState,
    types::EmployeeId,
    utils::jwt::verify_access_token,
};

/// Authenticates the bearer token and inserts the caller's [`Actor`] into the
/// request extensions.
///
/// The role and department come from the directory, not the token, so a
/// transfer or demotion applies to tokens already issued.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let actor = authenticate(
        request.headers(),
        &state.config.jwt_secret,
        state.directory.as_ref(),
    )
    .await?;
    tracing::debug!(emp_id = %actor.emp_id, role = actor.role.as_str(), "Authenticated");
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        let token = rest.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}

async fn authenticate(
    headers: &HeaderMap,
    secret: &str,
    directory: &dyn EmployeeDirectoryTrait,
) -> Result<Actor, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    let claims = verify_access_token(token, secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;
    let emp_id: EmployeeId = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;

    let employee = directory
        .find_employee(emp_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown employee".into()))?;

    Ok(employee.actor())
}
