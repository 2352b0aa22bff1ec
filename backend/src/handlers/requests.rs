use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};

use crate::{
    error::AppError,
    handlers::{ApiResponse, MessageResponse},
    models::{
        request::{
            CreateRequestPayload, RejectPayload, RequestListQuery, RequestListResponse,
            RequestResponse, RequestStatistics, UpdateRequestPayload,
        },
        user::Actor,
    },
    state::AppState,
    types::RequestId,
};

type JsonResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn parse_request_id(raw: &str) -> Result<RequestId, AppError> {
    raw.parse()
        .map_err(|_| AppError::validation(format!("id: `{raw}` is not a valid request id")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(format!("body: {}", rejection.body_text())))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<RequestListQuery>, QueryRejection>,
) -> JsonResult<RequestListResponse> {
    let Query(query) =
        query.map_err(|rejection| AppError::validation(format!("query: {}", rejection.body_text())))?;
    let page = state.lifecycle.list(&actor, query).await?;
    Ok(Json(ApiResponse::ok(page)))
}

pub async fn get_statistics(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> JsonResult<RequestStatistics> {
    let stats = state.lifecycle.statistics(&actor).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

pub async fn get_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> JsonResult<RequestResponse> {
    let id = parse_request_id(&id)?;
    let request = state.lifecycle.get(&actor, id).await?;
    Ok(Json(ApiResponse::ok(request)))
}

pub async fn create_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateRequestPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RequestResponse>>), AppError> {
    let payload = body(payload)?;
    let request = state.lifecycle.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(request))))
}

pub async fn update_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateRequestPayload>, JsonRejection>,
) -> JsonResult<RequestResponse> {
    let id = parse_request_id(&id)?;
    let payload = body(payload)?;
    let request = state.lifecycle.update(&actor, id, payload).await?;
    Ok(Json(ApiResponse::ok(request)))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_request_id(&id)?;
    state.lifecycle.delete(&actor, id).await?;
    Ok(Json(MessageResponse::new("Request deleted")))
}

pub async fn approve_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> JsonResult<RequestResponse> {
    let id = parse_request_id(&id)?;
    let request = state.lifecycle.approve(&actor, id).await?;
    Ok(Json(ApiResponse::ok(request)))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<RejectPayload>, JsonRejection>,
) -> JsonResult<RequestResponse> {
    let id = parse_request_id(&id)?;
    let payload = body(payload)?;
    let request = state.lifecycle.reject(&actor, id, payload).await?;
    Ok(Json(ApiResponse::ok(request)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parse_request_id_rejects_garbage() {
        let err = parse_request_id("not-a-uuid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let id = RequestId::new();
        assert_eq!(parse_request_id(&id.to_string()).unwrap(), id);
    }
}
