#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::MessageResponse,
    models::request::{
        CreateRequestPayload, PageInfo, RejectPayload, RequestListQuery, RequestListResponse,
        RequestResponse, RequestStatistics, RequestStatus, RequestType, StatusCount,
        UpdateRequestPayload, ViewType,
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_doc,
        list_requests_doc,
        request_statistics_doc,
        get_request_doc,
        create_request_doc,
        update_request_doc,
        delete_request_doc,
        approve_request_doc,
        reject_request_doc
    ),
    components(
        schemas(
            CreateRequestPayload,
            UpdateRequestPayload,
            RejectPayload,
            RequestResponse,
            RequestListResponse,
            PageInfo,
            RequestStatistics,
            StatusCount,
            RequestType,
            RequestStatus,
            ViewType,
            MessageResponse,
            ErrorResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Requests", description = "Employee requests and their approval"),
        (name = "System", description = "Service health")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = serde_json::Value)),
    tag = "System",
    security(())
)]
fn health_doc() {}

#[utoipa::path(
    get,
    path = "/api/requests",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Page of requests wrapped in `{success, data}`", body = RequestListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 403, description = "forApproval view requested by a non-reviewer", body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn list_requests_doc() {}

#[utoipa::path(
    get,
    path = "/api/requests/statistics",
    responses((status = 200, description = "Counts per status in the caller's scope", body = RequestStatistics)),
    tag = "Requests"
)]
fn request_statistics_doc() {}

#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, body = RequestResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn get_request_doc() {}

#[utoipa::path(
    post,
    path = "/api/requests",
    request_body = CreateRequestPayload,
    responses(
        (status = 201, description = "Request submitted", body = RequestResponse),
        (status = 400, body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn create_request_doc() {}

#[utoipa::path(
    put,
    path = "/api/requests/{id}",
    params(("id" = String, Path, description = "Request id")),
    request_body = UpdateRequestPayload,
    responses(
        (status = 200, body = RequestResponse),
        (status = 400, description = "Invalid payload or request already decided", body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn update_request_doc() {}

#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "Request already decided", body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn delete_request_doc() {}

#[utoipa::path(
    put,
    path = "/api/requests/{id}/approve",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, body = RequestResponse),
        (status = 400, description = "Request already decided", body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn approve_request_doc() {}

#[utoipa::path(
    put,
    path = "/api/requests/{id}/reject",
    params(("id" = String, Path, description = "Request id")),
    request_body = RejectPayload,
    responses(
        (status = 200, body = RequestResponse),
        (status = 400, description = "Invalid reason or request already decided", body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse)
    ),
    tag = "Requests"
)]
fn reject_request_doc() {}
