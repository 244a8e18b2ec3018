use std::any::Any;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use onboarding_core::api::{
    ChecklistResponse, CompleteTaskRequest, CompleteTaskResponse, EmployeeView, WhoAmIResponse,
};
use onboarding_core::{CallerIdentity, TaskKey};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, field, info_span};

use crate::auth::{require_identity, IdentityGate};
use crate::error::ApiError;
use crate::service::{CompleteOutcome, OnboardingService};

#[derive(Clone)]
pub struct AppState {
    pub service: OnboardingService,
    pub gate: Arc<IdentityGate>,
}

impl AppState {
    pub fn new(service: OnboardingService, gate: IdentityGate) -> Self {
        Self {
            service,
            gate: Arc::new(gate),
        }
    }
}

/// Full HTTP surface. Everything except `/health` sits behind the identity gate.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(whoami))
        .route("/employee/{name}", get(get_employee))
        .route("/onboarding/{department}", get(get_checklist))
        .route("/complete-task", post(complete_task))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.gate),
            require_identity,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                subject_id = field::Empty,
                trust_level = field::Empty,
            )
        }))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn whoami(Extension(caller): Extension<CallerIdentity>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse::from(&caller))
}

async fn get_employee(
    State(st): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EmployeeView>, ApiError> {
    match st.service.employee(name.clone()).await? {
        Some(employee) => Ok(Json(employee.into())),
        None => Err(ApiError::EmployeeNotFound { name }),
    }
}

async fn get_checklist(
    State(st): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(department): Path<String>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    match st
        .service
        .checklist(department.clone(), caller.subject_id)
        .await?
    {
        Some(checklist) => Ok(Json(checklist)),
        None => Err(ApiError::DepartmentNotFound {
            department,
            valid: st.service.department_names().await?,
        }),
    }
}

async fn complete_task(
    State(st): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CompleteTaskResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        debug!(error = %rejection, "rejected complete-task body");
        ApiError::InvalidRequest
    })?;
    if !body.as_object().is_some_and(|o| !o.is_empty()) {
        debug!("complete-task body is empty or not an object");
        return Err(ApiError::InvalidRequest);
    }
    let req: CompleteTaskRequest = serde_json::from_value(body).map_err(|e| {
        debug!(error = %e, "complete-task body has wrong field types");
        ApiError::InvalidRequest
    })?;

    let task_id = req.task_id.trim();
    let department = req.department.trim();
    if task_id.is_empty() || department.is_empty() {
        return Err(ApiError::MissingFields);
    }
    let key = TaskKey::new(task_id).map_err(|_| ApiError::MissingFields)?;

    match st
        .service
        .complete_task(department.to_string(), key, caller.subject_id)
        .await?
    {
        CompleteOutcome::Completed { response, .. } => Ok(Json(response)),
        CompleteOutcome::UnknownDepartment { valid } => Err(ApiError::DepartmentNotFound {
            department: department.to_string(),
            valid,
        }),
        CompleteOutcome::UnknownTask { valid } => Err(ApiError::TaskNotFound {
            task_id: task_id.to_string(),
            department: department.to_string(),
            valid,
        }),
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::Internal(anyhow::anyhow!("request handler panicked")).into_response()
}
