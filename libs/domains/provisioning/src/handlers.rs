use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post},
};
use axum_helpers::{
    AuditEvent, AuditOutcome, JwtAuth,
    errors::responses::{
        BadRequestResponse, ForbiddenResponse, InternalServerErrorResponse, NotFoundResponse,
        UnauthorizedResponse,
    },
    jwt_auth_middleware,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::auth::AdminCapability;
use crate::error::{ErrorDetail, ErrorKind, Field, ProvisioningError, ProvisioningResult};
use crate::models::{
    ComponentId, FormId, Page, ProjectRecord, ProvisionedQuery, ProvisioningForm, ProvisioningRequest,
    Qualifier, Scope,
};
use crate::permissions::PermissionTemplateApplier;
use crate::registry::ComponentRegistry;
use crate::service::ProvisioningService;
use crate::translate::{self, RESOURCE_DELETED};

/// Mount point of [`router`] inside the `/api` router
pub const URL: &str = "/provisioning";
/// Listing URL every mutation redirects to
pub const BASE_PATH: &str = "/api/provisioning";

const TAG: &str = "provisioning";

/// OpenAPI documentation for the Provisioning API
#[derive(OpenApi)]
#[openapi(
    paths(list_projects, create_or_update, delete_project, repair_permissions),
    components(
        schemas(
            ProjectRecord,
            ProvisioningForm,
            FormId,
            RepairRequest,
            Banner,
            BannerLevel,
            ErrorDetail,
            ErrorKind,
            Field,
            Qualifier,
            Scope
        ),
        responses(
            BadRequestResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            NotFoundResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = TAG, description = "Manual project provisioning (administrators only)")
    )
)]
pub struct ApiDoc;

type SharedService<R, P> = Arc<ProvisioningService<R, P>>;

/// Create the provisioning router.
///
/// Every route sits behind the JWT middleware; handlers additionally require an
/// [`AdminCapability`].
pub fn router<R, P>(service: ProvisioningService<R, P>, auth: JwtAuth) -> Router
where
    R: ComponentRegistry + 'static,
    P: PermissionTemplateApplier + 'static,
{
    let shared_service = Arc::new(service);

    Router::new()
        .route(
            "/",
            get(list_projects::<R, P>).post(create_or_update::<R, P>),
        )
        .route("/permissions/repair", post(repair_permissions::<R, P>))
        .route(
            "/{id}",
            delete(delete_project::<R, P>).fallback(redirect_to_index),
        )
        .route_layer(middleware::from_fn_with_state(auth, jwt_auth_middleware))
        .with_state(shared_service)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BannerLevel {
    Notice,
    Error,
}

/// Message shown on the listing page after a redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Banner {
    pub level: BannerLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl Banner {
    fn notice(message_key: &str) -> Self {
        Self {
            level: BannerLevel::Notice,
            message: translate::resolve(message_key),
            message_key: Some(message_key.to_string()),
            kind: None,
        }
    }

    fn error(err: &ProvisioningError) -> Self {
        let detail = err.detail();
        Self {
            level: BannerLevel::Error,
            message: detail.message,
            message_key: detail.message_key,
            kind: Some(detail.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RepairRequest {
    pub key: String,
}

/// 303 to the listing, carrying `body`
fn see_listing(body: impl Serialize) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, BASE_PATH)],
        Json(body),
    )
        .into_response()
}

/// Re-renders the submitted form with the failure attached, always as a 400
fn form_error(err: &ProvisioningError, form: &ProvisioningForm) -> Response {
    let mut body = err.error_response();
    if let Some(details) = body.details.as_mut() {
        details["form"] = json!(form);
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

async fn redirect_to_index() -> Redirect {
    Redirect::to(BASE_PATH)
}

/// List provisioned projects that have not been analysed yet
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(ProvisionedQuery),
    responses(
        (status = 200, description = "Page of provisioned projects", body = Page<ProjectRecord>),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_projects<R: ComponentRegistry, P: PermissionTemplateApplier>(
    State(service): State<SharedService<R, P>>,
    admin: AdminCapability,
    Query(query): Query<ProvisionedQuery>,
) -> ProvisioningResult<Json<Page<ProjectRecord>>> {
    let page = service.list(&admin, query).await?;
    Ok(Json(page))
}

/// Create a project (no `id`) or update an existing one (`id` present)
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = ProvisioningForm,
    responses(
        (status = 303, description = "Saved, redirecting to the listing", body = ProjectRecord),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse)
    )
)]
async fn create_or_update<R: ComponentRegistry, P: PermissionTemplateApplier>(
    State(service): State<SharedService<R, P>>,
    admin: AdminCapability,
    headers: HeaderMap,
    Json(form): Json<ProvisioningForm>,
) -> Response {
    let action = if form.is_update() {
        "project.update"
    } else {
        "project.provision"
    };

    let result = match ProvisioningRequest::try_from(form.clone()) {
        Ok(request) => service.create_or_update(&admin, request).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(record) => {
            AuditEvent::new(
                Some(admin.subject().to_string()),
                action,
                Some(format!("project:{}", record.key)),
                AuditOutcome::Success,
            )
            .with_request(&headers)
            .with_details(json!({ "component_id": record.id, "name": record.name }))
            .log();

            see_listing(record)
        }
        Err(err) => {
            AuditEvent::new(
                Some(admin.subject().to_string()),
                action,
                form.key.as_ref().map(|key| format!("project:{}", key.trim())),
                AuditOutcome::Failure,
            )
            .with_request(&headers)
            .with_details(json!({
                "kind": err.kind(),
                "record_persisted": err.record_persisted(),
            }))
            .log();

            form_error(&err, &form)
        }
    }
}

/// Delete a project and everything nested under it
///
/// Always redirects to the listing; the body carries a notice or an error banner.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Component ID")
    ),
    responses(
        (status = 303, description = "Redirect to the listing with a banner", body = Banner),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse)
    )
)]
async fn delete_project<R: ComponentRegistry, P: PermissionTemplateApplier>(
    State(service): State<SharedService<R, P>>,
    admin: AdminCapability,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let result = match raw_id.parse::<ComponentId>() {
        Ok(id) => service.delete(&admin, id).await,
        Err(err) => Err(err),
    };

    let (outcome, banner) = match &result {
        Ok(()) => (AuditOutcome::Success, Banner::notice(RESOURCE_DELETED)),
        Err(err) => (AuditOutcome::Failure, Banner::error(err)),
    };

    AuditEvent::new(
        Some(admin.subject().to_string()),
        "project.delete",
        Some(format!("component:{}", raw_id)),
        outcome,
    )
    .with_request(&headers)
    .log();

    see_listing(banner)
}

/// Re-apply the default permission template to an existing project
#[utoipa::path(
    post,
    path = "/permissions/repair",
    tag = TAG,
    request_body = RepairRequest,
    responses(
        (status = 200, description = "Template applied", body = ProjectRecord),
        (status = 400, response = BadRequestResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn repair_permissions<R: ComponentRegistry, P: PermissionTemplateApplier>(
    State(service): State<SharedService<R, P>>,
    admin: AdminCapability,
    headers: HeaderMap,
    Json(input): Json<RepairRequest>,
) -> ProvisioningResult<Json<ProjectRecord>> {
    let result = service.repair_permissions(&admin, &input.key).await;

    AuditEvent::new(
        Some(admin.subject().to_string()),
        "project.permissions.repair",
        Some(format!("project:{}", input.key.trim())),
        if result.is_ok() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        },
    )
    .with_request(&headers)
    .log();

    Ok(Json(result?))
}
