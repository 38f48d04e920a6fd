use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Provisioning API",
        version = "0.1.0",
        description = "Manual provisioning of projects ahead of their first analysis"
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = domain_provisioning::handlers::URL, api = domain_provisioning::ApiDoc)
    )
)]
pub struct ApiDoc;
