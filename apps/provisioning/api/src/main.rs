use axum::Router;
use axum_helpers::server::{create_production_app, health_router};
use axum_helpers::JwtAuth;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_provisioning::{
    ComponentRegistry, InMemoryComponentRegistry, InMemoryPermissionTemplates,
    PermissionTemplateApplier, PgComponentRegistry, PgPermissionTemplates, ProvisioningService,
    handlers,
};
use tracing::{info, warn};

mod config;
mod db;
mod openapi;

use config::Config;

/// Mounts the provisioning router at its URL inside `/api`
fn routes<R, P>(service: ProvisioningService<R, P>, auth: JwtAuth) -> Router
where
    R: ComponentRegistry + 'static,
    P: PermissionTemplateApplier + 'static,
{
    Router::new().nest(handlers::URL, handlers::router(service, auth))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    let jwt_auth = JwtAuth::new(&config.jwt);

    let (api_routes, db) = match &config.database {
        Some(database) => {
            let db = db::connect(database)
                .await
                .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;
            db::run_migrations(&db).await?;

            let registry = PgComponentRegistry::new(db.clone());
            let templates = PgPermissionTemplates::new(db.clone(), config.template.clone());
            info!("Using PostgreSQL component registry");
            (
                routes(ProvisioningService::new(registry, templates), jwt_auth),
                Some(db),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory registry (data is lost on restart)");
            let registry = InMemoryComponentRegistry::new();
            let templates =
                InMemoryPermissionTemplates::new(registry.clone(), config.template.clone());
            (
                routes(ProvisioningService::new(registry, templates), jwt_auth),
                None,
            )
        }
    };

    // create_router adds docs/middleware to our composed routes
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    // /health: liveness check with app name/version
    let app = router.merge(health_router(config.app));

    info!(
        "Starting provisioning API ({:?} graceful shutdown timeout)",
        config.server.shutdown_timeout
    );

    create_production_app(app, &config.server, async move {
        info!("Shutting down: closing database connections");
        if let Some(db) = db {
            match db.close().await {
                Ok(_) => info!("PostgreSQL connection closed successfully"),
                Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
            }
        }
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Provisioning API shutdown complete");
    Ok(())
}
