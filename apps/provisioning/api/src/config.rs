use axum_helpers::JwtConfig;
use core_config::{AppInfo, FromEnv, app_info, database::DatabaseConfig, server::ServerConfig};
use domain_provisioning::PermissionTemplate;

pub use core_config::Environment;

/// Application-specific configuration
/// Composes shared config components from the `config` library
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    /// `None` selects the in-memory backends
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub template: PermissionTemplate,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = DatabaseConfig::from_env_optional();
        let jwt = JwtConfig::from_env()?; // Required - will fail if not set
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080
        let template = PermissionTemplate::from_env()?;

        Ok(Self {
            app: app_info!(),
            database,
            jwt,
            server,
            environment,
            template,
        })
    }
}
