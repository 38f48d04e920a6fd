use crate::{env_optional, env_required, ConfigError, FromEnv};

/// Database configuration
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
}

impl DatabaseConfig {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    /// Reads `DATABASE_URL` when present.
    ///
    /// Services that can fall back to an in-process store use this instead of
    /// [`FromEnv::from_env`], which treats the variable as mandatory.
    pub fn from_env_optional() -> Option<Self> {
        env_optional("DATABASE_URL").map(Self::new)
    }
}

impl FromEnv for DatabaseConfig {
    /// Requires DATABASE_URL to be set (no default)
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("DATABASE_URL")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_from_env_success() {
        temp_env::with_var("DATABASE_URL", Some("postgres://localhost/testdb"), || {
            let config = DatabaseConfig::from_env().unwrap();
            assert_eq!(config.url, "postgres://localhost/testdb");
        });
    }

    #[test]
    fn test_database_config_from_env_missing() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let err = DatabaseConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }

    #[test]
    fn test_database_config_optional() {
        temp_env::with_var_unset("DATABASE_URL", || {
            assert!(DatabaseConfig::from_env_optional().is_none());
        });

        temp_env::with_var("DATABASE_URL", Some("postgres://db/provisioning"), || {
            let config = DatabaseConfig::from_env_optional().unwrap();
            assert_eq!(config.url, "postgres://db/provisioning");
        });
    }
}
