use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_list};

use crate::error::BackendError;
use crate::models::PermissionGrant;
use crate::registry::InMemoryComponentRegistry;

pub const DEFAULT_TEMPLATE_GROUPS: &str =
    "admin:sonar-administrators,user:sonar-users,codeviewer:sonar-users";

/// Access rules attached to every newly provisioned project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTemplate {
    pub name: String,
    pub grants: Vec<PermissionGrant>,
}

impl PermissionTemplate {
    pub fn new(name: impl Into<String>, grants: Vec<PermissionGrant>) -> Self {
        Self {
            name: name.into(),
            grants,
        }
    }

    fn parse(raw: &[String]) -> Result<Self, ConfigError> {
        let grants = raw
            .iter()
            .map(|item| {
                item.parse::<PermissionGrant>()
                    .map_err(|details| ConfigError::ParseError {
                        key: "PROVISIONING_DEFAULT_TEMPLATE_GROUPS".to_string(),
                        details,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new("default", grants))
    }
}

impl Default for PermissionTemplate {
    fn default() -> Self {
        let raw: Vec<String> = DEFAULT_TEMPLATE_GROUPS
            .split(',')
            .map(str::to_string)
            .collect();
        Self::new(
            "default",
            raw.iter().filter_map(|item| item.parse().ok()).collect(),
        )
    }
}

impl FromEnv for PermissionTemplate {
    fn from_env() -> Result<Self, ConfigError> {
        Self::parse(&env_list(
            "PROVISIONING_DEFAULT_TEMPLATE_GROUPS",
            DEFAULT_TEMPLATE_GROUPS,
        ))
    }
}

/// Attaches the default permission template to a project.
///
/// Implementations must be idempotent: applying twice leaves the same grants as applying once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionTemplateApplier: Send + Sync {
    async fn apply_default(&self, key: &str) -> Result<(), BackendError>;
}

/// Applies the template to components of an [`InMemoryComponentRegistry`]
#[derive(Debug, Clone)]
pub struct InMemoryPermissionTemplates {
    registry: InMemoryComponentRegistry,
    template: PermissionTemplate,
}

impl InMemoryPermissionTemplates {
    pub fn new(registry: InMemoryComponentRegistry, template: PermissionTemplate) -> Self {
        Self { registry, template }
    }
}

#[async_trait]
impl PermissionTemplateApplier for InMemoryPermissionTemplates {
    async fn apply_default(&self, key: &str) -> Result<(), BackendError> {
        self.registry
            .replace_permissions(key, &self.template.grants)
            .await?;

        tracing::debug!(key = %key, template = %self.template.name, "Applied permission template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Qualifier, Scope};
    use crate::registry::ComponentRegistry;

    #[test]
    fn test_default_template_groups() {
        let template = PermissionTemplate::default();
        assert_eq!(template.grants.len(), 3);
        assert_eq!(template.grants[0].role, "admin");
        assert_eq!(template.grants[0].group, "sonar-administrators");
    }

    #[test]
    fn test_template_from_env() {
        temp_env::with_var(
            "PROVISIONING_DEFAULT_TEMPLATE_GROUPS",
            Some("admin:ops, user:everyone"),
            || {
                let template = PermissionTemplate::from_env().unwrap();
                assert_eq!(template.grants.len(), 2);
                assert_eq!(template.grants[1].group, "everyone");
            },
        );
    }

    #[test]
    fn test_template_from_env_defaults() {
        temp_env::with_var_unset("PROVISIONING_DEFAULT_TEMPLATE_GROUPS", || {
            assert_eq!(
                PermissionTemplate::from_env().unwrap(),
                PermissionTemplate::default()
            );
        });
    }

    #[test]
    fn test_template_from_env_rejects_malformed_grant() {
        temp_env::with_var(
            "PROVISIONING_DEFAULT_TEMPLATE_GROUPS",
            Some("admin"),
            || {
                assert!(matches!(
                    PermissionTemplate::from_env(),
                    Err(ConfigError::ParseError { .. })
                ));
            },
        );
    }

    #[tokio::test]
    async fn test_apply_default_to_unknown_key_fails() {
        let templates = InMemoryPermissionTemplates::new(
            InMemoryComponentRegistry::new(),
            PermissionTemplate::default(),
        );
        let err = templates.apply_default("ghost").await.unwrap_err();
        assert!(err.message().contains("not found"));
    }

    #[tokio::test]
    async fn test_apply_default_grants_template() {
        let registry = InMemoryComponentRegistry::new();
        registry
            .create("proj1", "Project One", Scope::Project, Qualifier::Project)
            .await
            .unwrap();
        let templates =
            InMemoryPermissionTemplates::new(registry.clone(), PermissionTemplate::default());

        templates.apply_default("proj1").await.unwrap();
        templates.apply_default("proj1").await.unwrap();

        assert_eq!(
            registry.permissions_of("proj1").await,
            vec![
                "admin:sonar-administrators",
                "user:sonar-users",
                "codeviewer:sonar-users"
            ]
        );
    }
}
