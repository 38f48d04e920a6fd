use std::sync::Arc;
use tracing::instrument;

use crate::auth::AdminCapability;
use crate::error::{Field, ProvisioningError, ProvisioningResult};
use crate::models::{
    ComponentFilter, ComponentId, Page, ProjectRecord, ProvisionedQuery, ProvisioningRequest,
    Qualifier, Scope,
};
use crate::permissions::PermissionTemplateApplier;
use crate::registry::ComponentRegistry;
use crate::translate::{self, translate};
use crate::validation::{self, ValidatedRequest};

/// Orchestrates the list, create-or-update and delete workflows.
///
/// Holds no project state of its own; the registry owns everything persisted.
pub struct ProvisioningService<R: ComponentRegistry, P: PermissionTemplateApplier> {
    registry: Arc<R>,
    permissions: Arc<P>,
}

impl<R: ComponentRegistry, P: PermissionTemplateApplier> Clone for ProvisioningService<R, P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            permissions: Arc::clone(&self.permissions),
        }
    }
}

impl<R: ComponentRegistry, P: PermissionTemplateApplier> ProvisioningService<R, P> {
    pub fn new(registry: R, permissions: P) -> Self {
        Self {
            registry: Arc::new(registry),
            permissions: Arc::new(permissions),
        }
    }

    /// Projects registered but not analysed yet
    #[instrument(skip_all, fields(admin = %admin.subject()))]
    pub async fn list(
        &self,
        admin: &AdminCapability,
        query: ProvisionedQuery,
    ) -> ProvisioningResult<Page<ProjectRecord>> {
        let filter = ComponentFilter::provisioned(vec![Qualifier::Project], query);
        self.registry
            .find_provisioned(filter)
            .await
            .map_err(|e| translate(&e))
    }

    /// Creates a project when the request carries no id, updates it otherwise.
    ///
    /// Invalid input fails before any backend call. On the create path a failure of the
    /// permission step yields [`ProvisioningError::PermissionTemplateFailure`], which carries
    /// the record that was persisted anyway.
    #[instrument(skip_all, fields(admin = %admin.subject(), key = %request.key()))]
    pub async fn create_or_update(
        &self,
        admin: &AdminCapability,
        request: ProvisioningRequest,
    ) -> ProvisioningResult<ProjectRecord> {
        let validated = validation::validate(request)?;

        match validated.id() {
            None => {
                let record = self.persist_project(&validated).await?;
                self.apply_template(record).await
            }
            Some(id) => self.update_project(id, &validated).await,
        }
    }

    /// First phase of the create path
    async fn persist_project(&self, request: &ValidatedRequest) -> ProvisioningResult<ProjectRecord> {
        let record = self
            .registry
            .create(request.key(), request.name(), Scope::Project, Qualifier::Project)
            .await
            .map_err(|e| translate(&e))?;

        tracing::info!(component_id = %record.id, key = %record.key, "Provisioned project");
        Ok(record)
    }

    /// Second phase of the create path. The record already exists at this point.
    async fn apply_template(&self, record: ProjectRecord) -> ProvisioningResult<ProjectRecord> {
        match self.permissions.apply_default(&record.key).await {
            Ok(()) => Ok(record),
            Err(err) => {
                tracing::warn!(
                    component_id = %record.id,
                    key = %record.key,
                    error = %err,
                    "Project persisted without its default permission template"
                );
                Err(ProvisioningError::PermissionTemplateFailure {
                    message: translate::resolve(err.message()),
                    record: Box::new(record),
                })
            }
        }
    }

    async fn update_project(
        &self,
        id: ComponentId,
        request: &ValidatedRequest,
    ) -> ProvisioningResult<ProjectRecord> {
        let record = self
            .registry
            .update(id, request.key(), request.name())
            .await
            .map_err(|e| translate(&e))?;

        tracing::info!(component_id = %id, "Updated project");
        Ok(record)
    }

    /// Irreversibly removes the project and every resource nested under it
    #[instrument(skip_all, fields(admin = %admin.subject(), component_id = %id))]
    pub async fn delete(&self, admin: &AdminCapability, id: ComponentId) -> ProvisioningResult<()> {
        self.registry
            .delete_tree(id)
            .await
            .map_err(|e| translate(&e))?;

        tracing::info!(component_id = %id, "Deleted project tree");
        Ok(())
    }

    /// Re-applies the default permission template to an existing project.
    ///
    /// Mends the state left behind by a [`ProvisioningError::PermissionTemplateFailure`].
    /// Safe to call on a project that already has its template.
    #[instrument(skip_all, fields(admin = %admin.subject(), key = %key))]
    pub async fn repair_permissions(
        &self,
        admin: &AdminCapability,
        key: &str,
    ) -> ProvisioningResult<ProjectRecord> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ProvisioningError::MissingField(Field::Key));
        }

        let record = self
            .registry
            .find_by_key(key)
            .await
            .map_err(|e| translate(&e))?
            .ok_or_else(|| ProvisioningError::NotFound(format!("Project not found: {}", key)))?;

        self.permissions
            .apply_default(&record.key)
            .await
            .map_err(|e| translate(&e))?;

        tracing::info!(component_id = %record.id, key = %record.key, "Repaired permission template");
        Ok(record)
    }
}
