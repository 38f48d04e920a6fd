use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::BackendError;
use crate::models::{
    ComponentFilter, ComponentId, Page, PermissionGrant, ProjectRecord, Qualifier, ResourceKind,
    Scope,
};

/// Component storage consumed by the provisioning workflows.
///
/// The registry owns every persisted component and is the only place key uniqueness is
/// enforced. Failures are reported as raw [`BackendError`]s and translated by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    /// Root components of the given qualifiers that have not been analysed yet
    async fn find_provisioned(
        &self,
        filter: ComponentFilter,
    ) -> Result<Page<ProjectRecord>, BackendError>;

    async fn find_by_key(&self, key: &str) -> Result<Option<ProjectRecord>, BackendError>;

    /// Registers a new component; fails when the key is already taken
    async fn create(
        &self,
        key: &str,
        name: &str,
        scope: Scope,
        qualifier: Qualifier,
    ) -> Result<ProjectRecord, BackendError>;

    /// Changes key and name of an existing component
    async fn update(
        &self,
        id: ComponentId,
        key: &str,
        name: &str,
    ) -> Result<ProjectRecord, BackendError>;

    /// Removes the component together with everything nested under it
    async fn delete_tree(&self, id: ComponentId) -> Result<(), BackendError>;
}

/// Something hanging off a component: a snapshot, a measure, a permission grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub component: ComponentId,
    pub kind: ResourceKind,
    pub label: String,
}

#[derive(Debug, Clone)]
struct StoredComponent {
    record: ProjectRecord,
    /// Root project for nested components, `None` for roots
    root: Option<ComponentId>,
}

#[derive(Debug, Default)]
struct Store {
    components: BTreeMap<ComponentId, StoredComponent>,
    resources: Vec<Resource>,
    last_id: i64,
}

impl Store {
    fn key_taken(&self, key: &str, except: Option<ComponentId>) -> bool {
        self.components
            .values()
            .any(|c| c.record.key == key && Some(c.record.id) != except)
    }

    fn subtree(&self, id: ComponentId) -> HashSet<ComponentId> {
        self.components
            .values()
            .filter(|c| c.record.id == id || c.root == Some(id))
            .map(|c| c.record.id)
            .collect()
    }

    fn has_snapshot(&self, id: ComponentId) -> bool {
        self.resources
            .iter()
            .any(|r| r.component == id && r.kind == ResourceKind::Snapshot)
    }

    fn insert(
        &mut self,
        key: &str,
        name: &str,
        scope: Scope,
        qualifier: Qualifier,
        root: Option<ComponentId>,
    ) -> ProjectRecord {
        self.last_id += 1;
        let record = ProjectRecord {
            id: ComponentId::new(self.last_id),
            key: key.to_string(),
            name: name.to_string(),
            scope,
            qualifier,
            created_at: Utc::now(),
        };
        self.components.insert(
            record.id,
            StoredComponent {
                record: record.clone(),
                root,
            },
        );
        record
    }
}

fn not_found(id: ComponentId) -> BackendError {
    BackendError::new(format!("Component not found: {}", id))
}

/// In-memory implementation of ComponentRegistry (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryComponentRegistry {
    store: Arc<RwLock<Store>>,
}

impl InMemoryComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: ComponentId) -> Option<ProjectRecord> {
        let store = self.store.read().await;
        store.components.get(&id).map(|c| c.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.components.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registers a module nested under `root`
    pub async fn add_module(
        &self,
        root: ComponentId,
        key: &str,
        name: &str,
    ) -> Result<ProjectRecord, BackendError> {
        let mut store = self.store.write().await;
        if !store.components.contains_key(&root) {
            return Err(not_found(root));
        }
        if store.key_taken(key, None) {
            return Err(BackendError::new(format!(
                "Could not create Module, key already exists: {}",
                key
            )));
        }
        Ok(store.insert(key, name, Scope::Directory, Qualifier::Module, Some(root)))
    }

    pub async fn attach_resource(
        &self,
        component: ComponentId,
        kind: ResourceKind,
        label: impl Into<String>,
    ) -> Result<(), BackendError> {
        let mut store = self.store.write().await;
        if !store.components.contains_key(&component) {
            return Err(not_found(component));
        }
        store.resources.push(Resource {
            component,
            kind,
            label: label.into(),
        });
        Ok(())
    }

    /// Resources attached to the component or anything nested under it
    pub async fn resources_of(&self, id: ComponentId) -> Vec<Resource> {
        let store = self.store.read().await;
        let ids = store.subtree(id);
        store
            .resources
            .iter()
            .filter(|r| ids.contains(&r.component))
            .cloned()
            .collect()
    }

    /// Swaps the permission grants of the component identified by `key`
    pub async fn replace_permissions(
        &self,
        key: &str,
        grants: &[PermissionGrant],
    ) -> Result<(), BackendError> {
        let mut store = self.store.write().await;
        let id = store
            .components
            .values()
            .find(|c| c.record.key == key)
            .map(|c| c.record.id)
            .ok_or_else(|| BackendError::new(format!("Component not found: {}", key)))?;

        store
            .resources
            .retain(|r| !(r.component == id && r.kind == ResourceKind::Permission));
        store
            .resources
            .extend(grants.iter().map(|grant| Resource {
                component: id,
                kind: ResourceKind::Permission,
                label: format!("{}:{}", grant.role, grant.group),
            }));
        Ok(())
    }

    /// Permission grants on the component identified by `key`, as `role:group`
    pub async fn permissions_of(&self, key: &str) -> Vec<String> {
        let store = self.store.read().await;
        let Some(id) = store
            .components
            .values()
            .find(|c| c.record.key == key)
            .map(|c| c.record.id)
        else {
            return Vec::new();
        };

        store
            .resources
            .iter()
            .filter(|r| r.component == id && r.kind == ResourceKind::Permission)
            .map(|r| r.label.clone())
            .collect()
    }
}

#[async_trait]
impl ComponentRegistry for InMemoryComponentRegistry {
    async fn find_provisioned(
        &self,
        filter: ComponentFilter,
    ) -> Result<Page<ProjectRecord>, BackendError> {
        let store = self.store.read().await;

        let mut matching: Vec<ProjectRecord> = store
            .components
            .values()
            .filter(|c| c.root.is_none())
            .filter(|c| filter.qualifiers.contains(&c.record.qualifier))
            .filter(|c| !store.has_snapshot(c.record.id))
            .filter(|c| filter.matches_text(&c.record))
            .map(|c| c.record.clone())
            .collect();

        matching.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.key.cmp(&b.key))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.page_size).unwrap_or(usize::MAX))
            .collect();

        Ok(Page {
            items,
            page: filter.page,
            page_size: filter.page_size,
            total,
        })
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ProjectRecord>, BackendError> {
        let store = self.store.read().await;
        Ok(store
            .components
            .values()
            .find(|c| c.record.key == key)
            .map(|c| c.record.clone()))
    }

    async fn create(
        &self,
        key: &str,
        name: &str,
        scope: Scope,
        qualifier: Qualifier,
    ) -> Result<ProjectRecord, BackendError> {
        let mut store = self.store.write().await;

        if store.key_taken(key, None) {
            return Err(BackendError::new(format!(
                "Could not create Project, key already exists: {}",
                key
            )));
        }

        let record = store.insert(key, name, scope, qualifier, None);
        tracing::info!(component_id = %record.id, key = %record.key, "Created component");
        Ok(record)
    }

    async fn update(
        &self,
        id: ComponentId,
        key: &str,
        name: &str,
    ) -> Result<ProjectRecord, BackendError> {
        let mut store = self.store.write().await;

        if !store.components.contains_key(&id) {
            return Err(not_found(id));
        }
        if store.key_taken(key, Some(id)) {
            return Err(BackendError::new(format!(
                "Could not update Project, key already exists: {}",
                key
            )));
        }

        let component = store.components.get_mut(&id).ok_or_else(|| not_found(id))?;
        component.record.key = key.to_string();
        component.record.name = name.to_string();
        let updated = component.record.clone();

        tracing::info!(component_id = %id, "Updated component");
        Ok(updated)
    }

    async fn delete_tree(&self, id: ComponentId) -> Result<(), BackendError> {
        let mut store = self.store.write().await;

        if !store.components.contains_key(&id) {
            return Err(not_found(id));
        }

        let doomed = store.subtree(id);
        store.components.retain(|cid, _| !doomed.contains(cid));
        store.resources.retain(|r| !doomed.contains(&r.component));

        tracing::info!(component_id = %id, removed = doomed.len(), "Deleted component tree");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProvisionedQuery;

    fn projects(query: ProvisionedQuery) -> ComponentFilter {
        ComponentFilter::provisioned(vec![Qualifier::Project], query)
    }

    async fn create(registry: &InMemoryComponentRegistry, key: &str, name: &str) -> ProjectRecord {
        registry
            .create(key, name, Scope::Project, Qualifier::Project)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let registry = InMemoryComponentRegistry::new();
        let a = create(&registry, "a", "A").await;
        let b = create(&registry, "b", "B").await;
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_key() {
        let registry = InMemoryComponentRegistry::new();
        create(&registry, "proj1", "One").await;

        let err = registry
            .create("proj1", "Other", Scope::Project, Qualifier::Project)
            .await
            .unwrap_err();
        assert!(err.message().contains("already exists"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_rejects_key_of_other_component() {
        let registry = InMemoryComponentRegistry::new();
        create(&registry, "a", "A").await;
        let b = create(&registry, "b", "B").await;

        assert!(registry.update(b.id, "a", "B").await.is_err());
        // keeping its own key is fine
        assert_eq!(registry.update(b.id, "b", "Bee").await.unwrap().name, "Bee");
    }

    #[tokio::test]
    async fn test_update_missing_component() {
        let registry = InMemoryComponentRegistry::new();
        let err = registry
            .update(ComponentId::new(9), "k", "n")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Component not found: 9");
    }

    #[tokio::test]
    async fn test_find_provisioned_skips_analysed_and_nested() {
        let registry = InMemoryComponentRegistry::new();
        let fresh = create(&registry, "fresh", "Fresh").await;
        let analysed = create(&registry, "analysed", "Analysed").await;
        registry
            .attach_resource(analysed.id, ResourceKind::Snapshot, "v1")
            .await
            .unwrap();
        registry.add_module(fresh.id, "fresh:core", "Core").await.unwrap();

        let page = registry
            .find_provisioned(projects(ProvisionedQuery::default()))
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].key, "fresh");
    }

    #[tokio::test]
    async fn test_find_provisioned_filters_sorts_and_pages() {
        let registry = InMemoryComponentRegistry::new();
        create(&registry, "zeta", "Zeta service").await;
        create(&registry, "alpha", "Alpha SERVICE").await;
        create(&registry, "tools", "Build tools").await;

        let page = registry
            .find_provisioned(projects(ProvisionedQuery {
                text: Some("service".into()),
                page: Some(1),
                page_size: Some(1),
            }))
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].key, "alpha");

        let second = registry
            .find_provisioned(projects(ProvisionedQuery {
                text: Some("service".into()),
                page: Some(2),
                page_size: Some(1),
            }))
            .await
            .unwrap();
        assert_eq!(second.items[0].key, "zeta");
    }

    #[tokio::test]
    async fn test_find_provisioned_past_the_last_page_is_empty() {
        let registry = InMemoryComponentRegistry::new();
        create(&registry, "alpha", "Alpha").await;

        let page = registry
            .find_provisioned(projects(ProvisionedQuery {
                text: None,
                page: Some(u64::MAX),
                page_size: None,
            }))
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_delete_tree_removes_nested_components_and_resources() {
        let registry = InMemoryComponentRegistry::new();
        let root = create(&registry, "proj", "Proj").await;
        let other = create(&registry, "other", "Other").await;
        let module = registry.add_module(root.id, "proj:m", "M").await.unwrap();
        registry
            .attach_resource(module.id, ResourceKind::Measure, "coverage")
            .await
            .unwrap();
        registry
            .attach_resource(root.id, ResourceKind::Snapshot, "v1")
            .await
            .unwrap();
        registry
            .attach_resource(other.id, ResourceKind::Measure, "coverage")
            .await
            .unwrap();

        registry.delete_tree(root.id).await.unwrap();

        assert!(registry.get(root.id).await.is_none());
        assert!(registry.get(module.id).await.is_none());
        assert!(registry.resources_of(root.id).await.is_empty());
        assert_eq!(registry.resources_of(other.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_permissions_is_idempotent() {
        let registry = InMemoryComponentRegistry::new();
        create(&registry, "proj", "Proj").await;
        let grants = vec![PermissionGrant {
            role: "admin".into(),
            group: "sonar-administrators".into(),
        }];

        registry.replace_permissions("proj", &grants).await.unwrap();
        registry.replace_permissions("proj", &grants).await.unwrap();

        assert_eq!(
            registry.permissions_of("proj").await,
            vec!["admin:sonar-administrators".to_string()]
        );
    }
}
