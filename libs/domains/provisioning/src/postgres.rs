use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

use crate::{
    entity::{component, measure, permission_grant, snapshot},
    error::BackendError,
    models::{ComponentFilter, ComponentId, Page, ProjectRecord, Qualifier, Scope},
    permissions::{PermissionTemplate, PermissionTemplateApplier},
    registry::ComponentRegistry,
};

fn not_found(id: impl std::fmt::Display) -> BackendError {
    BackendError::new(format!("Component not found: {}", id))
}

/// Escapes LIKE wildcards and wraps the needle for a substring match
fn like_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

async fn find_by_key<C: ConnectionTrait>(
    db: &C,
    key: &str,
) -> Result<Option<component::Model>, BackendError> {
    Ok(component::Entity::find()
        .filter(component::Column::ComponentKey.eq(key))
        .one(db)
        .await?)
}

pub struct PgComponentRegistry {
    db: DatabaseConnection,
}

impl PgComponentRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ComponentRegistry for PgComponentRegistry {
    async fn find_provisioned(
        &self,
        filter: ComponentFilter,
    ) -> Result<Page<ProjectRecord>, BackendError> {
        let qualifiers: Vec<String> = filter.qualifiers.iter().map(|q| q.to_string()).collect();

        // Components that already have an analysis are no longer "provisioned"
        let analysed = Query::select()
            .column(snapshot::Column::ComponentId)
            .from(snapshot::Entity)
            .to_owned();

        let mut query = component::Entity::find()
            .filter(component::Column::Qualifier.is_in(qualifiers))
            .filter(component::Column::RootId.is_null())
            .filter(component::Column::Id.not_in_subquery(analysed));

        if let Some(text) = &filter.text {
            let pattern = like_pattern(text);
            query = query.filter(Expr::cust_with_values(
                "(LOWER(component_key) LIKE $1 OR LOWER(name) LIKE $2)",
                [pattern.clone(), pattern],
            ));
        }

        let total = query.clone().count(&self.db).await?;

        let models = query
            .order_by_asc(component::Column::Name)
            .order_by_asc(component::Column::ComponentKey)
            .offset(filter.offset())
            .limit(filter.page_size)
            .all(&self.db)
            .await?;

        let items = models
            .into_iter()
            .map(ProjectRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: filter.page,
            page_size: filter.page_size,
            total,
        })
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ProjectRecord>, BackendError> {
        find_by_key(&self.db, key)
            .await?
            .map(ProjectRecord::try_from)
            .transpose()
    }

    async fn create(
        &self,
        key: &str,
        name: &str,
        scope: Scope,
        qualifier: Qualifier,
    ) -> Result<ProjectRecord, BackendError> {
        // The unique index still rejects a concurrent writer that passes this check
        if find_by_key(&self.db, key).await?.is_some() {
            return Err(BackendError::new(format!(
                "Could not create Project, key already exists: {}",
                key
            )));
        }

        let model = component::ActiveModel {
            component_key: Set(key.to_string()),
            name: Set(name.to_string()),
            scope: Set(scope.to_string()),
            qualifier: Set(qualifier.to_string()),
            root_id: Set(None),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(component_id = model.id, key = %model.component_key, "Created component");
        model.try_into()
    }

    async fn update(
        &self,
        id: ComponentId,
        key: &str,
        name: &str,
    ) -> Result<ProjectRecord, BackendError> {
        let model = component::Entity::find_by_id(id.value())
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found(id))?;

        let key_taken = component::Entity::find()
            .filter(component::Column::ComponentKey.eq(key))
            .filter(component::Column::Id.ne(id.value()))
            .one(&self.db)
            .await?
            .is_some();
        if key_taken {
            return Err(BackendError::new(format!(
                "Could not update Project, key already exists: {}",
                key
            )));
        }

        let mut active: component::ActiveModel = model.into();
        active.component_key = Set(key.to_string());
        active.name = Set(name.to_string());
        let updated = active.update(&self.db).await?;

        tracing::info!(component_id = %id, "Updated component");
        updated.try_into()
    }

    async fn delete_tree(&self, id: ComponentId) -> Result<(), BackendError> {
        let txn = self.db.begin().await?;

        if component::Entity::find_by_id(id.value())
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(not_found(id));
        }

        let mut tree: Vec<i64> = component::Entity::find()
            .select_only()
            .column(component::Column::Id)
            .filter(component::Column::RootId.eq(id.value()))
            .into_tuple()
            .all(&txn)
            .await?;
        tree.push(id.value());

        permission_grant::Entity::delete_many()
            .filter(permission_grant::Column::ComponentId.is_in(tree.clone()))
            .exec(&txn)
            .await?;
        measure::Entity::delete_many()
            .filter(measure::Column::ComponentId.is_in(tree.clone()))
            .exec(&txn)
            .await?;
        snapshot::Entity::delete_many()
            .filter(snapshot::Column::ComponentId.is_in(tree.clone()))
            .exec(&txn)
            .await?;
        // Nested components first, the root references nothing
        component::Entity::delete_many()
            .filter(component::Column::RootId.eq(id.value()))
            .exec(&txn)
            .await?;
        component::Entity::delete_by_id(id.value()).exec(&txn).await?;

        txn.commit().await?;

        tracing::info!(component_id = %id, removed = tree.len(), "Deleted component tree");
        Ok(())
    }
}

/// Stores the default template as rows of `permission_grants`
pub struct PgPermissionTemplates {
    db: DatabaseConnection,
    template: PermissionTemplate,
}

impl PgPermissionTemplates {
    pub fn new(db: DatabaseConnection, template: PermissionTemplate) -> Self {
        Self { db, template }
    }
}

#[async_trait]
impl PermissionTemplateApplier for PgPermissionTemplates {
    async fn apply_default(&self, key: &str) -> Result<(), BackendError> {
        let txn = self.db.begin().await?;

        let component = find_by_key(&txn, key)
            .await?
            .ok_or_else(|| not_found(key))?;

        // Replace rather than append so that re-applying is a no-op
        permission_grant::Entity::delete_many()
            .filter(permission_grant::Column::ComponentId.eq(component.id))
            .exec(&txn)
            .await?;

        if !self.template.grants.is_empty() {
            let rows = self
                .template
                .grants
                .iter()
                .map(|grant| permission_grant::ActiveModel {
                    component_id: Set(component.id),
                    role: Set(grant.role.clone()),
                    group_name: Set(grant.group.clone()),
                    ..Default::default()
                });
            permission_grant::Entity::insert_many(rows)
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        tracing::debug!(key = %key, template = %self.template.name, "Applied permission template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn model(id: i64, key: &str, name: &str) -> component::Model {
        component::Model {
            id,
            component_key: key.to_string(),
            name: name.to_string(),
            scope: "PRJ".to_string(),
            qualifier: "TRK".to_string(),
            root_id: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Core"), "%core%");
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }

    #[tokio::test]
    async fn test_create_inserts_new_component() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<component::Model>::new()])
            .append_query_results([vec![model(1, "proj1", "Project One")]])
            .into_connection();

        let registry = PgComponentRegistry::new(db);
        let record = registry
            .create("proj1", "Project One", Scope::Project, Qualifier::Project)
            .await
            .unwrap();

        assert_eq!(record.id, ComponentId::new(1));
        assert_eq!(record.qualifier, Qualifier::Project);
    }

    #[tokio::test]
    async fn test_create_with_taken_key_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model(1, "proj1", "Project One")]])
            .into_connection();

        let registry = PgComponentRegistry::new(db);
        let err = registry
            .create("proj1", "Other", Scope::Project, Qualifier::Project)
            .await
            .unwrap_err();

        assert!(err.message().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_missing_component() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<component::Model>::new()])
            .into_connection();

        let registry = PgComponentRegistry::new(db);
        let err = registry
            .update(ComponentId::new(9), "proj1", "Renamed")
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Component not found: 9");
    }

    #[tokio::test]
    async fn test_delete_missing_component() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<component::Model>::new()])
            .into_connection();

        let registry = PgComponentRegistry::new(db);
        let err = registry.delete_tree(ComponentId::new(4)).await.unwrap_err();

        assert_eq!(err.message(), "Component not found: 4");
    }

    #[tokio::test]
    async fn test_find_by_key_maps_model() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model(2, "proj2", "Project Two")]])
            .into_connection();

        let registry = PgComponentRegistry::new(db);
        let record = registry.find_by_key("proj2").await.unwrap().unwrap();
        assert_eq!(record.name, "Project Two");
    }

    #[tokio::test]
    async fn test_apply_template_to_unknown_key() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<component::Model>::new()])
            .into_connection();

        let templates = PgPermissionTemplates::new(db, PermissionTemplate::default());
        let err = templates.apply_default("ghost").await.unwrap_err();
        assert_eq!(err.message(), "Component not found: ghost");
    }
}
