//! Sea-ORM entities backing the Postgres registry.

use std::str::FromStr;

use crate::error::BackendError;
use crate::models::{ComponentId, ProjectRecord, Qualifier, Scope};

pub mod component {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "components")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        #[sea_orm(unique)]
        pub component_key: String,
        pub name: String,
        pub scope: String,
        pub qualifier: String,
        /// Root project of a nested component
        pub root_id: Option<i64>,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod snapshot {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "snapshots")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub component_id: i64,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod measure {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "measures")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub component_id: i64,
        pub metric: String,
        pub value: f64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod permission_grant {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "permission_grants")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub component_id: i64,
        pub role: String,
        pub group_name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

// Conversion from Sea-ORM Model to domain ProjectRecord
impl TryFrom<component::Model> for ProjectRecord {
    type Error = BackendError;

    fn try_from(model: component::Model) -> Result<Self, Self::Error> {
        let scope = Scope::from_str(&model.scope).map_err(|_| {
            BackendError::new(format!(
                "Component {} has unknown scope '{}'",
                model.id, model.scope
            ))
        })?;
        let qualifier = Qualifier::from_str(&model.qualifier).map_err(|_| {
            BackendError::new(format!(
                "Component {} has unknown qualifier '{}'",
                model.id, model.qualifier
            ))
        })?;

        Ok(Self {
            id: ComponentId::new(model.id),
            key: model.component_key,
            name: model.name,
            scope,
            qualifier,
            created_at: model.created_at.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn model(scope: &str, qualifier: &str) -> component::Model {
        component::Model {
            id: 3,
            component_key: "proj1".to_string(),
            name: "Project One".to_string(),
            scope: scope.to_string(),
            qualifier: qualifier.to_string(),
            root_id: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_model_to_record() {
        let record = ProjectRecord::try_from(model("PRJ", "TRK")).unwrap();
        assert_eq!(record.id, ComponentId::new(3));
        assert_eq!(record.key, "proj1");
        assert_eq!(record.qualifier, Qualifier::Project);
    }

    #[test]
    fn test_unknown_qualifier_is_backend_error() {
        let err = ProjectRecord::try_from(model("PRJ", "VW")).unwrap_err();
        assert!(err.message().contains("unknown qualifier 'VW'"));
    }
}
