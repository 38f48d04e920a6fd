use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Projects and everything nested under them (modules, directories, files)
        manager
            .create_table(
                Table::create()
                    .table(Components::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Components::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_len_uniq(Components::ComponentKey, 400))
                    .col(string_len(Components::Name, 2000))
                    .col(string_len(Components::Scope, 3))
                    .col(string_len(Components::Qualifier, 10))
                    .col(big_integer_null(Components::RootId))
                    .col(
                        timestamp_with_time_zone(Components::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_components_root_id")
                            .from(Components::Table, Components::RootId)
                            .to(Components::Table, Components::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_components_root_id")
                    .table(Components::Table)
                    .col(Components::RootId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_components_qualifier")
                    .table(Components::Table)
                    .col(Components::Qualifier)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Snapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Snapshots::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Snapshots::ComponentId))
                    .col(
                        timestamp_with_time_zone(Snapshots::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_snapshots_component_id")
                            .from(Snapshots::Table, Snapshots::ComponentId)
                            .to(Components::Table, Components::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Measures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Measures::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Measures::ComponentId))
                    .col(string(Measures::Metric))
                    .col(double(Measures::Value))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_measures_component_id")
                            .from(Measures::Table, Measures::ComponentId)
                            .to(Components::Table, Components::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PermissionGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermissionGrants::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(PermissionGrants::ComponentId))
                    .col(string(PermissionGrants::Role))
                    .col(string(PermissionGrants::GroupName))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_permission_grants_component_id")
                            .from(PermissionGrants::Table, PermissionGrants::ComponentId)
                            .to(Components::Table, Components::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permission_grants_unique")
                    .table(PermissionGrants::Table)
                    .col(PermissionGrants::ComponentId)
                    .col(PermissionGrants::Role)
                    .col(PermissionGrants::GroupName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PermissionGrants::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Measures::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Snapshots::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Components::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Components {
    Table,
    Id,
    ComponentKey,
    Name,
    Scope,
    Qualifier,
    RootId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Snapshots {
    Table,
    Id,
    ComponentId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Measures {
    Table,
    Id,
    ComponentId,
    Metric,
    Value,
}

#[derive(DeriveIden)]
enum PermissionGrants {
    Table,
    Id,
    ComponentId,
    Role,
    GroupName,
}
