use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Last block handled by each event listener, used to resume polling after a restart
        manager
            .create_table(
                Table::create()
                    .table(ListenerCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ListenerCheckpoints::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ListenerCheckpoints::ListenerName)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ListenerCheckpoints::LastBlock)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ListenerCheckpoints::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ListenerCheckpoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ListenerCheckpoints {
    Table,
    Id,
    ListenerName,
    LastBlock,
    UpdatedAt,
}
