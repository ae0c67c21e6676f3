//! Migration to create the transactions table holding one relay record per lock event

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    // lockId is assigned by the source chain, never generated locally
                    .col(
                        ColumnDef::new(Transactions::LockId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::User).string().not_null())
                    .col(ColumnDef::new(Transactions::TokenAddress).string().not_null())
                    .col(ColumnDef::new(Transactions::Amount).string().not_null())
                    .col(ColumnDef::new(Transactions::SourceTxHash).string().not_null())
                    // 0x-hex bytes32 sent to the mint contract as its replay key
                    .col(ColumnDef::new(Transactions::OriginHash).string_len(66).not_null())
                    .col(ColumnDef::new(Transactions::DestTxHash).string().null())
                    .col(
                        ColumnDef::new(Transactions::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Transactions::Error).string_len(255).null())
                    .col(
                        ColumnDef::new(Transactions::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Transactions::AckStatus)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookups by the origin-chain transaction key
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_source_tx_hash")
                    .table(Transactions::Table)
                    .col(Transactions::SourceTxHash)
                    .to_owned(),
            )
            .await?;

        // TokenMinted acknowledgments carry the bytes32 replay key
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_origin_hash")
                    .table(Transactions::Table)
                    .col(Transactions::OriginHash)
                    .to_owned(),
            )
            .await?;

        // Retry sweep: status = failed AND retry_count < max AND ack_status = 0
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_retry_sweep")
                    .table(Transactions::Table)
                    .col(Transactions::Status)
                    .col(Transactions::AckStatus)
                    .col(Transactions::RetryCount)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    LockId,
    User,
    TokenAddress,
    Amount,
    SourceTxHash,
    OriginHash,
    DestTxHash,
    Status,
    Error,
    RetryCount,
    AckStatus,
    CreatedAt,
    UpdatedAt,
}
