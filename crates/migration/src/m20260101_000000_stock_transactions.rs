//! Initial schema: the permanent stock transaction store.
//!
//! - `stock_transactions`: one row per line item. Rows are never deleted;
//!   soft deletion stamps `deleted_at` (epoch ms) and `deleted_by`.
//!
//! `batch_id` is nullable for rows imported from before batches existed.
//! `image_url` is the deprecated single-URL evidence column, kept readable;
//! new rows only write the `image_urls` JSON array.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum StockTransactions {
    Table,
    Id,
    BatchId,
    Timestamp,
    Date,
    BranchId,
    SkuId,
    #[iden = "type"]
    Kind,
    QuantityPieces,
    ImageUrls,
    ImageUrl,
    UserId,
    UserName,
    DeletedAt,
    DeletedBy,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockTransactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockTransactions::BatchId).string())
                    .col(
                        ColumnDef::new(StockTransactions::Timestamp)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransactions::Date).string().not_null())
                    .col(
                        ColumnDef::new(StockTransactions::BranchId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransactions::SkuId).string().not_null())
                    .col(ColumnDef::new(StockTransactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(StockTransactions::QuantityPieces)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransactions::ImageUrls).text())
                    .col(ColumnDef::new(StockTransactions::ImageUrl).string())
                    .col(ColumnDef::new(StockTransactions::UserId).string().not_null())
                    .col(
                        ColumnDef::new(StockTransactions::UserName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransactions::DeletedAt).big_integer())
                    .col(ColumnDef::new(StockTransactions::DeletedBy).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stock_transactions-batch_id")
                    .table(StockTransactions::Table)
                    .col(StockTransactions::BatchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stock_transactions-date-branch_id")
                    .table(StockTransactions::Table)
                    .col(StockTransactions::Date)
                    .col(StockTransactions::BranchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stock_transactions-deleted_at")
                    .table(StockTransactions::Table)
                    .col(StockTransactions::DeletedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockTransactions::Table).to_owned())
            .await?;
        Ok(())
    }
}
