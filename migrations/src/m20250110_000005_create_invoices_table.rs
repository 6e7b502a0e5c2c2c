use sea_orm_migration::prelude::*;

use crate::m20250110_000004_create_order_tables::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Invoices::ProviderInvoiceId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Invoices::ExternalId).string().not_null())
                    .col(ColumnDef::new(Invoices::OrderId).uuid().not_null())
                    .col(ColumnDef::new(Invoices::UserId).uuid().null())
                    .col(ColumnDef::new(Invoices::Status).string().not_null())
                    .col(ColumnDef::new(Invoices::Amount).decimal().not_null())
                    .col(ColumnDef::new(Invoices::Currency).string().not_null())
                    .col(ColumnDef::new(Invoices::PayerEmail).string().null())
                    .col(ColumnDef::new(Invoices::Raw).json().not_null())
                    .col(ColumnDef::new(Invoices::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Invoices::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invoices_order")
                            .from(Invoices::Table, Invoices::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Invoices {
    Table,
    Id,
    ProviderInvoiceId,
    ExternalId,
    OrderId,
    UserId,
    Status,
    Amount,
    Currency,
    PayerEmail,
    Raw,
    CreatedAt,
    UpdatedAt,
}
