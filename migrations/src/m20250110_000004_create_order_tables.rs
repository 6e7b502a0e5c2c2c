use sea_orm_migration::prelude::*;

use crate::m20250110_000001_create_catalog_tables::{Products, ProductVariants};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Orders::UserId).uuid().null())
                    .col(
                        ColumnDef::new(Orders::ExternalId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Orders::Subtotal)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Tax)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::ShippingFee)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Discount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Total)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Orders::PaymentStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Orders::PaymentMethod).string().not_null())
                    .col(ColumnDef::new(Orders::ShippingMethod).string().not_null())
                    .col(ColumnDef::new(Orders::XenditInvoiceId).string().null())
                    .col(ColumnDef::new(Orders::InvoicePdfUrl).string().null())
                    .col(ColumnDef::new(Orders::PaidAt).timestamp().null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderProducts::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderProducts::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderProducts::ProductId).uuid().not_null())
                    .col(ColumnDef::new(OrderProducts::VariantId).uuid().null())
                    .col(ColumnDef::new(OrderProducts::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderProducts::UnitPrice).decimal().not_null())
                    .col(ColumnDef::new(OrderProducts::ListPrice).decimal().not_null())
                    .col(
                        ColumnDef::new(OrderProducts::DiscountAmount)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(OrderProducts::PromotionSource)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(OrderProducts::PromotionId).uuid().null())
                    .col(
                        ColumnDef::new(OrderProducts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_products_order")
                            .from(OrderProducts::Table, OrderProducts::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_products_product")
                            .from(OrderProducts::Table, OrderProducts::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_products_variant")
                            .from(OrderProducts::Table, OrderProducts::VariantId)
                            .to(ProductVariants::Table, ProductVariants::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_products_order_id")
                    .table(OrderProducts::Table)
                    .col(OrderProducts::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderProducts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    UserId,
    ExternalId,
    Subtotal,
    Tax,
    ShippingFee,
    Discount,
    Total,
    Status,
    PaymentStatus,
    PaymentMethod,
    ShippingMethod,
    XenditInvoiceId,
    InvoicePdfUrl,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum OrderProducts {
    Table,
    Id,
    OrderId,
    ProductId,
    VariantId,
    Quantity,
    UnitPrice,
    ListPrice,
    DiscountAmount,
    PromotionSource,
    PromotionId,
    CreatedAt,
}
