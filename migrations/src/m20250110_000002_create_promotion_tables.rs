use sea_orm_migration::prelude::*;

use crate::m20250110_000001_create_catalog_tables::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Discounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Discounts::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Discounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Discounts::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Discounts::DiscountType).string().not_null())
                    .col(ColumnDef::new(Discounts::Value).decimal().not_null())
                    .col(ColumnDef::new(Discounts::GetQuantity).integer().null())
                    .col(
                        ColumnDef::new(Discounts::MinPurchaseAmount)
                            .decimal()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Discounts::MaxDiscountAmount)
                            .decimal()
                            .null(),
                    )
                    .col(ColumnDef::new(Discounts::UsageLimit).integer().null())
                    .col(
                        ColumnDef::new(Discounts::UsedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Discounts::StartsAt).timestamp().null())
                    .col(ColumnDef::new(Discounts::EndsAt).timestamp().null())
                    .col(
                        ColumnDef::new(Discounts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Discounts::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Discounts::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DiscountProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiscountProducts::DiscountId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiscountProducts::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(DiscountProducts::DiscountId)
                            .col(DiscountProducts::ProductId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_discount_products_discount")
                            .from(DiscountProducts::Table, DiscountProducts::DiscountId)
                            .to(Discounts::Table, Discounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_discount_products_product")
                            .from(DiscountProducts::Table, DiscountProducts::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FlashSales::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FlashSales::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FlashSales::Title).string().not_null())
                    .col(
                        ColumnDef::new(FlashSales::DiscountPercentage)
                            .decimal()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FlashSales::MaxDiscountAmount)
                            .decimal()
                            .null(),
                    )
                    .col(ColumnDef::new(FlashSales::MaxQuantity).integer().null())
                    .col(
                        ColumnDef::new(FlashSales::SoldQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(FlashSales::StartsAt).timestamp().not_null())
                    .col(ColumnDef::new(FlashSales::EndsAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(FlashSales::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(FlashSales::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(FlashSales::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FlashSaleProducts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FlashSaleProducts::FlashSaleId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FlashSaleProducts::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(FlashSaleProducts::FlashSaleId)
                            .col(FlashSaleProducts::ProductId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_flash_sale_products_flash_sale")
                            .from(FlashSaleProducts::Table, FlashSaleProducts::FlashSaleId)
                            .to(FlashSales::Table, FlashSales::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_flash_sale_products_product")
                            .from(FlashSaleProducts::Table, FlashSaleProducts::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FlashSaleProducts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FlashSales::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DiscountProducts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Discounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Discounts {
    Table,
    Id,
    Name,
    Code,
    DiscountType,
    Value,
    GetQuantity,
    MinPurchaseAmount,
    MaxDiscountAmount,
    UsageLimit,
    UsedCount,
    StartsAt,
    EndsAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum DiscountProducts {
    Table,
    DiscountId,
    ProductId,
}

#[derive(DeriveIden)]
pub enum FlashSales {
    Table,
    Id,
    Title,
    DiscountPercentage,
    MaxDiscountAmount,
    MaxQuantity,
    SoldQuantity,
    StartsAt,
    EndsAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum FlashSaleProducts {
    Table,
    FlashSaleId,
    ProductId,
}
