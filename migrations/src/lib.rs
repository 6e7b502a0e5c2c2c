pub use sea_orm_migration::prelude::*;

mod m20250110_000001_create_catalog_tables;
mod m20250110_000002_create_promotion_tables;
mod m20250110_000003_create_cart_items_table;
mod m20250110_000004_create_order_tables;
mod m20250110_000005_create_invoices_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_catalog_tables::Migration),
            Box::new(m20250110_000002_create_promotion_tables::Migration),
            Box::new(m20250110_000003_create_cart_items_table::Migration),
            Box::new(m20250110_000004_create_order_tables::Migration),
            Box::new(m20250110_000005_create_invoices_table::Migration),
        ]
    }
}
