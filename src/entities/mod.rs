//! SeaORM entities for the checkout and promotion pricing pipeline.

pub mod cart_item;
pub mod discount;
pub mod discount_product;
pub mod flash_sale;
pub mod flash_sale_product;
pub mod invoice;
pub mod order;
pub mod order_product;
pub mod product;
pub mod product_variant;

pub use cart_item::Entity as CartItem;
pub use discount::Entity as Discount;
pub use discount_product::Entity as DiscountProduct;
pub use flash_sale::Entity as FlashSale;
pub use flash_sale_product::Entity as FlashSaleProduct;
pub use invoice::Entity as Invoice;
pub use order::Entity as Order;
pub use order_product::Entity as OrderProduct;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
