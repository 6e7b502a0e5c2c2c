use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::{cart_item, product, product_variant};
use crate::errors::ServiceError;

/// Owns the cart-item lifecycle the checkout pipeline depends on:
/// merge-on-add, listing, removal. Rows are deleted by the checkout
/// orchestrator when an order is committed.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product to the user's cart. An existing row for the same
    /// (product, variant) is merged by incrementing its quantity.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not available", product_id))
            })?;

        if let Some(variant_id) = variant_id {
            product_variant::Entity::find_by_id(variant_id)
                .one(&*self.db)
                .await?
                .filter(|v| v.product_id == product.id && v.is_active)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Variant {} does not belong to product {}",
                        variant_id, product_id
                    ))
                })?;
        }

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(match variant_id {
                Some(id) => cart_item::Column::VariantId.eq(id),
                None => cart_item::Column::VariantId.is_null(),
            })
            .one(&*self.db)
            .await?;

        let item = match existing {
            Some(item) => {
                let merged_quantity = item.quantity + quantity;
                let mut update: cart_item::ActiveModel = item.into();
                update.quantity = Set(merged_quantity);
                update.updated_at = Set(Utc::now());
                update.update(&*self.db).await?
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    variant_id: Set(variant_id),
                    quantity: Set(quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?
            }
        };

        Ok(item)
    }

    /// Lists the user's cart rows.
    pub async fn items(&self, user_id: Uuid) -> Result<Vec<cart_item::Model>, ServiceError> {
        Ok(cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?)
    }

    /// Removes a single cart row owned by the user.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let result = cart_item::Entity::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Cart item {} not found",
                item_id
            )));
        }

        Ok(())
    }
}
