use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::{order_product::PromotionSource, product, product_variant};
use crate::errors::ServiceError;
use crate::services::promotions::{select_best, PromotionService};

/// Tolerance before a client-supplied price triggers an audit warning.
const PRICE_AUDIT_TOLERANCE: Decimal = Decimal::ONE;

/// One requested checkout line, before pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    /// Client-supplied unit price, accepted under the trust-with-audit
    /// boundary. Promotions never evaluate against this value.
    pub price: Option<Decimal>,
}

/// Promotion attributed to a priced line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub source: PromotionSource,
    pub id: Uuid,
}

/// A checkout line with its authoritative pricing resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    /// Pre-discount server price.
    pub list_price: Decimal,
    /// As-charged unit price (per-unit discounts already folded in).
    pub unit_price: Decimal,
    /// Per-unit promotion discount that was folded into `unit_price`.
    /// Kept separate so promotion money stays distinguishable from a
    /// client-price deviation.
    pub per_unit_discount: Decimal,
    /// Line-level discount not representable per unit.
    pub discount_amount: Decimal,
    pub promotion: Option<AppliedPromotion>,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        (self.unit_price * Decimal::from(self.quantity) - self.discount_amount)
            .max(Decimal::ZERO)
    }

    pub fn gross(&self) -> Decimal {
        self.list_price * Decimal::from(self.quantity)
    }

    /// Total promotion discount on the line, per-unit and line-level
    /// parts combined.
    pub fn promotion_total(&self) -> Decimal {
        self.per_unit_discount * Decimal::from(self.quantity) + self.discount_amount
    }
}

/// Whether a client-supplied price deviates from the server price by more
/// than one currency unit.
pub fn price_deviates(client: Decimal, server: Decimal) -> bool {
    (client - server).abs() > PRICE_AUDIT_TOLERANCE
}

/// Resolves authoritative prices and attaches the single best promotion
/// per line.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
    promotions: PromotionService,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>, promotions: PromotionService) -> Self {
        Self { db, promotions }
    }

    #[instrument(skip(self, requests))]
    pub async fn price_lines(
        &self,
        requests: &[LineRequest],
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let mut lines = Vec::with_capacity(requests.len());
        for request in requests {
            lines.push(self.price_line(request).await?);
        }
        Ok(lines)
    }

    /// Prices a single line: resolves the server price (variant override,
    /// primary variant, or product price), applies the trust-with-audit
    /// client price, and folds in the best applicable promotion.
    pub async fn price_line(&self, request: &LineRequest) -> Result<PricedLine, ServiceError> {
        if request.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }

        let product = product::Entity::find_by_id(request.product_id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not available", request.product_id))
            })?;

        let variant = self.resolve_variant(&product, request.variant_id).await?;
        let (variant_id, server_price) = match &variant {
            Some(v) => (Some(v.id), v.price),
            None => (None, product.price),
        };

        // Trust boundary: a client price is charged as sent, but audited
        // against the server price. Promotions evaluate on the server
        // price only, so a stale client cannot widen its own discount.
        let charged_base = match request.price {
            Some(client_price) => {
                if price_deviates(client_price, server_price) {
                    warn!(
                        product_id = %request.product_id,
                        variant_id = ?request.variant_id,
                        %client_price,
                        %server_price,
                        "client price deviates from server price"
                    );
                }
                client_price
            }
            None => server_price,
        };

        let candidates = self
            .promotions
            .candidates_for_product(request.product_id)
            .await?;

        let selected = select_best(&candidates, server_price, request.quantity);

        let (unit_price, per_unit_discount, discount_amount, promotion) = match selected {
            Some((d, candidate)) => (
                (charged_base - d.per_unit).max(Decimal::ZERO),
                d.per_unit,
                d.line,
                Some(AppliedPromotion {
                    source: candidate.source(),
                    id: candidate.id(),
                }),
            ),
            None => (charged_base, Decimal::ZERO, Decimal::ZERO, None),
        };

        Ok(PricedLine {
            product_id: product.id,
            variant_id,
            quantity: request.quantity,
            list_price: server_price,
            unit_price,
            per_unit_discount,
            discount_amount,
            promotion,
        })
    }

    /// A named variant must belong to the product and be active; with no
    /// variant named, the product's primary variant (if any) supplies the
    /// price and stock tracking.
    async fn resolve_variant(
        &self,
        product: &product::Model,
        variant_id: Option<Uuid>,
    ) -> Result<Option<product_variant::Model>, ServiceError> {
        match variant_id {
            Some(id) => {
                let variant = product_variant::Entity::find_by_id(id)
                    .one(&*self.db)
                    .await?
                    .filter(|v| v.product_id == product.id && v.is_active)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "Variant {} does not belong to product {}",
                            id, product.id
                        ))
                    })?;
                Ok(Some(variant))
            }
            None => {
                let primary = product_variant::Entity::find()
                    .filter(product_variant::Column::ProductId.eq(product.id))
                    .filter(product_variant::Column::IsPrimary.eq(true))
                    .filter(product_variant::Column::IsActive.eq(true))
                    .one(&*self.db)
                    .await?;
                Ok(primary)
            }
        }
    }
}
