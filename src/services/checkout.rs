use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    cart_item, order, order_product,
    order_product::PromotionSource,
    product_variant,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{CreateInvoiceRequest, DocumentRenderer, PaymentGateway};
use crate::services::pricing::{LineRequest, PricedLine, PricingService};
use crate::services::promotions::{
    release_discount_usage, release_flash_sale_units, reserve_discount_usage,
    reserve_flash_sale_units,
};
use crate::services::reconciliation::insert_invoice;

/// Checkout request as the orchestrator consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_method: String,
    pub payment_method: String,
    pub payer_email: Option<String>,
    /// Explicit line items; when absent, the caller's stored cart is used.
    pub items: Option<Vec<LineRequest>>,
}

/// Everything a successful checkout hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: order::Model,
    pub items: Vec<order_product::Model>,
    /// Raw provider invoice payload, verbatim.
    pub invoice: serde_json::Value,
    pub redirect_url: String,
    pub invoice_pdf_url: Option<String>,
}

/// Redirect URLs and invoice parameters handed to the payment provider.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    pub invoice_expiry_secs: u64,
}

/// Orchestrates a checkout attempt as a two-phase flow: a first
/// transaction persists the priced order and consumes promotion/stock
/// capacity, the provider call happens outside any transaction, and a
/// second transaction attaches the invoice and clears the cart. A
/// provider failure triggers a compensation transaction instead of
/// holding a database transaction open across the network call.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    pricing: PricingService,
    gateway: Arc<dyn PaymentGateway>,
    documents: Option<Arc<dyn DocumentRenderer>>,
    events: EventSender,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        pricing: PricingService,
        gateway: Arc<dyn PaymentGateway>,
        documents: Option<Arc<dyn DocumentRenderer>>,
        events: EventSender,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            db,
            pricing,
            gateway,
            documents,
            events,
            settings,
        }
    }

    #[instrument(skip(self, request), fields(user_id = ?user_id))]
    pub async fn checkout(
        &self,
        user_id: Option<Uuid>,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        // Fail fast before any side effect.
        if request.shipping_method.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Shipping method is required".to_string(),
            ));
        }
        if request.payment_method.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Payment method is required".to_string(),
            ));
        }

        let (line_requests, cart_rows) = self.resolve_lines(user_id, &request).await?;
        let priced = self.pricing.price_lines(&line_requests).await?;

        let subtotal: Decimal = priced.iter().map(PricedLine::gross).sum();
        let total: Decimal = priced.iter().map(PricedLine::line_total).sum();
        // Promotion money only; a client-price deviation affects the
        // total but is not a discount.
        let discount: Decimal = priced.iter().map(PricedLine::promotion_total).sum();

        let order_id = Uuid::new_v4();
        let external_id = format!("ORD-{}", order_id.simple());

        // Phase 1: persist the order and consume promotion/stock capacity
        // atomically. Any guard failure rolls the whole phase back.
        let txn = self.db.begin().await?;
        let (order, items) = self
            .persist_order(
                &txn, order_id, &external_id, user_id, &request, &priced, subtotal, discount,
                total,
            )
            .await?;
        txn.commit().await?;

        // External call, outside any transaction.
        let invoice_request = CreateInvoiceRequest {
            external_id: external_id.clone(),
            amount: total,
            currency: self.settings.currency.clone(),
            description: format!("Order {}", external_id),
            payer_email: request.payer_email.clone(),
            success_redirect_url: redirect_with_external_id(
                &self.settings.success_redirect_url,
                &external_id,
            ),
            failure_redirect_url: redirect_with_external_id(
                &self.settings.failure_redirect_url,
                &external_id,
            ),
            expiry_secs: self.settings.invoice_expiry_secs,
        };

        let gateway_invoice = match self.gateway.create_invoice(&invoice_request).await {
            Ok(invoice) => invoice,
            Err(e) => {
                self.compensate(&order, &priced).await;
                self.events
                    .send(Event::CheckoutFailed {
                        external_id: external_id.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        // Best effort: the durable document reference is not worth
        // failing a paid-for checkout over.
        let invoice_pdf_url = match &self.documents {
            Some(renderer) => match renderer
                .render_invoice_pdf(&external_id, total, &self.settings.currency)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("invoice document rendering failed: {}", e);
                    None
                }
            },
            None => None,
        };

        // Phase 2: attach the invoice and clear the source cart. A
        // failure here is compensated like a gateway failure; otherwise
        // the order would stay pending with a provider invoice the
        // reconciler can never match.
        let order = match self
            .record_invoice(&order, &gateway_invoice, invoice_pdf_url.clone(), &cart_rows, &request)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                error!(
                    order_id = %order.id,
                    provider_invoice_id = %gateway_invoice.id,
                    "failed to record provider invoice, cancelling order: {}", e
                );
                self.compensate(&order, &priced).await;
                self.events
                    .send(Event::CheckoutFailed {
                        external_id: external_id.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        self.events.send(Event::OrderCreated(order.id)).await;
        self.events
            .send(Event::CheckoutCompleted {
                order_id: order.id,
                external_id: external_id.clone(),
            })
            .await;
        if let Some(user_id) = user_id {
            if request.items.is_none() {
                self.events.send(Event::CartCleared { user_id }).await;
            }
        }

        info!(order_id = %order.id, %external_id, %total, "checkout completed");

        Ok(CheckoutOutcome {
            redirect_url: gateway_invoice.invoice_url.clone(),
            invoice: gateway_invoice.raw,
            order,
            items,
            invoice_pdf_url,
        })
    }

    /// Attaches the provider invoice to the order, records the local
    /// invoice copy, and deletes the source cart rows, in one
    /// transaction. Returns the updated order.
    async fn record_invoice(
        &self,
        order: &order::Model,
        gateway_invoice: &crate::gateway::GatewayInvoice,
        invoice_pdf_url: Option<String>,
        cart_rows: &[Uuid],
        request: &CheckoutRequest,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let mut order_update: order::ActiveModel = order.clone().into();
        order_update.xendit_invoice_id = Set(Some(gateway_invoice.id.clone()));
        order_update.invoice_pdf_url = Set(invoice_pdf_url);
        order_update.updated_at = Set(Utc::now());
        let order = order_update.update(&txn).await?;

        insert_invoice(&txn, &order, gateway_invoice, request.payer_email.as_deref()).await?;

        if !cart_rows.is_empty() {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::Id.is_in(cart_rows.to_vec()))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(order)
    }

    /// Resolves line requests from the explicit list or the stored cart.
    /// Returns the cart row ids to delete on success (empty for explicit
    /// lists, which leave the cart untouched).
    async fn resolve_lines(
        &self,
        user_id: Option<Uuid>,
        request: &CheckoutRequest,
    ) -> Result<(Vec<LineRequest>, Vec<Uuid>), ServiceError> {
        if let Some(items) = &request.items {
            if items.is_empty() {
                return Err(ServiceError::ValidationError(
                    "Items must not be empty".to_string(),
                ));
            }
            return Ok((items.clone(), Vec::new()));
        }

        let user_id = user_id.ok_or_else(|| {
            ServiceError::InvalidOperation("Cart is empty".to_string())
        })?;

        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?;

        if rows.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let ids = rows.iter().map(|r| r.id).collect();
        let lines = rows
            .into_iter()
            .map(|r| LineRequest {
                product_id: r.product_id,
                variant_id: r.variant_id,
                quantity: r.quantity,
                price: None,
            })
            .collect();

        Ok((lines, ids))
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_order(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
        external_id: &str,
        user_id: Option<Uuid>,
        request: &CheckoutRequest,
        priced: &[PricedLine],
        subtotal: Decimal,
        discount: Decimal,
        total: Decimal,
    ) -> Result<(order::Model, Vec<order_product::Model>), ServiceError> {
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            external_id: Set(external_id.to_string()),
            subtotal: Set(subtotal),
            tax: Set(Decimal::ZERO),
            shipping_fee: Set(Decimal::ZERO),
            discount: Set(discount),
            total: Set(total),
            status: Set(order::OrderStatus::Pending),
            payment_status: Set(order::PaymentStatus::Pending),
            payment_method: Set(request.payment_method.clone()),
            shipping_method: Set(request.shipping_method.clone()),
            xendit_invoice_id: Set(None),
            invoice_pdf_url: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(priced.len());
        for line in priced {
            let item = order_product::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                list_price: Set(line.list_price),
                discount_amount: Set(line.discount_amount),
                promotion_source: Set(line.promotion.map(|p| p.source)),
                promotion_id: Set(line.promotion.map(|p| p.id)),
                created_at: Set(now),
            }
            .insert(txn)
            .await?;
            items.push(item);

            if let Some(promotion) = &line.promotion {
                match promotion.source {
                    PromotionSource::FlashSale => {
                        if !reserve_flash_sale_units(txn, promotion.id, line.quantity).await? {
                            return Err(ServiceError::Conflict(format!(
                                "Flash sale {} is sold out",
                                promotion.id
                            )));
                        }
                    }
                    PromotionSource::Discount => {
                        if !reserve_discount_usage(txn, promotion.id).await? {
                            return Err(ServiceError::Conflict(format!(
                                "Discount {} usage limit reached",
                                promotion.id
                            )));
                        }
                    }
                }
            }

            if let Some(variant_id) = line.variant_id {
                if !reserve_stock(txn, variant_id, line.quantity).await? {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Variant {} has fewer than {} units left",
                        variant_id, line.quantity
                    )));
                }
            }
        }

        Ok((order, items))
    }

    /// Compensation after a provider or invoice-recording failure:
    /// cancel the order and hand back every reserved counter. The cart
    /// was never touched. A failure here is logged, not surfaced — the
    /// caller already gets the original error.
    async fn compensate(&self, order: &order::Model, priced: &[PricedLine]) {
        let result: Result<(), ServiceError> = async {
            let txn = self.db.begin().await?;

            let mut update: order::ActiveModel = order.clone().into();
            update.status = Set(order::OrderStatus::Cancelled);
            update.payment_status = Set(order::PaymentStatus::Failed);
            update.updated_at = Set(Utc::now());
            update.update(&txn).await?;

            for line in priced {
                if let Some(promotion) = &line.promotion {
                    match promotion.source {
                        PromotionSource::FlashSale => {
                            release_flash_sale_units(&txn, promotion.id, line.quantity).await?;
                        }
                        PromotionSource::Discount => {
                            release_discount_usage(&txn, promotion.id).await?;
                        }
                    }
                }
                if let Some(variant_id) = line.variant_id {
                    release_stock(&txn, variant_id, line.quantity).await?;
                }
            }

            txn.commit().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(order_id = %order.id, "checkout compensation failed: {}", e);
        }
    }
}

/// Decrements variant stock with a conditional update so two checkouts
/// cannot both take the last unit. Returns false when stock is short.
pub async fn reserve_stock<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> Result<bool, sea_orm::DbErr> {
    let result = product_variant::Entity::update_many()
        .col_expr(
            product_variant::Column::StockQuantity,
            Expr::col(product_variant::Column::StockQuantity).sub(quantity),
        )
        .filter(product_variant::Column::Id.eq(variant_id))
        .filter(product_variant::Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Restores previously reserved stock (compensation path).
pub async fn release_stock<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> Result<(), sea_orm::DbErr> {
    product_variant::Entity::update_many()
        .col_expr(
            product_variant::Column::StockQuantity,
            Expr::col(product_variant::Column::StockQuantity).add(quantity),
        )
        .filter(product_variant::Column::Id.eq(variant_id))
        .exec(conn)
        .await?;
    Ok(())
}

fn redirect_with_external_id(base: &str, external_id: &str) -> String {
    if base.contains('?') {
        format!("{}&external_id={}", base, external_id)
    } else {
        format!("{}?external_id={}", base, external_id)
    }
}
