use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::entities::{invoice, order};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::GatewayInvoice;

/// Provider statuses that mean the invoice has been paid for.
const PAID_STATUSES: [&str; 2] = ["PAID", "SETTLED"];

/// What a webhook callback did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The referenced invoice and its order were brought up to date.
    Updated {
        invoice_id: Uuid,
        order_id: Uuid,
        status: String,
    },
    /// The payload references no invoice we know. Acknowledged without
    /// mutating anything so the provider stops retrying.
    UnknownInvoice,
}

/// Applies provider payment callbacks to local invoices and orders.
/// Callbacks may arrive out of order or more than once; the paid flip is
/// monotonic, so replays and stale statuses never un-pay an order.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
    events: EventSender,
}

impl ReconciliationService {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>, events: EventSender) -> Self {
        Self { db, clock, events }
    }

    #[instrument(skip(self, payload))]
    pub async fn reconcile(&self, payload: &Value) -> Result<ReconcileOutcome, ServiceError> {
        // A payload we cannot match still gets acknowledged; answering
        // an error here would only make the provider retry it forever.
        let Some(provider_invoice_id) = payload
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            warn!("callback payload without an invoice id acknowledged");
            return Ok(ReconcileOutcome::UnknownInvoice);
        };
        let status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("PENDING")
            .to_uppercase();

        let Some(existing) = invoice::Entity::find()
            .filter(invoice::Column::ProviderInvoiceId.eq(&provider_invoice_id))
            .one(&*self.db)
            .await?
        else {
            warn!(%provider_invoice_id, "callback for unknown invoice acknowledged");
            return Ok(ReconcileOutcome::UnknownInvoice);
        };

        let invoice_id = existing.id;
        let order_id = existing.order_id;

        let txn = self.db.begin().await?;

        let mut update: invoice::ActiveModel = existing.into();
        update.status = Set(status.clone());
        update.raw = Set(payload.clone());
        update.updated_at = Set(Utc::now());
        update.update(&txn).await?;

        let mut became_paid = false;
        if PAID_STATUSES.contains(&status.as_str()) {
            let order = order::Entity::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Order {} not found", order_id))
                })?;

            if order.payment_status != order::PaymentStatus::Paid {
                let mut order_update: order::ActiveModel = order.into();
                order_update.payment_status = Set(order::PaymentStatus::Paid);
                order_update.status = Set(order::OrderStatus::Processing);
                order_update.paid_at = Set(Some(self.clock.now()));
                order_update.updated_at = Set(Utc::now());
                order_update.update(&txn).await?;
                became_paid = true;
            }
        }

        txn.commit().await?;

        self.events
            .send(Event::InvoiceUpdated {
                invoice_id,
                status: status.clone(),
            })
            .await;
        if became_paid {
            info!(%order_id, %provider_invoice_id, "order marked paid");
            self.events
                .send(Event::PaymentReceived {
                    order_id,
                    invoice_id,
                })
                .await;
        }

        Ok(ReconcileOutcome::Updated {
            invoice_id,
            order_id,
            status,
        })
    }
}

/// Records the local copy of a freshly created provider invoice. Called
/// inside the checkout orchestrator's second transaction.
pub async fn insert_invoice<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    gateway_invoice: &GatewayInvoice,
    payer_email: Option<&str>,
) -> Result<invoice::Model, ServiceError> {
    let now = Utc::now();
    let model = invoice::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider_invoice_id: Set(gateway_invoice.id.clone()),
        external_id: Set(order.external_id.clone()),
        order_id: Set(order.id),
        user_id: Set(order.user_id),
        status: Set(gateway_invoice.status.clone()),
        amount: Set(order.total),
        currency: Set(gateway_invoice
            .raw
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("IDR")
            .to_string()),
        payer_email: Set(payer_email.map(str::to_string)),
        raw: Set(gateway_invoice.raw.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    Ok(model)
}
