//! External provider boundaries: hosted payment invoices and durable
//! invoice documents. No business logic lives here.

pub mod xendit;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::ServiceError;

pub use xendit::XenditInvoiceClient;

/// Request to create a hosted invoice with the payment provider.
#[derive(Debug, Clone, Serialize)]
pub struct CreateInvoiceRequest {
    pub external_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub payer_email: Option<String>,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    pub expiry_secs: u64,
}

/// Provider invoice as returned from creation. `raw` keeps the provider
/// response verbatim for persistence and audit.
#[derive(Debug, Clone)]
pub struct GatewayInvoice {
    pub id: String,
    pub invoice_url: String,
    pub status: String,
    pub raw: serde_json::Value,
}

/// Thin pass-through client for the payment provider. Failures propagate
/// as errors the checkout orchestrator treats as fatal to the attempt.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<GatewayInvoice, ServiceError>;
}

/// External document service producing a durable invoice PDF URL.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_invoice_pdf(
        &self,
        external_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<String, ServiceError>;
}
