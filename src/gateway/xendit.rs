use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, error};

use crate::config::{DocumentsConfig, PaymentConfig};
use crate::errors::ServiceError;

use super::{CreateInvoiceRequest, DocumentRenderer, GatewayInvoice, PaymentGateway};

/// Xendit hosted-invoice client. The secret key is sent as the
/// basic-auth username with an empty password, per provider convention.
#[derive(Clone)]
pub struct XenditInvoiceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl XenditInvoiceClient {
    pub fn new(config: &PaymentConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for XenditInvoiceClient {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<GatewayInvoice, ServiceError> {
        let body = json!({
            "external_id": request.external_id,
            "amount": request.amount,
            "currency": request.currency,
            "description": request.description,
            "payer_email": request.payer_email,
            "success_redirect_url": request.success_redirect_url,
            "failure_redirect_url": request.failure_redirect_url,
            "invoice_duration": request.expiry_secs,
        });

        let response = self
            .http
            .post(format!("{}/v2/invoices", self.base_url))
            .basic_auth(&self.api_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("payment provider request failed: {}", e);
                if e.is_timeout() {
                    ServiceError::ExternalServiceError("payment provider timed out".to_string())
                } else {
                    ServiceError::ExternalServiceError(format!("payment provider: {}", e))
                }
            })?;

        let status = response.status();
        let raw: serde_json::Value = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid provider response: {}", e))
        })?;

        if !status.is_success() {
            error!(%status, %raw, "payment provider rejected invoice creation");
            return Err(ServiceError::PaymentFailed(format!(
                "provider returned {}",
                status
            )));
        }

        let id = raw
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ServiceError::ExternalServiceError("provider response missing id".to_string())
            })?
            .to_string();
        let invoice_url = raw
            .get("invoice_url")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let invoice_status = raw
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("PENDING")
            .to_string();

        debug!(invoice_id = %id, "created hosted invoice");

        Ok(GatewayInvoice {
            id,
            invoice_url,
            status: invoice_status,
            raw,
        })
    }
}

/// HTTP client for the external invoice-document service.
#[derive(Clone)]
pub struct InvoiceDocumentClient {
    http: reqwest::Client,
    base_url: String,
}

impl InvoiceDocumentClient {
    pub fn new(config: &DocumentsConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DocumentRenderer for InvoiceDocumentClient {
    async fn render_invoice_pdf(
        &self,
        external_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<String, ServiceError> {
        let response = self
            .http
            .post(format!("{}/invoices", self.base_url))
            .json(&json!({
                "external_id": external_id,
                "amount": amount,
                "currency": currency,
            }))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("document service: {}", e)))?
            .error_for_status()
            .map_err(|e| ServiceError::ExternalServiceError(format!("document service: {}", e)))?;

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid document response: {}", e))
        })?;

        body.get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::ExternalServiceError("document response missing url".to_string())
            })
    }
}
