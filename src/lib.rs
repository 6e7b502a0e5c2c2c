pub mod clock;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, routing::post, Json, Router};
use sea_orm::DatabaseConnection;
use utoipa::OpenApi;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::gateway::{DocumentRenderer, PaymentGateway};
use crate::services::{
    CartService, CheckoutService, CheckoutSettings, PricingService, PromotionService,
    ReconciliationService,
};

/// Service graph behind the HTTP layer.
#[derive(Clone)]
pub struct AppServices {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub reconciliation: ReconciliationService,
}

/// Builds the full service graph. Tests inject a mock gateway and a
/// fixed clock through the same entry point the binary uses.
pub fn build_services(
    db: Arc<DatabaseConnection>,
    config: &AppConfig,
    gateway: Arc<dyn PaymentGateway>,
    documents: Option<Arc<dyn DocumentRenderer>>,
    clock: Arc<dyn Clock>,
    events: EventSender,
) -> AppServices {
    let promotions = PromotionService::new(db.clone(), clock.clone());
    let pricing = PricingService::new(db.clone(), promotions);

    let settings = CheckoutSettings {
        currency: config.currency.clone(),
        success_redirect_url: config.payment.success_redirect_url.clone(),
        failure_redirect_url: config.payment.failure_redirect_url.clone(),
        invoice_expiry_secs: config.payment.invoice_expiry_secs,
    };

    AppServices {
        cart: CartService::new(db.clone()),
        checkout: CheckoutService::new(
            db.clone(),
            pricing,
            gateway,
            documents,
            events.clone(),
            settings,
        ),
        reconciliation: ReconciliationService::new(db, clock, events),
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub events: EventSender,
}

/// Builds the application router. Middleware layers are attached by the
/// binary so tests exercise the bare routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/checkout", post(handlers::checkout::checkout))
        .route("/api/v1/cart", get(handlers::cart::list_items))
        .route("/api/v1/cart/items", post(handlers::cart::add_item))
        .route(
            "/api/v1/cart/items/:id",
            axum::routing::delete(handlers::cart::remove_item),
        )
        .route(
            "/api/v1/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route(
            "/payments/success",
            get(handlers::redirects::payment_success),
        )
        .route(
            "/payments/failure",
            get(handlers::redirects::payment_failure),
        )
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}
