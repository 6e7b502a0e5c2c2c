//! Test harness: in-memory SQLite state, a scripted payment gateway, and
//! a frozen clock, wired through the same constructors the binary uses.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use chrono::{DateTime, Duration, Utc};
use migrations::Migrator;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::clock::FixedClock;
use storefront_api::config::{AppConfig, DocumentsConfig, PaymentConfig};
use storefront_api::entities::{
    cart_item, discount, discount_product, flash_sale, flash_sale_product, product,
    product_variant,
};
use storefront_api::errors::ServiceError;
use storefront_api::events;
use storefront_api::gateway::{CreateInvoiceRequest, GatewayInvoice, PaymentGateway};
use storefront_api::{app_router, build_services, AppServices, AppState};

/// Payment gateway double: records every request and answers from a
/// script instead of the network.
pub struct MockGateway {
    fail: AtomicBool,
    next_invoice_id: Mutex<Option<String>>,
    pub requests: Mutex<Vec<CreateInvoiceRequest>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            next_invoice_id: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Forces the next created invoice to carry this provider id.
    pub fn script_invoice_id(&self, id: &str) {
        *self.next_invoice_id.lock().unwrap() = Some(id.to_string());
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CreateInvoiceRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<GatewayInvoice, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::PaymentFailed(
                "provider returned 400 Bad Request".to_string(),
            ));
        }

        let id = self
            .next_invoice_id
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| format!("inv_{}", Uuid::new_v4().simple()));
        let invoice_url = format!("https://invoice.test/{}", id);
        Ok(GatewayInvoice {
            raw: serde_json::json!({
                "id": id,
                "external_id": request.external_id,
                "invoice_url": invoice_url,
                "status": "PENDING",
                "amount": request.amount,
                "currency": request.currency,
            }),
            id,
            invoice_url,
            status: "PENDING".to_string(),
        })
    }
}

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub gateway: Arc<MockGateway>,
    pub config: Arc<AppConfig>,
    /// The instant every promotion window is evaluated against.
    pub now: DateTime<Utc>,
    router: axum::Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = test_config();
        customize(&mut config);

        let mut options = ConnectOptions::new("sqlite::memory:".to_string());
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("connect test database");
        Migrator::up(&db, None).await.expect("run migrations");
        let db = Arc::new(db);

        let gateway = MockGateway::new();
        let now = Utc::now();
        let (event_sender, event_receiver) = events::channel(64);
        tokio::spawn(events::run_event_logger(event_receiver));

        let services = build_services(
            db.clone(),
            &config,
            gateway.clone(),
            None,
            Arc::new(FixedClock(now)),
            event_sender.clone(),
        );

        let config = Arc::new(config);
        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            services: services.clone(),
            events: event_sender,
        };

        Self {
            db,
            services,
            gateway,
            config,
            now,
            router: app_router(state),
        }
    }

    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    /// Sends one request through the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<Uuid>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.router.clone().oneshot(request).await.expect("route request")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            discount_amount: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_variant(
        &self,
        product_id: Uuid,
        name: &str,
        price: Decimal,
        stock_quantity: i32,
        is_primary: bool,
    ) -> product_variant::Model {
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            name: Set(name.to_string()),
            price: Set(price),
            stock_quantity: Set(stock_quantity),
            discount_amount: Set(None),
            is_primary: Set(is_primary),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed variant")
    }

    /// Seeds a flash sale running around `self.now` and links it to the
    /// product.
    pub async fn seed_flash_sale(
        &self,
        product_id: Uuid,
        percentage: Decimal,
        max_quantity: Option<i32>,
    ) -> flash_sale::Model {
        let sale = flash_sale::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set("Flash Sale".to_string()),
            discount_percentage: Set(percentage),
            max_discount_amount: Set(None),
            max_quantity: Set(max_quantity),
            sold_quantity: Set(0),
            starts_at: Set(self.now - Duration::hours(1)),
            ends_at: Set(self.now + Duration::hours(1)),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed flash sale");

        flash_sale_product::ActiveModel {
            flash_sale_id: Set(sale.id),
            product_id: Set(product_id),
        }
        .insert(&*self.db)
        .await
        .expect("link flash sale");

        sale
    }

    /// Seeds an open-window discount. `product_id: None` leaves the
    /// discount unrestricted (storewide).
    pub async fn seed_discount(
        &self,
        product_id: Option<Uuid>,
        discount_type: discount::DiscountType,
        value: Decimal,
        get_quantity: Option<i32>,
    ) -> discount::Model {
        let model = discount::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Promo".to_string()),
            code: Set(format!("PROMO-{}", Uuid::new_v4().simple())),
            discount_type: Set(discount_type),
            value: Set(value),
            get_quantity: Set(get_quantity),
            min_purchase_amount: Set(None),
            max_discount_amount: Set(None),
            usage_limit: Set(None),
            used_count: Set(0),
            starts_at: Set(None),
            ends_at: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed discount");

        if let Some(product_id) = product_id {
            discount_product::ActiveModel {
                discount_id: Set(model.id),
                product_id: Set(product_id),
            }
            .insert(&*self.db)
            .await
            .expect("link discount");
        }

        model
    }

    pub async fn seed_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> cart_item::Model {
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
        .await
        .expect("seed cart item")
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        currency: "IDR".to_string(),
        app_scheme: "storefront".to_string(),
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        payment: PaymentConfig {
            api_key: "xnd_test_key".to_string(),
            base_url: "https://api.xendit.test".to_string(),
            callback_token: None,
            invoice_expiry_secs: 3600,
            request_timeout_secs: 2,
            success_redirect_url: "https://shop.test/payments/success".to_string(),
            failure_redirect_url: "https://shop.test/payments/failure".to_string(),
        },
        documents: None::<DocumentsConfig>,
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
