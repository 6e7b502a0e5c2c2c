//! End-to-end checkout flows against in-memory SQLite and a scripted
//! payment gateway: happy path, promotion attribution, cart handling,
//! and rollback/compensation behavior.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;

use storefront_api::entities::{
    cart_item, discount, flash_sale, invoice, order, order_product,
    order_product::PromotionSource, product_variant,
};
use storefront_api::errors::ServiceError;
use storefront_api::services::pricing::LineRequest;
use storefront_api::services::CheckoutRequest;

fn explicit_items(items: Vec<LineRequest>) -> CheckoutRequest {
    CheckoutRequest {
        shipping_method: "standard".to_string(),
        payment_method: "xendit_invoice".to_string(),
        payer_email: Some("buyer@example.com".to_string()),
        items: Some(items),
    }
}

fn from_cart() -> CheckoutRequest {
    CheckoutRequest {
        shipping_method: "standard".to_string(),
        payment_method: "xendit_invoice".to_string(),
        payer_email: None,
        items: None,
    }
}

#[tokio::test]
async fn flash_sale_checkout_end_to_end() {
    let app = TestApp::new().await;
    let product = app.seed_product("Sneakers", dec!(50000)).await;
    let sale = app.seed_flash_sale(product.id, dec!(20), Some(100)).await;

    let outcome = app
        .services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: None,
                quantity: 2,
                price: None,
            }]),
        )
        .await
        .expect("checkout succeeds");

    // 20% off 50000, folded into the charged unit price.
    assert_eq!(outcome.order.total, dec!(80000));
    assert_eq!(outcome.order.subtotal, dec!(100000));
    assert_eq!(outcome.order.discount, dec!(20000));
    assert_eq!(outcome.order.status, order::OrderStatus::Pending);
    assert_eq!(outcome.order.payment_status, order::PaymentStatus::Pending);
    assert!(outcome.order.external_id.starts_with("ORD-"));

    assert_eq!(outcome.items.len(), 1);
    let line = &outcome.items[0];
    assert_eq!(line.unit_price, dec!(40000));
    assert_eq!(line.list_price, dec!(50000));
    assert_eq!(line.discount_amount, dec!(0));
    assert_eq!(line.promotion_source, Some(PromotionSource::FlashSale));
    assert_eq!(line.promotion_id, Some(sale.id));

    // The flash sale's global cap was consumed for both units.
    let sale = flash_sale::Entity::find_by_id(sale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.sold_quantity, 2);

    // Local invoice copy matches the provider response.
    let invoices = invoice::Entity::find().all(&*app.db).await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].order_id, outcome.order.id);
    assert_eq!(invoices[0].amount, dec!(80000));
    assert_eq!(invoices[0].status, "PENDING");
    assert_eq!(
        Some(invoices[0].provider_invoice_id.as_str()),
        outcome.order.xendit_invoice_id.as_deref()
    );

    // The provider was asked for exactly the order total.
    let sent = app.gateway.last_request().unwrap();
    assert_eq!(sent.amount, dec!(80000));
    assert_eq!(sent.external_id, outcome.order.external_id);
    assert!(outcome.redirect_url.starts_with("https://invoice.test/"));
}

#[tokio::test]
async fn checkout_from_cart_clears_the_cart() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Mug", dec!(30000)).await;
    app.seed_cart_item(user_id, product.id, None, 3).await;

    let outcome = app
        .services
        .checkout
        .checkout(Some(user_id), from_cart())
        .await
        .expect("checkout succeeds");

    assert_eq!(outcome.order.total, dec!(90000));
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].quantity, 3);

    let remaining = cart_item::Entity::find().all(&*app.db).await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn empty_cart_is_rejected_before_any_side_effect() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();

    let err = app
        .services
        .checkout
        .checkout(Some(user_id), from_cart())
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InvalidOperation(_));
    assert!(order::Entity::find().all(&*app.db).await.unwrap().is_empty());
    assert_eq!(app.gateway.request_count(), 0);
}

#[tokio::test]
async fn gateway_failure_cancels_the_order_and_restores_counters() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Watch", dec!(200000)).await;
    let sale = app.seed_flash_sale(product.id, dec!(10), Some(5)).await;
    app.seed_cart_item(user_id, product.id, None, 1).await;

    app.gateway.fail_next();
    let err = app
        .services
        .checkout
        .checkout(Some(user_id), from_cart())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PaymentFailed(_));

    // The order survives as an audit record, cancelled and unpaid.
    let orders = order::Entity::find().all(&*app.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, order::OrderStatus::Cancelled);
    assert_eq!(orders[0].payment_status, order::PaymentStatus::Failed);

    // Promotion capacity was handed back.
    let sale = flash_sale::Entity::find_by_id(sale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.sold_quantity, 0);

    // No invoice was recorded and the cart is intact for a retry.
    assert!(invoice::Entity::find().all(&*app.db).await.unwrap().is_empty());
    let remaining = cart_item::Entity::find().all(&*app.db).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn invoice_recording_failure_cancels_the_order_and_restores_counters() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4();
    let product = app.seed_product("Speaker", dec!(100000)).await;
    let sale = app.seed_flash_sale(product.id, dec!(10), Some(10)).await;
    app.seed_cart_item(user_id, product.id, None, 1).await;

    // First checkout claims the provider invoice id "inv_dup".
    app.gateway.script_invoice_id("inv_dup");
    app.services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: None,
                quantity: 1,
                price: None,
            }]),
        )
        .await
        .expect("first checkout succeeds");

    // The second attempt gets the same id back from the provider, so
    // recording its invoice collides with the unique provider id. The
    // provider call itself succeeded; only the local write fails.
    app.gateway.script_invoice_id("inv_dup");
    let err = app
        .services
        .checkout
        .checkout(Some(user_id), from_cart())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DatabaseError(_));

    // The failed order is cancelled, not left pending with a live
    // provider invoice and no local record of it.
    let orders = order::Entity::find().all(&*app.db).await.unwrap();
    assert_eq!(orders.len(), 2);
    let failed = orders
        .iter()
        .find(|o| o.user_id == Some(user_id))
        .expect("second order exists");
    assert_eq!(failed.status, order::OrderStatus::Cancelled);
    assert_eq!(failed.payment_status, order::PaymentStatus::Failed);

    // Only the first checkout's unit is still consumed.
    let sale = flash_sale::Entity::find_by_id(sale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.sold_quantity, 1);

    // The cart was never cleared and only the first invoice exists.
    let remaining = cart_item::Entity::find().all(&*app.db).await.unwrap();
    assert_eq!(remaining.len(), 1);
    let invoices = invoice::Entity::find().all(&*app.db).await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].provider_invoice_id, "inv_dup");
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_attempt() {
    let app = TestApp::new().await;
    let product = app.seed_product("Limited Tee", dec!(75000)).await;
    let variant = app
        .seed_variant(product.id, "Size M", dec!(75000), 1, true)
        .await;

    let err = app
        .services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 2,
                price: None,
            }]),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Phase one rolled back: no rows anywhere, provider never called.
    assert!(order::Entity::find().all(&*app.db).await.unwrap().is_empty());
    assert!(order_product::Entity::find()
        .all(&*app.db)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(app.gateway.request_count(), 0);

    let variant = product_variant::Entity::find_by_id(variant.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variant.stock_quantity, 1);
}

#[tokio::test]
async fn flash_sale_cap_rejects_a_purchase_that_would_exceed_it() {
    let app = TestApp::new().await;
    let product = app.seed_product("Console", dec!(500000)).await;
    let sale = app.seed_flash_sale(product.id, dec!(30), Some(1)).await;

    let err = app
        .services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: None,
                quantity: 2,
                price: None,
            }]),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::Conflict(_));
    assert!(order::Entity::find().all(&*app.db).await.unwrap().is_empty());
    assert_eq!(app.gateway.request_count(), 0);

    let sale = flash_sale::Entity::find_by_id(sale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sale.sold_quantity, 0);
}

#[tokio::test]
async fn stock_is_reserved_on_success() {
    let app = TestApp::new().await;
    let product = app.seed_product("Tee", dec!(60000)).await;
    let variant = app
        .seed_variant(product.id, "Size L", dec!(60000), 10, true)
        .await;

    app.services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: Some(variant.id),
                quantity: 4,
                price: None,
            }]),
        )
        .await
        .expect("checkout succeeds");

    let variant = product_variant::Entity::find_by_id(variant.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variant.stock_quantity, 6);
}

#[tokio::test]
async fn only_the_best_promotion_applies() {
    let app = TestApp::new().await;
    let product = app.seed_product("Headphones", dec!(100000)).await;
    app.seed_flash_sale(product.id, dec!(10), None).await;
    let better = app
        .seed_discount(
            Some(product.id),
            discount::DiscountType::Percentage,
            dec!(25),
            None,
        )
        .await;

    let outcome = app
        .services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: None,
                quantity: 1,
                price: None,
            }]),
        )
        .await
        .expect("checkout succeeds");

    // No stacking: the 25% discount wins outright over the 10% sale.
    assert_eq!(outcome.order.total, dec!(75000));
    assert_eq!(
        outcome.items[0].promotion_source,
        Some(PromotionSource::Discount)
    );
    assert_eq!(outcome.items[0].promotion_id, Some(better.id));

    let better = discount::Entity::find_by_id(better.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(better.used_count, 1);
}

#[tokio::test]
async fn fixed_amount_discount_is_recorded_at_line_level() {
    let app = TestApp::new().await;
    let product = app.seed_product("Socks", dec!(20000)).await;
    // Unrestricted discount: applies storewide.
    app.seed_discount(None, discount::DiscountType::FixedAmount, dec!(10000), None)
        .await;

    let outcome = app
        .services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: None,
                quantity: 3,
                price: None,
            }]),
        )
        .await
        .expect("checkout succeeds");

    let line = &outcome.items[0];
    assert_eq!(line.unit_price, dec!(20000));
    assert_eq!(line.discount_amount, dec!(10000));
    assert_eq!(outcome.order.total, dec!(50000));
}

#[tokio::test]
async fn client_price_is_charged_as_sent_but_promotions_use_server_price() {
    let app = TestApp::new().await;
    let product = app.seed_product("Keyboard", dec!(50000)).await;
    app.seed_flash_sale(product.id, dec!(20), None).await;

    let outcome = app
        .services
        .checkout
        .checkout(
            None,
            explicit_items(vec![LineRequest {
                product_id: product.id,
                variant_id: None,
                quantity: 1,
                // Stale client price, deviating beyond the audit tolerance.
                price: Some(dec!(45000)),
            }]),
        )
        .await
        .expect("checkout proceeds despite the deviation");

    // Discount is 20% of the server price (10000), subtracted from the
    // client-sent base.
    let line = &outcome.items[0];
    assert_eq!(line.list_price, dec!(50000));
    assert_eq!(line.unit_price, dec!(35000));
    assert_eq!(outcome.order.total, dec!(35000));

    // The order records only promotion money as discount; the client's
    // 5000 deviation shows up in the total, not in the discount column.
    assert_eq!(outcome.order.subtotal, dec!(50000));
    assert_eq!(outcome.order.discount, dec!(10000));
}

#[tokio::test]
async fn checkout_endpoint_returns_the_invoice_redirect() {
    let app = TestApp::new().await;
    let product = app.seed_product("Poster", dec!(25000)).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            None,
            Some(json!({
                "shipping_method": "standard",
                "payment_method": "xendit_invoice",
                "items": [{ "product_id": product.id, "quantity": 2 }]
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert!(body["redirect_url"]
        .as_str()
        .unwrap()
        .starts_with("https://invoice.test/"));
    assert_eq!(body["order"]["total"], json!("50000"));
}

#[tokio::test]
async fn checkout_endpoint_rejects_an_empty_item_list() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            None,
            Some(json!({
                "shipping_method": "standard",
                "payment_method": "xendit_invoice",
                "items": []
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
