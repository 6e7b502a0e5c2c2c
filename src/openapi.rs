use utoipa::OpenApi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::checkout::checkout,
        handlers::cart::list_items,
        handlers::cart::add_item,
        handlers::cart::remove_item,
        handlers::payment_webhooks::payment_webhook,
        handlers::redirects::payment_success,
        handlers::redirects::payment_failure,
    ),
    components(schemas(
        handlers::checkout::CheckoutDto,
        handlers::checkout::CheckoutItemDto,
        handlers::cart::AddCartItemDto,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Checkout", description = "Order creation and payment invoice issuance"),
        (name = "Cart", description = "Stored cart management"),
        (name = "Payments", description = "Provider callbacks and browser redirects")
    ),
    info(
        title = "Storefront API",
        description = "Checkout and promotion pricing pipeline"
    )
)]
pub struct ApiDoc;
