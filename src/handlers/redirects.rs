use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    #[serde(default)]
    pub external_id: String,
    /// Provider-supplied failure reason, forwarded into the deep link.
    pub reason: Option<String>,
}

// GET /payments/success
//
// Browser landing page after the hosted invoice completes. Immediately
// hands control back to the mobile app via its deep-link scheme; the
// page itself is a fallback for browsers that block the redirect.
#[utoipa::path(
    get,
    path = "/payments/success",
    params(("external_id" = String, Query, description = "Order external id")),
    responses((status = 200, description = "Deep-link page", content_type = "text/html")),
    tag = "Payments"
)]
pub async fn payment_success(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
) -> impl IntoResponse {
    deep_link_page(
        &state.config.app_scheme,
        "payment/success",
        &params.external_id,
        None,
        "Payment received",
        "Your payment is being confirmed. You can return to the app.",
    )
}

// GET /payments/failure
#[utoipa::path(
    get,
    path = "/payments/failure",
    params(
        ("external_id" = String, Query, description = "Order external id"),
        ("reason" = Option<String>, Query, description = "Provider failure reason")
    ),
    responses((status = 200, description = "Deep-link page", content_type = "text/html")),
    tag = "Payments"
)]
pub async fn payment_failure(
    State(state): State<AppState>,
    Query(params): Query<RedirectParams>,
) -> impl IntoResponse {
    deep_link_page(
        &state.config.app_scheme,
        "payment/failure",
        &params.external_id,
        params.reason.as_deref(),
        "Payment not completed",
        "The payment was not completed. You can retry from the app.",
    )
}

fn deep_link_page(
    scheme: &str,
    path: &str,
    external_id: &str,
    reason: Option<&str>,
    title: &str,
    message: &str,
) -> Html<String> {
    let mut target = format!(
        "{}://{}?external_id={}",
        scheme,
        path,
        urlencode(external_id)
    );
    if let Some(reason) = reason {
        target.push_str("&reason=");
        target.push_str(&urlencode(reason));
    }
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <meta http-equiv=\"refresh\" content=\"0;url={target}\">\n</head>\n<body>\n\
         <h1>{title}</h1>\n<p>{message}</p>\n<p><a href=\"{target}\">Open the app</a></p>\n\
         </body>\n</html>\n"
    ))
}

// Minimal percent-encoding for the query value; external ids are
// ASCII ("ORD-" plus a UUID) so only separators need escaping.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_link_points_at_the_app_scheme() {
        let Html(page) = deep_link_page(
            "storefront",
            "payment/success",
            "ORD-123",
            None,
            "Payment received",
            "ok",
        );
        assert!(page.contains("storefront://payment/success?external_id=ORD-123"));
    }

    #[test]
    fn failure_reason_is_forwarded() {
        let Html(page) = deep_link_page(
            "storefront",
            "payment/failure",
            "ORD-123",
            Some("EXPIRED"),
            "Payment not completed",
            "retry",
        );
        assert!(page
            .contains("storefront://payment/failure?external_id=ORD-123&reason=EXPIRED"));
    }

    #[test]
    fn external_id_is_escaped() {
        assert_eq!(urlencode("ORD-1"), "ORD-1");
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
    }
}
