//! Business logic, organized by pipeline stage: promotion evaluation,
//! line pricing, cart management, checkout orchestration, and webhook
//! reconciliation.

pub mod cart;
pub mod checkout;
pub mod pricing;
pub mod promotions;
pub mod reconciliation;

pub use cart::CartService;
pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService, CheckoutSettings};
pub use pricing::PricingService;
pub use promotions::PromotionService;
pub use reconciliation::{ReconcileOutcome, ReconciliationService};
