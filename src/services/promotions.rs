use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
};
use tracing::instrument;
use uuid::Uuid;

use crate::clock::Clock;
use crate::entities::{
    discount, discount_product, flash_sale, flash_sale_product,
    order_product::PromotionSource,
};
use crate::errors::ServiceError;

/// A promotion competing for a line item. Flash sales and standing
/// discounts compete on equal footing.
#[derive(Debug, Clone)]
pub enum PromotionCandidate {
    FlashSale(flash_sale::Model),
    Discount(discount::Model),
}

impl PromotionCandidate {
    pub fn id(&self) -> Uuid {
        match self {
            Self::FlashSale(m) => m.id,
            Self::Discount(m) => m.id,
        }
    }

    pub fn source(&self) -> PromotionSource {
        match self {
            Self::FlashSale(_) => PromotionSource::FlashSale,
            Self::Discount(_) => PromotionSource::Discount,
        }
    }

    /// Whether the promotion is currently applicable: active, inside its
    /// time window, and not exhausted (usage limit / global unit cap).
    pub fn is_applicable(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::FlashSale(m) => {
                m.is_active
                    && m.starts_at <= now
                    && m.ends_at >= now
                    && m.max_quantity.map_or(true, |cap| m.sold_quantity < cap)
            }
            Self::Discount(m) => {
                m.is_active
                    && m.starts_at.map_or(true, |s| s <= now)
                    && m.ends_at.map_or(true, |e| e >= now)
                    && m.usage_limit.map_or(true, |limit| m.used_count < limit)
            }
        }
    }
}

/// Discount produced by evaluating one promotion against one line.
///
/// `per_unit` is folded into the charged unit price (percentage
/// promotions, cap applied per unit before multiplying by quantity);
/// `line` stays a line-level amount (fixed-amount and buy-x-get-y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineDiscount {
    pub per_unit: Decimal,
    pub line: Decimal,
}

impl LineDiscount {
    pub fn total(&self, quantity: i32) -> Decimal {
        self.per_unit * Decimal::from(quantity) + self.line
    }

    pub fn is_zero(&self) -> bool {
        self.per_unit.is_zero() && self.line.is_zero()
    }
}

/// Computes the discount one promotion offers on a line of `quantity`
/// units at `unit_price`. Applicability is the caller's concern.
pub fn evaluate(candidate: &PromotionCandidate, unit_price: Decimal, quantity: i32) -> LineDiscount {
    if quantity <= 0 || unit_price <= Decimal::ZERO {
        return LineDiscount::default();
    }

    match candidate {
        PromotionCandidate::FlashSale(sale) => {
            let mut per_unit = unit_price * sale.discount_percentage / Decimal::from(100);
            if let Some(cap) = sale.max_discount_amount {
                per_unit = per_unit.min(cap);
            }
            LineDiscount {
                per_unit: per_unit.min(unit_price),
                line: Decimal::ZERO,
            }
        }
        PromotionCandidate::Discount(d) => {
            if let Some(min) = d.min_purchase_amount {
                if unit_price * Decimal::from(quantity) < min {
                    return LineDiscount::default();
                }
            }

            match d.discount_type {
                discount::DiscountType::Percentage => {
                    let mut per_unit = unit_price * d.value / Decimal::from(100);
                    if let Some(cap) = d.max_discount_amount {
                        per_unit = per_unit.min(cap);
                    }
                    LineDiscount {
                        per_unit: per_unit.min(unit_price),
                        line: Decimal::ZERO,
                    }
                }
                discount::DiscountType::FixedAmount => {
                    // Independent of quantity, never discounts below zero.
                    let mut line = d.value.min(unit_price);
                    if let Some(cap) = d.max_discount_amount {
                        line = line.min(cap);
                    }
                    LineDiscount {
                        per_unit: Decimal::ZERO,
                        line: line.max(Decimal::ZERO),
                    }
                }
                discount::DiscountType::BuyXGetY => {
                    let buy = d.value.to_i32().unwrap_or(0);
                    let get = d.get_quantity.unwrap_or(0);
                    if buy <= 0 || get <= 0 {
                        return LineDiscount::default();
                    }
                    let bundles = quantity / (buy + get);
                    let mut line = unit_price * Decimal::from(bundles) * Decimal::from(get);
                    if let Some(cap) = d.max_discount_amount {
                        line = line.min(cap);
                    }
                    LineDiscount {
                        per_unit: Decimal::ZERO,
                        line,
                    }
                }
            }
        }
    }
}

/// Picks the single promotion with the greatest absolute discount.
///
/// Candidates must arrive deterministically ordered (flash sales before
/// standing discounts, each group ascending by id); ties keep the first
/// seen, and only a strict improvement replaces the selection. No
/// stacking: exactly one promotion (or none) is attributed.
pub fn select_best<'a>(
    candidates: &'a [PromotionCandidate],
    unit_price: Decimal,
    quantity: i32,
) -> Option<(LineDiscount, &'a PromotionCandidate)> {
    let mut best: Option<(LineDiscount, &PromotionCandidate)> = None;

    for candidate in candidates {
        let discount = evaluate(candidate, unit_price, quantity);
        if discount.is_zero() {
            continue;
        }
        let improves = match &best {
            Some((current, _)) => discount.total(quantity) > current.total(quantity),
            None => true,
        };
        if improves {
            best = Some((discount, candidate));
        }
    }

    best
}

/// Loads the promotions competing for a product, in selection order.
#[derive(Clone)]
pub struct PromotionService {
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl PromotionService {
    pub fn new(db: Arc<DatabaseConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Gathers the currently-applicable flash sales and discounts for a
    /// product: those associated directly, plus discounts with no product
    /// associations at all (which apply storewide). The result is ordered
    /// flash sales first, then discounts, each ascending by id.
    #[instrument(skip(self))]
    pub async fn candidates_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<PromotionCandidate>, ServiceError> {
        let now = self.clock.now();

        let sale_ids: Vec<Uuid> = flash_sale_product::Entity::find()
            .filter(flash_sale_product::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|link| link.flash_sale_id)
            .collect();

        let mut sales: Vec<flash_sale::Model> = if sale_ids.is_empty() {
            Vec::new()
        } else {
            flash_sale::Entity::find()
                .filter(flash_sale::Column::Id.is_in(sale_ids))
                .filter(flash_sale::Column::IsActive.eq(true))
                .all(&*self.db)
                .await?
        };
        sales.sort_by_key(|s| s.id);

        let linked_ids: Vec<Uuid> = discount_product::Entity::find()
            .filter(discount_product::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|link| link.discount_id)
            .collect();

        let unrestricted = Query::select()
            .column(discount_product::Column::DiscountId)
            .from(discount_product::Entity)
            .to_owned();

        let mut discounts: Vec<discount::Model> = discount::Entity::find()
            .filter(discount::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(discount::Column::Id.is_in(linked_ids))
                    .add(discount::Column::Id.not_in_subquery(unrestricted)),
            )
            .all(&*self.db)
            .await?;
        discounts.sort_by_key(|d| d.id);

        let candidates = sales
            .into_iter()
            .map(PromotionCandidate::FlashSale)
            .chain(discounts.into_iter().map(PromotionCandidate::Discount))
            .filter(|c| c.is_applicable(now))
            .collect();

        Ok(candidates)
    }
}

/// Consumes `quantity` units of a flash sale's global cap with a single
/// conditional update. Returns false when the cap would be exceeded.
pub async fn reserve_flash_sale_units<C: ConnectionTrait>(
    conn: &C,
    flash_sale_id: Uuid,
    quantity: i32,
) -> Result<bool, DbErr> {
    let result = flash_sale::Entity::update_many()
        .col_expr(
            flash_sale::Column::SoldQuantity,
            Expr::col(flash_sale::Column::SoldQuantity).add(quantity),
        )
        .filter(flash_sale::Column::Id.eq(flash_sale_id))
        .filter(
            Condition::any()
                .add(flash_sale::Column::MaxQuantity.is_null())
                .add(
                    Expr::expr(Expr::col(flash_sale::Column::SoldQuantity).add(quantity))
                        .lte(Expr::col(flash_sale::Column::MaxQuantity)),
                ),
        )
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Returns previously reserved flash sale units (compensation path).
pub async fn release_flash_sale_units<C: ConnectionTrait>(
    conn: &C,
    flash_sale_id: Uuid,
    quantity: i32,
) -> Result<(), DbErr> {
    flash_sale::Entity::update_many()
        .col_expr(
            flash_sale::Column::SoldQuantity,
            Expr::col(flash_sale::Column::SoldQuantity).sub(quantity),
        )
        .filter(flash_sale::Column::Id.eq(flash_sale_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Consumes one redemption of a usage-limited discount. Returns false
/// when the limit is already reached.
pub async fn reserve_discount_usage<C: ConnectionTrait>(
    conn: &C,
    discount_id: Uuid,
) -> Result<bool, DbErr> {
    let result = discount::Entity::update_many()
        .col_expr(
            discount::Column::UsedCount,
            Expr::col(discount::Column::UsedCount).add(1),
        )
        .filter(discount::Column::Id.eq(discount_id))
        .filter(
            Condition::any()
                .add(discount::Column::UsageLimit.is_null())
                .add(
                    Expr::expr(Expr::col(discount::Column::UsedCount))
                        .lt(Expr::col(discount::Column::UsageLimit)),
                ),
        )
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Returns a previously consumed discount redemption (compensation path).
pub async fn release_discount_usage<C: ConnectionTrait>(
    conn: &C,
    discount_id: Uuid,
) -> Result<(), DbErr> {
    discount::Entity::update_many()
        .col_expr(
            discount::Column::UsedCount,
            Expr::col(discount::Column::UsedCount).sub(1),
        )
        .filter(discount::Column::Id.eq(discount_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn flash(pct: Decimal, cap: Option<Decimal>) -> PromotionCandidate {
        PromotionCandidate::FlashSale(flash_sale::Model {
            id: Uuid::new_v4(),
            title: "Midnight Sale".to_string(),
            discount_percentage: pct,
            max_discount_amount: cap,
            max_quantity: None,
            sold_quantity: 0,
            starts_at: Utc::now() - Duration::hours(1),
            ends_at: Utc::now() + Duration::hours(1),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn standing(
        discount_type: discount::DiscountType,
        value: Decimal,
        get_quantity: Option<i32>,
    ) -> PromotionCandidate {
        PromotionCandidate::Discount(discount::Model {
            id: Uuid::new_v4(),
            name: "Promo".to_string(),
            code: format!("PROMO-{}", Uuid::new_v4().simple()),
            discount_type,
            value,
            get_quantity,
            min_purchase_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            ends_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn percentage_discount_is_capped_per_unit() {
        let candidate = flash(dec!(50), Some(dec!(30000)));
        let d = evaluate(&candidate, dec!(100000), 1);
        assert_eq!(d.per_unit, dec!(30000));
        assert_eq!(d.total(1), dec!(30000));
    }

    #[test]
    fn flash_sale_cap_applies_before_quantity() {
        let candidate = flash(dec!(50), Some(dec!(30000)));
        let d = evaluate(&candidate, dec!(100000), 3);
        assert_eq!(d.total(3), dec!(90000));
    }

    #[test]
    fn fixed_amount_never_exceeds_unit_price() {
        let candidate = standing(discount::DiscountType::FixedAmount, dec!(75000), None);
        let d = evaluate(&candidate, dec!(50000), 4);
        assert_eq!(d.line, dec!(50000));
        assert_eq!(d.per_unit, Decimal::ZERO);
    }

    #[test]
    fn fixed_amount_is_independent_of_quantity() {
        let candidate = standing(discount::DiscountType::FixedAmount, dec!(10000), None);
        assert_eq!(evaluate(&candidate, dec!(50000), 1).total(1), dec!(10000));
        assert_eq!(evaluate(&candidate, dec!(50000), 9).total(9), dec!(10000));
    }

    #[test]
    fn buy_x_get_y_requires_a_full_bundle() {
        // Buy 2 get 1: every 3 units, 1 is free.
        let candidate = standing(discount::DiscountType::BuyXGetY, dec!(2), Some(1));

        assert_eq!(evaluate(&candidate, dec!(10000), 2).total(2), Decimal::ZERO);
        assert_eq!(evaluate(&candidate, dec!(10000), 3).total(3), dec!(10000));
        assert_eq!(evaluate(&candidate, dec!(10000), 5).total(5), dec!(10000));
        assert_eq!(evaluate(&candidate, dec!(10000), 6).total(6), dec!(20000));
    }

    #[test]
    fn min_purchase_amount_gates_the_discount() {
        let mut model = match standing(discount::DiscountType::Percentage, dec!(10), None) {
            PromotionCandidate::Discount(m) => m,
            _ => unreachable!(),
        };
        model.min_purchase_amount = Some(dec!(100000));
        let candidate = PromotionCandidate::Discount(model);

        assert!(evaluate(&candidate, dec!(40000), 2).is_zero());
        assert_eq!(evaluate(&candidate, dec!(50000), 2).total(2), dec!(10000));
    }

    #[test]
    fn expired_flash_sale_is_not_applicable() {
        let candidate = match flash(dec!(20), None) {
            PromotionCandidate::FlashSale(mut m) => {
                m.ends_at = Utc::now() - Duration::hours(2);
                m.starts_at = Utc::now() - Duration::hours(3);
                PromotionCandidate::FlashSale(m)
            }
            _ => unreachable!(),
        };
        assert!(!candidate.is_applicable(Utc::now()));
    }

    #[test]
    fn sold_out_flash_sale_is_not_applicable() {
        let candidate = match flash(dec!(20), None) {
            PromotionCandidate::FlashSale(mut m) => {
                m.max_quantity = Some(10);
                m.sold_quantity = 10;
                PromotionCandidate::FlashSale(m)
            }
            _ => unreachable!(),
        };
        assert!(!candidate.is_applicable(Utc::now()));
    }

    #[test]
    fn exhausted_discount_is_not_applicable() {
        let candidate = match standing(discount::DiscountType::Percentage, dec!(10), None) {
            PromotionCandidate::Discount(mut m) => {
                m.usage_limit = Some(5);
                m.used_count = 5;
                PromotionCandidate::Discount(m)
            }
            _ => unreachable!(),
        };
        assert!(!candidate.is_applicable(Utc::now()));
    }

    #[test]
    fn select_best_picks_the_greatest_discount() {
        let candidates = vec![
            flash(dec!(10), None),
            standing(discount::DiscountType::Percentage, dec!(25), None),
        ];
        let (d, chosen) = select_best(&candidates, dec!(100000), 1).unwrap();
        assert_eq!(d.total(1), dec!(25000));
        assert_eq!(chosen.id(), candidates[1].id());
    }

    #[test]
    fn select_best_tie_keeps_the_first_seen() {
        // Flash sales are evaluated before standing discounts; an equal
        // discount must not displace the flash sale.
        let candidates = vec![
            flash(dec!(20), None),
            standing(discount::DiscountType::Percentage, dec!(20), None),
        ];
        let (_, chosen) = select_best(&candidates, dec!(100000), 2).unwrap();
        assert_eq!(chosen.id(), candidates[0].id());
        assert_eq!(chosen.source(), PromotionSource::FlashSale);
    }

    #[test]
    fn select_best_returns_none_without_effective_candidates() {
        let candidates = vec![standing(discount::DiscountType::BuyXGetY, dec!(2), Some(1))];
        // Quantity too small for a bundle: zero discount, nothing selected.
        assert!(select_best(&candidates, dec!(10000), 2).is_none());
    }

    proptest! {
        /// The selected discount never exceeds what any single candidate
        /// offers on its own (no stacking) and never prices below zero.
        #[test]
        fn selection_never_stacks(
            price in 1u32..10_000_000,
            qty in 1i32..50,
            pct_a in 0u32..100,
            pct_b in 0u32..100,
        ) {
            let price = Decimal::from(price);
            let candidates = vec![
                flash(Decimal::from(pct_a), None),
                standing(discount::DiscountType::Percentage, Decimal::from(pct_b), None),
            ];
            if let Some((d, _)) = select_best(&candidates, price, qty) {
                let max_alone = candidates
                    .iter()
                    .map(|c| evaluate(c, price, qty).total(qty))
                    .max()
                    .unwrap();
                prop_assert_eq!(d.total(qty), max_alone);
                prop_assert!(d.per_unit <= price);
            }
        }
    }
}
