use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local copy of a provider invoice. Created once per order; the webhook
/// reconciler overwrites `status` and `raw` in place with each callback,
/// keeping the latest provider payload verbatim for audit and replay.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub provider_invoice_id: String,
    pub external_id: String,
    pub order_id: Uuid,
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,
    /// Provider vocabulary, e.g. PENDING/PAID/EXPIRED — stored as received.
    pub status: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(nullable)]
    pub payer_email: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub raw: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
