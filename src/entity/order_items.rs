use sea_orm::entity::prelude::*;

/// Item snapshots are denormalized at order time and never track later
/// catalog changes; food_id deliberately has no FK so the snapshot
/// survives food deletion.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub food_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub category: String,
    pub size: String,
    pub quantity: i32,
    pub price: i64,
    pub total_item_price: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
