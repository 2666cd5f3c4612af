use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, PaymentMethod};

/// One entry of the checkout selection. Quantity defaults to 1; a
/// client-supplied unit price is cross-checked against the catalog.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SelectedItem {
    pub food_id: Uuid,
    pub quantity: Option<i32>,
    pub size: Option<String>,
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricingBreakdown {
    pub subtotal: i64,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub delivery_fee: i64,
    #[serde(default)]
    pub discount: i64,
    pub total_price: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub selected_items: Vec<SelectedItem>,
    pub payment_method: Option<PaymentMethod>,
    pub delivery_address: Option<String>,
    pub pricing: Option<PricingBreakdown>,
    pub applied_promo: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}

/// Absent status is an accepted no-op that re-reports the unchanged
/// order; present status must parse as a known value.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<String>,
}
