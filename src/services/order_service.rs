use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    dto::orders::{
        OrderList, OrderWithItems, PlaceOrderRequest, PricingBreakdown, UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems, Model as CartItemModel},
        foods::{Column as FoodCol, Entity as Foods},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus, PaymentMethod},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// Client unit prices are accepted only within this fraction of the
/// catalog price; anything further off is rejected.
pub const PRICE_TOLERANCE: f64 = 0.10;

pub const FALLBACK_ADDRESS: &str = "No address provided";

/// Reconcile a client-supplied unit price against the catalog price.
/// Absent client price means the catalog price is authoritative.
pub fn resolve_unit_price(
    catalog_price: i64,
    client_price: Option<i64>,
    tolerance: f64,
) -> AppResult<i64> {
    let Some(client_price) = client_price else {
        return Ok(catalog_price);
    };
    if client_price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    let allowed = (catalog_price as f64 * tolerance).abs();
    if ((client_price - catalog_price) as f64).abs() > allowed {
        return Err(AppError::BadRequest(
            "item price does not match the catalog price".into(),
        ));
    }
    Ok(client_price)
}

/// Breakdown used when the caller does not supply one: zero tax, fee
/// and discount, total equal to the subtotal.
pub fn derive_breakdown(subtotal: i64) -> PricingBreakdown {
    PricingBreakdown {
        subtotal,
        tax: 0,
        delivery_fee: 0,
        discount: 0,
        total_price: subtotal,
    }
}

/// A client-supplied breakdown must have non-negative components and an
/// internally consistent total.
pub fn validate_breakdown(pricing: &PricingBreakdown) -> AppResult<()> {
    if pricing.subtotal < 0
        || pricing.tax < 0
        || pricing.delivery_fee < 0
        || pricing.discount < 0
        || pricing.total_price < 0
    {
        return Err(AppError::BadRequest(
            "pricing amounts must not be negative".into(),
        ));
    }
    let expected = pricing.subtotal + pricing.tax + pricing.delivery_fee - pricing.discount;
    if pricing.total_price != expected {
        return Err(AppError::BadRequest(
            "pricing total does not match its components".into(),
        ));
    }
    Ok(())
}

/// Address precedence: explicit request value, then the user's stored
/// address, then the literal fallback.
pub fn resolve_delivery_address(requested: Option<&str>, stored: Option<&str>) -> String {
    requested
        .filter(|s| !s.trim().is_empty())
        .or_else(|| stored.filter(|s| !s.trim().is_empty()))
        .unwrap_or(FALLBACK_ADDRESS)
        .to_string()
}

struct OrderLine {
    food_id: Uuid,
    name: String,
    image: Option<String>,
    category: String,
    size: String,
    quantity: i32,
    unit_price: i64,
    total: i64,
}

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    match place_order_inner(state, user, meta, payload).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            audit::record(
                &state.pool,
                AuditEntry::failed(
                    meta,
                    Some(user.user_id),
                    "Order Creation",
                    format!("Order failed - {err}"),
                ),
            );
            Err(err)
        }
    }
}

async fn place_order_inner(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.selected_items.is_empty() {
        return Err(AppError::BadRequest("No items selected".into()));
    }
    for sel in &payload.selected_items {
        if sel.quantity.is_some_and(|q| q < 1) {
            return Err(AppError::BadRequest(
                "quantity must be at least 1".into(),
            ));
        }
    }

    let txn = state.orm.begin().await?;

    // The lock serializes concurrent checkouts for the same user so the
    // cart consumption below cannot lose updates.
    let db_user = Users::find_by_id(user.user_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let db_user = match db_user {
        Some(u) if !u.is_deleted => u,
        _ => return Err(AppError::NotFound),
    };

    let food_ids: Vec<Uuid> = payload.selected_items.iter().map(|s| s.food_id).collect();
    let foods: HashMap<Uuid, _> = Foods::find()
        .filter(FoodCol::Id.is_in(food_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|food| (food.id, food))
        .collect();

    // Cart entries supply quantity/size defaults for selections that
    // omit them, so "order this cart entry" keeps its quantity.
    let cart: HashMap<Uuid, CartItemModel> = CartItems::find()
        .filter(CartCol::UserId.eq(db_user.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|item| (item.food_id, item))
        .collect();

    // Unresolvable references are dropped rather than failing the whole
    // order; partial fulfillment is the deliberate policy.
    let mut lines: Vec<OrderLine> = Vec::new();
    for sel in &payload.selected_items {
        let Some(food) = foods.get(&sel.food_id) else {
            tracing::debug!(food_id = %sel.food_id, "dropping unresolved order selection");
            continue;
        };
        let cart_entry = cart.get(&sel.food_id);
        let quantity = sel
            .quantity
            .or(cart_entry.map(|entry| entry.quantity))
            .unwrap_or(1);
        let size = sel
            .size
            .clone()
            .or_else(|| cart_entry.map(|entry| entry.size.clone()))
            .unwrap_or_else(|| "Regular".to_string());
        let unit_price = resolve_unit_price(food.price, sel.price, PRICE_TOLERANCE)?;
        lines.push(OrderLine {
            food_id: food.id,
            name: food.name.clone(),
            image: food.image.clone(),
            category: food.category.clone(),
            size,
            quantity,
            unit_price,
            total: unit_price * quantity as i64,
        });
    }

    if lines.is_empty() {
        return Err(AppError::BadRequest("No valid items found to order".into()));
    }

    let subtotal: i64 = lines.iter().map(|line| line.total).sum();
    let pricing = match payload.pricing {
        Some(pricing) => {
            validate_breakdown(&pricing)?;
            pricing
        }
        None => derive_breakdown(subtotal),
    };

    let delivery_address = resolve_delivery_address(
        payload.delivery_address.as_deref(),
        db_user.address.as_deref(),
    );
    let payment_method = payload.payment_method.unwrap_or(PaymentMethod::Cod);

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(db_user.id),
        user_name: Set(db_user.name.clone()),
        subtotal: Set(pricing.subtotal),
        tax: Set(pricing.tax),
        delivery_fee: Set(pricing.delivery_fee),
        discount: Set(pricing.discount),
        total_price: Set(pricing.total_price),
        applied_promo: Set(payload.applied_promo.clone()),
        delivery_address: Set(delivery_address),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_method: Set(payment_method.as_str().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::new();
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            food_id: Set(line.food_id),
            name: Set(line.name.clone()),
            image: Set(line.image.clone()),
            category: Set(line.category.clone()),
            size: Set(line.size.clone()),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            total_item_price: Set(line.total),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    // Consume exactly the ordered entries; unselected cart rows remain.
    let ordered_ids: Vec<Uuid> = lines.iter().map(|line| line.food_id).collect();
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(db_user.id))
        .filter(CartCol::FoodId.is_in(ordered_ids))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(db_user.id),
            "Order Placed",
            format!(
                "Order placed successfully - {} items, total {}",
                items.len(),
                order.total_price
            ),
        ),
    );

    Ok(ApiResponse::success(
        "Order placed successfully",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let items = attach_items(state, orders).await?;
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = attach_items(state, orders).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    // A supplied status must parse as a known value; transitions between
    // known values are deliberately unrestricted.
    let new_status = match payload.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            OrderStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest("Invalid order status".into()))?,
        ),
        None => None,
    };

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(order) => order,
        None => {
            audit::record(
                &state.pool,
                AuditEntry::failed(
                    meta,
                    Some(user.user_id),
                    "Update Order Status",
                    format!("Failed - Order not found ({id})"),
                ),
            );
            return Err(AppError::NotFound);
        }
    };

    let order = match new_status {
        // No status supplied: accepted no-op, re-report the unchanged order.
        None => existing,
        Some(status) => {
            let mut active: OrderActive = existing.into();
            active.status = Set(status.as_str().to_string());
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?
        }
    };

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(user.user_id),
            "Update Order Status",
            format!("Order {} marked as {}", order.id, order.status),
        ),
    );

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

async fn attach_items(
    state: &AppState,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderWithItems>> {
    let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    if !order_ids.is_empty() {
        for item in OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(order_ids))
            .all(&state.orm)
            .await?
        {
            grouped
                .entry(item.order_id)
                .or_default()
                .push(order_item_from_entity(item));
        }
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(order),
                items,
            }
        })
        .collect())
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        user_name: model.user_name,
        subtotal: model.subtotal,
        tax: model.tax,
        delivery_fee: model.delivery_fee,
        discount: model.discount,
        total_price: model.total_price,
        applied_promo: model.applied_promo,
        delivery_address: model.delivery_address,
        status: model.status,
        payment_method: model.payment_method,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        food_id: model.food_id,
        name: model.name,
        image: model.image,
        category: model.category,
        size: model.size,
        quantity: model.quantity,
        price: model.price,
        total_item_price: model.total_item_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
