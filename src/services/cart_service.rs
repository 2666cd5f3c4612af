use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    db::DbPool,
    dto::cart::{AddToCartRequest, CartList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

#[derive(FromRow)]
struct FoodSnapshotRow {
    id: Uuid,
    name: String,
    category: String,
    price: i64,
    image: Option<String>,
    available: bool,
}

pub async fn list_cart(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let items = sqlx::query_as::<_, CartItem>(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    meta: &RequestMeta,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_string(),
        ));
    }

    let food: Option<FoodSnapshotRow> = sqlx::query_as(
        "SELECT id, name, category, price, image, available FROM foods WHERE id = $1",
    )
    .bind(payload.food_id)
    .fetch_optional(pool)
    .await?;
    let food = match food {
        Some(food) => food,
        None => return Err(AppError::BadRequest("food not found".to_string())),
    };
    if !food.available {
        return Err(AppError::BadRequest("food is not available".to_string()));
    }

    let size = payload.size.unwrap_or_else(|| "Regular".to_string());

    // Re-adding the same food replaces quantity/size and refreshes the
    // snapshot to the current catalog values.
    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_id, food_id, name, category, price, image, size, quantity)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (user_id, food_id) DO UPDATE
        SET name = EXCLUDED.name,
            category = EXCLUDED.category,
            price = EXCLUDED.price,
            image = EXCLUDED.image,
            size = EXCLUDED.size,
            quantity = EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(food.id)
    .bind(&food.name)
    .bind(&food.category)
    .bind(food.price)
    .bind(&food.image)
    .bind(&size)
    .bind(payload.quantity)
    .fetch_one(pool)
    .await?;

    audit::record(
        pool,
        AuditEntry::success(
            meta,
            Some(user.user_id),
            "Cart Update",
            format!(
                "Added {} x{} to cart",
                cart_item.name, cart_item.quantity
            ),
        ),
    );

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    meta: &RequestMeta,
    food_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE food_id = $1 AND user_id = $2")
        .bind(food_id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        pool,
        AuditEntry::success(
            meta,
            Some(user.user_id),
            "Cart Remove",
            format!("Removed food {food_id} from cart"),
        ),
    );

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
