use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    dto::admin::{DashboardData, LogList, ReviewAnalytics, TopRatedFood, UserList},
    entity::{
        audit_logs::{Column as LogCol, Entity as AuditLogs, Model as LogModel},
        foods::{Column as FoodCol, Entity as Foods},
        users::{
            ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{AuditLog, User},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn soft_delete_user(
    state: &AppState,
    admin: &AuthUser,
    meta: &RequestMeta,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(admin)?;
    let existing = Users::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => {
            audit::record(
                &state.pool,
                AuditEntry::failed(
                    meta,
                    Some(admin.user_id),
                    "Soft Delete User",
                    format!("Failed - User not found ({id})"),
                ),
            );
            return Err(AppError::NotFound);
        }
    };

    // Soft delete flips is_deleted only; is_active is an independent flag.
    let mut active: UserActive = existing.into();
    active.is_deleted = Set(true);
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(admin.user_id),
            "Soft Delete User",
            format!("User {} marked deleted", user.email),
        ),
    );

    Ok(ApiResponse::success(
        "User deleted",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn restore_user(
    state: &AppState,
    admin: &AuthUser,
    meta: &RequestMeta,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(admin)?;
    let existing = Users::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let mut active: UserActive = existing.into();
    active.is_deleted = Set(false);
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(admin.user_id),
            "Restore User",
            format!("User {} restored", user.email),
        ),
    );

    Ok(ApiResponse::success(
        "User restored",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn list_logs(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<LogList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = AuditLogs::find().order_by_desc(LogCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(log_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Logs", LogList { items }, Some(meta)))
}

pub async fn review_analytics(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ReviewAnalytics>> {
    ensure_admin(user)?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM food_reviews")
        .fetch_one(&state.pool)
        .await?;

    let average: (Option<f64>,) =
        sqlx::query_as("SELECT AVG(rating)::float8 FROM food_reviews")
            .fetch_one(&state.pool)
            .await?;

    let top_foods = Foods::find()
        .filter(FoodCol::Reviews.gt(0))
        .order_by_desc(FoodCol::Rating)
        .order_by_desc(FoodCol::Reviews)
        .limit(5)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|food| TopRatedFood {
            id: food.id,
            name: food.name,
            rating: food.rating,
            reviews: food.reviews,
        })
        .collect();

    let data = ReviewAnalytics {
        total_reviews: total.0,
        average_rating: average.0.unwrap_or(0.0),
        top_foods,
    };
    Ok(ApiResponse::success("Review analytics", data, Some(Meta::empty())))
}

pub async fn dashboard(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardData>> {
    ensure_admin(user)?;

    let customers: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_deleted = false")
            .fetch_one(&state.pool)
            .await?;

    let foods: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM foods")
        .fetch_one(&state.pool)
        .await?;

    let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;

    let revenue: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_price), 0)::bigint FROM orders WHERE status <> 'Cancelled'",
    )
    .fetch_one(&state.pool)
    .await?;

    let data = DashboardData {
        customers: customers.0,
        foods: foods.0,
        orders: orders.0,
        revenue: revenue.0,
    };
    Ok(ApiResponse::success("Dashboard", data, Some(Meta::empty())))
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        password_hash: model.password_hash,
        role: model.role,
        is_active: model.is_active,
        is_deleted: model.is_deleted,
        address: model.address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn log_from_entity(model: LogModel) -> AuditLog {
    AuditLog {
        id: model.id,
        user_id: model.user_id,
        action: model.action,
        description: model.description,
        ip_address: model.ip_address,
        method: model.method,
        endpoint: model.endpoint,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
