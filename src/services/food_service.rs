use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry, RequestMeta},
    dto::foods::{AddReviewRequest, CreateFoodRequest, FoodList, ReviewResponse, UpdateFoodRequest},
    entity::{
        food_reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as FoodReviews,
            Model as ReviewModel,
        },
        foods::{ActiveModel as FoodActive, Column as FoodCol, Entity as Foods, Model as FoodModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Food, FoodReview},
    response::{ApiResponse, Meta},
    routes::params::{FoodQuery, FoodSortBy, SortOrder},
    state::AppState,
};

pub async fn list_foods(state: &AppState, query: FoodQuery) -> AppResult<ApiResponse<FoodList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(FoodCol::Name).ilike(pattern.clone()))
                .add(Expr::col(FoodCol::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(FoodCol::Category.eq(category.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(FoodCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(FoodCol::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(FoodSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        FoodSortBy::CreatedAt => FoodCol::CreatedAt,
        FoodSortBy::Price => FoodCol::Price,
        FoodSortBy::Name => FoodCol::Name,
        FoodSortBy::Rating => FoodCol::Rating,
    };

    let mut finder = Foods::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(food_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Foods", FoodList { items }, Some(meta)))
}

pub async fn get_food(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Food>> {
    let result = Foods::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(food_from_entity);
    let result = match result {
        Some(food) => food,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Food", result, None))
}

pub async fn create_food(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    payload: CreateFoodRequest,
) -> AppResult<ApiResponse<Food>> {
    ensure_admin(user)?;
    let (name, category, description, price) = match (
        payload.name.filter(|s| !s.trim().is_empty()),
        payload.category.filter(|s| !s.trim().is_empty()),
        payload.description.filter(|s| !s.trim().is_empty()),
        payload.price,
    ) {
        (Some(name), Some(category), Some(description), Some(price)) => {
            (name, category, description, price)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Please fill all required fields".into(),
            ));
        }
    };
    if price <= 0 {
        return Err(AppError::BadRequest("price must be positive".into()));
    }

    let food = FoodActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(Some(description)),
        category: Set(category),
        price: Set(price),
        image: Set(payload.image),
        available: Set(payload.available.unwrap_or(true)),
        rating: Set(0.0),
        reviews: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(user.user_id),
            "Add Food",
            format!("Added new food item: {}", food.name),
        ),
    );

    Ok(ApiResponse::success(
        "Food item added successfully",
        food_from_entity(food),
        Some(Meta::empty()),
    ))
}

pub async fn update_food(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    id: Uuid,
    payload: UpdateFoodRequest,
) -> AppResult<ApiResponse<Food>> {
    ensure_admin(user)?;
    let existing = Foods::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(food) => food,
        None => {
            audit::record(
                &state.pool,
                AuditEntry::failed(
                    meta,
                    Some(user.user_id),
                    "Update Food",
                    format!("Failed to update - Food not found ({id})"),
                ),
            );
            return Err(AppError::NotFound);
        }
    };

    let mut active: FoodActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(price) = payload.price {
        if price <= 0 {
            return Err(AppError::BadRequest("price must be positive".into()));
        }
        active.price = Set(price);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(available) = payload.available {
        active.available = Set(available);
    }
    active.updated_at = Set(Utc::now().into());

    let food = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(user.user_id),
            "Update Food",
            format!("Updated food item: {}", food.name),
        ),
    );

    Ok(ApiResponse::success(
        "Updated",
        food_from_entity(food),
        Some(Meta::empty()),
    ))
}

pub async fn delete_food(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let existing = Foods::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(food) => food,
        None => {
            audit::record(
                &state.pool,
                AuditEntry::failed(
                    meta,
                    Some(user.user_id),
                    "Delete Food",
                    format!("Failed - Food not found ({id})"),
                ),
            );
            return Err(AppError::NotFound);
        }
    };

    let name = existing.name.clone();
    Foods::delete_by_id(existing.id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(user.user_id),
            "Delete Food",
            format!("Deleted food item: {name}"),
        ),
    );

    Ok(ApiResponse::success(
        "Food deleted successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    food_id: Uuid,
    payload: AddReviewRequest,
) -> AppResult<ApiResponse<ReviewResponse>> {
    match add_review_inner(state, user, meta, food_id, payload).await {
        Ok(resp) => Ok(resp),
        Err(err) => {
            audit::record(
                &state.pool,
                AuditEntry::failed(
                    meta,
                    Some(user.user_id),
                    "Add Food Review",
                    format!("Review failed - {err}"),
                ),
            );
            Err(err)
        }
    }
}

async fn add_review_inner(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    food_id: Uuid,
    payload: AddReviewRequest,
) -> AppResult<ApiResponse<ReviewResponse>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    // Lock the food row so two concurrent reviews recompute the mean
    // against a consistent list.
    let food = Foods::find_by_id(food_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let food = match food {
        Some(food) => food,
        None => return Err(AppError::NotFound),
    };

    let reviewer = Users::find_by_id(user.user_id).one(&txn).await?;
    let reviewer = match reviewer {
        Some(u) if !u.is_deleted => u,
        _ => return Err(AppError::NotFound),
    };

    let duplicate = FoodReviews::find()
        .filter(ReviewCol::FoodId.eq(food.id))
        .filter(ReviewCol::UserId.eq(reviewer.id))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "You have already reviewed this food".into(),
        ));
    }

    ReviewActive {
        id: Set(Uuid::new_v4()),
        food_id: Set(food.id),
        user_id: Set(reviewer.id),
        user_name: Set(reviewer.name.clone()),
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Recompute count and mean from the full list.
    let reviews = FoodReviews::find()
        .filter(ReviewCol::FoodId.eq(food.id))
        .order_by_asc(ReviewCol::CreatedAt)
        .all(&txn)
        .await?;
    let count = reviews.len() as i32;
    let mean = reviews.iter().map(|r| r.rating as f64).sum::<f64>() / reviews.len() as f64;

    let food_name = food.name.clone();
    let mut active: FoodActive = food.into();
    active.reviews = Set(count);
    active.rating = Set(mean);
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        AuditEntry::success(
            meta,
            Some(reviewer.id),
            "Add Food Review",
            format!(
                "User {} reviewed \"{}\" with rating {}",
                reviewer.name, food_name, payload.rating
            ),
        ),
    );

    Ok(ApiResponse::success(
        "Review added successfully",
        ReviewResponse {
            reviews: reviews.into_iter().map(review_from_entity).collect(),
            average_rating: mean,
        },
        Some(Meta::empty()),
    ))
}

fn food_from_entity(model: FoodModel) -> Food {
    Food {
        id: model.id,
        name: model.name,
        description: model.description,
        category: model.category,
        price: model.price,
        image: model.image,
        available: model.available,
        rating: model.rating,
        reviews: model.reviews,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn review_from_entity(model: ReviewModel) -> FoodReview {
    FoodReview {
        id: model.id,
        food_id: model.food_id,
        user_id: model.user_id,
        user_name: model.user_name,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
