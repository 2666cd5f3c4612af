use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    audit::RequestMeta,
    dto::foods::{
        AddReviewRequest, CreateFoodRequest, FoodList, ReviewResponse, UpdateFoodRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Food,
    response::ApiResponse,
    routes::params::FoodQuery,
    services::food_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_foods).post(create_food))
        .route(
            "/{id}",
            get(get_food).put(update_food).delete(delete_food),
        )
        .route("/{id}/review", post(add_review))
}

#[utoipa::path(
    get,
    path = "/api/foods",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search over name and description"),
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("min_price" = Option<i64>, Query, description = "Minimum price"),
        ("max_price" = Option<i64>, Query, description = "Maximum price"),
        ("sort_by" = Option<String>, Query, description = "Sort by: created_at, price, name, rating"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List foods", body = ApiResponse<FoodList>)
    ),
    tag = "Foods"
)]
pub async fn list_foods(
    State(state): State<AppState>,
    Query(query): Query<FoodQuery>,
) -> AppResult<Json<ApiResponse<FoodList>>> {
    let resp = food_service::list_foods(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/foods/{id}",
    params(
        ("id" = Uuid, Path, description = "Food ID")
    ),
    responses(
        (status = 200, description = "Get food", body = ApiResponse<Food>),
        (status = 400, description = "Malformed food ID"),
        (status = 404, description = "Food not found"),
    ),
    tag = "Foods"
)]
pub async fn get_food(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Food>>> {
    let resp = food_service::get_food(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/foods",
    request_body = CreateFoodRequest,
    responses(
        (status = 201, description = "Create food", body = ApiResponse<Food>),
        (status = 400, description = "Missing required fields"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Foods"
)]
pub async fn create_food(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateFoodRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Food>>)> {
    let resp = food_service::create_food(&state, &user, &meta, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/foods/{id}",
    params(
        ("id" = Uuid, Path, description = "Food ID")
    ),
    request_body = UpdateFoodRequest,
    responses(
        (status = 200, description = "Updated food", body = ApiResponse<Food>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Food not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Foods"
)]
pub async fn update_food(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFoodRequest>,
) -> AppResult<Json<ApiResponse<Food>>> {
    let resp = food_service::update_food(&state, &user, &meta, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/foods/{id}",
    params(
        ("id" = Uuid, Path, description = "Food ID")
    ),
    responses(
        (status = 200, description = "Deleted food"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Food not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Foods"
)]
pub async fn delete_food(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = food_service::delete_food(&state, &user, &meta, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/foods/{id}/review",
    params(
        ("id" = Uuid, Path, description = "Food ID")
    ),
    request_body = AddReviewRequest,
    responses(
        (status = 201, description = "Review added", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Food not found"),
        (status = 409, description = "Already reviewed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Foods"
)]
pub async fn add_review(
    State(state): State<AppState>,
    user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewResponse>>)> {
    let resp = food_service::add_review(&state, &user, &meta, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
