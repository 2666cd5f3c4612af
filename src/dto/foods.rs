use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Food, FoodReview};

/// Required fields are validated in the service so a missing one maps
/// to 400 rather than a deserialize rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFoodRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub image: Option<String>,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFoodRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub image: Option<String>,
    pub available: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct FoodList {
    #[schema(value_type = Vec<Food>)]
    pub items: Vec<Food>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Returned by the review-append operation: the full list plus the
/// freshly recomputed mean.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub reviews: Vec<FoodReview>,
    pub average_rating: f64,
}
