use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{AuditLog, User};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogList {
    pub items: Vec<AuditLog>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopRatedFood {
    pub id: Uuid,
    pub name: String,
    pub rating: f64,
    pub reviews: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewAnalytics {
    pub total_reviews: i64,
    pub average_rating: f64,
    pub top_foods: Vec<TopRatedFood>,
}

/// Dashboard counters; revenue excludes cancelled orders.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardData {
    pub customers: i64,
    pub foods: i64,
    pub orders: i64,
    pub revenue: i64,
}
