use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{DashboardData, LogList, ReviewAnalytics, TopRatedFood, UserList},
        cart::CartList,
        foods::{FoodList, ReviewResponse},
        orders::{OrderList, OrderWithItems, PricingBreakdown, SelectedItem},
    },
    models::{AuditLog, CartItem, Food, FoodReview, Order, OrderItem, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, foods as food_routes, health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        food_routes::list_foods,
        food_routes::create_food,
        food_routes::get_food,
        food_routes::update_food,
        food_routes::delete_food,
        food_routes::add_review,
        orders::place_order,
        orders::my_orders,
        orders::list_all_orders,
        orders::update_order_status,
        admin::list_users,
        admin::soft_delete_user,
        admin::restore_user,
        admin::list_logs,
        admin::review_analytics,
        admin::dashboard
    ),
    components(
        schemas(
            User,
            Food,
            FoodReview,
            CartItem,
            Order,
            OrderItem,
            AuditLog,
            FoodList,
            ReviewResponse,
            CartList,
            OrderList,
            OrderWithItems,
            SelectedItem,
            PricingBreakdown,
            UserList,
            LogList,
            ReviewAnalytics,
            TopRatedFood,
            DashboardData,
            params::Pagination,
            params::FoodQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Food>,
            ApiResponse<FoodList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Foods", description = "Food catalog and review endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
