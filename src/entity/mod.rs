pub mod audit_logs;
pub mod cart_items;
pub mod food_reviews;
pub mod foods;
pub mod order_items;
pub mod orders;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use food_reviews::Entity as FoodReviews;
pub use foods::Entity as Foods;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use users::Entity as Users;
