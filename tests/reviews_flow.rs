use axum_food_ordering_api::{
    audit::RequestMeta,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::foods::AddReviewRequest,
    entity::{foods::ActiveModel as FoodActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::AuthUser,
    services::food_service,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Review flow: appends recompute the mean, duplicates are conflicts and
// leave the aggregates untouched.
#[tokio::test]
async fn review_append_recomputes_the_mean() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let alice = create_user(&state, "alice@example.com").await?;
    let bob = create_user(&state, "bob@example.com").await?;
    let carol = create_user(&state, "carol@example.com").await?;
    let food_id = create_food(&state, "Paneer Tikka").await?;

    let meta = request_meta();
    let as_user = |user_id| AuthUser {
        user_id,
        role: "user".into(),
    };

    // Ratings [4] -> mean 4.0
    let resp = food_service::add_review(
        &state,
        &as_user(alice),
        &meta,
        food_id,
        AddReviewRequest {
            rating: 4,
            comment: Some("Good".into()),
        },
    )
    .await?;
    let data = resp.data.unwrap();
    assert_eq!(data.reviews.len(), 1);
    assert_eq!(data.average_rating, 4.0);

    // Ratings [4, 5] -> mean 4.5
    let resp = food_service::add_review(
        &state,
        &as_user(bob),
        &meta,
        food_id,
        AddReviewRequest {
            rating: 5,
            comment: None,
        },
    )
    .await?;
    let data = resp.data.unwrap();
    assert_eq!(data.reviews.len(), 2);
    assert_eq!(data.average_rating, 4.5);

    // A second review from the same user is a conflict...
    let err = food_service::add_review(
        &state,
        &as_user(alice),
        &meta,
        food_id,
        AddReviewRequest {
            rating: 1,
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // ...and the aggregates are unchanged after the failed attempt.
    let (count, mean) = food_aggregates(&state, food_id).await?;
    assert_eq!(count, 2);
    assert_eq!(mean, 4.5);

    // Ratings [4, 5, 3] -> mean 4.0
    let resp = food_service::add_review(
        &state,
        &as_user(carol),
        &meta,
        food_id,
        AddReviewRequest {
            rating: 3,
            comment: Some("Average".into()),
        },
    )
    .await?;
    assert_eq!(resp.data.unwrap().average_rating, 4.0);

    // Out-of-range ratings never land.
    let err = food_service::add_review(
        &state,
        &as_user(carol),
        &meta,
        food_id,
        AddReviewRequest {
            rating: 6,
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Reviewing an absent food is NotFound.
    let err = food_service::add_review(
        &state,
        &as_user(alice),
        &meta,
        Uuid::new_v4(),
        AddReviewRequest {
            rating: 4,
            comment: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, food_reviews, audit_logs, foods, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState { pool, orm })
}

async fn create_user(state: &AppState, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("Reviewer".into()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set("user".into()),
        is_active: Set(true),
        is_deleted: Set(false),
        address: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_food(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    let food = FoodActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some("A dish for testing".into())),
        category: Set("Test".into()),
        price: Set(24900),
        image: Set(None),
        available: Set(true),
        rating: Set(0.0),
        reviews: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(food.id)
}

async fn food_aggregates(state: &AppState, food_id: Uuid) -> anyhow::Result<(i32, f64)> {
    use axum_food_ordering_api::entity::Foods;
    let food = Foods::find_by_id(food_id)
        .one(&state.orm)
        .await?
        .expect("food exists");
    Ok((food.reviews, food.rating))
}

fn request_meta() -> RequestMeta {
    RequestMeta {
        ip_address: None,
        method: "POST".into(),
        endpoint: "/api/foods".into(),
    }
}
