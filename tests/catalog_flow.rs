use axum_food_ordering_api::{
    audit::RequestMeta,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::foods::{CreateFoodRequest, UpdateFoodRequest},
    error::AppError,
    middleware::auth::AuthUser,
    services::food_service,
    state::AppState,
};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Statement};
use uuid::Uuid;

#[tokio::test]
async fn catalog_crud_flow() -> anyhow::Result<()> {
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

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };
    let customer = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };
    let meta = RequestMeta {
        ip_address: Some("127.0.0.1".into()),
        method: "POST".into(),
        endpoint: "/api/foods".into(),
    };

    // Missing price is a client error and persists nothing.
    let err = food_service::create_food(
        &state,
        &admin,
        &meta,
        CreateFoodRequest {
            name: Some("Veg Biryani".into()),
            description: Some("Fragrant rice".into()),
            category: Some("Mains".into()),
            price: None,
            image: None,
            available: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(count_foods(&state).await?, 0);

    // Non-admins cannot create at all.
    let err = food_service::create_food(
        &state,
        &customer,
        &meta,
        CreateFoodRequest {
            name: Some("Veg Biryani".into()),
            description: Some("Fragrant rice".into()),
            category: Some("Mains".into()),
            price: Some(19900),
            image: None,
            available: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let created = food_service::create_food(
        &state,
        &admin,
        &meta,
        CreateFoodRequest {
            name: Some("Veg Biryani".into()),
            description: Some("Fragrant rice".into()),
            category: Some("Mains".into()),
            price: Some(19900),
            image: None,
            available: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(created.available);
    assert_eq!(created.reviews, 0);

    let fetched = food_service::get_food(&state, created.id).await?.data.unwrap();
    assert_eq!(fetched.name, "Veg Biryani");

    // Partial update leaves untouched fields alone.
    let updated = food_service::update_food(
        &state,
        &admin,
        &meta,
        created.id,
        UpdateFoodRequest {
            name: None,
            description: None,
            category: None,
            price: Some(17900),
            image: None,
            available: Some(false),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.price, 17900);
    assert!(!updated.available);
    assert_eq!(updated.name, "Veg Biryani");

    food_service::delete_food(&state, &admin, &meta, created.id).await?;

    let err = food_service::get_food(&state, created.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = food_service::delete_food(&state, &admin, &meta, created.id)
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

async fn count_foods(state: &AppState) -> anyhow::Result<u64> {
    use axum_food_ordering_api::entity::Foods;
    Ok(Foods::find().count(&state.orm).await?)
}
