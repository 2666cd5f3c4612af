use axum_food_ordering_api::{
    error::AppError,
    models::{OrderStatus, PaymentMethod},
    services::order_service::{
        FALLBACK_ADDRESS, PRICE_TOLERANCE, derive_breakdown, resolve_delivery_address,
        resolve_unit_price, validate_breakdown,
    },
};

#[test]
fn catalog_price_is_authoritative_when_client_omits_one() {
    let price = resolve_unit_price(10000, None, PRICE_TOLERANCE).unwrap();
    assert_eq!(price, 10000);
}

#[test]
fn client_price_within_tolerance_is_accepted() {
    let price = resolve_unit_price(10000, Some(10500), PRICE_TOLERANCE).unwrap();
    assert_eq!(price, 10500);

    let price = resolve_unit_price(10000, Some(9500), PRICE_TOLERANCE).unwrap();
    assert_eq!(price, 9500);
}

#[test]
fn client_price_outside_tolerance_is_rejected() {
    let err = resolve_unit_price(10000, Some(5000), PRICE_TOLERANCE).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = resolve_unit_price(10000, Some(20000), PRICE_TOLERANCE).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn negative_client_price_is_rejected() {
    let err = resolve_unit_price(100, Some(-1), PRICE_TOLERANCE).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn derived_breakdown_totals_the_subtotal() {
    let pricing = derive_breakdown(20000);
    assert_eq!(pricing.subtotal, 20000);
    assert_eq!(pricing.tax, 0);
    assert_eq!(pricing.delivery_fee, 0);
    assert_eq!(pricing.discount, 0);
    assert_eq!(pricing.total_price, 20000);
}

#[test]
fn consistent_client_breakdown_is_accepted() {
    let mut pricing = derive_breakdown(20000);
    pricing.tax = 1000;
    pricing.delivery_fee = 500;
    pricing.discount = 1500;
    pricing.total_price = 20000 + 1000 + 500 - 1500;
    assert!(validate_breakdown(&pricing).is_ok());
}

#[test]
fn inconsistent_client_breakdown_is_rejected() {
    let mut pricing = derive_breakdown(20000);
    pricing.total_price = 12345;
    let err = validate_breakdown(&pricing).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn negative_breakdown_component_is_rejected() {
    let mut pricing = derive_breakdown(20000);
    pricing.discount = -100;
    pricing.total_price = 20100;
    let err = validate_breakdown(&pricing).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn delivery_address_prefers_the_request_value() {
    let address = resolve_delivery_address(Some("42 Curry Lane"), Some("1 Stored St"));
    assert_eq!(address, "42 Curry Lane");
}

#[test]
fn delivery_address_falls_back_to_the_stored_one() {
    let address = resolve_delivery_address(None, Some("1 Stored St"));
    assert_eq!(address, "1 Stored St");

    // Blank request values fall through too.
    let address = resolve_delivery_address(Some("   "), Some("1 Stored St"));
    assert_eq!(address, "1 Stored St");
}

#[test]
fn delivery_address_bottoms_out_at_the_placeholder() {
    let address = resolve_delivery_address(None, None);
    assert_eq!(address, FALLBACK_ADDRESS);

    let address = resolve_delivery_address(Some(""), Some(" "));
    assert_eq!(address, FALLBACK_ADDRESS);
}

#[test]
fn order_status_parses_known_values_only() {
    assert_eq!(OrderStatus::parse("Pending"), Some(OrderStatus::Pending));
    assert_eq!(OrderStatus::parse("Confirmed"), Some(OrderStatus::Confirmed));
    assert_eq!(OrderStatus::parse("Delivered"), Some(OrderStatus::Delivered));
    assert_eq!(OrderStatus::parse("Cancelled"), Some(OrderStatus::Cancelled));
    assert_eq!(OrderStatus::parse("shipped"), None);
    assert_eq!(OrderStatus::Pending.as_str(), "Pending");
}

#[test]
fn payment_method_round_trips_its_wire_names() {
    assert_eq!(PaymentMethod::parse("COD"), Some(PaymentMethod::Cod));
    assert_eq!(PaymentMethod::parse("Online"), Some(PaymentMethod::Online));
    assert_eq!(PaymentMethod::parse("cheque"), None);
    assert_eq!(PaymentMethod::Cod.as_str(), "COD");
}
