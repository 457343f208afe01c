use bookstall::auth::Claims;
use bookstall::db;
use bookstall::models::{book, order, order_item, user};
use bookstall::services::cart_service::{self, CartStore};
use bookstall::services::order_service::{self, CancelOutcome, ServiceError, ShippingDetails};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::str::FromStr;

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_test_user(db: &DatabaseConnection, username: &str, role: &str) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        password_hash: Set("hash".to_string()),
        registration_date: Set(chrono::Utc::now().to_rfc3339()),
        status: Set("active".to_string()),
        role: Set(role.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

async fn create_test_book(
    db: &DatabaseConnection,
    owner_id: i32,
    title: &str,
    price: &str,
) -> book::Model {
    book::ActiveModel {
        title: Set(title.to_string()),
        author: Set("Test Author".to_string()),
        year: Set(None),
        description: Set(None),
        price: Set(Decimal::from_str(price).unwrap()),
        condition: Set("good".to_string()),
        owner_id: Set(owner_id),
        category_id: Set(None),
        is_available: Set(true),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create book")
}

fn claims_for(user: &user::Model) -> Claims {
    Claims {
        sub: user.username.clone(),
        uid: user.id,
        role: user.role.clone(),
        exp: 0,
    }
}

fn shipping() -> ShippingDetails {
    ShippingDetails {
        full_name: "Jane Reader".to_string(),
        phone: "+1 555 0100".to_string(),
        address: "1 Library Lane".to_string(),
        email: Some("jane@example.com".to_string()),
        comment: None,
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn book_by_id(db: &DatabaseConnection, id: i32) -> book::Model {
    book::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("book should exist")
}

async fn order_by_id(db: &DatabaseConnection, id: i32) -> order::Model {
    order::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("order should exist")
}

#[tokio::test]
async fn checkout_snapshots_prices_and_flips_availability() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let b = create_test_book(&db, seller.id, "Book B", "7.50").await;
    let claims = claims_for(&buyer);

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    cart_service::add_to_cart(&db, &carts, buyer.id, b.id)
        .await
        .unwrap();

    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .expect("checkout should succeed");

    assert_eq!(placed.total, dec("12.50"));
    assert_eq!(placed.status, "new");
    assert_eq!(placed.user_id, buyer.id);

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let mut prices: Vec<Decimal> = items.iter().map(|i| i.price_at_time).collect();
    prices.sort();
    assert_eq!(prices, vec![dec("5.00"), dec("7.50")]);
    assert!(items.iter().all(|i| i.quantity == 1));

    assert!(!book_by_id(&db, a.id).await.is_available);
    assert!(!book_by_id(&db, b.id).await.is_available);

    // Cart emptied only after the order is durable
    assert_eq!(carts.count(buyer.id), 0);
}

#[tokio::test]
async fn checkout_with_blank_shipping_mutates_nothing() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let claims = claims_for(&buyer);

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();

    let incomplete = ShippingDetails {
        address: "   ".to_string(),
        ..shipping()
    };

    let result = order_service::checkout(&db, &carts, &claims, incomplete).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    // No order, no items, availability untouched, cart intact
    assert_eq!(order::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(order_item::Entity::find().count(&db).await.unwrap(), 0);
    assert!(book_by_id(&db, a.id).await.is_available);
    assert_eq!(carts.ids(buyer.id), vec![a.id]);
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let buyer = create_test_user(&db, "buyer", "user").await;
    let claims = claims_for(&buyer);

    let result = order_service::checkout(&db, &carts, &claims, shipping()).await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert_eq!(order::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn checkout_rechecks_availability() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let first = create_test_user(&db, "first", "user").await;
    let second = create_test_user(&db, "second", "user").await;
    let a = create_test_book(&db, seller.id, "Contested Book", "9.99").await;

    cart_service::add_to_cart(&db, &carts, first.id, a.id)
        .await
        .unwrap();
    cart_service::add_to_cart(&db, &carts, second.id, a.id)
        .await
        .unwrap();

    order_service::checkout(&db, &carts, &claims_for(&first), shipping())
        .await
        .expect("first checkout should succeed");

    // The same book went unavailable between add-to-cart and checkout
    let result = order_service::checkout(&db, &carts, &claims_for(&second), shipping()).await;
    assert!(matches!(result, Err(ServiceError::InvalidState(_))));

    assert_eq!(order::Entity::find().count(&db).await.unwrap(), 1);
    assert_eq!(carts.ids(second.id), vec![a.id]);
}

#[tokio::test]
async fn cancel_restocks_and_is_idempotent() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let b = create_test_book(&db, seller.id, "Book B", "7.50").await;
    let claims = claims_for(&buyer);

    for id in [a.id, b.id] {
        cart_service::add_to_cart(&db, &carts, buyer.id, id)
            .await
            .unwrap();
    }
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    let outcome = order_service::cancel_order(&db, &claims, placed.id)
        .await
        .unwrap();
    let cancelled = match outcome {
        CancelOutcome::Cancelled(o) => o,
        other => panic!("expected a fresh cancellation, got {:?}", other),
    };
    assert_eq!(cancelled.status, "cancelled");
    assert!(book_by_id(&db, a.id).await.is_available);
    assert!(book_by_id(&db, b.id).await.is_available);

    // Cancelling again changes nothing and only warns
    let again = order_service::cancel_order(&db, &claims, placed.id)
        .await
        .unwrap();
    assert!(matches!(again, CancelOutcome::AlreadyTerminal(_)));
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn deleting_the_sole_item_cancels_the_order() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Only Book", "5.00").await;
    let claims = claims_for(&buyer);

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    let item = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();

    let updated = order_service::delete_order_item(&db, &claims, placed.id, item.id)
        .await
        .unwrap();

    assert_eq!(updated.status, "cancelled");
    assert_eq!(updated.total, Decimal::ZERO);
    assert!(book_by_id(&db, a.id).await.is_available);
}

#[tokio::test]
async fn deleting_one_of_two_items_keeps_the_order_active() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let b = create_test_book(&db, seller.id, "Book B", "7.50").await;
    let claims = claims_for(&buyer);

    for id in [a.id, b.id] {
        cart_service::add_to_cart(&db, &carts, buyer.id, id)
            .await
            .unwrap();
    }
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    let item_a = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .filter(order_item::Column::BookId.eq(a.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();

    let updated = order_service::delete_order_item(&db, &claims, placed.id, item_a.id)
        .await
        .unwrap();

    assert_eq!(updated.status, "new");
    assert_eq!(updated.total, dec("7.50"));
    assert!(book_by_id(&db, a.id).await.is_available);
    assert!(!book_by_id(&db, b.id).await.is_available);
}

#[tokio::test]
async fn edit_shrinks_items_restocks_and_recalculates() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Kept Book", "5.00").await;
    let b = create_test_book(&db, seller.id, "Dropped Book", "7.50").await;
    let claims = claims_for(&buyer);

    for id in [a.id, b.id] {
        cart_service::add_to_cart(&db, &carts, buyer.id, id)
            .await
            .unwrap();
    }
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    let new_shipping = ShippingDetails {
        full_name: "Jane Q. Reader".to_string(),
        phone: "+1 555 0199".to_string(),
        address: "2 Archive Road".to_string(),
        email: None,
        comment: Some("leave at the door".to_string()),
    };

    let updated =
        order_service::edit_order(&db, &claims, placed.id, new_shipping, vec![a.id])
            .await
            .unwrap();

    assert_eq!(updated.full_name, "Jane Q. Reader");
    assert_eq!(updated.total, dec("5.00"));
    assert_eq!(updated.email, None);

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].book_id, Some(a.id));

    assert!(book_by_id(&db, b.id).await.is_available);
    assert!(!book_by_id(&db, a.id).await.is_available);
}

#[tokio::test]
async fn terminal_orders_refuse_structural_edits() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let admin = create_test_user(&db, "boss", "admin").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let claims = claims_for(&buyer);

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    order_service::set_order_status(&db, &claims_for(&admin), placed.id, "completed")
        .await
        .unwrap();

    let edit = order_service::edit_order(&db, &claims, placed.id, shipping(), vec![a.id]).await;
    assert!(matches!(edit, Err(ServiceError::InvalidState(_))));

    let item = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let delete = order_service::delete_order_item(&db, &claims, placed.id, item.id).await;
    assert!(matches!(delete, Err(ServiceError::InvalidState(_))));
}

#[tokio::test]
async fn delete_order_restocks_everything() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let b = create_test_book(&db, seller.id, "Book B", "7.50").await;
    let claims = claims_for(&buyer);

    for id in [a.id, b.id] {
        cart_service::add_to_cart(&db, &carts, buyer.id, id)
            .await
            .unwrap();
    }
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    order_service::delete_order(&db, &claims, placed.id)
        .await
        .unwrap();

    assert!(order::Entity::find_by_id(placed.id)
        .one(&db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(order_item::Entity::find().count(&db).await.unwrap(), 0);
    assert!(book_by_id(&db, a.id).await.is_available);
    assert!(book_by_id(&db, b.id).await.is_available);
}

#[tokio::test]
async fn price_snapshot_survives_later_price_edits() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let claims = claims_for(&buyer);

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    let placed = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    // Seller raises the live price afterwards
    let mut active: book::ActiveModel = book_by_id(&db, a.id).await.into();
    active.price = Set(dec("99.99"));
    active.update(&db).await.unwrap();

    let total = order_service::recalc_order_total(&db, placed.id)
        .await
        .unwrap();
    assert_eq!(total, dec("5.00"));
    assert_eq!(order_by_id(&db, placed.id).await.total, dec("5.00"));
}

#[tokio::test]
async fn lifecycle_operations_are_owner_or_admin_gated() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let stranger = create_test_user(&db, "stranger", "user").await;
    let admin = create_test_user(&db, "boss", "admin").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    let placed = order_service::checkout(&db, &carts, &claims_for(&buyer), shipping())
        .await
        .unwrap();

    let cancel = order_service::cancel_order(&db, &claims_for(&stranger), placed.id).await;
    assert!(matches!(cancel, Err(ServiceError::Forbidden)));

    let delete = order_service::delete_order(&db, &claims_for(&stranger), placed.id).await;
    assert!(matches!(delete, Err(ServiceError::Forbidden)));

    // An admin passes the same guard
    let outcome = order_service::cancel_order(&db, &claims_for(&admin), placed.id)
        .await
        .unwrap();
    assert!(matches!(outcome, CancelOutcome::Cancelled(_)));
}

#[tokio::test]
async fn admin_status_transition_accepts_only_enumerated_values() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let admin = create_test_user(&db, "boss", "admin").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    let placed = order_service::checkout(&db, &carts, &claims_for(&buyer), shipping())
        .await
        .unwrap();

    let bad = order_service::set_order_status(&db, &claims_for(&admin), placed.id, "shipped").await;
    assert!(matches!(bad, Err(ServiceError::Validation(_))));

    let not_admin =
        order_service::set_order_status(&db, &claims_for(&buyer), placed.id, "processing").await;
    assert!(matches!(not_admin, Err(ServiceError::Forbidden)));

    // Admins bypass the lifecycle guards entirely
    for status in ["processing", "completed", "cancelled", "new"] {
        let updated =
            order_service::set_order_status(&db, &claims_for(&admin), placed.id, status)
                .await
                .unwrap();
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn cancelled_orders_are_hidden_from_the_history() {
    let db = setup_test_db().await;
    let carts = CartStore::default();
    let seller = create_test_user(&db, "seller", "user").await;
    let buyer = create_test_user(&db, "buyer", "user").await;
    let a = create_test_book(&db, seller.id, "Book A", "5.00").await;
    let b = create_test_book(&db, seller.id, "Book B", "7.50").await;
    let claims = claims_for(&buyer);

    cart_service::add_to_cart(&db, &carts, buyer.id, a.id)
        .await
        .unwrap();
    let first = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    cart_service::add_to_cart(&db, &carts, buyer.id, b.id)
        .await
        .unwrap();
    let second = order_service::checkout(&db, &carts, &claims, shipping())
        .await
        .unwrap();

    order_service::cancel_order(&db, &claims, first.id)
        .await
        .unwrap();

    let history = order_service::list_orders(&db, &claims).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order.id, second.id);
    assert_eq!(history[0].items.len(), 1);
    assert_eq!(history[0].items[0].book_title.as_deref(), Some("Book B"));
}
