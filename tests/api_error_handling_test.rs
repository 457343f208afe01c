use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bookstall::api;
use bookstall::auth;
use bookstall::db;
use bookstall::models::{order, user};
use bookstall::state::AppState;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tower::util::ServiceExt; // for `oneshot`

// Helper to create a test app state
async fn setup_test_state() -> AppState {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    AppState::new(db, "static/uploads")
}

fn test_app(state: AppState) -> Router {
    api::api_router(state)
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

async fn create_test_order(db: &DatabaseConnection, user_id: i32) -> order::Model {
    order::ActiveModel {
        user_id: Set(user_id),
        creation_date: Set(chrono::Utc::now().to_rfc3339()),
        total: Set(Decimal::ZERO),
        status: Set("new".to_string()),
        full_name: Set("Owner Person".to_string()),
        phone: Set("+1 555 0100".to_string()),
        address: Set("1 Library Lane".to_string()),
        email: Set(None),
        comment: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create order")
}

fn token_for(user: &user::Model) -> String {
    auth::create_jwt(user.id, &user.username, &user.role).expect("Failed to create token")
}

#[tokio::test]
async fn catalog_is_public() {
    let state = setup_test_state().await;
    let app = test_app(state);

    let req = Request::builder()
        .uri("/books")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let state = setup_test_state().await;
    let app = test_app(state);

    let req = Request::builder()
        .uri("/orders")
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_plain_users() {
    let state = setup_test_state().await;
    let user = create_test_user(state.db(), "plain", "user").await;
    let token = token_for(&user);
    let app = test_app(state);

    let req = Request::builder()
        .uri("/admin/dashboard")
        .method("GET")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_order_status_is_a_bad_request() {
    let state = setup_test_state().await;
    let admin = create_test_user(state.db(), "boss", "admin").await;
    let token = token_for(&admin);
    let app = test_app(state);

    let payload = serde_json::json!({ "status": "shipped" });
    let req = Request::builder()
        .uri("/admin/orders/999/status")
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let state = setup_test_state().await;
    let admin = create_test_user(state.db(), "boss", "admin").await;
    let token = token_for(&admin);
    let app = test_app(state);

    let payload = serde_json::json!({ "status": "processing" });
    let req = Request::builder()
        .uri("/admin/orders/999/status")
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strangers_cannot_cancel_someone_elses_order() {
    let state = setup_test_state().await;
    let owner = create_test_user(state.db(), "owner", "user").await;
    let stranger = create_test_user(state.db(), "stranger", "user").await;
    let placed = create_test_order(state.db(), owner.id).await;
    let token = token_for(&stranger);
    let app = test_app(state);

    let req = Request::builder()
        .uri(format!("/orders/{}/cancel", placed.id))
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn checkout_with_an_empty_cart_is_rejected() {
    let state = setup_test_state().await;
    let buyer = create_test_user(state.db(), "buyer", "user").await;
    let token = token_for(&buyer);
    let app = test_app(state);

    let payload = serde_json::json!({
        "full_name": "Jane Reader",
        "phone": "+1 555 0100",
        "address": "1 Library Lane"
    });
    let req = Request::builder()
        .uri("/cart/checkout")
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_user_status_is_a_bad_request() {
    let state = setup_test_state().await;
    let admin = create_test_user(state.db(), "boss", "admin").await;
    let target = create_test_user(state.db(), "target", "user").await;
    let token = token_for(&admin);
    let app = test_app(state);

    let payload = serde_json::json!({ "status": "suspended" });
    let req = Request::builder()
        .uri(format!("/admin/users/{}/status", target.id))
        .method("POST")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn banned_users_cannot_log_in() {
    let state = setup_test_state().await;

    let password_hash = auth::hash_password("secret").unwrap();
    user::ActiveModel {
        username: Set("banned_user".to_string()),
        email: Set("banned@example.com".to_string()),
        password_hash: Set(password_hash),
        registration_date: Set(chrono::Utc::now().to_rfc3339()),
        status: Set("banned".to_string()),
        role: Set("user".to_string()),
        ..Default::default()
    }
    .insert(state.db())
    .await
    .expect("Failed to create user");

    let app = test_app(state);

    let payload = serde_json::json!({
        "username": "banned_user",
        "password": "secret"
    });
    let req = Request::builder()
        .uri("/auth/login")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
