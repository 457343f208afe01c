use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{ensure_admin, Claims};
use crate::models::book::{self, Entity as Book};
use crate::models::user::{self, Entity as User, USER_STATUSES};
use crate::services::order_service;

/// GET /api/admin/dashboard - every user, listing and order
pub async fn dashboard(State(db): State<DatabaseConnection>, claims: Claims) -> impl IntoResponse {
    if ensure_admin(&claims).is_err() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden" })),
        )
            .into_response();
    }

    let users = User::find().order_by_asc(user::Column::Id).all(&db).await;
    let books = Book::find()
        .order_by_desc(book::Column::CreatedAt)
        .all(&db)
        .await;
    let orders = order_service::list_all_orders(&db).await;

    match (users, books, orders) {
        (Ok(users), Ok(books), Ok(orders)) => (
            StatusCode::OK,
            Json(json!({
                "users": users,
                "books": books,
                "orders": orders
            })),
        )
            .into_response(),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to load dashboard data" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: String,
}

/// POST /api/admin/users/:id/status - one of 'active', 'banned', 'pending'
pub async fn set_user_status(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> impl IntoResponse {
    if ensure_admin(&claims).is_err() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden" })),
        )
            .into_response();
    }

    if !USER_STATUSES.contains(&payload.status.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Unknown user status '{}'", payload.status) })),
        )
            .into_response();
    }

    let user = match User::find_by_id(id).one(&db).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "User not found" })),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let mut active: user::ActiveModel = user.into();
    active.status = Set(payload.status);

    match active.update(&db).await {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({
                "message": "User status updated",
                "user": user
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// POST /api/admin/orders/:id/status - any enumerated status, no
/// transition-graph enforcement
pub async fn set_order_status(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> impl IntoResponse {
    match order_service::set_order_status(&db, &claims, id, &payload.status).await {
        Ok(order) => (
            StatusCode::OK,
            Json(json!({
                "message": "Order status updated",
                "order": order
            })),
        )
            .into_response(),
        Err(order_service::ServiceError::Forbidden) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden" })),
        )
            .into_response(),
        Err(order_service::ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        )
            .into_response(),
        Err(order_service::ServiceError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}
