use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::services::order_service::{self, CancelOutcome, ServiceError, ShippingDetails};

fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        )
            .into_response(),
        ServiceError::Forbidden => (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden" })),
        )
            .into_response(),
        ServiceError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        ServiceError::InvalidState(msg) => {
            (StatusCode::CONFLICT, Json(json!({ "warning": msg }))).into_response()
        }
        ServiceError::Database(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": msg })),
        )
            .into_response(),
    }
}

/// GET /api/orders - the caller's history, cancelled orders hidden
pub async fn list_orders(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> impl IntoResponse {
    match order_service::list_orders(&db, &claims).await {
        Ok(orders) => (
            StatusCode::OK,
            Json(json!({
                "orders": orders,
                "count": orders.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/orders/:id - one order with items (owner or admin)
pub async fn get_order(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match order_service::get_order(&db, &claims, id).await {
        Ok(order) => (StatusCode::OK, Json(json!({ "order": order }))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Body for POST /api/orders/:id/edit. `books` is the explicit set of book
/// ids to keep; items outside it are removed.
#[derive(Debug, Deserialize)]
pub struct OrderEditRequest {
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    #[serde(default)]
    pub books: Vec<i32>,
}

/// POST /api/orders/:id/edit
pub async fn edit_order(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<OrderEditRequest>,
) -> impl IntoResponse {
    match order_service::edit_order(&db, &claims, id, payload.shipping, payload.books).await {
        Ok(order) => (
            StatusCode::OK,
            Json(json!({
                "message": "Order updated",
                "order": order
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/orders/:id/cancel - idempotent on terminal orders
pub async fn cancel_order(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match order_service::cancel_order(&db, &claims, id).await {
        Ok(CancelOutcome::Cancelled(order)) => (
            StatusCode::OK,
            Json(json!({
                "message": "Order cancelled",
                "order": order
            })),
        )
            .into_response(),
        Ok(CancelOutcome::AlreadyTerminal(order)) => (
            StatusCode::OK,
            Json(json!({
                "warning": "This order can no longer be cancelled",
                "order": order
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/orders/:id/items/:item_id/delete - remove one line; an
/// emptied order flips to cancelled
pub async fn delete_order_item(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((id, item_id)): Path<(i32, i32)>,
) -> impl IntoResponse {
    match order_service::delete_order_item(&db, &claims, id, item_id).await {
        Ok(order) => (
            StatusCode::OK,
            Json(json!({
                "message": "Book removed from order",
                "order": order
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/orders/:id/delete
pub async fn delete_order(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match order_service::delete_order(&db, &claims, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Order deleted" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
