use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::auth::Claims;
use crate::services::cart_service::{self, AddOutcome, ServiceError};
use crate::services::order_service::{self, ShippingDetails};
use crate::state::AppState;

/// POST /api/cart/add/:book_id
pub async fn add_to_cart(
    State(state): State<AppState>,
    claims: Claims,
    Path(book_id): Path<i32>,
) -> impl IntoResponse {
    match cart_service::add_to_cart(state.db(), &state.carts, claims.uid, book_id).await {
        Ok(AddOutcome::Added) => (
            StatusCode::OK,
            Json(json!({
                "message": "Book added to cart",
                "cart_count": state.carts.count(claims.uid)
            })),
        )
            .into_response(),
        Ok(AddOutcome::AlreadyInCart) => (
            StatusCode::OK,
            Json(json!({
                "message": "Book is already in the cart",
                "cart_count": state.carts.count(claims.uid)
            })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
        )
            .into_response(),
        Err(ServiceError::Unavailable(title)) => (
            StatusCode::CONFLICT,
            Json(json!({
                "warning": format!("\"{}\" has already been bought by another user", title)
            })),
        )
            .into_response(),
        Err(ServiceError::Database(msg)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": msg })),
        )
            .into_response(),
    }
}

/// GET /api/cart - the cart's books and a live-price subtotal
pub async fn view_cart(State(state): State<AppState>, claims: Claims) -> impl IntoResponse {
    match cart_service::view_cart(state.db(), &state.carts, claims.uid).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

/// POST /api/cart/remove/:book_id - no-op when absent
pub async fn remove_from_cart(
    State(state): State<AppState>,
    claims: Claims,
    Path(book_id): Path<i32>,
) -> impl IntoResponse {
    state.carts.remove(claims.uid, book_id);
    (
        StatusCode::OK,
        Json(json!({
            "message": "Book removed from cart",
            "cart_count": state.carts.count(claims.uid)
        })),
    )
}

/// POST /api/cart/checkout - turn the cart into an order
pub async fn checkout(
    State(state): State<AppState>,
    claims: Claims,
    Json(shipping): Json<ShippingDetails>,
) -> impl IntoResponse {
    match order_service::checkout(state.db(), &state.carts, &claims, shipping).await {
        Ok(order) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Order placed!",
                "order": order
            })),
        )
            .into_response(),
        Err(order_service::ServiceError::Validation(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(order_service::ServiceError::InvalidState(msg)) => {
            (StatusCode::CONFLICT, Json(json!({ "warning": msg }))).into_response()
        }
        Err(order_service::ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "A book in the cart no longer exists" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}
