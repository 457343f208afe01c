pub mod admin;
pub mod auth;
pub mod books;
pub mod cart;
pub mod health;
pub mod orders;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Catalog & books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/my", get(books::my_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/cover", post(books::upload_cover))
        .route("/categories", get(books::list_categories))
        // Cart & checkout
        .route("/cart", get(cart::view_cart))
        .route("/cart/add/:book_id", post(cart::add_to_cart))
        .route("/cart/remove/:book_id", post(cart::remove_from_cart))
        .route("/cart/checkout", post(cart::checkout))
        // Orders
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/edit", post(orders::edit_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route(
            "/orders/:id/items/:item_id/delete",
            post(orders::delete_order_item),
        )
        .route("/orders/:id/delete", post(orders::delete_order))
        // Admin
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users/:id/status", post(admin::set_user_status))
        .route("/admin/orders/:id/status", post(admin::set_order_status))
        .with_state(state)
}
