use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::services::book_service::{self, BookForm, ServiceError};
use crate::services::catalog_service::{self, CatalogFilter};
use crate::state::AppState;

/// Query parameters for the catalog listing
#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
    pub genre_id: Option<i32>,
    pub author: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
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
            (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
        }
        ServiceError::Database(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": msg })),
        )
            .into_response(),
    }
}

/// GET /api/books - filtered catalog of available listings
#[utoipa::path(
    get,
    path = "/api/books",
    responses((status = 200, description = "Available books matching the filters, newest first"))
)]
pub async fn list_books(
    State(db): State<DatabaseConnection>,
    Query(params): Query<CatalogQuery>,
) -> impl IntoResponse {
    let filter = CatalogFilter {
        q: params.q,
        genre_id: params.genre_id,
        author: params.author,
        min_price: params.min_price,
        max_price: params.max_price,
    };

    match catalog_service::list_catalog(&db, filter).await {
        Ok(books) => (
            StatusCode::OK,
            Json(json!({
                "books": books,
                "count": books.len()
            })),
        )
            .into_response(),
        Err(catalog_service::ServiceError::Database(msg)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": msg })),
        )
            .into_response(),
    }
}

/// GET /api/categories - genre list for the filter dropdown
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "All categories, sorted by name"))
)]
pub async fn list_categories(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match catalog_service::list_categories(&db).await {
        Ok(categories) => {
            (StatusCode::OK, Json(json!({ "categories": categories }))).into_response()
        }
        Err(catalog_service::ServiceError::Database(msg)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": msg })),
        )
            .into_response(),
    }
}

/// GET /api/books/:id - one listing, available or not
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    responses(
        (status = 200, description = "The book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match book_service::get_book(&db, id).await {
        Ok(book) => (StatusCode::OK, Json(json!({ "book": book }))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/books/my - the caller's own listings
pub async fn my_books(State(db): State<DatabaseConnection>, claims: Claims) -> impl IntoResponse {
    match book_service::list_my_books(&db, &claims).await {
        Ok(books) => (StatusCode::OK, Json(json!({ "books": books }))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/books - create a listing
pub async fn create_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(form): Json<BookForm>,
) -> impl IntoResponse {
    match book_service::create_book(&db, &claims, form).await {
        Ok(book) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Book saved",
                "book": book
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/books/:id - edit a listing (owner or admin)
pub async fn update_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(form): Json<BookForm>,
) -> impl IntoResponse {
    match book_service::update_book(&db, &claims, id, form).await {
        Ok(book) => (
            StatusCode::OK,
            Json(json!({
                "message": "Book saved",
                "book": book
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/books/:id - remove a listing (owner or admin)
pub async fn delete_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match book_service::delete_book(&db, &claims, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Book deleted" })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/books/:id/cover - multipart cover upload (field "photo")
pub async fn upload_cover(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("photo") {
            let file_name = match field.file_name().map(|f| f.to_owned()) {
                Some(f) => f,
                None => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "Upload is missing a file name" })),
                    )
                        .into_response();
                }
            };

            let data = match field.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": e.to_string() })),
                    )
                        .into_response();
                }
            };

            return match book_service::save_cover(
                state.db(),
                &claims,
                id,
                &file_name,
                &data,
                &state.upload_dir,
            )
            .await
            {
                Ok(book) => (
                    StatusCode::OK,
                    Json(json!({
                        "message": "Cover updated",
                        "book": book
                    })),
                )
                    .into_response(),
                Err(e) => error_response(e),
            };
        }
    }

    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "No photo field in upload" })),
    )
        .into_response()
}
