//! Cart Store - per-user session carts and the guards around mutating them
//!
//! A cart is an ordered set of book ids with no database row behind it. The
//! store is handed to handlers through AppState and passed into these
//! functions explicitly; nothing reads ambient session state.

use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::book::{self, Entity as Book};

/// Error type for service operations
#[derive(Debug)]
pub enum ServiceError {
    Database(String),
    NotFound,
    /// The book was bought by someone else while it sat in the catalog.
    Unavailable(String),
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Database(e.to_string())
    }
}

/// All live carts, keyed by user id. Carts last as long as the process.
#[derive(Clone, Default)]
pub struct CartStore {
    carts: Arc<DashMap<i32, Vec<i32>>>,
}

impl CartStore {
    /// Returns false when the book was already in the cart (duplicates are
    /// forbidden, adding twice is a no-op).
    pub fn add(&self, user_id: i32, book_id: i32) -> bool {
        let mut cart = self.carts.entry(user_id).or_default();
        if cart.contains(&book_id) {
            false
        } else {
            cart.push(book_id);
            true
        }
    }

    pub fn remove(&self, user_id: i32, book_id: i32) {
        if let Some(mut cart) = self.carts.get_mut(&user_id) {
            cart.retain(|id| *id != book_id);
        }
    }

    pub fn clear(&self, user_id: i32) {
        self.carts.remove(&user_id);
    }

    /// Book ids in insertion order.
    pub fn ids(&self, user_id: i32) -> Vec<i32> {
        self.carts
            .get(&user_id)
            .map(|cart| cart.value().clone())
            .unwrap_or_default()
    }

    /// Number of distinct books in the cart (UI badge).
    pub fn count(&self, user_id: i32) -> usize {
        self.carts.get(&user_id).map(|cart| cart.len()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyInCart,
}

/// Put a book into the user's cart. Unavailable books are rejected with no
/// state change so the caller can surface a warning.
pub async fn add_to_cart(
    db: &DatabaseConnection,
    carts: &CartStore,
    user_id: i32,
    book_id: i32,
) -> Result<AddOutcome, ServiceError> {
    let book = Book::find_by_id(book_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if !book.is_available {
        tracing::info!("Rejected cart add for unavailable book {}", book.id);
        return Err(ServiceError::Unavailable(book.title));
    }

    if carts.add(user_id, book_id) {
        Ok(AddOutcome::Added)
    } else {
        Ok(AddOutcome::AlreadyInCart)
    }
}

/// The cart's books plus a live-price subtotal. The subtotal is display
/// only; order totals are snapshotted at checkout instead.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartView {
    pub books: Vec<book::Model>,
    pub subtotal: Decimal,
    pub count: usize,
}

pub async fn view_cart(
    db: &DatabaseConnection,
    carts: &CartStore,
    user_id: i32,
) -> Result<CartView, ServiceError> {
    let ids = carts.ids(user_id);

    let mut by_id: HashMap<i32, book::Model> = if ids.is_empty() {
        HashMap::new()
    } else {
        Book::find()
            .filter(book::Column::Id.is_in(ids.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect()
    };

    // Preserve cart insertion order
    let books: Vec<book::Model> = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    let subtotal = books
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc + b.price)
        .round_dp(2);
    let count = books.len();

    Ok(CartView {
        books,
        subtotal,
        count,
    })
}
