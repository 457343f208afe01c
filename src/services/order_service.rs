//! Order Service - checkout, total recalculation and the order lifecycle
//!
//! Every mutation runs inside one transaction: an operation either commits
//! all of its writes (order row, items, availability flips) or none.

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::auth::{ensure_admin, ensure_owner_or_admin, Claims};
use crate::models::book::{self, Entity as Book};
use crate::models::order::{self, Entity as Order, OrderStatus};
use crate::models::order_item::{self, Entity as OrderItem};
use crate::services::cart_service::CartStore;

/// Error type for service operations
#[derive(Debug)]
pub enum ServiceError {
    Database(String),
    NotFound,
    Forbidden,
    Validation(String),
    InvalidState(String),
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Database(e.to_string())
    }
}

/// Shipping details collected at checkout and on order edits.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ShippingDetails {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
    pub comment: Option<String>,
}

impl ShippingDetails {
    /// Trim everything; full name, phone and address are required, blank
    /// optionals collapse to None.
    fn validated(self) -> Result<Self, ServiceError> {
        let full_name = self.full_name.trim().to_owned();
        let phone = self.phone.trim().to_owned();
        let address = self.address.trim().to_owned();

        if full_name.is_empty() || phone.is_empty() || address.is_empty() {
            return Err(ServiceError::Validation(
                "Full name, phone and address are required".to_owned(),
            ));
        }

        Ok(Self {
            full_name,
            phone,
            address,
            email: self
                .email
                .map(|e| e.trim().to_owned())
                .filter(|e| !e.is_empty()),
            comment: self
                .comment
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty()),
        })
    }
}

/// Recompute and store an order's total from its current items: the sum of
/// price_at_time * quantity, zero when empty, two fraction digits. Must run
/// after every structural change to the item set.
pub async fn recalc_order_total<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> Result<Decimal, ServiceError> {
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(conn)
        .await?;

    let total = items
        .iter()
        .fold(Decimal::ZERO, |acc, item| {
            acc + item.price_at_time * Decimal::from(item.quantity)
        })
        .round_dp(2);

    Order::update_many()
        .col_expr(order::Column::Total, Expr::value(total))
        .filter(order::Column::Id.eq(order_id))
        .exec(conn)
        .await?;

    Ok(total)
}

async fn restock<C: ConnectionTrait>(conn: &C, book_id: i32) -> Result<(), ServiceError> {
    Book::update_many()
        .col_expr(book::Column::IsAvailable, Expr::value(true))
        .filter(book::Column::Id.eq(book_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Convert the user's cart into an order.
///
/// Re-fetches every cart book, re-checks availability (a book bought by
/// someone else between add-to-cart and checkout fails the whole
/// operation), snapshots prices into items, flips availability and clears
/// the cart - all or nothing.
pub async fn checkout(
    db: &DatabaseConnection,
    carts: &CartStore,
    claims: &Claims,
    shipping: ShippingDetails,
) -> Result<order::Model, ServiceError> {
    let shipping = shipping.validated()?;

    let cart_ids = carts.ids(claims.uid);
    if cart_ids.is_empty() {
        return Err(ServiceError::Validation("Cart is empty".to_owned()));
    }

    let books = Book::find()
        .filter(book::Column::Id.is_in(cart_ids.clone()))
        .all(db)
        .await?;
    if books.len() != cart_ids.len() {
        return Err(ServiceError::NotFound);
    }
    if let Some(gone) = books.iter().find(|b| !b.is_available) {
        return Err(ServiceError::InvalidState(format!(
            "\"{}\" is no longer available",
            gone.title
        )));
    }

    let total = books
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc + b.price)
        .round_dp(2);

    let txn = db.begin().await?;

    let saved = order::ActiveModel {
        user_id: Set(claims.uid),
        creation_date: Set(chrono::Utc::now().to_rfc3339()),
        total: Set(total),
        status: Set(OrderStatus::New.as_str().to_owned()),
        full_name: Set(shipping.full_name),
        phone: Set(shipping.phone),
        address: Set(shipping.address),
        email: Set(shipping.email),
        comment: Set(shipping.comment),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for b in &books {
        order_item::ActiveModel {
            order_id: Set(saved.id),
            book_id: Set(Some(b.id)),
            price_at_time: Set(b.price),
            quantity: Set(1),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut active: book::ActiveModel = b.clone().into();
        active.is_available = Set(false);
        active.update(&txn).await?;
    }

    txn.commit().await?;

    // Only empty the cart once the order is durable
    carts.clear(claims.uid);

    tracing::info!(
        "Order {} placed by user {} ({} items, total {})",
        saved.id,
        claims.uid,
        books.len(),
        saved.total
    );

    Ok(saved)
}

async fn find_authorized(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
) -> Result<order::Model, ServiceError> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    ensure_owner_or_admin(claims, order.user_id).map_err(|_| ServiceError::Forbidden)?;
    Ok(order)
}

fn status_of(order: &order::Model) -> OrderStatus {
    // Status strings only ever come from OrderStatus::as_str
    OrderStatus::parse(&order.status).unwrap_or(OrderStatus::New)
}

/// Edit shipping fields and shrink the item set to the kept book ids.
/// Removed items restock their books. Adding items is not supported.
pub async fn edit_order(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
    shipping: ShippingDetails,
    keep_books: Vec<i32>,
) -> Result<order::Model, ServiceError> {
    let order = find_authorized(db, claims, order_id).await?;

    if status_of(&order).is_terminal() {
        return Err(ServiceError::InvalidState(
            "Order can no longer be edited".to_owned(),
        ));
    }

    let shipping = shipping.validated()?;

    let txn = db.begin().await?;

    let items = order.find_related(OrderItem).all(&txn).await?;
    for item in &items {
        if let Some(book_id) = item.book_id
            && !keep_books.contains(&book_id)
        {
            restock(&txn, book_id).await?;
            item.clone().delete(&txn).await?;
        }
    }

    let mut active: order::ActiveModel = order.into();
    active.full_name = Set(shipping.full_name);
    active.phone = Set(shipping.phone);
    active.address = Set(shipping.address);
    active.email = Set(shipping.email);
    active.comment = Set(shipping.comment);
    let updated = active.update(&txn).await?;

    recalc_order_total(&txn, updated.id).await?;

    txn.commit().await?;

    // Re-read so the returned model carries the recalculated total
    Order::find_by_id(updated.id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(order::Model),
    /// The order was already completed or cancelled; nothing changed and
    /// the caller should surface a warning rather than an error.
    AlreadyTerminal(order::Model),
}

/// Cancel an order, restocking every item's book. Idempotent on terminal
/// orders.
pub async fn cancel_order(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
) -> Result<CancelOutcome, ServiceError> {
    let order = find_authorized(db, claims, order_id).await?;

    if status_of(&order).is_terminal() {
        return Ok(CancelOutcome::AlreadyTerminal(order));
    }

    let txn = db.begin().await?;

    let items = order.find_related(OrderItem).all(&txn).await?;
    for item in &items {
        if let Some(book_id) = item.book_id {
            restock(&txn, book_id).await?;
        }
    }

    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_owned());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!("Order {} cancelled, {} books restocked", updated.id, items.len());

    Ok(CancelOutcome::Cancelled(updated))
}

/// Remove a single item: restock its book, recalculate the total, and
/// cancel the order outright if nothing is left in it.
pub async fn delete_order_item(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
    item_id: i32,
) -> Result<order::Model, ServiceError> {
    let order = find_authorized(db, claims, order_id).await?;

    if status_of(&order).is_terminal() {
        return Err(ServiceError::InvalidState(
            "Order can no longer be edited".to_owned(),
        ));
    }

    let item = OrderItem::find()
        .filter(order_item::Column::Id.eq(item_id))
        .filter(order_item::Column::OrderId.eq(order.id))
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let txn = db.begin().await?;

    if let Some(book_id) = item.book_id {
        restock(&txn, book_id).await?;
    }
    item.delete(&txn).await?;

    recalc_order_total(&txn, order.id).await?;

    // An order with zero items cannot remain active
    let remaining = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    if remaining.is_empty() {
        Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Cancelled.as_str()),
            )
            .filter(order::Column::Id.eq(order.id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    Order::find_by_id(order.id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)
}

/// Delete an order entirely: restock its books, drop its items, drop the
/// order.
pub async fn delete_order(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
) -> Result<(), ServiceError> {
    let order = find_authorized(db, claims, order_id).await?;

    let txn = db.begin().await?;

    let items = order.find_related(OrderItem).all(&txn).await?;
    for item in &items {
        if let Some(book_id) = item.book_id {
            restock(&txn, book_id).await?;
        }
    }

    OrderItem::delete_many()
        .filter(order_item::Column::OrderId.eq(order.id))
        .exec(&txn)
        .await?;
    Order::delete_by_id(order.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

/// Admin-only direct status assignment. Any of the enumerated statuses is
/// accepted with no transition-graph enforcement; anything else is
/// rejected.
pub async fn set_order_status(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
    status: &str,
) -> Result<order::Model, ServiceError> {
    ensure_admin(claims).map_err(|_| ServiceError::Forbidden)?;

    let status = OrderStatus::parse(status)
        .ok_or_else(|| ServiceError::Validation(format!("Unknown order status '{}'", status)))?;

    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(status.as_str().to_owned());
    let updated = active.update(db).await?;
    Ok(updated)
}

/// One line of an order as shown to its owner.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderItemView {
    pub id: i32,
    pub book_id: Option<i32>,
    pub book_title: Option<String>,
    pub price_at_time: Decimal,
    pub quantity: i32,
}

/// An order enriched with its items and their book titles.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<OrderItemView>,
}

async fn attach_items(
    db: &DatabaseConnection,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderWithItems>, ServiceError> {
    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();

    let items_with_books = if order_ids.is_empty() {
        Vec::new()
    } else {
        OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .find_also_related(Book)
            .all(db)
            .await?
    };

    let mut by_order: HashMap<i32, Vec<OrderItemView>> = HashMap::new();
    for (item, book) in items_with_books {
        by_order.entry(item.order_id).or_default().push(OrderItemView {
            id: item.id,
            book_id: item.book_id,
            book_title: book.map(|b| b.title),
            price_at_time: item.price_at_time,
            quantity: item.quantity,
        });
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect())
}

/// The caller's order history, cancelled orders excluded, newest first.
pub async fn list_orders(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<Vec<OrderWithItems>, ServiceError> {
    let orders = Order::find()
        .filter(order::Column::UserId.eq(claims.uid))
        .filter(order::Column::Status.ne(OrderStatus::Cancelled.as_str()))
        .order_by_desc(order::Column::CreationDate)
        .all(db)
        .await?;

    attach_items(db, orders).await
}

/// Every order in the system, newest first (admin dashboard).
pub async fn list_all_orders(
    db: &DatabaseConnection,
) -> Result<Vec<OrderWithItems>, ServiceError> {
    let orders = Order::find()
        .order_by_desc(order::Column::CreationDate)
        .all(db)
        .await?;
    attach_items(db, orders).await
}

/// A single order with items, owner-or-admin gated.
pub async fn get_order(
    db: &DatabaseConnection,
    claims: &Claims,
    order_id: i32,
) -> Result<OrderWithItems, ServiceError> {
    let order = find_authorized(db, claims, order_id).await?;
    let mut enriched = attach_items(db, vec![order]).await?;
    Ok(enriched.remove(0))
}
