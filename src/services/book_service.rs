//! Book Service - listing creation, editing, covers, deletion
//!
//! Availability is never touched here: it only flips through checkout and
//! the order lifecycle.

use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::str::FromStr;

use crate::auth::{ensure_owner_or_admin, Claims};
use crate::models::book::{self, Entity as Book, CONDITIONS};
use crate::models::category::{self, Entity as Category};
use crate::models::order::{self, OrderStatus};
use crate::models::order_item::{self, Entity as OrderItem};

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

/// Payload for creating or editing a listing. The price arrives as a raw
/// string so comma decimals can be accepted and junk rejected with a
/// message instead of a deserialization error.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BookForm {
    pub title: String,
    pub author: String,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub price: String,
    pub condition: Option<String>,
    pub category_id: Option<i32>,
    pub new_category: Option<String>,
}

fn validate_form(form: &BookForm) -> Result<(String, String, Decimal, String), ServiceError> {
    let title = form.title.trim().to_owned();
    let author = form.author.trim().to_owned();
    if title.is_empty() || author.is_empty() {
        return Err(ServiceError::Validation(
            "Title and author are required".to_owned(),
        ));
    }

    let price = Decimal::from_str(form.price.trim().replace(',', ".").as_str())
        .map_err(|_| ServiceError::Validation("Invalid price value".to_owned()))?
        .round_dp(2);

    let condition = form
        .condition
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("good")
        .to_owned();
    if !CONDITIONS.contains(&condition.as_str()) {
        return Err(ServiceError::Validation(format!(
            "Unknown condition '{}'",
            condition
        )));
    }

    Ok((title, author, price, condition))
}

fn normalize_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Resolve the category for a listing: an explicit id wins unless the user
/// typed a new name, in which case the category is created lazily
/// (case-insensitively unique).
async fn resolve_category<C: ConnectionTrait>(
    conn: &C,
    category_id: Option<i32>,
    new_category: Option<&str>,
) -> Result<Option<i32>, ServiceError> {
    if let Some(name) = new_category.map(str::trim)
        && !name.is_empty()
    {
        let existing = Category::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(category::Column::Name)))
                    .eq(name.to_lowercase()),
            )
            .one(conn)
            .await?;

        let id = match existing {
            Some(cat) => cat.id,
            None => {
                let cat = category::ActiveModel {
                    name: Set(name.to_owned()),
                    ..Default::default()
                }
                .insert(conn)
                .await?;
                tracing::info!("Created category '{}'", cat.name);
                cat.id
            }
        };
        return Ok(Some(id));
    }

    match category_id {
        Some(id) => Ok(Category::find_by_id(id).one(conn).await?.map(|c| c.id)),
        None => Ok(None),
    }
}

/// Create a new listing owned by the caller.
pub async fn create_book(
    db: &DatabaseConnection,
    claims: &Claims,
    form: BookForm,
) -> Result<book::Model, ServiceError> {
    let (title, author, price, condition) = validate_form(&form)?;
    let category_id = resolve_category(db, form.category_id, form.new_category.as_deref()).await?;

    let now = chrono::Utc::now().to_rfc3339();
    let model = book::ActiveModel {
        title: Set(title),
        author: Set(author),
        year: Set(form.year),
        description: Set(normalize_opt(form.description)),
        price: Set(price),
        condition: Set(condition),
        owner_id: Set(claims.uid),
        category_id: Set(category_id),
        is_available: Set(true),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(model)
}

/// Update a listing's details. Availability is left alone.
pub async fn update_book(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    form: BookForm,
) -> Result<book::Model, ServiceError> {
    let model = Book::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    ensure_owner_or_admin(claims, model.owner_id).map_err(|_| ServiceError::Forbidden)?;

    let (title, author, price, condition) = validate_form(&form)?;
    let category_id = resolve_category(db, form.category_id, form.new_category.as_deref()).await?;

    let mut active: book::ActiveModel = model.into();
    active.title = Set(title);
    active.author = Set(author);
    active.year = Set(form.year);
    active.description = Set(normalize_opt(form.description));
    active.price = Set(price);
    active.condition = Set(condition);
    active.category_id = Set(category_id);

    let model = active.update(db).await?;
    Ok(model)
}

pub async fn get_book(db: &DatabaseConnection, id: i32) -> Result<book::Model, ServiceError> {
    Book::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)
}

/// The caller's own listings, newest first.
pub async fn list_my_books(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<Vec<book::Model>, ServiceError> {
    let books = Book::find()
        .filter(book::Column::OwnerId.eq(claims.uid))
        .order_by_desc(book::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(books)
}

/// Cover uploads accept a small allow-list of image extensions.
pub fn allowed_cover_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => matches!(
            ext.to_ascii_lowercase().as_str(),
            "png" | "jpg" | "jpeg" | "gif"
        ),
        _ => false,
    }
}

/// Store an uploaded cover under the upload dir and attach it to the book.
pub async fn save_cover(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    file_name: &str,
    data: &[u8],
    upload_dir: &str,
) -> Result<book::Model, ServiceError> {
    let model = Book::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    ensure_owner_or_admin(claims, model.owner_id).map_err(|_| ServiceError::Forbidden)?;

    if !allowed_cover_file(file_name) {
        return Err(ServiceError::Validation(
            "Unsupported file type; expected png, jpg, jpeg or gif".to_owned(),
        ));
    }
    let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("jpg");
    let stored = format!("{}.{}", uuid::Uuid::new_v4(), ext.to_ascii_lowercase());

    std::fs::create_dir_all(upload_dir)
        .map_err(|e| ServiceError::Database(format!("Failed to create upload dir: {}", e)))?;
    std::fs::write(std::path::Path::new(upload_dir).join(&stored), data)
        .map_err(|e| ServiceError::Database(format!("Failed to save cover: {}", e)))?;

    let mut active: book::ActiveModel = model.into();
    active.cover = Set(Some(stored));
    let model = active.update(db).await?;
    Ok(model)
}

/// Delete a listing. Blocked while any non-cancelled order still references
/// the book; items of cancelled orders keep their price snapshot and lose
/// only the book reference.
pub async fn delete_book(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<(), ServiceError> {
    let model = Book::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    ensure_owner_or_admin(claims, model.owner_id).map_err(|_| ServiceError::Forbidden)?;

    let references = OrderItem::find()
        .filter(order_item::Column::BookId.eq(id))
        .find_also_related(order::Entity)
        .all(db)
        .await?;

    let actively_referenced = references.iter().any(|(_, order)| {
        order
            .as_ref()
            .and_then(|o| OrderStatus::parse(&o.status))
            .is_some_and(|s| !s.is_terminal())
    });
    if actively_referenced {
        return Err(ServiceError::InvalidState(
            "Book is part of an active order".to_owned(),
        ));
    }

    let txn = db.begin().await?;

    // Detach historical items, then remove the listing
    OrderItem::update_many()
        .col_expr(order_item::Column::BookId, Expr::value(None::<i32>))
        .filter(order_item::Column::BookId.eq(id))
        .exec(&txn)
        .await?;

    Book::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}
