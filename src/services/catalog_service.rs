//! Catalog Filter - the filtered, sorted storefront view
//!
//! Only available books are ever shown. All filters are optional and
//! combine with AND; newest listings come first.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::str::FromStr;

use crate::models::book::{self, Entity as Book};
use crate::models::category::{self, Entity as Category};

/// Error type for service operations
#[derive(Debug)]
pub enum ServiceError {
    Database(String),
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Database(e.to_string())
    }
}

/// Filter parameters for the catalog listing. Price bounds stay raw
/// strings: an unparseable bound is skipped, not an error.
#[derive(Debug, Default, Clone)]
pub struct CatalogFilter {
    pub q: Option<String>,
    pub genre_id: Option<i32>,
    pub author: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

/// Parse a user-supplied price bound. Accepts a comma decimal separator;
/// anything that still fails to parse is ignored by the caller.
pub fn parse_price_bound(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim().replace(',', ".").as_str()).ok()
}

/// List available books matching all supplied filters, newest first.
pub async fn list_catalog(
    db: &DatabaseConnection,
    filter: CatalogFilter,
) -> Result<Vec<book::Model>, ServiceError> {
    let mut query = Book::find().filter(book::Column::IsAvailable.eq(true));

    // Free-text search over title OR author
    if let Some(q) = filter.q.as_deref().map(str::trim)
        && !q.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(book::Column::Title.contains(q))
                .add(book::Column::Author.contains(q)),
        );
    }

    if let Some(genre_id) = filter.genre_id {
        query = query.filter(book::Column::CategoryId.eq(genre_id));
    }

    if let Some(author) = filter.author.as_deref().map(str::trim)
        && !author.is_empty()
    {
        query = query.filter(book::Column::Author.contains(author));
    }

    // Bounds are inclusive; junk input silently skips the bound
    if let Some(raw) = filter.min_price.as_deref()
        && let Some(min) = parse_price_bound(raw)
    {
        query = query.filter(book::Column::Price.gte(min));
    }

    if let Some(raw) = filter.max_price.as_deref()
        && let Some(max) = parse_price_bound(raw)
    {
        query = query.filter(book::Column::Price.lte(max));
    }

    let books = query
        .order_by_desc(book::Column::CreatedAt)
        .all(db)
        .await?;

    tracing::debug!("Catalog query returned {} books", books.len());

    Ok(books)
}

/// Categories sorted by name, for the filter dropdown.
pub async fn list_categories(
    db: &DatabaseConnection,
) -> Result<Vec<category::Model>, ServiceError> {
    let categories = Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_comma_decimals() {
        assert_eq!(parse_price_bound("10.00"), Decimal::from_str("10.00").ok());
        assert_eq!(parse_price_bound("12,50"), Decimal::from_str("12.50").ok());
        assert_eq!(parse_price_bound(" 7 "), Decimal::from_str("7").ok());
    }

    #[test]
    fn junk_bounds_are_none() {
        assert_eq!(parse_price_bound("abc"), None);
        assert_eq!(parse_price_bound("12.3.4"), None);
        assert_eq!(parse_price_bound(""), None);
    }
}
