//! Application state shared across all handlers

use sea_orm::DatabaseConnection;

use crate::services::cart_service::CartStore;

#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    /// In-process session carts, keyed by user id. Explicit state: handlers
    /// look a cart up and hand it to the services, nothing is ambient.
    pub carts: CartStore,
    pub upload_dir: String,
}

impl AppState {
    pub fn new(db: DatabaseConnection, upload_dir: impl Into<String>) -> Self {
        Self {
            db,
            carts: CartStore::default(),
            upload_dir: upload_dir.into(),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl AsRef<DatabaseConnection> for AppState {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Allow handlers that only need the database to extract it directly
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<AppState> for CartStore {
    fn from_ref(state: &AppState) -> Self {
        state.carts.clone()
    }
}
