//! Services Layer
//!
//! Pure business logic extracted from HTTP handlers. Everything here takes
//! an explicit database connection (and, for the cart, an explicit store)
//! so the workflows stay deterministic under test.

pub mod book_service;
pub mod cart_service;
pub mod catalog_service;
pub mod order_service;

pub use cart_service::CartStore;
