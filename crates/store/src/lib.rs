//! Catalog and cart storage for the bookstore.
//!
//! Both backends implement [`CatalogStore`] and [`CartStore`] and keep
//! `stock + reserved units` constant for every book across each stock
//! transition.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{BookId, CartId, LineId, Quantity, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{Book, BookDraft, Cart, CartLine, Removal, StockRelease};
pub use postgres::PostgresStore;
pub use query::{BookQuery, SortKey, UnknownSortKey};
pub use store::{BookstoreStore, CartStore, CatalogStore, DeleteMode};
