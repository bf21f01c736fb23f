//! Domain layer for the bookstore.
//!
//! This crate wraps a [`store::BookstoreStore`] backend with:
//! - [`CatalogService`] for book management and search
//! - [`ReservationCoordinator`] for moving stock in and out of carts
//!
//! Both services bound every store call by a timeout, retry conflicting
//! transactions a few times, and translate store failures into
//! [`DomainError`].

pub mod catalog;
pub mod config;
pub mod error;
mod execution;
pub mod reservation;

pub use catalog::CatalogService;
pub use config::CoordinatorConfig;
pub use error::DomainError;
pub use reservation::{ReservationCoordinator, parse_removal};
