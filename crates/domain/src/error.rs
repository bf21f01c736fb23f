//! Domain error types.

use common::{BookId, CartId, LineId, Quantity, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the catalog service and reservation coordinator.
///
/// Every variant except [`DomainError::Transient`] describes a definite
/// outcome; retrying it without changing the request gives the same answer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    #[error("No book titled {label:?} by {author:?}")]
    TitleNotFound { label: String, author: String },

    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// The user has never reserved anything.
    #[error("User {0} has no cart")]
    NoCart(UserId),

    #[error("Cart line not found: {0}")]
    LineNotFound(LineId),

    #[error("Insufficient stock for book {book_id}: requested {requested}, available {available}")]
    InsufficientStock {
        book_id: BookId,
        requested: Quantity,
        available: i64,
    },

    /// A listing or search matched nothing. The store itself is healthy.
    #[error("No books matched")]
    EmptyResult,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// The store was unreachable, too slow, or kept conflicting. Nothing
    /// was applied and the call may be retried.
    #[error("Temporarily unavailable: {0}")]
    Transient(String),
}

impl DomainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Transient(_))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::BookNotFound(id) => DomainError::BookNotFound(id),
            StoreError::TitleNotFound { label, author } => {
                DomainError::TitleNotFound { label, author }
            }
            StoreError::CartNotFound(id) => DomainError::CartNotFound(id),
            StoreError::LineNotFound(id) => DomainError::LineNotFound(id),
            StoreError::InsufficientStock {
                book_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                book_id,
                requested,
                available,
            },
            e @ StoreError::LineQuantityExceeded { .. } => {
                DomainError::InvalidQuantity(e.to_string())
            }
            StoreError::EmptyResult => DomainError::EmptyResult,
            e @ (StoreError::Conflict(_)
            | StoreError::Database(_)
            | StoreError::Migration(_)) => DomainError::Transient(e.to_string()),
        }
    }
}

impl From<common::InvalidQuantity> for DomainError {
    fn from(e: common::InvalidQuantity) -> Self {
        DomainError::InvalidQuantity(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_become_transient() {
        let err: DomainError = StoreError::Database(sqlx::Error::PoolClosed).into();
        assert!(err.is_transient());

        let err: DomainError = StoreError::Conflict("deadlock".into()).into();
        assert!(err.is_transient());
    }

    #[test]
    fn over_removal_is_invalid_quantity() {
        let err: DomainError = StoreError::LineQuantityExceeded {
            line_id: LineId::new(),
            requested: Quantity::new(3).unwrap(),
            held: Quantity::new(2).unwrap(),
        }
        .into();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn empty_result_stays_distinct() {
        let err: DomainError = StoreError::EmptyResult.into();
        assert!(matches!(err, DomainError::EmptyResult));
        assert!(!err.is_transient());
    }
}
