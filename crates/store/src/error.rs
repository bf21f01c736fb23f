use thiserror::Error;

use crate::{BookId, CartId, LineId, Quantity};

/// SQLSTATE for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur when interacting with the catalog or cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No live book has this ID.
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    /// No live book has this label and author.
    #[error("No book titled {label:?} by {author:?}")]
    TitleNotFound { label: String, author: String },

    /// No cart has this ID.
    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// No cart line has this ID.
    #[error("Cart line not found: {0}")]
    LineNotFound(LineId),

    /// The book does not have enough copies left to satisfy a reservation.
    #[error("Insufficient stock for book {book_id}: requested {requested}, available {available}")]
    InsufficientStock {
        book_id: BookId,
        requested: Quantity,
        available: i64,
    },

    /// A removal asked for more units than the line holds.
    #[error("Cart line {line_id} holds {held} units, cannot remove {requested}")]
    LineQuantityExceeded {
        line_id: LineId,
        requested: Quantity,
        held: Quantity,
    },

    /// A listing or search matched no books.
    #[error("No books matched")]
    EmptyResult,

    /// The backend aborted the transaction because of a concurrent
    /// modification. Nothing was applied; the operation may be retried.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the failure left no effect and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
            )
        {
            tracing::debug!(error = %db_err, "transaction aborted by concurrent writer");
            return StoreError::Conflict(db_err.message().to_string());
        }
        StoreError::Database(e)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_is_a_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_conflict());
    }

    #[test]
    fn insufficient_stock_message_names_the_numbers() {
        let book_id = BookId::new();
        let err = StoreError::InsufficientStock {
            book_id,
            requested: Quantity::new(3).unwrap(),
            available: 1,
        };
        let message = err.to_string();
        assert!(message.contains("requested 3"));
        assert!(message.contains("available 1"));
    }
}
