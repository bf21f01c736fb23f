use std::str::FromStr;

use async_trait::async_trait;

use crate::{
    Book, BookDraft, BookId, BookQuery, Cart, CartId, CartLine, LineId, Quantity, Removal,
    Result, StockRelease, UserId,
};

/// How `delete_book` removes a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Mark the book deleted and hide it from every read path.
    #[default]
    Soft,
    /// Remove the row, together with any cart lines holding it.
    Hard,
}

impl FromStr for DeleteMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(DeleteMode::Soft),
            "hard" => Ok(DeleteMode::Hard),
            other => Err(format!("unknown delete mode: {other}")),
        }
    }
}

/// Catalog side of the store: book records and their read paths.
///
/// The catalog never changes stock; only [`CartStore`] transitions do.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a new book and returns its assigned ID.
    ///
    /// Books are identified by ID only. Two drafts with the same label and
    /// author produce two books; use [`CatalogStore::find_book`] first to
    /// merge by name.
    async fn create_book(&self, draft: BookDraft) -> Result<BookId>;

    /// Inserts several books atomically: either all are created or none.
    async fn create_books(&self, drafts: Vec<BookDraft>) -> Result<Vec<BookId>>;

    /// Fetches a live book by ID.
    async fn get_book(&self, id: BookId) -> Result<Book>;

    /// Finds the earliest live book with exactly this label and author.
    async fn find_book(&self, label: &str, author: &str) -> Result<Book>;

    /// Lists every live book ordered by ID.
    ///
    /// Fails with `EmptyResult` when there are none.
    async fn list_books(&self) -> Result<Vec<Book>>;

    /// Runs a filtered, sorted catalog query.
    ///
    /// Fails with `EmptyResult` when nothing matches.
    async fn query_books(&self, query: &BookQuery) -> Result<Vec<Book>>;

    /// Deletes a book according to [`CatalogStore::delete_mode`].
    async fn delete_book(&self, id: BookId) -> Result<()>;

    /// The delete policy this store was configured with.
    fn delete_mode(&self) -> DeleteMode;
}

/// Cart side of the store, including the three stock transitions.
///
/// `reserve`, `release` and `release_cart` each execute as one atomic unit
/// against stock and cart lines: no caller can observe stock changed
/// without the matching line change. For any book,
/// `stock + reserved_quantity` is constant across these transitions.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the user's cart, creating it on first use.
    async fn get_or_create_cart(&self, user_id: &UserId) -> Result<Cart>;

    /// Returns the user's cart without creating it.
    async fn find_cart(&self, user_id: &UserId) -> Result<Option<Cart>>;

    /// Lists the cart's lines in the order they were first added.
    async fn get_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>>;

    async fn get_line(&self, line_id: LineId) -> Result<CartLine>;

    /// Moves `quantity` copies from the book's stock into the cart.
    ///
    /// Creates the (cart, book) line or grows the existing one. Fails with
    /// `InsufficientStock` if fewer copies are available, leaving no trace.
    async fn reserve(&self, cart_id: CartId, book_id: BookId, quantity: Quantity)
    -> Result<CartLine>;

    /// Takes units out of a line and returns them to stock, deleting the
    /// line when it empties.
    async fn release(&self, line_id: LineId, removal: Removal) -> Result<StockRelease>;

    /// Deletes every line of the cart, returning each line's quantity to
    /// stock. The cart itself stays.
    async fn release_cart(&self, cart_id: CartId) -> Result<Vec<StockRelease>>;

    /// Sum of line quantities across all carts that hold this book.
    async fn reserved_quantity(&self, book_id: BookId) -> Result<i64>;
}

/// A complete backend: catalog plus carts over the same stock counters.
pub trait BookstoreStore: CatalogStore + CartStore {}

impl<T: CatalogStore + CartStore + ?Sized> BookstoreStore for T {}
