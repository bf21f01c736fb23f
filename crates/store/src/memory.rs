use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Book, BookDraft, BookId, BookQuery, Cart, CartId, CartLine, LineId, Quantity, Removal,
    Result, StockRelease, StoreError, UserId,
    store::{CartStore, CatalogStore, DeleteMode},
};

#[derive(Debug, Default)]
struct MemoryState {
    books: BTreeMap<BookId, Book>,
    carts: HashMap<CartId, Cart>,
    carts_by_user: HashMap<UserId, CartId>,
    lines: HashMap<LineId, CartLine>,
    line_index: HashMap<(CartId, BookId), LineId>,
}

impl MemoryState {
    fn live_book(&self, id: BookId) -> Option<&Book> {
        self.books.get(&id).filter(|b| !b.deleted)
    }

    fn restock(&mut self, book_id: BookId, units: u32) {
        // The book row may be gone after a hard delete; its lines went with it.
        if let Some(book) = self.books.get_mut(&book_id) {
            book.stock += i64::from(units);
        }
    }

    fn drop_line(&mut self, line_id: LineId) -> Option<CartLine> {
        let line = self.lines.remove(&line_id)?;
        self.line_index.remove(&(line.cart_id, line.book_id));
        Some(line)
    }
}

/// In-memory catalog and cart store.
///
/// Every transition runs under one write lock, which makes it atomic with
/// respect to all other operations. Provides the same behaviour as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    delete_mode: DeleteMode,
}

impl InMemoryStore {
    /// Creates a new empty store with soft deletes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store with the given delete policy.
    pub fn with_delete_mode(delete_mode: DeleteMode) -> Self {
        Self {
            delete_mode,
            ..Self::default()
        }
    }

    /// Returns the number of stored books, deleted ones included.
    #[cfg(test)]
    async fn book_count(&self) -> usize {
        self.state.read().await.books.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn create_book(&self, draft: BookDraft) -> Result<BookId> {
        let id = BookId::new();
        let mut state = self.state.write().await;
        state.books.insert(id, Book::from_draft(id, draft));
        Ok(id)
    }

    async fn create_books(&self, drafts: Vec<BookDraft>) -> Result<Vec<BookId>> {
        let mut state = self.state.write().await;
        let ids = drafts
            .into_iter()
            .map(|draft| {
                let id = BookId::new();
                state.books.insert(id, Book::from_draft(id, draft));
                id
            })
            .collect();
        Ok(ids)
    }

    async fn get_book(&self, id: BookId) -> Result<Book> {
        let state = self.state.read().await;
        state
            .live_book(id)
            .cloned()
            .ok_or(StoreError::BookNotFound(id))
    }

    async fn find_book(&self, label: &str, author: &str) -> Result<Book> {
        let state = self.state.read().await;
        state
            .books
            .values()
            .filter(|b| !b.deleted && b.label == label && b.author == author)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned()
            .ok_or_else(|| StoreError::TitleNotFound {
                label: label.to_string(),
                author: author.to_string(),
            })
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let state = self.state.read().await;
        let books: Vec<_> = state
            .books
            .values()
            .filter(|b| !b.deleted)
            .cloned()
            .collect();

        if books.is_empty() {
            return Err(StoreError::EmptyResult);
        }
        Ok(books)
    }

    async fn query_books(&self, query: &BookQuery) -> Result<Vec<Book>> {
        let state = self.state.read().await;
        let books = query.apply(state.books.values().filter(|b| !b.deleted));

        if books.is_empty() {
            return Err(StoreError::EmptyResult);
        }
        Ok(books)
    }

    async fn delete_book(&self, id: BookId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.live_book(id).is_none() {
            return Err(StoreError::BookNotFound(id));
        }

        match self.delete_mode {
            DeleteMode::Soft => {
                if let Some(book) = state.books.get_mut(&id) {
                    book.deleted = true;
                }
            }
            DeleteMode::Hard => {
                state.books.remove(&id);
                let held: Vec<LineId> = state
                    .lines
                    .values()
                    .filter(|line| line.book_id == id)
                    .map(|line| line.id)
                    .collect();
                for line_id in held {
                    state.drop_line(line_id);
                }
            }
        }
        Ok(())
    }

    fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn get_or_create_cart(&self, user_id: &UserId) -> Result<Cart> {
        let mut state = self.state.write().await;

        if let Some(cart_id) = state.carts_by_user.get(user_id)
            && let Some(cart) = state.carts.get(cart_id)
        {
            return Ok(cart.clone());
        }

        let cart = Cart {
            id: CartId::new(),
            user_id: user_id.clone(),
            created_at: Utc::now(),
        };
        state.carts_by_user.insert(user_id.clone(), cart.id);
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn find_cart(&self, user_id: &UserId) -> Result<Option<Cart>> {
        let state = self.state.read().await;
        Ok(state
            .carts_by_user
            .get(user_id)
            .and_then(|id| state.carts.get(id))
            .cloned())
    }

    async fn get_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        if !state.carts.contains_key(&cart_id) {
            return Err(StoreError::CartNotFound(cart_id));
        }

        let mut lines: Vec<_> = state
            .lines
            .values()
            .filter(|line| line.cart_id == cart_id)
            .cloned()
            .collect();
        lines.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.id.cmp(&b.id)));
        Ok(lines)
    }

    async fn get_line(&self, line_id: LineId) -> Result<CartLine> {
        let state = self.state.read().await;
        state
            .lines
            .get(&line_id)
            .cloned()
            .ok_or(StoreError::LineNotFound(line_id))
    }

    async fn reserve(
        &self,
        cart_id: CartId,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartLine> {
        let mut state = self.state.write().await;

        if !state.carts.contains_key(&cart_id) {
            return Err(StoreError::CartNotFound(cart_id));
        }

        // Check before touching anything so a failure leaves no trace.
        let available = state
            .live_book(book_id)
            .map(|b| b.stock)
            .ok_or(StoreError::BookNotFound(book_id))?;
        if available < quantity.as_i64() {
            return Err(StoreError::InsufficientStock {
                book_id,
                requested: quantity,
                available,
            });
        }

        let existing = state
            .line_index
            .get(&(cart_id, book_id))
            .and_then(|id| state.lines.get(id))
            .map(|line| (line.id, line.quantity.get()));
        let next = match existing {
            Some((_, held)) => held.checked_add(quantity.get()),
            None => Some(quantity.get()),
        }
        .and_then(|n| Quantity::new(n).ok())
        .ok_or(StoreError::InsufficientStock {
            book_id,
            requested: quantity,
            available,
        })?;

        if let Some(book) = state.books.get_mut(&book_id) {
            book.stock -= quantity.as_i64();
        }

        let line = match existing {
            Some((line_id, _)) => {
                let line = state
                    .lines
                    .get_mut(&line_id)
                    .ok_or(StoreError::LineNotFound(line_id))?;
                line.quantity = next;
                line.clone()
            }
            None => {
                let line = CartLine {
                    id: LineId::new(),
                    cart_id,
                    book_id,
                    quantity: next,
                    added_at: Utc::now(),
                };
                state.line_index.insert((cart_id, book_id), line.id);
                state.lines.insert(line.id, line.clone());
                line
            }
        };

        Ok(line)
    }

    async fn release(&self, line_id: LineId, removal: Removal) -> Result<StockRelease> {
        let mut state = self.state.write().await;

        let (book_id, held) = state
            .lines
            .get(&line_id)
            .map(|line| (line.book_id, line.quantity))
            .ok_or(StoreError::LineNotFound(line_id))?;
        let units = removal
            .units(held)
            .ok_or(StoreError::LineQuantityExceeded {
                line_id,
                requested: removal.requested(held),
                held,
            })?;

        match Quantity::new(held.get() - units.get()) {
            Ok(left) => {
                if let Some(line) = state.lines.get_mut(&line_id) {
                    line.quantity = left;
                }
            }
            Err(_) => {
                state.drop_line(line_id);
            }
        }
        state.restock(book_id, units.get());

        Ok(StockRelease {
            book_id,
            quantity: units,
        })
    }

    async fn release_cart(&self, cart_id: CartId) -> Result<Vec<StockRelease>> {
        let mut state = self.state.write().await;

        if !state.carts.contains_key(&cart_id) {
            return Err(StoreError::CartNotFound(cart_id));
        }

        let line_ids: Vec<LineId> = state
            .lines
            .values()
            .filter(|line| line.cart_id == cart_id)
            .map(|line| line.id)
            .collect();

        let mut released = Vec::with_capacity(line_ids.len());
        for line_id in line_ids {
            if let Some(line) = state.drop_line(line_id) {
                state.restock(line.book_id, line.quantity.get());
                released.push(StockRelease {
                    book_id: line.book_id,
                    quantity: line.quantity,
                });
            }
        }
        released.sort_by_key(|r| r.book_id);
        Ok(released)
    }

    async fn reserved_quantity(&self, book_id: BookId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .lines
            .values()
            .filter(|line| line.book_id == book_id)
            .map(|line| line.quantity.as_i64())
            .sum())
    }
}
