//! Catalog service: book management and search.

use common::BookId;
use store::{Book, BookDraft, BookQuery, CatalogStore, DeleteMode};

use crate::config::CoordinatorConfig;
use crate::error::DomainError;
use crate::execution::run;

/// Service for managing the book catalog.
///
/// Stock is only ever set here at creation time. Afterwards it moves
/// through [`crate::ReservationCoordinator`].
#[derive(Clone)]
pub struct CatalogService<S: CatalogStore> {
    store: S,
    config: CoordinatorConfig,
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: S, config: CoordinatorConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn delete_mode(&self) -> DeleteMode {
        self.store.delete_mode()
    }

    /// Adds a book. Two drafts with the same label and author become two
    /// books; use [`Self::find_book`] first to merge by title.
    #[tracing::instrument(skip(self, draft), fields(label = %draft.label, stock = draft.stock))]
    pub async fn create_book(&self, draft: BookDraft) -> Result<BookId, DomainError> {
        let id = run(&self.config, "create_book", || {
            self.store.create_book(draft.clone())
        })
        .await?;

        tracing::info!(book_id = %id, "book created");
        Ok(id)
    }

    /// Adds several books atomically: either all are created or none.
    #[tracing::instrument(skip(self, drafts), fields(count = drafts.len()))]
    pub async fn create_books(&self, drafts: Vec<BookDraft>) -> Result<Vec<BookId>, DomainError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let ids = run(&self.config, "create_books", || {
            self.store.create_books(drafts.clone())
        })
        .await?;

        tracing::info!(count = ids.len(), "books created");
        Ok(ids)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_book(&self, id: BookId) -> Result<Book, DomainError> {
        run(&self.config, "get_book", || self.store.get_book(id)).await
    }

    /// Looks up a live book by exact label and author.
    #[tracing::instrument(skip(self))]
    pub async fn find_book(&self, label: &str, author: &str) -> Result<Book, DomainError> {
        run(&self.config, "find_book", || self.store.find_book(label, author)).await
    }

    /// All live books ordered by id, or [`DomainError::EmptyResult`].
    #[tracing::instrument(skip(self))]
    pub async fn list_books(&self) -> Result<Vec<Book>, DomainError> {
        run(&self.config, "list_books", || self.store.list_books()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn query_books(&self, query: &BookQuery) -> Result<Vec<Book>, DomainError> {
        let books = run(&self.config, "query_books", || self.store.query_books(query)).await?;
        tracing::debug!(matched = books.len(), "query answered");
        Ok(books)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_book(&self, id: BookId) -> Result<(), DomainError> {
        run(&self.config, "delete_book", || self.store.delete_book(id)).await?;
        tracing::info!(book_id = %id, mode = ?self.store.delete_mode(), "book deleted");
        Ok(())
    }
}
