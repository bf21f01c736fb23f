//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::BookId;
use serde::Serialize;
use store::{Book, BookDraft, BookQuery, BookstoreStore, SortKey};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookCreatedResponse {
    pub id: BookId,
}

#[derive(Serialize)]
pub struct BooksCreatedResponse {
    pub ids: Vec<BookId>,
}

/// GET /books: every live book ordered by id. No books is a 404.
#[tracing::instrument(skip(state))]
pub async fn list<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.catalog.list_books().await?))
}

/// GET /books/search?search=&genre=&genre=&year=&sort_by=&ascending=
///
/// `genre` may repeat; a book matches if its genre equals any of them.
#[tracing::instrument(skip(state, params))]
pub async fn search<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let query = parse_search(params)?;
    Ok(Json(state.catalog.query_books(&query).await?))
}

/// Folds raw query pairs into a [`BookQuery`]. Unknown keys are ignored.
pub fn parse_search(params: Vec<(String, String)>) -> Result<BookQuery, ApiError> {
    let mut query = BookQuery::new();

    for (key, value) in params {
        let value = value.trim();
        match key.as_str() {
            "search" => query = query.search(value),
            "genre" if !value.is_empty() => query = query.genre(value),
            "year" if !value.is_empty() => {
                let year = value
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid year: {value:?}")))?;
                query = query.year(year);
            }
            "sort_by" => {
                let key: SortKey = value
                    .parse()
                    .map_err(|e: store::UnknownSortKey| ApiError::BadRequest(e.to_string()))?;
                query = query.sort_by(key);
            }
            "ascending" if !value.is_empty() => {
                let ascending = value.parse().map_err(|_| {
                    ApiError::BadRequest(format!("ascending must be true or false, got {value:?}"))
                })?;
                query = query.ascending(ascending);
            }
            _ => {}
        }
    }

    Ok(query)
}

/// GET /books/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookId>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.catalog.get_book(id).await?))
}

/// POST /books
#[tracing::instrument(skip(state, draft))]
pub async fn create<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<BookDraft>,
) -> Result<(StatusCode, Json<BookCreatedResponse>), ApiError> {
    validate(&draft)?;
    let id = state.catalog.create_book(draft).await?;
    Ok((StatusCode::CREATED, Json(BookCreatedResponse { id })))
}

/// POST /books/batch: all drafts are created, or none.
#[tracing::instrument(skip(state, drafts))]
pub async fn create_batch<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(drafts): Json<Vec<BookDraft>>,
) -> Result<(StatusCode, Json<BooksCreatedResponse>), ApiError> {
    for draft in &drafts {
        validate(draft)?;
    }
    let ids = state.catalog.create_books(drafts).await?;
    Ok((StatusCode::CREATED, Json(BooksCreatedResponse { ids })))
}

/// DELETE /books/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<BookId>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate(draft: &BookDraft) -> Result<(), ApiError> {
    if draft.label.trim().is_empty() || draft.author.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "label and author are required".to_string(),
        ));
    }
    Ok(())
}
