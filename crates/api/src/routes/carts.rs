//! Cart and reservation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{BookId, CartId, LineId, Quantity, UserId};
use serde::{Deserialize, Serialize};
use store::{BookstoreStore, Cart, CartLine, StockRelease};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub book_id: BookId,
    /// Units to reserve; one when omitted.
    pub quantity: Option<i64>,
}

#[derive(Deserialize)]
pub struct RemoveParams {
    /// A number of units, or `all`. One unit when omitted.
    pub quantity: Option<String>,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

impl CartResponse {
    fn new(cart: Cart, lines: Vec<CartLine>) -> Self {
        Self {
            cart_id: cart.id,
            user_id: cart.user_id,
            lines,
        }
    }
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub released: Vec<StockRelease>,
}

/// POST /users/{user_id}/cart: returns the user's cart, creating it if absent.
#[tracing::instrument(skip(state))]
pub async fn open<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .reservations
        .get_or_create_cart(&UserId::new(user_id))
        .await?;
    let lines = state.reservations.lines(cart.id).await?;
    Ok(Json(CartResponse::new(cart, lines)))
}

/// GET /users/{user_id}/cart
#[tracing::instrument(skip(state))]
pub async fn contents<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let (cart, lines) = state
        .reservations
        .cart_contents(&UserId::new(user_id))
        .await?;
    Ok(Json(CartResponse::new(cart, lines)))
}

/// POST /users/{user_id}/cart/items: reserves copies of a book.
#[tracing::instrument(skip(state, req), fields(book_id = %req.book_id))]
pub async fn add_item<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartLine>, ApiError> {
    let quantity = req.quantity.map(Quantity::try_from).transpose()?;
    let line = state
        .reservations
        .add_for_user(&UserId::new(user_id), req.book_id, quantity)
        .await?;
    Ok(Json(line))
}

/// DELETE /users/{user_id}/cart/items: empties the cart back into stock.
#[tracing::instrument(skip(state))]
pub async fn clear<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    let released = state
        .reservations
        .clear_for_user(&UserId::new(user_id))
        .await?;
    Ok(Json(ClearResponse { released }))
}

/// DELETE /cart/lines/{line_id}?quantity=n|all
#[tracing::instrument(skip(state, params))]
pub async fn remove_line<S: BookstoreStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(line_id): Path<LineId>,
    Query(params): Query<RemoveParams>,
) -> Result<Json<StockRelease>, ApiError> {
    let removal = domain::parse_removal(params.quantity.as_deref())?;
    let released = state.reservations.remove(line_id, removal).await?;
    Ok(Json(released))
}
