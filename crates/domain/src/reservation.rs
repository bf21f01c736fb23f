//! Reservation coordinator.
//!
//! Moves units between a book's stock and cart lines. Each transition is a
//! single atomic store call, so for every book
//! `stock + sum(line quantities) == initial stock` holds at every point an
//! observer can see, including after a timeout or a cancelled request.

use common::{BookId, CartId, LineId, Quantity, UserId};
use store::{Cart, CartLine, CartStore, Removal, StockRelease};

use crate::config::CoordinatorConfig;
use crate::error::DomainError;
use crate::execution::run;

/// Coordinates stock reservations for user carts.
#[derive(Clone)]
pub struct ReservationCoordinator<S: CartStore> {
    store: S,
    config: CoordinatorConfig,
}

impl<S: CartStore> ReservationCoordinator<S> {
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

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the user's cart, creating it on first use.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_or_create_cart(&self, user_id: &UserId) -> Result<Cart, DomainError> {
        run(&self.config, "get_or_create_cart", || {
            self.store.get_or_create_cart(user_id)
        })
        .await
    }

    /// Returns the user's cart without creating one.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn find_cart(&self, user_id: &UserId) -> Result<Cart, DomainError> {
        run(&self.config, "find_cart", || self.store.find_cart(user_id))
            .await?
            .ok_or_else(|| DomainError::NoCart(user_id.clone()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, DomainError> {
        run(&self.config, "get_lines", || self.store.get_lines(cart_id)).await
    }

    /// The user's cart and its lines. A cart with no lines is returned as
    /// such; only a user without any cart is an error.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn cart_contents(
        &self,
        user_id: &UserId,
    ) -> Result<(Cart, Vec<CartLine>), DomainError> {
        let cart = self.find_cart(user_id).await?;
        let lines = self.lines(cart.id).await?;
        Ok((cart, lines))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_line(&self, line_id: LineId) -> Result<CartLine, DomainError> {
        run(&self.config, "get_line", || self.store.get_line(line_id)).await
    }

    /// Moves `quantity` units of a book from stock into the cart.
    ///
    /// Either stock drops by `quantity` and the cart's line for the book
    /// grows by the same amount, or nothing changes and the error says why.
    #[tracing::instrument(skip(self), fields(quantity = quantity.get()))]
    pub async fn add(
        &self,
        cart_id: CartId,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartLine, DomainError> {
        let result = run(&self.config, "reserve", || {
            self.store.reserve(cart_id, book_id, quantity)
        })
        .await;

        let outcome = match &result {
            Ok(line) => {
                tracing::info!(
                    line_id = %line.id,
                    line_quantity = line.quantity.get(),
                    "stock reserved"
                );
                "reserved"
            }
            Err(DomainError::InsufficientStock { available, .. }) => {
                tracing::info!(available, "reservation refused: insufficient stock");
                "insufficient_stock"
            }
            Err(e) if e.is_transient() => "transient",
            Err(_) => "rejected",
        };
        metrics::counter!("reservations_total", "outcome" => outcome).increment(1);

        result
    }

    /// Adds to the user's cart, creating the cart first if needed.
    /// `quantity` defaults to one unit.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn add_for_user(
        &self,
        user_id: &UserId,
        book_id: BookId,
        quantity: Option<Quantity>,
    ) -> Result<CartLine, DomainError> {
        let cart = self.get_or_create_cart(user_id).await?;
        self.add(cart.id, book_id, quantity.unwrap_or(Quantity::ONE))
            .await
    }

    /// Takes units out of a line and puts them back in stock. The line is
    /// deleted once it holds nothing.
    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        line_id: LineId,
        removal: Removal,
    ) -> Result<StockRelease, DomainError> {
        let released = run(&self.config, "release", || {
            self.store.release(line_id, removal)
        })
        .await?;

        metrics::counter!("reservation_releases_total").increment(1);
        tracing::info!(
            book_id = %released.book_id,
            quantity = released.quantity.get(),
            "stock released"
        );
        Ok(released)
    }

    /// Empties the cart, returning every line's units to stock. The cart
    /// itself survives with zero lines.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, cart_id: CartId) -> Result<Vec<StockRelease>, DomainError> {
        let released = run(&self.config, "release_cart", || {
            self.store.release_cart(cart_id)
        })
        .await?;

        metrics::counter!("cart_clears_total").increment(1);
        tracing::info!(lines = released.len(), "cart cleared");
        Ok(released)
    }

    /// Clears the user's cart. A user without a cart has nothing to clear.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_for_user(&self, user_id: &UserId) -> Result<Vec<StockRelease>, DomainError> {
        let cart = self.find_cart(user_id).await?;
        self.clear(cart.id).await
    }

    /// Units of a book currently held across all carts.
    pub async fn reserved_quantity(&self, book_id: BookId) -> Result<i64, DomainError> {
        run(&self.config, "reserved_quantity", || {
            self.store.reserved_quantity(book_id)
        })
        .await
    }
}

/// Parses a removal request as sent by clients: absent means one unit,
/// `all` empties the line, a number removes that many units.
pub fn parse_removal(raw: Option<&str>) -> Result<Removal, DomainError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Removal::One),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(Removal::All),
        Some(s) => {
            let n: i64 = s
                .parse()
                .map_err(|_| DomainError::InvalidQuantity(format!("{s:?} is not a quantity")))?;
            Ok(Removal::Units(Quantity::try_from(n)?))
        }
    }
}
