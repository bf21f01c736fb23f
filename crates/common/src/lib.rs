//! Identifier and value types shared by the bookstore crates.

pub mod types;

pub use types::{BookId, CartId, InvalidQuantity, LineId, Quantity, UserId};
