use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BookId, CartId, LineId, Quantity, UserId};

/// A catalog entry together with its stock counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub label: String,
    pub author: String,
    pub description: String,
    /// Publication year; the original services call this field `age`.
    pub year: i32,
    pub genre: String,
    pub rating: i32,
    /// Copies currently available for reservation. Never negative.
    pub stock: i64,
    pub cover_url: Option<String>,
    pub pdf_url: Option<String>,
    /// Soft-delete marker. Deleted books are invisible to every read path.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Materializes a draft under a freshly assigned ID.
    pub fn from_draft(id: BookId, draft: BookDraft) -> Self {
        Self {
            id,
            label: draft.label,
            author: draft.author,
            description: draft.description,
            year: draft.year,
            genre: draft.genre,
            rating: draft.rating,
            stock: i64::from(draft.stock),
            cover_url: draft.cover_url,
            pdf_url: draft.pdf_url,
            deleted: false,
            created_at: Utc::now(),
        }
    }
}

/// The data needed to create a book. The store assigns the ID.
///
/// Deserialization accepts the field names used by the original clients
/// (`lable`, `desc`, `age`, `count`) as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDraft {
    #[serde(alias = "lable")]
    pub label: String,
    pub author: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(alias = "age")]
    pub year: i32,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub rating: i32,
    /// Initial stock; unsigned so a draft can never start negative.
    #[serde(default, alias = "count")]
    pub stock: u32,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl BookDraft {
    /// Starts a draft with the two identifying fields.
    pub fn new(label: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            author: author.into(),
            description: String::new(),
            year: 0,
            genre: String::new(),
            rating: 0,
            stock: 0,
            cover_url: None,
            pdf_url: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn rating(mut self, rating: i32) -> Self {
        self.rating = rating;
        self
    }

    pub fn stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.pdf_url = Some(url.into());
        self
    }
}

/// A user's cart. Created lazily; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Reserved-but-uncommitted copies of one book in one cart.
///
/// There is at most one line per (cart, book) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub cart_id: CartId,
    pub book_id: BookId,
    pub quantity: Quantity,
    pub added_at: DateTime<Utc>,
}

/// How many units to take out of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Removal {
    /// A single unit.
    #[default]
    One,
    /// Exactly this many units; must not exceed what the line holds.
    Units(Quantity),
    /// Everything the line holds.
    All,
}

impl Removal {
    /// Resolves the units to take from a line holding `held`.
    ///
    /// Returns `None` if the removal asks for more than the line holds.
    pub fn units(&self, held: Quantity) -> Option<Quantity> {
        match self {
            Removal::One => Some(Quantity::ONE),
            Removal::Units(q) => (*q <= held).then_some(*q),
            Removal::All => Some(held),
        }
    }

    /// The quantity reported when a removal is rejected.
    pub fn requested(&self, held: Quantity) -> Quantity {
        match self {
            Removal::One => Quantity::ONE,
            Removal::Units(q) => *q,
            Removal::All => held,
        }
    }
}

/// Units returned to a book's stock by a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRelease {
    pub book_id: BookId,
    pub quantity: Quantity,
}
