use std::cmp::Ordering;
use std::str::FromStr;

use thiserror::Error;

use crate::Book;

/// Field a catalog query is ordered by.
///
/// Every key is followed by the book ID ascending as a tie-break, so
/// results are deterministic and identical across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Label,
    Author,
    Rating,
    Genre,
    Year,
    /// Order by book ID only.
    #[default]
    Id,
}

impl SortKey {
    /// The `books` column this key orders by.
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Label => "label",
            SortKey::Author => "author",
            SortKey::Rating => "rating",
            SortKey::Genre => "genre",
            SortKey::Year => "year",
            SortKey::Id => "id",
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, SortKey::Label | SortKey::Author | SortKey::Genre)
    }
}

/// Error returned when parsing an unrecognised sort key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "label" | "lable" => Ok(SortKey::Label),
            "author" => Ok(SortKey::Author),
            "rating" => Ok(SortKey::Rating),
            "genre" => Ok(SortKey::Genre),
            "age" | "year" => Ok(SortKey::Year),
            "" | "default" | "id" => Ok(SortKey::Id),
            _ => Err(UnknownSortKey(s.to_string())),
        }
    }
}

/// Builder for filtered, sorted catalog queries.
///
/// A book passes when it matches the search text (case-insensitive
/// substring of label or author), any of the genres (case-insensitive
/// equality) and the exact year. Unset criteria match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
    /// Free text matched against label and author.
    pub search: Option<String>,

    /// Accepted genres (any of these). Empty means no genre filter.
    pub genres: Vec<String>,

    /// Exact publication year.
    pub year: Option<i32>,

    pub sort_key: SortKey,

    /// Direction of the primary key. The ID tie-break is always ascending.
    pub ascending: bool,
}

impl Default for BookQuery {
    fn default() -> Self {
        Self {
            search: None,
            genres: Vec::new(),
            year: None,
            sort_key: SortKey::default(),
            ascending: true,
        }
    }
}

impl BookQuery {
    /// Creates a query matching every book, ordered by ID ascending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by free text. An empty string clears the filter.
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.is_empty() { None } else { Some(text) };
        self
    }

    /// Adds one accepted genre.
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genres.push(genre.into());
        self
    }

    /// Replaces the accepted genres.
    pub fn genres(mut self, genres: Vec<String>) -> Self {
        self.genres = genres;
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort_key = key;
        self
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    /// Genres to filter by, with blanks dropped. Case is left as given;
    /// each backend folds both sides of the comparison itself.
    pub fn genre_filters(&self) -> Vec<&str> {
        self.genres
            .iter()
            .map(String::as_str)
            .filter(|g| !g.is_empty())
            .collect()
    }

    /// Returns true if the book passes every filter.
    ///
    /// Soft-deleted books are excluded by the store, not here.
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase)
            && !book.label.to_lowercase().contains(&needle)
            && !book.author.to_lowercase().contains(&needle)
        {
            return false;
        }

        let genres = self.genre_filters();
        let genre = book.genre.to_lowercase();
        if !genres.is_empty() && !genres.iter().any(|g| g.to_lowercase() == genre) {
            return false;
        }

        if let Some(year) = self.year
            && book.year != year
        {
            return false;
        }

        true
    }

    /// Orders two books by the sort key and direction, then by ID.
    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let primary = match self.sort_key {
            SortKey::Label => a.label.cmp(&b.label),
            SortKey::Author => a.author.cmp(&b.author),
            SortKey::Rating => a.rating.cmp(&b.rating),
            SortKey::Genre => a.genre.cmp(&b.genre),
            SortKey::Year => a.year.cmp(&b.year),
            SortKey::Id => a.id.cmp(&b.id),
        };
        let primary = if self.ascending {
            primary
        } else {
            primary.reverse()
        };

        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Filters and sorts an iterator of books in memory.
    pub fn apply<'a>(&self, books: impl IntoIterator<Item = &'a Book>) -> Vec<Book> {
        let mut matched: Vec<Book> = books
            .into_iter()
            .filter(|b| self.matches(b))
            .cloned()
            .collect();
        matched.sort_by(|a, b| self.compare(a, b));
        matched
    }

    /// SQL `ORDER BY` body equivalent to [`BookQuery::compare`].
    ///
    /// Text columns use the "C" collation so that ordering is bytewise,
    /// matching `str` comparison.
    pub fn order_by_clause(&self) -> String {
        let direction = if self.ascending { "ASC" } else { "DESC" };
        let column = self.sort_key.column();
        match self.sort_key {
            SortKey::Id => format!("id {direction}"),
            key if key.is_text() => format!("{column} COLLATE \"C\" {direction}, id ASC"),
            _ => format!("{column} {direction}, id ASC"),
        }
    }
}
