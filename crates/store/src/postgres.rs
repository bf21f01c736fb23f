use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    Book, BookDraft, BookId, BookQuery, Cart, CartId, CartLine, LineId, Quantity, Removal,
    Result, StockRelease, StoreError, UserId,
    store::{CartStore, CatalogStore, DeleteMode},
};

const BOOK_COLUMNS: &str =
    "id, label, author, description, year, genre, rating, stock, cover_url, pdf_url, deleted, created_at";

const LINE_COLUMNS: &str = "id, cart_id, book_id, quantity, added_at";

/// PostgreSQL-backed catalog and cart store.
///
/// Stock transitions run in a transaction. A reservation is a conditional
/// decrement (`stock >= quantity`) on the book row; releases lock the book
/// row before the line row, the same order a reservation takes them in.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    delete_mode: DeleteMode,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store with soft deletes.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            delete_mode: DeleteMode::default(),
        }
    }

    /// Creates a new PostgreSQL store with the given delete policy.
    pub fn with_delete_mode(pool: PgPool, delete_mode: DeleteMode) -> Self {
        Self { pool, delete_mode }
    }

    /// Opens a connection pool and wraps it in a store.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        delete_mode: DeleteMode,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::with_delete_mode(pool, delete_mode))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_book(row: PgRow) -> Result<Book> {
        Ok(Book {
            id: BookId::from_uuid(row.try_get::<Uuid, _>("id")?),
            label: row.try_get("label")?,
            author: row.try_get("author")?,
            description: row.try_get("description")?,
            year: row.try_get("year")?,
            genre: row.try_get("genre")?,
            rating: row.try_get("rating")?,
            stock: row.try_get("stock")?,
            cover_url: row.try_get("cover_url")?,
            pdf_url: row.try_get("pdf_url")?,
            deleted: row.try_get("deleted")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_cart(row: PgRow) -> Result<Cart> {
        Ok(Cart {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            id: LineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
            book_id: BookId::from_uuid(row.try_get::<Uuid, _>("book_id")?),
            quantity: decode_quantity(row.try_get("quantity")?)?,
            added_at: row.try_get("added_at")?,
        })
    }

    async fn insert_book<'e, E>(executor: E, book: &Book) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO books (id, label, author, description, year, genre, rating, stock, cover_url, pdf_url, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(book.id.as_uuid())
        .bind(&book.label)
        .bind(&book.author)
        .bind(&book.description)
        .bind(book.year)
        .bind(&book.genre)
        .bind(book.rating)
        .bind(book.stock)
        .bind(&book.cover_url)
        .bind(&book.pdf_url)
        .bind(book.deleted)
        .bind(book.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

fn decode_quantity(value: i64) -> Result<Quantity> {
    Quantity::try_from(value).map_err(|e| StoreError::from(sqlx::Error::Decode(Box::new(e))))
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn create_book(&self, draft: BookDraft) -> Result<BookId> {
        let book = Book::from_draft(BookId::new(), draft);
        Self::insert_book(&self.pool, &book).await?;
        Ok(book.id)
    }

    async fn create_books(&self, drafts: Vec<BookDraft>) -> Result<Vec<BookId>> {
        let mut tx = self.pool.begin().await?;

        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let book = Book::from_draft(BookId::new(), draft);
            Self::insert_book(&mut *tx, &book).await?;
            ids.push(book.id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn get_book(&self, id: BookId) -> Result<Book> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1 AND NOT deleted"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_book(row),
            None => Err(StoreError::BookNotFound(id)),
        }
    }

    async fn find_book(&self, label: &str, author: &str) -> Result<Book> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            SELECT {BOOK_COLUMNS} FROM books
            WHERE label = $1 AND author = $2 AND NOT deleted
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(label)
        .bind(author)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_book(row),
            None => Err(StoreError::TitleNotFound {
                label: label.to_string(),
                author: author.to_string(),
            }),
        }
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE NOT deleted ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(StoreError::EmptyResult);
        }
        rows.into_iter().map(Self::row_to_book).collect()
    }

    async fn query_books(&self, query: &BookQuery) -> Result<Vec<Book>> {
        let mut sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE NOT deleted");
        let mut param_count = 0;

        let needle = query.search.as_deref();
        let genres = query.genre_filters();

        // Build dynamic query. Both sides of every text comparison go
        // through LOWER so the fold is the server's own.
        if needle.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (STRPOS(LOWER(label), LOWER(${param_count})) > 0 \
                 OR STRPOS(LOWER(author), LOWER(${param_count})) > 0)"
            ));
        }
        if !genres.is_empty() {
            param_count += 1;
            sql.push_str(&format!(
                " AND LOWER(genre) = ANY(SELECT LOWER(g) FROM unnest(${param_count}::TEXT[]) AS g)"
            ));
        }
        if query.year.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND year = ${param_count}"));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(&query.order_by_clause());

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(needle) = needle {
            sqlx_query = sqlx_query.bind(needle);
        }
        if !genres.is_empty() {
            let genres: Vec<String> = genres.into_iter().map(str::to_string).collect();
            sqlx_query = sqlx_query.bind(genres);
        }
        if let Some(year) = query.year {
            sqlx_query = sqlx_query.bind(year);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Err(StoreError::EmptyResult);
        }
        rows.into_iter().map(Self::row_to_book).collect()
    }

    async fn delete_book(&self, id: BookId) -> Result<()> {
        let sql = match self.delete_mode {
            DeleteMode::Soft => "UPDATE books SET deleted = TRUE WHERE id = $1 AND NOT deleted",
            // Cart lines holding the book go with it (ON DELETE CASCADE).
            DeleteMode::Hard => "DELETE FROM books WHERE id = $1 AND NOT deleted",
        };

        let result = sqlx::query(sql)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::BookNotFound(id));
        }
        Ok(())
    }

    fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_or_create_cart(&self, user_id: &UserId) -> Result<Cart> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(user_id.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_cart(row)
    }

    async fn find_cart(&self, user_id: &UserId) -> Result<Option<Cart>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, user_id, created_at FROM carts WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn get_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::CartNotFound(cart_id));
        }

        let rows = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 ORDER BY added_at ASC, id ASC"
        ))
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn get_line(&self, line_id: LineId) -> Result<CartLine> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {LINE_COLUMNS} FROM cart_lines WHERE id = $1"))
                .bind(line_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Self::row_to_line(row),
            None => Err(StoreError::LineNotFound(line_id)),
        }
    }

    async fn reserve(
        &self,
        cart_id: CartId,
        book_id: BookId,
        quantity: Quantity,
    ) -> Result<CartLine> {
        let mut tx = self.pool.begin().await?;

        let cart: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if cart.is_none() {
            return Err(StoreError::CartNotFound(cart_id));
        }

        // Conditional decrement: the row lock it takes serializes
        // concurrent reservations of the same book.
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE books SET stock = stock - $2
            WHERE id = $1 AND NOT deleted AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(book_id.as_uuid())
        .bind(quantity.as_i64())
        .fetch_optional(&mut *tx)
        .await?;

        if remaining.is_none() {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT stock FROM books WHERE id = $1 AND NOT deleted")
                    .bind(book_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await?;

            // Dropping the transaction rolls it back.
            return Err(match available {
                Some(available) => StoreError::InsufficientStock {
                    book_id,
                    requested: quantity,
                    available,
                },
                None => StoreError::BookNotFound(book_id),
            });
        }

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_lines (id, cart_id, book_id, quantity, added_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (cart_id, book_id)
                DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            RETURNING {LINE_COLUMNS}
            "#
        ))
        .bind(LineId::new().as_uuid())
        .bind(cart_id.as_uuid())
        .bind(book_id.as_uuid())
        .bind(quantity.as_i64())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        let line = Self::row_to_line(row)?;

        tx.commit().await?;
        Ok(line)
    }

    async fn release(&self, line_id: LineId, removal: Removal) -> Result<StockRelease> {
        let mut tx = self.pool.begin().await?;

        let book_id: Option<Uuid> =
            sqlx::query_scalar("SELECT book_id FROM cart_lines WHERE id = $1")
                .bind(line_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let book_id = book_id.ok_or(StoreError::LineNotFound(line_id))?;

        // Lock order: book row, then line row.
        sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        let held: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM cart_lines WHERE id = $1 FOR UPDATE")
                .bind(line_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let held = decode_quantity(held.ok_or(StoreError::LineNotFound(line_id))?)?;

        let units = removal
            .units(held)
            .ok_or(StoreError::LineQuantityExceeded {
                line_id,
                requested: removal.requested(held),
                held,
            })?;

        if units == held {
            sqlx::query("DELETE FROM cart_lines WHERE id = $1")
                .bind(line_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE cart_lines SET quantity = quantity - $2 WHERE id = $1")
                .bind(line_id.as_uuid())
                .bind(units.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE books SET stock = stock + $2 WHERE id = $1")
            .bind(book_id)
            .bind(units.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(StockRelease {
            book_id: BookId::from_uuid(book_id),
            quantity: units,
        })
    }

    async fn release_cart(&self, cart_id: CartId) -> Result<Vec<StockRelease>> {
        let mut tx = self.pool.begin().await?;

        let cart: Option<Uuid> = sqlx::query_scalar("SELECT id FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if cart.is_none() {
            return Err(StoreError::CartNotFound(cart_id));
        }

        // Lock every affected book in ID order before touching the lines.
        sqlx::query(
            r#"
            SELECT id FROM books
            WHERE id IN (SELECT book_id FROM cart_lines WHERE cart_id = $1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(cart_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        let rows =
            sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 RETURNING book_id, quantity")
                .bind(cart_id.as_uuid())
                .fetch_all(&mut *tx)
                .await?;

        let mut released = Vec::with_capacity(rows.len());
        for row in rows {
            let book_id: Uuid = row.try_get("book_id")?;
            let quantity = decode_quantity(row.try_get("quantity")?)?;

            sqlx::query("UPDATE books SET stock = stock + $2 WHERE id = $1")
                .bind(book_id)
                .bind(quantity.as_i64())
                .execute(&mut *tx)
                .await?;

            released.push(StockRelease {
                book_id: BookId::from_uuid(book_id),
                quantity,
            });
        }

        tx.commit().await?;
        released.sort_by_key(|r| r.book_id);
        Ok(released)
    }

    async fn reserved_quantity(&self, book_id: BookId) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_lines WHERE book_id = $1",
        )
        .bind(book_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}
