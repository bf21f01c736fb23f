//! Behaviour scenarios shared by every backend.
//!
//! Each scenario takes an empty store and asserts on observable results
//! only, so the same function runs against the in-memory and PostgreSQL
//! implementations.

#![allow(dead_code)]

use futures_util::future::join_all;
use store::{
    BookDraft, BookId, BookQuery, BookstoreStore, CartId, CartLine, Quantity, Removal, SortKey,
    StoreError, UserId,
};

pub fn draft(label: &str, stock: u32) -> BookDraft {
    BookDraft::new(label, "Test Author")
        .description("A book used in tests")
        .year(2001)
        .genre("Fiction")
        .stock(stock)
}

pub fn qty(n: u32) -> Quantity {
    Quantity::new(n).unwrap()
}

/// Returns the line holding `book_id` in `cart_id`, if any.
pub async fn line_for<S: BookstoreStore>(
    store: &S,
    cart_id: CartId,
    book_id: BookId,
) -> store::Result<Option<CartLine>> {
    Ok(store
        .get_lines(cart_id)
        .await?
        .into_iter()
        .find(|line| line.book_id == book_id))
}

/// Asserts that stock plus reserved units still equals the initial stock.
pub async fn assert_conserved<S: BookstoreStore>(store: &S, book_id: BookId, initial: i64) {
    let stock = store.get_book(book_id).await.unwrap().stock;
    let reserved = store.reserved_quantity(book_id).await.unwrap();
    assert!(stock >= 0, "stock went negative: {stock}");
    assert_eq!(stock + reserved, initial, "stock {stock} + reserved {reserved}");
}

pub async fn create_and_fetch_book<S: BookstoreStore>(store: &S) {
    let id = store
        .create_book(
            draft("Dune", 3)
                .cover_url("/covers/dune.png")
                .pdf_url("/pdf/dune.pdf"),
        )
        .await
        .unwrap();

    let book = store.get_book(id).await.unwrap();
    assert_eq!(book.id, id);
    assert_eq!(book.label, "Dune");
    assert_eq!(book.stock, 3);
    assert_eq!(book.cover_url.as_deref(), Some("/covers/dune.png"));
    assert!(!book.deleted);
}

pub async fn unknown_book_is_not_found<S: BookstoreStore>(store: &S) {
    let id = BookId::new();
    assert!(matches!(
        store.get_book(id).await,
        Err(StoreError::BookNotFound(missing)) if missing == id
    ));
    assert!(matches!(
        store.delete_book(id).await,
        Err(StoreError::BookNotFound(_))
    ));
}

pub async fn same_title_creates_two_books<S: BookstoreStore>(store: &S) {
    let first = store.create_book(draft("Dune", 1)).await.unwrap();
    let second = store.create_book(draft("Dune", 2)).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(store.list_books().await.unwrap().len(), 2);
    assert_eq!(store.find_book("Dune", "Test Author").await.unwrap().id, first);
    assert!(matches!(
        store.find_book("Dune", "Someone Else").await,
        Err(StoreError::TitleNotFound { .. })
    ));
}

pub async fn batch_create_inserts_all<S: BookstoreStore>(store: &S) {
    let ids = store
        .create_books(vec![draft("A", 1), draft("B", 2), draft("C", 3)])
        .await
        .unwrap();

    assert_eq!(ids.len(), 3);
    let mut listed: Vec<_> = store
        .list_books()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    let mut expected = ids.clone();
    listed.sort();
    expected.sort();
    assert_eq!(listed, expected);
}

pub async fn empty_catalog_lists_as_empty_result<S: BookstoreStore>(store: &S) {
    assert!(matches!(
        store.list_books().await,
        Err(StoreError::EmptyResult)
    ));
    assert!(matches!(
        store.query_books(&BookQuery::new()).await,
        Err(StoreError::EmptyResult)
    ));
}

pub async fn list_is_ordered_by_id<S: BookstoreStore>(store: &S) {
    for label in ["C", "A", "B"] {
        store.create_book(draft(label, 1)).await.unwrap();
    }

    let ids: Vec<_> = store
        .list_books()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

pub async fn query_sorts_by_label_and_rating<S: BookstoreStore>(store: &S) {
    store.create_book(draft("B", 1).rating(2)).await.unwrap();
    store.create_book(draft("A", 1).rating(5)).await.unwrap();

    let by_label = store
        .query_books(&BookQuery::new().sort_by(SortKey::Label).ascending(true))
        .await
        .unwrap();
    let labels: Vec<_> = by_label.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B"]);

    let by_rating = store
        .query_books(&BookQuery::new().sort_by(SortKey::Rating).ascending(false))
        .await
        .unwrap();
    let ratings: Vec<_> = by_rating
        .iter()
        .map(|b| (b.label.as_str(), b.rating))
        .collect();
    assert_eq!(ratings, vec![("A", 5), ("B", 2)]);
}

pub async fn query_filters_combine<S: BookstoreStore>(store: &S) {
    store
        .create_book(
            BookDraft::new("The Hobbit", "J.R.R. Tolkien")
                .genre("Fantasy")
                .year(1937)
                .stock(1),
        )
        .await
        .unwrap();
    store
        .create_book(
            BookDraft::new("Dune", "Frank Herbert")
                .genre("Sci-Fi")
                .year(1965)
                .stock(1),
        )
        .await
        .unwrap();
    store
        .create_book(
            BookDraft::new("Hyperion", "Dan Simmons")
                .genre("sci-fi")
                .year(1989)
                .stock(1),
        )
        .await
        .unwrap();

    let labels = |books: Vec<store::Book>| -> Vec<String> {
        books.into_iter().map(|b| b.label).collect()
    };

    let tolkien = store
        .query_books(&BookQuery::new().search("TOLK"))
        .await
        .unwrap();
    assert_eq!(labels(tolkien), vec!["The Hobbit"]);

    let scifi = store
        .query_books(
            &BookQuery::new()
                .genre("SCI-FI")
                .sort_by(SortKey::Year)
                .ascending(false),
        )
        .await
        .unwrap();
    assert_eq!(labels(scifi), vec!["Hyperion", "Dune"]);

    let either = store
        .query_books(
            &BookQuery::new()
                .genres(vec!["fantasy".into(), "horror".into()])
                .sort_by(SortKey::Label),
        )
        .await
        .unwrap();
    assert_eq!(labels(either), vec!["The Hobbit"]);

    let by_year = store
        .query_books(&BookQuery::new().genre("sci-fi").year(1965))
        .await
        .unwrap();
    assert_eq!(labels(by_year), vec!["Dune"]);

    // Genre is an exact match, not a substring.
    assert!(matches!(
        store.query_books(&BookQuery::new().genre("sci")).await,
        Err(StoreError::EmptyResult)
    ));
}

pub async fn query_without_match_is_empty_result<S: BookstoreStore>(store: &S) {
    store.create_book(draft("Dune", 1)).await.unwrap();

    assert!(matches!(
        store
            .query_books(&BookQuery::new().search("nonexistent-xyz"))
            .await,
        Err(StoreError::EmptyResult)
    ));
}

pub async fn query_matches_non_ascii_text<S: BookstoreStore>(store: &S) {
    let istanbul = store
        .create_book(
            BookDraft::new("İstanbul Hatırası", "Gülşen Aydın")
                .genre("Şiir")
                .stock(1),
        )
        .await
        .unwrap();
    store.create_book(draft("Dune", 1)).await.unwrap();

    let ids = |books: Vec<store::Book>| books.into_iter().map(|b| b.id).collect::<Vec<_>>();

    for text in ["İstanbul", "Hatırası", "gülşen", "Aydın"] {
        let found = store
            .query_books(&BookQuery::new().search(text))
            .await
            .unwrap_or_else(|e| panic!("search {text:?}: {e}"));
        assert_eq!(ids(found), vec![istanbul], "search {text:?}");
    }

    let found = store
        .query_books(&BookQuery::new().genre("Şiir"))
        .await
        .unwrap();
    assert_eq!(ids(found), vec![istanbul]);

    assert!(matches!(
        store.query_books(&BookQuery::new().search("Ankara")).await,
        Err(StoreError::EmptyResult)
    ));
}

pub async fn query_ties_break_by_id<S: BookstoreStore>(store: &S) {
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(store.create_book(draft("Same", 1).rating(3)).await.unwrap());
    }
    ids.sort();

    for ascending in [true, false] {
        let got: Vec<_> = store
            .query_books(&BookQuery::new().sort_by(SortKey::Rating).ascending(ascending))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(got, ids);
    }
}

pub async fn soft_deleted_book_disappears<S: BookstoreStore>(store: &S) {
    let gone = store.create_book(draft("Gone", 1)).await.unwrap();
    let kept = store.create_book(draft("Kept", 1)).await.unwrap();

    store.delete_book(gone).await.unwrap();

    assert!(matches!(
        store.get_book(gone).await,
        Err(StoreError::BookNotFound(_))
    ));
    let listed: Vec<_> = store
        .list_books()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(listed, vec![kept]);
    assert!(matches!(
        store.query_books(&BookQuery::new().search("gone")).await,
        Err(StoreError::EmptyResult)
    ));
    assert!(matches!(
        store.find_book("Gone", "Test Author").await,
        Err(StoreError::TitleNotFound { .. })
    ));
}

pub async fn cart_creation_is_idempotent<S: BookstoreStore>(store: &S) {
    let user = UserId::new("alice");
    assert!(store.find_cart(&user).await.unwrap().is_none());

    let first = store.get_or_create_cart(&user).await.unwrap();
    let second = store.get_or_create_cart(&user).await.unwrap();
    let other = store.get_or_create_cart(&UserId::new("bob")).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_ne!(first.id, other.id);
    assert_eq!(store.find_cart(&user).await.unwrap().map(|c| c.id), Some(first.id));
    assert!(store.get_lines(first.id).await.unwrap().is_empty());
}

pub async fn repeated_reserve_accumulates<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 10)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();

    let first = store.reserve(cart.id, book, qty(2)).await.unwrap();
    let second = store.reserve(cart.id, book, qty(3)).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, qty(5));
    let lines = store.get_lines(cart.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, qty(5));
    assert_eq!(store.get_book(book).await.unwrap().stock, 5);
    assert_conserved(store, book, 10).await;
}

pub async fn reserve_beyond_stock_changes_nothing<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 2)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    store.reserve(cart.id, book, qty(1)).await.unwrap();

    let result = store.reserve(cart.id, book, qty(2)).await;

    assert!(matches!(
        result,
        Err(StoreError::InsufficientStock { available: 1, .. })
    ));
    assert_eq!(store.get_book(book).await.unwrap().stock, 1);
    assert_eq!(
        line_for(store, cart.id, book).await.unwrap().map(|l| l.quantity),
        Some(qty(1))
    );
    assert_conserved(store, book, 2).await;
}

pub async fn reserve_unknown_book_or_cart_fails<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 2)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();

    assert!(matches!(
        store.reserve(cart.id, BookId::new(), qty(1)).await,
        Err(StoreError::BookNotFound(_))
    ));
    assert!(matches!(
        store.reserve(store::CartId::new(), book, qty(1)).await,
        Err(StoreError::CartNotFound(_))
    ));
    assert!(store.get_lines(cart.id).await.unwrap().is_empty());
    assert_eq!(store.get_book(book).await.unwrap().stock, 2);
}

pub async fn full_removal_round_trips<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 4)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    let line = store.reserve(cart.id, book, qty(3)).await.unwrap();

    let released = store.release(line.id, Removal::Units(qty(3))).await.unwrap();

    assert_eq!(released.book_id, book);
    assert_eq!(released.quantity, qty(3));
    assert_eq!(store.get_book(book).await.unwrap().stock, 4);
    assert!(matches!(
        store.get_line(line.id).await,
        Err(StoreError::LineNotFound(_))
    ));
    assert!(store.get_lines(cart.id).await.unwrap().is_empty());
}

pub async fn remove_one_unit_at_a_time<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 2)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    let line = store.reserve(cart.id, book, qty(2)).await.unwrap();

    store.release(line.id, Removal::One).await.unwrap();
    assert_eq!(store.get_line(line.id).await.unwrap().quantity, qty(1));
    assert_conserved(store, book, 2).await;

    store.release(line.id, Removal::One).await.unwrap();
    assert!(matches!(
        store.get_line(line.id).await,
        Err(StoreError::LineNotFound(_))
    ));
    assert_eq!(store.get_book(book).await.unwrap().stock, 2);

    assert!(matches!(
        store.release(line.id, Removal::One).await,
        Err(StoreError::LineNotFound(_))
    ));
}

pub async fn over_removal_changes_nothing<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 5)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    let line = store.reserve(cart.id, book, qty(2)).await.unwrap();

    assert!(matches!(
        store.release(line.id, Removal::Units(qty(3))).await,
        Err(StoreError::LineQuantityExceeded { .. })
    ));
    assert_eq!(store.get_line(line.id).await.unwrap().quantity, qty(2));
    assert_eq!(store.get_book(book).await.unwrap().stock, 3);

    let released = store.release(line.id, Removal::All).await.unwrap();
    assert_eq!(released.quantity, qty(2));
    assert_eq!(store.get_book(book).await.unwrap().stock, 5);
}

pub async fn clear_restores_every_line<S: BookstoreStore>(store: &S) {
    let x = store.create_book(draft("X", 5)).await.unwrap();
    let y = store.create_book(draft("Y", 5)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    store.reserve(cart.id, x, qty(2)).await.unwrap();
    store.reserve(cart.id, y, qty(1)).await.unwrap();

    let mut released = store.release_cart(cart.id).await.unwrap();
    released.sort_by_key(|r| r.book_id);

    let mut expected = vec![(x, qty(2)), (y, qty(1))];
    expected.sort_by_key(|(id, _)| *id);
    let got: Vec<_> = released.iter().map(|r| (r.book_id, r.quantity)).collect();
    assert_eq!(got, expected);

    assert_eq!(store.get_book(x).await.unwrap().stock, 5);
    assert_eq!(store.get_book(y).await.unwrap().stock, 5);
    // The cart survives, empty.
    assert!(store.get_lines(cart.id).await.unwrap().is_empty());
    assert_eq!(
        store.get_or_create_cart(&UserId::new("alice")).await.unwrap().id,
        cart.id
    );
}

pub async fn clear_leaves_other_carts_alone<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 5)).await.unwrap();
    let alice = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    let bob = store.get_or_create_cart(&UserId::new("bob")).await.unwrap();
    store.reserve(alice.id, book, qty(2)).await.unwrap();
    store.reserve(bob.id, book, qty(1)).await.unwrap();

    store.release_cart(alice.id).await.unwrap();

    assert_eq!(store.get_lines(bob.id).await.unwrap().len(), 1);
    assert_eq!(store.get_book(book).await.unwrap().stock, 4);
    assert_conserved(store, book, 5).await;
}

pub async fn unknown_cart_is_not_found<S: BookstoreStore>(store: &S) {
    let cart = store::CartId::new();
    assert!(matches!(
        store.get_lines(cart).await,
        Err(StoreError::CartNotFound(_))
    ));
    assert!(matches!(
        store.release_cart(cart).await,
        Err(StoreError::CartNotFound(_))
    ));
}

pub async fn soft_deleted_book_can_still_be_released<S: BookstoreStore>(store: &S) {
    let book = store.create_book(draft("Dune", 3)).await.unwrap();
    let cart = store.get_or_create_cart(&UserId::new("alice")).await.unwrap();
    let line = store.reserve(cart.id, book, qty(2)).await.unwrap();

    store.delete_book(book).await.unwrap();

    assert!(matches!(
        store.reserve(cart.id, book, qty(1)).await,
        Err(StoreError::BookNotFound(_))
    ));
    let released = store.release(line.id, Removal::All).await.unwrap();
    assert_eq!(released.quantity, qty(2));
    assert_eq!(store.reserved_quantity(book).await.unwrap(), 0);
}

/// `attempts` concurrent single-copy reservations from distinct users
/// against a book with `stock` copies.
pub async fn concurrent_reservations_never_oversell<S: BookstoreStore>(
    store: &S,
    stock: u32,
    attempts: usize,
) {
    let book = store.create_book(draft("Scarce", stock)).await.unwrap();

    let mut carts = Vec::with_capacity(attempts);
    for i in 0..attempts {
        let user = UserId::new(format!("user-{i}"));
        carts.push(store.get_or_create_cart(&user).await.unwrap().id);
    }

    let results = join_all(
        carts
            .iter()
            .map(|cart| store.reserve(*cart, book, Quantity::ONE)),
    )
    .await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::InsufficientStock { .. })))
        .count();

    let expected = (stock as usize).min(attempts);
    assert_eq!(successes, expected);
    assert_eq!(refused, attempts - expected);
    assert_eq!(store.get_book(book).await.unwrap().stock, i64::from(stock) - expected as i64);
    assert_conserved(store, book, i64::from(stock)).await;
}
