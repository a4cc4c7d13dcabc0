// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Book catalog.
//!
//! The catalog owns every [`Book`] and its copy counters. Title, author and
//! ISBN are immutable once registered; the available-copy counter lives
//! behind a per-book lock and is only moved by the loan engine's
//! checkouts and returns.
//!
//! # Example
//!
//! ```
//! use library_loans_rs::{Catalog, NewBook};
//!
//! let catalog = Catalog::new();
//! let book = catalog.insert(NewBook::new("Dune", "Frank Herbert", "9780441013593", 3)).unwrap();
//! assert_eq!(book.available_copies(), 3);
//! ```

use crate::base::{BookId, deserialize_flag};
use crate::error::LoanError;
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Copy counters of a single book.
///
//  reserve: available > 0 ──► available - 1
//  release: available < total ──► available + 1
//           available == total ──► InventoryCorruption
#[derive(Debug)]
pub(crate) struct Inventory {
    total: u32,
    available: u32,
}

impl Inventory {
    fn new(total: u32, available: u32) -> Self {
        Self { total, available }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available <= self.total,
            "Invariant violated: available copies {} exceed total {}",
            self.available,
            self.total
        );
    }

    /// Takes one copy off the shelf.
    pub(crate) fn take(&mut self) -> Result<(), LoanError> {
        if self.available == 0 {
            return Err(LoanError::NoCopiesAvailable);
        }
        self.available -= 1;
        self.assert_invariants();
        Ok(())
    }

    /// Puts one copy back on the shelf.
    pub(crate) fn put_back(&mut self, book_id: BookId) -> Result<(), LoanError> {
        if self.available >= self.total {
            return Err(LoanError::InventoryCorruption(book_id));
        }
        self.available += 1;
        self.assert_invariants();
        Ok(())
    }

    pub(crate) fn available(&self) -> u32 {
        self.available
    }
}

/// Input for registering a book with the catalog.
///
/// `available_copies` defaults to `total_copies` when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_copies: u32,
    #[serde(default)]
    pub available_copies: Option<u32>,
    #[serde(default)]
    pub publish_date: Option<NaiveDate>,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
        total_copies: u32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            total_copies,
            available_copies: None,
            publish_date: None,
        }
    }

    pub fn with_available(mut self, available: u32) -> Self {
        self.available_copies = Some(available);
        self
    }

    pub fn published(mut self, date: NaiveDate) -> Self {
        self.publish_date = Some(date);
        self
    }
}

/// Point-in-time copy of a book's fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookSnapshot {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub total_copies: u32,
    pub available_copies: u32,
    pub publish_date: Option<NaiveDate>,
}

/// Catalog book.
#[derive(Debug)]
pub struct Book {
    id: BookId,
    title: String,
    author: String,
    isbn: String,
    publish_date: Option<NaiveDate>,
    inventory: Mutex<Inventory>,
}

impl Book {
    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn publish_date(&self) -> Option<NaiveDate> {
        self.publish_date
    }

    pub fn total_copies(&self) -> u32 {
        self.inventory.lock().total
    }

    pub fn available_copies(&self) -> u32 {
        self.inventory.lock().available
    }

    pub fn snapshot(&self) -> BookSnapshot {
        let inventory = self.inventory.lock();
        BookSnapshot {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            total_copies: inventory.total,
            available_copies: inventory.available,
            publish_date: self.publish_date,
        }
    }

    /// Exclusive access to the copy counters.
    pub(crate) fn inventory(&self) -> MutexGuard<'_, Inventory> {
        self.inventory.lock()
    }

    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.author.to_lowercase().contains(needle)
            || self.isbn.to_lowercase().contains(needle)
    }
}

impl Serialize for Book {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.snapshot().serialize(serializer)
    }
}

/// Filter for [`Catalog::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookQuery {
    /// Case-insensitive substring matched against title, author and ISBN.
    pub q: Option<String>,
    /// `Some(true)` keeps books with a copy on the shelf, `Some(false)` keeps
    /// fully lent-out books. Deserializes from `true/1/yes` or `false/0/no`.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub available: Option<bool>,
}

/// Concurrent book store.
#[derive(Debug)]
pub struct Catalog {
    books: DashMap<BookId, Arc<Book>>,
    isbns: DashMap<String, BookId>,
    next_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            isbns: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Registers a book, assigning the next sequential ID.
    ///
    /// # Errors
    ///
    /// - [`LoanError::InvalidInput`] - Empty title or ISBN, or more available than total copies.
    /// - [`LoanError::DuplicateIsbn`] - ISBN already belongs to another book.
    pub fn insert(&self, new_book: NewBook) -> Result<Arc<Book>, LoanError> {
        let isbn = new_book.isbn.trim().to_string();
        if isbn.is_empty() {
            return Err(LoanError::invalid("isbn is required"));
        }
        if new_book.title.trim().is_empty() {
            return Err(LoanError::invalid("title is required"));
        }
        let available = new_book.available_copies.unwrap_or(new_book.total_copies);
        if available > new_book.total_copies {
            return Err(LoanError::invalid(
                "available_copies cannot exceed total_copies",
            ));
        }

        // Claim the ISBN first so two concurrent inserts cannot both succeed.
        let book = match self.isbns.entry(isbn.clone()) {
            Entry::Occupied(_) => return Err(LoanError::DuplicateIsbn),
            Entry::Vacant(entry) => {
                let id = BookId(self.next_id.fetch_add(1, Ordering::SeqCst));
                entry.insert(id);
                Arc::new(Book {
                    id,
                    title: new_book.title,
                    author: new_book.author,
                    isbn,
                    publish_date: new_book.publish_date,
                    inventory: Mutex::new(Inventory::new(new_book.total_copies, available)),
                })
            }
        };

        self.books.insert(book.id, Arc::clone(&book));
        tracing::debug!(book_id = %book.id, isbn = %book.isbn, "registered book");
        Ok(book)
    }

    /// Retrieves a book by ID.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::BookNotFound`] if no book has this ID.
    pub fn get(&self, book_id: BookId) -> Result<Arc<Book>, LoanError> {
        self.books
            .get(&book_id)
            .map(|book| Arc::clone(book.value()))
            .ok_or(LoanError::BookNotFound)
    }

    /// Returns every book, ordered by title.
    pub fn books(&self) -> Vec<Arc<Book>> {
        let mut books: Vec<_> = self.books.iter().map(|b| Arc::clone(b.value())).collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        books
    }

    /// Returns snapshots of the books matching `query`, ordered by title.
    pub fn search(&self, query: &BookQuery) -> Vec<BookSnapshot> {
        let needle = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        self.books()
            .into_iter()
            .filter(|book| needle.as_deref().is_none_or(|n| book.matches(n)))
            .map(|book| book.snapshot())
            .filter(|snapshot| match query.available {
                Some(true) => snapshot.available_copies > 0,
                Some(false) => snapshot.available_copies == 0,
                None => true,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
