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

//! Availability coordination.
//!
//! Every change to a book's available-copy counter goes through the
//! [`AvailabilityCoordinator`]. The check and the mutation happen under the
//! book's own lock, so operations on the same book are linearizable while
//! operations on different books never contend.
//!
//! A successful [`reserve`](AvailabilityCoordinator::reserve) hands back a
//! [`Reservation`]. Dropping it without calling
//! [`commit`](Reservation::commit) puts the copy back, so an early return or
//! a panic between reserving and recording the loan cannot leak a copy.

use crate::base::BookId;
use crate::catalog::{Book, Catalog};
use crate::error::LoanError;
use std::sync::Arc;

/// Serializes counter mutations per book.
#[derive(Debug)]
pub(crate) struct AvailabilityCoordinator {
    catalog: Arc<Catalog>,
}

impl AvailabilityCoordinator {
    pub(crate) fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Takes one copy of `book_id` off the shelf.
    ///
    /// # Errors
    ///
    /// - [`LoanError::BookNotFound`] - No book with this ID.
    /// - [`LoanError::NoCopiesAvailable`] - Every copy is already lent out.
    pub(crate) fn reserve(&self, book_id: BookId) -> Result<Reservation, LoanError> {
        let book = self.catalog.get(book_id)?;
        reserve_copy(&book)?;
        Ok(Reservation {
            book,
            armed: true,
        })
    }

    /// Puts one copy of `book_id` back on the shelf.
    ///
    /// # Errors
    ///
    /// - [`LoanError::BookNotFound`] - No book with this ID.
    /// - [`LoanError::InventoryCorruption`] - Every copy is already on the shelf.
    pub(crate) fn release(&self, book_id: BookId) -> Result<(), LoanError> {
        let book = self.catalog.get(book_id)?;
        release_copy(&book)
    }
}

fn reserve_copy(book: &Book) -> Result<(), LoanError> {
    let mut inventory = book.inventory();
    inventory.take()?;
    tracing::debug!(
        book_id = %book.id(),
        available = inventory.available(),
        "reserved copy"
    );
    Ok(())
}

fn release_copy(book: &Book) -> Result<(), LoanError> {
    let mut inventory = book.inventory();
    if let Err(e) = inventory.put_back(book.id()) {
        tracing::error!(book_id = %book.id(), error = %e, "release rejected");
        return Err(e);
    }
    tracing::debug!(
        book_id = %book.id(),
        available = inventory.available(),
        "released copy"
    );
    Ok(())
}

/// A copy taken off the shelf on behalf of a pending checkout.
///
/// Released on drop unless committed.
#[must_use = "dropping a reservation releases the copy"]
#[derive(Debug)]
pub(crate) struct Reservation {
    book: Arc<Book>,
    armed: bool,
}

impl Reservation {
    pub(crate) fn book(&self) -> &Arc<Book> {
        &self.book
    }

    /// Keeps the copy reserved; the loan record now accounts for it.
    pub(crate) fn commit(mut self) -> Arc<Book> {
        self.armed = false;
        Arc::clone(&self.book)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(book_id = %self.book.id(), "rolling back reservation");
            // Errors are already logged by release_copy; there is no caller to hand them to.
            let _ = release_copy(&self.book);
        }
    }
}
