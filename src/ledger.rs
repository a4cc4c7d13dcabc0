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

//! Loan ledger.
//!
//! Stores every loan ever created and indexes the open ones by
//! `(user, book)`. The index is what enforces "at most one open loan per user
//! per book": a checkout must first claim the pair through
//! `LoanLedger::claim`, and the claim is only turned into a loan by
//! `LoanLedger::create`.
//!
//! Only the loan engine opens and closes loans. Outside the crate the ledger
//! is read-only:
//!
//! ```compile_fail
//! use library_loans_rs::{LoanEngine, LoanId};
//!
//! let engine = LoanEngine::new();
//! engine.ledger().close(LoanId(1), engine.today());
//! ```
//!
//! ```compile_fail
//! use library_loans_rs::{BookId, LoanEngine, UserId};
//!
//! let engine = LoanEngine::new();
//! let _slot = engine.ledger().claim(UserId(1), BookId(1));
//! ```

use crate::base::{BookId, LoanId, UserId};
use crate::catalog::Book;
use crate::error::LoanError;
use crate::identity::Caller;
use crate::loan::{CloseOutcome, Loan};
use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

type OpenKey = (UserId, BookId);

/// Filter for [`LoanLedger::list`]. The default matches every loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanFilter {
    pub owner: Option<UserId>,
    /// `Some(true)` keeps overdue loans only, `Some(false)` drops them.
    pub overdue: Option<bool>,
    pub open_only: bool,
}

impl LoanFilter {
    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.owner = Some(user_id);
        self
    }

    pub fn overdue(mut self, overdue: bool) -> Self {
        self.overdue = Some(overdue);
        self
    }

    pub fn open_only(mut self) -> Self {
        self.open_only = true;
        self
    }

    fn matches(&self, loan: &Loan, today: NaiveDate) -> bool {
        if self.owner.is_some_and(|owner| owner != loan.user_id()) {
            return false;
        }
        if self.open_only && !loan.is_open() {
            return false;
        }
        match self.overdue {
            Some(wanted) => loan.is_overdue(today) == wanted,
            None => true,
        }
    }
}

/// An exclusive claim on the open-loan slot of a `(user, book)` pair.
///
/// Released on drop unless consumed by `LoanLedger::create`.
#[must_use = "dropping a claim frees the slot"]
#[derive(Debug)]
pub(crate) struct OpenSlot<'a> {
    ledger: &'a LoanLedger,
    key: OpenKey,
    filled: bool,
}

impl Drop for OpenSlot<'_> {
    fn drop(&mut self) {
        if !self.filled {
            self.ledger
                .open
                .remove_if(&self.key, |_, loan_id| loan_id.is_none());
        }
    }
}

/// Concurrent loan store.
#[derive(Debug)]
pub struct LoanLedger {
    loans: DashMap<LoanId, Arc<Loan>>,
    /// Open loans by `(user, book)`. `None` marks a checkout still in progress.
    open: DashMap<OpenKey, Option<LoanId>>,
    next_id: AtomicU32,
}

impl LoanLedger {
    pub fn new() -> Self {
        Self {
            loans: DashMap::new(),
            open: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Claims the open-loan slot for `(user_id, book_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::DuplicateActiveLoan`] if the user already holds an
    /// open loan for the book or another checkout for the pair is in flight.
    pub(crate) fn claim(&self, user_id: UserId, book_id: BookId) -> Result<OpenSlot<'_>, LoanError> {
        let key = (user_id, book_id);

        // Use entry API for atomic check-and-insert to prevent race conditions
        match self.open.entry(key) {
            Entry::Occupied(_) => Err(LoanError::DuplicateActiveLoan),
            Entry::Vacant(entry) => {
                entry.insert(None);
                Ok(OpenSlot {
                    ledger: self,
                    key,
                    filled: false,
                })
            }
        }
    }

    /// Records a new open loan in a claimed slot.
    ///
    /// `due_date` must not precede `checkout_date`.
    pub(crate) fn create(
        &self,
        mut slot: OpenSlot<'_>,
        borrower: &Caller,
        book: Arc<Book>,
        checkout_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Arc<Loan> {
        debug_assert_eq!(slot.key, (borrower.id, book.id()), "slot claimed for another pair");
        debug_assert!(due_date >= checkout_date);

        let (user_id, book_id) = slot.key;
        let id = LoanId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let loan = Arc::new(Loan::open(
            id,
            user_id,
            borrower.username.clone(),
            borrower.role,
            book,
            checkout_date,
            due_date,
        ));

        self.loans.insert(id, Arc::clone(&loan));
        self.open.insert(slot.key, Some(id));
        slot.filled = true;

        tracing::debug!(loan_id = %id, user_id = %user_id, book_id = %book_id, %due_date, "opened loan");
        loan
    }

    /// Retrieves a loan by ID.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::LoanNotFound`] if no loan has this ID.
    pub fn get(&self, loan_id: LoanId) -> Result<Arc<Loan>, LoanError> {
        self.loans
            .get(&loan_id)
            .map(|loan| Arc::clone(loan.value()))
            .ok_or(LoanError::LoanNotFound)
    }

    /// Closes a loan by ID.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::LoanNotFound`] if no loan has this ID.
    pub(crate) fn close(&self, loan_id: LoanId, today: NaiveDate) -> Result<CloseOutcome, LoanError> {
        let loan = self.get(loan_id)?;
        Ok(self.close_loan(&loan, today))
    }

    /// Sets the return date and frees the `(user, book)` slot in one step.
    fn close_loan(&self, loan: &Loan, today: NaiveDate) -> CloseOutcome {
        let key = (loan.user_id(), loan.book().id());
        let outcome = loan.close_with(today, || {
            self.open
                .remove_if(&key, |_, open_id| *open_id == Some(loan.id()));
        });
        if outcome == CloseOutcome::Closed {
            tracing::debug!(loan_id = %loan.id(), return_date = %today, "closed loan");
        }
        outcome
    }

    /// Whether `user_id` holds an open loan for `book_id`.
    pub fn has_open_loan(&self, user_id: UserId, book_id: BookId) -> bool {
        self.open
            .get(&(user_id, book_id))
            .is_some_and(|slot| slot.is_some())
    }

    /// Loans matching `filter`, newest checkout first.
    ///
    /// Each call takes a fresh snapshot of the ledger; the returned iterator
    /// does not observe loans created after the call.
    pub fn list(
        &self,
        filter: LoanFilter,
        today: NaiveDate,
    ) -> impl Iterator<Item = Arc<Loan>> + use<> {
        let mut loans: Vec<Arc<Loan>> = self.loans.iter().map(|l| Arc::clone(l.value())).collect();
        loans.sort_by(|a, b| {
            b.checkout_date()
                .cmp(&a.checkout_date())
                .then(b.id().cmp(&a.id()))
        });
        loans
            .into_iter()
            .filter(move |loan| filter.matches(loan, today))
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    /// Number of loans currently open.
    pub fn open_count(&self) -> usize {
        self.open.iter().filter(|slot| slot.value().is_some()).count()
    }
}

impl Default for LoanLedger {
    fn default() -> Self {
        Self::new()
    }
}
