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

//! Loan policy engine.
//!
//! The [`LoanEngine`] is the only component callers talk to. It validates a
//! request against the lending rules and then drives the catalog, the
//! availability coordinator and the ledger as one logical operation.
//!
//! # Checkout
//!
//! Checks run in a fixed order so the most specific failure is reported first:
//!
//! 1. Loan period is valid ([`LoanError::InvalidInput`])
//! 2. Caller is active ([`LoanError::Forbidden`])
//! 3. Book exists ([`LoanError::BookNotFound`])
//! 4. No open loan for this user and book ([`LoanError::DuplicateActiveLoan`])
//! 5. A copy can be reserved ([`LoanError::NoCopiesAvailable`])
//!
//! Step 4 claims the `(user, book)` slot before step 5 reserves a copy, so two
//! concurrent checkouts by the same user cannot both pass the duplicate check.
//!
//! # Return
//!
//! Returns are idempotent. The first return closes the loan and releases the
//! copy; every later one reports [`ReturnOutcome::AlreadyReturned`] and
//! touches nothing.
//!
//! # Thread Safety
//!
//! Books and loans carry their own locks and live in [`DashMap`](dashmap::DashMap)s,
//! so requests for different books run in parallel.

use crate::base::{BookId, LoanId, deserialize_flag};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::coordinator::AvailabilityCoordinator;
use crate::error::LoanError;
use crate::identity::Caller;
use crate::ledger::{LoanFilter, LoanLedger};
use crate::loan::{CloseOutcome, Loan, LoanSnapshot};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

/// Successful outcomes of [`LoanEngine::return_loan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// This call closed the loan and released the copy.
    Returned,
    /// The loan was already closed; nothing changed.
    AlreadyReturned,
}

/// Caller-facing loan listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LoanQuery {
    /// Only loans that are open and past due. Set by `true/1/yes`; anything
    /// else leaves the listing unfiltered.
    #[serde(default, deserialize_with = "overdue_flag")]
    pub overdue: bool,
}

fn overdue_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_flag(deserializer)? == Some(true))
}

/// Loan lifecycle engine over a shared catalog.
pub struct LoanEngine {
    catalog: Arc<Catalog>,
    coordinator: AvailabilityCoordinator,
    ledger: LoanLedger,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl LoanEngine {
    /// Creates an engine with an empty catalog, default settings and the system clock.
    pub fn new() -> Self {
        Self::build(Arc::new(Catalog::new()), EngineConfig::default())
    }

    /// Creates an engine with custom settings.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::InvalidInput`] if the loan periods are inconsistent.
    pub fn with_config(config: EngineConfig) -> Result<Self, LoanError> {
        config.validate()?;
        Ok(Self::build(Arc::new(Catalog::new()), config))
    }

    /// Replaces the calendar source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs loans against an existing catalog.
    pub fn with_catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.coordinator = AvailabilityCoordinator::new(Arc::clone(&catalog));
        self.catalog = catalog;
        self
    }

    fn build(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        LoanEngine {
            coordinator: AvailabilityCoordinator::new(Arc::clone(&catalog)),
            catalog,
            ledger: LoanLedger::new(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &LoanLedger {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Lends one copy of `book_id` to `caller` for `days` (default from config).
    ///
    /// # Errors
    ///
    /// - [`LoanError::InvalidInput`] - `days` is zero or negative, above an optional configured
    ///   cap, or puts the due date past the calendar's range.
    /// - [`LoanError::Forbidden`] - Caller account is deactivated.
    /// - [`LoanError::BookNotFound`] - No book with this ID.
    /// - [`LoanError::DuplicateActiveLoan`] - Caller already has this book on loan.
    /// - [`LoanError::NoCopiesAvailable`] - Every copy is lent out.
    ///
    /// A failed checkout never changes the available-copy count.
    pub fn checkout(
        &self,
        caller: &Caller,
        book_id: BookId,
        days: Option<i64>,
    ) -> Result<Arc<Loan>, LoanError> {
        let days = self.config.loan_days(days)?;
        caller.ensure_active()?;

        let today = self.clock.today();
        let due_date = today
            .checked_add_days(Days::new(days))
            .ok_or_else(|| LoanError::invalid("due date out of range"))?;

        self.catalog.get(book_id)?;
        let slot = self.ledger.claim(caller.id, book_id)?;
        let reservation = self.coordinator.reserve(book_id)?;

        // From here on a failure drops `slot` and `reservation`, undoing both.
        let loan = self.ledger.create(
            slot,
            caller,
            Arc::clone(reservation.book()),
            today,
            due_date,
        );
        reservation.commit();

        tracing::info!(
            loan_id = %loan.id(),
            user_id = %caller.id,
            book_id = %book_id,
            %due_date,
            "checkout"
        );
        Ok(loan)
    }

    /// Returns the book lent under `loan_id`.
    ///
    /// # Errors
    ///
    /// - [`LoanError::LoanNotFound`] - No loan with this ID.
    /// - [`LoanError::Forbidden`] - Caller is deactivated, or neither owns the loan nor holds an elevated role.
    /// - [`LoanError::InventoryCorruption`] - The release found every copy already on the shelf.
    pub fn return_loan(&self, caller: &Caller, loan_id: LoanId) -> Result<ReturnOutcome, LoanError> {
        let loan = self.ledger.get(loan_id)?;
        caller.ensure_active()?;
        if !caller.can_act_for(loan.user_id()) {
            return Err(LoanError::Forbidden);
        }

        match self.ledger.close(loan_id, self.clock.today())? {
            CloseOutcome::AlreadyClosed => Ok(ReturnOutcome::AlreadyReturned),
            CloseOutcome::Closed => {
                self.coordinator.release(loan.book().id())?;
                tracing::info!(
                    loan_id = %loan_id,
                    user_id = %loan.user_id(),
                    book_id = %loan.book().id(),
                    returned_by = %caller.id,
                    "return"
                );
                Ok(ReturnOutcome::Returned)
            }
        }
    }

    /// Loans visible to `caller`, newest checkout first.
    ///
    /// Plain users only see their own loans; admins and librarians see all.
    pub fn loans(&self, caller: &Caller, query: LoanQuery) -> impl Iterator<Item = LoanSnapshot> + use<> {
        let mut filter = LoanFilter::default();
        if !caller.role.is_elevated() {
            filter = filter.owned_by(caller.id);
        }
        if query.overdue {
            filter = filter.overdue(true);
        }
        self.ledger
            .list(filter, self.clock.today())
            .map(|loan| loan.snapshot())
    }
}

impl Default for LoanEngine {
    fn default() -> Self {
        Self::new()
    }
}
