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

//! Loan records.
//!
//! A loan is created open by a successful checkout and closed exactly once by
//! a return. There is no way back:
//!
//! ```text
//! Open ──return──► Closed
//! ```

use crate::base::{LoanId, UserId};
use crate::catalog::{Book, BookSnapshot};
use crate::identity::Role;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Closed,
}

/// Result of closing a loan.
///
/// A repeated close is not an error: the first caller to flip the loan wins
/// and everyone after it observes [`CloseOutcome::AlreadyClosed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    AlreadyClosed,
}

/// A loan of one copy of a book to one user.
#[derive(Debug)]
pub struct Loan {
    id: LoanId,
    user_id: UserId,
    username: String,
    /// Borrower's role at checkout time.
    role: Role,
    book: Arc<Book>,
    checkout_date: NaiveDate,
    due_date: NaiveDate,
    /// `None` while the loan is open.
    return_date: Mutex<Option<NaiveDate>>,
}

impl Loan {
    pub(crate) fn open(
        id: LoanId,
        user_id: UserId,
        username: String,
        role: Role,
        book: Arc<Book>,
        checkout_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            user_id,
            username,
            role,
            book,
            checkout_date,
            due_date,
            return_date: Mutex::new(None),
        }
    }

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn book(&self) -> &Arc<Book> {
        &self.book
    }

    pub fn checkout_date(&self) -> NaiveDate {
        self.checkout_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        *self.return_date.lock()
    }

    pub fn status(&self) -> LoanStatus {
        match self.return_date() {
            None => LoanStatus::Open,
            Some(_) => LoanStatus::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == LoanStatus::Open
    }

    /// Open and past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date < today
    }

    /// Flips the loan to closed, then runs `on_close` while still holding the
    /// loan's lock.
    ///
    /// Only the caller that observes the loan open gets [`CloseOutcome::Closed`].
    pub(crate) fn close_with(&self, today: NaiveDate, on_close: impl FnOnce()) -> CloseOutcome {
        let mut return_date = self.return_date.lock();
        if return_date.is_some() {
            return CloseOutcome::AlreadyClosed;
        }
        *return_date = Some(today);
        on_close();
        CloseOutcome::Closed
    }

    pub fn snapshot(&self) -> LoanSnapshot {
        LoanSnapshot {
            id: self.id,
            user_id: self.user_id,
            user: format!("{} ({})", self.username, self.role),
            book: self.book.snapshot(),
            checkout_date: self.checkout_date,
            due_date: self.due_date,
            return_date: self.return_date(),
        }
    }
}

/// Serializable view of a loan, embedding the book as it is right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSnapshot {
    pub id: LoanId,
    pub user_id: UserId,
    /// Borrower rendered as `username (role)`.
    pub user: String,
    pub book: BookSnapshot,
    pub checkout_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}
