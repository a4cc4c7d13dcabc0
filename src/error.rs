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

//! Error types for loan processing.

use crate::base::BookId;
use thiserror::Error;

/// Loan processing errors.
///
/// Every variant except [`LoanError::InventoryCorruption`] is a rejected
/// request that leaves the catalog and the ledger untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoanError {
    /// Referenced book does not exist in the catalog
    #[error("book not found")]
    BookNotFound,

    /// Referenced loan does not exist in the ledger
    #[error("loan not found")]
    LoanNotFound,

    /// Every copy of the book is currently lent out
    #[error("no available copies")]
    NoCopiesAvailable,

    /// The user already holds an open loan for this book
    #[error("user already has an active loan for this book")]
    DuplicateActiveLoan,

    /// Request is missing a field or carries an out-of-range value
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Caller may not act on this loan (ownership or role check failed)
    #[error("forbidden")]
    Forbidden,

    /// ISBN is already registered to another book
    #[error("isbn already registered")]
    DuplicateIsbn,

    /// A release would push available copies above the total
    #[error("inventory corruption detected for book {0}")]
    InventoryCorruption(BookId),
}

impl LoanError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            LoanError::BookNotFound => "BOOK_NOT_FOUND",
            LoanError::LoanNotFound => "LOAN_NOT_FOUND",
            LoanError::NoCopiesAvailable => "NO_COPIES_AVAILABLE",
            LoanError::DuplicateActiveLoan => "DUPLICATE_ACTIVE_LOAN",
            LoanError::InvalidInput(_) => "INVALID_INPUT",
            LoanError::Forbidden => "FORBIDDEN",
            LoanError::DuplicateIsbn => "DUPLICATE_ISBN",
            LoanError::InventoryCorruption(_) => "INVENTORY_CORRUPTION",
        }
    }

    /// Returns `true` for business-rule rejections the caller can act on.
    ///
    /// Only [`LoanError::InventoryCorruption`] is an internal integrity alarm.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LoanError::InventoryCorruption(_))
    }

    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        LoanError::InvalidInput(detail.into())
    }
}
