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

//! # Library Loans
//!
//! This library provides a loan lifecycle engine for library circulation:
//! checking books out, returning them, and keeping every book's available
//! copy count consistent under concurrent requests.
//!
//! ## Core Components
//!
//! - [`LoanEngine`]: Validates and orchestrates checkouts and returns
//! - [`Catalog`]: Book store with per-book copy counters
//! - Availability coordinator: serializes reserve/release per book
//! - [`LoanLedger`]: Loan records and queries, read-only outside the engine
//! - [`LoanError`]: Error types for rejected requests
//!
//! ## Example
//!
//! ```
//! use library_loans_rs::{Caller, LoanEngine, NewBook, ReturnOutcome};
//!
//! let engine = LoanEngine::new();
//! let book = engine
//!     .catalog()
//!     .insert(NewBook::new("Dune", "Frank Herbert", "9780441013593", 2))
//!     .unwrap();
//!
//! // Borrow for the default period
//! let alice = Caller::user(1, "alice");
//! let loan = engine.checkout(&alice, book.id(), None).unwrap();
//! assert_eq!(book.available_copies(), 1);
//!
//! // Returning twice is harmless
//! assert_eq!(engine.return_loan(&alice, loan.id()).unwrap(), ReturnOutcome::Returned);
//! assert_eq!(engine.return_loan(&alice, loan.id()).unwrap(), ReturnOutcome::AlreadyReturned);
//! assert_eq!(book.available_copies(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! Every book guards its counters with its own lock, so checkouts and returns
//! of different books proceed in parallel while operations on the same book
//! are serialized.

mod base;
pub mod catalog;
mod clock;
pub mod config;
mod coordinator;
mod engine;
pub mod error;
mod identity;
pub mod ledger;
mod loan;

pub use base::{BookId, LoanId, UserId};
pub use catalog::{Book, BookQuery, BookSnapshot, Catalog, NewBook};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{LoanEngine, LoanQuery, ReturnOutcome};
pub use error::LoanError;
pub use identity::{Caller, Role};
pub use ledger::{LoanFilter, LoanLedger};
pub use loan::{CloseOutcome, Loan, LoanSnapshot, LoanStatus};
