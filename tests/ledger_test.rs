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

//! Loan ledger integration tests.
//!
//! Outside the crate the ledger is a read-only view: loans are opened by
//! `checkout` and closed by `return_loan`, and these tests observe the
//! results through `LoanEngine::ledger`.

use chrono::NaiveDate;
use library_loans_rs::{
    BookId, Caller, FixedClock, LoanEngine, LoanError, LoanFilter, LoanId, LoanStatus, NewBook,
    ReturnOutcome, Role, UserId,
};
use std::sync::Arc;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
}

fn user(id: u32) -> Caller {
    Caller::user(id, format!("user{id}"))
}

fn setup() -> (LoanEngine, Arc<FixedClock>, BookId, BookId) {
    let clock = Arc::new(FixedClock::new(day(1)));
    let engine = LoanEngine::new().with_clock(clock.clone());
    let dune = engine
        .catalog()
        .insert(NewBook::new("Dune", "Frank Herbert", "111", 5))
        .unwrap()
        .id();
    let emma = engine
        .catalog()
        .insert(NewBook::new("Emma", "Jane Austen", "222", 5))
        .unwrap()
        .id();
    (engine, clock, dune, emma)
}

/// Three loans:
/// - #1 user 1, Dune, out 4/01, due 4/10, returned 4/05
/// - #2 user 1, Emma, out 4/02, due 4/12, open
/// - #3 user 2, Dune, out 4/03, due 4/30, open
fn populated() -> (LoanEngine, Arc<FixedClock>) {
    let (engine, clock, dune, emma) = setup();
    let first = engine.checkout(&user(1), dune, Some(9)).unwrap();
    clock.set(day(2));
    engine.checkout(&user(1), emma, Some(10)).unwrap();
    clock.set(day(3));
    engine.checkout(&user(2), dune, Some(27)).unwrap();
    clock.set(day(5));
    assert_eq!(engine.return_loan(&user(1), first.id()), Ok(ReturnOutcome::Returned));
    (engine, clock)
}

fn ids(engine: &LoanEngine, filter: LoanFilter, today: NaiveDate) -> Vec<u32> {
    engine.ledger().list(filter, today).map(|l| l.id().0).collect()
}

#[test]
fn ledger_tracks_checkouts_and_returns() {
    let (engine, _clock, dune, _) = setup();
    let loan = engine.checkout(&user(1), dune, None).unwrap();

    let view = engine.ledger();
    assert_eq!(view.len(), 1);
    assert_eq!(view.open_count(), 1);
    assert!(view.has_open_loan(UserId(1), dune));
    assert_eq!(view.get(loan.id()).unwrap().status(), LoanStatus::Open);

    engine.return_loan(&user(1), loan.id()).unwrap();

    assert_eq!(view.len(), 1);
    assert_eq!(view.open_count(), 0);
    assert!(!view.has_open_loan(UserId(1), dune));
    assert_eq!(view.get(loan.id()).unwrap().status(), LoanStatus::Closed);
}

/// Every open loan in the view holds exactly one reserved copy.
#[test]
fn open_loans_match_reserved_copies() {
    let (engine, _clock) = populated();
    let open: Vec<_> = engine
        .ledger()
        .list(LoanFilter::default().open_only(), engine.today())
        .collect();

    for book in engine.catalog().books() {
        let lent = open.iter().filter(|l| l.book().id() == book.id()).count() as u32;
        assert_eq!(book.available_copies() + lent, book.total_copies());
    }
}

#[test]
fn loan_ids_are_sequential() {
    let (engine, _clock) = populated();
    assert_eq!(ids(&engine, LoanFilter::default(), day(6)), vec![3, 2, 1]);
}

#[test]
fn returned_loan_keeps_first_return_date() {
    let (engine, clock) = populated();
    clock.set(day(6));
    assert_eq!(
        engine.return_loan(&user(1), LoanId(1)),
        Ok(ReturnOutcome::AlreadyReturned)
    );

    let loan = engine.ledger().get(LoanId(1)).unwrap();
    assert_eq!(loan.status(), LoanStatus::Closed);
    assert_eq!(loan.return_date(), Some(day(5)));
}

#[test]
fn list_by_owner() {
    let (engine, _clock) = populated();
    let filter = LoanFilter::default().owned_by(UserId(1));
    assert_eq!(ids(&engine, filter, day(6)), vec![2, 1]);
}

#[test]
fn list_open_only() {
    let (engine, _clock) = populated();
    let filter = LoanFilter::default().open_only();
    assert_eq!(ids(&engine, filter, day(6)), vec![3, 2]);
}

#[test]
fn list_overdue_ignores_returned_loans() {
    let (engine, _clock) = populated();

    // #1 was due 4/10 but came back on time; #2 is late from 4/13.
    assert_eq!(ids(&engine, LoanFilter::default().overdue(true), day(12)), Vec::<u32>::new());
    assert_eq!(ids(&engine, LoanFilter::default().overdue(true), day(13)), vec![2]);
    assert_eq!(ids(&engine, LoanFilter::default().overdue(false), day(13)), vec![3, 1]);
}

#[test]
fn list_combines_filters() {
    let (engine, _clock) = populated();
    let filter = LoanFilter::default()
        .owned_by(UserId(2))
        .open_only()
        .overdue(true);
    assert!(ids(&engine, filter, day(30)).is_empty());
    assert_eq!(
        ids(&engine, filter, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()),
        vec![3]
    );
}

#[test]
fn borrower_rendered_with_role() {
    let (engine, _clock, dune, _) = setup();
    let librarian = Caller::new(UserId(9), "libby", Role::Librarian);
    let loan = engine.checkout(&librarian, dune, None).unwrap();

    assert_eq!(loan.username(), "libby");
    assert_eq!(loan.role(), Role::Librarian);
    assert_eq!(loan.snapshot().user, "libby (librarian)");
}

#[test]
fn get_unknown_loan() {
    let (engine, _clock, _, _) = setup();
    assert_eq!(engine.ledger().get(LoanId(1)).unwrap_err(), LoanError::LoanNotFound);
}
