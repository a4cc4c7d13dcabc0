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

//! Property-based tests for the loan engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! checkout and return requests, valid or not.

use chrono::NaiveDate;
use library_loans_rs::{
    BookId, Caller, FixedClock, LoanEngine, LoanError, LoanFilter, LoanId, LoanQuery, NewBook,
    ReturnOutcome, Role, UserId,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Checkout { user: u32, book: u32, days: Option<i64> },
    Return { user: u32, loan: u32, role: Role },
    Advance { days: u64 },
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        6 => Just(Role::User),
        1 => Just(Role::Librarian),
        1 => Just(Role::Admin),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (1u32..=4, 1u32..=4, prop::option::of(-3i64..=40))
            .prop_map(|(user, book, days)| Op::Checkout { user, book, days }),
        4 => (1u32..=4, 1u32..=25, arb_role())
            .prop_map(|(user, loan, role)| Op::Return { user, loan, role }),
        1 => (0u64..=10).prop_map(|days| Op::Advance { days }),
    ]
}

/// Book 4 is never registered so lookups of it must fail.
fn setup(totals: &[u32]) -> (LoanEngine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    let engine = LoanEngine::new().with_clock(clock.clone());
    for (i, total) in totals.iter().enumerate() {
        engine
            .catalog()
            .insert(NewBook::new(format!("Book {i}"), "Author", format!("isbn-{i}"), *total))
            .unwrap();
    }
    (engine, clock)
}

fn caller(user: u32, role: Role) -> Caller {
    Caller::new(UserId(user), format!("user{user}"), role)
}

fn apply(engine: &LoanEngine, clock: &FixedClock, op: &Op) {
    match op {
        Op::Checkout { user, book, days } => {
            let _ = engine.checkout(&caller(*user, Role::User), BookId(*book), *days);
        }
        Op::Return { user, loan, role } => {
            let _ = engine.return_loan(&caller(*user, *role), LoanId(*loan));
        }
        Op::Advance { days } => clock.advance(*days),
    }
}

fn check_invariants(engine: &LoanEngine) -> Result<(), TestCaseError> {
    let today = engine.today();
    let mut open_per_book: HashMap<BookId, u32> = HashMap::new();
    let mut open_pairs = HashSet::new();

    for loan in engine.ledger().list(LoanFilter::default().open_only(), today) {
        *open_per_book.entry(loan.book().id()).or_default() += 1;
        prop_assert!(
            open_pairs.insert((loan.user_id(), loan.book().id())),
            "two open loans for user {} and book {}",
            loan.user_id(),
            loan.book().id()
        );
    }

    for book in engine.catalog().books() {
        let snapshot = book.snapshot();
        prop_assert!(snapshot.available_copies <= snapshot.total_copies);
        let lent = open_per_book.get(&snapshot.id).copied().unwrap_or(0);
        prop_assert_eq!(snapshot.available_copies + lent, snapshot.total_copies);
    }

    prop_assert_eq!(engine.ledger().open_count(), open_pairs.len());
    Ok(())
}

// =============================================================================
// Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Copies are conserved and never over- or under-counted.
    #[test]
    fn copies_are_conserved(
        totals in prop::collection::vec(0u32..=3, 3),
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let (engine, clock) = setup(&totals);

        for op in &ops {
            apply(&engine, &clock, op);
            check_invariants(&engine)?;
        }
    }

    /// Due dates always lie after the checkout date by the requested period.
    #[test]
    fn due_date_matches_period(
        days in 1i64..=100_000,
        offset in 0u64..=1000,
    ) {
        let (engine, clock) = setup(&[1]);
        clock.advance(offset);

        let loan = engine
            .checkout(&caller(1, Role::User), BookId(1), Some(days))
            .unwrap();
        prop_assert_eq!((loan.due_date() - loan.checkout_date()).num_days(), days);
        prop_assert_eq!(loan.checkout_date(), engine.today());
    }

    /// Non-positive periods are always rejected without side effects.
    #[test]
    fn non_positive_days_rejected(days in i64::MIN..=0) {
        let (engine, _clock) = setup(&[2]);

        let result = engine.checkout(&caller(1, Role::User), BookId(1), Some(days));
        prop_assert!(matches!(result, Err(LoanError::InvalidInput(_))));
        prop_assert_eq!(engine.catalog().get(BookId(1)).unwrap().available_copies(), 2);
        prop_assert!(engine.ledger().is_empty());
    }

    /// Returning a loan any number of times releases exactly one copy.
    #[test]
    fn repeated_returns_release_once(repeats in 1usize..10, total in 1u32..=5) {
        let (engine, _clock) = setup(&[total]);
        let owner = caller(1, Role::User);
        let loan = engine.checkout(&owner, BookId(1), None).unwrap();

        let mut returned = 0;
        for _ in 0..repeats {
            if engine.return_loan(&owner, loan.id()).unwrap() == ReturnOutcome::Returned {
                returned += 1;
            }
        }

        prop_assert_eq!(returned, 1);
        prop_assert_eq!(engine.catalog().get(BookId(1)).unwrap().available_copies(), total);
    }

    /// Plain users never see somebody else's loans.
    #[test]
    fn users_see_only_own_loans(
        ops in prop::collection::vec(arb_op(), 1..40),
        viewer in 1u32..=4,
    ) {
        let (engine, clock) = setup(&[2, 2, 2]);
        for op in &ops {
            apply(&engine, &clock, op);
        }

        let me = caller(viewer, Role::User);
        for loan in engine.loans(&me, LoanQuery::default()) {
            prop_assert_eq!(loan.user_id, me.id);
        }
        for loan in engine.loans(&me, LoanQuery { overdue: true }) {
            prop_assert!(loan.return_date.is_none());
            prop_assert!(loan.due_date < engine.today());
        }
    }
}
