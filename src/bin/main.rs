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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use library_loans_rs::{
    BookId, Caller, Catalog, EngineConfig, FixedClock, LoanEngine, LoanError, LoanId, NewBook,
    Role, UserId,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Library Loans - Replay circulation requests against a catalog
///
/// Loads a book catalog, replays checkout/return requests in order and
/// writes the resulting loans (or book availability) as CSV to stdout.
#[derive(Parser, Debug)]
#[command(name = "library-loans-rs")]
#[command(about = "A loan engine that replays library circulation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with the book catalog
    ///
    /// Expected format: title,author,isbn,total_copies,available_copies,publish_date
    /// Books receive IDs 1, 2, 3, ... in file order.
    #[arg(long, value_name = "FILE")]
    catalog: PathBuf,

    /// Path to CSV file with circulation requests
    ///
    /// Expected format: action,user,role,book,days,loan,date
    /// Example: cargo run -- --catalog books.csv requests.csv > loans.csv
    #[arg(value_name = "FILE")]
    requests: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write book availability instead of loans
    #[arg(long)]
    books: bool,
}

fn main() {
    let args = Args::parse();

    let config = match EngineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };
    init_tracing(&config);

    let catalog = match open(&args.catalog).and_then(load_catalog) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Error loading catalog '{}': {}", args.catalog.display(), e);
            process::exit(1);
        }
    };

    let engine = match LoanEngine::with_config(config) {
        Ok(engine) => engine.with_catalog(Arc::new(catalog)),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let clock = Arc::new(FixedClock::new(engine.today()));
    let engine = engine.with_clock(clock.clone());

    if let Err(e) = open(&args.requests).and_then(|f| process_requests(&engine, &clock, f)) {
        eprintln!("Error processing requests: {}", e);
        process::exit(1);
    }

    let written = if args.books {
        write_books(&engine, std::io::stdout())
    } else {
        write_loans(&engine, std::io::stdout())
    };
    if let Err(e) = written {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(path: &Path) -> Result<BufReader<File>, csv::Error> {
    Ok(BufReader::new(File::open(path)?))
}

/// Loads books from a CSV reader into a fresh catalog.
///
/// Rows that fail to parse or are rejected by the catalog (duplicate ISBN,
/// more available than total copies) are skipped with a warning.
pub fn load_catalog<R: Read>(reader: R) -> Result<Catalog, csv::Error> {
    let catalog = Catalog::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<NewBook>() {
        match result {
            Ok(book) => {
                if let Err(e) = catalog.insert(book) {
                    tracing::warn!(error = %e, "skipping catalog row");
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed catalog row"),
        }
    }

    Ok(catalog)
}

/// Raw CSV record matching the request format.
///
/// Fields: `action, user, role, book, days, loan, date`
#[derive(Debug, Deserialize)]
struct RequestRecord {
    action: String,
    user: u32,
    /// Parsed with `Role::from_str`; blank means `user`.
    #[serde(default)]
    role: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    book: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    days: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loan: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    date: Option<NaiveDate>,
}

impl RequestRecord {
    fn caller(&self) -> Result<Caller, LoanError> {
        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => Role::default(),
            Some(role) => role.parse()?,
        };
        Ok(Caller::new(UserId(self.user), format!("user{}", self.user), role))
    }

    /// Applies the request to the engine.
    fn apply(&self, engine: &LoanEngine) -> Result<(), LoanError> {
        let caller = self.caller()?;
        match self.action.to_lowercase().as_str() {
            "checkout" => {
                let book = self
                    .book
                    .ok_or_else(|| LoanError::InvalidInput("book_id is required".into()))?;
                engine.checkout(&caller, BookId(book), self.days)?;
            }
            "return" => {
                let loan = self
                    .loan
                    .ok_or_else(|| LoanError::InvalidInput("loan_id is required".into()))?;
                engine.return_loan(&caller, LoanId(loan))?;
            }
            other => {
                return Err(LoanError::InvalidInput(format!("unknown action '{other}'")));
            }
        }
        Ok(())
    }
}

/// Replays circulation requests from a CSV reader.
///
/// Requests are applied in file order. A `date` column sets the replay clock
/// before the request is applied; rows without one run on the previous row's
/// date. Rejected requests, including rows with an unknown role, are logged
/// and skipped.
///
/// # CSV Format
///
/// ```csv
/// action,user,role,book,days,loan,date
/// checkout,1,user,1,14,,2025-03-01
/// checkout,2,user,1,,,2025-03-02
/// return,9,librarian,,,1,2025-03-10
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails. Individual request errors don't
/// stop processing; [`LoanError::InventoryCorruption`] is logged at error
/// level, every other rejection as a warning.
pub fn process_requests<R: Read>(
    engine: &LoanEngine,
    clock: &FixedClock,
    reader: R,
) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<RequestRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line + 2, error = %e, "skipping malformed request row");
                continue;
            }
        };

        if let Some(date) = record.date {
            clock.set(date);
        }

        match record.apply(engine) {
            Ok(()) => {}
            Err(e) if e.is_client_error() => {
                tracing::warn!(line = line + 2, action = %record.action, code = e.code(), "request rejected: {e}");
            }
            Err(e) => {
                tracing::error!(line = line + 2, code = e.code(), "integrity failure: {e}");
            }
        }
    }

    Ok(())
}

/// Flat CSV row for a loan.
#[derive(Debug, Serialize)]
struct LoanRow {
    id: LoanId,
    user_id: UserId,
    user: String,
    book_id: BookId,
    isbn: String,
    checkout_date: NaiveDate,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
}

/// Writes every loan, newest checkout first.
///
/// # CSV Format
///
/// Columns: `id, user_id, user, book_id, isbn, checkout_date, due_date, return_date`
pub fn write_loans<W: Write>(engine: &LoanEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let admin = Caller::new(UserId(0), "report", Role::Admin);
    for loan in engine.loans(&admin, Default::default()) {
        wtr.serialize(LoanRow {
            id: loan.id,
            user_id: loan.user_id,
            user: loan.user,
            book_id: loan.book.id,
            isbn: loan.book.isbn,
            checkout_date: loan.checkout_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes every book with its copy counts, ordered by title.
///
/// # CSV Format
///
/// Columns: `id, title, author, isbn, total_copies, available_copies, publish_date`
pub fn write_books<W: Write>(engine: &LoanEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for book in engine.catalog().books() {
        wtr.serialize(&*book)?;
    }

    wtr.flush()?;
    Ok(())
}
