//! Row scanning.
//!
//! A [`RowScanner`] says where each column of a row goes and is told when a
//! row has landed there. One loop serves both "all rows" and "exactly one
//! row" scans; the cursor is closed on every path out of it.

use crate::driver::SqlRows;
use crate::error::{DbError, DbResult};
use crate::models::{ScanTarget, Value};
use std::future::Future;
use tracing::debug;

/// Scans database rows into arbitrary data structures.
///
/// # Slot reuse
///
/// [`RowScanner::targets`] must return the *same* slots, in the same order,
/// every time it is called during one scan. Each row overwrites the values
/// left by the previous one; copy them out in [`RowScanner::row_scanned`]
/// if you need to keep them.
///
/// ```
/// use fluent_sql::{DbResult, RowScanner, ScanTarget};
///
/// #[derive(Default)]
/// struct Users {
///     id: i64,
///     name: String,
///     all: Vec<(i64, String)>,
/// }
///
/// impl RowScanner for Users {
///     fn targets(&mut self) -> Vec<&mut dyn ScanTarget> {
///         vec![&mut self.id as &mut dyn ScanTarget, &mut self.name]
///     }
///
///     fn row_scanned(&mut self) -> DbResult<()> {
///         self.all.push((self.id, self.name.clone()));
///         Ok(())
///     }
/// }
/// ```
pub trait RowScanner: Send {
    /// Slots to write the next row into, one per column.
    fn targets(&mut self) -> Vec<&mut dyn ScanTarget>;

    /// Called once per row after all of its columns were written.
    fn row_scanned(&mut self) -> DbResult<()>;
}

/// Run `query` and feed its rows to `scanner`.
///
/// With `one_row` set, at most one row is read and zero rows is
/// [`DbError::NoRows`]; any further rows are discarded when the cursor closes.
/// An iteration error reported by the cursor wins over the row-count check.
pub(crate) async fn scan<R, F, Fut>(
    scanner: &mut dyn RowScanner,
    one_row: bool,
    query: F,
) -> DbResult<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DbResult<R>>,
    R: SqlRows,
{
    let mut rows = query().await?;
    let result = scan_rows(&mut rows, scanner, one_row).await;
    ignore_close(&mut rows).await;
    result
}

async fn scan_rows<R: SqlRows>(
    rows: &mut R,
    scanner: &mut dyn RowScanner,
    one_row: bool,
) -> DbResult<()> {
    let mut rows_scanned = 0usize;

    while (!one_row || rows_scanned < 1) && rows.next().await {
        {
            let mut targets = scanner.targets();
            rows.scan(&mut targets)?;
        }
        scanner.row_scanned()?;
        rows_scanned += 1;
    }

    if let Some(err) = rows.err() {
        return Err(err);
    }

    if one_row && rows_scanned != 1 {
        return Err(DbError::NoRows);
    }

    Ok(())
}

async fn ignore_close<R: SqlRows>(rows: &mut R) {
    if let Err(err) = rows.close().await {
        debug!(error = %err, "Failed to close rows");
    }
}

/// Feed literal rows to `scanner`, as if a query had produced them.
///
/// Meant for tests of [`RowScanner`] implementations. Values go through
/// [`ScanTarget::scan_value`] only, so conversions may differ from what a
/// real driver does. Conversion failures name the offending column.
pub fn feed_scanner<I>(scanner: &mut dyn RowScanner, rows: I) -> DbResult<()>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    for row in rows {
        feed_row(scanner, row)?;
    }
    Ok(())
}

fn feed_row(scanner: &mut dyn RowScanner, row: Vec<Value>) -> DbResult<()> {
    {
        let mut targets = scanner.targets();
        if row.len() > targets.len() {
            return Err(DbError::TargetCount {
                expected: row.len(),
                actual: targets.len(),
            });
        }
        for (index, value) in row.into_iter().enumerate() {
            targets[index]
                .scan_value(value)
                .map_err(|err| DbError::column(index, err))?;
        }
    }
    scanner.row_scanned()
}

/// [`RowScanner`] that writes straight into a fixed set of slots.
///
/// Only the last row scanned survives, so it suits `scan_one` best.
pub struct Targets<'a> {
    targets: Vec<&'a mut dyn ScanTarget>,
}

/// Scan into the given slots. See also the [`scan_into!`](crate::scan_into!) macro.
pub fn scan_into(targets: Vec<&mut dyn ScanTarget>) -> Targets<'_> {
    Targets { targets }
}

impl RowScanner for Targets<'_> {
    fn targets(&mut self) -> Vec<&mut dyn ScanTarget> {
        self.targets
            .iter_mut()
            .map(|t| &mut **t as &mut dyn ScanTarget)
            .collect()
    }

    fn row_scanned(&mut self) -> DbResult<()> {
        Ok(())
    }
}

/// Build a [`Targets`] scanner from `&mut` slots of mixed types.
///
/// ```
/// let (mut id, mut name) = (0i64, String::new());
/// let scanner = fluent_sql::scan_into!(&mut id, &mut name);
/// # drop(scanner);
/// ```
#[macro_export]
macro_rules! scan_into {
    ($($target:expr),+ $(,)?) => {
        $crate::scan_into(::std::vec![$($target as &mut dyn $crate::ScanTarget),+])
    };
}
