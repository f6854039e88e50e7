//! Streaming cursor over a sqlx result set.
//!
//! sqlx row streams borrow the connection they run on, so each query runs
//! in a producer task that owns its connection (a pooled connection, or the
//! transaction slot's guard) and sends decoded rows over a bounded channel.
//! The cursor pulls one row per [`SqlRows::next`]; the producer stays at
//! most one row ahead. Closing the cursor stops the producer and releases
//! the connection.
//!
//! An error before the first row fails the query itself. An error that ends
//! the stream later is reported through [`SqlRows::err`] once the rows
//! before it have been read.

use crate::db::types::DecodeRow;
use crate::driver::SqlRows;
use crate::error::{DbError, DbResult};
use crate::models::{ScanTarget, Value};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// What the producer task hands to the cursor.
#[derive(Debug)]
pub(crate) enum Fetched {
    /// A row, or the error decoding it.
    Row(DbResult<Vec<Value>>),
    /// The query or the stream failed; nothing follows.
    Failed(DbError),
}

pub(crate) type RowSender = mpsc::Sender<Fetched>;

/// Run `produce` in its own task and return a cursor over what it sends.
///
/// Waits for the first message so that a query failing before any row
/// returns its error here. An error returned by `produce` is sent as the
/// final message.
pub(crate) async fn spawn<F, Fut>(produce: F) -> DbResult<SqlxRows>
where
    F: FnOnce(RowSender) -> Fut,
    Fut: Future<Output = DbResult<()>> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(1);
    let work = produce(sender.clone());
    let producer = tokio::spawn(async move {
        if let Err(err) = work.await {
            let _ = sender.send(Fetched::Failed(err)).await;
        }
    });
    SqlxRows::open(receiver, producer).await
}

/// Send every row of `stream`, decoded, until it ends or the cursor is gone.
pub(crate) async fn forward<R: DecodeRow>(
    mut stream: BoxStream<'_, Result<R, sqlx::Error>>,
    sender: &RowSender,
) -> DbResult<()> {
    while let Some(row) = stream.next().await {
        if sender.send(Fetched::Row(row?.decode_values())).await.is_err() {
            debug!("Row cursor closed before the end of the result set");
            break;
        }
    }
    Ok(())
}

#[derive(Debug)]
pub struct SqlxRows {
    receiver: Option<mpsc::Receiver<Fetched>>,
    producer: Option<JoinHandle<()>>,
    peeked: Option<Fetched>,
    current: Option<Vec<Value>>,
    row_error: Option<DbError>,
    deferred: Option<DbError>,
    exhausted: bool,
    closed: bool,
}

impl SqlxRows {
    async fn open(
        mut receiver: mpsc::Receiver<Fetched>,
        producer: JoinHandle<()>,
    ) -> DbResult<Self> {
        let first = receiver.recv().await;
        let mut rows = Self {
            receiver: Some(receiver),
            producer: Some(producer),
            peeked: None,
            current: None,
            row_error: None,
            deferred: None,
            exhausted: false,
            closed: false,
        };
        match first {
            Some(Fetched::Failed(err)) => {
                rows.stop().await;
                Err(err)
            }
            first => {
                rows.peeked = first;
                Ok(rows)
            }
        }
    }

    async fn recv(&mut self) -> Option<Fetched> {
        if let Some(fetched) = self.peeked.take() {
            return Some(fetched);
        }
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    /// Drop the channel and wait for the producer to let go of its connection.
    async fn stop(&mut self) {
        self.receiver = None;
        self.peeked = None;
        if let Some(producer) = self.producer.take() {
            producer.abort();
            match producer.await {
                Err(err) if err.is_panic() => debug!(error = %err, "Row producer panicked"),
                _ => {}
            }
        }
    }
}

impl Drop for SqlxRows {
    fn drop(&mut self) {
        if let Some(producer) = &self.producer {
            producer.abort();
        }
    }
}

#[async_trait]
impl SqlRows for SqlxRows {
    async fn next(&mut self) -> bool {
        self.current = None;
        self.row_error = None;
        if self.closed || self.exhausted {
            return false;
        }
        match self.recv().await {
            Some(Fetched::Row(Ok(row))) => {
                self.current = Some(row);
                true
            }
            // Decoding failed; surfaced by scan so the row still counts
            Some(Fetched::Row(Err(err))) => {
                self.row_error = Some(err);
                true
            }
            Some(Fetched::Failed(err)) => {
                self.deferred = Some(err);
                self.exhausted = true;
                false
            }
            None => {
                self.exhausted = true;
                false
            }
        }
    }

    fn scan(&mut self, targets: &mut [&mut dyn ScanTarget]) -> DbResult<()> {
        if let Some(err) = self.row_error.take() {
            return Err(err);
        }
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DbError::invalid_input("scan called without a current row"))?;
        if row.len() != targets.len() {
            return Err(DbError::TargetCount {
                expected: row.len(),
                actual: targets.len(),
            });
        }
        for (index, (target, value)) in targets.iter_mut().zip(row.iter()).enumerate() {
            target
                .scan_value(value.clone())
                .map_err(|err| DbError::column(index, err))?;
        }
        Ok(())
    }

    fn err(&mut self) -> Option<DbError> {
        if self.exhausted {
            self.deferred.take()
        } else {
            None
        }
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        self.current = None;
        self.stop().await;
        Ok(())
    }
}
