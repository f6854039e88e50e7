//! Scripted in-memory driver for unit tests.
//!
//! Every handle shares one [`MockState`]: tests script outcomes into it
//! before the call and read the recorded calls back afterwards.

use super::{ExecResult, SqlDb, SqlPreparer, SqlQueryer, SqlResult, SqlRows, SqlStmt, SqlTx};
use crate::error::{DbError, DbResult};
use crate::models::{ScanTarget, Value};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) fn driver_error(message: &str) -> DbError {
    DbError::Driver(sqlx::Error::Protocol(message.to_string()))
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    // Scripted outcomes
    pub rows: Vec<Vec<Value>>,
    pub query_error: Option<String>,
    pub deferred_error: Option<String>,
    pub exec_error: Option<String>,
    pub rows_affected: u64,
    pub rows_affected_error: Option<String>,
    pub last_insert_id: i64,
    pub prepare_error: Option<String>,
    pub begin_error: Option<String>,
    pub commit_error: Option<String>,
    pub rollback_error: Option<String>,
    pub close_error: Option<String>,

    // Recorded calls
    pub queries: Vec<(String, Vec<Value>)>,
    pub execs: Vec<(String, Vec<Value>)>,
    pub rows_read: usize,
    pub rows_closed: usize,
    pub prepared: Vec<String>,
    pub statements_closed: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub accessor_calls: usize,
    pub db_closed: usize,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap()
}

fn fail(script: &Option<String>) -> DbResult<()> {
    match script {
        Some(message) => Err(driver_error(message)),
        None => Ok(()),
    }
}

fn run_query(state: &Shared, sql: &str, args: &[Value]) -> DbResult<MockRows> {
    let mut s = lock(state);
    fail(&s.query_error)?;
    s.queries.push((sql.to_string(), args.to_vec()));
    Ok(MockRows {
        state: state.clone(),
        pending: s.rows.iter().cloned().collect(),
        current: None,
        deferred: s.deferred_error.clone(),
        exhausted: false,
    })
}

fn run_exec(state: &Shared, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
    let mut s = lock(state);
    fail(&s.exec_error)?;
    s.execs.push((sql.to_string(), args.to_vec()));
    Ok(Box::new(MockResult {
        state: state.clone(),
    }))
}

fn run_prepare(state: &Shared, sql: &str) -> DbResult<MockStmt> {
    let mut s = lock(state);
    fail(&s.prepare_error)?;
    s.prepared.push(sql.to_string());
    Ok(MockStmt {
        state: state.clone(),
        sql: sql.to_string(),
    })
}

#[derive(Clone, Default)]
pub(crate) struct MockDb {
    state: Shared,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(script: impl FnOnce(&mut MockState)) -> Self {
        let db = Self::new();
        script(&mut db.state());
        db
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

#[async_trait]
impl SqlQueryer for MockDb {
    type Rows = MockRows;

    async fn query(&self, sql: &str, args: &[Value]) -> DbResult<MockRows> {
        run_query(&self.state, sql, args)
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        run_exec(&self.state, sql, args)
    }
}

#[async_trait]
impl SqlPreparer for MockDb {
    type Stmt = MockStmt;

    async fn prepare(&self, sql: &str) -> DbResult<MockStmt> {
        run_prepare(&self.state, sql)
    }
}

#[async_trait]
impl SqlDb for MockDb {
    type Tx = MockTx;

    async fn begin(&self) -> DbResult<MockTx> {
        let mut s = self.state();
        fail(&s.begin_error)?;
        s.begins += 1;
        Ok(MockTx {
            state: self.state.clone(),
            done: Mutex::new(false),
        })
    }

    async fn close(&self) -> DbResult<()> {
        let mut s = self.state();
        s.db_closed += 1;
        fail(&s.close_error)
    }
}

pub(crate) struct MockTx {
    state: Shared,
    done: Mutex<bool>,
}

impl MockTx {
    fn finish(&self) -> DbResult<()> {
        let mut done = self.done.lock().unwrap();
        if *done {
            return Err(DbError::TxDone);
        }
        *done = true;
        Ok(())
    }
}

#[async_trait]
impl SqlQueryer for MockTx {
    type Rows = MockRows;

    async fn query(&self, sql: &str, args: &[Value]) -> DbResult<MockRows> {
        run_query(&self.state, sql, args)
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        run_exec(&self.state, sql, args)
    }
}

#[async_trait]
impl SqlPreparer for MockTx {
    type Stmt = MockStmt;

    async fn prepare(&self, sql: &str) -> DbResult<MockStmt> {
        run_prepare(&self.state, sql)
    }
}

#[async_trait]
impl SqlTx for MockTx {
    async fn commit(&self) -> DbResult<()> {
        lock(&self.state).commits += 1;
        self.finish()?;
        fail(&lock(&self.state).commit_error)
    }

    async fn rollback(&self) -> DbResult<()> {
        lock(&self.state).rollbacks += 1;
        self.finish()?;
        fail(&lock(&self.state).rollback_error)
    }
}

pub(crate) struct MockStmt {
    state: Shared,
    sql: String,
}

#[async_trait]
impl SqlStmt for MockStmt {
    type Rows = MockRows;

    async fn query(&self, args: &[Value]) -> DbResult<MockRows> {
        run_query(&self.state, &self.sql, args)
    }

    async fn exec(&self, args: &[Value]) -> DbResult<ExecResult> {
        run_exec(&self.state, &self.sql, args)
    }

    async fn close(&self) -> DbResult<()> {
        let mut s = lock(&self.state);
        s.statements_closed += 1;
        fail(&s.close_error)
    }
}

pub(crate) struct MockRows {
    state: Shared,
    pending: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    deferred: Option<String>,
    exhausted: bool,
}

#[async_trait]
impl SqlRows for MockRows {
    async fn next(&mut self) -> bool {
        self.current = self.pending.pop_front();
        if self.current.is_some() {
            lock(&self.state).rows_read += 1;
            true
        } else {
            self.exhausted = true;
            false
        }
    }

    fn scan(&mut self, targets: &mut [&mut dyn ScanTarget]) -> DbResult<()> {
        let row = self
            .current
            .clone()
            .ok_or_else(|| DbError::invalid_input("scan called without a current row"))?;
        if row.len() != targets.len() {
            return Err(DbError::TargetCount {
                expected: row.len(),
                actual: targets.len(),
            });
        }
        for (target, value) in targets.iter_mut().zip(row) {
            target.scan_value(value)?;
        }
        Ok(())
    }

    fn err(&mut self) -> Option<DbError> {
        if !self.exhausted {
            return None;
        }
        self.deferred.take().map(|message| driver_error(&message))
    }

    async fn close(&mut self) -> DbResult<()> {
        lock(&self.state).rows_closed += 1;
        Ok(())
    }
}

struct MockResult {
    state: Shared,
}

impl SqlResult for MockResult {
    fn rows_affected(&self) -> DbResult<u64> {
        let mut s = lock(&self.state);
        s.accessor_calls += 1;
        fail(&s.rows_affected_error)?;
        Ok(s.rows_affected)
    }

    fn last_insert_id(&self) -> DbResult<i64> {
        let mut s = lock(&self.state);
        s.accessor_calls += 1;
        Ok(s.last_insert_id)
    }
}
