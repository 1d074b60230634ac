use crate::{
    Connection, ErrorKind, Executor, Group, ModelRef, Operation, Result, Row, Value, Window,
    operation_failed,
};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Unopened,
    Open,
    Committed,
    RolledBack,
}

/// Transaction on a connection, nested ones included.
///
/// Only the outermost transaction reaches the backend. A nested transaction committing does nothing
/// by itself, one rolling back (or dropped while open) poisons the whole tree: the outermost commit
/// then rolls back and fails. Dropping the outermost transaction while open rolls it back.
pub struct Transaction<'c, C: Connection> {
    connection: &'c mut C,
    state: TransactionState,
    depth: usize,
    poisoned: Arc<AtomicBool>,
}

fn state_error(message: String) -> crate::Error {
    let error = ErrorKind::TransactionStateError(message).into_error();
    log::error!("{:#}", error);
    error
}

impl<'c, C: Connection> Transaction<'c, C> {
    pub fn new(connection: &'c mut C) -> Self {
        Self {
            connection,
            state: TransactionState::Unopened,
            depth: 0,
            poisoned: Default::default(),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    /// Nesting level, 0 for the outermost transaction.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True once a transaction of the tree rolled back.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Opens the transaction, doing nothing when it is already open.
    pub async fn open(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            TransactionState::Unopened => {
                if self.depth == 0 {
                    self.connection
                        .begin_native()
                        .await
                        .map_err(|e| operation_failed(e, Operation::Transaction, "begin"))?;
                }
                self.state = TransactionState::Open;
                Ok(())
            }
            state => Err(state_error(format!(
                "cannot open a transaction already closed ({:?})",
                state
            ))),
        }
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        Err(state_error(format!(
            "cannot {} a transaction that is not open ({:?})",
            action, self.state
        )))
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_open("commit")?;
        if self.depth > 0 {
            self.state = TransactionState::Committed;
            return Ok(());
        }
        // The state changes once the backend answered, a cancelled call is abandoned on drop
        if self.is_poisoned() {
            let result = self.connection.rollback_native().await;
            self.state = TransactionState::RolledBack;
            result.map_err(|e| operation_failed(e, Operation::Transaction, "rollback"))?;
            return Err(state_error(
                "a nested transaction rolled back, the whole transaction was rolled back".into(),
            ));
        }
        let result = self.connection.commit_native().await;
        self.state = TransactionState::Committed;
        result.map_err(|e| operation_failed(e, Operation::Transaction, "commit"))
    }

    pub async fn rollback(&mut self) -> Result<()> {
        self.ensure_open("roll back")?;
        if self.depth > 0 {
            self.state = TransactionState::RolledBack;
            self.poisoned.store(true, Ordering::Release);
            return Ok(());
        }
        let result = self.connection.rollback_native().await;
        self.state = TransactionState::RolledBack;
        result.map_err(|e| operation_failed(e, Operation::Transaction, "rollback"))
    }

    /// Opens a transaction nested in this one.
    pub async fn begin(&mut self) -> Result<Transaction<'_, C>> {
        self.ensure_open("nest into")?;
        Ok(Transaction {
            connection: &mut *self.connection,
            state: TransactionState::Open,
            depth: self.depth + 1,
            poisoned: self.poisoned.clone(),
        })
    }

    /// Runs `body` in a nested transaction, same rules as [`Connection::transaction`].
    pub async fn transaction<T, F>(&mut self, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Transaction<'_, C>) -> Result<T>,
    {
        let nested = self.begin().await?;
        nested.scoped(body).await
    }

    pub(crate) async fn scoped<T, F>(mut self, body: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Transaction<'_, C>) -> Result<T>,
    {
        match body(&mut self).await {
            Ok(value) => {
                if self.is_open() {
                    self.commit().await?;
                }
                Ok(value)
            }
            Err(error) => {
                if self.is_open() {
                    if let Err(rollback) = self.rollback().await {
                        log::error!("Rollback after a failure also failed: {:#}", rollback);
                    }
                }
                Err(error)
            }
        }
    }

    fn check(&self) -> Result<()> {
        self.ensure_open("use")
    }
}

impl<'c, C: Connection> Drop for Transaction<'c, C> {
    fn drop(&mut self) {
        if !self.is_open() {
            return;
        }
        self.state = TransactionState::RolledBack;
        if self.depth > 0 {
            log::warn!(
                "Nested transaction (depth {}) dropped while open, the outer transaction will roll back",
                self.depth
            );
            self.poisoned.store(true, Ordering::Release);
        } else {
            log::warn!("Transaction dropped while open, rolling it back");
            self.connection.abandon_native();
        }
    }
}

impl<'c, C: Connection> Executor for Transaction<'c, C> {
    fn fetch_rows(
        &mut self,
        predicate: &Group,
        window: Window,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move {
            self.check()?;
            self.connection.fetch_rows(predicate, window).await
        }
    }

    fn count_rows(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send {
        async move {
            self.check()?;
            self.connection.count_rows(predicate).await
        }
    }

    fn insert_rows(
        &mut self,
        model: &ModelRef,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move {
            self.check()?;
            self.connection.insert_rows(model, rows).await
        }
    }

    fn update_rows(
        &mut self,
        predicate: &Group,
        assignments: &[(&str, Value)],
    ) -> impl Future<Output = Result<u64>> + Send {
        async move {
            self.check()?;
            self.connection.update_rows(predicate, assignments).await
        }
    }

    fn delete_rows(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send {
        async move {
            self.check()?;
            self.connection.delete_rows(predicate).await
        }
    }

    fn create_models(&mut self, models: &[ModelRef]) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.check()?;
            self.connection.create_models(models).await
        }
    }

    fn drop_models(&mut self, models: &[ModelRef]) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.check()?;
            self.connection.drop_models(models).await
        }
    }
}
