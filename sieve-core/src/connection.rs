use crate::{Executor, Result, Transaction};
use std::future::Future;

/// A live session with a backend.
///
/// Backends provide the native transaction hooks, nesting and scoping are handled by
/// [`Transaction`] on top of them.
pub trait Connection: Executor {
    /// Opens a connection to `url`, failing with [`crate::ErrorKind::ConnectFailed`].
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send;

    fn disconnect(self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn begin_native(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn commit_native(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn rollback_native(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Called when an open transaction is dropped, must leave the connection usable without
    /// awaiting anything.
    fn abandon_native(&mut self);

    /// Opens a transaction, committed or rolled back explicitly.
    fn begin(&mut self) -> impl Future<Output = Result<Transaction<'_, Self>>> + Send {
        async move {
            let mut transaction = Transaction::new(self);
            transaction.open().await?;
            Ok(transaction)
        }
    }

    /// Runs `body` inside a transaction: committed when it returns `Ok` with the transaction still
    /// open, rolled back when it returns `Err`.
    fn transaction<T, F>(&mut self, body: F) -> impl Future<Output = Result<T>>
    where
        F: AsyncFnOnce(&mut Transaction<'_, Self>) -> Result<T>,
    {
        async move {
            let transaction = self.begin().await?;
            transaction.scoped(body).await
        }
    }
}
