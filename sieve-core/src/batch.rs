use crate::{
    Entity, ErrorKind, Executor, Group, Operation, Result, Window, operation_failed,
    stream::Stream,
};
use async_stream::try_stream;
use std::marker::PhantomData;

pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Progress of a batched fetch through the window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchState {
    offset: u64,
    remaining: Option<u64>,
    batch_size: u64,
    exhausted: bool,
}

impl BatchState {
    pub fn new(window: Window, batch_size: u64) -> Self {
        Self {
            offset: window.offset,
            remaining: window.limit,
            batch_size: batch_size.max(1),
            exhausted: window.limit == Some(0),
        }
    }

    /// Window of the next pull, `None` once the requested window is exhausted.
    pub fn window(&self) -> Option<Window> {
        if self.exhausted {
            return None;
        }
        let limit = match self.remaining {
            Some(remaining) => remaining.min(self.batch_size),
            None => self.batch_size,
        };
        Some(Window::new(self.offset, Some(limit)))
    }

    /// Records that a pull returned `received` rows.
    pub fn advance(&mut self, received: usize) {
        let Some(window) = self.window() else {
            return;
        };
        let received = received as u64;
        self.offset += received;
        if let Some(remaining) = &mut self.remaining {
            *remaining = remaining.saturating_sub(received);
            if *remaining == 0 {
                self.exhausted = true;
            }
        }
        if received < window.limit.unwrap_or(u64::MAX) {
            self.exhausted = true;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    fn set_batch_size(&mut self, batch_size: u64) {
        self.batch_size = batch_size.max(1);
    }
}

/// Lazy, forward only sequence of batches of `E` matching a predicate.
///
/// Every pull is one round trip asking for at most [`Batches::batch_size`] rows. Once the window
/// of the predicate is covered, or a pull comes back short, later pulls return nothing without
/// reaching the backend.
pub struct Batches<'e, X: Executor, E: Entity> {
    executor: &'e mut X,
    predicate: Group,
    state: BatchState,
    _entity: PhantomData<fn() -> E>,
}

impl<'e, X: Executor, E: Entity> Batches<'e, X, E> {
    pub fn new(executor: &'e mut X, predicate: Group) -> Self {
        let state = BatchState::new(Window::of(&predicate), DEFAULT_BATCH_SIZE);
        Self {
            executor,
            predicate,
            state,
            _entity: PhantomData,
        }
    }

    pub fn batch_size(mut self, batch_size: u64) -> Self {
        self.state.set_batch_size(batch_size);
        self
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn predicate(&self) -> &Group {
        &self.predicate
    }

    /// Pulls the next batch, empty once the sequence is over.
    pub async fn next_batch(&mut self) -> Result<Vec<E>> {
        let Some(window) = self.state.window() else {
            return Ok(Vec::new());
        };
        let rows = self
            .executor
            .fetch_rows(&self.predicate, window)
            .await
            .map_err(|e| operation_failed(e, Operation::Fetch, E::model().name()))?;
        self.state.advance(rows.len());
        rows.into_iter().map(E::from_row).collect()
    }

    /// Every remaining record.
    pub async fn get(mut self) -> Result<Vec<E>> {
        let mut result = Vec::new();
        loop {
            let batch = self.next_batch().await?;
            if batch.is_empty() {
                break;
            }
            result.extend(batch);
        }
        Ok(result)
    }

    /// The first remaining record, failing with [`ErrorKind::EmptyResult`] when there is none.
    pub async fn one(mut self) -> Result<E> {
        self.state.set_batch_size(1);
        match self.next_batch().await?.into_iter().next() {
            Some(entity) => Ok(entity),
            None => Err(ErrorKind::EmptyResult.into_error()),
        }
    }

    /// Remaining records one by one, still pulled a batch at a time.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<E>> + Send + 'e
    where
        E: 'e,
    {
        try_stream! {
            loop {
                let batch = self.next_batch().await?;
                if batch.is_empty() {
                    break;
                }
                for entity in batch {
                    yield entity;
                }
            }
        }
    }
}
