//! Engine round trips: timeout, cancellation, and bounded batch fan-out.

use crate::domain::BatchItem;
use crate::engine::DocumentEngine;
use crate::error::{EngineError, MemoryStoreError, Result};
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared handle to the engine, carrying the per-call timeout.
#[derive(Debug, Clone)]
pub(crate) struct EngineHandle {
    engine: Arc<dyn DocumentEngine>,
    timeout: Duration,
}

impl EngineHandle {
    pub(crate) fn new(engine: Arc<dyn DocumentEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub(crate) fn engine(&self) -> &dyn DocumentEngine {
        self.engine.as_ref()
    }

    /// Run one engine call, bounded by the request timeout and aborted when
    /// `cancel` fires.
    pub(crate) async fn call<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, EngineError>>,
    {
        let timeout = self.timeout;
        cancellable(cancel, async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(res) => res.map_err(MemoryStoreError::from),
                Err(_) => Err(MemoryStoreError::Timeout(timeout)),
            }
        })
        .await
    }
}

/// Race `fut` against `cancel`. A token that has already fired wins
/// without polling `fut`.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(MemoryStoreError::Cancelled),
        res = fut => res,
    }
}

/// Run `op` for every item with at most `concurrency` in flight.
///
/// Outcomes come back in input order, each attributed to its key. Once
/// `cancel` fires no further item is started; those items report
/// [`MemoryStoreError::Cancelled`].
pub(crate) fn fan_out<A, T, F, Fut>(
    items: Vec<(String, A)>,
    concurrency: usize,
    cancel: CancellationToken,
    op: F,
) -> BoxStream<'static, BatchItem<T>>
where
    A: Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    stream::iter(items)
        .map(move |(key, item)| {
            let started = (!cancel.is_cancelled()).then(|| op(item));
            let cancel = cancel.clone();
            async move {
                let outcome = match started {
                    Some(fut) => cancellable(&cancel, fut).await,
                    None => Err(MemoryStoreError::Cancelled),
                };
                BatchItem::new(key, outcome)
            }
        })
        .buffered(concurrency.max(1))
        .boxed()
}
