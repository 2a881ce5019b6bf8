use crate::error::SupervisorError;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellation token that remembers why it was cancelled.
///
/// Only the first cause is kept; later calls still cancel (idempotently) but
/// leave the recorded cause untouched. The cause is stored before the token
/// fires, so anyone woken by `cancelled()` can read it.
#[derive(Clone, Debug, Default)]
pub struct CauseToken {
    token: CancellationToken,
    cause: Arc<OnceLock<Arc<anyhow::Error>>>,
}

impl CauseToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with `err` as the cause. Returns `true` if this call set the cause.
    pub fn cancel_with(&self, err: impl Into<anyhow::Error>) -> bool {
        self.cancel_or_return(err).is_none()
    }

    /// Like [`cancel_with`](Self::cancel_with), but hands `err` back when a cause was already set.
    pub fn cancel_or_return(&self, err: impl Into<anyhow::Error>) -> Option<anyhow::Error> {
        let res = self.cause.set(Arc::new(err.into()));
        self.token.cancel();
        res.err()
            .map(|e| Arc::try_unwrap(e).unwrap_or_else(|shared| anyhow::anyhow!("{shared:#}")))
    }

    /// Cancel without a specific cause.
    pub fn cancel(&self) -> bool {
        self.cancel_with(SupervisorError::Interrupted)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn cause(&self) -> Option<Arc<anyhow::Error>> {
        self.cause.get().cloned()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
