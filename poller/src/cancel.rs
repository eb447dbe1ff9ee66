use tokio_util::sync::CancellationToken as InternalCancellationToken;

/// Signals the poll loop to stop. Cloned handles share the same state.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    inner: InternalCancellationToken,
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

impl CancellationToken {
    /// Creates a new CancellationToken in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            inner: InternalCancellationToken::new(),
        }
    }

    /// Cancel the token and every clone of it.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Completes when cancellation is requested.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// Cancels the token on Ctrl-C.
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("interrupt received, stopping");
                    token.cancel();
                }
                Err(e) => tracing::warn!("unable to listen for interrupt: {e}"),
            }
        });
    }
}
