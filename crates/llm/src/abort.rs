use tokio_util::sync::CancellationToken;

/// Owner side of an abort signal.
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Creates a controller whose signal has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to this controller's signal.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fires the signal. Later calls do nothing.
    pub fn abort(&self) {
        self.signal.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }
}

/// Cloneable cancellation handle passed into an adapter run.
///
/// Once fired it stays fired; every clone and every derived child observes it.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// A signal nobody holds a controller for.
    pub fn never() -> Self {
        Self::default()
    }

    /// Returns true once the signal has fired.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal fires.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }

    /// Derives a signal that fires with this one but can also be fired on its own.
    pub(crate) fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub(crate) fn fire(&self) {
        self.token.cancel();
    }
}
