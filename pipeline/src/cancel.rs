//! Cancellation-signal merging for the dispatch phase.

use tokio_util::sync::CancellationToken;

/// The effective cancellation source for one dispatch.
///
/// Built from whatever signals the caller appended to the context before
/// execution. Holds only token clones - no spawned tasks, no OS handles -
/// so dropping it at the end of the dispatch phase releases everything on
/// every exit path.
pub struct MergedCancellation {
    signals: Vec<CancellationToken>,
}

impl MergedCancellation {
    /// Snapshot the given signals into one merged source.
    ///
    /// With no signals the merged source never fires. If any signal is
    /// already cancelled, the merged source is already fired.
    #[must_use]
    pub fn merge(signals: &[CancellationToken]) -> Self {
        Self {
            signals: signals.to_vec(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(CancellationToken::is_cancelled)
    }

    /// Resolves when the first underlying signal fires.
    ///
    /// Pends forever when there are no signals.
    pub async fn cancelled(&self) {
        if self.signals.is_empty() {
            return std::future::pending().await;
        }
        let waits: Vec<_> = self
            .signals
            .iter()
            .map(|token| Box::pin(token.cancelled()))
            .collect();
        let ((), _, _) = futures_util::future::select_all(waits).await;
    }
}
