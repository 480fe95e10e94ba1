//! Write completion signals.

use manifold_types::Key;
use tokio::sync::oneshot;

use crate::error::{StoreError, StoreResult};

enum Part {
    Done(StoreResult<()>),
    Pending {
        key: Key,
        rx: oneshot::Receiver<StoreResult<()>>,
    },
}

/// Completion signal for one or more block writes.
///
/// A `StoreWait` is satisfied once every write it covers has completed.
/// Signals compose with [`StoreWait::join`]; waiting on a joined signal
/// reports the first failure but still drains every part.
#[must_use = "a write is only durable once its completion has been awaited"]
pub struct StoreWait {
    parts: Vec<Part>,
}

/// Sending half of a pending write's completion.
pub struct WriteCompleter {
    tx: oneshot::Sender<StoreResult<()>>,
}

impl WriteCompleter {
    /// Signal the outcome of the write.
    pub fn complete(self, result: StoreResult<()>) {
        // The waiter may already have given up; nothing to report then.
        let _ = self.tx.send(result);
    }
}

impl StoreWait {
    /// A signal for a write that has already completed.
    pub fn ready() -> Self {
        Self {
            parts: vec![Part::Done(Ok(()))],
        }
    }

    /// A signal for a write that has already failed.
    pub fn failed(err: StoreError) -> Self {
        Self {
            parts: vec![Part::Done(Err(err))],
        }
    }

    /// A signal that completes when the returned [`WriteCompleter`] fires.
    ///
    /// Dropping the completer without firing it fails the wait with
    /// [`StoreError::WriteAborted`].
    pub fn pending(key: Key) -> (Self, WriteCompleter) {
        let (tx, rx) = oneshot::channel();
        let wait = Self {
            parts: vec![Part::Pending { key, rx }],
        };
        (wait, WriteCompleter { tx })
    }

    /// Combine two signals into one satisfied when both are.
    pub fn join(mut self, other: StoreWait) -> Self {
        self.parts.extend(other.parts);
        self
    }

    /// Combine any number of signals.
    pub fn all(waits: impl IntoIterator<Item = StoreWait>) -> Self {
        let parts = waits.into_iter().flat_map(|w| w.parts).collect();
        Self { parts }
    }

    /// Number of writes this signal covers.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Wait for every covered write to complete.
    pub async fn wait(self) -> StoreResult<()> {
        let mut first_err = None;
        for part in self.parts {
            let result = match part {
                Part::Done(result) => result,
                Part::Pending { key, rx } => match rx.await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::WriteAborted(key)),
                },
            };
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StoreWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self
            .parts
            .iter()
            .filter(|p| matches!(p, Part::Pending { .. }))
            .count();
        f.debug_struct("StoreWait")
            .field("parts", &self.parts.len())
            .field("pending", &pending)
            .finish()
    }
}
