//! Background run plumbing shared by the orchestrators.
//!
//! A run executes on one dedicated worker thread. The caller keeps a
//! [`RunHandle`] to request cancellation, watch progress and collect the
//! result. Cancellation is cooperative: the worker polls the token between
//! tiles.

use crate::{Result, SrtmError, TileAddress};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next tile boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress reported by a run, once per tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The tile list is known.
    Started {
        /// Number of tiles to process.
        total: usize,
    },
    /// A tile has been processed (successfully or not).
    TileDone {
        /// 1-based count of tiles processed so far.
        index: usize,
        /// Number of tiles to process.
        total: usize,
        /// The tile just processed.
        tile: TileAddress,
    },
}

/// Lifecycle of an orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// No run has started yet.
    #[default]
    Idle,
    /// Scanning points to decide which need elevation.
    Classifying,
    /// Building the de-duplicated tile list.
    CompilingTiles,
    /// Fetching tiles and applying elevations.
    FetchingAndApplying,
    /// The last run was cancelled.
    Cancelled,
    /// The last run finished.
    Completed,
    /// The last run aborted before processing tiles.
    Failed,
}

impl RunState {
    /// Whether a run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Classifying | RunState::CompilingTiles | RunState::FetchingAndApplying
        )
    }
}

/// Run state shared between an orchestrator and its worker.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateCell(Arc<Mutex<RunState>>);

impl StateCell {
    pub(crate) fn get(&self) -> RunState {
        *self.0.lock()
    }

    pub(crate) fn set(&self, state: RunState) {
        *self.0.lock() = state;
    }

    /// Move into `first` unless a run is already active.
    pub(crate) fn try_start(&self, first: RunState) -> Result<RunGuard> {
        let mut state = self.0.lock();
        if state.is_active() {
            return Err(SrtmError::AlreadyRunning);
        }
        *state = first;
        Ok(RunGuard(self.clone()))
    }
}

/// Marks the run failed if it is dropped while still active, e.g. on an
/// early return or a panic in the worker.
pub(crate) struct RunGuard(StateCell);

impl RunGuard {
    pub(crate) fn set(&self, state: RunState) {
        self.0.set(state);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = (self.0).0.lock();
        if state.is_active() {
            *state = RunState::Failed;
        }
    }
}

/// Handle to a run executing on a worker thread.
#[derive(Debug)]
pub struct RunHandle<T> {
    cancel: CancelToken,
    progress: Receiver<ProgressEvent>,
    thread: JoinHandle<T>,
}

impl<T> RunHandle<T> {
    /// Request cancellation. The worker stops after the current tile.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token the worker polls.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Progress events from the worker. The channel closes when the run ends.
    pub fn progress(&self) -> &Receiver<ProgressEvent> {
        &self.progress
    }

    /// Check if the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and take its result.
    pub fn join(self) -> std::result::Result<T, Box<dyn std::any::Any + Send + 'static>> {
        self.thread.join()
    }
}

/// Spawn a named worker thread running `work`.
pub(crate) fn spawn_run<T, F>(name: &str, work: F) -> Result<RunHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken, &dyn Fn(ProgressEvent)) -> T + Send + 'static,
{
    let cancel = CancelToken::new();
    let (tx, rx): (Sender<ProgressEvent>, Receiver<ProgressEvent>) = crossbeam_channel::unbounded();
    let worker_cancel = cancel.clone();

    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // A dropped receiver only means nobody is watching.
            let report = move |event: ProgressEvent| {
                let _ = tx.send(event);
            };
            work(&worker_cancel, &report)
        })?;

    Ok(RunHandle {
        cancel,
        progress: rx,
        thread,
    })
}
