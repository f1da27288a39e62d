//! Polling sessions that follow one task until it reaches a terminal status.
//!
//! A session is a single tokio task. It fetches, hands the result to the
//! consumer's callback, then sleeps until the next interval boundary. Fetches
//! and callbacks therefore never overlap, and a boundary that passes while a
//! fetch or callback is still running is skipped instead of queued.
//!
//! The callback lives behind a mutex shared with the [`PollHandle`].
//! [`PollHandle::cancel`] empties that slot, so once it returns no callback can
//! run, not even one for a fetch that was already in flight.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::result::{ClientError, Result};
use crate::types::task::{TaskStatus, TaskStatusSnapshot};

/// Poll interval used when the caller has no preference.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Where a polling session gets its snapshots from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskStatusSnapshot>;
}

/// What a polling session hands to its consumer.
#[derive(Debug)]
pub enum PollEvent {
    /// A fresh snapshot. It replaces whatever the consumer showed before.
    Snapshot(TaskStatusSnapshot),
    /// A failed fetch. Transport errors are followed by further attempts;
    /// `NotFound` is the last event of the session.
    Error(ClientError),
}

/// How a polling session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The task reached this terminal status.
    Finished(TaskStatus),
    /// The server does not know the task.
    NotFound,
    /// The consumer cancelled the session.
    Cancelled,
}

type Callback = Box<dyn FnMut(PollEvent) + Send>;

/// The consumer's end of a polling session. Dropping it cancels the session.
pub struct PollHandle {
    token: CancellationToken,
    callback: Arc<Mutex<Option<Callback>>>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollHandle {
    /// Stops the session. Once this returns no further fetch is started and
    /// the callback is never invoked again. If the callback is running right
    /// now, this waits for it to return.
    ///
    /// Must not be called from inside the callback itself.
    pub fn cancel(&self) {
        self.token.cancel();
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the session has ended, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the session to end on its own. Dropping this future before
    /// it completes cancels the session.
    pub async fn finished(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => PollOutcome::Cancelled,
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts following `task_id` on the current tokio runtime.
///
/// The first fetch happens immediately. Fetching continues every `interval`
/// for as long as the last observed status is not terminal. Transport errors
/// are delivered as [`PollEvent::Error`] and polling goes on; an unknown task
/// is reported once and ends the session.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime.
pub fn start_polling<S, F>(
    source: S,
    task_id: &str,
    interval: Duration,
    on_update: F,
) -> Result<PollHandle>
where
    S: StatusSource + 'static,
    F: FnMut(PollEvent) + Send + 'static,
{
    if task_id.trim().is_empty() {
        return Err(ClientError::validation("task id must not be empty"));
    }
    if interval.is_zero() {
        return Err(ClientError::validation("poll interval must be positive"));
    }

    let token = CancellationToken::new();
    let on_update: Callback = Box::new(on_update);
    let callback = Arc::new(Mutex::new(Some(on_update)));
    let session = Session {
        source,
        task_id: task_id.to_owned(),
        interval,
        token: token.clone(),
        callback: Arc::clone(&callback),
    };
    let task = tokio::spawn(session.run());

    Ok(PollHandle {
        token,
        callback,
        task: Some(task),
    })
}

struct Session<S> {
    source: S,
    task_id: String,
    interval: Duration,
    token: CancellationToken,
    callback: Arc<Mutex<Option<Callback>>>,
}

impl<S: StatusSource> Session<S> {
    async fn run(self) -> PollOutcome {
        log::debug!("polling {} every {:?}", self.task_id, self.interval);
        let outcome = self.poll_until_done().await;
        log::debug!("stopped polling {}: {outcome:?}", self.task_id);
        outcome
    }

    async fn poll_until_done(&self) -> PollOutcome {
        let mut deadline = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = self.token.cancelled() => return PollOutcome::Cancelled,
                fetched = self.source.fetch_status(&self.task_id) => fetched,
            };

            let stop = match fetched {
                Ok(snapshot) => {
                    let status = snapshot.status;
                    if !self.deliver(PollEvent::Snapshot(snapshot)) {
                        return PollOutcome::Cancelled;
                    }
                    status.is_terminal().then_some(PollOutcome::Finished(status))
                }
                Err(err) if err.is_not_found() => {
                    if !self.deliver(PollEvent::Error(err)) {
                        return PollOutcome::Cancelled;
                    }
                    Some(PollOutcome::NotFound)
                }
                Err(err) => {
                    log::debug!("failed to fetch status of {}: {err}", self.task_id);
                    if !self.deliver(PollEvent::Error(err)) {
                        return PollOutcome::Cancelled;
                    }
                    None
                }
            };
            if let Some(outcome) = stop {
                return outcome;
            }

            deadline = next_deadline(deadline, self.interval, Instant::now());
        }
    }

    /// Runs the callback unless the session was cancelled. Returns whether it ran.
    fn deliver(&self, event: PollEvent) -> bool {
        let mut slot = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }
}

/// First interval boundary after `previous` that still lies in the future.
fn next_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = previous + interval;
    while next <= now {
        next += interval;
    }
    next
}
