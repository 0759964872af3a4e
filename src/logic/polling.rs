use log::debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Result, WorkflowError};
use crate::model::{GeometryImport, JobStatus, MeshOperation, Report, ResourceKind, SimulationRun};

/// Caller-driven abort signal shared by every wait in a workflow.
///
/// Clones observe the same signal; cancelling any clone wakes all waiters.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-interval polling bounded by a wall-clock budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_secs(interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }
}

/// Local view of a remote job's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Configured,
    Estimated,
    Running,
    Finished,
    Canceled,
    Failed,
}

impl JobPhase {
    /// Phase after a poll observed `status`.
    pub fn after(status: JobStatus) -> Self {
        match status {
            JobStatus::Finished => JobPhase::Finished,
            JobStatus::Canceled => JobPhase::Canceled,
            JobStatus::Failed => JobPhase::Failed,
            _ => JobPhase::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Finished | JobPhase::Canceled | JobPhase::Failed)
    }
}

/// Anything a poll loop can inspect for a job status.
pub trait JobState {
    fn status(&self) -> JobStatus;

    fn progress(&self) -> Option<f64> {
        None
    }
}

impl JobState for GeometryImport {
    fn status(&self) -> JobStatus {
        self.status
    }
}

impl JobState for MeshOperation {
    fn status(&self) -> JobStatus {
        self.status
    }

    fn progress(&self) -> Option<f64> {
        self.progress
    }
}

impl JobState for SimulationRun {
    fn status(&self) -> JobStatus {
        self.status
    }

    fn progress(&self) -> Option<f64> {
        self.progress
    }
}

impl JobState for Report {
    fn status(&self) -> JobStatus {
        self.status
    }
}

/// Fetch the job until it reports a terminal status.
///
/// The first fetch happens immediately. Between fetches the loop sleeps for the
/// policy interval (clamped to the remaining budget) or until `cancel` fires.
/// A non-terminal status once the budget is spent fails with `Timeout`.
pub async fn poll_until_terminal<T, F, Fut>(
    kind: ResourceKind,
    id: &str,
    policy: PollPolicy,
    cancel: &CancelToken,
    mut fetch: F,
) -> Result<T>
where
    T: JobState,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let cancelled = || WorkflowError::Cancelled {
        kind,
        id: id.to_string(),
    };

    if cancel.is_cancelled() {
        return Err(cancelled());
    }

    let started = Instant::now();
    let mut current = fetch().await?;

    loop {
        let status = current.status();
        if status.is_terminal() {
            return Ok(current);
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(WorkflowError::Timeout {
                kind,
                id: id.to_string(),
                last_status: status,
                waited_secs: elapsed.as_secs(),
            });
        }

        let wait = policy.interval.min(policy.timeout - elapsed);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => return Err(cancelled()),
        }

        current = fetch().await?;
        match current.progress() {
            Some(progress) => debug!("{} {} status: {} - {}", kind, id, current.status(), progress),
            None => debug!("{} {} status: {}", kind, id, current.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Stub(JobStatus);

    impl JobState for Stub {
        fn status(&self) -> JobStatus {
            self.0
        }
    }

    #[tokio::test]
    async fn test_returns_first_terminal_status() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let result = poll_until_terminal(
            ResourceKind::Run,
            "run-1",
            PollPolicy::new(Duration::from_millis(5), Duration::from_secs(5)),
            &CancelToken::new(),
            move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(Stub(if n < 2 { JobStatus::Running } else { JobStatus::Failed }))
            },
        )
        .await
        .unwrap();

        assert_eq!(result.0, JobStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out_after_budget() {
        let started = std::time::Instant::now();
        let err = poll_until_terminal(
            ResourceKind::MeshOperation,
            "mesh-1",
            PollPolicy::from_secs(1, 2),
            &CancelToken::new(),
            || async { Ok(Stub(JobStatus::Running)) },
        )
        .await
        .unwrap_err();

        let waited = started.elapsed();
        assert!(matches!(
            err,
            WorkflowError::Timeout {
                last_status: JobStatus::Running,
                ..
            }
        ));
        assert!(waited >= Duration::from_secs(2), "timed out early: {:?}", waited);
        assert!(waited < Duration::from_secs(3), "timed out late: {:?}", waited);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = poll_until_terminal(
            ResourceKind::Run,
            "run-2",
            PollPolicy::from_secs(30, 3600),
            &cancel,
            || async { Ok(Stub(JobStatus::Queued)) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_fetch() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let err = poll_until_terminal(
            ResourceKind::GeometryImport,
            "imp-1",
            PollPolicy::from_secs(10, 900),
            &cancel,
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Stub(JobStatus::Running))
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
