//! # Calculation Workflow Runner
//!
//! Drives a [`WorkflowMachine`] from tokio tasks. One calculation is in
//! flight at a time; starting, resetting or undoing cancels the current
//! task.
//!
//! Every task is tagged with a generation number. Events from a task whose
//! generation is no longer current are dropped, so a late result can never
//! overwrite a newer run. The task handle always stays with the workflow, so
//! a superseded task is aborted even while someone is waiting on it. A result becomes visible only through the single
//! `CALCULATION_SUCCESS` transition.
//!
//! Methods that launch work (`start`, `retry`) must be called from within a
//! tokio runtime.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::{CalcError, CalcResult};
use crate::parameters::CalculationRequest;
use crate::policy::WorkflowConfig;
use crate::pressure::CalculationResult;

use super::machine::{EventRecord, WorkflowEvent, WorkflowMachine, WorkflowState};

type CalcFn<R> = Arc<dyn Fn(CalculationRequest, ProgressHandle<R>) -> BoxFuture<'static, CalcResult<R>> + Send + Sync>;

struct Inner<R> {
    machine: WorkflowMachine<R>,
    generation: u64,
    task: Option<JoinHandle<()>>,
    /// Generation of the task that has not yet finished or been cancelled
    running: Option<u64>,
    calc: Option<CalcFn<R>>,
}

struct Shared<R> {
    inner: Mutex<Inner<R>>,
    sender: watch::Sender<WorkflowState<R>>,
    /// Highest generation that has finished or been cancelled
    settled: watch::Sender<u64>,
}

impl<R> Shared<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner<R>) {
        self.sender.send_replace(inner.machine.state().clone());
    }

    /// Mark the task tagged `generation` as done and wake its waiters.
    fn settle(&self, inner: &mut Inner<R>, generation: u64) {
        if inner.running == Some(generation) {
            inner.running = None;
            inner.task = None;
        }
        self.settled.send_modify(|settled| *settled = (*settled).max(generation));
    }

    fn finish(&self, generation: u64) {
        let mut inner = self.lock();
        self.settle(&mut *inner, generation);
    }

    /// Apply an event on behalf of the task tagged `generation`.
    fn apply(&self, generation: u64, event: WorkflowEvent<R>) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::warn!(
                generation,
                current = inner.generation,
                event = event.name(),
                "discarding event from cancelled calculation"
            );
            return false;
        }
        if let Err(error) = inner.machine.dispatch(event) {
            tracing::warn!(error = %error, "workflow event rejected");
            return false;
        }
        self.publish(&inner);
        true
    }
}

/// Passed to the calculation so it can report progress.
pub struct ProgressHandle<R> {
    shared: Arc<Shared<R>>,
    generation: u64,
}

impl<R> Clone for ProgressHandle<R> {
    fn clone(&self) -> Self {
        ProgressHandle {
            shared: Arc::clone(&self.shared),
            generation: self.generation,
        }
    }
}

impl<R> ProgressHandle<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Report progress (clamped to the configured ceiling, never decreasing).
    /// Returns false once this run has been superseded.
    pub fn update(&self, progress: u8, stage: impl Into<String>) -> bool {
        self.shared.apply(
            self.generation,
            WorkflowEvent::UpdateProgress {
                progress,
                stage: stage.into(),
            },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().generation != self.generation
    }
}

/// Async orchestrator for one calculation at a time.
///
/// # Example
///
/// ```rust
/// use wind_core::geometry::BuildingGeometry;
/// use wind_core::parameters::{CalculationRequest, ExposureCategory, WindParameters};
/// use wind_core::policy::{EnginePolicy, WorkflowConfig};
/// use wind_core::pressure::{calculate, illustrative_roof_table};
/// use wind_core::workflow::{CalculationWorkflow, WorkflowState};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let workflow = CalculationWorkflow::new(WorkflowConfig::default());
/// let request = CalculationRequest::new(
///     BuildingGeometry::rectangle(100.0, 80.0, 30.0),
///     WindParameters::new(120.0, ExposureCategory::C),
/// );
///
/// workflow
///     .start(request, |request, progress| async move {
///         progress.update(50, "Resolving coefficients");
///         calculate(&request, &illustrative_roof_table(), &EnginePolicy::default())
///     })
///     .unwrap();
/// workflow.wait().await;
///
/// assert!(matches!(workflow.state(), WorkflowState::Complete { .. }));
/// # });
/// ```
pub struct CalculationWorkflow<R = CalculationResult> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for CalculationWorkflow<R> {
    fn clone(&self) -> Self {
        CalculationWorkflow {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> CalculationWorkflow<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new(config: WorkflowConfig) -> Self {
        let (sender, _) = watch::channel(WorkflowState::Idle);
        let (settled, _) = watch::channel(0);
        CalculationWorkflow {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    machine: WorkflowMachine::new(config),
                    generation: 0,
                    task: None,
                    running: None,
                    calc: None,
                }),
                sender,
                settled,
            }),
        }
    }

    /// Start a calculation, cancelling any run already in flight.
    pub fn start<F, Fut>(&self, request: CalculationRequest, calc: F) -> CalcResult<Uuid>
    where
        F: Fn(CalculationRequest, ProgressHandle<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CalcResult<R>> + Send + 'static,
    {
        let calc: CalcFn<R> = Arc::new(move |request, progress| calc(request, progress).boxed());

        let mut inner = self.shared.lock();
        if inner.machine.state().is_transient() {
            self.cancel_in_flight(&mut *inner);
            inner.machine.dispatch(WorkflowEvent::Cancel)?;
        }
        inner.machine.dispatch(WorkflowEvent::StartCalculation {
            request: request.clone(),
        })?;
        inner.calc = Some(Arc::clone(&calc));
        let run_id = current_run_id(&*inner)?;

        self.launch(&mut *inner, request, calc);
        self.shared.publish(&inner);
        tracing::debug!(%run_id, "calculation started");
        Ok(run_id)
    }

    /// Re-run the last calculation from the error state with the same input.
    pub fn retry(&self) -> CalcResult<Uuid> {
        let mut inner = self.shared.lock();
        let calc = inner
            .calc
            .clone()
            .ok_or_else(|| CalcError::workflow_failed("No calculation to retry"))?;
        let request = inner
            .machine
            .request()
            .cloned()
            .ok_or_else(|| CalcError::workflow_failed("No previous input to retry with"))?;

        inner.machine.dispatch(WorkflowEvent::Retry)?;
        let run_id = current_run_id(&*inner)?;

        self.launch(&mut *inner, request, calc);
        self.shared.publish(&inner);
        tracing::debug!(%run_id, "calculation retried");
        Ok(run_id)
    }

    /// Cancel any in-flight task and return to idle.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        self.cancel_in_flight(&mut *inner);
        if let Err(error) = inner.machine.dispatch(WorkflowEvent::Reset) {
            tracing::warn!(error = %error, "reset rejected");
        }
        self.shared.publish(&inner);
    }

    /// Restore the previous settled state, cancelling any in-flight task.
    pub fn undo(&self) -> Option<WorkflowState<R>> {
        let mut inner = self.shared.lock();
        if !inner.machine.can_undo() {
            return None;
        }
        if inner.machine.state().is_transient() {
            self.cancel_in_flight(&mut *inner);
        }
        let restored = inner.machine.undo().cloned();
        self.shared.publish(&inner);
        restored
    }

    /// Report progress for the current run.
    pub fn update_progress(&self, progress: u8, stage: impl Into<String>) -> CalcResult<()> {
        let mut inner = self.shared.lock();
        inner.machine.dispatch(WorkflowEvent::UpdateProgress {
            progress,
            stage: stage.into(),
        })?;
        self.shared.publish(&inner);
        Ok(())
    }

    /// Wait until the task in flight at the time of the call finishes or
    /// is cancelled.
    pub async fn wait(&self) {
        let (target, mut settled) = {
            let inner = self.shared.lock();
            match inner.running {
                Some(generation) => (generation, self.shared.settled.subscribe()),
                None => return,
            }
        };
        if settled.wait_for(|done| *done >= target).await.is_err() {
            tracing::debug!(generation = target, "workflow dropped while waiting");
        }
    }

    pub fn state(&self) -> WorkflowState<R> {
        self.shared.lock().machine.state().clone()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState<R>> {
        self.shared.sender.subscribe()
    }

    pub fn can_undo(&self) -> bool {
        self.shared.lock().machine.can_undo()
    }

    pub fn request(&self) -> Option<CalculationRequest> {
        self.shared.lock().machine.request().cloned()
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.shared.lock().machine.run_id()
    }

    pub fn event_log(&self) -> Vec<EventRecord> {
        self.shared.lock().machine.event_log().cloned().collect()
    }

    fn launch(&self, inner: &mut Inner<R>, request: CalculationRequest, calc: CalcFn<R>) {
        inner.generation += 1;
        let generation = inner.generation;
        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(async move {
            if !shared.apply(generation, WorkflowEvent::BeginProcessing) {
                shared.finish(generation);
                return;
            }
            let progress = ProgressHandle {
                shared: Arc::clone(&shared),
                generation,
            };
            let outcome = AssertUnwindSafe(async move { calc(request, progress).await })
                .catch_unwind()
                .await;

            let event = match outcome {
                Ok(Ok(result)) => WorkflowEvent::CalculationSuccess { result },
                Ok(Err(error)) => {
                    tracing::warn!(error = %error, code = error.error_code(), "calculation failed");
                    WorkflowEvent::CalculationError {
                        message: error.to_string(),
                    }
                }
                Err(payload) => {
                    let message = format!("Calculation panicked: {}", panic_message(payload.as_ref()));
                    tracing::error!("{}", message);
                    WorkflowEvent::CalculationError { message }
                }
            };
            let succeeded = matches!(event, WorkflowEvent::CalculationSuccess { .. });
            if shared.apply(generation, event) && succeeded {
                tracing::info!(generation, "calculation complete");
            }
            shared.finish(generation);
        });
        inner.task = Some(task);
        inner.running = Some(generation);
    }

    fn cancel_in_flight(&self, inner: &mut Inner<R>) {
        inner.generation += 1;
        if let Some(task) = inner.task.take() {
            task.abort();
            tracing::debug!(generation = inner.generation, "cancelled in-flight calculation");
        }
        if let Some(generation) = inner.running {
            self.shared.settle(inner, generation);
        }
    }
}

impl<R> Default for CalculationWorkflow<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(WorkflowConfig::default())
    }
}

fn current_run_id<R: Clone>(inner: &Inner<R>) -> CalcResult<Uuid> {
    inner
        .machine
        .run_id()
        .ok_or_else(|| CalcError::workflow_failed("Run id missing after start"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BuildingGeometry;
    use crate::parameters::{ExposureCategory, WindParameters};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn request(length: f64) -> CalculationRequest {
        CalculationRequest::new(
            BuildingGeometry::rectangle(length, 80.0, 30.0),
            WindParameters::new(120.0, ExposureCategory::C),
        )
    }

    fn workflow() -> CalculationWorkflow<String> {
        CalculationWorkflow::new(WorkflowConfig::default())
    }

    #[tokio::test]
    async fn test_successful_run_completes() {
        let workflow = workflow();
        workflow
            .start(request(100.0), |req, progress| async move {
                progress.update(40, "Decomposing zones");
                Ok(format!("{}", req.geometry.footprint_area()))
            })
            .unwrap();
        workflow.wait().await;
        assert_eq!(
            workflow.state(),
            WorkflowState::Complete {
                result: "8000".to_string()
            }
        );
        assert!(workflow.event_log().iter().any(|r| r.event == "CALCULATION_SUCCESS"));
    }

    #[tokio::test]
    async fn test_error_then_retry_reuses_input() {
        let workflow = workflow();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        workflow
            .start(request(120.0), move |req, _| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CalcError::calculation_failed("wind_pressure", "transient failure"))
                    } else {
                        Ok(format!("{}", req.geometry.footprint_area()))
                    }
                }
            })
            .unwrap();
        workflow.wait().await;

        match workflow.state() {
            WorkflowState::Error { message, can_retry } => {
                assert!(can_retry);
                assert!(message.contains("transient failure"));
            }
            other => panic!("expected error state, got {:?}", other),
        }
        assert_eq!(workflow.request(), Some(request(120.0)));

        workflow.retry().unwrap();
        workflow.wait().await;
        assert_eq!(workflow.state().result(), Some(&"9600".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panic_is_captured_as_retryable_error() {
        let workflow = workflow();
        workflow
            .start(request(100.0), |_, _| async move {
                if true {
                    panic!("division by zero in zone table");
                }
                Ok(String::new())
            })
            .unwrap();
        workflow.wait().await;
        match workflow.state() {
            WorkflowState::Error { message, can_retry } => {
                assert!(can_retry);
                assert!(message.contains("division by zero"));
            }
            other => panic!("expected error state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restart_discards_in_flight_run() {
        let workflow = workflow();
        let first_run = workflow
            .start(request(100.0), |_, _| async move {
                std::future::pending::<()>().await;
                Ok("stale".to_string())
            })
            .unwrap();
        let second_run = workflow
            .start(request(200.0), |_, _| async move { Ok("fresh".to_string()) })
            .unwrap();
        assert_ne!(first_run, second_run);

        workflow.wait().await;
        assert_eq!(workflow.state().result(), Some(&"fresh".to_string()));
        assert!(workflow.event_log().iter().any(|r| r.event == "CANCEL"));
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    async fn eventually(flag: &AtomicBool) -> bool {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        flag.load(Ordering::SeqCst)
    }

    fn start_pending(workflow: &CalculationWorkflow<String>, dropped: &Arc<AtomicBool>) {
        let dropped = Arc::clone(dropped);
        workflow
            .start(request(100.0), move |_, _| {
                let guard = DropFlag(Arc::clone(&dropped));
                async move {
                    let _guard = guard;
                    std::future::pending::<()>().await;
                    Ok("stale".to_string())
                }
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_restart_aborts_task_and_releases_waiter() {
        let workflow = workflow();
        let dropped = Arc::new(AtomicBool::new(false));
        start_pending(&workflow, &dropped);

        let waiter = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.wait().await })
        };
        tokio::task::yield_now().await;

        workflow
            .start(request(200.0), |_, _| async move { Ok("fresh".to_string()) })
            .unwrap();

        let released = tokio::time::timeout(Duration::from_millis(500), waiter).await;
        assert!(matches!(released, Ok(Ok(()))));
        assert!(eventually(&dropped).await);

        workflow.wait().await;
        assert_eq!(workflow.state().result(), Some(&"fresh".to_string()));
    }

    #[tokio::test]
    async fn test_reset_aborts_task_while_waited_on() {
        let workflow = workflow();
        let dropped = Arc::new(AtomicBool::new(false));
        start_pending(&workflow, &dropped);

        let waiter = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.wait().await })
        };
        tokio::task::yield_now().await;

        workflow.reset();
        let released = tokio::time::timeout(Duration::from_millis(500), waiter).await;
        assert!(matches!(released, Ok(Ok(()))));
        assert!(eventually(&dropped).await);
        assert_eq!(workflow.state(), WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_stale_generation_cannot_overwrite() {
        let workflow = workflow();
        workflow
            .start(request(100.0), |_, _| async move { Ok("current".to_string()) })
            .unwrap();
        workflow.wait().await;

        let stale = workflow.shared.lock().generation - 1;
        let applied = workflow.shared.apply(
            stale,
            WorkflowEvent::CalculationSuccess {
                result: "late".to_string(),
            },
        );
        assert!(!applied);
        assert_eq!(workflow.state().result(), Some(&"current".to_string()));
    }

    #[tokio::test]
    async fn test_progress_clamped_until_completion() {
        let workflow = workflow();
        let release = Arc::new(Notify::new());
        let gate = Arc::clone(&release);
        let mut updates = workflow.subscribe();

        workflow
            .start(request(100.0), move |_, progress| {
                let gate = Arc::clone(&gate);
                async move {
                    progress.update(60, "Resolving coefficients");
                    progress.update(30, "Going backwards");
                    progress.update(99, "Almost");
                    gate.notified().await;
                    Ok("done".to_string())
                }
            })
            .unwrap();

        let seen = updates
            .wait_for(|state| matches!(state, WorkflowState::Calculating { stage, .. } if stage == "Almost"))
            .await
            .unwrap()
            .clone();
        assert!(matches!(seen, WorkflowState::Calculating { progress: 90, .. }));

        assert!(workflow.update_progress(10, "External").is_ok());
        assert!(matches!(workflow.state(), WorkflowState::Calculating { progress: 90, .. }));

        release.notify_one();
        workflow.wait().await;
        assert_eq!(workflow.state().result(), Some(&"done".to_string()));
    }

    #[tokio::test]
    async fn test_undo_cancels_and_restores_completed_state() {
        let workflow = workflow();
        workflow
            .start(request(100.0), |_, _| async move { Ok("first".to_string()) })
            .unwrap();
        workflow.wait().await;

        workflow
            .start(request(200.0), |_, _| async move {
                std::future::pending::<()>().await;
                Ok("never".to_string())
            })
            .unwrap();
        assert!(workflow.state().is_transient());

        let restored = workflow.undo();
        assert_eq!(
            restored,
            Some(WorkflowState::Complete {
                result: "first".to_string()
            })
        );
        workflow.wait().await;
        assert_eq!(workflow.state().result(), Some(&"first".to_string()));
    }

    #[tokio::test]
    async fn test_reset_and_invalid_retry() {
        let workflow = workflow();
        assert!(workflow.retry().is_err());
        assert!(!workflow.can_undo());

        workflow
            .start(request(100.0), |_, _| async move { Ok("done".to_string()) })
            .unwrap();
        workflow.wait().await;
        workflow.reset();
        assert_eq!(workflow.state(), WorkflowState::Idle);
        assert!(workflow.can_undo());

        // retry is only valid from the error state
        let err = workflow.retry().unwrap_err();
        assert!(matches!(err, CalcError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_subscribers_see_completion() {
        let workflow = workflow();
        let mut updates = workflow.subscribe();
        workflow
            .start(request(100.0), |_, _| async move { Ok("done".to_string()) })
            .unwrap();
        let state = updates
            .wait_for(|state| matches!(state, WorkflowState::Complete { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(state.result(), Some(&"done".to_string()));
    }
}
