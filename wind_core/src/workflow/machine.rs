//! # Workflow State Machine
//!
//! Pure state type and transition function for one calculation workflow,
//! plus a [`WorkflowMachine`] that tracks the current context, a bounded
//! undo history and an event log.
//!
//! ```text
//!            START_CALCULATION              BEGIN_PROCESSING
//!  idle ──────────────────────> loading ─────────────────────> calculating ──┐
//!   ^  error|complete ───────────^  ^                              │  progress │
//!   │                               │ RETRY                        │ <─────────┘
//!   │ RESET (any)                 error <──── CALCULATION_ERROR ───┤
//!   │ CANCEL (loading|calculating)                                 │
//!   └──────────────────────────  complete <── CALCULATION_SUCCESS ─┘
//! ```
//!
//! No I/O happens here; the async runner drives these transitions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CalcError, CalcResult};
use crate::parameters::CalculationRequest;
use crate::policy::WorkflowConfig;
use crate::pressure::CalculationResult;

/// Stage label set when processing begins
pub const INITIAL_STAGE: &str = "Preparing calculation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowState<R = CalculationResult> {
    Idle,
    Loading,
    Calculating { progress: u8, stage: String },
    Complete { result: R },
    Error { message: String, can_retry: bool },
}

impl<R> WorkflowState<R> {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Loading => "loading",
            WorkflowState::Calculating { .. } => "calculating",
            WorkflowState::Complete { .. } => "complete",
            WorkflowState::Error { .. } => "error",
        }
    }

    /// Loading and calculating only exist while a task is in flight
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkflowState::Loading | WorkflowState::Calculating { .. })
    }

    pub fn result(&self) -> Option<&R> {
        match self {
            WorkflowState::Complete { result } => Some(result),
            _ => None,
        }
    }
}

impl<R> Default for WorkflowState<R> {
    fn default() -> Self {
        WorkflowState::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEvent<R = CalculationResult> {
    StartCalculation { request: CalculationRequest },
    BeginProcessing,
    UpdateProgress { progress: u8, stage: String },
    CalculationSuccess { result: R },
    CalculationError { message: String },
    Retry,
    Reset,
    Cancel,
}

impl<R> WorkflowEvent<R> {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::StartCalculation { .. } => "START_CALCULATION",
            WorkflowEvent::BeginProcessing => "BEGIN_PROCESSING",
            WorkflowEvent::UpdateProgress { .. } => "UPDATE_PROGRESS",
            WorkflowEvent::CalculationSuccess { .. } => "CALCULATION_SUCCESS",
            WorkflowEvent::CalculationError { .. } => "CALCULATION_ERROR",
            WorkflowEvent::Retry => "RETRY",
            WorkflowEvent::Reset => "RESET",
            WorkflowEvent::Cancel => "CANCEL",
        }
    }
}

/// Compute the next state.
///
/// Progress never moves backwards and is capped at `progress_ceiling`;
/// only `CALCULATION_SUCCESS` completes the run.
pub fn transition<R: Clone>(
    state: &WorkflowState<R>,
    event: &WorkflowEvent<R>,
    progress_ceiling: u8,
) -> CalcResult<WorkflowState<R>> {
    use WorkflowEvent as E;
    use WorkflowState as S;

    let next = match (state, event) {
        (_, E::Reset) => S::Idle,
        (S::Idle | S::Error { .. } | S::Complete { .. }, E::StartCalculation { .. }) => S::Loading,
        (S::Loading, E::BeginProcessing) => S::Calculating {
            progress: 0,
            stage: INITIAL_STAGE.to_string(),
        },
        (S::Calculating { progress: current, .. }, E::UpdateProgress { progress, stage }) => S::Calculating {
            progress: (*progress).min(progress_ceiling).max(*current),
            stage: stage.clone(),
        },
        (S::Loading | S::Calculating { .. }, E::CalculationSuccess { result }) => S::Complete {
            result: result.clone(),
        },
        (S::Loading | S::Calculating { .. }, E::CalculationError { message }) => S::Error {
            message: message.clone(),
            can_retry: true,
        },
        (S::Error { .. }, E::Retry) => S::Loading,
        (S::Loading | S::Calculating { .. }, E::Cancel) => S::Idle,
        _ => return Err(CalcError::invalid_transition(state.name(), event.name())),
    };
    Ok(next)
}

// ============================================================================
// Machine
// ============================================================================

/// Everything needed to restore the workflow to an earlier point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext<R = CalculationResult> {
    pub state: WorkflowState<R>,
    /// Last submitted input, kept across errors and resets
    pub request: Option<CalculationRequest>,
    pub run_id: Option<Uuid>,
}

impl<R> Default for WorkflowContext<R> {
    fn default() -> Self {
        WorkflowContext {
            state: WorkflowState::Idle,
            request: None,
            run_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: String,
    pub from: String,
    pub to: String,
    pub run_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WorkflowMachine<R = CalculationResult> {
    config: WorkflowConfig,
    context: WorkflowContext<R>,
    history: VecDeque<WorkflowContext<R>>,
    event_log: VecDeque<EventRecord>,
    sequence: u64,
}

impl<R: Clone> WorkflowMachine<R> {
    pub fn new(config: WorkflowConfig) -> Self {
        WorkflowMachine {
            config,
            context: WorkflowContext::default(),
            history: VecDeque::new(),
            event_log: VecDeque::new(),
            sequence: 0,
        }
    }

    pub fn state(&self) -> &WorkflowState<R> {
        &self.context.state
    }

    pub fn context(&self) -> &WorkflowContext<R> {
        &self.context
    }

    pub fn request(&self) -> Option<&CalculationRequest> {
        self.context.request.as_ref()
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.context.run_id
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// True when undo has a settled context to restore
    pub fn can_undo(&self) -> bool {
        self.history.iter().any(|ctx| !ctx.state.is_transient())
    }

    pub fn event_log(&self) -> impl Iterator<Item = &EventRecord> {
        self.event_log.iter()
    }

    /// Apply an event, recording the prior context in the undo history.
    pub fn dispatch(&mut self, event: WorkflowEvent<R>) -> CalcResult<&WorkflowState<R>> {
        let next = transition(&self.context.state, &event, self.config.progress_ceiling)?;
        let prior = self.context.clone();

        match &event {
            WorkflowEvent::StartCalculation { request } => {
                self.context.request = Some(request.clone());
                self.context.run_id = Some(Uuid::new_v4());
            }
            WorkflowEvent::Retry => self.context.run_id = Some(Uuid::new_v4()),
            WorkflowEvent::Reset | WorkflowEvent::Cancel => self.context.run_id = None,
            _ => {}
        }
        self.context.state = next;

        // progress ticks are not undo points
        if !matches!(event, WorkflowEvent::UpdateProgress { .. }) {
            self.push_history(prior.clone());
        }
        self.log(event.name(), prior.state.name(), prior.run_id.or(self.context.run_id));

        Ok(&self.context.state)
    }

    /// Restore the most recent settled context, skipping loading/calculating ones.
    pub fn undo(&mut self) -> Option<&WorkflowState<R>> {
        if !self.can_undo() {
            return None;
        }
        let from = self.context.state.name();
        while let Some(previous) = self.history.pop_back() {
            if !previous.state.is_transient() {
                self.context = previous;
                break;
            }
        }
        self.log("UNDO", from, self.context.run_id);
        Some(&self.context.state)
    }

    fn push_history(&mut self, context: WorkflowContext<R>) {
        if self.config.history_limit == 0 {
            return;
        }
        if self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(context);
    }

    fn log(&mut self, event: &str, from: &str, run_id: Option<Uuid>) {
        self.sequence += 1;
        if self.config.event_log_limit == 0 {
            return;
        }
        if self.event_log.len() >= self.config.event_log_limit {
            self.event_log.pop_front();
        }
        self.event_log.push_back(EventRecord {
            sequence: self.sequence,
            event: event.to_string(),
            from: from.to_string(),
            to: self.context.state.name().to_string(),
            run_id,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BuildingGeometry;
    use crate::parameters::{ExposureCategory, WindParameters};

    type Machine = WorkflowMachine<String>;

    fn request() -> CalculationRequest {
        CalculationRequest::new(
            BuildingGeometry::rectangle(100.0, 80.0, 30.0),
            WindParameters::new(120.0, ExposureCategory::C),
        )
    }

    fn start() -> WorkflowEvent<String> {
        WorkflowEvent::StartCalculation { request: request() }
    }

    fn progress(progress: u8) -> WorkflowEvent<String> {
        WorkflowEvent::UpdateProgress {
            progress,
            stage: format!("step {}", progress),
        }
    }

    #[test]
    fn test_error_is_retryable_and_keeps_request() {
        let mut machine = Machine::new(WorkflowConfig::default());
        machine.dispatch(start()).unwrap();
        let state = machine
            .dispatch(WorkflowEvent::CalculationError { message: "boom".into() })
            .unwrap();
        assert_eq!(
            state,
            &WorkflowState::Error {
                message: "boom".into(),
                can_retry: true
            }
        );

        assert_eq!(machine.dispatch(WorkflowEvent::Retry).unwrap(), &WorkflowState::Loading);
        assert_eq!(machine.request(), Some(&request()));
    }

    #[test]
    fn test_happy_path() {
        let mut machine = Machine::new(WorkflowConfig::default());
        machine.dispatch(start()).unwrap();
        machine.dispatch(WorkflowEvent::BeginProcessing).unwrap();
        assert!(matches!(machine.state(), WorkflowState::Calculating { progress: 0, .. }));
        machine.dispatch(progress(40)).unwrap();
        machine
            .dispatch(WorkflowEvent::CalculationSuccess { result: "done".into() })
            .unwrap();
        assert_eq!(machine.state().result(), Some(&"done".to_string()));
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let state: WorkflowState<String> = WorkflowState::Calculating {
            progress: 50,
            stage: "x".into(),
        };
        let back = transition(&state, &progress(20), 90).unwrap();
        assert!(matches!(back, WorkflowState::Calculating { progress: 50, .. }));
        let over = transition(&state, &progress(100), 90).unwrap();
        assert!(matches!(over, WorkflowState::Calculating { progress: 90, .. }));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let idle: WorkflowState<String> = WorkflowState::Idle;
        let err = transition(&idle, &WorkflowEvent::Retry, 90).unwrap_err();
        assert!(matches!(err, CalcError::InvalidTransition { .. }));
        assert!(transition(&idle, &progress(10), 90).is_err());
        assert!(transition(&WorkflowState::Loading, &start(), 90).is_err());
        assert!(transition(&idle, &WorkflowEvent::Cancel, 90).is_err());
    }

    #[test]
    fn test_reset_from_any_state() {
        let states: Vec<WorkflowState<String>> = vec![
            WorkflowState::Idle,
            WorkflowState::Loading,
            WorkflowState::Calculating { progress: 10, stage: "x".into() },
            WorkflowState::Complete { result: "r".into() },
            WorkflowState::Error { message: "e".into(), can_retry: true },
        ];
        for state in states {
            assert_eq!(transition(&state, &WorkflowEvent::Reset, 90).unwrap(), WorkflowState::Idle);
        }
    }

    #[test]
    fn test_undo_skips_transient_contexts() {
        let mut machine = Machine::new(WorkflowConfig::default());
        assert!(!machine.can_undo());

        machine.dispatch(start()).unwrap();
        machine.dispatch(WorkflowEvent::BeginProcessing).unwrap();
        machine.dispatch(progress(30)).unwrap();
        machine
            .dispatch(WorkflowEvent::CalculationSuccess { result: "first".into() })
            .unwrap();
        machine.dispatch(WorkflowEvent::Reset).unwrap();

        assert!(machine.can_undo());
        assert_eq!(
            machine.undo(),
            Some(&WorkflowState::Complete { result: "first".into() })
        );
        // remaining history: idle, loading (transient) -> undo lands on idle
        assert_eq!(machine.undo(), Some(&WorkflowState::Idle));
        assert!(!machine.can_undo());
        assert_eq!(machine.undo(), None);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = WorkflowConfig {
            history_limit: 3,
            ..WorkflowConfig::default()
        };
        let mut machine = Machine::new(config);
        for _ in 0..5 {
            machine.dispatch(start()).unwrap();
            machine.dispatch(WorkflowEvent::Reset).unwrap();
        }
        assert_eq!(machine.history_len(), 3);
    }

    #[test]
    fn test_cannot_undo_when_history_holds_only_transient_contexts() {
        let config = WorkflowConfig {
            history_limit: 1,
            ..WorkflowConfig::default()
        };
        let mut machine = Machine::new(config);
        machine.dispatch(start()).unwrap();
        machine.dispatch(WorkflowEvent::BeginProcessing).unwrap();

        // the only entry left is the loading context
        assert_eq!(machine.history_len(), 1);
        assert!(!machine.can_undo());
        assert!(machine.undo().is_none());
        assert!(machine.state().is_transient());

        machine
            .dispatch(WorkflowEvent::CalculationSuccess { result: "done".into() })
            .unwrap();
        assert!(!machine.can_undo());

        machine.dispatch(WorkflowEvent::Reset).unwrap();
        assert!(machine.can_undo());
        assert_eq!(
            machine.undo(),
            Some(&WorkflowState::Complete {
                result: "done".to_string()
            })
        );
    }

    #[test]
    fn test_event_log_records_runs() {
        let config = WorkflowConfig {
            event_log_limit: 2,
            ..WorkflowConfig::default()
        };
        let mut machine = Machine::new(config);
        machine.dispatch(start()).unwrap();
        let run_id = machine.run_id();
        assert!(run_id.is_some());
        machine.dispatch(WorkflowEvent::BeginProcessing).unwrap();
        machine.dispatch(WorkflowEvent::Cancel).unwrap();

        let log: Vec<&EventRecord> = machine.event_log().collect();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].event, "BEGIN_PROCESSING");
        assert_eq!(log[1].event, "CANCEL");
        assert_eq!(log[1].to, "idle");
        assert_eq!(log[1].run_id, run_id);
        assert_eq!(log[1].sequence, 3);
    }

    #[test]
    fn test_state_serializes_with_type_tag() {
        let state: WorkflowState<String> = WorkflowState::Error {
            message: "boom".into(),
            can_retry: true,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"can_retry\":true"));
    }
}
