//! Synchronization state machine
//!
//! Pure transition rules; the controller owns the current state and
//! applies these in event arrival order.

use serde::Serialize;

use crate::provider::FetcherStatus;
use crate::snapshot::FlagSnapshot;

/// Lifecycle state published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    /// Initialization started, values are the declared defaults
    Pending,
    /// Setup completed or configuration applied
    Ready,
    /// Setup failed; values stay at the last good snapshot
    Failed(String),
}

impl SyncState {
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SyncState::Ready)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SyncState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Compute the effect of an event on this state
    pub fn on_event(&self, event: &SyncEvent) -> Transition {
        match (self, event) {
            (SyncState::Failed(_), SyncEvent::Applied(FetcherStatus::AppliedFromNetwork)) => {
                // Fresh values are shown but the setup error stays visible
                Transition::publish(self.clone(), SnapshotAction::Recompute)
            }
            (_, SyncEvent::Applied(FetcherStatus::AppliedFromNetwork)) => {
                Transition::publish(SyncState::Ready, SnapshotAction::Recompute)
            }
            (_, SyncEvent::Applied(FetcherStatus::AppliedFromCache)) => {
                Transition::publish(self.clone(), SnapshotAction::Recompute)
            }
            (_, SyncEvent::Applied(FetcherStatus::AppliedFromEmbedded))
            | (_, SyncEvent::Applied(FetcherStatus::ErrorFetchFailed)) => {
                Transition::unchanged(self.clone())
            }
            (SyncState::Failed(_), SyncEvent::SetupCompleted) => Transition::unchanged(self.clone()),
            (_, SyncEvent::SetupCompleted) => {
                Transition::publish(SyncState::Ready, SnapshotAction::Recompute)
            }
            (_, SyncEvent::SetupFailed(reason)) => {
                Transition::publish(SyncState::Failed(reason.clone()), SnapshotAction::Keep)
            }
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Provider applied a configuration
    Applied(FetcherStatus),
    /// Provider setup call resolved
    SetupCompleted,
    /// Provider setup call rejected, or the credential was unusable
    SetupFailed(String),
}

/// What to do with the current snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotAction {
    /// Keep the last published snapshot
    Keep,
    /// Re-read every flag from the provider
    Recompute,
}

/// Outcome of applying an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SyncState,
    pub snapshot: SnapshotAction,
    pub publish: bool,
}

impl Transition {
    fn publish(next: SyncState, snapshot: SnapshotAction) -> Self {
        Self {
            next,
            snapshot,
            publish: true,
        }
    }

    fn unchanged(current: SyncState) -> Self {
        Self {
            next: current,
            snapshot: SnapshotAction::Keep,
            publish: false,
        }
    }
}

/// Initialization guard
///
/// Only the `NotStarted -> InFlight` transition performs work; every later
/// `initialize` call observes a non-startable phase and returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitPhase {
    #[default]
    NotStarted,
    InFlight,
    Settled,
}

impl InitPhase {
    /// Claim the right to initialize; true only for the first caller
    pub fn begin(&mut self) -> bool {
        if *self == InitPhase::NotStarted {
            *self = InitPhase::InFlight;
            true
        } else {
            false
        }
    }

    pub fn settle(&mut self) {
        *self = InitPhase::Settled;
    }
}

/// What subscribers observe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncView {
    #[serde(flatten)]
    pub state: SyncState,
    pub flags: FlagSnapshot,
    /// Increments on every publication
    pub revision: u64,
}

impl SyncView {
    pub fn initial(defaults: FlagSnapshot) -> Self {
        Self {
            state: SyncState::Pending,
            flags: defaults,
            revision: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_pending()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }
}
