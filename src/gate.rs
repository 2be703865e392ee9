//! The entry-point gate.
//!
//! Separates defining the record builder from invoking it. `main` hands the
//! gate an `Invocation`; anything that merely links the library never does,
//! so the builder cannot run unsolicited.

use crate::error::GateError;
use crate::record::{self, OutputRecord};

/// The context a process was started in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// True when started as a top-level command rather than loaded by another context.
    pub standalone: bool,
    /// Arguments actually supplied by the caller. The first one is the category.
    pub args: Vec<String>,
}

impl Invocation {
    /// A top-level command, with the category argument if one was given.
    pub fn from_cli(category: Option<String>) -> Self {
        Self {
            standalone: true,
            args: category.into_iter().collect(),
        }
    }

    /// Definitions loaded by another context (a test harness, a library consumer).
    pub fn loaded() -> Self {
        Self {
            standalone: false,
            args: Vec::new(),
        }
    }
}

/// What the gate decided to do with an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Invoke(String),
    DefineOnly,
}

/// Lifecycle of a gate. There is no way back from `Invoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loaded,
    Invoked,
}

/// Invoke iff the process is a top-level command and an argument was supplied.
pub fn decide(invocation: &Invocation) -> Decision {
    match invocation.args.first() {
        Some(category) if invocation.standalone => Decision::Invoke(category.clone()),
        _ => Decision::DefineOnly,
    }
}

/// Decides once per process whether the record builder runs.
///
/// Starts in `Loaded`. An `Invoke` decision moves it to `Invoked`; a define-only
/// decision leaves it in `Loaded`. Either way it refuses to be evaluated again.
#[derive(Debug)]
pub struct EntryPointGate {
    state: GateState,
    evaluated: bool,
}

impl Default for EntryPointGate {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryPointGate {
    /// Creates a gate in the `Loaded` state.
    pub fn new() -> Self {
        Self {
            state: GateState::Loaded,
            evaluated: false,
        }
    }

    /// Current state; `Invoked` only after an `Invoke` decision.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Evaluates the gate for `invocation`.
    ///
    /// Returns `Ok(None)` on the define-only path. Builder failures are returned as
    /// `GateError::Record` with the original error inside.
    pub fn evaluate(&mut self, invocation: &Invocation) -> Result<Option<OutputRecord>, GateError> {
        if self.evaluated {
            return Err(GateError::AlreadyEvaluated);
        }
        self.evaluated = true;

        match decide(invocation) {
            Decision::Invoke(category) => {
                self.state = GateState::Invoked;
                tracing::debug!(%category, "gate: invoking record builder");
                Ok(Some(record::build(&category)?))
            }
            Decision::DefineOnly => {
                tracing::debug!(standalone = invocation.standalone, "gate: define-only");
                Ok(None)
            }
        }
    }
}
