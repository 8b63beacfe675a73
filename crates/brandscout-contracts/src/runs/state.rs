use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a mockup run currently is.
///
/// The legal moves are strictly linear:
/// `Idle -> Validating -> Analyzing -> Synthesizing -> Compositing -> Done`,
/// plus `Errored` from any non-terminal state other than `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Validating,
    Analyzing,
    Synthesizing,
    Compositing,
    Done,
    Errored,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Analyzing => "analyzing",
            Self::Synthesizing => "synthesizing",
            Self::Compositing => "compositing",
            Self::Done => "done",
            Self::Errored => "errored",
        }
    }

    /// The successor on the happy path, if any.
    pub fn next(self) -> Option<RunState> {
        match self {
            Self::Idle => Some(Self::Validating),
            Self::Validating => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Synthesizing),
            Self::Synthesizing => Some(Self::Compositing),
            Self::Compositing => Some(Self::Done),
            Self::Done | Self::Errored => None,
        }
    }

    pub fn can_transition_to(self, to: RunState) -> bool {
        if to == Self::Errored {
            return self.stage().is_some();
        }
        self.next() == Some(to)
    }

    /// The working stage this state represents; `None` for idle and terminal states.
    pub fn stage(self) -> Option<Stage> {
        match self {
            Self::Validating => Some(Stage::Validating),
            Self::Analyzing => Some(Stage::Analyzing),
            Self::Synthesizing => Some(Stage::Synthesizing),
            Self::Compositing => Some(Stage::Compositing),
            Self::Idle | Self::Done | Self::Errored => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that can fail and be blamed in an error report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Analyzing,
    Synthesizing,
    Compositing,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        self.state().as_str()
    }

    pub fn state(self) -> RunState {
        match self {
            Self::Validating => RunState::Validating,
            Self::Analyzing => RunState::Analyzing,
            Self::Synthesizing => RunState::Synthesizing,
            Self::Compositing => RunState::Compositing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
