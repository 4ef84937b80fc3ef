//! Workflow Status
//!
//! Lifecycle states of a submitted workflow run:
//!
//! ```text
//! Pending -> Running -> { Succeeded | Failed | Error }
//! ```
//!
//! Terminal states have no outgoing transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkflowStatus {
    /// Accepted by the engine, not started yet
    #[default]
    Pending,
    Running,
    Succeeded,
    /// A step command exited non-zero
    Failed,
    /// Engine-level fault, such as a node eviction
    Error,
}

impl WorkflowStatus {
    /// Maps an engine phase string to a status.
    ///
    /// Unknown or empty phases map to `Pending`.
    pub fn from_phase(phase: &str) -> Self {
        match phase.trim() {
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Error" => Self::Error,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Error)
    }

    pub fn is_successful(self) -> bool {
        self == Self::Succeeded
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same non-terminal state is allowed.
    pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
        match self {
            Self::Pending => true,
            Self::Running => next != Self::Pending,
            Self::Succeeded | Self::Failed | Self::Error => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WorkflowStatus; 5] = [
        WorkflowStatus::Pending,
        WorkflowStatus::Running,
        WorkflowStatus::Succeeded,
        WorkflowStatus::Failed,
        WorkflowStatus::Error,
    ];

    #[test]
    fn test_from_phase() {
        assert_eq!(WorkflowStatus::from_phase("Running"), WorkflowStatus::Running);
        assert_eq!(WorkflowStatus::from_phase("Succeeded"), WorkflowStatus::Succeeded);
        assert_eq!(WorkflowStatus::from_phase("Failed"), WorkflowStatus::Failed);
        assert_eq!(WorkflowStatus::from_phase("Error"), WorkflowStatus::Error);
        assert_eq!(WorkflowStatus::from_phase("Pending"), WorkflowStatus::Pending);
    }

    #[test]
    fn test_unknown_phase_is_pending() {
        assert_eq!(WorkflowStatus::from_phase(""), WorkflowStatus::Pending);
        assert_eq!(WorkflowStatus::from_phase("Skipped"), WorkflowStatus::Pending);
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 3);
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
    }

    #[test]
    fn test_only_succeeded_is_successful() {
        for status in ALL {
            assert_eq!(status.is_successful(), status == WorkflowStatus::Succeeded);
        }
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(WorkflowStatus::Pending.can_transition_to(WorkflowStatus::Running));
        assert!(WorkflowStatus::Pending.can_transition_to(WorkflowStatus::Error));
        assert!(WorkflowStatus::Running.can_transition_to(WorkflowStatus::Failed));
        assert!(WorkflowStatus::Running.can_transition_to(WorkflowStatus::Running));
        assert!(!WorkflowStatus::Running.can_transition_to(WorkflowStatus::Pending));
    }

    #[test]
    fn test_display() {
        assert_eq!(WorkflowStatus::Error.to_string(), "Error");
    }
}
