//! Status Timeline
//!
//! Records the statuses observed while waiting on a workflow run, for
//! reporting transitions and time spent in each status.

use std::collections::HashMap;
use std::time::Duration;

use crate::execution::status::WorkflowStatus;

/// A status seen by one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub status: WorkflowStatus,
    /// Time since the wait started
    pub offset: Duration,
}

/// A change of status between two consecutive polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
    pub offset: Duration,
}

/// Ordered log of observed statuses.
#[derive(Debug, Clone, Default)]
pub struct StatusTimeline {
    observations: Vec<Observation>,
}

impl StatusTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a poll result. Returns true when the status changed.
    pub fn record(&mut self, status: WorkflowStatus, offset: Duration) -> bool {
        let changed = self.last_status() != Some(status);
        self.observations.push(Observation { status, offset });
        changed
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn last_status(&self) -> Option<WorkflowStatus> {
        self.observations.last().map(|o| o.status)
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.observations
            .windows(2)
            .filter(|pair| pair[0].status != pair[1].status)
            .map(|pair| Transition {
                from: pair[0].status,
                to: pair[1].status,
                offset: pair[1].offset,
            })
            .collect()
    }

    /// Time attributed to each status, measured between polls.
    pub fn time_in_status(&self) -> HashMap<WorkflowStatus, Duration> {
        let mut durations: HashMap<WorkflowStatus, Duration> = HashMap::new();

        for pair in self.observations.windows(2) {
            let elapsed = pair[1].offset.saturating_sub(pair[0].offset);
            *durations.entry(pair[0].status).or_default() += elapsed;
        }

        durations
    }

    /// Human readable summary of the wait.
    pub fn report(&self) -> String {
        let mut output = String::from("\nStatus Timeline:\n\n");

        let Some(first) = self.observations.first() else {
            output.push_str("  (no observations)\n");
            return output;
        };

        output.push_str(&format!("{:>8} ms  {}\n", first.offset.as_millis(), first.status));
        for transition in self.transitions() {
            output.push_str(&format!(
                "{:>8} ms  {} -> {}\n",
                transition.offset.as_millis(),
                transition.from,
                transition.to
            ));
        }

        let durations = self.time_in_status();
        let mut seen: Vec<WorkflowStatus> = Vec::new();
        for observation in &self.observations {
            if !seen.contains(&observation.status) {
                seen.push(observation.status);
            }
        }

        output.push('\n');
        for status in seen {
            let spent = durations.get(&status).copied().unwrap_or_default();
            output.push_str(&format!("{:10} {} ms\n", status.as_str(), spent.as_millis()));
        }

        output
    }
}
