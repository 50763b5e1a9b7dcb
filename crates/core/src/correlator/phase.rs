use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// Progress of one trigger/detect/act workflow.
///
/// ```text
/// Pending -> Triggered -> Captured -> Acting -> Finished
///    \___________\___________\_________________/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
	Pending,
	Triggered,
	Captured,
	Acting,
	Finished,
}

impl WorkflowPhase {
	pub fn can_transition_to(self, next: WorkflowPhase) -> bool {
		use WorkflowPhase::*;
		matches!(
			(self, next),
			(Pending, Triggered) | (Triggered, Captured) | (Captured, Acting) | (Pending | Triggered | Captured | Acting, Finished)
		)
	}

	pub fn transition(self, next: WorkflowPhase) -> Result<WorkflowPhase> {
		if self.can_transition_to(next) {
			Ok(next)
		} else {
			Err(Error::InvalidTransition {
				from: self.to_string(),
				to: next.to_string(),
			})
		}
	}
}

impl fmt::Display for WorkflowPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			WorkflowPhase::Pending => "pending",
			WorkflowPhase::Triggered => "triggered",
			WorkflowPhase::Captured => "captured",
			WorkflowPhase::Acting => "acting",
			WorkflowPhase::Finished => "finished",
		};
		f.write_str(name)
	}
}
