use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline state machine
///
/// `Planning -> Searching -> Writing -> Sending -> Done`, with `Failed`
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Planning,
    Searching,
    Writing,
    Sending,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Planning => "planning",
            PipelineState::Searching => "searching",
            PipelineState::Writing => "writing",
            PipelineState::Sending => "sending",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_serde_agree() {
        for state in [PipelineState::Searching, PipelineState::Failed] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
        assert!(PipelineState::Done.is_terminal());
        assert!(!PipelineState::Sending.is_terminal());
    }
}
