//! Run stage machine
//!
//! `Init -> LoadingInputs -> ComputingLikelihood -> Classifying -> Cleaning
//! -> WritingOutputs -> Done`, with `Failed` reachable from every non-final
//! stage. `Done` and `Failed` are absorbing.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Init,
    LoadingInputs,
    ComputingLikelihood,
    Classifying,
    Cleaning,
    WritingOutputs,
    Done,
    Failed,
}

/// Result of a stage, the input of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Stage {
    /// Working stages in execution order
    pub const SEQUENCE: [Stage; 6] = [
        Stage::Init,
        Stage::LoadingInputs,
        Stage::ComputingLikelihood,
        Stage::Classifying,
        Stage::Cleaning,
        Stage::WritingOutputs,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Stage entered after `self` finishes with `outcome`
    pub fn transition(self, outcome: Outcome) -> Stage {
        match (self, outcome) {
            (Stage::Done, _) => Stage::Done,
            (Stage::Failed, _) => Stage::Failed,
            (_, Outcome::Failed) => Stage::Failed,
            (Stage::Init, Outcome::Succeeded) => Stage::LoadingInputs,
            (Stage::LoadingInputs, Outcome::Succeeded) => Stage::ComputingLikelihood,
            (Stage::ComputingLikelihood, Outcome::Succeeded) => Stage::Classifying,
            (Stage::Classifying, Outcome::Succeeded) => Stage::Cleaning,
            (Stage::Cleaning, Outcome::Succeeded) => Stage::WritingOutputs,
            (Stage::WritingOutputs, Outcome::Succeeded) => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut stage = Stage::Init;
        let mut visited = vec![stage];
        while !stage.is_terminal() {
            stage = stage.transition(Outcome::Succeeded);
            visited.push(stage);
        }
        assert_eq!(&visited[..6], &Stage::SEQUENCE);
        assert_eq!(stage, Stage::Done);
    }

    #[test]
    fn test_failure_is_absorbing() {
        assert_eq!(Stage::Classifying.transition(Outcome::Failed), Stage::Failed);
        assert_eq!(Stage::Failed.transition(Outcome::Succeeded), Stage::Failed);
        assert_eq!(Stage::Done.transition(Outcome::Failed), Stage::Done);
    }
}
