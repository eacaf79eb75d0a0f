//! Pipeline states and the pure transition function between them.
//!
//! ```text
//! Idle → ComputingIdentity → EnsuringOutputDir ─┬─ created ──→ GeneratingDerivedAssets ─┐
//!                                                └─ exists ───────────────────────────────┴→ ExtractingMetadata → Complete
//! any non-terminal state ── StepFailed ──→ Failed
//! ```
//!
//! Transitions only move forward; `Complete` and `Failed` are absorbing.

use serde::Serialize;
use std::fmt;

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    Idle,
    ComputingIdentity,
    EnsuringOutputDir,
    GeneratingDerivedAssets,
    ExtractingMetadata,
    Complete,
    Failed,
}

/// What just happened, as reported by the step that finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Start,
    IdentityReady,
    OutputDirCreated,
    /// The output directory already existed; `missing` derived files must
    /// still be generated (always 0 unless verification is enabled).
    OutputDirExists { missing: usize },
    DerivedAssetsDone { succeeded: usize, failed: usize },
    MetadataReady,
    StepFailed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Position along the forward order; strictly increases on every real transition.
    pub fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::ComputingIdentity => 1,
            Self::EnsuringOutputDir => 2,
            Self::GeneratingDerivedAssets => 3,
            Self::ExtractingMetadata => 4,
            Self::Complete => 5,
            Self::Failed => 6,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ComputingIdentity => "computing-identity",
            Self::EnsuringOutputDir => "ensuring-output-dir",
            Self::GeneratingDerivedAssets => "generating-derived-assets",
            Self::ExtractingMetadata => "extracting-metadata",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Compute the next state.
///
/// An event that makes no sense in the current state fails the pipeline.
pub fn transition(state: PipelineState, event: PipelineEvent) -> PipelineState {
    use PipelineEvent as E;
    use PipelineState as S;

    if state.is_terminal() {
        return state;
    }

    match (state, event) {
        (_, E::StepFailed) => S::Failed,
        (S::Idle, E::Start) => S::ComputingIdentity,
        (S::ComputingIdentity, E::IdentityReady) => S::EnsuringOutputDir,
        (S::EnsuringOutputDir, E::OutputDirCreated) => S::GeneratingDerivedAssets,
        (S::EnsuringOutputDir, E::OutputDirExists { missing: 0 }) => S::ExtractingMetadata,
        (S::EnsuringOutputDir, E::OutputDirExists { .. }) => S::GeneratingDerivedAssets,
        (S::GeneratingDerivedAssets, E::DerivedAssetsDone { succeeded, .. }) => {
            if succeeded > 0 {
                S::ExtractingMetadata
            } else {
                S::Failed
            }
        }
        (S::ExtractingMetadata, E::MetadataReady) => S::Complete,
        _ => S::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineEvent as E;
    use PipelineState as S;

    fn walk(events: &[PipelineEvent]) -> Vec<PipelineState> {
        let mut state = S::Idle;
        let mut path = vec![state];
        for event in events {
            state = transition(state, *event);
            path.push(state);
        }
        path
    }

    #[test]
    fn test_full_generation_path() {
        let path = walk(&[
            E::Start,
            E::IdentityReady,
            E::OutputDirCreated,
            E::DerivedAssetsDone {
                succeeded: 3,
                failed: 1,
            },
            E::MetadataReady,
        ]);
        assert_eq!(
            path,
            vec![
                S::Idle,
                S::ComputingIdentity,
                S::EnsuringOutputDir,
                S::GeneratingDerivedAssets,
                S::ExtractingMetadata,
                S::Complete
            ]
        );
    }

    #[test]
    fn test_dedup_shortcut_skips_generation() {
        let path = walk(&[
            E::Start,
            E::IdentityReady,
            E::OutputDirExists { missing: 0 },
            E::MetadataReady,
        ]);
        assert!(!path.contains(&S::GeneratingDerivedAssets));
        assert_eq!(path.last(), Some(&S::Complete));
    }

    #[test]
    fn test_existing_dir_with_missing_files_generates() {
        let state = transition(S::EnsuringOutputDir, E::OutputDirExists { missing: 2 });
        assert_eq!(state, S::GeneratingDerivedAssets);
    }

    #[test]
    fn test_all_assets_failed_fails() {
        let state = transition(
            S::GeneratingDerivedAssets,
            E::DerivedAssetsDone {
                succeeded: 0,
                failed: 4,
            },
        );
        assert_eq!(state, S::Failed);
    }

    #[test]
    fn test_failure_reachable_from_every_non_terminal_state() {
        for state in [
            S::Idle,
            S::ComputingIdentity,
            S::EnsuringOutputDir,
            S::GeneratingDerivedAssets,
            S::ExtractingMetadata,
        ] {
            assert_eq!(transition(state, E::StepFailed), S::Failed);
        }
    }

    #[test]
    fn test_terminal_states_absorb() {
        for event in [E::Start, E::IdentityReady, E::MetadataReady, E::StepFailed] {
            assert_eq!(transition(S::Complete, event), S::Complete);
            assert_eq!(transition(S::Failed, event), S::Failed);
        }
    }

    #[test]
    fn test_out_of_order_event_fails() {
        assert_eq!(transition(S::Idle, E::MetadataReady), S::Failed);
        assert_eq!(transition(S::ComputingIdentity, E::OutputDirCreated), S::Failed);
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let all_states = [
            S::Idle,
            S::ComputingIdentity,
            S::EnsuringOutputDir,
            S::GeneratingDerivedAssets,
            S::ExtractingMetadata,
            S::Complete,
            S::Failed,
        ];
        let all_events = [
            E::Start,
            E::IdentityReady,
            E::OutputDirCreated,
            E::OutputDirExists { missing: 0 },
            E::OutputDirExists { missing: 1 },
            E::DerivedAssetsDone {
                succeeded: 1,
                failed: 0,
            },
            E::DerivedAssetsDone {
                succeeded: 0,
                failed: 1,
            },
            E::MetadataReady,
            E::StepFailed,
        ];
        for state in all_states {
            for event in all_events {
                let next = transition(state, event);
                assert!(
                    next == state && state.is_terminal() || next.rank() > state.rank(),
                    "{state} --{event:?}--> {next}"
                );
            }
        }
    }
}
