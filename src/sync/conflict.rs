//! # Conflict Resolution
//!
//! Per-key decision of a half-pass. Pure; the engine applies the result.

use crate::config::{ConflictPolicy, SyncDirection};
use crate::sync::SyncError;

/// One half of a convergence pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPass {
    /// ARM tags are copied onto node labels
    TagsToLabels,
    /// Node labels are copied onto ARM tags
    LabelsToTags,
}

impl SyncPass {
    /// Whether this half-pass runs under `direction`
    #[must_use]
    pub fn is_enabled(self, direction: SyncDirection) -> bool {
        matches!(
            (self, direction),
            (_, SyncDirection::TwoWay)
                | (SyncPass::TagsToLabels, SyncDirection::ArmToNode)
                | (SyncPass::LabelsToTags, SyncDirection::NodeToArm)
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncPass::TagsToLabels => "tags-to-labels",
            SyncPass::LabelsToTags => "labels-to-tags",
        }
    }
}

/// Outcome for a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write the incoming value to the destination
    Adopt,
    /// Leave the destination alone and report the disagreement
    KeepAndReport,
    /// Nothing to do
    Skip,
}

/// Decide what to do with one key.
///
/// `existing` is the destination's current value, `incoming` the (already
/// transformed) source value.
///
/// # Errors
///
/// Returns [`SyncError::Config`] when the values differ and the policy is not
/// recognized.
pub fn decide(
    pass: SyncPass,
    direction: SyncDirection,
    existing: Option<&str>,
    incoming: &str,
    policy: &ConflictPolicy,
) -> Result<Decision, SyncError> {
    if !pass.is_enabled(direction) {
        return Ok(Decision::Skip);
    }
    let Some(existing) = existing else {
        return Ok(Decision::Adopt);
    };
    if existing == incoming {
        return Ok(Decision::Skip);
    }

    match (policy, pass) {
        (ConflictPolicy::ArmPrecedence, SyncPass::TagsToLabels)
        | (ConflictPolicy::NodePrecedence, SyncPass::LabelsToTags) => Ok(Decision::Adopt),
        (
            ConflictPolicy::ArmPrecedence | ConflictPolicy::NodePrecedence | ConflictPolicy::Ignore,
            _,
        ) => Ok(Decision::KeepAndReport),
        (ConflictPolicy::Unrecognized(raw), _) => Err(SyncError::Config(raw.clone())),
    }
}
