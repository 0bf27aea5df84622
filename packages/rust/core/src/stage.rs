//! The fixed set of pipeline stages.
//!
//! Stages give every transformer a coarse rank. Rank always wins over any
//! declared dependency: a transformer in `build` runs after every
//! transformer in `parse`, whatever either of them declares.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docmesh_shared::DocmeshError;

/// One of the seven execution phases, in rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Read raw input (split front matter from the body).
    Parse,
    /// Build base front matter contributions.
    Build,
    /// Add derived metadata (edit links, repository info).
    Enrich,
    /// Merge front matter patches into the final map.
    Merge,
    /// Rewrite document content.
    Transform,
    /// Last content touch-ups before output.
    Finalize,
    /// Produce the output bytes.
    Serialize,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Parse,
        Stage::Build,
        Stage::Enrich,
        Stage::Merge,
        Stage::Transform,
        Stage::Finalize,
        Stage::Serialize,
    ];

    /// The label transformers use to declare this stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Build => "build",
            Stage::Enrich => "enrich",
            Stage::Merge => "merge",
            Stage::Transform => "transform",
            Stage::Finalize => "finalize",
            Stage::Serialize => "serialize",
        }
    }

    /// Zero-based rank (`parse` = 0, `serialize` = 6).
    pub fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = DocmeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| {
                DocmeshError::validation(format!(
                    "unknown stage {s:?}; expected one of: {}",
                    valid_stage_names().join(", ")
                ))
            })
    }
}

/// Rank of a stage label: 0..=6, or -1 when the label is not a stage.
pub fn stage_index(stage: &str) -> i32 {
    stage
        .parse::<Stage>()
        .map(|s| s.rank() as i32)
        .unwrap_or(-1)
}

/// Whether `stage` names one of the seven stages.
pub fn is_valid_stage(stage: &str) -> bool {
    stage_index(stage) >= 0
}

/// All stage labels in rank order.
pub fn valid_stage_names() -> Vec<&'static str> {
    Stage::ALL.iter().map(|s| s.as_str()).collect()
}
