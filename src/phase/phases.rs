//! Optimization phases

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// One rewrite phase of the search engine, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OptPhase {
    ConstEvalPre,
    PathFuse,
    MemoSubstitution,
    MemoExploration,
    MemoImplementation,
    PathLower,
    ConstEvalPost,
    /// Constant folding variant used only for sampling sub-plans
    ConstEvalPostForSampling,
}

impl OptPhase {
    pub const ALL: [OptPhase; 8] = [
        OptPhase::ConstEvalPre,
        OptPhase::PathFuse,
        OptPhase::MemoSubstitution,
        OptPhase::MemoExploration,
        OptPhase::MemoImplementation,
        OptPhase::PathLower,
        OptPhase::ConstEvalPost,
        OptPhase::ConstEvalPostForSampling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptPhase::ConstEvalPre => "ConstEvalPre",
            OptPhase::PathFuse => "PathFuse",
            OptPhase::MemoSubstitution => "MemoSubstitution",
            OptPhase::MemoExploration => "MemoExploration",
            OptPhase::MemoImplementation => "MemoImplementation",
            OptPhase::PathLower => "PathLower",
            OptPhase::ConstEvalPost => "ConstEvalPost",
            OptPhase::ConstEvalPostForSampling => "ConstEvalPostForSampling",
        }
    }

    /// True for phases that run inside the memo
    pub fn is_memo(&self) -> bool {
        matches!(
            self,
            OptPhase::MemoSubstitution | OptPhase::MemoExploration | OptPhase::MemoImplementation
        )
    }
}

/// Ordered set of enabled phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSet(BTreeSet<OptPhase>);

impl PhaseSet {
    pub fn new(phases: impl IntoIterator<Item = OptPhase>) -> Self {
        Self(phases.into_iter().collect())
    }

    /// Every phase except the sampling-only constant folding
    pub fn production() -> Self {
        Self::new(
            OptPhase::ALL
                .iter()
                .copied()
                .filter(|p| *p != OptPhase::ConstEvalPostForSampling),
        )
    }

    /// Reduced set for sampling: no constant folding, path fusion or exploration
    pub fn sampling() -> Self {
        Self::new([
            OptPhase::MemoSubstitution,
            OptPhase::MemoImplementation,
            OptPhase::PathLower,
            OptPhase::ConstEvalPostForSampling,
        ])
    }

    pub fn contains(&self, phase: OptPhase) -> bool {
        self.0.contains(&phase)
    }

    pub fn iter(&self) -> impl Iterator<Item = OptPhase> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|p| p.as_str()).collect();
        write!(f, "{}", names.join(","))
    }
}
