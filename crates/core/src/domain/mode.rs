//! Static per-mode tables: which phases run, what each phase reads, and
//! which phases feed which slot.
//!
//! Modes are data. Adding a mode means adding a table here, not a new
//! branch in the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::phase::PhaseId;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Standard,
    /// Multi-agent variant with a composite implementation slot and a visualization slot.
    Enhanced,
}

impl GenerationMode {
    pub const ALL: [GenerationMode; 2] = [Self::Standard, Self::Enhanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Enhanced => "enhanced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "enhanced" => Some(Self::Enhanced),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing artifact bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SlotId {
    Analysis,
    Schema,
    Implementation,
    Validation,
    Visualization,
}

impl SlotId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Schema => "schema",
            Self::Implementation => "implementation",
            Self::Validation => "validation",
            Self::Visualization => "visualization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analysis" => Some(Self::Analysis),
            "schema" => Some(Self::Schema),
            "implementation" => Some(Self::Implementation),
            "validation" => Some(Self::Validation),
            "visualization" => Some(Self::Visualization),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Analysis => "Analysis",
            Self::Schema => "Schema",
            Self::Implementation => "Implementation",
            Self::Validation => "Quality Report",
            Self::Visualization => "Visualization",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pipeline step and the earlier phases whose output enters its context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseSpec {
    pub id: PhaseId,
    #[serde(default)]
    pub depends_on: Vec<PhaseId>,
}

impl PhaseSpec {
    pub fn new(id: PhaseId) -> Self {
        Self {
            id,
            depends_on: Vec::new(),
        }
    }

    pub fn after(mut self, deps: &[PhaseId]) -> Self {
        self.depends_on = deps.to_vec();
        self
    }
}

/// Which phases feed a slot. With more than one source, `sources` is also
/// the section order of the composite artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SlotRule {
    pub slot: SlotId,
    pub sources: Vec<PhaseId>,
}

impl SlotRule {
    pub fn single(slot: SlotId, phase: PhaseId) -> Self {
        Self {
            slot,
            sources: vec![phase],
        }
    }

    pub fn composite(slot: SlotId, sources: &[PhaseId]) -> Self {
        Self {
            slot,
            sources: sources.to_vec(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn feeds_from(&self, phase: PhaseId) -> bool {
        self.sources.contains(&phase)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeConfig {
    pub mode: GenerationMode,
    pub phases: Vec<PhaseSpec>,
    pub slot_rules: Vec<SlotRule>,
}

impl ModeConfig {
    pub fn for_mode(mode: GenerationMode) -> Self {
        match mode {
            GenerationMode::Standard => Self::standard(),
            GenerationMode::Enhanced => Self::enhanced(),
        }
    }

    pub fn standard() -> Self {
        use PhaseId::*;
        Self {
            mode: GenerationMode::Standard,
            phases: vec![
                PhaseSpec::new(Analysis),
                PhaseSpec::new(Schema).after(&[Analysis]),
                PhaseSpec::new(Implementation).after(&[Analysis, Schema]),
                PhaseSpec::new(Validation).after(&[Schema, Implementation]),
            ],
            slot_rules: vec![
                SlotRule::single(SlotId::Analysis, Analysis),
                SlotRule::single(SlotId::Schema, Schema),
                SlotRule::single(SlotId::Implementation, Implementation),
                SlotRule::single(SlotId::Validation, Validation),
            ],
        }
    }

    pub fn enhanced() -> Self {
        use PhaseId::*;
        Self {
            mode: GenerationMode::Enhanced,
            phases: vec![
                PhaseSpec::new(Analysis),
                PhaseSpec::new(Schema).after(&[Analysis]),
                PhaseSpec::new(SampleData).after(&[Schema]),
                PhaseSpec::new(ApiEndpoints).after(&[Schema]),
                PhaseSpec::new(Validation).after(&[Schema, SampleData, ApiEndpoints]),
                PhaseSpec::new(Visualization).after(&[Schema]),
            ],
            slot_rules: vec![
                SlotRule::single(SlotId::Analysis, Analysis),
                SlotRule::single(SlotId::Schema, Schema),
                SlotRule::composite(SlotId::Implementation, &[SampleData, ApiEndpoints]),
                SlotRule::single(SlotId::Validation, Validation),
                SlotRule::single(SlotId::Visualization, Visualization),
            ],
        }
    }

    pub fn phase_ids(&self) -> Vec<PhaseId> {
        self.phases.iter().map(|p| p.id).collect()
    }

    pub fn spec(&self, phase: PhaseId) -> Option<&PhaseSpec> {
        self.phases.iter().find(|p| p.id == phase)
    }

    /// Check the table before any phase runs.
    pub fn validate(&self) -> Result<()> {
        if self.phases.is_empty() {
            return Err(CoreError::EmptyMode {
                mode: self.mode.as_str().to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for spec in &self.phases {
            for dep in &spec.depends_on {
                if !seen.contains(dep) {
                    return Err(CoreError::DependencyOrder {
                        phase: spec.id,
                        dependency: *dep,
                    });
                }
            }
            if !seen.insert(spec.id) {
                return Err(CoreError::DuplicatePhase { phase: spec.id });
            }
        }

        let mut slots = BTreeSet::new();
        for rule in &self.slot_rules {
            if !slots.insert(rule.slot) {
                return Err(CoreError::DuplicateSlot { slot: rule.slot });
            }
            if rule.sources.is_empty() {
                return Err(CoreError::EmptySlotRule { slot: rule.slot });
            }
            if let Some(missing) = rule.sources.iter().find(|p| !seen.contains(*p)) {
                return Err(CoreError::MergeInconsistency {
                    slot: rule.slot,
                    phase: *missing,
                });
            }
        }

        Ok(())
    }
}
