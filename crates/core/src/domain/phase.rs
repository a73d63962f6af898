use serde::{Deserialize, Serialize};
use std::fmt;

/// Body text used for a composite section whose phase has not produced output yet.
pub const PENDING_SECTION_PLACEHOLDER: &str = "_Not yet available._";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PhaseId {
    Analysis,
    Schema,
    Implementation,
    SampleData,
    ApiEndpoints,
    Validation,
    Visualization,
}

impl PhaseId {
    pub const ALL: [PhaseId; 7] = [
        Self::Analysis,
        Self::Schema,
        Self::Implementation,
        Self::SampleData,
        Self::ApiEndpoints,
        Self::Validation,
        Self::Visualization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Schema => "schema",
            Self::Implementation => "implementation",
            Self::SampleData => "sample_data",
            Self::ApiEndpoints => "api_endpoints",
            Self::Validation => "validation",
            Self::Visualization => "visualization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "analysis" => Some(Self::Analysis),
            "schema" => Some(Self::Schema),
            "implementation" => Some(Self::Implementation),
            "sample_data" => Some(Self::SampleData),
            "api_endpoints" => Some(Self::ApiEndpoints),
            "validation" => Some(Self::Validation),
            "visualization" => Some(Self::Visualization),
            _ => None,
        }
    }

    /// Display label shown while the phase runs and on its result.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Analysis => "Requirements Analysis",
            Self::Schema => "Database Schema",
            Self::Implementation => "Implementation Package",
            Self::SampleData => "Sample Data",
            Self::ApiEndpoints => "API Endpoints",
            Self::Validation => "Quality Report",
            Self::Visualization => "Schema Visualization",
        }
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Payload produced by a phase, or materialized for a slot by the merger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PhaseContent {
    Text(String),
    Structured(serde_json::Value),
    /// Fixed-order sections of a slot fed by several phases.
    Composite(Vec<ArtifactSection>),
}

impl PhaseContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn sections(&self) -> Option<&[ArtifactSection]> {
        match self {
            Self::Composite(sections) => Some(sections),
            _ => None,
        }
    }

    /// Render as markdown-ish text. Structured data is pretty-printed JSON.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Self::Composite(sections) => sections
                .iter()
                .map(|s| format!("## {}\n\n{}", s.heading, s.body.text()))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ArtifactSection {
    pub phase: PhaseId,
    pub heading: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum SectionBody {
    Ready(String),
    Pending(String),
}

impl SectionBody {
    pub fn pending() -> Self {
        Self::Pending(PENDING_SECTION_PLACEHOLDER.to_string())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Ready(text) | Self::Pending(text) => text,
        }
    }
}

/// Output of one phase execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseResult {
    pub phase: PhaseId,
    pub title: String,
    pub content: PhaseContent,
    pub rationale: String,
    pub status: PhaseStatus,
}

impl PhaseResult {
    pub fn completed(phase: PhaseId, content: PhaseContent, rationale: impl Into<String>) -> Self {
        Self {
            phase,
            title: phase.title().to_string(),
            content,
            rationale: rationale.into(),
            status: PhaseStatus::Completed,
        }
    }

    pub fn failed(phase: PhaseId, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            phase,
            title: phase.title().to_string(),
            content: PhaseContent::Text(reason.clone()),
            rationale: reason,
            status: PhaseStatus::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PhaseStatus::Completed
    }
}
