//! Writes finalized sessions to disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use schemaforge_core::{PhaseId, PhaseResult, SlotId};
use serde::Serialize;
use uuid::Uuid;

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Serialize)]
struct FinalizedRecord<'a> {
    session_id: Uuid,
    raw_phase_outputs: &'a BTreeMap<PhaseId, PhaseResult>,
    artifacts: &'a BTreeMap<SlotId, PhaseResult>,
}

pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write `<root>/<session_id>/session.json` and one markdown file per slot.
    pub async fn write_finalized(
        &self,
        session_id: Uuid,
        raw_phase_outputs: &BTreeMap<PhaseId, PhaseResult>,
        artifacts: &BTreeMap<SlotId, PhaseResult>,
    ) -> Result<PathBuf> {
        let dir = self.root.join(session_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let record = FinalizedRecord {
            session_id,
            raw_phase_outputs,
            artifacts,
        };
        let json = serde_json::to_string_pretty(&record).context("Failed to serialize session")?;
        write(&dir.join(SESSION_FILE), json).await?;

        for (slot, result) in artifacts {
            let markdown = format!("# {}\n\n{}\n", result.title, result.content.render());
            write(&dir.join(format!("{}.md", slot.as_str())), markdown).await?;
        }

        Ok(dir)
    }
}

async fn write(path: &Path, content: String) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
