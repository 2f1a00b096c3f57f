//! Run manifest.
//!
//! Records every artifact a run produces, keyed by stage and entity index,
//! together with the parameters that produced it. The manifest is rewritten
//! atomically after each change so an interrupted run can be inspected or
//! resumed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors from reading or writing the manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    ReadError(#[source] std::io::Error),

    #[error("Failed to write manifest: {0}")]
    WriteError(#[source] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// One produced file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Parameters that produced the artifact.
    pub params: Value,
    pub output: PathBuf,
    pub recorded_at: DateTime<Utc>,
}

/// Persistent record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub run_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Artifacts keyed by `stage` or `stage/index`.
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactRecord>,
    /// Stages that finished.
    #[serde(default)]
    pub completed_stages: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

/// Manifest key for a stage and optional entity index.
pub fn artifact_key(stage: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}/{:03}", stage, i),
        None => stage.to_string(),
    }
}

impl RunManifest {
    pub fn new(run_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            run_name: run_name.into(),
            created_at: now,
            updated_at: now,
            artifacts: BTreeMap::new(),
            completed_stages: Vec::new(),
            warnings: Vec::new(),
            path: None,
        }
    }

    /// New manifest that saves to `path`.
    pub fn create(run_name: impl Into<String>, path: impl Into<PathBuf>) -> ManifestResult<Self> {
        let mut manifest = Self::new(run_name);
        manifest.path = Some(path.into());
        manifest.save()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> ManifestResult<Self> {
        let content = fs::read_to_string(path).map_err(ManifestError::ReadError)?;
        let mut manifest: Self = serde_json::from_str(&content)?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Load `path` if it exists, otherwise create a fresh manifest there.
    pub fn load_or_create(run_name: impl Into<String>, path: &Path) -> ManifestResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::create(run_name, path)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write to the manifest path. Writes to a temp file first, then renames.
    ///
    /// A manifest without a path is kept in memory only.
    pub fn save(&self) -> ManifestResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ManifestError::WriteError)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(ManifestError::WriteError)?;
        fs::rename(&temp_path, path).map_err(ManifestError::WriteError)?;
        Ok(())
    }

    /// Record an artifact and save.
    pub fn record(
        &mut self,
        stage: &str,
        index: Option<usize>,
        params: Value,
        output: impl Into<PathBuf>,
    ) -> ManifestResult<()> {
        let now = Utc::now();
        self.artifacts.insert(
            artifact_key(stage, index),
            ArtifactRecord {
                stage: stage.to_string(),
                index,
                params,
                output: output.into(),
                recorded_at: now,
            },
        );
        self.updated_at = now;
        self.save()
    }

    pub fn artifact(&self, stage: &str, index: Option<usize>) -> Option<&ArtifactRecord> {
        self.artifacts.get(&artifact_key(stage, index))
    }

    /// Existing artifact whose parameters match, for reuse on resume.
    pub fn reusable(&self, stage: &str, index: Option<usize>, params: &Value) -> Option<&Path> {
        self.artifact(stage, index)
            .filter(|a| &a.params == params && a.output.exists())
            .map(|a| a.output.as_path())
    }

    /// Mark a stage finished and save.
    pub fn complete_stage(&mut self, stage: &str) -> ManifestResult<()> {
        if !self.is_stage_complete(stage) {
            self.completed_stages.push(stage.to_string());
        }
        self.updated_at = Utc::now();
        self.save()
    }

    pub fn is_stage_complete(&self, stage: &str) -> bool {
        self.completed_stages.iter().any(|s| s == stage)
    }

    /// Whether every stage in `stages` finished.
    pub fn is_complete(&self, stages: &[&str]) -> bool {
        stages.iter().all(|s| self.is_stage_complete(s))
    }

    /// Replace the warning list and save.
    pub fn set_warnings(&mut self, warnings: Vec<String>) -> ManifestResult<()> {
        self.warnings = warnings;
        self.updated_at = Utc::now();
        self.save()
    }
}
