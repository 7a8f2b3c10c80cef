// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Read-only view of a metadata / lineage store
//!
//! Artifacts (models, examples, statistics, evaluations) are linked through
//! executions: an execution consumes input artifacts and produces output
//! artifacts. "Upstream" of an artifact are the inputs of the executions that
//! produced it; "downstream" are the outputs of the executions that consumed it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub type ArtifactId = i64;

/// Artifact type names written by the standard training pipeline components
pub mod artifact_types {
    pub const MODEL: &str = "Model";
    pub const EXAMPLES: &str = "Examples";
    pub const EXAMPLE_STATISTICS: &str = "ExampleStatistics";
    pub const MODEL_EVALUATION: &str = "ModelEvaluation";
    pub const HYPERPARAMETERS: &str = "HyperParameters";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub type_name: String,
    #[serde(default)]
    pub uri: String,
    /// Custom and type-declared properties, rendered as strings
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub create_time_since_epoch: Option<i64>,
}

impl Artifact {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Queries the scaffolder needs from a lineage store
pub trait LineageStore {
    /// All artifacts registered under `uri`, in registration order
    fn artifacts_by_uri(&self, uri: &str) -> Result<Vec<Artifact>>;

    fn artifact_by_id(&self, id: ArtifactId) -> Result<Option<Artifact>>;

    /// Inputs of the executions that produced `id`
    fn upstream_artifacts(&self, id: ArtifactId) -> Result<Vec<Artifact>>;

    /// Outputs of the executions that consumed `id`
    fn downstream_artifacts(&self, id: ArtifactId) -> Result<Vec<Artifact>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Input,
    Output,
}

/// Links an artifact to an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub execution_id: i64,
    pub artifact_id: ArtifactId,
    pub kind: EventKind,
}

/// Lineage store held entirely in memory, loadable from a JSON snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLineageStore {
    #[serde(default)]
    artifacts: Vec<Artifact>,
    #[serde(default)]
    events: Vec<Event>,
}

impl InMemoryLineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot of the form `{"artifacts": [...], "events": [...]}`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lineage store snapshot: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed lineage store snapshot: {}", path.display()))
    }

    pub fn put_artifact(&mut self, artifact: Artifact) -> ArtifactId {
        let id = artifact.id;
        self.artifacts.push(artifact);
        id
    }

    /// Record an execution consuming `inputs` and producing `outputs`
    pub fn put_execution(&mut self, execution_id: i64, inputs: &[ArtifactId], outputs: &[ArtifactId]) {
        for &artifact_id in inputs {
            self.events.push(Event {
                execution_id,
                artifact_id,
                kind: EventKind::Input,
            });
        }
        for &artifact_id in outputs {
            self.events.push(Event {
                execution_id,
                artifact_id,
                kind: EventKind::Output,
            });
        }
    }

    fn executions_with(&self, id: ArtifactId, kind: EventKind) -> BTreeSet<i64> {
        self.events
            .iter()
            .filter(|e| e.artifact_id == id && e.kind == kind)
            .map(|e| e.execution_id)
            .collect()
    }

    fn artifacts_of(&self, executions: &BTreeSet<i64>, kind: EventKind) -> Vec<Artifact> {
        let mut seen = BTreeSet::new();
        self.events
            .iter()
            .filter(|e| e.kind == kind && executions.contains(&e.execution_id))
            .filter(|e| seen.insert(e.artifact_id))
            .filter_map(|e| self.artifacts.iter().find(|a| a.id == e.artifact_id))
            .cloned()
            .collect()
    }
}

impl LineageStore for InMemoryLineageStore {
    fn artifacts_by_uri(&self, uri: &str) -> Result<Vec<Artifact>> {
        Ok(self.artifacts.iter().filter(|a| a.uri == uri).cloned().collect())
    }

    fn artifact_by_id(&self, id: ArtifactId) -> Result<Option<Artifact>> {
        Ok(self.artifacts.iter().find(|a| a.id == id).cloned())
    }

    fn upstream_artifacts(&self, id: ArtifactId) -> Result<Vec<Artifact>> {
        let producers = self.executions_with(id, EventKind::Output);
        Ok(self.artifacts_of(&producers, EventKind::Input))
    }

    fn downstream_artifacts(&self, id: ArtifactId) -> Result<Vec<Artifact>> {
        let consumers = self.executions_with(id, EventKind::Input);
        Ok(self.artifacts_of(&consumers, EventKind::Output))
    }
}

/// Evaluation artifacts computed for a model
pub fn metrics_artifacts_for_model(store: &dyn LineageStore, model_id: ArtifactId) -> Result<Vec<Artifact>> {
    Ok(store
        .downstream_artifacts(model_id)?
        .into_iter()
        .filter(|a| a.type_name == artifact_types::MODEL_EVALUATION)
        .collect())
}

/// Statistics artifacts computed over the examples a model was trained on
pub fn stats_artifacts_for_model(store: &dyn LineageStore, model_id: ArtifactId) -> Result<Vec<Artifact>> {
    let mut seen = BTreeSet::new();
    let mut stats = Vec::new();
    for examples in store
        .upstream_artifacts(model_id)?
        .into_iter()
        .filter(|a| a.type_name == artifact_types::EXAMPLES)
    {
        for artifact in store.downstream_artifacts(examples.id)? {
            if artifact.type_name == artifact_types::EXAMPLE_STATISTICS && seen.insert(artifact.id) {
                stats.push(artifact);
            }
        }
    }
    Ok(stats)
}
