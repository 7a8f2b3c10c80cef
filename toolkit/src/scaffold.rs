// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Scaffolding: merge every available source into one model card
//!
//! Merge order:
//! 1. Lineage fragment (model details and parameters)
//! 2. Explicit eval results, in the order given
//! 3. Eval artifacts discovered through lineage
//! 4. Explicit dataset statistics, in the order given
//! 5. Statistics artifacts discovered through lineage
//!
//! Steps 2-5 accumulate. A source that is missing or unreadable is logged
//! and skipped.

use crate::adapters::{eval_fragment, lineage_fragment, slice_count, stats_datasets};
use crate::error::{Result, ToolkitError};
use crate::eval_result::load_eval_result;
use crate::lineage::{metrics_artifacts_for_model, stats_artifacts_for_model, Artifact, LineageStore};
use crate::model_card::ModelCard;
use crate::statistics::load_statistics;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Files to pull card data from, independent of any lineage store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    /// Evaluation result files or directories
    pub eval_result_paths: Vec<PathBuf>,
    /// Only read eval result files with this extension
    pub eval_result_file_format: Option<String>,
    /// Dataset statistics files or directories
    pub dataset_statistics_paths: Vec<PathBuf>,
}

impl Source {
    pub fn eval_results<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            eval_result_paths: paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_dataset_statistics<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.dataset_statistics_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_eval_result_file_format(mut self, format: &str) -> Self {
        self.eval_result_file_format = Some(format.to_string());
        self
    }
}

/// A lineage store together with the model artifact it was resolved to
pub struct LineageBinding {
    store: Box<dyn LineageStore>,
    model: Artifact,
}

impl std::fmt::Debug for LineageBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageBinding").field("model", &self.model).finish_non_exhaustive()
    }
}

impl LineageBinding {
    /// Resolve `model_uri` to a single artifact. The last match wins when
    /// several artifacts share the URI.
    pub fn resolve(store: Box<dyn LineageStore>, model_uri: &str) -> Result<Self> {
        let mut models = store
            .artifacts_by_uri(model_uri)
            .map_err(|source| ToolkitError::Lineage {
                uri: model_uri.to_string(),
                source,
            })?;
        let count = models.len();
        let model = models.pop().ok_or_else(|| ToolkitError::ModelUriNotFound {
            uri: model_uri.to_string(),
        })?;
        if count > 1 {
            tracing::info!(
                "{} artifacts are found with the model_uri=\"{}\". The last one (id={}) is used.",
                count,
                model_uri,
                model.id
            );
        }
        Ok(Self { store, model })
    }

    pub fn model(&self) -> &Artifact {
        &self.model
    }

    pub fn store(&self) -> &dyn LineageStore {
        self.store.as_ref()
    }
}

/// Builds a card from the configured sources
pub struct Scaffolder<'a> {
    source: Option<&'a Source>,
    lineage: Option<&'a LineageBinding>,
}

impl<'a> Scaffolder<'a> {
    pub fn new(source: Option<&'a Source>, lineage: Option<&'a LineageBinding>) -> Self {
        Self { source, lineage }
    }

    pub fn scaffold(&self) -> ModelCard {
        let mut card = ModelCard::new();

        if let Some(binding) = self.lineage {
            match lineage_fragment(binding.store(), binding.model()) {
                Ok(fragment) => card.merge_fragment(fragment),
                Err(e) => tracing::warn!(
                    "Failed to read lineage for model {}: {:#}",
                    binding.model().uri,
                    e
                ),
            }
        }

        let source = self.source;
        let eval_format = source.and_then(|s| s.eval_result_file_format.as_deref());
        for path in source.map(|s| s.eval_result_paths.as_slice()).unwrap_or_default() {
            apply_eval_result(&mut card, path, eval_format);
        }
        if let Some(binding) = self.lineage {
            match metrics_artifacts_for_model(binding.store(), binding.model().id) {
                Ok(artifacts) => {
                    for artifact in artifacts {
                        apply_eval_result(&mut card, Path::new(&artifact.uri), None);
                    }
                }
                Err(e) => tracing::warn!("Failed to look up evaluation artifacts: {:#}", e),
            }
        }

        for path in source.map(|s| s.dataset_statistics_paths.as_slice()).unwrap_or_default() {
            apply_statistics(&mut card, path);
        }
        if let Some(binding) = self.lineage {
            match stats_artifacts_for_model(binding.store(), binding.model().id) {
                Ok(artifacts) => {
                    for artifact in artifacts {
                        apply_statistics(&mut card, Path::new(&artifact.uri));
                    }
                }
                Err(e) => tracing::warn!("Failed to look up statistics artifacts: {:#}", e),
            }
        }

        tracing::info!(
            "Scaffolded model card: {} metrics, {} graphics, {} datasets",
            card.quantitative_analysis.performance_metrics.len(),
            card.quantitative_analysis.graphics.collection.len(),
            card.model_parameters.data.len()
        );
        card
    }
}

fn apply_eval_result(card: &mut ModelCard, path: &Path, file_format: Option<&str>) {
    match load_eval_result(path, file_format) {
        Ok(Some(result)) => {
            tracing::info!(
                "EvalResult found at path {} ({} slices)",
                path.display(),
                slice_count(&result)
            );
            card.accumulate_quantitative(eval_fragment(&result));
        }
        Ok(None) => tracing::info!("EvalResult not found at path {}", path.display()),
        Err(e) => tracing::warn!("Skipping EvalResult at path {}: {:#}", path.display(), e),
    }
}

fn apply_statistics(card: &mut ModelCard, path: &Path) {
    match load_statistics(path) {
        Ok(Some(stats)) => {
            tracing::info!(
                "Dataset statistics found at path {} ({} datasets)",
                path.display(),
                stats.datasets.len()
            );
            card.accumulate_datasets(stats_datasets(&stats));
        }
        Ok(None) => tracing::info!("Dataset statistics not found at path {}", path.display()),
        Err(e) => tracing::warn!("Skipping dataset statistics at path {}: {:#}", path.display(), e),
    }
}
