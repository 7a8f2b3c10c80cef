// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset feature statistics loading
//!
//! Reads the JSON form of a dataset feature statistics list as written by a
//! data validation library. Both snake_case and the camelCase JSON mapping of
//! the field names are accepted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFeatureStatisticsList {
    #[serde(default)]
    pub datasets: Vec<DatasetFeatureStatistics>,
}

/// Statistics for every feature of one dataset (or split)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetFeatureStatistics {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "numExamples")]
    pub num_examples: u64,
    #[serde(default)]
    pub features: Vec<FeatureStatistics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    #[serde(default, alias = "path")]
    pub name: FeatureName,
    #[serde(default, rename = "type")]
    pub feature_type: Option<String>,
    #[serde(default, alias = "numStats")]
    pub num_stats: Option<NumericStatistics>,
    #[serde(default, alias = "stringStats")]
    pub string_stats: Option<StringStatistics>,
}

/// Either a plain name or a `{"step": [...]}` feature path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureName {
    Name(String),
    Path { step: Vec<String> },
}

impl Default for FeatureName {
    fn default() -> Self {
        FeatureName::Name(String::new())
    }
}

impl std::fmt::Display for FeatureName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureName::Name(name) => write!(f, "{}", name),
            FeatureName::Path { step } => write!(f, "{}", step.join(".")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStatistics {
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default, alias = "stdDev")]
    pub std_dev: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub histograms: Vec<Histogram>,
}

impl NumericStatistics {
    /// The standard (equal-width) histogram, falling back to the first one
    pub fn standard_histogram(&self) -> Option<&Histogram> {
        self.histograms
            .iter()
            .find(|h| h.histogram_type.as_deref().unwrap_or("STANDARD") == "STANDARD")
            .or_else(|| self.histograms.first())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    #[serde(default, rename = "type")]
    pub histogram_type: Option<String>,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(default, alias = "lowValue")]
    pub low_value: f64,
    #[serde(default, alias = "highValue")]
    pub high_value: f64,
    #[serde(default, alias = "sampleCount")]
    pub sample_count: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringStatistics {
    #[serde(default)]
    pub unique: u64,
    #[serde(default, alias = "topValues")]
    pub top_values: Vec<FreqAndValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreqAndValue {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub frequency: f64,
}

/// Load statistics from a file, or from every `*.json` file in a directory
/// and its immediate (split) subdirectories.
///
/// Returns `Ok(None)` when nothing exists at `path`.
pub fn load_statistics(path: &Path) -> Result<Option<DatasetFeatureStatisticsList>> {
    if path.is_file() {
        return read_stats_file(path).map(Some);
    }
    if !path.is_dir() {
        return Ok(None);
    }

    let files = stats_files(path)?;
    if files.is_empty() {
        return Ok(None);
    }

    let mut stats = DatasetFeatureStatisticsList::default();
    for file in files {
        stats.datasets.extend(read_stats_file(&file)?.datasets);
    }
    Ok(Some(stats))
}

fn stats_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let is_json = |p: &Path| p.extension().and_then(|e| e.to_str()) == Some("json");

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list statistics directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_json(&path) {
            files.push(path);
        } else if path.is_dir() {
            for sub in std::fs::read_dir(&path)
                .with_context(|| format!("Failed to list split directory: {}", path.display()))?
            {
                let sub = sub?.path();
                if sub.is_file() && is_json(&sub) {
                    files.push(sub);
                }
            }
        }
    }
    files.sort();
    Ok(files)
}

fn read_stats_file(path: &Path) -> Result<DatasetFeatureStatisticsList> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read statistics file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Malformed dataset statistics: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TRAIN: &str = r#"{
        "datasets": [{
            "name": "train",
            "numExamples": 100,
            "features": [
                {"name": "age", "type": "INT", "numStats": {"mean": 38.5, "histograms": [
                    {"type": "QUANTILES", "buckets": [{"lowValue": 17, "highValue": 90, "sampleCount": 100}]},
                    {"buckets": [{"lowValue": 17, "highValue": 50, "sampleCount": 70}, {"lowValue": 50, "highValue": 90, "sampleCount": 30}]}
                ]}},
                {"path": {"step": ["sex"]}, "type": "STRING", "stringStats": {"unique": 2, "topValues": [{"value": "Male", "frequency": 60}, {"value": "Female", "frequency": 40}]}}
            ]
        }]
    }"#;

    #[test]
    fn test_parse_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, TRAIN).unwrap();

        let stats = load_statistics(&path).unwrap().unwrap();
        let dataset = &stats.datasets[0];
        assert_eq!(dataset.name, "train");
        assert_eq!(dataset.num_examples, 100);
        assert_eq!(dataset.features[0].name.to_string(), "age");
        assert_eq!(dataset.features[1].name.to_string(), "sex");

        let histogram = dataset.features[0]
            .num_stats
            .as_ref()
            .unwrap()
            .standard_histogram()
            .unwrap();
        assert_eq!(histogram.buckets.len(), 2);
        assert_eq!(dataset.features[1].string_stats.as_ref().unwrap().top_values[0].value, "Male");
    }

    #[test]
    fn test_directory_with_splits() {
        let dir = TempDir::new().unwrap();
        let train = dir.path().join("Split-train");
        let eval = dir.path().join("Split-eval");
        std::fs::create_dir_all(&train).unwrap();
        std::fs::create_dir_all(&eval).unwrap();
        std::fs::write(train.join("FeatureStats.json"), TRAIN).unwrap();
        std::fs::write(
            eval.join("FeatureStats.json"),
            r#"{"datasets": [{"name": "eval", "features": []}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let stats = load_statistics(dir.path()).unwrap().unwrap();
        let names: Vec<_> = stats.datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["eval", "train"]);
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        assert!(load_statistics(&dir.path().join("missing.json")).unwrap().is_none());
        assert!(load_statistics(dir.path()).unwrap().is_none());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{\"datasets\": {}}").unwrap();
        assert!(load_statistics(&bad).is_err());
    }
}
