// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation result loading
//!
//! An evaluation result is a list of slices, each with a set of named metric
//! values computed by an external evaluation library. Two on-disk shapes are
//! accepted:
//! - `*.json`: one document `{"slicing_metrics": [...]}`
//! - `*.jsonl`: one slice record per line
//!
//! A directory is searched for files whose name starts with `metrics`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Name given to the empty slice key
pub const OVERALL_SLICE: &str = "Overall";

/// Separator between the columns of a crossed slice
pub const CROSS_SEPARATOR: &str = "_X_";

/// Parsed evaluation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    #[serde(default)]
    pub slicing_metrics: Vec<SliceMetrics>,
}

/// Metrics computed over one slice of the evaluation data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceMetrics {
    /// Slice key as (column, value) pairs; empty for the overall slice
    #[serde(default)]
    pub slice: Vec<(String, serde_json::Value)>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
}

/// Either a bare number or a number with confidence bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Bounded {
        value: f64,
        #[serde(default)]
        lower_bound: Option<f64>,
        #[serde(default)]
        upper_bound: Option<f64>,
    },
}

impl MetricValue {
    pub fn value(&self) -> f64 {
        match self {
            MetricValue::Scalar(v) => *v,
            MetricValue::Bounded { value, .. } => *value,
        }
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            MetricValue::Bounded {
                lower_bound: Some(lo),
                upper_bound: Some(hi),
                ..
            } => Some((*lo, *hi)),
            _ => None,
        }
    }
}

impl SliceMetrics {
    /// Human-readable slice name: `Overall`, `sex:Male`, `sex:Male_X_race:White`
    pub fn slice_name(&self) -> String {
        if self.slice.is_empty() {
            return OVERALL_SLICE.to_string();
        }
        self.slice
            .iter()
            .map(|(column, value)| format!("{}:{}", column, stringify_value(value)))
            .collect::<Vec<_>>()
            .join(CROSS_SEPARATOR)
    }

    /// Slicing column(s) the slice belongs to, `Overall` for the empty key
    pub fn slice_column(&self) -> String {
        if self.slice.is_empty() {
            return OVERALL_SLICE.to_string();
        }
        self.slice
            .iter()
            .map(|(column, _)| column.as_str())
            .collect::<Vec<_>>()
            .join(CROSS_SEPARATOR)
    }

    /// Slice value(s) without the column names
    pub fn slice_value(&self) -> String {
        if self.slice.is_empty() {
            return OVERALL_SLICE.to_string();
        }
        self.slice
            .iter()
            .map(|(_, value)| stringify_value(value))
            .collect::<Vec<_>>()
            .join(CROSS_SEPARATOR)
    }
}

fn stringify_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Load an evaluation result from a file or directory.
///
/// Returns `Ok(None)` when nothing is found at `path` (or nothing matches the
/// format filter). Errors only for content that exists but does not parse.
pub fn load_eval_result(path: &Path, file_format: Option<&str>) -> Result<Option<EvalResult>> {
    let file_format = file_format.filter(|f| !f.is_empty()).map(|f| f.trim_start_matches('.'));

    if path.is_file() {
        if !matches_format(path, file_format) {
            tracing::debug!(
                "Skipping {}: does not match format filter {:?}",
                path.display(),
                file_format
            );
            return Ok(None);
        }
        return read_eval_file(path).map(Some);
    }

    if !path.is_dir() {
        return Ok(None);
    }

    let files = metrics_files(path, file_format)?;
    if files.is_empty() {
        return Ok(None);
    }

    let mut result = EvalResult::default();
    for file in files {
        let part = read_eval_file(&file)?;
        result.slicing_metrics.extend(part.slicing_metrics);
    }
    Ok(Some(result))
}

fn matches_format(path: &Path, file_format: Option<&str>) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match file_format {
        Some(format) => ext.eq_ignore_ascii_case(format),
        None => ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("jsonl"),
    }
}

fn metrics_files(dir: &Path, file_format: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list eval result directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let is_metrics = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("metrics"));
        if path.is_file() && is_metrics && matches_format(&path, file_format) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_eval_file(path: &Path) -> Result<EvalResult> {
    let is_lines = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));

    if is_lines {
        let file = File::open(path)
            .with_context(|| format!("Failed to open eval result file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let mut slicing_metrics = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let slice: SliceMetrics = serde_json::from_str(&line).with_context(|| {
                format!("Malformed slice record at {}:{}", path.display(), line_no + 1)
            })?;
            slicing_metrics.push(slice);
        }
        Ok(EvalResult { slicing_metrics })
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read eval result file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed eval result: {}", path.display()))
    }
}
