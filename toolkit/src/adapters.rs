// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Source adapters: translate one external artifact into card fragments
//!
//! Adapters only read their input. Merging the result into a card is the
//! scaffolder's job.

use crate::eval_result::{EvalResult, SliceMetrics};
use crate::graphics::{bar_chart, format_value};
use crate::lineage::{artifact_types, Artifact, LineageStore};
use crate::model_card::{
    CardFragment, ConfidenceInterval, Dataset, GraphicsCollection, Hyperparameter, License,
    ModelDetails, ModelParameters, Owner, PerformanceMetric, QuantitativeAnalysis, Version,
};
use crate::statistics::{DatasetFeatureStatistics, DatasetFeatureStatisticsList, FeatureStatistics};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Build model details and parameters from the model artifact and its lineage.
///
/// Only properties the store actually records are set.
pub fn lineage_fragment(store: &dyn LineageStore, model: &Artifact) -> Result<CardFragment> {
    let prop = |key: &str| model.property(key).map(str::to_string);

    let version_name = prop("version");
    let version_date = model
        .create_time_since_epoch
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d").to_string());
    let version = (version_name.is_some() || version_date.is_some()).then(|| Version {
        name: version_name,
        date: version_date,
        diff: None,
    });

    let owners = prop("owners")
        .map(|owners| {
            owners
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(|o| Owner {
                    name: Some(o.to_string()),
                    contact: None,
                })
                .collect()
        })
        .unwrap_or_default();

    let licenses = prop("license")
        .map(|identifier| {
            vec![License {
                identifier: Some(identifier),
                custom_text: None,
            }]
        })
        .unwrap_or_default();

    let details = ModelDetails {
        name: prop("name"),
        overview: prop("overview"),
        owners,
        version,
        licenses,
        path: (!model.uri.is_empty()).then(|| model.uri.clone()),
        framework: prop("framework"),
        ..Default::default()
    };

    let mut data = Vec::new();
    let mut hyperparameters = BTreeMap::new();
    for upstream in store.upstream_artifacts(model.id)? {
        match upstream.type_name.as_str() {
            artifact_types::EXAMPLES => data.push(Dataset {
                name: Some(
                    upstream
                        .property("name")
                        .map(str::to_string)
                        .unwrap_or_else(|| upstream.uri.clone()),
                ),
                link: (!upstream.uri.is_empty()).then(|| upstream.uri.clone()),
                ..Default::default()
            }),
            artifact_types::HYPERPARAMETERS => {
                hyperparameters.extend(upstream.properties.clone());
            }
            _ => {}
        }
    }

    let parameters = ModelParameters {
        model_architecture: prop("model_architecture"),
        data,
        input_format: prop("input_format"),
        output_format: prop("output_format"),
        hyperparameters: hyperparameters
            .into_iter()
            .map(|(name, value)| Hyperparameter { name, value })
            .collect(),
    };

    Ok(CardFragment {
        model_details: Some(details),
        model_parameters: Some(parameters),
        ..Default::default()
    })
}

/// One performance metric per (slice, metric) plus one chart per
/// (metric, slicing column)
pub fn eval_fragment(eval_result: &EvalResult) -> QuantitativeAnalysis {
    let mut performance_metrics = Vec::new();
    // metric -> column -> [(slice value, metric value)]
    let mut series: BTreeMap<&str, BTreeMap<String, Vec<(String, f64)>>> = BTreeMap::new();

    for slice in &eval_result.slicing_metrics {
        let slice_name = slice.slice_name();
        for (metric, value) in &slice.metrics {
            performance_metrics.push(PerformanceMetric {
                metric_type: metric.clone(),
                value: format_value(value.value()),
                slice: Some(slice_name.clone()),
                confidence_interval: value.bounds().map(|(lo, hi)| ConfidenceInterval {
                    lower_bound: format_value(lo),
                    upper_bound: format_value(hi),
                }),
            });
            series
                .entry(metric.as_str())
                .or_default()
                .entry(slice.slice_column())
                .or_default()
                .push((slice.slice_value(), value.value()));
        }
    }

    let collection = series
        .into_iter()
        .flat_map(|(metric, columns)| {
            columns
                .into_iter()
                .map(move |(column, bars)| bar_chart(&format!("{} | {}", metric, column), &bars))
        })
        .collect();

    QuantitativeAnalysis {
        performance_metrics,
        graphics: GraphicsCollection {
            description: None,
            collection,
        },
    }
}

/// Number of slices in an eval result, for logging
pub fn slice_count(eval_result: &EvalResult) -> usize {
    eval_result.slicing_metrics.iter().filter(|s: &&SliceMetrics| !s.metrics.is_empty()).count()
}

/// One dataset entry per statistics dataset, with a chart per feature
pub fn stats_datasets(stats: &DatasetFeatureStatisticsList) -> Vec<Dataset> {
    stats.datasets.iter().map(dataset_from_stats).collect()
}

fn dataset_from_stats(stats: &DatasetFeatureStatistics) -> Dataset {
    let collection = stats.features.iter().filter_map(feature_chart).collect();
    Dataset {
        name: (!stats.name.is_empty()).then(|| stats.name.clone()),
        graphics: GraphicsCollection {
            description: None,
            collection,
        },
        ..Default::default()
    }
}

fn feature_chart(feature: &FeatureStatistics) -> Option<crate::model_card::Graphic> {
    let name = format!("counts | {}", feature.name);

    if let Some(histogram) = feature.num_stats.as_ref().and_then(|n| n.standard_histogram()) {
        if histogram.buckets.is_empty() {
            return None;
        }
        let bars: Vec<(String, f64)> = histogram
            .buckets
            .iter()
            .map(|b| {
                (
                    format!("{}-{}", format_value(b.low_value), format_value(b.high_value)),
                    b.sample_count,
                )
            })
            .collect();
        return Some(bar_chart(&name, &bars));
    }

    let top_values = &feature.string_stats.as_ref()?.top_values;
    if top_values.is_empty() {
        return None;
    }
    let bars: Vec<(String, f64)> = top_values
        .iter()
        .map(|v| (v.value.clone(), v.frequency))
        .collect();
    Some(bar_chart(&name, &bars))
}
