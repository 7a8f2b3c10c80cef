// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use model_card_toolkit::lineage::artifact_types;
use model_card_toolkit::{
    Artifact, InMemoryLineageStore, ModelCard, ModelCardToolkit, Source, ToolkitConfig, ToolkitError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EVAL: &str = r#"{
    "slicing_metrics": [
        {"slice": [], "metrics": {"accuracy": 0.81, "auc": {"value": 0.9, "lower_bound": 0.88, "upper_bound": 0.92}}},
        {"slice": [["sex", "Male"]], "metrics": {"accuracy": 0.8}},
        {"slice": [["sex", "Female"]], "metrics": {"accuracy": 0.83}}
    ]
}"#;

const STATS: &str = r#"{
    "datasets": [{
        "name": "train",
        "numExamples": 100,
        "features": [
            {"name": "age", "type": "INT", "numStats": {"histograms": [
                {"buckets": [{"lowValue": 17, "highValue": 50, "sampleCount": 70}, {"lowValue": 50, "highValue": 90, "sampleCount": 30}]}
            ]}}
        ]
    }]
}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn assets(&self) -> PathBuf {
        self.dir.path().join("assets")
    }
}

fn artifact(id: i64, type_name: &str, uri: &Path, properties: &[(&str, &str)]) -> Artifact {
    Artifact {
        id,
        type_name: type_name.to_string(),
        uri: uri.to_string_lossy().to_string(),
        properties: properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        create_time_since_epoch: Some(1_704_067_200_000),
    }
}

#[test]
fn scaffold_then_export_from_eval_directory() {
    let fx = Fixture::new();
    let eval_dir = fx.dir.path().join("eval");
    fx.write("eval/metrics.json", EVAL);

    let toolkit = ModelCardToolkit::builder()
        .output_dir(fx.assets())
        .source(Source::eval_results([&eval_dir]))
        .build()
        .unwrap();

    let mut card = toolkit.scaffold().unwrap();
    let qa = &card.quantitative_analysis;
    assert_eq!(qa.performance_metrics.len(), 4);
    assert!(qa
        .performance_metrics
        .iter()
        .any(|m| m.metric_type == "accuracy" && m.slice.as_deref() == Some("sex:Male") && m.value == "0.8000"));
    assert!(!qa.graphics.collection.is_empty());

    card.model_details.name = Some("Census Income Classifier".to_string());
    toolkit.update(&card).unwrap();

    let html = toolkit.export(None, None, None).unwrap();
    let written = std::fs::read_to_string(fx.assets().join("model_cards/model_card.html")).unwrap();
    assert_eq!(html, written);
    assert!(html.contains("Census Income Classifier"));
    assert!(html.contains("data:image/svg+xml;base64,"));

    let record = std::fs::read(fx.assets().join("data/model_card.proto")).unwrap();
    assert_eq!(ModelCard::from_bytes(&record).unwrap(), card);
}

#[test]
fn export_on_fresh_toolkit_fails() {
    let fx = Fixture::new();
    let toolkit = ModelCardToolkit::builder().output_dir(fx.assets()).build().unwrap();
    let err = toolkit.export(None, None, None).unwrap_err();
    assert!(matches!(err, ToolkitError::Precondition(_)));
    assert!(!fx.assets().join("model_cards").exists());
}

#[test]
fn multiple_eval_results_accumulate_in_order() {
    let fx = Fixture::new();
    let first = fx.write("a/metrics.json", r#"{"slicing_metrics": [{"slice": [], "metrics": {"loss": 0.5}}]}"#);
    let second = fx.write("b/metrics.json", r#"{"slicing_metrics": [{"slice": [], "metrics": {"loss": 0.25}}]}"#);

    let toolkit = ModelCardToolkit::builder()
        .output_dir(fx.assets())
        .source(Source::eval_results([first, second]))
        .build()
        .unwrap();
    let card = toolkit.scaffold().unwrap();

    let values: Vec<_> = card
        .quantitative_analysis
        .performance_metrics
        .iter()
        .map(|m| m.value.as_str())
        .collect();
    assert_eq!(values, vec!["0.5000", "0.2500"]);
}

#[test]
fn missing_source_is_not_fatal() {
    let fx = Fixture::new();
    let stats = fx.write("stats/train.json", STATS);

    let toolkit = ModelCardToolkit::builder()
        .output_dir(fx.assets())
        .source(Source::eval_results([fx.dir.path().join("nowhere")]).with_dataset_statistics([stats]))
        .build()
        .unwrap();
    let card = toolkit.scaffold().unwrap();

    assert!(card.quantitative_analysis.performance_metrics.is_empty());
    assert_eq!(card.model_parameters.data.len(), 1);
    assert_eq!(card.model_parameters.data[0].name.as_deref(), Some("train"));
    assert_eq!(card.model_parameters.data[0].graphics.collection[0].name, "counts | age");
}

#[test]
fn lineage_store_populates_card() {
    let fx = Fixture::new();
    let eval = fx.write("pipeline/eval/metrics.json", EVAL);
    let stats = fx.write("pipeline/stats/train.json", STATS);
    let examples_uri = fx.dir.path().join("pipeline/examples");
    let model_uri = fx.dir.path().join("pipeline/model");

    let mut store = InMemoryLineageStore::new();
    store.put_artifact(artifact(1, artifact_types::EXAMPLES, &examples_uri, &[("name", "census")]));
    store.put_artifact(artifact(2, artifact_types::EXAMPLE_STATISTICS, stats.parent().unwrap(), &[]));
    store.put_artifact(artifact(
        3,
        artifact_types::MODEL,
        &model_uri,
        &[("name", "census-model"), ("owners", "alice, bob"), ("version", "v2")],
    ));
    store.put_artifact(artifact(4, artifact_types::MODEL_EVALUATION, eval.parent().unwrap(), &[]));
    store.put_execution(10, &[1], &[2]);
    store.put_execution(11, &[1], &[3]);
    store.put_execution(12, &[3, 1], &[4]);

    let toolkit = ModelCardToolkit::builder()
        .output_dir(fx.assets())
        .lineage_store(store)
        .model_uri(&model_uri.to_string_lossy())
        .build()
        .unwrap();
    let card = toolkit.scaffold().unwrap();

    let details = &card.model_details;
    assert_eq!(details.name.as_deref(), Some("census-model"));
    assert_eq!(details.owners.len(), 2);
    let version = details.version.as_ref().unwrap();
    assert_eq!(version.name.as_deref(), Some("v2"));
    assert_eq!(version.date.as_deref(), Some("2024-01-01"));

    assert_eq!(card.quantitative_analysis.performance_metrics.len(), 4);
    let names: Vec<_> = card.model_parameters.data.iter().map(|d| d.name.as_deref()).collect();
    assert_eq!(names, vec![Some("census"), Some("train")]);
}

#[test]
fn lineage_snapshot_from_json_file() {
    let fx = Fixture::new();
    let snapshot = fx.write(
        "store.json",
        r#"{
            "artifacts": [
                {"id": 7, "type_name": "Model", "uri": "/m", "properties": {"name": "old"}},
                {"id": 8, "type_name": "Model", "uri": "/m", "properties": {"name": "new"}}
            ],
            "events": []
        }"#,
    );
    let store = InMemoryLineageStore::from_json_file(&snapshot).unwrap();

    let toolkit = ModelCardToolkit::new(
        ToolkitConfig {
            output_dir: Some(fx.assets()),
            model_uri: Some("/m".to_string()),
            ..Default::default()
        },
        Some(Box::new(store)),
    )
    .unwrap();
    assert_eq!(toolkit.lineage().unwrap().model().id, 8);
    assert_eq!(toolkit.scaffold().unwrap().model_details.name.as_deref(), Some("new"));
}

#[test]
fn unknown_model_uri_fails_construction() {
    let fx = Fixture::new();
    let err = ModelCardToolkit::builder()
        .output_dir(fx.assets())
        .lineage_store(InMemoryLineageStore::new())
        .model_uri("/no/such/model")
        .build()
        .unwrap_err();
    match err {
        ToolkitError::ModelUriNotFound { uri } => assert_eq!(uri, "/no/such/model"),
        other => panic!("expected ModelUriNotFound, got {:?}", other),
    }
}

#[test]
fn update_with_serialized_record() {
    let fx = Fixture::new();
    let toolkit = ModelCardToolkit::builder().output_dir(fx.assets()).build().unwrap();
    toolkit.scaffold().unwrap();

    let mut card = toolkit.load().unwrap();
    card.model_details.overview = Some("Predicts income bracket".to_string());
    toolkit.update(card.to_bytes().unwrap()).unwrap();

    let html = toolkit.export(None, None, None).unwrap();
    assert!(html.contains("Predicts income bracket"));
}

#[test]
fn export_output_name_cannot_leave_model_cards() {
    let fx = Fixture::new();
    let toolkit = ModelCardToolkit::builder().output_dir(fx.assets()).build().unwrap();
    toolkit.scaffold().unwrap();

    let err = toolkit.export(None, None, Some("../../escaped.html")).unwrap_err();
    assert!(matches!(err, ToolkitError::InvalidOutputName { .. }));
    assert!(!fx.dir.path().join("escaped.html").is_file());

    let err = toolkit.export(None, None, Some("/tmp/absolute.html")).unwrap_err();
    assert!(matches!(err, ToolkitError::InvalidOutputName { .. }));

    toolkit.export(None, None, Some("card.html")).unwrap();
    assert!(fx.assets().join("model_cards/card.html").is_file());
}
