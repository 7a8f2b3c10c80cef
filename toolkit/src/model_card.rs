// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! The model card record
//!
//! A model card is four sections:
//! - Model details (name, owners, version, licenses, ...)
//! - Model parameters (architecture, datasets, hyperparameters)
//! - Quantitative analysis (sliced performance metrics and plots)
//! - Considerations (users, use cases, limitations, ethical risks)
//!
//! Every field is optional. An unset field is a valid state and is kept
//! distinct from a populated one all the way through the binary encoding.

use crate::error::{Result, ToolkitError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Complete model card record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCard {
    /// Model identification and metadata
    pub model_details: ModelDetails,
    /// Architecture, training data and hyperparameters
    pub model_parameters: ModelParameters,
    /// Evaluation metrics and plots
    pub quantitative_analysis: QuantitativeAnalysis,
    /// Intended use, limitations and risks
    pub considerations: Considerations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDetails {
    /// Human-readable model name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Short description of the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Longer free-form documentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// People or teams responsible for the model
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<Owner>,
    /// Version name, date and change summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Licenses the model is released under
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    /// Links to papers, repositories or other resources
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    /// How to cite the model
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    /// Where the model is stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Training framework (e.g. "tensorflow 2.11")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Owner {
    /// Owner name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email or other contact for the owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
    /// Version label (e.g. "v1.2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Release date, `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// What changed since the previous version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    /// SPDX identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Full license text when no SPDX identifier applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// URL or other locator
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Citation {
    /// Citation style (e.g. "BibTeX")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// The citation text
    pub citation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    /// Architecture summary (e.g. "wide and deep")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_architecture: Option<String>,
    /// Training and evaluation datasets
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Dataset>,
    /// Description of the model inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    /// Description of the model outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    /// Training hyperparameters as name/value pairs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hyperparameters: Vec<Hyperparameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    /// Dataset name; datasets with the same name are merged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the dataset lives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sensitive data the dataset contains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<SensitiveData>,
    /// Feature distribution plots
    pub graphics: GraphicsCollection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveData {
    /// Kinds of sensitive data (e.g. "age", "location")
    pub sensitive_data: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperparameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantitativeAnalysis {
    /// Metric values, one per (metric, slice)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub performance_metrics: Vec<PerformanceMetric>,
    /// Metric plots, one per (metric, slicing column)
    pub graphics: GraphicsCollection,
}

/// One metric value for one slice of the evaluation data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceMetric {
    /// Metric name (e.g. "accuracy"); `type` on the wire
    #[serde(rename = "type")]
    pub metric_type: String,
    /// Formatted metric value
    pub value: String,
    /// Slice name, `Overall` for the whole dataset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower_bound: String,
    pub upper_bound: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsCollection {
    /// Caption for the whole collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collection: Vec<Graphic>,
}

impl GraphicsCollection {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.collection.is_empty()
    }
}

/// A named plot embedded in the card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graphic {
    pub name: String,
    /// Base64-encoded SVG document
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Considerations {
    /// Intended users
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<Consideration>,
    /// Intended use cases
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub use_cases: Vec<Consideration>,
    /// Known technical limitations
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub limitations: Vec<Consideration>,
    /// Performance trade-offs users should know about
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tradeoffs: Vec<Consideration>,
    /// Ethical risks and how they are mitigated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ethical_considerations: Vec<Risk>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consideration {
    pub description: String,
}

impl From<&str> for Consideration {
    fn from(description: &str) -> Self {
        Self {
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub name: String,
    /// How the risk is addressed
    pub mitigation_strategy: String,
}

/// Field-wise merge: present fields overwrite, absent fields are left alone.
///
/// Lists are treated as a single value and replaced whole when the incoming
/// list is non-empty.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

fn overwrite<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

fn replace_list<T>(dst: &mut Vec<T>, src: Vec<T>) {
    if !src.is_empty() {
        *dst = src;
    }
}

impl Merge for Version {
    fn merge(&mut self, other: Self) {
        overwrite(&mut self.name, other.name);
        overwrite(&mut self.date, other.date);
        overwrite(&mut self.diff, other.diff);
    }
}

impl Merge for ModelDetails {
    fn merge(&mut self, other: Self) {
        overwrite(&mut self.name, other.name);
        overwrite(&mut self.overview, other.overview);
        overwrite(&mut self.documentation, other.documentation);
        replace_list(&mut self.owners, other.owners);
        match (&mut self.version, other.version) {
            (Some(current), Some(incoming)) => current.merge(incoming),
            (slot, incoming) => overwrite(slot, incoming),
        }
        replace_list(&mut self.licenses, other.licenses);
        replace_list(&mut self.references, other.references);
        replace_list(&mut self.citations, other.citations);
        overwrite(&mut self.path, other.path);
        overwrite(&mut self.framework, other.framework);
    }
}

impl Merge for GraphicsCollection {
    fn merge(&mut self, other: Self) {
        overwrite(&mut self.description, other.description);
        replace_list(&mut self.collection, other.collection);
    }
}

impl Merge for ModelParameters {
    fn merge(&mut self, other: Self) {
        overwrite(&mut self.model_architecture, other.model_architecture);
        replace_list(&mut self.data, other.data);
        overwrite(&mut self.input_format, other.input_format);
        overwrite(&mut self.output_format, other.output_format);
        replace_list(&mut self.hyperparameters, other.hyperparameters);
    }
}

impl Merge for QuantitativeAnalysis {
    fn merge(&mut self, other: Self) {
        replace_list(&mut self.performance_metrics, other.performance_metrics);
        self.graphics.merge(other.graphics);
    }
}

impl Merge for Considerations {
    fn merge(&mut self, other: Self) {
        replace_list(&mut self.users, other.users);
        replace_list(&mut self.use_cases, other.use_cases);
        replace_list(&mut self.limitations, other.limitations);
        replace_list(&mut self.tradeoffs, other.tradeoffs);
        replace_list(&mut self.ethical_considerations, other.ethical_considerations);
    }
}

/// A partial update touching any subset of the four sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFragment {
    pub model_details: Option<ModelDetails>,
    pub model_parameters: Option<ModelParameters>,
    pub quantitative_analysis: Option<QuantitativeAnalysis>,
    pub considerations: Option<Considerations>,
}

impl CardFragment {
    pub fn is_empty(&self) -> bool {
        self.model_details.is_none()
            && self.model_parameters.is_none()
            && self.quantitative_analysis.is_none()
            && self.considerations.is_none()
    }
}

impl ModelCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fragment section by section. Absent sections are a no-op.
    pub fn merge_fragment(&mut self, fragment: CardFragment) {
        if let Some(details) = fragment.model_details {
            self.model_details.merge(details);
        }
        if let Some(parameters) = fragment.model_parameters {
            self.model_parameters.merge(parameters);
        }
        if let Some(analysis) = fragment.quantitative_analysis {
            self.quantitative_analysis.merge(analysis);
        }
        if let Some(considerations) = fragment.considerations {
            self.considerations.merge(considerations);
        }
    }

    /// Append metrics and plots from one evaluation run
    pub fn accumulate_quantitative(&mut self, fragment: QuantitativeAnalysis) {
        let analysis = &mut self.quantitative_analysis;
        analysis.performance_metrics.extend(fragment.performance_metrics);
        analysis.graphics.collection.extend(fragment.graphics.collection);
        if analysis.graphics.description.is_none() {
            analysis.graphics.description = fragment.graphics.description;
        }
    }

    /// Append datasets, folding plots into an existing dataset of the same name
    pub fn accumulate_datasets(&mut self, datasets: Vec<Dataset>) {
        for dataset in datasets {
            let existing = dataset.name.as_ref().and_then(|name| {
                self.model_parameters
                    .data
                    .iter_mut()
                    .find(|d| d.name.as_ref() == Some(name))
            });
            match existing {
                Some(current) => {
                    current.graphics.collection.extend(dataset.graphics.collection);
                    if current.graphics.description.is_none() {
                        current.graphics.description = dataset.graphics.description;
                    }
                }
                None => self.model_parameters.data.push(dataset),
            }
        }
    }

    /// Deterministic binary encoding (CBOR, fields keyed by name)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| ToolkitError::Encode(format!("{e:?}")))?;
        Ok(buf)
    }

    /// Decode a record produced by [`ModelCard::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| ToolkitError::MalformedRecord {
            path: None,
            reason: format!("{e:?}"),
        })
    }

    /// SHA-256 of the binary encoding, hex encoded
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = self.to_bytes()?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for writing a card by hand
pub struct ModelCardBuilder {
    card: ModelCard,
}

impl ModelCardBuilder {
    pub fn new(name: &str) -> Self {
        let mut card = ModelCard::new();
        card.model_details.name = Some(name.to_string());
        Self { card }
    }

    pub fn overview(mut self, overview: &str) -> Self {
        self.card.model_details.overview = Some(overview.to_string());
        self
    }

    pub fn owner(mut self, name: &str, contact: &str) -> Self {
        self.card.model_details.owners.push(Owner {
            name: Some(name.to_string()),
            contact: Some(contact.to_string()),
        });
        self
    }

    pub fn version(mut self, name: &str, date: &str) -> Self {
        self.card.model_details.version = Some(Version {
            name: Some(name.to_string()),
            date: Some(date.to_string()),
            diff: None,
        });
        self
    }

    pub fn license(mut self, identifier: &str) -> Self {
        self.card.model_details.licenses.push(License {
            identifier: Some(identifier.to_string()),
            custom_text: None,
        });
        self
    }

    pub fn framework(mut self, framework: &str) -> Self {
        self.card.model_details.framework = Some(framework.to_string());
        self
    }

    pub fn model_architecture(mut self, architecture: &str) -> Self {
        self.card.model_parameters.model_architecture = Some(architecture.to_string());
        self
    }

    pub fn use_case(mut self, description: &str) -> Self {
        self.card.considerations.use_cases.push(description.into());
        self
    }

    pub fn limitation(mut self, description: &str) -> Self {
        self.card.considerations.limitations.push(description.into());
        self
    }

    pub fn risk(mut self, name: &str, mitigation_strategy: &str) -> Self {
        self.card.considerations.ethical_considerations.push(Risk {
            name: name.to_string(),
            mitigation_strategy: mitigation_strategy.to_string(),
        });
        self
    }

    pub fn build(self) -> ModelCard {
        self.card
    }
}
