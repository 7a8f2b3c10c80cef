// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Public entry point: configure once, then scaffold / update / export
//!
//! ```no_run
//! use model_card_toolkit::{ModelCardToolkit, Source};
//!
//! let toolkit = ModelCardToolkit::builder()
//!     .output_dir("model_card_assets")
//!     .source(Source::eval_results(["eval/results"]))
//!     .build()?;
//!
//! let mut card = toolkit.scaffold()?;
//! card.model_details.name = Some("My Model".to_string());
//! toolkit.update(&card)?;
//!
//! let html = toolkit.export(None, None, None)?;
//! # Ok::<(), model_card_toolkit::ToolkitError>(())
//! ```

use crate::assets::{check_output_name, AssetStore, TemplateRegistry, DEFAULT_MODEL_CARD_FILE_NAME, DEFAULT_UI_TEMPLATE_FILE};
use crate::error::{Result, ToolkitError};
use crate::lineage::LineageStore;
use crate::model_card::ModelCard;
use crate::render::{render, RenderOptions};
use crate::scaffold::{LineageBinding, Scaffolder, Source};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// Constructor-level configuration. The lineage store itself is passed
/// separately since it is a live handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Assets directory; a fresh temp directory when unset
    pub output_dir: Option<PathBuf>,
    /// URI of the model artifact in the lineage store
    pub model_uri: Option<String>,
    pub source: Option<Source>,
    pub render: RenderOptions,
}

/// A card handed to `update` / `export`, either live or already encoded
#[derive(Debug, Clone, PartialEq)]
pub enum CardInput {
    Structured(ModelCard),
    Serialized(Vec<u8>),
}

impl CardInput {
    pub fn into_card(self) -> Result<ModelCard> {
        match self {
            CardInput::Structured(card) => Ok(card),
            CardInput::Serialized(bytes) => ModelCard::from_bytes(&bytes),
        }
    }
}

impl From<ModelCard> for CardInput {
    fn from(card: ModelCard) -> Self {
        CardInput::Structured(card)
    }
}

impl From<&ModelCard> for CardInput {
    fn from(card: &ModelCard) -> Self {
        CardInput::Structured(card.clone())
    }
}

impl From<Vec<u8>> for CardInput {
    fn from(bytes: Vec<u8>) -> Self {
        CardInput::Serialized(bytes)
    }
}

impl From<&[u8]> for CardInput {
    fn from(bytes: &[u8]) -> Self {
        CardInput::Serialized(bytes.to_vec())
    }
}

/// Where the assets directory is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Unscaffolded,
    Scaffolded,
    Rendered,
}

#[derive(Debug)]
pub struct ModelCardToolkit {
    assets: AssetStore,
    source: Option<Source>,
    lineage: Option<LineageBinding>,
    registry: TemplateRegistry,
    render_options: RenderOptions,
    state: Cell<DocumentState>,
}

impl ModelCardToolkit {
    pub fn builder() -> ModelCardToolkitBuilder {
        ModelCardToolkitBuilder::default()
    }

    /// Build a toolkit, resolving the lineage binding up front
    pub fn new(config: ToolkitConfig, lineage_store: Option<Box<dyn LineageStore>>) -> Result<Self> {
        Self::with_registry(config, lineage_store, TemplateRegistry::builtin())
    }

    fn with_registry(
        config: ToolkitConfig,
        lineage_store: Option<Box<dyn LineageStore>>,
        registry: TemplateRegistry,
    ) -> Result<Self> {
        let lineage = match (lineage_store, config.model_uri.as_deref()) {
            (Some(store), Some(uri)) => Some(LineageBinding::resolve(store, uri)?),
            (Some(_), None) => return Err(ToolkitError::StoreWithoutModelUri),
            (None, Some(uri)) => {
                return Err(ToolkitError::ModelUriWithoutStore {
                    uri: uri.to_string(),
                })
            }
            (None, None) => None,
        };

        let output_dir = match config.output_dir {
            Some(dir) => dir,
            None => {
                let dir = std::env::temp_dir();
                tempfile::Builder::new()
                    .prefix("model_card_")
                    .tempdir()
                    .map_err(|e| ToolkitError::io(&dir, e))?
                    .keep()
            }
        };
        tracing::info!("Model card assets directory: {}", output_dir.display());

        let assets = AssetStore::new(output_dir);
        let state = if assets.exists() {
            DocumentState::Scaffolded
        } else {
            DocumentState::Unscaffolded
        };

        Ok(Self {
            assets,
            source: config.source,
            lineage,
            registry,
            render_options: config.render,
            state: Cell::new(state),
        })
    }

    pub fn output_dir(&self) -> &Path {
        self.assets.root()
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn state(&self) -> DocumentState {
        self.state.get()
    }

    /// The resolved model artifact, if a lineage store is bound
    pub fn lineage(&self) -> Option<&LineageBinding> {
        self.lineage.as_ref()
    }

    /// Build a card from every configured source, persist it and copy the
    /// built-in templates into the assets directory
    pub fn scaffold(&self) -> Result<ModelCard> {
        let card = Scaffolder::new(self.source.as_ref(), self.lineage.as_ref()).scaffold();
        self.assets.persist(&card)?;
        self.assets.materialize_templates(&self.registry)?;
        self.state.set(DocumentState::Scaffolded);
        Ok(card)
    }

    /// Replace the persisted card
    pub fn update(&self, card: impl Into<CardInput>) -> Result<()> {
        let card = card.into().into_card()?;
        self.assets.persist(&card)?;
        self.state.set(DocumentState::Scaffolded);
        Ok(())
    }

    /// The persisted card
    pub fn load(&self) -> Result<ModelCard> {
        self.assets.load()
    }

    /// Render a card document, write it to `model_cards/<output_name>` and
    /// return its text.
    ///
    /// A supplied card is persisted first; otherwise the persisted card is
    /// used. With neither, this is a precondition error.
    pub fn export(
        &self,
        card: Option<CardInput>,
        template_path: Option<&Path>,
        output_name: Option<&str>,
    ) -> Result<String> {
        let output_name = output_name.unwrap_or(DEFAULT_MODEL_CARD_FILE_NAME);
        check_output_name(output_name)?;

        let card = match card {
            Some(input) => {
                let card = input.into_card()?;
                self.update(&card)?;
                card
            }
            None if self.assets.exists() => self.assets.load()?,
            None => {
                return Err(ToolkitError::Precondition(
                    "scaffold must run before export".to_string(),
                ))
            }
        };

        let template_path = match template_path {
            Some(path) => path.to_path_buf(),
            None => self.assets.template_dir().join(DEFAULT_UI_TEMPLATE_FILE),
        };
        let content = render(&card, &template_path, self.render_options)?;

        let path = self.assets.write_document(output_name, &content)?;
        tracing::info!("Model card document written to {}", path.display());

        self.state.set(DocumentState::Rendered);
        Ok(content)
    }
}

#[derive(Default)]
pub struct ModelCardToolkitBuilder {
    config: ToolkitConfig,
    lineage_store: Option<Box<dyn LineageStore>>,
    registry: Option<TemplateRegistry>,
}

impl ModelCardToolkitBuilder {
    pub fn config(mut self, config: ToolkitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.config.source = Some(source);
        self
    }

    pub fn lineage_store(mut self, store: impl LineageStore + 'static) -> Self {
        self.lineage_store = Some(Box::new(store));
        self
    }

    pub fn model_uri(mut self, uri: &str) -> Self {
        self.config.model_uri = Some(uri.to_string());
        self
    }

    pub fn autoescape(mut self, autoescape: bool) -> Self {
        self.config.render.autoescape = autoescape;
        self
    }

    /// Replace the built-in template registry
    pub fn template_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ModelCardToolkit> {
        let registry = self.registry.unwrap_or_else(TemplateRegistry::builtin);
        ModelCardToolkit::with_registry(self.config, self.lineage_store, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::tests::pipeline_store;
    use crate::model_card::ModelCardBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_export_before_scaffold_is_precondition_error() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder().output_dir(dir.path()).build().unwrap();
        assert_eq!(toolkit.state(), DocumentState::Unscaffolded);

        let err = toolkit.export(None, None, None).unwrap_err();
        match err {
            ToolkitError::Precondition(msg) => assert_eq!(msg, "scaffold must run before export"),
            other => panic!("expected Precondition, got {:?}", other),
        }
    }

    #[test]
    fn test_default_output_dir_is_fresh_temp_dir() {
        let toolkit = ModelCardToolkit::new(ToolkitConfig::default(), None).unwrap();
        assert!(toolkit.output_dir().is_dir());
        assert!(!toolkit.assets().exists());
        std::fs::remove_dir_all(toolkit.output_dir()).unwrap();
    }

    #[test]
    fn test_lifecycle_states() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder().output_dir(dir.path()).build().unwrap();

        let card = toolkit.scaffold().unwrap();
        assert_eq!(toolkit.state(), DocumentState::Scaffolded);
        assert!(dir.path().join("template/md/default_template.md.jinja").is_file());

        toolkit.export(None, None, None).unwrap();
        toolkit.export(None, None, Some("again.html")).unwrap();
        assert_eq!(toolkit.state(), DocumentState::Rendered);

        toolkit.update(&card).unwrap();
        assert_eq!(toolkit.state(), DocumentState::Scaffolded);

        let reopened = ModelCardToolkit::builder().output_dir(dir.path()).build().unwrap();
        assert_eq!(reopened.state(), DocumentState::Scaffolded);
    }

    #[test]
    fn test_update_accepts_serialized_bytes() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder().output_dir(dir.path()).build().unwrap();
        let card = ModelCardBuilder::new("bytes").build();

        toolkit.update(card.to_bytes().unwrap()).unwrap();
        assert_eq!(toolkit.load().unwrap(), card);

        let err = toolkit.update(&b"\xff\xfe"[..]).unwrap_err();
        assert!(matches!(err, ToolkitError::MalformedRecord { .. }));
        assert_eq!(toolkit.load().unwrap(), card);
    }

    #[test]
    fn test_export_with_card_persists_it() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder().output_dir(dir.path()).build().unwrap();
        toolkit.scaffold().unwrap();

        let card = ModelCardBuilder::new("supplied").build();
        let html = toolkit.export(Some(card.clone().into()), None, None).unwrap();
        assert!(html.contains("supplied"));
        assert_eq!(toolkit.load().unwrap(), card);
    }

    #[test]
    fn test_export_with_markdown_template() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder()
            .output_dir(dir.path())
            .autoescape(false)
            .build()
            .unwrap();
        let mut card = toolkit.scaffold().unwrap();
        card.model_details.name = Some("a <b> model".to_string());
        toolkit.update(&card).unwrap();

        let template = dir.path().join("template/md/default_template.md.jinja");
        let md = toolkit.export(None, Some(&template), Some("model_card.md")).unwrap();
        assert!(md.contains("# Model Card for a <b> model"));
        assert!(dir.path().join("model_cards/model_card.md").is_file());
    }

    #[test]
    fn test_export_rejects_escaping_output_name() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        let toolkit = ModelCardToolkit::builder().output_dir(&assets).build().unwrap();
        toolkit.scaffold().unwrap();

        let supplied = ModelCardBuilder::new("not persisted").build();
        let err = toolkit
            .export(Some(supplied.into()), None, Some("../../escaped.html"))
            .unwrap_err();
        assert!(matches!(err, ToolkitError::InvalidOutputName { .. }));
        assert!(!dir.path().join("escaped.html").exists());
        assert!(!assets.join("escaped.html").exists());
        assert_eq!(toolkit.load().unwrap(), ModelCard::new());
        assert_eq!(toolkit.state(), DocumentState::Scaffolded);
    }

    #[test]
    fn test_export_missing_template() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder().output_dir(dir.path()).build().unwrap();
        toolkit.update(ModelCard::new()).unwrap();

        let err = toolkit.export(None, None, None).unwrap_err();
        assert!(matches!(err, ToolkitError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_scaffold_with_missing_builtin_resource() {
        let dir = TempDir::new().unwrap();
        let toolkit = ModelCardToolkit::builder()
            .output_dir(dir.path())
            .template_registry(TemplateRegistry::empty())
            .build()
            .unwrap();
        let err = toolkit.scaffold().unwrap_err();
        assert!(matches!(err, ToolkitError::TemplateResourceMissing { .. }));
    }

    #[test]
    fn test_configuration_errors() {
        let dir = TempDir::new().unwrap();

        let err = ModelCardToolkit::builder()
            .output_dir(dir.path())
            .lineage_store(pipeline_store())
            .build()
            .unwrap_err();
        assert!(matches!(err, ToolkitError::StoreWithoutModelUri));

        let err = ModelCardToolkit::builder()
            .output_dir(dir.path())
            .model_uri("/pipeline/model")
            .build()
            .unwrap_err();
        assert!(matches!(err, ToolkitError::ModelUriWithoutStore { .. }));

        let err = ModelCardToolkit::builder()
            .output_dir(dir.path())
            .lineage_store(pipeline_store())
            .model_uri("/missing")
            .build()
            .unwrap_err();
        assert!(err.is_configuration());

        let toolkit = ModelCardToolkit::builder()
            .output_dir(dir.path())
            .lineage_store(pipeline_store())
            .model_uri("/pipeline/model")
            .build()
            .unwrap();
        assert_eq!(toolkit.lineage().unwrap().model().id, 3);
    }

    #[test]
    fn test_config_from_json() {
        let config: ToolkitConfig = serde_json::from_str(
            r#"{"output_dir": "/tmp/cards", "source": {"eval_result_paths": ["/eval1"]}, "render": {"autoescape": false}}"#,
        )
        .unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/cards")));
        assert_eq!(config.source.unwrap().eval_result_paths, vec![PathBuf::from("/eval1")]);
        assert!(!config.render.autoescape);
        assert!(config.model_uri.is_none());

        let config: ToolkitConfig = serde_json::from_str(r#"{"render": {}}"#).unwrap();
        assert!(config.render.autoescape);
    }
}
