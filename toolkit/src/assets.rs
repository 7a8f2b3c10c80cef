// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Assets directory: persisted record, template copies, rendered documents
//!
//! Layout under the assets root:
//! - `data/model_card.proto`: the binary record
//! - `template/`: copies of the built-in templates
//! - `model_cards/`: rendered documents
//!
//! Every write goes to a temp file in the destination directory and is then
//! renamed into place, so readers never see a partial file.

use crate::error::{Result, ToolkitError};
use crate::model_card::ModelCard;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

pub const RECORD_FILE: &str = "data/model_card.proto";
pub const TEMPLATE_DIR: &str = "template";
pub const MODEL_CARDS_DIR: &str = "model_cards";
pub const DEFAULT_MODEL_CARD_FILE_NAME: &str = "model_card.html";

/// Built-in templates copied on scaffold, relative to the template directory
pub const UI_TEMPLATES: &[&str] = &["html/default_template.html.jinja", "md/default_template.md.jinja"];

/// Template used by export when none is given, relative to the template directory
pub const DEFAULT_UI_TEMPLATE_FILE: &str = "html/default_template.html.jinja";

/// Templates bundled into the binary, keyed by path relative to `template/`
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    entries: BTreeMap<&'static str, &'static str>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "html/default_template.html.jinja",
            include_str!("../templates/html/default_template.html.jinja"),
        );
        entries.insert(
            "md/default_template.md.jinja",
            include_str!("../templates/md/default_template.md.jinja"),
        );
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, name: &'static str, content: &'static str) -> Self {
        self.entries.insert(name, content);
        self
    }

    pub fn get(&self, name: &str) -> Result<&'static str> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| ToolkitError::TemplateResourceMissing {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

/// Owns one assets directory
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join(RECORD_FILE)
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root.join(TEMPLATE_DIR)
    }

    pub fn model_cards_dir(&self) -> PathBuf {
        self.root.join(MODEL_CARDS_DIR)
    }

    /// Whether a record has been persisted
    pub fn exists(&self) -> bool {
        self.record_path().is_file()
    }

    /// Serialize and atomically replace the persisted record
    pub fn persist(&self, card: &ModelCard) -> Result<()> {
        let path = self.record_path();
        let bytes = card.to_bytes()?;
        write_atomic(&path, &bytes)?;
        tracing::info!(
            "Model card persisted to {} ({} bytes, sha256={})",
            path.display(),
            bytes.len(),
            card.fingerprint()?
        );
        Ok(())
    }

    pub fn load(&self) -> Result<ModelCard> {
        let path = self.record_path();
        if !path.exists() {
            return Err(ToolkitError::NotScaffolded { path });
        }
        let bytes = std::fs::read(&path).map_err(|e| ToolkitError::io(&path, e))?;
        ModelCard::from_bytes(&bytes).map_err(|e| match e {
            ToolkitError::MalformedRecord { reason, .. } => ToolkitError::MalformedRecord {
                path: Some(path.clone()),
                reason,
            },
            other => other,
        })
    }

    /// Copy every manifest entry from `registry` into `template/`
    pub fn materialize_templates(&self, registry: &TemplateRegistry) -> Result<Vec<PathBuf>> {
        self.materialize(registry, UI_TEMPLATES)
    }

    /// Copy the named templates from `registry` into `template/`.
    ///
    /// Fails before writing anything if a name is missing from the registry.
    pub fn materialize(&self, registry: &TemplateRegistry, names: &[&str]) -> Result<Vec<PathBuf>> {
        let contents = names
            .iter()
            .map(|name| registry.get(name).map(|content| (*name, content)))
            .collect::<Result<Vec<_>>>()?;

        let template_dir = self.template_dir();
        let mut written = Vec::with_capacity(contents.len());
        for (name, content) in contents {
            let path = template_dir.join(name);
            write_atomic(&path, content.as_bytes())?;
            tracing::debug!("Template written: {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Write a rendered document into `model_cards/`, replacing any old one.
    ///
    /// `output_name` must be a plain file name.
    pub fn write_document(&self, output_name: &str, content: &str) -> Result<PathBuf> {
        check_output_name(output_name)?;
        let path = self.model_cards_dir().join(output_name);
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }
}

/// Reject names that would resolve outside `model_cards/`
pub(crate) fn check_output_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ToolkitError::InvalidOutputName {
            name: name.to_string(),
        }),
    }
}

/// Write via a sibling temp file and rename over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| ToolkitError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ToolkitError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| ToolkitError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| ToolkitError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| ToolkitError::io(path, e.error))?;
    Ok(())
}
