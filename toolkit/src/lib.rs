// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model card toolkit
//!
//! This crate provides:
//! - A typed, versionable model card record with a binary encoding
//! - Scaffolding from eval results, dataset statistics and a lineage store
//! - Template rendering of the card to HTML or Markdown
//! - An assets directory holding the record, templates and rendered cards

pub mod adapters;
pub mod assets;
pub mod error;
pub mod eval_result;
pub mod graphics;
pub mod lineage;
pub mod model_card;
pub mod render;
pub mod scaffold;
pub mod statistics;
pub mod toolkit;

pub use error::{Result, ToolkitError};
pub use lineage::{Artifact, InMemoryLineageStore, LineageStore};
pub use model_card::{CardFragment, ModelCard, ModelCardBuilder};
pub use render::RenderOptions;
pub use scaffold::Source;
pub use toolkit::{CardInput, DocumentState, ModelCardToolkit, ModelCardToolkitBuilder, ToolkitConfig};
