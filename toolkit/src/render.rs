// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Template rendering of a model card
//!
//! Templates see exactly four read-only roots: `model_details`,
//! `model_parameters`, `quantitative_analysis` and `considerations`.

use crate::error::{Result, ToolkitError};
use crate::model_card::ModelCard;
use minijinja::{context, AutoEscape, Environment, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options applied to every render of one toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// HTML-escape every interpolated value. Turn off for Markdown or text.
    pub autoescape: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { autoescape: true }
    }
}

/// Render `card` through the template file at `template_path`.
///
/// The template is loaded from its own directory, so it may include or
/// import siblings. Unset fields are simply missing from the context, so
/// templates guard optional values with `{% if %}`.
///
/// Errors:
/// - [`ToolkitError::TemplateNotFound`] when the template or one of its
///   includes does not exist
/// - [`ToolkitError::Render`] for syntax and evaluation errors
pub fn render(card: &ModelCard, template_path: &Path, options: RenderOptions) -> Result<String> {
    let not_found = || ToolkitError::TemplateNotFound {
        path: template_path.to_path_buf(),
    };
    if !template_path.is_file() {
        return Err(not_found());
    }
    // Includes and imports resolve against the template's own directory
    let template_dir = template_path.parent().unwrap_or(Path::new("."));
    let template_name = template_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(not_found)?;

    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(template_dir));
    let autoescape = options.autoescape;
    env.set_auto_escape_callback(move |_| if autoescape { AutoEscape::Html } else { AutoEscape::None });

    // A missing include surfaces as TemplateNotFound, like a missing entry template
    let render_error = |source: minijinja::Error| {
        if source.kind() == ErrorKind::TemplateNotFound {
            not_found()
        } else {
            ToolkitError::Render {
                path: template_path.to_path_buf(),
                source,
            }
        }
    };

    let template = env.get_template(template_name).map_err(render_error)?;
    let rendered = template
        .render(context! {
            model_details => &card.model_details,
            model_parameters => &card.model_parameters,
            quantitative_analysis => &card.quantitative_analysis,
            considerations => &card.considerations,
        })
        .map_err(render_error)?;

    tracing::debug!("Rendered {} ({} bytes)", template_path.display(), rendered.len());
    Ok(rendered)
}
