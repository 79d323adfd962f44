// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Template rendering.
//!
//! Source files carrying the `.tmpl` suffix are rendered against a read-only
//! __data mapping__ before they become part of the target state. The engine
//! itself is pluggable through [`Renderer`]. By default [`TeraRenderer`] is
//! used, which gives Jinja-like variable interpolation and conditionals.
//!
//! The reverse direction is handled by [`auto_template`], which turns
//! literal data values found in a file into template references when a file
//! is added to the source tree as a template.

use std::{
    path::{Path, PathBuf},
    str::{from_utf8, Utf8Error},
};
use tera::{Context, Tera};
use toml::{Table, Value};

/// Data mapping handed to template rendering.
pub type Data = Table;

/// Template engine capability.
pub trait Renderer {
    /// Render raw template contents against data mapping.
    ///
    /// The `path` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// - Return [`TemplateError`] if template cannot be parsed or executed.
    fn render(&self, path: &Path, contents: &[u8], data: &Data) -> Result<Vec<u8>>;
}

/// Template rendering through Tera.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeraRenderer;

impl TeraRenderer {
    /// Construct new Tera renderer.
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for TeraRenderer {
    fn render(&self, path: &Path, contents: &[u8], data: &Data) -> Result<Vec<u8>> {
        let source = from_utf8(contents).map_err(|err| TemplateError::Utf8 {
            source: err,
            path: path.into(),
        })?;
        let context = Context::from_serialize(data).map_err(TemplateError::Context)?;

        // INVARIANT: Never escape output, dotfiles are not HTML.
        let output = Tera::one_off(source, &context, false).map_err(|err| TemplateError::Render {
            source: err,
            path: path.into(),
        })?;

        Ok(output.into_bytes())
    }
}

/// Replace literal data values in contents with template references.
///
/// Only string values take part. Nested tables are flattened into dotted
/// keys, e.g., `{{ git.email }}`, and keys that Tera cannot reference as a
/// plain variable are left out. Matching is exact and case-sensitive. At
/// each position the longest matching value wins, and replaced text is never
/// scanned again. Delimiters already present in the contents are wrapped in
/// raw blocks, so rendering the result always yields the original contents.
/// Contents that are not valid UTF-8 are returned unchanged.
pub fn auto_template(contents: &[u8], data: &Data) -> Vec<u8> {
    let Ok(text) = from_utf8(contents) else {
        return contents.to_vec();
    };

    let mut variables = Vec::new();
    flatten_strings(data, "", &mut variables);
    variables.retain(|(key, value)| !value.is_empty() && is_variable(key));

    // INVARIANT: Longest value first, then key order for equal lengths.
    variables.sort_by(|(a_key, a_value), (b_key, b_value)| {
        b_value.len().cmp(&a_value.len()).then_with(|| a_key.cmp(b_key))
    });

    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(next) = rest.chars().next() {
        if let Some((key, value)) = variables.iter().find(|(_, value)| rest.starts_with(value.as_str())) {
            output.push_str("{{ ");
            output.push_str(key);
            output.push_str(" }}");
            rest = &rest[value.len()..];
        } else if let Some(delimiter) = OPEN_DELIMITERS.iter().find(|delimiter| rest.starts_with(*delimiter)) {
            output.push_str("{% raw %}");
            output.push_str(delimiter);
            output.push_str("{% endraw %}");
            rest = &rest[delimiter.len()..];
        } else {
            output.push(next);
            rest = &rest[next.len_utf8()..];
        }
    }

    output.into_bytes()
}

const OPEN_DELIMITERS: [&str; 3] = ["{{", "{%", "{#"];

const KEYWORDS: [&str; 9] = ["and", "or", "not", "in", "is", "true", "false", "True", "False"];

/// Check that dotted key is usable as a Tera variable reference.
fn is_variable(key: &str) -> bool {
    key.split('.').all(|segment| {
        let mut chars = segment.chars();
        let starts_well = chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');

        starts_well
            && chars.all(|rest| rest.is_ascii_alphanumeric() || rest == '_')
            && !KEYWORDS.contains(&segment)
    })
}

fn flatten_strings(table: &Table, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::String(value) => out.push((key, value.clone())),
            Value::Table(nested) => flatten_strings(nested, &key, out),
            _ => continue,
        }
    }
}

/// Template error types.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template source is not valid UTF-8.
    #[error("template {:?} is not valid UTF-8", path.display())]
    Utf8 {
        #[source]
        source: Utf8Error,
        path: PathBuf,
    },

    /// Data mapping cannot be used as render context.
    #[error("failed to build template context from data")]
    Context(#[source] tera::Error),

    /// Template cannot be parsed or executed.
    #[error("failed to render template {:?}", path.display())]
    Render {
        #[source]
        source: tera::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = TemplateError> = std::result::Result<T, E>;
