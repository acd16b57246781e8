//! Config file templates with declared parameters
//!
//! Placeholders use the `{{ name }}` form. Rendering fails if a declared
//! parameter has no value or if any placeholder is left in the output.

use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Any `{{ ... }}` placeholder, capturing the trimmed name
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([^}]*?)\s*\}\}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{template}' needs parameter '{param}'")]
    MissingParameter { template: String, param: String },

    #[error("template '{template}' has unresolved placeholders: {}", placeholders.join(", "))]
    Unresolved {
        template: String,
        placeholders: Vec<String>,
    },

    #[error("invalid placeholder pattern: {0}")]
    Pattern(String),
}

/// A file artifact rendered from a fixed body and a declared parameter set
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub body: &'static str,
    pub params: &'static [&'static str],
}

impl Template {
    pub const fn new(name: &'static str, body: &'static str, params: &'static [&'static str]) -> Self {
        Self { name, body, params }
    }

    /// Render with variable substitution
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut output = self.body.to_string();

        for param in self.params {
            let value = values
                .get(*param)
                .ok_or_else(|| TemplateError::MissingParameter {
                    template: self.name.to_string(),
                    param: param.to_string(),
                })?;
            let placeholder = format!("{{{{ {} }}}}", param);
            output = output.replace(&placeholder, value);
        }

        let leftover = placeholders(&output)?;
        if !leftover.is_empty() {
            return Err(TemplateError::Unresolved {
                template: self.name.to_string(),
                placeholders: leftover,
            });
        }

        Ok(output)
    }
}

/// Names of every `{{ ... }}` placeholder in `text`
fn placeholders(text: &str) -> Result<Vec<String>, TemplateError> {
    let pattern =
        Regex::new(PLACEHOLDER_PATTERN).map_err(|e| TemplateError::Pattern(e.to_string()))?;
    Ok(pattern
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect())
}
