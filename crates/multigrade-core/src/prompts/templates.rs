//! Prompt templates with `{{name}}` placeholders.
//!
//! Only identifier characters are recognised inside the double braces, so
//! the single braces of the JSON shape shown to the model stay literal.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::RegistryError;
use crate::agents::AgentKind;
use crate::context::RequestContext;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex should be valid")
});

/// Value used when neither the context nor its classroom parameters supply
/// a placeholder.
#[derive(Clone)]
pub enum TemplateDefault {
    /// A constant string.
    Fixed(String),
    /// Computed from the request, e.g. per-grade learning objectives.
    Derived(fn(&RequestContext) -> String),
}

impl TemplateDefault {
    pub fn resolve(&self, context: &RequestContext) -> String {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Derived(derive) => derive(context),
        }
    }
}

impl fmt::Debug for TemplateDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// A prompt for one agent kind: system role text plus a parameterised body.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    kind: AgentKind,
    system: String,
    body: String,
    defaults: BTreeMap<String, TemplateDefault>,
}

/// On-disk form of a template override.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    system: String,
    body: String,
    #[serde(default)]
    defaults: BTreeMap<String, String>,
}

impl PromptTemplate {
    pub fn new(kind: AgentKind, system: impl Into<String>, body: impl Into<String>) -> Self {
        Self { kind, system: system.into(), body: body.into(), defaults: BTreeMap::new() }
    }

    /// Registers a constant default for `name`.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), TemplateDefault::Fixed(value.into()));
        self
    }

    /// Registers a default computed from the request.
    #[must_use]
    pub fn with_derived_default(
        mut self,
        name: impl Into<String>,
        derive: fn(&RequestContext) -> String,
    ) -> Self {
        self.defaults.insert(name.into(), TemplateDefault::Derived(derive));
        self
    }

    /// Copies defaults from `base` for names this template does not set.
    #[must_use]
    pub(crate) fn inherit_defaults(mut self, base: &Self) -> Self {
        for (name, default) in &base.defaults {
            self.defaults.entry(name.clone()).or_insert_with(|| default.clone());
        }
        self
    }

    /// Loads a template override from a TOML file with `system`, `body` and
    /// an optional `[defaults]` table.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Load`] if the file cannot be read or parsed.
    pub fn load(kind: AgentKind, path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let load_err = |reason: String| RegistryError::Load { path: path.display().to_string(), reason };
        let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let file: TemplateFile = toml::from_str(&content).map_err(|e| load_err(e.to_string()))?;

        let mut template = Self::new(kind, file.system, file.body);
        for (name, value) in file.defaults {
            template = template.with_default(name, value);
        }
        Ok(template)
    }

    pub const fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn default_for(&self, name: &str) -> Option<&TemplateDefault> {
        self.defaults.get(name)
    }

    /// Distinct placeholder names in order of first appearance, system text
    /// first.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for text in [&self.system, &self.body] {
            for caps in PLACEHOLDER.captures_iter(text) {
                let name = &caps[1];
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Returns true if `name` appears as a placeholder.
    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders().iter().any(|n| n == name)
    }

    /// Substitutes placeholders from `values`; unknown names render empty.
    pub(crate) fn render(&self, values: &BTreeMap<String, String>) -> (String, String) {
        let substitute = |text: &str| {
            PLACEHOLDER
                .replace_all(text, |caps: &Captures<'_>| {
                    values.get(&caps[1]).cloned().unwrap_or_default()
                })
                .into_owned()
        };
        (substitute(&self.system), substitute(&self.body))
    }
}
