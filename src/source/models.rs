//! Data models for contract source scanning and customization

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structural summary of a Move source file
///
/// Produced fresh on every scan. A customized source is re-scanned rather
/// than patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceModel {
    pub address: String,
    pub module_name: String,
    pub imports: Vec<String>,
    /// Root segment of each import, first-seen order
    pub dependencies: Vec<String>,
    pub structs: Vec<String>,
    pub functions: Vec<String>,
    pub events: Vec<String>,
    /// Error constant name to abort code, declaration order
    pub error_codes: IndexMap<String, u64>,
    pub is_valid: bool,
    pub diagnostics: Vec<String>,
}

impl SourceModel {
    /// Fully qualified module identifier, e.g. `0x1::coin`
    pub fn qualified_name(&self) -> String {
        if self.address.is_empty() {
            self.module_name.clone()
        } else {
            format!("{}::{}", self.address, self.module_name)
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f == name)
    }

    /// One-line description for logs and step details
    pub fn summary(&self) -> String {
        format!(
            "{} ({} functions, {} structs, {} events, {} error codes{})",
            if self.module_name.is_empty() {
                "<unnamed>".to_string()
            } else {
                self.qualified_name()
            },
            self.functions.len(),
            self.structs.len(),
            self.events.len(),
            self.error_codes.len(),
            if self.is_valid { "" } else { ", invalid" }
        )
    }
}

/// Outcome of the rule checks run against a model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors followed by warnings, warnings prefixed
    pub fn diagnostics(&self) -> Vec<String> {
        self.errors
            .iter()
            .cloned()
            .chain(self.warnings.iter().map(|w| format!("Warning: {}", w)))
            .collect()
    }
}

/// Rewrites applied by the customizer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomizationOptions {
    /// Used as the module name when `module_name` is absent
    pub project_name: String,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Feature tags whose same-named functions are commented out
    #[serde(default)]
    pub strip_features: Vec<String>,
    /// Constant name to literal value
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
    #[serde(default)]
    pub extra_imports: Vec<String>,
}

impl CustomizationOptions {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn with_import(mut self, path: impl Into<String>) -> Self {
        self.extra_imports.push(path.into());
        self
    }

    pub fn strip_feature(mut self, feature: impl Into<String>) -> Self {
        self.strip_features.push(feature.into());
        self
    }

    /// The raw (unsanitized) requested module name
    pub fn requested_module_name(&self) -> &str {
        self.module_name.as_deref().unwrap_or(&self.project_name)
    }
}
