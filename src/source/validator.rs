//! Rule checks over an extracted source model

use super::models::{SourceModel, ValidationReport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Import roots that count as standard library or framework
    #[serde(default = "default_framework_roots")]
    pub framework_roots: Vec<String>,
}

fn default_framework_roots() -> Vec<String> {
    ["std", "aptos_framework", "aptos_std", "aptos_token", "aptos_token_objects"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            framework_roots: default_framework_roots(),
        }
    }
}

/// Structural validator
///
/// Module name, module address, balanced braces and at least one function
/// are required. Missing framework imports and duplicate error codes are
/// reported as warnings only.
#[derive(Debug, Clone, Default)]
pub struct SourceValidator {
    config: ValidatorConfig,
}

impl SourceValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Run all rules
    pub fn validate(&self, model: &SourceModel, source: &str) -> ValidationReport {
        let mut report = ValidationReport::default();

        if model.module_name.is_empty() {
            report.errors.push("Missing module declaration".to_string());
        } else if model.address.is_empty() {
            report.errors.push("Missing module address".to_string());
        }

        let (open, close) = count_braces(source);
        if open != close {
            report.errors.push(format!(
                "Unbalanced braces: {} opening, {} closing",
                open, close
            ));
        }

        if model.functions.is_empty() {
            report.errors.push("No functions declared".to_string());
        }

        let has_framework = model
            .dependencies
            .iter()
            .any(|dep| self.config.framework_roots.iter().any(|root| root == dep));
        if !has_framework {
            report
                .warnings
                .push("No standard library or framework import".to_string());
        }

        let mut seen: HashMap<u64, &str> = HashMap::new();
        for (name, code) in &model.error_codes {
            if let Some(first) = seen.get(code) {
                report.warnings.push(format!(
                    "Error constants {} and {} share code {}",
                    first, name, code
                ));
            } else {
                seen.insert(*code, name.as_str());
            }
        }

        report
    }

    /// Fold the report into the model
    pub fn apply(&self, mut model: SourceModel, source: &str) -> SourceModel {
        let report = self.validate(&model, source);
        model.is_valid = report.passed();
        model.diagnostics = report.diagnostics();
        model
    }
}

/// Count braces outside of `//` line comments
pub(crate) fn count_braces(source: &str) -> (usize, usize) {
    let mut open = 0;
    let mut close = 0;
    for line in source.lines() {
        let code = match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        };
        for ch in code.chars() {
            match ch {
                '{' => open += 1,
                '}' => close += 1,
                _ => {}
            }
        }
    }
    (open, close)
}
