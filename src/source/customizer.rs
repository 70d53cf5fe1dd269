//! Textual customization of Move sources
//!
//! Rewrites run in a fixed order (rename, re-address, constants, imports,
//! feature stripping) and each step re-scans the text produced by the
//! previous one. Feature stripping comments code out instead of deleting
//! it so every customization stays reviewable in the output.

use super::extractor::SourceModelExtractor;
use super::models::{CustomizationOptions, SourceModel};
use super::validator::count_braces;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use tracing::debug;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bmodule\s+(?:([A-Za-z0-9_]+)::)?([A-Za-z_][A-Za-z0-9_]*)\s*\{")
        .expect("HEADER_RE should compile")
});

static ADDRESS_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\baddress\s+([A-Za-z0-9_]+)\s*\{").expect("ADDRESS_BLOCK_RE should compile")
});

static USE_STMT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)use\s+[^;]+;").expect("USE_STMT_RE should compile")
});

/// Upper bound on functions stripped per feature tag
const MAX_STRIP_PASSES: usize = 16;

/// Turn an arbitrary name into a snake_case Move identifier
///
/// Invalid characters are dropped, camelCase boundaries and separators
/// become `_`, repeated separators collapse and the result always starts
/// with a letter.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    let mut prev: Option<char> = None;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase()
                && prev.map_or(false, |p| p.is_ascii_lowercase() || p.is_ascii_digit())
            {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if matches!(ch, ' ' | '-' | '_' | '.') {
            out.push('_');
        }
        prev = Some(ch);
    }

    let mut collapsed = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
        trimmed.to_string()
    } else {
        format!("m_{}", trimmed)
    }
}

/// Strip a leading `@` and a doubled `0x` prefix
pub fn normalize_address(address: &str) -> String {
    let mut addr = address.trim().trim_start_matches('@').to_string();
    while addr.starts_with("0x0x") {
        addr.replace_range(0..2, "");
    }
    addr
}

fn constant_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert_str(0, "C_");
    }
    name
}

fn constant_declaration(name: &str, value: &str) -> String {
    let value = value.trim();
    if value.parse::<u64>().is_ok() {
        format!("const {}: u64 = {};", name, value)
    } else if value == "true" || value == "false" {
        format!("const {}: bool = {};", name, value)
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("const {}: vector<u8> = b\"{}\";", name, escaped)
    }
}

fn line_start(source: &str, idx: usize) -> usize {
    source[..idx].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

fn line_end(source: &str, idx: usize) -> usize {
    source[idx..].find('\n').map(|i| idx + i).unwrap_or(source.len())
}

/// Best-effort source rewriter
#[derive(Debug, Clone, Default)]
pub struct SourceCustomizer {
    extractor: SourceModelExtractor,
}

impl SourceCustomizer {
    pub fn new(extractor: SourceModelExtractor) -> Self {
        Self { extractor }
    }

    /// Apply all requested rewrites in order
    pub fn customize(&self, source: &str, options: &CustomizationOptions) -> String {
        let mut out = self.rename_module(source, options.requested_module_name());

        if let Some(address) = &options.address {
            out = self.readdress(&out, address);
        }

        if !options.constants.is_empty() {
            out = self.inject_constants(&out, &options.constants);
        }

        if !options.extra_imports.is_empty() {
            out = self.inject_imports(&out, &options.extra_imports);
        }

        for feature in &options.strip_features {
            out = self.strip_feature(&out, feature);
        }

        out
    }

    /// Rename the module, keeping its address
    pub fn rename_module(&self, source: &str, requested: &str) -> String {
        let name = sanitize_identifier(requested);
        if name.is_empty() {
            return source.to_string();
        }

        let Some(caps) = HEADER_RE.captures(source) else {
            return source.to_string();
        };
        let Some(old) = caps.get(2) else {
            return source.to_string();
        };
        if old.as_str() == name {
            return source.to_string();
        }

        let old_name = old.as_str().to_string();
        let address = caps.get(1).map(|m| m.as_str().to_string());

        let mut out = String::with_capacity(source.len() + name.len());
        out.push_str(&source[..old.start()]);
        out.push_str(&name);
        out.push_str(&source[old.end()..]);

        // Self references such as `friend 0xcafe::old;` or test imports
        if let Some(address) = address {
            let pattern = format!(
                r"\b{}::{}\b",
                regex::escape(&address),
                regex::escape(&old_name)
            );
            if let Ok(re) = Regex::new(&pattern) {
                let replacement = format!("{}::{}", address, name);
                out = re
                    .replace_all(&out, NoExpand(&replacement))
                    .into_owned();
            }
        }

        debug!("Renamed module {} -> {}", old_name, name);
        out
    }

    /// Move the module (and every `@old` reference) to a new address
    pub fn readdress(&self, source: &str, requested: &str) -> String {
        let new_address = normalize_address(requested);
        if new_address.is_empty() {
            return source.to_string();
        }

        let model = self.extractor.scan(source);
        let old_address = model.address;
        if old_address.is_empty() || old_address == new_address {
            return source.to_string();
        }

        let mut out = source.to_string();

        let header_range = HEADER_RE.captures(&out).map(|caps| {
            caps.get(1)
                .map(|m| m.range())
                .or_else(|| {
                    ADDRESS_BLOCK_RE
                        .captures(&out)
                        .and_then(|block| block.get(1).map(|m| m.range()))
                })
        });
        if let Some(Some(range)) = header_range {
            out.replace_range(range, &new_address);
        }

        let escaped = regex::escape(&old_address);
        if let Ok(re) = Regex::new(&format!(r"@{}\b", escaped)) {
            let replacement = format!("@{}", new_address);
            out = re.replace_all(&out, NoExpand(&replacement)).into_owned();
        }
        if let Ok(re) = Regex::new(&format!(r"\b{}::", escaped)) {
            let replacement = format!("{}::", new_address);
            out = re.replace_all(&out, NoExpand(&replacement)).into_owned();
        }

        debug!("Re-addressed module {} -> {}", old_address, new_address);
        out
    }

    /// Insert constants right after the module's opening brace
    pub fn inject_constants(&self, source: &str, constants: &BTreeMap<String, String>) -> String {
        let Some(header) = HEADER_RE.find(source) else {
            return source.to_string();
        };

        let lines: Vec<String> = constants
            .iter()
            .filter_map(|(key, value)| {
                let name = constant_name(key);
                let declared = Regex::new(&format!(r"\bconst\s+{}\s*:", regex::escape(&name)))
                    .map(|re| re.is_match(source))
                    .unwrap_or(false);
                if declared {
                    None
                } else {
                    Some(format!("    {}", constant_declaration(&name, value)))
                }
            })
            .collect();

        if lines.is_empty() {
            return source.to_string();
        }

        let insert_at = header.end();
        let mut out = String::with_capacity(source.len() + lines.len() * 48);
        out.push_str(&source[..insert_at]);
        out.push('\n');
        out.push_str(&lines.join("\n"));
        out.push_str(&source[insert_at..]);
        out
    }

    /// Insert `use` statements after the last import (or the module brace)
    pub fn inject_imports(&self, source: &str, imports: &[String]) -> String {
        let existing = self.extractor.scan(source).imports;
        let mut pending: Vec<String> = Vec::new();

        for import in imports {
            let path = import
                .trim()
                .trim_start_matches("use ")
                .trim_end_matches(';')
                .trim()
                .to_string();
            if path.is_empty() || pending.contains(&path) {
                continue;
            }
            let statement = format!("use {};", path);
            if existing.contains(&path) || source.contains(&statement) {
                continue;
            }
            pending.push(path);
        }

        if pending.is_empty() {
            return source.to_string();
        }

        let (insert_at, indent) = match USE_STMT_RE.captures_iter(source).last() {
            Some(caps) => {
                let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
                let indent = caps.get(1).map(|m| m.as_str()).unwrap_or("    ");
                (end, indent.to_string())
            }
            None => match HEADER_RE.find(source) {
                Some(header) => (header.end(), "    ".to_string()),
                None => return source.to_string(),
            },
        };

        let block: String = pending
            .iter()
            .map(|path| format!("\n{}use {};", indent, path))
            .collect();

        let mut out = String::with_capacity(source.len() + block.len());
        out.push_str(&source[..insert_at]);
        out.push_str(&block);
        out.push_str(&source[insert_at..]);
        out
    }

    /// Comment out every function named after the feature tag
    pub fn strip_feature(&self, source: &str, feature: &str) -> String {
        let name = sanitize_identifier(feature);
        if name.is_empty() {
            return source.to_string();
        }

        let pattern = format!(
            r"(?m)^[ \t]*(?:public(?:\s*\([a-z]+\))?\s+)?(?:entry\s+)?(?:inline\s+)?fun\s+{}\b",
            regex::escape(&name)
        );
        let Ok(re) = Regex::new(&pattern) else {
            return source.to_string();
        };

        let mut out = source.to_string();
        for _ in 0..MAX_STRIP_PASSES {
            let Some(found) = re.find(&out) else {
                break;
            };
            match function_block(&out, found.start(), found.end()) {
                Some((start, end)) => {
                    out = comment_out(&out, start, end);
                    debug!("Commented out function {}", name);
                }
                None => break,
            }
        }
        out
    }

    /// Heuristic fixes for sources that failed validation
    ///
    /// Wraps a source without a module declaration, fills a missing address
    /// and rebalances braces. The result still has to be re-validated.
    pub fn repair(
        &self,
        source: &str,
        model: &SourceModel,
        options: &CustomizationOptions,
    ) -> String {
        let name = match sanitize_identifier(options.requested_module_name()) {
            n if n.is_empty() => "contract".to_string(),
            n => n,
        };
        let address = options
            .address
            .as_deref()
            .map(normalize_address)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| name.clone());

        let mut out = if model.module_name.is_empty() {
            let body: Vec<String> = source
                .trim()
                .lines()
                .map(|line| {
                    if line.trim().is_empty() {
                        String::new()
                    } else {
                        format!("    {}", line)
                    }
                })
                .collect();
            format!("module {}::{} {{\n{}\n}}\n", address, name, body.join("\n"))
        } else if model.address.is_empty() {
            match HEADER_RE.captures(source).and_then(|c| c.get(2)) {
                Some(m) => {
                    let mut fixed = source.to_string();
                    fixed.insert_str(m.start(), &format!("{}::", address));
                    fixed
                }
                None => source.to_string(),
            }
        } else {
            source.to_string()
        };

        let (open, close) = count_braces(&out);
        if open > close {
            let mut trimmed = out.trim_end().to_string();
            for _ in 0..(open - close) {
                trimmed.push_str("\n}");
            }
            trimmed.push('\n');
            out = trimmed;
        } else if close > open {
            let mut trimmed = out.trim_end().to_string();
            for _ in 0..(close - open) {
                if !trimmed.ends_with('}') {
                    break;
                }
                trimmed.pop();
                trimmed = trimmed.trim_end().to_string();
            }
            trimmed.push('\n');
            out = trimmed;
        }

        out
    }
}

/// Locate a function block: from its line start (including attribute lines)
/// to the end of the line holding the matching closing brace
fn function_block(source: &str, match_start: usize, match_end: usize) -> Option<(usize, usize)> {
    let rest = &source[match_end..];
    let open_rel = rest.find(|c: char| c == '{' || c == ';')?;
    if rest[open_rel..].starts_with(';') {
        // Native or bodiless declaration
        return None;
    }

    let body_start = match_end + open_rel;
    let mut depth = 0usize;
    let mut close = None;
    for (idx, ch) in source[body_start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(body_start + idx);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;

    let mut start = line_start(source, match_start);
    // Pull in attribute lines such as #[view]
    while start > 0 {
        let prev_start = line_start(source, start - 1);
        if source[prev_start..start - 1].trim_start().starts_with("#[") {
            start = prev_start;
        } else {
            break;
        }
    }

    Some((start, line_end(source, close)))
}

fn comment_out(source: &str, start: usize, end: usize) -> String {
    let commented: Vec<String> = source[start..end]
        .split('\n')
        .map(|line| {
            let indent_len = line.len() - line.trim_start().len();
            format!("{}// {}", &line[..indent_len], &line[indent_len..])
        })
        .collect();

    let mut out = String::with_capacity(source.len() + commented.len() * 3);
    out.push_str(&source[..start]);
    out.push_str(&commented.join("\n"));
    out.push_str(&source[end..]);
    out
}
