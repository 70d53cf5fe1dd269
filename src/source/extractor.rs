//! Regex-driven structural scanner for Move sources
//!
//! Extraction rules are independent of one another; each scans the whole
//! text. Malformed input yields an invalid model with diagnostics, never an
//! error.

use super::models::SourceModel;
use super::validator::SourceValidator;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static MODULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bmodule\s+([A-Za-z0-9_]+(?:::[A-Za-z_][A-Za-z0-9_]*)?)\s*\{")
        .expect("MODULE_RE should compile")
});

static ADDRESS_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\baddress\s+([A-Za-z0-9_]+)\s*\{").expect("ADDRESS_BLOCK_RE should compile")
});

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*use\s+([A-Za-z0-9_]+(?:::[A-Za-z0-9_]+)*)(?:::\{[^}]*\})?\s*(?:as\s+[A-Za-z0-9_]+\s*)?;",
    )
    .expect("IMPORT_RE should compile")
});

static STRUCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bstruct\s+([A-Za-z_][A-Za-z0-9_]*)[^{;]*\{").expect("STRUCT_RE should compile")
});

static FUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:public(?:\s*\([a-z]+\))?\s+)?(?:entry\s+)?(?:inline\s+)?fun\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("FUN_RE should compile")
});

static EVENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#\[event\]\s*(?:public\s+)?struct\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("EVENT_RE should compile")
});

static ERROR_CONST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bconst\s+([A-Z][A-Z0-9_]*)\s*:\s*u64\s*=\s*(\d+)\s*;")
        .expect("ERROR_CONST_RE should compile")
});

/// Scans source text into a [`SourceModel`]
#[derive(Debug, Clone, Default)]
pub struct SourceModelExtractor {
    validator: SourceValidator,
}

impl SourceModelExtractor {
    pub fn new(validator: SourceValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &SourceValidator {
        &self.validator
    }

    /// Scan and validate
    pub fn extract_model(&self, source: &str) -> SourceModel {
        let model = self.scan(source);
        let model = self.validator.apply(model, source);
        debug!("Extracted {}", model.summary());
        model
    }

    /// Scan only; the result is not yet validated
    ///
    /// Without a module header nothing else is scanned, so the model of
    /// such a source is empty apart from its diagnostics.
    pub fn scan(&self, source: &str) -> SourceModel {
        let mut model = SourceModel::default();

        let Some(caps) = MODULE_RE.captures(source) else {
            return model;
        };
        let ident = &caps[1];
        match ident.split_once("::") {
            Some((address, name)) => {
                model.address = address.to_string();
                model.module_name = name.to_string();
            }
            None => {
                model.module_name = ident.to_string();
                // Legacy `address x { module m { ... } }` layout
                if let Some(block) = ADDRESS_BLOCK_RE.captures(source) {
                    model.address = block[1].to_string();
                }
            }
        }

        for caps in IMPORT_RE.captures_iter(source) {
            let path = caps[1].to_string();
            if let Some(root) = path.split("::").next() {
                if !model.dependencies.iter().any(|d| d == root) {
                    model.dependencies.push(root.to_string());
                }
            }
            model.imports.push(path);
        }

        model.structs = STRUCT_RE
            .captures_iter(source)
            .map(|caps| caps[1].to_string())
            .collect();

        model.functions = FUN_RE
            .captures_iter(source)
            .map(|caps| caps[1].to_string())
            .collect();

        model.events = EVENT_RE
            .captures_iter(source)
            .map(|caps| caps[1].to_string())
            .collect();

        for caps in ERROR_CONST_RE.captures_iter(source) {
            if let Ok(code) = caps[2].parse::<u64>() {
                model.error_codes.insert(caps[1].to_string(), code);
            }
        }

        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = r#"
module 0xcafe::counter {
    use std::signer;
    use aptos_framework::event::{Self, EventHandle};
    use aptos_framework::account;

    const E_NOT_INITIALIZED: u64 = 1;
    const E_ALREADY_EXISTS: u64 = 2;

    struct Counter has key {
        value: u64,
    }

    #[event]
    struct Incremented has drop, store {
        value: u64,
    }

    public entry fun initialize(account: &signer) {
        move_to(account, Counter { value: 0 });
    }

    public fun value(addr: address): u64 acquires Counter {
        borrow_global<Counter>(addr).value
    }

    fun bump(counter: &mut Counter) {
        counter.value = counter.value + 1;
    }
}
"#;

    #[test]
    fn test_extracts_structure() {
        let model = SourceModelExtractor::default().extract_model(COUNTER);

        assert_eq!(model.address, "0xcafe");
        assert_eq!(model.module_name, "counter");
        assert_eq!(
            model.imports,
            vec!["std::signer", "aptos_framework::event", "aptos_framework::account"]
        );
        assert_eq!(model.dependencies, vec!["std", "aptos_framework"]);
        assert_eq!(model.structs, vec!["Counter", "Incremented"]);
        assert_eq!(model.events, vec!["Incremented"]);
        assert_eq!(model.functions, vec!["initialize", "value", "bump"]);
        assert_eq!(model.error_codes.get("E_NOT_INITIALIZED"), Some(&1));
        assert_eq!(model.error_codes.get("E_ALREADY_EXISTS"), Some(&2));
        assert!(model.is_valid, "diagnostics: {:?}", model.diagnostics);
    }

    #[test]
    fn test_missing_module_declaration() {
        let source = "fun orphan() { }\n";
        let model = SourceModelExtractor::default().extract_model(source);

        assert!(!model.is_valid);
        assert!(model
            .diagnostics
            .iter()
            .any(|d| d == "Missing module declaration"));
        assert!(model.module_name.is_empty());
        assert!(model.functions.is_empty());
    }

    #[test]
    fn test_headerless_source_yields_no_structure() {
        let source = "use std::signer;\n\nstruct Ticket has key { id: u64 }\n\npublic entry fun mint(s: &signer) {\n    let _ = signer::address_of(s);\n}\n";
        let model = SourceModelExtractor::default().extract_model(source);

        assert!(!model.is_valid);
        assert!(model.diagnostics.contains(&"Missing module declaration".to_string()));
        assert!(model.functions.is_empty());
        assert!(model.structs.is_empty());
        assert!(model.imports.is_empty());
    }

    #[test]
    fn test_legacy_address_block() {
        let source = r#"
address 0x42 {
    module vault {
        use std::signer;
        public fun open(s: &signer) { let _ = signer::address_of(s); }
    }
}
"#;
        let model = SourceModelExtractor::default().extract_model(source);
        assert_eq!(model.address, "0x42");
        assert_eq!(model.module_name, "vault");
        assert!(model.is_valid);
    }

    #[test]
    fn test_commented_function_is_ignored() {
        let source = "module 0x1::m {\n    // public fun hidden() {\n    // }\n    fun shown() {}\n}\n";
        let model = SourceModelExtractor::default().scan(source);
        assert_eq!(model.functions, vec!["shown"]);
    }

    #[test]
    fn test_friend_visibility() {
        let source = "module 0x1::m {\n    public(friend) fun internal_op() {}\n}\n";
        let model = SourceModelExtractor::default().scan(source);
        assert_eq!(model.functions, vec!["internal_op"]);
    }
}
