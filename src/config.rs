//! Effects of `[Configuration]` blocks.
//!
//! A configuration block can rebind the spelling of recognized tokens
//! (`[Name]`), declare custom origin types (`[OriginType]`), and set a
//! few scalar options.  All of these affect lexing and semantic
//! recognition only; they never change what the generator emits for a
//! given tree.
//!
//! Rebindings *extend* the built-in spellings and never replace them:
//! `[Name] { CUSTOM_STYLE: @CSS; }` makes `@CSS` a second way to write
//! `@Style`, while `@Style` keeps working.  Each logical token accepts
//! at most `OPTION_COUNT` alternatives (default 3).

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::ast;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::limits;
use crate::token::{AtTag, Keyword, TokenKind};

/// Which output stream a custom origin type routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginStream {
    Html,
    Css,
    Js,
}

impl OriginStream {
    fn from_tag(tag: &str) -> Option<OriginStream> {
        match tag {
            "@Html" | "Html" => Some(OriginStream::Html),
            "@Style" | "Style" => Some(OriginStream::Css),
            "@JavaScript" | "JavaScript" => Some(OriginStream::Js),
            _ => None,
        }
    }
}

/// Per-compilation configuration, assembled from defaults and any
/// `[Configuration]` blocks in the entry file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the configuration block this was built from, if any.
    pub name: Option<String>,

    /// Base for `[index]` selectors in insert/delete operations.
    pub index_initial_count: usize,

    pub debug_mode: bool,

    /// Cap on `[Name]` alternatives per logical token.
    pub option_count: usize,

    /// Extra spellings for recognized tokens, keyed by spelling.
    rebound: HashMap<String, TokenKind>,

    /// Custom origin-type tags, e.g. `@Vue` routed to the HTML stream.
    origin_types: IndexMap<String, OriginStream>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: None,
            index_initial_count: 0,
            debug_mode: false,
            option_count: limits::DEFAULT_OPTION_COUNT,
            rebound: HashMap::new(),
            origin_types: IndexMap::new(),
        }
    }
}

/// Logical token names accepted in `[Name]` blocks, mapped to the token
/// kind whose spelling they rebind.  Several names map to the same kind
/// (e.g. `CUSTOM_STYLE` and `TEMPLATE_STYLE` both spell `@Style`); the
/// distinction exists so module authors can rebind them independently in
/// the original language, but the lexer only needs the kind.
static LOGICAL_NAMES: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert("CUSTOM_STYLE", TokenKind::At(AtTag::Style));
    m.insert("CUSTOM_ELEMENT", TokenKind::At(AtTag::Element));
    m.insert("CUSTOM_VAR", TokenKind::At(AtTag::Var));
    m.insert("TEMPLATE_STYLE", TokenKind::At(AtTag::Style));
    m.insert("TEMPLATE_ELEMENT", TokenKind::At(AtTag::Element));
    m.insert("TEMPLATE_VAR", TokenKind::At(AtTag::Var));
    m.insert("ORIGIN_HTML", TokenKind::At(AtTag::Html));
    m.insert("ORIGIN_STYLE", TokenKind::At(AtTag::Style));
    m.insert("ORIGIN_JAVASCRIPT", TokenKind::At(AtTag::JavaScript));
    m.insert("IMPORT_HTML", TokenKind::At(AtTag::Html));
    m.insert("IMPORT_STYLE", TokenKind::At(AtTag::Style));
    m.insert("IMPORT_JAVASCRIPT", TokenKind::At(AtTag::JavaScript));
    m.insert("IMPORT_CHTL", TokenKind::At(AtTag::Chtl));
    m.insert("IMPORT_CJMOD", TokenKind::At(AtTag::CJmod));

    m.insert("KEYWORD_TEXT", TokenKind::Keyword(Keyword::Text));
    m.insert("KEYWORD_STYLE", TokenKind::Keyword(Keyword::Style));
    m.insert("KEYWORD_SCRIPT", TokenKind::Keyword(Keyword::Script));
    m.insert("KEYWORD_INHERIT", TokenKind::Keyword(Keyword::Inherit));
    m.insert("KEYWORD_DELETE", TokenKind::Keyword(Keyword::Delete));
    m.insert("KEYWORD_INSERT", TokenKind::Keyword(Keyword::Insert));
    m.insert("KEYWORD_AFTER", TokenKind::Keyword(Keyword::After));
    m.insert("KEYWORD_BEFORE", TokenKind::Keyword(Keyword::Before));
    m.insert("KEYWORD_REPLACE", TokenKind::Keyword(Keyword::Replace));
    m.insert("KEYWORD_FROM", TokenKind::Keyword(Keyword::From));
    m.insert("KEYWORD_AS", TokenKind::Keyword(Keyword::As));
    m.insert("KEYWORD_EXCEPT", TokenKind::Keyword(Keyword::Except));

    m
});

impl Config {
    /// Builds a configuration from the `[Configuration]` blocks found in
    /// a parsed document.  Later blocks win over earlier ones for scalar
    /// options; `[Name]` and `[OriginType]` entries accumulate.
    pub fn from_document(doc: &ast::Document, diagnostics: &Diagnostics) -> Config {
        let mut config = Config::default();

        for node in &doc.children {
            if let ast::Node::Configuration(block) = node {
                config.apply_block(block, &doc.filename, diagnostics);
            }
        }

        config
    }

    pub fn apply_block(&mut self, block: &ast::ConfigBlock, file: &str, diagnostics: &Diagnostics) {
        if let Some(ref name) = block.name {
            self.name = Some(name.clone());
        }

        for option in &block.options {
            match option.key.as_str() {
                "INDEX_INITIAL_COUNT" => {
                    if let Ok(n) = option.value.parse::<usize>() {
                        self.index_initial_count = n;
                    }
                }
                "DEBUG_MODE" => {
                    self.debug_mode = option.value == "true" || option.value == "1";
                }
                "OPTION_COUNT" => {
                    if let Ok(n) = option.value.parse::<usize>() {
                        self.option_count = n;
                    }
                }
                other => {
                    diagnostics.warning(
                        DiagnosticKind::MalformedDefinition,
                        file,
                        option.pos,
                        format!("unrecognized configuration option '{other}'"),
                    );
                }
            }
        }

        for entry in &block.name_entries {
            let Some(&kind) = LOGICAL_NAMES.get(entry.key.as_str()) else {
                diagnostics.warning(
                    DiagnosticKind::MalformedDefinition,
                    file,
                    entry.pos,
                    format!("unrecognized [Name] token '{}'", entry.key),
                );
                continue;
            };

            if entry.spellings.len() > self.option_count {
                diagnostics.error(
                    DiagnosticKind::MalformedDefinition,
                    file,
                    entry.pos,
                    format!(
                        "[Name] entry '{}' declares {} spellings, the limit is {}",
                        entry.key,
                        entry.spellings.len(),
                        self.option_count
                    ),
                );
                continue;
            }

            for spelling in &entry.spellings {
                self.rebound.insert(spelling.clone(), kind);
            }
        }

        for entry in &block.origin_entries {
            let tag = entry.key.trim_start_matches('@').to_string();
            let stream = OriginStream::from_tag(&entry.value).unwrap_or(OriginStream::Html);
            self.origin_types.insert(tag, stream);
        }
    }

    /// The token kind a rebound spelling resolves to, if any.
    pub fn rebound_kind(&self, spelling: &str) -> Option<TokenKind> {
        self.rebound.get(spelling).copied()
    }

    /// The output stream configured for a custom origin type.
    pub fn origin_stream(&self, tag: &str) -> Option<OriginStream> {
        self.origin_types.get(tag).copied()
    }

    pub fn has_rebindings(&self) -> bool {
        !self.rebound.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ConfigBlock, ConfigOption, NameEntry};
    use crate::token::Position;

    fn block_with_name_entry(key: &str, spellings: &[&str]) -> ConfigBlock {
        ConfigBlock {
            name: None,
            options: vec![],
            name_entries: vec![NameEntry {
                key: key.to_string(),
                spellings: spellings.iter().map(|s| s.to_string()).collect(),
                pos: Position::default(),
            }],
            origin_entries: vec![],
            pos: Position::default(),
        }
    }

    #[test]
    fn name_rebinding_extends_spellings() {
        let diag = Diagnostics::new();
        let mut config = Config::default();
        config.apply_block(
            &block_with_name_entry("CUSTOM_STYLE", &["@CSS", "@css"]),
            "test.chtl",
            &diag,
        );

        assert_eq!(
            config.rebound_kind("@CSS"),
            Some(TokenKind::At(AtTag::Style))
        );
        assert_eq!(
            config.rebound_kind("@css"),
            Some(TokenKind::At(AtTag::Style))
        );
        assert_eq!(config.rebound_kind("@Nope"), None);
        assert!(diag.is_empty());
    }

    #[test]
    fn name_rebinding_respects_option_count() {
        let diag = Diagnostics::new();
        let mut config = Config::default();
        config.apply_block(
            &block_with_name_entry("CUSTOM_STYLE", &["@a", "@b", "@c", "@d"]),
            "test.chtl",
            &diag,
        );

        assert_eq!(config.rebound_kind("@a"), None);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn scalar_options_apply() {
        let diag = Diagnostics::new();
        let mut config = Config::default();
        let block = ConfigBlock {
            name: Some("Release".to_string()),
            options: vec![
                ConfigOption {
                    key: "INDEX_INITIAL_COUNT".to_string(),
                    value: "1".to_string(),
                    pos: Position::default(),
                },
                ConfigOption {
                    key: "DEBUG_MODE".to_string(),
                    value: "true".to_string(),
                    pos: Position::default(),
                },
            ],
            name_entries: vec![],
            origin_entries: vec![],
            pos: Position::default(),
        };
        config.apply_block(&block, "test.chtl", &diag);

        assert_eq!(config.index_initial_count, 1);
        assert!(config.debug_mode);
        assert_eq!(config.name.as_deref(), Some("Release"));
    }
}
