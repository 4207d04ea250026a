//! Namespaces and symbol tables.
//!
//! A namespace owns its child namespaces and a symbol table keyed by
//! `(name, kind)`.  Within one namespace that key is unique — the
//! registration path refuses duplicates, citing the prior definition
//! site.  Two same-named namespaces merge iff no pair of symbols
//! collides; conflicts are collected per symbol and the merge is
//! rejected as a whole if any exist.
//!
//! Symbol tables use `IndexMap` so iteration follows insertion order;
//! this is what makes generated output and diagnostics deterministic
//! between runs.

use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

use crate::ast;
use crate::token::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    TemplateStyle,
    TemplateElement,
    TemplateVar,
    CustomStyle,
    CustomElement,
    CustomVar,
    OriginHtml,
    OriginStyle,
    OriginJavascript,
    Namespace,
}

impl SymbolKind {
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::TemplateStyle => "[Template] @Style",
            SymbolKind::TemplateElement => "[Template] @Element",
            SymbolKind::TemplateVar => "[Template] @Var",
            SymbolKind::CustomStyle => "[Custom] @Style",
            SymbolKind::CustomElement => "[Custom] @Element",
            SymbolKind::CustomVar => "[Custom] @Var",
            SymbolKind::OriginHtml => "[Origin] @Html",
            SymbolKind::OriginStyle => "[Origin] @Style",
            SymbolKind::OriginJavascript => "[Origin] @JavaScript",
            SymbolKind::Namespace => "[Namespace]",
        }
    }

    pub fn of_template(kind: ast::DefKind) -> SymbolKind {
        match kind {
            ast::DefKind::Style => SymbolKind::TemplateStyle,
            ast::DefKind::Element => SymbolKind::TemplateElement,
            ast::DefKind::Var => SymbolKind::TemplateVar,
        }
    }

    pub fn of_custom(kind: ast::DefKind) -> SymbolKind {
        match kind {
            ast::DefKind::Style => SymbolKind::CustomStyle,
            ast::DefKind::Element => SymbolKind::CustomElement,
            ast::DefKind::Var => SymbolKind::CustomVar,
        }
    }

    pub fn of_origin(origin_type: &ast::OriginType) -> SymbolKind {
        match origin_type {
            ast::OriginType::Style => SymbolKind::OriginStyle,
            ast::OriginType::JavaScript => SymbolKind::OriginJavascript,
            // Custom origin types key like HTML; their routing is a
            // generator concern.
            ast::OriginType::Html | ast::OriginType::Custom(_) => SymbolKind::OriginHtml,
        }
    }
}

/// The definition a symbol points at.  Shared, not cloned: a template
/// referenced from many expansion sites is still one definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Template(ast::Template),
    Custom(ast::Custom),
    Origin(ast::Origin),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub qualified_name: String,
    pub source_file: String,
    pub pos: Position,
    pub definition: Rc<Definition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SymbolKey {
    name: String,
    kind: SymbolKind,
}

/// A symbol conflict found while registering or merging.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub name: String,
    pub kind: SymbolKind,
    pub existing_file: String,
    pub existing_pos: Position,
    pub incoming_file: String,
    pub incoming_pos: Position,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' is already defined at {}:{}",
            self.kind.describe(),
            self.name,
            self.existing_file,
            self.existing_pos
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub name: String,
    children: IndexMap<String, Namespace>,
    symbols: IndexMap<SymbolKey, Symbol>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Namespace {
        Namespace {
            name: name.into(),
            children: IndexMap::new(),
            symbols: IndexMap::new(),
        }
    }

    /// Registers a symbol; on a `(name, kind)` collision the existing
    /// symbol wins and the conflict is returned.
    pub fn register(&mut self, symbol: Symbol) -> Result<(), Conflict> {
        let key = SymbolKey {
            name: symbol.name.clone(),
            kind: symbol.kind,
        };

        if let Some(existing) = self.symbols.get(&key) {
            return Err(Conflict {
                name: symbol.name,
                kind: symbol.kind,
                existing_file: existing.source_file.clone(),
                existing_pos: existing.pos,
                incoming_file: symbol.source_file,
                incoming_pos: symbol.pos,
            });
        }

        self.symbols.insert(key, symbol);
        Ok(())
    }

    pub fn lookup(&self, name: &str, kind: SymbolKind) -> Option<&Symbol> {
        self.symbols.get(&SymbolKey {
            name: name.to_string(),
            kind,
        })
    }

    /// Looks a name up under several kinds, first kind wins.  The
    /// usual call sites try the custom kind before the template kind,
    /// since a custom may shadow nothing but is the more specific
    /// definition.
    pub fn lookup_any(&self, name: &str, kinds: &[SymbolKind]) -> Option<&Symbol> {
        kinds.iter().find_map(|&k| self.lookup(name, k))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn child(&self, name: &str) -> Option<&Namespace> {
        self.children.get(name)
    }

    pub fn child_mut_or_insert(&mut self, name: &str) -> &mut Namespace {
        self.children
            .entry(name.to_string())
            .or_insert_with(|| Namespace::new(name))
    }

    pub fn children(&self) -> impl Iterator<Item = &Namespace> {
        self.children.values()
    }

    /// Resolves a `::`-separated path to a descendant namespace.
    pub fn resolve_path(&self, path: &str) -> Option<&Namespace> {
        let mut current = self;
        for part in path.split("::").filter(|p| !p.is_empty()) {
            current = current.child(part)?;
        }
        Some(current)
    }

    /// Checks whether `other` could merge into `self` without symbol
    /// conflicts; returns every conflict found (empty means mergeable).
    pub fn merge_conflicts(&self, other: &Namespace) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        for (key, incoming) in &other.symbols {
            if let Some(existing) = self.symbols.get(key) {
                conflicts.push(Conflict {
                    name: key.name.clone(),
                    kind: key.kind,
                    existing_file: existing.source_file.clone(),
                    existing_pos: existing.pos,
                    incoming_file: incoming.source_file.clone(),
                    incoming_pos: incoming.pos,
                });
            }
        }

        for (name, incoming_child) in &other.children {
            if let Some(existing_child) = self.children.get(name) {
                conflicts.extend(existing_child.merge_conflicts(incoming_child));
            }
        }

        conflicts
    }

    /// Merges `other` into `self`.  All-or-nothing: if any symbol
    /// collides the merge is rejected and the conflicts returned.
    pub fn merge(&mut self, other: Namespace) -> Result<(), Vec<Conflict>> {
        let conflicts = self.merge_conflicts(&other);
        if !conflicts.is_empty() {
            return Err(conflicts);
        }

        for (key, symbol) in other.symbols {
            self.symbols.insert(key, symbol);
        }
        for (name, child) in other.children {
            match self.children.get_mut(&name) {
                Some(existing) => {
                    // Conflict-free by the check above.
                    let _ = existing.merge(child);
                }
                None => {
                    self.children.insert(name, child);
                }
            }
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.children.is_empty()
    }
}

/// Joins namespace path segments into a fully-qualified name.
pub fn qualify(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", path.join("::"), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, kind: SymbolKind, file: &str) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind,
            qualified_name: name.to_string(),
            source_file: file.to_string(),
            pos: Position::default(),
            definition: Rc::new(Definition::Origin(ast::Origin {
                origin_type: ast::OriginType::Html,
                name: Some(name.to_string()),
                content: String::new(),
                is_reference: false,
                pos: Position::default(),
            })),
        }
    }

    #[test]
    fn same_name_different_kind_coexist() {
        let mut ns = Namespace::new("");
        ns.register(symbol("Card", SymbolKind::TemplateStyle, "a.chtl"))
            .unwrap();
        ns.register(symbol("Card", SymbolKind::TemplateElement, "a.chtl"))
            .unwrap();

        assert!(ns.lookup("Card", SymbolKind::TemplateStyle).is_some());
        assert!(ns.lookup("Card", SymbolKind::TemplateElement).is_some());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut ns = Namespace::new("");
        ns.register(symbol("Card", SymbolKind::TemplateStyle, "a.chtl"))
            .unwrap();
        let err = ns
            .register(symbol("Card", SymbolKind::TemplateStyle, "b.chtl"))
            .unwrap_err();

        assert_eq!(err.existing_file, "a.chtl");
        assert_eq!(err.incoming_file, "b.chtl");
    }

    #[test]
    fn merge_succeeds_without_conflicts() {
        let mut a = Namespace::new("space");
        a.register(symbol("A", SymbolKind::TemplateStyle, "a.chtl"))
            .unwrap();

        let mut b = Namespace::new("space");
        b.register(symbol("B", SymbolKind::TemplateStyle, "b.chtl"))
            .unwrap();

        a.merge(b).unwrap();
        assert!(a.lookup("A", SymbolKind::TemplateStyle).is_some());
        assert!(a.lookup("B", SymbolKind::TemplateStyle).is_some());
    }

    #[test]
    fn merge_rejects_and_reports_each_conflict() {
        let mut a = Namespace::new("space");
        a.register(symbol("A", SymbolKind::TemplateStyle, "a.chtl"))
            .unwrap();
        a.register(symbol("B", SymbolKind::CustomVar, "a.chtl"))
            .unwrap();

        let mut b = Namespace::new("space");
        b.register(symbol("A", SymbolKind::TemplateStyle, "b.chtl"))
            .unwrap();
        b.register(symbol("B", SymbolKind::CustomVar, "b.chtl"))
            .unwrap();
        b.register(symbol("C", SymbolKind::TemplateStyle, "b.chtl"))
            .unwrap();

        let conflicts = a.merge(b).unwrap_err();
        assert_eq!(conflicts.len(), 2);
        // Rejected merge leaves the target untouched.
        assert!(a.lookup("C", SymbolKind::TemplateStyle).is_none());
    }

    #[test]
    fn resolve_nested_path() {
        let mut root = Namespace::new("");
        root.child_mut_or_insert("ui")
            .child_mut_or_insert("widgets")
            .register(symbol("Box", SymbolKind::CustomElement, "ui.chtl"))
            .unwrap();

        let ns = root.resolve_path("ui::widgets").unwrap();
        assert!(ns.lookup("Box", SymbolKind::CustomElement).is_some());
        assert!(root.resolve_path("ui::missing").is_none());
    }

    #[test]
    fn qualify_joins_path() {
        assert_eq!(qualify(&[], "Card"), "Card");
        assert_eq!(
            qualify(&["ui".to_string(), "widgets".to_string()], "Card"),
            "ui::widgets::Card"
        );
    }
}
