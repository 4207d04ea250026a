//! Compile-time expansion of templates and customs.
//!
//! Style references resolve depth-first: inherited bases contribute
//! their properties first, the definition's own declarations override,
//! and the use site's specialization (`delete`, overrides) applies
//! last.  Inheritance cycles are reported, not followed.  Element
//! references inline the definition's children and then apply
//! `insert` / `delete` / per-child specializations in source order.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{
    ChildSelector, Custom, DefBody, Delete, DeleteTarget, ElementReference, Insert, InsertPosition,
    Node, StyleDefBody, StyleReference, VarUse,
};
use crate::error::{DiagnosticKind, Diagnostics};
use crate::limits;
use crate::namespace::{Definition, Namespace, Symbol, SymbolKind};
use crate::token::Position;

/// Lookup orders: the custom kind is the more specific definition and
/// wins over the template kind of the same name.
pub const STYLE_KINDS: [SymbolKind; 2] = [SymbolKind::CustomStyle, SymbolKind::TemplateStyle];
pub const ELEMENT_KINDS: [SymbolKind; 2] = [SymbolKind::CustomElement, SymbolKind::TemplateElement];
pub const VAR_KINDS: [SymbolKind; 2] = [SymbolKind::CustomVar, SymbolKind::TemplateVar];

pub struct ExpansionContext<'a> {
    pub namespace: &'a Namespace,
    pub file: String,
    pub diagnostics: Diagnostics,

    /// Base for `[index]` selectors, from `INDEX_INITIAL_COUNT`.
    pub index_base: usize,
}

impl<'a> ExpansionContext<'a> {
    /// Resolves a possibly namespace-qualified name.
    pub fn lookup(
        &self,
        from: Option<&str>,
        name: &str,
        kinds: &[SymbolKind],
    ) -> Option<&'a Symbol> {
        let namespace = match from {
            Some(path) => self.namespace.resolve_path(path)?,
            None => self.namespace,
        };
        namespace.lookup_any(name, kinds)
    }

    fn unknown_symbol(&self, what: &str, name: &str, from: Option<&str>, pos: Position) {
        let suffix = from
            .map(|f| format!(" in namespace '{f}'"))
            .unwrap_or_default();
        self.diagnostics.error(
            DiagnosticKind::UnknownSymbol,
            &self.file,
            pos,
            format!("unknown {what} '{name}'{suffix}"),
        );
    }
}

/// Ordered property set; an override keeps the property's original
/// position, so reordering references that touch disjoint sets cannot
/// change the result.
pub type PropertySet = IndexMap<String, Option<String>>;

fn style_parts(definition: &Definition) -> Option<(&StyleDefBody, &[Delete])> {
    match definition {
        Definition::Template(t) => match &t.body {
            DefBody::Style(body) => Some((body, &[])),
            _ => None,
        },
        Definition::Custom(c) => match &c.body {
            DefBody::Style(body) => Some((body, &c.deletes)),
            _ => None,
        },
        Definition::Origin(_) => None,
    }
}

/// Resolves a use-site style reference to its final property list.
/// Value-less slots the use site did not fill are dropped with a
/// diagnostic.
pub fn resolve_style_reference(
    cx: &ExpansionContext<'_>,
    reference: &StyleReference,
) -> Vec<(String, String)> {
    let Some(symbol) = cx.lookup(
        reference.namespace.as_deref(),
        &reference.name,
        &STYLE_KINDS,
    ) else {
        cx.unknown_symbol(
            "style definition",
            &reference.name,
            reference.namespace.as_deref(),
            reference.pos,
        );
        return Vec::new();
    };

    let mut properties = PropertySet::new();
    let mut visited = Vec::new();
    collect_style(
        cx,
        symbol,
        &reference.deleted_inheritance,
        &mut properties,
        &mut visited,
        0,
        reference.pos,
    );

    for deleted in &reference.deleted_properties {
        properties.shift_remove(deleted);
    }

    for declaration in &reference.overrides {
        if let Some(ref value) = declaration.value {
            properties.insert(declaration.property.clone(), Some(value.clone()));
        }
    }

    let mut resolved = Vec::new();
    for (property, value) in properties {
        match value {
            Some(v) => resolved.push((property, v)),
            None => {
                cx.diagnostics.error(
                    DiagnosticKind::UnfilledValueSlot,
                    &cx.file,
                    reference.pos,
                    format!(
                        "'{}' leaves '{}' value-less; the use site must supply a value",
                        reference.name, property
                    ),
                );
            }
        }
    }
    resolved
}

fn collect_style(
    cx: &ExpansionContext<'_>,
    symbol: &Symbol,
    skip_bases: &[String],
    properties: &mut PropertySet,
    visited: &mut Vec<String>,
    depth: usize,
    use_pos: Position,
) {
    if depth > limits::MAX_EXPANSION_DEPTH {
        cx.diagnostics.error(
            DiagnosticKind::CyclicInheritance,
            &cx.file,
            use_pos,
            crate::error::ImplementationLimit::ExpansionTooDeep.to_string(),
        );
        return;
    }
    if visited.iter().any(|v| v == &symbol.qualified_name) {
        cx.diagnostics.error(
            DiagnosticKind::CyclicInheritance,
            &cx.file,
            use_pos,
            format!(
                "cyclic style inheritance: {} -> {}",
                visited.join(" -> "),
                symbol.qualified_name
            ),
        );
        return;
    }
    visited.push(symbol.qualified_name.clone());

    let Some((body, definition_deletes)) = style_parts(&symbol.definition) else {
        visited.pop();
        return;
    };

    // Inherited bases first, depth-first: the body's references, then
    // any explicit `inherit` statements.
    let explicit: Vec<StyleReference> = match &*symbol.definition {
        Definition::Template(t) => t
            .inherits
            .iter()
            .map(|i| StyleReference::new(i.name.clone(), i.pos))
            .collect(),
        Definition::Custom(c) => c
            .inherits
            .iter()
            .map(|i| StyleReference::new(i.name.clone(), i.pos))
            .collect(),
        Definition::Origin(_) => Vec::new(),
    };

    // A custom may drop an inherited base at its definition site with
    // `delete @Style Base;`.
    let definition_skips: Vec<&String> = definition_deletes
        .iter()
        .flat_map(|d| d.targets.iter())
        .filter_map(|t| match t {
            DeleteTarget::Inheritance(_, name) => Some(name),
            _ => None,
        })
        .collect();

    for base in body.references.iter().chain(explicit.iter()) {
        if depth == 0 && skip_bases.iter().any(|s| s == &base.name) {
            continue;
        }
        if definition_skips.iter().any(|s| *s == &base.name) {
            continue;
        }

        let Some(base_symbol) = cx.lookup(base.namespace.as_deref(), &base.name, &STYLE_KINDS)
        else {
            cx.unknown_symbol(
                "style definition",
                &base.name,
                base.namespace.as_deref(),
                base.pos,
            );
            continue;
        };

        collect_style(
            cx,
            base_symbol,
            &[],
            properties,
            visited,
            depth + 1,
            base.pos,
        );

        // The base reference may itself specialize.
        for deleted in &base.deleted_properties {
            properties.shift_remove(deleted);
        }
        for declaration in &base.overrides {
            if let Some(ref value) = declaration.value {
                properties.insert(declaration.property.clone(), Some(value.clone()));
            }
        }
    }

    // Own declarations override whatever inheritance produced.
    for declaration in &body.declarations {
        properties.insert(declaration.property.clone(), declaration.value.clone());
    }

    // A custom's definition-site deletes prune the inherited result.
    for delete in definition_deletes {
        for target in &delete.targets {
            if let DeleteTarget::Property(name) = target {
                properties.shift_remove(name);
            }
        }
    }

    visited.pop();
}

/// Resolves a use-site element reference to the nodes it expands to.
pub fn expand_element_reference(
    cx: &ExpansionContext<'_>,
    reference: &ElementReference,
) -> Vec<Node> {
    let Some(symbol) = cx.lookup(
        reference.namespace.as_deref(),
        &reference.name,
        &ELEMENT_KINDS,
    ) else {
        cx.unknown_symbol(
            "element definition",
            &reference.name,
            reference.namespace.as_deref(),
            reference.pos,
        );
        return Vec::new();
    };

    let mut nodes = expand_element_definition(cx, symbol, &mut Vec::new(), 0, reference.pos);

    // Use-site operations, in source order.
    for delete in &reference.deletes {
        apply_delete(cx, &mut nodes, delete);
    }
    for insert in &reference.inserts {
        apply_insert(cx, &mut nodes, insert);
    }
    for specialization in &reference.specializations {
        let Some(index) = find_child(&nodes, &specialization.selector, cx.index_base) else {
            cx.diagnostics.error(
                DiagnosticKind::UnknownSymbol,
                &cx.file,
                specialization.pos,
                format!(
                    "'{}' has no child matching '{}'",
                    reference.name,
                    selector_display(&specialization.selector)
                ),
            );
            continue;
        };
        if let Node::Element(target) = &mut nodes[index] {
            merge_specialization(target, &specialization.element);
        }
    }

    nodes
}

fn expand_element_definition(
    cx: &ExpansionContext<'_>,
    symbol: &Symbol,
    visited: &mut Vec<String>,
    depth: usize,
    use_pos: Position,
) -> Vec<Node> {
    if depth > limits::MAX_EXPANSION_DEPTH {
        cx.diagnostics.error(
            DiagnosticKind::CyclicInheritance,
            &cx.file,
            use_pos,
            crate::error::ImplementationLimit::ExpansionTooDeep.to_string(),
        );
        return Vec::new();
    }
    if visited.iter().any(|v| v == &symbol.qualified_name) {
        cx.diagnostics.error(
            DiagnosticKind::CyclicInheritance,
            &cx.file,
            use_pos,
            format!(
                "cyclic element inheritance: {} -> {}",
                visited.join(" -> "),
                symbol.qualified_name
            ),
        );
        return Vec::new();
    }
    visited.push(symbol.qualified_name.clone());

    let mut nodes = Vec::new();

    match &*symbol.definition {
        Definition::Template(t) => {
            if let DefBody::Element(children) = &t.body {
                nodes.extend(children.iter().cloned());
            }
        }
        Definition::Custom(custom) => {
            nodes = expand_custom_element(cx, custom, visited, depth, use_pos);
        }
        Definition::Origin(_) => {}
    }

    visited.pop();
    nodes
}

fn expand_custom_element(
    cx: &ExpansionContext<'_>,
    custom: &Custom,
    visited: &mut Vec<String>,
    depth: usize,
    use_pos: Position,
) -> Vec<Node> {
    let mut nodes = Vec::new();

    // Inherited bases contribute their children first.
    for inherit in &custom.inherits {
        let kinds = if inherit.is_template {
            [SymbolKind::TemplateElement, SymbolKind::CustomElement]
        } else {
            [SymbolKind::CustomElement, SymbolKind::TemplateElement]
        };
        let Some(base) = cx.lookup(None, &inherit.name, &kinds) else {
            cx.unknown_symbol("element definition", &inherit.name, None, inherit.pos);
            continue;
        };
        nodes.extend(expand_element_definition(
            cx,
            base,
            visited,
            depth + 1,
            inherit.pos,
        ));
    }

    if let DefBody::Element(children) = &custom.body {
        nodes.extend(children.iter().cloned());
    }

    // Definition-site specialization of the inherited content.
    for delete in &custom.deletes {
        apply_delete(cx, &mut nodes, delete);
    }
    for insert in &custom.inserts {
        apply_insert(cx, &mut nodes, insert);
    }

    nodes
}

fn selector_display(selector: &ChildSelector) -> String {
    match selector.index {
        Some(i) => format!("{}[{}]", selector.name, i),
        None => selector.name.clone(),
    }
}

/// Finds the n-th child element matching the selector; `index` counts
/// matches only, adjusted by the configured base.
fn find_child(nodes: &[Node], selector: &ChildSelector, index_base: usize) -> Option<usize> {
    let wanted = selector.index.map(|i| i.saturating_sub(index_base));
    let mut seen = 0;

    for (position, node) in nodes.iter().enumerate() {
        let Node::Element(element) = node else {
            continue;
        };
        if element.tag != selector.name {
            continue;
        }
        match wanted {
            None => return Some(position),
            Some(w) if seen == w => return Some(position),
            _ => seen += 1,
        }
    }
    None
}

pub(super) fn apply_insert(cx: &ExpansionContext<'_>, nodes: &mut Vec<Node>, insert: &Insert) {
    let content = insert.content.clone();

    match insert.position {
        InsertPosition::AtTop => {
            nodes.splice(0..0, content);
        }
        InsertPosition::AtBottom => {
            nodes.extend(content);
        }
        InsertPosition::After | InsertPosition::Before | InsertPosition::Replace => {
            let Some(selector) = insert.target.as_ref() else {
                return;
            };
            let Some(index) = find_child(nodes, selector, cx.index_base) else {
                cx.diagnostics.error(
                    DiagnosticKind::UnknownSymbol,
                    &cx.file,
                    insert.pos,
                    format!("no child matches '{}'", selector_display(selector)),
                );
                return;
            };
            match insert.position {
                InsertPosition::After => {
                    nodes.splice(index + 1..index + 1, content);
                }
                InsertPosition::Before => {
                    nodes.splice(index..index, content);
                }
                InsertPosition::Replace => {
                    nodes.splice(index..index + 1, content);
                }
                _ => unreachable!(),
            }
        }
    }
}

pub(super) fn apply_delete(cx: &ExpansionContext<'_>, nodes: &mut Vec<Node>, delete: &Delete) {
    for target in &delete.targets {
        match target {
            DeleteTarget::Element(selector) => match selector.index {
                Some(_) => {
                    if let Some(index) = find_child(nodes, selector, cx.index_base) {
                        nodes.remove(index);
                    } else {
                        cx.diagnostics.error(
                            DiagnosticKind::UnknownSymbol,
                            &cx.file,
                            delete.pos,
                            format!("no child matches '{}'", selector_display(selector)),
                        );
                    }
                }
                None => {
                    nodes.retain(|n| !matches!(n, Node::Element(e) if e.tag == selector.name));
                }
            },
            DeleteTarget::ElementRef(name) => {
                nodes.retain(|n| !matches!(n, Node::ElementRef(r) if &r.name == name));
            }
            DeleteTarget::StyleRef(name) => {
                for node in nodes.iter_mut() {
                    if let Node::Element(element) = node {
                        if let Some(ref mut style) = element.style {
                            style.references.retain(|r| &r.name != name);
                        }
                    }
                }
            }
            // Property/inheritance targets belong to style bodies and
            // are handled during style collection.
            DeleteTarget::Property(_) | DeleteTarget::Inheritance(..) => {}
        }
    }
}

/// Merges a use-site specialization payload into the matched child.
fn merge_specialization(target: &mut crate::ast::Element, payload: &crate::ast::Element) {
    for attribute in &payload.attributes {
        match target
            .attributes
            .iter_mut()
            .find(|a| a.name == attribute.name)
        {
            Some(existing) => *existing = attribute.clone(),
            None => target.attributes.push(attribute.clone()),
        }
    }

    match (&mut target.style, &payload.style) {
        (Some(existing), Some(incoming)) => {
            existing.inline.extend(incoming.inline.iter().cloned());
            existing.rules.extend(incoming.rules.iter().cloned());
            existing
                .references
                .extend(incoming.references.iter().cloned());
            existing.var_uses.extend(incoming.var_uses.iter().cloned());
            existing
                .auto_classes
                .extend(incoming.auto_classes.iter().cloned());
            existing.auto_ids.extend(incoming.auto_ids.iter().cloned());
        }
        (None, Some(incoming)) => target.style = Some(incoming.clone()),
        _ => {}
    }

    if payload.script.is_some() {
        target.script = payload.script.clone();
    }

    target.children.extend(payload.children.iter().cloned());
}

static VAR_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b([A-Za-z_][A-Za-z0-9_]*)       # group name
        \(\s*([A-Za-z_][A-Za-z0-9_-]*)\s*\)  # member
        (\s+from\s+[A-Za-z_][A-Za-z0-9_:.]*)?  # optional namespace
        ",
    )
    .expect("known-good regex")
});

/// Substitutes `Group(member)` variable calls inside a value.
///
/// Only names that resolve to a registered variable group are
/// substituted — `rgb(255)` stays untouched because `rgb` is not a
/// group.  Per-scope `@Var` overrides win over the group's own value.
pub fn resolve_var_calls(cx: &ExpansionContext<'_>, text: &str, scope_vars: &[VarUse]) -> String {
    VAR_CALL
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let group = &caps[1];
            let member = &caps[2];
            let from = caps.get(3).map(|m| {
                m.as_str()
                    .trim()
                    .trim_start_matches("from")
                    .trim()
                    .replace('.', "::")
            });

            match resolve_var(cx, group, member, from.as_deref(), scope_vars) {
                Some(value) => value,
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolves one variable: scope overrides first, then the group
/// definition (including its inherited groups).
pub fn resolve_var(
    cx: &ExpansionContext<'_>,
    group: &str,
    member: &str,
    from: Option<&str>,
    scope_vars: &[VarUse],
) -> Option<String> {
    for var_use in scope_vars {
        if var_use.group == group {
            if let Some(var) = var_use.overrides.iter().find(|v| v.name == member) {
                return Some(var.value.text.clone());
            }
        }
    }

    let symbol = cx.lookup(from, group, &VAR_KINDS)?;
    lookup_var_member(cx, symbol, member, 0)
}

/// Finds a member in a variable group, falling back to the group's
/// inherited groups.
fn lookup_var_member(
    cx: &ExpansionContext<'_>,
    symbol: &Symbol,
    member: &str,
    depth: usize,
) -> Option<String> {
    if depth > limits::MAX_EXPANSION_DEPTH {
        return None;
    }

    let (variables, inherits) = match &*symbol.definition {
        Definition::Template(t) => match &t.body {
            DefBody::Var(vars) => (vars, &t.inherits),
            _ => return None,
        },
        Definition::Custom(c) => match &c.body {
            DefBody::Var(vars) => (vars, &c.inherits),
            _ => return None,
        },
        Definition::Origin(_) => return None,
    };

    if let Some(var) = variables.iter().find(|v| v.name == member) {
        return Some(var.value.text.clone());
    }

    for inherit in inherits {
        if inherit.kind != crate::ast::DefKind::Var {
            continue;
        }
        if let Some(base) = cx.lookup(None, &inherit.name, &VAR_KINDS) {
            if let Some(value) = lookup_var_member(cx, base, member, depth + 1) {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::{load_entry, Resources};
    use crate::session::Session;
    use std::path::Path;

    fn context_for(src: &str) -> (crate::document::Document, Diagnostics) {
        let diag = Diagnostics::new();
        let mut resources = Resources::new();
        let doc = load_entry(
            src,
            "test.chtl",
            Path::new("."),
            &Session::new_for_test_suite(),
            &diag,
            &mut resources,
            &crate::state::StateManager::new(),
        );
        (doc, diag)
    }

    fn cx<'a>(doc: &'a crate::document::Document, diag: &Diagnostics) -> ExpansionContext<'a> {
        ExpansionContext {
            namespace: &doc.namespace,
            file: "test.chtl".to_string(),
            diagnostics: diag.clone(),
            index_base: 0,
        }
    }

    fn reference(name: &str) -> StyleReference {
        StyleReference::new(name, Position::default())
    }

    #[test]
    fn template_expansion_is_transitive() {
        let (doc, diag) = context_for(
            "[Template] @Style A { color: red; margin: 0; }\n\
             [Template] @Style B { @Style A; color: blue; }\n\
             [Template] @Style C { @Style B; }",
        );
        let cx = cx(&doc, &diag);

        let props = resolve_style_reference(&cx, &reference("C"));
        assert_eq!(
            props,
            vec![
                ("color".to_string(), "blue".to_string()),
                ("margin".to_string(), "0".to_string()),
            ]
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn expansion_is_idempotent() {
        let (doc, diag) = context_for(
            "[Template] @Style A { color: red; }\n\
             [Template] @Style B { @Style A; padding: 4px; }",
        );
        let cx = cx(&doc, &diag);

        let once = resolve_style_reference(&cx, &reference("B"));
        let twice = resolve_style_reference(&cx, &reference("B"));
        assert_eq!(once, twice);
    }

    #[test]
    fn inheritance_cycle_reports() {
        let (doc, diag) = context_for(
            "[Template] @Style A { @Style B; }\n\
             [Template] @Style B { @Style A; }",
        );
        let cx = cx(&doc, &diag);

        let _ = resolve_style_reference(&cx, &reference("A"));
        assert!(diag
            .snapshot()
            .iter()
            .any(|d| d.kind == DiagnosticKind::CyclicInheritance));
    }

    #[test]
    fn use_site_specialization_deletes_and_overrides() {
        let (doc, diag) = context_for(
            "[Template] @Style Base { margin: 0; padding: 0; }\n\
             [Custom] @Style Card { @Style Base; color: red; width: 10px; }",
        );
        let cx = cx(&doc, &diag);

        let mut r = reference("Card");
        r.deleted_properties.push("padding".to_string());
        r.overrides.push(crate::ast::Declaration {
            property: "color".to_string(),
            value: Some("green".to_string()),
            pos: Position::default(),
        });

        let props = resolve_style_reference(&cx, &r);
        assert_eq!(
            props,
            vec![
                ("margin".to_string(), "0".to_string()),
                ("color".to_string(), "green".to_string()),
                ("width".to_string(), "10px".to_string()),
            ]
        );
    }

    #[test]
    fn deleted_inheritance_drops_base_entirely() {
        let (doc, diag) = context_for(
            "[Template] @Style Base { margin: 0; }\n\
             [Custom] @Style Card { @Style Base; color: red; }",
        );
        let cx = cx(&doc, &diag);

        let mut r = reference("Card");
        r.deleted_inheritance.push("Base".to_string());

        let props = resolve_style_reference(&cx, &r);
        assert_eq!(props, vec![("color".to_string(), "red".to_string())]);
    }

    #[test]
    fn unfilled_valueless_slot_reports() {
        let (doc, diag) = context_for("[Custom] @Style Flex { display: flex; gap; }");
        let cx = cx(&doc, &diag);

        let props = resolve_style_reference(&cx, &reference("Flex"));
        assert_eq!(props, vec![("display".to_string(), "flex".to_string())]);
        assert!(diag
            .snapshot()
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnfilledValueSlot));
    }

    #[test]
    fn filled_valueless_slot_is_fine() {
        let (doc, diag) = context_for("[Custom] @Style Flex { display: flex; gap; }");
        let cx = cx(&doc, &diag);

        let mut r = reference("Flex");
        r.overrides.push(crate::ast::Declaration {
            property: "gap".to_string(),
            value: Some("8px".to_string()),
            pos: Position::default(),
        });

        let props = resolve_style_reference(&cx, &r);
        assert_eq!(
            props,
            vec![
                ("display".to_string(), "flex".to_string()),
                ("gap".to_string(), "8px".to_string()),
            ]
        );
        assert!(diag.is_empty());
    }

    #[test]
    fn commutativity_for_disjoint_references() {
        let src_ab = "[Template] @Style A { color: red; }\n\
                      [Template] @Style B { margin: 0; }";
        let (doc, diag) = context_for(src_ab);
        let cx = cx(&doc, &diag);

        let mut forward = resolve_style_reference(&cx, &reference("A"));
        forward.extend(resolve_style_reference(&cx, &reference("B")));

        let mut backward = resolve_style_reference(&cx, &reference("B"));
        backward.extend(resolve_style_reference(&cx, &reference("A")));

        let to_map =
            |v: Vec<(String, String)>| -> IndexMap<String, String> { v.into_iter().collect() };
        let forward = to_map(forward);
        let mut backward: Vec<_> = to_map(backward).into_iter().collect();
        backward.sort();
        let mut forward: Vec<_> = forward.into_iter().collect();
        forward.sort();
        assert_eq!(forward, backward);
    }

    #[test]
    fn element_expansion_with_insert_and_delete() {
        let (doc, diag) = context_for("[Custom] @Element Page { header { } main { } footer { } }");
        let cx = cx(&doc, &diag);

        let mut r = ElementReference {
            name: "Page".to_string(),
            namespace: None,
            specializations: vec![],
            inserts: vec![Insert {
                position: InsertPosition::After,
                target: Some(ChildSelector {
                    name: "header".to_string(),
                    index: Some(0),
                }),
                content: vec![Node::Element(crate::ast::Element::new(
                    "nav",
                    Position::default(),
                ))],
                pos: Position::default(),
            }],
            deletes: vec![Delete {
                targets: vec![DeleteTarget::Element(ChildSelector {
                    name: "footer".to_string(),
                    index: None,
                })],
                pos: Position::default(),
            }],
            pos: Position::default(),
        };

        let nodes = expand_element_reference(&cx, &r);
        let tags: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e.tag.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec!["header", "nav", "main"]);
        assert!(diag.is_empty());

        // Same expansion again gives the same result (ops are applied
        // to a fresh clone each pass).
        r.deletes.clear();
        let again = expand_element_reference(&cx, &r);
        let tags: Vec<_> = again
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e.tag.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec!["header", "nav", "main", "footer"]);
    }

    #[test]
    fn custom_element_inherits_base_children() {
        let (doc, diag) = context_for(
            "[Template] @Element Base { div { } }\n\
             [Custom] @Element Panel { inherit [Template] @Element Base; span { } }",
        );
        let cx = cx(&doc, &diag);

        let r = ElementReference {
            name: "Panel".to_string(),
            namespace: None,
            specializations: vec![],
            inserts: vec![],
            deletes: vec![],
            pos: Position::default(),
        };
        let nodes = expand_element_reference(&cx, &r);
        let tags: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                Node::Element(e) => Some(e.tag.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec!["div", "span"]);
    }

    #[test]
    fn var_calls_resolve_only_known_groups() {
        let (doc, diag) =
            context_for("[Template] @Var Theme { tableColor: \"rgb(255, 192, 203)\"; }");
        let cx = cx(&doc, &diag);

        let resolved = resolve_var_calls(&cx, "color: Theme(tableColor);", &[]);
        assert_eq!(resolved, "color: rgb(255, 192, 203);");

        let untouched = resolve_var_calls(&cx, "color: rgb(1);", &[]);
        assert_eq!(untouched, "color: rgb(1);");
    }

    #[test]
    fn var_group_inheritance_falls_back() {
        let (doc, diag) = context_for(
            "[Template] @Var Base { spacing: 4px; }\n\
             [Custom] @Var Theme { @Var Base; primary: red; }",
        );
        let cx = cx(&doc, &diag);

        assert_eq!(
            resolve_var(&cx, "Theme", "primary", None, &[]),
            Some("red".to_string())
        );
        assert_eq!(
            resolve_var(&cx, "Theme", "spacing", None, &[]),
            Some("4px".to_string())
        );
        assert_eq!(resolve_var(&cx, "Theme", "missing", None, &[]), None);
    }

    #[test]
    fn var_scope_override_wins() {
        let (doc, diag) = context_for("[Template] @Var Theme { primary: red; }");
        let cx = cx(&doc, &diag);

        let scope = vec![VarUse {
            group: "Theme".to_string(),
            namespace: None,
            overrides: vec![crate::ast::Variable {
                name: "primary".to_string(),
                value: crate::ast::Value::unquoted("blue"),
                pos: Position::default(),
            }],
            pos: Position::default(),
        }];

        assert_eq!(resolve_var_calls(&cx, "Theme(primary)", &scope), "blue");
    }
}
