//! The generator: turns a loaded document into its three output
//! streams (HTML, CSS, JavaScript).
//!
//! Element markup goes to the HTML stream.  Local style blocks donate
//! class/id attributes to their owning element, hoist their rules to
//! the CSS stream, and fold inline properties plus resolved style
//! references into the element's `style` attribute.  Local scripts are
//! lowered (CHTL-JS) or passed through (plain JavaScript) and wrapped
//! in a strict-mode IIFE on the JS stream.
//!
//! Auto class and id names repeated across distinct elements get `2`,
//! `3`, ... suffixes; within one compilation the generated sets are a
//! pure function of the input, so recompiling the same source yields
//! the same names.

pub mod chtl_js;
pub mod expand;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use std::collections::HashMap;

use crate::ast::{self, Node, OriginType, SelectorKind};
use crate::chtl_log;
use crate::config::{Config, OriginStream};
use crate::document::Document;
use crate::error::{DiagnosticKind, Diagnostics, InternalError};
use crate::limits;
use crate::namespace::{Definition, SymbolKind};
use crate::scanner::{self, FragmentCache, FragmentKind};
use crate::session::Session;
use crate::state::{NodeFlags, NodeState, StateManager};
use crate::util::escape_html;

use expand::{ExpansionContext, ELEMENT_KINDS};

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub pretty_print: bool,
    pub indent_width: usize,
    pub generate_comments: bool,
    pub minify_css: bool,
    pub minify_js: bool,
    pub css_class_prefix: String,
    pub full_document: bool,
    pub title: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            pretty_print: true,
            indent_width: 2,
            generate_comments: true,
            minify_css: false,
            minify_js: false,
            css_class_prefix: String::new(),
            full_document: false,
            title: "CHTL Document".to_string(),
        }
    }
}

/// The three output streams plus the generated name sets.
#[derive(Debug, Default)]
pub struct Output {
    pub html: String,
    pub css: String,
    pub js: String,
    pub generated_classes: Vec<String>,
    pub generated_ids: Vec<String>,
    pub cache_hits: usize,
}

/// Generates output for a loaded document.
pub fn generate(
    document: &Document,
    options: &GeneratorOptions,
    session: &Session,
    diagnostics: &Diagnostics,
    states: &StateManager,
) -> Result<Output, InternalError> {
    let cx = ExpansionContext {
        namespace: &document.namespace,
        file: document.filename.clone(),
        diagnostics: diagnostics.clone(),
        index_base: document.config.index_initial_count,
    };

    let mut generator = Generator {
        options,
        session,
        states,
        config: &document.config,
        diagnostics: diagnostics.clone(),
        cx,
        html: String::new(),
        css: String::new(),
        js: String::new(),
        indent: 0,
        class_counters: HashMap::new(),
        id_counters: HashMap::new(),
        classes: IndexSet::new(),
        ids: IndexSet::new(),
        cache: FragmentCache::new(),
        ref_depth: 0,
        expansion_flags: NodeFlags::empty(),
    };

    for node in &document.tree.children {
        generator.emit_node(node)?;
    }

    chtl_log!(
        session,
        "generator: {} bytes html, {} bytes css, {} bytes js",
        generator.html.len(),
        generator.css.len(),
        generator.js.len()
    );

    let html = if options.full_document {
        generator.assemble_document()
    } else {
        generator.html.clone()
    };

    Ok(Output {
        html,
        css: generator.css,
        js: generator.js,
        generated_classes: generator.classes.into_iter().collect(),
        generated_ids: generator.ids.into_iter().collect(),
        cache_hits: generator.cache.hits(),
    })
}

struct Generator<'a> {
    options: &'a GeneratorOptions,
    session: &'a Session,
    states: &'a StateManager,
    config: &'a Config,
    diagnostics: Diagnostics,
    cx: ExpansionContext<'a>,

    html: String,
    css: String,
    js: String,
    indent: usize,

    class_counters: HashMap<String, usize>,
    id_counters: HashMap<String, usize>,
    classes: IndexSet<String>,
    ids: IndexSet<String>,

    cache: FragmentCache,
    ref_depth: usize,

    /// Origin flags for nodes currently being emitted from a
    /// template/custom expansion.
    expansion_flags: NodeFlags,
}

impl<'a> Generator<'a> {
    fn emit_node(&mut self, node: &Node) -> Result<(), InternalError> {
        match node {
            Node::Element(element) => self.emit_element(element),
            Node::Text(text) => {
                self.html_line(&escape_html(&text.value.text));
                Ok(())
            }
            Node::Comment(comment) => {
                if self.options.generate_comments {
                    self.html_line(&format!("<!-- {} -->", comment.text));
                }
                Ok(())
            }
            Node::Origin(origin) => {
                self.emit_origin(origin);
                Ok(())
            }
            Node::Style(block) => {
                self.emit_global_style(block);
                Ok(())
            }
            Node::Script(script) => {
                self.emit_global_script(script);
                Ok(())
            }
            Node::ElementRef(reference) => {
                if self.ref_depth >= limits::MAX_EXPANSION_DEPTH {
                    self.diagnostics.error(
                        DiagnosticKind::CyclicInheritance,
                        &self.cx.file,
                        reference.pos,
                        crate::error::ImplementationLimit::ExpansionTooDeep.to_string(),
                    );
                    return Ok(());
                }
                let definition_flags = match self.cx.lookup(
                    reference.namespace.as_deref(),
                    &reference.name,
                    &ELEMENT_KINDS,
                ) {
                    Some(symbol) if symbol.kind == SymbolKind::CustomElement => {
                        NodeFlags::CUSTOM_NODE
                    }
                    Some(_) => NodeFlags::TEMPLATE_NODE,
                    None => NodeFlags::empty(),
                };

                let nodes = expand::expand_element_reference(&self.cx, reference);
                let previous_flags = self.expansion_flags;
                self.expansion_flags |= definition_flags;
                self.ref_depth += 1;
                for expanded in &nodes {
                    self.emit_node(expanded)?;
                }
                self.ref_depth -= 1;
                self.expansion_flags = previous_flags;
                Ok(())
            }
            Node::Namespace(block) => {
                for child in &block.children {
                    self.emit_node(child)?;
                }
                Ok(())
            }

            // Definitions and directives have no direct output.
            Node::Template(_)
            | Node::Custom(_)
            | Node::Import(_)
            | Node::Configuration(_)
            | Node::Info(_)
            | Node::Export(_)
            | Node::Except(_) => Ok(()),
        }
    }

    fn emit_element(&mut self, element: &ast::Element) -> Result<(), InternalError> {
        let handle = self.states.register_node(self.element_flags(element));
        for state in [
            NodeState::Parsing,
            NodeState::Parsed,
            NodeState::Validating,
            NodeState::Validated,
            NodeState::Generating,
        ] {
            self.states.transition(handle, state)?;
        }

        // Local style first: it decides the element's auto attributes.
        let mut class_renames: Vec<(String, String)> = Vec::new();
        let mut auto_id: Option<(String, String)> = None;
        let mut style_properties: IndexMap<String, String> = IndexMap::new();

        if let Some(ref style) = element.style {
            let unique_bases: IndexSet<&String> = style.auto_classes.iter().collect();
            for base in unique_bases {
                let emitted = self.unique_class_name(base);
                self.classes.insert(emitted.clone());
                class_renames.push((base.clone(), emitted));
            }

            let unique_ids: IndexSet<&String> = style.auto_ids.iter().collect();
            for (position, base) in unique_ids.into_iter().enumerate() {
                if position == 0 {
                    let emitted = self.unique_id_name(base);
                    self.ids.insert(emitted.clone());
                    auto_id = Some((base.clone(), emitted));
                } else {
                    self.diagnostics.error(
                        DiagnosticKind::DuplicateId,
                        &self.cx.file,
                        style.pos,
                        format!(
                            "element '{}' defines more than one id selector; '#{}' is ignored as an attribute",
                            element.tag, base
                        ),
                    );
                }
            }

            for reference in &style.references {
                for (property, value) in expand::resolve_style_reference(&self.cx, reference) {
                    let value = expand::resolve_var_calls(&self.cx, &value, &style.var_uses);
                    style_properties.insert(property, value);
                }
            }
            for declaration in &style.inline {
                if let Some(ref value) = declaration.value {
                    let value = expand::resolve_var_calls(&self.cx, value, &style.var_uses);
                    style_properties.insert(declaration.property.clone(), value);
                }
            }

            self.hoist_rules(element, style, &class_renames, &auto_id);
        }

        // Assemble attributes in source order, auto values merged in.
        let mut attributes: IndexMap<String, String> = IndexMap::new();
        for attribute in &element.attributes {
            attributes.insert(attribute.name.clone(), attribute.value.text.clone());
        }

        if !class_renames.is_empty() {
            let existing = attributes.shift_remove("class").unwrap_or_default();
            let merged = existing
                .split_whitespace()
                .map(str::to_string)
                .chain(class_renames.iter().map(|(_, emitted)| emitted.clone()))
                .unique()
                .join(" ");
            attributes.insert("class".to_string(), merged);
        }

        if let Some((_, ref emitted)) = auto_id {
            if let Some(existing) = attributes.get("id") {
                if existing != emitted {
                    self.diagnostics.error(
                        DiagnosticKind::DuplicateId,
                        &self.cx.file,
                        element.pos,
                        format!(
                            "element '{}' has id \"{}\" but its style block defines '#{}'",
                            element.tag, existing, emitted
                        ),
                    );
                }
            } else {
                attributes.insert("id".to_string(), emitted.clone());
            }
        }

        if !style_properties.is_empty() {
            let inline = style_properties
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .join("; ");
            let merged = match attributes.shift_remove("style") {
                Some(existing) if !existing.is_empty() => format!("{existing}; {inline}"),
                _ => inline,
            };
            attributes.insert("style".to_string(), merged);
        }

        // Local script, lowered and wrapped.
        if let Some(ref script) = element.script {
            self.emit_local_script(element, &attributes, script, handle);
        }

        // Markup.
        let mut open = String::new();
        open.push('<');
        open.push_str(&element.tag);
        for (name, value) in &attributes {
            open.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
        }

        if element.self_closing {
            open.push_str(" />");
            self.html_line(&open);
        } else if element.children.is_empty() {
            open.push_str(&format!("></{}>", element.tag));
            self.html_line(&open);
        } else {
            open.push('>');
            self.html_line(&open);
            self.indent += 1;
            for child in &element.children {
                self.emit_node(child)?;
            }
            self.indent -= 1;
            self.html_line(&format!("</{}>", element.tag));
        }

        self.states.transition(handle, NodeState::Generated)?;
        Ok(())
    }

    /// Flags describing what an element's generation involves: a
    /// script block makes it dynamic, style references and variable
    /// uses are dependencies (cross-namespace ones doubly so), an
    /// `except` constraint wants validation, and nodes reached through
    /// an expansion carry their definition's template/custom flag.
    fn element_flags(&self, element: &ast::Element) -> NodeFlags {
        let mut flags = if element.script.is_some() {
            NodeFlags::DYNAMIC
        } else {
            NodeFlags::STATIC
        };
        flags |= self.expansion_flags;

        if let Some(ref style) = element.style {
            if !style.references.is_empty() || !style.var_uses.is_empty() {
                flags |= NodeFlags::HAS_DEPS;
            }
            if style.references.iter().any(|r| r.namespace.is_some())
                || style.var_uses.iter().any(|v| v.namespace.is_some())
            {
                flags |= NodeFlags::CROSS_REF;
            }
        }

        if element
            .children
            .iter()
            .any(|child| matches!(child, Node::Except(_)))
        {
            flags |= NodeFlags::REQUIRES_VALIDATION;
        }

        if self.config.debug_mode {
            flags |= NodeFlags::DEBUG_INFO;
        }

        flags
    }

    /// Hoists a local style block's rules to the CSS stream, expanding
    /// `&` and renaming auto classes/ids to their unique forms.
    fn hoist_rules(
        &mut self,
        element: &ast::Element,
        style: &ast::StyleBlock,
        class_renames: &[(String, String)],
        auto_id: &Option<(String, String)>,
    ) {
        for rule in &style.rules {
            let selector = self.rewrite_selector(
                &rule.selector,
                rule.kind,
                &element.tag,
                class_renames,
                auto_id,
            );

            let declarations: Vec<(String, String)> = rule
                .declarations
                .iter()
                .filter_map(|d| {
                    d.value.as_ref().map(|v| {
                        (
                            d.property.clone(),
                            expand::resolve_var_calls(&self.cx, v, &style.var_uses),
                        )
                    })
                })
                .collect();

            self.css_rule(&selector, &declarations);
        }
    }

    fn rewrite_selector(
        &self,
        selector: &str,
        kind: SelectorKind,
        tag: &str,
        class_renames: &[(String, String)],
        auto_id: &Option<(String, String)>,
    ) -> String {
        match kind {
            SelectorKind::Ampersand => {
                let replacement = if let Some((_, emitted)) = class_renames.first() {
                    format!(".{emitted}")
                } else if let Some((_, emitted)) = auto_id {
                    format!("#{emitted}")
                } else {
                    tag.to_string()
                };
                selector.replacen('&', &replacement, 1)
            }
            SelectorKind::Class | SelectorKind::Complex => {
                let mut out = selector.to_string();
                for (base, emitted) in class_renames {
                    out = rename_simple(&out, &format!(".{base}"), &format!(".{emitted}"));
                }
                if let Some((base, emitted)) = auto_id {
                    out = rename_simple(&out, &format!("#{base}"), &format!("#{emitted}"));
                }
                out
            }
            SelectorKind::Id => match auto_id {
                Some((base, emitted)) => {
                    rename_simple(selector, &format!("#{base}"), &format!("#{emitted}"))
                }
                None => selector.to_string(),
            },
            SelectorKind::Tag => selector.to_string(),
        }
    }

    fn unique_class_name(&mut self, base: &str) -> String {
        let full = format!("{}{}", self.options.css_class_prefix, base);
        let count = self.class_counters.entry(full.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            full
        } else {
            format!("{full}{count}")
        }
    }

    fn unique_id_name(&mut self, base: &str) -> String {
        let count = self.id_counters.entry(base.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base.to_string()
        } else {
            format!("{base}{count}")
        }
    }

    fn emit_local_script(
        &mut self,
        element: &ast::Element,
        attributes: &IndexMap<String, String>,
        script: &ast::ScriptBlock,
        handle: crate::state::NodeHandle,
    ) {
        let content = script.content.trim();
        if content.is_empty() {
            return;
        }

        self.states.add_flags(handle, NodeFlags::CACHEABLE);
        let lowered = match self.cache.get(content) {
            Some(hit) => {
                self.states.add_flags(handle, NodeFlags::OPTIMIZED);
                hit
            }
            None => {
                let lowered = match scanner::classify_script(content) {
                    FragmentKind::ChtlJs => chtl_js::lower_script(content, &self.cx, true),
                    _ => content.to_string(),
                };
                self.cache.insert(content, lowered.clone());
                lowered
            }
        };

        if self.options.generate_comments && !self.options.minify_js {
            let mut signature = element.tag.clone();
            if let Some(id) = attributes.get("id") {
                signature.push_str(&format!("#{id}"));
            } else if let Some(class) = attributes.get("class") {
                if let Some(first) = class.split_whitespace().next() {
                    signature.push_str(&format!(".{first}"));
                }
            }
            self.js.push_str(&format!("/* {signature} */\n"));
        }

        if self.options.minify_js {
            self.js
                .push_str(&format!("(function(){{\"use strict\";{lowered}}})();"));
        } else {
            self.js.push_str(&format!(
                "(function () {{\n\"use strict\";\n{lowered}\n}})();\n"
            ));
        }
    }

    fn emit_global_script(&mut self, script: &ast::ScriptBlock) {
        let content = script.content.trim();
        if content.is_empty() {
            return;
        }

        let lowered = match self.cache.get(content) {
            Some(hit) => hit,
            None => {
                let lowered = match scanner::classify_script(content) {
                    FragmentKind::ChtlJs => chtl_js::lower_script(content, &self.cx, false),
                    _ => content.to_string(),
                };
                self.cache.insert(content, lowered.clone());
                lowered
            }
        };

        self.js.push_str(&lowered);
        self.js.push('\n');
    }

    fn emit_global_style(&mut self, block: &ast::StyleBlock) {
        for reference in &block.references {
            // A global reference has no selector to attach to.
            chtl_log!(
                self.session,
                "global style reference '{}' has no owning selector; skipped",
                reference.name
            );
        }

        for rule in &block.rules {
            let declarations: Vec<(String, String)> = rule
                .declarations
                .iter()
                .filter_map(|d| {
                    d.value.as_ref().map(|v| {
                        (
                            d.property.clone(),
                            expand::resolve_var_calls(&self.cx, v, &block.var_uses),
                        )
                    })
                })
                .collect();
            self.css_rule(&rule.selector, &declarations);
        }
    }

    fn emit_origin(&mut self, origin: &ast::Origin) {
        let (origin_type, content) = if origin.is_reference {
            let name = origin.name.as_deref().unwrap_or_default();
            let kind = SymbolKind::of_origin(&origin.origin_type);
            match self.cx.namespace.lookup(name, kind) {
                Some(symbol) => match &*symbol.definition {
                    Definition::Origin(o) => (o.origin_type.clone(), o.content.clone()),
                    _ => return,
                },
                None => {
                    self.diagnostics.error(
                        DiagnosticKind::UnknownSymbol,
                        &self.cx.file,
                        origin.pos,
                        format!("unknown origin block '{name}'"),
                    );
                    return;
                }
            }
        } else {
            (origin.origin_type.clone(), origin.content.clone())
        };

        let content = content.trim_matches('\n');
        match origin_type {
            OriginType::Html => {
                self.html.push_str(content);
                self.html.push('\n');
            }
            OriginType::Style => {
                self.css.push_str(content);
                self.css.push('\n');
            }
            OriginType::JavaScript => {
                self.js.push_str(content);
                self.js.push('\n');
            }
            OriginType::Custom(ref tag) => {
                match self.config.origin_stream(tag) {
                    Some(OriginStream::Css) => {
                        self.css.push_str(content);
                        self.css.push('\n');
                    }
                    Some(OriginStream::Js) => {
                        self.js.push_str(content);
                        self.js.push('\n');
                    }
                    // Unconfigured types default to the HTML stream,
                    // annotated with their type.
                    Some(OriginStream::Html) | None => {
                        if self.options.generate_comments {
                            self.html.push_str(&format!("<!-- origin: {tag} -->\n"));
                        }
                        self.html.push_str(content);
                        self.html.push('\n');
                    }
                }
            }
        }
    }

    fn css_rule(&mut self, selector: &str, declarations: &[(String, String)]) {
        if declarations.is_empty() {
            return;
        }

        if self.options.minify_css {
            self.css.push_str(selector);
            self.css.push('{');
            self.css.push_str(
                &declarations
                    .iter()
                    .map(|(k, v)| format!("{k}:{v}"))
                    .join(";"),
            );
            self.css.push('}');
        } else {
            self.css.push_str(&format!("{selector} {{\n"));
            for (property, value) in declarations {
                self.css.push_str(&format!("  {property}: {value};\n"));
            }
            self.css.push_str("}\n");
        }
    }

    fn html_line(&mut self, text: &str) {
        if self.options.pretty_print {
            for _ in 0..self.indent * self.options.indent_width {
                self.html.push(' ');
            }
            self.html.push_str(text);
            self.html.push('\n');
        } else {
            self.html.push_str(text);
        }
    }

    /// Wraps the streams in a minimal document shell.
    fn assemble_document(&self) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        out.push_str("<meta charset=\"UTF-8\">\n");
        out.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        out.push_str(&format!(
            "<title>{}</title>\n",
            escape_html(&self.options.title)
        ));
        if !self.css.is_empty() {
            out.push_str("<style>\n");
            out.push_str(&self.css);
            out.push_str("</style>\n");
        }
        out.push_str("</head>\n<body>\n");
        out.push_str(&self.html);
        if !self.js.is_empty() {
            out.push_str("<script>\n");
            out.push_str(&self.js);
            out.push_str("</script>\n");
        }
        out.push_str("</body>\n</html>\n");
        out
    }
}

/// Replaces `pattern` by `replacement` where the match is not followed
/// by a name character, so `.card` does not rewrite `.cardinal`.
fn rename_simple(selector: &str, pattern: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut rest = selector;

    while let Some(at) = rest.find(pattern) {
        let after = rest[at + pattern.len()..].chars().next();
        let boundary = after
            .map(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(true);
        out.push_str(&rest[..at]);
        if boundary {
            out.push_str(replacement);
        } else {
            out.push_str(pattern);
        }
        rest = &rest[at + pattern.len()..];
    }
    out.push_str(rest);
    out
}
