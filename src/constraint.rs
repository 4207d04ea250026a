//! The context-sensitive syntax constrainer.
//!
//! The grammar already keeps most constructs out of most places; what
//! is left is a rule table keyed by block context.  Generator comments
//! and origin embeds are allowed everywhere.  The cases the parser
//! cannot decide are decided here:
//!
//! * inline CSS properties are allowed in *local* style blocks only;
//! * script bodies are opaque to the parser, so CHTL constructs hiding
//!   inside them (`@Style` in a global script, a `[Template]` in any
//!   script) are found by scanning the content;
//! * `except` augments the rules for its enclosing lexical scope.
//!
//! A violating construct is dropped from further processing: child
//! nodes are removed, script blocks are emptied.  In strict mode the
//! caller aborts compilation when any violation was recorded;
//! otherwise the diagnostics stand and compilation continues.
//!
//! The repair pass is a collector only: every violation carries a
//! suggestion string, and nothing is mutated beyond the drop.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::ast::{self, ExceptTarget, Node};
use crate::error::{DiagnosticKind, Diagnostics};
use crate::namespace::{Namespace, SymbolKind};
use crate::token::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockContext {
    TopLevel,
    ElementBody,
    GlobalStyle,
    LocalStyle,
    GlobalScript,
    LocalScript,
    NamespaceBody,
}

impl fmt::Display for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockContext::TopLevel => "top level",
            BlockContext::ElementBody => "element body",
            BlockContext::GlobalStyle => "global style block",
            BlockContext::LocalStyle => "local style block",
            BlockContext::GlobalScript => "global script block",
            BlockContext::LocalScript => "local script block",
            BlockContext::NamespaceBody => "namespace body",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    InlineCssProperty,
    StyleReference,
    VarReference,
    DefinitionInScript,
    ImportInScript,
    StyleReferenceInScript,
    ElementUse,
    TemplateUse,
    CustomUse,
    OriginEmbed,
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstructKind::InlineCssProperty => "inline CSS property",
            ConstructKind::StyleReference => "style reference",
            ConstructKind::VarReference => "variable reference",
            ConstructKind::DefinitionInScript => "definition block",
            ConstructKind::ImportInScript => "import statement",
            ConstructKind::StyleReferenceInScript => "@Style reference",
            ConstructKind::ElementUse => "element",
            ConstructKind::TemplateUse => "template use",
            ConstructKind::CustomUse => "custom use",
            ConstructKind::OriginEmbed => "origin embed",
        };
        f.write_str(s)
    }
}

/// Whether the default rule table allows a construct in a context.
/// `except` augmentation happens on top of this.
pub fn allowed_in(context: BlockContext, construct: ConstructKind) -> bool {
    use BlockContext::*;
    use ConstructKind::*;

    match construct {
        // Universally allowed.
        OriginEmbed => true,

        InlineCssProperty => matches!(context, LocalStyle),
        StyleReference | VarReference => matches!(context, GlobalStyle | LocalStyle),

        StyleReferenceInScript => false,
        DefinitionInScript | ImportInScript => false,

        ElementUse | TemplateUse | CustomUse => {
            matches!(context, TopLevel | ElementBody | NamespaceBody)
        }
    }
}

/// One recorded violation.  The repair strategy is future work; the
/// suggestion is advisory text only.
#[derive(Debug, Clone)]
pub struct Violation {
    pub context: BlockContext,
    pub construct: ConstructKind,
    pub name: String,
    pub pos: Position,
    pub message: String,
    pub suggestion: Option<String>,
}

static SCRIPT_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:Template|Custom|Namespace|Configuration)\]").expect("known-good regex")
});

static SCRIPT_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[Import\]").expect("known-good regex"));

static SCRIPT_STYLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(?:Style|Element)\b").expect("known-good regex"));

/// The constraint a global script body violates, if any.
pub fn global_script_violation(content: &str) -> Option<ConstructKind> {
    if SCRIPT_DEFINITION.is_match(content) {
        return Some(ConstructKind::DefinitionInScript);
    }
    if SCRIPT_IMPORT.is_match(content) {
        return Some(ConstructKind::ImportInScript);
    }
    if SCRIPT_STYLE_REF.is_match(content) {
        return Some(ConstructKind::StyleReferenceInScript);
    }
    None
}

/// The constraint a local script body violates, if any.  Local scripts
/// additionally allow variable references (`@Var`), so only
/// definitions, imports and `@Style`/`@Element` uses are out.
pub fn local_script_violation(content: &str) -> Option<ConstructKind> {
    if SCRIPT_DEFINITION.is_match(content) {
        return Some(ConstructKind::DefinitionInScript);
    }
    if SCRIPT_IMPORT.is_match(content) {
        return Some(ConstructKind::ImportInScript);
    }
    if SCRIPT_STYLE_REF.is_match(content) {
        return Some(ConstructKind::StyleReferenceInScript);
    }
    None
}

/// Active `except` rules for one lexical scope.
#[derive(Debug, Clone, Default)]
struct ExceptScope {
    element_names: Vec<String>,
    forbid_html: bool,
    forbid_templates: bool,
    forbid_customs: bool,
    specific: Vec<(bool, ast::DefKind, String)>,
}

impl ExceptScope {
    fn from_targets(targets: &[ExceptTarget]) -> ExceptScope {
        let mut scope = ExceptScope::default();
        for target in targets {
            match target {
                ExceptTarget::Element(name) => scope.element_names.push(name.clone()),
                ExceptTarget::Type(tag) => match tag.as_str() {
                    "@Html" => scope.forbid_html = true,
                    "[Template]" => scope.forbid_templates = true,
                    "[Custom]" => scope.forbid_customs = true,
                    _ => {}
                },
                ExceptTarget::Specific {
                    is_custom,
                    kind,
                    name,
                } => scope.specific.push((*is_custom, *kind, name.clone())),
            }
        }
        scope
    }
}

pub struct ConstraintChecker<'a> {
    file: String,
    strict: bool,
    namespace: &'a Namespace,
    diagnostics: Diagnostics,
    violations: Vec<Violation>,
    except_stack: Vec<ExceptScope>,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(
        file: &str,
        strict: bool,
        namespace: &'a Namespace,
        diagnostics: Diagnostics,
    ) -> ConstraintChecker<'a> {
        ConstraintChecker {
            file: file.to_string(),
            strict,
            namespace,
            diagnostics,
            violations: Vec::new(),
            except_stack: Vec::new(),
        }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Batch check over the whole tree.  Violating constructs are
    /// dropped: nodes removed, script bodies emptied.
    pub fn check_document(&mut self, tree: &mut ast::Document) {
        let mut children = std::mem::take(&mut tree.children);
        self.check_node_list(&mut children, BlockContext::TopLevel);
        tree.children = children;
    }

    fn check_node_list(&mut self, nodes: &mut Vec<Node>, context: BlockContext) {
        // `except` is lexical: rules in this list apply to this whole
        // list, including nodes before the statement.
        let mut scope = ExceptScope::default();
        for node in nodes.iter() {
            if let Node::Except(e) = node {
                let s = ExceptScope::from_targets(&e.targets);
                scope.element_names.extend(s.element_names);
                scope.forbid_html |= s.forbid_html;
                scope.forbid_templates |= s.forbid_templates;
                scope.forbid_customs |= s.forbid_customs;
                scope.specific.extend(s.specific);
            }
        }
        self.except_stack.push(scope);

        let mut index = 0;
        while index < nodes.len() {
            let keep = self.check_node(&mut nodes[index], context);
            if keep {
                index += 1;
            } else {
                nodes.remove(index);
            }
        }

        self.except_stack.pop();
    }

    /// Returns whether the node survives.
    fn check_node(&mut self, node: &mut Node, context: BlockContext) -> bool {
        match node {
            Node::Element(element) => {
                if let Some(violation) = self.element_except_violation(&element.tag, element.pos) {
                    self.record(violation);
                    return false;
                }
                self.check_element(element);
                true
            }

            Node::ElementRef(reference) => {
                if let Some(violation) = self.ref_except_violation(reference) {
                    self.record(violation);
                    return false;
                }
                true
            }

            Node::Style(block) => {
                self.check_style_block(block, BlockContext::GlobalStyle);
                true
            }

            Node::Script(script) => self.check_script(script, BlockContext::GlobalScript),

            Node::Namespace(ns) => {
                let mut children = std::mem::take(&mut ns.children);
                self.check_node_list(&mut children, BlockContext::NamespaceBody);
                ns.children = children;
                true
            }

            _ => true,
        }
    }

    fn check_element(&mut self, element: &mut ast::Element) {
        if let Some(ref mut style) = element.style {
            self.check_style_block(style, BlockContext::LocalStyle);
        }

        if let Some(ref mut script) = element.script {
            if !self.check_script(script, BlockContext::LocalScript) {
                element.script = None;
            }
        }

        let mut children = std::mem::take(&mut element.children);
        self.check_node_list(&mut children, BlockContext::ElementBody);
        element.children = children;
    }

    fn check_style_block(&mut self, block: &mut ast::StyleBlock, context: BlockContext) {
        if context == BlockContext::GlobalStyle && !block.inline.is_empty() {
            for declaration in &block.inline {
                if declaration.value.is_some() {
                    self.record(Violation {
                        context,
                        construct: ConstructKind::InlineCssProperty,
                        name: declaration.property.clone(),
                        pos: declaration.pos,
                        message: format!(
                            "inline property '{}' is not allowed in a {}",
                            declaration.property, context
                        ),
                        suggestion: Some(
                            "wrap the property in a selector rule or move it into an element's local style block"
                                .to_string(),
                        ),
                    });
                }
            }
            block.inline.retain(|d| d.value.is_none());
        }
    }

    /// Returns whether the script block survives.
    fn check_script(&mut self, script: &mut ast::ScriptBlock, context: BlockContext) -> bool {
        let violation = match context {
            BlockContext::GlobalScript => global_script_violation(&script.content),
            _ => local_script_violation(&script.content),
        };

        if let Some(construct) = violation {
            self.record(Violation {
                context,
                construct,
                name: String::new(),
                pos: script.pos,
                message: format!("{construct} is not allowed in a {context}"),
                suggestion: Some("move the construct out of the script block".to_string()),
            });
            // The block's output is dropped, but the node survives so
            // positions stay stable for later passes.
            script.content.clear();
        }

        true
    }

    fn element_except_violation(&self, tag: &str, pos: Position) -> Option<Violation> {
        for scope in self.except_stack.iter().rev() {
            if scope.element_names.iter().any(|n| n == tag) {
                return Some(Violation {
                    context: BlockContext::ElementBody,
                    construct: ConstructKind::ElementUse,
                    name: tag.to_string(),
                    pos,
                    message: format!("element '{tag}' is excluded by an 'except' constraint"),
                    suggestion: Some(format!("remove the '{tag}' child or the except rule")),
                });
            }
            if scope.forbid_html {
                return Some(Violation {
                    context: BlockContext::ElementBody,
                    construct: ConstructKind::ElementUse,
                    name: tag.to_string(),
                    pos,
                    message: "plain HTML elements are excluded by an 'except @Html' constraint"
                        .to_string(),
                    suggestion: None,
                });
            }
        }
        None
    }

    fn ref_except_violation(&self, reference: &ast::ElementReference) -> Option<Violation> {
        let is_custom = self
            .namespace
            .lookup(&reference.name, SymbolKind::CustomElement)
            .is_some();
        let is_template = self
            .namespace
            .lookup(&reference.name, SymbolKind::TemplateElement)
            .is_some();

        for scope in self.except_stack.iter().rev() {
            if scope.forbid_customs && is_custom {
                return Some(self.use_violation(reference, ConstructKind::CustomUse));
            }
            if scope.forbid_templates && is_template && !is_custom {
                return Some(self.use_violation(reference, ConstructKind::TemplateUse));
            }
            for (spec_custom, kind, name) in &scope.specific {
                if *kind == ast::DefKind::Element
                    && name == &reference.name
                    && *spec_custom == is_custom
                {
                    return Some(self.use_violation(
                        reference,
                        if is_custom {
                            ConstructKind::CustomUse
                        } else {
                            ConstructKind::TemplateUse
                        },
                    ));
                }
            }
        }
        None
    }

    fn use_violation(
        &self,
        reference: &ast::ElementReference,
        construct: ConstructKind,
    ) -> Violation {
        Violation {
            context: BlockContext::ElementBody,
            construct,
            name: reference.name.clone(),
            pos: reference.pos,
            message: format!(
                "{} '{}' is excluded by an 'except' constraint",
                construct, reference.name
            ),
            suggestion: None,
        }
    }

    fn record(&mut self, violation: Violation) {
        self.diagnostics.error(
            if matches!(
                violation.construct,
                ConstructKind::ElementUse | ConstructKind::TemplateUse | ConstructKind::CustomUse
            ) {
                DiagnosticKind::ExceptViolation
            } else {
                DiagnosticKind::DisallowedInContext
            },
            &self.file,
            violation.pos,
            violation.message.clone(),
        );
        self.violations.push(violation);
    }
}
