//! The CHTL syntax tree.
//!
//! The parser produces one [`Document`] per source file.  Nodes form a
//! plain owned tree: child lists are owned by their parent, there are no
//! back links, and passes that need the ancestry carry an explicit
//! stack.  Specialization passes (insert/delete/override) clone and
//! rewrite subtrees instead of mutating shared state, so a definition
//! referenced from many places never aliases.

use crate::token::Position;

/// Root of a parsed file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub filename: String,
    pub children: Vec<Node>,
}

/// Any tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(Text),
    Comment(Comment),
    Template(Template),
    Custom(Custom),
    Origin(Origin),
    Import(Import),
    Namespace(NamespaceBlock),
    Configuration(ConfigBlock),
    Info(InfoBlock),
    Export(ExportBlock),
    ElementRef(ElementReference),
    Except(Except),

    /// A `style { }` block outside any element (global style context).
    Style(StyleBlock),

    /// A `script { }` block outside any element (global script context).
    Script(ScriptBlock),
}

/// `tag { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,

    /// At most one local `style { }` block.
    pub style: Option<StyleBlock>,

    /// At most one local `script { }` block.
    pub script: Option<ScriptBlock>,

    pub self_closing: bool,
    pub pos: Position,
}

impl Element {
    pub fn new(tag: impl Into<String>, pos: Position) -> Element {
        Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            style: None,
            script: None,
            self_closing: false,
            pos,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Which separator an attribute was written with.  `name: value` and
/// `name = value` are equivalent; the choice is recorded only so tools
/// can round-trip the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Separator {
    #[default]
    Colon,
    Equal,
}

/// An attribute value or a text payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Value {
    pub text: String,
    pub quoted: bool,
}

impl Value {
    pub fn quoted(text: impl Into<String>) -> Value {
        Value {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn unquoted(text: impl Into<String>) -> Value {
        Value {
            text: text.into(),
            quoted: false,
        }
    }

    /// Interprets raw captured source text: a leading/trailing quote
    /// pair makes the value quoted (with escapes resolved), anything
    /// else stays as written.
    pub fn from_raw(raw: &str) -> Value {
        let t = raw.trim();
        let bytes = t.as_bytes();
        if t.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[t.len() - 1] == bytes[0]
        {
            Value::quoted(crate::util::unescape(&t[1..t.len() - 1]))
        } else {
            Value::unquoted(t)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
    pub separator: Separator,
    pub pos: Position,
}

/// A `text { ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub value: Value,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
    Generator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub kind: CommentKind,
    pub text: String,
    pub pos: Position,
}

/// A `style { }` block, either local to an element or inside a
/// definition body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleBlock {
    pub is_local: bool,

    /// `prop: value;` entries outside any inner selector block.
    pub inline: Vec<Declaration>,

    pub rules: Vec<StyleRule>,
    pub references: Vec<StyleReference>,
    pub var_uses: Vec<VarUse>,

    /// Class/id names this block defines through its selectors, in
    /// source order.  These become auto-attributes on the owning
    /// element.
    pub auto_classes: Vec<String>,
    pub auto_ids: Vec<String>,

    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Class,
    Id,
    Ampersand,
    Tag,
    Complex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: String,
    pub kind: SelectorKind,
    pub declarations: Vec<Declaration>,
    pub pos: Position,
}

/// `prop: value;`; a `None` value is a value-less slot to be filled at
/// the use site of a style custom.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: Option<String>,
    pub pos: Position,
}

/// `@Style Name;` or `@Style Name { ...specialization... }` inside a
/// style block or style definition body.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleReference {
    pub name: String,
    pub namespace: Option<String>,

    /// Written `inherit @Style X;` rather than a bare reference.
    pub explicit_inherit: bool,

    pub overrides: Vec<Declaration>,
    pub deleted_properties: Vec<String>,

    /// Inherited bases dropped with `delete @Style Base;`.
    pub deleted_inheritance: Vec<String>,

    pub pos: Position,
}

impl StyleReference {
    pub fn new(name: impl Into<String>, pos: Position) -> StyleReference {
        StyleReference {
            name: name.into(),
            namespace: None,
            explicit_inherit: false,
            overrides: Vec::new(),
            deleted_properties: Vec::new(),
            deleted_inheritance: Vec::new(),
            pos,
        }
    }

    pub fn deletes_inheritance(&self) -> bool {
        !self.deleted_inheritance.is_empty()
    }
}

/// `@Var Group;` or `@Var Group { member: value; }` — a variable-group
/// use with optional per-scope overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct VarUse {
    pub group: String,
    pub namespace: Option<String>,
    pub overrides: Vec<Variable>,
    pub pos: Position,
}

/// A `script { }` block.  Content is opaque at parse time; the
/// fragment dispatcher and the CHTL-JS lowering decide what is inside.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlock {
    pub is_local: bool,
    pub content: String,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Style,
    Element,
    Var,
}

impl DefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DefKind::Style => "@Style",
            DefKind::Element => "@Element",
            DefKind::Var => "@Var",
        }
    }
}

/// One entry of an inheritance list.
#[derive(Debug, Clone, PartialEq)]
pub struct Inherit {
    pub kind: DefKind,
    pub name: String,

    /// Whether the source wrote `[Template]` (true) or `[Custom]`
    /// (false) before the tag; bare forms default to template.
    pub is_template: bool,

    pub pos: Position,
}

/// `name: value;` inside a `@Var` body.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    pub pos: Position,
}

/// Body payload of a template or custom, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DefBody {
    Style(StyleDefBody),
    Element(Vec<Node>),
    Var(Vec<Variable>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleDefBody {
    pub declarations: Vec<Declaration>,
    pub references: Vec<StyleReference>,
}

/// `[Template] @Style|@Element|@Var Name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub kind: DefKind,
    pub name: String,
    pub inherits: Vec<Inherit>,
    pub body: DefBody,
    pub pos: Position,
}

/// `[Custom] @Style|@Element|@Var Name { ... }`
///
/// Like a template, plus specialization operations and (for style
/// customs) value-less properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Custom {
    pub kind: DefKind,
    pub name: String,
    pub inherits: Vec<Inherit>,
    pub body: DefBody,
    pub inserts: Vec<Insert>,
    pub deletes: Vec<Delete>,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    After,
    Before,
    Replace,
    AtTop,
    AtBottom,
}

/// `name` or `name[index]` selecting a child of an expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSelector {
    pub name: String,
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub position: InsertPosition,

    /// Absent for `at top` / `at bottom`.
    pub target: Option<ChildSelector>,

    pub content: Vec<Node>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    Property(String),
    Element(ChildSelector),
    Inheritance(DefKind, String),
    StyleRef(String),
    ElementRef(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub targets: Vec<DeleteTarget>,
    pub pos: Position,
}

/// Use-site `@Element Name;`, optionally with a specialization body.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementReference {
    pub name: String,
    pub namespace: Option<String>,
    pub specializations: Vec<ElementSpecialization>,
    pub inserts: Vec<Insert>,
    pub deletes: Vec<Delete>,
    pub pos: Position,
}

/// One per-child specialization inside an element-reference body:
/// `div[0] { ... }` applies its payload to the first `div` of the
/// expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpecialization {
    pub selector: ChildSelector,
    pub element: Element,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Html,
    Style,
    JavaScript,
    Chtl,
    CJmod,
    Config,
    TemplateAll,
    CustomAll,
    OriginAll,
    Specific,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub kind: ImportKind,
    pub path: String,
    pub alias: Option<String>,

    /// For `Specific`: the definition kind and name being pulled in.
    pub specific_kind: Option<DefKind>,
    pub specific_name: Option<String>,

    pub is_template: bool,
    pub is_custom: bool,
    pub is_origin: bool,

    /// Origin type tag for `[Import] [Origin] @Html ...` forms.
    pub origin_type: Option<String>,

    pub pos: Position,
}

/// `[Namespace] name { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceBlock {
    pub name: String,
    pub children: Vec<Node>,
    pub is_nested: bool,
    pub pos: Position,
}

/// One `key: value;` option inside `[Configuration]`, `[Info]` or
/// `[OriginType]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    pub key: String,
    pub value: String,
    pub pos: Position,
}

/// One `[Name]` entry: a logical token and its alternative spellings.
#[derive(Debug, Clone, PartialEq)]
pub struct NameEntry {
    pub key: String,
    pub spellings: Vec<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBlock {
    pub name: Option<String>,
    pub options: Vec<ConfigOption>,
    pub name_entries: Vec<NameEntry>,
    pub origin_entries: Vec<ConfigOption>,
    pub pos: Position,
}

/// `[Info] { key: value; ... }` — module manifest metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoBlock {
    pub entries: Vec<ConfigOption>,
    pub pos: Position,
}

/// One entry of an `[Export]` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub kind: DefKind,
    pub is_custom: bool,
    pub names: Vec<String>,
    pub pos: Position,
}

/// `[Export] { @Style a, b; [Custom] @Element c; }`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBlock {
    pub entries: Vec<ExportEntry>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OriginType {
    Html,
    Style,
    JavaScript,
    Custom(String),
}

impl OriginType {
    pub fn from_tag(tag: &str) -> OriginType {
        match tag {
            "@Html" => OriginType::Html,
            "@Style" => OriginType::Style,
            "@JavaScript" => OriginType::JavaScript,
            other => OriginType::Custom(other.trim_start_matches('@').to_string()),
        }
    }
}

/// `[Origin] @Type [name] { raw }` — or, with `is_reference`, a
/// use-site `[Origin] @Type name;` referring to a named block.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub origin_type: OriginType,
    pub name: Option<String>,
    pub content: String,
    pub is_reference: bool,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExceptTarget {
    /// `except span;`
    Element(String),

    /// `except @Html;` / `except [Template];` / `except [Custom];`
    Type(String),

    /// `except [Custom] @Element Box;`
    Specific {
        is_custom: bool,
        kind: DefKind,
        name: String,
    },
}

/// `except <targets>;` — augments the constrainer's rules for the
/// enclosing lexical scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Except {
    pub targets: Vec<ExceptTarget>,
    pub pos: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_type_from_tag() {
        assert_eq!(OriginType::from_tag("@Html"), OriginType::Html);
        assert_eq!(
            OriginType::from_tag("@Vue"),
            OriginType::Custom("Vue".to_string())
        );
    }

    #[test]
    fn style_reference_inheritance_flag() {
        let mut r = StyleReference::new("Base", Position::default());
        assert!(!r.deletes_inheritance());
        r.deleted_inheritance.push("Mixin".to_string());
        assert!(r.deletes_inheritance());
    }
}
