//! Main CHTL document structure.
//!
//! A [`Document`] is one compiled source file: its syntax tree, the
//! configuration it declared, and the symbol table assembled from its
//! own definitions and its imports.  [`Resources`] caches every file a
//! compilation loads, keyed by canonical path, and carries the
//! currently-loading marker stack that turns a cyclic import into a
//! diagnostic naming the whole chain instead of a stack overflow.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::ast::{self, DefKind, Import, ImportKind, Node};
use crate::chtl_log;
use crate::config::Config;
use crate::error::{DiagnosticKind, Diagnostics, ImplementationLimit};
use crate::limits;
use crate::module_resolver::{CanonicalPath, ModuleResolver, Resolution};
use crate::modules;
use crate::namespace::{Definition, Namespace, Symbol, SymbolKind};
use crate::parser;
use crate::session::Session;
use crate::state::StateManager;
use crate::token::Position;

/// A loaded CHTL file and its derived data.
pub struct Document {
    pub filename: String,
    pub tree: ast::Document,
    pub config: Config,

    /// Root symbol table: own definitions plus whatever imports
    /// brought in.
    pub namespace: Namespace,
}

/// Files loaded during one compilation.
#[derive(Default)]
pub struct Resources {
    /// Finished documents by canonical path.
    loaded: HashMap<CanonicalPath, Rc<Document>>,

    /// Currently-loading marker stack; a path found here again closes
    /// an import cycle.
    loading: Vec<(CanonicalPath, String)>,

    /// `(path, alias)` pairs already imported; a re-import with the
    /// same pair is skipped.
    imported: HashSet<(CanonicalPath, Option<String>)>,

    /// Files in the order they finished loading: post-order over the
    /// dependency graph.  Diagnostics are emitted grouped in this
    /// order.
    completion_order: Vec<String>,
}

impl Resources {
    pub fn new() -> Resources {
        Resources::default()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn completion_order(&self) -> &[String] {
        &self.completion_order
    }

    fn cycle_chain(&self, closing: &CanonicalPath) -> String {
        let mut names: Vec<&str> = self
            .loading
            .iter()
            .skip_while(|(p, _)| p != closing)
            .map(|(_, name)| name.as_str())
            .collect();
        if let Some((_, first)) = self.loading.iter().find(|(p, _)| p == closing) {
            names.push(first);
        }
        names.join(" -> ")
    }
}

/// Loads the entry file of a compilation.
pub fn load_entry(
    source: &str,
    filename: &str,
    base_dir: &Path,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) -> Document {
    // Mark the entry file as loading too, so a chain that comes back
    // to it reports the full cycle (`A -> B -> A`).
    let entry_canonical = base_dir.join(filename).canonicalize().ok();
    if let Some(canonical) = entry_canonical.clone() {
        resources.loading.push((
            CanonicalPath::from_canonicalized(canonical),
            filename.to_string(),
        ));
    }

    let document = load_source_with_imports(
        source,
        filename,
        base_dir,
        session,
        diagnostics,
        resources,
        states,
    );

    if entry_canonical.is_some() {
        resources.loading.pop();
    }
    resources.completion_order.push(filename.to_string());

    document
}

fn load_source_with_imports(
    source: &str,
    filename: &str,
    base_dir: &Path,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) -> Document {
    // First parse is a probe with silenced diagnostics and its own
    // scope tracker, only to find `[Configuration]` blocks: `[Name]`
    // rebindings change how the real parse lexes.
    let probe_diagnostics = Diagnostics::new();
    let probe_states = StateManager::new();
    let probe = parser::parse_document(
        source,
        filename,
        &Config::default(),
        &probe_diagnostics,
        &probe_states,
    );
    let config = Config::from_document(&probe, diagnostics);

    let tree = parser::parse_document(source, filename, &config, diagnostics, states);

    let mut document = Document {
        filename: filename.to_string(),
        tree,
        config,
        namespace: Namespace::new(""),
    };

    register_definitions(
        &document.tree.children,
        &mut document.namespace,
        &mut Vec::new(),
        filename,
        diagnostics,
    );

    process_imports(
        &mut document,
        base_dir,
        session,
        diagnostics,
        resources,
        states,
    );

    document
}

/// Walks the tree registering templates, customs, named origins and
/// namespaces into the symbol table.
fn register_definitions(
    nodes: &[Node],
    namespace: &mut Namespace,
    path: &mut Vec<String>,
    filename: &str,
    diagnostics: &Diagnostics,
) {
    for node in nodes {
        match node {
            Node::Template(t) => {
                let symbol = Symbol {
                    name: t.name.clone(),
                    kind: SymbolKind::of_template(t.kind),
                    qualified_name: crate::namespace::qualify(path, &t.name),
                    source_file: filename.to_string(),
                    pos: t.pos,
                    definition: Rc::new(Definition::Template(t.clone())),
                };
                report_conflict(
                    namespace.register(symbol),
                    path,
                    filename,
                    t.pos,
                    diagnostics,
                );
            }
            Node::Custom(c) => {
                let symbol = Symbol {
                    name: c.name.clone(),
                    kind: SymbolKind::of_custom(c.kind),
                    qualified_name: crate::namespace::qualify(path, &c.name),
                    source_file: filename.to_string(),
                    pos: c.pos,
                    definition: Rc::new(Definition::Custom(c.clone())),
                };
                report_conflict(
                    namespace.register(symbol),
                    path,
                    filename,
                    c.pos,
                    diagnostics,
                );
            }
            Node::Origin(o) if !o.is_reference => {
                if let Some(ref name) = o.name {
                    let symbol = Symbol {
                        name: name.clone(),
                        kind: SymbolKind::of_origin(&o.origin_type),
                        qualified_name: crate::namespace::qualify(path, name),
                        source_file: filename.to_string(),
                        pos: o.pos,
                        definition: Rc::new(Definition::Origin(o.clone())),
                    };
                    report_conflict(
                        namespace.register(symbol),
                        path,
                        filename,
                        o.pos,
                        diagnostics,
                    );
                }
            }
            Node::Namespace(block) => {
                path.push(block.name.clone());
                let child = namespace.child_mut_or_insert(&block.name);
                register_definitions(&block.children, child, path, filename, diagnostics);
                path.pop();
            }
            _ => {}
        }
    }
}

fn report_conflict(
    result: Result<(), crate::namespace::Conflict>,
    path: &[String],
    filename: &str,
    pos: Position,
    diagnostics: &Diagnostics,
) {
    if let Err(conflict) = result {
        let kind = if path.is_empty() {
            DiagnosticKind::DuplicateDefinition
        } else {
            DiagnosticKind::NamespaceMergeConflict
        };
        diagnostics.error(kind, filename, pos, conflict.to_string());
    }
}

/// Collects every `[Import]` in document order, including those inside
/// namespace blocks.
fn collect_imports(nodes: &[Node], out: &mut Vec<Import>) {
    for node in nodes {
        match node {
            Node::Import(i) => out.push(i.clone()),
            Node::Namespace(ns) => collect_imports(&ns.children, out),
            _ => {}
        }
    }
}

fn process_imports(
    document: &mut Document,
    base_dir: &Path,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    let mut imports = Vec::new();
    collect_imports(&document.tree.children, &mut imports);
    if imports.is_empty() {
        return;
    }

    let resolver = ModuleResolver::new(base_dir);

    for import in imports {
        process_import(
            document,
            &resolver,
            &import,
            session,
            diagnostics,
            resources,
            states,
        );
    }
}

fn process_import(
    document: &mut Document,
    resolver: &ModuleResolver,
    import: &Import,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    let filename = document.filename.clone();

    // Asset imports without an alias have nothing to bind to.
    if matches!(
        import.kind,
        ImportKind::Html | ImportKind::Style | ImportKind::JavaScript
    ) && import.alias.is_none()
    {
        diagnostics.warning(
            DiagnosticKind::MissingImportAlias,
            &filename,
            import.pos,
            format!(
                "import of '{}' has no 'as' alias and is skipped",
                import.path
            ),
        );
        return;
    }

    let resolution = match resolver.resolve(import) {
        Ok(r) => r,
        Err(e) => {
            let kind = match e {
                crate::module_resolver::ResolutionError::DirectoryGiven { .. } => {
                    DiagnosticKind::DirectoryNotFile
                }
                _ => DiagnosticKind::FileNotFound,
            };
            diagnostics.error(kind, &filename, import.pos, e.to_string());
            return;
        }
    };

    chtl_log!(session, "import: {} -> {:?}", import.path, resolution);

    match (import.kind, resolution) {
        (ImportKind::Html, Resolution::File(path)) => {
            import_asset(document, import, &path, SymbolKind::OriginHtml, diagnostics);
        }
        (ImportKind::Style, Resolution::File(path)) => {
            import_asset(
                document,
                import,
                &path,
                SymbolKind::OriginStyle,
                diagnostics,
            );
        }
        (ImportKind::JavaScript, Resolution::File(path)) => {
            import_asset(
                document,
                import,
                &path,
                SymbolKind::OriginJavascript,
                diagnostics,
            );
        }

        (ImportKind::Chtl, Resolution::File(path)) => {
            import_chtl_file(
                document,
                import,
                &path,
                session,
                diagnostics,
                resources,
                states,
            );
        }
        (ImportKind::Chtl, Resolution::Files(paths)) => {
            for path in paths {
                import_chtl_file(
                    document,
                    import,
                    &path,
                    session,
                    diagnostics,
                    resources,
                    states,
                );
            }
        }
        (ImportKind::Chtl, Resolution::Module { root, submodule }) => {
            import_module(
                document,
                import,
                &root,
                submodule.as_deref(),
                session,
                diagnostics,
                resources,
                states,
            );
        }
        (ImportKind::CJmod, Resolution::Module { root, .. }) => {
            import_cjmod(document, import, &root, diagnostics, states);
        }
        (ImportKind::CJmod, Resolution::File(path)) => {
            // A loose .cjmod file is an archive; the core only reads
            // the unpacked layout.
            diagnostics.error(
                DiagnosticKind::MalformedModule,
                &filename,
                import.pos,
                format!(
                    "'{}' is a packed archive; unpack it to its directory layout first",
                    path
                ),
            );
        }

        (ImportKind::Config, Resolution::File(path)) => {
            import_config(document, import, &path, diagnostics, resources, states);
        }

        (
            ImportKind::TemplateAll | ImportKind::CustomAll | ImportKind::OriginAll,
            Resolution::File(path),
        ) => {
            import_category(
                document,
                import,
                &path,
                session,
                diagnostics,
                resources,
                states,
            );
        }
        (ImportKind::Specific, Resolution::File(path)) => {
            import_specific(
                document,
                import,
                &path,
                session,
                diagnostics,
                resources,
                states,
            );
        }
        (ImportKind::Specific, Resolution::Module { root, submodule }) => {
            import_module(
                document,
                import,
                &root,
                submodule.as_deref(),
                session,
                diagnostics,
                resources,
                states,
            );
        }

        (kind, resolution) => {
            diagnostics.error(
                DiagnosticKind::MalformedModule,
                &filename,
                import.pos,
                format!("import kind {kind:?} cannot use {resolution:?}"),
            );
        }
    }
}

/// Registers an `@Html`/`@Style`/`@JavaScript` asset as a named origin
/// symbol under its alias.
fn import_asset(
    document: &mut Document,
    import: &Import,
    path: &CanonicalPath,
    kind: SymbolKind,
    diagnostics: &Diagnostics,
) {
    let Some(alias) = import.alias.clone() else {
        return;
    };

    let content = match crate::io::read_source(path.as_path()) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.error(
                DiagnosticKind::FileNotFound,
                &document.filename,
                import.pos,
                format!("cannot read '{}': {e}", import.path),
            );
            return;
        }
    };

    let origin_type = match kind {
        SymbolKind::OriginStyle => ast::OriginType::Style,
        SymbolKind::OriginJavascript => ast::OriginType::JavaScript,
        _ => ast::OriginType::Html,
    };

    let symbol = Symbol {
        name: alias.clone(),
        kind,
        qualified_name: alias.clone(),
        source_file: document.filename.clone(),
        pos: import.pos,
        definition: Rc::new(Definition::Origin(ast::Origin {
            origin_type,
            name: Some(alias),
            content,
            is_reference: false,
            pos: import.pos,
        })),
    };

    if let Err(conflict) = document.namespace.register(symbol) {
        diagnostics.error(
            DiagnosticKind::DuplicateDefinition,
            &document.filename,
            import.pos,
            conflict.to_string(),
        );
    }
}

/// Loads one `.chtl` file (through the cache) and returns it.
fn load_file(
    importing_file: &str,
    import_pos: Position,
    path: &CanonicalPath,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) -> Option<Rc<Document>> {
    if let Some(doc) = resources.loaded.get(path) {
        return Some(doc.clone());
    }

    if resources.loading.iter().any(|(p, _)| p == path) {
        let mut chain = resources.cycle_chain(path);
        if chain.is_empty() {
            chain = path.to_string();
        }
        diagnostics.error(
            DiagnosticKind::CyclicImport,
            importing_file,
            import_pos,
            format!("cyclic import: {chain}"),
        );
        return None;
    }

    if resources.loading.len() >= limits::MAX_IMPORT_DEPTH {
        diagnostics.error(
            DiagnosticKind::FileNotFound,
            importing_file,
            import_pos,
            ImplementationLimit::ImportChainTooDeep.to_string(),
        );
        return None;
    }
    if resources.loaded.len() >= limits::MAX_IMPORTED_FILES {
        diagnostics.error(
            DiagnosticKind::FileNotFound,
            importing_file,
            import_pos,
            ImplementationLimit::TooManyImportedFiles.to_string(),
        );
        return None;
    }

    let source = match crate::io::read_source(path.as_path()) {
        Ok(s) => s,
        Err(e) => {
            diagnostics.error(
                DiagnosticKind::FileNotFound,
                importing_file,
                import_pos,
                format!("cannot read '{path}': {e}"),
            );
            return None;
        }
    };

    let display = path.to_string();
    let base_dir = path
        .as_path()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    resources.loading.push((path.clone(), display.clone()));
    let loaded = load_source_with_imports(
        &source,
        &display,
        &base_dir,
        session,
        diagnostics,
        resources,
        states,
    );
    resources.loading.pop();
    resources.completion_order.push(display);

    let loaded = Rc::new(loaded);
    resources.loaded.insert(path.clone(), loaded.clone());
    Some(loaded)
}

fn already_imported(
    resources: &mut Resources,
    path: &CanonicalPath,
    alias: &Option<String>,
) -> bool {
    !resources.imported.insert((path.clone(), alias.clone()))
}

/// `[Import] @Chtl from file` — definitions land in a child namespace
/// named by the alias or the file stem.
fn import_chtl_file(
    document: &mut Document,
    import: &Import,
    path: &CanonicalPath,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    if already_imported(resources, path, &import.alias) {
        return;
    }

    let Some(loaded) = load_file(
        &document.filename,
        import.pos,
        path,
        session,
        diagnostics,
        resources,
        states,
    ) else {
        return;
    };

    let space = import.alias.clone().unwrap_or_else(|| {
        path.as_path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("imported")
            .to_string()
    });

    merge_into_child(
        document,
        &space,
        loaded.namespace.clone(),
        import.pos,
        diagnostics,
    );
}

fn merge_into_child(
    document: &mut Document,
    space: &str,
    incoming: Namespace,
    pos: Position,
    diagnostics: &Diagnostics,
) {
    let child = document.namespace.child_mut_or_insert(space);
    if let Err(conflicts) = child.merge(incoming) {
        for conflict in conflicts {
            diagnostics.error(
                DiagnosticKind::NamespaceMergeConflict,
                &document.filename,
                pos,
                format!("while importing into '{space}': {conflict}"),
            );
        }
    }
}

/// `[Import] @Chtl from Widgets` / `Widgets.Buttons` — a module with
/// the `.cmod` layout.  Exported symbols land in a child namespace
/// named after the module.
fn import_module(
    document: &mut Document,
    import: &Import,
    root: &CanonicalPath,
    submodule: Option<&str>,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    let manifest =
        match modules::read_manifest(root.as_path(), &document.config, diagnostics, states) {
            Ok(m) => m,
            Err(reason) => {
                diagnostics.error(
                    DiagnosticKind::MalformedModule,
                    &document.filename,
                    import.pos,
                    reason,
                );
                return;
            }
        };

    let sources = match submodule {
        Some(sub) => modules::submodule_sources(root.as_path(), sub),
        None => modules::all_sources(root.as_path()),
    };

    if sources.is_empty() {
        diagnostics.error(
            DiagnosticKind::MalformedModule,
            &document.filename,
            import.pos,
            format!(
                "module '{}' has no sources{}",
                manifest.name,
                submodule
                    .map(|s| format!(" in sub-module '{s}'"))
                    .unwrap_or_default()
            ),
        );
        return;
    }

    let mut merged = Namespace::new(manifest.name.clone());
    for source_path in sources {
        let canonical = match source_path.canonicalize() {
            Ok(p) => CanonicalPath::from_canonicalized(p),
            Err(e) => {
                diagnostics.error(
                    DiagnosticKind::FileNotFound,
                    &document.filename,
                    import.pos,
                    format!("cannot resolve '{}': {e}", source_path.display()),
                );
                continue;
            }
        };

        let Some(loaded) = load_file(
            &document.filename,
            import.pos,
            &canonical,
            session,
            diagnostics,
            resources,
            states,
        ) else {
            continue;
        };

        let filtered = filter_exports(&loaded.namespace, &manifest);
        if let Err(conflicts) = merged.merge(filtered) {
            for conflict in conflicts {
                diagnostics.error(
                    DiagnosticKind::NamespaceMergeConflict,
                    &document.filename,
                    import.pos,
                    conflict.to_string(),
                );
            }
        }
    }

    let space = import.alias.clone().unwrap_or(manifest.name);
    merge_into_child(document, &space, merged, import.pos, diagnostics);
}

/// Keeps only manifest-exported templates/customs; origins always
/// pass.
fn filter_exports(namespace: &Namespace, manifest: &modules::ModuleManifest) -> Namespace {
    let mut out = Namespace::new(namespace.name.clone());

    for symbol in namespace.symbols() {
        let keep = match symbol.kind {
            SymbolKind::TemplateStyle => {
                manifest.exports_symbol(DefKind::Style, false, &symbol.name)
            }
            SymbolKind::TemplateElement => {
                manifest.exports_symbol(DefKind::Element, false, &symbol.name)
            }
            SymbolKind::TemplateVar => manifest.exports_symbol(DefKind::Var, false, &symbol.name),
            SymbolKind::CustomStyle => manifest.exports_symbol(DefKind::Style, true, &symbol.name),
            SymbolKind::CustomElement => {
                manifest.exports_symbol(DefKind::Element, true, &symbol.name)
            }
            SymbolKind::CustomVar => manifest.exports_symbol(DefKind::Var, true, &symbol.name),
            _ => true,
        };
        if keep {
            let _ = out.register(symbol.clone());
        }
    }

    for child in namespace.children() {
        let filtered = filter_exports(child, manifest);
        if !filtered.is_empty() {
            let _ = out.child_mut_or_insert(&child.name).merge(filtered);
        }
    }

    out
}

/// `[Import] @CJmod from Fx` — the core reads the manifest and carries
/// any bundled JavaScript sources as a named origin; the CHTL-JS
/// extension machinery itself is external tooling.
fn import_cjmod(
    document: &mut Document,
    import: &Import,
    root: &CanonicalPath,
    diagnostics: &Diagnostics,
    states: &StateManager,
) {
    let manifest =
        match modules::read_manifest(root.as_path(), &document.config, diagnostics, states) {
            Ok(m) => m,
            Err(reason) => {
                diagnostics.error(
                    DiagnosticKind::MalformedModule,
                    &document.filename,
                    import.pos,
                    reason,
                );
                return;
            }
        };

    let mut content = String::new();
    let src = root.as_path().join("src");
    let mut js_files: Vec<_> = std::fs::read_dir(&src)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().map(|e| e == "js").unwrap_or(false))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    js_files.sort();
    for file in js_files {
        if let Ok(text) = crate::io::read_source(&file) {
            content.push_str(&text);
            content.push('\n');
        }
    }

    let name = import.alias.clone().unwrap_or(manifest.name);
    let symbol = Symbol {
        name: name.clone(),
        kind: SymbolKind::OriginJavascript,
        qualified_name: name.clone(),
        source_file: document.filename.clone(),
        pos: import.pos,
        definition: Rc::new(Definition::Origin(ast::Origin {
            origin_type: ast::OriginType::JavaScript,
            name: Some(name),
            content,
            is_reference: false,
            pos: import.pos,
        })),
    };
    if let Err(conflict) = document.namespace.register(symbol) {
        diagnostics.error(
            DiagnosticKind::DuplicateDefinition,
            &document.filename,
            import.pos,
            conflict.to_string(),
        );
    }
}

/// `[Import] @Config from file` — applies the file's configuration
/// block to this document's scalar options.
fn import_config(
    document: &mut Document,
    import: &Import,
    path: &CanonicalPath,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    if already_imported(resources, path, &import.alias) {
        return;
    }

    let source = match crate::io::read_source(path.as_path()) {
        Ok(s) => s,
        Err(e) => {
            diagnostics.error(
                DiagnosticKind::FileNotFound,
                &document.filename,
                import.pos,
                format!("cannot read '{path}': {e}"),
            );
            return;
        }
    };

    let probe_diagnostics = Diagnostics::new();
    let parsed = parser::parse_document(
        &source,
        &path.to_string(),
        &Config::default(),
        &probe_diagnostics,
        states,
    );

    let mut found = false;
    for node in &parsed.children {
        if let Node::Configuration(block) = node {
            document
                .config
                .apply_block(block, &document.filename, diagnostics);
            found = true;
        }
    }

    if !found {
        diagnostics.warning(
            DiagnosticKind::MalformedModule,
            &document.filename,
            import.pos,
            format!("'{}' has no [Configuration] block", import.path),
        );
    }
}

/// `[Import] [Template] from file` and friends — pulls one category of
/// definitions into the root namespace.
fn import_category(
    document: &mut Document,
    import: &Import,
    path: &CanonicalPath,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    if already_imported(resources, path, &import.alias) {
        return;
    }

    let Some(loaded) = load_file(
        &document.filename,
        import.pos,
        path,
        session,
        diagnostics,
        resources,
        states,
    ) else {
        return;
    };

    let wanted = |kind: SymbolKind| match import.kind {
        ImportKind::TemplateAll => matches!(
            kind,
            SymbolKind::TemplateStyle | SymbolKind::TemplateElement | SymbolKind::TemplateVar
        ),
        ImportKind::CustomAll => matches!(
            kind,
            SymbolKind::CustomStyle | SymbolKind::CustomElement | SymbolKind::CustomVar
        ),
        ImportKind::OriginAll => matches!(
            kind,
            SymbolKind::OriginHtml | SymbolKind::OriginStyle | SymbolKind::OriginJavascript
        ),
        _ => false,
    };

    for symbol in loaded.namespace.symbols() {
        if !wanted(symbol.kind) {
            continue;
        }
        if let Err(conflict) = document.namespace.register(symbol.clone()) {
            diagnostics.error(
                DiagnosticKind::DuplicateDefinition,
                &document.filename,
                import.pos,
                conflict.to_string(),
            );
        }
    }
}

/// `[Import] [Custom] @Element Box from file` — pulls exactly one
/// definition into the root namespace.
fn import_specific(
    document: &mut Document,
    import: &Import,
    path: &CanonicalPath,
    session: &Session,
    diagnostics: &Diagnostics,
    resources: &mut Resources,
    states: &StateManager,
) {
    let Some(loaded) = load_file(
        &document.filename,
        import.pos,
        path,
        session,
        diagnostics,
        resources,
        states,
    ) else {
        return;
    };

    let (Some(def_kind), Some(ref name)) = (import.specific_kind, &import.specific_name) else {
        diagnostics.error(
            DiagnosticKind::MalformedDefinition,
            &document.filename,
            import.pos,
            "specific import needs a type tag and a name",
        );
        return;
    };

    let kind = if import.is_custom {
        SymbolKind::of_custom(def_kind)
    } else {
        SymbolKind::of_template(def_kind)
    };

    let Some(symbol) = loaded.namespace.lookup(name, kind) else {
        diagnostics.error(
            DiagnosticKind::UnknownSymbol,
            &document.filename,
            import.pos,
            format!("'{}' has no {} '{}'", import.path, kind.describe(), name),
        );
        return;
    };

    let mut symbol = symbol.clone();
    if let Some(ref alias) = import.alias {
        symbol.name = alias.clone();
        symbol.qualified_name = alias.clone();
    }

    if let Err(conflict) = document.namespace.register(symbol) {
        diagnostics.error(
            DiagnosticKind::DuplicateDefinition,
            &document.filename,
            import.pos,
            conflict.to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_source_registers_definitions() {
        let diag = Diagnostics::new();
        let mut resources = Resources::new();
        let doc = load_entry(
            "[Template] @Style S { color: red; }\n[Custom] @Element Box { div { } }",
            "main.chtl",
            Path::new("."),
            &Session::new_for_test_suite(),
            &diag,
            &mut resources,
            &StateManager::new(),
        );

        assert!(diag.is_empty());
        assert!(doc
            .namespace
            .lookup("S", SymbolKind::TemplateStyle)
            .is_some());
        assert!(doc
            .namespace
            .lookup("Box", SymbolKind::CustomElement)
            .is_some());
    }

    #[test]
    fn namespace_definitions_register_under_child() {
        let diag = Diagnostics::new();
        let mut resources = Resources::new();
        let doc = load_entry(
            "[Namespace] ui { [Template] @Style S { color: red; } }",
            "main.chtl",
            Path::new("."),
            &Session::new_for_test_suite(),
            &diag,
            &mut resources,
            &StateManager::new(),
        );

        let ui = doc.namespace.child("ui").expect("ui namespace");
        let s = ui.lookup("S", SymbolKind::TemplateStyle).expect("S");
        assert_eq!(s.qualified_name, "ui::S");
    }

    #[test]
    fn duplicate_definition_reports() {
        let diag = Diagnostics::new();
        let mut resources = Resources::new();
        load_entry(
            "[Template] @Style S { color: red; }\n[Template] @Style S { color: blue; }",
            "main.chtl",
            Path::new("."),
            &Session::new_for_test_suite(),
            &diag,
            &mut resources,
            &StateManager::new(),
        );

        assert_eq!(diag.error_count(), 1);
        let d = &diag.snapshot()[0];
        assert_eq!(d.kind, DiagnosticKind::DuplicateDefinition);
    }

    #[test]
    fn reopened_namespace_merges_when_conflict_free() {
        let diag = Diagnostics::new();
        let mut resources = Resources::new();
        let doc = load_entry(
            "[Namespace] ui { [Template] @Style A { color: red; } }\n\
             [Namespace] ui { [Template] @Style B { color: blue; } }",
            "main.chtl",
            Path::new("."),
            &Session::new_for_test_suite(),
            &diag,
            &mut resources,
            &StateManager::new(),
        );

        assert!(diag.is_empty());
        let ui = doc.namespace.child("ui").unwrap();
        assert!(ui.lookup("A", SymbolKind::TemplateStyle).is_some());
        assert!(ui.lookup("B", SymbolKind::TemplateStyle).is_some());
    }
}
