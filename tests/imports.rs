//! Import resolution: search order, aliases, wildcards, module
//! archives, deduplication and cycles.  Fixtures are created on the
//! fly in a temporary directory.

use std::fs;
use std::path::Path;

use chtl::{Compiler, DiagnosticKind};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn compile_entry(dir: &TempDir, name: &str) -> chtl::CompilationOutput {
    Compiler::new()
        .compile_file(dir.path().join(name))
        .expect("compilation should not abort")
}

#[test]
fn chtl_import_lands_in_a_namespace() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "lib.chtl",
        "[Template] @Style Card { color: red; padding: 4px; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from ./lib.chtl;\n\
         div { style { @Style Card from lib; } }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.html.contains("color: red"));
}

#[test]
fn import_alias_renames_the_namespace() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "widgets.chtl",
        "[Template] @Style Button { cursor: pointer; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from ./widgets.chtl as ui;\n\
         a { style { @Style Button from ui; } }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.html.contains("cursor: pointer"));
}

#[test]
fn asset_import_without_alias_warns_and_skips() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "theme.css", ".x { color: red }");
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Style from theme.css;\ndiv { }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty());
    assert!(output
        .warnings
        .iter()
        .any(|w| w.kind == DiagnosticKind::MissingImportAlias));
    assert!(!output.css.contains("color: red"));
}

#[test]
fn asset_import_with_alias_is_usable_as_origin() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "theme.css", ".x { color: red }");
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Style from theme as theme;\n\
         [Origin] @Style theme;\n\
         div { }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.css.contains(".x { color: red }"));
}

#[test]
fn bare_name_search_uses_default_extensions() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "snippets.js", "function s() {}");
    write(
        dir.path(),
        "main.chtl",
        "[Import] @JavaScript from snippets as snippets;\n\
         [Origin] @JavaScript snippets;\n\
         div { }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.js.contains("function s() {}"));
}

#[test]
fn missing_file_reports_and_drops_the_import_only() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from ./nope.chtl;\ndiv { id: here; }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output
        .errors
        .iter()
        .any(|e| e.kind == DiagnosticKind::FileNotFound));
    // The rest of the file still compiles.
    assert!(output.html.contains(r#"<div id="here"></div>"#));
}

#[test]
fn directory_path_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("things")).unwrap();
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from ./things;\ndiv { }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output
        .errors
        .iter()
        .any(|e| e.kind == DiagnosticKind::DirectoryNotFile));
}

#[test]
fn wildcard_import_expands_sorted() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "parts/a.chtl",
        "[Template] @Style A { color: red; }",
    );
    write(
        dir.path(),
        "parts/b.chtl",
        "[Template] @Style B { color: blue; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from parts/*;\n\
         div { style { @Style A from a; } }\n\
         span { style { @Style B from b; } }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.html.contains("color: red"));
    assert!(output.html.contains("color: blue"));
}

#[test]
fn specific_import_pulls_one_symbol_into_root() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "lib.chtl",
        "[Custom] @Element Box { div { class: box; } }\n\
         [Custom] @Element Unused { p { } }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] [Custom] @Element Box from ./lib.chtl;\n\
         body { @Element Box; }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.html.contains(r#"<div class="box"></div>"#));
}

#[test]
fn reimport_with_same_path_and_alias_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "lib.chtl",
        "[Template] @Style Card { color: red; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from ./lib.chtl;\n\
         [Import] @Chtl from ./lib.chtl;\n\
         div { style { @Style Card from lib; } }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
}

#[test]
fn cyclic_import_names_the_chain() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "a.chtl",
        "[Import] @Chtl from ./b.chtl;\ndiv { id: a; }",
    );
    write(
        dir.path(),
        "b.chtl",
        "[Import] @Chtl from ./a.chtl;\ndiv { id: b; }",
    );

    let output = compile_entry(&dir, "a.chtl");
    let cyclic: Vec<_> = output
        .errors
        .iter()
        .filter(|e| e.kind == DiagnosticKind::CyclicImport)
        .collect();
    assert_eq!(cyclic.len(), 1);
    assert!(cyclic[0].message.contains("a.chtl"));
    assert!(cyclic[0].message.contains("b.chtl"));

    // The entry file still compiles with the cycling import dropped.
    assert!(output.html.contains(r#"<div id="a"></div>"#));
}

#[test]
fn cmod_module_layout_with_manifest_and_submodule() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "module/Widgets.cmod/info/Widgets.chtl",
        "[Info] { name: \"Widgets\"; version: \"1.0.0\"; }\n\
         [Export] { @Style Card; }",
    );
    write(
        dir.path(),
        "module/Widgets.cmod/src/Basics/card.chtl",
        "[Template] @Style Card { border: 1px solid; }\n\
         [Template] @Style Hidden { display: none; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from Widgets.Basics;\n\
         div { style { @Style Card from Widgets; } }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert!(output.html.contains("border: 1px solid"));
}

#[test]
fn cmod_export_list_filters_symbols() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "module/Widgets.cmod/info/Widgets.chtl",
        "[Info] { name: \"Widgets\"; }\n\
         [Export] { @Style Card; }",
    );
    write(
        dir.path(),
        "module/Widgets.cmod/src/Basics/card.chtl",
        "[Template] @Style Card { border: 1px solid; }\n\
         [Template] @Style Hidden { display: none; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from Widgets;\n\
         div { style { @Style Hidden from Widgets; } }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output
        .errors
        .iter()
        .any(|e| e.kind == DiagnosticKind::UnknownSymbol));
}

#[test]
fn module_without_manifest_is_malformed() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "module/Broken.cmod/src/Basics/x.chtl",
        "[Template] @Style X { color: red; }",
    );
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from Broken;\ndiv { }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output
        .errors
        .iter()
        .any(|e| e.kind == DiagnosticKind::MalformedModule));
}

#[test]
fn diagnostics_follow_import_resolution_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "inner.chtl", "div { ??? }");
    write(
        dir.path(),
        "main.chtl",
        "[Import] @Chtl from ./inner.chtl;\n\
         span { !!! }",
    );

    let output = compile_entry(&dir, "main.chtl");
    assert!(output.errors.len() >= 2);
    // Post-order over the dependency graph: the imported file's
    // diagnostics come before the entry file's.
    let first_inner = output
        .errors
        .iter()
        .position(|e| e.file.contains("inner.chtl"))
        .expect("no diagnostic from inner.chtl");
    let first_main = output
        .errors
        .iter()
        .position(|e| e.file.contains("main.chtl"))
        .expect("no diagnostic from main.chtl");
    assert!(first_inner < first_main);
}
