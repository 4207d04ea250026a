//! Reading the `.cmod` / `.cjmod` module layout.
//!
//! A module is a directory (archives are unpacked by external tooling;
//! the core only consumes the directory form) laid out as:
//!
//! ```text
//! Widgets.cmod/
//!   info/Widgets.chtl      manifest: [Info] metadata + [Export] list
//!   src/Buttons/*.chtl     sub-module sources
//!   src/Forms/*.chtl
//! ```
//!
//! A `.cjmod` mirrors the layout but holds CHTL-JS extension sources.

use std::path::{Path, PathBuf};

use crate::ast::{self, Node};
use crate::config::Config;
use crate::error::Diagnostics;
use crate::parser;
use crate::state::StateManager;

/// Parsed manifest of a module.
#[derive(Debug, Clone, Default)]
pub struct ModuleManifest {
    pub name: String,
    pub info: Vec<(String, String)>,
    pub exports: Vec<ast::ExportEntry>,
}

impl ModuleManifest {
    /// Whether the manifest exports a symbol of the given kind and
    /// name.  A manifest with no `[Export]` block exports everything.
    pub fn exports_symbol(&self, kind: ast::DefKind, is_custom: bool, name: &str) -> bool {
        if self.exports.is_empty() {
            return true;
        }
        self.exports.iter().any(|e| {
            e.kind == kind && e.is_custom == is_custom && e.names.iter().any(|n| n == name)
        })
    }
}

/// The module name implied by the directory: `Widgets.cmod` →
/// `Widgets`.
pub fn module_name(root: &Path) -> String {
    root.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Reads and parses `info/<Module>.chtl`.
///
/// Returns a human-readable reason on failure; the caller turns it
/// into a `malformed-module` diagnostic against the import site.
pub fn read_manifest(
    root: &Path,
    config: &Config,
    diagnostics: &Diagnostics,
    states: &StateManager,
) -> Result<ModuleManifest, String> {
    let name = module_name(root);
    let manifest_path = root.join("info").join(format!("{name}.chtl"));

    if !manifest_path.is_file() {
        return Err(format!(
            "module '{name}' has no manifest at {}",
            manifest_path.display()
        ));
    }

    let source = crate::io::read_source(&manifest_path).map_err(|e| e.to_string())?;
    let doc = parser::parse_document(
        &source,
        &manifest_path.display().to_string(),
        config,
        diagnostics,
        states,
    );

    let mut manifest = ModuleManifest {
        name,
        ..ModuleManifest::default()
    };

    for node in &doc.children {
        match node {
            Node::Info(info) => {
                for entry in &info.entries {
                    manifest.info.push((entry.key.clone(), entry.value.clone()));
                }
            }
            Node::Export(export) => {
                manifest.exports.extend(export.entries.iter().cloned());
            }
            _ => {}
        }
    }

    if manifest.info.is_empty() && manifest.exports.is_empty() {
        return Err(format!(
            "manifest {} has neither [Info] nor [Export]",
            manifest_path.display()
        ));
    }

    Ok(manifest)
}

/// Source files of one sub-module: `src/<Sub>/*.chtl`, sorted.
pub fn submodule_sources(root: &Path, submodule: &str) -> Vec<PathBuf> {
    sources_in(&root.join("src").join(submodule))
}

/// Source files of every sub-module, plus any loose `src/*.chtl`.
pub fn all_sources(root: &Path) -> Vec<PathBuf> {
    let src = root.join("src");
    let mut files = sources_in(&src);

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(&src)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    subdirs.sort();

    for dir in subdirs {
        files.extend(sources_in(&dir));
    }
    files
}

fn sources_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().map(|e| e == "chtl").unwrap_or(false))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DefKind;

    #[test]
    fn module_name_strips_extension() {
        assert_eq!(module_name(Path::new("/x/Widgets.cmod")), "Widgets");
        assert_eq!(module_name(Path::new("Fx.cjmod")), "Fx");
    }

    #[test]
    fn empty_export_list_exports_everything() {
        let manifest = ModuleManifest::default();
        assert!(manifest.exports_symbol(DefKind::Style, false, "Anything"));
    }

    #[test]
    fn export_list_filters() {
        let manifest = ModuleManifest {
            name: "M".to_string(),
            info: vec![],
            exports: vec![ast::ExportEntry {
                kind: DefKind::Style,
                is_custom: false,
                names: vec!["Card".to_string()],
                pos: crate::token::Position::default(),
            }],
        };

        assert!(manifest.exports_symbol(DefKind::Style, false, "Card"));
        assert!(!manifest.exports_symbol(DefKind::Style, false, "Other"));
        assert!(!manifest.exports_symbol(DefKind::Element, false, "Card"));
    }
}
