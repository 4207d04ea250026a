//! Determine which files an `[Import]` statement refers to.
//!
//! The resolver holds the directories an import may draw from and
//! resolves each path form the language allows: bare names (searched
//! with the kind's default extensions), explicit paths, dotted module
//! paths (`chtl.space` picks the `space` sub-module of the `chtl`
//! module), and wildcards (`base/*`, `base/*.css`, `ns.*`).
//!
//! Search order depends on the import kind: asset imports (`@Html`,
//! `@Style`, `@JavaScript`) look in the importing file's directory
//! only; module imports (`@Chtl`, `@CJmod`) look in the official
//! module directory, then the local `module/` sub-directory, then the
//! importing file's directory.  For `@Chtl` bare names, `.cmod` is
//! preferred over `.chtl`.
//!
//! Successful resolutions are canonicalized into [`CanonicalPath`],
//! which is the key of the import graph: two spellings of the same
//! file deduplicate, and cycles are detected on the canonical form.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::ast::{Import, ImportKind};

/// Environment variable naming the official module directory.
pub const MODULE_PATH_ENV: &str = "CHTL_MODULE_PATH";

/// A canonicalized, existing filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath(PathBuf);

impl CanonicalPath {
    fn new(path: &Path) -> std::io::Result<CanonicalPath> {
        Ok(CanonicalPath(path.canonicalize()?))
    }

    /// Wraps a path the caller has already canonicalized.
    pub fn from_canonicalized(path: PathBuf) -> CanonicalPath {
        CanonicalPath(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl Deref for CanonicalPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug)]
pub enum ResolutionError {
    /// No candidate file exists in any searched directory.
    NotFound { path: String },

    /// The path names a directory where a file is required.
    DirectoryGiven { path: String },

    /// The path resolved but could not be canonicalized.
    Io(std::io::Error),
}

impl std::error::Error for ResolutionError {}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::NotFound { path } => write!(f, "cannot find '{path}'"),
            ResolutionError::DirectoryGiven { path } => {
                write!(f, "'{path}' is a directory; a file is required")
            }
            ResolutionError::Io(e) => write!(f, "I/O error while resolving import: {e}"),
        }
    }
}

impl From<std::io::Error> for ResolutionError {
    fn from(e: std::io::Error) -> ResolutionError {
        ResolutionError::Io(e)
    }
}

/// What an import resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A single source or asset file.
    File(CanonicalPath),

    /// A wildcard expansion, in sorted order.
    Files(Vec<CanonicalPath>),

    /// A module directory (`.cmod`/`.cjmod` layout), optionally with a
    /// sub-module selector.
    Module {
        root: CanonicalPath,
        submodule: Option<String>,
    },
}

#[derive(Clone)]
pub struct ModuleResolver {
    /// Directory of the importing file; relative paths resolve here.
    base_dir: PathBuf,

    /// Official module directory, from `CHTL_MODULE_PATH`.
    official_dir: Option<PathBuf>,
}

impl ModuleResolver {
    pub fn new(base_dir: &Path) -> ModuleResolver {
        let official_dir = std::env::var_os(MODULE_PATH_ENV).map(PathBuf::from);
        ModuleResolver {
            base_dir: base_dir.to_path_buf(),
            official_dir,
        }
    }

    pub fn with_official_dir(base_dir: &Path, official_dir: Option<PathBuf>) -> ModuleResolver {
        ModuleResolver {
            base_dir: base_dir.to_path_buf(),
            official_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves one import statement.
    pub fn resolve(&self, import: &Import) -> Result<Resolution, ResolutionError> {
        let path = import.path.as_str();

        match import.kind {
            ImportKind::Html => self.resolve_asset(path, &["html", "htm"]),
            ImportKind::Style => self.resolve_asset(path, &["css"]),
            ImportKind::JavaScript => self.resolve_asset(path, &["js"]),
            ImportKind::Chtl => self.resolve_module(path, "cmod", &["chtl"]),
            ImportKind::CJmod => self.resolve_module(path, "cjmod", &[]),
            ImportKind::Config
            | ImportKind::TemplateAll
            | ImportKind::CustomAll
            | ImportKind::OriginAll
            | ImportKind::Specific => self.resolve_module(path, "cmod", &["chtl"]),
        }
    }

    /// Asset imports search the importing file's directory only.
    fn resolve_asset(
        &self,
        path: &str,
        extensions: &[&str],
    ) -> Result<Resolution, ResolutionError> {
        if path.contains('*') {
            return self.expand_wildcard(&self.base_dir, path, extensions);
        }

        let direct = self.base_dir.join(path);
        if direct.is_file() {
            return Ok(Resolution::File(CanonicalPath::new(&direct)?));
        }
        if direct.is_dir() {
            return Err(ResolutionError::DirectoryGiven {
                path: path.to_string(),
            });
        }

        if is_bare_name(path) {
            for ext in extensions {
                let candidate = self.base_dir.join(format!("{path}.{ext}"));
                if candidate.is_file() {
                    return Ok(Resolution::File(CanonicalPath::new(&candidate)?));
                }
            }
        }

        Err(ResolutionError::NotFound {
            path: path.to_string(),
        })
    }

    /// Module imports search official dir, then `module/`, then the
    /// importing file's directory.
    fn resolve_module(
        &self,
        path: &str,
        module_ext: &str,
        source_exts: &[&str],
    ) -> Result<Resolution, ResolutionError> {
        if ends_with_separator(path) {
            return Err(ResolutionError::DirectoryGiven {
                path: path.to_string(),
            });
        }

        for dir in self.search_dirs() {
            if path.contains('*') {
                // Dotted wildcards (`ns.*`) map dots to directory
                // separators; slash forms pass through unchanged.
                let pattern = match path.strip_suffix(".*") {
                    Some(prefix) if !path.contains('/') => {
                        format!("{}/*", prefix.replace('.', "/"))
                    }
                    _ => path.to_string(),
                };
                match self.expand_wildcard(&dir, &pattern, source_exts) {
                    Ok(r) => return Ok(r),
                    Err(ResolutionError::NotFound { .. }) => continue,
                    Err(e) => return Err(e),
                }
            }

            if let Some(resolution) = self.try_module_in(&dir, path, module_ext, source_exts)? {
                return Ok(resolution);
            }
        }

        Err(ResolutionError::NotFound {
            path: path.to_string(),
        })
    }

    fn try_module_in(
        &self,
        dir: &Path,
        path: &str,
        module_ext: &str,
        source_exts: &[&str],
    ) -> Result<Option<Resolution>, ResolutionError> {
        // Explicit path, possibly with extension.
        let direct = dir.join(path);
        if direct.is_file() {
            return Ok(Some(Resolution::File(CanonicalPath::new(&direct)?)));
        }
        if direct.is_dir() {
            if direct.extension().map(|e| e == module_ext).unwrap_or(false) {
                return Ok(Some(Resolution::Module {
                    root: CanonicalPath::new(&direct)?,
                    submodule: None,
                }));
            }
            return Err(ResolutionError::DirectoryGiven {
                path: path.to_string(),
            });
        }

        if is_bare_name(path) {
            // Prefer the module layout over a loose source file.
            let module = dir.join(format!("{path}.{module_ext}"));
            if module.is_dir() {
                return Ok(Some(Resolution::Module {
                    root: CanonicalPath::new(&module)?,
                    submodule: None,
                }));
            }
            for ext in source_exts {
                let candidate = dir.join(format!("{path}.{ext}"));
                if candidate.is_file() {
                    return Ok(Some(Resolution::File(CanonicalPath::new(&candidate)?)));
                }
            }
            return Ok(None);
        }

        // Dotted module path: `A.B` is sub-module B of module A.
        if let Some((module_name, submodule)) = dotted_module(path) {
            let module = dir.join(format!("{module_name}.{module_ext}"));
            if module.is_dir() {
                return Ok(Some(Resolution::Module {
                    root: CanonicalPath::new(&module)?,
                    submodule: Some(submodule),
                }));
            }
        }

        Ok(None)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(ref official) = self.official_dir {
            dirs.push(official.clone());
        }
        dirs.push(self.base_dir.join("module"));
        dirs.push(self.base_dir.clone());
        dirs
    }

    /// `base/*` and `base/*.ext` expand to every matching file in the
    /// resolved base directory, sorted for determinism.
    fn expand_wildcard(
        &self,
        dir: &Path,
        pattern: &str,
        default_exts: &[&str],
    ) -> Result<Resolution, ResolutionError> {
        let (sub_dir, file_pattern) = match pattern.rsplit_once('/') {
            Some((d, f)) => (dir.join(d), f.to_string()),
            None => (dir.to_path_buf(), pattern.to_string()),
        };

        if !sub_dir.is_dir() {
            return Err(ResolutionError::NotFound {
                path: pattern.to_string(),
            });
        }

        let wanted_ext = file_pattern.strip_prefix("*.").map(str::to_string);

        let mut matches = Vec::new();
        for entry in std::fs::read_dir(&sub_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();

            let keep = match &wanted_ext {
                Some(w) => &ext == w,
                None => default_exts.is_empty() || default_exts.contains(&ext.as_str()),
            };
            if keep {
                matches.push(CanonicalPath::new(&path)?);
            }
        }

        if matches.is_empty() {
            return Err(ResolutionError::NotFound {
                path: pattern.to_string(),
            });
        }

        matches.sort_by(|a, b| a.as_path().cmp(b.as_path()));
        Ok(Resolution::Files(matches))
    }
}

fn is_bare_name(path: &str) -> bool {
    !path.contains('/') && !path.contains('\\') && !path.contains('.')
}

fn ends_with_separator(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}

/// Splits `A.B[.C]` into module `A` and sub-module path `B[/C]`.
/// Returns `None` when the "extension" is a real file extension.
fn dotted_module(path: &str) -> Option<(String, String)> {
    if path.contains('/') || path.contains('\\') {
        return None;
    }
    let (module, rest) = path.split_once('.')?;
    if rest.is_empty() || matches!(rest, "chtl" | "cmod" | "cjmod" | "css" | "js" | "html") {
        return None;
    }
    Some((module.to_string(), rest.replace('.', "/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_detection() {
        assert!(is_bare_name("theme"));
        assert!(!is_bare_name("theme.css"));
        assert!(!is_bare_name("dir/theme"));
    }

    #[test]
    fn dotted_module_split() {
        assert_eq!(
            dotted_module("chtl.space"),
            Some(("chtl".to_string(), "space".to_string()))
        );
        assert_eq!(
            dotted_module("a.b.c"),
            Some(("a".to_string(), "b/c".to_string()))
        );
        assert_eq!(dotted_module("theme.css"), None);
        assert_eq!(dotted_module("plain"), None);
    }
}
