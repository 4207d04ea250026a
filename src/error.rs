//! Error types.

use std::cell::RefCell;
use std::error;
use std::fmt;
use std::io;
use std::rc::Rc;

use crate::token::Position;

/// Coarse taxonomy for diagnostics.
///
/// Every variant maps to a machine-stable tag through
/// [`DiagnosticKind::tag`]; the tag is part of the crate's public
/// contract and never changes spelling once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    // Lexical
    UnterminatedString,
    UnknownCharacter,

    // Syntactic
    UnexpectedToken,
    MissingToken,
    MalformedDefinition,
    UnexpectedEof,

    // Semantic
    UnknownSymbol,
    SymbolKindMismatch,
    NamespaceMergeConflict,
    DuplicateDefinition,
    CyclicImport,
    CyclicInheritance,
    MissingImportAlias,
    UnfilledValueSlot,
    DuplicateId,

    // Constraint
    DisallowedInContext,
    ExceptViolation,

    // Resolution
    FileNotFound,
    MalformedModule,
    DirectoryNotFile,

    // Scanner
    UnclosedFragment,
}

impl DiagnosticKind {
    /// The machine-stable kind tag.
    pub fn tag(self) -> &'static str {
        use DiagnosticKind::*;

        match self {
            UnterminatedString => "unterminated-string",
            UnknownCharacter => "unknown-character",
            UnexpectedToken => "unexpected-token",
            MissingToken => "missing-token",
            MalformedDefinition => "malformed-definition",
            UnexpectedEof => "unexpected-eof",
            UnknownSymbol => "unknown-symbol",
            SymbolKindMismatch => "symbol-kind-mismatch",
            NamespaceMergeConflict => "namespace-merge-conflict",
            DuplicateDefinition => "duplicate-definition",
            CyclicImport => "cyclic-import",
            CyclicInheritance => "cyclic-inheritance",
            MissingImportAlias => "missing-import-alias",
            UnfilledValueSlot => "unfilled-value-slot",
            DuplicateId => "duplicate-id",
            DisallowedInContext => "disallowed-in-context",
            ExceptViolation => "except-violation",
            FileNotFound => "file-not-found",
            MalformedModule => "malformed-module",
            DirectoryNotFile => "directory-not-file",
            UnclosedFragment => "unclosed-fragment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A single user-facing diagnostic.
///
/// Formats as `file:line:col: severity[tag]: message`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub file: String,
    pub pos: Position,
    pub message: String,

    /// A short source excerpt around the offending position, when the
    /// reporting phase had the source at hand.
    pub excerpt: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(
            f,
            "{}:{}: {}[{}]: {}",
            self.file,
            self.pos,
            severity,
            self.kind.tag(),
            self.message
        )?;

        if let Some(ref excerpt) = self.excerpt {
            write!(f, " (near {excerpt:?})")?;
        }

        Ok(())
    }
}

/// Shared collector for diagnostics.
///
/// Many phases report diagnostics while holding other borrows (the
/// parser reports while the lexer is live, the generator while walking
/// the tree), so the collector is a cheap-to-clone handle over shared
/// storage.  A compilation is single threaded, so plain `Rc<RefCell>`
/// is enough.
#[derive(Clone, Default)]
pub struct Diagnostics {
    inner: Rc<RefCell<Vec<Diagnostic>>>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn error(
        &self,
        kind: DiagnosticKind,
        file: impl Into<String>,
        pos: Position,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            kind,
            severity: Severity::Error,
            file: file.into(),
            pos,
            message: message.into(),
            excerpt: None,
        });
    }

    pub fn warning(
        &self,
        kind: DiagnosticKind,
        file: impl Into<String>,
        pos: Position,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic {
            kind,
            severity: Severity::Warning,
            file: file.into(),
            pos,
            message: message.into(),
            excerpt: None,
        });
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.inner.borrow_mut().push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.inner
            .borrow()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Re-establishes source order within each file.
    ///
    /// Lexer and parser each append as they go; the two interleave by
    /// construction, but recovery paths can report slightly out of
    /// order.  The sort is stable, so diagnostics at the same position
    /// keep their reporting order.
    pub fn sort_within_files(&self) {
        self.inner
            .borrow_mut()
            .sort_by_key(|d| (d.file.clone(), d.pos.offset));
    }

    /// Orders diagnostics for final output: files grouped in the given
    /// order (import-resolution post-order, entry file last), source
    /// order within each file.  Files not in the list (module
    /// manifests, probe passes) sort after the known ones, by name.
    pub fn sort_for_output(&self, file_order: &[String]) {
        let rank = |file: &str| -> usize {
            file_order
                .iter()
                .position(|f| f == file)
                .unwrap_or(usize::MAX)
        };

        self.inner
            .borrow_mut()
            .sort_by_key(|d| (rank(&d.file), d.file.clone(), d.pos.offset));
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.borrow_mut())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.inner.borrow().clone()
    }
}

/// A particular implementation-defined limit was exceeded; see the
/// `limits` module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationLimit {
    /// A scanner slice could not be closed within the hard maximum
    /// window.
    SliceTooLarge,

    /// Too many files were loaded through imports.
    TooManyImportedFiles,

    /// The import chain is nested too deeply.
    ImportChainTooDeep,

    /// Blocks are nested too deeply for the parser to follow.
    NestingTooDeep,

    /// Template/custom inheritance recursion went too deep.
    ExpansionTooDeep,
}

impl fmt::Display for ImplementationLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ImplementationLimit::SliceTooLarge => write!(
                f,
                "scanner slice exceeds the maximum window; continuing on partial input"
            ),
            ImplementationLimit::TooManyImportedFiles => {
                write!(f, "exceeded the maximum number of imported files")
            }
            ImplementationLimit::ImportChainTooDeep => {
                write!(f, "exceeded the maximum import nesting depth")
            }
            ImplementationLimit::NestingTooDeep => {
                write!(f, "exceeded the maximum block nesting depth")
            }
            ImplementationLimit::ExpansionTooDeep => {
                write!(f, "exceeded the maximum template expansion depth")
            }
        }
    }
}

/// Errors that can happen while loading a CHTL document or one of its
/// imports.
#[non_exhaustive]
#[derive(Debug)]
pub enum LoadingError {
    /// Could not read a file.
    Io(io::Error),

    /// The file's bytes do not decode as text in a supported encoding.
    Decode(String),

    /// A particular implementation-defined limit was exceeded.
    LimitExceeded(ImplementationLimit),
}

impl error::Error for LoadingError {}

impl fmt::Display for LoadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LoadingError::Io(ref e) => write!(f, "I/O error: {e}"),
            LoadingError::Decode(ref s) => write!(f, "could not decode input: {s}"),
            LoadingError::LimitExceeded(ref l) => write!(f, "{l}"),
        }
    }
}

impl From<io::Error> for LoadingError {
    fn from(e: io::Error) -> LoadingError {
        LoadingError::Io(e)
    }
}

/// Programmer errors inside the compiler itself.
///
/// These are never produced for malformed input; they indicate a bug in
/// phase or node-state sequencing and abort the whole compilation with a
/// distinguished status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalError {
    IllegalPhaseTransition {
        from: &'static str,
        to: &'static str,
    },
    IllegalNodeTransition {
        from: &'static str,
        to: &'static str,
    },
    ScopeStackUnderflow,
}

impl error::Error for InternalError {}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            InternalError::IllegalPhaseTransition { from, to } => {
                write!(f, "illegal phase transition: {from} -> {to}")
            }
            InternalError::IllegalNodeTransition { from, to } => {
                write!(f, "illegal node state transition: {from} -> {to}")
            }
            InternalError::ScopeStackUnderflow => write!(f, "scope stack underflow"),
        }
    }
}

/// Top-level error for a compilation run.
///
/// Recoverable problems (bad syntax, unknown symbols, constraint
/// violations) are *not* errors at this level; they end up in the
/// output's diagnostic lists and the compilation still produces its
/// three streams.  `CompileError` is for the cases where there is
/// nothing sensible to return at all.
#[non_exhaustive]
#[derive(Debug)]
pub enum CompileError {
    Loading(LoadingError),
    Internal(InternalError),
}

impl error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CompileError::Loading(ref e) => write!(f, "loading error: {e}"),
            CompileError::Internal(ref e) => write!(f, "internal error: {e}"),
        }
    }
}

impl From<LoadingError> for CompileError {
    fn from(e: LoadingError) -> CompileError {
        CompileError::Loading(e)
    }
}

impl From<InternalError> for CompileError {
    fn from(e: InternalError) -> CompileError {
        CompileError::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_formats_with_tag() {
        let d = Diagnostic {
            kind: DiagnosticKind::UnexpectedToken,
            severity: Severity::Error,
            file: "main.chtl".to_string(),
            pos: Position::new(3, 7, 40),
            message: "expected '{'".to_string(),
            excerpt: None,
        };

        assert_eq!(
            d.to_string(),
            "main.chtl:3:7: error[unexpected-token]: expected '{'"
        );
    }

    #[test]
    fn diagnostics_sort_is_stable_per_file() {
        let diag = Diagnostics::new();
        diag.error(
            DiagnosticKind::UnknownSymbol,
            "b.chtl",
            Position::new(1, 1, 0),
            "one",
        );
        diag.error(
            DiagnosticKind::UnknownSymbol,
            "a.chtl",
            Position::new(2, 1, 10),
            "two",
        );
        diag.error(
            DiagnosticKind::UnknownSymbol,
            "a.chtl",
            Position::new(1, 1, 0),
            "three",
        );

        diag.sort_within_files();
        let all = diag.take();
        assert_eq!(all[0].message, "three");
        assert_eq!(all[1].message, "two");
        assert_eq!(all[2].message, "one");
    }
}
