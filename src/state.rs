//! Per-compilation phase, scope and node-state tracking.
//!
//! One [`StateManager`] exists per compilation.  It validates phase
//! transitions against an explicit table, keeps the scope stack, and
//! tracks a small state machine per processed node.  Scopes are pushed
//! through [`ScopeGuard`] values that pop on drop, so a failure inside
//! a nested scope never leaves the stack unbalanced — the release runs
//! on every exit path, unwinding included.
//!
//! Violations of the tables are programmer errors
//! ([`InternalError`]), never input errors: malformed input must be
//! caught long before it could sequence the phases wrong.

use bitflags::bitflags;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::InternalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Lex,
    Parse,
    Semantic,
    Optimize,
    Generate,
    Finalize,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Lex => "lex",
            Phase::Parse => "parse",
            Phase::Semantic => "semantic",
            Phase::Optimize => "optimize",
            Phase::Generate => "generate",
            Phase::Finalize => "finalize",
        }
    }

    /// The permitted-transition table.  Optimize may be skipped;
    /// finalize is reachable from any phase past parsing so an
    /// aborting compilation can still run its teardown.
    pub fn can_transition(self, to: Phase) -> bool {
        use Phase::*;

        matches!(
            (self, to),
            (Init, Lex)
                | (Lex, Parse)
                | (Parse, Semantic)
                | (Semantic, Optimize)
                | (Semantic, Generate)
                | (Optimize, Generate)
                | (Generate, Finalize)
                | (Semantic, Finalize)
                | (Optimize, Finalize)
                | (Parse, Finalize)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    File,
    Namespace,
    Template,
    Custom,
    Element,
    Attribute,
    StyleBlock,
    ScriptBlock,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    Created,
    Parsing,
    Parsed,
    Validating,
    Validated,
    Transforming,
    Transformed,
    Generating,
    Generated,
    Error,
    Deprecated,
    Deleted,
}

impl NodeState {
    pub fn name(self) -> &'static str {
        match self {
            NodeState::Uninitialized => "uninitialized",
            NodeState::Created => "created",
            NodeState::Parsing => "parsing",
            NodeState::Parsed => "parsed",
            NodeState::Validating => "validating",
            NodeState::Validated => "validated",
            NodeState::Transforming => "transforming",
            NodeState::Transformed => "transformed",
            NodeState::Generating => "generating",
            NodeState::Generated => "generated",
            NodeState::Error => "error",
            NodeState::Deprecated => "deprecated",
            NodeState::Deleted => "deleted",
        }
    }

    pub fn can_transition(self, to: NodeState) -> bool {
        use NodeState::*;

        // The sinks accept entry from anywhere; deletion is the only
        // move out of one.
        match to {
            Deleted => return self != Deleted,
            Error => return !matches!(self, Error | Deleted),
            _ => {}
        }
        if matches!(self, Error | Deprecated | Deleted) {
            return false;
        }

        matches!(
            (self, to),
            (Uninitialized, Created)
                | (Created, Parsing)
                | (Parsing, Parsed)
                | (Parsed, Validating)
                | (Validating, Validated)
                | (Validated, Transforming)
                | (Transforming, Transformed)
                | (Validated, Generating)
                | (Transformed, Generating)
                | (Generating, Generated)
                | (Validated, Deprecated)
                | (Transformed, Deprecated)
                | (Generated, Deprecated)
        )
    }
}

bitflags! {
    /// Ancillary node attributes, orthogonal to the state machine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u16 {
        const TEMPLATE_NODE       = 1 << 0;
        const CUSTOM_NODE         = 1 << 1;
        const DYNAMIC             = 1 << 2;
        const STATIC              = 1 << 3;
        const OPTIMIZED           = 1 << 4;
        const CACHEABLE           = 1 << 5;
        const REQUIRES_VALIDATION = 1 << 6;
        const HAS_DEPS            = 1 << 7;
        const CROSS_REF           = 1 << 8;
        const DEBUG_INFO          = 1 << 9;
    }
}

#[derive(Debug, Clone)]
struct Scope {
    kind: ScopeKind,
    name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct NodeEntry {
    state: NodeState,
    flags: NodeFlags,
}

/// Opaque handle to a tracked node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(usize);

struct Inner {
    phase: Phase,
    scopes: Vec<Scope>,
    nodes: Vec<NodeEntry>,
}

/// Tracks compilation phase, context scopes and per-node states.
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct StateManager {
    inner: Rc<RefCell<Inner>>,
}

impl Default for StateManager {
    fn default() -> Self {
        StateManager::new()
    }
}

impl StateManager {
    pub fn new() -> StateManager {
        StateManager {
            inner: Rc::new(RefCell::new(Inner {
                phase: Phase::Init,
                scopes: Vec::new(),
                nodes: Vec::new(),
            })),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.borrow().phase
    }

    pub fn enter_phase(&self, to: Phase) -> Result<(), InternalError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.phase.can_transition(to) {
            return Err(InternalError::IllegalPhaseTransition {
                from: inner.phase.name(),
                to: to.name(),
            });
        }
        inner.phase = to;
        Ok(())
    }

    pub fn scope_depth(&self) -> usize {
        self.inner.borrow().scopes.len()
    }

    pub fn current_scope(&self) -> Option<ScopeKind> {
        self.inner.borrow().scopes.last().map(|s| s.kind)
    }

    /// Name of the innermost named scope, for diagnostics.
    pub fn current_scope_name(&self) -> Option<String> {
        self.inner
            .borrow()
            .scopes
            .iter()
            .rev()
            .find_map(|s| s.name.clone())
    }

    /// Pushes a scope; the returned guard pops it on drop.
    pub fn push_scope(&self, kind: ScopeKind, name: Option<String>) -> ScopeGuard {
        self.inner.borrow_mut().scopes.push(Scope { kind, name });
        ScopeGuard {
            manager: self.clone(),
        }
    }

    fn pop_scope(&self) {
        let popped = self.inner.borrow_mut().scopes.pop();
        debug_assert!(popped.is_some(), "scope stack underflow");
    }

    /// Registers a node in the `Created` state.
    pub fn register_node(&self, flags: NodeFlags) -> NodeHandle {
        let mut inner = self.inner.borrow_mut();
        inner.nodes.push(NodeEntry {
            state: NodeState::Created,
            flags,
        });
        NodeHandle(inner.nodes.len() - 1)
    }

    pub fn node_state(&self, handle: NodeHandle) -> NodeState {
        self.inner.borrow().nodes[handle.0].state
    }

    pub fn node_flags(&self, handle: NodeHandle) -> NodeFlags {
        self.inner.borrow().nodes[handle.0].flags
    }

    pub fn add_flags(&self, handle: NodeHandle, flags: NodeFlags) {
        self.inner.borrow_mut().nodes[handle.0].flags |= flags;
    }

    pub fn transition(&self, handle: NodeHandle, to: NodeState) -> Result<(), InternalError> {
        let mut inner = self.inner.borrow_mut();
        let entry = &mut inner.nodes[handle.0];
        if !entry.state.can_transition(to) {
            return Err(InternalError::IllegalNodeTransition {
                from: entry.state.name(),
                to: to.name(),
            });
        }
        entry.state = to;
        Ok(())
    }

    pub fn tracked_node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Flags of every tracked node, in registration order.
    pub fn tracked_flags(&self) -> Vec<NodeFlags> {
        self.inner.borrow().nodes.iter().map(|n| n.flags).collect()
    }
}

/// Pops its scope when dropped, on every exit path.
pub struct ScopeGuard {
    manager: StateManager,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.manager.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_chain_in_order() {
        let manager = StateManager::new();
        assert_eq!(manager.phase(), Phase::Init);

        for phase in [
            Phase::Lex,
            Phase::Parse,
            Phase::Semantic,
            Phase::Optimize,
            Phase::Generate,
            Phase::Finalize,
        ] {
            manager.enter_phase(phase).unwrap();
        }
        assert_eq!(manager.phase(), Phase::Finalize);
    }

    #[test]
    fn optimize_may_be_skipped() {
        let manager = StateManager::new();
        manager.enter_phase(Phase::Lex).unwrap();
        manager.enter_phase(Phase::Parse).unwrap();
        manager.enter_phase(Phase::Semantic).unwrap();
        manager.enter_phase(Phase::Generate).unwrap();
    }

    #[test]
    fn illegal_phase_transition_is_internal_error() {
        let manager = StateManager::new();
        let err = manager.enter_phase(Phase::Generate).unwrap_err();
        assert_eq!(
            err,
            InternalError::IllegalPhaseTransition {
                from: "init",
                to: "generate"
            }
        );
    }

    #[test]
    fn scope_guard_releases_on_unwind() {
        let manager = StateManager::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _outer = manager.push_scope(ScopeKind::File, Some("main.chtl".to_string()));
            let _inner = manager.push_scope(ScopeKind::Element, Some("div".to_string()));
            assert_eq!(manager.scope_depth(), 2);
            assert_eq!(manager.current_scope(), Some(ScopeKind::Element));
            assert_eq!(manager.current_scope_name().as_deref(), Some("div"));
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(manager.scope_depth(), 0);
    }

    #[test]
    fn node_state_machine() {
        let manager = StateManager::new();
        let node = manager.register_node(NodeFlags::TEMPLATE_NODE);
        assert_eq!(manager.node_state(node), NodeState::Created);

        manager.transition(node, NodeState::Parsing).unwrap();
        manager.transition(node, NodeState::Parsed).unwrap();
        manager.transition(node, NodeState::Validating).unwrap();
        manager.transition(node, NodeState::Validated).unwrap();
        manager.transition(node, NodeState::Generating).unwrap();
        manager.transition(node, NodeState::Generated).unwrap();

        let err = manager.transition(node, NodeState::Parsing).unwrap_err();
        assert_eq!(
            err,
            InternalError::IllegalNodeTransition {
                from: "generated",
                to: "parsing"
            }
        );
    }

    #[test]
    fn sinks_are_terminal() {
        let manager = StateManager::new();
        let node = manager.register_node(NodeFlags::empty());
        manager.transition(node, NodeState::Error).unwrap();
        assert!(manager.transition(node, NodeState::Parsing).is_err());
        // Error -> Deleted is the one legal move out of a sink.
        manager.transition(node, NodeState::Deleted).unwrap();
        assert!(manager.transition(node, NodeState::Error).is_err());
    }

    #[test]
    fn flags_accumulate() {
        let manager = StateManager::new();
        let node = manager.register_node(NodeFlags::DYNAMIC);
        manager.add_flags(node, NodeFlags::CACHEABLE | NodeFlags::HAS_DEPS);
        let flags = manager.node_flags(node);
        assert!(flags.contains(NodeFlags::DYNAMIC));
        assert!(flags.contains(NodeFlags::CACHEABLE));
        assert!(!flags.contains(NodeFlags::OPTIMIZED));
    }
}
