//! Variability-aware control-flow graphs.
//!
//! [`ControlFlow`] computes conditional successors and predecessors of AST
//! nodes on demand. A function's `FunctionDef` node doubles as its entry
//! and exit sentinel: the successor of a `return` is the enclosing
//! `FunctionDef`, and the predecessors of a `FunctionDef` are every
//! `return` plus the fall-through end of its body.
//!
//! `#ifdef` variability is resolved at sibling lists: consecutive siblings
//! with equivalent presence conditions form one block, and the engine
//! selects the reachable block heads under the source node's context,
//! continuing into the parent level only while the selected alternatives
//! do not cover it. Both directions are memoized per node identity and
//! return stable, duplicate-free lists.

use std::cell::RefCell;
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::warn;

use varc_ast::{AstIndex, Node, NodeId};
use varc_feat::FeatureOracle;

pub mod blocks;
pub mod filters;
mod pred;
mod succ;
mod verify;

pub use blocks::{determine_following_elements, group_ifdef_blocks, Resolved};
pub use verify::{cfg_nodes, compare_succ_with_pred};

/// Structured findings from CFG construction and verification. None of
/// them abort an analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CfgDiagnostic {
    BreakOutsideLoop { node: String },
    ContinueOutsideLoop { node: String },
    ReturnOutsideFunction { node: String },
    GotoWithoutTarget { name: String, node: String },
    /// `to ∈ succ(from)` but `from ∉ pred(to)`.
    MissingPredEdge { from: String, to: String, condition: String },
    /// `to ∈ pred(from)` but `from ∉ succ(to)`.
    MissingSuccEdge { from: String, to: String, condition: String },
}

impl fmt::Display for CfgDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakOutsideLoop { node } => {
                write!(f, "break outside loop or switch: {node}")
            }
            Self::ContinueOutsideLoop { node } => write!(f, "continue outside loop: {node}"),
            Self::ReturnOutsideFunction { node } => {
                write!(f, "return outside function: {node}")
            }
            Self::GotoWithoutTarget { name, node } => {
                write!(f, "goto {name} has no target label: {node}")
            }
            Self::MissingPredEdge { from, to, condition } => {
                write!(f, "{to} is a successor of {from} but lacks the pred edge (under {condition})")
            }
            Self::MissingSuccEdge { from, to, condition } => {
                write!(f, "{to} is a predecessor of {from} but lacks the succ edge (under {condition})")
            }
        }
    }
}

impl std::error::Error for CfgDiagnostic {}

/// One analysis session: borrowed tree services plus memoized edges.
pub struct ControlFlow<'a> {
    index: &'a AstIndex,
    oracle: &'a FeatureOracle,
    succ_cache: RefCell<FxHashMap<NodeId, Vec<Node>>>,
    pred_cache: RefCell<FxHashMap<NodeId, Vec<Node>>>,
    diagnostics: RefCell<Vec<CfgDiagnostic>>,
}

impl<'a> ControlFlow<'a> {
    pub fn new(index: &'a AstIndex, oracle: &'a FeatureOracle) -> Self {
        ControlFlow {
            index,
            oracle,
            succ_cache: RefCell::new(FxHashMap::default()),
            pred_cache: RefCell::new(FxHashMap::default()),
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    pub fn index(&self) -> &AstIndex {
        self.index
    }

    pub fn oracle(&self) -> &FeatureOracle {
        self.oracle
    }

    /// Diagnostics accumulated so far, draining the session's buffer.
    pub fn take_diagnostics(&self) -> Vec<CfgDiagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    pub(crate) fn report(&self, diagnostic: CfgDiagnostic) {
        warn!(%diagnostic, "control-flow construction");
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

/// Keep the first occurrence of every identity, preserving order.
pub(crate) fn dedupe(nodes: Vec<Node>) -> Vec<Node> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    nodes.into_iter().filter(|n| seen.insert(n.node_id())).collect()
}
