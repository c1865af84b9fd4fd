//! Variability-aware C syntax trees.
//!
//! The AST produced by an `#ifdef`-aware front end represents every
//! configuration at once: list elements carry presence conditions
//! ([`Opt`]), alternative values split on feature expressions
//! ([`Conditional`]), and every node has a stable identity ([`NodeId`])
//! that downstream analyses key their maps on. Parent, sibling, and
//! presence queries go through the [`AstIndex`] side tables; the tree
//! itself stays immutable and back-pointer free.

pub mod build;
mod cond;
mod index;
mod node;

pub use cond::{Conditional, Opt};
pub use index::AstIndex;
pub use node::{declarator_id, ChildGroup, Node, NodeId, NodeKind};
