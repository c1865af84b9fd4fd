//! CFG consistency checking.
//!
//! A well-formed graph is symmetric: `b ∈ succ(a)` exactly when
//! `a ∈ pred(b)`. The verifier walks a set of nodes, checks both
//! directions for every edge, and reports each mismatch with the presence
//! condition it occurred under. Findings are diagnostics, not failures.

use varc_ast::{Node, NodeKind};

use crate::{CfgDiagnostic, ControlFlow};

/// The leaf CFG nodes of a function: the entry/exit sentinel, statement
/// leaves, and the header expressions control flows through.
pub fn cfg_nodes(function: &Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut work = vec![function.clone()];
    while let Some(node) = work.pop() {
        match node.kind() {
            NodeKind::FunctionDef { body, .. } => {
                out.push(node.clone());
                work.push(body.clone());
            }
            NodeKind::CompoundStatement { items } => {
                for opt in items.iter().rev() {
                    work.push(opt.value.clone());
                }
            }
            NodeKind::IfStatement { condition, then_branch, elifs, else_branch } => {
                out.push(condition.clone());
                for opt in elifs.iter().rev() {
                    work.push(opt.value.clone());
                }
                if let Some(els) = else_branch {
                    work.push(els.clone());
                }
                work.push(then_branch.clone());
            }
            NodeKind::ElifStatement { condition, then_branch } => {
                out.push(condition.clone());
                work.push(then_branch.clone());
            }
            NodeKind::SwitchStatement { expr, body } => {
                out.push(expr.clone());
                work.push(body.clone());
            }
            NodeKind::WhileStatement { condition, body } => {
                out.push(condition.clone());
                work.push(body.clone());
            }
            NodeKind::DoStatement { condition, body } => {
                out.push(condition.clone());
                work.push(body.clone());
            }
            NodeKind::ForStatement { init, condition, increment, body } => {
                out.extend(init.clone());
                out.extend(condition.clone());
                out.extend(increment.clone());
                work.push(body.clone());
            }
            NodeKind::CaseStatement { body, .. } | NodeKind::DefaultStatement { body } => {
                out.push(node.clone());
                if let Some(body) = body {
                    work.push(body.clone());
                }
            }
            // Leaf statements are CFG nodes themselves.
            NodeKind::DeclarationStatement { .. }
            | NodeKind::ExprStatement { .. }
            | NodeKind::BreakStatement
            | NodeKind::ContinueStatement
            | NodeKind::ReturnStatement { .. }
            | NodeKind::GotoStatement { .. }
            | NodeKind::LabelStatement { .. }
            | NodeKind::EmptyStatement => out.push(node.clone()),
            _ => {}
        }
    }
    out
}

/// For every edge produced by one direction, verify the mirror edge
/// exists. Returns the mismatches; an empty result means the relation is
/// symmetric over `nodes`.
pub fn compare_succ_with_pred(cf: &ControlFlow<'_>, nodes: &[Node]) -> Vec<CfgDiagnostic> {
    let mut findings = Vec::new();
    for a in nodes {
        let condition = cf.index().presence_condition(a).to_string();
        for b in cf.succ(a) {
            if !cf.pred(&b).contains(a) {
                findings.push(CfgDiagnostic::MissingPredEdge {
                    from: a.describe(),
                    to: b.describe(),
                    condition: condition.clone(),
                });
            }
        }
        for b in cf.pred(a) {
            if !cf.succ(&b).contains(a) {
                findings.push(CfgDiagnostic::MissingSuccEdge {
                    from: a.describe(),
                    to: b.describe(),
                    condition: condition.clone(),
                });
            }
        }
    }
    findings
}
