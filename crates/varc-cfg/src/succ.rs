//! Successor computation.
//!
//! `succ` dispatches on the node's variant to find where control enters
//! next, then iteratively expands pass-through wrappers (if, loops,
//! switch, compound) into their entry-level leaves. Sibling resolution
//! goes through the `#ifdef` block selection; a partial cover climbs to
//! the parent construct and asks what follows at that level.

use rustc_hash::FxHashSet;

use varc_ast::{Node, NodeId, NodeKind};
use varc_feat::FeatureExpr;

use crate::blocks::{determine_following_elements, Resolved};
use crate::filters;
use crate::{dedupe, CfgDiagnostic, ControlFlow};

/// Wrappers that never appear as leaf CFG nodes: entering them transfers
/// control onward. `case`/`default` stay leaves -- they are jump targets.
fn is_pass_through(node: &Node) -> bool {
    matches!(
        node.kind(),
        NodeKind::IfStatement { .. }
            | NodeKind::ElifStatement { .. }
            | NodeKind::SwitchStatement { .. }
            | NodeKind::CompoundStatement { .. }
            | NodeKind::WhileStatement { .. }
            | NodeKind::DoStatement { .. }
            | NodeKind::ForStatement { .. }
    )
}

impl ControlFlow<'_> {
    /// Conditional successors of `node`, unique by identity, in source
    /// order at each expansion level. Memoized.
    pub fn succ(&self, node: &Node) -> Vec<Node> {
        if let Some(hit) = self.succ_cache.borrow().get(&node.node_id()) {
            return hit.clone();
        }
        let ctx = self.index().presence_condition(node);
        let first = self.succ_dispatch(node, &ctx);
        let result = dedupe(self.expand_succ(first));
        self.succ_cache.borrow_mut().insert(node.node_id(), result.clone());
        result
    }

    fn succ_dispatch(&self, node: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        match node.kind() {
            NodeKind::FunctionDef { body, .. } => {
                self.enter_body(body, ctx, vec![node.clone()])
            }
            NodeKind::ReturnStatement { .. } => match self.index().enclosing_function(node) {
                Some(function) => vec![function],
                None => {
                    self.report(CfgDiagnostic::ReturnOutsideFunction { node: node.describe() });
                    vec![]
                }
            },
            NodeKind::BreakStatement => {
                let owner = self.nearest_ancestor(node, |n| n.captures_break());
                match owner {
                    Some(owner) => self.follow_succ(&owner, ctx),
                    None => {
                        self.report(CfgDiagnostic::BreakOutsideLoop { node: node.describe() });
                        vec![]
                    }
                }
            }
            NodeKind::ContinueStatement => {
                let owner = self.nearest_ancestor(node, Node::is_loop);
                match owner {
                    Some(owner) => self.loop_continuation(&owner, ctx),
                    None => {
                        self.report(CfgDiagnostic::ContinueOutsideLoop {
                            node: node.describe(),
                        });
                        vec![]
                    }
                }
            }
            NodeKind::GotoStatement { target } => self.goto_targets(node, target, ctx),
            NodeKind::CaseStatement { body: Some(body), .. }
            | NodeKind::DefaultStatement { body: Some(body) } => {
                let fallback = self.follow_succ(node, ctx);
                self.enter_body(body, ctx, fallback)
            }
            _ if is_pass_through(node) => self.enter_construct(node, ctx),
            // Leaf statements and expressions fall through to whatever
            // comes next at their level.
            _ => self.follow_succ(node, ctx),
        }
    }

    /// Where control goes upon *entering* a pass-through construct.
    fn enter_construct(&self, node: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        match node.kind() {
            NodeKind::IfStatement { condition, .. }
            | NodeKind::ElifStatement { condition, .. }
            | NodeKind::WhileStatement { condition, .. } => vec![condition.clone()],
            NodeKind::SwitchStatement { expr, .. } => vec![expr.clone()],
            NodeKind::DoStatement { condition, body } => {
                self.enter_body(body, ctx, vec![condition.clone()])
            }
            NodeKind::ForStatement { init, condition, body, .. } => {
                if let Some(init) = init {
                    vec![init.clone()]
                } else if let Some(condition) = condition {
                    vec![condition.clone()]
                } else {
                    let fallback = self.loop_continuation(node, ctx);
                    self.enter_body(body, ctx, fallback)
                }
            }
            NodeKind::CompoundStatement { .. } => {
                let fallback = self.follow_succ(node, ctx);
                self.enter_body(node, ctx, fallback)
            }
            _ => vec![],
        }
    }

    /// Entry into a statement used as a body: a compound selects its first
    /// reachable elements (with `fallback` for configurations where none
    /// is present); any other statement is entered directly.
    pub(crate) fn enter_body(
        &self,
        stmt: &Node,
        ctx: &FeatureExpr,
        fallback: Vec<Node>,
    ) -> Vec<Node> {
        match stmt.kind() {
            NodeKind::CompoundStatement { items } => {
                let siblings: Vec<(FeatureExpr, Node)> = items
                    .iter()
                    .map(|opt| (self.index().presence_condition(&opt.value), opt.value.clone()))
                    .collect();
                match determine_following_elements(self.oracle(), ctx, &siblings) {
                    Resolved::Complete(nodes) => nodes,
                    Resolved::Partial(mut nodes) => {
                        nodes.extend(fallback);
                        nodes
                    }
                }
            }
            _ => vec![stmt.clone()],
        }
    }

    /// The point a `continue` jumps to: the increment of a `for`, the
    /// condition of `while`/`do`, the loop start of a header-less `for`.
    pub(crate) fn loop_continuation(&self, owner: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        match owner.kind() {
            NodeKind::WhileStatement { condition, .. }
            | NodeKind::DoStatement { condition, .. } => vec![condition.clone()],
            NodeKind::ForStatement { increment, condition, body, .. } => {
                if let Some(increment) = increment {
                    vec![increment.clone()]
                } else if let Some(condition) = condition {
                    vec![condition.clone()]
                } else {
                    // for (;;): back to the top of the body.
                    self.enter_body(body, ctx, vec![])
                }
            }
            _ => vec![],
        }
    }

    /// Next elements at `x`'s own level: sibling selection first, then the
    /// parent construct while the cover stays partial.
    pub(crate) fn follow_succ(&self, x: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let siblings = self.index().siblings_after(x);
        if !siblings.is_empty() {
            match determine_following_elements(self.oracle(), ctx, &siblings) {
                Resolved::Complete(nodes) => return nodes,
                Resolved::Partial(mut nodes) => {
                    nodes.extend(self.follow_up(x, ctx));
                    return nodes;
                }
            }
        }
        self.follow_up(x, ctx)
    }

    fn follow_up(&self, x: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let Some(parent) = self.index().parent(x).cloned() else {
            return vec![];
        };
        match parent.kind() {
            NodeKind::FunctionDef { body, .. } => {
                if x == body {
                    // Fall-through off the end of the function body.
                    vec![parent.clone()]
                } else {
                    vec![]
                }
            }
            NodeKind::CompoundStatement { .. } => self.follow_succ(&parent, ctx),
            NodeKind::IfStatement { condition, then_branch, .. } => {
                if x == condition {
                    let exit = self.follow_succ(&parent, ctx);
                    let mut out = self.enter_body(then_branch, ctx, exit);
                    out.extend(self.else_path(&parent, None, ctx));
                    out
                } else {
                    // End of the then or else branch.
                    self.follow_succ(&parent, ctx)
                }
            }
            NodeKind::ElifStatement { condition, then_branch } => {
                let Some(owning_if) = self.index().parent(&parent).cloned() else {
                    return vec![];
                };
                if x == condition {
                    let exit = self.follow_succ(&owning_if, ctx);
                    let mut out = self.enter_body(then_branch, ctx, exit);
                    out.extend(self.else_path(&owning_if, Some(&parent), ctx));
                    out
                } else {
                    self.follow_succ(&owning_if, ctx)
                }
            }
            NodeKind::SwitchStatement { expr, body } => {
                if x == expr {
                    let mut out =
                        filters::filter_case_statements(self.index(), self.oracle(), body, ctx);
                    let defaults =
                        filters::filter_default_statements(self.index(), self.oracle(), body, ctx);
                    let has_default = !defaults.is_empty();
                    out.extend(defaults);
                    if !has_default {
                        out.extend(self.follow_succ(&parent, ctx));
                    }
                    out
                } else {
                    // Fell off the end of the switch body.
                    self.follow_succ(&parent, ctx)
                }
            }
            NodeKind::WhileStatement { condition, .. } => {
                if x == condition {
                    let mut out = self.while_body_entry(&parent, ctx);
                    out.extend(self.follow_succ(&parent, ctx));
                    out
                } else {
                    vec![condition.clone()]
                }
            }
            NodeKind::DoStatement { condition, .. } => {
                if x == condition {
                    let mut out = self.while_body_entry(&parent, ctx);
                    out.extend(self.follow_succ(&parent, ctx));
                    out
                } else {
                    vec![condition.clone()]
                }
            }
            NodeKind::ForStatement { init, condition, increment, body } => {
                if init.as_ref() == Some(x) {
                    if let Some(condition) = condition {
                        vec![condition.clone()]
                    } else {
                        let fallback = self.loop_continuation(&parent, ctx);
                        self.enter_body(body, ctx, fallback)
                    }
                } else if condition.as_ref() == Some(x) {
                    let fallback = self.loop_continuation(&parent, ctx);
                    let mut out = self.enter_body(body, ctx, fallback);
                    out.extend(self.follow_succ(&parent, ctx));
                    out
                } else if increment.as_ref() == Some(x) {
                    if let Some(condition) = condition {
                        vec![condition.clone()]
                    } else {
                        let fallback = self.loop_continuation(&parent, ctx);
                        self.enter_body(body, ctx, fallback)
                    }
                } else {
                    // End of the loop body.
                    self.loop_continuation(&parent, ctx)
                }
            }
            NodeKind::CaseStatement { value, body } => {
                if x == value {
                    match body {
                        Some(body) => {
                            let fallback = self.follow_succ(&parent, ctx);
                            self.enter_body(body, ctx, fallback)
                        }
                        None => self.follow_succ(&parent, ctx),
                    }
                } else {
                    self.follow_succ(&parent, ctx)
                }
            }
            NodeKind::DefaultStatement { .. } | NodeKind::LabelStatement { .. } => {
                self.follow_succ(&parent, ctx)
            }
            // Wrapper statements and nested expressions: the successor of
            // a sub-expression is the successor of the construct it sits
            // in.
            _ => self.succ_dispatch(&parent, ctx),
        }
    }

    /// The false-edge path of an `if`: the first reachable elif arms after
    /// `after` (or from the start), then the else branch or the statement
    /// after the `if`.
    fn else_path(&self, if_node: &Node, after: Option<&Node>, ctx: &FeatureExpr) -> Vec<Node> {
        let NodeKind::IfStatement { elifs, else_branch, .. } = if_node.kind() else {
            return vec![];
        };
        let mut remaining: Vec<(FeatureExpr, Node)> = Vec::new();
        let mut seen_anchor = after.is_none();
        for opt in elifs {
            if seen_anchor {
                remaining.push((self.index().presence_condition(&opt.value), opt.value.clone()));
            } else if Some(&opt.value) == after {
                seen_anchor = true;
            }
        }
        let tail = || match else_branch {
            Some(els) => {
                let exit = self.follow_succ(if_node, ctx);
                self.enter_body(els, ctx, exit)
            }
            None => self.follow_succ(if_node, ctx),
        };
        if remaining.is_empty() {
            return tail();
        }
        match determine_following_elements(self.oracle(), ctx, &remaining) {
            Resolved::Complete(nodes) => nodes,
            Resolved::Partial(mut nodes) => {
                nodes.extend(tail());
                nodes
            }
        }
    }

    fn while_body_entry(&self, loop_node: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        match loop_node.kind() {
            NodeKind::WhileStatement { condition, body }
            | NodeKind::DoStatement { condition, body } => {
                self.enter_body(body, ctx, vec![condition.clone()])
            }
            _ => vec![],
        }
    }

    fn goto_targets(&self, goto: &Node, target: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let Some(function) = self.index().enclosing_function(goto) else {
            self.report(CfgDiagnostic::GotoWithoutTarget {
                name: target.name().unwrap_or("<computed>").to_string(),
                node: goto.describe(),
            });
            return vec![];
        };
        let NodeKind::FunctionDef { body, .. } = function.kind() else {
            return vec![];
        };
        match target.kind() {
            NodeKind::Id { name } => {
                let labels = filters::filter_label_statements(
                    self.index(),
                    self.oracle(),
                    body,
                    ctx,
                    Some(name),
                );
                if labels.is_empty() {
                    // Malformed goto: recover with ordinary fall-through.
                    self.report(CfgDiagnostic::GotoWithoutTarget {
                        name: name.clone(),
                        node: goto.describe(),
                    });
                    self.follow_succ(goto, ctx)
                } else {
                    labels
                }
            }
            // Computed goto: any label in the function is a target.
            _ => filters::filter_label_statements(self.index(), self.oracle(), body, ctx, None),
        }
    }

    fn nearest_ancestor(&self, node: &Node, pred: impl Fn(&Node) -> bool) -> Option<Node> {
        let mut cursor = self.index().parent(node).cloned();
        while let Some(current) = cursor {
            if pred(&current) {
                return Some(current);
            }
            cursor = self.index().parent(&current).cloned();
        }
        None
    }

    /// Iteratively replace pass-through wrappers by their entry leaves. A
    /// revisited wrapper contributes nothing further, which terminates
    /// degenerate cycles such as `for (;;) {}`.
    fn expand_succ(&self, mut nodes: Vec<Node>) -> Vec<Node> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        loop {
            let mut changed = false;
            let mut out = Vec::with_capacity(nodes.len());
            for node in nodes {
                if is_pass_through(&node) {
                    changed = true;
                    if visited.insert(node.node_id()) {
                        let ctx = self.index().presence_condition(&node);
                        out.extend(self.enter_construct(&node, &ctx));
                    }
                } else {
                    out.push(node);
                }
            }
            nodes = out;
            if !changed {
                return nodes;
            }
        }
    }
}
