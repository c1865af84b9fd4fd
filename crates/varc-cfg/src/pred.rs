//! Predecessor computation.
//!
//! The mirror of the successor walk: previous siblings are selected with
//! the same `#ifdef` block machinery (nearest first), and every candidate
//! is *rolled up* into its real exit points -- the last statements of a
//! compound, the branch tails of an `if`, breaks and the condition of a
//! loop, the break/default tails of a `switch`. Jump statements never
//! fall through, so they roll up to nothing; their flow re-enters the
//! graph at their targets (labels collect gotos, loop exits collect
//! breaks, function exits collect returns).

use rustc_hash::FxHashSet;

use varc_ast::{Node, NodeId, NodeKind};
use varc_feat::FeatureExpr;

use crate::blocks::{determine_following_elements, Resolved};
use crate::filters;
use crate::{dedupe, ControlFlow};

impl ControlFlow<'_> {
    /// Conditional predecessors of `node`, unique by identity, nearest
    /// predecessor first. Memoized.
    pub fn pred(&self, node: &Node) -> Vec<Node> {
        if let Some(hit) = self.pred_cache.borrow().get(&node.node_id()) {
            return hit.clone();
        }
        let ctx = self.index().presence_condition(node);
        let result = dedupe(self.pred_dispatch(node, &ctx));
        self.pred_cache.borrow_mut().insert(node.node_id(), result.clone());
        result
    }

    fn pred_dispatch(&self, x: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        match x.kind() {
            // Exit sentinel: every return plus the fall-through end of the
            // body.
            NodeKind::FunctionDef { body, .. } => {
                let mut out =
                    filters::filter_return_statements(self.index(), self.oracle(), body, ctx);
                out.extend(self.function_exit_tail(body, ctx, x));
                out
            }
            NodeKind::LabelStatement { .. } => {
                let mut out = self.gotos_targeting(x, ctx);
                out.extend(self.pred_general(x, ctx));
                out
            }
            // Jump targets of a switch: the controlling expression, plus
            // fall-through from the preceding case chain (jumps excluded
            // by roll-up).
            NodeKind::CaseStatement { .. } | NodeKind::DefaultStatement { .. } => {
                let mut out = Vec::new();
                if let Some(switch) = self.nearest_switch(x) {
                    if let NodeKind::SwitchStatement { expr, .. } = switch.kind() {
                        out.push(expr.clone());
                    }
                }
                out.extend(self.pred_general(x, ctx));
                out
            }
            NodeKind::ElifStatement { .. } => self.elif_sources(x, ctx),
            _ => self.pred_general(x, ctx),
        }
    }

    /// Previous elements at `x`'s own level, rolled up to exit points;
    /// climbs to the parent while the sibling cover stays partial.
    fn pred_general(&self, x: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let siblings = self.index().siblings_before(x);
        if !siblings.is_empty() {
            match determine_following_elements(self.oracle(), ctx, &siblings) {
                Resolved::Complete(nodes) => return self.roll_up_all(nodes, ctx),
                Resolved::Partial(nodes) => {
                    let mut out = self.roll_up_all(nodes, ctx);
                    out.extend(self.climb_pred(x, ctx));
                    return out;
                }
            }
        }
        self.climb_pred(x, ctx)
    }

    fn climb_pred(&self, x: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let Some(parent) = self.index().parent(x).cloned() else {
            return vec![];
        };
        match parent.kind() {
            NodeKind::FunctionDef { body, .. } => {
                if x == body {
                    // Entry edge into the body.
                    vec![parent.clone()]
                } else {
                    vec![]
                }
            }
            NodeKind::CompoundStatement { .. } => self.pred_general(&parent, ctx),
            NodeKind::IfStatement { condition, then_branch, else_branch, .. } => {
                if x == condition {
                    self.pred_general(&parent, ctx)
                } else if x == then_branch {
                    vec![condition.clone()]
                } else if else_branch.as_ref() == Some(x) {
                    // False edge of the last reachable arm; the then
                    // branch is a parallel arm and is not rolled up.
                    self.else_edge_sources(&parent, ctx)
                } else {
                    vec![]
                }
            }
            NodeKind::ElifStatement { condition, .. } => {
                if x == condition {
                    self.elif_sources(&parent, ctx)
                } else {
                    vec![condition.clone()]
                }
            }
            NodeKind::SwitchStatement { expr, .. } => {
                if x == expr {
                    self.pred_general(&parent, ctx)
                } else {
                    // The body is entered through its case labels only.
                    vec![]
                }
            }
            NodeKind::WhileStatement { condition, body } => {
                if x == condition {
                    let mut out = self.pred_general(&parent, ctx);
                    out.extend(self.loop_back_sources(body, ctx, condition));
                    out
                } else {
                    vec![condition.clone()]
                }
            }
            NodeKind::DoStatement { condition, body } => {
                if x == condition {
                    let mut entry = self.pred_general(&parent, ctx);
                    entry.push(condition.clone());
                    let mut out = self.body_tail(body, ctx, entry);
                    out.extend(filters::filter_continue_statements(
                        self.index(),
                        self.oracle(),
                        body,
                        ctx,
                    ));
                    out
                } else {
                    // Body begin: entry plus the loop-back edge.
                    let mut out = self.pred_general(&parent, ctx);
                    out.push(condition.clone());
                    out
                }
            }
            NodeKind::ForStatement { init, condition, increment, body } => {
                if init.as_ref() == Some(x) {
                    self.pred_general(&parent, ctx)
                } else if condition.as_ref() == Some(x) {
                    let mut out = match init {
                        Some(init) => vec![init.clone()],
                        None => self.pred_general(&parent, ctx),
                    };
                    match increment {
                        Some(increment) => out.push(increment.clone()),
                        None => out.extend(self.loop_back_sources(body, ctx, x)),
                    }
                    out
                } else if increment.as_ref() == Some(x) {
                    self.loop_back_sources(body, ctx, x)
                } else {
                    // Body begin.
                    match condition {
                        Some(condition) => vec![condition.clone()],
                        None => {
                            let mut out = match init {
                                Some(init) => vec![init.clone()],
                                None => self.pred_general(&parent, ctx),
                            };
                            match increment {
                                Some(increment) => out.push(increment.clone()),
                                None => out.extend(self.body_tail(body, ctx, vec![])),
                            }
                            out
                        }
                    }
                }
            }
            NodeKind::CaseStatement { value, .. } => {
                if x == value {
                    self.pred_dispatch(&parent, ctx)
                } else {
                    // Body: flows through the label.
                    vec![parent.clone()]
                }
            }
            NodeKind::DefaultStatement { .. } | NodeKind::LabelStatement { .. } => {
                vec![parent.clone()]
            }
            // Wrapper statements and nested expressions share the
            // statement-level predecessors.
            _ => self.pred_dispatch(&parent, ctx),
        }
    }

    /// Fall-through exits of a loop body plus its continues; `loop_point`
    /// stands in when the body can be empty (the loop point feeds itself).
    fn loop_back_sources(&self, body: &Node, ctx: &FeatureExpr, loop_point: &Node) -> Vec<Node> {
        let mut out = self.body_tail(body, ctx, vec![loop_point.clone()]);
        out.extend(filters::filter_continue_statements(self.index(), self.oracle(), body, ctx));
        dedupe(out)
    }

    /// Exit points of a statement used as a body: the rolled-up last
    /// reachable elements of a compound (with `on_empty` for
    /// configurations where none is present), or the rolled-up statement
    /// itself.
    fn body_tail(&self, body: &Node, ctx: &FeatureExpr, on_empty: Vec<Node>) -> Vec<Node> {
        match body.kind() {
            NodeKind::CompoundStatement { items } => {
                if items.is_empty() {
                    return on_empty;
                }
                let siblings: Vec<(FeatureExpr, Node)> = items
                    .iter()
                    .rev()
                    .map(|opt| (self.index().presence_condition(&opt.value), opt.value.clone()))
                    .collect();
                match determine_following_elements(self.oracle(), ctx, &siblings) {
                    Resolved::Complete(nodes) => self.roll_up_all(nodes, ctx),
                    Resolved::Partial(nodes) => {
                        let mut out = self.roll_up_all(nodes, ctx);
                        out.extend(on_empty);
                        out
                    }
                }
            }
            _ => self.roll_up(body, ctx),
        }
    }

    /// Exit of the function body toward the exit sentinel. An (effectively)
    /// empty body lets entry fall straight to exit, so the sentinel
    /// appears as its own predecessor, mirroring the successor side.
    fn function_exit_tail(&self, body: &Node, ctx: &FeatureExpr, fndef: &Node) -> Vec<Node> {
        self.body_tail(body, ctx, vec![fndef.clone()])
    }

    // ── Roll-up ──────────────────────────────────────────────────────────

    pub(crate) fn roll_up_all(&self, nodes: Vec<Node>, ctx: &FeatureExpr) -> Vec<Node> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        nodes
            .into_iter()
            .flat_map(|node| self.roll_up_inner(&node, ctx, &mut visited))
            .collect()
    }

    /// Replace a compound construct by its actual exit points.
    pub(crate) fn roll_up(&self, node: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        self.roll_up_inner(node, ctx, &mut visited)
    }

    fn roll_up_inner(
        &self,
        node: &Node,
        ctx: &FeatureExpr,
        visited: &mut FxHashSet<NodeId>,
    ) -> Vec<Node> {
        if !visited.insert(node.node_id()) {
            return vec![];
        }
        match node.kind() {
            // Jumps never fall through to the next statement.
            NodeKind::BreakStatement
            | NodeKind::ContinueStatement
            | NodeKind::ReturnStatement { .. }
            | NodeKind::GotoStatement { .. } => vec![],
            NodeKind::CompoundStatement { items } => {
                if items.is_empty() {
                    // Flow passes through an empty compound untouched.
                    return self.pred_general(node, ctx);
                }
                let siblings: Vec<(FeatureExpr, Node)> = items
                    .iter()
                    .rev()
                    .map(|opt| (self.index().presence_condition(&opt.value), opt.value.clone()))
                    .collect();
                match determine_following_elements(self.oracle(), ctx, &siblings) {
                    Resolved::Complete(nodes) => nodes
                        .into_iter()
                        .flat_map(|n| self.roll_up_inner(&n, ctx, visited))
                        .collect(),
                    Resolved::Partial(nodes) => {
                        let mut out: Vec<Node> = nodes
                            .into_iter()
                            .flat_map(|n| self.roll_up_inner(&n, ctx, visited))
                            .collect();
                        out.extend(self.pred_general(node, ctx));
                        out
                    }
                }
            }
            NodeKind::IfStatement { condition, then_branch, elifs, else_branch } => {
                let mut out = self.roll_up_inner(then_branch, ctx, visited);
                let mut last_elif_condition = None;
                for opt in elifs {
                    let presence = self.index().presence_condition(&opt.value);
                    if !self.oracle().is_satisfiable(&presence.and(ctx)) {
                        continue;
                    }
                    if let NodeKind::ElifStatement { condition, then_branch } = opt.value.kind() {
                        last_elif_condition = Some(condition.clone());
                        out.extend(self.roll_up_inner(then_branch, ctx, visited));
                    }
                }
                match else_branch {
                    Some(els) => out.extend(self.roll_up_inner(els, ctx, visited)),
                    // Without an else, the false edge of the last arm
                    // leaves the statement.
                    None => match last_elif_condition {
                        Some(condition) => out.push(condition),
                        None => out.push(condition.clone()),
                    },
                }
                out
            }
            NodeKind::SwitchStatement { expr, body } => {
                let mut out =
                    filters::filter_break_statements(self.index(), self.oracle(), body, ctx);
                let has_default = !filters::filter_default_statements(
                    self.index(),
                    self.oracle(),
                    body,
                    ctx,
                )
                .is_empty();
                if !has_default {
                    out.push(expr.clone());
                }
                // Fall-through off the end of the last case chain.
                if let NodeKind::CompoundStatement { items } = body.kind() {
                    if !items.is_empty() {
                        let siblings: Vec<(FeatureExpr, Node)> = items
                            .iter()
                            .rev()
                            .map(|opt| {
                                (self.index().presence_condition(&opt.value), opt.value.clone())
                            })
                            .collect();
                        let tail = determine_following_elements(self.oracle(), ctx, &siblings);
                        out.extend(
                            tail.nodes()
                                .into_iter()
                                .flat_map(|n| self.roll_up_inner(&n, ctx, visited)),
                        );
                    }
                }
                out
            }
            NodeKind::WhileStatement { condition, body }
            | NodeKind::DoStatement { condition, body } => {
                let mut out = vec![condition.clone()];
                out.extend(filters::filter_break_statements(
                    self.index(),
                    self.oracle(),
                    body,
                    ctx,
                ));
                out
            }
            NodeKind::ForStatement { condition, body, .. } => {
                let mut out = Vec::new();
                if let Some(condition) = condition {
                    out.push(condition.clone());
                }
                out.extend(filters::filter_break_statements(
                    self.index(),
                    self.oracle(),
                    body,
                    ctx,
                ));
                out
            }
            NodeKind::CaseStatement { body: Some(body), .. }
            | NodeKind::DefaultStatement { body: Some(body) } => {
                self.roll_up_inner(body, ctx, visited)
            }
            // Leaf statements and expressions are their own exit point.
            _ => vec![node.clone()],
        }
    }

    // ── If/elif edges ────────────────────────────────────────────────────

    /// Sources of the false edge feeding an elif arm: the previous
    /// reachable arms' conditions, or the `if` condition itself.
    fn elif_sources(&self, elif: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let owning_if = self.index().parent(elif).cloned();
        let if_condition = owning_if.as_ref().and_then(|p| match p.kind() {
            NodeKind::IfStatement { condition, .. } => Some(condition.clone()),
            _ => None,
        });
        let siblings = self.index().siblings_before(elif);
        if !siblings.is_empty() {
            let arms = determine_following_elements(self.oracle(), ctx, &siblings);
            let complete = arms.is_complete();
            let mut out: Vec<Node> = arms
                .nodes()
                .into_iter()
                .filter_map(|arm| match arm.kind() {
                    NodeKind::ElifStatement { condition, .. } => Some(condition.clone()),
                    _ => None,
                })
                .collect();
            if !complete {
                out.extend(if_condition);
            }
            return out;
        }
        if_condition.into_iter().collect()
    }

    /// Sources of the false edge feeding the else branch.
    fn else_edge_sources(&self, if_node: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let NodeKind::IfStatement { condition, elifs, .. } = if_node.kind() else {
            return vec![];
        };
        if elifs.is_empty() {
            return vec![condition.clone()];
        }
        let siblings: Vec<(FeatureExpr, Node)> = elifs
            .iter()
            .rev()
            .map(|opt| (self.index().presence_condition(&opt.value), opt.value.clone()))
            .collect();
        let arms = determine_following_elements(self.oracle(), ctx, &siblings);
        let complete = arms.is_complete();
        let mut out: Vec<Node> = arms
            .nodes()
            .into_iter()
            .filter_map(|arm| match arm.kind() {
                NodeKind::ElifStatement { condition, .. } => Some(condition.clone()),
                _ => None,
            })
            .collect();
        if !complete {
            out.push(condition.clone());
        }
        out
    }

    // ── Jump sources ─────────────────────────────────────────────────────

    /// Direct gotos naming this label, plus computed gotos (which may
    /// reach any label).
    fn gotos_targeting(&self, label: &Node, ctx: &FeatureExpr) -> Vec<Node> {
        let Some(function) = self.index().enclosing_function(label) else {
            return vec![];
        };
        let NodeKind::FunctionDef { body, .. } = function.kind() else {
            return vec![];
        };
        let name = match label.kind() {
            NodeKind::LabelStatement { id } => id.name(),
            _ => None,
        };
        filters::filter_goto_statements(self.index(), self.oracle(), body, ctx, None)
            .into_iter()
            .filter(|g| match g.kind() {
                NodeKind::GotoStatement { target } => match target.kind() {
                    NodeKind::Id { name: target_name } => Some(target_name.as_str()) == name,
                    // Computed goto: predecessor of every label.
                    _ => true,
                },
                _ => false,
            })
            .collect()
    }

    fn nearest_switch(&self, node: &Node) -> Option<Node> {
        let mut cursor = self.index().parent(node).cloned();
        while let Some(current) = cursor {
            if matches!(current.kind(), NodeKind::SwitchStatement { .. }) {
                return Some(current);
            }
            // A nested function boundary ends the search.
            if matches!(current.kind(), NodeKind::FunctionDef { .. }) {
                return None;
            }
            cursor = self.index().parent(&current).cloned();
        }
        None
    }
}
