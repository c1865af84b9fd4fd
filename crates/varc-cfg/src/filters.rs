//! Jump-statement filters.
//!
//! Subtree collectors that respect capture: an inner switch captures the
//! breaks inside it, an inner loop captures continues, an inner switch
//! owns its cases. A statement is admitted only when its presence
//! condition is compatible with the query context. Results are in source
//! order.

use varc_ast::{AstIndex, Node, NodeKind};
use varc_feat::{FeatureExpr, FeatureOracle};

fn filter_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
    want: impl Fn(&Node) -> bool,
    skip_descent: impl Fn(&Node) -> bool,
) -> Vec<Node> {
    let mut out = Vec::new();
    let mut work = vec![root.clone()];
    while let Some(node) = work.pop() {
        if want(&node) && oracle.is_satisfiable(&index.presence_condition(&node).and(ctx)) {
            out.push(node.clone());
        }
        if !skip_descent(&node) {
            let mut kids = node.children();
            kids.reverse();
            work.extend(kids);
        }
    }
    out
}

/// `break` statements that jump out of the construct whose body is `root`.
pub fn filter_break_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| matches!(n.kind(), NodeKind::BreakStatement),
        |n| n.captures_break(),
    )
}

/// `continue` statements belonging to the loop whose body is `root`.
/// Switches do not capture continues.
pub fn filter_continue_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| matches!(n.kind(), NodeKind::ContinueStatement),
        |n| n.is_loop(),
    )
}

/// `case` labels belonging to the switch whose body is `root`. Cases
/// inside loops still belong to the outer switch; cases inside a nested
/// switch do not.
pub fn filter_case_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| matches!(n.kind(), NodeKind::CaseStatement { .. }),
        |n| matches!(n.kind(), NodeKind::SwitchStatement { .. }),
    )
}

/// `default` labels belonging to the switch whose body is `root`.
pub fn filter_default_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| matches!(n.kind(), NodeKind::DefaultStatement { .. }),
        |n| matches!(n.kind(), NodeKind::SwitchStatement { .. }),
    )
}

/// `return` statements inside a function body.
pub fn filter_return_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| matches!(n.kind(), NodeKind::ReturnStatement { .. }),
        |n| matches!(n.kind(), NodeKind::FunctionDef { .. }),
    )
}

/// Label statements inside a function body, optionally restricted to one
/// name.
pub fn filter_label_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
    name: Option<&str>,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| match n.kind() {
            NodeKind::LabelStatement { id } => match name {
                Some(name) => id.name() == Some(name),
                None => true,
            },
            _ => false,
        },
        |n| matches!(n.kind(), NodeKind::FunctionDef { .. }),
    )
}

/// `goto` statements inside a function body. With `name`, only direct
/// gotos to that label; without, direct and computed gotos alike.
pub fn filter_goto_statements(
    index: &AstIndex,
    oracle: &FeatureOracle,
    root: &Node,
    ctx: &FeatureExpr,
    name: Option<&str>,
) -> Vec<Node> {
    filter_statements(
        index,
        oracle,
        root,
        ctx,
        |n| match n.kind() {
            NodeKind::GotoStatement { target } => match name {
                Some(name) => target.name() == Some(name),
                None => true,
            },
            _ => false,
        },
        |n| matches!(n.kind(), NodeKind::FunctionDef { .. }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use varc_ast::build;
    use varc_ast::Opt;

    #[test]
    fn nested_switch_captures_breaks() {
        let inner_break = build::break_stmt();
        let outer_break = build::break_stmt();
        let inner_switch = build::switch_stmt(
            build::ident("y"),
            vec![Opt::new(build::case_stmt(build::constant("0"), Some(inner_break)))],
        );
        let body = build::compound(vec![Opt::new(inner_switch), Opt::new(outer_break.clone())]);
        let while_loop = build::while_stmt(build::ident("c"), body.clone());
        let f = build::fn_def("main", vec![Opt::new(while_loop)]);
        let index = AstIndex::build(&f);
        let oracle = FeatureOracle::new();

        let found =
            filter_break_statements(&index, &oracle, &body, &FeatureExpr::true_());
        assert_eq!(found, vec![outer_break]);
    }

    #[test]
    fn continues_pass_through_switches_but_not_loops() {
        let in_switch = build::continue_stmt();
        let in_inner_loop = build::continue_stmt();
        let switch = build::switch_stmt(
            build::ident("x"),
            vec![Opt::new(build::case_stmt(build::constant("0"), Some(in_switch.clone())))],
        );
        let inner =
            build::while_stmt(build::ident("d"), build::compound(vec![Opt::new(in_inner_loop)]));
        let body = build::compound(vec![Opt::new(switch), Opt::new(inner)]);
        let f = build::fn_def(
            "main",
            vec![Opt::new(build::while_stmt(build::ident("c"), body.clone()))],
        );
        let index = AstIndex::build(&f);
        let oracle = FeatureOracle::new();

        let found =
            filter_continue_statements(&index, &oracle, &body, &FeatureExpr::true_());
        assert_eq!(found, vec![in_switch]);
    }

    #[test]
    fn condition_incompatible_statements_are_dropped() {
        let a = FeatureExpr::var("A");
        let guarded = build::break_stmt();
        let body = build::compound(vec![Opt::when(a.clone(), guarded)]);
        let f = build::fn_def(
            "main",
            vec![Opt::new(build::while_stmt(build::ident("c"), body.clone()))],
        );
        let index = AstIndex::build(&f);
        let oracle = FeatureOracle::new();

        let found = filter_break_statements(&index, &oracle, &body, &a.not());
        assert!(found.is_empty());
    }
}
