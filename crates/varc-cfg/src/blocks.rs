//! `#ifdef` block grouping and sibling selection.
//!
//! A sibling list under variability is a sequence of `#ifdef` blocks:
//! maximal runs of consecutive elements whose presence conditions are
//! equivalent. Control transfers to the head of each block whose condition
//! is compatible with the source context, accumulating alternatives until
//! they cover the context. The same routine serves both directions: for
//! successors the list is in source order, for predecessors it is the
//! reversed tail, so the "head" is always the element control reaches
//! first.

use varc_ast::Node;
use varc_feat::{FeatureExpr, FeatureOracle};

/// Outcome of following-elements selection.
#[derive(Debug)]
pub enum Resolved {
    /// The selected heads cover the context: these are all targets at this
    /// level.
    Complete(Vec<Node>),
    /// Partial cover: the caller must also include whatever the parent
    /// level contributes.
    Partial(Vec<Node>),
}

impl Resolved {
    pub fn nodes(self) -> Vec<Node> {
        match self {
            Resolved::Complete(nodes) | Resolved::Partial(nodes) => nodes,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Resolved::Complete(_))
    }
}

/// Group consecutive siblings with pairwise-equivalent conditions into
/// maximal blocks.
pub fn group_ifdef_blocks(
    oracle: &FeatureOracle,
    siblings: &[(FeatureExpr, Node)],
) -> Vec<Vec<(FeatureExpr, Node)>> {
    let mut blocks: Vec<Vec<(FeatureExpr, Node)>> = Vec::new();
    for (cond, node) in siblings {
        match blocks.last_mut() {
            Some(block) if oracle.equivalent(&block[0].0, cond) => {
                block.push((cond.clone(), node.clone()));
            }
            _ => blocks.push(vec![(cond.clone(), node.clone())]),
        }
    }
    blocks
}

/// Select the reachable block heads for a source whose presence condition
/// is `ctx`.
///
/// Walking the blocks in order: a head equivalent to `ctx` is the definite
/// single target; a head incompatible with `ctx` is skipped; a head whose
/// condition duplicates an already-selected alternative is skipped; any
/// other head is selected, and once the selected conditions cover `ctx`
/// the selection is complete.
pub fn determine_following_elements(
    oracle: &FeatureOracle,
    ctx: &FeatureExpr,
    siblings: &[(FeatureExpr, Node)],
) -> Resolved {
    let mut taken: Vec<(FeatureExpr, Node)> = Vec::new();
    let mut accumulated = FeatureExpr::false_();
    for block in group_ifdef_blocks(oracle, siblings) {
        let (cond, head) = block[0].clone();
        if oracle.equivalent(ctx, &cond) {
            let mut out: Vec<Node> = taken.into_iter().map(|(_, n)| n).collect();
            out.push(head);
            return Resolved::Complete(out);
        }
        if oracle.mutually_exclusive(ctx, &cond) {
            continue;
        }
        if taken.iter().any(|(seen, _)| oracle.equivalent(seen, &cond)) {
            continue;
        }
        accumulated = accumulated.or(&cond);
        taken.push((cond, head));
        if oracle.implies(ctx, &accumulated) {
            return Resolved::Complete(taken.into_iter().map(|(_, n)| n).collect());
        }
    }
    Resolved::Partial(taken.into_iter().map(|(_, n)| n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use varc_ast::build;

    fn sib(cond: FeatureExpr, name: &str) -> (FeatureExpr, Node) {
        (cond, build::expr_stmt(build::ident(name)))
    }

    #[test]
    fn unconditional_sibling_is_definite() {
        let oracle = FeatureOracle::new();
        let t = FeatureExpr::true_();
        let sibs = vec![sib(t.clone(), "a"), sib(t.clone(), "b")];
        let resolved = determine_following_elements(&oracle, &t, &sibs);
        assert!(resolved.is_complete());
        assert_eq!(resolved.nodes().len(), 1);
    }

    #[test]
    fn alternatives_cover_and_complete() {
        let oracle = FeatureOracle::new();
        let a = FeatureExpr::var("A");
        let sibs = vec![
            sib(a.clone(), "then_arm"),
            sib(a.not(), "else_arm"),
            sib(FeatureExpr::true_(), "after"),
        ];
        let resolved = determine_following_elements(&oracle, &FeatureExpr::true_(), &sibs);
        // A and !A cover the tautological context before `after` is reached.
        assert!(resolved.is_complete());
        assert_eq!(resolved.nodes().len(), 2);
    }

    #[test]
    fn incompatible_blocks_are_skipped() {
        let oracle = FeatureOracle::new();
        let a = FeatureExpr::var("A");
        let sibs = vec![sib(a.not(), "other"), sib(FeatureExpr::true_(), "after")];
        let resolved = determine_following_elements(&oracle, &a, &sibs);
        assert!(resolved.is_complete());
        // From an A-guarded source, the !A arm is unreachable.
        assert_eq!(resolved.nodes().len(), 1);
    }

    #[test]
    fn partial_cover_defers_to_parent() {
        let oracle = FeatureOracle::new();
        let a = FeatureExpr::var("A");
        let sibs = vec![sib(a.clone(), "guarded")];
        let resolved = determine_following_elements(&oracle, &FeatureExpr::true_(), &sibs);
        assert!(!resolved.is_complete());
        assert_eq!(resolved.nodes().len(), 1);
    }

    #[test]
    fn equivalent_run_forms_one_block() {
        let oracle = FeatureOracle::new();
        let a = FeatureExpr::var("A");
        let sibs = vec![sib(a.clone(), "s1"), sib(a.clone(), "s2"), sib(a.not(), "s3")];
        let blocks = group_ifdef_blocks(&oracle, &sibs);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].len(), 2);
        assert_eq!(blocks[1].len(), 1);
    }
}
