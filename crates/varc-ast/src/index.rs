//! Tree environment side tables.
//!
//! The AST itself carries no back-pointers; parent, sibling, and presence
//! information live in an [`AstIndex`] built by one walk over the tree.
//! Sibling links exist only between elements of the same `Opt` list group
//! (a compound's statements, a declaration's init-declarators, ...), never
//! across slots. A node's presence condition is the conjunction of the
//! `Opt` conditions along its root path.

use rustc_hash::FxHashMap;
use varc_feat::FeatureExpr;

use crate::node::{ChildGroup, Node, NodeId, NodeKind};

pub struct AstIndex {
    parents: FxHashMap<NodeId, Node>,
    prev: FxHashMap<NodeId, Node>,
    next: FxHashMap<NodeId, Node>,
    conditions: FxHashMap<NodeId, FeatureExpr>,
}

impl AstIndex {
    /// Index the tree rooted at `root`. `root` itself is unconditionally
    /// present and has no parent.
    pub fn build(root: &Node) -> AstIndex {
        let mut index = AstIndex {
            parents: FxHashMap::default(),
            prev: FxHashMap::default(),
            next: FxHashMap::default(),
            conditions: FxHashMap::default(),
        };
        let mut work = vec![(root.clone(), FeatureExpr::true_())];
        while let Some((node, cond)) = work.pop() {
            index.conditions.insert(node.node_id(), cond.clone());
            for group in node.kind().child_groups() {
                match group {
                    ChildGroup::Single(child) => {
                        index.parents.insert(child.node_id(), node.clone());
                        work.push((child, cond.clone()));
                    }
                    ChildGroup::List(pairs) => {
                        for window in pairs.windows(2) {
                            index.next.insert(window[0].1.node_id(), window[1].1.clone());
                            index.prev.insert(window[1].1.node_id(), window[0].1.clone());
                        }
                        for (elem_cond, child) in pairs {
                            index.parents.insert(child.node_id(), node.clone());
                            work.push((child, cond.and(&elem_cond)));
                        }
                    }
                }
            }
        }
        index
    }

    pub fn parent(&self, node: &Node) -> Option<&Node> {
        self.parents.get(&node.node_id())
    }

    /// Previous element in the node's `Opt` list, if it is a list element
    /// with one.
    pub fn prev_sibling(&self, node: &Node) -> Option<&Node> {
        self.prev.get(&node.node_id())
    }

    /// Next element in the node's `Opt` list.
    pub fn next_sibling(&self, node: &Node) -> Option<&Node> {
        self.next.get(&node.node_id())
    }

    /// The node's full presence condition. `True` for nodes the index has
    /// not seen.
    pub fn presence_condition(&self, node: &Node) -> FeatureExpr {
        self.conditions
            .get(&node.node_id())
            .cloned()
            .unwrap_or_else(FeatureExpr::true_)
    }

    /// The distinct presence conditions along the path from the root to
    /// `node`, outermost first.
    pub fn feature_set(&self, node: &Node) -> Vec<FeatureExpr> {
        let mut chain = Vec::new();
        let mut cursor = Some(node.clone());
        while let Some(current) = cursor {
            chain.push(self.presence_condition(&current));
            cursor = self.parent(&current).cloned();
        }
        chain.reverse();
        chain.dedup();
        chain
    }

    /// Whether `ancestor` lies on `child`'s parent chain (inclusive).
    pub fn is_part_of(&self, child: &Node, ancestor: &Node) -> bool {
        let mut cursor = Some(child.clone());
        while let Some(current) = cursor {
            if current == *ancestor {
                return true;
            }
            cursor = self.parent(&current).cloned();
        }
        false
    }

    /// The nearest enclosing function definition, excluding `node` itself.
    pub fn enclosing_function(&self, node: &Node) -> Option<Node> {
        let mut cursor = self.parent(node).cloned();
        while let Some(current) = cursor {
            if matches!(current.kind(), NodeKind::FunctionDef { .. }) {
                return Some(current);
            }
            cursor = self.parent(&current).cloned();
        }
        None
    }

    /// All list elements after `node`, nearest first, with their presence
    /// conditions.
    pub fn siblings_after(&self, node: &Node) -> Vec<(FeatureExpr, Node)> {
        self.sibling_walk(node, |n| self.next_sibling(n))
    }

    /// All list elements before `node`, nearest first, with their presence
    /// conditions.
    pub fn siblings_before(&self, node: &Node) -> Vec<(FeatureExpr, Node)> {
        self.sibling_walk(node, |n| self.prev_sibling(n))
    }

    fn sibling_walk<'a>(
        &'a self,
        node: &Node,
        step: impl Fn(&Node) -> Option<&'a Node>,
    ) -> Vec<(FeatureExpr, Node)> {
        let mut out = Vec::new();
        let mut cursor = step(node).cloned();
        while let Some(current) = cursor {
            out.push((self.presence_condition(&current), current.clone()));
            cursor = step(&current).cloned();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build;
    use crate::cond::Opt;

    #[test]
    fn parents_and_siblings() {
        let s1 = build::expr_stmt(build::ident("a"));
        let s2 = build::expr_stmt(build::ident("b"));
        let body = build::compound(vec![Opt::new(s1.clone()), Opt::new(s2.clone())]);
        let f = build::fn_def_with_body("main", body.clone());
        let index = AstIndex::build(&f);

        assert_eq!(index.parent(&s1), Some(&body));
        assert_eq!(index.next_sibling(&s1), Some(&s2));
        assert_eq!(index.prev_sibling(&s2), Some(&s1));
        assert_eq!(index.next_sibling(&s2), None);
        assert!(index.is_part_of(&s2, &f));
        assert_eq!(index.enclosing_function(&s1), Some(f.clone()));
    }

    #[test]
    fn presence_conditions_conjoin_down_the_path() {
        let a = FeatureExpr::var("A");
        let b = FeatureExpr::var("B");
        let inner = build::expr_stmt(build::ident("x"));
        let guarded = build::compound(vec![Opt::when(b.clone(), inner.clone())]);
        let body = build::compound(vec![Opt::when(a.clone(), guarded.clone())]);
        let f = build::fn_def_with_body("main", body);
        let index = AstIndex::build(&f);

        assert!(index.presence_condition(&f).is_true());
        assert_eq!(index.presence_condition(&guarded), a);
        assert_eq!(index.presence_condition(&inner), a.and(&b));
        let chain = index.feature_set(&inner);
        assert_eq!(chain.last(), Some(&a.and(&b)));
    }

    #[test]
    fn sibling_links_do_not_cross_groups() {
        // A declaration has two list groups (specifiers, init-declarators);
        // the last specifier must not link to the first declarator.
        let decl = build::var_decl("x");
        let index = AstIndex::build(&decl);
        let kids = decl.children();
        let spec = &kids[0];
        assert_eq!(index.next_sibling(spec), None);
    }
}
