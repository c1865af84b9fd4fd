//! Scoped name environments with conditional bindings.
//!
//! One name can be bound to different declarators in different
//! configurations, so a frame maps a name to a
//! `Conditional<Option<Node>>`: a `Choice` tree whose leaves are either a
//! binding node or `None` for configurations where the name is unbound.
//! Binding under a non-tautological condition captures the previously
//! visible value as the else-arm, so disjoint `#ifdef` alternatives stack
//! into one lookup result.
//!
//! Three namespaces are kept, as C requires: ordinary identifiers
//! (variables, functions, enumerators), typedef names, and struct/union
//! member names grouped per `(tag, is_union)`. Labels live in a
//! per-function table on the side.

use rustc_hash::FxHashMap;
use varc_ast::{Conditional, Node};
use varc_feat::FeatureExpr;

/// The lookup result shape: alternatives over an optional binding node.
pub type Binding = Conditional<Option<Node>>;

#[derive(Default)]
struct Frame {
    vars: FxHashMap<String, Binding>,
    typedefs: FxHashMap<String, Binding>,
    structs: FxHashMap<(String, bool), FxHashMap<String, Binding>>,
}

pub struct NameEnv {
    frames: Vec<Frame>,
    labels: FxHashMap<String, Vec<Node>>,
}

impl Default for NameEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl NameEnv {
    pub fn new() -> NameEnv {
        NameEnv { frames: vec![Frame::default()], labels: FxHashMap::default() }
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn exit_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "unbalanced scope exit");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    // ── Ordinary identifiers ─────────────────────────────────────────────

    pub fn lookup_var(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|frame| frame.vars.get(name))
    }

    /// Bind `name` to `node` under `condition` in the innermost scope.
    /// The previously visible binding (any scope) becomes the else-arm.
    pub fn bind_var(&mut self, name: &str, condition: &FeatureExpr, node: &Node) {
        let binding = self.layered(self.lookup_var(name), condition, node);
        self.frames
            .last_mut()
            .expect("environment always has a frame")
            .vars
            .insert(name.to_string(), binding);
    }

    // ── Typedef namespace ────────────────────────────────────────────────

    pub fn lookup_typedef(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|frame| frame.typedefs.get(name))
    }

    pub fn bind_typedef(&mut self, name: &str, condition: &FeatureExpr, node: &Node) {
        let binding = self.layered(self.lookup_typedef(name), condition, node);
        self.frames
            .last_mut()
            .expect("environment always has a frame")
            .typedefs
            .insert(name.to_string(), binding);
    }

    // ── Struct/union member namespaces ───────────────────────────────────

    pub fn has_struct(&self, tag: &str, is_union: bool) -> bool {
        let key = (tag.to_string(), is_union);
        self.frames.iter().rev().any(|frame| frame.structs.contains_key(&key))
    }

    /// Make `(tag, is_union)` known in the innermost scope, with no fields
    /// yet. Idempotent within one scope.
    pub fn declare_struct(&mut self, tag: &str, is_union: bool) {
        self.frames
            .last_mut()
            .expect("environment always has a frame")
            .structs
            .entry((tag.to_string(), is_union))
            .or_default();
    }

    pub fn lookup_field(&self, tag: &str, is_union: bool, name: &str) -> Option<&Binding> {
        let key = (tag.to_string(), is_union);
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.structs.get(&key))
            .and_then(|fields| fields.get(name))
    }

    pub fn bind_field(
        &mut self,
        tag: &str,
        is_union: bool,
        name: &str,
        condition: &FeatureExpr,
        node: &Node,
    ) {
        let binding = self.layered(self.lookup_field(tag, is_union, name), condition, node);
        let key = (tag.to_string(), is_union);
        let slot = self
            .frames
            .iter()
            .rposition(|frame| frame.structs.contains_key(&key))
            .unwrap_or(self.frames.len() - 1);
        self.frames[slot]
            .structs
            .entry(key)
            .or_default()
            .insert(name.to_string(), binding);
    }

    // ── Labels (function scoped) ─────────────────────────────────────────

    /// Forget the previous function's labels.
    pub fn reset_labels(&mut self) {
        self.labels.clear();
    }

    pub fn bind_label(&mut self, name: &str, id: &Node) {
        self.labels.entry(name.to_string()).or_default().push(id.clone());
    }

    /// All label ids bound under `name` in the current function. Multiple
    /// entries arise from `#ifdef`-alternative labels.
    pub fn lookup_labels(&self, name: &str) -> &[Node] {
        self.labels.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn layered(&self, prior: Option<&Binding>, condition: &FeatureExpr, node: &Node) -> Binding {
        if condition.is_true() {
            return Conditional::One(Some(node.clone()));
        }
        let prior = prior.cloned().unwrap_or(Conditional::One(None));
        Conditional::choice(condition.clone(), Conditional::One(Some(node.clone())), prior)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varc_ast::build;

    #[test]
    fn inner_scope_shadows_and_pops() {
        let mut env = NameEnv::new();
        let outer = build::ident("x");
        let inner = build::ident("x");
        env.bind_var("x", &FeatureExpr::true_(), &outer);
        env.enter_scope();
        env.bind_var("x", &FeatureExpr::true_(), &inner);
        assert_eq!(env.lookup_var("x").unwrap().leaves(), vec![&Some(inner.clone())]);
        env.exit_scope();
        assert_eq!(env.lookup_var("x").unwrap().leaves(), vec![&Some(outer)]);
    }

    #[test]
    fn conditional_binding_layers_alternatives() {
        let mut env = NameEnv::new();
        let a = FeatureExpr::var("A");
        let then_decl = build::ident("x");
        let else_decl = build::ident("x");
        env.bind_var("x", &a, &then_decl);
        env.bind_var("x", &a.not(), &else_decl);
        let leaves = env.lookup_var("x").unwrap().leaves();
        // !A arm first (bound last), then A arm, then the unbound leaf.
        assert_eq!(
            leaves,
            vec![&Some(else_decl), &Some(then_decl), &None]
        );
    }

    #[test]
    fn typedef_namespace_is_separate() {
        let mut env = NameEnv::new();
        let var = build::ident("T");
        env.bind_var("T", &FeatureExpr::true_(), &var);
        assert!(env.lookup_typedef("T").is_none());
        env.bind_typedef("T", &FeatureExpr::true_(), &var);
        assert!(env.lookup_typedef("T").is_some());
    }

    #[test]
    fn struct_fields_key_on_tag_and_unionness() {
        let mut env = NameEnv::new();
        let field = build::ident("len");
        env.declare_struct("buf", false);
        env.bind_field("buf", false, "len", &FeatureExpr::true_(), &field);
        assert!(env.has_struct("buf", false));
        assert!(!env.has_struct("buf", true));
        assert!(env.lookup_field("buf", false, "len").is_some());
        assert!(env.lookup_field("buf", true, "len").is_none());
    }
}
