//! Presence conditions for variability-aware C analysis.
//!
//! A presence condition is a boolean formula over preprocessor feature
//! names. Every AST node in a variability-aware parse carries one; the
//! analysis core combines them with and/or/not and asks the
//! [`FeatureOracle`] whether the results are satisfiable, tautological,
//! equivalent, and so on.
//!
//! Expressions are immutable and shared (`Arc`), hash and compare
//! structurally, and fold constants at construction so that the common
//! unconditional case stays a single `True` node.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

mod oracle;

pub use oracle::{EnumerationBackend, FeatureOracle, SatBackend};

/// A boolean formula over feature names.
///
/// Cheap to clone (one `Arc` bump). Equality and hashing are structural,
/// which is what the oracle's query caches key on; *semantic* equivalence
/// is the oracle's job.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FeatureExpr(Arc<Term>);

#[derive(PartialEq, Eq, Hash, Debug)]
enum Term {
    True,
    False,
    Var(String),
    Not(FeatureExpr),
    And(FeatureExpr, FeatureExpr),
    Or(FeatureExpr, FeatureExpr),
}

impl FeatureExpr {
    /// The always-true condition (unconditional presence).
    pub fn true_() -> Self {
        FeatureExpr(Arc::new(Term::True))
    }

    /// The always-false condition.
    pub fn false_() -> Self {
        FeatureExpr(Arc::new(Term::False))
    }

    /// A single feature variable.
    pub fn var(name: impl Into<String>) -> Self {
        FeatureExpr(Arc::new(Term::Var(name.into())))
    }

    /// Negation, with double-negation and constant folding.
    pub fn not(&self) -> Self {
        match &*self.0 {
            Term::True => Self::false_(),
            Term::False => Self::true_(),
            Term::Not(inner) => inner.clone(),
            _ => FeatureExpr(Arc::new(Term::Not(self.clone()))),
        }
    }

    /// Conjunction, with constant absorption.
    pub fn and(&self, other: &FeatureExpr) -> Self {
        match (&*self.0, &*other.0) {
            (Term::True, _) => other.clone(),
            (_, Term::True) => self.clone(),
            (Term::False, _) | (_, Term::False) => Self::false_(),
            _ if self == other => self.clone(),
            _ => FeatureExpr(Arc::new(Term::And(self.clone(), other.clone()))),
        }
    }

    /// Disjunction, with constant absorption.
    pub fn or(&self, other: &FeatureExpr) -> Self {
        match (&*self.0, &*other.0) {
            (Term::False, _) => other.clone(),
            (_, Term::False) => self.clone(),
            (Term::True, _) | (_, Term::True) => Self::true_(),
            _ if self == other => self.clone(),
            _ => FeatureExpr(Arc::new(Term::Or(self.clone(), other.clone()))),
        }
    }

    /// Whether this is the literal `True` node.
    ///
    /// This is a structural check only; use
    /// [`FeatureOracle::is_tautology`] for the semantic question.
    pub fn is_true(&self) -> bool {
        matches!(&*self.0, Term::True)
    }

    /// Whether this is the literal `False` node.
    pub fn is_false(&self) -> bool {
        matches!(&*self.0, Term::False)
    }

    /// Evaluate under a complete assignment of the mentioned variables.
    /// Unmentioned variables default to `false`.
    pub fn eval(&self, assignment: &FxHashMap<&str, bool>) -> bool {
        match &*self.0 {
            Term::True => true,
            Term::False => false,
            Term::Var(name) => assignment.get(name.as_str()).copied().unwrap_or(false),
            Term::Not(e) => !e.eval(assignment),
            Term::And(a, b) => a.eval(assignment) && b.eval(assignment),
            Term::Or(a, b) => a.eval(assignment) || b.eval(assignment),
        }
    }

    /// Collect every variable name mentioned in the formula.
    pub fn collect_vars(&self, out: &mut FxHashSet<String>) {
        match &*self.0 {
            Term::True | Term::False => {}
            Term::Var(name) => {
                out.insert(name.clone());
            }
            Term::Not(e) => e.collect_vars(out),
            Term::And(a, b) | Term::Or(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }
}

impl fmt::Display for FeatureExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Term::True => write!(f, "1"),
            Term::False => write!(f, "0"),
            Term::Var(name) => write!(f, "{name}"),
            Term::Not(e) => write!(f, "!{e:#}"),
            Term::And(a, b) => {
                if f.alternate() {
                    write!(f, "({a} && {b})")
                } else {
                    write!(f, "{a:#} && {b:#}")
                }
            }
            Term::Or(a, b) => {
                if f.alternate() {
                    write!(f, "({a} || {b})")
                } else {
                    write!(f, "{a:#} || {b:#}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_folding() {
        let a = FeatureExpr::var("A");
        assert_eq!(a.and(&FeatureExpr::true_()), a);
        assert_eq!(a.or(&FeatureExpr::false_()), a);
        assert!(a.and(&FeatureExpr::false_()).is_false());
        assert!(a.or(&FeatureExpr::true_()).is_true());
        assert_eq!(a.not().not(), a);
    }

    #[test]
    fn structural_equality_is_not_semantic() {
        let a = FeatureExpr::var("A");
        let b = FeatureExpr::var("B");
        // A && B and B && A are semantically equal but structurally distinct.
        assert_ne!(a.and(&b), b.and(&a));
        assert_eq!(a.and(&b), a.and(&b));
    }

    #[test]
    fn eval_defaults_unmentioned_to_false() {
        let e = FeatureExpr::var("A").or(&FeatureExpr::var("B").not());
        let mut assignment = FxHashMap::default();
        assignment.insert("A", false);
        // B unmentioned -> false -> !B is true.
        assert!(e.eval(&assignment));
    }

    #[test]
    fn display_renders_cpp_style() {
        let e = FeatureExpr::var("A").and(&FeatureExpr::var("B").not());
        assert_eq!(e.to_string(), "A && !B");
    }
}
