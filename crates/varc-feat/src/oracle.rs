//! The satisfiability oracle.
//!
//! All semantic questions about presence conditions go through
//! [`FeatureOracle`]. The oracle reduces every query to satisfiability,
//! delegates to a [`SatBackend`], and caches results per session: a unary
//! cache for satisfiability plus binary caches for `implies` and
//! `equivalent`, keyed by the (lhs, rhs) pair. Oracle calls are the hot
//! path of the sibling-selection machinery, so repeat queries must be
//! cheap.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::FeatureExpr;

/// A black-box satisfiability decision procedure.
///
/// The analysis core never looks inside a formula to decide truth; it asks
/// this trait. The in-tree backend enumerates assignments, which is fine
/// for the feature counts a single translation unit sees; a solver-backed
/// implementation can be slotted in without touching the engine.
pub trait SatBackend {
    fn is_satisfiable(&self, expr: &FeatureExpr) -> bool;
}

/// Exhaustive-enumeration backend: tries every assignment of the mentioned
/// variables.
#[derive(Default)]
pub struct EnumerationBackend;

impl SatBackend for EnumerationBackend {
    fn is_satisfiable(&self, expr: &FeatureExpr) -> bool {
        if expr.is_true() {
            return true;
        }
        if expr.is_false() {
            return false;
        }
        let mut vars = FxHashSet::default();
        expr.collect_vars(&mut vars);
        let mut vars: Vec<String> = vars.into_iter().collect();
        vars.sort();
        let n = vars.len();
        debug_assert!(n < 24, "enumeration backend given {n} variables");
        for mask in 0u64..(1u64 << n) {
            let mut assignment: FxHashMap<&str, bool> = FxHashMap::default();
            for (i, v) in vars.iter().enumerate() {
                assignment.insert(v.as_str(), mask & (1 << i) != 0);
            }
            if expr.eval(&assignment) {
                return true;
            }
        }
        false
    }
}

/// The session-scoped oracle: a backend plus memoized query results.
///
/// Interior mutability keeps the query surface `&self`; the whole analysis
/// session is single-threaded by contract.
pub struct FeatureOracle {
    backend: Box<dyn SatBackend>,
    sat_cache: RefCell<FxHashMap<FeatureExpr, bool>>,
    implies_cache: RefCell<FxHashMap<(FeatureExpr, FeatureExpr), bool>>,
    equiv_cache: RefCell<FxHashMap<(FeatureExpr, FeatureExpr), bool>>,
}

impl Default for FeatureOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureOracle {
    /// Oracle over the enumeration backend.
    pub fn new() -> Self {
        Self::with_backend(Box::new(EnumerationBackend))
    }

    pub fn with_backend(backend: Box<dyn SatBackend>) -> Self {
        FeatureOracle {
            backend,
            sat_cache: RefCell::new(FxHashMap::default()),
            implies_cache: RefCell::new(FxHashMap::default()),
            equiv_cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Whether some configuration satisfies `expr`.
    pub fn is_satisfiable(&self, expr: &FeatureExpr) -> bool {
        if expr.is_true() {
            return true;
        }
        if expr.is_false() {
            return false;
        }
        if let Some(&hit) = self.sat_cache.borrow().get(expr) {
            return hit;
        }
        let result = self.backend.is_satisfiable(expr);
        self.sat_cache.borrow_mut().insert(expr.clone(), result);
        result
    }

    /// Whether every configuration satisfies `expr`.
    pub fn is_tautology(&self, expr: &FeatureExpr) -> bool {
        !self.is_satisfiable(&expr.not())
    }

    /// Whether no configuration satisfies `expr`.
    pub fn is_contradiction(&self, expr: &FeatureExpr) -> bool {
        !self.is_satisfiable(expr)
    }

    /// Whether `lhs -> rhs` holds in every configuration.
    pub fn implies(&self, lhs: &FeatureExpr, rhs: &FeatureExpr) -> bool {
        let key = (lhs.clone(), rhs.clone());
        if let Some(&hit) = self.implies_cache.borrow().get(&key) {
            return hit;
        }
        let result = !self.is_satisfiable(&lhs.and(&rhs.not()));
        self.implies_cache.borrow_mut().insert(key, result);
        result
    }

    /// Whether `lhs` and `rhs` select exactly the same configurations.
    pub fn equivalent(&self, lhs: &FeatureExpr, rhs: &FeatureExpr) -> bool {
        if lhs == rhs {
            return true;
        }
        let key = (lhs.clone(), rhs.clone());
        if let Some(&hit) = self.equiv_cache.borrow().get(&key) {
            return hit;
        }
        let result = self.implies(lhs, rhs) && self.implies(rhs, lhs);
        self.equiv_cache.borrow_mut().insert(key, result);
        result
    }

    /// Whether `lhs` and `rhs` can never hold together.
    pub fn mutually_exclusive(&self, lhs: &FeatureExpr, rhs: &FeatureExpr) -> bool {
        !self.is_satisfiable(&lhs.and(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> FeatureOracle {
        FeatureOracle::new()
    }

    #[test]
    fn sat_basics() {
        let o = oracle();
        let a = FeatureExpr::var("A");
        assert!(o.is_satisfiable(&a));
        assert!(o.is_satisfiable(&a.not()));
        assert!(o.is_contradiction(&a.and(&a.not())));
        assert!(o.is_tautology(&a.or(&a.not())));
    }

    #[test]
    fn implication_and_equivalence() {
        let o = oracle();
        let a = FeatureExpr::var("A");
        let b = FeatureExpr::var("B");
        let ab = a.and(&b);
        assert!(o.implies(&ab, &a));
        assert!(!o.implies(&a, &ab));
        assert!(o.equivalent(&a.and(&b), &b.and(&a)));
        assert!(!o.equivalent(&a, &b));
        assert!(o.mutually_exclusive(&a, &a.not()));
        assert!(!o.mutually_exclusive(&a, &b));
    }

    #[test]
    fn alternative_arms_cover() {
        // #if A / #else arms together cover every configuration.
        let o = oracle();
        let a = FeatureExpr::var("A");
        let cover = a.or(&a.not());
        assert!(o.is_tautology(&cover));
        // A refined context is still covered.
        assert!(o.implies(&FeatureExpr::var("B"), &cover));
    }

    #[test]
    fn cached_queries_are_stable() {
        let o = oracle();
        let a = FeatureExpr::var("A");
        let b = FeatureExpr::var("B");
        for _ in 0..3 {
            assert!(o.implies(&a.and(&b), &a));
            assert!(o.equivalent(&a.or(&b), &b.or(&a)));
            assert!(o.is_satisfiable(&a.and(&b.not())));
        }
    }
}
