//! Name resolution and def-use chains for variability-aware C.
//!
//! [`NameEnv`] is a scope stack whose bindings are conditional: one name
//! may resolve to different declarators under disjoint presence
//! conditions. [`build_def_use`] drives one traversal of a translation
//! unit, populating the environment as declarations are met and resolving
//! every identifier use against it, producing the identity-keyed
//! [`DefUseMap`].

mod defuse;
mod env;

pub use defuse::{build_def_use, DefUseBuilder, DefUseChain, DefUseEntry, DefUseMap};
pub use env::{Binding, NameEnv};
