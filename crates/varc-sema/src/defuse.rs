//! Def-use chain construction.
//!
//! One traversal per translation unit. The builder owns a [`NameEnv`],
//! registers every defining identifier it meets (declarators, function
//! definitions, parameters, enumerators, fields, labels), and resolves
//! every using identifier against the environment at the point of
//! traversal. The result is a [`DefUseMap`]: an insertion-ordered,
//! identity-keyed map from defining `Id` nodes to the uses that name them.
//!
//! The map is variability-agnostic. When a lookup yields a `Choice`, the
//! use is recorded once per configuration-distinct declarator; reconciling
//! the entries with feature conditions is the caller's business.
//!
//! Construction never fails. Unresolved names self-register as synthetic
//! roots, unrecognized shapes are logged and their children walked, and a
//! use recorded against a key that is itself only known as a use is
//! repaired by appending to the lists that contain it.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use varc_ast::{declarator_id, AstIndex, Node, NodeId, NodeKind, Opt};

use crate::env::NameEnv;

// ── The map ──────────────────────────────────────────────────────────────

/// One chain: a defining id and the ordered uses that refer to it.
pub struct DefUseEntry {
    pub key: Node,
    pub uses: Vec<Node>,
}

/// Identity-keyed def→uses map with stable insertion order.
#[derive(Default)]
pub struct DefUseMap {
    key_index: FxHashMap<NodeId, usize>,
    entries: Vec<DefUseEntry>,
    /// use id → indices of the entries whose lists contain it.
    use_owners: FxHashMap<NodeId, Vec<usize>>,
}

/// Render of one chain for summaries and serialized test fixtures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefUseChain {
    pub def: String,
    pub uses: Vec<String>,
}

impl DefUseMap {
    /// Register `key` as a defining id. Idempotent: a key appears exactly
    /// once no matter how often it is defined.
    pub fn define(&mut self, key: &Node) {
        if !self.key_index.contains_key(&key.node_id()) {
            self.key_index.insert(key.node_id(), self.entries.len());
            self.entries.push(DefUseEntry { key: key.clone(), uses: Vec::new() });
        }
    }

    /// Record `use_node` under `key`.
    ///
    /// If `key` is not registered but already appears as a use in existing
    /// lists, the use is appended to each of those lists instead -- the
    /// repair path for chains registered through a forward declaration.
    /// A completely unknown key is registered on the spot.
    pub fn record_use(&mut self, key: &Node, use_node: &Node) {
        if let Some(&slot) = self.key_index.get(&key.node_id()) {
            self.entries[slot].uses.push(use_node.clone());
            self.use_owners.entry(use_node.node_id()).or_default().push(slot);
            return;
        }
        if let Some(owners) = self.use_owners.get(&key.node_id()).cloned() {
            for slot in owners {
                self.entries[slot].uses.push(use_node.clone());
                self.use_owners.entry(use_node.node_id()).or_default().push(slot);
            }
            return;
        }
        self.define(key);
        self.record_use(key, use_node);
    }

    pub fn is_key(&self, node: &Node) -> bool {
        self.key_index.contains_key(&node.node_id())
    }

    pub fn is_use(&self, node: &Node) -> bool {
        self.use_owners.contains_key(&node.node_id())
    }

    /// The uses recorded under `key`, in traversal order.
    pub fn uses_of(&self, key: &Node) -> Option<&[Node]> {
        self.key_index
            .get(&key.node_id())
            .map(|&slot| self.entries[slot].uses.as_slice())
    }

    pub fn entries(&self) -> &[DefUseEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|entry| &entry.key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name-level rendering of every chain, in insertion order.
    pub fn chains(&self) -> Vec<DefUseChain> {
        self.entries
            .iter()
            .map(|entry| DefUseChain {
                def: entry.key.name().unwrap_or("<anonymous>").to_string(),
                uses: entry
                    .uses
                    .iter()
                    .map(|u| u.name().unwrap_or("<anonymous>").to_string())
                    .collect(),
            })
            .collect()
    }
}

// ── The builder ──────────────────────────────────────────────────────────

/// Build the def-use map for one translation unit.
pub fn build_def_use(unit: &Node, index: &AstIndex) -> DefUseMap {
    let mut builder = DefUseBuilder::new(index);
    builder.walk_unit(unit);
    builder.into_map()
}

pub struct DefUseBuilder<'a> {
    index: &'a AstIndex,
    env: NameEnv,
    map: DefUseMap,
}

impl<'a> DefUseBuilder<'a> {
    pub fn new(index: &'a AstIndex) -> Self {
        DefUseBuilder { index, env: NameEnv::new(), map: DefUseMap::default() }
    }

    pub fn env(&self) -> &NameEnv {
        &self.env
    }

    pub fn map(&self) -> &DefUseMap {
        &self.map
    }

    pub fn into_map(self) -> DefUseMap {
        self.map
    }

    pub fn walk_unit(&mut self, unit: &Node) {
        match unit.kind() {
            NodeKind::TranslationUnit { decls } => {
                for opt in decls {
                    self.external_decl(&opt.value);
                }
            }
            // A bare function or declaration is accepted as a unit of one.
            _ => self.external_decl(unit),
        }
    }

    fn external_decl(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::FunctionDef { .. } => self.walk_function(node),
            NodeKind::Declaration { .. } => self.add_decl(node),
            NodeKind::EmptyStatement => {}
            kind => {
                debug!(kind = kind.kind_name(), "unrecognized external declaration shape");
                for child in node.children() {
                    self.external_decl(&child);
                }
            }
        }
    }

    fn walk_function(&mut self, fndef: &Node) {
        self.add_def(fndef);
        let NodeKind::FunctionDef { declarator, old_style_params, body, specifiers } =
            fndef.kind()
        else {
            return;
        };
        self.walk_specifiers(specifiers);
        self.env.enter_scope();
        self.env.reset_labels();
        self.register_parameters(declarator);
        for opt in old_style_params {
            self.add_decl(&opt.value);
        }
        self.prescan_labels(body);
        self.visit_stmt(body);
        self.env.exit_scope();
    }

    /// Each parameter declarator becomes a key and a binding in the
    /// function scope.
    fn register_parameters(&mut self, declarator: &Node) {
        let NodeKind::AtomicNamedDeclarator { extensions, .. } = declarator.kind() else {
            return;
        };
        for ext in extensions {
            if let NodeKind::DeclParameterDeclList { params } = ext.value.kind() {
                for param in params {
                    match param.value.kind() {
                        NodeKind::ParameterDeclarationD { specifiers, declarator } => {
                            self.walk_specifiers(specifiers);
                            self.add_def(declarator);
                        }
                        NodeKind::ParameterDeclarationAD { specifiers, .. }
                        | NodeKind::PlainParameterDeclaration { specifiers } => {
                            self.walk_specifiers(specifiers);
                        }
                        kind => {
                            debug!(kind = kind.kind_name(), "unrecognized parameter shape");
                        }
                    }
                }
            }
        }
    }

    /// Labels are visible before their statement, so every label id in the
    /// function body is registered up front.
    fn prescan_labels(&mut self, body: &Node) {
        let mut work = vec![body.clone()];
        while let Some(node) = work.pop() {
            match node.kind() {
                NodeKind::LabelStatement { id } => {
                    self.map.define(id);
                    if let Some(name) = id.name() {
                        self.env.bind_label(name, id);
                    }
                }
                NodeKind::FunctionDef { .. } => continue,
                _ => {}
            }
            let mut kids = node.children();
            kids.reverse();
            work.extend(kids);
        }
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn visit_stmt(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::CompoundStatement { items } => {
                self.env.enter_scope();
                for opt in items {
                    self.visit_stmt(&opt.value);
                }
                self.env.exit_scope();
            }
            NodeKind::DeclarationStatement { decl } => self.add_decl(decl),
            NodeKind::Declaration { .. } => self.add_decl(node),
            NodeKind::ExprStatement { expr } => self.add_use(expr),
            NodeKind::IfStatement { condition, then_branch, elifs, else_branch } => {
                self.add_use(condition);
                self.visit_stmt(then_branch);
                for opt in elifs {
                    self.visit_stmt(&opt.value);
                }
                if let Some(els) = else_branch {
                    self.visit_stmt(els);
                }
            }
            NodeKind::ElifStatement { condition, then_branch } => {
                self.add_use(condition);
                self.visit_stmt(then_branch);
            }
            NodeKind::SwitchStatement { expr, body } => {
                self.add_use(expr);
                self.visit_stmt(body);
            }
            NodeKind::CaseStatement { value, body } => {
                self.add_use(value);
                if let Some(body) = body {
                    self.visit_stmt(body);
                }
            }
            NodeKind::DefaultStatement { body } => {
                if let Some(body) = body {
                    self.visit_stmt(body);
                }
            }
            NodeKind::WhileStatement { condition, body } => {
                self.add_use(condition);
                self.visit_stmt(body);
            }
            NodeKind::DoStatement { condition, body } => {
                self.visit_stmt(body);
                self.add_use(condition);
            }
            NodeKind::ForStatement { init, condition, increment, body } => {
                self.env.enter_scope();
                if let Some(init) = init {
                    if matches!(init.kind(), NodeKind::Declaration { .. }) {
                        self.add_decl(init);
                    } else {
                        self.add_use(init);
                    }
                }
                if let Some(condition) = condition {
                    self.add_use(condition);
                }
                if let Some(increment) = increment {
                    self.add_use(increment);
                }
                self.visit_stmt(body);
                self.env.exit_scope();
            }
            NodeKind::ReturnStatement { expr } => {
                if let Some(expr) = expr {
                    self.add_use(expr);
                }
            }
            NodeKind::GotoStatement { target } => self.add_goto(target),
            // Labels were registered by the prescan; the statement itself
            // contributes nothing further.
            NodeKind::LabelStatement { .. } => {}
            NodeKind::BreakStatement
            | NodeKind::ContinueStatement
            | NodeKind::EmptyStatement => {}
            NodeKind::FunctionDef { .. } => self.walk_function(node),
            kind => {
                debug!(kind = kind.kind_name(), "unrecognized statement shape");
                for child in node.children() {
                    self.visit_stmt(&child);
                }
            }
        }
    }

    fn add_goto(&mut self, target: &Node) {
        match target.kind() {
            NodeKind::Id { name } => {
                let labels: Vec<Node> = self.env.lookup_labels(name).to_vec();
                if labels.is_empty() {
                    debug!(label = %name, "goto to unknown label");
                    self.map.define(target);
                } else {
                    for label in labels {
                        self.map.record_use(&label, target);
                    }
                }
            }
            // Computed goto: the operand is an ordinary expression use.
            _ => self.add_use(target),
        }
    }

    // ── Declarations ─────────────────────────────────────────────────────

    /// Recursive dispatch over declaration syntax, delegating to the
    /// def/use operations at the leaf identifiers.
    pub fn add_decl(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::Declaration { specifiers, init_declarators } => {
                let is_typedef = specifiers
                    .iter()
                    .any(|opt| matches!(opt.value.kind(), NodeKind::TypedefSpecifier));
                self.walk_specifiers(specifiers);
                for opt in init_declarators {
                    let declarator = &opt.value;
                    if is_typedef {
                        self.add_typedef_def(declarator);
                    } else {
                        self.add_def(declarator);
                    }
                    if let NodeKind::InitDeclarator { initializer: Some(init), .. } =
                        declarator.kind()
                    {
                        self.add_use(init);
                    }
                    self.walk_declarator_extensions(declarator);
                }
            }
            NodeKind::DeclarationStatement { decl } => self.add_decl(decl),
            NodeKind::InitDeclarator { .. }
            | NodeKind::AtomicNamedDeclarator { .. }
            | NodeKind::FunctionDef { .. } => self.add_def(node),
            kind => {
                debug!(kind = kind.kind_name(), "unrecognized declaration shape");
            }
        }
    }

    /// Array sizes and prototype parameters nested inside a declarator.
    fn walk_declarator_extensions(&mut self, declarator: &Node) {
        let extensions = match declarator.kind() {
            NodeKind::InitDeclarator { declarator, .. } => {
                self.walk_declarator_extensions(declarator);
                return;
            }
            NodeKind::NestedNamedDeclarator { nested, extensions, .. } => {
                self.walk_declarator_extensions(nested);
                extensions
            }
            NodeKind::AtomicNamedDeclarator { extensions, .. } => extensions,
            _ => return,
        };
        for ext in extensions {
            match ext.value.kind() {
                NodeKind::DeclArrayAccess { size: Some(size) } => self.add_use(size),
                NodeKind::DeclArrayAccess { size: None } => {}
                NodeKind::DeclParameterDeclList { params } => {
                    // Prototype parameters: type uses only; the names are
                    // not visible outside the prototype.
                    for param in params {
                        match param.value.kind() {
                            NodeKind::ParameterDeclarationD { specifiers, declarator } => {
                                self.walk_specifiers(specifiers);
                                if let Some(id) = declarator_id(declarator) {
                                    self.map.define(&id);
                                }
                            }
                            NodeKind::ParameterDeclarationAD { specifiers, .. }
                            | NodeKind::PlainParameterDeclaration { specifiers } => {
                                self.walk_specifiers(specifiers);
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_specifiers(&mut self, specifiers: &[Opt<Node>]) {
        for opt in specifiers {
            let spec = &opt.value;
            match spec.kind() {
                NodeKind::StructOrUnionSpecifier { is_union, tag, members } => {
                    match members {
                        Some(members) => self.register_struct(*is_union, tag, members),
                        // A tag reference declares nothing.
                        None => {}
                    }
                }
                NodeKind::EnumSpecifier { enumerators: Some(enumerators), .. } => {
                    for opt in enumerators {
                        if let NodeKind::Enumerator { id, value } = opt.value.kind() {
                            self.map.define(id);
                            let cond = self.index.presence_condition(&opt.value);
                            if let Some(name) = id.name() {
                                self.env.bind_var(name, &cond, &opt.value);
                            }
                            if let Some(value) = value {
                                self.add_use(value);
                            }
                        }
                    }
                }
                NodeKind::EnumSpecifier { enumerators: None, .. } => {}
                NodeKind::TypeDefTypeSpecifier { name } => self.add_type_use(name),
                NodeKind::TypedefSpecifier
                | NodeKind::PrimitiveTypeSpecifier { .. }
                | NodeKind::Pointer => {}
                kind => {
                    debug!(kind = kind.kind_name(), "unrecognized specifier shape");
                }
            }
        }
    }

    fn register_struct(&mut self, is_union: bool, tag: &Option<Node>, members: &[Opt<Node>]) {
        let tag_name = tag.as_ref().and_then(|t| t.name()).map(str::to_string);
        if let Some(tag_name) = &tag_name {
            self.env.declare_struct(tag_name, is_union);
        }
        for member in members {
            let NodeKind::StructDeclaration { specifiers, declarators } = member.value.kind()
            else {
                debug!(kind = member.value.kind().kind_name(), "unrecognized struct member");
                continue;
            };
            self.walk_specifiers(specifiers);
            for opt in declarators {
                let NodeKind::StructDeclarator { declarator, bit_width } = opt.value.kind()
                else {
                    continue;
                };
                if let Some(id) = declarator_id(declarator) {
                    self.map.define(&id);
                    if let (Some(tag_name), Some(field)) = (&tag_name, id.name()) {
                        let cond = self.index.presence_condition(&opt.value);
                        // Field bindings are the id nodes themselves.
                        let field = field.to_string();
                        self.env.bind_field(tag_name, is_union, &field, &cond, &id);
                    }
                }
                if let Some(width) = bit_width {
                    self.add_use(width);
                }
            }
        }
    }

    fn add_typedef_def(&mut self, declarator: &Node) {
        let Some(id) = declarator_id(declarator) else {
            debug!(kind = declarator.kind().kind_name(), "typedef declarator without id");
            return;
        };
        self.map.define(&id);
        let cond = self.index.presence_condition(declarator);
        if let Some(name) = id.name() {
            self.env.bind_typedef(name, &cond, declarator);
        }
    }

    // ── Core operations ──────────────────────────────────────────────────

    /// Register a defining occurrence.
    ///
    /// A function definition reconciles with a prior forward declaration:
    /// the declaration's id stays the key and the definition's id becomes
    /// its first use. Every `Choice` arm of a prior binding is reconciled
    /// independently.
    pub fn add_def(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::FunctionDef { declarator, .. } => {
                let Some(id) = declarator_id(declarator) else {
                    debug!("function definition without declarator id");
                    return;
                };
                let name = id.name().unwrap_or_default().to_string();
                let cond = self.index.presence_condition(node);
                let prior = self.env.lookup_var(&name).cloned();
                match prior {
                    None => self.map.define(&id),
                    Some(binding) => {
                        let mut fresh = true;
                        for leaf in binding.leaves() {
                            match leaf {
                                Some(prior_node) => {
                                    if let Some(prior_id) = declarator_id(prior_node) {
                                        self.map.record_use(&prior_id, &id);
                                        fresh = false;
                                    }
                                }
                                None => {}
                            }
                        }
                        if fresh {
                            self.map.define(&id);
                        }
                    }
                }
                self.env.bind_var(&name, &cond, node);
            }
            NodeKind::InitDeclarator { .. }
            | NodeKind::AtomicNamedDeclarator { .. }
            | NodeKind::StructDeclarator { .. } => {
                let Some(id) = declarator_id(node) else {
                    debug!(kind = node.kind().kind_name(), "declarator without id");
                    return;
                };
                self.map.define(&id);
                let cond = self.index.presence_condition(node);
                if let Some(name) = id.name() {
                    self.env.bind_var(name, &cond, node);
                }
            }
            NodeKind::ParameterDeclarationD { declarator, .. } => self.add_def(declarator),
            NodeKind::StructDeclaration { declarators, .. } => {
                for opt in declarators {
                    if let Some(id) = declarator_id(&opt.value) {
                        self.map.define(&id);
                    }
                }
            }
            NodeKind::Id { name } => {
                // A bare id in defining position: a use of an existing
                // declarator, or a synthetic root.
                let resolved = self.resolve_var(name);
                if resolved.is_empty() {
                    self.map.define(node);
                    let cond = self.index.presence_condition(node);
                    self.env.bind_var(name, &cond, node);
                } else {
                    for key in resolved {
                        self.map.record_use(&key, node);
                    }
                }
            }
            kind => {
                debug!(kind = kind.kind_name(), "unrecognized defining shape");
            }
        }
    }

    /// Record every identifier use inside an expression. Work-list walk:
    /// deeply nested expressions must not exhaust the stack.
    pub fn add_use(&mut self, expr: &Node) {
        let mut work = vec![expr.clone()];
        while let Some(node) = work.pop() {
            match node.kind() {
                NodeKind::Id { name } => {
                    let resolved = self.resolve_var(name);
                    if resolved.is_empty() {
                        debug!(name = %name, "unresolved identifier, self-registering");
                        self.map.define(&node);
                        let cond = self.index.presence_condition(&node);
                        self.env.bind_var(name, &cond, &node);
                    } else {
                        for key in resolved {
                            self.map.record_use(&key, &node);
                        }
                    }
                }
                // Literals and sizeof-on-type contribute no uses.
                NodeKind::Constant { .. }
                | NodeKind::StringLit { .. }
                | NodeKind::SizeOfExprT { .. }
                | NodeKind::SimplePostfixSuffix { .. } => {}
                NodeKind::PostfixExpr { base, suffix } => {
                    match suffix.kind() {
                        NodeKind::PointerPostfixSuffix { id, .. } => {
                            self.add_member_use(base, id);
                        }
                        NodeKind::FunctionCall { args } => {
                            for arg in args.iter().rev() {
                                work.push(arg.value.clone());
                            }
                        }
                        NodeKind::SimplePostfixSuffix { .. } => {}
                        kind => {
                            debug!(kind = kind.kind_name(), "unrecognized postfix suffix");
                        }
                    }
                    work.push(base.clone());
                }
                NodeKind::AssignExpr { target, source, .. } => {
                    work.push(source.clone());
                    work.push(target.clone());
                }
                NodeKind::UnaryOpExpr { expr, .. }
                | NodeKind::PointerDerefExpr { expr }
                | NodeKind::NArySubExpr { expr, .. } => work.push(expr.clone()),
                NodeKind::NAryExpr { first, others } => {
                    for sub in others.iter().rev() {
                        work.push(sub.value.clone());
                    }
                    work.push(first.clone());
                }
                NodeKind::CastExpr { type_name, expr } => {
                    self.walk_type_name(type_name);
                    work.push(expr.clone());
                }
                NodeKind::ConditionalExpr { condition, then_expr, else_expr } => {
                    work.push(else_expr.clone());
                    if let Some(then_expr) = then_expr {
                        work.push(then_expr.clone());
                    }
                    work.push(condition.clone());
                }
                NodeKind::BuiltinOffsetof { type_name, designators } => {
                    self.add_offsetof(type_name, designators);
                }
                NodeKind::CompoundStatementExpr { body } => self.visit_stmt(body),
                kind => {
                    debug!(kind = kind.kind_name(), "unrecognized expression shape");
                    let mut kids = node.children();
                    kids.reverse();
                    work.extend(kids);
                }
            }
        }
    }

    /// Resolve `id` in the typedef namespace.
    pub fn add_type_use(&mut self, id: &Node) {
        let Some(name) = id.name() else { return };
        let keys: Vec<Node> = match self.env.lookup_typedef(name) {
            Some(binding) => binding
                .leaves()
                .into_iter()
                .flatten()
                .filter_map(declarator_id)
                .collect(),
            None => Vec::new(),
        };
        if keys.is_empty() {
            debug!(name = %name, "unresolved typedef name, self-registering");
            self.map.define(id);
        } else {
            for key in keys {
                self.map.record_use(&key, id);
            }
        }
    }

    /// Resolve `id` as a member of `(tag, is_union)`. Falls back to the
    /// typedef namespace when the struct is not yet known (forward
    /// reference through a typedef'd struct).
    pub fn add_struct_use(&mut self, id: &Node, tag: &str, is_union: bool) {
        if !self.env.has_struct(tag, is_union) {
            self.add_type_use(id);
            return;
        }
        let Some(name) = id.name() else { return };
        let keys: Vec<Node> = match self.env.lookup_field(tag, is_union, name) {
            Some(binding) => binding
                .leaves()
                .into_iter()
                .flatten()
                .filter_map(declarator_id)
                .collect(),
            None => Vec::new(),
        };
        if keys.is_empty() {
            debug!(field = %name, tag = %tag, "unresolved field, self-registering");
            self.map.define(id);
        } else {
            for key in keys {
                self.map.record_use(&key, id);
            }
        }
    }

    // ── Resolution helpers ───────────────────────────────────────────────

    /// Defining ids for `name` across every bound `Choice` arm.
    fn resolve_var(&self, name: &str) -> Vec<Node> {
        match self.env.lookup_var(name) {
            Some(binding) => binding
                .leaves()
                .into_iter()
                .flatten()
                .filter_map(declarator_id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Member access: resolve the base to its declaration and, when the
    /// declaration's specifiers name a known struct or union, resolve the
    /// member through the field environment. Without that much type
    /// information the member contributes no use.
    fn add_member_use(&mut self, base: &Node, member: &Node) {
        if let Some((tag, is_union)) = self.struct_tag_of(base) {
            self.add_struct_use(member, &tag, is_union);
        } else {
            debug!(
                member = member.name().unwrap_or("<anonymous>"),
                "member base with unknown struct type"
            );
        }
    }

    fn struct_tag_of(&self, base: &Node) -> Option<(String, bool)> {
        let name = match base.kind() {
            NodeKind::Id { name } => name,
            NodeKind::PointerDerefExpr { expr } | NodeKind::UnaryOpExpr { expr, .. } => {
                return self.struct_tag_of(expr)
            }
            _ => return None,
        };
        let binding = self.env.lookup_var(name)?;
        for leaf in binding.leaves().into_iter().flatten() {
            // The declarator's owning declaration carries the specifiers.
            let mut cursor = Some(leaf.clone());
            while let Some(node) = cursor {
                let specifiers = match node.kind() {
                    NodeKind::Declaration { specifiers, .. } => specifiers,
                    NodeKind::ParameterDeclarationD { specifiers, .. } => specifiers,
                    NodeKind::FunctionDef { specifiers, .. } => specifiers,
                    _ => {
                        cursor = self.index.parent(&node).cloned();
                        continue;
                    }
                };
                for opt in specifiers {
                    if let NodeKind::StructOrUnionSpecifier { is_union, tag: Some(tag), .. } =
                        opt.value.kind()
                    {
                        if let Some(tag) = tag.name() {
                            return Some((tag.to_string(), *is_union));
                        }
                    }
                }
                break;
            }
        }
        None
    }

    fn walk_type_name(&mut self, type_name: &Node) {
        if let NodeKind::TypeName { specifiers, .. } = type_name.kind() {
            self.walk_specifiers(specifiers);
        }
    }

    fn add_offsetof(&mut self, type_name: &Node, designators: &[Opt<Node>]) {
        let mut tag = None;
        if let NodeKind::TypeName { specifiers, .. } = type_name.kind() {
            for opt in specifiers {
                if let NodeKind::StructOrUnionSpecifier { is_union, tag: Some(t), .. } =
                    opt.value.kind()
                {
                    if let Some(name) = t.name() {
                        tag = Some((name.to_string(), *is_union));
                    }
                }
            }
        }
        self.walk_type_name(type_name);
        for opt in designators {
            if let NodeKind::OffsetofMemberDesignatorID { id } = opt.value.kind() {
                match &tag {
                    Some((tag, is_union)) => self.add_struct_use(id, tag, *is_union),
                    None => debug!("offsetof on a type without a struct tag"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varc_ast::build;
    use varc_ast::Opt;

    fn build_map(unit: &Node) -> DefUseMap {
        let index = AstIndex::build(unit);
        build_def_use(unit, &index)
    }

    #[test]
    fn orphan_use_repair_appends_to_owning_lists() {
        let key = build::ident("f");
        let first_use = build::ident("f");
        let late = build::ident("f");
        let mut map = DefUseMap::default();
        map.define(&key);
        map.record_use(&key, &first_use);
        // `first_use` is not a key; recording against it repairs into the
        // list that contains it.
        map.record_use(&first_use, &late);
        assert_eq!(map.uses_of(&key), Some(&[first_use, late][..]));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn define_is_idempotent() {
        let key = build::ident("x");
        let mut map = DefUseMap::default();
        map.define(&key);
        map.define(&key);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn unknown_key_registers_on_record() {
        let key = build::ident("x");
        let use_node = build::ident("x");
        let mut map = DefUseMap::default();
        map.record_use(&key, &use_node);
        assert!(map.is_key(&key));
        assert_eq!(map.uses_of(&key), Some(&[use_node][..]));
    }

    #[test]
    fn local_declaration_and_assignment() {
        // int x; x = 1;
        let decl = build::var_decl("x");
        let target = build::ident("x");
        let body = vec![
            Opt::new(build::decl_stmt(decl.clone())),
            Opt::new(build::expr_stmt(build::assign(target.clone(), build::constant("1")))),
        ];
        let f = build::fn_def("main", body);
        let unit = build::tu(vec![Opt::new(f)]);
        let map = build_map(&unit);

        let key = varc_ast::declarator_id(&decl).unwrap();
        assert!(map.is_key(&key));
        assert_eq!(map.uses_of(&key), Some(&[target][..]));
    }
}
