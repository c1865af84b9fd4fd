//! AST nodes.
//!
//! A [`Node`] is an `Rc`-shared pair of a stable identity token and a
//! [`NodeKind`] variant. Identity, not structure, is what every analysis
//! map keys on: two `Id` nodes spelling the same name are distinct
//! entities, and the same node reached twice is the same entity. The
//! variant inventory covers the C declaration, statement, and expression
//! shapes a variability-aware front end produces, with `#ifdef` guards
//! carried by the `Opt` elements of every list field.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use varc_feat::FeatureExpr;

use crate::cond::Opt;

/// Stable identity token for one AST node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    fn fresh() -> NodeId {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A shared, immutable AST node. Cloning bumps a refcount.
///
/// Equality and hashing are by [`NodeId`] -- reference semantics.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

struct NodeData {
    id: NodeId,
    kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Node {
        Node(Rc::new(NodeData { id: NodeId::fresh(), kind }))
    }

    pub fn node_id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// The name carried by an `Id` node.
    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            NodeKind::Id { name } => Some(name),
            _ => None,
        }
    }

    /// Short human-readable form for diagnostics: `Id(x)#17`.
    pub fn describe(&self) -> String {
        match self.kind() {
            NodeKind::Id { name } => format!("Id({name}){}", self.node_id()),
            NodeKind::Constant { value } => format!("Constant({value}){}", self.node_id()),
            kind => format!("{}{}", kind.kind_name(), self.node_id()),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// One ordered group of a node's children: either a single child slot or
/// an `Opt` list. Sibling links and the `#ifdef` block machinery operate
/// within one `List` group and never across groups.
pub enum ChildGroup {
    Single(Node),
    List(Vec<(FeatureExpr, Node)>),
}

/// The tagged variant inventory.
#[derive(Debug)]
pub enum NodeKind {
    // ── Translation unit ─────────────────────────────────────────────────
    TranslationUnit { decls: Vec<Opt<Node>> },

    // ── Declarations ─────────────────────────────────────────────────────
    Declaration { specifiers: Vec<Opt<Node>>, init_declarators: Vec<Opt<Node>> },
    DeclarationStatement { decl: Node },
    InitDeclarator { declarator: Node, initializer: Option<Node> },
    AtomicNamedDeclarator { pointers: Vec<Opt<Node>>, id: Node, extensions: Vec<Opt<Node>> },
    NestedNamedDeclarator { pointers: Vec<Opt<Node>>, nested: Node, extensions: Vec<Opt<Node>> },
    Pointer,
    DeclParameterDeclList { params: Vec<Opt<Node>> },
    /// Parameter with a named declarator: `int x`.
    ParameterDeclarationD { specifiers: Vec<Opt<Node>>, declarator: Node },
    /// Parameter with an abstract declarator: `int *`.
    ParameterDeclarationAD { specifiers: Vec<Opt<Node>>, declarator: Node },
    /// Parameter with specifiers only: `void`.
    PlainParameterDeclaration { specifiers: Vec<Opt<Node>> },
    DeclArrayAccess { size: Option<Node> },
    TypeName { specifiers: Vec<Opt<Node>>, declarator: Option<Node> },
    PrimitiveTypeSpecifier { name: String },
    /// The `typedef` storage class keyword.
    TypedefSpecifier,
    /// A reference to a typedef'd name in type position.
    TypeDefTypeSpecifier { name: Node },
    StructOrUnionSpecifier {
        is_union: bool,
        tag: Option<Node>,
        /// `Some` for a definition with a member list, `None` for a tag
        /// reference.
        members: Option<Vec<Opt<Node>>>,
    },
    StructDeclaration { specifiers: Vec<Opt<Node>>, declarators: Vec<Opt<Node>> },
    StructDeclarator { declarator: Node, bit_width: Option<Node> },
    EnumSpecifier { tag: Option<Node>, enumerators: Option<Vec<Opt<Node>>> },
    Enumerator { id: Node, value: Option<Node> },

    // ── Statements ───────────────────────────────────────────────────────
    CompoundStatement { items: Vec<Opt<Node>> },
    IfStatement {
        condition: Node,
        then_branch: Node,
        elifs: Vec<Opt<Node>>,
        else_branch: Option<Node>,
    },
    /// One `else if` arm, flattened into the owning `IfStatement`.
    ElifStatement { condition: Node, then_branch: Node },
    SwitchStatement { expr: Node, body: Node },
    CaseStatement { value: Node, body: Option<Node> },
    DefaultStatement { body: Option<Node> },
    WhileStatement { condition: Node, body: Node },
    DoStatement { condition: Node, body: Node },
    ForStatement {
        init: Option<Node>,
        condition: Option<Node>,
        increment: Option<Node>,
        body: Node,
    },
    BreakStatement,
    ContinueStatement,
    ReturnStatement { expr: Option<Node> },
    /// `goto label`, or a computed `goto *expr` when the target is a
    /// `PointerDerefExpr`.
    GotoStatement { target: Node },
    LabelStatement { id: Node },
    ExprStatement { expr: Node },
    EmptyStatement,
    FunctionDef {
        specifiers: Vec<Opt<Node>>,
        declarator: Node,
        old_style_params: Vec<Opt<Node>>,
        body: Node,
    },

    // ── Expressions ──────────────────────────────────────────────────────
    Id { name: String },
    Constant { value: String },
    StringLit { value: String },
    PostfixExpr { base: Node, suffix: Node },
    /// `.field` or `->field`.
    PointerPostfixSuffix { operator: String, id: Node },
    /// `++` or `--`.
    SimplePostfixSuffix { operator: String },
    FunctionCall { args: Vec<Opt<Node>> },
    AssignExpr { target: Node, operator: String, source: Node },
    UnaryOpExpr { operator: String, expr: Node },
    NAryExpr { first: Node, others: Vec<Opt<Node>> },
    NArySubExpr { operator: String, expr: Node },
    CastExpr { type_name: Node, expr: Node },
    ConditionalExpr { condition: Node, then_expr: Option<Node>, else_expr: Node },
    PointerDerefExpr { expr: Node },
    SizeOfExprT { type_name: Node },
    BuiltinOffsetof { type_name: Node, designators: Vec<Opt<Node>> },
    OffsetofMemberDesignatorID { id: Node },
    /// GNU statement expression `({ ... })`.
    CompoundStatementExpr { body: Node },
}

fn list_group(items: &[Opt<Node>]) -> ChildGroup {
    ChildGroup::List(
        items
            .iter()
            .map(|opt| (opt.condition.clone(), opt.value.clone()))
            .collect(),
    )
}

fn single(node: &Node) -> ChildGroup {
    ChildGroup::Single(node.clone())
}

impl NodeKind {
    /// The variant name, for logs and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::TranslationUnit { .. } => "TranslationUnit",
            NodeKind::Declaration { .. } => "Declaration",
            NodeKind::DeclarationStatement { .. } => "DeclarationStatement",
            NodeKind::InitDeclarator { .. } => "InitDeclarator",
            NodeKind::AtomicNamedDeclarator { .. } => "AtomicNamedDeclarator",
            NodeKind::NestedNamedDeclarator { .. } => "NestedNamedDeclarator",
            NodeKind::Pointer => "Pointer",
            NodeKind::DeclParameterDeclList { .. } => "DeclParameterDeclList",
            NodeKind::ParameterDeclarationD { .. } => "ParameterDeclarationD",
            NodeKind::ParameterDeclarationAD { .. } => "ParameterDeclarationAD",
            NodeKind::PlainParameterDeclaration { .. } => "PlainParameterDeclaration",
            NodeKind::DeclArrayAccess { .. } => "DeclArrayAccess",
            NodeKind::TypeName { .. } => "TypeName",
            NodeKind::PrimitiveTypeSpecifier { .. } => "PrimitiveTypeSpecifier",
            NodeKind::TypedefSpecifier => "TypedefSpecifier",
            NodeKind::TypeDefTypeSpecifier { .. } => "TypeDefTypeSpecifier",
            NodeKind::StructOrUnionSpecifier { .. } => "StructOrUnionSpecifier",
            NodeKind::StructDeclaration { .. } => "StructDeclaration",
            NodeKind::StructDeclarator { .. } => "StructDeclarator",
            NodeKind::EnumSpecifier { .. } => "EnumSpecifier",
            NodeKind::Enumerator { .. } => "Enumerator",
            NodeKind::CompoundStatement { .. } => "CompoundStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::ElifStatement { .. } => "ElifStatement",
            NodeKind::SwitchStatement { .. } => "SwitchStatement",
            NodeKind::CaseStatement { .. } => "CaseStatement",
            NodeKind::DefaultStatement { .. } => "DefaultStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::DoStatement { .. } => "DoStatement",
            NodeKind::ForStatement { .. } => "ForStatement",
            NodeKind::BreakStatement => "BreakStatement",
            NodeKind::ContinueStatement => "ContinueStatement",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::GotoStatement { .. } => "GotoStatement",
            NodeKind::LabelStatement { .. } => "LabelStatement",
            NodeKind::ExprStatement { .. } => "ExprStatement",
            NodeKind::EmptyStatement => "EmptyStatement",
            NodeKind::FunctionDef { .. } => "FunctionDef",
            NodeKind::Id { .. } => "Id",
            NodeKind::Constant { .. } => "Constant",
            NodeKind::StringLit { .. } => "StringLit",
            NodeKind::PostfixExpr { .. } => "PostfixExpr",
            NodeKind::PointerPostfixSuffix { .. } => "PointerPostfixSuffix",
            NodeKind::SimplePostfixSuffix { .. } => "SimplePostfixSuffix",
            NodeKind::FunctionCall { .. } => "FunctionCall",
            NodeKind::AssignExpr { .. } => "AssignExpr",
            NodeKind::UnaryOpExpr { .. } => "UnaryOpExpr",
            NodeKind::NAryExpr { .. } => "NAryExpr",
            NodeKind::NArySubExpr { .. } => "NArySubExpr",
            NodeKind::CastExpr { .. } => "CastExpr",
            NodeKind::ConditionalExpr { .. } => "ConditionalExpr",
            NodeKind::PointerDerefExpr { .. } => "PointerDerefExpr",
            NodeKind::SizeOfExprT { .. } => "SizeOfExprT",
            NodeKind::BuiltinOffsetof { .. } => "BuiltinOffsetof",
            NodeKind::OffsetofMemberDesignatorID { .. } => "OffsetofMemberDesignatorID",
            NodeKind::CompoundStatementExpr { .. } => "CompoundStatementExpr",
        }
    }

    /// Ordered children, grouped by slot. This is the single structural
    /// authority: the index walk, the generic filters, and the def-use
    /// traversal all enumerate children through it.
    pub fn child_groups(&self) -> Vec<ChildGroup> {
        match self {
            NodeKind::TranslationUnit { decls } => vec![list_group(decls)],
            NodeKind::Declaration { specifiers, init_declarators } => {
                vec![list_group(specifiers), list_group(init_declarators)]
            }
            NodeKind::DeclarationStatement { decl } => vec![single(decl)],
            NodeKind::InitDeclarator { declarator, initializer } => {
                let mut groups = vec![single(declarator)];
                if let Some(init) = initializer {
                    groups.push(single(init));
                }
                groups
            }
            NodeKind::AtomicNamedDeclarator { pointers, id, extensions } => {
                vec![list_group(pointers), single(id), list_group(extensions)]
            }
            NodeKind::NestedNamedDeclarator { pointers, nested, extensions } => {
                vec![list_group(pointers), single(nested), list_group(extensions)]
            }
            NodeKind::Pointer => vec![],
            NodeKind::DeclParameterDeclList { params } => vec![list_group(params)],
            NodeKind::ParameterDeclarationD { specifiers, declarator }
            | NodeKind::ParameterDeclarationAD { specifiers, declarator } => {
                vec![list_group(specifiers), single(declarator)]
            }
            NodeKind::PlainParameterDeclaration { specifiers } => vec![list_group(specifiers)],
            NodeKind::DeclArrayAccess { size } => {
                size.as_ref().map(single).into_iter().collect()
            }
            NodeKind::TypeName { specifiers, declarator } => {
                let mut groups = vec![list_group(specifiers)];
                if let Some(decl) = declarator {
                    groups.push(single(decl));
                }
                groups
            }
            NodeKind::PrimitiveTypeSpecifier { .. } | NodeKind::TypedefSpecifier => vec![],
            NodeKind::TypeDefTypeSpecifier { name } => vec![single(name)],
            NodeKind::StructOrUnionSpecifier { tag, members, .. } => {
                let mut groups = Vec::new();
                if let Some(tag) = tag {
                    groups.push(single(tag));
                }
                if let Some(members) = members {
                    groups.push(list_group(members));
                }
                groups
            }
            NodeKind::StructDeclaration { specifiers, declarators } => {
                vec![list_group(specifiers), list_group(declarators)]
            }
            NodeKind::StructDeclarator { declarator, bit_width } => {
                let mut groups = vec![single(declarator)];
                if let Some(width) = bit_width {
                    groups.push(single(width));
                }
                groups
            }
            NodeKind::EnumSpecifier { tag, enumerators } => {
                let mut groups = Vec::new();
                if let Some(tag) = tag {
                    groups.push(single(tag));
                }
                if let Some(enumerators) = enumerators {
                    groups.push(list_group(enumerators));
                }
                groups
            }
            NodeKind::Enumerator { id, value } => {
                let mut groups = vec![single(id)];
                if let Some(value) = value {
                    groups.push(single(value));
                }
                groups
            }
            NodeKind::CompoundStatement { items } => vec![list_group(items)],
            NodeKind::IfStatement { condition, then_branch, elifs, else_branch } => {
                let mut groups = vec![single(condition), single(then_branch), list_group(elifs)];
                if let Some(els) = else_branch {
                    groups.push(single(els));
                }
                groups
            }
            NodeKind::ElifStatement { condition, then_branch } => {
                vec![single(condition), single(then_branch)]
            }
            NodeKind::SwitchStatement { expr, body } => vec![single(expr), single(body)],
            NodeKind::CaseStatement { value, body } => {
                let mut groups = vec![single(value)];
                if let Some(body) = body {
                    groups.push(single(body));
                }
                groups
            }
            NodeKind::DefaultStatement { body } => {
                body.as_ref().map(single).into_iter().collect()
            }
            NodeKind::WhileStatement { condition, body } => vec![single(condition), single(body)],
            NodeKind::DoStatement { condition, body } => vec![single(body), single(condition)],
            NodeKind::ForStatement { init, condition, increment, body } => {
                let mut groups = Vec::new();
                if let Some(init) = init {
                    groups.push(single(init));
                }
                if let Some(condition) = condition {
                    groups.push(single(condition));
                }
                if let Some(increment) = increment {
                    groups.push(single(increment));
                }
                groups.push(single(body));
                groups
            }
            NodeKind::BreakStatement
            | NodeKind::ContinueStatement
            | NodeKind::EmptyStatement => vec![],
            NodeKind::ReturnStatement { expr } => {
                expr.as_ref().map(single).into_iter().collect()
            }
            NodeKind::GotoStatement { target } => vec![single(target)],
            NodeKind::LabelStatement { id } => vec![single(id)],
            NodeKind::ExprStatement { expr } => vec![single(expr)],
            NodeKind::FunctionDef { specifiers, declarator, old_style_params, body } => {
                vec![
                    list_group(specifiers),
                    single(declarator),
                    list_group(old_style_params),
                    single(body),
                ]
            }
            NodeKind::Id { .. } | NodeKind::Constant { .. } | NodeKind::StringLit { .. } => vec![],
            NodeKind::PostfixExpr { base, suffix } => vec![single(base), single(suffix)],
            NodeKind::PointerPostfixSuffix { id, .. } => vec![single(id)],
            NodeKind::SimplePostfixSuffix { .. } => vec![],
            NodeKind::FunctionCall { args } => vec![list_group(args)],
            NodeKind::AssignExpr { target, source, .. } => vec![single(target), single(source)],
            NodeKind::UnaryOpExpr { expr, .. } => vec![single(expr)],
            NodeKind::NAryExpr { first, others } => vec![single(first), list_group(others)],
            NodeKind::NArySubExpr { expr, .. } => vec![single(expr)],
            NodeKind::CastExpr { type_name, expr } => vec![single(type_name), single(expr)],
            NodeKind::ConditionalExpr { condition, then_expr, else_expr } => {
                let mut groups = vec![single(condition)];
                if let Some(then_expr) = then_expr {
                    groups.push(single(then_expr));
                }
                groups.push(single(else_expr));
                groups
            }
            NodeKind::PointerDerefExpr { expr } => vec![single(expr)],
            NodeKind::SizeOfExprT { type_name } => vec![single(type_name)],
            NodeKind::BuiltinOffsetof { type_name, designators } => {
                vec![single(type_name), list_group(designators)]
            }
            NodeKind::OffsetofMemberDesignatorID { id } => vec![single(id)],
            NodeKind::CompoundStatementExpr { body } => vec![single(body)],
        }
    }
}

impl Node {
    /// All child nodes in source order, list conditions dropped.
    pub fn children(&self) -> Vec<Node> {
        let mut out = Vec::new();
        for group in self.kind().child_groups() {
            match group {
                ChildGroup::Single(child) => out.push(child),
                ChildGroup::List(pairs) => out.extend(pairs.into_iter().map(|(_, n)| n)),
            }
        }
        out
    }

    /// Whether this node is a C loop construct.
    pub fn is_loop(&self) -> bool {
        matches!(
            self.kind(),
            NodeKind::WhileStatement { .. }
                | NodeKind::DoStatement { .. }
                | NodeKind::ForStatement { .. }
        )
    }

    /// Whether a `break` inside this node's body jumps out of it.
    pub fn captures_break(&self) -> bool {
        self.is_loop() || matches!(self.kind(), NodeKind::SwitchStatement { .. })
    }
}

/// Resolve the defining `Id` inside any binding shape the environments
/// hand out: declarators, declarations, function definitions, enumerators,
/// fields, or a bare `Id`.
pub fn declarator_id(binding: &Node) -> Option<Node> {
    match binding.kind() {
        NodeKind::Id { .. } => Some(binding.clone()),
        NodeKind::AtomicNamedDeclarator { id, .. } => Some(id.clone()),
        NodeKind::NestedNamedDeclarator { nested, .. } => declarator_id(nested),
        NodeKind::InitDeclarator { declarator, .. } => declarator_id(declarator),
        NodeKind::StructDeclarator { declarator, .. } => declarator_id(declarator),
        NodeKind::FunctionDef { declarator, .. } => declarator_id(declarator),
        NodeKind::Enumerator { id, .. } => Some(id.clone()),
        NodeKind::ParameterDeclarationD { declarator, .. } => declarator_id(declarator),
        NodeKind::Declaration { init_declarators, .. } => {
            init_declarators.first().and_then(|opt| declarator_id(&opt.value))
        }
        NodeKind::StructDeclaration { declarators, .. } => {
            declarators.first().and_then(|opt| declarator_id(&opt.value))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build;

    #[test]
    fn identity_not_structure() {
        let a = build::ident("x");
        let b = build::ident("x");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.node_id(), b.node_id());
    }

    #[test]
    fn declarator_id_descends_nesting() {
        let decl = build::var_decl("count");
        let id = declarator_id(&decl).expect("declaration has a declarator id");
        assert_eq!(id.name(), Some("count"));

        let fndef = build::fn_def("main", vec![]);
        let id = declarator_id(&fndef).expect("function definition has a declarator id");
        assert_eq!(id.name(), Some("main"));
    }

    #[test]
    fn children_follow_source_order() {
        let f = build::for_stmt(
            Some(build::assign(build::ident("i"), build::constant("0"))),
            Some(build::lt(build::ident("i"), build::ident("n"))),
            Some(build::post_inc(build::ident("i"))),
            build::compound(vec![]),
        );
        let kids = f.children();
        assert_eq!(kids.len(), 4);
        assert!(matches!(kids[0].kind(), NodeKind::AssignExpr { .. }));
        assert!(matches!(kids[3].kind(), NodeKind::CompoundStatement { .. }));
    }
}
