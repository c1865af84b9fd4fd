//! Tree constructors.
//!
//! The front end that would normally produce these trees is out of scope,
//! so analyses and tests assemble them directly. Each helper allocates
//! fresh node identities; none of them share subtrees.

use varc_feat::FeatureExpr;

use crate::cond::Opt;
use crate::node::{Node, NodeKind};

// ── Leaves ───────────────────────────────────────────────────────────────

pub fn ident(name: impl Into<String>) -> Node {
    Node::new(NodeKind::Id { name: name.into() })
}

pub fn constant(value: impl Into<String>) -> Node {
    Node::new(NodeKind::Constant { value: value.into() })
}

pub fn string_lit(value: impl Into<String>) -> Node {
    Node::new(NodeKind::StringLit { value: value.into() })
}

pub fn int_spec() -> Node {
    Node::new(NodeKind::PrimitiveTypeSpecifier { name: "int".into() })
}

pub fn void_spec() -> Node {
    Node::new(NodeKind::PrimitiveTypeSpecifier { name: "void".into() })
}

pub fn typedef_spec() -> Node {
    Node::new(NodeKind::TypedefSpecifier)
}

pub fn typedef_type(name: impl Into<String>) -> Node {
    Node::new(NodeKind::TypeDefTypeSpecifier { name: ident(name) })
}

/// Wrap plain nodes as unconditional list elements.
pub fn stmts(nodes: Vec<Node>) -> Vec<Opt<Node>> {
    nodes.into_iter().map(Opt::new).collect()
}

// ── Declarators and declarations ─────────────────────────────────────────

pub fn atomic_declarator(name: impl Into<String>) -> Node {
    Node::new(NodeKind::AtomicNamedDeclarator {
        pointers: vec![],
        id: ident(name),
        extensions: vec![],
    })
}

pub fn init_declarator(name: impl Into<String>, initializer: Option<Node>) -> Node {
    Node::new(NodeKind::InitDeclarator {
        declarator: atomic_declarator(name),
        initializer,
    })
}

/// `int <name>;`
pub fn var_decl(name: impl Into<String>) -> Node {
    Node::new(NodeKind::Declaration {
        specifiers: vec![Opt::new(int_spec())],
        init_declarators: vec![Opt::new(init_declarator(name, None))],
    })
}

/// `int <name> = <init>;`
pub fn var_decl_init(name: impl Into<String>, init: Node) -> Node {
    Node::new(NodeKind::Declaration {
        specifiers: vec![Opt::new(int_spec())],
        init_declarators: vec![Opt::new(init_declarator(name, Some(init)))],
    })
}

/// A declaration whose single specifier is `spec`: `<spec> <name>;`
pub fn decl_with_spec(spec: Node, name: impl Into<String>) -> Node {
    Node::new(NodeKind::Declaration {
        specifiers: vec![Opt::new(spec)],
        init_declarators: vec![Opt::new(init_declarator(name, None))],
    })
}

/// `typedef int <name>;`
pub fn typedef_decl(name: impl Into<String>) -> Node {
    Node::new(NodeKind::Declaration {
        specifiers: vec![Opt::new(typedef_spec()), Opt::new(int_spec())],
        init_declarators: vec![Opt::new(init_declarator(name, None))],
    })
}

pub fn decl_stmt(decl: Node) -> Node {
    Node::new(NodeKind::DeclarationStatement { decl })
}

/// Forward function declaration `int <name>(void);`
pub fn fn_decl(name: impl Into<String>) -> Node {
    let declarator = Node::new(NodeKind::AtomicNamedDeclarator {
        pointers: vec![],
        id: ident(name),
        extensions: vec![Opt::new(Node::new(NodeKind::DeclParameterDeclList {
            params: vec![Opt::new(Node::new(NodeKind::PlainParameterDeclaration {
                specifiers: vec![Opt::new(void_spec())],
            }))],
        }))],
    });
    Node::new(NodeKind::Declaration {
        specifiers: vec![Opt::new(int_spec())],
        init_declarators: vec![Opt::new(Node::new(NodeKind::InitDeclarator {
            declarator,
            initializer: None,
        }))],
    })
}

/// Named parameter `int <name>`.
pub fn param(name: impl Into<String>) -> Node {
    Node::new(NodeKind::ParameterDeclarationD {
        specifiers: vec![Opt::new(int_spec())],
        declarator: atomic_declarator(name),
    })
}

// ── Struct and enum shapes ───────────────────────────────────────────────

/// Field declaration `int <name>;` inside a struct body.
pub fn struct_field(name: impl Into<String>) -> Node {
    Node::new(NodeKind::StructDeclaration {
        specifiers: vec![Opt::new(int_spec())],
        declarators: vec![Opt::new(Node::new(NodeKind::StructDeclarator {
            declarator: atomic_declarator(name),
            bit_width: None,
        }))],
    })
}

/// `struct <tag> { <fields> }`
pub fn struct_def(tag: impl Into<String>, fields: Vec<Node>) -> Node {
    Node::new(NodeKind::StructOrUnionSpecifier {
        is_union: false,
        tag: Some(ident(tag)),
        members: Some(fields.into_iter().map(Opt::new).collect()),
    })
}

/// Tag reference `struct <tag>` (no member list).
pub fn struct_ref(tag: impl Into<String>) -> Node {
    Node::new(NodeKind::StructOrUnionSpecifier {
        is_union: false,
        tag: Some(ident(tag)),
        members: None,
    })
}

pub fn enumerator(name: impl Into<String>, value: Option<Node>) -> Node {
    Node::new(NodeKind::Enumerator { id: ident(name), value })
}

/// `enum <tag> { <enumerators> };` as a bare declaration.
pub fn enum_decl(tag: impl Into<String>, enumerators: Vec<Node>) -> Node {
    Node::new(NodeKind::Declaration {
        specifiers: vec![Opt::new(Node::new(NodeKind::EnumSpecifier {
            tag: Some(ident(tag)),
            enumerators: Some(enumerators.into_iter().map(Opt::new).collect()),
        }))],
        init_declarators: vec![],
    })
}

// ── Functions ────────────────────────────────────────────────────────────

pub fn fn_def_with_params(
    name: impl Into<String>,
    params: Vec<Node>,
    items: Vec<Opt<Node>>,
) -> Node {
    let declarator = Node::new(NodeKind::AtomicNamedDeclarator {
        pointers: vec![],
        id: ident(name),
        extensions: vec![Opt::new(Node::new(NodeKind::DeclParameterDeclList {
            params: params.into_iter().map(Opt::new).collect(),
        }))],
    });
    Node::new(NodeKind::FunctionDef {
        specifiers: vec![Opt::new(int_spec())],
        declarator,
        old_style_params: vec![],
        body: compound(items),
    })
}

pub fn fn_def(name: impl Into<String>, items: Vec<Opt<Node>>) -> Node {
    fn_def_with_params(name, vec![], items)
}

pub fn fn_def_with_body(name: impl Into<String>, body: Node) -> Node {
    let declarator = Node::new(NodeKind::AtomicNamedDeclarator {
        pointers: vec![],
        id: ident(name),
        extensions: vec![Opt::new(Node::new(NodeKind::DeclParameterDeclList {
            params: vec![],
        }))],
    });
    Node::new(NodeKind::FunctionDef {
        specifiers: vec![Opt::new(int_spec())],
        declarator,
        old_style_params: vec![],
        body,
    })
}

pub fn tu(decls: Vec<Opt<Node>>) -> Node {
    Node::new(NodeKind::TranslationUnit { decls })
}

// ── Statements ───────────────────────────────────────────────────────────

pub fn compound(items: Vec<Opt<Node>>) -> Node {
    Node::new(NodeKind::CompoundStatement { items })
}

pub fn expr_stmt(expr: Node) -> Node {
    Node::new(NodeKind::ExprStatement { expr })
}

pub fn if_stmt(condition: Node, then_branch: Node) -> Node {
    Node::new(NodeKind::IfStatement {
        condition,
        then_branch,
        elifs: vec![],
        else_branch: None,
    })
}

pub fn if_else(condition: Node, then_branch: Node, else_branch: Node) -> Node {
    Node::new(NodeKind::IfStatement {
        condition,
        then_branch,
        elifs: vec![],
        else_branch: Some(else_branch),
    })
}

pub fn if_full(
    condition: Node,
    then_branch: Node,
    elifs: Vec<Opt<Node>>,
    else_branch: Option<Node>,
) -> Node {
    Node::new(NodeKind::IfStatement { condition, then_branch, elifs, else_branch })
}

pub fn elif(condition: Node, then_branch: Node) -> Node {
    Node::new(NodeKind::ElifStatement { condition, then_branch })
}

pub fn while_stmt(condition: Node, body: Node) -> Node {
    Node::new(NodeKind::WhileStatement { condition, body })
}

pub fn do_stmt(body: Node, condition: Node) -> Node {
    Node::new(NodeKind::DoStatement { condition, body })
}

pub fn for_stmt(
    init: Option<Node>,
    condition: Option<Node>,
    increment: Option<Node>,
    body: Node,
) -> Node {
    Node::new(NodeKind::ForStatement { init, condition, increment, body })
}

pub fn switch_stmt(expr: Node, items: Vec<Opt<Node>>) -> Node {
    Node::new(NodeKind::SwitchStatement { expr, body: compound(items) })
}

pub fn case_stmt(value: Node, body: Option<Node>) -> Node {
    Node::new(NodeKind::CaseStatement { value, body })
}

pub fn default_stmt(body: Option<Node>) -> Node {
    Node::new(NodeKind::DefaultStatement { body })
}

pub fn break_stmt() -> Node {
    Node::new(NodeKind::BreakStatement)
}

pub fn continue_stmt() -> Node {
    Node::new(NodeKind::ContinueStatement)
}

pub fn return_stmt(expr: Option<Node>) -> Node {
    Node::new(NodeKind::ReturnStatement { expr })
}

pub fn goto_stmt(label: impl Into<String>) -> Node {
    Node::new(NodeKind::GotoStatement { target: ident(label) })
}

/// `goto *expr;`
pub fn computed_goto(expr: Node) -> Node {
    Node::new(NodeKind::GotoStatement {
        target: Node::new(NodeKind::PointerDerefExpr { expr }),
    })
}

pub fn label_stmt(name: impl Into<String>) -> Node {
    Node::new(NodeKind::LabelStatement { id: ident(name) })
}

// ── Expressions ──────────────────────────────────────────────────────────

pub fn assign(target: Node, source: Node) -> Node {
    assign_op(target, "=", source)
}

pub fn assign_op(target: Node, operator: impl Into<String>, source: Node) -> Node {
    Node::new(NodeKind::AssignExpr { target, operator: operator.into(), source })
}

pub fn binop(first: Node, operator: impl Into<String>, second: Node) -> Node {
    Node::new(NodeKind::NAryExpr {
        first,
        others: vec![Opt::new(Node::new(NodeKind::NArySubExpr {
            operator: operator.into(),
            expr: second,
        }))],
    })
}

pub fn lt(a: Node, b: Node) -> Node {
    binop(a, "<", b)
}

pub fn post_inc(expr: Node) -> Node {
    Node::new(NodeKind::PostfixExpr {
        base: expr,
        suffix: Node::new(NodeKind::SimplePostfixSuffix { operator: "++".into() }),
    })
}

/// Member access `base.field` (`operator` "." ) or `base->field` ("->").
pub fn member(base: Node, operator: impl Into<String>, field: impl Into<String>) -> Node {
    Node::new(NodeKind::PostfixExpr {
        base,
        suffix: Node::new(NodeKind::PointerPostfixSuffix {
            operator: operator.into(),
            id: ident(field),
        }),
    })
}

pub fn call(name: impl Into<String>, args: Vec<Node>) -> Node {
    Node::new(NodeKind::PostfixExpr {
        base: ident(name),
        suffix: Node::new(NodeKind::FunctionCall {
            args: args.into_iter().map(Opt::new).collect(),
        }),
    })
}

pub fn unary(operator: impl Into<String>, expr: Node) -> Node {
    Node::new(NodeKind::UnaryOpExpr { operator: operator.into(), expr })
}

pub fn deref(expr: Node) -> Node {
    Node::new(NodeKind::PointerDerefExpr { expr })
}

pub fn cast(type_name: Node, expr: Node) -> Node {
    Node::new(NodeKind::CastExpr { type_name, expr })
}

pub fn ternary(condition: Node, then_expr: Node, else_expr: Node) -> Node {
    Node::new(NodeKind::ConditionalExpr {
        condition,
        then_expr: Some(then_expr),
        else_expr,
    })
}

pub fn type_name_of(spec: Node) -> Node {
    Node::new(NodeKind::TypeName { specifiers: vec![Opt::new(spec)], declarator: None })
}

pub fn sizeof_type(type_name: Node) -> Node {
    Node::new(NodeKind::SizeOfExprT { type_name })
}

/// `__builtin_offsetof(<type>, <member>)`
pub fn offsetof(type_name: Node, member: impl Into<String>) -> Node {
    Node::new(NodeKind::BuiltinOffsetof {
        type_name,
        designators: vec![Opt::new(Node::new(NodeKind::OffsetofMemberDesignatorID {
            id: ident(member),
        }))],
    })
}

/// Guarded list element.
pub fn when(condition: FeatureExpr, node: Node) -> Opt<Node> {
    Opt::when(condition, node)
}
