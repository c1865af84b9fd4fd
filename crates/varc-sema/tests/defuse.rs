//! Integration tests for def-use chain construction.
//!
//! These exercise:
//! - Declaration/use association inside function bodies
//! - Forward declarations reconciled with function definitions
//! - `#ifdef`-alternative declarations (one use, two keys)
//! - Parameters, enumerators, typedefs, struct fields, labels
//! - Unresolved-name recovery and the duplicate-use policy

use varc_ast::{build, declarator_id, AstIndex, Node, NodeKind, Opt};
use varc_feat::FeatureExpr;
use varc_sema::{build_def_use, DefUseBuilder, DefUseMap};

fn analyze(unit: &Node) -> DefUseMap {
    let index = AstIndex::build(unit);
    build_def_use(unit, &index)
}

fn key_of(decl: &Node) -> Node {
    declarator_id(decl).expect("declaration carries a declarator id")
}

// ── Variables ──────────────────────────────────────────────────────────

#[test]
fn declaration_keys_and_assignment_uses() {
    // int x; x = 1; x = x + 2;
    let decl = build::var_decl("x");
    let first = build::ident("x");
    let second = build::ident("x");
    let third = build::ident("x");
    let body = vec![
        Opt::new(build::decl_stmt(decl.clone())),
        Opt::new(build::expr_stmt(build::assign(first.clone(), build::constant("1")))),
        Opt::new(build::expr_stmt(build::assign(
            second.clone(),
            build::binop(third.clone(), "+", build::constant("2")),
        ))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    let key = key_of(&decl);
    assert!(map.is_key(&key));
    let uses = map.uses_of(&key).unwrap();
    assert_eq!(uses.len(), 3);
    assert!(uses.contains(&first));
    assert!(uses.contains(&second));
    assert!(uses.contains(&third));
}

#[test]
fn initializer_uses_the_earlier_declaration() {
    // int a; int b = a;
    let decl_a = build::var_decl("a");
    let init_use = build::ident("a");
    let decl_b = build::var_decl_init("b", init_use.clone());
    let body = vec![
        Opt::new(build::decl_stmt(decl_a.clone())),
        Opt::new(build::decl_stmt(decl_b.clone())),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&decl_a)), Some(&[init_use][..]));
    assert!(map.uses_of(&key_of(&decl_b)).unwrap().is_empty());
}

#[test]
fn inner_scope_shadows_outer_declaration() {
    // int x; { int x; x = 1; }
    let outer = build::var_decl("x");
    let inner = build::var_decl("x");
    let use_x = build::ident("x");
    let block = build::compound(vec![
        Opt::new(build::decl_stmt(inner.clone())),
        Opt::new(build::expr_stmt(build::assign(use_x.clone(), build::constant("1")))),
    ]);
    let body = vec![Opt::new(build::decl_stmt(outer.clone())), Opt::new(block)];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&inner)), Some(&[use_x][..]));
    assert!(map.uses_of(&key_of(&outer)).unwrap().is_empty());
}

// ── Functions ──────────────────────────────────────────────────────────

#[test]
fn forward_declaration_owns_the_definition() {
    // int f(void); int f(void) { return 0; }
    let decl = build::fn_decl("f");
    let def = build::fn_def("f", vec![Opt::new(build::return_stmt(Some(build::constant("0"))))]);
    let unit = build::tu(vec![Opt::new(decl.clone()), Opt::new(def.clone())]);
    let map = analyze(&unit);

    let decl_id = key_of(&decl);
    let def_id = key_of(&def);
    assert!(map.is_key(&decl_id));
    assert!(!map.is_key(&def_id));
    // The definition's id is the declaration's first use.
    assert_eq!(map.uses_of(&decl_id), Some(&[def_id][..]));
}

#[test]
fn calls_use_the_declaration_through_the_definition() {
    // int f(void); int f(void) {} int main() { f(); }
    let decl = build::fn_decl("f");
    let def = build::fn_def("f", vec![]);
    let call = build::call("f", vec![]);
    let call_id = match call.kind() {
        NodeKind::PostfixExpr { base, .. } => base.clone(),
        _ => unreachable!(),
    };
    let main = build::fn_def("main", vec![Opt::new(build::expr_stmt(call))]);
    let unit = build::tu(vec![Opt::new(decl.clone()), Opt::new(def.clone()), Opt::new(main)]);
    let map = analyze(&unit);

    // Resolution goes through the definition, whose id is itself a use of
    // the declaration; the repair path lands the call on the same chain.
    let uses = map.uses_of(&key_of(&decl)).unwrap();
    assert!(uses.contains(&key_of(&def)));
    assert!(uses.contains(&call_id));
}

#[test]
fn parameters_are_keys_used_by_the_body() {
    // int add(int a, int b) { return a + b; }
    let param_a = build::param("a");
    let param_b = build::param("b");
    let use_a = build::ident("a");
    let use_b = build::ident("b");
    let body = vec![Opt::new(build::return_stmt(Some(build::binop(
        use_a.clone(),
        "+",
        use_b.clone(),
    ))))];
    let def = build::fn_def_with_params("add", vec![param_a.clone(), param_b.clone()], body);
    let unit = build::tu(vec![Opt::new(def)]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&param_a)), Some(&[use_a][..]));
    assert_eq!(map.uses_of(&key_of(&param_b)), Some(&[use_b][..]));
}

// ── Variability ────────────────────────────────────────────────────────

#[test]
fn alternative_declarations_each_receive_the_use() {
    // #if A int x; #else int x; #endif  x = 1;
    let a = FeatureExpr::var("A");
    let then_decl = build::var_decl("x");
    let else_decl = build::var_decl("x");
    let target = build::ident("x");
    let body = vec![
        Opt::when(a.clone(), build::decl_stmt(then_decl.clone())),
        Opt::when(a.not(), build::decl_stmt(else_decl.clone())),
        Opt::new(build::expr_stmt(build::assign(target.clone(), build::constant("1")))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    // Both configuration-distinct declarators are keys, and the single
    // use is attributed to each.
    assert_eq!(map.uses_of(&key_of(&then_decl)), Some(&[target.clone()][..]));
    assert_eq!(map.uses_of(&key_of(&else_decl)), Some(&[target][..]));
}

// ── Enumerators and typedefs ───────────────────────────────────────────

#[test]
fn enumerators_bind_in_the_ordinary_namespace() {
    // enum color { RED, GREEN = RED };  c = GREEN;
    let red = build::enumerator("RED", None);
    let red_ref = build::ident("RED");
    let green = build::enumerator("GREEN", Some(red_ref.clone()));
    let decl = build::enum_decl("color", vec![red.clone(), green.clone()]);
    let c_decl = build::var_decl("c");
    let green_ref = build::ident("GREEN");
    let body = vec![
        Opt::new(build::decl_stmt(decl)),
        Opt::new(build::decl_stmt(c_decl)),
        Opt::new(build::expr_stmt(build::assign(build::ident("c"), green_ref.clone()))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&red)), Some(&[red_ref][..]));
    assert_eq!(map.uses_of(&key_of(&green)), Some(&[green_ref][..]));
}

#[test]
fn typedef_names_resolve_in_their_own_namespace() {
    // typedef int T;  T v;  (and an ordinary variable T is undisturbed)
    let td = build::typedef_decl("T");
    let type_ref = build::typedef_type("T");
    let inner_id = match type_ref.kind() {
        NodeKind::TypeDefTypeSpecifier { name } => name.clone(),
        _ => unreachable!(),
    };
    let v_decl = build::decl_with_spec(type_ref, "v");
    let body = vec![Opt::new(build::decl_stmt(v_decl.clone()))];
    let unit = build::tu(vec![Opt::new(td.clone()), Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&td)), Some(&[inner_id][..]));
    assert!(map.is_key(&key_of(&v_decl)));
}

// ── Struct fields ──────────────────────────────────────────────────────

#[test]
fn member_access_resolves_through_the_field_environment() {
    // struct point { int x_; };  struct point p;  p.x_ = 1;
    let field = build::struct_field("x_");
    let field_key = key_of(&field);
    let sdef = build::struct_def("point", vec![field]);
    let p_decl = build::decl_with_spec(sdef, "p");
    let access = build::member(build::ident("p"), ".", "x_");
    let member_id = match access.kind() {
        NodeKind::PostfixExpr { suffix, .. } => match suffix.kind() {
            NodeKind::PointerPostfixSuffix { id, .. } => id.clone(),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    let body = vec![
        Opt::new(build::decl_stmt(p_decl.clone())),
        Opt::new(build::expr_stmt(build::assign(access, build::constant("1")))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&field_key), Some(&[member_id][..]));
}

#[test]
fn unknown_struct_falls_back_to_the_typedef_namespace() {
    let td = build::typedef_decl("obj");
    let index = AstIndex::build(&td);
    let mut builder = DefUseBuilder::new(&index);
    builder.add_decl(&td);

    // The member name happens to match a typedef; with the struct still
    // unknown, resolution falls back there.
    let member = build::ident("obj");
    builder.add_struct_use(&member, "obj", false);
    let map = builder.into_map();
    assert_eq!(map.uses_of(&key_of(&td)), Some(&[member][..]));
}

// ── Labels ─────────────────────────────────────────────────────────────

#[test]
fn goto_uses_its_label_even_before_it_appears() {
    // goto out; x(); out: ;
    let goto = build::goto_stmt("out");
    let goto_id = match goto.kind() {
        NodeKind::GotoStatement { target } => target.clone(),
        _ => unreachable!(),
    };
    let label = build::label_stmt("out");
    let label_id = match label.kind() {
        NodeKind::LabelStatement { id } => id.clone(),
        _ => unreachable!(),
    };
    let body = vec![
        Opt::new(goto),
        Opt::new(build::expr_stmt(build::call("x", vec![]))),
        Opt::new(label),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert!(map.is_key(&label_id));
    assert_eq!(map.uses_of(&label_id), Some(&[goto_id][..]));
}

// ── Recovery and policy ────────────────────────────────────────────────

#[test]
fn unresolved_identifier_becomes_a_synthetic_root() {
    // ghost = 1; ghost = 2;  -- no declaration anywhere.
    let first = build::ident("ghost");
    let second = build::ident("ghost");
    let body = vec![
        Opt::new(build::expr_stmt(build::assign(first.clone(), build::constant("1")))),
        Opt::new(build::expr_stmt(build::assign(second.clone(), build::constant("2")))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    // The first occurrence self-registers; the second resolves to it.
    assert!(map.is_key(&first));
    assert_eq!(map.uses_of(&first), Some(&[second][..]));
}

#[test]
fn duplicate_uses_are_preserved() {
    let key = build::ident("x");
    let use_node = build::ident("x");
    let mut map = DefUseMap::default();
    map.define(&key);
    map.record_use(&key, &use_node);
    map.record_use(&key, &use_node);
    assert_eq!(map.uses_of(&key).unwrap().len(), 2);
}

#[test]
fn every_identifier_lands_in_the_map() {
    // Closure: in a Choice-free unit, every expression-position id is
    // either a key or a use in exactly one chain.
    let decl = build::var_decl("x");
    let uses = [build::ident("x"), build::ident("x"), build::ident("x")];
    let body = vec![
        Opt::new(build::decl_stmt(decl.clone())),
        Opt::new(build::expr_stmt(build::assign(uses[0].clone(), build::constant("1")))),
        Opt::new(build::expr_stmt(build::call("f", vec![uses[1].clone()]))),
        Opt::new(build::return_stmt(Some(uses[2].clone()))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    for use_node in &uses {
        assert!(map.is_use(use_node), "{use_node:?} not attributed");
        let owners = map
            .entries()
            .iter()
            .filter(|entry| entry.uses.contains(use_node))
            .count();
        assert_eq!(owners, 1, "{use_node:?} attributed to {owners} chains");
    }
    // The call target self-registered as a synthetic root.
    assert_eq!(map.uses_of(&key_of(&decl)).unwrap().len(), 3);
}

#[test]
fn compound_expressions_are_walked_compositionally() {
    // int c; int p; int y; r = c ? *p : (int)(-y);
    let c_decl = build::var_decl("c");
    let p_decl = build::var_decl("p");
    let y_decl = build::var_decl("y");
    let c_use = build::ident("c");
    let p_use = build::ident("p");
    let y_use = build::ident("y");
    let rhs = build::ternary(
        c_use.clone(),
        build::deref(p_use.clone()),
        build::cast(build::type_name_of(build::int_spec()), build::unary("-", y_use.clone())),
    );
    let body = vec![
        Opt::new(build::decl_stmt(c_decl.clone())),
        Opt::new(build::decl_stmt(p_decl.clone())),
        Opt::new(build::decl_stmt(y_decl.clone())),
        Opt::new(build::expr_stmt(build::assign(build::ident("r"), rhs))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&c_decl)), Some(&[c_use][..]));
    assert_eq!(map.uses_of(&key_of(&p_decl)), Some(&[p_use][..]));
    assert_eq!(map.uses_of(&key_of(&y_decl)), Some(&[y_use][..]));
}

#[test]
fn sizeof_on_a_type_contributes_no_uses() {
    // int x; r = sizeof(int) + x;
    let x_decl = build::var_decl("x");
    let x_use = build::ident("x");
    let expr = build::binop(
        build::sizeof_type(build::type_name_of(build::int_spec())),
        "+",
        x_use.clone(),
    );
    let body = vec![
        Opt::new(build::decl_stmt(x_decl.clone())),
        Opt::new(build::expr_stmt(build::assign(build::ident("r"), expr))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&key_of(&x_decl)), Some(&[x_use][..]));
}

#[test]
fn offsetof_member_resolves_through_the_field_environment() {
    // struct hdr { int len; };  n = __builtin_offsetof(struct hdr, len);
    let field = build::struct_field("len");
    let field_key = key_of(&field);
    let sdef = build::struct_def("hdr", vec![field]);
    let sdef_decl = varc_ast::Node::new(varc_ast::NodeKind::Declaration {
        specifiers: vec![Opt::new(sdef)],
        init_declarators: vec![],
    });
    let offsetof = build::offsetof(build::type_name_of(build::struct_ref("hdr")), "len");
    let member_id = match offsetof.kind() {
        NodeKind::BuiltinOffsetof { designators, .. } => match designators[0].value.kind() {
            NodeKind::OffsetofMemberDesignatorID { id } => id.clone(),
            _ => unreachable!(),
        },
        _ => unreachable!(),
    };
    let body = vec![
        Opt::new(build::decl_stmt(sdef_decl)),
        Opt::new(build::expr_stmt(build::assign(build::ident("n"), offsetof))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    assert_eq!(map.uses_of(&field_key), Some(&[member_id][..]));
}

#[test]
fn chains_serialize_for_fixtures() {
    let decl = build::var_decl("counter");
    let target = build::ident("counter");
    let body = vec![
        Opt::new(build::decl_stmt(decl)),
        Opt::new(build::expr_stmt(build::assign(target, build::constant("1")))),
    ];
    let unit = build::tu(vec![Opt::new(build::fn_def("main", body))]);
    let map = analyze(&unit);

    let json = serde_json::to_string(&map.chains()).expect("chains serialize");
    assert!(json.contains("\"def\":\"counter\""));
    assert!(json.contains("\"uses\":[\"counter\"]"));
}
