//! End-to-end tests for the three-pass import driver and the symbol table
//! it fills.

use smelt_language::ast::{DeclBody, IndexTarget};
use smelt_language::context::Context;
use smelt_language::import;
use smelt_language::primitive;
use smelt_language::types::{Type, TypeKind};
use std::fs;
use std::path::PathBuf;

fn write_project(files: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    for (name, source) in files {
        fs::write(dir.path().join(name), source).unwrap();
    }
    let origin = dir.path().join(files[0].0);
    (dir, origin)
}

fn parse_project(files: &[(&str, &str)]) -> smelt_base::Result<Context> {
    let (_dir, origin) = write_project(files);
    let mut ctx = Context::new();
    import::parse_origin(&mut ctx, &origin)?;
    Ok(ctx)
}

fn named_decls(ctx: &Context) -> Vec<String> {
    ctx.ast
        .decls()
        .filter_map(|(_, d)| d.name.clone())
        .collect()
}

#[test]
fn forward_declaration_promotes_to_full() {
    let ctx = parse_project(&[(
        "main.src",
        "struct N;\nstruct N { N* next; int v; }\n",
    )])
    .unwrap();

    let names = named_decls(&ctx);
    assert_eq!(names.iter().filter(|n| *n == "N").count(), 1);

    let entry = ctx.ast.lookup("N").unwrap();
    let id = match entry.target {
        IndexTarget::Decl(id) => id,
        other => panic!("expected a declaration, got {:?}", other),
    };
    let decl = ctx.ast.decl(id);
    assert!(decl.is_full);

    match &decl.body {
        DeclBody::Structure(s) => {
            assert_eq!(s.members.len(), 2);
            // The self-referential member resolves to the same declaration.
            match s.members[0].ty.kind {
                TypeKind::Structure(member_id) => assert_eq!(member_id, id),
                other => panic!("expected a structure type, got {:?}", other),
            }
            assert!(s.members[0].ty.is_pointer());
        }
        other => panic!("expected a structure, got {:?}", other),
    }
}

#[test]
fn cyclic_imports_converge() {
    let ctx = parse_project(&[
        ("a.src", "import b;\nstruct A { int x; }\n"),
        ("b.src", "import a;\nstruct B { int y; }\n"),
    ])
    .unwrap();

    let names = named_decls(&ctx);
    assert_eq!(names.iter().filter(|n| *n == "A").count(), 1);
    assert_eq!(names.iter().filter(|n| *n == "B").count(), 1);
}

#[test]
fn repeated_imports_are_idempotent() {
    let once = parse_project(&[
        ("main.src", "import util;\nfn main() -> int { return answer; }\n"),
        ("util.src", "int answer = 42;\n"),
    ])
    .unwrap();
    let twice = parse_project(&[
        (
            "main.src",
            "import util;\nimport util;\nfn main() -> int { return answer; }\n",
        ),
        ("util.src", "int answer = 42;\n"),
    ])
    .unwrap();

    assert_eq!(named_decls(&once), named_decls(&twice));
}

#[test]
fn imported_declarations_are_extern() {
    let ctx = parse_project(&[
        ("main.src", "import util;\nfn main() -> int { return helper(); }\n"),
        ("util.src", "fn helper() -> int { return 1; }\nint shared = 3;\n"),
    ])
    .unwrap();

    for (_, decl) in ctx.ast.decls() {
        match &decl.body {
            DeclBody::Function(f) if f.name == "helper" => {
                assert!(f.is_extern);
                assert!(f.body.is_none(), "imported bodies are never parsed");
            }
            DeclBody::Function(f) if f.name == "main" => {
                assert!(!f.is_extern);
                assert!(f.body.is_some());
            }
            DeclBody::Variable(v) if v.name == "shared" => {
                assert!(v.is_extern);
                assert!(v.value.is_none());
            }
            _ => {}
        }
    }
}

#[test]
fn declaration_order_follows_source_order() {
    let ctx = parse_project(&[(
        "main.src",
        "struct A { int x; }\nstruct B { int y; }\nint g = 1;\nfn main() -> int { return g; }\n",
    )])
    .unwrap();

    let names = named_decls(&ctx);
    let a = names.iter().position(|n| n == "A").unwrap();
    let b = names.iter().position(|n| n == "B").unwrap();
    let g = names.iter().position(|n| n == "g").unwrap();
    let main = names.iter().position(|n| n == "main").unwrap();
    assert!(a < b && b < g && g < main);
}

#[test]
fn unsigned_flag_rewrites_the_declared_type() {
    let ctx = parse_project(&[("main.src", "unsigned int x = 1;\n")]).unwrap();

    let entry = ctx.ast.lookup("x").unwrap();
    let id = match entry.target {
        IndexTarget::Decl(id) => id,
        other => panic!("expected a declaration, got {:?}", other),
    };
    match &ctx.ast.decl(id).body {
        DeclBody::Variable(v) => {
            assert!(v.ty.is_equal(&Type::primitive(primitive::UINT)));
            assert!(!v.ty.is_equal(&Type::primitive(primitive::INT)));
        }
        other => panic!("expected a variable, got {:?}", other),
    }
}

#[test]
fn unsigned_bool_is_a_syntax_error() {
    let err = parse_project(&[("main.src", "unsigned bool x = true;\n")]).unwrap_err();
    assert!(err.message.contains("unsigned"), "got: {}", err.message);
}

#[test]
fn boolean_plus_number_is_reported_with_both_types() {
    let err = parse_project(&[(
        "main.src",
        "fn main() -> int { return true + 1; }\n",
    )])
    .unwrap_err();
    assert!(err.message.contains("expected a number"), "got: {}", err.message);
    assert!(err.message.contains("bool"), "got: {}", err.message);
}

#[test]
fn logic_and_on_numbers_is_a_syntax_error() {
    let err = parse_project(&[(
        "main.src",
        "fn main() -> int { return (int) (1 && 2); }\n",
    )])
    .unwrap_err();
    assert!(err.message.contains("expected a boolean"), "got: {}", err.message);
}

#[test]
fn dereferencing_a_number_is_a_syntax_error() {
    let err = parse_project(&[(
        "main.src",
        "fn main() -> int { return *5; }\n",
    )])
    .unwrap_err();
    assert!(err.message.contains("cannot dereference"), "got: {}", err.message);
}

#[test]
fn enums_reject_mixed_member_values() {
    let err = parse_project(&[(
        "main.src",
        "enum Bad { A, B = 3 }\n",
    )])
    .unwrap_err();
    assert!(
        err.message.contains("implicit and explicit"),
        "got: {}",
        err.message
    );
}

#[test]
fn enum_members_count_from_zero() {
    let ctx = parse_project(&[("main.src", "enum Color { Red, Green, Blue }\n")]).unwrap();

    let entry = ctx.ast.lookup("Color").unwrap();
    let id = match entry.target {
        IndexTarget::Decl(id) => id,
        other => panic!("expected a declaration, got {:?}", other),
    };
    match &ctx.ast.decl(id).body {
        DeclBody::Enum(e) => {
            let values: Vec<i64> = e.members.iter().map(|m| m.value).collect();
            assert_eq!(values, [0, 1, 2]);
        }
        other => panic!("expected an enum, got {:?}", other),
    }

    // Members resolve through the index.
    let entry = ctx.ast.lookup("Green").unwrap();
    assert!(matches!(entry.target, IndexTarget::EnumMember(_, 1)));
}

#[test]
fn explicit_enum_values_evaluate_constant_expressions() {
    let ctx = parse_project(&[("main.src", "enum Mask { A = 1, B = 2, C = 1 + 2 }\n")]).unwrap();

    let entry = ctx.ast.lookup("Mask").unwrap();
    let id = match entry.target {
        IndexTarget::Decl(id) => id,
        other => panic!("expected a declaration, got {:?}", other),
    };
    match &ctx.ast.decl(id).body {
        DeclBody::Enum(e) => {
            let values: Vec<i64> = e.members.iter().map(|m| m.value).collect();
            assert_eq!(values, [1, 2, 3]);
        }
        other => panic!("expected an enum, got {:?}", other),
    }
}

#[test]
fn function_call_arity_is_checked() {
    let err = parse_project(&[(
        "main.src",
        "fn f(int a, int b) -> int { return a; }\nfn main() -> int { return f(1); }\n",
    )])
    .unwrap_err();
    assert!(err.message.contains("invalid argument count"), "got: {}", err.message);
}

#[test]
fn aliases_dissolve_into_their_target() {
    let ctx = parse_project(&[(
        "main.src",
        "alias Id = long;\nId counter = 1;\n",
    )])
    .unwrap();

    let entry = ctx.ast.lookup("counter").unwrap();
    let id = match entry.target {
        IndexTarget::Decl(id) => id,
        other => panic!("expected a declaration, got {:?}", other),
    };
    match &ctx.ast.decl(id).body {
        DeclBody::Variable(v) => assert!(v.ty.is_equal(&Type::primitive(primitive::LONG))),
        other => panic!("expected a variable, got {:?}", other),
    }
}

#[test]
fn if_condition_must_be_boolean() {
    let err = parse_project(&[(
        "main.src",
        "fn main() -> int { if (1) { return 1; } return 0; }\n",
    )])
    .unwrap_err();
    assert!(err.message.contains("must be a boolean"), "got: {}", err.message);
}
