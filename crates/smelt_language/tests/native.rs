//! Tests for the C-native translator, fed with already-preprocessed C so
//! no external preprocessor is involved.

use smelt_language::ast::{DeclBody, IndexTarget};
use smelt_language::context::Context;
use smelt_language::native;
use smelt_language::primitive;
use smelt_language::types::{Type, TypeKind};

fn translate(source: &str) -> Context {
    let mut ctx = Context::new();
    native::parse_native(&mut ctx, source, "test.h").unwrap();
    ctx
}

fn decl_of<'a>(ctx: &'a Context, name: &str) -> &'a smelt_language::ast::Declaration {
    let entry = ctx.ast.lookup(name).unwrap_or_else(|| panic!("no entry for {}", name));
    match entry.target {
        IndexTarget::Decl(id) => ctx.ast.decl(id),
        other => panic!("expected a declaration for {}, got {:?}", name, other),
    }
}

#[test]
fn typedefs_become_aliases() {
    let ctx = translate("typedef unsigned long size_t;\n");
    let decl = decl_of(&ctx, "size_t");
    assert!(decl.is_native);
    assert_eq!(decl.native_filename.as_deref(), Some("test.h"));
    match &decl.body {
        DeclBody::Alias(a) => assert!(a.target.is_equal(&Type::primitive(primitive::ULONG))),
        other => panic!("expected an alias, got {:?}", other),
    }
}

#[test]
fn variadic_functions_carry_the_marker() {
    let ctx = translate("extern int printf(const char *format, ...);\n");
    let decl = decl_of(&ctx, "printf");
    match &decl.body {
        DeclBody::Function(f) => {
            assert!(f.is_extern);
            let signature = f.signature.as_ref().unwrap();
            assert!(signature.is_c_vararg);
            assert_eq!(signature.parameters.len(), 1);
            assert!(signature
                .return_type
                .is_equal(&Type::primitive(primitive::INT)));
            // char* comes through as char[], the SRC spelling of C strings.
            let format = &signature.parameters[0].ty;
            assert!(format.is_array(), "got {:?}", format);
        }
        other => panic!("expected a function, got {:?}", other),
    }
}

#[test]
fn struct_names_are_prefixed() {
    let ctx = translate("struct stat { int st_dev; long st_size; };\n");
    let decl = decl_of(&ctx, "struct_stat");
    assert!(decl.is_full);
    match &decl.body {
        DeclBody::Structure(s) => {
            assert_eq!(s.members.len(), 2);
            assert_eq!(s.members[0].name, "st_dev");
        }
        other => panic!("expected a structure, got {:?}", other),
    }
}

#[test]
fn struct_forward_then_body_merges() {
    let ctx = translate("struct node;\nstruct node { struct node *next; };\n");
    let decl = decl_of(&ctx, "struct_node");
    assert!(decl.is_full);
    match &decl.body {
        DeclBody::Structure(s) => {
            assert_eq!(s.members.len(), 1);
            assert!(s.members[0].ty.is_pointer());
        }
        other => panic!("expected a structure, got {:?}", other),
    }
}

#[test]
fn enums_are_prefixed_and_counted() {
    let ctx = translate("enum order { LT, EQ = 5, GT };\n");
    let decl = decl_of(&ctx, "enum_order");
    match &decl.body {
        DeclBody::Enum(e) => {
            let values: Vec<i64> = e.members.iter().map(|m| m.value).collect();
            assert_eq!(values, [0, 5, 6]);
        }
        other => panic!("expected an enum, got {:?}", other),
    }
    // Member names resolve globally.
    assert!(matches!(
        ctx.ast.lookup("EQ").unwrap().target,
        IndexTarget::EnumMember(_, 1)
    ));
}

#[test]
fn typedef_of_a_function_declarator_degrades_to_a_pointer() {
    let ctx = translate("typedef int (*compar_fn_t)(void, void);\n");
    let decl = decl_of(&ctx, "compar_fn_t");
    match &decl.body {
        DeclBody::Alias(a) => {
            assert!(a.target.is_pointer());
            assert!(matches!(a.target.kind, TypeKind::Primitive(i) if i == primitive::VOID));
        }
        other => panic!("expected an alias, got {:?}", other),
    }
}

#[test]
fn long_long_collapses_in_declarations() {
    let ctx = translate("extern long long counter;\n");
    let decl = decl_of(&ctx, "counter");
    match &decl.body {
        DeclBody::Alias(a) => assert!(a.target.is_equal(&Type::primitive(primitive::LONG))),
        other => panic!("expected an alias, got {:?}", other),
    }
}

#[test]
fn duplicate_declarations_are_ignored() {
    let ctx = translate(
        "extern int puts(const char *s);\n\
         extern int puts(const char *s);\n",
    );
    let count = ctx
        .ast
        .decls()
        .filter(|(_, d)| d.name.as_deref() == Some("puts"))
        .count();
    assert_eq!(count, 1);
}

#[test]
fn line_markers_and_attributes_are_dropped() {
    let ctx = translate(
        "# 1 \"/usr/include/stdio.h\" 1 3 4\n\
         extern int getchar(void) __attribute__ ((__nothrow__));\n",
    );
    let decl = decl_of(&ctx, "getchar");
    match &decl.body {
        DeclBody::Function(f) => {
            assert!(f.signature.as_ref().unwrap().parameters.is_empty());
        }
        other => panic!("expected a function, got {:?}", other),
    }
}
