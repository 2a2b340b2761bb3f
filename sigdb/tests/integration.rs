//! Integration tests for sigdb
//!
//! Loads a core library fixture and exercises the full pipeline:
//! - Loading and validation diagnostics
//! - Name resolution and ancestor chains
//! - Method lookup
//! - Subtyping and overload resolution

use std::collections::HashSet;

use sigdb::Environment;
use sigdb::ancestors::SingletonAncestor;
use sigdb::ast::TypeExpr;
use sigdb::config::Config;
use sigdb::graph::{MemberName, NodeId};
use sigdb::parser::{parse_method_type, parse_type};
use sigdb::query::QueryEngine;
use sigdb::types::{CallResolution, CallSite};

const CORE: &str = include_str!("fixtures/core.sig");

/// Helper to build an environment from the fixture plus extra sources
fn env_with(extra: &[&str]) -> Environment {
    let mut env = Environment::new(Config::default());
    let diagnostics = env.load_source("core.sig", CORE);
    assert!(diagnostics.is_empty(), "fixture failed to load: {diagnostics:?}");
    for (i, source) in extra.iter().enumerate() {
        let diagnostics = env.load_source(&format!("extra{i}.sig"), source);
        assert!(diagnostics.is_empty(), "extra source failed to load: {diagnostics:?}");
    }
    env
}

fn core() -> Environment {
    env_with(&[])
}

fn ty(text: &str) -> TypeExpr {
    parse_type(text).unwrap()
}

fn node(env: &Environment, name: &str) -> NodeId {
    env.resolve(name).found().unwrap()
}

fn ancestor_names(env: &Environment, name: &str) -> Vec<String> {
    env.ancestors(node(env, name))
        .into_iter()
        .map(|id| env.graph().node(id).name.to_string())
        .collect()
}

fn subtype(env: &Environment, sub: &str, sup: &str) -> bool {
    env.is_subtype(&ty(sub), &ty(sup))
}

// ============================================
// Loading and Validation
// ============================================

#[test]
fn test_fixture_validates_cleanly() {
    let env = core();
    let diagnostics = env.validate();
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn test_validation_reports_broken_corpus() {
    let env = env_with(&["
        class Broken < Kernel
          include Strin
          def size: () -> Array[Integer, String]
          alias count missing_count
        end
    "]);
    let kinds: Vec<&str> = env.validate().iter().map(|d| d.error.kind()).collect();
    assert_eq!(
        kinds,
        vec!["invalid-superclass", "unresolved", "generic-arity", "dangling-alias"]
    );
}

#[test]
fn test_unresolved_mixin_suggests_name() {
    let env = env_with(&["class Broken\n  include Comparabel\nend"]);
    let diagnostics = env.validate();
    assert_eq!(diagnostics.len(), 1);
    let message = diagnostics[0].error.to_string();
    assert!(message.contains("did you mean `::Comparable`?"), "{message}");
    let location = diagnostics[0].location.as_ref().unwrap();
    assert_eq!(location.file, "extra0.sig");
}

#[test]
fn test_kind_conflict_is_batch_reported() {
    let mut env = core();
    let diagnostics = env.load_source(
        "bad.sig",
        "module String end
         class Fresh end",
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].error.kind(), "kind-conflict");
    assert!(env.resolve("Fresh").is_found());
}

// ============================================
// Ancestors
// ============================================

#[test]
fn test_every_ancestor_chain_starts_with_node_and_has_no_duplicates() {
    let env = core();
    for decl in env.graph().nodes() {
        let chain = env.ancestors(decl.id);
        assert_eq!(chain.first(), Some(&decl.id), "{}", decl.name);
        assert_eq!(chain.iter().filter(|id| **id == decl.id).count(), 1);
        let names: HashSet<String> = chain
            .iter()
            .map(|id| env.graph().node(*id).name.to_string())
            .collect();
        assert_eq!(names.len(), chain.len(), "duplicate in chain of {}", decl.name);
    }
}

#[test]
fn test_integer_chain() {
    let env = core();
    assert_eq!(
        ancestor_names(&env, "Integer"),
        vec!["::Integer", "::Numeric", "::Comparable", "::Object", "::Kernel", "::BasicObject"]
    );
}

#[test]
fn test_later_include_is_closer() {
    let env = env_with(&["
        module M1 end
        module M2 end
        class C
          include M1
          include M2
        end
    "]);
    assert_eq!(
        ancestor_names(&env, "C"),
        vec!["::C", "::M2", "::M1", "::Object", "::Kernel", "::BasicObject"]
    );
}

#[test]
fn test_generic_arguments_thread_through_ancestors() {
    let env = core();
    let hash = node(&env, "Hash");
    let enumerable = env
        .engine()
        .instance_ancestors(hash)
        .into_iter()
        .find(|a| env.graph().node(a.node).name.to_string() == "::Enumerable")
        .unwrap();
    insta::assert_snapshot!(enumerable.args[0].to_string(), @"[K, V]");
}

#[test]
fn test_singleton_chain() {
    let env = core();
    let chain = env.singleton_ancestors(node(&env, "Integer"));
    let names: Vec<String> = chain
        .iter()
        .map(|entry| match entry {
            SingletonAncestor::Singleton(id) => {
                format!("singleton({})", env.graph().node(*id).name)
            }
            SingletonAncestor::Instance(a) => env.graph().node(a.node).name.to_string(),
        })
        .collect();
    assert_eq!(names[0], "singleton(::Integer)");
    assert_eq!(names[1], "singleton(::Numeric)");
    assert!(names.contains(&"::Class".to_string()));
    assert!(names.contains(&"::Module".to_string()));
}

// ============================================
// Method Lookup
// ============================================

#[test]
fn test_reopening_merges_members() {
    let env = env_with(&["
        class String
          def shout: () -> String
        end
    "]);
    let string = node(&env, "String");
    assert!(env.lookup_method(string, &MemberName::instance("size")).is_some());
    assert!(env.lookup_method(string, &MemberName::instance("shout")).is_some());
    assert_eq!(env.graph().node(string).locations.len(), 2);
}

#[test]
fn test_lookup_walks_ancestors_and_reports_visibility() {
    let env = core();
    let integer = node(&env, "Integer");
    let between = env
        .lookup_method(integer, &MemberName::instance("between?"))
        .unwrap();
    assert_eq!(env.graph().node(between.owner).name.to_string(), "::Comparable");

    let raise = env.lookup_method(integer, &MemberName::instance("raise")).unwrap();
    assert_eq!(raise.visibility.to_string(), "private");

    let puts = env.lookup_method(node(&env, "Kernel"), &MemberName::singleton("puts"));
    assert_eq!(puts.unwrap().visibility.to_string(), "public");
}

#[test]
fn test_alias_lookup() {
    let env = core();
    let found = env
        .lookup_method(node(&env, "String"), &MemberName::instance("length"))
        .unwrap();
    assert_eq!(found.name, "size");
    assert_eq!(found.overloads[0].signature.to_string(), "() -> Integer");
}

#[test]
fn test_singleton_lookup_reaches_class() {
    let env = core();
    let found = env
        .lookup_method(node(&env, "Integer"), &MemberName::singleton("allocate"))
        .unwrap();
    assert_eq!(env.graph().node(found.owner).name.to_string(), "::Class");
}

// ============================================
// Subtyping
// ============================================

#[test]
fn test_reflexivity() {
    let env = core();
    for text in [
        "Integer",
        "Array[String]",
        "Hash[Symbol, Integer | nil]",
        "_ToS",
        "singleton(File)",
        "[Integer, String]",
        "{ name: String }",
        "^(Integer) -> String",
        "int",
        ":sym",
        "self",
    ] {
        assert!(subtype(&env, text, text), "{text} <: {text}");
    }
}

#[test]
fn test_nominal_transitivity() {
    let env = core();
    assert!(subtype(&env, "Integer", "Numeric"));
    assert!(subtype(&env, "Numeric", "Comparable"));
    assert!(subtype(&env, "Integer", "Comparable"));
    assert!(subtype(&env, "Integer", "BasicObject"));
    assert!(!subtype(&env, "String", "Numeric"));
    assert!(!subtype(&env, "Numeric", "Integer"));
}

#[test]
fn test_untyped_escape_hatch() {
    let env = core();
    for text in ["Integer", "Array[String]", "_ToS", "nil", "bot", "top", "[1, 2]"] {
        assert!(subtype(&env, text, "untyped"), "{text} <: untyped");
        assert!(subtype(&env, "untyped", text), "untyped <: {text}");
    }
}

#[test]
fn test_structural_interface_conformance() {
    let base = "
        class BasicObject end
        class Object < BasicObject end
        class String end
        interface _ToS
          def to_s: () -> String
        end
    ";
    let mut with_method = Environment::default();
    assert!(with_method.load_source("base.sig", base).is_empty());
    assert!(
        with_method
            .load_source("foo.sig", "class Foo\n  def to_s: () -> String\nend")
            .is_empty()
    );
    assert!(with_method.is_subtype(&ty("Foo"), &ty("_ToS")));

    let mut without = Environment::default();
    assert!(without.load_source("base.sig", base).is_empty());
    assert!(without.load_source("foo.sig", "class Foo end").is_empty());
    assert!(!without.is_subtype(&ty("Foo"), &ty("_ToS")));
}

#[test]
fn test_interfaces_against_core() {
    let env = core();
    assert!(subtype(&env, "String", "_ToStr"));
    assert!(!subtype(&env, "Integer", "_ToStr"));
    assert!(subtype(&env, "Integer", "_ToInt"));
    assert!(subtype(&env, "Array[Integer]", "_Each[Integer]"));
    assert!(subtype(&env, "Array[Integer]", "_Each[Numeric]"));
}

#[test]
fn test_signature_params_are_contravariant_everywhere() {
    let env = env_with(&["
        interface _Formatter
          def format: (String, *Integer, Integer, width: Integer) -> String
        end
        class WideFormatter
          def format: (String, *Numeric, Numeric, ?width: Numeric, **untyped) -> String
        end
        class TrailingStringFormatter
          def format: (String, *Integer, String, width: Integer) -> String
        end
        class StrictFormatter
          def format: (String, *Integer, Integer, width: Integer, fill: String) -> String
        end
    "]);
    assert!(subtype(&env, "WideFormatter", "_Formatter"));
    assert!(!subtype(&env, "TrailingStringFormatter", "_Formatter"));
    assert!(!subtype(&env, "StrictFormatter", "_Formatter"));

    let proc_form = "^(String, *Integer, Integer, width: Integer) -> String";
    assert!(subtype(
        &env,
        "^(String, *Numeric, Numeric, ?width: Numeric, **untyped) -> String",
        proc_form
    ));
    assert!(!subtype(&env, "^(String, *Integer, String, width: Integer) -> String", proc_form));
    assert!(!subtype(
        &env,
        "^(String, *Integer, Integer, width: Integer, fill: String) -> String",
        proc_form
    ));
    assert!(!subtype(&env, "^(String, *String, Integer, width: Integer) -> String", proc_form));
}

#[test]
fn test_aliases_and_unions() {
    let env = core();
    assert!(subtype(&env, "String", "string"));
    assert!(subtype(&env, "Integer", "int"));
    assert!(!subtype(&env, "Float", "int"));
    assert!(subtype(&env, "Integer | Float", "Numeric"));
    assert!(subtype(&env, "Integer", "Integer | Float | Rational"));
    assert!(!subtype(&env, "Integer | String", "Numeric"));
    assert!(subtype(&env, "nil", "Integer?"));
    assert!(subtype(&env, "true", "bool"));
    assert!(subtype(&env, "1", "Integer"));
    assert!(subtype(&env, "\"text\"", "String"));
}

#[test]
fn test_generic_variance() {
    let env = core();
    assert!(subtype(&env, "Array[Integer]", "Array[Numeric]"));
    assert!(!subtype(&env, "Array[Numeric]", "Array[Integer]"));
    assert!(subtype(&env, "Array[Integer]", "Enumerable[Numeric]"));
    assert!(subtype(&env, "[Integer, String]", "Array[Integer | String]"));
    assert!(subtype(&env, "{ name: String }", "Hash[Symbol, String]"));
}

#[test]
fn test_singleton_types() {
    let env = core();
    assert!(subtype(&env, "singleton(Integer)", "singleton(Numeric)"));
    assert!(subtype(&env, "singleton(Integer)", "Class"));
    assert!(!subtype(&env, "singleton(Numeric)", "singleton(Integer)"));
}

#[test]
fn test_union_round_trip() {
    let parsed = ty("Integer | Float | Rational");
    insta::assert_snapshot!(parsed.to_string(), @"Integer | Float | Rational");
    assert_eq!(ty(&parsed.to_string()), parsed);
}

// ============================================
// Overload Resolution
// ============================================

#[test]
fn test_first_matching_overload_wins() {
    let env = core();
    let call = CallSite::new(vec![ty("String")]);
    match env.resolve_call(&ty("Converter"), "convert", &call) {
        CallResolution::Selected {
            index, return_type, ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(return_type.to_string(), "::Integer");
        }
        other => panic!("unexpected {other:?}"),
    }

    let untyped = CallSite::new(vec![ty("untyped")]);
    match env.resolve_call(&ty("Converter"), "convert", &untyped) {
        CallResolution::Selected { index, .. } => assert_eq!(index, 0),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_inherited_generic_method_is_instantiated() {
    let env = core();
    let first = env.resolve_call(&ty("Array[Integer]"), "first", &CallSite::default());
    match first {
        CallResolution::Selected { return_type, .. } => {
            insta::assert_snapshot!(return_type.to_string(), @"::Integer?")
        }
        other => panic!("unexpected {other:?}"),
    }

    let block = parse_method_type("(Integer) -> String").unwrap();
    let map = env.resolve_call(
        &ty("Array[Integer]"),
        "map",
        &CallSite::default().with_block(block),
    );
    match map {
        CallResolution::Selected { return_type, .. } => {
            insta::assert_snapshot!(return_type.to_string(), @"::Array[::String]")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_self_and_instance_bind_to_receiver() {
    let env = core();
    let times = env.resolve_call(
        &ty("Integer"),
        "times",
        &CallSite::default().with_block(parse_method_type("(Integer) -> void").unwrap()),
    );
    assert!(matches!(
        times,
        CallResolution::Selected { ref return_type, .. } if return_type.to_string() == "::Integer"
    ));

    let new = env.resolve_call(&ty("singleton(Float)"), "new", &CallSite::default());
    assert!(matches!(
        new,
        CallResolution::Selected { ref return_type, .. } if return_type.to_string() == "::Float"
    ));
}

#[test]
fn test_keywords_and_missing_methods() {
    let env = core();
    let split = CallSite::new(vec![ty("String")]).with_keyword("limit", ty("Integer"));
    assert!(matches!(
        env.resolve_call(&ty("String"), "split", &split),
        CallResolution::Selected { .. }
    ));
    let bad = CallSite::new(vec![]).with_keyword("limits", ty("Integer"));
    assert!(matches!(
        env.resolve_call(&ty("String"), "split", &bad),
        CallResolution::NoMatch { .. }
    ));
    assert_eq!(
        env.resolve_call(&ty("String"), "no_such_method", &CallSite::default()),
        CallResolution::NoMethod
    );
    assert_eq!(
        env.resolve_call(&ty("Missing"), "size", &CallSite::default()),
        CallResolution::UnknownReceiver
    );
}

// ============================================
// Query Layer
// ============================================

#[test]
fn test_query_engine_over_fixture() {
    let env = core();
    let engine = QueryEngine::new(&env);

    let method = engine.query_method("Integer", "clamp", false);
    assert_eq!(method.result.unwrap().owner, "::Comparable");

    let nested = engine.query_decl("Outer::Inner");
    assert_eq!(nested.result.unwrap().name, "::Outer::Inner");

    let call = engine.query_call("Integer", "+", &["Float".to_string()]);
    let info = call.result.unwrap();
    assert_eq!(info.overload, 1);
    assert_eq!(info.return_type, "::Float");
}
