//! Overload selection for a call site
//!
//! Overloads are tried in declaration order and the first one that accepts
//! the call wins, even when a later overload would also match.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{MethodSignature, Param, TypeExpr};

use super::SubtypeChecker;
use super::subst::Substitution;

/// Argument types of a call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSite {
    pub positional: Vec<TypeExpr>,
    pub keywords: BTreeMap<String, TypeExpr>,
    /// Type of the block passed, if any
    pub block: Option<MethodSignature>,
}

impl CallSite {
    pub fn new(positional: Vec<TypeExpr>) -> Self {
        Self {
            positional,
            ..Self::default()
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.keywords.insert(name.into(), ty);
        self
    }

    pub fn with_block(mut self, block: MethodSignature) -> Self {
        self.block = Some(block);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverloadMatch {
    /// First accepting overload and its return type with method generics bound
    Selected { index: usize, return_type: TypeExpr },
    NoMatch,
}

/// Try `overloads` in order against `call`
pub fn select_overload(
    checker: &SubtypeChecker<'_>,
    overloads: &[MethodSignature],
    call: &CallSite,
) -> OverloadMatch {
    for (index, signature) in overloads.iter().enumerate() {
        if let Some(return_type) = match_overload(checker, signature, call) {
            tracing::trace!(index, %signature, "overload selected");
            return OverloadMatch::Selected { index, return_type };
        }
    }
    OverloadMatch::NoMatch
}

/// Bindings for the method-level type variables of one overload
struct Bindings<'s> {
    vars: Vec<&'s str>,
    bound: HashMap<String, TypeExpr>,
}

impl<'s> Bindings<'s> {
    fn new(signature: &'s MethodSignature) -> Self {
        Self {
            vars: signature.type_params.iter().map(|p| p.name.as_str()).collect(),
            bound: HashMap::new(),
        }
    }

    /// Bind `name` to `ty`, widening an existing binding that does not
    /// already cover it
    fn bind(&mut self, checker: &SubtypeChecker<'_>, name: &str, ty: &TypeExpr) {
        let widened = match self.bound.get(name) {
            None => ty.clone(),
            Some(existing) if checker.is_subtype(ty, existing) => return,
            Some(existing) if checker.is_subtype(existing, ty) => ty.clone(),
            Some(existing) => TypeExpr::union(vec![existing.clone(), ty.clone()]),
        };
        self.bound.insert(name.to_string(), widened);
    }

    /// Walk `param` and `arg` in parallel, binding variables found in `param`
    fn collect(&mut self, checker: &SubtypeChecker<'_>, param: &TypeExpr, arg: &TypeExpr) {
        match (param, arg) {
            (TypeExpr::Variable(name), _) if self.vars.contains(&name.as_str()) => {
                self.bind(checker, name, arg);
            }
            (
                TypeExpr::Nominal { name: p, args: pa },
                TypeExpr::Nominal { name: a, args: aa },
            )
            | (
                TypeExpr::Interface { name: p, args: pa },
                TypeExpr::Interface { name: a, args: aa },
            ) if p.name == a.name && pa.len() == aa.len() => {
                for (p, a) in pa.iter().zip(aa) {
                    self.collect(checker, p, a);
                }
            }
            (TypeExpr::Nominal { name: p, args: pa }, TypeExpr::Nominal { name: a, args: aa })
                if !pa.is_empty() =>
            {
                if let Some(found) = checker.ancestor_args(a, aa, p) {
                    for (p, a) in pa.iter().zip(&found) {
                        self.collect(checker, p, a);
                    }
                }
            }
            (TypeExpr::Optional(inner), _) => {
                if !matches!(arg, TypeExpr::Special(crate::ast::SpecialType::Nil)) {
                    self.collect(checker, inner, arg);
                }
            }
            (TypeExpr::Tuple(ps), TypeExpr::Tuple(args)) if ps.len() == args.len() => {
                for (p, a) in ps.iter().zip(args) {
                    self.collect(checker, p, a);
                }
            }
            (TypeExpr::Proc(p), TypeExpr::Proc(a)) => self.collect_signature(checker, p, a),
            _ => {}
        }
    }

    fn collect_signature(&mut self, checker: &SubtypeChecker<'_>, param: &MethodSignature, arg: &MethodSignature) {
        self.collect(checker, &param.return_type, &arg.return_type);
    }

    /// Substitution with every unbound variable mapped to `untyped`
    fn substitution(&self) -> Substitution {
        let mut subst = Substitution::new();
        for var in &self.vars {
            let ty = self.bound.get(*var).cloned().unwrap_or_else(TypeExpr::untyped);
            subst.insert(*var, ty);
        }
        subst
    }

    /// Bind from `arg`, then check it against the instantiated parameter
    fn accept(&mut self, checker: &SubtypeChecker<'_>, param: &Param, arg: &TypeExpr) -> bool {
        self.collect(checker, &param.ty, arg);
        let expected = self.substitution().apply(&param.ty);
        checker.is_subtype(arg, &expected)
    }
}

/// Return type of `signature` when it accepts `call`
fn match_overload(checker: &SubtypeChecker<'_>, signature: &MethodSignature, call: &CallSite) -> Option<TypeExpr> {
    let (min, max) = signature.arity_range();
    let count = call.positional.len();
    if count < min || max.is_some_and(|max| count > max) {
        return None;
    }

    let mut bindings = Bindings::new(signature);

    let leading = signature.leading_params();
    let trailing = signature.trailing_params();
    let split = count - trailing.len().min(count);
    let (front, back) = call.positional.split_at(split);
    for (i, arg) in front.iter().enumerate() {
        let param = match leading.get(i) {
            Some(param) => param,
            None => signature.rest_param()?,
        };
        if !bindings.accept(checker, param, arg) {
            return None;
        }
    }
    for (param, arg) in trailing.iter().zip(back) {
        if !bindings.accept(checker, param, arg) {
            return None;
        }
    }

    for (name, arg) in &call.keywords {
        let param = signature.keyword_param(name)?;
        if !bindings.accept(checker, param, arg) {
            return None;
        }
    }
    if signature
        .required_keywords()
        .any(|param| param.name.as_ref().is_some_and(|name| !call.keywords.contains_key(name)))
    {
        return None;
    }

    match (&signature.block, &call.block) {
        (None, None) => {}
        (None, Some(_)) => return None,
        (Some(block), None) => {
            if block.required {
                return None;
            }
        }
        (Some(block), Some(given)) => {
            bindings.collect_signature(checker, &block.signature, given);
            let expected = bindings.substitution().apply_signature(&block.signature);
            if !checker.method_compatible(given, &expected) {
                return None;
            }
        }
    }

    Some(bindings.substitution().apply(&signature.return_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreNames;
    use crate::graph::DeclarationGraph;
    use crate::loader::load_source;
    use crate::parser::{parse_method_type, parse_type};

    const CORE: &str = "
        class BasicObject end
        class Object < BasicObject end
        class Numeric end
        class Integer < Numeric end
        class Float < Numeric end
        class String end
        class Symbol end
        class NilClass end
        class Array[unchecked out E] end
    ";

    fn graph() -> DeclarationGraph {
        let mut graph = DeclarationGraph::new();
        assert!(load_source(&mut graph, "core.sig", CORE).is_empty());
        graph
    }

    fn ty(source: &str) -> TypeExpr {
        parse_type(source).unwrap()
    }

    fn sigs(sources: &[&str]) -> Vec<MethodSignature> {
        sources.iter().map(|s| parse_method_type(s).unwrap()).collect()
    }

    #[test]
    fn test_first_matching_overload_wins() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let overloads = sigs(&["(Integer) -> String", "(String) -> Integer"]);

        let call = CallSite::new(vec![ty("String")]);
        assert_eq!(
            select_overload(&checker, &overloads, &call),
            OverloadMatch::Selected {
                index: 1,
                return_type: ty("Integer")
            }
        );

        // untyped matches the first overload
        let call = CallSite::new(vec![ty("untyped")]);
        assert!(matches!(
            select_overload(&checker, &overloads, &call),
            OverloadMatch::Selected { index: 0, .. }
        ));

        let call = CallSite::new(vec![ty("Symbol")]);
        assert_eq!(select_overload(&checker, &overloads, &call), OverloadMatch::NoMatch);
    }

    #[test]
    fn test_arity_optional_rest_and_trailing() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let overloads = sigs(&["(Integer, ?String, *Symbol, Float) -> void"]);
        let accepts = |args: &[&str]| {
            let call = CallSite::new(args.iter().map(|a| ty(a)).collect());
            select_overload(&checker, &overloads, &call) != OverloadMatch::NoMatch
        };
        assert!(accepts(&["Integer", "Float"]));
        assert!(accepts(&["Integer", "String", "Float"]));
        assert!(accepts(&["Integer", "String", "Symbol", "Symbol", "Float"]));
        assert!(!accepts(&["Integer"]));
        assert!(!accepts(&["Integer", "Symbol", "Float"]));
        assert!(!accepts(&["Integer", "String", "Symbol", "Integer"]));
    }

    #[test]
    fn test_keywords() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let overloads = sigs(&["(base: Integer, ?exception: bool) -> Integer"]);
        let call = CallSite::new(vec![]).with_keyword("base", ty("Integer"));
        assert!(matches!(select_overload(&checker, &overloads, &call), OverloadMatch::Selected { .. }));
        let call = CallSite::new(vec![]).with_keyword("exception", ty("true"));
        assert_eq!(select_overload(&checker, &overloads, &call), OverloadMatch::NoMatch);
        let call = CallSite::new(vec![])
            .with_keyword("base", ty("Integer"))
            .with_keyword("radix", ty("Integer"));
        assert_eq!(select_overload(&checker, &overloads, &call), OverloadMatch::NoMatch);

        let open = sigs(&["(**Integer) -> void"]);
        let call = CallSite::new(vec![]).with_keyword("anything", ty("Integer"));
        assert!(matches!(select_overload(&checker, &open, &call), OverloadMatch::Selected { .. }));
    }

    #[test]
    fn test_method_generics_bind_and_widen() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let overloads = sigs(&["[T] (T, T) -> Array[T]"]);
        let call = CallSite::new(vec![ty("Integer"), ty("Integer")]);
        assert_eq!(
            select_overload(&checker, &overloads, &call),
            OverloadMatch::Selected {
                index: 0,
                return_type: ty("Array[Integer]")
            }
        );
        let call = CallSite::new(vec![ty("Integer"), ty("String")]);
        assert_eq!(
            select_overload(&checker, &overloads, &call),
            OverloadMatch::Selected {
                index: 0,
                return_type: ty("Array[Integer | String]")
            }
        );

        let unwrap = sigs(&["[U] (Array[U]) -> U"]);
        let call = CallSite::new(vec![ty("Array[Float]")]);
        assert_eq!(
            select_overload(&checker, &unwrap, &call),
            OverloadMatch::Selected {
                index: 0,
                return_type: ty("Float")
            }
        );
    }

    #[test]
    fn test_blocks() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let required = sigs(&["[U] () { (Integer) -> U } -> Array[U]"]);
        let optional = sigs(&["() ?{ (Integer) -> void } -> void"]);
        let plain = sigs(&["() -> void"]);
        let block = parse_method_type("(Numeric) -> String").unwrap();
        let narrow = parse_method_type("(Float) -> String").unwrap();

        let with_block = CallSite::new(vec![]).with_block(block);
        assert_eq!(
            select_overload(&checker, &required, &with_block),
            OverloadMatch::Selected {
                index: 0,
                return_type: ty("Array[String]")
            }
        );
        assert_eq!(select_overload(&checker, &required, &CallSite::default()), OverloadMatch::NoMatch);
        assert!(matches!(
            select_overload(&checker, &optional, &CallSite::default()),
            OverloadMatch::Selected { .. }
        ));
        assert_eq!(select_overload(&checker, &plain, &with_block), OverloadMatch::NoMatch);
        let narrow_call = CallSite::new(vec![]).with_block(narrow);
        assert_eq!(select_overload(&checker, &required, &narrow_call), OverloadMatch::NoMatch);
    }
}
