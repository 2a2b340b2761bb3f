//! Subtyping and call compatibility
//!
//! `is_subtype` applies its rules in a fixed order: equality, `untyped`,
//! alias expansion, `bool`, `bot`/`top`/`void`, `nil`, optionals,
//! union/intersection distribution, literal widening, nominal ancestry,
//! interface conformance, singleton types, tuples and records, procs.
//! Inputs are expected to be absolutized; relative names are resolved from
//! the root namespace.

pub mod overload;
pub mod subst;

use std::collections::HashSet;

use crate::ancestors::{AncestorEngine, MethodLookup, SingletonAncestor};
use crate::ast::{
    Literal, MethodSignature, Param, QualifiedName, SpecialType, TypeExpr, Variance, Visibility,
};
use crate::config::CoreNames;
use crate::graph::{DeclarationGraph, MemberName, MemberScope, NodeId, Overload};
use crate::resolver::Resolver;
use crate::util::with_stack;

pub use overload::{CallSite, OverloadMatch, select_overload};
pub use subst::Substitution;

/// What a method is called on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// An instance of `node[args]`
    Instance { node: NodeId, args: Vec<TypeExpr> },
    /// The class object of `node`
    Singleton(NodeId),
}

/// Outcome of [`SubtypeChecker::resolve_call`]
#[derive(Debug, Clone, PartialEq)]
pub enum CallResolution {
    Selected {
        owner: NodeId,
        /// Position of the chosen overload in the owner's overload set
        index: usize,
        signature: MethodSignature,
        return_type: TypeExpr,
    },
    NoMatch {
        owner: NodeId,
        candidates: Vec<MethodSignature>,
    },
    NoMethod,
    UnknownReceiver,
}

/// Per-query scratch state
#[derive(Debug, Default)]
struct CheckState {
    /// Pairs under examination; assumed to hold when met again
    assumptions: HashSet<(TypeExpr, TypeExpr)>,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SubtypeChecker<'g> {
    graph: &'g DeclarationGraph,
    core: &'g CoreNames,
    resolver: Resolver<'g>,
    engine: AncestorEngine<'g>,
    max_depth: Option<usize>,
}

impl<'g> SubtypeChecker<'g> {
    pub fn new(graph: &'g DeclarationGraph, core: &'g CoreNames) -> Self {
        Self {
            graph,
            core,
            resolver: Resolver::new(graph, core),
            engine: AncestorEngine::new(graph, core),
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn engine(&self) -> &AncestorEngine<'g> {
        &self.engine
    }

    pub fn is_subtype(&self, sub: &TypeExpr, sup: &TypeExpr) -> bool {
        let mut state = CheckState::default();
        self.check(sub, sup, &mut state)
    }

    fn check(&self, sub: &TypeExpr, sup: &TypeExpr, state: &mut CheckState) -> bool {
        if self.max_depth.is_some_and(|limit| state.depth >= limit) {
            tracing::trace!(%sub, %sup, "subtype depth budget exhausted");
            return false;
        }
        state.depth += 1;
        let result = with_stack(|| self.check_rules(sub, sup, state));
        state.depth -= 1;
        result
    }

    fn core_type(&self, name: &str) -> TypeExpr {
        TypeExpr::Nominal {
            name: CoreNames::name(name),
            args: Vec::new(),
        }
    }

    fn bool_type(&self) -> TypeExpr {
        TypeExpr::Union(vec![
            self.core_type(&self.core.true_class),
            self.core_type(&self.core.false_class),
        ])
    }

    fn check_rules(&self, sub: &TypeExpr, sup: &TypeExpr, state: &mut CheckState) -> bool {
        if sub == sup || sub.is_untyped() || sup.is_untyped() {
            return true;
        }

        if matches!(sub, TypeExpr::Alias { .. }) || matches!(sup, TypeExpr::Alias { .. }) {
            return self.assuming(sub, sup, state, |this, state| {
                match (this.expand(sub), this.expand(sup)) {
                    (Some(sub), Some(sup)) => this.check(&sub, &sup, state),
                    _ => false,
                }
            });
        }

        if matches!(sub, TypeExpr::Special(SpecialType::Bool)) {
            return self.check(&self.bool_type(), sup, state);
        }
        if matches!(sup, TypeExpr::Special(SpecialType::Bool)) {
            return self.check(sub, &self.bool_type(), state);
        }

        if matches!(sub, TypeExpr::Special(SpecialType::Bottom))
            || matches!(sup, TypeExpr::Special(SpecialType::Top | SpecialType::Void))
        {
            return true;
        }

        if matches!(sub, TypeExpr::Special(SpecialType::Nil)) {
            return self.check(&self.core_type(&self.core.nil_class), sup, state);
        }
        if matches!(sup, TypeExpr::Special(SpecialType::Nil)) {
            return self.check(sub, &self.core_type(&self.core.nil_class), state);
        }

        if let TypeExpr::Optional(_) = sub {
            return self.check(&sub.desugar_optional(), sup, state);
        }
        if let TypeExpr::Optional(_) = sup {
            return self.check(sub, &sup.desugar_optional(), state);
        }

        if let TypeExpr::Union(members) = sub {
            return members.iter().all(|m| self.check(m, sup, state));
        }
        if let TypeExpr::Intersection(members) = sup {
            return members.iter().all(|m| self.check(sub, m, state));
        }
        if let TypeExpr::Union(members) = sup {
            return members.iter().any(|m| self.check(sub, m, state));
        }
        if let TypeExpr::Intersection(members) = sub {
            return members.iter().any(|m| self.check(m, sup, state));
        }

        if let TypeExpr::Literal(literal) = sub {
            return self.check(&self.literal_class(literal), sup, state);
        }

        match (sub, sup) {
            (
                TypeExpr::Nominal { name: sub_name, args: sub_args },
                TypeExpr::Nominal { name: sup_name, args: sup_args },
            ) => self.check_nominal(sub_name, sub_args, sup_name, sup_args, state),
            (_, TypeExpr::Interface { name, args }) => {
                self.assuming(sub, sup, state, |this, state| {
                    this.check_interface(sub, name, args, state)
                })
            }
            (TypeExpr::Singleton(sub_name), _) => self.check_singleton(sub_name, sup, state),
            (TypeExpr::Tuple(a), TypeExpr::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.check(x, y, state))
            }
            (TypeExpr::Record(a), TypeExpr::Record(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| self.check(x, y, state)))
            }
            (TypeExpr::Tuple(_) | TypeExpr::Record(_), TypeExpr::Nominal { .. }) => {
                self.check(&self.widen(sub), sup, state)
            }
            (TypeExpr::Proc(a), TypeExpr::Proc(b)) => self.signature_compatible(a, b, state),
            (TypeExpr::Proc(_), TypeExpr::Nominal { .. }) => {
                self.check(&self.core_type(&self.core.proc_class), sup, state)
            }
            _ => false,
        }
    }

    /// Run `f` with `(sub, sup)` assumed, or succeed at once if it already is
    fn assuming(
        &self,
        sub: &TypeExpr,
        sup: &TypeExpr,
        state: &mut CheckState,
        f: impl FnOnce(&Self, &mut CheckState) -> bool,
    ) -> bool {
        let key = (sub.clone(), sup.clone());
        if state.assumptions.contains(&key) {
            return true;
        }
        state.assumptions.insert(key.clone());
        let result = f(self, state);
        state.assumptions.remove(&key);
        result
    }

    fn expand(&self, ty: &TypeExpr) -> Option<TypeExpr> {
        match ty {
            TypeExpr::Alias { .. } => self.resolver.expand_alias(ty, &[]),
            other => Some(other.clone()),
        }
    }

    fn literal_class(&self, literal: &Literal) -> TypeExpr {
        let name = match literal {
            Literal::Int(_) => &self.core.integer,
            Literal::String(_) => &self.core.string,
            Literal::Symbol(_) => &self.core.symbol,
            Literal::Bool(true) => &self.core.true_class,
            Literal::Bool(false) => &self.core.false_class,
        };
        self.core_type(name)
    }

    /// Tuples as `Array[...]`, records as `Hash[Symbol, ...]`
    fn widen(&self, ty: &TypeExpr) -> TypeExpr {
        match ty {
            TypeExpr::Tuple(elements) => {
                let element = if elements.is_empty() {
                    TypeExpr::untyped()
                } else {
                    TypeExpr::union(elements.clone())
                };
                TypeExpr::Nominal {
                    name: CoreNames::name(&self.core.array),
                    args: vec![element],
                }
            }
            TypeExpr::Record(fields) => {
                let (key, value) = if fields.is_empty() {
                    (TypeExpr::untyped(), TypeExpr::untyped())
                } else {
                    (
                        self.core_type(&self.core.symbol),
                        TypeExpr::union(fields.values().cloned().collect()),
                    )
                };
                TypeExpr::Nominal {
                    name: CoreNames::name(&self.core.hash),
                    args: vec![key, value],
                }
            }
            other => other.clone(),
        }
    }

    fn resolve(&self, name: &QualifiedName) -> Option<NodeId> {
        self.resolver.resolve(name, &[], false).found()
    }

    /// `args` padded or truncated to the declared arity of `node`
    fn fit_args(&self, node: NodeId, args: &[TypeExpr]) -> Vec<TypeExpr> {
        let arity = self.graph.node(node).type_params.len();
        (0..arity)
            .map(|i| args.get(i).cloned().unwrap_or_else(TypeExpr::untyped))
            .collect()
    }

    fn check_nominal(
        &self,
        sub_name: &QualifiedName,
        sub_args: &[TypeExpr],
        sup_name: &QualifiedName,
        sup_args: &[TypeExpr],
        state: &mut CheckState,
    ) -> bool {
        let (Some(sub_id), Some(sup_id)) = (self.resolve(sub_name), self.resolve(sup_name)) else {
            return false;
        };
        let chain = self.engine.instantiate(sub_id, self.fit_args(sub_id, sub_args));
        let Some(found) = chain.iter().find(|a| a.node == sup_id) else {
            return false;
        };
        if sup_args.is_empty() {
            return true;
        }
        let expected = self.fit_args(sup_id, sup_args);
        self.graph
            .node(sup_id)
            .type_params
            .iter()
            .enumerate()
            .all(|(i, param)| {
                let actual = found.args.get(i).cloned().unwrap_or_else(TypeExpr::untyped);
                let expected = &expected[i];
                match param.variance {
                    Variance::Covariant => self.check(&actual, expected, state),
                    Variance::Contravariant => self.check(expected, &actual, state),
                    Variance::Invariant => self.equivalent(&actual, expected, state),
                }
            })
    }

    /// Arguments `sup_name` takes in the ancestor chain of `sub_name[sub_args]`
    pub(crate) fn ancestor_args(
        &self,
        sub_name: &QualifiedName,
        sub_args: &[TypeExpr],
        sup_name: &QualifiedName,
    ) -> Option<Vec<TypeExpr>> {
        let sub_id = self.resolve(sub_name)?;
        let sup_id = self.resolve(sup_name)?;
        self.engine
            .instantiate(sub_id, self.fit_args(sub_id, sub_args))
            .into_iter()
            .find(|ancestor| ancestor.node == sup_id)
            .map(|ancestor| ancestor.args)
    }

    fn equivalent(&self, a: &TypeExpr, b: &TypeExpr, state: &mut CheckState) -> bool {
        a == b
            || a.is_untyped()
            || b.is_untyped()
            || (self.check(a, b, state) && self.check(b, a, state))
    }

    fn check_singleton(&self, sub_name: &QualifiedName, sup: &TypeExpr, state: &mut CheckState) -> bool {
        let Some(sub_id) = self.resolve(sub_name) else {
            return false;
        };
        let chain = self.engine.singleton_ancestors(sub_id);
        match sup {
            TypeExpr::Singleton(sup_name) => self.resolve(sup_name).is_some_and(|sup_id| {
                chain
                    .iter()
                    .any(|entry| matches!(entry, SingletonAncestor::Singleton(id) if *id == sup_id))
            }),
            TypeExpr::Nominal { name, args } => {
                let Some(sup_id) = self.resolve(name) else {
                    return false;
                };
                chain.iter().any(|entry| match entry {
                    SingletonAncestor::Instance(ancestor) if ancestor.node == sup_id => {
                        args.is_empty()
                            || ancestor
                                .args
                                .iter()
                                .zip(self.fit_args(sup_id, args))
                                .all(|(actual, expected)| self.equivalent(actual, &expected, state))
                    }
                    _ => false,
                })
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Receivers and method instantiation
    // ------------------------------------------------------------------

    /// The declaration a value of `ty` dispatches through
    pub fn receiver_of(&self, ty: &TypeExpr) -> Option<Receiver> {
        match ty {
            TypeExpr::Nominal { name, args } | TypeExpr::Interface { name, args } => {
                let node = self.resolve(name)?;
                Some(Receiver::Instance {
                    node,
                    args: self.fit_args(node, args),
                })
            }
            TypeExpr::Singleton(name) => self.resolve(name).map(Receiver::Singleton),
            TypeExpr::Literal(literal) => self.receiver_of(&self.literal_class(literal)),
            TypeExpr::Special(SpecialType::Nil) => {
                self.receiver_of(&self.core_type(&self.core.nil_class))
            }
            TypeExpr::Optional(inner) => self.receiver_of(inner),
            TypeExpr::Tuple(_) | TypeExpr::Record(_) => self.receiver_of(&self.widen(ty)),
            TypeExpr::Proc(_) => self.receiver_of(&self.core_type(&self.core.proc_class)),
            TypeExpr::Alias { .. } => self.receiver_of(&self.resolver.expand_alias(ty, &[])?),
            _ => None,
        }
    }

    pub fn lookup_on(&self, receiver: &Receiver, method: &str) -> Option<MethodLookup<'g>> {
        match receiver {
            Receiver::Instance { node, .. } => {
                self.engine.lookup_method(*node, &MemberName::instance(method))
            }
            Receiver::Singleton(node) => {
                self.engine.lookup_method(*node, &MemberName::singleton(method))
            }
        }
    }

    /// Overload signatures of `lookup` as seen from `receiver`: names
    /// absolutized, owner parameters bound, `self`/`instance`/`class`
    /// replaced
    pub fn instantiate(
        &self,
        receiver: &Receiver,
        self_type: &TypeExpr,
        lookup: &MethodLookup<'_>,
        overload: &Overload,
    ) -> MethodSignature {
        let (node, receiver_args) = match receiver {
            Receiver::Instance { node, args } => (*node, args.clone()),
            Receiver::Singleton(node) => (*node, Vec::new()),
        };
        let decl = self.graph.node(node);
        let to_receiver = Substitution::from_params(&decl.type_params, &receiver_args);
        let owner_args: Vec<TypeExpr> = lookup.owner_args.iter().map(|a| to_receiver.apply(a)).collect();

        let instance = TypeExpr::Nominal {
            name: decl.name.clone(),
            args: match receiver {
                Receiver::Instance { args, .. } => args.clone(),
                Receiver::Singleton(_) => vec![TypeExpr::untyped(); decl.type_params.len()],
            },
        };
        let subst = Substitution::from_params(&self.graph.node(lookup.owner).type_params, &owner_args)
            .with_self(self_type.clone())
            .with_instance(instance)
            .with_class(TypeExpr::Singleton(decl.name.clone()));
        let signature = self
            .resolver
            .absolutize_signature(&overload.signature, &overload.nesting);
        subst.apply_signature(&signature)
    }

    /// Every overload of `method` on `receiver`, instantiated
    pub fn method_signatures(&self, receiver: &TypeExpr, method: &str) -> Option<(NodeId, Vec<MethodSignature>)> {
        let target = self.receiver_of(receiver)?;
        let lookup = self.lookup_on(&target, method)?;
        let signatures = lookup
            .overloads
            .iter()
            .map(|overload| self.instantiate(&target, receiver, &lookup, overload))
            .collect();
        Some((lookup.owner, signatures))
    }

    // ------------------------------------------------------------------
    // Interfaces and method compatibility
    // ------------------------------------------------------------------

    /// Every public method of the interface must be matched, overload by
    /// overload, by some overload on the receiver of `sub`
    fn check_interface(
        &self,
        sub: &TypeExpr,
        iface_name: &QualifiedName,
        iface_args: &[TypeExpr],
        state: &mut CheckState,
    ) -> bool {
        let Some(iface) = self.resolve(iface_name) else {
            return false;
        };
        if !self.graph.node(iface).is_interface() {
            return false;
        }
        let Some(receiver) = self.receiver_of(sub) else {
            return false;
        };
        let iface_receiver = Receiver::Instance {
            node: iface,
            args: self.fit_args(iface, iface_args),
        };

        for (name, required) in self.engine.method_table(iface, MemberScope::Instance) {
            if required.visibility != Visibility::Public {
                continue;
            }
            let Some(provided) = self.lookup_on(&receiver, &name) else {
                tracing::trace!(%sub, method = %name, "interface method missing");
                return false;
            };
            if provided.visibility != Visibility::Public {
                return false;
            }
            for overload in required.overloads {
                let expected = self.instantiate(&iface_receiver, sub, &required, overload);
                let matched = provided.overloads.iter().any(|candidate| {
                    let actual = self.instantiate(&receiver, sub, &provided, candidate);
                    self.signature_compatible(&actual, &expected, state)
                });
                if !matched {
                    return false;
                }
            }
        }
        true
    }

    /// Whether a method of type `actual` can stand in where `expected` is
    /// required: overlapping arity, parameters contravariant, return
    /// covariant, block contravariant. Method-level generics are `untyped`.
    pub fn method_compatible(&self, actual: &MethodSignature, expected: &MethodSignature) -> bool {
        let mut state = CheckState::default();
        self.signature_compatible(actual, expected, &mut state)
    }

    fn signature_compatible(
        &self,
        actual: &MethodSignature,
        expected: &MethodSignature,
        state: &mut CheckState,
    ) -> bool {
        let actual = erase_type_params(actual);
        let expected = erase_type_params(expected);

        let (actual_min, actual_max) = actual.arity_range();
        let (expected_min, expected_max) = expected.arity_range();
        if actual_max.is_some_and(|max| max < expected_min)
            || expected_max.is_some_and(|max| max < actual_min)
        {
            return false;
        }

        if !self.positionals_compatible(&actual, &expected, state) {
            return false;
        }

        for param in &expected.keyword {
            let Some(name) = param.name.as_deref() else {
                continue;
            };
            match actual.keyword_param(name) {
                Some(accepted) => {
                    if !self.check(&param.ty, &accepted.ty, state) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        for required in actual.required_keywords() {
            let name = required.name.as_deref().unwrap_or_default();
            if !expected.accepts_keyword(name) {
                return false;
            }
        }

        if !self.check(&actual.return_type, &expected.return_type, state) {
            return false;
        }

        match (&actual.block, &expected.block) {
            (None, None) => true,
            (Some(given), Some(wanted)) => {
                (!given.required || wanted.required)
                    && self.signature_compatible(&wanted.signature, &given.signature, state)
            }
            (Some(given), None) => !given.required,
            (None, Some(wanted)) => !wanted.required,
        }
    }

    /// Leading parameters line up by index, rest against rest, trailing
    /// parameters from the end. A slot missing on one side falls back to
    /// that side's rest type.
    fn positionals_compatible(
        &self,
        actual: &MethodSignature,
        expected: &MethodSignature,
        state: &mut CheckState,
    ) -> bool {
        let actual_rest = actual.rest_param().map(|param| &param.ty);
        let expected_rest = expected.rest_param().map(|param| &param.ty);

        let leading = actual.leading_params().len().max(expected.leading_params().len());
        for i in 0..leading {
            let given = expected.leading_params().get(i).map(|param| &param.ty).or(expected_rest);
            let accepted = actual.leading_params().get(i).map(|param| &param.ty).or(actual_rest);
            if let (Some(given), Some(accepted)) = (given, accepted) {
                if !self.check(given, accepted, state) {
                    return false;
                }
            }
        }

        if let (Some(given), Some(accepted)) = (expected_rest, actual_rest) {
            if !self.check(given, accepted, state) {
                return false;
            }
        }

        let trailing = actual.trailing_params().len().max(expected.trailing_params().len());
        for i in 0..trailing {
            let given = nth_from_end(expected.trailing_params(), i).or(expected_rest);
            let accepted = nth_from_end(actual.trailing_params(), i).or(actual_rest);
            if let (Some(given), Some(accepted)) = (given, accepted) {
                if !self.check(given, accepted, state) {
                    return false;
                }
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Look up `method` on `receiver`, instantiate its overloads and pick
    /// the first one accepting `call`
    pub fn resolve_call(&self, receiver: &TypeExpr, method: &str, call: &CallSite) -> CallResolution {
        let Some(target) = self.receiver_of(receiver) else {
            return CallResolution::UnknownReceiver;
        };
        let Some(lookup) = self.lookup_on(&target, method) else {
            return CallResolution::NoMethod;
        };
        let signatures: Vec<MethodSignature> = lookup
            .overloads
            .iter()
            .map(|overload| self.instantiate(&target, receiver, &lookup, overload))
            .collect();
        match select_overload(self, &signatures, call) {
            OverloadMatch::Selected { index, return_type } => CallResolution::Selected {
                owner: lookup.owner,
                index,
                signature: signatures[index].clone(),
                return_type,
            },
            OverloadMatch::NoMatch => CallResolution::NoMatch {
                owner: lookup.owner,
                candidates: signatures,
            },
        }
    }
}

fn nth_from_end(params: &[Param], index: usize) -> Option<&TypeExpr> {
    params
        .len()
        .checked_sub(index + 1)
        .map(|position| &params[position].ty)
}

/// Method-level type variables replaced with `untyped`
fn erase_type_params(sig: &MethodSignature) -> MethodSignature {
    if sig.type_params.is_empty() {
        return sig.clone();
    }
    let mut subst = Substitution::new();
    for param in &sig.type_params {
        subst.insert(param.name.clone(), TypeExpr::untyped());
    }
    let mut erased = sig.map_types(&mut |t| Some(subst.apply(t)));
    erased.type_params.clear();
    erased
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_source;
    use crate::parser::{parse_method_type, parse_type};

    const CORE: &str = r#"
        class BasicObject end
        class Object < BasicObject
          def to_s: () -> String
        end
        class Module end
        class Class < Module
          def new: () -> instance
        end
        class NilClass end
        class TrueClass end
        class FalseClass end
        class Numeric
          def +: (Numeric) -> Numeric
        end
        class Integer < Numeric
          def to_s: () -> String
          def +: (Integer) -> Integer
               | (Float) -> Float
        end
        class Float < Numeric end
        class String
          def to_str: () -> String
          def size: () -> Integer
        end
        class Symbol end
        class Proc end
        module Enumerable[unchecked out E] end
        class Array[unchecked out E]
          include Enumerable[E]
          def first: () -> E?
          def each: () { (E) -> void } -> self
        end
        class Hash[unchecked out K, unchecked out V] end
        class Collector
          def first_of: [T] (Enumerable[T]) -> T
        end
        class Box[T] end
        class Sink[in T] end
        interface _ToS
          def to_s: () -> String
        end
        interface _ToStr
          def to_str: () -> String
        end
        interface _Each[T]
          def each: () { (T) -> void } -> untyped
        end
        interface _Joiner
          def join: (*String, Integer) -> String
        end
        class WideJoiner
          def join: (*String, Numeric) -> String
        end
        class StringJoiner
          def join: (*String, String) -> String
        end
        interface _Opener
          def open: (String, mode: Integer) -> void
        end
        class StrictOpener
          def open: (String, mode: Integer, perm: Integer) -> void
        end
        class LooseOpener
          def open: (String, ?mode: Integer, **untyped) -> void
        end
        type number = Integer | Float
        type list = nil | [Integer, list]
    "#;

    fn graph() -> DeclarationGraph {
        let mut graph = DeclarationGraph::new();
        let diagnostics = load_source(&mut graph, "core.sig", CORE);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        graph
    }

    fn ty(source: &str) -> TypeExpr {
        parse_type(source).unwrap()
    }

    fn sub(checker: &SubtypeChecker<'_>, a: &str, b: &str) -> bool {
        checker.is_subtype(&ty(a), &ty(b))
    }

    // ========================================================================
    // Basic rules
    // ========================================================================

    #[test]
    fn test_reflexive_and_untyped() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        for t in ["Integer", "Array[String]", "_ToS", "Integer | nil", "[Integer, String]", "^(Integer) -> void"] {
            assert!(sub(&checker, t, t), "{t} <: {t}");
            assert!(sub(&checker, t, "untyped"));
            assert!(sub(&checker, "untyped", t));
        }
    }

    #[test]
    fn test_nominal_chain_is_transitive() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "Integer", "Numeric"));
        assert!(sub(&checker, "Numeric", "Object"));
        assert!(sub(&checker, "Integer", "Object"));
        assert!(sub(&checker, "Integer", "::BasicObject"));
        assert!(!sub(&checker, "Numeric", "Integer"));
        assert!(!sub(&checker, "Integer", "String"));
    }

    #[test]
    fn test_special_types() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "bot", "Integer"));
        assert!(sub(&checker, "Integer", "top"));
        assert!(sub(&checker, "Integer", "void"));
        assert!(!sub(&checker, "top", "Integer"));
        assert!(sub(&checker, "nil", "NilClass"));
        assert!(sub(&checker, "NilClass", "nil"));
        assert!(sub(&checker, "true", "bool"));
        assert!(sub(&checker, "bool", "TrueClass | FalseClass"));
        assert!(!sub(&checker, "bool", "TrueClass"));
    }

    #[test]
    fn test_unions_optionals_intersections() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "Integer", "Integer | String"));
        assert!(sub(&checker, "Integer | Float", "Numeric"));
        assert!(!sub(&checker, "Integer | String", "Numeric"));
        assert!(sub(&checker, "nil", "Integer?"));
        assert!(sub(&checker, "Integer?", "Integer | nil"));
        assert!(!sub(&checker, "Integer?", "Integer"));
        assert!(sub(&checker, "Integer & _ToS", "Numeric"));
        assert!(sub(&checker, "Integer", "Numeric & _ToS"));
        assert!(!sub(&checker, "Float", "Numeric & _ToStr"));
    }

    #[test]
    fn test_literals_widen() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "1", "Integer"));
        assert!(sub(&checker, "1", "Numeric"));
        assert!(sub(&checker, "\"a\"", "String"));
        assert!(sub(&checker, ":a", "Symbol"));
        assert!(sub(&checker, "false", "bool"));
        assert!(!sub(&checker, "1", "2"));
        assert!(!sub(&checker, "Integer", "1"));
    }

    // ========================================================================
    // Generics
    // ========================================================================

    #[test]
    fn test_variance() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "Array[Integer]", "Array[Numeric]"));
        assert!(!sub(&checker, "Array[Numeric]", "Array[Integer]"));
        assert!(sub(&checker, "Array[Integer]", "Enumerable[Numeric]"));
        assert!(sub(&checker, "Array[Integer]", "Array"));
        assert!(sub(&checker, "Box[Integer]", "Box[Integer]"));
        assert!(!sub(&checker, "Box[Integer]", "Box[Numeric]"));
        assert!(sub(&checker, "Box[untyped]", "Box[Numeric]"));
        assert!(sub(&checker, "Sink[Numeric]", "Sink[Integer]"));
        assert!(!sub(&checker, "Sink[Integer]", "Sink[Numeric]"));
    }

    #[test]
    fn test_aliases_expand_coinductively() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "Integer", "number"));
        assert!(sub(&checker, "number", "Numeric"));
        assert!(!sub(&checker, "String", "number"));
        assert!(sub(&checker, "list", "list"));
        assert!(sub(&checker, "[Integer, nil]", "list"));
        assert!(!sub(&checker, "missing", "Integer"));
    }

    // ========================================================================
    // Interfaces
    // ========================================================================

    #[test]
    fn test_interface_structural_check() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "Integer", "_ToS"));
        assert!(sub(&checker, "String", "_ToStr"));
        assert!(!sub(&checker, "Integer", "_ToStr"));
        assert!(sub(&checker, "_ToStr", "_ToStr"));
        assert!(sub(&checker, "Array[Integer]", "_Each[Integer]"));
        assert!(sub(&checker, "Array[Integer]", "_Each[Numeric]"));
        assert!(!sub(&checker, "Array[Integer]", "_Each[String]"));
        assert!(sub(&checker, "1", "_ToS"));
    }

    #[test]
    fn test_singleton_types() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "singleton(Integer)", "singleton(Numeric)"));
        assert!(!sub(&checker, "singleton(Numeric)", "singleton(Integer)"));
        assert!(sub(&checker, "singleton(Integer)", "Class"));
        assert!(sub(&checker, "singleton(Enumerable)", "Module"));
        assert!(!sub(&checker, "singleton(Enumerable)", "Class"));
        assert!(!sub(&checker, "Integer", "singleton(Integer)"));
    }

    #[test]
    fn test_tuples_records_procs() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "[Integer, Integer]", "[Numeric, Integer]"));
        assert!(!sub(&checker, "[Integer]", "[Integer, Integer]"));
        assert!(sub(&checker, "[Integer, Float]", "Array[Numeric]"));
        assert!(sub(&checker, "[]", "Array[String]"));
        assert!(sub(&checker, "{ a: Integer }", "{ a: Numeric }"));
        assert!(!sub(&checker, "{ a: Integer }", "{ a: Integer, b: Integer }"));
        assert!(sub(&checker, "{ a: Integer }", "Hash[Symbol, Integer]"));
        assert!(sub(&checker, "^(Numeric) -> Integer", "^(Integer) -> Numeric"));
        assert!(!sub(&checker, "^(Integer) -> Integer", "^(Numeric) -> Integer"));
        assert!(!sub(&checker, "^(Integer) -> Integer", "^(Integer, Integer) -> Integer"));
        assert!(sub(&checker, "^() -> void", "Proc"));
    }

    #[test]
    fn test_procs_with_rest_and_trailing_params() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(!sub(&checker, "^(*Integer, String) -> void", "^(*Integer, Integer) -> void"));
        assert!(sub(&checker, "^(*Numeric, Numeric) -> void", "^(*Integer, Integer) -> void"));
        assert!(sub(&checker, "^(*Numeric) -> void", "^(*Integer) -> void"));
        assert!(!sub(&checker, "^(*Integer) -> void", "^(*Numeric) -> void"));
        assert!(sub(&checker, "^(*Numeric) -> void", "^(Integer, *Integer, Integer) -> void"));
        assert!(!sub(&checker, "^(*String) -> void", "^(*Integer, Integer) -> void"));
        assert!(!sub(&checker, "^(Integer, *Integer, String) -> void", "^(*Integer) -> void"));
    }

    #[test]
    fn test_procs_with_keywords() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(!sub(&checker, "^(key: Integer) -> void", "^() -> void"));
        assert!(sub(&checker, "^(?key: Numeric) -> void", "^(key: Integer) -> void"));
        assert!(!sub(&checker, "^(?key: Integer) -> void", "^(key: Numeric) -> void"));
        assert!(!sub(&checker, "^() -> void", "^(key: Integer) -> void"));
        assert!(sub(&checker, "^(**Numeric) -> void", "^(key: Integer) -> void"));
    }

    #[test]
    fn test_interface_conformance_checks_every_param() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        assert!(sub(&checker, "WideJoiner", "_Joiner"));
        assert!(!sub(&checker, "StringJoiner", "_Joiner"));
        assert!(sub(&checker, "LooseOpener", "_Opener"));
        assert!(!sub(&checker, "StrictOpener", "_Opener"));
    }

    #[test]
    fn test_depth_budget() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core).with_max_depth(Some(1));
        assert!(sub(&checker, "Integer", "Integer"));
        assert!(!sub(&checker, "Integer | Float", "Numeric"));
    }

    // ========================================================================
    // Calls
    // ========================================================================

    #[test]
    fn test_method_compatible() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let actual = parse_method_type("(Numeric, ?Integer) -> Integer").unwrap();
        let expected = parse_method_type("(Integer) -> Numeric").unwrap();
        assert!(checker.method_compatible(&actual, &expected));
        assert!(!checker.method_compatible(&expected, &actual));
        let keywords = parse_method_type("(base: Integer) -> void").unwrap();
        assert!(!checker.method_compatible(&keywords, &parse_method_type("() -> void").unwrap()));
    }

    #[test]
    fn test_resolve_call_infers_through_ancestors() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        let call = CallSite::new(vec![ty("Array[Integer]")]);
        match checker.resolve_call(&ty("Collector"), "first_of", &call) {
            CallResolution::Selected { return_type, .. } => {
                assert_eq!(return_type.to_string().trim_start_matches("::"), "Integer");
            }
            other => panic!("Expected a selected overload, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_call_picks_first_matching_overload() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        match checker.resolve_call(&ty("Integer"), "+", &CallSite::new(vec![ty("Float")])) {
            CallResolution::Selected { index, return_type, .. } => {
                assert_eq!(index, 1);
                assert_eq!(return_type.to_string(), "::Float");
            }
            other => panic!("Expected a selected overload, got {other:?}"),
        }
        assert!(matches!(
            checker.resolve_call(&ty("Integer"), "+", &CallSite::new(vec![ty("String")])),
            CallResolution::NoMatch { .. }
        ));
        assert_eq!(
            checker.resolve_call(&ty("Integer"), "nope", &CallSite::default()),
            CallResolution::NoMethod
        );
        assert_eq!(
            checker.resolve_call(&ty("Missing"), "to_s", &CallSite::default()),
            CallResolution::UnknownReceiver
        );
    }

    #[test]
    fn test_resolve_call_substitutes_receiver() {
        let graph = graph();
        let core = CoreNames::default();
        let checker = SubtypeChecker::new(&graph, &core);
        match checker.resolve_call(&ty("Array[String]"), "first", &CallSite::default()) {
            CallResolution::Selected { return_type, .. } => {
                // Receiver arguments are substituted as written
                assert_eq!(return_type.to_string(), "String?");
            }
            other => panic!("Expected a selected overload, got {other:?}"),
        }
        match checker.resolve_call(&ty("singleton(String)"), "new", &CallSite::default()) {
            CallResolution::Selected { return_type, .. } => {
                assert_eq!(return_type.to_string(), "::String");
            }
            other => panic!("Expected a selected overload, got {other:?}"),
        }
    }
}
