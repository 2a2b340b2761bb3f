//! Corpus validation
//!
//! Runs after every file is loaded, when forward references can be
//! resolved. Each problem becomes a [`Diagnostic`]; nothing is fatal.

use std::collections::BTreeSet;

use crate::ancestors::AncestorEngine;
use crate::ast::{
    Location, MethodSignature, QualifiedName, TypeExpr, TypeParam, Variance,
};
use crate::config::CoreNames;
use crate::error::{Diagnostic, SigError};
use crate::graph::{DeclarationGraph, DeclarationNode, MemberName, MemberScope, NodeId, TypeRef};
use crate::resolver::{Resolution, Resolver};
use crate::util::{format_suggestion_hint, with_stack};

/// Validate the whole graph
pub fn validate(graph: &DeclarationGraph, core: &CoreNames) -> Vec<Diagnostic> {
    let mut validator = Validator::new(graph, core);
    validator.run();
    tracing::debug!(
        nodes = graph.len(),
        diagnostics = validator.diagnostics.len(),
        "validation finished"
    );
    validator.diagnostics
}

/// Position of a type occurrence relative to a generic parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
    Invariant,
}

impl Polarity {
    fn flip(self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
            Polarity::Invariant => Polarity::Invariant,
        }
    }

    /// Position of an argument for a parameter declared with `variance`
    fn compose(self, variance: Variance) -> Self {
        match variance {
            Variance::Covariant => self,
            Variance::Contravariant => self.flip(),
            Variance::Invariant => Polarity::Invariant,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Polarity::Positive => "covariant",
            Polarity::Negative => "contravariant",
            Polarity::Invariant => "invariant",
        }
    }
}

struct Validator<'g> {
    graph: &'g DeclarationGraph,
    resolver: Resolver<'g>,
    engine: AncestorEngine<'g>,
    diagnostics: Vec<Diagnostic>,
}

impl<'g> Validator<'g> {
    fn new(graph: &'g DeclarationGraph, core: &'g CoreNames) -> Self {
        let engine = AncestorEngine::new(graph, core);
        Self {
            graph,
            resolver: *engine.resolver(),
            engine,
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, error: SigError, location: Option<&Location>) {
        tracing::trace!(%error, "validation diagnostic");
        self.diagnostics.push(Diagnostic::new(error, location.cloned()));
    }

    fn run(&mut self) {
        let graph = self.graph;
        let mut cycles: BTreeSet<Vec<NodeId>> = BTreeSet::new();

        for decl in graph.nodes() {
            if decl.implicit {
                continue;
            }
            let nesting = self.resolver.nesting_of(decl.id);
            self.check_type_params(&decl.type_params, &nesting, decl.location());
            self.check_superclass(decl);
            self.check_mixins(decl);
            for self_type in &decl.self_types {
                self.check_type_ref(self_type);
            }
            self.check_members(decl);
            self.check_variance(decl);
            self.check_aliases(decl);

            if let Some(path) = self.engine.find_cycle(decl.id) {
                let mut members: Vec<NodeId> = path
                    .iter()
                    .filter_map(|name| graph.lookup(name))
                    .collect();
                members.sort();
                members.dedup();
                if cycles.insert(members) {
                    let rendered: Vec<String> = path.iter().map(QualifiedName::to_string).collect();
                    self.report(
                        SigError::Cycle {
                            path: rendered.join(" -> "),
                        },
                        decl.location(),
                    );
                }
            }
        }

        for constant in graph.root().constants.values() {
            self.check_type_ref(&constant.ty);
        }
        for alias in graph.root().type_aliases.values() {
            self.check_type_params(&alias.type_params, &alias.ty.nesting, alias.ty.location.as_ref());
            self.check_type_ref(&alias.ty);
        }
        for global in graph.globals().values() {
            self.check_type_ref(global);
        }
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    fn check_superclass(&mut self, decl: &DeclarationNode) {
        let Some(superclass) = &decl.superclass else {
            return;
        };
        let location = superclass.location.as_ref().or(decl.location());
        match self.resolver.resolve_type(&superclass.ty, &superclass.nesting) {
            Resolution::Found(target) => {
                let target = self.graph.node(target);
                if !target.is_class() {
                    self.report(
                        SigError::invalid_superclass(
                            &decl.name,
                            format!("`{}` is a {}, not a class", target.name, target.kind),
                        ),
                        location,
                    );
                    return;
                }
                self.check_type_ref(superclass);
            }
            Resolution::NotFound => self.report_unresolved("superclass", &superclass.ty, location),
            Resolution::Ambiguous(candidates) => {
                self.report_ambiguous(&superclass.ty, &candidates, location)
            }
        }
    }

    fn check_mixins(&mut self, decl: &DeclarationNode) {
        for mixin in &decl.mixins {
            let location = mixin.target.location.as_ref().or(decl.location());
            match self.resolver.resolve_type(&mixin.target.ty, &mixin.target.nesting) {
                Resolution::Found(target) => {
                    let target = self.graph.node(target);
                    if target.is_class() {
                        self.report(
                            SigError::invalid_mixin(
                                &decl.name,
                                format!("cannot {} class `{}`", mixin.relation, target.name),
                            ),
                            location,
                        );
                        continue;
                    }
                    self.check_type_ref(&mixin.target);
                }
                Resolution::NotFound => {
                    self.report_unresolved("mixin", &mixin.target.ty, location)
                }
                Resolution::Ambiguous(candidates) => {
                    self.report_ambiguous(&mixin.target.ty, &candidates, location)
                }
            }
        }
    }

    fn check_aliases(&mut self, decl: &DeclarationNode) {
        for alias in &decl.method_aliases {
            let target = MemberName::new(alias.scope, alias.old_name.clone());
            if self.engine.lookup_method(decl.id, &target).is_none() {
                self.report(
                    SigError::DanglingAlias {
                        owner: decl.name.to_string(),
                        name: alias.new_name.clone(),
                        target: alias.old_name.clone(),
                    },
                    alias.location.as_ref().or(decl.location()),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Type references
    // ------------------------------------------------------------------

    fn check_members(&mut self, decl: &DeclarationNode) {
        for entry in decl.members.values() {
            for overload in &entry.overloads {
                let location = overload.location.as_ref().or(decl.location());
                self.check_signature(&overload.signature, &overload.nesting, location);
            }
        }
        for attribute in &decl.attributes {
            self.check_type_ref(&attribute.ty);
        }
        for ivar in decl.instance_variables.values() {
            self.check_type_ref(&ivar.ty);
        }
        for constant in decl.namespace.constants.values() {
            self.check_type_ref(&constant.ty);
        }
        for alias in decl.namespace.type_aliases.values() {
            let location = alias.ty.location.as_ref().or(decl.location());
            self.check_type_params(&alias.type_params, &alias.ty.nesting, location);
            self.check_type_ref(&alias.ty);
        }
    }

    fn check_type_params(
        &mut self,
        params: &[TypeParam],
        nesting: &[NodeId],
        location: Option<&Location>,
    ) {
        for param in params {
            if let Some(bound) = &param.upper_bound {
                self.check_type(bound, nesting, location);
            }
        }
    }

    fn check_signature(
        &mut self,
        sig: &MethodSignature,
        nesting: &[NodeId],
        location: Option<&Location>,
    ) {
        self.check_type_params(&sig.type_params, nesting, location);
        let mut types = Vec::new();
        sig.walk_types(&mut |t| types.push(t.clone()));
        for ty in &types {
            self.check_name(ty, nesting, location);
        }
    }

    fn check_type_ref(&mut self, type_ref: &TypeRef) {
        self.check_type(&type_ref.ty, &type_ref.nesting, type_ref.location.as_ref());
    }

    fn check_type(&mut self, ty: &TypeExpr, nesting: &[NodeId], location: Option<&Location>) {
        let mut types = Vec::new();
        ty.walk(&mut |t| types.push(t.clone()));
        for ty in &types {
            self.check_name(ty, nesting, location);
        }
    }

    /// Resolution and generic arity of a single (non-recursive) node
    fn check_name(&mut self, ty: &TypeExpr, nesting: &[NodeId], location: Option<&Location>) {
        match ty {
            TypeExpr::Nominal { name, args } | TypeExpr::Interface { name, args } => {
                match self.resolver.resolve(name, nesting, false) {
                    Resolution::Found(id) => {
                        let decl = self.graph.node(id);
                        self.check_arity(&decl.name, decl.type_params.len(), args.len(), location);
                    }
                    Resolution::NotFound => self.report_unresolved("type", ty, location),
                    Resolution::Ambiguous(candidates) => {
                        self.report_ambiguous(ty, &candidates, location)
                    }
                }
            }
            TypeExpr::Singleton(name) => match self.resolver.resolve(name, nesting, false) {
                Resolution::Found(id) if self.graph.node(id).is_interface() => {
                    let error = SigError::invalid_member(
                        &self.graph.node(id).name,
                        "interfaces have no singleton type",
                    );
                    self.report(error, location);
                }
                Resolution::Found(_) => {}
                Resolution::NotFound => self.report_unresolved("type", ty, location),
                Resolution::Ambiguous(candidates) => {
                    self.report_ambiguous(ty, &candidates, location)
                }
            },
            TypeExpr::Alias { name, args } => match self.resolver.resolve_alias(name, nesting) {
                Resolution::Found(def) => {
                    self.check_arity(&def.name, def.type_params.len(), args.len(), location);
                }
                Resolution::NotFound => self.report_unresolved("type alias", ty, location),
                Resolution::Ambiguous(candidates) => {
                    self.report_ambiguous(ty, &candidates, location)
                }
            },
            _ => {}
        }
    }

    /// A reference without arguments is a raw use and always accepted
    fn check_arity(
        &mut self,
        name: &QualifiedName,
        expected: usize,
        found: usize,
        location: Option<&Location>,
    ) {
        if found != 0 && found != expected {
            self.report(
                SigError::GenericArity {
                    name: name.to_string(),
                    expected,
                    found,
                },
                location,
            );
        }
    }

    fn report_unresolved(&mut self, context: &str, ty: &TypeExpr, location: Option<&Location>) {
        let Some(name) = type_name(ty) else {
            return;
        };
        let suggestion = self.resolver.suggest(name).map(|s| s.to_string());
        let error = SigError::unresolved(context, name, format_suggestion_hint(suggestion.as_deref()));
        self.report(error, location);
    }

    fn report_ambiguous(
        &mut self,
        ty: &TypeExpr,
        candidates: &[QualifiedName],
        location: Option<&Location>,
    ) {
        let target = type_name(ty).map_or_else(|| ty.to_string(), QualifiedName::to_string);
        let candidates: Vec<String> = candidates.iter().map(QualifiedName::to_string).collect();
        self.report(
            SigError::Ambiguous {
                target,
                candidates: candidates.join(", "),
            },
            location,
        );
    }

    // ------------------------------------------------------------------
    // Variance
    // ------------------------------------------------------------------

    /// Covariant parameters may only occur in output positions and
    /// contravariant ones only in input positions of instance members,
    /// superclass and mixin arguments
    fn check_variance(&mut self, decl: &DeclarationNode) {
        let checked: Vec<&TypeParam> = decl
            .type_params
            .iter()
            .filter(|p| !p.unchecked && p.variance != Variance::Invariant)
            .collect();
        if checked.is_empty() {
            return;
        }

        let mut occurrences: Vec<(String, Polarity, Option<&Location>)> = Vec::new();
        let mut edges: Vec<&TypeRef> = decl.superclass.iter().collect();
        edges.extend(decl.mixins.iter().map(|m| &m.target));
        for edge in edges {
            let mut found = Vec::new();
            self.occurrences(&edge.ty, &edge.nesting, Polarity::Positive, &[], &mut found);
            let location = edge.location.as_ref().or(decl.location());
            occurrences.extend(found.into_iter().map(|(n, p)| (n, p, location)));
        }
        for (key, entry) in &decl.members {
            if key.scope != MemberScope::Instance {
                continue;
            }
            for overload in &entry.overloads {
                let mut found = Vec::new();
                self.signature_occurrences(
                    &overload.signature,
                    &overload.nesting,
                    Polarity::Positive,
                    &[],
                    &mut found,
                );
                let location = overload.location.as_ref().or(decl.location());
                occurrences.extend(found.into_iter().map(|(n, p)| (n, p, location)));
            }
        }

        let mut reported = BTreeSet::new();
        for (name, polarity, location) in occurrences {
            let Some(param) = checked.iter().find(|p| p.name == name) else {
                continue;
            };
            let violates = match param.variance {
                Variance::Covariant => polarity != Polarity::Positive,
                Variance::Contravariant => polarity != Polarity::Negative,
                Variance::Invariant => false,
            };
            if violates && reported.insert((name.clone(), polarity.describe())) {
                self.report(
                    SigError::Variance {
                        name: decl.name.to_string(),
                        param: name,
                        variance: param.variance.to_string(),
                        position: polarity.describe().to_string(),
                    },
                    location,
                );
            }
        }
    }

    fn signature_occurrences(
        &self,
        sig: &MethodSignature,
        nesting: &[NodeId],
        polarity: Polarity,
        shadowed: &[String],
        out: &mut Vec<(String, Polarity)>,
    ) {
        let mut shadowed = shadowed.to_vec();
        shadowed.extend(sig.type_params.iter().map(|p| p.name.clone()));
        for param in sig.positional.iter().chain(sig.keyword.iter()) {
            self.occurrences(&param.ty, nesting, polarity.flip(), &shadowed, out);
        }
        if let Some(block) = &sig.block {
            self.signature_occurrences(&block.signature, nesting, polarity.flip(), &shadowed, out);
        }
        self.occurrences(&sig.return_type, nesting, polarity, &shadowed, out);
    }

    fn occurrences(
        &self,
        ty: &TypeExpr,
        nesting: &[NodeId],
        polarity: Polarity,
        shadowed: &[String],
        out: &mut Vec<(String, Polarity)>,
    ) {
        with_stack(|| match ty {
            TypeExpr::Variable(name) => {
                if !shadowed.contains(name) {
                    out.push((name.clone(), polarity));
                }
            }
            TypeExpr::Nominal { name, args } | TypeExpr::Interface { name, args } => {
                let params: &[TypeParam] = match self.resolver.resolve(name, nesting, false) {
                    Resolution::Found(id) => self.graph.node(id).type_params.as_slice(),
                    _ => &[],
                };
                for (i, arg) in args.iter().enumerate() {
                    let variance = params.get(i).map_or(Variance::Invariant, |p| p.variance);
                    self.occurrences(arg, nesting, polarity.compose(variance), shadowed, out);
                }
            }
            TypeExpr::Alias { args, .. }
            | TypeExpr::Union(args)
            | TypeExpr::Intersection(args)
            | TypeExpr::Tuple(args) => {
                for arg in args {
                    self.occurrences(arg, nesting, polarity, shadowed, out);
                }
            }
            TypeExpr::Optional(inner) => self.occurrences(inner, nesting, polarity, shadowed, out),
            TypeExpr::Record(fields) => {
                for value in fields.values() {
                    self.occurrences(value, nesting, polarity, shadowed, out);
                }
            }
            TypeExpr::Proc(sig) => self.signature_occurrences(sig, nesting, polarity, shadowed, out),
            TypeExpr::Singleton(_) | TypeExpr::Literal(_) | TypeExpr::Special(_) => {}
        })
    }
}

fn type_name(ty: &TypeExpr) -> Option<&QualifiedName> {
    match ty {
        TypeExpr::Nominal { name, .. }
        | TypeExpr::Interface { name, .. }
        | TypeExpr::Alias { name, .. }
        | TypeExpr::Singleton(name) => Some(name),
        _ => None,
    }
}
