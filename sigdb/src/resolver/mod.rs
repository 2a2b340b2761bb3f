//! Name and constant resolution
//!
//! Relative names are looked up from the innermost lexical frame outward and
//! finally in the root namespace. With `inherit`, each frame's ancestors are
//! searched after its own namespace. Later components of a dotted path are
//! looked up strictly inside the node the previous component named.

use crate::ancestors::AncestorEngine;
use crate::ast::{MethodSignature, QualifiedName, TypeExpr};
use crate::config::CoreNames;
use crate::graph::{DeclarationGraph, NodeId, TypeAliasDef};
use crate::types::subst::Substitution;
use crate::util::{find_similar_name, suggestion_threshold};

/// Outcome of a name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    /// Every candidate, the winner by search order first
    Ambiguous(Vec<QualifiedName>),
}

impl<T> Resolution<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Resolution::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Resolution::Found(value) => Resolution::Found(f(value)),
            Resolution::NotFound => Resolution::NotFound,
            Resolution::Ambiguous(candidates) => Resolution::Ambiguous(candidates),
        }
    }
}

/// What a constant path names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantTarget {
    /// A class, module or interface
    Declaration(NodeId),
    /// A value constant, `VERSION: String`, in `owner`'s namespace
    Value { owner: Option<NodeId>, name: String },
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'g> {
    graph: &'g DeclarationGraph,
    core: &'g CoreNames,
}

impl<'g> Resolver<'g> {
    pub fn new(graph: &'g DeclarationGraph, core: &'g CoreNames) -> Self {
        Self { graph, core }
    }

    pub fn graph(&self) -> &'g DeclarationGraph {
        self.graph
    }

    /// Resolve a class, module or interface name
    pub fn resolve(
        &self,
        name: &QualifiedName,
        nesting: &[NodeId],
        inherit: bool,
    ) -> Resolution<NodeId> {
        match self.resolve_path(name, nesting, inherit, false) {
            Resolution::Found(ConstantTarget::Declaration(id)) => Resolution::Found(id),
            Resolution::Found(ConstantTarget::Value { .. }) | Resolution::NotFound => {
                Resolution::NotFound
            }
            Resolution::Ambiguous(candidates) => Resolution::Ambiguous(candidates),
        }
    }

    /// Resolve a name that may also denote a value constant. Ancestors of each
    /// frame are searched.
    pub fn resolve_constant(
        &self,
        name: &QualifiedName,
        nesting: &[NodeId],
    ) -> Resolution<ConstantTarget> {
        self.resolve_path(name, nesting, true, true)
    }

    fn resolve_path(
        &self,
        name: &QualifiedName,
        nesting: &[NodeId],
        inherit: bool,
        values: bool,
    ) -> Resolution<ConstantTarget> {
        let components: Vec<&str> = name.components().collect();
        let Some((head, rest)) = components.split_first() else {
            return Resolution::NotFound;
        };
        let head_is_last = rest.is_empty();

        let mut current = if name.absolute {
            match self.find_in(None, head, values && head_is_last) {
                Some(target) => target,
                None => return Resolution::NotFound,
            }
        } else {
            match self.lookup_head(head, nesting, inherit, values && head_is_last) {
                Resolution::Found(target) => target,
                other => return other,
            }
        };

        for (i, part) in rest.iter().enumerate() {
            let ConstantTarget::Declaration(owner) = current else {
                return Resolution::NotFound;
            };
            let is_last = i + 1 == rest.len();
            current = match self.find_in(Some(owner), part, values && is_last) {
                Some(target) => target,
                None => return Resolution::NotFound,
            };
        }
        Resolution::Found(current)
    }

    fn find_in(&self, owner: Option<NodeId>, name: &str, values: bool) -> Option<ConstantTarget> {
        let namespace = self.graph.namespace(owner);
        if let Some(&id) = namespace.nested.get(name) {
            return Some(ConstantTarget::Declaration(id));
        }
        if values && namespace.constants.contains_key(name) {
            return Some(ConstantTarget::Value {
                owner,
                name: name.to_string(),
            });
        }
        None
    }

    fn lookup_head(
        &self,
        head: &str,
        nesting: &[NodeId],
        inherit: bool,
        values: bool,
    ) -> Resolution<ConstantTarget> {
        for frame in nesting.iter().rev().copied() {
            if let Some(target) = self.find_in(Some(frame), head, values) {
                return Resolution::Found(target);
            }
            if inherit {
                match self.find_in_ancestors(frame, head, values) {
                    Resolution::NotFound => {}
                    other => return other,
                }
            }
        }
        match self.find_in(None, head, values) {
            Some(target) => Resolution::Found(target),
            None => Resolution::NotFound,
        }
    }

    /// Search `frame`'s ancestors. After the first hit, further hits up to the
    /// next class ancestor that name something else, come from a module, and
    /// whose module is unrelated to the first definer make the lookup ambiguous.
    fn find_in_ancestors(
        &self,
        frame: NodeId,
        name: &str,
        values: bool,
    ) -> Resolution<ConstantTarget> {
        let engine = AncestorEngine::new(self.graph, self.core);
        let mut first: Option<(ConstantTarget, NodeId)> = None;
        let mut rivals: Vec<ConstantTarget> = Vec::new();

        for ancestor in engine.ancestors(frame).into_iter().filter(|a| *a != frame) {
            let decl = self.graph.node(ancestor);
            if first.is_some() && decl.is_class() {
                break;
            }
            let Some(found) = self.find_in(Some(ancestor), name, values) else {
                continue;
            };
            if first.is_none() {
                first = Some((found, ancestor));
                continue;
            }
            if let Some((winner, definer)) = &first {
                if found != *winner
                    && decl.is_module()
                    && !engine.related(*definer, ancestor)
                    && !rivals.contains(&found)
                {
                    rivals.push(found);
                }
            }
        }

        match first {
            None => Resolution::NotFound,
            Some((winner, _)) if rivals.is_empty() => Resolution::Found(winner),
            Some((winner, _)) => {
                let mut candidates = vec![self.target_name(&winner)];
                candidates.extend(rivals.iter().map(|t| self.target_name(t)));
                tracing::debug!(name, candidates = candidates.len(), "ambiguous constant");
                Resolution::Ambiguous(candidates)
            }
        }
    }

    pub fn target_name(&self, target: &ConstantTarget) -> QualifiedName {
        match target {
            ConstantTarget::Declaration(id) => self.graph.node(*id).name.clone(),
            ConstantTarget::Value { owner, name } => match owner {
                Some(id) => self.graph.node(*id).name.child(name.clone()),
                None => QualifiedName::from_path(&[name.as_str()]),
            },
        }
    }

    /// Resolve the node named by a nominal, interface or singleton type
    pub fn resolve_type(&self, ty: &TypeExpr, nesting: &[NodeId]) -> Resolution<NodeId> {
        match ty {
            TypeExpr::Nominal { name, .. }
            | TypeExpr::Interface { name, .. }
            | TypeExpr::Singleton(name) => self.resolve(name, nesting, false),
            _ => Resolution::NotFound,
        }
    }

    // ------------------------------------------------------------------
    // Type aliases
    // ------------------------------------------------------------------

    /// Look up a `type name = ...` declaration. Lexical only.
    pub fn resolve_alias(
        &self,
        name: &QualifiedName,
        nesting: &[NodeId],
    ) -> Resolution<&'g TypeAliasDef> {
        if let Some(namespace) = name.parent() {
            return match self.resolve(&namespace, nesting, false) {
                Resolution::Found(owner) => {
                    match self.graph.namespace(Some(owner)).type_aliases.get(&name.name) {
                        Some(def) => Resolution::Found(def),
                        None => Resolution::NotFound,
                    }
                }
                Resolution::NotFound => Resolution::NotFound,
                Resolution::Ambiguous(candidates) => Resolution::Ambiguous(candidates),
            };
        }
        if !name.absolute {
            for frame in nesting.iter().rev().copied() {
                if let Some(def) = self.graph.namespace(Some(frame)).type_aliases.get(&name.name) {
                    return Resolution::Found(def);
                }
            }
        }
        match self.graph.root().type_aliases.get(&name.name) {
            Some(def) => Resolution::Found(def),
            None => Resolution::NotFound,
        }
    }

    /// One step of alias expansion: the right-hand side with the alias
    /// parameters substituted, names absolutized in the alias's own nesting.
    pub fn expand_alias(&self, ty: &TypeExpr, nesting: &[NodeId]) -> Option<TypeExpr> {
        let TypeExpr::Alias { name, args } = ty else {
            return None;
        };
        let def = self.resolve_alias(name, nesting).found()?;
        let body = self.absolutize(&def.ty.ty, &def.ty.nesting);
        let args: Vec<TypeExpr> = args.iter().map(|a| self.absolutize(a, nesting)).collect();
        let subst = Substitution::from_params(&def.type_params, &args);
        Some(subst.apply(&body))
    }

    // ------------------------------------------------------------------
    // Absolutization
    // ------------------------------------------------------------------

    fn absolute_name(&self, name: &QualifiedName, nesting: &[NodeId]) -> QualifiedName {
        match self.resolve(name, nesting, false) {
            Resolution::Found(id) => self.graph.node(id).name.clone(),
            _ => name.clone(),
        }
    }

    /// Rewrite every resolvable name in `ty` to its absolute form.
    /// Unresolvable names are left as written.
    pub fn absolutize(&self, ty: &TypeExpr, nesting: &[NodeId]) -> TypeExpr {
        ty.map_types(&mut |t| match t {
            TypeExpr::Nominal { name, args } => Some(TypeExpr::Nominal {
                name: self.absolute_name(name, nesting),
                args: args.iter().map(|a| self.absolutize(a, nesting)).collect(),
            }),
            TypeExpr::Interface { name, args } => Some(TypeExpr::Interface {
                name: self.absolute_name(name, nesting),
                args: args.iter().map(|a| self.absolutize(a, nesting)).collect(),
            }),
            TypeExpr::Alias { name, args } => {
                let name = match self.resolve_alias(name, nesting) {
                    Resolution::Found(def) => def.name.clone(),
                    _ => name.clone(),
                };
                Some(TypeExpr::Alias {
                    name,
                    args: args.iter().map(|a| self.absolutize(a, nesting)).collect(),
                })
            }
            TypeExpr::Singleton(name) => Some(TypeExpr::Singleton(self.absolute_name(name, nesting))),
            _ => None,
        })
    }

    pub fn absolutize_signature(&self, sig: &MethodSignature, nesting: &[NodeId]) -> MethodSignature {
        sig.map_types(&mut |t| Some(self.absolutize(t, nesting)))
    }

    /// Lexical nesting inside `node`: its enclosing declarations, outermost
    /// first, ending with `node` itself
    pub fn nesting_of(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = vec![node];
        let mut current = self.graph.node(node).parent;
        while let Some(id) = current {
            chain.push(id);
            current = self.graph.node(id).parent;
        }
        chain.reverse();
        chain
    }

    /// Closest declared name, for did-you-mean hints
    pub fn suggest(&self, name: &QualifiedName) -> Option<QualifiedName> {
        let mut candidates: Vec<&str> = self.graph.nodes().map(|n| n.name.name.as_str()).collect();
        candidates.extend(self.graph.root().type_aliases.keys().map(String::as_str));
        for node in self.graph.nodes() {
            candidates.extend(node.namespace.type_aliases.keys().map(String::as_str));
        }
        candidates.retain(|c| *c != name.name);
        let best = find_similar_name(&name.name, &candidates, suggestion_threshold(&name.name))?;
        if let Some(node) = self.graph.nodes().find(|n| n.name.name == best) {
            return Some(node.name.clone());
        }
        if let Some(def) = self.graph.root().type_aliases.get(best) {
            return Some(def.name.clone());
        }
        self.graph
            .nodes()
            .find_map(|n| n.namespace.type_aliases.get(best))
            .map(|def| def.name.clone())
    }
}
