//! Ancestor linearization and method lookup
//!
//! Instance chain of a node: its prepends (most recent first), the node, its
//! includes (most recent first), then the superclass chain. Each mixin is
//! spliced in with its own linearization and the first occurrence of a node
//! wins. Type arguments are threaded through every step so that an ancestor
//! reached through `class Foo[T] < Bar[Array[T]]` carries `Array[T]`.

use std::collections::{BTreeSet, HashSet};

use crate::ast::{MixinRelation, QualifiedName, TypeExpr, Visibility};
use crate::config::CoreNames;
use crate::graph::{DeclarationGraph, MemberName, MemberScope, Mixin, NodeId, Overload, TypeRef};
use crate::resolver::Resolver;
use crate::types::subst::Substitution;
use crate::util::with_stack;

/// One entry of an instance ancestor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    pub node: NodeId,
    /// Arguments for `node`'s type parameters, written in terms of the
    /// parameters of the node the chain was computed for
    pub args: Vec<TypeExpr>,
}

/// One entry of a singleton (class-level) ancestor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingletonAncestor {
    /// `singleton(node)` itself; its singleton members apply
    Singleton(NodeId),
    /// A module or class whose instance members apply at class level
    Instance(Ancestor),
}

/// Result of [`AncestorEngine::lookup_method`]
#[derive(Debug, Clone)]
pub struct MethodLookup<'g> {
    /// Ancestor defining the method
    pub owner: NodeId,
    /// Name under which the overloads were found (differs from the requested
    /// name when an alias was followed)
    pub name: String,
    pub scope: MemberScope,
    pub visibility: Visibility,
    pub overloads: &'g [Overload],
    /// Arguments for the owner's type parameters
    pub owner_args: Vec<TypeExpr>,
}

/// A place to look for members during lookup
struct Frame {
    node: NodeId,
    args: Vec<TypeExpr>,
    scope: MemberScope,
}

#[derive(Debug, Clone, Copy)]
pub struct AncestorEngine<'g> {
    graph: &'g DeclarationGraph,
    core: &'g CoreNames,
    resolver: Resolver<'g>,
}

impl<'g> AncestorEngine<'g> {
    pub fn new(graph: &'g DeclarationGraph, core: &'g CoreNames) -> Self {
        Self {
            graph,
            core,
            resolver: Resolver::new(graph, core),
        }
    }

    pub fn resolver(&self) -> &Resolver<'g> {
        &self.resolver
    }

    /// Instance ancestors as node ids, `node` first
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        self.instance_ancestors(node).into_iter().map(|a| a.node).collect()
    }

    /// Instance ancestors with type arguments in terms of `node`'s own
    /// parameters
    pub fn instance_ancestors(&self, node: NodeId) -> Vec<Ancestor> {
        let args = self
            .graph
            .node(node)
            .type_params
            .iter()
            .map(|p| TypeExpr::Variable(p.name.clone()))
            .collect();
        self.instantiate(node, args)
    }

    /// Instance ancestors of `node[args]`
    pub fn instantiate(&self, node: NodeId, args: Vec<TypeExpr>) -> Vec<Ancestor> {
        let mut out = Vec::new();
        let mut visiting = Vec::new();
        self.linearize(node, args, &mut visiting, &mut out);
        out
    }

    /// Whether either node is an ancestor of the other
    pub fn related(&self, a: NodeId, b: NodeId) -> bool {
        a == b || self.ancestors(a).contains(&b) || self.ancestors(b).contains(&a)
    }

    fn linearize(
        &self,
        node: NodeId,
        args: Vec<TypeExpr>,
        visiting: &mut Vec<NodeId>,
        out: &mut Vec<Ancestor>,
    ) {
        if out.iter().any(|a| a.node == node) {
            return;
        }
        if visiting.contains(&node) {
            tracing::trace!(node = %self.graph.node(node).name, "ancestor cycle cut");
            return;
        }
        visiting.push(node);
        with_stack(|| {
            let decl = self.graph.node(node);
            let subst = Substitution::from_params(&decl.type_params, &args);

            let prepends: Vec<&Mixin> = decl.mixins_of(MixinRelation::Prepend).collect();
            for mixin in prepends.into_iter().rev() {
                self.linearize_mixin(mixin, &subst, visiting, out);
            }

            if !out.iter().any(|a| a.node == node) {
                out.push(Ancestor { node, args });
            }

            let includes: Vec<&Mixin> = decl.mixins_of(MixinRelation::Include).collect();
            for mixin in includes.into_iter().rev() {
                self.linearize_mixin(mixin, &subst, visiting, out);
            }

            if let Some((superclass, super_args)) = self.superclass_of(node, &subst) {
                self.linearize(superclass, super_args, visiting, out);
            }
        });
        visiting.pop();
    }

    fn linearize_mixin(
        &self,
        mixin: &Mixin,
        subst: &Substitution,
        visiting: &mut Vec<NodeId>,
        out: &mut Vec<Ancestor>,
    ) {
        let Some(target) = self.resolver.resolve_type(&mixin.target.ty, &mixin.target.nesting).found()
        else {
            return;
        };
        if self.graph.node(target).is_class() {
            return;
        }
        let args = self.edge_args(&mixin.target, target, subst);
        self.linearize(target, args, visiting, out);
    }

    /// Arguments of an edge target, absolutized where the edge was written
    /// and expressed through `subst`
    fn edge_args(&self, edge: &TypeRef, target: NodeId, subst: &Substitution) -> Vec<TypeExpr> {
        let written: &[TypeExpr] = match &edge.ty {
            TypeExpr::Nominal { args, .. } | TypeExpr::Interface { args, .. } => args,
            _ => &[],
        };
        let arity = self.graph.node(target).type_params.len();
        (0..arity)
            .map(|i| match written.get(i) {
                Some(arg) => subst.apply(&self.resolver.absolutize(arg, &edge.nesting)),
                None => TypeExpr::untyped(),
            })
            .collect()
    }

    /// Explicit superclass when it resolves to a class, otherwise the
    /// implicit one
    fn superclass_of(&self, node: NodeId, subst: &Substitution) -> Option<(NodeId, Vec<TypeExpr>)> {
        let decl = self.graph.node(node);
        if !decl.is_class() {
            return None;
        }
        if let Some(superclass) = &decl.superclass {
            let resolved = self
                .resolver
                .resolve_type(&superclass.ty, &superclass.nesting)
                .found()
                .filter(|id| *id != node && self.graph.node(*id).is_class());
            if let Some(target) = resolved {
                return Some((target, self.edge_args(superclass, target, subst)));
            }
        }
        self.implicit_superclass(node).map(|id| (id, Vec::new()))
    }

    fn implicit_superclass(&self, node: NodeId) -> Option<NodeId> {
        let name = &self.graph.node(node).name;
        let basic_object = CoreNames::name(&self.core.basic_object);
        if *name == basic_object {
            return None;
        }
        let object = CoreNames::name(&self.core.object);
        let target = if *name == object { basic_object } else { object };
        self.graph.lookup(&target).filter(|id| *id != node)
    }

    /// Resolved superclass and mixin targets (extends excluded)
    fn direct_parents(&self, node: NodeId) -> Vec<NodeId> {
        let decl = self.graph.node(node);
        let mut parents = Vec::new();
        if let Some(superclass) = &decl.superclass {
            if let Some(id) = self.resolver.resolve_type(&superclass.ty, &superclass.nesting).found() {
                parents.push(id);
            }
        }
        for mixin in decl.mixins.iter().filter(|m| m.relation != MixinRelation::Extend) {
            if let Some(id) = self.resolver.resolve_type(&mixin.target.ty, &mixin.target.nesting).found() {
                parents.push(id);
            }
        }
        parents
    }

    /// A path `node -> ... -> node` through superclass and mixin edges
    pub fn find_cycle(&self, node: NodeId) -> Option<Vec<QualifiedName>> {
        let mut path = vec![node];
        let mut visited = HashSet::new();
        if self.cycle_from(node, node, &mut path, &mut visited) {
            Some(path.iter().map(|id| self.graph.node(*id).name.clone()).collect())
        } else {
            None
        }
    }

    fn cycle_from(
        &self,
        start: NodeId,
        current: NodeId,
        path: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
    ) -> bool {
        with_stack(|| {
            for next in self.direct_parents(current) {
                if next == start {
                    path.push(next);
                    return true;
                }
                if visited.insert(next) {
                    path.push(next);
                    if self.cycle_from(start, next, path, visited) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        })
    }

    // ------------------------------------------------------------------
    // Singleton chain
    // ------------------------------------------------------------------

    /// Class-level ancestors: for each class in the superclass chain its
    /// singleton and then its extended modules, followed by the instance
    /// ancestors of `Class` (or `Module` for a module). Empty for interfaces.
    pub fn singleton_ancestors(&self, node: NodeId) -> Vec<SingletonAncestor> {
        let decl = self.graph.node(node);
        if decl.is_interface() {
            return Vec::new();
        }

        let mut out: Vec<SingletonAncestor> = Vec::new();
        let mut seen_instances: Vec<NodeId> = Vec::new();
        let mut push_instances = |out: &mut Vec<SingletonAncestor>, ancestors: Vec<Ancestor>| {
            for ancestor in ancestors {
                if !seen_instances.contains(&ancestor.node) {
                    seen_instances.push(ancestor.node);
                    out.push(SingletonAncestor::Instance(ancestor));
                }
            }
        };

        let chain: Vec<NodeId> = if decl.is_class() {
            self.instance_ancestors(node)
                .into_iter()
                .map(|a| a.node)
                .filter(|id| self.graph.node(*id).is_class())
                .collect()
        } else {
            vec![node]
        };

        for class in chain {
            out.push(SingletonAncestor::Singleton(class));
            let class_decl = self.graph.node(class);
            let extends: Vec<&Mixin> = class_decl.mixins_of(MixinRelation::Extend).collect();
            for mixin in extends.into_iter().rev() {
                let Some(target) = self.resolver.resolve_type(&mixin.target.ty, &mixin.target.nesting).found()
                else {
                    continue;
                };
                if self.graph.node(target).is_class() {
                    continue;
                }
                let args = self.edge_args(&mixin.target, target, &Substitution::new());
                push_instances(&mut out, self.instantiate(target, args));
            }
        }

        let meta = if decl.is_class() {
            &self.core.class
        } else {
            &self.core.module
        };
        if let Some(meta) = self.graph.lookup(&CoreNames::name(meta)) {
            push_instances(&mut out, self.instance_ancestors(meta));
        }
        out
    }

    // ------------------------------------------------------------------
    // Method lookup
    // ------------------------------------------------------------------

    fn frames(&self, node: NodeId, scope: MemberScope) -> Vec<Frame> {
        match scope {
            MemberScope::Instance => self
                .instance_ancestors(node)
                .into_iter()
                .map(|a| Frame {
                    node: a.node,
                    args: a.args,
                    scope: MemberScope::Instance,
                })
                .collect(),
            MemberScope::Singleton => self
                .singleton_ancestors(node)
                .into_iter()
                .map(|entry| match entry {
                    SingletonAncestor::Singleton(id) => Frame {
                        node: id,
                        args: Vec::new(),
                        scope: MemberScope::Singleton,
                    },
                    SingletonAncestor::Instance(a) => Frame {
                        node: a.node,
                        args: a.args,
                        scope: MemberScope::Instance,
                    },
                })
                .collect(),
        }
    }

    /// First ancestor defining `name`. Visibility is reported, not filtered.
    pub fn lookup_method(&self, node: NodeId, name: &MemberName) -> Option<MethodLookup<'g>> {
        let frames = self.frames(node, name.scope);
        let mut followed = Vec::new();
        self.search(&frames, &name.name, 0, &mut followed)
    }

    fn search(
        &self,
        frames: &[Frame],
        name: &str,
        start: usize,
        followed: &mut Vec<String>,
    ) -> Option<MethodLookup<'g>> {
        for (i, frame) in frames.iter().enumerate().skip(start) {
            let decl = self.graph.node(frame.node);
            if let Some(entry) = decl.method(frame.scope, name) {
                return Some(MethodLookup {
                    owner: frame.node,
                    name: name.to_string(),
                    scope: frame.scope,
                    visibility: entry.visibility,
                    overloads: &entry.overloads,
                    owner_args: frame.args.clone(),
                });
            }
            if let Some(alias) = decl.alias_for(frame.scope, name) {
                if followed.iter().any(|n| *n == alias.old_name) {
                    return None;
                }
                followed.push(name.to_string());
                return self.search(frames, &alias.old_name, i, followed);
            }
        }
        None
    }

    /// Every method visible on `node` in `scope`, by name
    pub fn method_table(&self, node: NodeId, scope: MemberScope) -> Vec<(String, MethodLookup<'g>)> {
        let mut names = BTreeSet::new();
        for frame in self.frames(node, scope) {
            let decl = self.graph.node(frame.node);
            names.extend(
                decl.members
                    .keys()
                    .filter(|key| key.scope == frame.scope)
                    .map(|key| key.name.clone()),
            );
            names.extend(
                decl.method_aliases
                    .iter()
                    .filter(|alias| alias.scope == frame.scope)
                    .map(|alias| alias.new_name.clone()),
            );
        }
        names
            .into_iter()
            .filter_map(|name| {
                let found = self.lookup_method(node, &MemberName::new(scope, name.clone()))?;
                Some((name, found))
            })
            .collect()
    }
}
