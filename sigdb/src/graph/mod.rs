//! Declaration graph
//!
//! Arena of class, module and interface nodes indexed by [`NodeId`]. Edges to
//! superclasses and mixins are kept as written type expressions together with
//! the lexical nesting they appeared in; the resolver interprets them on every
//! query, so a reopening is visible to later queries without invalidation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::ast::{
    AttributeKind, DeclKind, Location, MethodSignature, MixinRelation, QualifiedName, TypeExpr,
    TypeParam, Visibility, format_type_params,
};
use crate::error::{Result, SigError};

/// Index of a declaration node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MemberScope {
    Instance,
    Singleton,
}

impl fmt::Display for MemberScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberScope::Instance => write!(f, "instance"),
            MemberScope::Singleton => write!(f, "singleton"),
        }
    }
}

/// Member table key. Visibility is metadata on the entry, not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberName {
    pub scope: MemberScope,
    pub name: String,
}

impl MemberName {
    pub fn new(scope: MemberScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    pub fn instance(name: impl Into<String>) -> Self {
        Self::new(MemberScope::Instance, name)
    }

    pub fn singleton(name: impl Into<String>) -> Self {
        Self::new(MemberScope::Singleton, name)
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            MemberScope::Instance => write!(f, "#{}", self.name),
            MemberScope::Singleton => write!(f, ".{}", self.name),
        }
    }
}

/// Input to [`DeclarationGraph::add_member`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberKey {
    pub name: String,
    pub scope: MemberScope,
    pub visibility: Visibility,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, scope: MemberScope, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            scope,
            visibility,
        }
    }

    pub fn public(name: impl Into<String>, scope: MemberScope) -> Self {
        Self::new(name, scope, Visibility::Public)
    }

    pub fn member_name(&self) -> MemberName {
        MemberName::new(self.scope, self.name.clone())
    }
}

/// A type expression together with the lexical nesting it was written in
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub ty: TypeExpr,
    /// Enclosing declarations, outermost first
    pub nesting: Vec<NodeId>,
    pub location: Option<Location>,
}

impl TypeRef {
    pub fn new(ty: TypeExpr, nesting: Vec<NodeId>) -> Self {
        Self {
            ty,
            nesting,
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Same expression written in the same nesting
    pub fn same_as(&self, other: &TypeRef) -> bool {
        self.ty == other.ty && self.nesting == other.nesting
    }
}

/// One overload of a method entry
#[derive(Debug, Clone)]
pub struct Overload {
    pub signature: MethodSignature,
    pub nesting: Vec<NodeId>,
    pub location: Option<Location>,
}

impl Overload {
    pub fn new(signature: MethodSignature, nesting: Vec<NodeId>) -> Self {
        Self {
            signature,
            nesting,
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn same_as(&self, other: &Overload) -> bool {
        self.signature == other.signature && self.nesting == other.nesting
    }
}

/// Method table entry; `overloads` is never empty
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub visibility: Visibility,
    pub overloads: Vec<Overload>,
}

#[derive(Debug, Clone)]
pub struct Mixin {
    pub relation: MixinRelation,
    pub target: TypeRef,
}

#[derive(Debug, Clone)]
pub struct TypeAliasDef {
    pub name: QualifiedName,
    pub type_params: Vec<TypeParam>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ConstantDef {
    pub name: QualifiedName,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeKind,
    pub scope: MemberScope,
    pub visibility: Visibility,
    pub ty: TypeRef,
}

/// `alias new_name old_name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAlias {
    pub new_name: String,
    pub old_name: String,
    pub scope: MemberScope,
    pub location: Option<Location>,
}

#[derive(Debug, Clone)]
pub struct InstanceVariableDef {
    pub name: String,
    pub ty: TypeRef,
}

/// Names owned by a declaration (or by the root)
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub nested: BTreeMap<String, NodeId>,
    pub constants: BTreeMap<String, ConstantDef>,
    pub type_aliases: BTreeMap<String, TypeAliasDef>,
}

#[derive(Debug, Clone)]
pub struct DeclarationNode {
    pub id: NodeId,
    pub kind: DeclKind,
    /// Absolute name
    pub name: QualifiedName,
    pub parent: Option<NodeId>,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<TypeRef>,
    /// Module self-type constraints, `module M : _Each`
    pub self_types: Vec<TypeRef>,
    pub mixins: Vec<Mixin>,
    pub members: BTreeMap<MemberName, MethodEntry>,
    pub method_aliases: Vec<MethodAlias>,
    pub attributes: Vec<AttributeDef>,
    pub instance_variables: BTreeMap<String, InstanceVariableDef>,
    pub namespace: Namespace,
    /// Created only as the parent of a nested declaration
    pub implicit: bool,
    pub locations: Vec<Location>,
}

impl DeclarationNode {
    fn new(
        id: NodeId,
        kind: DeclKind,
        name: QualifiedName,
        type_params: Vec<TypeParam>,
        parent: Option<NodeId>,
        implicit: bool,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            parent,
            type_params,
            superclass: None,
            self_types: Vec::new(),
            mixins: Vec::new(),
            members: BTreeMap::new(),
            method_aliases: Vec::new(),
            attributes: Vec::new(),
            instance_variables: BTreeMap::new(),
            namespace: Namespace::default(),
            implicit,
            locations: Vec::new(),
        }
    }

    pub fn is_class(&self) -> bool {
        self.kind == DeclKind::Class
    }

    pub fn is_module(&self) -> bool {
        self.kind == DeclKind::Module
    }

    pub fn is_interface(&self) -> bool {
        self.kind == DeclKind::Interface
    }

    pub fn method(&self, scope: MemberScope, name: &str) -> Option<&MethodEntry> {
        self.members.get(&MemberName::new(scope, name))
    }

    pub fn mixins_of(&self, relation: MixinRelation) -> impl Iterator<Item = &Mixin> {
        self.mixins.iter().filter(move |m| m.relation == relation)
    }

    pub fn alias_for(&self, scope: MemberScope, name: &str) -> Option<&MethodAlias> {
        self.method_aliases
            .iter()
            .find(|a| a.scope == scope && a.new_name == name)
    }

    /// First location of the declaration, if any
    pub fn location(&self) -> Option<&Location> {
        self.locations.first()
    }
}

/// The in-memory declaration database
#[derive(Debug, Clone, Default)]
pub struct DeclarationGraph {
    nodes: Vec<DeclarationNode>,
    by_name: HashMap<QualifiedName, NodeId>,
    root: Namespace,
    globals: BTreeMap<String, TypeRef>,
}

impl DeclarationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Panics on an id that did not come from this graph
    pub fn node(&self, id: NodeId) -> &DeclarationNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DeclarationNode> {
        self.nodes.iter()
    }

    /// Node by absolute name (the `absolute` flag of `name` is ignored)
    pub fn lookup(&self, name: &QualifiedName) -> Option<NodeId> {
        if name.absolute {
            self.by_name.get(name).copied()
        } else {
            self.by_name.get(&name.to_absolute()).copied()
        }
    }

    pub fn root(&self) -> &Namespace {
        &self.root
    }

    /// Namespace of `owner`, or the root namespace for `None`
    pub fn namespace(&self, owner: Option<NodeId>) -> &Namespace {
        match owner {
            Some(id) => &self.nodes[id.0].namespace,
            None => &self.root,
        }
    }

    fn namespace_mut(&mut self, owner: Option<NodeId>) -> &mut Namespace {
        match owner {
            Some(id) => &mut self.nodes[id.0].namespace,
            None => &mut self.root,
        }
    }

    pub fn globals(&self) -> &BTreeMap<String, TypeRef> {
        &self.globals
    }

    /// Every node name, for did-you-mean suggestions
    pub fn names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.nodes.iter().map(|n| &n.name)
    }

    // ------------------------------------------------------------------
    // Mutations. Each validates fully before touching the graph.
    // ------------------------------------------------------------------

    /// Declare or reopen `name`; missing parents become implicit modules.
    pub fn declare(
        &mut self,
        kind: DeclKind,
        name: &QualifiedName,
        type_params: Vec<TypeParam>,
    ) -> Result<NodeId> {
        let name = name.to_absolute();
        let path: Vec<String> = name.components().map(str::to_string).collect();

        let mut owner = None;
        for depth in 1..path.len() {
            let prefix = QualifiedName::from_path(&path[..depth]);
            let Some(&id) = self.by_name.get(&prefix) else {
                if self.namespace(owner).constants.contains_key(&path[depth - 1]) {
                    return Err(SigError::Duplicate {
                        what: "constant and declaration".into(),
                        name: prefix.to_string(),
                    });
                }
                break;
            };
            if self.nodes[id.0].is_interface() {
                return Err(SigError::invalid_member(
                    &prefix,
                    format!("interfaces cannot contain declarations (`{}`)", path[depth]),
                ));
            }
            owner = Some(id);
        }

        if let Some(&id) = self.by_name.get(&name) {
            let existing = &self.nodes[id.0];
            let kind_conflict = if existing.implicit {
                kind == DeclKind::Interface
            } else {
                existing.kind != kind
            };
            if kind_conflict {
                return Err(SigError::KindConflict {
                    name: name.to_string(),
                    existing: existing.kind,
                    requested: kind,
                });
            }
            if !type_params.is_empty()
                && !existing.type_params.is_empty()
                && existing.type_params != type_params
            {
                return Err(SigError::TypeParamMismatch {
                    name: name.to_string(),
                    existing: format_type_params(&existing.type_params),
                    requested: format_type_params(&type_params),
                });
            }
        } else {
            let parent = name.parent().and_then(|p| self.by_name.get(&p).copied());
            if self.namespace(parent).constants.contains_key(&name.name) {
                return Err(SigError::Duplicate {
                    what: "constant and declaration".into(),
                    name: name.to_string(),
                });
            }
        }

        let mut parent = None;
        for depth in 1..path.len() {
            let prefix = QualifiedName::from_path(&path[..depth]);
            let id = match self.by_name.get(&prefix) {
                Some(&id) => id,
                None => {
                    tracing::trace!(namespace = %prefix, "creating implicit namespace");
                    self.insert_node(DeclKind::Module, prefix, Vec::new(), parent, true)
                }
            };
            parent = Some(id);
        }

        match self.by_name.get(&name).copied() {
            Some(id) => {
                let node = &mut self.nodes[id.0];
                if node.implicit {
                    node.kind = kind;
                    node.implicit = false;
                }
                if node.type_params.is_empty() {
                    node.type_params = type_params;
                }
                Ok(id)
            }
            None => Ok(self.insert_node(kind, name, type_params, parent, false)),
        }
    }

    fn insert_node(
        &mut self,
        kind: DeclKind,
        name: QualifiedName,
        type_params: Vec<TypeParam>,
        parent: Option<NodeId>,
        implicit: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let simple = name.name.clone();
        self.by_name.insert(name.clone(), id);
        self.nodes
            .push(DeclarationNode::new(id, kind, name, type_params, parent, implicit));
        self.namespace_mut(parent).nested.insert(simple, id);
        id
    }

    fn check_singleton_member(&self, node: NodeId, scope: MemberScope, name: &str) -> Result<()> {
        let decl = &self.nodes[node.0];
        if decl.is_interface() && scope == MemberScope::Singleton {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("interfaces cannot declare singleton method `{name}`"),
            ));
        }
        Ok(())
    }

    /// Append an overload to `(scope, name)`; the last visibility wins
    pub fn add_member(&mut self, node: NodeId, key: MemberKey, overload: Overload) -> Result<()> {
        self.check_singleton_member(node, key.scope, &key.name)?;
        let entry = self.nodes[node.0]
            .members
            .entry(key.member_name())
            .or_insert_with(|| MethodEntry {
                visibility: key.visibility,
                overloads: Vec::new(),
            });
        entry.visibility = key.visibility;
        if !entry.overloads.iter().any(|o| o.same_as(&overload)) {
            entry.overloads.push(overload);
        }
        Ok(())
    }

    /// Replace every overload of `(scope, name)`
    pub fn redefine_member(
        &mut self,
        node: NodeId,
        key: MemberKey,
        overloads: Vec<Overload>,
    ) -> Result<()> {
        self.check_singleton_member(node, key.scope, &key.name)?;
        if overloads.is_empty() {
            return Err(SigError::invalid_member(
                &self.nodes[node.0].name,
                format!("`{}` redefined without overloads", key.name),
            ));
        }
        let mut unique: Vec<Overload> = Vec::with_capacity(overloads.len());
        for overload in overloads {
            if !unique.iter().any(|o| o.same_as(&overload)) {
                unique.push(overload);
            }
        }
        self.nodes[node.0].members.insert(
            key.member_name(),
            MethodEntry {
                visibility: key.visibility,
                overloads: unique,
            },
        );
        Ok(())
    }

    pub fn add_mixin(&mut self, node: NodeId, mixin: Mixin) -> Result<()> {
        let decl = &self.nodes[node.0];
        let target_is_interface = match &mixin.target.ty {
            TypeExpr::Interface { .. } => true,
            TypeExpr::Nominal { .. } => false,
            other => {
                return Err(SigError::invalid_mixin(
                    &decl.name,
                    format!("`{other}` is not a module or interface"),
                ));
            }
        };
        if decl.is_interface() && (mixin.relation != MixinRelation::Include || !target_is_interface)
        {
            return Err(SigError::invalid_mixin(
                &decl.name,
                format!(
                    "interfaces can only include interfaces, found `{} {}`",
                    mixin.relation, mixin.target.ty
                ),
            ));
        }
        if target_is_interface && mixin.relation == MixinRelation::Prepend {
            return Err(SigError::invalid_mixin(
                &decl.name,
                format!("cannot prepend interface `{}`", mixin.target.ty),
            ));
        }
        let duplicate = decl
            .mixins
            .iter()
            .any(|m| m.relation == mixin.relation && m.target.same_as(&mixin.target));
        if !duplicate {
            self.nodes[node.0].mixins.push(mixin);
        }
        Ok(())
    }

    pub fn set_superclass(&mut self, node: NodeId, superclass: TypeRef) -> Result<()> {
        let decl = &self.nodes[node.0];
        if !decl.is_class() {
            return Err(SigError::invalid_superclass(
                &decl.name,
                format!("a {} cannot have a superclass", decl.kind),
            ));
        }
        if !matches!(superclass.ty, TypeExpr::Nominal { .. }) {
            return Err(SigError::invalid_superclass(
                &decl.name,
                format!("`{}` is not a class", superclass.ty),
            ));
        }
        match &decl.superclass {
            Some(existing) if existing.ty != superclass.ty => Err(SigError::SuperclassConflict {
                name: decl.name.to_string(),
                existing: existing.ty.to_string(),
                requested: superclass.ty.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.nodes[node.0].superclass = Some(superclass);
                Ok(())
            }
        }
    }

    pub fn add_self_type(&mut self, node: NodeId, self_type: TypeRef) -> Result<()> {
        let decl = &self.nodes[node.0];
        if !decl.is_module() {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("only modules declare self types, found `{}`", self_type.ty),
            ));
        }
        if !matches!(
            self_type.ty,
            TypeExpr::Nominal { .. } | TypeExpr::Interface { .. }
        ) {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("self type `{}` is not a class, module or interface", self_type.ty),
            ));
        }
        if !decl.self_types.iter().any(|t| t.same_as(&self_type)) {
            self.nodes[node.0].self_types.push(self_type);
        }
        Ok(())
    }

    /// Constant in `owner`'s namespace (`None` for the root)
    pub fn add_constant(&mut self, owner: Option<NodeId>, name: &str, ty: TypeRef) -> Result<()> {
        let qualified = match owner {
            Some(id) => self.nodes[id.0].name.child(name),
            None => QualifiedName::from_path(&[name]),
        };
        let namespace = self.namespace(owner);
        if namespace.nested.contains_key(name) {
            return Err(SigError::Duplicate {
                what: "constant and declaration".into(),
                name: qualified.to_string(),
            });
        }
        match namespace.constants.get(name) {
            Some(existing) if existing.ty.ty != ty.ty => Err(SigError::Duplicate {
                what: "constant".into(),
                name: qualified.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.namespace_mut(owner).constants.insert(
                    name.to_string(),
                    ConstantDef {
                        name: qualified,
                        ty,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn add_type_alias(
        &mut self,
        owner: Option<NodeId>,
        name: &str,
        type_params: Vec<TypeParam>,
        ty: TypeRef,
    ) -> Result<()> {
        let qualified = match owner {
            Some(id) => self.nodes[id.0].name.child(name),
            None => QualifiedName::from_path(&[name]),
        };
        match self.namespace(owner).type_aliases.get(name) {
            Some(existing) if existing.ty.ty != ty.ty || existing.type_params != type_params => {
                Err(SigError::Duplicate {
                    what: "type alias".into(),
                    name: qualified.to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.namespace_mut(owner).type_aliases.insert(
                    name.to_string(),
                    TypeAliasDef {
                        name: qualified,
                        type_params,
                        ty,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn add_global(&mut self, name: &str, ty: TypeRef) -> Result<()> {
        match self.globals.get(name) {
            Some(existing) if existing.ty != ty.ty => Err(SigError::Duplicate {
                what: "global".into(),
                name: name.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.globals.insert(name.to_string(), ty);
                Ok(())
            }
        }
    }

    pub fn add_attribute(&mut self, node: NodeId, attribute: AttributeDef) -> Result<()> {
        let decl = &self.nodes[node.0];
        if decl.is_interface() {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("interfaces cannot declare attribute `{}`", attribute.name),
            ));
        }
        self.nodes[node.0].attributes.push(attribute);
        Ok(())
    }

    pub fn add_instance_variable(&mut self, node: NodeId, name: &str, ty: TypeRef) -> Result<()> {
        let decl = &self.nodes[node.0];
        if decl.is_interface() {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("interfaces cannot declare instance variable `{name}`"),
            ));
        }
        match decl.instance_variables.get(name) {
            Some(existing) if existing.ty.ty != ty.ty => Err(SigError::Duplicate {
                what: "instance variable".into(),
                name: format!("{}#{name}", decl.name),
            }),
            Some(_) => Ok(()),
            None => {
                self.nodes[node.0].instance_variables.insert(
                    name.to_string(),
                    InstanceVariableDef {
                        name: name.to_string(),
                        ty,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn add_method_alias(&mut self, node: NodeId, alias: MethodAlias) -> Result<()> {
        let decl = &self.nodes[node.0];
        if decl.is_interface() && alias.scope == MemberScope::Singleton {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("interfaces cannot alias singleton method `{}`", alias.new_name),
            ));
        }
        if alias.new_name == alias.old_name {
            return Err(SigError::invalid_member(
                &decl.name,
                format!("`{}` is aliased to itself", alias.new_name),
            ));
        }
        let duplicate = decl.method_aliases.iter().any(|a| {
            a.scope == alias.scope && a.new_name == alias.new_name && a.old_name == alias.old_name
        });
        if !duplicate {
            self.nodes[node.0].method_aliases.push(alias);
        }
        Ok(())
    }

    pub fn add_location(&mut self, node: NodeId, location: Location) {
        let locations = &mut self.nodes[node.0].locations;
        if !locations.contains(&location) {
            locations.push(location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> QualifiedName {
        QualifiedName::parse(text)
    }

    fn sig(ret: &str) -> MethodSignature {
        MethodSignature::new(vec![], TypeExpr::nominal(ret, vec![]))
    }

    #[test]
    fn test_declare_is_idempotent() {
        let mut graph = DeclarationGraph::new();
        let a = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        let b = graph.declare(DeclKind::Class, &name("::Foo"), vec![]).unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(a).name.to_string(), "::Foo");
    }

    #[test]
    fn test_declare_kind_conflict_leaves_graph_unchanged() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        let err = graph.declare(DeclKind::Module, &name("Foo"), vec![]).unwrap_err();
        assert!(matches!(err, SigError::KindConflict { .. }));
        assert_eq!(graph.node(id).kind, DeclKind::Class);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_declare_creates_implicit_parents_and_upgrades() {
        let mut graph = DeclarationGraph::new();
        let inner = graph.declare(DeclKind::Class, &name("A::B::C"), vec![]).unwrap();
        assert_eq!(graph.len(), 3);
        let a = graph.lookup(&name("A")).unwrap();
        assert!(graph.node(a).implicit);
        assert_eq!(graph.node(a).kind, DeclKind::Module);
        assert_eq!(graph.node(inner).parent, graph.lookup(&name("A::B")));

        let upgraded = graph.declare(DeclKind::Class, &name("A"), vec![]).unwrap();
        assert_eq!(upgraded, a);
        assert!(!graph.node(a).implicit);
        assert_eq!(graph.node(a).kind, DeclKind::Class);
    }

    #[test]
    fn test_declare_type_param_mismatch() {
        let mut graph = DeclarationGraph::new();
        graph
            .declare(DeclKind::Class, &name("Box"), vec![TypeParam::invariant("T")])
            .unwrap();
        assert!(graph.declare(DeclKind::Class, &name("Box"), vec![]).is_ok());
        let err = graph
            .declare(DeclKind::Class, &name("Box"), vec![TypeParam::invariant("U")])
            .unwrap_err();
        assert!(matches!(err, SigError::TypeParamMismatch { .. }));
    }

    #[test]
    fn test_add_member_appends_and_dedups() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        let key = MemberKey::public("bar", MemberScope::Instance);
        graph.add_member(id, key.clone(), Overload::new(sig("Integer"), vec![id])).unwrap();
        graph.add_member(id, key.clone(), Overload::new(sig("Integer"), vec![id])).unwrap();
        graph.add_member(id, key, Overload::new(sig("String"), vec![id])).unwrap();
        let entry = graph.node(id).method(MemberScope::Instance, "bar").unwrap();
        assert_eq!(entry.overloads.len(), 2);
    }

    #[test]
    fn test_add_member_last_visibility_wins() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        graph
            .add_member(
                id,
                MemberKey::public("bar", MemberScope::Instance),
                Overload::new(sig("Integer"), vec![]),
            )
            .unwrap();
        graph
            .add_member(
                id,
                MemberKey::new("bar", MemberScope::Instance, Visibility::Private),
                Overload::new(sig("String"), vec![]),
            )
            .unwrap();
        let entry = graph.node(id).method(MemberScope::Instance, "bar").unwrap();
        assert_eq!(entry.visibility, Visibility::Private);
        assert_eq!(graph.node(id).members.len(), 1);
    }

    #[test]
    fn test_redefine_member_replaces() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        let key = MemberKey::public("bar", MemberScope::Instance);
        graph.add_member(id, key.clone(), Overload::new(sig("Integer"), vec![])).unwrap();
        graph
            .redefine_member(id, key, vec![Overload::new(sig("String"), vec![])])
            .unwrap();
        let entry = graph.node(id).method(MemberScope::Instance, "bar").unwrap();
        assert_eq!(entry.overloads.len(), 1);
        assert_eq!(entry.overloads[0].signature, sig("String"));
    }

    #[test]
    fn test_interface_rejects_singleton_members() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Interface, &name("_Each"), vec![]).unwrap();
        let err = graph
            .add_member(
                id,
                MemberKey::public("new", MemberScope::Singleton),
                Overload::new(sig("Integer"), vec![]),
            )
            .unwrap_err();
        assert!(matches!(err, SigError::InvalidMember { .. }));
        assert!(graph.node(id).members.is_empty());
    }

    #[test]
    fn test_add_mixin_validates_and_dedups() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        let mixin = Mixin {
            relation: MixinRelation::Include,
            target: TypeRef::new(TypeExpr::nominal("Comparable", vec![]), vec![id]),
        };
        graph.add_mixin(id, mixin.clone()).unwrap();
        graph.add_mixin(id, mixin).unwrap();
        assert_eq!(graph.node(id).mixins.len(), 1);

        let bad = Mixin {
            relation: MixinRelation::Include,
            target: TypeRef::new(TypeExpr::untyped(), vec![]),
        };
        assert!(matches!(graph.add_mixin(id, bad), Err(SigError::InvalidMixin { .. })));
    }

    #[test]
    fn test_set_superclass_conflict() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Class, &name("Foo"), vec![]).unwrap();
        graph
            .set_superclass(id, TypeRef::new(TypeExpr::nominal("Bar", vec![]), vec![]))
            .unwrap();
        graph
            .set_superclass(id, TypeRef::new(TypeExpr::nominal("Bar", vec![]), vec![]))
            .unwrap();
        let err = graph
            .set_superclass(id, TypeRef::new(TypeExpr::nominal("Baz", vec![]), vec![]))
            .unwrap_err();
        assert!(matches!(err, SigError::SuperclassConflict { .. }));

        let module = graph.declare(DeclKind::Module, &name("M"), vec![]).unwrap();
        assert!(matches!(
            graph.set_superclass(module, TypeRef::new(TypeExpr::nominal("Bar", vec![]), vec![])),
            Err(SigError::InvalidSuperclass { .. })
        ));
    }

    #[test]
    fn test_constants_and_aliases_in_namespaces() {
        let mut graph = DeclarationGraph::new();
        let id = graph.declare(DeclKind::Module, &name("File"), vec![]).unwrap();
        let string = TypeRef::new(TypeExpr::nominal("String", vec![]), vec![id]);
        graph.add_constant(Some(id), "SEPARATOR", string).unwrap();
        let symbol = TypeRef::new(TypeExpr::nominal("Symbol", vec![]), vec![id]);
        assert!(graph.add_constant(Some(id), "SEPARATOR", symbol).is_err());
        let integer = TypeRef::new(TypeExpr::nominal("Integer", vec![]), vec![]);
        graph.add_type_alias(None, "int", vec![], integer).unwrap();
        assert_eq!(
            graph.namespace(Some(id)).constants["SEPARATOR"].name.to_string(),
            "::File::SEPARATOR"
        );
        assert!(graph.root().type_aliases.contains_key("int"));
    }

    #[test]
    fn test_constant_and_declaration_collide() {
        let mut graph = DeclarationGraph::new();
        graph
            .add_constant(None, "Foo", TypeRef::new(TypeExpr::untyped(), vec![]))
            .unwrap();
        assert!(matches!(
            graph.declare(DeclKind::Class, &name("Foo"), vec![]),
            Err(SigError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_constant_blocks_implicit_namespace() {
        let mut graph = DeclarationGraph::new();
        graph
            .add_constant(None, "A", TypeRef::new(TypeExpr::untyped(), vec![]))
            .unwrap();
        let err = graph.declare(DeclKind::Class, &name("A::B"), vec![]).unwrap_err();
        assert!(matches!(err, SigError::Duplicate { ref name, .. } if name == "::A"));
        assert!(graph.is_empty());

        let outer = graph.declare(DeclKind::Module, &name("Outer"), vec![]).unwrap();
        graph
            .add_constant(Some(outer), "Inner", TypeRef::new(TypeExpr::untyped(), vec![]))
            .unwrap();
        assert!(graph.declare(DeclKind::Class, &name("Outer::Inner::Leaf"), vec![]).is_err());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_interface_cannot_own_declarations() {
        let mut graph = DeclarationGraph::new();
        graph.declare(DeclKind::Interface, &name("_Each"), vec![]).unwrap();
        assert!(graph.declare(DeclKind::Class, &name("_Each::Foo"), vec![]).is_err());
    }
}
