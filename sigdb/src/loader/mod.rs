//! Populate a [`DeclarationGraph`] from parsed declaration files
//!
//! Loading is batch oriented: a declaration that fails validation is reported
//! as a [`Diagnostic`] and skipped, and loading continues with the next one.
//! A lexer or parser error is fatal to its file only.

use crate::ast::{
    AliasDecl, AttributeDecl, ClassDecl, ConstantDecl, Decl, DeclKind, GlobalDecl, InterfaceDecl,
    Location, Member, MethodDef, MethodKind, MethodSignature, MixinDecl, ModuleDecl, Param,
    ParamKind, QualifiedName, Signature, Span, TypeAliasDecl, TypeExpr, TypeParam, Visibility,
};
use crate::error::{Diagnostic, Result, SigError};
use crate::graph::{
    AttributeDef, DeclarationGraph, MemberKey, MemberScope, MethodAlias, Mixin, NodeId, Overload,
    TypeRef,
};
use crate::lexer::tokenize;
use crate::parser::parse;

/// Annotation that replaces every earlier overload of a method
const REDEFINE: &str = "redefine";

/// Tokenize, parse and load one declaration file
pub fn load_source(graph: &mut DeclarationGraph, file: &str, source: &str) -> Vec<Diagnostic> {
    let signature = match tokenize(source).and_then(|tokens| parse(file, source, tokens)) {
        Ok(signature) => signature,
        Err(error) => {
            tracing::debug!(file, %error, "declaration file rejected");
            let location = error.span().map(|span| Location::new(file, span));
            return vec![Diagnostic::new(error, location)];
        }
    };
    load_signature(graph, file, &signature)
}

/// Load an already parsed file
pub fn load_signature(
    graph: &mut DeclarationGraph,
    file: &str,
    signature: &Signature,
) -> Vec<Diagnostic> {
    let mut loader = Loader::new(graph, file);
    for decl in &signature.decls {
        loader.load_decl(decl, &[]);
    }
    tracing::debug!(
        file,
        decls = signature.decls.len(),
        diagnostics = loader.diagnostics.len(),
        "loaded declaration file"
    );
    loader.diagnostics
}

/// Per-file loading state
struct Loader<'a> {
    graph: &'a mut DeclarationGraph,
    file: &'a str,
    diagnostics: Vec<Diagnostic>,
}

/// Body context shared by the members of one declaration
struct Body<'n> {
    node: NodeId,
    kind: DeclKind,
    /// Enclosing nesting including `node`
    nesting: &'n [NodeId],
}

impl<'a> Loader<'a> {
    fn new(graph: &'a mut DeclarationGraph, file: &'a str) -> Self {
        Self {
            graph,
            file,
            diagnostics: Vec::new(),
        }
    }

    fn location(&self, span: Span) -> Location {
        Location::new(self.file, span)
    }

    fn report(&mut self, error: SigError, span: Span) {
        tracing::debug!(file = self.file, %error, "declaration skipped");
        self.diagnostics.push(Diagnostic::at(error, self.file, span));
    }

    /// Record the error of `result` at `span`
    fn check(&mut self, result: Result<()>, span: Span) {
        if let Err(error) = result {
            self.report(error, span);
        }
    }

    fn owner(nesting: &[NodeId]) -> Option<NodeId> {
        nesting.last().copied()
    }

    /// Absolute name of a declaration written as `name` inside `nesting`
    fn declared_name(&self, name: &QualifiedName, nesting: &[NodeId]) -> QualifiedName {
        if name.absolute {
            return name.clone();
        }
        match Self::owner(nesting) {
            Some(owner) => self.graph.node(owner).name.join(name),
            None => name.to_absolute(),
        }
    }

    /// Owning namespace of a possibly qualified constant or alias name
    fn value_owner(&self, name: &QualifiedName, nesting: &[NodeId]) -> Result<Option<NodeId>> {
        if !name.is_qualified() {
            return Ok(if name.absolute { None } else { Self::owner(nesting) });
        }
        let declared = self.declared_name(name, nesting);
        let Some(parent) = declared.parent() else {
            return Ok(None);
        };
        self.graph
            .lookup(&parent)
            .map(Some)
            .ok_or_else(|| SigError::unresolved("namespace", &parent, String::new()))
    }

    fn load_decl(&mut self, decl: &Decl, nesting: &[NodeId]) {
        match decl {
            Decl::Class(class) => self.load_class(class, nesting),
            Decl::Module(module) => self.load_module(module, nesting),
            Decl::Interface(interface) => self.load_interface(interface, nesting),
            Decl::TypeAlias(alias) => self.load_type_alias(alias, nesting),
            Decl::Constant(constant) => self.load_constant(constant, nesting),
            Decl::Global(global) => self.load_global(global, nesting),
        }
    }

    /// Declare (or reopen) a node and record where it was written
    fn open(
        &mut self,
        kind: DeclKind,
        name: &QualifiedName,
        type_params: &[TypeParam],
        nesting: &[NodeId],
        span: Span,
    ) -> Option<NodeId> {
        let absolute = self.declared_name(name, nesting);
        match self.graph.declare(kind, &absolute, type_params.to_vec()) {
            Ok(id) => {
                tracing::debug!(name = %absolute, %kind, "declared");
                let location = self.location(span);
                self.graph.add_location(id, location);
                Some(id)
            }
            Err(error) => {
                self.report(error, span);
                None
            }
        }
    }

    fn load_class(&mut self, class: &ClassDecl, nesting: &[NodeId]) {
        let Some(node) = self.open(
            DeclKind::Class,
            &class.name.node,
            &class.type_params,
            nesting,
            class.span,
        ) else {
            return;
        };
        if let Some(superclass) = &class.superclass {
            let target = TypeRef::new(superclass.node.clone(), nesting.to_vec())
                .at(self.location(superclass.span));
            let result = self.graph.set_superclass(node, target);
            self.check(result, superclass.span);
        }
        self.load_body(node, DeclKind::Class, &class.members, nesting);
    }

    fn load_module(&mut self, module: &ModuleDecl, nesting: &[NodeId]) {
        let Some(node) = self.open(
            DeclKind::Module,
            &module.name.node,
            &module.type_params,
            nesting,
            module.span,
        ) else {
            return;
        };
        for self_type in &module.self_types {
            let target = TypeRef::new(self_type.node.clone(), nesting.to_vec())
                .at(self.location(self_type.span));
            let result = self.graph.add_self_type(node, target);
            self.check(result, self_type.span);
        }
        self.load_body(node, DeclKind::Module, &module.members, nesting);
    }

    fn load_interface(&mut self, interface: &InterfaceDecl, nesting: &[NodeId]) {
        let Some(node) = self.open(
            DeclKind::Interface,
            &interface.name.node,
            &interface.type_params,
            nesting,
            interface.span,
        ) else {
            return;
        };
        self.load_body(node, DeclKind::Interface, &interface.members, nesting);
    }

    fn load_type_alias(&mut self, alias: &TypeAliasDecl, nesting: &[NodeId]) {
        let result = self.value_owner(&alias.name.node, nesting).and_then(|owner| {
            let ty = TypeRef::new(alias.ty.node.clone(), nesting.to_vec())
                .at(self.location(alias.ty.span));
            self.graph
                .add_type_alias(owner, &alias.name.node.name, alias.type_params.clone(), ty)
        });
        self.check(result, alias.span);
    }

    fn load_constant(&mut self, constant: &ConstantDecl, nesting: &[NodeId]) {
        let result = self.value_owner(&constant.name.node, nesting).and_then(|owner| {
            let ty = TypeRef::new(constant.ty.node.clone(), nesting.to_vec())
                .at(self.location(constant.ty.span));
            self.graph.add_constant(owner, &constant.name.node.name, ty)
        });
        self.check(result, constant.span);
    }

    fn load_global(&mut self, global: &GlobalDecl, nesting: &[NodeId]) {
        let ty = TypeRef::new(global.ty.node.clone(), nesting.to_vec())
            .at(self.location(global.ty.span));
        let result = self.graph.add_global(&global.name.node, ty);
        self.check(result, global.span);
    }

    fn load_body(&mut self, node: NodeId, kind: DeclKind, members: &[Member], outer: &[NodeId]) {
        let mut nesting = outer.to_vec();
        nesting.push(node);
        let body = Body {
            node,
            kind,
            nesting: &nesting,
        };

        let mut section = Visibility::Public;
        for member in members {
            match member {
                Member::Visibility(visibility) => {
                    if kind == DeclKind::Interface {
                        self.report(
                            SigError::invalid_member(
                                &self.graph.node(node).name,
                                format!("interfaces cannot declare `{}` sections", visibility.node),
                            ),
                            visibility.span,
                        );
                    } else {
                        section = visibility.node;
                    }
                }
                Member::Method(method) => self.load_method(&body, method, section),
                Member::Mixin(mixin) => self.load_mixin(&body, mixin),
                Member::Attribute(attribute) => self.load_attribute(&body, attribute, section),
                Member::InstanceVariable(ivar) => {
                    let ty = TypeRef::new(ivar.ty.node.clone(), nesting.clone())
                        .at(self.location(ivar.ty.span));
                    let result = self.graph.add_instance_variable(node, &ivar.name.node, ty);
                    self.check(result, ivar.span);
                }
                Member::Alias(alias) => self.load_alias(&body, alias),
                Member::Decl(decl) => self.load_decl(decl, &nesting),
            }
        }
    }

    fn overloads(&self, method: &MethodDef, nesting: &[NodeId]) -> Vec<Overload> {
        method
            .overloads
            .iter()
            .map(|sig| Overload::new(sig.node.clone(), nesting.to_vec()).at(self.location(sig.span)))
            .collect()
    }

    fn load_method(&mut self, body: &Body<'_>, method: &MethodDef, section: Visibility) {
        let name = &method.name.node;
        let overloads = self.overloads(method, body.nesting);
        if overloads.is_empty() && !method.overloading {
            let error = SigError::invalid_member(
                &self.graph.node(body.node).name,
                format!("method `{name}` has no signature"),
            );
            self.report(error, method.span);
            return;
        }

        let keys = match method.kind {
            MethodKind::Instance => {
                vec![MemberKey::new(
                    name,
                    MemberScope::Instance,
                    method.visibility.unwrap_or(section),
                )]
            }
            MethodKind::Singleton => vec![MemberKey::new(
                name,
                MemberScope::Singleton,
                method.visibility.unwrap_or(Visibility::Public),
            )],
            // module_function: public on the module, private when mixed in
            MethodKind::SingletonInstance => vec![
                MemberKey::public(name, MemberScope::Singleton),
                MemberKey::new(name, MemberScope::Instance, Visibility::Private),
            ],
        };
        let keys = if body.kind == DeclKind::Interface {
            keys.into_iter()
                .map(|key| MemberKey { visibility: Visibility::Public, ..key })
                .collect()
        } else {
            keys
        };

        let redefine = method.has_annotation(REDEFINE);
        for key in keys {
            tracing::trace!(
                owner = %self.graph.node(body.node).name,
                member = %key.member_name(),
                overloads = overloads.len(),
                redefine,
                "method"
            );
            let result = if redefine {
                self.graph.redefine_member(body.node, key, overloads.clone())
            } else if overloads.is_empty() {
                // `def foo: ...` alone: keep the earlier overloads, update visibility
                self.touch_member(body.node, key)
            } else {
                overloads
                    .iter()
                    .try_for_each(|o| self.graph.add_member(body.node, key.clone(), o.clone()))
            };
            self.check(result, method.span);
        }
    }

    /// Re-add the first existing overload so only the visibility changes
    fn touch_member(&mut self, node: NodeId, key: MemberKey) -> Result<()> {
        let existing = self
            .graph
            .node(node)
            .method(key.scope, &key.name)
            .and_then(|entry| entry.overloads.first().cloned());
        match existing {
            Some(overload) => self.graph.add_member(node, key, overload),
            None => Err(SigError::invalid_member(
                &self.graph.node(node).name,
                format!("`...` extends undefined method `{}`", key.name),
            )),
        }
    }

    fn load_mixin(&mut self, body: &Body<'_>, mixin: &MixinDecl) {
        let target = TypeRef::new(mixin.target.node.clone(), body.nesting.to_vec())
            .at(self.location(mixin.target.span));
        let result = self.graph.add_mixin(
            body.node,
            Mixin {
                relation: mixin.relation,
                target,
            },
        );
        self.check(result, mixin.span);
    }

    fn load_attribute(&mut self, body: &Body<'_>, attribute: &AttributeDecl, section: Visibility) {
        let name = &attribute.name.node;
        let scope = if attribute.singleton {
            MemberScope::Singleton
        } else {
            MemberScope::Instance
        };
        let visibility = match scope {
            MemberScope::Instance => attribute.visibility.unwrap_or(section),
            MemberScope::Singleton => attribute.visibility.unwrap_or(Visibility::Public),
        };
        let location = self.location(attribute.span);
        let ty = attribute.ty.node.clone();
        let def = AttributeDef {
            name: name.clone(),
            kind: attribute.kind,
            scope,
            visibility,
            ty: TypeRef::new(ty.clone(), body.nesting.to_vec()).at(location.clone()),
        };
        if let Err(error) = self.graph.add_attribute(body.node, def) {
            self.report(error, attribute.span);
            return;
        }

        let mut synthesized = Vec::new();
        if attribute.kind.has_reader() {
            synthesized.push((name.clone(), MethodSignature::new(Vec::new(), ty.clone())));
        }
        if attribute.kind.has_writer() {
            let param = Param::named(ParamKind::Required, name.clone(), ty.clone());
            synthesized.push((format!("{name}="), MethodSignature::new(vec![param], ty.clone())));
        }
        for (method, signature) in synthesized {
            let overload = Overload::new(signature, body.nesting.to_vec()).at(location.clone());
            let key = MemberKey::new(method, scope, visibility);
            let result = self.graph.add_member(body.node, key, overload);
            self.check(result, attribute.span);
        }

        let ivar_name = format!("@{name}");
        let ivar_known = self.graph.node(body.node).instance_variables.contains_key(&ivar_name);
        if scope == MemberScope::Instance && !ivar_known {
            let ivar = TypeRef::new(ty, body.nesting.to_vec()).at(location);
            let result = self.graph.add_instance_variable(body.node, &ivar_name, ivar);
            self.check(result, attribute.span);
        }
    }

    fn load_alias(&mut self, body: &Body<'_>, alias: &AliasDecl) {
        let scope = if alias.singleton {
            MemberScope::Singleton
        } else {
            MemberScope::Instance
        };
        let result = self.graph.add_method_alias(
            body.node,
            MethodAlias {
                new_name: alias.new_name.node.clone(),
                old_name: alias.old_name.node.clone(),
                scope,
                location: Some(self.location(alias.span)),
            },
        );
        self.check(result, alias.span);
    }
}

/// Instance type of a declared node, `Array[E]` for `class Array[E]`
pub fn self_type_of(graph: &DeclarationGraph, node: NodeId) -> TypeExpr {
    let decl = graph.node(node);
    let args = decl
        .type_params
        .iter()
        .map(|p| TypeExpr::Variable(p.name.clone()))
        .collect();
    if decl.is_interface() {
        TypeExpr::Interface {
            name: decl.name.clone(),
            args,
        }
    } else {
        TypeExpr::Nominal {
            name: decl.name.clone(),
            args,
        }
    }
}
