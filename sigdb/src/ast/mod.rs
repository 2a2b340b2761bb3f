//! Abstract Syntax Tree definitions

mod method;
mod name;
mod span;
mod types;

pub use method::*;
pub use name::*;
pub use span::*;
pub use types::*;

use std::fmt;

use serde::{Deserialize, Serialize};

/// A declaration file is a sequence of top-level declarations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signature {
    pub decls: Vec<Decl>,
}

/// Top-level or nested declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Class(ClassDecl),
    Module(ModuleDecl),
    Interface(InterfaceDecl),
    TypeAlias(TypeAliasDecl),
    Constant(ConstantDecl),
    Global(GlobalDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Class(d) => d.span,
            Decl::Module(d) => d.span,
            Decl::Interface(d) => d.span,
            Decl::TypeAlias(d) => d.span,
            Decl::Constant(d) => d.span,
            Decl::Global(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Class,
    Module,
    Interface,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Class => write!(f, "class"),
            DeclKind::Module => write!(f, "module"),
            DeclKind::Interface => write!(f, "interface"),
        }
    }
}

/// `class Foo[T] < Bar[T] ... end`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: Spanned<QualifiedName>,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<Spanned<TypeExpr>>,
    pub members: Vec<Member>,
    pub span: Span,
}

/// `module Foo[T] : _Each[T] ... end`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub name: Spanned<QualifiedName>,
    pub type_params: Vec<TypeParam>,
    pub self_types: Vec<Spanned<TypeExpr>>,
    pub members: Vec<Member>,
    pub span: Span,
}

/// `interface _Foo[T] ... end`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: Spanned<QualifiedName>,
    pub type_params: Vec<TypeParam>,
    pub members: Vec<Member>,
    pub span: Span,
}

/// `type name[T] = ...`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeAliasDecl {
    pub name: Spanned<QualifiedName>,
    pub type_params: Vec<TypeParam>,
    pub ty: Spanned<TypeExpr>,
    pub span: Span,
}

/// `VERSION: String`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub name: Spanned<QualifiedName>,
    pub ty: Spanned<TypeExpr>,
    pub span: Span,
}

/// `$stdout: IO`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalDecl {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MixinRelation {
    Include,
    Extend,
    Prepend,
}

impl fmt::Display for MixinRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixinRelation::Include => write!(f, "include"),
            MixinRelation::Extend => write!(f, "extend"),
            MixinRelation::Prepend => write!(f, "prepend"),
        }
    }
}

/// Receiver side of a `def`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// `def foo`
    Instance,
    /// `def self.foo`
    Singleton,
    /// `def self?.foo`: public singleton plus private instance method
    SingletonInstance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Reader,
    Writer,
    Accessor,
}

impl AttributeKind {
    pub fn has_reader(self) -> bool {
        matches!(self, AttributeKind::Reader | AttributeKind::Accessor)
    }

    pub fn has_writer(self) -> bool {
        matches!(self, AttributeKind::Writer | AttributeKind::Accessor)
    }
}

/// `%a{...}` annotation text (without the delimiters)
pub type Annotation = Spanned<String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: Spanned<String>,
    pub kind: MethodKind,
    /// Modifier form, `private def foo`
    pub visibility: Option<Visibility>,
    pub overloads: Vec<Spanned<MethodSignature>>,
    /// Trailing `| ...`: the overloads extend an existing definition
    pub overloading: bool,
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

impl MethodDef {
    pub fn has_annotation(&self, text: &str) -> bool {
        self.annotations.iter().any(|a| a.node.trim() == text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixinDecl {
    pub relation: MixinRelation,
    pub target: Spanned<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub kind: AttributeKind,
    pub name: Spanned<String>,
    pub singleton: bool,
    pub visibility: Option<Visibility>,
    pub ty: Spanned<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceVariableDecl {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
    pub span: Span,
}

/// `alias new old` or `alias self.new self.old`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDecl {
    pub new_name: Spanned<String>,
    pub old_name: Spanned<String>,
    pub singleton: bool,
    pub span: Span,
}

/// Body item of a class, module or interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Method(MethodDef),
    Mixin(MixinDecl),
    Attribute(AttributeDecl),
    InstanceVariable(InstanceVariableDecl),
    Alias(AliasDecl),
    /// Bare `private` / `public` section marker
    Visibility(Spanned<Visibility>),
    Decl(Decl),
}

impl Member {
    pub fn span(&self) -> Span {
        match self {
            Member::Method(m) => m.span,
            Member::Mixin(m) => m.span,
            Member::Attribute(a) => a.span,
            Member::InstanceVariable(v) => v.span,
            Member::Alias(a) => a.span,
            Member::Visibility(v) => v.span,
            Member::Decl(d) => d.span(),
        }
    }
}
