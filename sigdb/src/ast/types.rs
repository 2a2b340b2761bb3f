//! Type expression AST nodes

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::method::MethodSignature;
use super::name::QualifiedName;
use crate::util::with_stack;

/// Type expression
///
/// Values are immutable and compared structurally: two expressions with the
/// same shape are interchangeable for every query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Class or module instance type, `Array[Integer]`
    Nominal { name: QualifiedName, args: Vec<TypeExpr> },
    /// Structural contract reference, `_ToS`
    Interface { name: QualifiedName, args: Vec<TypeExpr> },
    /// Reference to a `type name = ...` declaration
    Alias { name: QualifiedName, args: Vec<TypeExpr> },
    /// Class object, `singleton(Integer)`
    Singleton(QualifiedName),
    /// Generic parameter in scope
    Variable(String),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    /// `T?`, sugar for `T | nil`
    Optional(Box<TypeExpr>),
    Literal(Literal),
    Tuple(Vec<TypeExpr>),
    Record(BTreeMap<String, TypeExpr>),
    Special(SpecialType),
    /// `^(Integer) -> String`
    Proc(Box<MethodSignature>),
}

/// Literal singleton types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    String(String),
    Symbol(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialType {
    SelfType,
    Instance,
    Class,
    Void,
    Untyped,
    Bool,
    Nil,
    Top,
    Bottom,
}

impl SpecialType {
    pub fn keyword(self) -> &'static str {
        match self {
            SpecialType::SelfType => "self",
            SpecialType::Instance => "instance",
            SpecialType::Class => "class",
            SpecialType::Void => "void",
            SpecialType::Untyped => "untyped",
            SpecialType::Bool => "bool",
            SpecialType::Nil => "nil",
            SpecialType::Top => "top",
            SpecialType::Bottom => "bot",
        }
    }
}

/// Declared variance of a generic parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Variance {
    /// `out T`
    Covariant,
    /// `in T`
    Contravariant,
    #[default]
    Invariant,
}

impl fmt::Display for Variance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variance::Covariant => write!(f, "covariant"),
            Variance::Contravariant => write!(f, "contravariant"),
            Variance::Invariant => write!(f, "invariant"),
        }
    }
}

/// Generic parameter declaration, `unchecked out T < Comparable`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub variance: Variance,
    /// Skips variance validation
    pub unchecked: bool,
    pub upper_bound: Option<TypeExpr>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>, variance: Variance) -> Self {
        Self {
            name: name.into(),
            variance,
            unchecked: false,
            upper_bound: None,
        }
    }

    pub fn invariant(name: impl Into<String>) -> Self {
        Self::new(name, Variance::Invariant)
    }
}

impl TypeExpr {
    /// Nominal type from a `::`-separated name
    pub fn nominal(name: &str, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Nominal {
            name: QualifiedName::parse(name),
            args,
        }
    }

    pub fn interface(name: &str, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Interface {
            name: QualifiedName::parse(name),
            args,
        }
    }

    pub fn untyped() -> Self {
        TypeExpr::Special(SpecialType::Untyped)
    }

    pub fn nil() -> Self {
        TypeExpr::Special(SpecialType::Nil)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, TypeExpr::Special(SpecialType::Untyped))
    }

    /// Union constructor: flattens nested unions and drops duplicates,
    /// keeping first occurrences in order.
    pub fn union(members: Vec<TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for member in members {
            match member {
                TypeExpr::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => TypeExpr::Special(SpecialType::Bottom),
            1 => flat.remove(0),
            _ => TypeExpr::Union(flat),
        }
    }

    /// `T?` as `T | nil`; other expressions unchanged
    pub fn desugar_optional(&self) -> TypeExpr {
        match self {
            TypeExpr::Optional(inner) => TypeExpr::union(vec![(**inner).clone(), TypeExpr::nil()]),
            other => other.clone(),
        }
    }

    /// The name carried by nominal, interface, alias and singleton types
    pub fn type_name(&self) -> Option<&QualifiedName> {
        match self {
            TypeExpr::Nominal { name, .. }
            | TypeExpr::Interface { name, .. }
            | TypeExpr::Alias { name, .. }
            | TypeExpr::Singleton(name) => Some(name),
            _ => None,
        }
    }

    /// Rebuild the tree bottom-up. `f` is asked first at each node; a
    /// `Some` replacement is used as-is and its children are not visited.
    pub fn map_types(&self, f: &mut dyn FnMut(&TypeExpr) -> Option<TypeExpr>) -> TypeExpr {
        with_stack(|| {
            if let Some(replaced) = f(self) {
                return replaced;
            }
            match self {
                TypeExpr::Nominal { name, args } => TypeExpr::Nominal {
                    name: name.clone(),
                    args: map_all(args, &mut *f),
                },
                TypeExpr::Interface { name, args } => TypeExpr::Interface {
                    name: name.clone(),
                    args: map_all(args, &mut *f),
                },
                TypeExpr::Alias { name, args } => TypeExpr::Alias {
                    name: name.clone(),
                    args: map_all(args, &mut *f),
                },
                TypeExpr::Union(members) => TypeExpr::Union(map_all(members, &mut *f)),
                TypeExpr::Intersection(members) => TypeExpr::Intersection(map_all(members, &mut *f)),
                TypeExpr::Tuple(elements) => TypeExpr::Tuple(map_all(elements, &mut *f)),
                TypeExpr::Optional(inner) => TypeExpr::Optional(Box::new(inner.map_types(&mut *f))),
                TypeExpr::Record(fields) => TypeExpr::Record(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), v.map_types(&mut *f)))
                        .collect(),
                ),
                TypeExpr::Proc(sig) => TypeExpr::Proc(Box::new(sig.map_types(&mut *f))),
                TypeExpr::Singleton(_)
                | TypeExpr::Variable(_)
                | TypeExpr::Literal(_)
                | TypeExpr::Special(_) => self.clone(),
            }
        })
    }

    /// Pre-order visit of every sub-expression, including proc signatures
    pub fn walk(&self, f: &mut dyn FnMut(&TypeExpr)) {
        with_stack(|| {
            f(self);
            match self {
                TypeExpr::Nominal { args, .. }
                | TypeExpr::Interface { args, .. }
                | TypeExpr::Alias { args, .. }
                | TypeExpr::Union(args)
                | TypeExpr::Intersection(args)
                | TypeExpr::Tuple(args) => {
                    for arg in args {
                        arg.walk(&mut *f);
                    }
                }
                TypeExpr::Optional(inner) => inner.walk(&mut *f),
                TypeExpr::Record(fields) => {
                    for value in fields.values() {
                        value.walk(&mut *f);
                    }
                }
                TypeExpr::Proc(sig) => sig.walk_types(&mut *f),
                TypeExpr::Singleton(_)
                | TypeExpr::Variable(_)
                | TypeExpr::Literal(_)
                | TypeExpr::Special(_) => {}
            }
        })
    }
}

fn map_all(items: &[TypeExpr], f: &mut dyn FnMut(&TypeExpr) -> Option<TypeExpr>) -> Vec<TypeExpr> {
    items.iter().map(|t| t.map_types(&mut *f)).collect()
}

/// Union members that need parentheses inside `&` or before `?`
fn needs_parens(ty: &TypeExpr) -> bool {
    matches!(
        ty,
        TypeExpr::Union(_) | TypeExpr::Intersection(_) | TypeExpr::Proc(_)
    )
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[TypeExpr]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    write!(f, "[")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, "]")
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Nominal { name, args }
            | TypeExpr::Interface { name, args }
            | TypeExpr::Alias { name, args } => {
                write!(f, "{name}")?;
                write_args(f, args)
            }
            TypeExpr::Singleton(name) => write!(f, "singleton({name})"),
            TypeExpr::Variable(name) => write!(f, "{name}"),
            TypeExpr::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    match member {
                        TypeExpr::Union(_) => write!(f, "({member})")?,
                        _ => write!(f, "{member}")?,
                    }
                }
                Ok(())
            }
            TypeExpr::Intersection(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    if needs_parens(member) {
                        write!(f, "({member})")?;
                    } else {
                        write!(f, "{member}")?;
                    }
                }
                Ok(())
            }
            TypeExpr::Optional(inner) => {
                if needs_parens(inner) || matches!(**inner, TypeExpr::Optional(_)) {
                    write!(f, "({inner})?")
                } else {
                    write!(f, "{inner}?")
                }
            }
            TypeExpr::Literal(lit) => write!(f, "{lit}"),
            TypeExpr::Tuple(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            TypeExpr::Record(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{ }}");
                }
                write!(f, "{{ ")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, " }}")
            }
            TypeExpr::Special(special) => write!(f, "{}", special.keyword()),
            TypeExpr::Proc(sig) => write!(f, "^{sig}"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "{}", quote_literal(s)),
            Literal::Symbol(s) if is_plain_symbol(s) => write!(f, ":{s}"),
            Literal::Symbol(s) => write!(f, ":{}", quote_literal(s)),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Double-quoted literal using only the escapes the lexer resolves
pub(crate) fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// `:name`, `:name?`, `:name!` or `:name=` without quotes
fn is_plain_symbol(text: &str) -> bool {
    let body = text.strip_suffix(['?', '!', '=']).unwrap_or(text);
    let mut chars = body.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unchecked {
            write!(f, "unchecked ")?;
        }
        match self.variance {
            Variance::Covariant => write!(f, "out ")?,
            Variance::Contravariant => write!(f, "in ")?,
            Variance::Invariant => {}
        }
        write!(f, "{}", self.name)?;
        if let Some(bound) = &self.upper_bound {
            write!(f, " < {bound}")?;
        }
        Ok(())
    }
}

/// `[out T, in U]`, empty string for no parameters
pub fn format_type_params(params: &[TypeParam]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let inner: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(", "))
}
