//! Method signature AST nodes

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{format_type_params, TypeExpr, TypeParam};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// `Integer x`; a required parameter after the rest parameter is a trailing one
    Required,
    /// `?Integer x`
    Optional,
    /// `*Integer xs`
    Rest,
    /// `key: Integer`
    KeywordRequired,
    /// `?key: Integer`
    KeywordOptional,
    /// `**Integer opts`
    KeywordRest,
}

impl ParamKind {
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            ParamKind::KeywordRequired | ParamKind::KeywordOptional | ParamKind::KeywordRest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub kind: ParamKind,
}

impl Param {
    pub fn new(kind: ParamKind, ty: TypeExpr) -> Self {
        Self { name: None, ty, kind }
    }

    pub fn named(kind: ParamKind, name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            kind,
        }
    }

    pub fn required(ty: TypeExpr) -> Self {
        Self::new(ParamKind::Required, ty)
    }
}

/// Block parameter, `{ (T) -> void }` or `?{ ... }`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub signature: Box<MethodSignature>,
    pub required: bool,
}

/// One overload of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Method-level generics, `[U] (U) -> U`
    pub type_params: Vec<TypeParam>,
    pub positional: Vec<Param>,
    pub keyword: Vec<Param>,
    pub return_type: TypeExpr,
    pub block: Option<Block>,
}

impl MethodSignature {
    pub fn new(positional: Vec<Param>, return_type: TypeExpr) -> Self {
        Self {
            type_params: Vec::new(),
            positional,
            keyword: Vec::new(),
            return_type,
            block: None,
        }
    }

    pub fn with_keywords(mut self, keyword: Vec<Param>) -> Self {
        self.keyword = keyword;
        self
    }

    pub fn with_block(mut self, signature: MethodSignature, required: bool) -> Self {
        self.block = Some(Block {
            signature: Box::new(signature),
            required,
        });
        self
    }

    /// `(min, max)` positional arguments; `None` max means unbounded
    pub fn arity_range(&self) -> (usize, Option<usize>) {
        let mut min = 0;
        let mut optional = 0;
        let mut rest = false;
        for param in &self.positional {
            match param.kind {
                ParamKind::Required => min += 1,
                ParamKind::Optional => optional += 1,
                ParamKind::Rest => rest = true,
                _ => {}
            }
        }
        (min, if rest { None } else { Some(min + optional) })
    }

    pub fn accepts_keyword(&self, name: &str) -> bool {
        self.keyword.iter().any(|param| {
            param.kind == ParamKind::KeywordRest || param.name.as_deref() == Some(name)
        })
    }

    pub fn keyword_param(&self, name: &str) -> Option<&Param> {
        self.keyword
            .iter()
            .find(|param| param.kind != ParamKind::KeywordRest && param.name.as_deref() == Some(name))
            .or_else(|| self.keyword.iter().find(|param| param.kind == ParamKind::KeywordRest))
    }

    pub fn required_keywords(&self) -> impl Iterator<Item = &Param> {
        self.keyword
            .iter()
            .filter(|param| param.kind == ParamKind::KeywordRequired)
    }

    pub fn rest_param(&self) -> Option<&Param> {
        self.positional.iter().find(|param| param.kind == ParamKind::Rest)
    }

    /// Parameters before the rest parameter (all of them without one)
    pub fn leading_params(&self) -> &[Param] {
        let end = self
            .positional
            .iter()
            .position(|param| param.kind == ParamKind::Rest)
            .unwrap_or(self.positional.len());
        &self.positional[..end]
    }

    /// Required parameters after the rest parameter
    pub fn trailing_params(&self) -> &[Param] {
        match self.positional.iter().position(|param| param.kind == ParamKind::Rest) {
            Some(rest) => &self.positional[rest + 1..],
            None => &[],
        }
    }

    /// Type expected at a positional index, counting from the first argument
    pub fn positional_type(&self, index: usize) -> Option<&TypeExpr> {
        let leading = self.leading_params();
        match leading.get(index) {
            Some(param) => Some(&param.ty),
            None => self.rest_param().map(|param| &param.ty),
        }
    }

    pub fn map_types(&self, f: &mut dyn FnMut(&TypeExpr) -> Option<TypeExpr>) -> MethodSignature {
        let map_params = |params: &[Param], f: &mut dyn FnMut(&TypeExpr) -> Option<TypeExpr>| -> Vec<Param> {
            params
                .iter()
                .map(|param| Param {
                    name: param.name.clone(),
                    ty: param.ty.map_types(&mut *f),
                    kind: param.kind,
                })
                .collect()
        };
        MethodSignature {
            type_params: self.type_params.clone(),
            positional: map_params(&self.positional, &mut *f),
            keyword: map_params(&self.keyword, &mut *f),
            return_type: self.return_type.map_types(&mut *f),
            block: self.block.as_ref().map(|block| Block {
                signature: Box::new(block.signature.map_types(&mut *f)),
                required: block.required,
            }),
        }
    }

    pub fn walk_types(&self, f: &mut dyn FnMut(&TypeExpr)) {
        for param in self.positional.iter().chain(self.keyword.iter()) {
            param.ty.walk(&mut *f);
        }
        self.return_type.walk(&mut *f);
        if let Some(block) = &self.block {
            block.signature.walk_types(f);
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref();
        match self.kind {
            ParamKind::Required => write!(f, "{}", self.ty)?,
            ParamKind::Optional => write!(f, "?{}", self.ty)?,
            ParamKind::Rest => write!(f, "*{}", self.ty)?,
            ParamKind::KeywordRest => write!(f, "**{}", self.ty)?,
            ParamKind::KeywordRequired => {
                return write!(f, "{}: {}", name.unwrap_or("_"), self.ty);
            }
            ParamKind::KeywordOptional => {
                return write!(f, "?{}: {}", name.unwrap_or("_"), self.ty);
            }
        }
        if let Some(name) = name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

fn write_return(f: &mut fmt::Formatter<'_>, ty: &TypeExpr) -> fmt::Result {
    match ty {
        TypeExpr::Union(_) | TypeExpr::Intersection(_) => write!(f, "({ty})"),
        _ => write!(f, "{ty}"),
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, sig: &MethodSignature) -> fmt::Result {
    write!(f, "(")?;
    for (i, param) in sig.positional.iter().chain(sig.keyword.iter()).enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{param}")?;
    }
    write!(f, ")")
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_params = format_type_params(&self.type_params);
        if !type_params.is_empty() {
            write!(f, "{type_params} ")?;
        }
        write_params(f, self)?;
        if let Some(block) = &self.block {
            if !block.required {
                write!(f, " ?")?;
            } else {
                write!(f, " ")?;
            }
            write!(f, "{{ ")?;
            write_params(f, &block.signature)?;
            write!(f, " -> ")?;
            write_return(f, &block.signature.return_type)?;
            write!(f, " }}")?;
        }
        write!(f, " -> ")?;
        write_return(f, &self.return_type)
    }
}
