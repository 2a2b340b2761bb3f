//! Type variable substitution

use std::collections::HashMap;

use crate::ast::{MethodSignature, SpecialType, TypeExpr, TypeParam};

/// Mapping from generic parameters (and optionally `self`, `instance`,
/// `class`) to concrete types
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    vars: HashMap<String, TypeExpr>,
    self_ty: Option<TypeExpr>,
    instance_ty: Option<TypeExpr>,
    class_ty: Option<TypeExpr>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `params` with `args` positionally; missing arguments are `untyped`
    pub fn from_params(params: &[TypeParam], args: &[TypeExpr]) -> Self {
        let mut subst = Self::new();
        for (i, param) in params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or_else(TypeExpr::untyped);
            subst.insert(param.name.clone(), arg);
        }
        subst
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: TypeExpr) {
        self.vars.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&TypeExpr> {
        self.vars.get(name)
    }

    pub fn with_self(mut self, ty: TypeExpr) -> Self {
        self.self_ty = Some(ty);
        self
    }

    pub fn with_instance(mut self, ty: TypeExpr) -> Self {
        self.instance_ty = Some(ty);
        self
    }

    pub fn with_class(mut self, ty: TypeExpr) -> Self {
        self.class_ty = Some(ty);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
            && self.self_ty.is_none()
            && self.instance_ty.is_none()
            && self.class_ty.is_none()
    }

    pub fn apply(&self, ty: &TypeExpr) -> TypeExpr {
        if self.is_empty() {
            return ty.clone();
        }
        ty.map_types(&mut |t| match t {
            TypeExpr::Variable(name) => self.vars.get(name).cloned(),
            TypeExpr::Special(SpecialType::SelfType) => self.self_ty.clone(),
            TypeExpr::Special(SpecialType::Instance) => self.instance_ty.clone(),
            TypeExpr::Special(SpecialType::Class) => self.class_ty.clone(),
            TypeExpr::Proc(sig) => Some(TypeExpr::Proc(Box::new(self.apply_signature(sig)))),
            _ => None,
        })
    }

    /// Apply to every type in `sig`. The signature's own type parameters
    /// shadow outer variables of the same name.
    pub fn apply_signature(&self, sig: &MethodSignature) -> MethodSignature {
        if sig.type_params.iter().any(|p| self.vars.contains_key(&p.name)) {
            let mut inner = self.clone();
            for param in &sig.type_params {
                inner.vars.remove(&param.name);
            }
            return sig.map_types(&mut |t| Some(inner.apply(t)));
        }
        sig.map_types(&mut |t| Some(self.apply(t)))
    }
}
