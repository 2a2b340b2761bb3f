//! Recursive-descent parser for declaration files
//!
//! Method names are context dependent (`empty?`, `[]=`, `def class:`), and
//! `|` means union inside a type but "next overload" after a method's return
//! type, so the grammar is parsed by hand over the logos token stream.

use crate::ast::*;
use crate::error::{Result, SigError};
use crate::lexer::{Token, tokenize};
use crate::util::with_stack;


/// Parse tokens into a declaration file AST
pub fn parse(_filename: &str, source: &str, tokens: Vec<(Token, Span)>) -> Result<Signature> {
    let mut parser = Parser::new(source, tokens);
    parser.signature()
}

/// Parse a standalone type expression, `Array[Integer] | nil`
pub fn parse_type(source: &str) -> Result<TypeExpr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    let ty = parser.ty()?;
    parser.expect_eof()?;
    Ok(ty)
}

/// Parse a standalone method type, `[T] (T) { (T) -> void } -> T`
pub fn parse_method_type(source: &str) -> Result<MethodSignature> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    let sig = parser.method_type()?;
    parser.expect_eof()?;
    Ok(sig)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Generic parameters in scope, innermost last
    type_vars: Vec<Vec<String>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<(Token, Span)>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            type_vars: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => Span::new(self.source.len(), self.source.len()),
        }
    }

    fn prev_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some((_, span)) => *span,
            None => Span::new(0, 0),
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn bump(&mut self) -> Span {
        let span = self.span();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        span
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<Span> {
        if self.at(token) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of input")),
        }
    }

    fn unexpected(&self, what: &str) -> SigError {
        let found = match self.peek() {
            Some(token) => format!("`{token}`"),
            None => "end of file".to_string(),
        };
        SigError::parser(format!("expected {what}, found {found}"), self.span())
    }

    /// Current token starts exactly where the previous one ended
    fn adjacent(&self) -> bool {
        self.pos > 0 && self.pos < self.tokens.len() && self.prev_span().touches(self.span())
    }

    fn newline_before_current(&self) -> bool {
        let Some((_, span)) = self.tokens.get(self.pos) else {
            return true;
        };
        self.source
            .get(self.prev_span().end..span.start)
            .is_some_and(|gap| gap.contains('\n'))
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Identifier or keyword at offset `n`
    fn name_like_at(&self, n: usize) -> bool {
        match self.peek_nth(n) {
            Some(Token::Ident(_)) => true,
            Some(token) => token.keyword_text().is_some(),
            None => false,
        }
    }

    fn name_like(&mut self, what: &str) -> Result<Spanned<String>> {
        let span = self.span();
        let text = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            Some(token) => match token.keyword_text() {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected(what)),
            },
            None => return Err(self.unexpected(what)),
        };
        self.bump();
        Ok(Spanned::new(text, span))
    }

    fn annotations(&mut self) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        while let Some(Token::Annotation(text)) = self.peek() {
            let text = text.clone();
            let span = self.bump();
            annotations.push(Spanned::new(text, span));
        }
        annotations
    }

    // ------------------------------------------------------------------
    // Type variable scopes
    // ------------------------------------------------------------------

    fn is_type_var(&self, name: &str) -> bool {
        self.type_vars
            .iter()
            .rev()
            .any(|scope| scope.iter().any(|v| v == name))
    }

    /// `[unchecked out T < Bound, U]`; names are added to the innermost
    /// scope as they are read so bounds can refer to them.
    fn type_param_list(&mut self) -> Result<Vec<TypeParam>> {
        let mut params = Vec::new();
        if !self.eat(&Token::LBracket) {
            return Ok(params);
        }
        loop {
            let unchecked = self.eat(&Token::Unchecked);
            let variance = if self.eat(&Token::Out) {
                Variance::Covariant
            } else if self.eat(&Token::In) {
                Variance::Contravariant
            } else {
                Variance::Invariant
            };
            let name_span = self.span();
            let name = self.ident("type parameter name")?;
            if params.iter().any(|p: &TypeParam| p.name == name) {
                return Err(SigError::parser(
                    format!("duplicate type parameter `{name}`"),
                    name_span,
                ));
            }
            if let Some(scope) = self.type_vars.last_mut() {
                scope.push(name.clone());
            }
            let upper_bound = if self.eat(&Token::Lt) {
                Some(self.ty()?)
            } else {
                None
            };
            params.push(TypeParam {
                name,
                variance,
                unchecked,
                upper_bound,
            });
            if !self.eat(&Token::Comma) || self.at(&Token::RBracket) {
                break;
            }
        }
        self.expect(&Token::RBracket, "`]`")?;
        Ok(params)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn signature(&mut self) -> Result<Signature> {
        let mut decls = Vec::new();
        loop {
            self.annotations();
            if self.peek().is_none() {
                break;
            }
            decls.push(self.decl()?);
        }
        Ok(Signature { decls })
    }

    fn decl(&mut self) -> Result<Decl> {
        match self.peek() {
            Some(Token::Class) => self.class_decl().map(Decl::Class),
            Some(Token::Module) => self.module_decl().map(Decl::Module),
            Some(Token::Interface) => self.interface_decl().map(Decl::Interface),
            Some(Token::Type) => self.type_alias_decl().map(Decl::TypeAlias),
            Some(Token::GlobalName(_)) => self.global_decl().map(Decl::Global),
            Some(Token::Ident(_) | Token::ColonColon) => self.constant_decl().map(Decl::Constant),
            _ => Err(self.unexpected("declaration")),
        }
    }

    fn qualified_name(&mut self) -> Result<Spanned<QualifiedName>> {
        let begin = self.span();
        let absolute = self.eat(&Token::ColonColon);
        let mut parts = vec![self.ident("name")?];
        while self.at(&Token::ColonColon) && matches!(self.peek_nth(1), Some(Token::Ident(_))) {
            self.bump();
            parts.push(self.ident("name")?);
        }
        let name = parts.pop().unwrap_or_default();
        Ok(Spanned::new(
            QualifiedName::new(absolute, parts, name),
            begin.merge(self.prev_span()),
        ))
    }

    fn constant_path(&mut self, what: &str) -> Result<Spanned<QualifiedName>> {
        let name = self.qualified_name()?;
        if !name.node.namespace.iter().all(|part| is_constant_name(part)) {
            return Err(SigError::parser(
                format!("namespace of {what} `{}` must be constant names", name.node),
                name.span,
            ));
        }
        Ok(name)
    }

    fn class_decl(&mut self) -> Result<ClassDecl> {
        let start = self.bump();
        let name = self.constant_path("class name")?;
        if !is_constant_name(&name.node.name) {
            return Err(SigError::parser(
                format!("class name `{}` must start with an uppercase letter", name.node),
                name.span,
            ));
        }
        self.type_vars.push(Vec::new());
        let type_params = self.type_param_list()?;
        let superclass = if self.eat(&Token::Lt) {
            let begin = self.span();
            let ty = self.ty_primary()?;
            Some(Spanned::new(ty, begin.merge(self.prev_span())))
        } else {
            None
        };
        let members = self.members()?;
        let end = self.expect(&Token::End, "`end`")?;
        self.type_vars.pop();
        Ok(ClassDecl {
            name,
            type_params,
            superclass,
            members,
            span: start.merge(end),
        })
    }

    fn module_decl(&mut self) -> Result<ModuleDecl> {
        let start = self.bump();
        let name = self.constant_path("module name")?;
        if !is_constant_name(&name.node.name) {
            return Err(SigError::parser(
                format!("module name `{}` must start with an uppercase letter", name.node),
                name.span,
            ));
        }
        self.type_vars.push(Vec::new());
        let type_params = self.type_param_list()?;
        let mut self_types = Vec::new();
        if self.eat(&Token::Colon) {
            loop {
                let begin = self.span();
                let ty = self.ty_primary()?;
                self_types.push(Spanned::new(ty, begin.merge(self.prev_span())));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let members = self.members()?;
        let end = self.expect(&Token::End, "`end`")?;
        self.type_vars.pop();
        Ok(ModuleDecl {
            name,
            type_params,
            self_types,
            members,
            span: start.merge(end),
        })
    }

    fn interface_decl(&mut self) -> Result<InterfaceDecl> {
        let start = self.bump();
        let name = self.constant_path("interface name")?;
        if !name.node.is_interface() {
            return Err(SigError::parser(
                format!(
                    "interface name `{}` must start with `_` followed by an uppercase letter",
                    name.node
                ),
                name.span,
            ));
        }
        self.type_vars.push(Vec::new());
        let type_params = self.type_param_list()?;
        let members = self.members()?;
        let end = self.expect(&Token::End, "`end`")?;
        self.type_vars.pop();
        Ok(InterfaceDecl {
            name,
            type_params,
            members,
            span: start.merge(end),
        })
    }

    fn type_alias_decl(&mut self) -> Result<TypeAliasDecl> {
        let start = self.bump();
        let name = self.constant_path("type alias name")?;
        if !name.node.is_alias() {
            return Err(SigError::parser(
                format!("type alias name `{}` must start with a lowercase letter", name.node),
                name.span,
            ));
        }
        self.type_vars.push(Vec::new());
        let type_params = self.type_param_list()?;
        self.expect(&Token::Eq, "`=`")?;
        let ty = self.spanned_ty()?;
        self.type_vars.pop();
        let span = start.merge(ty.span);
        Ok(TypeAliasDecl {
            name,
            type_params,
            ty,
            span,
        })
    }

    fn constant_decl(&mut self) -> Result<ConstantDecl> {
        let name = self.constant_path("constant")?;
        if !is_constant_name(&name.node.name) {
            return Err(SigError::parser(
                format!("constant name `{}` must start with an uppercase letter", name.node),
                name.span,
            ));
        }
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.spanned_ty()?;
        let span = name.span.merge(ty.span);
        Ok(ConstantDecl { name, ty, span })
    }

    fn global_decl(&mut self) -> Result<GlobalDecl> {
        let span = self.span();
        let name = match self.peek() {
            Some(Token::GlobalName(name)) => name.clone(),
            _ => return Err(self.unexpected("global variable")),
        };
        self.bump();
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.spanned_ty()?;
        Ok(GlobalDecl {
            name: Spanned::new(name, span),
            span: span.merge(ty.span),
            ty,
        })
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    fn members(&mut self) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        loop {
            let annotations = self.annotations();
            match self.peek() {
                None | Some(Token::End) => break,
                Some(Token::Def) => {
                    members.push(Member::Method(self.method_def(None, annotations)?));
                }
                Some(Token::Public | Token::Private | Token::Protected) => {
                    let visibility = match self.peek() {
                        Some(Token::Private) => Visibility::Private,
                        Some(Token::Protected) => Visibility::Protected,
                        _ => Visibility::Public,
                    };
                    let span = self.bump();
                    let modifies_next = !self.newline_before_current()
                        && matches!(
                            self.peek(),
                            Some(
                                Token::Def
                                    | Token::AttrReader
                                    | Token::AttrWriter
                                    | Token::AttrAccessor
                            )
                        );
                    if !modifies_next {
                        members.push(Member::Visibility(Spanned::new(visibility, span)));
                    } else if self.at(&Token::Def) {
                        let mut def = self.method_def(Some(visibility), annotations)?;
                        def.span = span.merge(def.span);
                        members.push(Member::Method(def));
                    } else {
                        let mut attr = self.attribute(Some(visibility))?;
                        attr.span = span.merge(attr.span);
                        members.push(Member::Attribute(attr));
                    }
                }
                Some(Token::Include | Token::Extend | Token::Prepend) => {
                    members.push(Member::Mixin(self.mixin()?));
                }
                Some(Token::AttrReader | Token::AttrWriter | Token::AttrAccessor) => {
                    members.push(Member::Attribute(self.attribute(None)?));
                }
                Some(Token::IvarName(_)) => {
                    members.push(Member::InstanceVariable(self.instance_variable()?));
                }
                Some(Token::Alias) => members.push(Member::Alias(self.alias()?)),
                Some(
                    Token::Class
                    | Token::Module
                    | Token::Interface
                    | Token::Type
                    | Token::Ident(_)
                    | Token::ColonColon,
                ) => members.push(Member::Decl(self.decl()?)),
                _ => return Err(self.unexpected("member or `end`")),
            }
        }
        Ok(members)
    }

    fn method_def(
        &mut self,
        visibility: Option<Visibility>,
        mut annotations: Vec<Annotation>,
    ) -> Result<MethodDef> {
        let start = self.expect(&Token::Def, "`def`")?;
        let kind = self.method_receiver();
        let name = self.method_name()?;
        self.expect(&Token::Colon, "`:`")?;

        let mut overloads = Vec::new();
        let mut overloading = false;
        loop {
            annotations.extend(self.annotations());
            if self.eat(&Token::Ellipsis) {
                overloading = true;
                break;
            }
            let begin = self.span();
            let sig = self.method_type()?;
            overloads.push(Spanned::new(sig, begin.merge(self.prev_span())));
            if !self.eat(&Token::Pipe) {
                break;
            }
        }

        Ok(MethodDef {
            name,
            kind,
            visibility,
            overloads,
            overloading,
            annotations,
            span: start.merge(self.prev_span()),
        })
    }

    /// `self.` / `self?.` prefix of a method or attribute name
    fn method_receiver(&mut self) -> MethodKind {
        if self.at(&Token::SelfKw) && self.peek_nth(1) == Some(&Token::Dot) {
            self.bump();
            self.bump();
            MethodKind::Singleton
        } else if self.at(&Token::SelfKw)
            && self.peek_nth(1) == Some(&Token::Question)
            && self.peek_nth(2) == Some(&Token::Dot)
        {
            self.bump();
            self.bump();
            self.bump();
            MethodKind::SingletonInstance
        } else {
            MethodKind::Instance
        }
    }

    fn method_name(&mut self) -> Result<Spanned<String>> {
        let begin = self.span();
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("method name"));
        };
        self.bump();
        let mut name = match &token {
            Token::Ident(name) => name.clone(),
            Token::LBracket => {
                if !(self.adjacent() && self.at(&Token::RBracket)) {
                    return Err(self.unexpected("`]`"));
                }
                self.bump();
                let mut name = "[]".to_string();
                if self.adjacent() && self.at(&Token::Eq) {
                    self.bump();
                    name.push('=');
                }
                return Ok(Spanned::new(name, begin.merge(self.prev_span())));
            }
            other => match other.keyword_text().or_else(|| other.operator_text()) {
                Some(text) => text.to_string(),
                None => {
                    return Err(SigError::parser(
                        format!("expected method name, found `{other}`"),
                        begin,
                    ));
                }
            },
        };

        let suffixable = matches!(token, Token::Ident(_)) || token.keyword_text().is_some();
        if suffixable && self.adjacent() {
            let suffix = match self.peek() {
                Some(Token::Question) => Some('?'),
                Some(Token::Bang) => Some('!'),
                Some(Token::Eq) => Some('='),
                _ => None,
            };
            if let Some(suffix) = suffix {
                self.bump();
                name.push(suffix);
            }
        }
        let unary = matches!(token, Token::Plus | Token::Minus | Token::Bang | Token::Tilde);
        if unary && self.adjacent() && self.at(&Token::At) {
            self.bump();
            name.push('@');
        }
        Ok(Spanned::new(name, begin.merge(self.prev_span())))
    }

    fn mixin(&mut self) -> Result<MixinDecl> {
        let relation = match self.peek() {
            Some(Token::Extend) => MixinRelation::Extend,
            Some(Token::Prepend) => MixinRelation::Prepend,
            _ => MixinRelation::Include,
        };
        let start = self.bump();
        let begin = self.span();
        let ty = self.ty_primary()?;
        let target = Spanned::new(ty, begin.merge(self.prev_span()));
        Ok(MixinDecl {
            relation,
            span: start.merge(target.span),
            target,
        })
    }

    fn attribute(&mut self, visibility: Option<Visibility>) -> Result<AttributeDecl> {
        let kind = match self.peek() {
            Some(Token::AttrReader) => AttributeKind::Reader,
            Some(Token::AttrWriter) => AttributeKind::Writer,
            _ => AttributeKind::Accessor,
        };
        let start = self.bump();
        let singleton = match self.method_receiver() {
            MethodKind::Instance => false,
            MethodKind::Singleton => true,
            MethodKind::SingletonInstance => {
                return Err(SigError::parser(
                    "attributes cannot use `self?.`",
                    self.prev_span(),
                ));
            }
        };
        let name = self.name_like("attribute name")?;
        // `attr_reader name (@ivar): T` and `attr_reader name (): T`
        if self.eat(&Token::LParen) {
            if let Some(Token::IvarName(_)) = self.peek() {
                self.bump();
            }
            self.expect(&Token::RParen, "`)`")?;
        }
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.spanned_ty()?;
        Ok(AttributeDecl {
            kind,
            name,
            singleton,
            visibility,
            span: start.merge(ty.span),
            ty,
        })
    }

    fn instance_variable(&mut self) -> Result<InstanceVariableDecl> {
        let span = self.span();
        let name = match self.peek() {
            Some(Token::IvarName(name)) => name.clone(),
            _ => return Err(self.unexpected("instance variable")),
        };
        self.bump();
        self.expect(&Token::Colon, "`:`")?;
        let ty = self.spanned_ty()?;
        Ok(InstanceVariableDecl {
            name: Spanned::new(name, span),
            span: span.merge(ty.span),
            ty,
        })
    }

    fn alias(&mut self) -> Result<AliasDecl> {
        let start = self.bump();
        let new_kind = self.method_receiver();
        let new_name = self.method_name()?;
        let old_kind = self.method_receiver();
        let old_name = self.method_name()?;
        let singleton = match (new_kind, old_kind) {
            (MethodKind::Instance, MethodKind::Instance) => false,
            (MethodKind::Singleton, MethodKind::Singleton) => true,
            _ => {
                return Err(SigError::parser(
                    "both names of an alias must use the same receiver",
                    start.merge(old_name.span),
                ));
            }
        };
        Ok(AliasDecl {
            span: start.merge(old_name.span),
            new_name,
            old_name,
            singleton,
        })
    }

    // ------------------------------------------------------------------
    // Method types
    // ------------------------------------------------------------------

    fn method_type(&mut self) -> Result<MethodSignature> {
        self.type_vars.push(Vec::new());
        let result = self.method_type_inner();
        self.type_vars.pop();
        result
    }

    fn method_type_inner(&mut self) -> Result<MethodSignature> {
        let type_params = self.type_param_list()?;
        let (positional, keyword) = if self.at(&Token::LParen) {
            self.params()?
        } else {
            (Vec::new(), Vec::new())
        };
        let block = self.block()?;
        self.expect(&Token::Arrow, "`->`")?;
        let return_type = self.ty_optional()?;
        Ok(MethodSignature {
            type_params,
            positional,
            keyword,
            return_type,
            block,
        })
    }

    fn block(&mut self) -> Result<Option<Block>> {
        let required = if self.at(&Token::Question) && self.peek_nth(1) == Some(&Token::LBrace) {
            self.bump();
            false
        } else if self.at(&Token::LBrace) {
            true
        } else {
            return Ok(None);
        };
        self.expect(&Token::LBrace, "`{`")?;
        let (positional, keyword) = if self.at(&Token::LParen) {
            self.params()?
        } else {
            (Vec::new(), Vec::new())
        };
        self.self_binding()?;
        let block = self.block()?;
        self.expect(&Token::Arrow, "`->`")?;
        let return_type = self.ty()?;
        self.expect(&Token::RBrace, "`}`")?;
        Ok(Some(Block {
            signature: Box::new(MethodSignature {
                type_params: Vec::new(),
                positional,
                keyword,
                return_type,
                block,
            }),
            required,
        }))
    }

    /// `[self: T]` binding of a block or proc; accepted and dropped
    fn self_binding(&mut self) -> Result<()> {
        if self.at(&Token::LBracket) && self.peek_nth(1) == Some(&Token::SelfKw) {
            self.bump();
            self.bump();
            self.expect(&Token::Colon, "`:`")?;
            self.ty()?;
            self.expect(&Token::RBracket, "`]`")?;
        }
        Ok(())
    }

    fn params(&mut self) -> Result<(Vec<Param>, Vec<Param>)> {
        self.expect(&Token::LParen, "`(`")?;
        let mut positional = Vec::new();
        let mut keyword = Vec::new();

        // `(?)` accepts anything
        if self.at(&Token::Question) && self.peek_nth(1) == Some(&Token::RParen) {
            self.bump();
            self.bump();
            positional.push(Param::new(ParamKind::Rest, TypeExpr::untyped()));
            keyword.push(Param::new(ParamKind::KeywordRest, TypeExpr::untyped()));
            return Ok((positional, keyword));
        }

        let mut seen_optional = false;
        let mut seen_rest = false;
        let mut seen_keyword_rest = false;
        while !self.at(&Token::RParen) {
            let span = self.span();
            let param = self.param()?;
            let misplaced = |message: &str| Err(SigError::parser(message.to_string(), span));
            match param.kind {
                ParamKind::Required | ParamKind::Optional | ParamKind::Rest
                    if !keyword.is_empty() =>
                {
                    return misplaced("positional parameter after keyword parameter");
                }
                ParamKind::Required if seen_optional && !seen_rest => {
                    return misplaced("required parameter after optional parameter");
                }
                ParamKind::Optional if seen_rest => {
                    return misplaced("optional parameter after rest parameter");
                }
                ParamKind::Rest if seen_rest => {
                    return misplaced("duplicate rest parameter");
                }
                ParamKind::KeywordRest if seen_keyword_rest => {
                    return misplaced("duplicate keyword rest parameter");
                }
                _ => {}
            }
            match param.kind {
                ParamKind::Optional => seen_optional = true,
                ParamKind::Rest => seen_rest = true,
                ParamKind::KeywordRest => seen_keyword_rest = true,
                _ => {}
            }
            if param.kind.is_keyword() {
                if let Some(name) = &param.name {
                    if keyword.iter().any(|p: &Param| p.name.as_ref() == Some(name)) {
                        return misplaced("duplicate keyword parameter");
                    }
                }
                keyword.push(param);
            } else {
                positional.push(param);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "`)`")?;
        Ok((positional, keyword))
    }

    fn param(&mut self) -> Result<Param> {
        if self.eat(&Token::StarStar) {
            let ty = self.ty()?;
            return Ok(self.named_param(ParamKind::KeywordRest, ty));
        }
        if self.eat(&Token::Star) {
            let ty = self.ty()?;
            return Ok(self.named_param(ParamKind::Rest, ty));
        }
        if self.at(&Token::Question) {
            self.bump();
            if self.keyword_label_here() {
                let name = self.label()?;
                let ty = self.ty()?;
                return Ok(Param::named(ParamKind::KeywordOptional, name, ty));
            }
            let ty = self.ty()?;
            return Ok(self.named_param(ParamKind::Optional, ty));
        }
        if self.keyword_label_here() {
            let name = self.label()?;
            let ty = self.ty()?;
            return Ok(Param::named(ParamKind::KeywordRequired, name, ty));
        }
        let ty = self.ty()?;
        Ok(self.named_param(ParamKind::Required, ty))
    }

    fn keyword_label_here(&self) -> bool {
        self.name_like_at(0) && self.peek_nth(1) == Some(&Token::Colon)
    }

    /// `name:` prefix of a keyword parameter or record field
    fn label(&mut self) -> Result<String> {
        let name = self.name_like("label")?;
        self.expect(&Token::Colon, "`:`")?;
        Ok(name.node)
    }

    /// Optional parameter name after a type
    fn named_param(&mut self, kind: ParamKind, ty: TypeExpr) -> Param {
        if self.name_like_at(0) {
            if let Ok(name) = self.name_like("parameter name") {
                return Param::named(kind, name.node, ty);
            }
        }
        Param::new(kind, ty)
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn spanned_ty(&mut self) -> Result<Spanned<TypeExpr>> {
        let begin = self.span();
        let ty = self.ty()?;
        Ok(Spanned::new(ty, begin.merge(self.prev_span())))
    }

    /// Full type: `A | B & C`
    fn ty(&mut self) -> Result<TypeExpr> {
        with_stack(|| {
            let first = self.ty_intersection()?;
            if !self.at(&Token::Pipe) {
                return Ok(first);
            }
            let mut members = vec![first];
            while self.eat(&Token::Pipe) {
                members.push(self.ty_intersection()?);
            }
            Ok(TypeExpr::Union(members))
        })
    }

    fn ty_intersection(&mut self) -> Result<TypeExpr> {
        let first = self.ty_optional()?;
        if !self.at(&Token::Amp) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.eat(&Token::Amp) {
            members.push(self.ty_optional()?);
        }
        Ok(TypeExpr::Intersection(members))
    }

    /// Primary type with `?` suffixes; the level of method and proc returns
    fn ty_optional(&mut self) -> Result<TypeExpr> {
        let mut ty = self.ty_primary()?;
        while self.at(&Token::Question) && self.peek_nth(1) != Some(&Token::LBrace) {
            self.bump();
            ty = TypeExpr::Optional(Box::new(ty));
        }
        Ok(ty)
    }

    fn ty_primary(&mut self) -> Result<TypeExpr> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("type"));
        };
        let special = |kind| Some(TypeExpr::Special(kind));
        let simple = match &token {
            Token::IntLit(n) => Some(TypeExpr::Literal(Literal::Int(*n))),
            Token::StringLit(s) => Some(TypeExpr::Literal(Literal::String(s.clone()))),
            Token::SymbolLit(s) => Some(TypeExpr::Literal(Literal::Symbol(s.clone()))),
            Token::True => Some(TypeExpr::Literal(Literal::Bool(true))),
            Token::False => Some(TypeExpr::Literal(Literal::Bool(false))),
            Token::SelfKw => special(SpecialType::SelfType),
            Token::Instance => special(SpecialType::Instance),
            Token::Class => special(SpecialType::Class),
            Token::Void => special(SpecialType::Void),
            Token::Untyped => special(SpecialType::Untyped),
            Token::Bool => special(SpecialType::Bool),
            Token::Top => special(SpecialType::Top),
            Token::Bot => special(SpecialType::Bottom),
            Token::Nil => special(SpecialType::Nil),
            _ => None,
        };
        if let Some(ty) = simple {
            self.bump();
            return Ok(ty);
        }

        match token {
            Token::LParen => {
                self.bump();
                let ty = self.ty()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(ty)
            }
            Token::LBracket => self.tuple(),
            Token::LBrace => self.record(),
            Token::Caret => self.proc_type(),
            Token::Singleton => {
                self.bump();
                self.expect(&Token::LParen, "`(`")?;
                let name = self.qualified_name()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(TypeExpr::Singleton(name.node))
            }
            Token::Ident(_) | Token::ColonColon => self.named_type(),
            _ => Err(self.unexpected("type")),
        }
    }

    fn named_type(&mut self) -> Result<TypeExpr> {
        let name = self.qualified_name()?.node;
        if !name.absolute && !name.is_qualified() && self.is_type_var(&name.name) {
            return Ok(TypeExpr::Variable(name.name));
        }
        let args = if self.at(&Token::LBracket) {
            self.type_args()?
        } else {
            Vec::new()
        };
        Ok(if name.is_interface() {
            TypeExpr::Interface { name, args }
        } else if name.is_alias() {
            TypeExpr::Alias { name, args }
        } else {
            TypeExpr::Nominal { name, args }
        })
    }

    fn type_args(&mut self) -> Result<Vec<TypeExpr>> {
        self.expect(&Token::LBracket, "`[`")?;
        let mut args = vec![self.ty()?];
        while self.eat(&Token::Comma) {
            if self.at(&Token::RBracket) {
                break;
            }
            args.push(self.ty()?);
        }
        self.expect(&Token::RBracket, "`]`")?;
        Ok(args)
    }

    fn tuple(&mut self) -> Result<TypeExpr> {
        self.expect(&Token::LBracket, "`[`")?;
        let mut elements = Vec::new();
        while !self.at(&Token::RBracket) {
            elements.push(self.ty()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBracket, "`]`")?;
        Ok(TypeExpr::Tuple(elements))
    }

    fn record(&mut self) -> Result<TypeExpr> {
        self.expect(&Token::LBrace, "`{`")?;
        let mut fields = std::collections::BTreeMap::new();
        while !self.at(&Token::RBrace) {
            let span = self.span();
            let key = self.label()?;
            let ty = self.ty()?;
            if fields.insert(key.clone(), ty).is_some() {
                return Err(SigError::parser(
                    format!("duplicate record field `{key}`"),
                    span,
                ));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace, "`}`")?;
        Ok(TypeExpr::Record(fields))
    }

    fn proc_type(&mut self) -> Result<TypeExpr> {
        self.expect(&Token::Caret, "`^`")?;
        let (positional, keyword) = if self.at(&Token::LParen) {
            self.params()?
        } else {
            (Vec::new(), Vec::new())
        };
        self.self_binding()?;
        let block = self.block()?;
        self.expect(&Token::Arrow, "`->`")?;
        let return_type = self.ty_optional()?;
        Ok(TypeExpr::Proc(Box::new(MethodSignature {
            type_params: Vec::new(),
            positional,
            keyword,
            return_type,
            block,
        })))
    }
}
