//! Environment: a loaded declaration graph plus its configuration
//!
//! Queries here take type expressions written at the top level, absolutize
//! them against the root namespace and delegate to the resolver, ancestor
//! engine and subtype checker.

use std::collections::BTreeMap;
use std::path::Path;

use crate::ancestors::{AncestorEngine, MethodLookup, SingletonAncestor};
use crate::ast::{QualifiedName, TypeExpr};
use crate::config::Config;
use crate::error::{Diagnostic, Result, SigError};
use crate::graph::{DeclarationGraph, MemberName, NodeId};
use crate::loader;
use crate::parser;
use crate::resolver::{Resolution, Resolver};
use crate::types::{CallResolution, CallSite, SubtypeChecker};
use crate::validate;

#[derive(Debug, Default)]
pub struct Environment {
    graph: DeclarationGraph,
    config: Config,
    /// Source text by file name, kept for diagnostic rendering
    sources: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(config: Config) -> Self {
        Self {
            graph: DeclarationGraph::new(),
            config,
            sources: BTreeMap::new(),
        }
    }

    pub fn graph(&self) -> &DeclarationGraph {
        &self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self, file: &str) -> Option<&str> {
        self.sources.get(file).map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    pub fn load_source(&mut self, file: &str, source: &str) -> Vec<Diagnostic> {
        self.sources.insert(file.to_string(), source.to_string());
        loader::load_source(&mut self.graph, file, source)
    }

    /// Read and load a declaration file
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<Diagnostic>> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            SigError::io_error(format!("failed to read {}: {e}", path.display()))
        })?;
        let file = path.display().to_string();
        tracing::debug!(file = %file, bytes = source.len(), "loading declaration file");
        Ok(self.load_source(&file, &source))
    }

    pub fn load_signature(&mut self, file: &str, signature: &crate::ast::Signature) -> Vec<Diagnostic> {
        loader::load_signature(&mut self.graph, file, signature)
    }

    /// Whole-corpus validation; run after every file is loaded
    pub fn validate(&self) -> Vec<Diagnostic> {
        validate::validate(&self.graph, &self.config.core)
    }

    // ------------------------------------------------------------------
    // Query views
    // ------------------------------------------------------------------

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.graph, &self.config.core)
    }

    pub fn engine(&self) -> AncestorEngine<'_> {
        AncestorEngine::new(&self.graph, &self.config.core)
    }

    pub fn checker(&self) -> SubtypeChecker<'_> {
        SubtypeChecker::new(&self.graph, &self.config.core).with_max_depth(self.config.max_depth)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Resolve a class, module or interface name from the top level
    pub fn resolve(&self, name: &str) -> Resolution<NodeId> {
        self.resolver().resolve(&QualifiedName::parse(name), &[], false)
    }

    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        self.engine().ancestors(node)
    }

    pub fn singleton_ancestors(&self, node: NodeId) -> Vec<SingletonAncestor> {
        self.engine().singleton_ancestors(node)
    }

    pub fn lookup_method(&self, node: NodeId, name: &MemberName) -> Option<MethodLookup<'_>> {
        self.engine().lookup_method(node, name)
    }

    /// Parse a type written at the top level and absolutize it
    pub fn parse_type(&self, text: &str) -> Result<TypeExpr> {
        let ty = parser::parse_type(text)?;
        Ok(self.absolutize(&ty))
    }

    pub fn absolutize(&self, ty: &TypeExpr) -> TypeExpr {
        self.resolver().absolutize(ty, &[])
    }

    pub fn is_subtype(&self, sub: &TypeExpr, sup: &TypeExpr) -> bool {
        let sub = self.absolutize(sub);
        let sup = self.absolutize(sup);
        let result = self.checker().is_subtype(&sub, &sup);
        tracing::debug!(%sub, %sup, result, "subtype query");
        result
    }

    pub fn resolve_call(&self, receiver: &TypeExpr, method: &str, call: &CallSite) -> CallResolution {
        let resolver = self.resolver();
        let receiver = self.absolutize(receiver);
        let call = CallSite {
            positional: call.positional.iter().map(|t| self.absolutize(t)).collect(),
            keywords: call
                .keywords
                .iter()
                .map(|(name, t)| (name.clone(), self.absolutize(t)))
                .collect(),
            block: call.block.as_ref().map(|b| resolver.absolutize_signature(b, &[])),
        };
        self.checker().resolve_call(&receiver, method, &call)
    }
}
