//! Query interface over a loaded environment
//!
//! Every query returns a serializable [`QueryResult`]; misses carry a
//! [`QueryError`] with did-you-mean suggestions instead of failing.

use serde::{Deserialize, Serialize};

use crate::ancestors::SingletonAncestor;
use crate::ast::{QualifiedName, TypeExpr, format_type_params};
use crate::env::Environment;
use crate::graph::{MemberName, MemberScope, NodeId};
use crate::resolver::Resolution;
use crate::types::{CallResolution, CallSite};

/// Query result wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
}

impl<T> QueryResult<T> {
    fn single(query: impl Into<String>, result: T) -> Self {
        Self {
            query: query.into(),
            matches: None,
            result: Some(result),
            error: None,
        }
    }

    fn list(query: impl Into<String>, matches: Vec<T>) -> Self {
        Self {
            query: query.into(),
            matches: Some(matches),
            result: None,
            error: None,
        }
    }

    fn failed(query: impl Into<String>, error: QueryError) -> Self {
        Self {
            query: query.into(),
            matches: None,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Query error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl QueryError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

/// A declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclInfo {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub type_params: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
}

/// One entry of an ancestor chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestorInfo {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub singleton: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A method found by lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    pub owner: String,
    pub name: String,
    pub scope: String,
    pub visibility: String,
    pub overloads: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtypeInfo {
    pub sub: String,
    pub sup: String,
    pub result: bool,
}

/// Outcome of overload resolution for a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInfo {
    pub owner: String,
    pub overload: usize,
    pub signature: String,
    pub return_type: String,
}

/// Query engine for an environment
pub struct QueryEngine<'e> {
    env: &'e Environment,
}

impl<'e> QueryEngine<'e> {
    pub fn new(env: &'e Environment) -> Self {
        Self { env }
    }

    /// Resolve a declaration name from the top level
    pub fn query_decl(&self, name: &str) -> QueryResult<DeclInfo> {
        match self.find(name) {
            Ok(id) => QueryResult::single(name, self.decl_info(id)),
            Err(error) => QueryResult::failed(name, error),
        }
    }

    /// Instance (or class-level) ancestor chain
    pub fn query_ancestors(&self, name: &str, singleton: bool) -> QueryResult<AncestorInfo> {
        let id = match self.find(name) {
            Ok(id) => id,
            Err(error) => return QueryResult::failed(name, error),
        };
        let graph = self.env.graph();
        let matches = if singleton {
            self.env
                .singleton_ancestors(id)
                .into_iter()
                .map(|entry| match entry {
                    SingletonAncestor::Singleton(node) => AncestorInfo {
                        name: graph.node(node).name.to_string(),
                        kind: graph.node(node).kind.to_string(),
                        args: Vec::new(),
                        singleton: true,
                    },
                    SingletonAncestor::Instance(ancestor) => {
                        self.ancestor_info(ancestor.node, &ancestor.args)
                    }
                })
                .collect()
        } else {
            self.env
                .engine()
                .instance_ancestors(id)
                .into_iter()
                .map(|ancestor| self.ancestor_info(ancestor.node, &ancestor.args))
                .collect()
        };
        QueryResult::list(name, matches)
    }

    /// Method lookup along the ancestor chain
    pub fn query_method(&self, type_name: &str, method: &str, singleton: bool) -> QueryResult<MethodInfo> {
        let scope = if singleton {
            MemberScope::Singleton
        } else {
            MemberScope::Instance
        };
        let key = MemberName::new(scope, method);
        let query = format!("{type_name}{key}");
        let id = match self.find(type_name) {
            Ok(id) => id,
            Err(error) => return QueryResult::failed(query, error),
        };
        match self.env.lookup_method(id, &key) {
            Some(found) => {
                let graph = self.env.graph();
                QueryResult::single(
                    query,
                    MethodInfo {
                        owner: graph.node(found.owner).name.to_string(),
                        name: found.name.clone(),
                        scope: found.scope.to_string(),
                        visibility: found.visibility.to_string(),
                        overloads: found
                            .overloads
                            .iter()
                            .map(|o| o.signature.to_string())
                            .collect(),
                    },
                )
            }
            None => {
                let suggestions = self.suggest_methods(id, scope, method);
                QueryResult::failed(
                    query.clone(),
                    QueryError::new("NOT_FOUND", format!("method `{query}` not found"))
                        .with_suggestions(suggestions),
                )
            }
        }
    }

    pub fn query_subtype(&self, sub: &str, sup: &str) -> QueryResult<SubtypeInfo> {
        let query = format!("{sub} <: {sup}");
        let (sub_ty, sup_ty) = match (self.parse(sub), self.parse(sup)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(error), _) | (_, Err(error)) => return QueryResult::failed(query, error),
        };
        let result = self.env.is_subtype(&sub_ty, &sup_ty);
        QueryResult::single(
            query,
            SubtypeInfo {
                sub: sub_ty.to_string(),
                sup: sup_ty.to_string(),
                result,
            },
        )
    }

    /// Overload resolution for `receiver.method(args...)`
    pub fn query_call(&self, receiver: &str, method: &str, args: &[String]) -> QueryResult<CallInfo> {
        let query = format!("{receiver}#{method}({})", args.join(", "));
        let receiver_ty = match self.parse(receiver) {
            Ok(ty) => ty,
            Err(error) => return QueryResult::failed(query, error),
        };
        let mut positional = Vec::with_capacity(args.len());
        for arg in args {
            match self.parse(arg) {
                Ok(ty) => positional.push(ty),
                Err(error) => return QueryResult::failed(query, error),
            }
        }
        let graph = self.env.graph();
        match self.env.resolve_call(&receiver_ty, method, &CallSite::new(positional)) {
            CallResolution::Selected {
                owner,
                index,
                signature,
                return_type,
            } => QueryResult::single(
                query,
                CallInfo {
                    owner: graph.node(owner).name.to_string(),
                    overload: index,
                    signature: signature.to_string(),
                    return_type: return_type.to_string(),
                },
            ),
            CallResolution::NoMatch { candidates, .. } => QueryResult::failed(
                query,
                QueryError::new("NO_MATCH", format!("no overload of `{method}` accepts the arguments"))
                    .with_suggestions(candidates.iter().map(ToString::to_string).collect()),
            ),
            CallResolution::NoMethod => QueryResult::failed(
                query,
                QueryError::new("NOT_FOUND", format!("`{receiver_ty}` has no method `{method}`")),
            ),
            CallResolution::UnknownReceiver => QueryResult::failed(
                query,
                QueryError::new("UNKNOWN_RECEIVER", format!("cannot dispatch on `{receiver_ty}`")),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn find(&self, name: &str) -> Result<NodeId, QueryError> {
        match self.env.resolve(name) {
            Resolution::Found(id) => Ok(id),
            Resolution::NotFound => {
                let suggestions = self
                    .env
                    .resolver()
                    .suggest(&QualifiedName::parse(name))
                    .map(|s| vec![s.to_string()])
                    .unwrap_or_default();
                Err(QueryError::new("NOT_FOUND", format!("`{name}` not found"))
                    .with_suggestions(suggestions))
            }
            Resolution::Ambiguous(candidates) => Err(QueryError::new(
                "AMBIGUOUS",
                format!("`{name}` is ambiguous"),
            )
            .with_suggestions(candidates.iter().map(ToString::to_string).collect())),
        }
    }

    fn parse(&self, text: &str) -> Result<TypeExpr, QueryError> {
        self.env
            .parse_type(text)
            .map_err(|e| QueryError::new("PARSE_ERROR", e.message()))
    }

    fn decl_info(&self, id: NodeId) -> DeclInfo {
        let decl = self.env.graph().node(id);
        DeclInfo {
            name: decl.name.to_string(),
            kind: decl.kind.to_string(),
            type_params: format_type_params(&decl.type_params),
            superclass: decl.superclass.as_ref().map(|s| s.ty.to_string()),
            locations: decl.locations.iter().map(ToString::to_string).collect(),
        }
    }

    fn ancestor_info(&self, node: NodeId, args: &[TypeExpr]) -> AncestorInfo {
        let decl = self.env.graph().node(node);
        AncestorInfo {
            name: decl.name.to_string(),
            kind: decl.kind.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            singleton: false,
        }
    }

    fn suggest_methods(&self, node: NodeId, scope: MemberScope, method: &str) -> Vec<String> {
        let table = self.env.engine().method_table(node, scope);
        let names: Vec<&str> = table.iter().map(|(name, _)| name.as_str()).collect();
        crate::util::find_similar_name(method, &names, crate::util::suggestion_threshold(method))
            .map(|name| vec![name.to_string()])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const CORE: &str = "
        class BasicObject end
        class Object < BasicObject end
        class Module end
        class Class < Module end
        module Comparable end
        class Integer
          include Comparable
          def +: (Integer) -> Integer
               | (String) -> String
          def to_s: () -> String
        end
        class String end
    ";

    fn env() -> Environment {
        let mut env = Environment::new(Config::default());
        assert!(env.load_source("core.sig", CORE).is_empty());
        env
    }

    #[test]
    fn test_query_decl_and_suggestions() {
        let env = env();
        let engine = QueryEngine::new(&env);
        let found = engine.query_decl("Integer");
        assert!(found.is_ok());
        assert_eq!(found.result.unwrap().kind, "class");

        let missing = engine.query_decl("Integr");
        let error = missing.error.unwrap();
        assert_eq!(error.code, "NOT_FOUND");
        assert_eq!(error.suggestions, vec!["::Integer".to_string()]);
    }

    #[test]
    fn test_query_ancestors() {
        let env = env();
        let engine = QueryEngine::new(&env);
        let names: Vec<String> = engine
            .query_ancestors("Integer", false)
            .matches
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["::Integer", "::Comparable", "::Object", "::BasicObject"]);

        let singleton = engine.query_ancestors("Integer", true).matches.unwrap();
        assert!(singleton[0].singleton);
        assert_eq!(singleton[0].name, "::Integer");
    }

    #[test]
    fn test_query_method_and_miss() {
        let env = env();
        let engine = QueryEngine::new(&env);
        let result = engine.query_method("Integer", "+", false);
        let info = result.result.unwrap();
        assert_eq!(info.owner, "::Integer");
        assert_eq!(info.overloads.len(), 2);

        let miss = engine.query_method("Integer", "to_z", false);
        assert_eq!(miss.query, "Integer#to_z");
        assert_eq!(miss.error.unwrap().suggestions, vec!["to_s".to_string()]);
    }

    #[test]
    fn test_query_subtype_and_call() {
        let env = env();
        let engine = QueryEngine::new(&env);
        let yes = engine.query_subtype("Integer", "Comparable").result.unwrap();
        assert!(yes.result);
        let bad = engine.query_subtype("Integer |", "Object");
        assert_eq!(bad.error.unwrap().code, "PARSE_ERROR");

        let call = engine.query_call("Integer", "+", &["String".to_string()]);
        let info = call.result.unwrap();
        assert_eq!(info.overload, 1);
        assert_eq!(info.return_type, "::String");

        let no_match = engine.query_call("Integer", "+", &["Symbol".to_string()]);
        assert_eq!(no_match.error.unwrap().code, "NO_MATCH");
    }

    #[test]
    fn test_results_serialize_without_empty_fields() {
        let env = env();
        let engine = QueryEngine::new(&env);
        let json = serde_json::to_value(engine.query_subtype("Integer", "Object")).unwrap();
        assert_eq!(json["result"]["result"], serde_json::Value::Bool(true));
        assert!(json.get("error").is_none());
        assert!(json.get("matches").is_none());
    }
}
