//! Error types and reporting

use crate::ast::{DeclKind, Location, Span};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SigError>;

/// Signature error
///
/// Lexer and parser errors are fatal to their file. Every other variant is a
/// structural problem that the loader records and skips past.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SigError {
    #[error("Lexer error at {span:?}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span:?}: {message}")]
    Parser { message: String, span: Span },

    #[error("`{name}` is already declared as a {existing}, cannot redeclare it as a {requested}")]
    KindConflict {
        name: String,
        existing: DeclKind,
        requested: DeclKind,
    },

    #[error("superclass mismatch for `{name}`: declared `{existing}`, now `{requested}`")]
    SuperclassConflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("invalid superclass for `{name}`: {message}")]
    InvalidSuperclass { name: String, message: String },

    #[error("`{name}` expects {expected} type argument(s), found {found}")]
    GenericArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("type parameters of `{name}` differ between declarations: `{existing}` vs `{requested}`")]
    TypeParamMismatch {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("invalid mixin in `{name}`: {message}")]
    InvalidMixin { name: String, message: String },

    #[error("invalid member in `{name}`: {message}")]
    InvalidMember { name: String, message: String },

    #[error("duplicate {what} `{name}`")]
    Duplicate { what: String, name: String },

    #[error("cannot resolve {context} `{target}`{hint}")]
    Unresolved {
        context: String,
        target: String,
        /// Rendered did-you-mean suffix, empty when there is no suggestion
        hint: String,
    },

    #[error("ambiguous reference `{target}`, candidates: {candidates}")]
    Ambiguous { target: String, candidates: String },

    #[error("{variance} type parameter `{param}` of `{name}` appears in {position} position")]
    Variance {
        name: String,
        param: String,
        variance: String,
        position: String,
    },

    #[error("cyclic ancestry: {path}")]
    Cycle { path: String },

    #[error("alias `{name}` in `{owner}` refers to missing method `{target}`")]
    DanglingAlias {
        owner: String,
        name: String,
        target: String,
    },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl SigError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_member(name: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidMember {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_mixin(name: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidMixin {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_superclass(name: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidSuperclass {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn unresolved(context: impl Into<String>, target: impl ToString, hint: String) -> Self {
        Self::Unresolved {
            context: context.into(),
            target: target.to_string(),
            hint,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Message without the location prefix
    pub fn message(&self) -> String {
        match self {
            Self::Lexer { message, .. } | Self::Parser { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Short category used as the report title and in JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lexer { .. } => "lexer",
            Self::Parser { .. } => "parser",
            Self::KindConflict { .. } => "kind-conflict",
            Self::SuperclassConflict { .. } => "superclass-conflict",
            Self::InvalidSuperclass { .. } => "invalid-superclass",
            Self::GenericArity { .. } => "generic-arity",
            Self::TypeParamMismatch { .. } => "type-param-mismatch",
            Self::InvalidMixin { .. } => "invalid-mixin",
            Self::InvalidMember { .. } => "invalid-member",
            Self::Duplicate { .. } => "duplicate",
            Self::Unresolved { .. } => "unresolved",
            Self::Ambiguous { .. } => "ambiguous",
            Self::Variance { .. } => "variance",
            Self::Cycle { .. } => "cycle",
            Self::DanglingAlias { .. } => "dangling-alias",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
        }
    }
}

/// An error tied to the declaration that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub error: SigError,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(error: SigError, location: Option<Location>) -> Self {
        Self { error, location }
    }

    pub fn at(error: SigError, file: &str, span: Span) -> Self {
        Self::new(error, Some(Location::new(file, span)))
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.error.message()),
            None => write!(f, "{}", self.error.message()),
        }
    }
}

/// Report a diagnostic with ariadne; `source` is the text of the file the
/// diagnostic points into.
pub fn report_diagnostic(source: &str, diagnostic: &Diagnostic) -> std::io::Result<()> {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let error = &diagnostic.error;
    let (filename, span) = match &diagnostic.location {
        Some(location) => (location.file.as_str(), Some(location.span)),
        None => ("<input>", error.span()),
    };

    if let Some(span) = span {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{} error", error.kind()))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint((filename, Source::from(source)))
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{} error: {}", error.kind(), error.message()))
            .finish()
            .eprint((filename, Source::from(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_error_span_and_message() {
        let err = SigError::parser("expected `end`", Span::new(3, 7));
        assert_eq!(err.span(), Some(Span::new(3, 7)));
        assert_eq!(err.message(), "expected `end`");
        assert_eq!(err.kind(), "parser");
    }

    #[test]
    fn test_structural_error_has_no_span() {
        let err = SigError::KindConflict {
            name: "::Foo".into(),
            existing: DeclKind::Class,
            requested: DeclKind::Module,
        };
        assert_eq!(err.span(), None);
        assert_eq!(
            err.message(),
            "`::Foo` is already declared as a class, cannot redeclare it as a module"
        );
    }

    #[test]
    fn test_unresolved_includes_hint() {
        let err = SigError::unresolved(
            "type",
            "Strng",
            crate::util::format_suggestion_hint(Some("String")),
        );
        assert!(err.to_string().starts_with("cannot resolve type `Strng`"));
        assert!(err.to_string().contains("did you mean `String`?"));
    }

    #[test]
    fn test_diagnostic_display_with_location() {
        let diag = Diagnostic::at(
            SigError::Cycle {
                path: "::A -> ::B -> ::A".into(),
            },
            "core.sig",
            Span::new(0, 5),
        );
        assert_eq!(diag.to_string(), "core.sig:0..5: cyclic ancestry: ::A -> ::B -> ::A");
    }
}
