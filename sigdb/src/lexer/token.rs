//! Token definitions

use logos::Logos;

/// Declaration file token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // Declaration keywords
    #[token("class")]
    Class,
    #[token("module")]
    Module,
    #[token("interface")]
    Interface,
    #[token("end")]
    End,
    #[token("def")]
    Def,
    #[token("include")]
    Include,
    #[token("extend")]
    Extend,
    #[token("prepend")]
    Prepend,
    #[token("type")]
    Type,
    #[token("alias")]
    Alias,
    #[token("attr_reader")]
    AttrReader,
    #[token("attr_writer")]
    AttrWriter,
    #[token("attr_accessor")]
    AttrAccessor,
    #[token("public")]
    Public,
    #[token("private")]
    Private,
    #[token("protected")]
    Protected,
    #[token("unchecked")]
    Unchecked,
    #[token("in")]
    In,
    #[token("out")]
    Out,

    // Type keywords
    #[token("self")]
    SelfKw,
    #[token("instance")]
    Instance,
    #[token("void")]
    Void,
    #[token("untyped")]
    Untyped,
    #[token("bool")]
    Bool,
    #[token("top")]
    Top,
    #[token("bot")]
    Bot,
    #[token("nil")]
    Nil,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("singleton")]
    Singleton,

    // Literals
    #[regex(r"-?[0-9][0-9_]*", |lex| lex.slice().replace('_', "").parse::<i64>().ok(), priority = 2)]
    IntLit(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    StringLit(String),

    #[regex(r":[a-zA-Z_][a-zA-Z0-9_]*[?!=]?", |lex| lex.slice()[1..].to_string())]
    #[regex(r#":"([^"\\]|\\.)*""#, |lex| unescape(&lex.slice()[1..]))]
    SymbolLit(String),

    /// `%a{...}`, `%a(...)` or `%a[...]`; the payload without delimiters
    #[regex(r"%a(\{[^}]*\}|\([^)]*\)|\[[^\]]*\])", |lex| {
        let s = lex.slice();
        s[3..s.len() - 1].to_string()
    })]
    Annotation(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r"@@?[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    IvarName(String),

    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    GlobalName(String),

    // Punctuation
    #[token("::")]
    ColonColon,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,
    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("?")]
    Question,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("^")]
    Caret,
    #[token("@")]
    At,
    #[token("`")]
    Backtick,

    // Operators (method names)
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("===")]
    EqEqEq,
    #[token("=~")]
    Match,
    #[token("!")]
    Bang,
    #[token("!=")]
    NotEq,
    #[token("!~")]
    NotMatch,
    #[token("~")]
    Tilde,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token("<=>")]
    Spaceship,
    #[token("<<")]
    LtLt,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token(">>")]
    GtGt,
}

/// Strip the quotes of a string literal and resolve the common escapes
fn unescape(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl Token {
    /// Source text of a keyword token. Keywords double as method names and
    /// keyword-parameter names (`def class: ...`, `type: String`).
    pub fn keyword_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::Class => "class",
            Token::Module => "module",
            Token::Interface => "interface",
            Token::End => "end",
            Token::Def => "def",
            Token::Include => "include",
            Token::Extend => "extend",
            Token::Prepend => "prepend",
            Token::Type => "type",
            Token::Alias => "alias",
            Token::AttrReader => "attr_reader",
            Token::AttrWriter => "attr_writer",
            Token::AttrAccessor => "attr_accessor",
            Token::Public => "public",
            Token::Private => "private",
            Token::Protected => "protected",
            Token::Unchecked => "unchecked",
            Token::In => "in",
            Token::Out => "out",
            Token::SelfKw => "self",
            Token::Instance => "instance",
            Token::Void => "void",
            Token::Untyped => "untyped",
            Token::Bool => "bool",
            Token::Top => "top",
            Token::Bot => "bot",
            Token::Nil => "nil",
            Token::True => "true",
            Token::False => "false",
            Token::Singleton => "singleton",
            _ => return None,
        })
    }

    /// Text of a token that can name an operator method
    pub fn operator_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::EqEq => "==",
            Token::EqEqEq => "===",
            Token::Match => "=~",
            Token::Bang => "!",
            Token::NotEq => "!=",
            Token::NotMatch => "!~",
            Token::Tilde => "~",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Spaceship => "<=>",
            Token::LtLt => "<<",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::GtGt => ">>",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Backtick => "`",
            _ => return None,
        })
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(text) = self.keyword_text().or_else(|| self.operator_text()) {
            return write!(f, "{text}");
        }
        match self {
            Token::IntLit(n) => write!(f, "{n}"),
            Token::StringLit(s) => write!(f, "{}", crate::ast::quote_literal(s)),
            Token::SymbolLit(s) => write!(f, "{}", crate::ast::Literal::Symbol(s.clone())),
            Token::Annotation(s) => write!(f, "%a{{{s}}}"),
            Token::Ident(s) | Token::IvarName(s) | Token::GlobalName(s) => write!(f, "{s}"),
            Token::ColonColon => write!(f, "::"),
            Token::Colon => write!(f, ":"),
            Token::Arrow => write!(f, "->"),
            Token::Ellipsis => write!(f, "..."),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Question => write!(f, "?"),
            Token::At => write!(f, "@"),
            Token::Eq => write!(f, "="),
            _ => write!(f, "{self:?}"),
        }
    }
}
