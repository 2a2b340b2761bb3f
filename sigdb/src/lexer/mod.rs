//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{Result, SigError};
use logos::Logos;

/// Tokenize a declaration file
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(SigError::lexer(
                    format!("unexpected character: {:?}", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_empty() {
        let tokens = tokenize("").unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("def to_s: () -> String").unwrap();
        assert_eq!(tokens[0], (Token::Def, Span::new(0, 3)));
        assert_eq!(tokens[1], (Token::Ident("to_s".into()), Span::new(4, 8)));
        assert_eq!(tokens[2], (Token::Colon, Span::new(8, 9)));
    }

    #[test]
    fn test_tokenize_method_suffix_is_adjacent() {
        let tokens = tokenize("empty? map !").unwrap();
        assert!(tokens[0].1.touches(tokens[1].1));
        assert!(!tokens[2].1.touches(tokens[3].1));
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        let err = tokenize("class Foo; end").unwrap_err();
        assert_eq!(err.span(), Some(Span::new(9, 10)));
        assert!(err.message().contains("unexpected character"));
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        assert!(tokenize("X: \"abc").is_err());
    }
}
