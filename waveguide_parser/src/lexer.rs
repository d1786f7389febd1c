//! Lexer for Waveguide source code.
//!
//! Wraps the logos-generated lexer, attaching spans and source text to each
//! token.

use logos::Logos;

use crate::error::{ParseError, ParseResult};
use crate::span::Span;
use crate::token::Token;

/// A token with its span and source text.
#[derive(Debug, Clone)]
pub struct SpannedToken<'a> {
    pub token: Token,
    pub span: Span,
    pub text: &'a str,
}

/// Waveguide lexer.
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, Token>,
}

impl<'a> std::fmt::Debug for Lexer<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer").field("source", &self.source).finish()
    }
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: Token::lexer(source),
        }
    }

    /// Get the source code.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<ParseResult<SpannedToken<'a>>> {
        let result = self.inner.next()?;
        let span = Span::from(self.inner.span());
        Some(match result {
            Ok(token) => Ok(SpannedToken {
                token,
                span,
                text: self.inner.slice(),
            }),
            Err(()) => Err(ParseError::UnexpectedCharacter { offset: span.start }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_cover_source() {
        let mut lexer = Lexer::new("ab + 1");
        let a = lexer.next_token().unwrap().unwrap();
        assert_eq!(a.text, "ab");
        assert_eq!(a.span, Span::new(0, 2));
        let plus = lexer.next_token().unwrap().unwrap();
        assert_eq!(plus.token, Token::Plus);
        let one = lexer.next_token().unwrap().unwrap();
        assert_eq!(one.span, Span::new(5, 6));
        assert!(lexer.next_token().is_none());
    }

    #[test]
    fn test_unknown_character_is_reported() {
        let mut lexer = Lexer::new("a $ b");
        assert!(lexer.next_token().unwrap().is_ok());
        let err = lexer.next_token().unwrap().unwrap_err();
        assert_eq!(err, ParseError::UnexpectedCharacter { offset: 2 });
    }
}
