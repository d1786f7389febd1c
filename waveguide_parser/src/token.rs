//! Token definitions for the Waveguide lexer.

use logos::Logos;

/// Waveguide tokens.
///
/// Whitespace (including newlines) is insignificant; statements are
/// terminated with `;`. Line comments run from `#` to end of line.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // ==================== Keywords ====================
    #[token("def")]
    KwDef,
    #[token("if")]
    KwIf,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("in")]
    KwIn,
    #[token("while")]
    KwWhile,
    #[token("return")]
    KwReturn,
    #[token("none")]
    KwNone,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,

    // Word operators
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("xor")]
    KwXor,
    #[token("band")]
    KwBand,
    #[token("bor")]
    KwBor,
    #[token("bxor")]
    KwBxor,

    // ==================== Literals ====================
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLiteral,
    #[regex(r"[0-9]+")]
    IntLiteral,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // ==================== Operators ====================
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Assign,

    // ==================== Punctuation ====================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
}

impl Token {
    /// Human-readable description used in parse error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::KwDef => "`def`",
            Token::KwIf => "`if`",
            Token::KwElif => "`elif`",
            Token::KwElse => "`else`",
            Token::KwFor => "`for`",
            Token::KwIn => "`in`",
            Token::KwWhile => "`while`",
            Token::KwReturn => "`return`",
            Token::KwNone => "`none`",
            Token::KwTrue => "`true`",
            Token::KwFalse => "`false`",
            Token::KwAnd => "`and`",
            Token::KwOr => "`or`",
            Token::KwXor => "`xor`",
            Token::KwBand => "`band`",
            Token::KwBor => "`bor`",
            Token::KwBxor => "`bxor`",
            Token::FloatLiteral => "float literal",
            Token::IntLiteral => "integer literal",
            Token::Identifier => "identifier",
            Token::EqEq => "`==`",
            Token::NotEq => "`!=`",
            Token::LtEq => "`<=`",
            Token::GtEq => "`>=`",
            Token::Lt => "`<`",
            Token::Gt => "`>`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::Slash => "`/`",
            Token::Percent => "`%`",
            Token::Assign => "`=`",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::Comma => "`,`",
            Token::Colon => "`:`",
            Token::Semicolon => "`;`",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logos::Logos;

    fn kinds(source: &str) -> Vec<Token> {
        Token::lexer(source).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_keywords_beat_identifiers() {
        assert_eq!(
            kinds("def f for in"),
            vec![Token::KwDef, Token::Identifier, Token::KwFor, Token::KwIn]
        );
    }

    #[test]
    fn test_float_beats_int() {
        assert_eq!(kinds("3.5"), vec![Token::FloatLiteral]);
        assert_eq!(kinds("35"), vec![Token::IntLiteral]);
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("== != <= >= < > ="),
            vec![
                Token::EqEq,
                Token::NotEq,
                Token::LtEq,
                Token::GtEq,
                Token::Lt,
                Token::Gt,
                Token::Assign,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a # the rest is noise\nb"),
            vec![Token::Identifier, Token::Identifier]
        );
    }
}
