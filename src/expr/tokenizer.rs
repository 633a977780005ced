//! logos-based expression tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `<=` beats `<` + `=`, `truely` is an
//!    identifier, not the `true` keyword)
//! 2. For equal length matches, earlier-defined variants win
//!
//! Our ordering ensures the two-character operators and the keyword
//! literals are defined before [`Token::Ident`] and the single-character
//! punctuation.

use logos::Logos;

/// Expression token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // ── Compound operators and keywords (defined first) ──────────────

    /// `==`
    #[token("==")]
    EqEq,

    /// `!=`
    #[token("!=")]
    NotEq,

    /// `<=`
    #[token("<=")]
    Le,

    /// `>=`
    #[token(">=")]
    Ge,

    /// `&&`
    #[token("&&")]
    AndAnd,

    /// `||`
    #[token("||")]
    OrOr,

    /// `true`
    #[token("true")]
    True,

    /// `false`
    #[token("false")]
    False,

    /// `null`
    #[token("null")]
    Null,

    /// Unsigned number literal; unary minus is the parser's business.
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    /// Double-quoted string literal (no escapes).
    #[regex(r#""[^"]*""#)]
    Str,

    /// Single-quoted string literal (no escapes).
    #[regex(r"'[^']*'")]
    StrSingle,

    /// Identifier: state keys, scope keys, host binding names.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Single-character punctuation ─────────────────────────────────

    /// `(`
    #[token("(")]
    ParenOpen,

    /// `)`
    #[token(")")]
    ParenClose,

    /// `[`
    #[token("[")]
    BracketOpen,

    /// `]`
    #[token("]")]
    BracketClose,

    /// `.`
    #[token(".")]
    Dot,

    /// `,`
    #[token(",")]
    Comma,

    /// `;`
    #[token(";")]
    Semicolon,

    /// `+`
    #[token("+")]
    Plus,

    /// `-`
    #[token("-")]
    Minus,

    /// `*`
    #[token("*")]
    Star,

    /// `/`
    #[token("/")]
    Slash,

    /// `%`
    #[token("%")]
    Percent,

    /// `<`
    #[token("<")]
    Lt,

    /// `>`
    #[token(">")]
    Gt,

    /// `=`
    #[token("=")]
    Assign,

    /// `!`
    #[token("!")]
    Bang,

    /// `?`
    #[token("?")]
    Question,

    /// `:`
    #[token(":")]
    Colon,
}

/// A token with its source text and byte offset, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub text: String,
    pub start: usize,
}

/// A byte range the lexer could not tokenize.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidToken {
    pub position: usize,
    pub text: String,
}

/// Tokenize an expression. Unlike a stylesheet, an expression with an
/// unlexable character is rejected outright rather than skipped.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, InvalidToken> {
    let lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    for (result, span) in lexer.spanned() {
        match result {
            Ok(token) => tokens.push(SpannedToken {
                token,
                text: input[span.clone()].to_owned(),
                start: span.start,
            }),
            Err(()) => {
                return Err(InvalidToken {
                    position: span.start,
                    text: input[span].to_owned(),
                })
            }
        }
    }
    Ok(tokens)
}
