//! Line tokenizer for template source using logos
//!
//! A template line is text interleaved with code. Only three characters are
//! structural: `{`, `}` and `:`. Doubling a brace escapes it, and a colon is
//! only significant when it touches a brace (`{:` and `:}`).

use logos::Logos;

/// Byte range in a single template line
pub type Span = std::ops::Range<usize>;

/// Raw logos tokens. Longest match gives `{{`, `{:`, `}}` and `:}`
/// priority over their single-character prefixes.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[token("{")]
    CodeOpen,
    #[token("{:")]
    BlockCodeOpen,
    #[token("}")]
    CodeClose,
    #[token(":}")]
    BlockCodeClose,
    #[token(":")]
    Colon,
    #[token("{{")]
    EscapedOpen,
    #[token("}}")]
    EscapedClose,
    #[regex(r"[^{:}]+")]
    Text,
}

/// Kind of a template token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Literal text (including escaped braces and lone colons)
    Text,
    /// A full-line comment; never produced by [`tokenize`]
    Comment,
    /// `{` - enters code
    CodeOpen,
    /// `{:` - closes the current block and enters code
    BlockCodeOpen,
    /// `}` - leaves code
    CodeClose,
    /// `:}` - leaves code and opens a nested block
    BlockCodeClose,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Text => "text",
            TokenKind::Comment => "comment",
            TokenKind::CodeOpen => "'{'",
            TokenKind::BlockCodeOpen => "'{:'",
            TokenKind::CodeClose => "'}'",
            TokenKind::BlockCodeClose => "':}'",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed slice of one template line
///
/// `text` is the token's value (an escaped `{{` has the value `{`), while
/// `span` always covers the source characters the token was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, span: Span) -> Self {
        Self { kind, text, span }
    }

    /// A comment token covering a whole line
    pub fn comment(text: &'a str) -> Self {
        Self::new(TokenKind::Comment, text, 0..text.len())
    }

    pub fn is_text(&self) -> bool {
        self.kind == TokenKind::Text
    }
}

/// Split one line into tokens
///
/// The sequence is lazy and lossless: the spans of the yielded tokens tile
/// the whole line. A span that no rule accepts is yielded as `Err`.
pub fn tokenize(line: &str) -> impl Iterator<Item = Result<Token<'_>, Span>> + '_ {
    RawToken::lexer(line).spanned().map(move |(raw, span)| {
        let raw = raw.map_err(|_| span.clone())?;
        let token = match raw {
            RawToken::CodeOpen => Token::new(TokenKind::CodeOpen, &line[span.clone()], span),
            RawToken::BlockCodeOpen => {
                Token::new(TokenKind::BlockCodeOpen, &line[span.clone()], span)
            }
            RawToken::CodeClose => Token::new(TokenKind::CodeClose, &line[span.clone()], span),
            RawToken::BlockCodeClose => {
                Token::new(TokenKind::BlockCodeClose, &line[span.clone()], span)
            }
            RawToken::Colon | RawToken::Text => {
                Token::new(TokenKind::Text, &line[span.clone()], span)
            }
            // Escaped braces yield only the first character
            RawToken::EscapedOpen | RawToken::EscapedClose => {
                Token::new(TokenKind::Text, &line[span.start..span.start + 1], span)
            }
        };
        Ok(token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_text(line: &str) -> Vec<(TokenKind, &str)> {
        tokenize(line)
            .map(|t| t.expect("every character is covered"))
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_empty() {
        assert!(kinds_and_text("").is_empty());
    }

    #[test]
    fn test_text() {
        assert_eq!(
            kinds_and_text("some text"),
            vec![(TokenKind::Text, "some text")]
        );
    }

    #[test]
    fn test_text_with_escaped_braces() {
        assert_eq!(
            kinds_and_text("some {{ text }}"),
            vec![
                (TokenKind::Text, "some "),
                (TokenKind::Text, "{"),
                (TokenKind::Text, " text "),
                (TokenKind::Text, "}"),
            ]
        );
    }

    #[test]
    fn test_expression() {
        assert_eq!(
            kinds_and_text("some {variable} substitution"),
            vec![
                (TokenKind::Text, "some "),
                (TokenKind::CodeOpen, "{"),
                (TokenKind::Text, "variable"),
                (TokenKind::CodeClose, "}"),
                (TokenKind::Text, " substitution"),
            ]
        );
    }

    #[test]
    fn test_code_blocks() {
        assert_eq!(
            kinds_and_text("conditional: {if cond:} substitution {:else:} alternative {:}"),
            vec![
                (TokenKind::Text, "conditional"),
                (TokenKind::Text, ":"),
                (TokenKind::Text, " "),
                (TokenKind::CodeOpen, "{"),
                (TokenKind::Text, "if cond"),
                (TokenKind::BlockCodeClose, ":}"),
                (TokenKind::Text, " substitution "),
                (TokenKind::BlockCodeOpen, "{:"),
                (TokenKind::Text, "else"),
                (TokenKind::BlockCodeClose, ":}"),
                (TokenKind::Text, " alternative "),
                (TokenKind::BlockCodeOpen, "{:"),
                (TokenKind::CodeClose, "}"),
            ]
        );
    }

    #[test]
    fn test_brace_runs() {
        assert_eq!(
            kinds_and_text("{{{x}}}"),
            vec![
                (TokenKind::Text, "{"),
                (TokenKind::CodeOpen, "{"),
                (TokenKind::Text, "x"),
                (TokenKind::Text, "}"),
                (TokenKind::CodeClose, "}"),
            ]
        );
        assert_eq!(
            kinds_and_text("::}"),
            vec![(TokenKind::Text, ":"), (TokenKind::BlockCodeClose, ":}")]
        );
    }

    #[test]
    fn test_lossless_spans() {
        let line = "a: {b {{c}} :}{:d}} é";
        let mut end = 0;
        for token in tokenize(line) {
            let token = token.expect("every character is covered");
            assert_eq!(token.span.start, end);
            end = token.span.end;
        }
        assert_eq!(end, line.len());
    }
}
