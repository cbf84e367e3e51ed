//! Lexer for code fragments using logos

use logos::Logos;

/// Byte range in a code fragment
pub type Span = std::ops::Range<usize>;

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
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
            Some(other @ ('\\' | '\'' | '"')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Keywords
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("def")]
    Def,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("None")]
    NoneLit,
    #[token("True")]
    True,
    #[token("False")]
    False,

    // Operators (longer patterns first)
    #[token("**")]
    StarStar,
    #[token("//")]
    SlashSlash,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
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

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "name '{}'", s),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Int(n) => write!(f, "number {}", n),
            Token::Float(n) => write!(f, "number {}", n),
            other => {
                let text = match other {
                    Token::If => "if",
                    Token::Elif => "elif",
                    Token::Else => "else",
                    Token::For => "for",
                    Token::In => "in",
                    Token::Def => "def",
                    Token::Not => "not",
                    Token::And => "and",
                    Token::Or => "or",
                    Token::NoneLit => "None",
                    Token::True => "True",
                    Token::False => "False",
                    Token::StarStar => "**",
                    Token::SlashSlash => "//",
                    Token::EqEq => "==",
                    Token::NotEq => "!=",
                    Token::LessEq => "<=",
                    Token::GreaterEq => ">=",
                    Token::Less => "<",
                    Token::Greater => ">",
                    Token::Plus => "+",
                    Token::Minus => "-",
                    Token::Star => "*",
                    Token::Slash => "/",
                    Token::Percent => "%",
                    Token::Assign => "=",
                    Token::ParenOpen => "(",
                    Token::ParenClose => ")",
                    Token::BracketOpen => "[",
                    Token::BracketClose => "]",
                    Token::BraceOpen => "{",
                    Token::BraceClose => "}",
                    Token::Comma => ",",
                    Token::Colon => ":",
                    Token::Dot => ".",
                    Token::Ident(_) | Token::Str(_) | Token::Int(_) | Token::Float(_) => "",
                };
                write!(f, "'{}'", text)
            }
        }
    }
}

/// Lex a code fragment; the first unrecognised character is an error
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, Span> {
    Token::lexer(input)
        .spanned()
        .map(|(tok, span)| match tok {
            Ok(tok) => Ok((tok, span)),
            Err(()) => Err(span),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input)
            .expect("Should lex")
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("if iffy in inner not"),
            vec![
                Token::If,
                Token::Ident("iffy".to_string()),
                Token::In,
                Token::Ident("inner".to_string()),
                Token::Not,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("n // 2 ** 3 == 4 != 5"),
            vec![
                Token::Ident("n".to_string()),
                Token::SlashSlash,
                Token::Int(2),
                Token::StarStar,
                Token::Int(3),
                Token::EqEq,
                Token::Int(4),
                Token::NotEq,
                Token::Int(5),
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            tokens(r#"'it\'s' "a\tb" ''"#),
            vec![
                Token::Str("it's".to_string()),
                Token::Str("a\tb".to_string()),
                Token::Str(String::new()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("42 3.5 -1"),
            vec![
                Token::Int(42),
                Token::Float(3.5),
                Token::Minus,
                Token::Int(1)
            ]
        );
    }

    #[test]
    fn test_unknown_character() {
        assert_eq!(lex("a $ b"), Err(2..3));
    }
}
