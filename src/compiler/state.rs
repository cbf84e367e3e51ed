//! The two compiler states: literal text and code
//!
//! Each state buffers fragments and turns them into instructions when it is
//! left (`flush`). Transitions are returned to the compiler, which flushes
//! the old state before the new one takes over.

use crate::compiler::lexer::{Token, TokenKind};
use crate::compiler::program::Instruction;
use crate::compiler::Emitter;
use crate::error::CompileError;

/// What the compiler must do after a token was processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    /// Flush, switch to code, then optionally close the current block
    EnterCode { dedent: bool },
    /// Flush and switch back to text
    EnterText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Text(String),
    Comment(String),
}

/// Accumulates literal output
#[derive(Debug, Default)]
pub struct TextState {
    fragments: Vec<Fragment>,
}

impl TextState {
    pub fn new() -> Self {
        Self::default()
    }

    fn process(&mut self, token: &Token<'_>, out: &Emitter) -> Result<Transition, CompileError> {
        match token.kind {
            TokenKind::Text => {
                self.fragments.push(Fragment::Text(token.text.to_string()));
                Ok(Transition::Stay)
            }
            TokenKind::Comment => {
                self.fragments.push(Fragment::Comment(token.text.to_string()));
                Ok(Transition::Stay)
            }
            TokenKind::CodeOpen => Ok(Transition::EnterCode { dedent: false }),
            TokenKind::BlockCodeOpen => Ok(Transition::EnterCode { dedent: true }),
            TokenKind::CodeClose | TokenKind::BlockCodeClose => {
                Err(out.unexpected(token, "text"))
            }
        }
    }

    fn newline(&mut self) {
        self.fragments.push(Fragment::Text("\n".to_string()));
    }

    /// One literal per text piece, comments in between kept in order
    fn flush(&mut self, out: &mut Emitter) {
        for fragment in self.fragments.drain(..) {
            match fragment {
                Fragment::Text(text) => out.emit(Instruction::EmitLiteral(text)),
                Fragment::Comment(text) => {
                    out.emit(Instruction::EmitRawLine(text.trim().to_string()))
                }
            }
        }
    }
}

/// Accumulates an expression or a block header
#[derive(Debug)]
pub struct CodeState {
    fragments: Vec<String>,
    block: bool,
    opened_at: usize,
    opened_text: String,
}

impl CodeState {
    /// Start a code region on the given 1-based line with its raw text
    pub fn new(opened_at: usize, opened_text: impl Into<String>) -> Self {
        Self {
            fragments: Vec::new(),
            block: false,
            opened_at,
            opened_text: opened_text.into(),
        }
    }

    /// The error for input that ends inside this region
    pub fn unterminated(&self) -> CompileError {
        CompileError::UnterminatedBlock {
            line: self.opened_at,
            text: self.opened_text.clone(),
        }
    }

    fn process(
        &mut self,
        token: &Token<'_>,
        out: &mut Emitter,
    ) -> Result<Transition, CompileError> {
        match token.kind {
            TokenKind::Text => {
                let code = token.text.trim();
                if !code.is_empty() {
                    self.fragments.push(code.to_string());
                }
                Ok(Transition::Stay)
            }
            // Comments pass straight through; they never join the code
            TokenKind::Comment => {
                out.emit(Instruction::EmitRawLine(token.text.trim().to_string()));
                Ok(Transition::Stay)
            }
            TokenKind::CodeClose => Ok(Transition::EnterText),
            TokenKind::BlockCodeClose => {
                self.block = true;
                Ok(Transition::EnterText)
            }
            TokenKind::CodeOpen | TokenKind::BlockCodeOpen => Err(out.unexpected(token, "code")),
        }
    }

    fn flush(&mut self, out: &mut Emitter) -> Result<(), CompileError> {
        let code = self.fragments.join(" ");
        self.fragments.clear();
        if self.block {
            if code.is_empty() {
                return Err(CompileError::EmptyBlockHeader {
                    line: self.opened_at,
                    text: self.opened_text.clone(),
                });
            }
            out.emit_at(self.opened_at, Instruction::OpenBlock(code));
            out.indent();
        } else if !code.is_empty() {
            out.emit_at(self.opened_at, Instruction::EmitExpression(code));
        }
        self.block = false;
        Ok(())
    }
}

/// The current compiler state
#[derive(Debug)]
pub enum State {
    Text(TextState),
    Code(CodeState),
}

impl Default for State {
    fn default() -> Self {
        State::Text(TextState::new())
    }
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Text(_) => "text",
            State::Code(_) => "code",
        }
    }

    /// Dispatch a token on the state's transition table
    pub(crate) fn process(
        &mut self,
        token: &Token<'_>,
        out: &mut Emitter,
    ) -> Result<Transition, CompileError> {
        match self {
            State::Text(state) => state.process(token, out),
            State::Code(state) => state.process(token, out),
        }
    }

    /// A `# ` line starts: text gets a newline, code ignores it
    pub(crate) fn newline(&mut self) {
        if let State::Text(state) = self {
            state.newline();
        }
    }

    pub(crate) fn flush(&mut self, out: &mut Emitter) -> Result<(), CompileError> {
        match self {
            State::Text(state) => {
                state.flush(out);
                Ok(())
            }
            State::Code(state) => state.flush(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Span;

    fn token(kind: TokenKind, text: &str) -> Token<'_> {
        let span: Span = 0..text.len();
        Token::new(kind, text, span)
    }

    #[test]
    fn test_text_buffers_until_flush() {
        let mut out = Emitter::new(0);
        let mut state = State::default();
        assert_eq!(
            state.process(&token(TokenKind::Text, "a"), &mut out),
            Ok(Transition::Stay)
        );
        state.newline();
        assert!(out.is_empty());
        state.flush(&mut out).expect("text flush cannot fail");
        let emitted: Vec<_> = out.instructions().cloned().collect();
        assert_eq!(
            emitted,
            vec![
                Instruction::EmitLiteral("a".to_string()),
                Instruction::EmitLiteral("\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_text_pieces_keep_comment_order() {
        let mut out = Emitter::new(0);
        let mut state = State::default();
        for (kind, text) in [(TokenKind::Text, "a"), (TokenKind::Comment, " note ")] {
            state
                .process(&token(kind, text), &mut out)
                .expect("text and comments are accepted in text");
        }
        state.newline();
        state
            .process(&token(TokenKind::Text, "b"), &mut out)
            .expect("text is accepted in text");
        state.flush(&mut out).expect("text flush cannot fail");
        let emitted: Vec<_> = out.instructions().cloned().collect();
        assert_eq!(
            emitted,
            vec![
                Instruction::EmitLiteral("a".to_string()),
                Instruction::EmitRawLine("note".to_string()),
                Instruction::EmitLiteral("\n".to_string()),
                Instruction::EmitLiteral("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_close_in_text_is_rejected() {
        let mut out = Emitter::new(0);
        let mut state = State::default();
        let err = state
            .process(&token(TokenKind::CodeClose, "}"), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnexpectedToken { state: "text", .. }
        ));
    }

    #[test]
    fn test_open_in_code_is_rejected() {
        let mut out = Emitter::new(0);
        let mut state = State::Code(CodeState::new(1, "= {a}"));
        let err = state
            .process(&token(TokenKind::CodeOpen, "{"), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnexpectedToken { state: "code", .. }
        ));
    }

    #[test]
    fn test_code_joins_fragments() {
        let mut out = Emitter::new(0);
        let mut state = State::Code(CodeState::new(1, "= {a}"));
        for text in ["  a +", "", "b  "] {
            state
                .process(&token(TokenKind::Text, text), &mut out)
                .expect("text is accepted in code");
        }
        state.flush(&mut out).expect("expression flush");
        let emitted: Vec<_> = out.instructions().cloned().collect();
        assert_eq!(
            emitted,
            vec![Instruction::EmitExpression("a + b".to_string())]
        );
    }

    #[test]
    fn test_comment_in_code_is_emitted_immediately() {
        let mut out = Emitter::new(0);
        let mut state = State::Code(CodeState::new(1, "= {a}"));
        state
            .process(&token(TokenKind::Comment, "  note "), &mut out)
            .expect("comments are accepted in code");
        let emitted: Vec<_> = out.instructions().cloned().collect();
        assert_eq!(emitted, vec![Instruction::EmitRawLine("note".to_string())]);
    }

    #[test]
    fn test_empty_block_header() {
        let mut out = Emitter::new(0);
        let mut state = State::Code(CodeState::new(4, "# {::}"));
        state
            .process(&token(TokenKind::BlockCodeClose, ":}"), &mut out)
            .expect("block close is accepted in code");
        assert_eq!(
            state.flush(&mut out),
            Err(CompileError::EmptyBlockHeader {
                line: 4,
                text: "# {::}".to_string(),
            })
        );
    }
}
