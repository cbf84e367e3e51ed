//! Template compiler: lines in, depth-annotated instructions out
//!
//! Every template line is classified by its first two characters:
//!
//! - `# text` starts a new output line and continues with `text`,
//! - `= text` continues the current output line with `text`,
//! - anything else (including blank lines) is a comment.
//!
//! The remainder of a `#`/`=` line is tokenized and fed to a two-state
//! machine (text and code). The states flush their fragments into
//! [`Instruction`]s when left.

pub mod lexer;
pub mod program;
pub mod state;

pub use lexer::{tokenize, Token, TokenKind};
pub use program::{Instruction, Line, Program};
pub use state::{CodeState, State, TextState, Transition};

use crate::error::CompileError;

/// Output half of the compiler: instructions, depth and the current line
#[derive(Debug)]
pub struct Emitter {
    lines: Vec<Line>,
    depth: usize,
    base_depth: usize,
    line: usize,
    text: String,
}

impl Emitter {
    pub(crate) fn new(base_depth: usize) -> Self {
        Self {
            lines: Vec::new(),
            depth: base_depth,
            base_depth,
            line: 0,
            text: String::new(),
        }
    }

    /// Append an instruction at the current depth and line
    pub fn emit(&mut self, instruction: Instruction) {
        self.emit_at(self.line, instruction);
    }

    /// Append an instruction attributed to an earlier line
    pub fn emit_at(&mut self, line: usize, instruction: Instruction) {
        self.lines.push(Line {
            depth: self.depth,
            line,
            instruction,
        });
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Close the innermost block
    pub fn dedent(&mut self) -> Result<(), CompileError> {
        if self.depth <= self.base_depth {
            return Err(CompileError::UnbalancedBlock {
                line: self.line,
                text: self.text.clone(),
            });
        }
        self.depth -= 1;
        self.emit(Instruction::CloseBlock);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.lines.iter().map(|l| &l.instruction)
    }

    pub(crate) fn unexpected(&self, token: &Token<'_>, state: &'static str) -> CompileError {
        CompileError::UnexpectedToken {
            line: self.line,
            token: token.kind.to_string(),
            state,
            text: self.text.clone(),
        }
    }
}

/// Line-by-line template compiler
///
/// Built once per template source and consumed by [`Compiler::finish`].
#[derive(Debug)]
pub struct Compiler {
    state: State,
    out: Emitter,
}

impl Compiler {
    /// Create a compiler whose blocks nest from `base_depth`
    pub fn new(base_depth: usize) -> Self {
        Self {
            state: State::default(),
            out: Emitter::new(base_depth),
        }
    }

    /// Process one raw template line
    pub fn process(&mut self, raw_line: &str) -> Result<(), CompileError> {
        self.out.line += 1;
        self.out.text = raw_line.to_string();
        log::trace!("line {}: {:?}", self.out.line, raw_line);

        let line = raw_line.trim();
        if line.starts_with("# ") || line == "#" {
            self.state.newline();
            self.process_rest(line.get(2..).unwrap_or(""))
        } else if line.starts_with("= ") || line == "=" {
            self.process_rest(line.get(2..).unwrap_or(""))
        } else if let Some(prefix) = line.chars().next().filter(|c| *c == '#' || *c == '=') {
            Err(CompileError::MalformedLine {
                line: self.out.line,
                prefix,
                text: raw_line.to_string(),
            })
        } else {
            let transition = self.state.process(&Token::comment(line), &mut self.out)?;
            self.apply(transition)
        }
    }

    fn process_rest(&mut self, rest: &str) -> Result<(), CompileError> {
        let mut tokens = Vec::new();
        for token in tokenize(rest) {
            match token {
                Ok(token) => tokens.push(token),
                Err(span) => {
                    return Err(CompileError::UnexpectedToken {
                        line: self.out.line,
                        token: format!("{:?}", &rest[span]),
                        state: self.state.name(),
                        text: self.out.text.clone(),
                    })
                }
            }
        }

        // Lines carrying structure are kept as documentation
        if !tokens.iter().all(Token::is_text) {
            let transition = self.state.process(&Token::comment(rest), &mut self.out)?;
            self.apply(transition)?;
        }
        for token in &tokens {
            let transition = self.state.process(token, &mut self.out)?;
            self.apply(transition)?;
        }
        Ok(())
    }

    fn apply(&mut self, transition: Transition) -> Result<(), CompileError> {
        match transition {
            Transition::Stay => Ok(()),
            Transition::EnterCode { dedent } => {
                let code = CodeState::new(self.out.line, self.out.text.clone());
                self.enter(State::Code(code))?;
                if dedent {
                    self.dedent()?;
                }
                Ok(())
            }
            Transition::EnterText => self.enter(State::Text(TextState::new())),
        }
    }

    /// Flush the current state and switch to `state`
    pub fn enter(&mut self, state: State) -> Result<(), CompileError> {
        self.state.flush(&mut self.out)?;
        self.state = state;
        Ok(())
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.out.emit(instruction);
    }

    pub fn indent(&mut self) {
        self.out.indent();
    }

    pub fn dedent(&mut self) -> Result<(), CompileError> {
        self.out.dedent()
    }

    /// Flush pending fragments and return the finished program
    ///
    /// Blocks still open at the end of input are closed here.
    pub fn finish(mut self) -> Result<Program, CompileError> {
        if let State::Code(code) = &self.state {
            return Err(code.unterminated());
        }
        self.state.flush(&mut self.out)?;
        while self.out.depth > self.out.base_depth {
            self.out.dedent()?;
        }
        Ok(Program::new(self.out.base_depth, self.out.lines))
    }
}

/// Compile a whole template source
pub fn compile_program(source: &str, base_depth: usize) -> Result<Program, CompileError> {
    let mut compiler = Compiler::new(base_depth);
    for line in source.lines() {
        compiler.process(line)?;
    }
    let program = compiler.finish()?;
    log::debug!("compiled {} instructions", program.len());
    Ok(program)
}
