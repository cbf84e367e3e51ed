//! Compiler output: a depth-annotated instruction sequence

use std::fmt;

/// A single compiler instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Append literal text to the output
    EmitLiteral(String),
    /// Evaluate an expression and append its wrapped value
    EmitExpression(String),
    /// Template source copied through as documentation
    EmitRawLine(String),
    /// A control-flow header; the following deeper instructions are its body
    OpenBlock(String),
    /// End of the body opened by the matching `OpenBlock`
    CloseBlock,
}

/// An instruction with its nesting depth and 1-based template line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub depth: usize,
    pub line: usize,
    pub instruction: Instruction,
}

/// A complete compiled template body
///
/// Every `OpenBlock` is followed by a `CloseBlock` at the same depth, and no
/// instruction sits below `base_depth`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    base_depth: usize,
    lines: Vec<Line>,
}

impl Program {
    pub(crate) fn new(base_depth: usize, lines: Vec<Line>) -> Self {
        Self { base_depth, lines }
    }

    pub fn base_depth(&self) -> usize {
        self.base_depth
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Iterate over the bare instructions
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.lines.iter().map(|l| &l.instruction)
    }
}

/// Listing in the shape of the routine the program stands for
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for line in &self.lines {
            let text = match &line.instruction {
                Instruction::EmitLiteral(s) => format!("output({:?})", s),
                Instruction::EmitExpression(code) => format!("output_value({})", code),
                Instruction::EmitRawLine(s) if s.is_empty() => "#".to_string(),
                Instruction::EmitRawLine(s) => format!("# {}", s),
                Instruction::OpenBlock(code) => format!("{}:", code),
                Instruction::CloseBlock => continue,
            };
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{}{}", "    ".repeat(line.depth), text)?;
        }
        Ok(())
    }
}
