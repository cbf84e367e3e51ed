//! Lowering of a depth-annotated program into an executable tree
//!
//! `OpenBlock`/`CloseBlock` pairs become nested bodies and every code
//! fragment is parsed here, so a template that lowers without error only
//! fails at render time on evaluation errors.

use std::sync::Arc;

use crate::code::{parse_expression, parse_header, Expr, Header, ParamDecl, SyntaxError};
use crate::compiler::{Instruction, Line, Program};
use crate::error::CompileError;
use crate::template::Signature;

/// An executable node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(String),
    Expression(Located<Expr>),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    For {
        header: Located<()>,
        targets: Vec<String>,
        iter: Expr,
        body: Vec<Node>,
    },
    Def(Arc<Routine>),
}

/// A parsed fragment with the source line and code it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub line: usize,
    pub code: String,
    pub item: T,
}

/// `if`/`elif` condition and its body
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub cond: Located<Expr>,
    pub body: Vec<Node>,
}

/// A local routine declared with `def`
#[derive(Debug, PartialEq)]
pub struct Routine {
    pub header: Located<()>,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub body: Vec<Node>,
}

fn invalid(line: &Line, code: &str, err: SyntaxError) -> CompileError {
    CompileError::InvalidCode {
        line: line.line,
        code: code.to_string(),
        message: err.message,
    }
}

fn misplaced(line: &Line, code: &str, keyword: &str) -> CompileError {
    CompileError::InvalidCode {
        line: line.line,
        code: code.to_string(),
        message: format!("'{}' must directly follow an 'if' block", keyword),
    }
}

/// Build the executable tree of a compiled program
pub fn lower(program: &Program) -> Result<Arc<[Node]>, CompileError> {
    let mut lines = program.lines().iter();
    let nodes = lower_body(&mut lines, false)?;
    log::debug!("lowered {} top-level nodes", nodes.len());
    Ok(nodes.into())
}

fn lower_body<'a>(
    lines: &mut impl Iterator<Item = &'a Line>,
    nested: bool,
) -> Result<Vec<Node>, CompileError> {
    let mut nodes = Vec::new();
    while let Some(line) = lines.next() {
        match &line.instruction {
            Instruction::EmitLiteral(text) => nodes.push(Node::Literal(text.clone())),
            Instruction::EmitExpression(code) => {
                let expr = parse_expression(code).map_err(|e| invalid(line, code, e))?;
                nodes.push(Node::Expression(Located {
                    line: line.line,
                    code: code.clone(),
                    item: expr,
                }));
            }
            Instruction::EmitRawLine(_) => {}
            Instruction::CloseBlock if nested => return Ok(nodes),
            Instruction::CloseBlock => {
                return Err(CompileError::UnbalancedBlock {
                    line: line.line,
                    text: String::new(),
                })
            }
            Instruction::OpenBlock(code) => {
                let header = parse_header(code).map_err(|e| invalid(line, code, e))?;
                let body = lower_body(lines, true)?;
                let located = |item| Located {
                    line: line.line,
                    code: code.clone(),
                    item,
                };
                match header {
                    Header::If(cond) => nodes.push(Node::If {
                        branches: vec![Branch {
                            cond: located(cond),
                            body,
                        }],
                        otherwise: None,
                    }),
                    Header::Elif(cond) => match nodes.last_mut() {
                        Some(Node::If {
                            branches,
                            otherwise: None,
                        }) => branches.push(Branch {
                            cond: located(cond),
                            body,
                        }),
                        _ => return Err(misplaced(line, code, "elif")),
                    },
                    Header::Else => match nodes.last_mut() {
                        Some(Node::If { otherwise, .. }) if otherwise.is_none() => {
                            *otherwise = Some(body)
                        }
                        _ => return Err(misplaced(line, code, "else")),
                    },
                    Header::For { targets, iter } => nodes.push(Node::For {
                        header: Located {
                            line: line.line,
                            code: code.clone(),
                            item: (),
                        },
                        targets,
                        iter,
                        body,
                    }),
                    Header::Def { name, params } => {
                        Signature::validate(&params).map_err(|e| CompileError::InvalidCode {
                            line: line.line,
                            code: code.clone(),
                            message: e.to_string(),
                        })?;
                        nodes.push(Node::Def(Arc::new(Routine {
                            header: Located {
                                line: line.line,
                                code: code.clone(),
                                item: (),
                            },
                            name,
                            params,
                            body,
                        })))
                    }
                }
            }
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_program;

    fn lowered(source: &str) -> Result<Arc<[Node]>, CompileError> {
        let program = compile_program(source, 0).expect("Should compile");
        lower(&program)
    }

    #[test]
    fn test_comments_are_dropped() {
        let nodes = lowered("doc line\n= {x}").expect("Should lower");
        assert_eq!(nodes.len(), 1);
        assert!(matches!(nodes[0], Node::Expression(_)));
    }

    #[test]
    fn test_if_elif_else_chain() {
        let nodes = lowered("= {if a:}1{:elif b:}2{:else:}3{:}").expect("Should lower");
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::If {
                branches,
                otherwise,
            } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[1].cond.code, "elif b");
                assert_eq!(
                    otherwise.as_deref(),
                    Some(&[Node::Literal("3".to_string())][..])
                );
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_blocks() {
        let nodes = lowered("= {for x in xs:}{if x:}{x}{:}{:}").expect("Should lower");
        match &nodes[0] {
            Node::For { targets, body, .. } => {
                assert_eq!(targets, &vec!["x".to_string()]);
                assert!(matches!(body[0], Node::If { .. }));
            }
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_def() {
        let nodes = lowered("= {def twice(s):}{s}{s}{:}").expect("Should lower");
        match &nodes[0] {
            Node::Def(routine) => {
                assert_eq!(routine.name, "twice");
                assert_eq!(routine.params.len(), 1);
                assert_eq!(routine.body.len(), 2);
            }
            other => panic!("Expected def, got {:?}", other),
        }
    }

    #[test]
    fn test_misplaced_else() {
        let err = lowered("= {for x in xs:}{x}{:else:}none{:}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidCode { line: 1, .. }));
        let err = lowered("= x{else:}y{:}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidCode { .. }));
    }

    #[test]
    fn test_invalid_code_reports_line() {
        let err = lowered("= ok\n= {1 +}").unwrap_err();
        assert!(matches!(
            err,
            CompileError::InvalidCode { line: 2, ref code, .. } if code == "1 +"
        ));
        let err = lowered("= {while x:}{:}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidCode { line: 1, .. }));
        let err = lowered("= {def f(a, a):}{:}").unwrap_err();
        assert!(matches!(err, CompileError::InvalidCode { line: 1, .. }));
    }
}
