//! Parser for code fragments using chumsky

use chumsky::error::RichPattern;
use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::code::ast::*;
use crate::code::lexer::{lex, Token};
use crate::code::SyntaxError;

type Extra<'a> = extra::Err<Rich<'a, Token>>;

/// Postfix operations folded onto an atom
enum Postfix {
    Call(Vec<Argument>),
    Index(Expr),
    Attribute(String),
}

fn fold_binary((first, rest): (Expr, Vec<(BinaryOp, Expr)>)) -> Expr {
    rest.into_iter()
        .fold(first, |lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
}

/// `a ** b ** c` groups to the right
fn fold_power((base, exponents): (Expr, Vec<Expr>)) -> Expr {
    let mut operands = exponents;
    let mut acc = match operands.pop() {
        Some(last) => last,
        None => return base,
    };
    while let Some(lhs) = operands.pop() {
        acc = Expr::binary(BinaryOp::Pow, lhs, acc);
    }
    Expr::binary(BinaryOp::Pow, base, acc)
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, Expr, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let ident = select! {
            Token::Ident(s) => s,
        };

        let literal = select! {
            Token::Int(n) => Literal::Int(n),
            Token::Float(x) => Literal::Float(x),
            Token::Str(s) => Literal::Str(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::NoneLit => Literal::None,
        }
        .map(Expr::Literal);

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expr::List);

        let dict = expr
            .clone()
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(Expr::Dict);

        let parens = expr
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let atom = choice((literal, ident.clone().map(Expr::Name), list, dict, parens)).boxed();

        // Keyword arguments must be tried before plain expressions
        let argument = choice((
            ident
                .clone()
                .then_ignore(just(Token::Assign))
                .then(expr.clone())
                .map(|(name, value)| Argument::Keyword(name, value)),
            expr.clone().map(Argument::Positional),
        ));

        let postfix_op = choice((
            argument
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
                .map(Postfix::Call),
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Postfix::Index),
            just(Token::Dot).ignore_then(ident).map(Postfix::Attribute),
        ));

        let postfix = atom
            .then(postfix_op.repeated().collect::<Vec<_>>())
            .map(|(base, ops)| {
                ops.into_iter().fold(base, |acc, op| match op {
                    Postfix::Call(args) => Expr::Call {
                        callee: Box::new(acc),
                        args,
                    },
                    Postfix::Index(index) => Expr::Index(Box::new(acc), Box::new(index)),
                    Postfix::Attribute(name) => Expr::Attribute(Box::new(acc), name),
                })
            })
            .boxed();

        let power = postfix
            .clone()
            .then(
                just(Token::StarStar)
                    .ignore_then(postfix)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(fold_power);

        let unary = choice((
            just(Token::Minus).to(UnaryOp::Neg),
            just(Token::Plus).to(UnaryOp::Pos),
        ))
        .repeated()
        .collect::<Vec<_>>()
        .then(power)
        .map(|(ops, operand)| {
            ops.into_iter()
                .rev()
                .fold(operand, |acc, op| Expr::unary(op, acc))
        })
        .boxed();

        let product = unary
            .clone()
            .then(
                choice((
                    just(Token::Star).to(BinaryOp::Mul),
                    just(Token::Slash).to(BinaryOp::Div),
                    just(Token::SlashSlash).to(BinaryOp::FloorDiv),
                    just(Token::Percent).to(BinaryOp::Mod),
                ))
                .then(unary)
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let sum = product
            .clone()
            .then(
                choice((
                    just(Token::Plus).to(BinaryOp::Add),
                    just(Token::Minus).to(BinaryOp::Sub),
                ))
                .then(product)
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let comparison = sum
            .clone()
            .then(
                choice((
                    just(Token::EqEq).to(BinaryOp::Eq),
                    just(Token::NotEq).to(BinaryOp::NotEq),
                    just(Token::LessEq).to(BinaryOp::LessEq),
                    just(Token::GreaterEq).to(BinaryOp::GreaterEq),
                    just(Token::Less).to(BinaryOp::Less),
                    just(Token::Greater).to(BinaryOp::Greater),
                    just(Token::Not).then(just(Token::In)).to(BinaryOp::NotIn),
                    just(Token::In).to(BinaryOp::In),
                ))
                .then(sum)
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let negation = just(Token::Not)
            .repeated()
            .collect::<Vec<_>>()
            .then(comparison)
            .map(|(nots, operand)| {
                nots.into_iter()
                    .fold(operand, |acc, _| Expr::unary(UnaryOp::Not, acc))
            })
            .boxed();

        let conjunction = negation
            .clone()
            .then(
                just(Token::And)
                    .to(BinaryOp::And)
                    .then(negation)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let disjunction = conjunction
            .clone()
            .then(
                just(Token::Or)
                    .to(BinaryOp::Or)
                    .then(conjunction)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        // `then if cond else otherwise`
        disjunction
            .clone()
            .then(
                just(Token::If)
                    .ignore_then(disjunction)
                    .then_ignore(just(Token::Else))
                    .then(expr)
                    .or_not(),
            )
            .map(|(then, branch)| match branch {
                Some((cond, otherwise)) => Expr::Conditional {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
                None => then,
            })
            .boxed()
    })
}

fn params_parser<'a, I>() -> impl Parser<'a, I, Vec<ParamDecl>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let ident = select! {
        Token::Ident(s) => s,
    };

    just(Token::Star)
        .or_not()
        .then(ident)
        .then(just(Token::Assign).ignore_then(expr_parser()).or_not())
        .map(|((star, name), default)| ParamDecl {
            name,
            default,
            variadic: star.is_some(),
        })
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
}

fn header_parser<'a, I>() -> impl Parser<'a, I, Header, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let ident = select! {
        Token::Ident(s) => s,
    };

    let for_header = just(Token::For)
        .ignore_then(
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .then_ignore(just(Token::In))
        .then(expr_parser())
        .map(|(targets, iter)| Header::For { targets, iter });

    let def_header = just(Token::Def)
        .ignore_then(ident)
        .then(params_parser().delimited_by(just(Token::ParenOpen), just(Token::ParenClose)))
        .map(|(name, params)| Header::Def { name, params });

    choice((
        just(Token::If).ignore_then(expr_parser()).map(Header::If),
        just(Token::Elif).ignore_then(expr_parser()).map(Header::Elif),
        just(Token::Else).to(Header::Else),
        for_header,
        def_header,
    ))
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    tok.to_string()
}

fn syntax_error(err: &Rich<'_, Token>) -> SyntaxError {
    let found = match err.found() {
        Some(tok) => format_token(tok),
        None => "end of input".to_string(),
    };
    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            RichPattern::Token(tok) => Some(format_token(tok)),
            RichPattern::Label(label) => Some(label.to_string()),
            RichPattern::EndOfInput => Some("end of input".to_string()),
            _ => None,
        })
        .collect();

    let message = if expected.is_empty() {
        format!("unexpected {}", found)
    } else {
        format!("unexpected {}, expected {}", found, expected.join(" or "))
    };
    SyntaxError {
        message,
        span: err.span().into_range(),
    }
}

fn lex_error(input: &str, span: std::ops::Range<usize>) -> SyntaxError {
    SyntaxError {
        message: format!("unexpected character {:?}", &input[span.clone()]),
        span,
    }
}

/// Parse a code fragment used as an inline expression
pub fn parse_expression(input: &str) -> Result<Expr, SyntaxError> {
    let len = input.len();
    let tokens = lex(input).map_err(|span| lex_error(input, span))?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream =
        Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    expr_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| match errs.first() {
            Some(err) => syntax_error(err),
            None => SyntaxError::new("invalid expression", 0..len),
        })
}

/// Parse the code of a block header (`if`, `elif`, `else`, `for`, `def`)
pub fn parse_header(input: &str) -> Result<Header, SyntaxError> {
    let len = input.len();
    let tokens = lex(input).map_err(|span| lex_error(input, span))?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream =
        Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    header_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
        .map_err(|errs| match errs.first() {
            Some(err) => syntax_error(err),
            None => SyntaxError::new("invalid block header", 0..len),
        })
}

/// Parse a parameter list, with or without surrounding parentheses
pub fn parse_params(input: &str) -> Result<Vec<ParamDecl>, SyntaxError> {
    let len = input.len();
    let tokens = lex(input).map_err(|span| lex_error(input, span))?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));
    let token_stream =
        Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    choice((
        params_parser().delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        params_parser(),
    ))
    .then_ignore(end())
    .parse(token_stream)
    .into_result()
    .map_err(|errs| match errs.first() {
        Some(err) => syntax_error(err),
        None => SyntaxError::new("invalid parameter list", 0..len),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Expr {
        Expr::Name(s.to_string())
    }

    fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Int(n))
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("n % 2 + a * -b").expect("Should parse");
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Add,
                Expr::binary(BinaryOp::Mod, name("n"), int(2)),
                Expr::binary(
                    BinaryOp::Mul,
                    name("a"),
                    Expr::unary(UnaryOp::Neg, name("b"))
                ),
            )
        );
    }

    #[test]
    fn test_left_associative() {
        let expr = parse_expression("8 // 2 // 2").expect("Should parse");
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::FloorDiv,
                Expr::binary(BinaryOp::FloorDiv, int(8), int(2)),
                int(2)
            )
        );
    }

    #[test]
    fn test_power_right_associative() {
        let expr = parse_expression("2 ** 3 ** 2").expect("Should parse");
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Pow,
                int(2),
                Expr::binary(BinaryOp::Pow, int(3), int(2))
            )
        );
    }

    #[test]
    fn test_call_with_method_and_keywords() {
        let expr = parse_expression("''.join(reversed(s), sep=', ')").expect("Should parse");
        match expr {
            Expr::Call { callee, args } => {
                assert_eq!(
                    *callee,
                    Expr::Attribute(
                        Box::new(Expr::Literal(Literal::Str(String::new()))),
                        "join".to_string()
                    )
                );
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], Argument::Positional(Expr::Call { .. })));
                assert!(matches!(&args[1], Argument::Keyword(k, _) if k == "sep"));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_not_in_and_not() {
        let expr = parse_expression("not a not in b").expect("Should parse");
        assert_eq!(
            expr,
            Expr::unary(
                UnaryOp::Not,
                Expr::binary(BinaryOp::NotIn, name("a"), name("b"))
            )
        );
    }

    #[test]
    fn test_conditional() {
        let expr = parse_expression("'odd' if n % 2 else 'even'").expect("Should parse");
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_collections() {
        let expr = parse_expression("[1, 2,]").expect("Should parse");
        assert_eq!(expr, Expr::List(vec![int(1), int(2)]));
        let expr = parse_expression("{'a': 1}['a']").expect("Should parse");
        assert!(matches!(expr, Expr::Index(..)));
    }

    #[test]
    fn test_headers() {
        assert!(matches!(
            parse_header("if n // 2").expect("Should parse"),
            Header::If(_)
        ));
        assert_eq!(parse_header("else").expect("Should parse"), Header::Else);
        match parse_header("for i, value in enumerate(values)").expect("Should parse") {
            Header::For { targets, .. } => assert_eq!(targets, vec!["i", "value"]),
            other => panic!("Expected for, got {:?}", other),
        }
        match parse_header("def row(values, *rest, sep=' ')").expect("Should parse") {
            Header::Def { name, params } => {
                assert_eq!(name, "row");
                assert_eq!(params.len(), 3);
                assert!(params[1].variadic);
                assert!(params[2].default.is_some());
            }
            other => panic!("Expected def, got {:?}", other),
        }
    }

    #[test]
    fn test_params() {
        let params = parse_params("(n, sep=', ')").expect("Should parse");
        assert_eq!(params.len(), 2);
        let params = parse_params("n, sep=', '").expect("Should parse");
        assert_eq!(params.len(), 2);
        assert!(parse_params("").expect("Should parse").is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("a +").is_err());
        assert!(parse_expression("a $ b").is_err());
        assert!(parse_header("while x").is_err());
        assert!(parse_header("if").is_err());
    }
}
