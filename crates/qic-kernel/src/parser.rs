//! Parser for expanded query code.
//!
//! Transforms the token stream from the lexer into an AST. Uses chumsky
//! parser combinators. Alternatives that share a prefix are parsed once and
//! disambiguated by what follows, so nested brackets never backtrack.

use std::rc::Rc;

use crate::ast::{
    Arg, BinaryOp, CmpOp, CompClause, Expr, ForLoop, FunctionBody, FunctionDef, IfStmt,
    ImportName, Literal, LogicalOp, Param, Program, Stmt, Target, UnaryOp, WhileLoop,
};
use crate::lexer::{self, Token};
use chumsky::{input::ValueInput, prelude::*};

/// Span type used throughout the parser.
pub type Span = SimpleSpan;

/// Parse error with location and context.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
    /// Set when the error came from the lexer.
    pub lexer: Option<lexer::LexerError>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {:?}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}

/// Tokenize and convert to (Token, SimpleSpan) pairs.
fn lex(source: &str) -> Result<Vec<(Token, Span)>, Vec<ParseError>> {
    let tokens = lexer::tokenize(source).map_err(|errs| {
        errs.into_iter()
            .map(|e| ParseError {
                span: (e.span.start..e.span.end).into(),
                message: format!("lexer error: {}", e.token),
                lexer: Some(e.token),
            })
            .collect::<Vec<_>>()
    })?;

    Ok(tokens
        .into_iter()
        .map(|spanned| (spanned.token, (spanned.span.start..spanned.span.end).into()))
        .collect())
}

fn convert_errors(errs: Vec<Rich<'_, Token, Span>>) -> Vec<ParseError> {
    errs.into_iter()
        .map(|e| ParseError {
            span: *e.span(),
            message: e.to_string(),
            lexer: None,
        })
        .collect()
}

/// Parse a block of statements.
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
    let tokens = lex(source)?;
    let end_span: Span = (source.len()..source.len()).into();

    let parser = program_parser();
    let result = parser.parse(tokens.as_slice().map(end_span, |(t, s)| (t, s)));
    result.into_result().map_err(convert_errors)
}

/// Parse a single expression. Multi-line input is rejected.
pub fn parse_expression(source: &str) -> Result<Expr, Vec<ParseError>> {
    let tokens = lex(source)?;
    let end_span: Span = (source.len()..source.len()).into();

    let parser = expr_parser().then_ignore(just(Token::Newline).or_not());
    let result = parser.parse(tokens.as_slice().map(end_span, |(t, s)| (t, s)));
    result.into_result().map_err(convert_errors)
}

// ═══════════════════════════════════════════════════════════════════════════
// Parser Combinators - generic over input type
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level program parser.
fn program_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, Span>>>
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    statement_parser()
        .repeated()
        .collect::<Vec<_>>()
        .map(|lines| Program {
            statements: lines.into_iter().flatten().collect(),
        })
}

/// What follows the leading expression list of a simple statement.
enum StmtTail {
    Assign(Vec<Expr>),
    Aug(BinaryOp, Expr),
}

/// One logical line: either a compound statement or `;`-separated simple statements.
fn statement_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Vec<Stmt>, extra::Err<Rich<'tokens, Token, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    recursive(|line| {
        let expr = expr_parser();
        let exprs = expr_list_parser(expr.clone());

        let aug_op = choice((
            just(Token::PlusEq).to(BinaryOp::Add),
            just(Token::MinusEq).to(BinaryOp::Sub),
            just(Token::StarEq).to(BinaryOp::Mul),
            just(Token::SlashEq).to(BinaryOp::Div),
        ));

        // `a`, `a = b = c`, `a += b`
        let expr_stmt = exprs
            .clone()
            .then(
                choice((
                    just(Token::Assign)
                        .ignore_then(exprs.clone())
                        .repeated()
                        .at_least(1)
                        .collect::<Vec<_>>()
                        .map(StmtTail::Assign),
                    aug_op
                        .then(exprs.clone())
                        .map(|(op, value)| StmtTail::Aug(op, value)),
                ))
                .or_not(),
            )
            .try_map(|(first, tail), span| {
                build_expr_stmt(first, tail).map_err(|msg| Rich::custom(span, msg))
            });

        let return_stmt = just(Token::Return)
            .ignore_then(exprs.clone().or_not())
            .map(Stmt::Return);

        let del_stmt = just(Token::Del)
            .ignore_then(exprs.clone())
            .try_map(|target, span| {
                let targets = match target {
                    Expr::Tuple(items) => items
                        .into_iter()
                        .map(expr_to_target)
                        .collect::<Result<Vec<_>, _>>(),
                    single => expr_to_target(single).map(|t| vec![t]),
                };
                targets.map(Stmt::Del).map_err(|msg| Rich::custom(span, msg))
            });

        let import_name = ident_parser()
            .then(just(Token::As).ignore_then(ident_parser()).or_not())
            .map(|(name, alias)| ImportName { name, alias });
        let import_names = import_name
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>();

        let import_stmt = just(Token::Import)
            .ignore_then(import_names.clone())
            .map(Stmt::Import);

        let from_stmt = just(Token::From)
            .ignore_then(ident_parser())
            .then_ignore(just(Token::Import))
            .then(import_names)
            .map(|(module, names)| Stmt::FromImport { module, names });

        let small_stmt = choice((
            just(Token::Pass).to(Stmt::Pass),
            just(Token::Break).to(Stmt::Break),
            just(Token::Continue).to(Stmt::Continue),
            return_stmt,
            del_stmt,
            import_stmt,
            from_stmt,
            expr_stmt,
        ))
        .boxed();

        let simple_line = small_stmt
            .separated_by(just(Token::Semi))
            .allow_trailing()
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(just(Token::Newline))
            .boxed();

        // A suite is either an indented block or the rest of the line.
        let block = choice((
            just(Token::Newline)
                .ignore_then(just(Token::Indent))
                .ignore_then(line.repeated().at_least(1).collect::<Vec<Vec<Stmt>>>())
                .then_ignore(just(Token::Dedent))
                .map(|lines| lines.into_iter().flatten().collect::<Vec<_>>()),
            simple_line.clone(),
        ))
        .boxed();

        let if_stmt = just(Token::If)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Colon))
            .then(block.clone())
            .then(
                just(Token::Elif)
                    .ignore_then(expr.clone())
                    .then_ignore(just(Token::Colon))
                    .then(block.clone())
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then(
                just(Token::Else)
                    .ignore_then(just(Token::Colon))
                    .ignore_then(block.clone())
                    .or_not(),
            )
            .map(|(((condition, then_branch), elifs), else_branch)| {
                Stmt::If(build_if_chain(condition, then_branch, elifs, else_branch))
            })
            .labelled("if statement");

        let for_stmt = just(Token::For)
            .ignore_then(target_list_parser())
            .then_ignore(just(Token::In))
            .then(exprs.clone())
            .then_ignore(just(Token::Colon))
            .then(block.clone())
            .map(|((target, iter), body)| Stmt::For(ForLoop { target, iter, body }))
            .labelled("for loop");

        let while_stmt = just(Token::While)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::Colon))
            .then(block.clone())
            .map(|(condition, body)| Stmt::While(WhileLoop { condition, body }))
            .labelled("while loop");

        let def_stmt = just(Token::Def)
            .ignore_then(ident_parser())
            .then(
                params_parser(expr.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then_ignore(just(Token::Colon))
            .then(block)
            .map(|((name, params), body)| {
                Stmt::Def(Rc::new(FunctionDef {
                    name,
                    params,
                    body: FunctionBody::Block(body),
                }))
            })
            .labelled("function definition");

        choice((
            if_stmt.map(|s| vec![s]),
            for_stmt.map(|s| vec![s]),
            while_stmt.map(|s| vec![s]),
            def_stmt.map(|s| vec![s]),
            simple_line,
        ))
        .boxed()
    })
}

/// Build the statement for `exprs [= exprs ...]` or `exprs op= exprs`.
fn build_expr_stmt(first: Expr, tail: Option<StmtTail>) -> Result<Stmt, String> {
    match tail {
        None => Ok(Stmt::Expr(first)),
        Some(StmtTail::Assign(mut rest)) => {
            let value = rest.pop().ok_or_else(|| "missing value".to_string())?;
            let mut targets = vec![expr_to_target(first)?];
            for target in rest {
                targets.push(expr_to_target(target)?);
            }
            Ok(Stmt::Assign { targets, value })
        }
        Some(StmtTail::Aug(op, value)) => match expr_to_target(first)? {
            Target::Tuple(_) => Err("illegal expression for augmented assignment".to_string()),
            target => Ok(Stmt::AugAssign { target, op, value }),
        },
    }
}

/// Convert a parsed expression on the left of `=` into an assignment target.
fn expr_to_target(expr: Expr) -> Result<Target, String> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Subscript { object, index } => Ok(Target::Subscript { object, index }),
        Expr::Tuple(items) | Expr::List(items) => items
            .into_iter()
            .map(expr_to_target)
            .collect::<Result<Vec<_>, _>>()
            .map(Target::Tuple),
        Expr::Attribute { name, .. } => Err(format!("cannot assign to attribute '{name}'")),
        _ => Err("cannot assign to expression".to_string()),
    }
}

/// Build a nested IfStmt chain from elif branches.
fn build_if_chain(
    condition: Expr,
    then_branch: Vec<Stmt>,
    mut elif_branches: Vec<(Expr, Vec<Stmt>)>,
    else_branch: Option<Vec<Stmt>>,
) -> IfStmt {
    if elif_branches.is_empty() {
        IfStmt {
            condition,
            then_branch,
            else_branch,
        }
    } else {
        let (elif_cond, elif_then) = elif_branches.remove(0);
        let nested_if = build_if_chain(elif_cond, elif_then, elif_branches, else_branch);
        IfStmt {
            condition,
            then_branch,
            else_branch: Some(vec![Stmt::If(nested_if)]),
        }
    }
}

/// `a` or `a, b, c` (a tuple) with an optional trailing comma.
fn expr_list_parser<'tokens, I, P>(
    expr: P,
) -> impl Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    P: Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token, Span>>> + Clone + 'tokens,
{
    expr.clone()
        .then(
            just(Token::Comma)
                .ignore_then(expr)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then(just(Token::Comma).or_not())
        .map(|((first, mut rest), trailing)| {
            if rest.is_empty() && trailing.is_none() {
                first
            } else {
                rest.insert(0, first);
                Expr::Tuple(rest)
            }
        })
        .boxed()
}

/// Parameter list for `def` and `lambda`: `a, b=1`.
fn params_parser<'tokens, I, P>(
    expr: P,
) -> impl Parser<'tokens, I, Vec<Param>, extra::Err<Rich<'tokens, Token, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    P: Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token, Span>>> + Clone + 'tokens,
{
    ident_parser()
        .then(just(Token::Assign).ignore_then(expr).or_not())
        .map(|(name, default)| Param { name, default })
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .labelled("parameters")
        .boxed()
}

/// Loop targets: `x`, `k, v`, `(k, v)`.
fn target_list_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Target, extra::Err<Rich<'tokens, Token, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    let target = recursive(|target| {
        choice((
            ident_parser().map(Target::Name),
            target
                .clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(Target::Tuple),
            target
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Target::Tuple),
        ))
    });

    target
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|mut targets| {
            if targets.len() == 1 {
                targets.remove(0)
            } else {
                Target::Tuple(targets)
            }
        })
        .labelled("loop target")
        .boxed()
}

/// What follows the first element inside `( ... )` or `[ ... ]`.
enum SeqTail {
    Comprehension(Vec<CompClause>),
    Items(Vec<Expr>, bool),
}

/// What follows the first `key: value` pair inside `{ ... }`.
enum DictTail {
    Comprehension(Vec<CompClause>),
    Pairs(Vec<(Expr, Expr)>),
}

/// Postfix operations applied left to right on an atom.
enum Postfix {
    Attr(String),
    Call(Vec<Arg>),
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>, Option<Expr>),
}

fn apply_postfix(object: Expr, op: Postfix) -> Expr {
    let object = Box::new(object);
    match op {
        Postfix::Attr(name) => Expr::Attribute { object, name },
        Postfix::Call(args) => Expr::Call { func: object, args },
        Postfix::Index(index) => Expr::Subscript {
            object,
            index: Box::new(index),
        },
        Postfix::Slice(start, stop, step) => Expr::Slice {
            object,
            start: start.map(Box::new),
            stop: stop.map(Box::new),
            step: step.map(Box::new),
        },
    }
}

/// `**` is right-associative.
fn fold_power(base: Expr, mut exponents: Vec<Expr>) -> Expr {
    let Some(mut acc) = exponents.pop() else {
        return base;
    };
    while let Some(lower) = exponents.pop() {
        acc = binary(BinaryOp::Pow, lower, acc);
    }
    binary(BinaryOp::Pow, base, acc)
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Expression parser, lowest precedence first: lambda, ternary, or, and,
/// not, comparisons, `+ -`, `* / // %`, unary, `**`, postfix, atoms.
fn expr_parser<'tokens, I>(
) -> impl Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    recursive(|expr| {
        let literal = select! {
            Token::None => Expr::Literal(Literal::None),
            Token::True => Expr::Literal(Literal::Bool(true)),
            Token::False => Expr::Literal(Literal::Bool(false)),
            Token::Int(n) => Expr::Literal(Literal::Int(n)),
            Token::Float(f) => Expr::Literal(Literal::Float(f)),
        }
        .labelled("literal");

        // Adjacent string literals concatenate.
        let string = select! { Token::Str(s) => s }
            .repeated()
            .at_least(1)
            .collect::<Vec<String>>()
            .map(|parts| Expr::Literal(Literal::Str(parts.concat())))
            .labelled("string");

        let comp_for = just(Token::For)
            .ignore_then(target_list_parser())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .map(|(target, iter)| CompClause::For { target, iter });
        let comp_if = just(Token::If).ignore_then(expr.clone()).map(CompClause::If);
        let clauses = comp_for
            .clone()
            .then(choice((comp_for, comp_if)).repeated().collect::<Vec<_>>())
            .map(|(first, mut rest)| {
                rest.insert(0, first);
                rest
            })
            .boxed();

        let seq_tail = choice((
            clauses.clone().map(SeqTail::Comprehension),
            just(Token::Comma)
                .ignore_then(expr.clone())
                .repeated()
                .collect::<Vec<_>>()
                .then(just(Token::Comma).or_not())
                .map(|(items, trailing)| SeqTail::Items(items, trailing.is_some())),
        ))
        .boxed();

        let parenthesized = expr
            .clone()
            .then(seq_tail.clone())
            .or_not()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(|inner| match inner {
                None => Expr::Tuple(Vec::new()),
                Some((element, SeqTail::Comprehension(clauses))) => Expr::ListComp {
                    element: Box::new(element),
                    clauses,
                },
                Some((first, SeqTail::Items(items, trailing))) if items.is_empty() && !trailing => {
                    first
                }
                Some((first, SeqTail::Items(mut items, _))) => {
                    items.insert(0, first);
                    Expr::Tuple(items)
                }
            });

        let list = expr
            .clone()
            .then(seq_tail)
            .or_not()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|inner| match inner {
                None => Expr::List(Vec::new()),
                Some((element, SeqTail::Comprehension(clauses))) => Expr::ListComp {
                    element: Box::new(element),
                    clauses,
                },
                Some((first, SeqTail::Items(mut items, _))) => {
                    items.insert(0, first);
                    Expr::List(items)
                }
            });

        let pair = expr
            .clone()
            .then_ignore(just(Token::Colon))
            .then(expr.clone());
        let dict = pair
            .clone()
            .then(choice((
                clauses.clone().map(DictTail::Comprehension),
                just(Token::Comma)
                    .ignore_then(pair)
                    .repeated()
                    .collect::<Vec<_>>()
                    .then_ignore(just(Token::Comma).or_not())
                    .map(DictTail::Pairs),
            )))
            .or_not()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(|inner| match inner {
                None => Expr::Dict(Vec::new()),
                Some(((key, value), DictTail::Comprehension(clauses))) => Expr::DictComp {
                    key: Box::new(key),
                    value: Box::new(value),
                    clauses,
                },
                Some((first, DictTail::Pairs(mut pairs))) => {
                    pairs.insert(0, first);
                    Expr::Dict(pairs)
                }
            });

        let atom = choice((
            literal,
            string,
            ident_parser().map(Expr::Name),
            parenthesized,
            list,
            dict,
        ))
        .labelled("expression")
        .boxed();

        // Call arguments; a lone generator may appear without its own parentheses.
        let arg = choice((
            ident_parser()
                .then_ignore(just(Token::Assign))
                .then(expr.clone())
                .map(|(name, value)| Arg::Keyword(name, value)),
            expr.clone().map(Arg::Positional),
        ))
        .then(clauses.or_not())
        .map(|(arg, clauses)| match (arg, clauses) {
            (Arg::Positional(element), Some(clauses)) => Arg::Positional(Expr::ListComp {
                element: Box::new(element),
                clauses,
            }),
            (arg, _) => arg,
        });
        let call = arg
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(Postfix::Call);

        let subscript = expr
            .clone()
            .or_not()
            .then(
                just(Token::Colon)
                    .ignore_then(expr.clone().or_not())
                    .then(just(Token::Colon).ignore_then(expr.clone().or_not()).or_not())
                    .or_not(),
            )
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .try_map(|(first, rest), span| match (first, rest) {
                (Some(index), None) => Ok(Postfix::Index(index)),
                (None, None) => Err(Rich::custom(span, "empty subscript")),
                (start, Some((stop, step))) => Ok(Postfix::Slice(start, stop, step.flatten())),
            });

        let postfix_op = choice((
            just(Token::Dot).ignore_then(ident_parser()).map(Postfix::Attr),
            call,
            subscript,
        ));
        let postfix = atom.foldl(postfix_op.repeated(), apply_postfix).boxed();

        let unary_op = choice((
            just(Token::Minus).to(UnaryOp::Neg),
            just(Token::Plus).to(UnaryOp::Pos),
        ));
        let unary = |op, operand| Expr::Unary {
            op,
            operand: Box::new(operand),
        };

        let exponent = unary_op.clone().repeated().foldr(postfix.clone(), unary);
        let power = postfix
            .then(just(Token::Pow).ignore_then(exponent).repeated().collect::<Vec<_>>())
            .map(|(base, exponents)| fold_power(base, exponents))
            .boxed();

        let factor = unary_op.repeated().foldr(power, unary).boxed();

        let mul_op = choice((
            just(Token::Star).to(BinaryOp::Mul),
            just(Token::Slash).to(BinaryOp::Div),
            just(Token::FloorDiv).to(BinaryOp::FloorDiv),
            just(Token::Percent).to(BinaryOp::Mod),
        ));
        let term = factor
            .clone()
            .foldl(mul_op.then(factor).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .boxed();

        let add_op = choice((
            just(Token::Plus).to(BinaryOp::Add),
            just(Token::Minus).to(BinaryOp::Sub),
        ));
        let arith = term
            .clone()
            .foldl(add_op.then(term).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .boxed();

        let cmp_op = choice((
            just(Token::EqEq).to(CmpOp::Eq),
            just(Token::NotEq).to(CmpOp::NotEq),
            just(Token::LtEq).to(CmpOp::LtEq),
            just(Token::GtEq).to(CmpOp::GtEq),
            just(Token::Lt).to(CmpOp::Lt),
            just(Token::Gt).to(CmpOp::Gt),
            just(Token::Not).then(just(Token::In)).to(CmpOp::NotIn),
            just(Token::In).to(CmpOp::In),
            just(Token::Is).then(just(Token::Not)).to(CmpOp::IsNot),
            just(Token::Is).to(CmpOp::Is),
        ));
        let comparison = arith
            .clone()
            .then(cmp_op.then(arith).repeated().collect::<Vec<_>>())
            .map(|(left, rest)| {
                if rest.is_empty() {
                    left
                } else {
                    Expr::Compare {
                        left: Box::new(left),
                        rest,
                    }
                }
            })
            .boxed();

        let not_test = just(Token::Not)
            .repeated()
            .foldr(comparison, |_, operand| Expr::Not(Box::new(operand)))
            .boxed();

        let and_test = not_test
            .clone()
            .foldl(
                just(Token::And).ignore_then(not_test).repeated(),
                |left, right| logical(LogicalOp::And, left, right),
            )
            .boxed();

        let or_test = and_test
            .clone()
            .foldl(
                just(Token::Or).ignore_then(and_test).repeated(),
                |left, right| logical(LogicalOp::Or, left, right),
            )
            .boxed();

        let ternary = or_test
            .clone()
            .then(
                just(Token::If)
                    .ignore_then(or_test)
                    .then_ignore(just(Token::Else))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(then, rest)| match rest {
                None => then,
                Some((condition, otherwise)) => Expr::Ternary {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                },
            });

        let lambda = just(Token::Lambda)
            .ignore_then(params_parser(expr.clone()))
            .then_ignore(just(Token::Colon))
            .then(expr)
            .map(|(params, body)| {
                Expr::Lambda(Rc::new(FunctionDef {
                    name: "<lambda>".to_string(),
                    params,
                    body: FunctionBody::Expr(body),
                }))
            });

        choice((lambda, ternary)).boxed()
    })
}

/// Identifier parser.
fn ident_parser<'tokens, I>(
) -> impl Parser<'tokens, I, String, extra::Err<Rich<'tokens, Token, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    select! {
        Token::Ident(s) => s,
    }
    .labelled("identifier")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        parse_expression(source).expect("expression should parse")
    }

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    fn string(s: &str) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Str(s.to_string())))
    }

    #[test]
    fn parse_empty() {
        let program = parse("").expect("ok");
        assert!(program.statements.is_empty());
    }

    #[test]
    fn subscript_chain() {
        assert_eq!(
            expr("a['b']['c']"),
            Expr::Subscript {
                object: Box::new(Expr::Subscript {
                    object: name("a"),
                    index: string("b"),
                }),
                index: string("c"),
            }
        );
    }

    #[test]
    fn list_comprehension() {
        match expr("[ _q0['b'] for _q0 in a ]") {
            Expr::ListComp { clauses, .. } => {
                assert_eq!(clauses.len(), 1);
                assert!(matches!(&clauses[0], CompClause::For { target: Target::Name(n), .. } if n == "_q0"));
            }
            other => panic!("expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn comprehension_with_condition() {
        match expr("[x for x in l if x > 1]") {
            Expr::ListComp { clauses, .. } => {
                assert_eq!(clauses.len(), 2);
                assert!(matches!(clauses[1], CompClause::If(Expr::Compare { .. })));
            }
            other => panic!("expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn dict_display_and_comprehension() {
        assert!(matches!(expr("{'a': 1, 'b': 2}"), Expr::Dict(pairs) if pairs.len() == 2));
        assert!(matches!(expr("{k: v for k, v in d.items()}"), Expr::DictComp { .. }));
        assert!(matches!(expr("{}"), Expr::Dict(pairs) if pairs.is_empty()));
    }

    #[test]
    fn tuples_and_grouping() {
        assert!(matches!(expr("(1)"), Expr::Literal(Literal::Int(1))));
        assert!(matches!(expr("(1,)"), Expr::Tuple(items) if items.len() == 1));
        assert!(matches!(expr("(1, 2)"), Expr::Tuple(items) if items.len() == 2));
        assert!(matches!(expr("()"), Expr::Tuple(items) if items.is_empty()));
    }

    #[test]
    fn generator_argument() {
        match expr("sum(x for x in l)") {
            Expr::Call { args, .. } => {
                assert!(matches!(&args[0], Arg::Positional(Expr::ListComp { .. })));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn keyword_arguments() {
        match expr("sorted(l, key=lambda x: x['n'], reverse=True)") {
            Expr::Call { args, .. } => {
                assert_eq!(args.len(), 3);
                assert!(matches!(&args[1], Arg::Keyword(k, Expr::Lambda(_)) if k == "key"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn slices() {
        assert!(matches!(expr("l[1:]"), Expr::Slice { start: Some(_), stop: None, step: None, .. }));
        assert!(matches!(expr("l[::-1]"), Expr::Slice { start: None, stop: None, step: Some(_), .. }));
        assert!(matches!(expr("l[-1]"), Expr::Subscript { .. }));
    }

    #[test]
    fn precedence() {
        // 1 + 2 * 3 ** 2
        match expr("1 + 2 * 3 ** 2") {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(expr("-2 ** 2"), Expr::Unary { op: UnaryOp::Neg, .. }));
        assert!(matches!(expr("not a and b"), Expr::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn chained_comparison() {
        match expr("1 < x <= 3") {
            Expr::Compare { rest, .. } => assert_eq!(rest.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        match expr("'a' not in d") {
            Expr::Compare { rest, .. } => assert_eq!(rest[0].0, CmpOp::NotIn),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ternary() {
        assert!(matches!(expr("a if c else b"), Expr::Ternary { .. }));
    }

    #[test]
    fn method_call_on_subscript() {
        match expr("_['a'].keys()") {
            Expr::Call { func, args } => {
                assert!(args.is_empty());
                assert!(matches!(*func, Expr::Attribute { ref name, .. } if name == "keys"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn assignments() {
        let program = parse("x = 1\n_['a']['b'] = 2\na, b = 1, 2\nx += 1").expect("ok");
        assert_eq!(program.statements.len(), 4);
        assert!(matches!(&program.statements[0], Stmt::Assign { targets, .. } if targets[0] == Target::Name("x".into())));
        assert!(matches!(&program.statements[1], Stmt::Assign { targets, .. } if matches!(targets[0], Target::Subscript { .. })));
        assert!(matches!(&program.statements[2], Stmt::Assign { targets, .. } if matches!(targets[0], Target::Tuple(_))));
        assert!(matches!(&program.statements[3], Stmt::AugAssign { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn cannot_assign_to_call() {
        assert!(parse("f() = 1").is_err());
    }

    #[test]
    fn semicolons_split_statements() {
        let program = parse("a = 1; b = 2;").expect("ok");
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn compound_statements() {
        let source = "for x in l:\n    if x > 1:\n        print(x)\n    elif x:\n        pass\n    else:\n        break\nwhile n: n -= 1";
        let program = parse(source).expect("ok");
        assert_eq!(program.statements.len(), 2);
        match &program.statements[0] {
            Stmt::For(ForLoop { body, .. }) => match &body[0] {
                Stmt::If(IfStmt { else_branch: Some(nested), .. }) => {
                    assert!(matches!(&nested[0], Stmt::If(IfStmt { else_branch: Some(_), .. })));
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&program.statements[1], Stmt::While(_)));
    }

    #[test]
    fn function_definition() {
        let program = parse("import math\ndef f(_, n=2):\n    return _['a'] * n").expect("ok");
        match &program.statements[1] {
            Stmt::Def(def) => {
                assert_eq!(def.name, "f");
                assert_eq!(def.params.len(), 2);
                assert!(def.params[1].default.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn imports() {
        let program = parse("import re as r, json\nfrom math import sqrt, pi as p").expect("ok");
        match &program.statements[0] {
            Stmt::Import(names) => {
                assert_eq!(names[0].binding(), "r");
                assert_eq!(names[1].binding(), "json");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&program.statements[1], Stmt::FromImport { module, names } if module == "math" && names.len() == 2));
    }

    #[test]
    fn expression_rejects_statements() {
        assert!(parse_expression("x = 1").is_err());
        assert!(parse_expression("a\nb").is_err());
    }

    #[test]
    fn reference_detection() {
        assert!(expr("a['b'].c").is_reference());
        assert!(!expr("a.b()").is_reference());
        assert!(!expr("a[f()]").is_reference());
    }
}
