//! Recursive descent parser for Waveguide.
//!
//! Statements and expressions map one-to-one onto the AST; the only
//! restructuring done here is nesting `elif` chains into the else-branch of
//! the enclosing branch. Operator parsing is a ladder of precedence levels,
//! loosest first: `or` < `xor` < `and` < `bor` < `bxor` < `band` <
//! equality < comparison < additive < multiplicative < sign < primary.
//! Each level with at least one operator produces an `OperatorList` node,
//! so the lowering pass sees the same shape the grammar defines.

use crate::ast::{
    AssignStatement, BinaryOp, Branch, DataTypeExpr, Expression, ForEach, FunctionCall,
    FunctionDec, Operation, OperatorList, OutputSpec, Parameter, RangeExpression,
    ReturnStatement, SignedExpression, Statement, VarDec, VarDecStatement, VariableAccess,
    While,
};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Lexer, SpannedToken};
use crate::token::Token;

/// Waveguide parser.
///
/// Holds the token cursor; `parse` consumes the parser and returns the
/// program's root statement list.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Option<SpannedToken<'a>>,
}

impl<'a> std::fmt::Debug for Parser<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").field("current", &self.current).finish()
    }
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            current: None,
        }
    }

    /// Parse the source as a program: statements until end of input.
    pub fn parse(mut self) -> ParseResult<Vec<Statement>> {
        self.bump()?;
        let mut statements = Vec::new();
        while self.current.is_some() {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    // ==================== Token management ====================

    /// Advance the cursor, surfacing lexer errors.
    fn bump(&mut self) -> ParseResult<()> {
        self.current = match self.lexer.next_token() {
            Some(Ok(token)) => Some(token),
            Some(Err(e)) => return Err(e),
            None => None,
        };
        Ok(())
    }

    fn peek_token(&self) -> Option<Token> {
        self.current.as_ref().map(|t| t.token)
    }

    fn at(&self, token: Token) -> bool {
        self.peek_token() == Some(token)
    }

    /// Consume the current token if it matches.
    fn eat(&mut self, token: Token) -> ParseResult<bool> {
        if self.at(token) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume a required token.
    fn expect(&mut self, token: Token) -> ParseResult<SpannedToken<'a>> {
        match self.current.clone() {
            Some(found) if found.token == token => {
                self.bump()?;
                Ok(found)
            }
            Some(found) => Err(ParseError::UnexpectedToken {
                expected: token.describe(),
                found: found.token.describe().to_string(),
                offset: found.span.start,
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: token.describe(),
            }),
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        Ok(self.expect(Token::Identifier)?.text.to_string())
    }

    fn error_here(&self, expected: &'static str) -> ParseError {
        match &self.current {
            Some(found) => ParseError::UnexpectedToken {
                expected,
                found: found.token.describe().to_string(),
                offset: found.span.start,
            },
            None => ParseError::UnexpectedEof { expected },
        }
    }

    // ==================== Statements ====================

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.peek_token() {
            Some(Token::KwReturn) => {
                self.bump()?;
                let value = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Statement::Return(ReturnStatement { value }))
            }
            Some(Token::KwDef) => {
                self.bump()?;
                Ok(Statement::FunctionDec(self.parse_function_dec()?))
            }
            Some(Token::KwIf) => {
                self.bump()?;
                Ok(Statement::Branch(self.parse_branch_tail()?))
            }
            Some(Token::KwFor) => self.parse_for_each(),
            Some(Token::KwWhile) => self.parse_while(),
            Some(Token::Identifier) => self.parse_identifier_statement(),
            _ => Err(self.error_here("statement")),
        }
    }

    /// Statements that open with an identifier: a declaration (`Int a = 1;`,
    /// `Int[3] xs;`), an assignment (`a = 1;`, `xs[0] = 1;`) or a call
    /// statement (`f(1);`, `f:(a);`). The bracket suffix after the leading
    /// identifier is shared between the array-type and indexed-l-value
    /// readings, so it is parsed before deciding.
    fn parse_identifier_statement(&mut self) -> ParseResult<Statement> {
        let name = self.expect_identifier()?;

        if self.at(Token::LParen) || self.at(Token::Colon) {
            let call = self.parse_call_after_name(name)?;
            self.expect(Token::Semicolon)?;
            return Ok(Statement::FunctionCall(call));
        }

        let mut suffix = Vec::new();
        while self.eat(Token::LBracket)? {
            suffix.push(self.parse_expression()?);
            self.expect(Token::RBracket)?;
        }

        match self.peek_token() {
            Some(Token::Identifier) => {
                let ty = DataTypeExpr {
                    name,
                    array_sizes: suffix,
                };
                self.parse_var_dec_tail(ty)
            }
            Some(Token::Assign) => {
                self.bump()?;
                let value = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Statement::Assign(AssignStatement {
                    target: VariableAccess {
                        name,
                        indexes: suffix,
                    },
                    value,
                }))
            }
            _ => Err(self.error_here("`=`, declarator or call arguments")),
        }
    }

    fn parse_var_dec_tail(&mut self, ty: DataTypeExpr) -> ParseResult<Statement> {
        let mut decs = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(Token::Assign)? {
                Some(self.parse_expression()?)
            } else {
                None
            };
            decs.push(VarDec { name, init });
            if !self.eat(Token::Comma)? {
                break;
            }
        }
        self.expect(Token::Semicolon)?;
        Ok(Statement::VarDec(VarDecStatement { ty, decs }))
    }

    /// `if`/`elif` already consumed: condition, block, optional else chain.
    fn parse_branch_tail(&mut self) -> ParseResult<Branch> {
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let if_true = self.parse_block()?;

        let if_false = if self.at(Token::KwElif) {
            self.bump()?;
            vec![Statement::Branch(self.parse_branch_tail()?)]
        } else if self.eat(Token::KwElse)? {
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(Branch {
            condition,
            if_true,
            if_false,
        })
    }

    fn parse_for_each(&mut self) -> ParseResult<Statement> {
        self.expect(Token::KwFor)?;
        let counter = self.expect_identifier()?;
        self.expect(Token::KwIn)?;
        let mut values = vec![self.parse_expression()?];
        while self.eat(Token::Comma)? {
            values.push(self.parse_expression()?);
        }
        let body = self.parse_block()?;
        Ok(Statement::ForEach(ForEach {
            counter,
            values,
            body,
        }))
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.expect(Token::KwWhile)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;
        Ok(Statement::While(While { condition, body }))
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(Token::LBrace)?;
        let mut statements = Vec::new();
        while !self.at(Token::RBrace) {
            if self.current.is_none() {
                return Err(ParseError::UnexpectedEof { expected: "`}`" });
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;
        Ok(statements)
    }

    // ==================== Function declarations ====================

    /// `name(ins):(outs) [lambdas] { body }` — the `def` keyword (top level)
    /// or surrounding lambda list has already been consumed.
    fn parse_function_dec(&mut self) -> ParseResult<FunctionDec> {
        let name = self.expect_identifier()?;

        let mut inputs = Vec::new();
        if self.eat(Token::LParen)? {
            if !self.at(Token::RParen) {
                loop {
                    inputs.push(self.parse_parameter()?);
                    if !self.eat(Token::Comma)? {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
        }

        let mut outputs = Vec::new();
        if self.eat(Token::Colon)? {
            if self.eat(Token::LParen)? {
                if !self.at(Token::RParen) {
                    loop {
                        outputs.push(self.parse_parameter()?);
                        if !self.eat(Token::Comma)? {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
            } else {
                // Bare output type declares the implicit `return` slot.
                let ty = self.parse_data_type()?;
                outputs.push(Parameter {
                    ty,
                    name: "return".to_string(),
                });
            }
        }

        let mut lambdas = Vec::new();
        if self.eat(Token::LBracket)? {
            if !self.at(Token::RBracket) {
                loop {
                    lambdas.push(self.parse_function_dec()?);
                    if !self.eat(Token::Comma)? {
                        break;
                    }
                }
            }
            self.expect(Token::RBracket)?;
        }

        let body = self.parse_block()?;
        Ok(FunctionDec {
            name,
            inputs,
            outputs,
            lambdas,
            body,
        })
    }

    fn parse_parameter(&mut self) -> ParseResult<Parameter> {
        let ty = self.parse_data_type()?;
        let name = self.expect_identifier()?;
        Ok(Parameter { ty, name })
    }

    fn parse_data_type(&mut self) -> ParseResult<DataTypeExpr> {
        let name = self.expect_identifier()?;
        let mut array_sizes = Vec::new();
        while self.eat(Token::LBracket)? {
            array_sizes.push(self.parse_expression()?);
            self.expect(Token::RBracket)?;
        }
        Ok(DataTypeExpr { name, array_sizes })
    }

    // ==================== Calls ====================

    /// Arguments and the optional output list; the callee name has been
    /// consumed. `f:(a)` is the zero-input form.
    fn parse_call_after_name(&mut self, name: String) -> ParseResult<FunctionCall> {
        let mut inputs = Vec::new();
        if self.eat(Token::LParen)? {
            if !self.at(Token::RParen) {
                loop {
                    inputs.push(self.parse_expression()?);
                    if !self.eat(Token::Comma)? {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
        }

        let outputs = if self.eat(Token::Colon)? {
            self.expect(Token::LParen)?;
            let mut outs = Vec::new();
            if !self.at(Token::RParen) {
                loop {
                    outs.push(self.parse_output_spec()?);
                    if !self.eat(Token::Comma)? {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
            Some(outs)
        } else {
            None
        };

        Ok(FunctionCall {
            name,
            inputs,
            outputs,
        })
    }

    fn parse_output_spec(&mut self) -> ParseResult<OutputSpec> {
        if self.eat(Token::KwNone)? {
            return Ok(OutputSpec::Discard);
        }
        let name = self.expect_identifier()?;
        let mut suffix = Vec::new();
        while self.eat(Token::LBracket)? {
            suffix.push(self.parse_expression()?);
            self.expect(Token::RBracket)?;
        }
        if self.at(Token::Identifier) {
            let bound = self.expect_identifier()?;
            Ok(OutputSpec::Declare {
                ty: DataTypeExpr {
                    name,
                    array_sizes: suffix,
                },
                name: bound,
            })
        } else {
            Ok(OutputSpec::Variable(VariableAccess {
                name,
                indexes: suffix,
            }))
        }
    }

    // ==================== Expressions ====================

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    /// One precedence level: parse `next (op next)*` and fold the operator
    /// runs into an `OperatorList` node.
    fn parse_operator_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expression>,
    ) -> ParseResult<Expression> {
        let start = next(self)?;
        let mut operations = Vec::new();
        while let Some(token) = self.peek_token() {
            let Some(&(_, op)) = ops.iter().find(|(t, _)| *t == token) else {
                break;
            };
            self.bump()?;
            operations.push(Operation {
                op,
                value: next(self)?,
            });
        }
        if operations.is_empty() {
            Ok(start)
        } else {
            Ok(Expression::OperatorList(Box::new(OperatorList {
                start,
                operations,
            })))
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(&[(Token::KwOr, BinaryOp::Or)], Self::parse_xor)
    }

    fn parse_xor(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(&[(Token::KwXor, BinaryOp::Xor)], Self::parse_and)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(&[(Token::KwAnd, BinaryOp::And)], Self::parse_bor)
    }

    fn parse_bor(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(&[(Token::KwBor, BinaryOp::Bor)], Self::parse_bxor)
    }

    fn parse_bxor(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(&[(Token::KwBxor, BinaryOp::Bxor)], Self::parse_band)
    }

    fn parse_band(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(&[(Token::KwBand, BinaryOp::Band)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(
            &[(Token::EqEq, BinaryOp::Eq), (Token::NotEq, BinaryOp::Neq)],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(
            &[
                (Token::GtEq, BinaryOp::Gte),
                (Token::LtEq, BinaryOp::Lte),
                (Token::Gt, BinaryOp::Gt),
                (Token::Lt, BinaryOp::Lt),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        self.parse_operator_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Mod),
            ],
            Self::parse_signed,
        )
    }

    fn parse_signed(&mut self) -> ParseResult<Expression> {
        if self.eat(Token::Plus)? {
            Ok(Expression::Signed(Box::new(SignedExpression {
                negative: false,
                value: self.parse_basic()?,
            })))
        } else if self.eat(Token::Minus)? {
            Ok(Expression::Signed(Box::new(SignedExpression {
                negative: true,
                value: self.parse_basic()?,
            })))
        } else {
            self.parse_basic()
        }
    }

    fn parse_basic(&mut self) -> ParseResult<Expression> {
        match self.peek_token() {
            Some(Token::IntLiteral) => {
                let token = self.expect(Token::IntLiteral)?;
                let value: i32 = token.text.parse().map_err(|_| ParseError::InvalidLiteral {
                    text: token.text.to_string(),
                    offset: token.span.start,
                })?;
                Ok(Expression::Int(value))
            }
            Some(Token::FloatLiteral) => {
                let token = self.expect(Token::FloatLiteral)?;
                let value: f32 = token.text.parse().map_err(|_| ParseError::InvalidLiteral {
                    text: token.text.to_string(),
                    offset: token.span.start,
                })?;
                Ok(Expression::Float(value))
            }
            Some(Token::KwTrue) => {
                self.bump()?;
                Ok(Expression::Bool(true))
            }
            Some(Token::KwFalse) => {
                self.bump()?;
                Ok(Expression::Bool(false))
            }
            Some(Token::LParen) => {
                self.bump()?;
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => self.parse_array_literal(),
            Some(Token::LBrace) => self.parse_range(),
            Some(Token::Identifier) => {
                let name = self.expect_identifier()?;
                if self.at(Token::LParen) || self.at(Token::Colon) {
                    let call = self.parse_call_after_name(name)?;
                    return Ok(Expression::FunctionCall(Box::new(call)));
                }
                let mut indexes = Vec::new();
                while self.eat(Token::LBracket)? {
                    indexes.push(self.parse_expression()?);
                    self.expect(Token::RBracket)?;
                }
                Ok(Expression::Variable(VariableAccess { name, indexes }))
            }
            _ => Err(self.error_here("expression")),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        self.expect(Token::LBracket)?;
        let mut elements = vec![self.parse_expression()?];
        while self.eat(Token::Comma)? {
            elements.push(self.parse_expression()?);
        }
        self.expect(Token::RBracket)?;
        Ok(Expression::ArrayLiteral(elements))
    }

    fn parse_range(&mut self) -> ParseResult<Expression> {
        self.expect(Token::LBrace)?;
        let start = self.parse_expression()?;
        self.expect(Token::Comma)?;
        let end = self.parse_expression()?;
        let step = if self.eat(Token::Comma)? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(Token::RBrace)?;
        Ok(Expression::Range(Box::new(RangeExpression {
            start,
            end,
            step,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_var_dec_with_init() {
        let program = parse("Int a = 3;").unwrap();
        assert_eq!(
            program,
            vec![Statement::VarDec(VarDecStatement {
                ty: DataTypeExpr {
                    name: "Int".to_string(),
                    array_sizes: vec![],
                },
                decs: vec![VarDec {
                    name: "a".to_string(),
                    init: Some(Expression::Int(3)),
                }],
            })]
        );
    }

    #[test]
    fn test_array_type_vs_indexed_assign() {
        let program = parse("Int[3] xs; xs[0] = 1;").unwrap();
        assert!(matches!(&program[0], Statement::VarDec(dec)
            if dec.ty.array_sizes.len() == 1 && dec.decs[0].name == "xs"));
        assert!(matches!(&program[1], Statement::Assign(assign)
            if assign.target.name == "xs" && assign.target.indexes == vec![Expression::Int(0)]));
    }

    #[test]
    fn test_multiple_declarators() {
        let program = parse("Int a = 1, b, c = 3;").unwrap();
        let Statement::VarDec(dec) = &program[0] else {
            panic!("expected declaration, got {:?}", program[0]);
        };
        assert_eq!(dec.decs.len(), 3);
        assert_eq!(dec.decs[1].init, None);
    }

    #[test]
    fn test_precedence_shape() {
        // a + b * c - d: the multiplication nests inside the additive list.
        let program = parse("x = a + b * c - d;").unwrap();
        let Statement::Assign(assign) = &program[0] else {
            panic!("expected assignment");
        };
        let Expression::OperatorList(list) = &assign.value else {
            panic!("expected operator list");
        };
        assert_eq!(list.operations.len(), 2);
        assert_eq!(list.operations[0].op, BinaryOp::Add);
        assert_eq!(list.operations[1].op, BinaryOp::Sub);
        assert!(matches!(
            &list.operations[0].value,
            Expression::OperatorList(inner) if inner.operations[0].op == BinaryOp::Mul
        ));
    }

    #[test]
    fn test_comparison_binds_looser_than_add() {
        let program = parse("x = a + 1 > b;").unwrap();
        let Statement::Assign(assign) = &program[0] else {
            panic!("expected assignment");
        };
        let Expression::OperatorList(list) = &assign.value else {
            panic!("expected operator list");
        };
        assert_eq!(list.operations[0].op, BinaryOp::Gt);
    }

    #[test]
    fn test_call_statement_with_outputs() {
        let program = parse("divmod(7, 2):(q, none, Int r);").unwrap();
        let Statement::FunctionCall(call) = &program[0] else {
            panic!("expected call statement");
        };
        assert_eq!(call.inputs.len(), 2);
        let outs = call.outputs.as_ref().unwrap();
        assert!(matches!(&outs[0], OutputSpec::Variable(access) if access.name == "q"));
        assert_eq!(outs[1], OutputSpec::Discard);
        assert!(matches!(&outs[2], OutputSpec::Declare { name, .. } if name == "r"));
    }

    #[test]
    fn test_call_expression_has_no_output_list() {
        let program = parse("Int a = add_one(41);").unwrap();
        let Statement::VarDec(dec) = &program[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::FunctionCall(call)) = &dec.decs[0].init else {
            panic!("expected call initializer");
        };
        assert_eq!(call.outputs, None);
    }

    #[test]
    fn test_function_dec_with_named_outputs() {
        let program = parse("def add_one(Int x):(Int r) { r = x + 1; }").unwrap();
        let Statement::FunctionDec(dec) = &program[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(dec.name, "add_one");
        assert_eq!(dec.inputs.len(), 1);
        assert_eq!(dec.outputs[0].name, "r");
        assert_eq!(dec.body.len(), 1);
    }

    #[test]
    fn test_bare_output_type_declares_return() {
        let program = parse("def f(Int a):Int { return a; }").unwrap();
        let Statement::FunctionDec(dec) = &program[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(dec.outputs[0].name, "return");
        assert_eq!(dec.outputs[0].ty.name, "Int");
    }

    #[test]
    fn test_lambda_list() {
        let program = parse("def f():(Int r) [helper(Int x):(Int y) { y = x; }] { r = 1; }")
            .unwrap();
        let Statement::FunctionDec(dec) = &program[0] else {
            panic!("expected function declaration");
        };
        assert_eq!(dec.lambdas.len(), 1);
        assert_eq!(dec.lambdas[0].name, "helper");
    }

    #[test]
    fn test_elif_nests_into_else() {
        let program = parse("if (a) { b = 1; } elif (c) { b = 2; } else { b = 3; }").unwrap();
        let Statement::Branch(branch) = &program[0] else {
            panic!("expected branch");
        };
        assert_eq!(branch.if_false.len(), 1);
        let Statement::Branch(inner) = &branch.if_false[0] else {
            panic!("expected nested branch");
        };
        assert_eq!(inner.if_false.len(), 1);
    }

    #[test]
    fn test_for_each_over_several_values() {
        let program = parse("for i in xs, {0, 10, 2}, 4 { s = s + i; }").unwrap();
        let Statement::ForEach(each) = &program[0] else {
            panic!("expected for-each");
        };
        assert_eq!(each.counter, "i");
        assert_eq!(each.values.len(), 3);
        assert!(matches!(&each.values[1], Expression::Range(range) if range.step.is_some()));
    }

    #[test]
    fn test_signed_literal() {
        let program = parse("Float a = -3.5;").unwrap();
        let Statement::VarDec(dec) = &program[0] else {
            panic!("expected declaration");
        };
        assert!(matches!(
            dec.decs[0].init.as_ref().unwrap(),
            Expression::Signed(signed)
                if signed.negative && signed.value == Expression::Float(3.5)
        ));
    }

    #[test]
    fn test_missing_semicolon_is_an_error() {
        let err = parse("Int a = 3").unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEof { expected: "`;`" });
    }

    #[test]
    fn test_stray_token_is_an_error() {
        let err = parse("Int a = ;").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { expected, .. }
            if expected == "expression"));
    }
}
