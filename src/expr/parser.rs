//! Precedence-climbing parser (spec §4.2).
//!
//! Precedence table, low to high: `OR`(1), `AND`(2), equality (`=`,`==`,`!=`,
//! `<>`)(3), comparison (`>`,`<`,`>=`,`<=`,`LIKE`,`IS`)(4), additive(5),
//! multiplicative(6), power `^`(7, right-associative). `CASE ... END` and
//! function calls are primaries. Unary `NOT` binds tighter than `AND` but
//! looser than equality/comparison, matching common SQL-dialect precedence.

use super::ast::{BinOp, Expr, UnaryOp, WhenThen};
use super::token::{is_unary_position, tokenize, Op, Token};
use crate::error::{Result, StreamError};

pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    if matches!(tokens.as_slice(), [Token::Eof]) {
        return Err(StreamError::parse("empty expression"));
    }
    let mut p = Parser {
        tokens,
        pos: 0,
        src: input,
    };
    let expr = p.parse_or()?;
    p.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<()> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(StreamError::parse(format!(
                "unexpected trailing tokens in expression: {:?}",
                self.src
            )))
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Op(Op::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Token::Op(Op::And)) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Token::Op(Op::Not)) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(inner),
            });
        }
        self.parse_equality()
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::Op(Op::Eq) => BinOp::Eq,
                Token::Op(Op::Neq) => BinOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            match self.peek().clone() {
                Token::Op(Op::Lt) => {
                    self.advance();
                    let right = self.parse_additive()?;
                    left = Expr::Binary {
                        op: BinOp::Lt,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                Token::Op(Op::Gt) => {
                    self.advance();
                    let right = self.parse_additive()?;
                    left = Expr::Binary {
                        op: BinOp::Gt,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                Token::Op(Op::Le) => {
                    self.advance();
                    let right = self.parse_additive()?;
                    left = Expr::Binary {
                        op: BinOp::Le,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                Token::Op(Op::Ge) => {
                    self.advance();
                    let right = self.parse_additive()?;
                    left = Expr::Binary {
                        op: BinOp::Ge,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                Token::Op(Op::Like) => {
                    self.advance();
                    let right = self.parse_additive()?;
                    left = Expr::Binary {
                        op: BinOp::Like,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                }
                Token::Op(Op::Is) => {
                    self.advance();
                    let negate = if matches!(self.peek(), Token::Op(Op::Not)) {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    if !matches!(self.peek(), Token::Op(Op::Null)) {
                        return Err(StreamError::parse("expected NULL after IS [NOT]"));
                    }
                    self.advance();
                    left = Expr::Unary {
                        op: if negate {
                            UnaryOp::IsNotNull
                        } else {
                            UnaryOp::IsNull
                        },
                        expr: Box::new(left),
                    };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Op(Op::Plus) => BinOp::Add,
                Token::Op(Op::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Token::Op(Op::Star) => BinOp::Mul,
                Token::Op(Op::Slash) => BinOp::Div,
                Token::Op(Op::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Right-associative.
    fn parse_power(&mut self) -> Result<Expr> {
        let left = self.parse_unary()?;
        if matches!(self.peek(), Token::Op(Op::Caret)) {
            self.advance();
            let right = self.parse_power()?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Token::Op(Op::Minus)) && is_unary_position(&self.tokens, self.pos)
        {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(inner),
            });
        }
        if matches!(self.peek(), Token::Op(Op::Plus)) && is_unary_position(&self.tokens, self.pos)
        {
            self.advance();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::String(s)),
            Token::Op(Op::Null) => Ok(Expr::Null),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Token::Op(Op::Case) => self.parse_case(),
            Token::Ident(name) | Token::QuotedIdent(name) => {
                if matches!(self.peek(), Token::LParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(Expr::Field(self.parse_trailing_path(name)?))
                }
            }
            other => Err(StreamError::parse(format!(
                "unexpected token while parsing expression: {other:?}"
            ))),
        }
    }

    /// Field literals can carry `[n]`/`['k']` suffixes directly after the
    /// identifier (spec §4.1); the tokenizer hands those back as separate
    /// bracket tokens, so the parser re-assembles the path text here.
    fn parse_trailing_path(&mut self, mut name: String) -> Result<String> {
        loop {
            match self.peek() {
                Token::LBracket => {
                    self.advance();
                    match self.advance() {
                        Token::Number(n) => {
                            name.push_str(&format!("[{}]", n as i64));
                        }
                        Token::Str(s) => {
                            name.push_str(&format!("[\"{s}\"]"));
                        }
                        other => {
                            return Err(StreamError::parse(format!(
                                "unexpected token inside '[...]': {other:?}"
                            )))
                        }
                    }
                    self.expect(Token::RBracket)?;
                }
                _ => break,
            }
        }
        Ok(name)
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(StreamError::parse(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.expect(Token::LParen)?;

        // `COUNT(*)`: the lone `*` is a star token, not an expression; it
        // is represented as a zero-argument COUNT call, which plan-time
        // two-phase extraction distinguishes from `COUNT(expr)` by arity.
        if name.eq_ignore_ascii_case("COUNT") && matches!(self.peek(), Token::Op(Op::Star)) {
            self.advance();
            self.expect(Token::RParen)?;
            return Ok(Expr::Function { name, args: Vec::new() });
        }

        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            args.push(self.parse_or()?);
            while matches!(self.peek(), Token::Comma) {
                self.advance();
                args.push(self.parse_or()?);
            }
        }
        self.expect(Token::RParen)?;
        Ok(Expr::Function { name, args })
    }

    fn parse_case(&mut self) -> Result<Expr> {
        let scrutinee = if matches!(self.peek(), Token::Op(Op::When)) {
            None
        } else {
            Some(Box::new(self.parse_or()?))
        };

        let mut whens = Vec::new();
        while matches!(self.peek(), Token::Op(Op::When)) {
            self.advance();
            let when = self.parse_or()?;
            self.expect_op(Op::Then)?;
            let then = self.parse_or()?;
            whens.push(WhenThen { when, then });
        }
        if whens.is_empty() {
            return Err(StreamError::parse("CASE requires at least one WHEN clause"));
        }

        let else_result = if matches!(self.peek(), Token::Op(Op::Else)) {
            self.advance();
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };

        self.expect_op(Op::End)?;
        Ok(Expr::Case {
            scrutinee,
            whens,
            else_result,
        })
    }

    fn expect_op(&mut self, op: Op) -> Result<()> {
        if *self.peek() == Token::Op(op) {
            self.advance();
            Ok(())
        } else {
            Err(StreamError::parse(format!(
                "expected keyword {op:?}, found {:?}",
                self.peek()
            )))
        }
    }
}
