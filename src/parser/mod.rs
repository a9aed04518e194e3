pub mod ast;

use crate::diagnostics::CompileError;
use crate::lexer::{Token, TokenStream};
use crate::span::{Span, Spanned};
use ast::*;

pub const CALL_BP: Bp = 16;
pub const SUBSCRIPT_BP: Bp = 16;
pub const CAST_BP: Bp = 15;

pub struct Parser<'a> {
    stream: TokenStream<'a>,
}

fn op_of(tok: &Token) -> Option<Op> {
    Some(match tok {
        Token::PlusPlus => Op::PlusPlus,
        Token::MinusMinus => Op::MinusMinus,
        Token::Arrow => Op::Arrow,
        Token::AmpAmp => Op::AndAnd,
        Token::PipePipe => Op::OrOr,
        Token::EqEq => Op::EqEq,
        Token::BangEq => Op::NotEq,
        Token::LtEq => Op::Le,
        Token::GtEq => Op::Ge,
        Token::Plus => Op::Plus,
        Token::Minus => Op::Minus,
        Token::Star => Op::Star,
        Token::Slash => Op::Slash,
        Token::Percent => Op::Percent,
        Token::Dot => Op::Dot,
        Token::Amp => Op::BitAnd,
        Token::Pipe => Op::BitOr,
        Token::Caret => Op::BitXor,
        Token::Bang => Op::Not,
        Token::Eq => Op::Assign,
        Token::Lt => Op::Lt,
        Token::Gt => Op::Gt,
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned<Token>], source: &'a str) -> Self {
        Self { stream: TokenStream::new(tokens, source) }
    }

    pub fn parse_program(&mut self) -> Result<Vec<Spanned<Global>>, CompileError> {
        let mut globals = Vec::new();
        while !self.stream.is_empty() {
            globals.push(self.parse_global()?);
        }
        Ok(globals)
    }

    // ── globals ──────────────────────────────────────────────────────

    pub fn parse_global(&mut self) -> Result<Spanned<Global>, CompileError> {
        let start = self.stream.mark();

        let is_c = self.stream.try_consume(Token::CFn);
        if is_c || self.stream.try_consume(Token::Fn) {
            let name = self.stream.expect_name()?;
            let params = self.parse_func_params()?;
            let dec = FuncDec { is_c, name, params };

            if self.stream.try_consume(Token::Semi) {
                let span = Span::new(start, self.stream.last_end());
                return Ok(Spanned::new(Global::FuncDec(dec), span));
            }

            let body = self.parse_braced_block()?;
            let span = Span::new(start, self.stream.last_end());
            return Ok(Spanned::new(Global::Function { dec, body }, span));
        }

        let expr = self.parse_expression()?;
        self.stream.expect(Token::Semi)?;
        let span = Span::new(start, self.stream.last_end());
        Ok(Spanned::new(Global::Basic(expr), span))
    }

    fn parse_func_params(&mut self) -> Result<Vec<Spanned<String>>, CompileError> {
        self.stream.expect(Token::LParen)?;

        let mut params = Vec::new();
        if self.stream.try_consume(Token::RParen) {
            return Ok(params);
        }

        params.push(self.stream.expect_name()?);
        while self.stream.try_consume(Token::Comma) {
            params.push(self.stream.expect_name()?);
        }

        self.stream.expect(Token::RParen)?;
        Ok(params)
    }

    // ── statements ───────────────────────────────────────────────────

    pub fn parse_statement(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.stream.mark();

        if self.stream.peek_is(Token::LBrace) {
            let block = self.parse_braced_block()?;
            let span = Span::new(start, self.stream.last_end());
            return Ok(Spanned::new(Stmt::Block(block), span));
        }

        if self.stream.try_consume(Token::While) {
            let cond = self.parse_expression()?;
            let body = self.parse_block_or_stmt()?;
            let span = Span::new(start, self.stream.last_end());
            return Ok(Spanned::new(Stmt::While { cond, body }, span));
        }

        if self.stream.try_consume(Token::If) {
            let cond = self.parse_expression()?;
            let then_block = self.parse_block_or_stmt()?;
            let else_block = if self.stream.try_consume(Token::Else) {
                self.parse_block_or_stmt()?
            } else {
                Block::empty()
            };
            let span = Span::new(start, self.stream.last_end());
            return Ok(Spanned::new(Stmt::If { cond, then_block, else_block }, span));
        }

        if self.stream.try_consume(Token::Return) {
            let expr = self.parse_expression()?;
            self.stream.try_consume(Token::Semi);
            let span = Span::new(start, self.stream.last_end());
            return Ok(Spanned::new(Stmt::Return(expr), span));
        }

        let expr = self.parse_expression()?;
        self.stream.expect(Token::Semi)?;
        let span = Span::new(start, self.stream.last_end());
        Ok(Spanned::new(Stmt::Basic(expr), span))
    }

    /// The body accepted by `while` and `if`: a bare `;` (empty), a braced
    /// block, or a single statement.
    fn parse_block_or_stmt(&mut self) -> Result<Block, CompileError> {
        if self.stream.try_consume(Token::Semi) {
            return Ok(Block::empty());
        }

        if self.stream.peek_is(Token::LBrace) {
            return self.parse_braced_block();
        }

        let stmt = self.parse_statement()?;
        Ok(Block { parts: vec![stmt] })
    }

    fn parse_braced_block(&mut self) -> Result<Block, CompileError> {
        self.stream.expect(Token::LBrace)?;

        let mut parts = Vec::new();
        loop {
            if self.stream.try_consume(Token::RBrace) {
                return Ok(Block { parts });
            }
            if self.stream.is_empty() {
                return Err(CompileError::syntax(
                    "expected statement or '}', found EOF",
                    self.stream.pos_span(),
                ));
            }
            parts.push(self.parse_statement()?);
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    pub fn parse_expression(&mut self) -> Result<Spanned<Expr>, CompileError> {
        self.parse_expr(0)
    }

    fn peek_op(&self) -> Option<Op> {
        self.stream.peek().and_then(|tok| op_of(&tok.node))
    }

    // Pratt loop over the binding-power table in `ast::Op`.
    fn parse_expr(&mut self, min_bp: Bp) -> Result<Spanned<Expr>, CompileError> {
        let start = self.stream.mark();

        let mut lhs = match self.peek_op() {
            Some(op) if op.bp_prefix() > 0 => {
                self.stream.advance();
                let inner = self.parse_expr(op.bp_prefix())?;
                let span = Span::new(start, self.stream.last_end());
                Spanned::new(Expr::PreOp { op, inner: Box::new(inner) }, span)
            }
            _ if self.stream.peek_is(Token::LParen) => self.parse_paren_expression()?,
            _ if self.stream.peek_is(Token::At) => self.parse_cast(start)?,
            _ => self.parse_atom()?,
        };

        loop {
            if self.stream.peek_is(Token::LParen) {
                if CALL_BP < min_bp {
                    break;
                }
                let args = self.parse_call_args()?;
                let span = Span::new(start, self.stream.last_end());
                lhs = Spanned::new(Expr::Call { callee: Box::new(lhs), args }, span);
                continue;
            }

            if self.stream.peek_is(Token::LBracket) {
                if SUBSCRIPT_BP < min_bp {
                    break;
                }
                self.stream.advance();
                let index = self.parse_expr(0)?;
                self.stream.expect(Token::RBracket)?;
                let span = Span::new(start, self.stream.last_end());
                lhs = Spanned::new(
                    Expr::SubScript { array: Box::new(lhs), index: Box::new(index) },
                    span,
                );
                continue;
            }

            let Some(op) = self.peek_op() else { break };

            let postfix = op.bp_postfix();
            if postfix > 0 && postfix >= min_bp {
                self.stream.advance();
                let span = Span::new(start, self.stream.last_end());
                lhs = Spanned::new(Expr::PreOp { op, inner: Box::new(lhs) }, span);
                continue;
            }

            let lbp = op.bp_infix_left();
            if lbp == 0 || lbp < min_bp {
                break;
            }
            self.stream.advance();

            // A left-associative operator must not re-consume itself in its
            // own right operand; the right-associative `=` re-enters at its
            // own level.
            let next_min = if lbp >= op.bp_infix_right() { lbp + 1 } else { lbp };
            let rhs = self.parse_expr(next_min)?;
            let span = Span::new(start, self.stream.last_end());
            lhs = Spanned::new(
                Expr::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
                span,
            );
        }

        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Spanned<Expr>, CompileError> {
        if let Some(num) = self.stream.try_number() {
            return Ok(Spanned::new(Expr::Num(num.node), num.span));
        }

        if let Some(name) = self.stream.try_name() {
            let span = name.span;
            return Ok(Spanned::new(Expr::Var(name.node), span));
        }

        Err(CompileError::syntax(
            format!("expected expression, found {}", self.stream.found_token()),
            self.stream.pos_span(),
        ))
    }

    fn parse_paren_expression(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let start = self.stream.mark();
        self.stream.expect(Token::LParen)?;
        let mut expr = self.parse_expr(0)?;
        self.stream.expect(Token::RParen)?;
        // the node's slice covers the parentheses
        expr.span = Span::new(start, self.stream.last_end());
        Ok(expr)
    }

    fn parse_cast(&mut self, start: usize) -> Result<Spanned<Expr>, CompileError> {
        self.stream.expect(Token::At)?;
        let type_name = self.stream.expect_name()?;
        let inner = self.parse_expr(CAST_BP)?;
        let span = Span::new(start, self.stream.last_end());
        Ok(Spanned::new(
            Expr::TypeCast { type_name, inner: Box::new(inner) },
            span,
        ))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Spanned<Expr>>, CompileError> {
        self.stream.expect(Token::LParen)?;

        let mut args = Vec::new();
        if self.stream.try_consume(Token::RParen) {
            return Ok(args);
        }

        args.push(self.parse_expr(0)?);
        while self.stream.try_consume(Token::Comma) {
            args.push(self.parse_expr(0)?);
        }

        self.stream.expect(Token::RParen)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_expr(src: &str) -> Spanned<Expr> {
        let tokens = lex(src).unwrap();
        let mut parser = Parser::new(&tokens, src);
        let expr = parser.parse_expression().unwrap();
        assert!(parser.stream.is_empty(), "trailing tokens in {src:?}");
        expr
    }

    fn parse_stmt(src: &str) -> Spanned<Stmt> {
        let tokens = lex(src).unwrap();
        let mut parser = Parser::new(&tokens, src);
        parser.parse_statement().unwrap()
    }

    fn parse_globals(src: &str) -> Vec<Spanned<Global>> {
        let tokens = lex(src).unwrap();
        let mut parser = Parser::new(&tokens, src);
        parser.parse_program().unwrap()
    }

    #[test]
    fn precedence_mul_over_add() {
        // 1 + (2 * 3) + 4
        let expr = parse_expr("1 + 2 * 3 + 4");
        let Expr::BinOp { op: Op::Plus, lhs, rhs } = &expr.node else {
            panic!("expected top-level +");
        };
        assert!(matches!(rhs.node, Expr::Num(4)));
        let Expr::BinOp { op: Op::Plus, rhs: mul, .. } = &lhs.node else {
            panic!("expected inner +");
        };
        assert!(matches!(mul.node, Expr::BinOp { op: Op::Star, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        // (10 - 2) - 3
        let expr = parse_expr("10 - 2 - 3");
        let Expr::BinOp { op: Op::Minus, lhs, rhs } = &expr.node else {
            panic!("expected -");
        };
        assert!(matches!(rhs.node, Expr::Num(3)));
        assert!(matches!(lhs.node, Expr::BinOp { op: Op::Minus, .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        // a = (b = c)
        let expr = parse_expr("a = b = c");
        let Expr::BinOp { op: Op::Assign, lhs, rhs } = &expr.node else {
            panic!("expected =");
        };
        assert!(matches!(&lhs.node, Expr::Var(name) if name == "a"));
        assert!(matches!(rhs.node, Expr::BinOp { op: Op::Assign, .. }));
    }

    #[test]
    fn parens_override_precedence() {
        // (1 + 2) * 3
        let expr = parse_expr("(1 + 2) * 3");
        let Expr::BinOp { op: Op::Star, lhs, .. } = &expr.node else {
            panic!("expected *");
        };
        assert!(matches!(lhs.node, Expr::BinOp { op: Op::Plus, .. }));
    }

    #[test]
    fn prefix_minus_binds_tighter_than_mul() {
        // (-a) * b
        let expr = parse_expr("-a * b");
        let Expr::BinOp { op: Op::Star, lhs, .. } = &expr.node else {
            panic!("expected *");
        };
        assert!(matches!(lhs.node, Expr::PreOp { op: Op::Minus, .. }));
    }

    #[test]
    fn postfix_increment_then_infix() {
        // (a++) + b
        let expr = parse_expr("a++ + b");
        let Expr::BinOp { op: Op::Plus, lhs, .. } = &expr.node else {
            panic!("expected +");
        };
        assert!(matches!(lhs.node, Expr::PreOp { op: Op::PlusPlus, .. }));
    }

    #[test]
    fn deref_assignment() {
        // (*p) = 5
        let expr = parse_expr("*p = 5");
        let Expr::BinOp { op: Op::Assign, lhs, rhs } = &expr.node else {
            panic!("expected =");
        };
        assert!(matches!(lhs.node, Expr::PreOp { op: Op::Star, .. }));
        assert!(matches!(rhs.node, Expr::Num(5)));
    }

    #[test]
    fn address_of_call_takes_the_call() {
        // &(f(5)): postfix call binds inside the prefix operand
        let expr = parse_expr("&f(5)");
        let Expr::PreOp { op: Op::BitAnd, inner } = &expr.node else {
            panic!("expected &");
        };
        assert!(matches!(inner.node, Expr::Call { .. }));
    }

    #[test]
    fn cast_operand_stops_before_infix_operators() {
        // (@int x) + y and (@int x) * y
        for src in ["@int x + y", "@int x * y"] {
            let expr = parse_expr(src);
            let Expr::BinOp { lhs, .. } = &expr.node else {
                panic!("expected binop for {src:?}");
            };
            assert!(matches!(lhs.node, Expr::TypeCast { .. }));
        }
    }

    #[test]
    fn cast_operand_takes_postfix_call() {
        let expr = parse_expr("@int f(x)");
        let Expr::TypeCast { type_name, inner } = &expr.node else {
            panic!("expected cast");
        };
        assert_eq!(type_name.node, "int");
        assert!(matches!(inner.node, Expr::Call { .. }));
    }

    #[test]
    fn chained_calls_and_subscripts() {
        let expr = parse_expr("f(1)(2)");
        let Expr::Call { callee, args } = &expr.node else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(callee.node, Expr::Call { .. }));

        let expr = parse_expr("a[1][2]");
        let Expr::SubScript { array, .. } = &expr.node else {
            panic!("expected subscript");
        };
        assert!(matches!(array.node, Expr::SubScript { .. }));
    }

    #[test]
    fn call_argument_lists() {
        let expr = parse_expr("f()");
        assert!(matches!(&expr.node, Expr::Call { args, .. } if args.is_empty()));

        let expr = parse_expr("f(1, a + 2, g(3))");
        let Expr::Call { args, .. } = &expr.node else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn logical_chain_shape() {
        // (!1 && 0) || (1 && 1)
        let expr = parse_expr("(!1 && 0) || (1 && 1)");
        let Expr::BinOp { op: Op::OrOr, lhs, rhs } = &expr.node else {
            panic!("expected ||");
        };
        assert!(matches!(lhs.node, Expr::BinOp { op: Op::AndAnd, .. }));
        assert!(matches!(rhs.node, Expr::BinOp { op: Op::AndAnd, .. }));
    }

    #[test]
    fn expr_statement_requires_semicolon() {
        let tokens = lex("a + 1").unwrap();
        let mut parser = Parser::new(&tokens, "a + 1");
        let err = parser.parse_statement().unwrap_err();
        assert!(err.to_string().contains("expected ';'"));
    }

    #[test]
    fn return_semicolon_is_optional() {
        let stmt = parse_stmt("return 5");
        assert!(matches!(stmt.node, Stmt::Return(_)));
        let stmt = parse_stmt("return 5;");
        assert!(matches!(stmt.node, Stmt::Return(_)));
    }

    #[test]
    fn if_else_fills_the_dedicated_field() {
        let stmt = parse_stmt("if a b = 1; else b = 2;");
        let Stmt::If { then_block, else_block, .. } = &stmt.node else {
            panic!("expected if");
        };
        assert_eq!(then_block.parts.len(), 1);
        assert_eq!(else_block.parts.len(), 1);
    }

    #[test]
    fn if_without_else_has_empty_else_block() {
        let stmt = parse_stmt("if a { b = 1; }");
        let Stmt::If { else_block, .. } = &stmt.node else {
            panic!("expected if");
        };
        assert!(else_block.parts.is_empty());
    }

    #[test]
    fn block_or_stmt_accepts_bare_semicolon() {
        let stmt = parse_stmt("while a ;");
        let Stmt::While { body, .. } = &stmt.node else {
            panic!("expected while");
        };
        assert!(body.parts.is_empty());
    }

    #[test]
    fn block_or_stmt_accepts_single_statement() {
        let stmt = parse_stmt("while a a = a - 1;");
        let Stmt::While { body, .. } = &stmt.node else {
            panic!("expected while");
        };
        assert_eq!(body.parts.len(), 1);
    }

    #[test]
    fn global_declaration_and_definition() {
        let globals = parse_globals("cfn inc(a); fn dec(a, b) { return a - b; }");
        assert_eq!(globals.len(), 2);
        let Global::FuncDec(dec) = &globals[0].node else {
            panic!("expected declaration");
        };
        assert!(dec.is_c);
        assert_eq!(dec.name.node, "inc");
        assert_eq!(dec.params.len(), 1);

        let Global::Function { dec, body } = &globals[1].node else {
            panic!("expected definition");
        };
        assert!(!dec.is_c);
        assert_eq!(dec.params.len(), 2);
        assert_eq!(body.parts.len(), 1);
    }

    #[test]
    fn global_expression_statement() {
        let globals = parse_globals("1 + 2;");
        assert!(matches!(globals[0].node, Global::Basic(_)));
    }

    #[test]
    fn keyword_is_not_an_expression() {
        let tokens = lex("return let;").unwrap();
        let mut parser = Parser::new(&tokens, "return let;");
        let err = parser.parse_statement().unwrap_err();
        assert!(err.to_string().contains("expected expression"));
        assert!(err.to_string().contains("'let'"));
    }

    #[test]
    fn unterminated_block_reports_eof() {
        let tokens = lex("cfn main() { return 1;").unwrap();
        let mut parser = Parser::new(&tokens, "cfn main() { return 1;");
        let err = parser.parse_program().unwrap_err();
        assert!(err.to_string().contains("EOF"));
    }

    #[test]
    fn node_spans_cover_their_source_text() {
        let src = "x + f(1, 2) * 3";
        let expr = parse_expr(src);
        assert_eq!(&src[expr.span.start..expr.span.end], src);
        let Expr::BinOp { rhs, .. } = &expr.node else {
            panic!("expected +");
        };
        assert_eq!(&src[rhs.span.start..rhs.span.end], "f(1, 2) * 3");
        let Expr::BinOp { lhs: call, .. } = &rhs.node else {
            panic!("expected *");
        };
        assert_eq!(&src[call.span.start..call.span.end], "f(1, 2)");
    }
}
