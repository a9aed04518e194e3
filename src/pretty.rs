use crate::parser::ast::*;
use crate::span::Spanned;

/// Render parsed globals back into source-like text, fully parenthesized.
pub fn render_globals(globals: &[Spanned<Global>]) -> String {
    let mut pp = PrettyPrinter::new();
    for global in globals {
        pp.emit_global(&global.node);
    }
    pp.buf
}

struct PrettyPrinter {
    buf: String,
    indent: usize,
}

impl PrettyPrinter {
    fn new() -> Self {
        Self { buf: String::new(), indent: 0 }
    }

    fn write(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn newline(&mut self) {
        self.buf.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
    }

    fn emit_global(&mut self, global: &Global) {
        match global {
            Global::FuncDec(dec) => {
                self.emit_signature(dec);
                self.write(";");
                self.newline();
            }
            Global::Function { dec, body } => {
                self.emit_signature(dec);
                self.write(" ");
                self.emit_block(body);
                self.newline();
            }
            Global::Basic(expr) => {
                self.emit_expr(&expr.node);
                self.write(";");
                self.newline();
            }
        }
    }

    fn emit_signature(&mut self, dec: &FuncDec) {
        self.write(if dec.is_c { "cfn " } else { "fn " });
        self.write(&dec.name.node);
        self.write("(");
        for (i, param) in dec.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&param.node);
        }
        self.write(")");
    }

    fn emit_block(&mut self, block: &Block) {
        self.write("{");
        self.newline();
        self.indent += 1;
        for part in &block.parts {
            self.write_indent();
            self.emit_stmt(&part.node);
            self.newline();
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Basic(expr) => {
                self.emit_expr(&expr.node);
                self.write(";");
            }
            Stmt::Return(expr) => {
                self.write("return ");
                self.emit_expr(&expr.node);
                self.write(";");
            }
            Stmt::Block(block) => self.emit_block(block),
            Stmt::If { cond, then_block, else_block } => {
                self.write("if ");
                self.emit_expr(&cond.node);
                self.write(" ");
                self.emit_block(then_block);
                if !else_block.parts.is_empty() {
                    self.write(" else ");
                    self.emit_block(else_block);
                }
            }
            Stmt::While { cond, body } => {
                self.write("while ");
                self.emit_expr(&cond.node);
                self.write(" ");
                self.emit_block(body);
            }
        }
    }

    fn emit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Var(name) => self.write(name),
            Expr::Num(value) => self.write(&value.to_string()),
            Expr::PreOp { op, inner } => {
                self.write("(");
                self.write(op.as_str());
                self.emit_expr(&inner.node);
                self.write(")");
            }
            Expr::TypeCast { type_name, inner } => {
                self.write("(@");
                self.write(&type_name.node);
                self.write(" ");
                self.emit_expr(&inner.node);
                self.write(")");
            }
            Expr::BinOp { op, lhs, rhs } => {
                self.write("(");
                self.emit_expr(&lhs.node);
                self.write(" ");
                self.write(op.as_str());
                self.write(" ");
                self.emit_expr(&rhs.node);
                self.write(")");
            }
            Expr::SubScript { array, index } => {
                self.emit_expr(&array.node);
                self.write("[");
                self.emit_expr(&index.node);
                self.write("]");
            }
            Expr::Call { callee, args } => {
                self.emit_expr(&callee.node);
                self.write("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expr(&arg.node);
                }
                self.write(")");
            }
        }
    }
}
