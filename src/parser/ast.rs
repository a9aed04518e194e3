use crate::span::Spanned;
use std::fmt;

/// Binding power. 0 means the operator cannot appear in that position.
pub type Bp = u8;

/// The closed operator set of small-lang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // comparison
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,

    // logical
    AndAnd,
    OrOr,
    Not,

    // bitwise
    BitAnd,
    BitOr,
    BitXor,

    // assignment and increment
    Assign,
    PlusPlus,
    MinusMinus,

    // member access
    Arrow,
    Dot,
}

impl Op {
    pub const ALL: [Op; 22] = [
        Op::Plus,
        Op::Minus,
        Op::Star,
        Op::Slash,
        Op::Percent,
        Op::Lt,
        Op::Gt,
        Op::Le,
        Op::Ge,
        Op::EqEq,
        Op::NotEq,
        Op::AndAnd,
        Op::OrOr,
        Op::Not,
        Op::BitAnd,
        Op::BitOr,
        Op::BitXor,
        Op::Assign,
        Op::PlusPlus,
        Op::MinusMinus,
        Op::Arrow,
        Op::Dot,
    ];

    pub fn bp_prefix(self) -> Bp {
        match self {
            // C-style unary operators all bind equally tight
            Op::Plus
            | Op::Minus
            | Op::Not
            | Op::BitAnd
            | Op::Star
            | Op::PlusPlus
            | Op::MinusMinus => 16,
            _ => 0,
        }
    }

    pub fn bp_infix_left(self) -> Bp {
        match self {
            Op::Dot | Op::Arrow => 20,
            Op::Star | Op::Slash | Op::Percent => 14,
            Op::Plus | Op::Minus => 13,
            Op::Lt | Op::Gt | Op::Le | Op::Ge => 11,
            Op::EqEq | Op::NotEq => 10,
            Op::BitAnd => 9,
            Op::BitXor => 8,
            Op::BitOr => 7,
            Op::AndAnd => 6,
            Op::OrOr => 5,
            Op::Assign => 3,
            _ => 0,
        }
    }

    pub fn bp_infix_right(self) -> Bp {
        match self {
            // `=` is the only right-associative operator
            Op::Assign => 4,
            other => other.bp_infix_left(),
        }
    }

    pub fn bp_postfix(self) -> Bp {
        match self {
            Op::PlusPlus | Op::MinusMinus => 15,
            _ => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Star => "*",
            Op::Slash => "/",
            Op::Percent => "%",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::EqEq => "==",
            Op::NotEq => "!=",
            Op::AndAnd => "&&",
            Op::OrOr => "||",
            Op::Not => "!",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::Assign => "=",
            Op::PlusPlus => "++",
            Op::MinusMinus => "--",
            Op::Arrow => "->",
            Op::Dot => ".",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Var(String),
    Num(u64),
    /// Prefix and postfix unary operators both land here.
    PreOp {
        op: Op,
        inner: Box<Spanned<Expr>>,
    },
    TypeCast {
        type_name: Spanned<String>,
        inner: Box<Spanned<Expr>>,
    },
    BinOp {
        op: Op,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    SubScript {
        array: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    Call {
        callee: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
    },
}

#[derive(Debug, Clone)]
pub struct Block {
    pub parts: Vec<Spanned<Stmt>>,
}

impl Block {
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression statement.
    Basic(Spanned<Expr>),
    Return(Spanned<Expr>),
    Block(Block),
    If {
        cond: Spanned<Expr>,
        then_block: Block,
        /// Empty when no `else` branch was written.
        else_block: Block,
    },
    While {
        cond: Spanned<Expr>,
        body: Block,
    },
}

#[derive(Debug, Clone)]
pub struct FuncDec {
    /// `cfn` declares the C calling convention; `fn` uses the fast one.
    pub is_c: bool,
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
}

#[derive(Debug, Clone)]
pub enum Global {
    /// Forward declaration: a signature followed by `;`.
    FuncDec(FuncDec),
    Function {
        dec: FuncDec,
        body: Block,
    },
    /// Top-level expression statement, reserved for future constants.
    Basic(Spanned<Expr>),
}
