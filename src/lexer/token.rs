use logos::Logos;
use std::fmt;

/// All tokens of small-lang. Keywords get their own variants so an
/// identifier can never shadow one; logos picks the longest match, so
/// `iffy` still lexes as an identifier.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Keywords used by the grammar
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("fn")]
    Fn,
    #[token("cfn")]
    CFn,

    // Reserved keywords
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("let")]
    Let,
    #[token("as")]
    As,
    #[token("is")]
    Is,
    #[token("const")]
    Const,
    #[token("struct")]
    Struct,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u64>().ok())]
    Num(u64),

    // Identifiers: alphabetic start, then alphanumerics or underscore
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*")]
    Ident,

    // Two-character operators
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("->")]
    Arrow,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    // Single-character operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token(".")]
    Dot,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("@")]
    At,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
}

impl Token {
    /// Surface text of a fixed token, or a generic class name for
    /// identifiers and numbers.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::If => "'if'",
            Token::Else => "'else'",
            Token::While => "'while'",
            Token::Return => "'return'",
            Token::Fn => "'fn'",
            Token::CFn => "'cfn'",
            Token::For => "'for'",
            Token::Break => "'break'",
            Token::Continue => "'continue'",
            Token::True => "'true'",
            Token::False => "'false'",
            Token::Let => "'let'",
            Token::As => "'as'",
            Token::Is => "'is'",
            Token::Const => "'const'",
            Token::Struct => "'struct'",
            Token::Num(_) => "number",
            Token::Ident => "identifier",
            Token::PlusPlus => "'++'",
            Token::MinusMinus => "'--'",
            Token::Arrow => "'->'",
            Token::AmpAmp => "'&&'",
            Token::PipePipe => "'||'",
            Token::EqEq => "'=='",
            Token::BangEq => "'!='",
            Token::LtEq => "'<='",
            Token::GtEq => "'>='",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::Slash => "'/'",
            Token::Percent => "'%'",
            Token::Dot => "'.'",
            Token::Amp => "'&'",
            Token::Pipe => "'|'",
            Token::Caret => "'^'",
            Token::Bang => "'!'",
            Token::Eq => "'='",
            Token::Lt => "'<'",
            Token::Gt => "'>'",
            Token::At => "'@'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Comma => "','",
            Token::Semi => "';'",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
