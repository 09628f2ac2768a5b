//! Lexical tokens, grounded on the source's `TokenTypes.hpp`/`Token.hpp`
//! (kept as a compact Rust enum rather than a separate type-tag + lexeme
//! pair).

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Int,
    Float,
    String,
    Identifier,

    // Keywords
    And,
    Bool,
    Break,
    Class,
    Const,
    Continue,
    Default,
    Else,
    False,
    Float_,
    Fn,
    For,
    If,
    Import,
    Int_,
    Move,
    Null,
    Not,
    Or,
    Private,
    Protected,
    Public,
    Ref,
    Return,
    String_,
    Super,
    Switch,
    This,
    True,
    Type,
    Typeof,
    Var,
    While,

    // Punctuation / operators
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    DotDot,
    DotDotEq,
    Colon,
    ColonColon,
    Semicolon,
    Arrow,
    Question,
    Tilde,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PlusPlus,
    MinusMinus,

    Equal,
    EqualEqual,
    Bang,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    AndAnd,
    OrOr,

    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Token {
        Token { kind, lexeme: lexeme.into(), line }
    }
}

lazy_static::lazy_static! {
    pub static ref KEYWORDS: std::collections::HashMap<&'static str, TokenKind> = {
        use TokenKind::*;
        let mut m = std::collections::HashMap::new();
        m.insert("and", And);
        m.insert("bool", Bool);
        m.insert("break", Break);
        m.insert("class", Class);
        m.insert("const", Const);
        m.insert("continue", Continue);
        m.insert("default", Default);
        m.insert("else", Else);
        m.insert("false", False);
        m.insert("float", Float_);
        m.insert("fn", Fn);
        m.insert("for", For);
        m.insert("if", If);
        m.insert("import", Import);
        m.insert("int", Int_);
        m.insert("move", Move);
        m.insert("null", Null);
        m.insert("not", Not);
        m.insert("or", Or);
        m.insert("private", Private);
        m.insert("protected", Protected);
        m.insert("public", Public);
        m.insert("ref", Ref);
        m.insert("return", Return);
        m.insert("string", String_);
        m.insert("super", Super);
        m.insert("switch", Switch);
        m.insert("this", This);
        m.insert("true", True);
        m.insert("type", Type);
        m.insert("typeof", Typeof);
        m.insert("var", Var);
        m.insert("while", While);
        m
    };
}
