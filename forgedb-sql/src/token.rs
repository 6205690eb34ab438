//! The lexer: a `logos`-driven token stream over the SQL surface
//! supported by the executor (§6.2). Mirrors the teacher's own
//! `Logos`-derived `TokenKind` shape, trimmed to the keywords and
//! symbols this grammar actually uses.

use std::ops::Range;

use logos::{Lexer, Logos};
use strum_macros::EnumIter;

#[allow(non_camel_case_types)]
#[derive(Logos, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error,

    EOI,

    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[regex(r"--[^\n]*", logos::skip)]
    Comment,

    #[regex(r#"[_a-zA-Z][_a-zA-Z0-9]*"#)]
    Ident,

    #[regex(r#"'([^'\\]|\\.)*'"#)]
    QuotedString,

    #[regex(r"[0-9]+")]
    LiteralInteger,

    #[regex(r"[0-9]+\.[0-9]+")]
    LiteralFloat,

    #[token("==")]
    #[token("=")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Lte,
    #[token(">=")]
    Gte,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(";")]
    SemiColon,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("*")]
    Star,
    #[token("-")]
    Minus,

    // Keywords, alphabetical.
    #[token("AND", ignore(ascii_case))]
    AND,
    #[token("AS", ignore(ascii_case))]
    AS,
    #[token("ASC", ignore(ascii_case))]
    ASC,
    #[token("AVG", ignore(ascii_case))]
    AVG,
    #[token("BEGIN", ignore(ascii_case))]
    BEGIN,
    #[token("BY", ignore(ascii_case))]
    BY,
    #[token("COMMIT", ignore(ascii_case))]
    COMMIT,
    #[token("CONFLICT", ignore(ascii_case))]
    CONFLICT,
    #[token("COUNT", ignore(ascii_case))]
    COUNT,
    #[token("CREATE", ignore(ascii_case))]
    CREATE,
    #[token("DATABASE", ignore(ascii_case))]
    DATABASE,
    #[token("DELETE", ignore(ascii_case))]
    DELETE,
    #[token("DESC", ignore(ascii_case))]
    DESC,
    #[token("DISTANCE", ignore(ascii_case))]
    DISTANCE,
    #[token("DOUBLE", ignore(ascii_case))]
    DOUBLE,
    #[token("DP_COUNT", ignore(ascii_case))]
    DP_COUNT,
    #[token("DP_EPSILON", ignore(ascii_case))]
    DP_EPSILON,
    #[token("DROP", ignore(ascii_case))]
    DROP,
    #[token("END", ignore(ascii_case))]
    END,
    #[token("EXIT", ignore(ascii_case))]
    EXIT,
    #[token("FLOAT", ignore(ascii_case))]
    FLOAT,
    #[token("FOR", ignore(ascii_case))]
    FOR,
    #[token("FROM", ignore(ascii_case))]
    FROM,
    #[token("GROUP", ignore(ascii_case))]
    GROUP,
    #[token("GSET", ignore(ascii_case))]
    GSET,
    #[token("INSERT", ignore(ascii_case))]
    INSERT,
    #[token("INT", ignore(ascii_case))]
    INT,
    #[token("INTEGER", ignore(ascii_case))]
    INTEGER,
    #[token("INTO", ignore(ascii_case))]
    INTO,
    #[token("IS", ignore(ascii_case))]
    IS,
    #[token("JOIN", ignore(ascii_case))]
    JOIN,
    #[token("KEY", ignore(ascii_case))]
    KEY,
    #[token("LIMIT", ignore(ascii_case))]
    LIMIT,
    #[token("LOAD", ignore(ascii_case))]
    LOAD,
    #[token("LWW", ignore(ascii_case))]
    LWW,
    #[token("MAX", ignore(ascii_case))]
    MAX,
    #[token("MERGE", ignore(ascii_case))]
    MERGE,
    #[token("MIN", ignore(ascii_case))]
    MIN,
    #[token("NOT", ignore(ascii_case))]
    NOT,
    #[token("NULL", ignore(ascii_case))]
    NULL,
    #[token("OF", ignore(ascii_case))]
    OF,
    #[token("ON", ignore(ascii_case))]
    ON,
    #[token("ORDER", ignore(ascii_case))]
    ORDER,
    #[token("PERIOD", ignore(ascii_case))]
    PERIOD,
    #[token("PRIMARY", ignore(ascii_case))]
    PRIMARY,
    #[token("QUIT", ignore(ascii_case))]
    QUIT,
    #[token("ROLLBACK", ignore(ascii_case))]
    ROLLBACK,
    #[token("SAVE", ignore(ascii_case))]
    SAVE,
    #[token("SELECT", ignore(ascii_case))]
    SELECT,
    #[token("SET", ignore(ascii_case))]
    SET,
    #[token("SUM", ignore(ascii_case))]
    SUM,
    #[token("SUM_BOUNDED", ignore(ascii_case))]
    SUM_BOUNDED,
    #[token("SYSTEM_TIME", ignore(ascii_case))]
    SYSTEM_TIME,
    #[token("TABLE", ignore(ascii_case))]
    TABLE,
    #[token("TEXT", ignore(ascii_case))]
    TEXT,
    #[token("TRANSACTION", ignore(ascii_case))]
    TRANSACTION,
    #[token("TX", ignore(ascii_case))]
    TX,
    #[token("UPDATE", ignore(ascii_case))]
    UPDATE,
    #[token("VALID", ignore(ascii_case))]
    VALID,
    #[token("VALUES", ignore(ascii_case))]
    VALUES,
    #[token("VECTOR", ignore(ascii_case))]
    VECTOR,
    #[token("WHERE", ignore(ascii_case))]
    WHERE,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, TokenKind::LiteralInteger | TokenKind::LiteralFloat | TokenKind::QuotedString)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub source: &'a str,
    pub slice: &'a str,
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl<'a> Token<'a> {
    fn new_eoi(source: &'a str) -> Self {
        Token { source, slice: "", kind: TokenKind::EOI, span: source.len()..source.len() }
    }
}

impl<'a> std::fmt::Debug for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.slice)
    }
}

pub struct Tokenizer<'a> {
    source: &'a str,
    lexer: Lexer<'a, TokenKind>,
    eoi: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer { source, lexer: TokenKind::lexer(source), eoi: false }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lexer.next() {
            Some(Err(_)) => Some(Err(format!("unrecognized token near '{}'", self.lexer.slice()))),
            Some(Ok(kind)) => {
                Some(Ok(Token { source: self.source, slice: self.lexer.slice(), kind, span: self.lexer.span() }))
            }
            None if !self.eoi => {
                self.eoi = true;
                Some(Ok(Token::new_eoi(self.source)))
            }
            None => None,
        }
    }
}

pub fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    Tokenizer::new(sql).collect()
}
