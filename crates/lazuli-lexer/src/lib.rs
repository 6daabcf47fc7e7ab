use lazuli_ast::loc::Location;
use logos::{Lexer, Logos};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("{0}: illegal token")]
    IllegalToken(Location),
    #[error("{0}: unterminated string literal")]
    UnterminatedString(Location),
    #[error("{0}: bad character literal")]
    BadCharacter(Location),
    #[error("{0}: unrecognised escape sequence")]
    BadEscape(Location),
    #[error("{0}: bad indentation")]
    BadIndentation(Location),
    #[error("{0}: integer literal out of range")]
    IntOutOfRange(Location),
}

impl LexError {
    pub fn location(&self) -> Location {
        match self {
            LexError::IllegalToken(l)
            | LexError::UnterminatedString(l)
            | LexError::BadCharacter(l)
            | LexError::BadEscape(l)
            | LexError::BadIndentation(l)
            | LexError::IntOutOfRange(l) => *l,
        }
    }
}

/// Raw tokens before the layout pass. Newlines survive lexing so that the
/// layout pass can compare line indentations; everything else that is
/// whitespace or comment is dropped here.
#[derive(Debug, Logos, PartialEq, Clone)]
enum RawTok {
    #[regex(r"[ \t\r]+", logos::skip)]
    _Whitespace,

    #[regex(r"--[^\n]*", logos::skip)]
    _CommentLine,

    #[token("\n")]
    Newline,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("\\")]
    Backslash,
    #[token("|")]
    Pipe,

    // Longer operators first so e.g. "++" never lexes as two plus signs.
    #[token("->")]
    Arrow,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("++")]
    PlusPlus,
    #[token("||")]
    OrOr,
    #[token("&&")]
    AndAnd,
    #[token("=")]
    Equals,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
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
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    #[token("case")]
    Case,
    #[token("of")]
    Of,
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("data")]
    Data,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"'(\\.|[^'\\\n])'", parse_char)]
    Char(u8),

    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    #[regex(r"[a-zA-Z][a-zA-Z0-9']*", |lex| lex.slice().to_string())]
    Ident(String),
}

fn unescape(c: char) -> Option<u8> {
    match c {
        '\\' => Some(b'\\'),
        '\'' => Some(b'\''),
        '"' => Some(b'"'),
        'n' => Some(b'\n'),
        'r' => Some(b'\r'),
        't' => Some(b'\t'),
        _ => None,
    }
}

fn parse_char(lex: &mut Lexer<RawTok>) -> Option<u8> {
    let inner = &lex.slice()[1..lex.slice().len() - 1];
    let mut chars = inner.chars();
    let first = chars.next()?;
    if first == '\\' {
        unescape(chars.next()?)
    } else if first.is_ascii() {
        Some(first as u8)
    } else {
        None
    }
}

fn parse_string(lex: &mut Lexer<RawTok>) -> Option<String> {
    let inner = &lex.slice()[1..lex.slice().len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(unescape(chars.next()?)? as char);
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Tokens the parser consumes. `Indent`/`Dedent`/`Newline` encode the
/// layout of the source; `End` terminates every stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Char(u8),
    Str(String),

    Indent,
    Dedent,
    Newline,
    End,

    Case,
    Of,
    Let,
    In,
    If,
    Then,
    Else,
    Data,

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Backslash,
    Pipe,
    Arrow,
    Equals,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    PlusPlus,
    OrOr,
    AndAnd,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Colon,
    Dot,
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Tok::Ident(name) => return write!(f, "identifier `{name}`"),
            Tok::Int(value) => return write!(f, "integer {value}"),
            Tok::Char(c) => return write!(f, "character {:?}", *c as char),
            Tok::Str(s) => return write!(f, "string {s:?}"),
            Tok::Indent => "indent",
            Tok::Dedent => "dedent",
            Tok::Newline => "newline",
            Tok::End => "end of input",
            Tok::Case => "`case`",
            Tok::Of => "`of`",
            Tok::Let => "`let`",
            Tok::In => "`in`",
            Tok::If => "`if`",
            Tok::Then => "`then`",
            Tok::Else => "`else`",
            Tok::Data => "`data`",
            Tok::LParen => "`(`",
            Tok::RParen => "`)`",
            Tok::LBracket => "`[`",
            Tok::RBracket => "`]`",
            Tok::Comma => "`,`",
            Tok::Backslash => "`\\`",
            Tok::Pipe => "`|`",
            Tok::Arrow => "`->`",
            Tok::Equals => "`=`",
            Tok::EqEq => "`==`",
            Tok::NotEq => "`!=`",
            Tok::Less => "`<`",
            Tok::LessEq => "`<=`",
            Tok::Greater => "`>`",
            Tok::GreaterEq => "`>=`",
            Tok::PlusPlus => "`++`",
            Tok::OrOr => "`||`",
            Tok::AndAnd => "`&&`",
            Tok::Plus => "`+`",
            Tok::Minus => "`-`",
            Tok::Star => "`*`",
            Tok::Slash => "`/`",
            Tok::Percent => "`%`",
            Tok::Colon => "`:`",
            Tok::Dot => "`.`",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lexed {
    pub tok: Tok,
    pub loc: Location,
}

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn location(&self, offset: usize) -> Location {
        let line = self.starts.partition_point(|&s| s <= offset);
        let column = offset - self.starts[line - 1] + 1;
        Location::new(line as u32, column as u32)
    }
}

fn classify_error(source: &str, offset: usize, loc: Location) -> LexError {
    match source.as_bytes().get(offset) {
        Some(b'"') => LexError::UnterminatedString(loc),
        Some(b'\'') => LexError::BadCharacter(loc),
        Some(b'0'..=b'9') => LexError::IntOutOfRange(loc),
        _ => LexError::IllegalToken(loc),
    }
}

fn plain(raw: RawTok) -> Tok {
    match raw {
        RawTok::Ident(name) => Tok::Ident(name),
        RawTok::Int(value) => Tok::Int(value),
        RawTok::Char(c) => Tok::Char(c),
        RawTok::Str(s) => Tok::Str(s),
        RawTok::Case => Tok::Case,
        RawTok::Of => Tok::Of,
        RawTok::Let => Tok::Let,
        RawTok::In => Tok::In,
        RawTok::If => Tok::If,
        RawTok::Then => Tok::Then,
        RawTok::Else => Tok::Else,
        RawTok::Data => Tok::Data,
        RawTok::LParen => Tok::LParen,
        RawTok::RParen => Tok::RParen,
        RawTok::LBracket => Tok::LBracket,
        RawTok::RBracket => Tok::RBracket,
        RawTok::Comma => Tok::Comma,
        RawTok::Backslash => Tok::Backslash,
        RawTok::Pipe => Tok::Pipe,
        RawTok::Arrow => Tok::Arrow,
        RawTok::Equals => Tok::Equals,
        RawTok::EqEq => Tok::EqEq,
        RawTok::BangEq => Tok::NotEq,
        RawTok::Less => Tok::Less,
        RawTok::LessEq => Tok::LessEq,
        RawTok::Greater => Tok::Greater,
        RawTok::GreaterEq => Tok::GreaterEq,
        RawTok::PlusPlus => Tok::PlusPlus,
        RawTok::OrOr => Tok::OrOr,
        RawTok::AndAnd => Tok::AndAnd,
        RawTok::Plus => Tok::Plus,
        RawTok::Minus => Tok::Minus,
        RawTok::Star => Tok::Star,
        RawTok::Slash => Tok::Slash,
        RawTok::Percent => Tok::Percent,
        RawTok::Colon => Tok::Colon,
        RawTok::Dot => Tok::Dot,
        RawTok::Newline | RawTok::_Whitespace | RawTok::_CommentLine => {
            unreachable!("handled by the layout pass")
        }
    }
}

/// Lex a whole source buffer into a layout-resolved token stream.
///
/// Indentation levels form a stack: a line more indented than the one
/// before opens a block (`Indent`), a line returning to a previous level
/// closes blocks (`Dedent` per level), and a line at the same level
/// yields `Newline`. A dedent to a level that was never opened is an
/// error. The stream always terminates with `End`, preceded by dedents
/// for any blocks still open.
pub fn lex(source: &str) -> Result<Vec<Lexed>, LexError> {
    let index = LineIndex::new(source);
    let mut out = Vec::new();
    let mut levels: Vec<u32> = vec![0];
    let mut pending_newline = false;

    let mut lexer = RawTok::lexer(source);
    while let Some(res) = lexer.next() {
        let span = lexer.span();
        let loc = index.location(span.start);
        let raw = match res {
            Ok(raw) => raw,
            Err(()) => return Err(classify_error(source, span.start, loc)),
        };
        if raw == RawTok::Newline {
            pending_newline = true;
            continue;
        }
        if pending_newline {
            pending_newline = false;
            let indent = loc.column - 1;
            let current = *levels.last().unwrap_or(&0);
            if indent > current {
                out.push(Lexed { tok: Tok::Indent, loc });
                levels.push(indent);
            } else if indent < current {
                while levels.last().map(|&l| l > indent).unwrap_or(false) {
                    out.push(Lexed { tok: Tok::Dedent, loc });
                    levels.pop();
                }
                if *levels.last().unwrap_or(&0) != indent {
                    return Err(LexError::BadIndentation(loc));
                }
            } else {
                out.push(Lexed { tok: Tok::Newline, loc });
            }
        }
        out.push(Lexed { tok: plain(raw), loc });
    }

    let end = index.location(source.len());
    if *levels.last().unwrap_or(&0) > 0 {
        while levels.last().map(|&l| l > 0).unwrap_or(false) {
            out.push(Lexed { tok: Tok::Dedent, loc: end });
            levels.pop();
        }
    } else {
        out.push(Lexed { tok: Tok::Newline, loc: end });
    }
    out.push(Lexed { tok: Tok::End, loc: end });
    Ok(out)
}
