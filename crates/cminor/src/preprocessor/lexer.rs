//! Token emission over already-preprocessed text (directives stripped,
//! comments elided, macros expanded). Grounded on the teacher's
//! `parser::Token`/`Punctuator` (`#[repr(u8)]` over ASCII byte values for
//! single-character punctuators) plus spec.md S4.1 "Token emission" and
//! "Integer-literal promotion at the lexer" for everything punctuator
//! values alone don't cover.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::PreprocessorError;
use cminor_ast::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Null,
    Bool,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    False,
    Float,
    For,
    Goto,
    If,
    Int,
    Long,
    Return,
    Short,
    Sizeof,
    Static,
    Struct,
    Switch,
    True,
    Typedef,
    Union,
    Unsigned,
    Void,
    While,
}

/// Keyword table (spec.md S6 "Keyword set"). Identifier text is checked
/// against this table only after macro expansion has been attempted
/// (spec.md S4.1 "Token emission").
static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    use Keyword::*;
    let mut m = HashMap::new();
    m.insert("NULL", Null);
    m.insert("bool", Bool);
    m.insert("break", Break);
    m.insert("case", Case);
    m.insert("char", Char);
    m.insert("const", Const);
    m.insert("continue", Continue);
    m.insert("default", Default);
    m.insert("do", Do);
    m.insert("double", Double);
    m.insert("else", Else);
    m.insert("enum", Enum);
    m.insert("extern", Extern);
    m.insert("false", False);
    m.insert("float", Float);
    m.insert("for", For);
    m.insert("goto", Goto);
    m.insert("if", If);
    m.insert("int", Int);
    m.insert("long", Long);
    m.insert("return", Return);
    m.insert("short", Short);
    m.insert("sizeof", Sizeof);
    m.insert("static", Static);
    m.insert("struct", Struct);
    m.insert("switch", Switch);
    m.insert("true", True);
    m.insert("typedef", Typedef);
    m.insert("union", Union);
    m.insert("unsigned", Unsigned);
    m.insert("void", Void);
    m.insert("while", While);
    m
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Question,
    Dot,
    Arrow,
    Ellipsis,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Assign,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    PlusPlus,
    MinusMinus,
    Shl,
    Shr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(String),
    IntLiteral(i32),
    UIntLiteral(u32),
    LongLiteral(i64),
    ULongLiteral(u64),
    FloatLiteral(f32),
    DoubleLiteral(f64),
    /// A character literal, already folded to its integer value (spec.md
    /// S4.1: "yielding an integer literal").
    CharLiteral(i32),
    StringLiteral(Vec<u8>),
    Punct(Punct),
    /// `[[ ... ]]`, interior text verbatim; attribute-kind parsing happens
    /// in `cminor_ast::decl::AttributeSpecifier` construction (SPEC_FULL.md
    /// supplemented-behavior #6).
    Attribute(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

struct Cursor<'a> {
    chars: Vec<char>,
    byte_offsets: Vec<usize>,
    pos: usize,
    text: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        let mut chars = Vec::new();
        let mut byte_offsets = Vec::new();
        for (i, c) in text.char_indices() {
            chars.push(c);
            byte_offsets.push(i);
        }
        byte_offsets.push(text.len());
        Cursor {
            chars,
            byte_offsets,
            pos: 0,
            text,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn byte_offset(&self) -> usize {
        self.byte_offsets[self.pos]
    }
}

fn locate(offsets: &[(usize, Location)], byte_offset: usize) -> Location {
    match offsets.binary_search_by(|(off, _)| off.cmp(&byte_offset)) {
        Ok(idx) => offsets[idx].1.clone(),
        Err(0) => offsets.first().map(|(_, l)| l.clone()).unwrap_or_default(),
        Err(idx) => offsets[idx - 1].1.clone(),
    }
}

/// Parses a decimal or `0x`-hex integer literal starting at the cursor,
/// applying spec.md S4.1 "Integer-literal promotion at the lexer".
fn lex_number(cur: &mut Cursor, loc: &Location) -> Result<TokenKind, PreprocessorError> {
    let start = cur.pos;
    let is_hex = cur.peek() == Some('0') && matches!(cur.peek_at(1), Some('x') | Some('X'));
    if is_hex {
        cur.bump();
        cur.bump();
        while matches!(cur.peek(), Some(c) if c.is_ascii_hexdigit()) {
            cur.bump();
        }
    } else {
        while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
            cur.bump();
        }
        if cur.peek() == Some('.') {
            cur.bump();
            while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
                cur.bump();
            }
            let digits: String = cur.chars[start..cur.pos].iter().collect();
            let suffix_start = cur.pos;
            while matches!(cur.peek(), Some(c) if c.is_ascii_alphabetic()) {
                cur.bump();
            }
            let suffix: String = cur.chars[suffix_start..cur.pos]
                .iter()
                .collect::<String>()
                .to_lowercase();
            return match suffix.as_str() {
                "" | "d" => Ok(TokenKind::DoubleLiteral(digits.parse().unwrap_or(0.0))),
                "f" => Ok(TokenKind::FloatLiteral(digits.parse().unwrap_or(0.0))),
                _ => Err(PreprocessorError::MalformedSuffix {
                    path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                    line: loc.line,
                    suffix,
                }),
            };
        }
    }
    let digits: String = cur.chars[start..cur.pos].iter().collect();
    let suffix_start = cur.pos;
    while matches!(cur.peek(), Some(c) if c.is_ascii_alphabetic()) {
        cur.bump();
    }
    let suffix: String = cur.chars[suffix_start..cur.pos]
        .iter()
        .collect::<String>()
        .to_lowercase();

    let digit_text = if is_hex { &digits[2..] } else { digits.as_str() };
    let radix = if is_hex { 16 } else { 10 };
    let value: u64 = u64::from_str_radix(digit_text, radix).unwrap_or(0);

    let (is_unsigned, is_long) = match suffix.as_str() {
        "" => (false, false),
        "u" => (true, false),
        "l" => (false, true),
        "ul" | "lu" => (true, true),
        _ => {
            return Err(PreprocessorError::MalformedSuffix {
                path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                line: loc.line,
                suffix,
            })
        }
    };

    Ok(if is_unsigned {
        if is_long || value > u32::MAX as u64 {
            TokenKind::ULongLiteral(value)
        } else {
            TokenKind::UIntLiteral(value as u32)
        }
    } else if is_long || value > i32::MAX as u64 {
        TokenKind::LongLiteral(value as i64)
    } else {
        TokenKind::IntLiteral(value as i32)
    })
}

fn decode_escape(cur: &mut Cursor) -> Option<u8> {
    match cur.bump()? {
        'n' => Some(b'\n'),
        't' => Some(b'\t'),
        'r' => Some(b'\r'),
        '0' => Some(0),
        '\\' => Some(b'\\'),
        '"' => Some(b'"'),
        '\'' => Some(b'\''),
        'x' => {
            let mut hex = String::new();
            while matches!(cur.peek(), Some(c) if c.is_ascii_hexdigit()) && hex.len() < 2 {
                hex.push(cur.bump().unwrap());
            }
            u8::from_str_radix(&hex, 16).ok()
        }
        other => Some(other as u8),
    }
}

fn lex_string(cur: &mut Cursor, loc: &Location) -> Result<Vec<u8>, PreprocessorError> {
    let mut bytes = Vec::new();
    loop {
        match cur.peek() {
            None => {
                return Err(PreprocessorError::UnterminatedLiteral {
                    path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                    line: loc.line,
                })
            }
            Some('"') => {
                cur.bump();
                return Ok(bytes);
            }
            Some('\\') => {
                cur.bump();
                match decode_escape(cur) {
                    Some(b) => bytes.push(b),
                    None => {
                        return Err(PreprocessorError::UnterminatedLiteral {
                            path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                            line: loc.line,
                        })
                    }
                }
            }
            Some(c) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                cur.bump();
            }
        }
    }
}

fn lex_char(cur: &mut Cursor, loc: &Location) -> Result<i32, PreprocessorError> {
    let value = match cur.peek() {
        None => {
            return Err(PreprocessorError::UnterminatedLiteral {
                path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                line: loc.line,
            })
        }
        Some('\\') => {
            cur.bump();
            decode_escape(cur).ok_or_else(|| PreprocessorError::UnterminatedLiteral {
                path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                line: loc.line,
            })? as i32
        }
        Some(c) => {
            cur.bump();
            c as i32
        }
    };
    if cur.peek() != Some('\'') {
        return Err(PreprocessorError::UnterminatedLiteral {
            path: loc.path.as_deref().unwrap_or("<input>").to_string(),
            line: loc.line,
        });
    }
    cur.bump();
    Ok(value)
}

/// Tokenizes a fully-preprocessed unit. `offsets` maps byte offsets in
/// `text` back to source locations, built while assembling the chunks
/// (see `preprocessor::mod`).
pub fn tokenize(text: &str, offsets: &[(usize, Location)]) -> Result<Vec<Token>, PreprocessorError> {
    let mut cur = Cursor::new(text);
    let mut tokens = Vec::new();

    loop {
        while matches!(cur.peek(), Some(c) if c.is_whitespace()) {
            cur.bump();
        }
        let byte_offset = cur.byte_offset();
        let loc = locate(offsets, byte_offset);
        let c = match cur.peek() {
            None => {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    location: loc,
                });
                break;
            }
            Some(c) => c,
        };

        let kind = if c.is_ascii_digit() {
            lex_number(&mut cur, &loc)?
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = cur.pos;
            while matches!(cur.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                cur.bump();
            }
            let text: String = cur.chars[start..cur.pos].iter().collect();
            match KEYWORDS.get(text.as_str()) {
                Some(kw) => TokenKind::Keyword(*kw),
                None => TokenKind::Identifier(text),
            }
        } else if c == '"' {
            cur.bump();
            TokenKind::StringLiteral(lex_string(&mut cur, &loc)?)
        } else if c == '\'' {
            cur.bump();
            TokenKind::CharLiteral(lex_char(&mut cur, &loc)?)
        } else if c == '[' && cur.peek_at(1) == Some('[') {
            cur.bump();
            cur.bump();
            let start = cur.pos;
            let mut depth = 1;
            loop {
                match cur.peek() {
                    None => {
                        return Err(PreprocessorError::UnterminatedLiteral {
                            path: loc.path.as_deref().unwrap_or("<input>").to_string(),
                            line: loc.line,
                        })
                    }
                    Some('[') if cur.peek_at(1) == Some('[') => {
                        depth += 1;
                        cur.bump();
                        cur.bump();
                    }
                    Some(']') if cur.peek_at(1) == Some(']') => {
                        depth -= 1;
                        if depth == 0 {
                            let inner: String = cur.chars[start..cur.pos].iter().collect();
                            cur.bump();
                            cur.bump();
                            tokens.push(Token {
                                kind: TokenKind::Attribute(inner.trim().to_string()),
                                location: loc,
                            });
                            continue;
                        }
                        cur.bump();
                        cur.bump();
                    }
                    Some(_) => {
                        cur.bump();
                    }
                }
            }
        } else {
            lex_punct(&mut cur)
        };

        tokens.push(Token { kind, location: loc });
    }

    Ok(tokens)
}

fn lex_punct(cur: &mut Cursor) -> TokenKind {
    macro_rules! two {
        ($second:expr, $two:expr, $one:expr) => {{
            if cur.peek_at(1) == Some($second) {
                cur.bump();
                cur.bump();
                $two
            } else {
                cur.bump();
                $one
            }
        }};
    }
    use Punct::*;
    match cur.peek().unwrap() {
        '(' => {
            cur.bump();
            TokenKind::Punct(LParen)
        }
        ')' => {
            cur.bump();
            TokenKind::Punct(RParen)
        }
        '{' => {
            cur.bump();
            TokenKind::Punct(LBrace)
        }
        '}' => {
            cur.bump();
            TokenKind::Punct(RBrace)
        }
        '[' => {
            cur.bump();
            TokenKind::Punct(LBracket)
        }
        ']' => {
            cur.bump();
            TokenKind::Punct(RBracket)
        }
        ';' => {
            cur.bump();
            TokenKind::Punct(Semicolon)
        }
        ',' => {
            cur.bump();
            TokenKind::Punct(Comma)
        }
        ':' => {
            cur.bump();
            TokenKind::Punct(Colon)
        }
        '?' => {
            cur.bump();
            TokenKind::Punct(Question)
        }
        '~' => {
            cur.bump();
            TokenKind::Punct(Tilde)
        }
        '.' => {
            if cur.peek_at(1) == Some('.') && cur.peek_at(2) == Some('.') {
                cur.bump();
                cur.bump();
                cur.bump();
                TokenKind::Punct(Ellipsis)
            } else {
                cur.bump();
                TokenKind::Punct(Dot)
            }
        }
        '-' => {
            if cur.peek_at(1) == Some('>') {
                cur.bump();
                cur.bump();
                TokenKind::Punct(Arrow)
            } else if cur.peek_at(1) == Some('-') {
                cur.bump();
                cur.bump();
                TokenKind::Punct(MinusMinus)
            } else {
                TokenKind::Punct(two!('=', MinusEq, Minus))
            }
        }
        '+' => {
            if cur.peek_at(1) == Some('+') {
                cur.bump();
                cur.bump();
                TokenKind::Punct(PlusPlus)
            } else {
                TokenKind::Punct(two!('=', PlusEq, Plus))
            }
        }
        '*' => TokenKind::Punct(two!('=', StarEq, Star)),
        '/' => TokenKind::Punct(two!('=', SlashEq, Slash)),
        '%' => TokenKind::Punct(two!('=', PercentEq, Percent)),
        '^' => TokenKind::Punct(two!('=', CaretEq, Caret)),
        '!' => TokenKind::Punct(two!('=', Ne, Bang)),
        '=' => TokenKind::Punct(two!('=', EqEq, Assign)),
        '&' => {
            if cur.peek_at(1) == Some('&') {
                cur.bump();
                cur.bump();
                TokenKind::Punct(AndAnd)
            } else {
                TokenKind::Punct(two!('=', AmpEq, Amp))
            }
        }
        '|' => {
            if cur.peek_at(1) == Some('|') {
                cur.bump();
                cur.bump();
                TokenKind::Punct(OrOr)
            } else {
                TokenKind::Punct(two!('=', PipeEq, Pipe))
            }
        }
        '<' => {
            if cur.peek_at(1) == Some('<') {
                cur.bump();
                if cur.peek_at(1) == Some('=') {
                    cur.bump();
                    cur.bump();
                    TokenKind::Punct(ShlEq)
                } else {
                    cur.bump();
                    TokenKind::Punct(Shl)
                }
            } else {
                TokenKind::Punct(two!('=', Le, Lt))
            }
        }
        '>' => {
            if cur.peek_at(1) == Some('>') {
                cur.bump();
                if cur.peek_at(1) == Some('=') {
                    cur.bump();
                    cur.bump();
                    TokenKind::Punct(ShrEq)
                } else {
                    cur.bump();
                    TokenKind::Punct(Shr)
                }
            } else {
                TokenKind::Punct(two!('=', Ge, Gt))
            }
        }
        other => {
            cur.bump();
            TokenKind::Identifier(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new(std::rc::Rc::from("t.c"), 1)
    }

    #[test]
    fn promotes_plain_decimal_to_int() {
        let offsets = vec![(0, loc())];
        let tokens = tokenize("42", &offsets).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral(42));
    }

    #[test]
    fn promotes_large_decimal_to_long() {
        let offsets = vec![(0, loc())];
        let tokens = tokenize("5000000000", &offsets).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LongLiteral(5_000_000_000));
    }

    #[test]
    fn u_suffix_promotes_to_uint_or_ulong() {
        let offsets = vec![(0, loc())];
        let tokens = tokenize("10U", &offsets).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::UIntLiteral(10));
        let tokens = tokenize("5000000000U", &offsets).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::ULongLiteral(5_000_000_000));
    }

    #[test]
    fn lu_and_ul_both_force_ulong() {
        let offsets = vec![(0, loc())];
        assert_eq!(
            tokenize("1LU", &offsets).unwrap()[0].kind,
            TokenKind::ULongLiteral(1)
        );
        assert_eq!(
            tokenize("1UL", &offsets).unwrap()[0].kind,
            TokenKind::ULongLiteral(1)
        );
    }

    #[test]
    fn string_literal_decodes_escapes_and_allows_embedded_nul() {
        let offsets = vec![(0, loc())];
        let tokens = tokenize(r#""a\0b\n""#, &offsets).unwrap();
        assert_eq!(
            tokens[0].kind,
            TokenKind::StringLiteral(vec![b'a', 0, b'b', b'\n'])
        );
    }

    #[test]
    fn attribute_block_is_captured_verbatim() {
        let offsets = vec![(0, loc())];
        let tokens = tokenize("[[deprecated]]", &offsets).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Attribute("deprecated".to_string()));
    }
}
