use super::SyntaxError;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Imag,
    Char,
    String,
    Punct,
    Semicolon,
    Eof,
}

/// A single token with its source line (1-based).
///
/// For string literals `text` holds the decoded value; for every other kind it
/// holds the token exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_keyword(&self, k: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == k
    }
}

/// A raw comment as found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    /// Comment text including its `//` or `/* */` markers.
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Whether a token precedes the comment on its first line.
    pub trailing: bool,
    /// Number of tokens emitted before this comment.
    pub token_index: usize,
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

// Longest operators first so that matching is greedy.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    comments: Vec<RawComment>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Tokenizes the whole input, applying Go's automatic semicolon insertion.
    pub fn tokenize(mut self) -> Result<(Vec<Token>, Vec<RawComment>), SyntaxError> {
        loop {
            self.skip_blanks();
            if self.pos >= self.src.len() {
                self.auto_semicolon();
                self.tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    line: self.line,
                });
                break;
            }

            let c = self.src[self.pos];
            match c {
                b'\n' => {
                    self.auto_semicolon();
                    self.pos += 1;
                    self.line += 1;
                }
                b'/' if self.peek(1) == Some(b'/') => self.line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment()?,
                b'"' => self.interpreted_string()?,
                b'`' => self.raw_string()?,
                b'\'' => self.char_literal()?,
                b'0'..=b'9' => self.number(),
                b'.' if matches!(self.peek(1), Some(b'0'..=b'9')) => self.number(),
                _ if c == b'_' || c.is_ascii_alphabetic() || c >= 0x80 => self.identifier(),
                _ => self.operator()?,
            }
        }
        Ok((self.tokens, self.comments))
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.src.get(self.pos) {
            if *c == b' ' || *c == b'\t' || *c == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn push(&mut self, kind: TokenKind, text: String) {
        self.tokens.push(Token {
            kind,
            text,
            line: self.line,
        });
    }

    fn auto_semicolon(&mut self) {
        let Some(last) = self.tokens.last() else {
            return;
        };
        let insert = match last.kind {
            TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Char
            | TokenKind::String => true,
            TokenKind::Keyword => matches!(
                last.text.as_str(),
                "break" | "continue" | "fallthrough" | "return"
            ),
            TokenKind::Punct => matches!(last.text.as_str(), "++" | "--" | ")" | "]" | "}"),
            TokenKind::Semicolon | TokenKind::Eof => false,
        };
        if insert {
            let line = last.line;
            self.tokens.push(Token {
                kind: TokenKind::Semicolon,
                text: "\n".to_string(),
                line,
            });
        }
    }

    fn is_trailing(&self) -> bool {
        self.tokens
            .last()
            .map(|t| t.line == self.line && t.kind != TokenKind::Semicolon)
            .unwrap_or(false)
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.comments.push(RawComment {
            text: text.trim_end_matches('\r').to_string(),
            start_line: self.line,
            end_line: self.line,
            trailing: self.is_trailing(),
            token_index: self.tokens.len(),
        });
    }

    fn block_comment(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        let start_line = self.line;
        let trailing = self.is_trailing();
        self.pos += 2;
        let mut newline = false;
        loop {
            match self.src.get(self.pos) {
                None => {
                    return Err(SyntaxError::new(start_line, "comment not terminated"));
                }
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.pos += 2;
                    break;
                }
                Some(b'\n') => {
                    newline = true;
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.comments.push(RawComment {
            text,
            start_line,
            end_line: self.line,
            trailing,
            token_index: self.tokens.len(),
        });
        if newline {
            // A multi-line block comment acts like a newline.
            self.auto_semicolon();
        }
        Ok(())
    }

    fn identifier(&mut self) {
        let start = self.pos;
        while let Some(&c) = self.src.get(self.pos) {
            if c == b'_' || c.is_ascii_alphanumeric() || c >= 0x80 {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        self.push(kind, text);
    }

    fn number(&mut self) {
        let start = self.pos;
        let mut kind = TokenKind::Int;
        let radix_prefixed = self.src[self.pos] == b'0'
            && matches!(
                self.peek(1),
                Some(b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
            );
        if radix_prefixed {
            let hex = matches!(self.peek(1), Some(b'x' | b'X'));
            self.pos += 2;
            while let Some(&c) = self.src.get(self.pos) {
                if c == b'_' || c.is_ascii_hexdigit() {
                    self.pos += 1;
                } else if hex && (c == b'.' || c == b'p' || c == b'P') {
                    kind = TokenKind::Float;
                    self.pos += 1;
                    if matches!(self.src.get(self.pos), Some(b'+' | b'-')) {
                        self.pos += 1;
                    }
                } else {
                    break;
                }
            }
        } else {
            while let Some(&c) = self.src.get(self.pos) {
                match c {
                    b'0'..=b'9' | b'_' => self.pos += 1,
                    b'.' if kind == TokenKind::Int => {
                        kind = TokenKind::Float;
                        self.pos += 1;
                    }
                    b'e' | b'E' => {
                        kind = TokenKind::Float;
                        self.pos += 1;
                        if matches!(self.src.get(self.pos), Some(b'+' | b'-')) {
                            self.pos += 1;
                        }
                    }
                    _ => break,
                }
            }
        }
        if self.src.get(self.pos) == Some(&b'i') {
            kind = TokenKind::Imag;
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.push(kind, text);
    }

    fn interpreted_string(&mut self) -> Result<(), SyntaxError> {
        let start_line = self.line;
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.src.get(self.pos) {
                None | Some(b'\n') => {
                    return Err(SyntaxError::new(start_line, "string literal not terminated"));
                }
                Some(b'\\') => self.pos += 2,
                Some(b'"') => break,
                Some(_) => self.pos += 1,
            }
        }
        let raw = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.pos += 1;
        let value = unescape(&raw).map_err(|m| SyntaxError::new(start_line, m))?;
        self.push(TokenKind::String, value);
        Ok(())
    }

    fn raw_string(&mut self) -> Result<(), SyntaxError> {
        let start_line = self.line;
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.src.get(self.pos) {
                None => return Err(SyntaxError::new(start_line, "raw string literal not terminated")),
                Some(b'`') => break,
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        let value = String::from_utf8_lossy(&self.src[start..self.pos]).replace('\r', "");
        self.pos += 1;
        let end_line = self.line;
        self.line = start_line;
        self.push(TokenKind::String, value);
        self.line = end_line;
        Ok(())
    }

    fn char_literal(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.src.get(self.pos) {
                None | Some(b'\n') => {
                    return Err(SyntaxError::new(self.line, "rune literal not terminated"));
                }
                Some(b'\\') => self.pos += 2,
                Some(b'\'') => break,
                Some(_) => self.pos += 1,
            }
        }
        self.pos += 1;
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.push(TokenKind::Char, text);
        Ok(())
    }

    fn operator(&mut self) -> Result<(), SyntaxError> {
        let rest = &self.src[self.pos..];
        for op in OPERATORS {
            if rest.starts_with(op.as_bytes()) {
                self.pos += op.len();
                if *op == ";" {
                    self.push(TokenKind::Semicolon, ";".to_string());
                } else {
                    self.push(TokenKind::Punct, op.to_string());
                }
                return Ok(());
            }
        }
        Err(SyntaxError::new(
            self.line,
            format!("unexpected character {:?}", self.src[self.pos] as char),
        ))
    }
}

/// Decodes the escape sequences of an interpreted string or rune literal body.
pub fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err("escape sequence not terminated".to_string());
        };
        match esc {
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' | 'u' | 'U' => {
                let len = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.by_ref().take(len).collect();
                let code = u32::from_str_radix(&digits, 16)
                    .map_err(|_| format!("invalid escape \\{}{}", esc, digits))?;
                let ch = char::from_u32(code).ok_or_else(|| format!("invalid code point {code}"))?;
                out.push(ch);
            }
            '0'..='7' => {
                let mut digits = esc.to_string();
                for _ in 0..2 {
                    if let Some(d) = chars.next() {
                        digits.push(d);
                    }
                }
                let code = u32::from_str_radix(&digits, 8)
                    .map_err(|_| format!("invalid octal escape \\{}", digits))?;
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => return Err(format!("unknown escape sequence \\{}", other)),
        }
    }
    Ok(out)
}
