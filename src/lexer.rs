//! Byte-level JSON tokenizer.
//!
//! The tokenizer walks a borrowed buffer one byte at a time through an explicit
//! state machine and hands out [`Token`]s that point back into that buffer. It
//! never copies or decodes anything: a string token is the raw quoted bytes, a
//! number token is the raw digits. Callers that need to revisit an earlier part
//! of the document remember a [`Tokenizer::position`] and [`Tokenizer::seek`]
//! back to it later.
//!
//! ```
//! use clove_match::lexer::{TokenKind, Tokenizer};
//!
//! let mut tokens = Tokenizer::new(br#"{"a":[1,2.5]}"#);
//! let kinds: Vec<TokenKind> = std::iter::from_fn(|| {
//!     let token = tokens.step().unwrap();
//!     (token.kind != TokenKind::End).then_some(token.kind)
//! })
//! .collect();
//!
//! assert_eq!(kinds[0], TokenKind::ObjectStart);
//! assert_eq!(kinds[4], TokenKind::Integer);
//! assert_eq!(kinds[6], TokenKind::Number);
//! ```

use thiserror::Error;

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `{`
    ObjectStart,
    /// `}`
    ObjectEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `:` between a key and its value
    KeyDelim,
    /// `,` between members or elements
    ListDelim,
    /// A string that contains no escape sequences. Its inner bytes can be used as-is.
    String,
    /// A string that contains at least one escape sequence.
    EscString,
    /// A number with neither a fraction nor an exponent.
    Integer,
    /// A number with a fraction and/or an exponent.
    Number,
    /// `null`
    Null,
    /// `true`
    True,
    /// `false`
    False,
    /// End of the buffer.
    End,
}

impl TokenKind {
    /// True for tokens that make up a complete scalar value.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            TokenKind::String
                | TokenKind::EscString
                | TokenKind::Integer
                | TokenKind::Number
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
        )
    }
}

/// A token borrowed from the tokenizer's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Offset of the first byte of the token.
    pub offset: usize,
    /// The raw bytes of the token. Strings include their quotes.
    pub bytes: &'a [u8],
}

impl<'a> Token<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset one past the last byte of the token.
    pub fn end(&self) -> usize {
        self.offset + self.bytes.len()
    }

    /// The bytes between the quotes of a string token.
    pub fn string_body(&self) -> &'a [u8] {
        match self.kind {
            TokenKind::String | TokenKind::EscString => &self.bytes[1..self.bytes.len() - 1],
            _ => self.bytes,
        }
    }
}

/// Lexical errors. All of them are recoverable: the tokenizer reports them and
/// the caller decides what to do with the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { offset: usize, found: char },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    BadEscape { offset: usize },

    #[error("control character in string at offset {offset}")]
    ControlChar { offset: usize },

    #[error("malformed number at offset {offset}")]
    MalformedNumber { offset: usize },

    #[error("malformed literal at offset {offset}")]
    MalformedLiteral { offset: usize },

    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Start,
    InString,
    Escape,
    Unicode(u8),
    Minus,
    Zero,
    IntDigits,
    Dot,
    FracDigits,
    ExpMark,
    ExpSign,
    ExpDigits,
    Word(&'static [u8], usize, TokenKind),
}

/// A resumable cursor over a JSON buffer.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    data: &'a [u8],
    position: usize,
    steps: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Tokenizer {
            data,
            position: 0,
            steps: 0,
        }
    }

    /// Points the tokenizer at a new buffer and rewinds it.
    pub fn reset(&mut self, data: &'a [u8]) {
        self.data = data;
        self.position = 0;
        self.steps = 0;
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor. The next [`step`](Self::step) lexes from `offset`.
    pub fn seek(&mut self, offset: usize) {
        self.position = offset.min(self.data.len());
    }

    /// Number of tokens produced since the last reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Lexes the next token.
    pub fn step(&mut self) -> Result<Token<'a>, LexError> {
        self.steps += 1;

        let data = self.data;
        let mut state = LexState::Start;
        let mut start = self.position;
        let mut escaped = false;
        let mut pos = self.position;

        while pos < data.len() {
            let c = data[pos];
            match state {
                LexState::Start => {
                    start = pos;
                    let single = match c {
                        b' ' | b'\t' | b'\n' | b'\r' => {
                            pos += 1;
                            continue;
                        }
                        b'{' => Some(TokenKind::ObjectStart),
                        b'}' => Some(TokenKind::ObjectEnd),
                        b'[' => Some(TokenKind::ArrayStart),
                        b']' => Some(TokenKind::ArrayEnd),
                        b':' => Some(TokenKind::KeyDelim),
                        b',' => Some(TokenKind::ListDelim),
                        _ => None,
                    };
                    if let Some(kind) = single {
                        return Ok(self.emit(kind, start, pos + 1));
                    }
                    state = match c {
                        b'"' => LexState::InString,
                        b'-' => LexState::Minus,
                        b'0' => LexState::Zero,
                        b'1'..=b'9' => LexState::IntDigits,
                        b't' => LexState::Word(b"true", 1, TokenKind::True),
                        b'f' => LexState::Word(b"false", 1, TokenKind::False),
                        b'n' => LexState::Word(b"null", 1, TokenKind::Null),
                        _ => return Err(self.unexpected(pos)),
                    };
                }
                LexState::InString => match c {
                    b'"' => {
                        let kind = if escaped {
                            TokenKind::EscString
                        } else {
                            TokenKind::String
                        };
                        return Ok(self.emit(kind, start, pos + 1));
                    }
                    b'\\' => {
                        escaped = true;
                        state = LexState::Escape;
                    }
                    0x00..=0x1f => return Err(LexError::ControlChar { offset: pos }),
                    _ => {}
                },
                LexState::Escape => {
                    state = match c {
                        b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => {
                            LexState::InString
                        }
                        b'u' => LexState::Unicode(4),
                        _ => return Err(LexError::BadEscape { offset: pos }),
                    };
                }
                LexState::Unicode(remaining) => {
                    if !c.is_ascii_hexdigit() {
                        return Err(LexError::BadEscape { offset: pos });
                    }
                    state = if remaining == 1 {
                        LexState::InString
                    } else {
                        LexState::Unicode(remaining - 1)
                    };
                }
                LexState::Minus => {
                    state = match c {
                        b'0' => LexState::Zero,
                        b'1'..=b'9' => LexState::IntDigits,
                        _ => return Err(LexError::MalformedNumber { offset: pos }),
                    };
                }
                LexState::Zero => match c {
                    b'.' => state = LexState::Dot,
                    b'e' | b'E' => state = LexState::ExpMark,
                    b'0'..=b'9' => return Err(LexError::MalformedNumber { offset: pos }),
                    _ => return Ok(self.emit(TokenKind::Integer, start, pos)),
                },
                LexState::IntDigits => match c {
                    b'0'..=b'9' => {}
                    b'.' => state = LexState::Dot,
                    b'e' | b'E' => state = LexState::ExpMark,
                    _ => return Ok(self.emit(TokenKind::Integer, start, pos)),
                },
                LexState::Dot => match c {
                    b'0'..=b'9' => state = LexState::FracDigits,
                    _ => return Err(LexError::MalformedNumber { offset: pos }),
                },
                LexState::FracDigits => match c {
                    b'0'..=b'9' => {}
                    b'e' | b'E' => state = LexState::ExpMark,
                    _ => return Ok(self.emit(TokenKind::Number, start, pos)),
                },
                LexState::ExpMark => match c {
                    b'+' | b'-' => state = LexState::ExpSign,
                    b'0'..=b'9' => state = LexState::ExpDigits,
                    _ => return Err(LexError::MalformedNumber { offset: pos }),
                },
                LexState::ExpSign => match c {
                    b'0'..=b'9' => state = LexState::ExpDigits,
                    _ => return Err(LexError::MalformedNumber { offset: pos }),
                },
                LexState::ExpDigits => match c {
                    b'0'..=b'9' => {}
                    _ => return Ok(self.emit(TokenKind::Number, start, pos)),
                },
                LexState::Word(word, idx, kind) => {
                    if c != word[idx] {
                        return Err(LexError::MalformedLiteral { offset: start });
                    }
                    if idx + 1 == word.len() {
                        return Ok(self.emit(kind, start, pos + 1));
                    }
                    state = LexState::Word(word, idx + 1, kind);
                }
            }
            pos += 1;
        }

        // A number may run into the end of the buffer; nothing else may.
        match state {
            LexState::Start => Ok(self.emit(TokenKind::End, data.len(), data.len())),
            LexState::Zero | LexState::IntDigits => Ok(self.emit(TokenKind::Integer, start, pos)),
            LexState::FracDigits | LexState::ExpDigits => {
                Ok(self.emit(TokenKind::Number, start, pos))
            }
            LexState::InString | LexState::Escape | LexState::Unicode(_) => {
                Err(LexError::UnterminatedString { offset: start })
            }
            LexState::Minus | LexState::Dot | LexState::ExpMark | LexState::ExpSign => {
                Err(LexError::UnexpectedEnd { offset: pos })
            }
            LexState::Word(..) => Err(LexError::UnexpectedEnd { offset: pos }),
        }
    }

    /// Skips the remainder of the innermost open object or array without
    /// lexing its contents. The cursor must be inside the container (just past
    /// its opening bracket, or between two of its members). Returns the offset
    /// one past the closing bracket.
    pub fn skip_container(&mut self) -> Result<usize, LexError> {
        let data = self.data;
        let mut depth = 1usize;
        let mut pos = self.position;

        while pos < data.len() {
            match data[pos] {
                b'"' => {
                    let open = pos;
                    pos += 1;
                    loop {
                        match data.get(pos) {
                            Some(b'"') => break,
                            Some(b'\\') => pos += 2,
                            Some(_) => pos += 1,
                            None => return Err(LexError::UnterminatedString { offset: open }),
                        }
                    }
                }
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.position = pos + 1;
                        return Ok(self.position);
                    }
                }
                _ => {}
            }
            pos += 1;
        }

        Err(LexError::UnexpectedEnd { offset: data.len() })
    }

    /// Skips one complete value whose first token is `token`, returning the
    /// offset one past its end.
    pub fn skip_value(&mut self, token: &Token<'a>) -> Result<usize, LexError> {
        match token.kind {
            TokenKind::ObjectStart | TokenKind::ArrayStart => self.skip_container(),
            _ => Ok(token.end()),
        }
    }

    fn emit(&mut self, kind: TokenKind, start: usize, end: usize) -> Token<'a> {
        self.position = end;
        Token {
            kind,
            offset: start,
            bytes: &self.data[start..end],
        }
    }

    fn unexpected(&self, offset: usize) -> LexError {
        let end = self.data.len().min(offset + 4);
        let found = match std::str::from_utf8(&self.data[offset..end]) {
            Ok(s) => s.chars().next(),
            Err(e) => std::str::from_utf8(&self.data[offset..offset + e.valid_up_to()])
                .ok()
                .and_then(|s| s.chars().next()),
        }
        .unwrap_or(self.data[offset] as char);
        LexError::UnexpectedChar { offset, found }
    }
}

#[test]
fn test_literals_at_end() {
    let mut tokens = Tokenizer::new(b"true");
    assert_eq!(tokens.step().unwrap().kind, TokenKind::True);
    assert_eq!(tokens.step().unwrap().kind, TokenKind::End);
}

#[test]
fn test_truncated_literal() {
    let mut tokens = Tokenizer::new(b"nul");
    assert_eq!(
        tokens.step(),
        Err(LexError::UnexpectedEnd { offset: 3 })
    );
}
