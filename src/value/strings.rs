//! Lazy decoding of escaped JSON string bodies.

use std::str::Chars;

/// Iterates the characters a JSON string body stands for, resolving escape
/// sequences on the fly. Malformed `\u` escapes and unpaired surrogates decode
/// to U+FFFD.
#[derive(Debug, Clone)]
pub struct JsonChars<'a> {
    inner: Chars<'a>,
}

impl<'a> JsonChars<'a> {
    pub fn new(body: &'a str) -> Self {
        JsonChars {
            inner: body.chars(),
        }
    }

    fn hex4(&mut self) -> Option<u16> {
        let mut code = 0u16;
        for _ in 0..4 {
            let digit = self.inner.next()?.to_digit(16)?;
            code = (code << 4) | digit as u16;
        }
        Some(code)
    }

    fn unicode_escape(&mut self) -> char {
        let Some(high) = self.hex4() else {
            return char::REPLACEMENT_CHARACTER;
        };
        if !(0xD800..0xDC00).contains(&high) {
            return char::from_u32(high as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
        }

        // High surrogate: only consume the following escape if it completes the pair.
        let mut ahead = self.clone();
        if ahead.inner.next() == Some('\\') && ahead.inner.next() == Some('u') {
            if let Some(low) = ahead.hex4() {
                if (0xDC00..0xE000).contains(&low) {
                    *self = ahead;
                    let code = 0x10000 + (((high as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
                    return char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                }
            }
        }
        char::REPLACEMENT_CHARACTER
    }
}

impl Iterator for JsonChars<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let c = self.inner.next()?;
        if c != '\\' {
            return Some(c);
        }
        let decoded = match self.inner.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'u' => self.unicode_escape(),
            other => other,
        };
        Some(decoded)
    }
}

/// Decodes an escaped JSON string body into `out`, appending.
pub fn unescape_into(body: &str, out: &mut String) {
    out.extend(JsonChars::new(body));
}

/// The UTF-8 bytes a string-like value stands for. Comparing two of these
/// streams compares the decoded text without materializing it.
pub(crate) enum DecodedBytes<'a> {
    Raw(std::slice::Iter<'a, u8>),
    Escaped {
        chars: JsonChars<'a>,
        buf: [u8; 4],
        len: usize,
        idx: usize,
    },
}

impl<'a> DecodedBytes<'a> {
    pub(crate) fn raw(bytes: &'a [u8]) -> Self {
        DecodedBytes::Raw(bytes.iter())
    }

    pub(crate) fn escaped(body: &'a str) -> Self {
        DecodedBytes::Escaped {
            chars: JsonChars::new(body),
            buf: [0; 4],
            len: 0,
            idx: 0,
        }
    }
}

impl Iterator for DecodedBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self {
            DecodedBytes::Raw(iter) => iter.next().copied(),
            DecodedBytes::Escaped {
                chars,
                buf,
                len,
                idx,
            } => {
                if *idx == *len {
                    let c = chars.next()?;
                    *len = c.encode_utf8(buf).len();
                    *idx = 0;
                }
                let b = buf[*idx];
                *idx += 1;
                Some(b)
            }
        }
    }
}
