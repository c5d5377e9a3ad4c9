use std::borrow::Cow;

use crate::lexer::{Token, TokenKind};

mod arith;
mod compare;
mod funcs;
mod strings;

pub use funcs::apply_func;
pub use strings::{JsonChars, unescape_into};

/// The kind of a [`FastVal`].
///
/// Kinds are declared in comparison precedence order: when two values of
/// unrelated kinds are compared, the one whose kind comes first is the
/// smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Invalid,
    Missing,
    Int,
    Uint,
    JsonInt,
    JsonUint,
    Float,
    JsonFloat,
    String,
    BinString,
    JsonString,
    Binary,
    Null,
    True,
    False,
    Array,
    Object,
}

impl ValueKind {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::Int
                | ValueKind::Uint
                | ValueKind::JsonInt
                | ValueKind::JsonUint
                | ValueKind::Float
                | ValueKind::JsonFloat
        )
    }

    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            ValueKind::String | ValueKind::BinString | ValueKind::JsonString
        )
    }
}

/// A JSON value that is cheap to produce straight from the tokenizer.
///
/// Scalars that the matcher computes itself (literals, arithmetic results)
/// are held inline. Everything read from a document borrows the document's
/// bytes: a `JsonInt` is the digits of an integer token, a `JsonString` is
/// the still-escaped text between the quotes, an `Object` is the raw text
/// from `{` to `}`. Nothing is decoded until a comparison needs it.
///
/// # Examples
///
/// ```
/// use clove_match::value::FastVal;
///
/// let doc = FastVal::JsonUint(b"50");
/// assert!(doc.equals(&FastVal::Int(50)));
/// assert!(doc.compare(&FastVal::Float(50.5)).is_lt());
///
/// let escaped = FastVal::JsonString(r"caf\u00e9");
/// assert!(escaped.equals(&FastVal::from("café")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FastVal<'a> {
    /// The result of a failed coercion. Never equal to anything.
    Invalid,
    /// An absent field.
    Missing,
    Int(i64),
    Uint(u64),
    /// Negative integer text from a document.
    JsonInt(&'a [u8]),
    /// Non-negative integer text from a document.
    JsonUint(&'a [u8]),
    Float(f64),
    /// Number text with a fraction or exponent from a document.
    JsonFloat(&'a [u8]),
    /// Unescaped text.
    String(Cow<'a, str>),
    /// Unescaped bytes that are not valid UTF-8.
    BinString(Cow<'a, [u8]>),
    /// The body of a JSON string, escapes intact.
    JsonString(&'a str),
    Binary(Cow<'a, [u8]>),
    Null,
    True,
    False,
    /// Raw JSON text of an array.
    Array(Cow<'a, [u8]>),
    /// Raw JSON text of an object.
    Object(Cow<'a, [u8]>),
}

/// A numeric projection of a [`FastVal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Num {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Uint(n) => n as f64,
            Num::Float(n) => n,
        }
    }

    pub(crate) fn into_val(self) -> FastVal<'static> {
        match self {
            Num::Int(n) => FastVal::Int(n),
            Num::Uint(n) => FastVal::Uint(n),
            Num::Float(n) => FastVal::float(n),
        }
    }
}

impl<'a> FastVal<'a> {
    pub fn kind(&self) -> ValueKind {
        match self {
            FastVal::Invalid => ValueKind::Invalid,
            FastVal::Missing => ValueKind::Missing,
            FastVal::Int(_) => ValueKind::Int,
            FastVal::Uint(_) => ValueKind::Uint,
            FastVal::JsonInt(_) => ValueKind::JsonInt,
            FastVal::JsonUint(_) => ValueKind::JsonUint,
            FastVal::Float(_) => ValueKind::Float,
            FastVal::JsonFloat(_) => ValueKind::JsonFloat,
            FastVal::String(_) => ValueKind::String,
            FastVal::BinString(_) => ValueKind::BinString,
            FastVal::JsonString(_) => ValueKind::JsonString,
            FastVal::Binary(_) => ValueKind::Binary,
            FastVal::Null => ValueKind::Null,
            FastVal::True => ValueKind::True,
            FastVal::False => ValueKind::False,
            FastVal::Array(_) => ValueKind::Array,
            FastVal::Object(_) => ValueKind::Object,
        }
    }

    /// Wraps a float, turning NaN and infinities into `Invalid`.
    pub fn float(n: f64) -> FastVal<'static> {
        if n.is_finite() {
            FastVal::Float(n)
        } else {
            FastVal::Invalid
        }
    }

    pub fn bool(b: bool) -> FastVal<'static> {
        if b { FastVal::True } else { FastVal::False }
    }

    /// Builds a value from a scalar token. Container tokens and delimiters
    /// produce `Invalid`; containers are captured by span instead.
    pub fn from_token(token: &Token<'a>) -> FastVal<'a> {
        match token.kind {
            TokenKind::String => match std::str::from_utf8(token.string_body()) {
                Ok(s) => FastVal::String(Cow::Borrowed(s)),
                Err(_) => FastVal::BinString(Cow::Borrowed(token.string_body())),
            },
            TokenKind::EscString => match std::str::from_utf8(token.string_body()) {
                Ok(s) => FastVal::JsonString(s),
                Err(_) => FastVal::BinString(Cow::Borrowed(token.string_body())),
            },
            TokenKind::Integer if token.bytes.first() == Some(&b'-') => {
                FastVal::JsonInt(token.bytes)
            }
            TokenKind::Integer => FastVal::JsonUint(token.bytes),
            TokenKind::Number => FastVal::JsonFloat(token.bytes),
            TokenKind::Null => FastVal::Null,
            TokenKind::True => FastVal::True,
            TokenKind::False => FastVal::False,
            _ => FastVal::Invalid,
        }
    }

    /// A copy of this value that borrows from `self` instead of owning
    /// anything, so handing it out never allocates.
    pub fn reborrow(&self) -> FastVal<'_> {
        match self {
            FastVal::Invalid => FastVal::Invalid,
            FastVal::Missing => FastVal::Missing,
            FastVal::Int(n) => FastVal::Int(*n),
            FastVal::Uint(n) => FastVal::Uint(*n),
            FastVal::JsonInt(b) => FastVal::JsonInt(b),
            FastVal::JsonUint(b) => FastVal::JsonUint(b),
            FastVal::Float(n) => FastVal::Float(*n),
            FastVal::JsonFloat(b) => FastVal::JsonFloat(b),
            FastVal::String(s) => FastVal::String(Cow::Borrowed(s.as_ref())),
            FastVal::BinString(b) => FastVal::BinString(Cow::Borrowed(b.as_ref())),
            FastVal::JsonString(s) => FastVal::JsonString(s),
            FastVal::Binary(b) => FastVal::Binary(Cow::Borrowed(b.as_ref())),
            FastVal::Null => FastVal::Null,
            FastVal::True => FastVal::True,
            FastVal::False => FastVal::False,
            FastVal::Array(b) => FastVal::Array(Cow::Borrowed(b.as_ref())),
            FastVal::Object(b) => FastVal::Object(Cow::Borrowed(b.as_ref())),
        }
    }

    pub fn into_owned(self) -> FastVal<'static> {
        match self {
            FastVal::Invalid => FastVal::Invalid,
            FastVal::Missing => FastVal::Missing,
            FastVal::Int(n) => FastVal::Int(n),
            FastVal::Uint(n) => FastVal::Uint(n),
            FastVal::JsonInt(_) | FastVal::JsonUint(_) | FastVal::JsonFloat(_) => {
                self.as_num().map_or(FastVal::Invalid, Num::into_val)
            }
            FastVal::Float(n) => FastVal::Float(n),
            FastVal::String(s) => FastVal::String(Cow::Owned(s.into_owned())),
            FastVal::BinString(b) => FastVal::BinString(Cow::Owned(b.into_owned())),
            FastVal::JsonString(s) => {
                let mut out = String::with_capacity(s.len());
                unescape_into(s, &mut out);
                FastVal::String(Cow::Owned(out))
            }
            FastVal::Binary(b) => FastVal::Binary(Cow::Owned(b.into_owned())),
            FastVal::Null => FastVal::Null,
            FastVal::True => FastVal::True,
            FastVal::False => FastVal::False,
            FastVal::Array(b) => FastVal::Array(Cow::Owned(b.into_owned())),
            FastVal::Object(b) => FastVal::Object(Cow::Owned(b.into_owned())),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FastVal::Missing)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, FastVal::Invalid)
    }

    /// Missing or Invalid: values no comparison can succeed against.
    pub fn is_absent(&self) -> bool {
        matches!(self, FastVal::Missing | FastVal::Invalid)
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }

    pub fn is_string_like(&self) -> bool {
        self.kind().is_string_like()
    }

    pub(crate) fn as_num(&self) -> Option<Num> {
        match self {
            FastVal::Int(n) => Some(Num::Int(*n)),
            FastVal::Uint(n) => Some(Num::Uint(*n)),
            FastVal::Float(n) => Some(Num::Float(*n)),
            FastVal::JsonInt(b) => {
                let text = std::str::from_utf8(b).ok()?;
                text.parse::<i64>()
                    .map(Num::Int)
                    .or_else(|_| text.parse::<f64>().map(Num::Float))
                    .ok()
            }
            FastVal::JsonUint(b) => {
                let text = std::str::from_utf8(b).ok()?;
                text.parse::<u64>()
                    .map(Num::Uint)
                    .or_else(|_| text.parse::<f64>().map(Num::Float))
                    .ok()
            }
            FastVal::JsonFloat(b) => std::str::from_utf8(b).ok()?.parse::<f64>().ok().map(Num::Float),
            _ => None,
        }
    }

    /// The floating-point projection of a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_num().map(Num::as_f64)
    }

    /// The value as a signed integer, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.as_num()? {
            Num::Int(n) => Some(n),
            Num::Uint(n) => i64::try_from(n).ok(),
            Num::Float(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FastVal::True => Some(true),
            FastVal::False => Some(false),
            _ => None,
        }
    }

    /// Converts to a `serde_json::Value`. Missing and Invalid become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            FastVal::Invalid | FastVal::Missing | FastVal::Null => Json::Null,
            FastVal::True => Json::Bool(true),
            FastVal::False => Json::Bool(false),
            FastVal::Int(n) => Json::from(*n),
            FastVal::Uint(n) => Json::from(*n),
            FastVal::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            FastVal::JsonInt(b) | FastVal::JsonUint(b) | FastVal::JsonFloat(b) => {
                serde_json::from_slice(b).unwrap_or(Json::Null)
            }
            FastVal::String(s) => Json::String(s.to_string()),
            FastVal::JsonString(s) => {
                let mut out = String::with_capacity(s.len());
                unescape_into(s, &mut out);
                Json::String(out)
            }
            FastVal::BinString(b) | FastVal::Binary(b) => {
                Json::String(String::from_utf8_lossy(b).into_owned())
            }
            FastVal::Array(b) | FastVal::Object(b) => {
                serde_json::from_slice(b).unwrap_or(Json::Null)
            }
        }
    }
}

impl From<&serde_json::Value> for FastVal<'static> {
    /// Lowers an expression literal. Integers keep their exact type, other
    /// numbers become floats, arrays and objects keep their serialized text.
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => FastVal::Null,
            Json::Bool(b) => FastVal::bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FastVal::Int(i)
                } else if let Some(u) = n.as_u64() {
                    FastVal::Uint(u)
                } else {
                    n.as_f64().map_or(FastVal::Invalid, FastVal::float)
                }
            }
            Json::String(s) => FastVal::String(Cow::Owned(s.clone())),
            Json::Array(_) => FastVal::Array(Cow::Owned(
                serde_json::to_vec(value).unwrap_or_default(),
            )),
            Json::Object(_) => FastVal::Object(Cow::Owned(
                serde_json::to_vec(value).unwrap_or_default(),
            )),
        }
    }
}

impl<'a> From<&'a str> for FastVal<'a> {
    fn from(s: &'a str) -> Self {
        FastVal::String(Cow::Borrowed(s))
    }
}

impl From<i64> for FastVal<'static> {
    fn from(n: i64) -> Self {
        FastVal::Int(n)
    }
}

impl From<u64> for FastVal<'static> {
    fn from(n: u64) -> Self {
        FastVal::Uint(n)
    }
}

impl From<f64> for FastVal<'static> {
    fn from(n: f64) -> Self {
        FastVal::float(n)
    }
}

impl From<bool> for FastVal<'static> {
    fn from(b: bool) -> Self {
        FastVal::bool(b)
    }
}
