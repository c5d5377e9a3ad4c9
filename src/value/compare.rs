use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use super::strings::DecodedBytes;
use super::{FastVal, Num, ValueKind};
use crate::lexer::{TokenKind, Tokenizer};

impl<'a> FastVal<'a> {
    /// Orders two values.
    ///
    /// - Numbers of any representation compare by numeric value.
    /// - String-like values compare by the text they stand for, so an escaped
    ///   document string and an unescaped literal compare as equal when they
    ///   spell the same thing.
    /// - Arrays and objects compare element by element in document order.
    /// - Anything else orders by [`ValueKind`].
    ///
    /// As a compatibility quirk, `True` compares equal to the string `"true"`.
    pub fn compare(&self, other: &FastVal<'_>) -> Ordering {
        let (lk, rk) = (self.kind(), other.kind());

        if lk.is_numeric() && rk.is_numeric() {
            if let (Some(l), Some(r)) = (self.as_num(), other.as_num()) {
                return compare_nums(l, r);
            }
        }

        if lk.is_string_like() && rk.is_string_like() {
            return self.text_bytes().cmp(other.text_bytes());
        }

        if lk == ValueKind::True && rk.is_string_like() && other.text_bytes().eq(*b"true") {
            return Ordering::Equal;
        }
        if rk == ValueKind::True && lk.is_string_like() && self.text_bytes().eq(*b"true") {
            return Ordering::Equal;
        }

        match (self, other) {
            (FastVal::Binary(l), FastVal::Binary(r)) => l.as_ref().cmp(r.as_ref()),
            (FastVal::Array(l), FastVal::Array(r)) | (FastVal::Object(l), FastVal::Object(r)) => {
                compare_structured(l, r)
            }
            _ => lk.cmp(&rk),
        }
    }

    /// Equality as used by the `==` operator: `compare` reports `Equal`.
    /// Missing and Invalid values are never equal to anything.
    pub fn equals(&self, other: &FastVal<'_>) -> bool {
        !self.is_absent() && !other.is_absent() && self.compare(other) == Ordering::Equal
    }

    fn text_bytes(&self) -> DecodedBytes<'_> {
        match self {
            FastVal::String(s) => DecodedBytes::raw(s.as_bytes()),
            FastVal::BinString(b) => DecodedBytes::raw(b),
            FastVal::JsonString(s) => DecodedBytes::escaped(s),
            _ => DecodedBytes::raw(&[]),
        }
    }
}

fn compare_nums(l: Num, r: Num) -> Ordering {
    match (l, r) {
        (Num::Int(a), Num::Int(b)) => a.cmp(&b),
        (Num::Uint(a), Num::Uint(b)) => a.cmp(&b),
        (Num::Int(a), Num::Uint(b)) => (a as i128).cmp(&(b as i128)),
        (Num::Uint(a), Num::Int(b)) => (a as i128).cmp(&(b as i128)),
        (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Num::Float(a), int) => compare_float_int(a, int),
        (int, Num::Float(b)) => compare_float_int(b, int).reverse(),
    }
}

/// Compares a float with an integer exactly where both fit a `Decimal`, so
/// large integers are not rounded through `f64` first.
fn compare_float_int(f: f64, int: Num) -> Ordering {
    let exact = match int {
        Num::Int(n) => Decimal::from_i64(n),
        Num::Uint(n) => Decimal::from_u64(n),
        Num::Float(_) => None,
    };
    if let (Some(d), Some(i)) = (Decimal::from_f64_retain(f), exact) {
        return d.cmp(&i);
    }
    f.partial_cmp(&int.as_f64()).unwrap_or(Ordering::Equal)
}

/// Walks two serialized containers in lockstep. Scalars compare as values,
/// structure compares by token kind. Unlexable input falls back to bytes.
fn compare_structured(l: &[u8], r: &[u8]) -> Ordering {
    let mut lt = Tokenizer::new(l);
    let mut rt = Tokenizer::new(r);

    loop {
        let (a, b) = match (lt.step(), rt.step()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => return l.cmp(r),
        };

        if a.kind.is_scalar() && b.kind.is_scalar() {
            let ord = FastVal::from_token(&a).compare(&FastVal::from_token(&b));
            if ord != Ordering::Equal {
                return ord;
            }
            continue;
        }

        if a.kind != b.kind {
            return structural_rank(a.kind).cmp(&structural_rank(b.kind));
        }
        if a.kind == TokenKind::End {
            return Ordering::Equal;
        }
    }
}

/// Closing tokens sort first so that a shorter container orders before a
/// longer one that shares its prefix.
fn structural_rank(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::End => 0,
        TokenKind::ObjectEnd | TokenKind::ArrayEnd => 1,
        TokenKind::ListDelim => 2,
        TokenKind::KeyDelim => 3,
        TokenKind::ArrayStart => 5,
        TokenKind::ObjectStart => 6,
        _ => 4,
    }
}
