//! Arithmetic on [`FastVal`]s.
//!
//! Results use the narrowest representation that holds them exactly: two
//! unsigned operands stay unsigned while the result is non-negative, other
//! integer results become `Int` when they fit the signed 64-bit range and
//! `Uint` when only the unsigned range holds them. Anything that overflows
//! both, and anything involving a float, is computed in `f64`. Non-numeric
//! operands and division by zero produce `Invalid`.

use super::{FastVal, Num};

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl<'a> FastVal<'a> {
    pub fn add(&self, other: &FastVal<'_>) -> FastVal<'static> {
        arith(ArithOp::Add, self, other)
    }

    pub fn sub(&self, other: &FastVal<'_>) -> FastVal<'static> {
        arith(ArithOp::Sub, self, other)
    }

    pub fn mul(&self, other: &FastVal<'_>) -> FastVal<'static> {
        arith(ArithOp::Mul, self, other)
    }

    pub fn div(&self, other: &FastVal<'_>) -> FastVal<'static> {
        arith(ArithOp::Div, self, other)
    }

    /// Remainder with the sign of the dividend.
    pub fn rem(&self, other: &FastVal<'_>) -> FastVal<'static> {
        arith(ArithOp::Rem, self, other)
    }

    pub fn neg(&self) -> FastVal<'static> {
        match self.as_num() {
            Some(Num::Int(n)) => narrow(-(n as i128), false),
            Some(Num::Uint(n)) => narrow(-(n as i128), false),
            Some(Num::Float(n)) => FastVal::float(-n),
            None => FastVal::Invalid,
        }
    }
}

fn arith(op: ArithOp, lhs: &FastVal<'_>, rhs: &FastVal<'_>) -> FastVal<'static> {
    let (Some(l), Some(r)) = (lhs.as_num(), rhs.as_num()) else {
        return FastVal::Invalid;
    };

    match (l, r) {
        (Num::Float(_), _) | (_, Num::Float(_)) => float_arith(op, l.as_f64(), r.as_f64()),
        _ => {
            let unsigned = matches!((l, r), (Num::Uint(_), Num::Uint(_)));
            let (a, b) = (wide(l), wide(r));
            let result = match op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                ArithOp::Div => {
                    if b == 0 {
                        return FastVal::Invalid;
                    }
                    if a % b != 0 {
                        return float_arith(op, l.as_f64(), r.as_f64());
                    }
                    a.checked_div(b)
                }
                ArithOp::Rem => {
                    if b == 0 {
                        return FastVal::Invalid;
                    }
                    a.checked_rem(b)
                }
            };
            match result {
                Some(v) => narrow(v, unsigned),
                None => float_arith(op, l.as_f64(), r.as_f64()),
            }
        }
    }
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> FastVal<'static> {
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Rem if b == 0.0 => return FastVal::Invalid,
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    };
    FastVal::float(result)
}

fn wide(n: Num) -> i128 {
    match n {
        Num::Int(v) => v as i128,
        Num::Uint(v) => v as i128,
        Num::Float(v) => v as i128,
    }
}

fn narrow(v: i128, prefer_unsigned: bool) -> FastVal<'static> {
    if prefer_unsigned {
        if let Ok(u) = u64::try_from(v) {
            return FastVal::Uint(u);
        }
    }
    if let Ok(i) = i64::try_from(v) {
        return FastVal::Int(i);
    }
    if let Ok(u) = u64::try_from(v) {
        return FastVal::Uint(u);
    }
    FastVal::float(v as f64)
}
