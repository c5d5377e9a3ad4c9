use super::FastVal;
use crate::ast::FuncName;

/// Applies a function to already-resolved arguments. `rhs` is only read by
/// binary functions.
///
/// Arithmetic functions follow the [`FastVal`] arithmetic rules. Math
/// functions work on the floating-point projection of their arguments, and
/// return `Invalid` for non-numeric input or a non-finite result.
pub fn apply_func(func: FuncName, lhs: &FastVal<'_>, rhs: Option<&FastVal<'_>>) -> FastVal<'static> {
    let missing = FastVal::Missing;
    let rhs = rhs.unwrap_or(&missing);

    match func {
        FuncName::Add => lhs.add(rhs),
        FuncName::Sub => lhs.sub(rhs),
        FuncName::Mul => lhs.mul(rhs),
        FuncName::Div => lhs.div(rhs),
        FuncName::Mod => lhs.rem(rhs),
        FuncName::Neg => lhs.neg(),
        FuncName::Pow => binary(lhs, rhs, f64::powf),
        FuncName::Atan2 => binary(lhs, rhs, f64::atan2),
        FuncName::Abs => unary(lhs, f64::abs),
        FuncName::Acos => unary(lhs, f64::acos),
        FuncName::Asin => unary(lhs, f64::asin),
        FuncName::Atan => unary(lhs, f64::atan),
        FuncName::Ceil => unary(lhs, f64::ceil),
        FuncName::Cos => unary(lhs, f64::cos),
        FuncName::Degrees => unary(lhs, f64::to_degrees),
        FuncName::Exp => unary(lhs, f64::exp),
        FuncName::Floor => unary(lhs, f64::floor),
        FuncName::Ln => unary(lhs, f64::ln),
        FuncName::Log => unary(lhs, f64::log10),
        FuncName::Radians => unary(lhs, f64::to_radians),
        FuncName::Round => unary(lhs, f64::round),
        FuncName::Sin => unary(lhs, f64::sin),
        FuncName::Sqrt => unary(lhs, f64::sqrt),
        FuncName::Tan => unary(lhs, f64::tan),
    }
}

fn unary(arg: &FastVal<'_>, f: fn(f64) -> f64) -> FastVal<'static> {
    match arg.as_f64() {
        Some(x) => FastVal::float(f(x)),
        None => FastVal::Invalid,
    }
}

fn binary(lhs: &FastVal<'_>, rhs: &FastVal<'_>, f: fn(f64, f64) -> f64) -> FastVal<'static> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => FastVal::float(f(a, b)),
        _ => FastVal::Invalid,
    }
}
