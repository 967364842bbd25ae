//! `Integer` and `Real`.
//!
//! Mixed operands promote to Real. Integer arithmetic is checked; overflow
//! and integer division by zero are errors, Real division follows IEEE 754.

use std::cmp::Ordering;

use super::{number_arg, Members};
use crate::errors::{division_by_zero, type_mismatch, EvalError, EvalResult};
use crate::{Instance, Interpreter};

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Arith {
    fn name(self) -> &'static str {
        match self {
            Arith::Add => "addition",
            Arith::Sub => "subtraction",
            Arith::Mul => "multiplication",
            Arith::Div => "division",
            Arith::Rem => "remainder",
        }
    }

    fn ints(self, a: i64, b: i64) -> Result<i64, EvalError> {
        if matches!(self, Arith::Div | Arith::Rem) && b == 0 {
            return Err(division_by_zero());
        }
        let result = match self {
            Arith::Add => a.checked_add(b),
            Arith::Sub => a.checked_sub(b),
            Arith::Mul => a.checked_mul(b),
            Arith::Div => a.checked_div(b),
            Arith::Rem => a.checked_rem(b),
        };
        result.ok_or_else(|| EvalError::new(format!("integer overflow in {}", self.name())))
    }

    fn reals(self, a: f64, b: f64) -> f64 {
        match self {
            Arith::Add => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div => a / b,
            Arith::Rem => a % b,
        }
    }
}

fn arith(interp: &Interpreter, this: &Instance, other: &Instance, op: Arith) -> EvalResult {
    if let (Some(a), Some(b)) = (this.as_int(), other.as_int()) {
        return Ok(interp.integer(op.ints(a, b)?));
    }
    let a = number_arg(interp, this)?;
    let b = number_arg(interp, other)?;
    Ok(interp.real(op.reals(a, b)))
}

/// Numeric ordering; `None` when either side is NaN.
fn compare(interp: &Interpreter, this: &Instance, other: &Instance) -> Result<Option<Ordering>, EvalError> {
    if let (Some(a), Some(b)) = (this.as_int(), other.as_int()) {
        return Ok(Some(a.cmp(&b)));
    }
    let a = number_arg(interp, this)?;
    let b = number_arg(interp, other)?;
    Ok(a.partial_cmp(&b))
}

/// Equality never fails: a non-number is simply unequal.
fn numeric_eq(this: &Instance, other: &Instance) -> bool {
    match (this.as_int(), other.as_int()) {
        (Some(a), Some(b)) => a == b,
        _ => match (this.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn shared_members(m: Members<'_>) -> Members<'_> {
    m.method("add", &["other"], |interp, this, args| {
        arith(interp, this, &args[0], Arith::Add)
    })
    .method("subtract", &["other"], |interp, this, args| {
        arith(interp, this, &args[0], Arith::Sub)
    })
    .method("multiply", &["other"], |interp, this, args| {
        arith(interp, this, &args[0], Arith::Mul)
    })
    .method("divide", &["other"], |interp, this, args| {
        arith(interp, this, &args[0], Arith::Div)
    })
    .method("remainder", &["other"], |interp, this, args| {
        arith(interp, this, &args[0], Arith::Rem)
    })
    .method("equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(numeric_eq(this, &args[0])))
    })
    .method("not_equals", &["other"], |interp, this, args| {
        Ok(interp.boolean(!numeric_eq(this, &args[0])))
    })
    .method("less", &["other"], |interp, this, args| {
        let ord = compare(interp, this, &args[0])?;
        Ok(interp.boolean(ord == Some(Ordering::Less)))
    })
    .method("less_or_equal", &["other"], |interp, this, args| {
        let ord = compare(interp, this, &args[0])?;
        Ok(interp.boolean(matches!(ord, Some(Ordering::Less | Ordering::Equal))))
    })
    .method("greater", &["other"], |interp, this, args| {
        let ord = compare(interp, this, &args[0])?;
        Ok(interp.boolean(ord == Some(Ordering::Greater)))
    })
    .method("greater_or_equal", &["other"], |interp, this, args| {
        let ord = compare(interp, this, &args[0])?;
        Ok(interp.boolean(matches!(ord, Some(Ordering::Greater | Ordering::Equal))))
    })
    .method("min", &["other"], |interp, this, args| {
        let ord = compare(interp, this, &args[0])?;
        Ok(if ord == Some(Ordering::Greater) {
            args[0].clone()
        } else {
            this.clone()
        })
    })
    .method("max", &["other"], |interp, this, args| {
        let ord = compare(interp, this, &args[0])?;
        Ok(if ord == Some(Ordering::Less) {
            args[0].clone()
        } else {
            this.clone()
        })
    })
}

pub(super) fn integer_members(m: Members<'_>) -> Members<'_> {
    shared_members(m)
        .method("negated", &[], |interp, this, _| {
            let i = int_of(interp, this)?;
            let negated = i
                .checked_neg()
                .ok_or_else(|| EvalError::new("integer overflow in negation"))?;
            Ok(interp.integer(negated))
        })
        .method("abs", &[], |interp, this, _| {
            let i = int_of(interp, this)?;
            let abs = i
                .checked_abs()
                .ok_or_else(|| EvalError::new("integer overflow in abs"))?;
            Ok(interp.integer(abs))
        })
        .method("to_string", &[], |interp, this, _| {
            let i = int_of(interp, this)?;
            Ok(interp.string(i.to_string()))
        })
        .method("to_integer", &[], |interp, this, _| {
            int_of(interp, this)?;
            Ok(this.clone())
        })
        .method("to_real", &[], |interp, this, _| {
            let r = number_arg(interp, this)?;
            Ok(interp.real(r))
        })
}

pub(super) fn real_members(m: Members<'_>) -> Members<'_> {
    shared_members(m)
        .method("negated", &[], |interp, this, _| {
            let r = real_of(interp, this)?;
            Ok(interp.real(-r))
        })
        .method("abs", &[], |interp, this, _| {
            let r = real_of(interp, this)?;
            Ok(interp.real(r.abs()))
        })
        .method("to_string", &[], |interp, this, _| {
            let r = real_of(interp, this)?;
            Ok(interp.string(format!("{r:?}")))
        })
        .method("to_real", &[], |interp, this, _| {
            real_of(interp, this)?;
            Ok(this.clone())
        })
        .method("to_integer", &[], real_to_integer)
}

/// Truncates toward zero; NaN and out-of-range values are errors.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "range checked before the cast"
)]
fn real_to_integer(interp: &mut Interpreter, this: &Instance, _: &[Instance]) -> EvalResult {
    let r = real_of(interp, this)?.trunc();
    if r.is_nan() || r < i64::MIN as f64 || r >= i64::MAX as f64 {
        return Err(EvalError::new(format!("{r} does not fit in an Integer")));
    }
    Ok(interp.integer(r as i64))
}

fn int_of(interp: &Interpreter, this: &Instance) -> Result<i64, EvalError> {
    this.as_int()
        .ok_or_else(|| type_mismatch("Integer", interp.class_name_of(this)))
}

fn real_of(interp: &Interpreter, this: &Instance) -> Result<f64, EvalError> {
    this.as_real()
        .ok_or_else(|| type_mismatch("Real", interp.class_name_of(this)))
}
