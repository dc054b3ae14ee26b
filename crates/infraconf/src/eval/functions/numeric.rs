use super::{integer, next, number, string, FuncDef, FunctionError, Param};
use crate::value::Value;

pub(super) fn functions() -> Vec<FuncDef> {
    vec![
        FuncDef::new("abs", |args, _| {
            match &args[0] {
                Value::Integer(i) => i
                    .checked_abs()
                    .map(Value::Integer)
                    .ok_or_else(|| FunctionError::failed(format!("abs({i}) is out of range"))),
                other => Ok(Value::Decimal(number(other).abs())),
            }
        })
        .param(Param::number("num")),
        FuncDef::new("ceil", |args, _| Ok(whole(number(&args[0]).ceil())))
            .param(Param::number("num")),
        FuncDef::new("floor", |args, _| Ok(whole(number(&args[0]).floor())))
            .param(Param::number("num")),
        FuncDef::new("log", |args, _| {
            Ok(Value::Decimal(number(&args[0]).log(number(&args[1]))))
        })
        .param(Param::number("num"))
        .param(Param::number("base")),
        FuncDef::new("max", |args, _| extreme(args, f64::max))
            .variadic(Param::number("numbers")),
        FuncDef::new("min", |args, _| extreme(args, f64::min))
            .variadic(Param::number("numbers")),
        FuncDef::new("parseint", |args, _| {
            let mut args = args.into_iter();
            let text = string(next(&mut args));
            let base = integer(&next(&mut args), "base")?;
            if !(2..=36).contains(&base) {
                return Err(FunctionError::failed(format!(
                    "base must be between 2 and 36, got {base}"
                )));
            }
            i64::from_str_radix(&text, base as u32)
                .map(Value::Integer)
                .map_err(|_| FunctionError::failed(format!("cannot parse `{text}` as base {base}")))
        })
        .param(Param::string("number"))
        .param(Param::number("base")),
        FuncDef::new("pow", |args, _| {
            let (base, exponent) = (&args[0], &args[1]);
            if let (Some(base), Some(exponent)) = (base.as_i64(), exponent.as_i64()) {
                if let Some(result) = u32::try_from(exponent)
                    .ok()
                    .and_then(|exponent| base.checked_pow(exponent))
                {
                    return Ok(Value::Integer(result));
                }
            }
            Ok(Value::Decimal(number(base).powf(number(exponent))))
        })
        .param(Param::number("num"))
        .param(Param::number("power")),
        FuncDef::new("signum", |args, _| {
            let n = number(&args[0]);
            Ok(Value::Integer(if n > 0.0 {
                1
            } else if n < 0.0 {
                -1
            } else {
                0
            }))
        })
        .param(Param::number("num")),
    ]
}

/// Integer when the float is whole and fits
fn whole(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Integer(n as i64)
    } else {
        Value::Decimal(n)
    }
}

fn extreme(args: Vec<Value>, pick: fn(f64, f64) -> f64) -> Result<Value, FunctionError> {
    let mut numbers = args.iter();
    let first = numbers
        .next()
        .ok_or_else(|| FunctionError::failed("at least one number is required"))?;

    let mut best = first;
    for candidate in numbers {
        if pick(number(best), number(candidate)) != number(best) {
            best = candidate;
        }
    }
    Ok(best.clone())
}
