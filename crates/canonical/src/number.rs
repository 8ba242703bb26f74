//! Canonical number formatting.
//!
//! JSON numbers are compared by value: `1`, `1.0`, `1e0` and `10E-1` all
//! produce `1`. The rule, applied in order:
//!
//! 1. Integers parsed as `i64`/`u64` are written in plain decimal.
//! 2. Floats equal to zero are written `0` (this folds `-0.0`).
//! 3. Floats with no fractional part that fit the `i64` or `u64` range are
//!    written as that integer.
//! 4. Any other float is written with its shortest round-trip digits:
//!    positional when the decimal exponent is in `[-6, 21)`, otherwise
//!    `d.ddde<exp>` with no `+` sign and no leading exponent zeros.
//!
//! The digits come from Rust's shortest round-trip float formatting, which is
//! platform independent.

use std::fmt::Write;

use serde_json::Number;

const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_END: f64 = 9_223_372_036_854_775_808.0;
const U64_END: f64 = 18_446_744_073_709_551_616.0;

const POSITIONAL_MIN_EXP: i32 = -6;
const POSITIONAL_END_EXP: i32 = 21;

pub(crate) fn write_number(out: &mut String, number: &Number) {
    if let Some(value) = number.as_i64() {
        let _ = write!(out, "{value}");
    } else if let Some(value) = number.as_u64() {
        let _ = write!(out, "{value}");
    } else if let Some(value) = number.as_f64() {
        write_float(out, value);
    } else {
        // Only reachable with arbitrary-precision numbers enabled upstream.
        out.push_str(&number.to_string());
    }
}

pub(crate) fn write_float(out: &mut String, value: f64) {
    if value == 0.0 {
        out.push('0');
        return;
    }

    if value.fract() == 0.0 {
        // Exact conversions: the value is integral and inside the target range.
        if (I64_MIN..I64_END).contains(&value) {
            let _ = write!(out, "{}", value as i64);
            return;
        }
        if value > 0.0 && value < U64_END {
            let _ = write!(out, "{}", value as u64);
            return;
        }
    }

    let scientific = format!("{:e}", value.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        out.push_str(&scientific);
        return;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        out.push_str(&scientific);
        return;
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if value.is_sign_negative() {
        out.push('-');
    }

    if (POSITIONAL_MIN_EXP..POSITIONAL_END_EXP).contains(&exponent) {
        write_positional(out, &digits, exponent);
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let _ = write!(out, "e{exponent}");
    }
}

/// Writes `0.d1d2...` or `d1d2.d3...` given significant digits and the
/// decimal exponent of the first digit.
fn write_positional(out: &mut String, digits: &str, exponent: i32) {
    if exponent < 0 {
        out.push_str("0.");
        for _ in 0..(-exponent - 1) {
            out.push('0');
        }
        out.push_str(digits);
        return;
    }

    let integer_len = exponent as usize + 1;
    if digits.len() <= integer_len {
        out.push_str(digits);
        for _ in digits.len()..integer_len {
            out.push('0');
        }
    } else {
        out.push_str(&digits[..integer_len]);
        out.push('.');
        out.push_str(&digits[integer_len..]);
    }
}
