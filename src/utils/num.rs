//! Numeric utilities: centralized conversions between BSON numbers and Rust primitives.
//!
//! Guidelines
//! - BSON numbers (`Int32`, `Int64`, `Double`, `Decimal128`) are treated as one numeric domain.
//! - Prefer saturating conversions for metrics/logging values.

use bson::Bson;

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn u128_to_u64_saturating(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn is_numeric(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

/// Numeric view of a BSON value; `None` for non-numbers.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bson_as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Integral view of a BSON value. Doubles are accepted only when they carry no fraction.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn bson_as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        Bson::Double(d) if d.is_finite() && d.fract() == 0.0 && d.abs() < 9.0e15 => Some(*d as i64),
        _ => None,
    }
}

/// Narrowest integral BSON representation of `v`.
#[must_use]
pub fn int_to_bson(v: i64) -> Bson {
    i32::try_from(v).map_or(Bson::Int64(v), Bson::Int32)
}
