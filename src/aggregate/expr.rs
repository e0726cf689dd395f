use crate::errors::DbError;
use crate::query::get_path;
use crate::utils::num::{bson_as_f64, bson_as_i64, int_to_bson, is_numeric};
use bson::{Bson, Document as BsonDocument};

use super::types::Expr;

fn numeric_operand(v: &Bson, op: &str) -> Result<f64, DbError> {
    bson_as_f64(v).ok_or_else(|| DbError::QueryError(format!("{op} only supports numeric types")))
}

/// Evaluate `expr` against one document. Missing fields evaluate to `null`, and arithmetic or
/// string operators given a `null` operand yield `null`.
///
/// # Errors
/// Returns `QueryError` for a type mismatch or division by zero.
pub fn eval_expr(doc: &BsonDocument, expr: &Expr) -> Result<Bson, DbError> {
    match expr {
        Expr::Field(path) => Ok(get_path(doc, path).cloned().unwrap_or(Bson::Null)),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Divide(a, b) => {
            let (a, b) = (eval_expr(doc, a)?, eval_expr(doc, b)?);
            if is_nullish(&a) || is_nullish(&b) {
                return Ok(Bson::Null);
            }
            let (x, y) = (numeric_operand(&a, "$divide")?, numeric_operand(&b, "$divide")?);
            if y == 0.0 {
                return Err(DbError::QueryError("$divide by zero".into()));
            }
            Ok(Bson::Double(x / y))
        }
        Expr::Multiply(items) => multiply(doc, items),
        Expr::Floor(inner) => match eval_expr(doc, inner)? {
            v if is_nullish(&v) => Ok(Bson::Null),
            v @ (Bson::Int32(_) | Bson::Int64(_)) => Ok(v),
            v => Ok(Bson::Double(numeric_operand(&v, "$floor")?.floor())),
        },
        Expr::ToString(inner) => to_string(eval_expr(doc, inner)?),
        Expr::Concat(items) => {
            let mut out = String::new();
            for item in items {
                match eval_expr(doc, item)? {
                    Bson::String(s) => out.push_str(&s),
                    v if is_nullish(&v) => return Ok(Bson::Null),
                    other => {
                        return Err(DbError::QueryError(format!(
                            "$concat only supports strings, got {:?}",
                            other.element_type()
                        )));
                    }
                }
            }
            Ok(Bson::String(out))
        }
        Expr::Object(fields) => {
            let mut out = BsonDocument::new();
            for (k, e) in fields {
                out.insert(k.clone(), eval_expr(doc, e)?);
            }
            Ok(Bson::Document(out))
        }
    }
}

fn is_nullish(v: &Bson) -> bool {
    matches!(v, Bson::Null | Bson::Undefined)
}

/// Integral while every factor is an integer and the product fits; a double otherwise.
#[allow(clippy::cast_precision_loss)]
fn multiply(doc: &BsonDocument, items: &[Expr]) -> Result<Bson, DbError> {
    let mut int_product: Option<i64> = Some(1);
    let mut float_product = 1.0f64;
    for item in items {
        let v = eval_expr(doc, item)?;
        if is_nullish(&v) {
            return Ok(Bson::Null);
        }
        if !is_numeric(&v) {
            return Err(DbError::QueryError("$multiply only supports numeric types".into()));
        }
        float_product *= numeric_operand(&v, "$multiply")?;
        int_product = match (&v, int_product) {
            (Bson::Int32(_) | Bson::Int64(_), Some(p)) => bson_as_i64(&v).and_then(|i| p.checked_mul(i)),
            _ => None,
        };
    }
    Ok(int_product.map_or(Bson::Double(float_product), int_to_bson))
}

/// `$toString`: whole doubles print without a fraction, so `1990.0` becomes `"1990"`.
#[allow(clippy::cast_possible_truncation)]
fn to_string(v: Bson) -> Result<Bson, DbError> {
    Ok(match v {
        Bson::Null | Bson::Undefined => Bson::Null,
        Bson::String(s) => Bson::String(s),
        Bson::Int32(i) => Bson::String(i.to_string()),
        Bson::Int64(i) => Bson::String(i.to_string()),
        Bson::Double(d) if d.is_finite() && d.fract() == 0.0 && d.abs() < 1.0e15 => {
            Bson::String((d as i64).to_string())
        }
        Bson::Double(d) => Bson::String(d.to_string()),
        Bson::Boolean(b) => Bson::String(b.to_string()),
        Bson::Decimal128(d) => Bson::String(d.to_string()),
        Bson::ObjectId(o) => Bson::String(o.to_hex()),
        other => {
            return Err(DbError::QueryError(format!(
                "$toString cannot convert {:?}",
                other.element_type()
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn decade_label() -> Expr {
        Expr::Concat(vec![
            Expr::ToString(Box::new(Expr::Multiply(vec![
                Expr::Floor(Box::new(Expr::Divide(
                    Box::new(Expr::field("published_year")),
                    Box::new(Expr::lit(10)),
                ))),
                Expr::lit(10),
            ]))),
            Expr::lit("s"),
        ])
    }

    #[test]
    fn decade_label_from_year() {
        let d = doc! {"published_year": 1997};
        assert_eq!(eval_expr(&d, &decade_label()).unwrap(), Bson::String("1990s".into()));
        let d = doc! {"published_year": 2000};
        assert_eq!(eval_expr(&d, &decade_label()).unwrap(), Bson::String("2000s".into()));
    }

    #[test]
    fn missing_year_gives_null_label() {
        assert_eq!(eval_expr(&doc! {}, &decade_label()).unwrap(), Bson::Null);
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        let e = Expr::Divide(Box::new(Expr::lit(1)), Box::new(Expr::lit(0)));
        assert!(matches!(eval_expr(&doc! {}, &e), Err(DbError::QueryError(_))));
    }

    #[test]
    fn multiply_stays_integral_for_ints() {
        let e = Expr::Multiply(vec![Expr::lit(6), Expr::lit(7)]);
        assert_eq!(eval_expr(&doc! {}, &e).unwrap(), Bson::Int32(42));
        let e = Expr::Multiply(vec![Expr::lit(6), Expr::lit(0.5)]);
        assert_eq!(eval_expr(&doc! {}, &e).unwrap(), Bson::Double(3.0));
    }

    #[test]
    fn concat_rejects_numbers() {
        let e = Expr::Concat(vec![Expr::lit("a"), Expr::lit(1)]);
        assert!(eval_expr(&doc! {}, &e).is_err());
    }

    #[test]
    fn to_string_formats_fractional_doubles() {
        assert_eq!(to_string(Bson::Double(10.99)).unwrap(), Bson::String("10.99".into()));
    }
}
