use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{
    CmpOp, Filter, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, Projection, SortSpec,
};
use crate::document::ID_FIELD;
use crate::utils::num::{bson_as_f64, is_numeric};

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => get_path(doc, path).is_some_and(|v| match op {
            CmpOp::Eq => values_equal(v, value),
            CmpOp::Gt => range_cmp(v, value) == Some(Ordering::Greater),
            CmpOp::Gte => range_cmp(v, value).is_some_and(Ordering::is_ge),
            CmpOp::Lt => range_cmp(v, value) == Some(Ordering::Less),
            CmpOp::Lte => range_cmp(v, value).is_some_and(Ordering::is_le),
        }),
    }
}

/// Equality with numbers compared by value, so `2000`, `2000i64` and `2000.0` match each other.
#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_numeric(a) && is_numeric(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    a == b
}

/// Multi-key comparison for sorting. Missing fields sort before present ones in ascending order.
pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().any(|x| values_equal(v, x))
}

/// Range comparison only between numbers, strings or booleans of the same class.
#[must_use]
fn range_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    let same_class = (is_numeric(a) && is_numeric(b))
        || matches!(
            (a, b),
            (Bson::String(_), Bson::String(_)) | (Bson::Boolean(_), Bson::Boolean(_))
        );
    same_class.then(|| compare_bson(a, b))
}

/// Resolve a dotted path (`a.b.c`) through embedded documents.
#[must_use]
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (num_view(a), num_view(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Every NaN collapses to the positive quiet NaN so it orders above all numbers, as index keys do.
fn num_view(v: &Bson) -> Option<f64> {
    if !is_numeric(v) {
        return None;
    }
    Some(bson_as_f64(v).filter(|f| !f.is_nan()).unwrap_or(f64::NAN))
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null | Bson::Undefined => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::Boolean(_) => 1,
        Bson::String(_) => 5,
        Bson::Document(_) => 6,
        Bson::Array(_) => 7,
        Bson::Binary(_) => 8,
        Bson::ObjectId(_) => 9,
        Bson::DateTime(_) => 10,
        Bson::Timestamp(_) => 11,
        Bson::RegularExpression(_) => 12,
        _ => 13,
    }
}

/// Apply a projection to an output document (one that already carries `_id`).
pub fn project_fields(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    match projection {
        Projection::Include { fields, include_id } => {
            let mut out = BsonDocument::new();
            if *include_id && let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD, id.clone());
            }
            for f in fields.iter().take(super::types::MAX_PROJECTION_FIELDS) {
                if f == ID_FIELD {
                    continue;
                }
                if let Some(v) = doc.get(f) {
                    out.insert(f.clone(), v.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for f in fields.iter().take(super::types::MAX_PROJECTION_FIELDS) {
                out.remove(f);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn numeric_equality_crosses_types() {
        let d = doc! {"year": 2000};
        assert!(eval_filter(&d, &Filter::eq("year", 2000.0)));
        assert!(eval_filter(&d, &Filter::eq("year", 2000i64)));
        assert!(!eval_filter(&d, &Filter::eq("year", "2000")));
    }

    #[test]
    fn range_on_missing_field_is_false() {
        let d = doc! {"title": "x"};
        assert!(!eval_filter(&d, &Filter::gt("published_year", 0)));
        assert!(eval_filter(&d, &Filter::Not(Box::new(Filter::gt("published_year", 0)))));
    }

    #[test]
    fn range_only_compares_like_types() {
        for v in [Bson::String("1850".into()), Bson::Null, Bson::Boolean(true)] {
            let d = doc! {"year": v};
            assert!(!eval_filter(&d, &Filter::gt("year", 2000)));
            assert!(!eval_filter(&d, &Filter::lt("year", 2000)));
        }
        let d = doc! {"year": 2005i64};
        assert!(eval_filter(&d, &Filter::gte("year", 2005.0)));
        assert!(!eval_filter(&d, &Filter::gt("year", "2000")));
    }

    #[test]
    fn dotted_paths_resolve_embedded_docs() {
        let d = doc! {"meta": {"stock": {"count": 3}}};
        assert_eq!(get_path(&d, "meta.stock.count"), Some(&Bson::Int32(3)));
        assert_eq!(get_path(&d, "meta.missing"), None);
        assert_eq!(get_path(&d, ""), None);
    }

    #[test]
    fn missing_sorts_first_ascending() {
        let a = doc! {"p": 1};
        let b = doc! {};
        assert_eq!(compare_docs(&a, &b, &[SortSpec::asc("p")]), Ordering::Greater);
        assert_eq!(compare_docs(&a, &b, &[SortSpec::desc("p")]), Ordering::Less);
    }

    #[test]
    fn include_projection_keeps_id_unless_suppressed() {
        let d = doc! {"_id": "x", "title": "t", "price": 1.0, "genre": "g"};
        let p = Projection::include(["title", "price"]);
        assert_eq!(project_fields(&d, &p), doc! {"_id": "x", "title": "t", "price": 1.0});
        assert_eq!(project_fields(&d, &p.without_id()), doc! {"title": "t", "price": 1.0});
    }

    #[test]
    fn exclude_projection_removes_listed_fields() {
        let d = doc! {"_id": "x", "title": "t", "price": 1.0};
        let p = Projection::Exclude(vec!["price".into()]).without_id();
        assert_eq!(project_fields(&d, &p), doc! {"title": "t"});
    }

    #[test]
    fn in_and_nin_use_numeric_equality() {
        let d = doc! {"n": 3};
        let f = Filter::In { path: "n".into(), values: vec![Bson::Double(3.0)] };
        assert!(eval_filter(&d, &f));
        let f = Filter::Nin { path: "n".into(), values: vec![Bson::Int64(3)] };
        assert!(!eval_filter(&d, &f));
    }
}
