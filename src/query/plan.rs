use crate::collection::Collection;
use crate::document::Document;
use crate::index::{IndexKeyKind, KeyBound, KeyBounds, key_from_bson};
use bson::Bson;

use super::types::{CmpOp, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Stage {
    #[serde(rename = "COLLSCAN")]
    CollScan,
    #[serde(rename = "IXSCAN")]
    IxScan,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CollScan => "COLLSCAN",
            Self::IxScan => "IXSCAN",
        }
    }
}

/// Candidate documents for a filter, in insertion order. Candidates are a superset of the
/// matches; callers still evaluate the filter on each one.
#[derive(Debug)]
pub(crate) struct Plan {
    pub stage: Stage,
    pub index_name: Option<String>,
    pub keys_examined: u64,
    pub candidates: Vec<Document>,
}

/// Comparisons on `field` that every match must satisfy: the filter itself or members of
/// (nested) conjunctions.
fn leading_predicates<'a>(filter: &'a Filter, field: &str, out: &mut Vec<(CmpOp, &'a Bson)>) {
    match filter {
        Filter::Cmp { path, op, value } if path == field => out.push((*op, value)),
        Filter::And(fs) => {
            for f in fs {
                leading_predicates(f, field, out);
            }
        }
        _ => {}
    }
}

fn bounds_for(preds: &[(CmpOp, &Bson)]) -> (KeyBounds, u32) {
    let mut bounds = KeyBounds::default();
    let mut score = 0u32;
    for (op, value) in preds {
        let Some(key) = key_from_bson(value) else { continue };
        if *op != CmpOp::Eq && key == IndexKeyKind::Null {
            continue;
        }
        let inclusive = !matches!(op, CmpOp::Gt | CmpOp::Lt);
        let bound = KeyBound { value: key, inclusive };
        match op {
            CmpOp::Eq => {
                bounds.raise_lower(bound.clone());
                bounds.lower_upper(bound);
                score += 2;
            }
            CmpOp::Gt | CmpOp::Gte => {
                bounds.clamp_to_class(&bound.value);
                bounds.raise_lower(bound);
                score += 1;
            }
            CmpOp::Lt | CmpOp::Lte => {
                bounds.clamp_to_class(&bound.value);
                bounds.lower_upper(bound);
                score += 1;
            }
        }
    }
    (bounds, score)
}

/// Pick the index whose leading field is best constrained by the filter (equality over range,
/// then index name), or fall back to a full scan.
pub(crate) fn plan(col: &Collection, filter: &Filter) -> Plan {
    let mut mgr = col.indexes.write();
    let mut best: Option<(String, KeyBounds, u32)> = None;
    for (name, idx) in &mgr.indexes {
        let Some(field) = idx.spec.leading_field() else { continue };
        let mut preds = Vec::new();
        leading_predicates(filter, field, &mut preds);
        let (bounds, score) = bounds_for(&preds);
        if score > 0 && best.as_ref().is_none_or(|(_, _, s)| score > *s) {
            best = Some((name.clone(), bounds, score));
        }
    }

    let scanned = best.and_then(|(name, bounds, _)| {
        mgr.indexes.get_mut(&name).map(|idx| (name, idx.scan_leading(&bounds)))
    });
    drop(mgr);
    let Some((name, scan)) = scanned else {
        return Plan {
            stage: Stage::CollScan,
            index_name: None,
            keys_examined: 0,
            candidates: col.documents(),
        };
    };

    let docs = col.docs.read();
    let mut seqs: Vec<u64> = scan.ids.iter().filter_map(|id| docs.seq_of.get(id).copied()).collect();
    seqs.sort_unstable();
    seqs.dedup();
    let candidates = seqs.iter().filter_map(|s| docs.by_seq.get(s).cloned()).collect();
    Plan { stage: Stage::IxScan, index_name: Some(name), keys_examined: scan.keys_examined, candidates }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexSpec;
    use crate::query::Order;
    use bson::doc;

    fn seeded() -> Collection {
        let col = Collection::new("t", None);
        for (t, y) in [("a", 1990), ("b", 2005), ("c", 2012), ("d", 2020)] {
            col.insert_document(Document::new(doc! {"title": t, "published_year": y})).unwrap();
        }
        col
    }

    #[test]
    fn full_scan_without_usable_index() {
        let col = seeded();
        col.create_index(IndexSpec::single("title", Order::Asc)).unwrap();
        let p = plan(&col, &Filter::gt("published_year", 2000));
        assert_eq!(p.stage, Stage::CollScan);
        assert_eq!(p.candidates.len(), 4);
    }

    #[test]
    fn equality_prefers_matching_index() {
        let col = seeded();
        col.create_index(IndexSpec::single("published_year", Order::Asc)).unwrap();
        col.create_index(IndexSpec::single("title", Order::Asc)).unwrap();
        let f = Filter::all(vec![Filter::gt("published_year", 2000), Filter::eq("title", "c")]);
        let p = plan(&col, &f);
        assert_eq!(p.stage, Stage::IxScan);
        assert_eq!(p.index_name.as_deref(), Some("title_1"));
        assert_eq!(p.candidates.len(), 1);
    }

    #[test]
    fn range_candidates_keep_insertion_order() {
        let col = seeded();
        col.create_index(IndexSpec::single("published_year", Order::Desc)).unwrap();
        let p = plan(&col, &Filter::gte("published_year", 2005));
        let titles: Vec<&str> = p.candidates.iter().map(|d| d.data.get_str("title").unwrap()).collect();
        assert_eq!(titles, vec!["b", "c", "d"]);
    }

    #[test]
    fn range_scan_skips_values_of_other_types() {
        let col = seeded();
        for y in [Bson::String("1850".into()), Bson::Null, Bson::Boolean(true)] {
            col.insert_document(Document::new(doc! {"title": "odd", "published_year": y})).unwrap();
        }
        col.create_index(IndexSpec::single("published_year", Order::Asc)).unwrap();
        let p = plan(&col, &Filter::lt("published_year", 2000));
        assert_eq!(p.stage, Stage::IxScan);
        let titles: Vec<&str> = p.candidates.iter().map(|d| d.data.get_str("title").unwrap()).collect();
        assert_eq!(titles, vec!["a"]);
    }
}
