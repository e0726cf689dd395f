use bookstore::aggregate::{parse_pipeline_json, reports, run_pipeline};
use bookstore::collection::Collection;
use bookstore::document::Document;
use bson::doc;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn load(rows: &[(u8, i32, u16)]) -> Collection {
    let col = Collection::new("books", None);
    for (i, (author, year, cents)) in rows.iter().enumerate() {
        let data = doc! {
            "title": format!("Book {i}"),
            "author": format!("Author {author}"),
            "genre": format!("Genre {}", author % 3),
            "published_year": *year,
            "price": f64::from(*cents) / 100.0,
        };
        col.insert_document(Document::new(data)).unwrap();
    }
    col
}

fn rows() -> impl Strategy<Value = Vec<(u8, i32, u16)>> {
    proptest::collection::vec((0u8..6, 1800i32..2030, 100u16..5000), 0..40)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        cases: 48,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn decade_groups_partition_the_collection(rows in rows()) {
        let col = load(&rows);
        let groups = reports::count_by_decade(&col).unwrap();
        prop_assert_eq!(groups.iter().map(|g| g.book_count).sum::<u64>(), rows.len() as u64);

        let mut want: BTreeMap<String, u64> = BTreeMap::new();
        for (_, year, _) in &rows {
            *want.entry(format!("{}s", year / 10 * 10)).or_default() += 1;
        }
        let got: Vec<(String, u64)> = groups.into_iter().map(|g| (g.decade.unwrap(), g.book_count)).collect();
        prop_assert_eq!(got, want.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn top_author_has_the_maximum_count(rows in rows()) {
        let col = load(&rows);
        let top = reports::top_author_by_count(&col).unwrap();
        let mut counts: BTreeMap<u8, u64> = BTreeMap::new();
        for (a, _, _) in &rows {
            *counts.entry(*a).or_default() += 1;
        }
        match top {
            None => prop_assert!(rows.is_empty()),
            Some(t) => {
                let max = counts.values().copied().max().unwrap_or(0);
                prop_assert_eq!(t.book_count, max);
                let first_with_max = rows.iter().map(|(a, _, _)| *a).find(|a| counts[a] == max).unwrap();
                prop_assert_eq!(t.author, Some(format!("Author {first_with_max}")));
            }
        }
    }

    #[test]
    fn genre_averages_are_descending_means(rows in rows()) {
        let col = load(&rows);
        let avgs = reports::average_price_by_genre(&col).unwrap();
        for w in avgs.windows(2) {
            prop_assert!(w[0].average_price.unwrap() >= w[1].average_price.unwrap());
        }
        let mut want: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (a, _, c) in &rows {
            want.entry(format!("Genre {}", a % 3)).or_default().push(f64::from(*c) / 100.0);
        }
        prop_assert_eq!(avgs.len(), want.len());
        for g in &avgs {
            let prices = &want[g.genre.as_deref().unwrap()];
            let mean = prices.iter().sum::<f64>() / prices.len() as f64;
            prop_assert!((g.average_price.unwrap() - mean).abs() < 1e-9);
        }

        let counted = parse_pipeline_json(
            r#"[{"$group": {"_id": "$genre", "n": {"$sum": 1}, "average_price": {"$avg": "$price"}}}]"#,
        )
        .unwrap();
        let groups = run_pipeline(&col, &counted).unwrap();
        let total: i64 = groups.iter().map(|g| g.get_i32("n").map_or_else(|_| g.get_i64("n").unwrap(), i64::from)).sum();
        prop_assert_eq!(total, rows.len() as i64);
        for g in &groups {
            let genre = g.get_str("_id").unwrap();
            let row = avgs.iter().find(|a| a.genre.as_deref() == Some(genre)).unwrap();
            prop_assert_eq!(g.get_f64("average_price").unwrap(), row.average_price.unwrap());
        }
    }
}
