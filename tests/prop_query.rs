use bookstore::collection::Collection;
use bookstore::document::Document;
use bookstore::index::IndexSpec;
use bookstore::query::{Filter, FindOptions, Order, SortSpec, eval_filter, find_docs};
use bson::{Document as BsonDocument, doc};
use proptest::prelude::*;

const GENRES: [&str; 4] = ["Fiction", "Fantasy", "Romance", "Dystopian"];

fn books() -> impl Strategy<Value = Vec<(usize, i32, i32, bool)>> {
    proptest::collection::vec((0..GENRES.len(), 1800i32..2030, 100i32..5000, any::<bool>()), 0..40)
}

fn load(rows: &[(usize, i32, i32, bool)]) -> Collection {
    let col = Collection::new("books", None);
    for (i, (g, year, cents, in_stock)) in rows.iter().enumerate() {
        let data = doc! {
            "title": format!("Book {i}"),
            "genre": GENRES[*g],
            "published_year": *year,
            "price": f64::from(*cents) / 100.0,
            "in_stock": *in_stock,
        };
        col.insert_document(Document::new(data)).unwrap();
    }
    col
}

fn titles(docs: &[BsonDocument]) -> Vec<String> {
    docs.iter().map(|d| d.get_str("title").unwrap().to_string()).collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        cases: 48,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn find_returns_exactly_the_matching_documents_in_insertion_order(
        rows in books(),
        g in 0..GENRES.len(),
        after in 1800i32..2030,
    ) {
        let col = load(&rows);
        let filter = Filter::all(vec![Filter::eq("genre", GENRES[g]), Filter::gt("published_year", after)]);
        let got = titles(&find_docs(&col, &filter, &FindOptions::default()).to_vec());
        let want: Vec<String> = rows
            .iter()
            .enumerate()
            .filter(|(_, (rg, year, _, _))| *rg == g && *year > after)
            .map(|(i, _)| format!("Book {i}"))
            .collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn indexes_never_change_results(
        rows in books(),
        g in 0..GENRES.len(),
        lo in 1800i32..2030,
        span in 0i32..80,
        in_stock in any::<bool>(),
    ) {
        let col = load(&rows);
        let filters = [
            Filter::eq("genre", GENRES[g]),
            Filter::all(vec![Filter::gte("published_year", lo), Filter::lte("published_year", lo + span)]),
            Filter::all(vec![Filter::eq("in_stock", in_stock), Filter::lt("price", f64::from(lo - 1790))]),
            Filter::Or(vec![Filter::eq("genre", GENRES[g]), Filter::gt("published_year", lo)]),
        ];
        let before: Vec<_> = filters.iter().map(|f| find_docs(&col, f, &FindOptions::default()).to_vec()).collect();
        col.create_index(IndexSpec::single("genre", Order::Asc)).unwrap();
        col.create_index(IndexSpec::single("published_year", Order::Desc)).unwrap();
        col.create_index(IndexSpec::compound(vec![("in_stock".into(), Order::Asc), ("price".into(), Order::Desc)])).unwrap();
        for (f, want) in filters.iter().zip(&before) {
            let got = find_docs(&col, f, &FindOptions::default()).to_vec();
            prop_assert_eq!(&got, want);
            prop_assert!(got.iter().all(|d| eval_filter(d, f)));
        }
    }

    #[test]
    fn pages_partition_the_sorted_result(rows in books(), size in 1usize..7) {
        let col = load(&rows);
        let sort = SortSpec::asc("price");
        let all = find_docs(&col, &Filter::True, &FindOptions::default().sorted_by(sort.clone())).to_vec();
        let mut joined = Vec::new();
        for p in 0..=rows.len() / size {
            let page = find_docs(&col, &Filter::True, &FindOptions::page(p, size).sorted_by(sort.clone())).to_vec();
            prop_assert!(page.len() <= size);
            joined.extend(page);
        }
        prop_assert_eq!(joined, all);
    }

    #[test]
    fn descending_sort_reverses_ascending_for_distinct_keys(
        years in proptest::collection::btree_set(1800i32..2030, 0..30),
    ) {
        let col = Collection::new("books", None);
        let mut shuffled: Vec<i32> = years.iter().copied().collect();
        shuffled.reverse();
        let mid = shuffled.len() / 2;
        shuffled.rotate_left(mid);
        for y in &shuffled {
            col.insert_document(Document::new(doc! {"title": y.to_string(), "published_year": *y})).unwrap();
        }
        let asc = find_docs(&col, &Filter::True, &FindOptions::default().sorted_by(SortSpec::asc("published_year"))).to_vec();
        let mut desc = find_docs(&col, &Filter::True, &FindOptions::default().sorted_by(SortSpec::desc("published_year"))).to_vec();
        desc.reverse();
        prop_assert_eq!(&asc, &desc);
        let ordered: Vec<i32> = asc.iter().map(|d| d.get_i32("published_year").unwrap()).collect();
        prop_assert_eq!(ordered, years.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn sort_keeps_insertion_order_among_equal_keys(rows in books()) {
        let col = load(&rows);
        let docs = find_docs(&col, &Filter::True, &FindOptions::default().sorted_by(SortSpec::desc("genre"))).to_vec();
        for w in docs.windows(2) {
            if w[0].get_str("genre").unwrap() == w[1].get_str("genre").unwrap() {
                let n = |d: &BsonDocument| d.get_str("title").unwrap()[5..].parse::<usize>().unwrap();
                prop_assert!(n(&w[0]) < n(&w[1]));
            }
        }
    }
}
