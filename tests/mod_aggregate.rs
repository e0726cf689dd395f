use bookstore::aggregate::{parse_pipeline_json, reports};
use bookstore::test_support::{BOOKS, seeded_database};
use bson::{Bson, doc};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn average_price_by_genre_is_sorted_descending() {
    let (db, _) = seeded_database().unwrap();
    let rows = reports::average_price_by_genre(&db.collection(BOOKS).unwrap()).unwrap();
    let genres: Vec<&str> = rows.iter().map(|r| r.genre.as_deref().unwrap()).collect();
    assert_eq!(
        genres,
        ["Fantasy", "Adventure", "Dystopian", "Fiction", "Gothic Fiction", "Political Satire", "Romance"]
    );
    assert!(approx(rows[0].average_price.unwrap(), 17.49));
    assert!(approx(rows[2].average_price.unwrap(), 11.245));
    assert!(approx(rows[3].average_price.unwrap(), 10.74));
}

#[test]
fn top_author_tie_goes_to_first_seen() {
    let (db, _) = seeded_database().unwrap();
    let top = reports::top_author_by_count(&db.collection(BOOKS).unwrap()).unwrap().unwrap();
    assert_eq!(top.author.as_deref(), Some("George Orwell"));
    assert_eq!(top.book_count, 2);
}

#[test]
fn top_author_of_empty_collection_is_none() {
    let db = bookstore::Database::open_in_memory();
    let col = db.create_collection(BOOKS).unwrap();
    assert!(reports::top_author_by_count(&col).unwrap().is_none());
    assert!(reports::count_by_decade(&col).unwrap().is_empty());
}

#[test]
fn books_grouped_by_decade() {
    let (db, _) = seeded_database().unwrap();
    let rows = reports::count_by_decade(&db.collection(BOOKS).unwrap()).unwrap();
    let got: Vec<(String, u64)> = rows.into_iter().map(|r| (r.decade.unwrap(), r.book_count)).collect();
    let want: Vec<(String, u64)> = [
        ("1810s", 1),
        ("1840s", 1),
        ("1850s", 1),
        ("1920s", 1),
        ("1930s", 2),
        ("1940s", 2),
        ("1950s", 2),
        ("1960s", 1),
        ("1980s", 1),
    ]
    .iter()
    .map(|(d, n)| ((*d).to_string(), *n))
    .collect();
    assert_eq!(got, want);
    assert_eq!(got.iter().map(|(_, n)| n).sum::<u64>(), 12);
}

#[test]
fn shell_pipeline_matches_typed_report() {
    let (db, _) = seeded_database().unwrap();
    let p = parse_pipeline_json(
        r#"[{"$group": {"_id": "$author", "bookCount": {"$sum": 1}}},
            {"$sort": {"bookCount": -1}},
            {"$limit": 1}]"#,
    )
    .unwrap();
    let rows = db.aggregate(BOOKS, &p).unwrap();
    assert_eq!(rows, vec![doc! {"_id": "George Orwell", "bookCount": 2}]);
}

#[test]
fn decade_pipeline_in_shell_form() {
    let (db, _) = seeded_database().unwrap();
    let p = parse_pipeline_json(
        r#"[{"$project": {"decade": {"$concat": [
                {"$toString": {"$multiply": [{"$floor": {"$divide": ["$published_year", 10]}}, 10]}},
                "s"]}}},
            {"$group": {"_id": "$decade", "count": {"$sum": 1}}},
            {"$sort": {"_id": 1}}]"#,
    )
    .unwrap();
    let rows = db.aggregate(BOOKS, &p).unwrap();
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[4], doc! {"_id": "1930s", "count": 2});
}

#[test]
fn leading_match_filters_before_grouping() {
    let (db, _) = seeded_database().unwrap();
    let p = parse_pipeline_json(
        r#"[{"$match": {"in_stock": true}},
            {"$group": {"_id": null, "n": {"$sum": 1}, "cheapest": {"$min": "$price"}, "dearest": {"$max": "$price"}}}]"#,
    )
    .unwrap();
    let rows = db.aggregate(BOOKS, &p).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_id"), Some(&Bson::Null));
    assert_eq!(rows[0].get_i32("n").unwrap(), 9);
    assert_eq!(rows[0].get_f64("cheapest").unwrap(), 7.99);
    assert_eq!(rows[0].get_f64("dearest").unwrap(), 19.99);
}

#[test]
fn malformed_pipelines_are_rejected() {
    assert!(parse_pipeline_json(r#"{"$group": {}}"#).is_err());
    assert!(parse_pipeline_json(r#"[{"$lookup": {}}]"#).is_err());
    assert!(parse_pipeline_json(r#"[{"$group": {"n": {"$sum": 1}}}]"#).is_err());
    assert!(parse_pipeline_json(r#"[{"$limit": 0}]"#).is_err());
    assert!(parse_pipeline_json(r#"[{"$project": {"title": 1, "price": 0}}]"#).is_err());
}

#[test]
fn divide_by_zero_is_an_error() {
    let (db, _) = seeded_database().unwrap();
    let p = parse_pipeline_json(r#"[{"$project": {"x": {"$divide": ["$price", 0]}}}]"#).unwrap();
    assert!(db.aggregate(BOOKS, &p).is_err());
}
