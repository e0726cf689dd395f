use bookstore::Database;
use bookstore::errors::DbError;
use bookstore::query::{Filter, FindOptions, UpdateDoc, UpdateReport, parse_update_json};
use bookstore::test_support::{BOOKS, seeded_database};
use bson::{Document as BsonDocument, doc};

fn snapshot(db: &Database) -> Vec<BsonDocument> {
    db.find(BOOKS, &Filter::True, &FindOptions::default()).unwrap().to_vec()
}

#[test]
fn update_one_sets_the_price() {
    let (db, ids) = seeded_database().unwrap();
    let r = db
        .update_one(BOOKS, &Filter::eq("title", "The Alchemist"), &UpdateDoc::set("price", 15.99))
        .unwrap();
    assert_eq!(r, UpdateReport { matched: 1, modified: 1 });
    let doc = db.find_by_id(BOOKS, &ids[9]).unwrap().unwrap();
    assert_eq!(doc.get_f64("price").unwrap(), 15.99);
    assert_eq!(doc.get_str("author").unwrap(), "Paulo Coelho");
}

#[test]
fn update_with_no_match_is_not_an_error() {
    let (db, _) = seeded_database().unwrap();
    let before = snapshot(&db);
    let r = db.update_one(BOOKS, &Filter::eq("title", "Missing"), &UpdateDoc::set("price", 1.0)).unwrap();
    assert_eq!(r, UpdateReport { matched: 0, modified: 0 });
    assert_eq!(snapshot(&db), before);
}

#[test]
fn update_to_same_value_matches_without_modifying() {
    let (db, _) = seeded_database().unwrap();
    let r = db.update_one(BOOKS, &Filter::eq("title", "1984"), &UpdateDoc::set("price", 10.99)).unwrap();
    assert_eq!(r, UpdateReport { matched: 1, modified: 0 });
}

#[test]
fn update_one_affects_only_the_first_inserted_match() {
    let (db, ids) = seeded_database().unwrap();
    db.update_one(BOOKS, &Filter::eq("author", "George Orwell"), &UpdateDoc::set("in_stock", false))
        .unwrap();
    let first = db.find_by_id(BOOKS, &ids[1]).unwrap().unwrap();
    assert!(!first.get_bool("in_stock").unwrap());
    assert_eq!(db.count(BOOKS, &Filter::eq("in_stock", false)).unwrap(), 4);
}

#[test]
fn update_keeps_insertion_position() {
    let (db, _) = seeded_database().unwrap();
    db.update_one(BOOKS, &Filter::eq("title", "To Kill a Mockingbird"), &UpdateDoc::set("price", 1.0))
        .unwrap();
    let all = db.find(BOOKS, &Filter::True, &FindOptions::default()).unwrap().to_vec();
    assert_eq!(all[0].get_str("title").unwrap(), "To Kill a Mockingbird");
}

#[test]
fn inc_and_unset_from_json() {
    let (db, ids) = seeded_database().unwrap();
    let upd = parse_update_json(r#"{"$inc": {"pages": 10}, "$unset": {"in_stock": ""}}"#).unwrap();
    db.update_one(BOOKS, &Filter::eq("title", "1984"), &upd).unwrap();
    let doc = db.find_by_id(BOOKS, &ids[1]).unwrap().unwrap();
    assert_eq!(doc.get_i32("pages").unwrap(), 338);
    assert!(doc.get("in_stock").is_none());
}

#[test]
fn invalid_updates_are_rejected() {
    let (db, _) = seeded_database().unwrap();
    assert!(parse_update_json(r#"{"price": 3}"#).is_err());
    assert!(parse_update_json(r#"{"$set": {"_id": "x"}}"#).is_err());
    assert!(parse_update_json(r#"{"$push": {"tags": "x"}}"#).is_err());
    let inc_title = UpdateDoc { inc: vec![("title".into(), 1.0)], ..UpdateDoc::default() };
    let err = db.update_one(BOOKS, &Filter::eq("title", "1984"), &inc_title).unwrap_err();
    assert!(matches!(err, DbError::QueryError(_)));
    assert!(db.update_one(BOOKS, &Filter::True, &UpdateDoc::default()).is_err());
}

#[test]
fn delete_one_removes_the_first_match_only() {
    let (db, ids) = seeded_database().unwrap();
    assert_eq!(db.delete_one(BOOKS, &Filter::eq("title", "Moby Dick")).unwrap().deleted, 1);
    assert_eq!(db.count(BOOKS, &Filter::True).unwrap(), 11);
    assert!(db.find_by_id(BOOKS, &ids[10]).unwrap().is_none());

    assert_eq!(db.delete_one(BOOKS, &Filter::eq("author", "J.R.R. Tolkien")).unwrap().deleted, 1);
    assert!(db.find_by_id(BOOKS, &ids[4]).unwrap().is_none());
    assert!(db.find_by_id(BOOKS, &ids[7]).unwrap().is_some());
}

#[test]
fn delete_with_no_match_reports_zero() {
    let (db, _) = seeded_database().unwrap();
    let before = snapshot(&db);
    assert_eq!(db.delete_one(BOOKS, &Filter::eq("title", "Moby Dick II")).unwrap().deleted, 0);
    assert_eq!(db.count(BOOKS, &Filter::True).unwrap(), 12);
    assert_eq!(snapshot(&db), before);
}

#[test]
fn nested_set_creates_subdocument() {
    let (db, ids) = seeded_database().unwrap();
    let upd = parse_update_json(r#"{"$set": {"ratings.goodreads": 4.2}}"#).unwrap();
    db.update_one(BOOKS, &Filter::eq("title", "To Kill a Mockingbird"), &upd).unwrap();
    let doc = db.find_by_id(BOOKS, &ids[0]).unwrap().unwrap();
    assert_eq!(doc.get_document("ratings").unwrap(), &doc! {"goodreads": 4.2});
    assert_eq!(db.count(BOOKS, &Filter::gt("ratings.goodreads", 4)).unwrap(), 1);
}

#[test]
fn set_through_a_scalar_field_is_rejected() {
    let (db, _) = seeded_database().unwrap();
    let before = snapshot(&db);
    let upd = parse_update_json(r#"{"$set": {"title.x": 1}}"#).unwrap();
    let err = db.update_one(BOOKS, &Filter::eq("title", "1984"), &upd).unwrap_err();
    assert!(matches!(err, DbError::QueryError(_)));
    let inc = parse_update_json(r#"{"$inc": {"author.count": 1}}"#).unwrap();
    assert!(db.update_one(BOOKS, &Filter::eq("title", "1984"), &inc).is_err());
    assert_eq!(snapshot(&db), before);
}
