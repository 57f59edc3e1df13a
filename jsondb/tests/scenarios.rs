use jsondb::document::from_value;
use jsondb::{Document, FieldSpec, FieldType, Query, Schema, Store, StoreConfig, KEY_FIELD};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn doc(value: Value) -> Document {
    from_value(value).unwrap()
}

fn category_store(tmp: &TempDir) -> Store {
    let mut store = Store::open(tmp.path().join("store.json"), Schema::new()).unwrap();
    store.insert(doc(json!({"_id": "1", "category": "A"}))).unwrap();
    store.insert(doc(json!({"_id": "2", "category": "B"}))).unwrap();
    store.create_index("category").unwrap();
    store
}

#[test]
fn test_category_scenario() {
    let tmp = TempDir::new().unwrap();
    let mut store = category_store(&tmp);

    assert_eq!(store.find(&Query::new().eq("category", "A")).unwrap(), vec!["1"]);
    assert_eq!(
        store.find_documents(&Query::new().eq("category", "A")).unwrap(),
        vec![doc(json!({"_id": "1", "category": "A"}))]
    );

    let changed = store
        .update(&Query::new().eq("category", "A"), doc(json!({"category": "C"})))
        .unwrap();
    assert_eq!(changed, 1);
    assert!(store.find(&Query::new().eq("category", "A")).unwrap().is_empty());
    assert_eq!(store.find(&Query::new().eq("category", "C")).unwrap(), vec!["1"]);

    assert_eq!(store.remove(&Query::new().eq("category", "B")).unwrap(), 1);
    let all = store.get_all().unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["1"]);
    assert!(store.find(&Query::new().eq("category", "B")).unwrap().is_empty());
}

#[test]
fn test_insert_then_find_one_returns_same_document() {
    let tmp = TempDir::new().unwrap();
    let mut store = Store::open(tmp.path().join("store.json"), Schema::new()).unwrap();

    let docs = [
        json!({"_id": "a", "n": 1, "nested": {"deep": [1, 2, {"x": null}]}}),
        json!({"_id": "b", "flag": false, "text": "ünïcödé"}),
        json!({"_id": "c"}),
    ];
    for value in docs {
        let original = doc(value);
        let key = store.insert(original.clone()).unwrap();
        let found = store.find_one(&Query::by_key(&key)).unwrap().unwrap();
        assert_eq!(found, original);
    }
}

#[test]
fn test_update_overrides_only_given_fields() {
    let tmp = TempDir::new().unwrap();
    let mut store = Store::open(tmp.path().join("store.json"), Schema::new()).unwrap();
    store
        .insert(doc(json!({"_id": "u", "name": "Ada", "role": "eng", "level": 3})))
        .unwrap();

    let before = store.find_one(&Query::by_key("u")).unwrap().unwrap();
    let updates = doc(json!({"role": "lead", "team": "core"}));
    store.update(&Query::by_key("u"), updates.clone()).unwrap();
    let after = store.find_one(&Query::by_key("u")).unwrap().unwrap();

    let mut expected = before;
    for (field, value) in updates {
        expected.insert(field, value);
    }
    assert_eq!(after, expected);
}

#[test]
fn test_removed_documents_are_gone_everywhere() {
    let tmp = TempDir::new().unwrap();
    let mut store = Store::open(tmp.path().join("store.json"), Schema::new()).unwrap();
    store.create_index("kind").unwrap();
    for (id, kind) in [("1", "x"), ("2", "y"), ("3", "x"), ("4", "z")] {
        store.insert(doc(json!({"_id": id, "kind": kind}))).unwrap();
    }

    let removed = store.remove(&Query::new().one_of("kind", ["x", "z"])).unwrap();
    assert_eq!(removed, 3);

    for id in ["1", "3", "4"] {
        assert!(store.find_one(&Query::by_key(id)).unwrap().is_none());
        assert!(!store.get_all().unwrap().contains_key(id));
    }
    assert!(store.find(&Query::new().eq("kind", "x")).unwrap().is_empty());
    assert_eq!(store.find(&Query::new()).unwrap(), vec!["2"]);
}

#[test]
fn test_index_matches_scan_after_every_mutation() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let mut indexed = Store::open(&path, Schema::new()).unwrap();
    indexed.insert(doc(json!({"_id": "1", "color": "red"}))).unwrap();
    indexed.create_index("color").unwrap();

    indexed.insert(doc(json!({"_id": "2", "color": "red"}))).unwrap();
    indexed.insert(doc(json!({"_id": "3", "color": "blue"}))).unwrap();
    indexed.insert(doc(json!({"_id": "4"}))).unwrap();
    indexed
        .update(&Query::by_key("1"), doc(json!({"color": "green"})))
        .unwrap();
    indexed
        .update(&Query::by_key("4"), doc(json!({"color": "red"})))
        .unwrap();
    indexed.remove(&Query::by_key("2")).unwrap();

    // A fresh instance over the same file has no indexes and scans.
    let mut scanned = Store::open(&path, Schema::new()).unwrap();
    for color in ["red", "green", "blue", "purple"] {
        let q = Query::new().eq("color", color);
        assert_eq!(
            indexed.find(&q).unwrap(),
            scanned.find(&q).unwrap(),
            "index and scan disagree for {color}"
        );
    }
    assert_eq!(indexed.find(&Query::new().eq("color", "red")).unwrap(), vec!["4"]);
}

#[test]
fn test_multi_index_query_requires_all_fields() {
    let tmp = TempDir::new().unwrap();
    let mut store = Store::with_config(
        tmp.path().join("store.json"),
        Schema::new(),
        StoreConfig::default().with_index("a").with_index("b"),
    )
    .unwrap();
    store.insert(doc(json!({"_id": "1", "a": 1, "b": 2}))).unwrap();
    store.insert(doc(json!({"_id": "2", "a": 1, "b": 3}))).unwrap();
    store.insert(doc(json!({"_id": "3", "a": 0, "b": 2}))).unwrap();

    assert_eq!(store.find(&Query::new().eq("a", 1).eq("b", 2)).unwrap(), vec!["1"]);
    assert_eq!(
        store.find(&Query::new().eq("a", 1).eq("c", 2)).unwrap(),
        Vec::<String>::new()
    );
}

#[test]
fn test_round_trip_across_instances() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("store.json");

    let mut first = Store::open(&path, Schema::new()).unwrap();
    first.insert(doc(json!({"_id": "z", "v": [1, 2.5, "three"]}))).unwrap();
    first.insert(doc(json!({"_id": "a", "v": {"k": true}}))).unwrap();
    let saved = first.get_all().unwrap();

    let mut second = Store::open(&path, Schema::new()).unwrap();
    let loaded = second.get_all().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["z", "a"]);
}

#[test]
fn test_create_index_twice_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let mut store = category_store(&tmp);
    let before = store.find(&Query::new().one_of("category", ["A", "B"])).unwrap();
    store.create_index("category").unwrap();
    let after = store.find(&Query::new().one_of("category", ["A", "B"])).unwrap();
    assert_eq!(before, after);
    assert_eq!(store.indexed_fields().unwrap(), vec!["category"]);
}

#[test]
fn test_schema_gates_every_write_path() {
    let tmp = TempDir::new().unwrap();
    let schema = Schema::new()
        .field("title", FieldSpec::new(FieldType::String).required())
        .field(
            "stars",
            FieldSpec::new(FieldType::Integer).validate_with(|v| v.as_i64().map(|n| (1..=5).contains(&n)).unwrap_or(false)),
        );
    let mut store = Store::open(tmp.path().join("store.json"), schema).unwrap();

    let key = store.insert(doc(json!({"title": "Dune", "stars": 5}))).unwrap();
    assert!(store.insert(doc(json!({"stars": 4}))).is_err());
    assert!(store.insert(doc(json!({"title": "X", "stars": 9}))).is_err());
    assert!(store
        .update(&Query::by_key(&key), doc(json!({"stars": 0})))
        .is_err());
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.get(&key).unwrap().unwrap()["stars"], json!(5));
}

#[test]
fn test_auto_increment_is_advisory() {
    let tmp = TempDir::new().unwrap();
    let mut store = Store::open(tmp.path().join("store.json"), Schema::new()).unwrap();
    assert_eq!(store.auto_increment_id().unwrap(), 1);

    let next = store.auto_increment_id().unwrap();
    store.insert(doc(json!({"_id": next.to_string(), "v": 1}))).unwrap();
    store.insert(doc(json!({"_id": "note", "v": 2}))).unwrap();
    assert_eq!(store.auto_increment_id().unwrap(), 2);

    let generated = store.insert(doc(json!({"v": 3}))).unwrap();
    assert_ne!(generated, "2");
    assert_eq!(store.get(&generated).unwrap().unwrap()[KEY_FIELD], json!(generated));
}

#[test]
fn test_instances_do_not_share_state() {
    let tmp = TempDir::new().unwrap();
    let mut left = Store::open(tmp.path().join("left.json"), Schema::new()).unwrap();
    let mut right = Store::open(tmp.path().join("right.json"), Schema::new()).unwrap();

    left.insert(doc(json!({"_id": "only-left"}))).unwrap();
    left.create_index("_id").unwrap();

    assert!(right.is_empty().unwrap());
    assert!(right.indexed_fields().unwrap().is_empty());
}
