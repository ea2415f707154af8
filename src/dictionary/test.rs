use itertools::Itertools;
use similar_asserts::assert_eq;

use super::*;

fn sample() -> Dictionary3D<&'static str, i32, &'static str> {
    [("A", 1, "Val1"), ("A", 2, "Val2"), ("B", 1, "Val3")]
        .into_iter()
        .collect()
}

#[test]
fn insert_overwrites_and_try_add_rejects() {
    let mut dict = sample();
    assert_eq!(dict.insert("A", 1, "New"), Some("Val1"));
    assert_eq!(dict.get(&"A", &1), Some(&"New"));

    assert_eq!(
        dict.try_add("A", 2, "Other"),
        Err(DictionaryError::DuplicateKey {
            key1: "\"A\"".into(),
            key2: "2".into(),
        })
    );
    assert!(dict.try_add("C", 2, "Val4").is_ok());
    assert_eq!(dict.len(), 4);
}

#[test]
fn keys_are_ordered_pairs() {
    let mut dict = Dictionary3D::new();
    dict.insert(1, 2, 'x');
    assert!(dict.contains_key(&1, &2));
    assert!(!dict.contains_key(&2, &1));

    let transposed = dict.transpose();
    assert!(transposed.contains_key(&2, &1));
}

#[test]
fn conditional_removal() {
    let mut dict = sample();
    assert!(!dict.remove_entry_if_eq(&"A", &1, &"Wrong"));
    assert!(dict.contains(&"A", &1, &"Val1"));
    assert!(dict.remove_entry_if_eq(&"A", &1, &"Val1"));
    assert_eq!(dict.remove(&"A", &1), None);
    assert_eq!(
        dict.iter().collect_vec(),
        vec![(&"A", &2, &"Val2"), (&"B", &1, &"Val3")]
    );
}

#[test]
fn first_keys_are_distinct_and_follow_removals() {
    let mut dict = sample();
    assert_eq!(dict.first_keys().collect_vec(), vec![&"A", &"B"]);

    dict.remove(&"B", &1);
    assert_eq!(dict.first_keys().collect_vec(), vec![&"A"]);
    assert!(!dict.contains_first_key(&"B"));
}

#[test]
fn rows() {
    let mut dict = sample();
    let row = dict.row(&"A").unwrap();
    assert_eq!(row.len(), 2);
    assert_eq!(row[&1], "Val1");
    assert_eq!(row[&2], "Val2");
    assert!(dict.row(&"Missing").is_none());

    assert_eq!(dict.remove_row(&"A"), 2);
    assert_eq!(dict.remove_row(&"A"), 0);
    assert_eq!(dict.len(), 1);
}

#[test]
fn adding_a_row_is_atomic() {
    let mut dict = sample();
    assert!(dict.try_add_row("B", [(2, "x"), (1, "y")]).is_err());
    assert!(dict.try_add_row("C", [(5, "x"), (5, "y")]).is_err());
    assert_eq!(dict.len(), 3);

    dict.try_add_row("C", [(5, "x"), (6, "y")]).unwrap();
    assert_eq!(
        dict.keys().skip(3).collect_vec(),
        vec![(&"C", &5), (&"C", &6)]
    );
}

#[test]
fn round_trips_through_iteration() {
    let dict = sample();
    let triples = dict.clone().into_iter().collect_vec();
    assert_eq!(triples.len(), 3);
    let rebuilt: Dictionary3D<_, _, _> = triples.into_iter().collect();
    assert_eq!(rebuilt, dict);
}
