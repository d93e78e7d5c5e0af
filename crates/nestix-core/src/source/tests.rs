use crate::{
    error::ErrorClass,
    key::{DocKey, KeyRange},
    source::{
        CancelFlag, CancellableSource, DatatypeFilter, EntryFilter, FieldIndex, Posting,
        PostingEntry, PostingSource, TimeFilter,
    },
};
use std::ops::Bound;

fn index_of(keys: &[u32]) -> FieldIndex<u32> {
    let mut index = FieldIndex::new();
    for key in keys {
        index.insert_key("FIELD", "value", *key, "PUBLIC", u64::from(*key));
    }

    index
}

fn drain(source: &mut impl PostingSource<u32>) -> Vec<u32> {
    let mut out = Vec::new();
    while let Some(entry) = source.top() {
        out.push(entry.key);
        source.advance().expect("advance should succeed");
    }

    out
}

#[test]
fn cursor_walks_posting_list_in_key_order() {
    let index = index_of(&[9, 1, 5, 3]);
    let mut cursor = index.cursor("FIELD", "value");

    assert_eq!(drain(&mut cursor), vec![1, 3, 5, 9]);
}

#[test]
fn missing_posting_list_is_empty() {
    let index = index_of(&[1]);
    let cursor = index.cursor("OTHER", "value");

    assert!(cursor.top().is_none());
    assert_eq!(index.postings_len("OTHER", "value"), 0);
}

#[test]
fn seek_restricts_cursor_to_range() {
    let index = index_of(&[1, 2, 3, 4, 5, 6]);
    let mut cursor = index.cursor("FIELD", "value");

    cursor
        .seek(&KeyRange::new(Bound::Excluded(2), Bound::Excluded(5)))
        .expect("seek should succeed");

    assert_eq!(drain(&mut cursor), vec![3, 4]);
}

#[test]
fn skip_to_lands_on_first_key_at_or_after_minimum() {
    let index = index_of(&[2, 4, 6, 8]);
    let mut cursor = index.cursor("FIELD", "value");

    cursor.skip_to(&5).expect("skip should succeed");
    assert_eq!(cursor.top().map(|entry| entry.key), Some(6));

    cursor.skip_to(&6).expect("skip to current key should be a no-op");
    assert_eq!(cursor.top().map(|entry| entry.key), Some(6));

    cursor.skip_to(&9).expect("skip past the end should succeed");
    assert!(cursor.top().is_none());
}

#[test]
fn skip_past_range_end_exhausts_cursor() {
    let index = index_of(&[2, 4, 6, 8]);
    let mut cursor = index.cursor("FIELD", "value");
    cursor
        .seek(&KeyRange::new(Bound::Unbounded, Bound::Excluded(6)))
        .expect("seek should succeed");

    cursor.skip_to(&6).expect("skip should succeed");

    assert!(cursor.top().is_none());
}

#[test]
fn cursors_keep_their_snapshot_after_later_inserts() {
    let mut index = index_of(&[1, 2]);
    let mut cursor = index.cursor("FIELD", "value");
    index.insert_key("FIELD", "value", 3, "PUBLIC", 3);

    assert_eq!(drain(&mut cursor), vec![1, 2]);
    assert_eq!(index.postings_len("FIELD", "value"), 3);
}

#[test]
fn cancelled_source_fails_every_reposition() {
    let index = index_of(&[1, 2, 3]);
    let flag = CancelFlag::new();
    let mut source = CancellableSource::new(index.cursor("FIELD", "value"), flag.clone());

    source.advance().expect("advance before cancel should succeed");
    flag.cancel();

    let err = source
        .skip_to(&3)
        .expect_err("skip after cancel must fail");
    assert_eq!(err.class(), ErrorClass::Cancelled);
    assert_eq!(
        source.top().map(|entry| entry.key),
        Some(2),
        "cancellation must not move the wrapped cursor"
    );
}

#[test]
fn time_filter_is_inclusive() {
    let filter = TimeFilter::new(10, 20);
    let entry = |timestamp: u64| PostingEntry {
        key: 1_u32,
        posting: Posting::new("v", "PUBLIC", timestamp),
    };

    assert!(!filter.accept(&entry(9)));
    assert!(filter.accept(&entry(10)));
    assert!(filter.accept(&entry(20)));
    assert!(!filter.accept(&entry(21)));
}

#[test]
fn datatype_filter_matches_key_datatype() {
    let filter = DatatypeFilter::new(["csv"]);
    let entry = |datatype: &str| PostingEntry {
        key: DocKey::new("20240101_0", datatype, "uid"),
        posting: Posting::default(),
    };

    assert!(filter.accept(&entry("csv")));
    assert!(!filter.accept(&entry("json")));
}
