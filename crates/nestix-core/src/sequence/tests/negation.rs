use crate::{
    sequence::{NegationFilter, SequenceMetrics},
    test_support::{array, capture_log, counted},
};

fn filter_of(excludes: &[&[u32]]) -> NegationFilter<u32> {
    let mut filter = NegationFilter::new(
        excludes
            .iter()
            .enumerate()
            .map(|(i, keys)| array(&format!("x{i}"), keys))
            .collect(),
    );
    filter.initialize().expect("initialize should succeed");

    filter
}

#[test]
fn candidate_is_excluded_when_any_exclude_contains_it() {
    let mut filter = filter_of(&[&[2, 4, 6], &[3, 6]]);

    let excluded: Vec<u32> = (1..=7)
        .filter(|candidate| filter.is_excluded(candidate).expect("probe should succeed"))
        .collect();

    assert_eq!(excluded, vec![2, 3, 4, 6]);
}

#[test]
fn candidate_is_excluded_by_all_only_when_every_exclude_contains_it() {
    let mut filter = filter_of(&[&[2, 4, 6], &[3, 6]]);

    let excluded: Vec<u32> = (1..=7)
        .filter(|candidate| {
            filter
                .is_excluded_by_all(candidate)
                .expect("probe should succeed")
        })
        .collect();

    assert_eq!(excluded, vec![6]);
}

#[test]
fn exhausted_exclude_breaks_unanimity() {
    let mut filter = filter_of(&[&[1], &[1, 5]]);

    assert!(filter.is_excluded_by_all(&1).expect("probe should succeed"));
    assert!(
        !filter.is_excluded_by_all(&5).expect("probe should succeed"),
        "an exhausted exclude cannot contain later candidates"
    );
    assert!(filter.is_excluded(&5).expect("probe should succeed"));
    assert_eq!(filter.len(), 2, "exhausted excludes stay owned by the filter");
}

#[test]
fn excludes_advance_by_skipping_only() {
    let metrics = SequenceMetrics::new();
    let keys: Vec<u32> = (1..=100).collect();
    let mut filter = NegationFilter::new(vec![counted("x", &keys, &metrics)]);
    filter.initialize().expect("initialize should succeed");

    assert!(filter.is_excluded(&50).expect("probe should succeed"));
    assert!(filter.is_excluded(&50).expect("repeated probe should succeed"));
    assert!(filter.is_excluded(&90).expect("probe should succeed"));

    let report = metrics.report();
    assert_eq!(report.next, 0);
    assert_eq!(report.move_to, 2, "the repeated candidate must not move the exclude");
}

#[test]
fn prime_positions_excludes_on_their_first_key() {
    let mut filter = filter_of(&[&[4, 8]]);
    filter.prime().expect("prime should succeed");

    assert!(!filter.is_excluded(&3).expect("probe should succeed"));
    assert!(filter.is_excluded(&4).expect("probe should succeed"));
    assert!(filter.is_excluded(&8).expect("probe should succeed"));
    assert!(!filter.is_excluded(&9).expect("probe should succeed"));
}

#[test]
fn empty_filter_excludes_nothing() {
    let mut filter = filter_of(&[]);

    assert!(filter.is_empty());
    assert!(!filter.is_excluded(&1).expect("probe should succeed"));
    assert!(!filter.is_excluded_by_all(&1).expect("probe should succeed"));
}

#[test]
fn exclusion_hits_are_traced() {
    let mut filter = filter_of(&[&[2, 4]]);

    let log = capture_log(|| {
        assert!(!filter.is_excluded(&1).expect("probe should succeed"));
        assert!(filter.is_excluded(&4).expect("probe should succeed"));
    });

    assert_eq!(log.matches("candidate excluded by negation filter").count(), 1, "{log}");
    assert!(log.contains("candidate=4"), "{log}");
}
