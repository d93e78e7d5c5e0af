use crate::{
    config::EvalConfig,
    error::{ConfigurationError, EvalError},
    eval::Evaluator,
    plan::QueryTree,
    sequence::{Anchor, KeySequence, UnionSequence},
    test_support::{
        array, array_tree, capture_log, doc_index, drain, evaluate_in_context, index_only,
    },
};

#[test]
fn union_merges_interleaved_includes() {
    let mut node = UnionSequence::new(
        vec![array("even", &[2, 4, 6, 8, 10]), array("odd", &[1, 3, 5, 7, 9, 11])],
        Vec::new(),
    );

    assert_eq!(drain(&mut node), (1..=11).collect::<Vec<_>>());
}

#[test]
fn union_collapses_duplicates() {
    let mut node = UnionSequence::new(
        vec![array("a", &[1, 2, 3]), array("b", &[2, 3, 4]), array("c", &[3])],
        Vec::new(),
    );

    assert_eq!(drain(&mut node), vec![1, 2, 3, 4]);
}

#[test]
fn union_peek_is_smallest_outstanding_head() {
    let mut node = UnionSequence::new(vec![array("a", &[5, 9]), array("b", &[3, 7])], Vec::new());
    node.initialize(Anchor::Free).expect("initialize should succeed");

    assert_eq!(node.peek(), Some(&3));
    assert!(node.has_next(None).expect("has_next should succeed"));
    assert_eq!(node.next().expect("next should succeed"), 3);
    assert_eq!(node.peek(), Some(&5));
}

#[test]
fn union_move_to_skips_every_head() {
    let mut node = UnionSequence::new(
        vec![array("a", &[1, 5, 9]), array("b", &[3, 7])],
        Vec::new(),
    );
    node.initialize(Anchor::Free).expect("initialize should succeed");

    assert_eq!(node.move_to(&4, None).expect("move should succeed"), Some(5));
    assert_eq!(
        node.move_to(&5, None).expect("move to the last position should succeed"),
        Some(7)
    );
    assert!(node.has_next(None).expect("has_next should succeed"));
    assert_eq!(node.next().expect("next should succeed"), 9);
    assert!(!node.has_next(None).expect("has_next should succeed"));
}

#[test]
fn negated_union_requires_supplied_context() {
    let mut node = UnionSequence::new(vec![array("a", &[1])], vec![array("b", &[2])]);
    assert!(node.is_context_required());

    let err = node
        .initialize(Anchor::Free)
        .expect_err("negated union cannot enumerate on its own");
    assert!(matches!(
        err,
        EvalError::Configuration(ConfigurationError::UnanchoredUnion { .. })
    ));

    let tree = QueryTree::or_not(vec![array_tree("a", &[1])], vec![array_tree("b", &[2])]);
    let err = Evaluator::from_tree(tree, &EvalConfig::default())
        .next_match()
        .expect_err("driving a negated union without context must fail");
    assert!(matches!(
        err,
        EvalError::Configuration(ConfigurationError::UnanchoredUnion { .. })
    ));
}

#[test]
fn negated_union_membership_follows_de_morgan() {
    // A || !B
    let tree = QueryTree::or_not(vec![array_tree("a", &[1, 2])], vec![array_tree("b", &[2, 3, 4])]);
    assert_eq!(evaluate_in_context(tree, &[1, 2, 3, 4, 5, 6]), vec![1, 2, 5, 6]);

    // !A || !B
    let tree = QueryTree::or_not(
        Vec::new(),
        vec![array_tree("a", &[1, 2, 3]), array_tree("b", &[2, 3, 4])],
    );
    assert_eq!(evaluate_in_context(tree, &[1, 2, 3, 4, 5]), vec![1, 4, 5]);
}

#[test]
fn union_document_merges_every_matching_branch() {
    let index = doc_index(&[("FIELD_A", &["a", "b"]), ("FIELD_B", &["b", "c"])]);
    let tree = QueryTree::or(vec![
        QueryTree::leaf(index_only(&index, "FIELD_A")),
        QueryTree::leaf(index_only(&index, "FIELD_B")),
    ]);

    let matches: Vec<_> = Evaluator::from_tree(tree, &EvalConfig::default())
        .collect::<Result<_, _>>()
        .expect("evaluation should succeed");
    let shape: Vec<(&str, Vec<&str>)> = matches
        .iter()
        .map(|found| (found.key.uid.as_str(), found.document.fields().collect()))
        .collect();

    assert_eq!(
        shape,
        vec![
            ("a", vec!["FIELD_A"]),
            ("b", vec!["FIELD_A", "FIELD_B"]),
            ("c", vec!["FIELD_B"]),
        ]
    );
}

#[test]
fn empty_union_is_a_configuration_error() {
    let mut node = UnionSequence::<u32>::new(Vec::new(), Vec::new());

    let err = node
        .initialize(Anchor::Supplied)
        .expect_err("childless node must be rejected");
    assert!(matches!(
        err,
        EvalError::Configuration(ConfigurationError::EmptyNode { .. })
    ));
}

#[test]
fn negated_branch_admissions_are_traced() {
    // A || !B over contexts 1..=4: 1 from A, 3 and 4 from !B, 2 rejected.
    let mut found = Vec::new();
    let log = capture_log(|| {
        let tree = QueryTree::or_not(vec![array_tree("a", &[1])], vec![array_tree("b", &[2])]);
        found = evaluate_in_context(tree, &[1, 2, 3, 4]);
    });

    assert_eq!(found, vec![1, 3, 4]);
    assert_eq!(
        log.matches("union context admitted by a negated branch").count(),
        2,
        "{log}"
    );
    assert_eq!(log.matches("union context excluded by every branch").count(), 1, "{log}");
}
