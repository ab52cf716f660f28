//! Tests for `src/resolve/sorter.rs`: activation ordering.

use autoactivate::resolve::{MetadataStore, PrioritySorter, ResolveError};

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

fn sort(list: &[&str], index: &str) -> Result<Vec<String>, ResolveError> {
    let metadata = MetadataStore::parse(index).expect("valid index");
    PrioritySorter::new().sort(ids(list), &metadata)
}

#[test]
fn no_metadata_sorts_alphabetically() {
    let sorted = sort(&["gamma", "alpha", "beta"], "").expect("sorts");
    assert_eq!(sorted, ids(&["alpha", "beta", "gamma"]));
}

#[test]
fn priority_beats_alphabetical_order() {
    let sorted = sort(&["A", "B"], "A.Priority=2\nB.Priority=1").expect("sorts");
    assert_eq!(sorted, ids(&["B", "A"]));
}

#[test]
fn equal_priority_keeps_alphabetical_order() {
    let sorted = sort(&["c", "b", "a"], "a.Priority=5\nb.Priority=5\nc.Priority=5").expect("sorts");
    assert_eq!(sorted, ids(&["a", "b", "c"]));
}

#[test]
fn neutral_priority_sits_between_negative_and_positive() {
    let sorted = sort(&["late", "early", "plain"], "late.Priority=10\nearly.Priority=-10")
        .expect("sorts");
    assert_eq!(sorted, ids(&["early", "plain", "late"]));
}

#[test]
fn priority_and_after_constraint_combine() {
    let index = "A.Priority=0\nB.Priority=0\nC.Priority=-10\nB.After=A";
    let sorted = sort(&["C", "A", "B"], index).expect("sorts");
    assert_eq!(sorted, ids(&["C", "A", "B"]));
}

#[test]
fn after_constraint_overrides_priority() {
    // B would come first by priority but must follow A.
    let sorted = sort(&["A", "B"], "A.Priority=10\nB.Priority=-10\nB.After=A").expect("sorts");
    assert_eq!(sorted, ids(&["A", "B"]));
}

#[test]
fn before_constraint_overrides_alphabetical_order() {
    let sorted = sort(&["a", "b", "z"], "z.Before=a").expect("sorts");
    assert_eq!(sorted, ids(&["b", "z", "a"]));
}

#[test]
fn before_all_and_after_all_move_to_the_ends() {
    let index = "first.BeforeAll=true\nlast.AfterAll=true\nlast.Priority=-100";
    let sorted = sort(&["middle", "last", "first", "another"], index).expect("sorts");
    assert_eq!(sorted, ids(&["first", "another", "middle", "last"]));
}

#[test]
fn several_before_all_modules_keep_relative_order() {
    let index = "b.BeforeAll=true\na.BeforeAll=true";
    let sorted = sort(&["c", "b", "a"], index).expect("sorts");
    assert_eq!(sorted, ids(&["a", "b", "c"]));
}

#[test]
fn mutual_before_is_a_cycle() {
    let err = sort(&["X", "Y"], "X.Before=Y\nY.Before=X").expect_err("cycle");
    match err {
        ResolveError::CyclicOrdering { ids: unresolved } => {
            assert_eq!(unresolved, ids(&["X", "Y"]));
        }
        other => panic!("expected cycle error, got {other}"),
    }
}

#[test]
fn cycle_error_names_only_unplaced_modules() {
    let index = "b.After=c\nc.After=b";
    let err = sort(&["a", "b", "c"], index).expect_err("cycle");
    assert!(matches!(
        err,
        ResolveError::CyclicOrdering { ref ids } if ids == &["b".to_owned(), "c".to_owned()]
    ));
}

#[test]
fn explicit_constraint_against_before_all_is_a_cycle() {
    let index = "first.BeforeAll=true\nother.Before=first";
    assert!(sort(&["first", "other"], index).is_err());
}

#[test]
fn dangling_and_self_references_are_ignored() {
    let index = "a.After=missing,a\nb.Before=gone,b";
    let sorted = sort(&["b", "a"], index).expect("sorts");
    assert_eq!(sorted, ids(&["a", "b"]));
}

#[test]
fn duplicate_ids_collapse() {
    let sorted = sort(&["a", "b", "a"], "").expect("sorts");
    assert_eq!(sorted, ids(&["a", "b"]));
}

#[test]
fn sorting_is_deterministic() {
    let index = "m3.After=m1\nm2.Priority=-1\nm5.Before=m4";
    let input = ["m5", "m4", "m3", "m2", "m1"];
    let first = sort(&input, index).expect("sorts");
    for _ in 0..10 {
        assert_eq!(sort(&input, index).expect("sorts"), first);
    }
}

#[test]
fn empty_input_sorts_to_empty() {
    assert!(sort(&[], "").expect("sorts").is_empty());
}
