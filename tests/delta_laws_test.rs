//! Property tests for the delta algebra.

use delta_sync::delta::attributes::attributes;
use delta_sync::delta::{AttributeMap, Delta, Operation};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Edit {
    Retain(usize, bool),
    Delete(usize),
    Insert(String, bool),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (1usize..4, any::<bool>()).prop_map(|(len, bold)| Edit::Retain(len, bold)),
        (1usize..4).prop_map(Edit::Delete),
        ("[xyz]{1,3}", any::<bool>()).prop_map(|(text, bold)| Edit::Insert(text, bold)),
    ]
}

fn bold(on: bool) -> AttributeMap {
    if on {
        attributes([("bold", true)])
    } else {
        AttributeMap::new()
    }
}

/// A change that fits a document of `base_len` characters.
fn fit(base_len: usize, edits: &[Edit]) -> Delta {
    let mut remaining = base_len;
    let mut delta = Delta::new();
    for edit in edits {
        match edit {
            Edit::Retain(len, on) => {
                let len = (*len).min(remaining);
                delta.push(Operation::retain_with(len, bold(*on)));
                remaining -= len;
            }
            Edit::Delete(len) => {
                let len = (*len).min(remaining);
                delta.push(Operation::delete(len));
                remaining -= len;
            }
            Edit::Insert(text, on) => {
                delta.push(Operation::insert_with(text.clone(), bold(*on)));
            }
        }
    }
    delta.chop()
}

fn document_strategy() -> impl Strategy<Value = Delta> {
    prop::collection::vec(("[abc]{1,4}", any::<bool>()), 0..4).prop_map(|runs| {
        let mut doc = Delta::new();
        for (text, on) in runs {
            doc.push(Operation::insert_with(text, bold(on)));
        }
        doc
    })
}

fn edits() -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(edit_strategy(), 0..6)
}

proptest! {
    #[test]
    fn test_compose_is_associative(doc in document_strategy(), a in edits(), b in edits(), c in edits()) {
        let a = fit(doc.target_len(), &a);
        let b = fit(doc.compose(&a).target_len(), &b);
        let c = fit(doc.compose(&a).compose(&b).target_len(), &c);

        let left = doc.compose(&a.compose(&b)).compose(&c);
        let right = doc.compose(&a).compose(&b.compose(&c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn test_transform_converges(doc in document_strategy(), a in edits(), b in edits()) {
        let a = fit(doc.target_len(), &a);
        let b = fit(doc.target_len(), &b);

        let via_a = doc.compose(&a).compose(&b.transform(&a, false));
        let via_b = doc.compose(&b).compose(&a.transform(&b, true));
        prop_assert_eq!(via_a, via_b);
    }

    #[test]
    fn test_transformed_change_fits(doc in document_strategy(), a in edits(), b in edits()) {
        let a = fit(doc.target_len(), &a);
        let b = fit(doc.target_len(), &b);

        let rebased = b.transform(&a, false);
        prop_assert!(rebased.base_len() <= doc.compose(&a).target_len());
    }

    #[test]
    fn test_invert_restores_document(doc in document_strategy(), a in edits()) {
        let a = fit(doc.target_len(), &a);
        let inverse = a.invert(&doc);
        prop_assert_eq!(doc.compose(&a).compose(&inverse), doc);
    }

    #[test]
    fn test_text_diff_reproduces_target(old in "[ab ]{0,8}", new in "[ab ]{0,8}") {
        let delta = Delta::diff_text(&old, &new);
        prop_assert_eq!(delta.apply(&old), new.clone());
        if old == new {
            prop_assert!(delta.is_empty());
        }
    }

    #[test]
    fn test_document_diff_reproduces_target(old in document_strategy(), new in document_strategy()) {
        let delta = old.diff(&new).unwrap();
        prop_assert_eq!(old.compose(&delta), new);
        prop_assert!(old.diff(&old).unwrap().is_empty());
    }

    #[test]
    fn test_transform_index_is_monotonic(doc in document_strategy(), a in edits(), i in 0usize..12, j in 0usize..12) {
        let a = fit(doc.target_len(), &a);
        let (low, high) = (i.min(j), i.max(j));
        for priority in [false, true] {
            let low_moved = a.transform_index(low, priority);
            let high_moved = a.transform_index(high, priority);
            prop_assert!(low_moved <= high_moved);
        }
    }
}
