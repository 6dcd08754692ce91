//! Edge case tests for the delta algebra and the document projector.
//!
//! These tests cover malformed wire input, out-of-range operations, unicode, and
//! overlapping concurrent edits.

use delta_sync::cursor::{CursorPosition, transform_index};
use delta_sync::delta::attributes::attributes;
use delta_sync::delta::{AttributeValue, Delta, Operation};
use delta_sync::document::{Block, DefaultSchema, DocumentProjector, RichText};
use delta_sync::sequencer::Sequencer;
use delta_sync::sync::{Author, Revision};

#[test]
fn test_malformed_wire_operations() {
    let rejected = [
        r#"[{"insert": "a", "delete": 1}]"#,
        r#"[{"retain": -2}]"#,
        r#"[{"delete": -1}]"#,
        r#"[{"delete": 2, "attributes": {"bold": true}}]"#,
        r#"[{}]"#,
        r#"[{"insert": 5}]"#,
    ];
    for json in rejected {
        assert!(
            serde_json::from_str::<Delta>(json).is_err(),
            "accepted malformed delta {json}"
        );
    }
}

#[test]
fn test_wire_input_is_normalized() {
    let delta: Delta = serde_json::from_str(
        r#"[{"retain": 0}, {"insert": "a"}, {"insert": "b"}, {"delete": 1}, {"delete": 2}, {"retain": 4}]"#,
    )
    .unwrap();
    assert_eq!(delta, Delta::new().insert("ab").delete(3).retain(4));
}

#[test]
fn test_out_of_range_operations_are_clamped() {
    let delta = Delta::new().retain(2).delete(50).insert("!");
    assert_eq!(delta.apply("abcdef"), "ab!");

    let delta = Delta::new().retain(100).insert("tail");
    assert_eq!(delta.apply("abc"), "abctail");

    let projector = DocumentProjector::new(DefaultSchema);
    let mut doc: RichText<Block> = RichText::from_text("abc");
    projector.apply(&mut doc, &Delta::new().retain(10).delete(3).insert("?"));
    assert_eq!(doc.text(), "abc?");
}

#[test]
fn test_cursor_never_goes_negative() {
    let delete_all = Delta::new().delete(10);
    assert_eq!(transform_index(7, &delete_all, false), 0);

    let cursor = CursorPosition::new(8, 3).transform(&Delta::new().retain(1).delete(9), false);
    assert_eq!(cursor, CursorPosition::collapsed(1));
}

#[test]
fn test_unicode_lengths_count_characters() {
    let delta = Delta::new().insert("héllo 👋");
    assert_eq!(delta.target_len(), 7);

    let change = Delta::diff_text("héllo 👋", "héllo 👋🌍");
    assert_eq!(change, Delta::new().retain(7).insert("🌍"));
    assert_eq!(change.apply("héllo 👋"), "héllo 👋🌍");

    let sliced = Delta::new().insert("日本語テキスト").slice(2, 4);
    assert_eq!(sliced, Delta::new().insert("語テ"));
}

#[test]
fn test_control_characters_survive_round_trip() {
    let delta = Delta::new().insert("a\u{0}b\tc\n");
    let json = serde_json::to_string(&delta).unwrap();
    let decoded: Delta = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, delta);
}

#[test]
fn test_insert_inside_concurrent_delete_is_dropped() {
    // A deletes "hello" and types "hi"; B types "!" after "he".
    let a = Delta::new().delete(5).insert("hi");
    let b = Delta::new().retain(2).insert("!");

    assert!(b.transform(&a, false).is_empty());
    assert_eq!(a.transform(&b, true), Delta::new().insert("hi").delete(6));

    let base = Delta::new().insert("hello");
    let via_a = base.compose(&a).compose(&b.transform(&a, false));
    let via_b = base.compose(&b).compose(&a.transform(&b, true));
    assert_eq!(via_a, via_b);
    assert_eq!(via_a.document_text().unwrap(), "hi");
}

#[test]
fn test_overlapping_deletes_do_not_double_delete() {
    let base = Delta::new().insert("abcdef");
    let a = Delta::new().retain(1).delete(3);
    let b = Delta::new().retain(2).delete(3);

    let via_a = base.compose(&a).compose(&b.transform(&a, false));
    let via_b = base.compose(&b).compose(&a.transform(&b, true));
    assert_eq!(via_a.document_text().unwrap(), "af");
    assert_eq!(via_a, via_b);
}

#[test]
fn test_empty_deltas() {
    let empty = Delta::new();
    let doc = Delta::new().insert("x");

    assert_eq!(doc.compose(&empty), doc);
    assert_eq!(empty.compose(&doc), doc);
    assert!(empty.transform(&doc, true).is_empty());
    assert_eq!(doc.transform(&empty, false), doc);
    assert_eq!(empty.apply("abc"), "abc");
    assert!(empty.invert(&doc).is_empty());
}

#[test]
fn test_formatting_removal_on_wire() {
    let delta: Delta =
        serde_json::from_str(r#"[{"retain": 3, "attributes": {"bold": null}}]"#).unwrap();
    assert_eq!(
        delta.ops(),
        &[Operation::retain_with(
            3,
            attributes([("bold", AttributeValue::Null)])
        )]
    );

    let bold = Delta::new().insert_with("abc", attributes([("bold", true)]));
    assert_eq!(bold.compose(&delta), Delta::new().insert("abc"));
}

#[test]
fn test_sequencer_rebases_stale_change_over_many_commits() {
    let sequencer = Sequencer::with_document(Delta::new().insert("0")).unwrap();
    let author = Author::new("ana", "Ana");
    for revision in 0..20 {
        sequencer
            .submit(Delta::new().insert("+"), Revision(revision), &author)
            .unwrap();
    }

    let late = Author::new("bo", "Bo");
    let committed = sequencer
        .submit(Delta::new().retain(1).insert("!"), Revision(0), &late)
        .unwrap();
    assert_eq!(committed.revision, Revision(21));
    assert_eq!(sequencer.text(), format!("{}0!", "+".repeat(20)));
}
