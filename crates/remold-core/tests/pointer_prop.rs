//! Property tests for JSON Pointer reads and writes

use proptest::prelude::*;
use remold_core::mapping::pointer;
use serde_json::json;

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(String::from),
        (0usize..5).prop_map(|index| index.to_string()),
    ]
}

proptest! {
    #[test]
    fn set_then_get_round_trips(
        segments in prop::collection::vec(segment(), 1..4),
        number in any::<i64>(),
    ) {
        let pointer_text = format!("/{}", segments.join("/"));
        let mut root = json!({});
        pointer::set(&mut root, &pointer_text, json!(number));
        prop_assert_eq!(pointer::get(&root, &pointer_text), Some(&json!(number)));
    }

    #[test]
    fn get_never_panics_on_arbitrary_pointers(
        pointer_text in "[a-z0-9/~.]{0,24}",
    ) {
        let data = json!({"a": {"b": [1, 2, 3]}, "c": null});
        let _ = pointer::get(&data, &pointer_text);
    }

    #[test]
    fn numeric_leading_segment_infers_an_array(
        index in 0usize..5,
        number in any::<i64>(),
    ) {
        let mut root = json!(null);
        pointer::set(&mut root, &format!("/items/{}", index), json!(number));
        prop_assert!(root["items"].is_array());
        prop_assert_eq!(&root["items"][index], &json!(number));
    }
}
