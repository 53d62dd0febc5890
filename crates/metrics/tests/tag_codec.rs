//! Round-trip behaviour of the tag codec.
#![allow(missing_docs)]

use optron_metrics::{TagBoard, is_tagged, parse_tagged_metric, tagged_metric_name};
use proptest::prelude::*;

fn tag_value() -> impl Strategy<Value = String> {
    "[a-z0-9_.-]{1,12}"
}

fn base_name() -> impl Strategy<Value = String> {
    "[a-z0-9_.]{0,24}"
}

proptest! {
    #[test]
    fn tagged_names_round_trip(
        values in prop::collection::vec(tag_value(), 0..=5),
        name in base_name(),
    ) {
        let board = TagBoard::try_new(values.clone()).expect("encodable board");
        let tagged = tagged_metric_name(&name, &board);
        prop_assert!(is_tagged(&tagged));

        let (base, parsed) = parse_tagged_metric(&tagged).expect("tagged name");
        prop_assert_eq!(base, name.as_str());
        prop_assert_eq!(parsed.len(), values.len());
        for ((_, decoded), original) in parsed.iter().zip(&values) {
            prop_assert_eq!(decoded, original.as_str());
        }
        prop_assert_eq!(parsed, board);
    }

    #[test]
    fn truncation_keeps_only_the_contiguous_prefix(
        head in prop::collection::vec(tag_value(), 0..=4),
        tail in prop::collection::vec(tag_value(), 0..=4),
    ) {
        let mut values = head.clone();
        values.push(String::new());
        values.extend(tail);
        let board = TagBoard::new(values);
        prop_assert_eq!(board.len(), head.len());
    }
}

#[test]
fn scenario_svc_db_query() {
    let board = TagBoard::new(["svc", "db", "query"]);
    let tagged = tagged_metric_name("latency", &board);
    assert_eq!(tagged, "svc|db|queryTAGlatency");

    let (base, tags) = parse_tagged_metric(&tagged).expect("tagged");
    assert_eq!(base, "latency");
    let pairs: Vec<_> = tags.iter().collect();
    assert_eq!(pairs, [("ns", "svc"), ("grp", "db"), ("tgt", "query")]);
}
