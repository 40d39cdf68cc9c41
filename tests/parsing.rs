use std::fs;
use std::path::PathBuf;

use courtview::frame::parse_frame_json;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_frame_fixture() {
    let raw = read_fixture("frame.json");
    let frame = parse_frame_json(&raw).expect("fixture should parse");
    assert_eq!(frame.id, "412");
    assert!((frame.ts - 1718031622.44).abs() < 1e-6);
    assert_eq!(frame.persons.len(), 2);

    let first = &frame.persons[0];
    assert_eq!(first.id, "7");
    assert_eq!(first.bbox, [812.0, 201.0, 944.0, 556.0]);
    assert!((first.conf - 0.91).abs() < 1e-9);
    assert_eq!(first.color, Some((255, 99, 71)));
    assert_eq!(first.leg, Some((0.42, 1.13)));
    // Nested [[x, y]] form from the perspective transform.
    assert_eq!(first.transformed_leg, Some((0.45, 1.2)));

    let second = &frame.persons[1];
    assert_eq!(second.id, "12");
    assert_eq!(second.color, None);
    assert_eq!(second.transformed_leg, Some((0.5, 1.0)));
}

#[test]
fn missing_persons_means_zero_detections() {
    let raw = read_fixture("frame_missing_persons.json");
    let frame = parse_frame_json(&raw).expect("fixture should parse");
    assert_eq!(frame.id, "413");
    assert!(frame.persons.is_empty());
}

#[test]
fn numeric_ids_become_strings() {
    let frame =
        parse_frame_json(r#"{"id": 99, "ts": 1.5, "persons": [{"id": 3, "bbox": [0,0,1,1], "conf": 0.5}]}"#)
            .expect("numeric ids should parse");
    assert_eq!(frame.id, "99");
    assert_eq!(frame.persons[0].id, "3");
}

#[test]
fn entity_without_id_is_skipped() {
    let frame = parse_frame_json(
        r#"{"id": "1", "ts": 1.0, "persons": [{"bbox": [0,0,1,1], "conf": 0.9}, {"id": "2", "conf": 0.8}]}"#,
    )
    .expect("frame should parse");
    assert_eq!(frame.persons.len(), 1);
    assert_eq!(frame.persons[0].id, "2");
    assert_eq!(frame.persons[0].bbox, [0.0; 4]);
}

#[test]
fn flat_pair_form_is_accepted() {
    let frame = parse_frame_json(
        r#"{"id": "1", "ts": 1.0, "persons": [{"id": "4", "transformed_leg_coordinates": [0.25, 0.75]}]}"#,
    )
    .expect("frame should parse");
    assert_eq!(frame.persons[0].transformed_leg, Some((0.25, 0.75)));
}

#[test]
fn non_object_payloads_are_errors() {
    assert!(parse_frame_json("null").is_err());
    assert!(parse_frame_json("[1, 2, 3]").is_err());
    assert!(parse_frame_json("").is_err());
    assert!(parse_frame_json("not json").is_err());
}
