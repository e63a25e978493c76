use serde::{Deserialize, Serialize};
use serde_json::json;
use tuner_utils::*;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Series {
    name: String,
    values: Vec<f64>,
}

#[test]
fn test_jsonify_sorts_keys() {
    let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
    assert_eq!(jsonify(&value).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
}

#[test]
fn test_compress_obj_then_decompress() {
    let series = Series {
        name: "lr".to_string(),
        values: vec![0.5, 0.25],
    };
    let compressed = compress_obj(&series).unwrap();
    let restored: Series = decompress_obj(&compressed).unwrap();
    assert_eq!(restored, series);
}

#[test]
fn test_load_json_arg_inline() {
    let series: Series = load_json_arg(r#"{"name": "mu", "values": [0.0]}"#).unwrap();
    assert_eq!(series.name, "mu");
    assert!(load_json_arg::<Series>("not json").is_err());
    assert!(load_json_arg::<Series>("/does/not/exist.json").is_err());
}
