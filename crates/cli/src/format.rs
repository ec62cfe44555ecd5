use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::BTreeSet;

const INDENT: &[u8] = b"    ";

/// Sort and deduplicate every array that holds only strings, at any depth.
///
/// Object keys need no work: `serde_json::Map` is ordered.
pub fn normalize(value: &mut Value) {
    match value {
        Value::Array(items) => {
            if items.iter().all(Value::is_string) {
                let unique: BTreeSet<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
                *items = unique.into_iter().map(Value::String).collect();
            } else {
                items.iter_mut().for_each(normalize);
            }
        }
        Value::Object(map) => map.values_mut().for_each(normalize),
        _ => {}
    }
}

/// JSON text with four-space indentation and a trailing newline.
pub fn to_pretty<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value
        .serialize(&mut ser)
        .context("Failed to serialize JSON")?;
    buf.push(b'\n');
    String::from_utf8(buf).context("Serialized JSON is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn string_arrays_are_sorted_and_unique() {
        let mut doc = json!({
            "T2": {"provides": ["b", "a", "b"], "requires": []},
            "T1": {"conditional_provides": {"x": ["z", "y"]}, "children": {}}
        });
        normalize(&mut doc);
        assert_eq!(
            doc,
            json!({
                "T1": {"conditional_provides": {"x": ["y", "z"]}, "children": {}},
                "T2": {"provides": ["a", "b"], "requires": []}
            })
        );
    }

    #[test]
    fn mixed_arrays_keep_their_order() {
        let mut doc = json!([3, "b", "a"]);
        normalize(&mut doc);
        assert_eq!(doc, json!([3, "b", "a"]));
    }

    #[test]
    fn pretty_output_uses_four_spaces() {
        let text = to_pretty(&json!({"b": ["x"], "a": 1})).unwrap();
        assert_eq!(text, "{\n    \"a\": 1,\n    \"b\": [\n        \"x\"\n    ]\n}\n");
    }
}
