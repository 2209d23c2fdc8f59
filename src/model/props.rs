use serde_json::{Map, Value};

/// Raw entry properties as they appear in the entries document, key order preserved.
pub type Props = Map<String, Value>;

/// Read a scalar property as a string. Missing keys and `null` read as `""`.
pub fn prop_string(props: &Props, key: &str) -> String {
    match props.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            log::warn!("Ignoring non-scalar value for '{}': {}", key, other);
            String::new()
        }
    }
}

pub fn prop_bool(props: &Props, key: &str) -> bool {
    match props.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Read an array of strings; anything that is not a string is skipped.
pub fn prop_strings(props: &Props, key: &str) -> Vec<String> {
    match props.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    log::warn!("Skipping non-string item in '{}': {}", key, other);
                    None
                }
            })
            .collect(),
        Some(other) => {
            log::warn!("Expected an array for '{}', got {}", key, other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn scalars_are_stringified() {
        let p = props(json!({ "a": "x", "b": 3, "c": true, "d": null }));
        assert_eq!(prop_string(&p, "a"), "x");
        assert_eq!(prop_string(&p, "b"), "3");
        assert_eq!(prop_string(&p, "c"), "true");
        assert_eq!(prop_string(&p, "d"), "");
        assert_eq!(prop_string(&p, "missing"), "");
    }

    #[test]
    fn bools_default_to_false() {
        let p = props(json!({ "yes": true, "text": "true", "num": 1 }));
        assert!(prop_bool(&p, "yes"));
        assert!(prop_bool(&p, "text"));
        assert!(!prop_bool(&p, "num"));
        assert!(!prop_bool(&p, "missing"));
    }
}
