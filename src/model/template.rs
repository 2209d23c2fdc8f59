use super::props::{prop_string, Props};

/// Replace every `${name}` token whose name is listed in `vars` with the
/// stringified value of `name` in `values` (missing values become `""`).
///
/// Tokens naming anything else, and an unterminated `${`, are kept verbatim.
pub fn substitute(text: &str, vars: &[String], values: &Props) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        if vars.iter().any(|v| v == name) {
            out.push_str(&prop_string(values, name));
        } else {
            out.push_str(&rest[start..start + 2 + end + 1]);
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn values(v: serde_json::Value) -> Props {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn replaces_declared_vars() {
        let out = substitute(
            "tmux new -d -s ${session} ${command}",
            &vars(&["session", "command"]),
            &values(json!({ "session": "dev", "command": "htop" })),
        );
        assert_eq!(out, "tmux new -d -s dev htop");
    }

    #[test]
    fn missing_value_becomes_empty() {
        let out = substitute("echo [${unit}]", &vars(&["unit"]), &values(json!({})));
        assert_eq!(out, "echo []");
    }

    #[test]
    fn numbers_are_stringified() {
        let out = substitute("port ${port}", &vars(&["port"]), &values(json!({ "port": 8080 })));
        assert_eq!(out, "port 8080");
    }

    #[test]
    fn undeclared_and_unterminated_tokens_stay_literal() {
        let v = values(json!({ "unit": "foo", "HOME": "/root" }));
        assert_eq!(
            substitute("${unit} in ${HOME}", &vars(&["unit"]), &v),
            "foo in ${HOME}"
        );
        assert_eq!(substitute("echo ${unit", &vars(&["unit"]), &v), "echo ${unit");
    }
}
