use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::common::Vars;

/// `{{name}}` or `{{name.path.to.key}}`
static TEMPLATE_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+)((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}"));

/// Resolve `{{var}}` placeholders against session variables.
///
/// A dotted path parses the variable as JSON and walks into it. Placeholders
/// that do not resolve render as the empty string.
pub fn resolve_template(
    vars: &Vars,
    template: &str,
) -> String {
    let Ok(re) = TEMPLATE_RE.as_ref() else {
        return template.to_string();
    };
    if !template.contains("{{") {
        return template.to_string();
    }

    re.replace_all(template, |caps: &Captures| {
        let path = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        lookup(vars, &caps[1], path).unwrap_or_default()
    })
    .into_owned()
}

fn lookup(
    vars: &Vars,
    name: &str,
    path: &str,
) -> Option<String> {
    let raw = vars.get(name)?;
    if path.is_empty() {
        return Some(raw.to_string());
    }

    let mut current: Value = serde_json::from_str(raw).ok()?;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Object(mut obj) => obj.remove(key)?,
            Value::Array(mut arr) => {
                let idx = key.parse::<usize>().ok()?;
                if idx >= arr.len() {
                    return None;
                }
                arr.swap_remove(idx)
            }
            _ => return None,
        };
    }

    Some(match current {
        Value::String(s) => s,
        Value::Null => String::new(),
        v => v.to_string(),
    })
}

/// Resolve template variables in a JSON Value recursively
pub fn resolve_json_value(
    vars: &Vars,
    value: &Value,
) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_template(vars, s)),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| resolve_json_value(vars, v)).collect()),
        Value::Object(obj) => Value::Object(obj.iter().map(|(k, v)| (k.clone(), resolve_json_value(vars, v))).collect()),
        _ => value.clone(),
    }
}
