//! Mustache-style placeholder substitution.
//!
//! `{{path}}` inserts the HTML-escaped value at `path`, `{{{path}}}` inserts it
//! verbatim. Paths are dotted lookups into a JSON document; array elements are
//! addressed by index (`items.0.name`). Unknown paths render as nothing.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

// Raw form first so `{{{x}}}` is never read as `{` + `{{x}}` + `}`.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\{\s*([\w.$-]+)\s*\}\}\}|\{\{\s*([\w.$-]+)\s*\}\}")
        .expect("placeholder pattern compiles")
});

/// Substitute every placeholder in `template` in a single pass.
///
/// Substituted text is never scanned again, so values containing `{{...}}`
/// come through literally.
pub fn interpolate(template: &str, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            if let Some(path) = caps.get(1) {
                resolve(data, path.as_str()).into_owned()
            } else if let Some(path) = caps.get(2) {
                escape_html(&resolve(data, path.as_str()))
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Walk a dotted path through `data`.
///
/// Returns `None` when any segment is missing, which is distinct from a
/// present-but-empty value.
pub fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    lookup_segments(data, &segments)
}

fn lookup_segments<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value);
    };

    let next = match value {
        Value::Object(map) => map.get(*head)?,
        Value::Array(items) => items.get(head.parse::<usize>().ok()?)?,
        _ => return None,
    };
    lookup_segments(next, rest)
}

fn resolve<'a>(data: &'a Value, path: &str) -> Cow<'a, str> {
    lookup_path(data, path).map_or(Cow::Borrowed(""), stringify)
}

/// Text form of a JSON value as it appears in a rendered email.
pub fn stringify(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(text) => Cow::Borrowed(text.as_str()),
        Value::Bool(flag) => Cow::Owned(flag.to_string()),
        Value::Number(number) => Cow::Owned(match number.as_f64() {
            // `3.0` renders as `3`.
            Some(float) if number.is_f64() => float.to_string(),
            _ => number.to_string(),
        }),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn double_braces_escape_and_triple_braces_do_not() {
        let data = json!({"name": "<script>"});
        assert_eq!(interpolate("Hi {{name}}", &data), "Hi &lt;script&gt;");
        assert_eq!(interpolate("<b>{{{name}}}</b>", &data), "<b><script></b>");
    }

    #[test]
    fn escapes_all_five_characters() {
        assert_eq!(
            escape_html(r#"Tom & "Jerry" <'x'>"#),
            "Tom &amp; &quot;Jerry&quot; &lt;&#39;x&#39;&gt;"
        );
    }

    #[test]
    fn dotted_paths_and_array_indices() {
        let data = json!({
            "task": {"title": "Kamera bakımı", "assignee": {"name": "Deniz"}},
            "items": [{"sku": "CAM-1"}, {"sku": "LENS-2"}]
        });

        assert_eq!(
            interpolate("{{task.title}} → {{ task.assignee.name }}", &data),
            "Kamera bakımı → Deniz"
        );
        assert_eq!(interpolate("{{items.1.sku}}", &data), "LENS-2");
    }

    #[test]
    fn missing_paths_render_empty() {
        let data = json!({"task": {"title": "x"}});
        assert_eq!(interpolate("[{{task.owner.name}}]", &data), "[]");
        assert_eq!(interpolate("[{{{nope}}}]", &data), "[]");
        assert_eq!(interpolate("[{{task.title.length}}]", &data), "[]");
        assert_eq!(interpolate("[{{anything}}]", &Value::Null), "[]");
    }

    #[test]
    fn lookup_distinguishes_missing_from_empty() {
        let data = json!({"blank": "", "nothing": null});
        assert_eq!(lookup_path(&data, "blank"), Some(&json!("")));
        assert_eq!(lookup_path(&data, "nothing"), Some(&Value::Null));
        assert_eq!(lookup_path(&data, "absent"), None);
    }

    #[test]
    fn scalars_and_structures_stringify() {
        let data = json!({"count": 3, "ok": true, "tags": ["a", "b"], "none": null});
        assert_eq!(
            interpolate("{{count}}/{{ok}}/{{{tags}}}/{{none}}", &data),
            r#"3/true/["a","b"]/"#
        );
    }

    #[test]
    fn whole_floats_drop_the_trailing_zero() {
        let data = json!({"total": 3.0, "price": 12.5, "qty": -2.0});
        assert_eq!(interpolate("{{total}}|{{price}}|{{qty}}", &data), "3|12.5|-2");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let data = json!({"a": "{{b}}", "b": "secret"});
        assert_eq!(interpolate("{{{a}}}", &data), "{{b}}");
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let text = "No braces here, just { single } ones.";
        assert_eq!(interpolate(text, &json!({})), text);
    }
}
