use serde::Serialize;
use serde_json::Value;

use crate::probe::ProbeResult;

/// What a worker hands to the output task for one target.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Result(ProbeResult),
    Error(TargetError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetError {
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `url [field] [field] ...`
    #[default]
    Plain,
    /// One compact JSON object per line.
    Jsonl,
    /// URL only.
    Silent,
}

/// Plain-mode field order.
const PLAIN_FIELDS: &[&str] = &[
    "status_code",
    "location",
    "content_length",
    "content_type",
    "title",
    "ip",
    "cdn",
    "response_time",
    "favicon_hash",
    "body_hash",
];

fn plain_value(key: &str, v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if key == "response_time" => {
            format!("{:.2}ms", n.as_f64().unwrap_or_default())
        }
        other => other.to_string(),
    }
}

pub fn render_result(result: &ProbeResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Silent => result.url().to_string(),
        OutputFormat::Jsonl => serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Plain => {
            let mut line = result.url().to_string();
            for key in PLAIN_FIELDS {
                if let Some(v) = result.get(key) {
                    line.push_str(&format!(" [{}]", plain_value(key, v)));
                }
            }
            line
        }
    }
}

pub fn render_error(err: &TargetError) -> String {
    format!("Error: {}: {}", err.target, err.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn result() -> ProbeResult {
        let mut r = ProbeResult::new("http://a.example/");
        let mut f = Map::new();
        f.insert("status_code".into(), json!(301));
        f.insert("title".into(), Value::Null);
        f.insert("response_time".into(), json!(12.3456));
        r.merge(f);
        r
    }

    #[test]
    fn plain_line_brackets_enabled_fields() {
        assert_eq!(render_result(&result(), OutputFormat::Plain), "http://a.example/ [301] [] [12.35ms]");
    }

    #[test]
    fn jsonl_is_single_line() {
        let line = render_result(&result(), OutputFormat::Jsonl);
        assert!(!line.contains('\n'));
        let v: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["url"], json!("http://a.example/"));
        assert_eq!(v["title"], Value::Null);
    }

    #[test]
    fn silent_is_url_only() {
        assert_eq!(render_result(&result(), OutputFormat::Silent), "http://a.example/");
    }
}
