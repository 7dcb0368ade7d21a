//! Output formatting for the CLI.
//!
//! CHANGELOG:
//! - 10/19/2026 - Field filtering descends into nested results
//! - 01/10/2026 - Initial implementation

use serde::Serialize;
use serde_json::{json, Value};

/// Output control settings from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct OutputControls {
    pub json: bool,
    pub compact: bool,
    /// Comma-separated field allowlist.
    pub fields: Option<String>,
}

impl OutputControls {
    /// Render data as JSON according to the controls.
    pub fn emit<T: Serialize>(&self, data: &T) -> String {
        let value = serde_json::to_value(data).unwrap_or(Value::Null);

        let filtered = match self.fields.as_deref() {
            Some(fields) => {
                let list: Vec<&str> = fields
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .collect();
                filter_fields(&value, &list)
            }
            None => value,
        };

        if self.compact {
            serde_json::to_string(&filtered).unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::to_string_pretty(&filtered).unwrap_or_else(|_| "{}".to_string())
        }
    }

    pub fn print<T: Serialize>(&self, data: &T) {
        println!("{}", self.emit(data));
    }

    /// Whether structured output was requested by any flag.
    pub fn wants_json(&self) -> bool {
        self.json || self.compact || self.fields.is_some()
    }
}

/// Keep only the listed fields.
///
/// Objects holding none of the fields are treated as containers and filtered
/// one level down, so `--fields id,name` applies to each hit inside
/// `{"results": [...]}`.
fn filter_fields(value: &Value, fields: &[&str]) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| filter_fields(v, fields)).collect()),
        Value::Object(map) => {
            if fields.iter().any(|f| map.contains_key(*f)) {
                let mut kept = serde_json::Map::new();
                for field in fields {
                    if let Some(v) = map.get(*field) {
                        kept.insert(field.to_string(), v.clone());
                    }
                }
                Value::Object(kept)
            } else {
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), filter_fields(v, fields)))
                        .collect(),
                )
            }
        }
        _ => value.clone(),
    }
}

/// Format an error as JSON.
pub fn format_error(error: &str) -> String {
    serde_json::to_string(&json!({
        "error": error,
        "success": false
    }))
    .unwrap_or_else(|_| format!(r#"{{"error":"{}"}}"#, error))
}
