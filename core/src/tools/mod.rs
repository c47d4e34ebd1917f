use serde_json::Value;

pub mod todays_date;

pub use todays_date::{DateFormat, TodaysDateTool};

/// Reads an optional string argument; non-string values count as absent.
pub fn extract_string_arg_opt(args: &Value, key: &str, default: &str) -> String {
    args.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}
