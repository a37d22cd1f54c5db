use crate::Payload;

/// Resolve a dot-notation path inside a payload.
///
/// - `"log_level"` → `payload["log_level"]`
/// - `"sdk.log_level"` → `payload["sdk"]["log_level"]`
///
/// Returns `None` if any segment is missing.
pub fn resolve_path<'a>(payload: &'a Payload, path: &str) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = payload.get(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Current Unix time in whole seconds.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn resolves_nested_and_top_level_keys() {
        let p = payload(json!({"log_level": "Warn", "sdk": {"log_level": "Debug"}}));
        assert_eq!(resolve_path(&p, "log_level"), Some(&json!("Warn")));
        assert_eq!(resolve_path(&p, "sdk.log_level"), Some(&json!("Debug")));
        assert_eq!(resolve_path(&p, "sdk.missing"), None);
        assert_eq!(resolve_path(&p, "log_level.deeper"), None);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_secs() > 1_577_836_800);
    }
}
