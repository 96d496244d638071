use std::path::Path;

use config::model::Insert;

/// The closed dynamic-handler registry. A handler name outside this set falls
/// back to static text with a warning.
pub const DYNAMIC_HANDLERS: &[&str] = &["session-stats"];

/// Produce the text one insert contributes. Dynamic resolution happens here,
/// at dispatch time; an empty or failed handler result falls back silently to
/// the static text.
pub fn resolve(insert: &Insert, telemetry_log: &Path, warnings: &mut Vec<String>) -> String {
    let Some(handler) = insert.dynamic.as_deref() else {
        return insert.text.clone();
    };
    if !DYNAMIC_HANDLERS.contains(&handler) {
        warnings.push(format!(
            "insert '{}' names unknown dynamic handler '{}'; using static text",
            insert.name, handler
        ));
        return insert.text.clone();
    }
    match run_handler(handler, telemetry_log) {
        Some(text) if !text.is_empty() => text,
        _ => insert.text.clone(),
    }
}

fn run_handler(name: &str, telemetry_log: &Path) -> Option<String> {
    match name {
        "session-stats" => {
            let records = telemetry::read_records(telemetry_log);
            let agg = telemetry::aggregate(&records, None, None);
            Some(telemetry::render_session_stats(&agg))
        }
        _ => None,
    }
}
