use std::path::Path;
use std::sync::OnceLock;

use config::locate;
use regex::Regex;

/// Pre-parse coverage check over raw configuration bytes. Intentionally
/// over-approximate: a hit only means the full merge must run. A wildcard
/// `on` pattern passes any skill, since substring matching on the skill name
/// alone would miss it.
pub fn covered(skill: &str, sources: &[&str]) -> bool {
    sources
        .iter()
        .any(|text| text.contains(skill) || has_wildcard_subscription(text))
}

fn has_wildcard_subscription(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#""on"\s*:\s*"[^"]*\*"#).unwrap());
    re.is_match(text)
}

/// Regex-lite sniff for a boolean setting being literally `true`, used before
/// the JSON parser is allowed to run. The slow path re-checks authoritatively.
pub fn sniff_setting_true(name: &str, sources: &[&str]) -> bool {
    let re = Regex::new(&format!(r#""{}"\s*:\s*true"#, regex::escape(name))).unwrap();
    sources.iter().any(|text| re.is_match(text))
}

/// Sniff a telemetry path override so the fast-path no-coverage event lands
/// in the same log the slow path would use.
pub fn sniff_telemetry_path(sources: &[&str]) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#""telemetryPath"\s*:\s*"([^"]+)""#).unwrap());
    sources
        .iter()
        .find_map(|text| re.captures(text))
        .map(|caps| caps[1].to_string())
}

/// One-time first-run nudge for a project with no configuration. Returns the
/// advisory on the first sighting and records the marker; later invocations
/// stay silent. Marker creation is best-effort.
pub fn first_run_nudge(cwd: &Path) -> Option<String> {
    let marker = locate::nudge_marker_path(cwd);
    if marker.exists() {
        return None;
    }
    if let Some(parent) = marker.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&marker, "");
    Some(format!(
        "skill-bus: no configuration found for this project. \
         Create {}/{} (or a global one) to start injecting context; \
         `skill-bus status` shows what is in effect.",
        locate::STATE_DIR,
        locate::CONFIG_FILE_NAME
    ))
}
