use serde_json::{Map, Value};

use crate::model::Scope;

/// The flat record of operational knobs. Each field is coerced independently
/// from the JSON settings region; a wrong-typed value falls back to the
/// default with a warning naming the field.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub enabled: bool,
    pub max_matches_per_skill: u32,
    pub show_console_echo: bool,
    pub disable_global: bool,
    pub monitor_slash_commands: bool,
    pub completion_hooks: bool,
    pub show_condition_skips: bool,
    pub telemetry: bool,
    pub observe_unmatched: bool,
    pub telemetry_path: String,
    pub max_log_size_kb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            max_matches_per_skill: 3,
            show_console_echo: true,
            disable_global: false,
            monitor_slash_commands: false,
            completion_hooks: false,
            show_condition_skips: false,
            telemetry: false,
            observe_unmatched: false,
            telemetry_path: String::new(),
            max_log_size_kb: 512,
        }
    }
}

/// The recognized setting names, shared with the CLI's `set` validation.
pub const KNOWN_SETTINGS: &[&str] = &[
    "enabled",
    "maxMatchesPerSkill",
    "showConsoleEcho",
    "disableGlobal",
    "monitorSlashCommands",
    "completionHooks",
    "showConditionSkips",
    "telemetry",
    "observeUnmatched",
    "telemetryPath",
    "maxLogSizeKB",
];

impl Settings {
    /// Overlay one file's settings region onto `self`, field by field.
    /// Unknown keys are ignored forward-compatibly.
    pub fn overlay(&mut self, map: &Map<String, Value>, scope: Scope, warnings: &mut Vec<String>) {
        for (key, value) in map {
            match key.as_str() {
                "enabled" => overlay_bool(&mut self.enabled, key, value, scope, warnings),
                "maxMatchesPerSkill" => {
                    match value.as_u64().filter(|&n| n >= 1) {
                        Some(n) => self.max_matches_per_skill = n as u32,
                        None => warn_type(key, "a positive integer", scope, warnings),
                    }
                }
                "showConsoleEcho" => {
                    overlay_bool(&mut self.show_console_echo, key, value, scope, warnings)
                }
                "disableGlobal" => {
                    overlay_bool(&mut self.disable_global, key, value, scope, warnings)
                }
                "monitorSlashCommands" => {
                    overlay_bool(&mut self.monitor_slash_commands, key, value, scope, warnings)
                }
                "completionHooks" => {
                    overlay_bool(&mut self.completion_hooks, key, value, scope, warnings)
                }
                "showConditionSkips" => {
                    overlay_bool(&mut self.show_condition_skips, key, value, scope, warnings)
                }
                "telemetry" => overlay_bool(&mut self.telemetry, key, value, scope, warnings),
                "observeUnmatched" => {
                    overlay_bool(&mut self.observe_unmatched, key, value, scope, warnings)
                }
                "telemetryPath" => match value.as_str() {
                    Some(s) => self.telemetry_path = s.to_string(),
                    None => warn_type(key, "a string", scope, warnings),
                },
                "maxLogSizeKB" => match value.as_u64() {
                    Some(n) => self.max_log_size_kb = n,
                    None => warn_type(key, "a non-negative integer", scope, warnings),
                },
                _ => {}
            }
        }
    }
}

fn overlay_bool(
    slot: &mut bool,
    key: &str,
    value: &Value,
    scope: Scope,
    warnings: &mut Vec<String>,
) {
    match value.as_bool() {
        Some(b) => *slot = b,
        None => warn_type(key, "a boolean", scope, warnings),
    }
}

fn warn_type(key: &str, expected: &str, scope: Scope, warnings: &mut Vec<String>) {
    warnings.push(format!(
        "{} setting '{}' must be {}; using the default",
        scope.label(),
        key,
        expected
    ));
}
