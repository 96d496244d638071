use std::path::{Path, PathBuf};

use crate::settings::Settings;

/// File name shared by both scopes.
pub const CONFIG_FILE_NAME: &str = "skill-bus.json";
/// The hidden state directory, relative to home (global) or the project root.
pub const STATE_DIR: &str = ".claude";
/// Default telemetry log file name inside the project state directory.
pub const TELEMETRY_FILE_NAME: &str = "skill-bus-telemetry.jsonl";
/// Marker created after the one-time first-run nudge.
pub const NUDGE_MARKER_NAME: &str = ".skill-bus-nudged";
/// Test override for the global configuration path.
pub const GLOBAL_CONFIG_ENV: &str = "SKILL_BUS_CONFIG";

/// Path of the global (per-user) configuration file. The override variable
/// takes precedence so tests can redirect it away from the real home.
pub fn global_config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(GLOBAL_CONFIG_ENV) {
        if !p.is_empty() {
            return Some(PathBuf::from(p));
        }
    }
    dirs::home_dir().map(|home| home.join(STATE_DIR).join(CONFIG_FILE_NAME))
}

pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(STATE_DIR).join(CONFIG_FILE_NAME)
}

pub fn state_dir(cwd: &Path) -> PathBuf {
    cwd.join(STATE_DIR)
}

pub fn nudge_marker_path(cwd: &Path) -> PathBuf {
    state_dir(cwd).join(NUDGE_MARKER_NAME)
}

/// Telemetry log path: the project state directory by default, overridable by
/// the `telemetryPath` setting (relative paths resolve against the cwd).
pub fn telemetry_path(cwd: &Path, settings: &Settings) -> PathBuf {
    if settings.telemetry_path.is_empty() {
        return state_dir(cwd).join(TELEMETRY_FILE_NAME);
    }
    let configured = PathBuf::from(&settings.telemetry_path);
    if configured.is_absolute() {
        configured
    } else {
        cwd.join(configured)
    }
}

/// Raw bytes of both configuration files, read fresh for one dispatch.
/// `None` means the file does not exist or cannot be read.
pub struct ConfigSources {
    pub global: Option<String>,
    pub project: Option<String>,
}

impl ConfigSources {
    pub fn load(cwd: &Path) -> Self {
        ConfigSources {
            global: global_config_path().and_then(|p| read_optional(&p)),
            project: read_optional(&project_config_path(cwd)),
        }
    }

    pub fn any_present(&self) -> bool {
        self.global.is_some() || self.project.is_some()
    }
}

pub fn read_optional(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_path_default() {
        let settings = Settings::default();
        let path = telemetry_path(Path::new("/work/proj"), &settings);
        assert_eq!(
            path,
            Path::new("/work/proj/.claude/skill-bus-telemetry.jsonl")
        );
    }

    #[test]
    fn test_telemetry_path_relative_override() {
        let settings = Settings {
            telemetry_path: "logs/bus.jsonl".to_string(),
            ..Settings::default()
        };
        let path = telemetry_path(Path::new("/work/proj"), &settings);
        assert_eq!(path, Path::new("/work/proj/logs/bus.jsonl"));
    }

    #[test]
    fn test_telemetry_path_absolute_override() {
        let settings = Settings {
            telemetry_path: "/var/log/bus.jsonl".to_string(),
            ..Settings::default()
        };
        let path = telemetry_path(Path::new("/work/proj"), &settings);
        assert_eq!(path, Path::new("/var/log/bus.jsonl"));
    }
}
