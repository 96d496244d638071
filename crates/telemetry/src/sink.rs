use std::io::Write;
use std::path::{Path, PathBuf};

use crate::event::{EventKind, Record};

/// Best-effort append-only writer. Every failure is swallowed: telemetry must
/// never propagate an error into dispatch.
pub struct Sink {
    path: PathBuf,
    session: u32,
    enabled: bool,
    observe_unmatched: bool,
    max_bytes: u64,
}

impl Sink {
    /// `max_log_size_kb` of zero disables rotation.
    pub fn new(path: &Path, enabled: bool, observe_unmatched: bool, max_log_size_kb: u64) -> Self {
        Sink {
            path: path.to_path_buf(),
            session: std::process::id(),
            enabled,
            observe_unmatched,
            max_bytes: max_log_size_kb * 1024,
        }
    }

    /// A sink that writes nothing, for paths where telemetry is off.
    pub fn disabled() -> Self {
        Sink {
            path: PathBuf::new(),
            session: std::process::id(),
            enabled: false,
            observe_unmatched: false,
            max_bytes: 0,
        }
    }

    pub fn session(&self) -> u32 {
        self.session
    }

    /// Append one event. No-match events additionally require the
    /// observe-unmatched setting.
    pub fn record(&self, kind: EventKind) {
        if !self.enabled {
            return;
        }
        if matches!(kind, EventKind::NoMatch { .. }) && !self.observe_unmatched {
            return;
        }
        let record = Record::now(self.session, kind);
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        let _ = self.append(&line);
        self.rotate_if_needed();
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// Size-based rotation: keep the most recent half of the lines once the
    /// file exceeds the ceiling. Read-then-rewrite is not atomic; the
    /// threshold is kept high and one event is written per invocation.
    fn rotate_if_needed(&self) {
        if self.max_bytes == 0 {
            return;
        }
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return;
        };
        if meta.len() <= self.max_bytes {
            return;
        }
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return;
        };
        let lines: Vec<&str> = content.lines().collect();
        let keep_from = lines.len() / 2;
        let mut rewritten = lines[keep_from..].join("\n");
        rewritten.push('\n');
        let _ = std::fs::write(&self.path, rewritten);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_event(n: usize) -> EventKind {
        EventKind::Match {
            skill: format!("skill:{}", n),
            insert: "X".to_string(),
            timing: "pre".to_string(),
            source: "tool".to_string(),
        }
    }

    #[test]
    fn test_disabled_sink_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let sink = Sink::new(&path, false, false, 512);
        sink.record(match_event(0));
        assert!(!path.exists());
    }

    #[test]
    fn test_no_match_requires_observe_unmatched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let sink = Sink::new(&path, true, false, 512);
        sink.record(EventKind::NoMatch {
            skill: "a:b".to_string(),
            source: "fast-path".to_string(),
        });
        assert!(!path.exists());

        let sink = Sink::new(&path, true, true, 512);
        sink.record(EventKind::NoMatch {
            skill: "a:b".to_string(),
            source: "fast-path".to_string(),
        });
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_append_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".claude").join("log.jsonl");
        let sink = Sink::new(&path, true, false, 512);
        sink.record(match_event(0));
        assert!(path.exists());
    }

    #[test]
    fn test_rotation_keeps_most_recent_half() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        // 1 KB ceiling; each record is well over 100 bytes, so a dozen
        // writes guarantee at least one rotation.
        let sink = Sink::new(&path, true, false, 1);
        for n in 0..12 {
            sink.record(match_event(n));
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines.len() < 12);
        // The most recent event always survives rotation.
        assert!(lines.last().unwrap().contains("skill:11"));
    }

    #[test]
    fn test_zero_ceiling_disables_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let sink = Sink::new(&path, true, false, 0);
        for n in 0..50 {
            sink.record(match_event(n));
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 50);
    }
}
