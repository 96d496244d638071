use serde::{Deserialize, Serialize};

/// One dispatch-time occurrence. The tag value is the `event` field of the
/// JSONL record; readers skip unknown tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    Match {
        skill: String,
        insert: String,
        timing: String,
        source: String,
    },
    ConditionSkip {
        skill: String,
        insert: String,
        pattern: String,
        /// Which condition list failed: "insert" or "subscription".
        list: String,
        /// Zero-based index of the failing condition within that list.
        index: usize,
    },
    NoMatch {
        skill: String,
        /// "fast-path", "prompt-fast-path", or "tool".
        source: String,
    },
    SkillComplete {
        skill: String,
    },
}

/// One line of the telemetry log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// RFC 3339 timestamp with offset.
    pub ts: String,
    /// Stable per-process session identifier.
    pub session: u32,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Record {
    pub fn now(session: u32, kind: EventKind) -> Self {
        Record {
            ts: chrono::Local::now().to_rfc3339(),
            session,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_with_event_tag() {
        let record = Record {
            ts: "2026-08-01T10:00:00+00:00".to_string(),
            session: 42,
            kind: EventKind::Match {
                skill: "tests:run".to_string(),
                insert: "X".to_string(),
                timing: "pre".to_string(),
                source: "tool".to_string(),
            },
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains(r#""event":"match""#));
        let back: Record = serde_json::from_str(&line).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unknown_event_kind_fails_typed_parse() {
        let line = r#"{"ts":"2026-08-01T10:00:00+00:00","session":1,"event":"comet"}"#;
        assert!(serde_json::from_str::<Record>(line).is_err());
    }
}
