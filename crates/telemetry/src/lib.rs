pub mod event;
pub mod sink;
pub mod stats;

pub use event::{EventKind, Record};
pub use sink::Sink;
pub use stats::{aggregate, read_records, render_session_stats, Aggregates};
