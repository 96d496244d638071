pub mod locate;
pub mod merge;
pub mod model;
pub mod settings;

pub use locate::{ConfigSources, GLOBAL_CONFIG_ENV};
pub use merge::{merge, EffectiveView};
pub use model::{ConfigFile, Insert, RawSubscription, Scope, Subscription, Timing};
pub use settings::Settings;
