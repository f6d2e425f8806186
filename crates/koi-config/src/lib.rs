//! Typed configuration, loaded from an INFO-style document (spec §6).

mod document;
mod settings;
mod time_suffix;

pub use document::{Document, DocumentError};
pub use settings::{ClusterSettings, ConfigError, NodeSettings, ServiceSettings, Settings, TimeSettings};
pub use time_suffix::{parse_duration, TimeSuffixError};
