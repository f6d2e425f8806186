use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::document::{Document, DocumentError};
use crate::time_suffix::{parse_duration, TimeSuffixError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("node.{0}: {1}")]
    BadNodeField(&'static str, String),
    #[error("cluster.{0}: {1}")]
    BadClusterField(&'static str, String),
    #[error("service.{0}: {1}")]
    BadServiceField(&'static str, String),
    #[error("time.{0}: {1}")]
    BadTimeField(&'static str, TimeSuffixError),
}

/// `node.*` keys (spec §6).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeSettings {
    pub elector: bool,
    pub runner: bool,
    pub port: u16,
    pub maintenance: bool,
    pub loglevel: String,
    pub name: Option<String>,
    pub id: Option<String>,
}

impl NodeSettings {
    /// Parses `node.id` as a `NodeId`, if one was configured. A missing or
    /// unparsable value means "generate one at startup" — never a load
    /// failure, since a fixed id is an optional pin, not a requirement.
    pub fn resolved_id(&self) -> Option<koi_proto::NodeId> {
        self.id.as_deref().and_then(|s| s.parse().ok())
    }
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self { elector: true, runner: true, port: 8471, maintenance: false, loglevel: "info".to_string(), name: None, id: None }
    }
}

/// `cluster.*` keys (spec §6).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterSettings {
    pub id: u8,
    pub quorum: usize,
    pub password: Option<String>,
    pub transport: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self { id: 0, quorum: 0, password: None, transport: "udp".to_string() }
    }
}

/// `service.*` keys (spec §6). Per-event timeouts are stored as
/// milliseconds so the struct stays plain-`Deserialize`; `Duration`
/// accessors live below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceSettings {
    pub folder: String,
    pub workingdir: Option<String>,
    pub start_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub status_timeout_ms: u64,
    pub promote_timeout_ms: u64,
    pub demote_timeout_ms: u64,
    pub auto_recover: u32,
    pub auto_recover_wait_factor: f64,
}

impl ServiceSettings {
    pub fn folder(&self) -> PathBuf {
        PathBuf::from(&self.folder)
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        self.workingdir.as_ref().map(PathBuf::from)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn promote_timeout(&self) -> Duration {
        Duration::from_millis(self.promote_timeout_ms)
    }

    pub fn demote_timeout(&self) -> Duration {
        Duration::from_millis(self.demote_timeout_ms)
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            folder: "/etc/koi/services".to_string(),
            workingdir: None,
            start_timeout_ms: 30_000,
            stop_timeout_ms: 30_000,
            status_timeout_ms: 5_000,
            promote_timeout_ms: 30_000,
            demote_timeout_ms: 30_000,
            auto_recover: 3,
            auto_recover_wait_factor: 2.0,
        }
    }
}

/// `time.*` keys (spec §6), all stored in milliseconds for the same reason
/// as [`ServiceSettings`]'s timeouts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeSettings {
    pub status_interval_ms: u64,
    pub cluster_update_interval_ms: u64,
    pub state_update_interval_ms: u64,
    pub elector_tick_interval_ms: u64,
    pub runner_tick_interval_ms: u64,
    pub elector_lost_time_ms: u64,
    pub elector_gone_time_ms: u64,
    pub quorum_demote_time_ms: u64,
    pub mainloop_sleep_time_ms: u64,
    pub master_dead_time_ms: u64,
    pub elector_startup_tolerance_ms: u64,
    pub initial_promotion_delay_ms: u64,
    pub auto_recover_time_ms: u64,
    pub failcount_reset_ms: u64,
    pub failure_promotion_timeout_ms: u64,
}

macro_rules! duration_accessor {
    ($name:ident, $field:ident) => {
        pub fn $name(&self) -> Duration {
            Duration::from_millis(self.$field)
        }
    };
}

impl TimeSettings {
    duration_accessor!(status_interval, status_interval_ms);
    duration_accessor!(cluster_update_interval, cluster_update_interval_ms);
    duration_accessor!(state_update_interval, state_update_interval_ms);
    duration_accessor!(elector_tick_interval, elector_tick_interval_ms);
    duration_accessor!(runner_tick_interval, runner_tick_interval_ms);
    duration_accessor!(elector_lost_time, elector_lost_time_ms);
    duration_accessor!(elector_gone_time, elector_gone_time_ms);
    duration_accessor!(quorum_demote_time, quorum_demote_time_ms);
    duration_accessor!(mainloop_sleep_time, mainloop_sleep_time_ms);
    duration_accessor!(master_dead_time, master_dead_time_ms);
    duration_accessor!(elector_startup_tolerance, elector_startup_tolerance_ms);
    duration_accessor!(initial_promotion_delay, initial_promotion_delay_ms);
    duration_accessor!(auto_recover_time, auto_recover_time_ms);
    duration_accessor!(failcount_reset, failcount_reset_ms);
    duration_accessor!(failure_promotion_timeout, failure_promotion_timeout_ms);
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            status_interval_ms: 10_000,
            cluster_update_interval_ms: 1_000,
            state_update_interval_ms: 1_000,
            elector_tick_interval_ms: 1_000,
            runner_tick_interval_ms: 1_000,
            elector_lost_time_ms: 5_000,
            elector_gone_time_ms: 15_000,
            quorum_demote_time_ms: 10_000,
            mainloop_sleep_time_ms: 333,
            master_dead_time_ms: 10_000,
            elector_startup_tolerance_ms: 5_000,
            initial_promotion_delay_ms: 10_000,
            auto_recover_time_ms: 10_000,
            failcount_reset_ms: 300_000,
            failure_promotion_timeout_ms: 60_000,
        }
    }
}

/// The full typed configuration (spec §6). Loaded from an INFO-style
/// document via [`Settings::load`]; any key omitted from the document
/// keeps its documented default instead of failing the load, matching
/// spec §7's "configuration error" taxonomy reserving hard failure for
/// keys that are present but unparsable.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Settings {
    pub node: NodeSettings,
    pub cluster: ClusterSettings,
    pub service: ServiceSettings,
    pub time: TimeSettings,
}

impl Settings {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        match Self::parse(&text) {
            Ok(settings) => {
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "configuration refused to load");
                Err(e)
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let doc = Document::parse(text)?;
        Self::from_document(&doc)
    }

    pub fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        settings.apply_node(doc)?;
        settings.apply_cluster(doc)?;
        settings.apply_service(doc)?;
        settings.apply_time(doc)?;
        Ok(settings)
    }

    fn apply_node(&mut self, doc: &Document) -> Result<(), ConfigError> {
        if let Some(v) = doc.get("node", "elector") {
            self.node.elector = parse_bool(v).map_err(|e| ConfigError::BadNodeField("elector", e))?;
        }
        if let Some(v) = doc.get("node", "runner") {
            self.node.runner = parse_bool(v).map_err(|e| ConfigError::BadNodeField("runner", e))?;
        }
        if let Some(v) = doc.get("node", "port") {
            self.node.port = v.parse().map_err(|_| ConfigError::BadNodeField("port", v.to_string()))?;
        }
        if let Some(v) = doc.get("node", "maintenance") {
            self.node.maintenance = parse_bool(v).map_err(|e| ConfigError::BadNodeField("maintenance", e))?;
        }
        if let Some(v) = doc.get("node", "loglevel") {
            self.node.loglevel = v.to_string();
        }
        if let Some(v) = doc.get("node", "name") {
            self.node.name = Some(v.to_string());
        }
        if let Some(v) = doc.get("node", "id") {
            self.node.id = Some(v.to_string());
        }
        Ok(())
    }

    fn apply_cluster(&mut self, doc: &Document) -> Result<(), ConfigError> {
        if let Some(v) = doc.get("cluster", "id") {
            self.cluster.id = v.parse().map_err(|_| ConfigError::BadClusterField("id", v.to_string()))?;
        }
        if let Some(v) = doc.get("cluster", "quorum") {
            self.cluster.quorum = v.parse().map_err(|_| ConfigError::BadClusterField("quorum", v.to_string()))?;
        }
        if let Some(v) = doc.get("cluster", "password") {
            self.cluster.password = Some(v.to_string());
        }
        if let Some(v) = doc.get("cluster", "transport") {
            self.cluster.transport = v.to_string();
        }
        Ok(())
    }

    fn apply_service(&mut self, doc: &Document) -> Result<(), ConfigError> {
        if let Some(v) = doc.get("service", "folder") {
            self.service.folder = v.to_string();
        }
        if let Some(v) = doc.get("service", "workingdir") {
            self.service.workingdir = Some(v.to_string());
        }
        if let Some(v) = doc.get("service", "start_timeout") {
            self.service.start_timeout_ms =
                parse_duration(v).map_err(|e| ConfigError::BadServiceField("start_timeout", format!("{e}")))?.as_millis() as u64;
        }
        if let Some(v) = doc.get("service", "stop_timeout") {
            self.service.stop_timeout_ms =
                parse_duration(v).map_err(|e| ConfigError::BadServiceField("stop_timeout", format!("{e}")))?.as_millis() as u64;
        }
        if let Some(v) = doc.get("service", "status_timeout") {
            self.service.status_timeout_ms =
                parse_duration(v).map_err(|e| ConfigError::BadServiceField("status_timeout", format!("{e}")))?.as_millis() as u64;
        }
        if let Some(v) = doc.get("service", "promote_timeout") {
            self.service.promote_timeout_ms =
                parse_duration(v).map_err(|e| ConfigError::BadServiceField("promote_timeout", format!("{e}")))?.as_millis() as u64;
        }
        if let Some(v) = doc.get("service", "demote_timeout") {
            self.service.demote_timeout_ms =
                parse_duration(v).map_err(|e| ConfigError::BadServiceField("demote_timeout", format!("{e}")))?.as_millis() as u64;
        }
        if let Some(v) = doc.get("service", "auto_recover") {
            self.service.auto_recover = v.parse().map_err(|_| ConfigError::BadServiceField("auto_recover", v.to_string()))?;
        }
        if let Some(v) = doc.get("service", "auto_recover_wait_factor") {
            self.service.auto_recover_wait_factor =
                v.parse().map_err(|_| ConfigError::BadServiceField("auto_recover_wait_factor", v.to_string()))?;
        }
        Ok(())
    }

    fn apply_time(&mut self, doc: &Document) -> Result<(), ConfigError> {
        macro_rules! time_key {
            ($key:literal, $field:ident) => {
                if let Some(v) = doc.get("time", $key) {
                    self.time.$field =
                        parse_duration(v).map_err(|e| ConfigError::BadTimeField($key, e))?.as_millis() as u64;
                }
            };
        }
        time_key!("status_interval", status_interval_ms);
        time_key!("cluster_update_interval", cluster_update_interval_ms);
        time_key!("state_update_interval", state_update_interval_ms);
        time_key!("elector_tick_interval", elector_tick_interval_ms);
        time_key!("runner_tick_interval", runner_tick_interval_ms);
        time_key!("elector_lost_time", elector_lost_time_ms);
        time_key!("elector_gone_time", elector_gone_time_ms);
        time_key!("quorum_demote_time", quorum_demote_time_ms);
        time_key!("mainloop_sleep_time", mainloop_sleep_time_ms);
        time_key!("master_dead_time", master_dead_time_ms);
        time_key!("elector_startup_tolerance", elector_startup_tolerance_ms);
        time_key!("initial_promotion_delay", initial_promotion_delay_ms);
        time_key!("auto_recover_time", auto_recover_time_ms);
        time_key!("failcount_reset", failcount_reset_ms);
        time_key!("failure_promotion_timeout", failure_promotion_timeout_ms);
        Ok(())
    }
}

fn parse_bool(v: &str) -> Result<bool, String> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_document_is_empty() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn overrides_merge_onto_defaults() {
        let settings = Settings::parse("[node]\nport = 9100\nloglevel = debug\n[cluster]\nquorum = 3\n").unwrap();
        assert_eq!(settings.node.port, 9100);
        assert_eq!(settings.node.loglevel, "debug");
        assert_eq!(settings.cluster.quorum, 3);
        assert_eq!(settings.cluster.id, 0);
    }

    #[test]
    fn time_values_accept_suffixes() {
        let settings = Settings::parse("[time]\nmaster_dead_time = 3m\nstatus_interval = 500ms\n").unwrap();
        assert_eq!(settings.time.master_dead_time(), Duration::from_secs(180));
        assert_eq!(settings.time.status_interval(), Duration::from_millis(500));
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let err = Settings::parse("[node]\nport = not-a-number\n").unwrap_err();
        assert!(matches!(err, ConfigError::BadNodeField("port", _)));
    }

    #[test]
    fn bad_time_suffix_is_a_config_error() {
        let err = Settings::parse("[time]\nmaster_dead_time = soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::BadTimeField("master_dead_time", _)));
    }
}
