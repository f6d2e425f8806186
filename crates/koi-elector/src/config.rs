use std::time::Duration;

/// Tunables the elector tick pipeline consults (spec §4.6, §6 `time.*`
/// keys). Kept as plain durations here so `koi-elector` has no dependency
/// on the config file's key-value parser.
#[derive(Debug, Clone)]
pub struct ElectorConfig {
    pub tick_interval: Duration,
    pub master_dead_time: Duration,
    pub initial_promotion_delay: Duration,
    pub runner_failure_promotion_timeout: Duration,
    pub forget_ancient_time: Duration,
    pub cluster_quorum: usize,
}

impl Default for ElectorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            master_dead_time: Duration::from_secs(10),
            initial_promotion_delay: Duration::from_secs(10),
            runner_failure_promotion_timeout: Duration::from_secs(60),
            forget_ancient_time: Duration::from_secs(30 * 60),
            cluster_quorum: 0,
        }
    }
}
