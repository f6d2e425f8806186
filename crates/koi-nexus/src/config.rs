use std::net::IpAddr;
use std::time::Duration;

use koi_config::Settings;
use koi_elector::ElectorConfig;
use koi_proto::NodeId;
use koi_runner::RunnerConfig;
use koi_supervisor::SupervisorConfig;

/// Everything the Nexus needs to wire up its owned components, assembled
/// from a loaded [`Settings`] plus the process's own identity (spec §4.9
/// "On startup").
#[derive(Debug, Clone)]
pub struct NexusConfig {
    pub own_id: NodeId,
    pub own_name: String,
    pub cluster_id: u8,
    pub password: String,
    pub elector_capable: bool,
    pub runner_capable: bool,
    pub port: u16,
    /// Address advertised in `MasterInfo` when this node is itself master.
    /// Unspecified (`0.0.0.0`) unless pinned via the `koi` binary's
    /// `--host` option.
    pub advertise_addr: IpAddr,
    pub cluster_update_interval: Duration,
    pub state_update_interval: Duration,
    pub elector: ElectorConfig,
    pub runner: RunnerConfig,
    pub supervisor: SupervisorConfig,
}

impl NexusConfig {
    pub fn from_settings(settings: &Settings, own_id: NodeId) -> Self {
        let t = &settings.time;
        Self {
            own_id,
            own_name: settings.node.name.clone().unwrap_or_else(|| own_id.to_string()),
            cluster_id: settings.cluster.id,
            password: settings.cluster.password.clone().unwrap_or_default(),
            elector_capable: settings.node.elector,
            runner_capable: settings.node.runner,
            port: settings.node.port,
            advertise_addr: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            cluster_update_interval: t.cluster_update_interval(),
            state_update_interval: t.state_update_interval(),
            elector: ElectorConfig {
                tick_interval: t.elector_tick_interval(),
                master_dead_time: t.master_dead_time(),
                initial_promotion_delay: t.initial_promotion_delay(),
                runner_failure_promotion_timeout: t.failure_promotion_timeout(),
                forget_ancient_time: Duration::from_secs(30 * 60),
                cluster_quorum: settings.cluster.quorum,
            },
            runner: RunnerConfig {
                tick_interval: t.runner_tick_interval(),
                elector_lost_time: t.elector_lost_time(),
                elector_gone_time: t.elector_gone_time(),
                quorum_demote_time: t.quorum_demote_time(),
                auto_recover: settings.service.auto_recover,
                auto_recover_time: t.auto_recover_time(),
                auto_recover_wait_factor: settings.service.auto_recover_wait_factor,
                failcount_reset_time: t.failcount_reset(),
            },
            supervisor: SupervisorConfig {
                services_folder: settings.service.folder(),
                working_dir: settings.service.working_dir(),
                event_timeout: [
                    settings.service.start_timeout(),
                    settings.service.stop_timeout(),
                    settings.service.status_timeout(),
                    settings.service.promote_timeout(),
                    settings.service.demote_timeout(),
                ]
                .into_iter()
                .max()
                .expect("non-empty literal array"),
                status_interval: t.status_interval(),
            },
        }
    }
}
