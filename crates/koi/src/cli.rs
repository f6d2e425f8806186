use clap::{Parser, Subcommand, ValueEnum};

/// Documents the CLI surface from spec §6. When `command` is absent this
/// process runs the coordinator itself, reading `--file`; when present it
/// is a thin RPC client, sending one `Request` to the node named by
/// `--host`/`--port` and printing the `Response` (no business logic of its
/// own lives here).
#[derive(Parser, Debug)]
#[command(name = "koi", author, version, about = "LAN cluster coordinator", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Node to contact when running as a client (defaults to loopback); in
    /// daemon mode, pins the address advertised in `MasterInfo` instead of
    /// the default unspecified address.
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long, default_value_t = 8471)]
    pub port: u16,

    /// Shared cluster password, overrides `cluster.password` from the config file.
    #[arg(long)]
    pub secret: Option<String>,

    /// Pins this node's id, overrides `node.id` from the config file.
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub color: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Client request timeout, milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub timeout: u64,

    #[arg(long, default_value = "/etc/koi/koi.conf")]
    pub file: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// This node's own identity and role.
    Local,
    Status { node: Option<String> },
    Tree,
    Reconfigure { node: Option<String> },
    Maintenance { state: OnOff },
    Promote { target: String },
    Demote,
    Elect,
    Start { node: Option<String> },
    Stop { node: Option<String> },
    Recover { node: Option<String> },
    Failures,
}

impl Command {
    /// Splits into the wire `(cmd, args)` pair a `Request` carries.
    pub fn to_wire(&self) -> (&'static str, Vec<String>) {
        match self {
            Command::Local => ("local", vec![]),
            Command::Status { node } => ("status", node.iter().cloned().collect()),
            Command::Tree => ("tree", vec![]),
            Command::Reconfigure { node } => ("reconfigure", node.iter().cloned().collect()),
            Command::Maintenance { state } => ("maintenance", vec![state.to_possible_value().unwrap().get_name().to_string()]),
            Command::Promote { target } => ("promote", vec![target.clone()]),
            Command::Demote => ("demote", vec![]),
            Command::Elect => ("elect", vec![]),
            Command::Start { node } => ("start", node.iter().cloned().collect()),
            Command::Stop { node } => ("stop", node.iter().cloned().collect()),
            Command::Recover { node } => ("recover", node.iter().cloned().collect()),
            Command::Failures => ("failures", vec![]),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnOff {
    On,
    Off,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_and_bare_commands_carry_no_arguments() {
        assert_eq!(Command::Local.to_wire(), ("local", vec![]));
        assert_eq!(Command::Tree.to_wire(), ("tree", vec![]));
        assert_eq!(Command::Demote.to_wire(), ("demote", vec![]));
        assert_eq!(Command::Elect.to_wire(), ("elect", vec![]));
        assert_eq!(Command::Failures.to_wire(), ("failures", vec![]));
    }

    #[test]
    fn node_targeted_commands_carry_the_node_when_given() {
        assert_eq!(Command::Status { node: Some("alpha".into()) }.to_wire(), ("status", vec!["alpha".to_string()]));
        assert_eq!(Command::Status { node: None }.to_wire(), ("status", vec![]));
        assert_eq!(Command::Start { node: Some("beta".into()) }.to_wire(), ("start", vec!["beta".to_string()]));
        assert_eq!(Command::Stop { node: None }.to_wire(), ("stop", vec![]));
        assert_eq!(Command::Recover { node: Some("gamma".into()) }.to_wire(), ("recover", vec!["gamma".to_string()]));
        assert_eq!(Command::Reconfigure { node: Some("delta".into()) }.to_wire(), ("reconfigure", vec!["delta".to_string()]));
    }

    #[test]
    fn promote_carries_its_target() {
        assert_eq!(Command::Promote { target: "alpha".into() }.to_wire(), ("promote", vec!["alpha".to_string()]));
    }

    #[test]
    fn maintenance_renders_its_on_off_value_by_name() {
        assert_eq!(Command::Maintenance { state: OnOff::On }.to_wire(), ("maintenance", vec!["on".to_string()]));
        assert_eq!(Command::Maintenance { state: OnOff::Off }.to_wire(), ("maintenance", vec!["off".to_string()]));
    }
}
