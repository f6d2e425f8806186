mod cli;

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use cli::{Args, Command};
use koi_config::Settings;
use koi_net::Transport;
use koi_nexus::{Nexus, NexusConfig};
use koi_proto::{Body, Endpoint, Message, NodeId, Request};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.color);

    let code = match &args.command {
        Some(cmd) => run_client(&args, cmd).await,
        None => run_daemon(&args).await.map(|()| 0),
    };

    match code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "fatal");
            std::process::exit(1);
        }
    }
}

fn init_logging(debug: bool, color: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_ansi(color)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Sends one `Request`, waits for its `Response`, prints it (spec §6 CLI
/// surface). Exit 0 on success, 1 on a local/transport error, 2 as the
/// "redirect, retry elsewhere" sentinel.
async fn run_client(args: &Args, command: &Command) -> anyhow::Result<i32> {
    let host: IpAddr =
        args.host.as_deref().unwrap_or("127.0.0.1").parse().context("--host is not a valid IP address")?;
    let to = Endpoint::new(host, args.port);

    let transport = Transport::bind(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0, false, false)
        .await
        .context("binding client socket")?;

    let (cmd, wire_args) = command.to_wire();
    let req = Request { cmd: cmd.to_string(), args: wire_args };
    let sender_id = args.id.as_deref().and_then(|s| s.parse().ok()).unwrap_or_else(NodeId::new_random);
    let msg = Message::new(0, 0, sender_id, Body::Request(req));

    let password = args.secret.clone().unwrap_or_default();
    let mut rng = rand::rngs::StdRng::from_entropy();
    let frame = koi_net::encode_message(&msg, &password, &mut rng)?;
    transport.send_unicast(to, &frame).await.context("sending request")?;

    let mut buf = vec![0u8; 65536];
    let recv = tokio::time::timeout(Duration::from_millis(args.timeout), transport.recv(&mut buf));
    let (n, _from) = match recv.await {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            eprintln!("error: {e}");
            return Ok(1);
        }
        Err(_) => {
            eprintln!("error: timed out waiting for a response");
            return Ok(1);
        }
    };

    let reply = match koi_net::decode_message(&buf[..n], &password) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: undecodable response: {e}");
            return Ok(1);
        }
    };

    let Body::Response(resp) = reply.body else {
        eprintln!("error: unexpected reply kind");
        return Ok(1);
    };

    if let Some(redirect) = resp.get("redirect") {
        println!("redirect: {}", redirect.render());
        return Ok(2);
    }
    if let Some(err) = resp.get("error") {
        println!("error: {}", err.render());
        return Ok(1);
    }
    for (key, value) in &resp.fields {
        println!("{key}: {}", value.render());
    }
    Ok(0)
}

/// Runs the coordinator in the foreground (spec §5 main loop): bind the
/// socket, then cooperatively poll I/O, drive `Nexus::update`, and sleep
/// until SIGHUP/SIGINT/SIGTERM or `mainloop_sleep_time` elapses.
async fn run_daemon(args: &Args) -> anyhow::Result<()> {
    let mut settings = Settings::load(std::path::Path::new(&args.file)).unwrap_or_else(|e| {
        warn!(error = %e, file = %args.file, "using default configuration");
        Settings::default()
    });
    if let Some(secret) = &args.secret {
        settings.cluster.password = Some(secret.clone());
    }
    if let Some(id) = &args.id {
        settings.node.id = Some(id.clone());
    }

    let own_id = settings.node.resolved_id().unwrap_or_else(NodeId::new_random);
    let mut nexus_config = NexusConfig::from_settings(&settings, own_id);
    if let Some(host) = &args.host {
        nexus_config.advertise_addr = host.parse().context("--host is not a valid IP address")?;
    }
    info!(id = %own_id, port = nexus_config.port, "starting koi");

    let transport = Transport::bind(IpAddr::V4(Ipv4Addr::UNSPECIFIED), nexus_config.port, true, true)
        .await
        .context("cannot bind UDP socket")?;
    let bound_port = transport.local_port();

    let mut nexus = Nexus::new(nexus_config, transport, Instant::now()).context("cannot open services workingdir")?;
    info!(port = bound_port, "bound");

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mainloop_sleep = settings.time.mainloop_sleep_time();

    let mut buf = vec![0u8; 65536];
    loop {
        let sleep = tokio::time::sleep(mainloop_sleep);
        tokio::select! {
            () = nexus.recv_and_dispatch(&mut buf, Instant::now()) => {}
            _ = sleep => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("terminated, shutting down");
                return Ok(());
            }
            _ = sighup.recv() => {
                info!("hangup, shutting down");
                return Ok(());
            }
            _ = sigusr1.recv() => {
                info!("reload requested");
                match Settings::load(std::path::Path::new(&args.file)) {
                    Ok(reloaded) => settings = reloaded,
                    Err(e) => warn!(error = %e, "reload failed, keeping current settings"),
                }
            }
        }

        nexus.update(Instant::now()).await;

        if nexus.take_reconfigure_request() {
            info!("reconfigure requested via RPC, exiting for supervisor restart");
            return Ok(());
        }
    }
}
