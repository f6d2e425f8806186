use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use koi_proto::Endpoint;
use thiserror::Error;
use tracing::{debug, warn};

const PORT_INCREMENT_ATTEMPTS: u16 = 1000;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket on {addr} after {attempts} attempt(s): {source}")]
    BindFailed { addr: SocketAddr, attempts: u16, #[source] source: std::io::Error },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One outbound peer link: a destination endpoint, and whether it is a
/// multicast group (only heartbeats go there) or a unicast peer (every
/// message kind goes there), per spec §4.3.
#[derive(Debug, Clone)]
pub struct Link {
    pub endpoint: Endpoint,
    pub multicast: bool,
}

/// The single UDP socket owned by the Nexus (spec §4.3).
pub struct Transport {
    socket: tokio::net::UdpSocket,
    local_port: u16,
    links: Vec<Link>,
}

impl Transport {
    /// Binds to `desired_port`, optionally setting `SO_REUSEADDR`, and
    /// optionally retrying at `desired_port + 1 ..= desired_port + 1000`
    /// when the port is already in use.
    pub async fn bind(
        bind_addr: IpAddr,
        desired_port: u16,
        reuse_addr: bool,
        increment_port: bool,
    ) -> Result<Self, TransportError> {
        let max_attempts = if increment_port { PORT_INCREMENT_ATTEMPTS } else { 0 };
        let mut last_err = None;
        for offset in 0..=max_attempts {
            let port = desired_port.wrapping_add(offset);
            let addr = SocketAddr::new(bind_addr, port);
            match bind_one(addr, reuse_addr) {
                Ok(std_socket) => {
                    std_socket.set_nonblocking(true)?;
                    let socket = tokio::net::UdpSocket::from_std(std_socket)?;
                    if offset > 0 {
                        warn!(requested = desired_port, bound = port, "port in use, incremented");
                    }
                    return Ok(Self { socket, local_port: port, links: Vec::new() });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(TransportError::BindFailed {
            addr: SocketAddr::new(bind_addr, desired_port),
            attempts: max_attempts + 1,
            source: last_err.unwrap(),
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Adds an outbound link. For a multicast endpoint, joins the group on
    /// the underlying socket and enables multicast loopback so a node can
    /// observe its own heartbeats reflected back (harmless, deduplicated
    /// upstream by the cluster layer ignoring self-heartbeats).
    pub fn add_link(&mut self, endpoint: Endpoint, multicast: bool) -> std::io::Result<()> {
        if multicast {
            match endpoint.addr {
                IpAddr::V4(group) => {
                    self.socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)?;
                    self.socket.set_multicast_loop_v4(true)?;
                }
                IpAddr::V6(group) => {
                    self.socket.join_multicast_v6(&group, 0)?;
                    self.socket.set_multicast_loop_v6(true)?;
                }
            }
        }
        self.links.push(Link { endpoint, multicast });
        Ok(())
    }

    pub fn remove_link(&mut self, endpoint: &Endpoint) {
        self.links.retain(|l| &l.endpoint != endpoint);
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub async fn send_unicast(&self, to: Endpoint, frame: &[u8]) -> std::io::Result<()> {
        self.send_raw(to, frame).await
    }

    /// Sends `frame` to every unicast link, and — only if `is_heartbeat` —
    /// to every multicast link too (spec §4.3).
    pub async fn broadcast(&self, frame: &[u8], is_heartbeat: bool) {
        for link in &self.links {
            if link.multicast && !is_heartbeat {
                continue;
            }
            if let Err(e) = self.send_raw(link.endpoint, frame).await {
                warn!(to = %link.endpoint, error = %e, "transient send failure");
            }
        }
    }

    async fn send_raw(&self, to: Endpoint, frame: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(frame, SocketAddr::new(to.addr, to.port)).await.map(|_| ())
    }

    /// Receives one datagram. Callers are responsible for frame-decoding
    /// and dropping malformed datagrams silently (spec §4.3, §7).
    pub async fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        let (n, from) = self.socket.recv_from(buf).await?;
        debug!(bytes = n, from = %from, "datagram received");
        Ok((n, from))
    }
}

fn bind_one(addr: SocketAddr, reuse_addr: bool) -> std::io::Result<std::net::UdpSocket> {
    use socket2::{Domain, Socket, Type};
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    if reuse_addr {
        socket.set_reuse_address(true)?;
    }
    socket.bind(&addr.into())?;
    Ok(socket.into())
}
