//! Rate-limited OSC sender for three color channels.
//!
//! Each [`send`](Transmitter::send) goes through a minimum-interval gate
//! (`1000 / rate_hz` ms). Calls inside the interval are dropped, never
//! queued. Values are mapped from `[0, 1]` to `[-1, 1]`, rounded to three
//! decimals and sent as one UDP datagram per channel.
//!
//! Socket errors are logged and drop the socket; the next send that
//! passes the gate binds a fresh one.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::color::ColorSample;
use crate::error::AutolightError;
use crate::osc::encoder::encode_message;

// ── OscTarget ────────────────────────────────────────────────────

/// Where and under which addresses channel values are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscTarget {
    pub host: String,
    pub port: u16,
    /// Address prefix, e.g. `/avatar/parameters`.
    pub namespace: String,
    /// Parameter names for red, green and blue.
    pub params: [String; 3],
}

impl Default for OscTarget {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9000,
            namespace: "/avatar/parameters".into(),
            params: ["AL_Red".into(), "AL_Green".into(), "AL_Blue".into()],
        }
    }
}

impl OscTarget {
    /// `{namespace}/{param}` for each channel.
    pub fn addresses(&self) -> [String; 3] {
        let ns = self.namespace.trim_end_matches('/');
        self.params.clone().map(|p| format!("{ns}/{p}"))
    }

    pub fn endpoint(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Map a `[0, 1]` channel onto the `[-1, 1]` wire range at 3-decimal
/// precision.
pub fn wire_value(v: f32) -> f32 {
    ((v * 2.0 - 1.0) * 1000.0).round() / 1000.0
}

// ── SendOutcome ──────────────────────────────────────────────────

/// What happened to one [`Transmitter::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// All three datagrams went out.
    Sent,
    /// Dropped by the rate gate.
    Throttled,
    /// The socket failed; it will be rebuilt on the next send.
    Failed,
}

// ── Transmitter ──────────────────────────────────────────────────

pub struct Transmitter {
    target: OscTarget,
    addresses: [String; 3],
    rate_hz: f32,
    last_sent: Option<Instant>,
    socket: Option<UdpSocket>,
}

impl Transmitter {
    /// A transmitter with no socket yet; the first send binds one.
    pub fn new(target: OscTarget, rate_hz: f32) -> Self {
        let addresses = target.addresses();
        Self {
            target,
            addresses,
            rate_hz,
            last_sent: None,
            socket: None,
        }
    }

    /// Bind and connect the socket now, surfacing any error.
    pub async fn connect(&mut self) -> Result<(), AutolightError> {
        let socket = open_socket(&self.target).await?;
        info!(
            "OSC output to {} ({})",
            self.target.endpoint(),
            self.addresses.join(", ")
        );
        self.socket = Some(socket);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn target(&self) -> &OscTarget {
        &self.target
    }

    /// Peer address of the live socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.peer_addr().ok())
    }

    pub fn rate_hz(&self) -> f32 {
        self.rate_hz
    }

    /// When the last send passed the gate.
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// Change the gate rate. The next send passes immediately.
    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz;
        self.last_sent = None;
    }

    /// Point at a new destination. The socket is rebuilt lazily.
    pub fn set_target(&mut self, target: OscTarget) {
        if target != self.target {
            self.addresses = target.addresses();
            self.target = target;
            self.socket = None;
        }
    }

    /// Minimum spacing between sends, or `None` when ungated.
    pub fn min_interval(&self) -> Option<Duration> {
        (self.rate_hz > 0.0).then(|| {
            Duration::try_from_secs_f64(1.0 / self.rate_hz as f64).unwrap_or(Duration::MAX)
        })
    }

    pub async fn send(&mut self, color: ColorSample) -> SendOutcome {
        self.send_at(Instant::now(), color).await
    }

    /// [`send`](Self::send) with an explicit clock (for testing).
    pub async fn send_at(&mut self, now: Instant, color: ColorSample) -> SendOutcome {
        if let (Some(interval), Some(last)) = (self.min_interval(), self.last_sent) {
            if now.saturating_duration_since(last) < interval {
                return SendOutcome::Throttled;
            }
        }
        self.last_sent = Some(now);

        if self.socket.is_none() {
            match open_socket(&self.target).await {
                Ok(socket) => {
                    debug!("OSC socket bound for {}", self.target.endpoint());
                    self.socket = Some(socket);
                }
                Err(e) => {
                    warn!("OSC socket unavailable: {e}");
                    return SendOutcome::Failed;
                }
            }
        }
        let Some(socket) = self.socket.as_ref() else {
            return SendOutcome::Failed;
        };

        for (address, value) in self.addresses.iter().zip(color.to_array()) {
            let msg = encode_message(address, wire_value(value));
            if let Err(e) = socket.send(&msg).await {
                warn!("OSC send to {address} failed: {e}; dropping socket");
                self.socket = None;
                return SendOutcome::Failed;
            }
        }
        SendOutcome::Sent
    }
}

async fn open_socket(target: &OscTarget) -> Result<UdpSocket, AutolightError> {
    let endpoint = target.endpoint();
    let remote = tokio::net::lookup_host(&endpoint)
        .await?
        .next()
        .ok_or_else(|| AutolightError::Config(format!("cannot resolve {endpoint}")))?;
    let local = if remote.is_ipv4() {
        SocketAddr::from(([0u8; 4], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(remote).await?;
    Ok(socket)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::encoder::decode_message;

    async fn receiver() -> (UdpSocket, OscTarget) {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = OscTarget {
            port: rx.local_addr().unwrap().port(),
            ..OscTarget::default()
        };
        (rx, target)
    }

    async fn recv_one(rx: &UdpSocket) -> (String, f32) {
        let mut buf = [0u8; 256];
        let n = tokio::time::timeout(Duration::from_secs(2), rx.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        decode_message(&buf[..n]).unwrap()
    }

    #[test]
    fn wire_mapping_and_rounding() {
        assert_eq!(wire_value(1.0), 1.0);
        assert_eq!(wire_value(0.0), -1.0);
        assert_eq!(wire_value(128.0 / 255.0), 0.004);
        assert_eq!(wire_value(0.5), 0.0);
    }

    #[test]
    fn addresses_join_namespace_and_params() {
        let mut t = OscTarget::default();
        assert_eq!(t.addresses()[1], "/avatar/parameters/AL_Green");
        t.namespace = "/custom/".into();
        assert_eq!(t.addresses()[2], "/custom/AL_Blue");
        assert_eq!(t.endpoint(), "127.0.0.1:9000");
    }

    #[test]
    fn gate_interval() {
        assert_eq!(
            Transmitter::new(OscTarget::default(), 5.0).min_interval(),
            Some(Duration::from_millis(200))
        );
        assert_eq!(Transmitter::new(OscTarget::default(), 0.0).min_interval(), None);
        assert_eq!(Transmitter::new(OscTarget::default(), -3.0).min_interval(), None);
        assert_eq!(
            Transmitter::new(OscTarget::default(), 1e-30).min_interval(),
            Some(Duration::MAX)
        );
    }

    #[tokio::test]
    async fn sends_three_messages_in_channel_order() {
        let (rx, target) = receiver().await;
        let mut tx = Transmitter::new(target, 0.0);
        let outcome = tx.send(ColorSample::new(1.0, 128.0 / 255.0, 0.0)).await;
        assert_eq!(outcome, SendOutcome::Sent);

        assert_eq!(recv_one(&rx).await, ("/avatar/parameters/AL_Red".into(), 1.0));
        assert_eq!(recv_one(&rx).await, ("/avatar/parameters/AL_Green".into(), 0.004));
        assert_eq!(recv_one(&rx).await, ("/avatar/parameters/AL_Blue".into(), -1.0));
    }

    #[tokio::test]
    async fn rate_gate_at_5hz() {
        let (_rx, target) = receiver().await;
        let mut tx = Transmitter::new(target, 5.0);
        let t0 = Instant::now();
        let c = ColorSample::WHITE;

        assert_eq!(tx.send_at(t0, c).await, SendOutcome::Sent);
        assert_eq!(
            tx.send_at(t0 + Duration::from_millis(100), c).await,
            SendOutcome::Throttled
        );
        assert_eq!(
            tx.send_at(t0 + Duration::from_millis(300), c).await,
            SendOutcome::Sent
        );
    }

    #[tokio::test]
    async fn throttled_sends_do_not_move_the_gate() {
        let (_rx, target) = receiver().await;
        let mut tx = Transmitter::new(target, 5.0);
        let t0 = Instant::now();
        let c = ColorSample::WHITE;

        assert_eq!(tx.send_at(t0, c).await, SendOutcome::Sent);
        for ms in [50, 100, 150] {
            assert_eq!(
                tx.send_at(t0 + Duration::from_millis(ms), c).await,
                SendOutcome::Throttled
            );
        }
        assert_eq!(
            tx.send_at(t0 + Duration::from_millis(200), c).await,
            SendOutcome::Sent
        );
    }

    #[tokio::test]
    async fn set_rate_rearms_the_gate() {
        let (_rx, target) = receiver().await;
        let mut tx = Transmitter::new(target, 1.0);
        let t0 = Instant::now();
        assert_eq!(tx.send_at(t0, ColorSample::WHITE).await, SendOutcome::Sent);
        tx.set_rate(2.0);
        assert_eq!(
            tx.send_at(t0 + Duration::from_millis(10), ColorSample::WHITE).await,
            SendOutcome::Sent
        );
    }

    #[tokio::test]
    async fn unresolvable_host_fails_without_panicking() {
        let mut tx = Transmitter::new(
            OscTarget {
                host: "host.invalid".into(),
                ..OscTarget::default()
            },
            0.0,
        );
        assert_eq!(tx.send(ColorSample::WHITE).await, SendOutcome::Failed);
        assert!(!tx.is_connected());
        assert!(tx.connect().await.is_err());
    }

    #[tokio::test]
    async fn send_error_drops_socket_and_next_send_rebinds() {
        // Reserve a port, then close it so the first datagram is refused.
        let port = UdpSocket::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let target = OscTarget {
            port,
            ..OscTarget::default()
        };
        let mut tx = Transmitter::new(target, 5.0);
        tx.connect().await.unwrap();

        // The refusal surfaces on the send after the one that triggered it.
        let t0 = Instant::now();
        let mut outcome = SendOutcome::Sent;
        for i in 0..10 {
            outcome = tx
                .send_at(t0 + Duration::from_secs(i), ColorSample::WHITE)
                .await;
            if outcome == SendOutcome::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(outcome, SendOutcome::Failed);
        assert!(!tx.is_connected());

        let rx = UdpSocket::bind(("127.0.0.1", port)).await.unwrap();
        assert_eq!(
            tx.send_at(t0 + Duration::from_secs(20), ColorSample::WHITE).await,
            SendOutcome::Sent
        );
        assert!(tx.is_connected());
        assert_eq!(recv_one(&rx).await, ("/avatar/parameters/AL_Red".into(), 1.0));
    }

    #[tokio::test]
    async fn retarget_drops_socket() {
        let (_rx, target) = receiver().await;
        let mut tx = Transmitter::new(target.clone(), 0.0);
        tx.connect().await.unwrap();
        assert!(tx.is_connected());

        tx.set_target(target.clone());
        assert!(tx.is_connected());

        tx.set_target(OscTarget {
            port: target.port.wrapping_add(1),
            ..target
        });
        assert!(!tx.is_connected());
    }
}
