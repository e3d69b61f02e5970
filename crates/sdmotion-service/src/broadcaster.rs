//! `UdpBroadcaster`: binds the registration/streaming socket and runs the
//! two cooperating loops described in the service's concurrency model —
//! a receive loop that maintains the subscriber registry, and a lazily
//! started, rate-limited send loop that fans motion samples out to it.

use crate::error::{ServiceError, ServiceResult};
use sdmotion_core::{MotionAdapter, SubscriberRegistry};
use sdmotion_types::MotionSample;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Datagrams are sent to subscribers at this rate regardless of how fast
/// the producer is supplying raw frames.
const SEND_RATE_HZ: u64 = 60;
/// `recvfrom` timeout: bounds how long the stop flag can go unnoticed.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);
/// Registration datagrams are never meaningfully larger than this; content
/// is ignored either way.
const MAX_DATAGRAM_LEN: usize = 512;

/// Owns the UDP socket and subscriber registry shared by the receive and
/// send loops.
pub struct UdpBroadcaster {
    socket: Arc<UdpSocket>,
    registry: Arc<SubscriberRegistry>,
    send_gate: Arc<Mutex<()>>,
}

impl UdpBroadcaster {
    /// Bind `0.0.0.0:port` with a 2-second receive timeout.
    pub fn bind(port: u16) -> ServiceResult<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let socket = UdpSocket::bind(addr).map_err(|source| ServiceError::SocketBind { addr, source })?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .map_err(|source| ServiceError::SocketBind { addr, source })?;
        let local_addr = socket.local_addr().unwrap_or(addr);
        debug!(addr = %local_addr, "sdmotion-service: socket bound");
        Ok(Self {
            socket: Arc::new(socket),
            registry: Arc::new(SubscriberRegistry::new()),
            send_gate: Arc::new(Mutex::new(())),
        })
    }

    /// The bound local address (useful when `port` was `0` and the OS
    /// picked one).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Number of currently registered subscribers, for diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Run the receive loop on the calling thread until `stop` is set,
    /// lazily starting the send loop on the first registered subscriber
    /// and joining it before returning.
    pub fn run(self, adapter: MotionAdapter, stop: &AtomicBool) {
        let send_stop = Arc::new(AtomicBool::new(false));
        let mut send_handle: Option<JoinHandle<()>> = None;
        let mut adapter = Some(adapter);
        let mut buf = [0u8; MAX_DATAGRAM_LEN];

        while !stop.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((_, peer)) => {
                    self.registry.touch(peer);
                    self.registry.sweep();
                    if send_handle.is_none() {
                        if let Some(adapter) = adapter.take() {
                            send_handle = self.spawn_send_loop(adapter, Arc::clone(&send_stop));
                        }
                    }
                }
                Err(err) if is_timeout(&err) => continue,
                Err(err) => {
                    warn!(error = %err, "sdmotion-service: recvfrom failed");
                }
            }
        }

        send_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = send_handle.take() {
            let _ = handle.join();
        }
    }

    fn spawn_send_loop(
        &self,
        adapter: MotionAdapter,
        send_stop: Arc<AtomicBool>,
    ) -> Option<JoinHandle<()>> {
        let socket = Arc::clone(&self.socket);
        let registry = Arc::clone(&self.registry);
        let send_gate = Arc::clone(&self.send_gate);
        std::thread::Builder::new()
            .name("sdmotion-send".into())
            .spawn(move || send_loop(socket, registry, send_gate, adapter, &send_stop))
            .map_err(|err| warn!(error = %err, "sdmotion-service: failed to spawn send loop"))
            .ok()
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

fn send_loop(
    socket: Arc<UdpSocket>,
    registry: Arc<SubscriberRegistry>,
    send_gate: Arc<Mutex<()>>,
    mut adapter: MotionAdapter,
    stop: &AtomicBool,
) {
    if let Err(err) = adapter.start() {
        warn!(error = %err, "sdmotion-service: send loop failed to start adapter");
        return;
    }
    debug!("sdmotion-service: send loop started");

    let interval = Duration::from_micros(1_000_000 / SEND_RATE_HZ);
    let mut next_send = Instant::now() + interval;
    let mut sample = MotionSample::new(0, 0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);

    while !stop.load(Ordering::SeqCst) {
        if adapter.try_get(&mut sample) {
            let payload = sample.to_json();
            let peers = registry.snapshot();
            let _gate = send_gate.lock().unwrap_or_else(|e| e.into_inner());
            for peer in peers {
                let _ = socket.send_to(payload.as_bytes(), peer);
            }
        }

        next_send += interval;
        let now = Instant::now();
        if next_send > now {
            std::thread::sleep(next_send - now);
        } else {
            // Fell behind by more than one interval; resync instead of
            // spinning through a backlog of already-missed deadlines.
            next_send = now;
        }
    }

    adapter.stop();
    debug!("sdmotion-service: send loop stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use sdmotion_hid::mock::MockFrameProducer;
    use std::net::UdpSocket as StdUdpSocket;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn raw(increment: u32) -> sdmotion_hid::RawFrame {
        sdmotion_hid::RawFrame {
            header: 0,
            increment,
            accel_rtl: 0,
            accel_ftb: 0,
            accel_ttb: 16384,
            gyro_rtl: 16,
            gyro_ftb: 0,
            gyro_ttb: 0,
        }
    }

    #[test]
    fn binds_ephemeral_port_and_reports_local_addr() {
        let broadcaster = UdpBroadcaster::bind(0).expect("bind succeeds");
        let addr = broadcaster.local_addr().expect("local_addr succeeds");
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn registration_then_streaming_reaches_a_subscriber() {
        let broadcaster = UdpBroadcaster::bind(0).expect("bind succeeds");
        let server_addr = broadcaster.local_addr().expect("local_addr succeeds");

        let producer = Arc::new(MockFrameProducer::new());
        producer.push_frames((0..=2000u32).map(raw));
        let adapter = MotionAdapter::new(producer);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let server = std::thread::spawn(move || broadcaster.run(adapter, &stop_for_thread));

        let client = StdUdpSocket::bind("127.0.0.1:0").expect("client bind");
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        client.send_to(b"hello", server_addr).expect("registration datagram");

        let mut buf = [0u8; 1024];
        let (n, _) = client.recv_from(&mut buf).expect("receives a motion datagram");
        let text = std::str::from_utf8(&buf[..n]).expect("utf8 payload");
        assert!(text.starts_with("{\"timestamp\":"));
        assert!(text.contains("\"frameId\":"));

        stop.store(true, Ordering::SeqCst);
        server.join().expect("server thread joins");
    }
}
