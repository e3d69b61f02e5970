//! Real `hidapi`-backed [`FrameProducer`] for Steam Deck Controls.
//!
//! Gated behind the `device` feature so library consumers and tests don't
//! need a physical device or the `hidapi` system dependency; the service
//! binary enables it by default.

use crate::error::{HidError, HidResult};
use crate::frame::RawFrame;
use crate::producer::{FrameProducer, FrameServe};
use crate::report;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Steam Deck Controls' USB Vendor ID.
pub const STEAM_DECK_VID: u16 = 0x28de;
/// Steam Deck Controls' USB Product ID.
pub const STEAM_DECK_PID: u16 = 0x1205;
/// Steam Deck Controls' USB interface number carrying motion reports.
pub const STEAM_DECK_INTERFACE: i32 = 2;
/// Compatibility start-marker prefix used to locate the report within a
/// raw transfer.
pub const DEFAULT_START_MARKER: [u8; 4] = [0x01, 0x00, 0x09, 0x40];
/// Read-timeout granularity used to let the reader thread notice a
/// `stop()` promptly without busy-spinning.
const READ_POLL_MS: i32 = 100;

/// A single-slot rendezvous mailbox: `publish` blocks until the previous
/// frame has been taken, so the reader thread naturally paces itself to
/// the consumer — the lock-step handoff the motion pipeline expects from
/// its producer.
struct Rendezvous {
    slot: Mutex<(Option<RawFrame>, bool)>,
    cvar: Condvar,
}

impl Rendezvous {
    fn new() -> Self {
        Self {
            slot: Mutex::new((None, false)),
            cvar: Condvar::new(),
        }
    }

    fn publish(&self, frame: RawFrame) {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        while guard.0.is_some() && !guard.1 {
            guard = self.cvar.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
        if guard.1 {
            return;
        }
        guard.0 = Some(frame);
        self.cvar.notify_all();
    }

    fn take(&self) -> Option<RawFrame> {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        while guard.0.is_none() && !guard.1 {
            guard = self.cvar.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
        let frame = guard.0.take();
        self.cvar.notify_all();
        frame
    }

    fn shutdown(&self) {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        guard.1 = true;
        self.cvar.notify_all();
    }
}

/// Frame producer that reads Steam Deck Controls' HID reports via
/// `hidapi` on a dedicated reader thread.
pub struct HidApiFrameProducer {
    vendor_id: u16,
    product_id: u16,
    interface_number: i32,
    start_marker: Vec<u8>,
    running: Arc<AtomicBool>,
    rendezvous: Arc<Rendezvous>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl HidApiFrameProducer {
    pub fn new(vendor_id: u16, product_id: u16, interface_number: i32) -> Self {
        Self {
            vendor_id,
            product_id,
            interface_number,
            start_marker: DEFAULT_START_MARKER.to_vec(),
            running: Arc::new(AtomicBool::new(false)),
            rendezvous: Arc::new(Rendezvous::new()),
            reader: Mutex::new(None),
        }
    }

    /// Override the start-marker prefix used to locate the report.
    pub fn with_start_marker(mut self, marker: Vec<u8>) -> Self {
        self.start_marker = marker;
        self
    }

    fn read_loop(
        device: hidapi::HidDevice,
        running: Arc<AtomicBool>,
        rendezvous: Arc<Rendezvous>,
        start_marker: Vec<u8>,
    ) {
        let mut buf = [0u8; 256];
        while running.load(Ordering::SeqCst) {
            match device.read_timeout(&mut buf, READ_POLL_MS) {
                Ok(0) => continue,
                Ok(len) => {
                    let Some(data) = buf.get(..len) else {
                        continue;
                    };
                    let offset = if start_marker.is_empty() {
                        Some(0)
                    } else {
                        report::find_marker(data, &start_marker)
                    };
                    let Some(offset) = offset else {
                        continue;
                    };
                    let Some(report_bytes) = data.get(offset..offset + report::REPORT_LEN) else {
                        continue;
                    };
                    if let Some(frame) = RawFrame::from_report(report_bytes) {
                        rendezvous.publish(frame);
                    }
                }
                Err(err) => {
                    let err = HidError::ReadFailed(err.to_string());
                    warn!(error = %err, "sdmotion-hid: HID read failed");
                }
            }
        }
        debug!("sdmotion-hid: reader thread exiting");
        rendezvous.shutdown();
    }
}

impl FrameProducer for HidApiFrameProducer {
    fn start(&self) -> HidResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let api = hidapi::HidApi::new().map_err(|e| HidError::OpenFailed(e.to_string()))?;
        let device_info = api
            .device_list()
            .find(|info| {
                info.vendor_id() == self.vendor_id
                    && info.product_id() == self.product_id
                    && info.interface_number() == self.interface_number
            })
            .ok_or(HidError::DeviceNotFound {
                vendor_id: self.vendor_id,
                product_id: self.product_id,
            })?;

        let device = device_info
            .open_device(&api)
            .map_err(|e| HidError::OpenFailed(e.to_string()))?;

        let running = Arc::clone(&self.running);
        let rendezvous = Arc::clone(&self.rendezvous);
        let start_marker = self.start_marker.clone();
        let handle = std::thread::Builder::new()
            .name("sdmotion-hid-reader".into())
            .spawn(move || Self::read_loop(device, running, rendezvous, start_marker))
            .map_err(|e| HidError::OpenFailed(e.to_string()))?;

        *self.reader.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.rendezvous.shutdown();
        if let Some(handle) = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
    }

    fn serve(&self) -> Arc<dyn FrameServe> {
        Arc::new(HidApiServe {
            rendezvous: Arc::clone(&self.rendezvous),
        })
    }
}

struct HidApiServe {
    rendezvous: Arc<Rendezvous>,
}

impl FrameServe for HidApiServe {
    fn consume(&self) -> HidResult<RawFrame> {
        self.rendezvous.take().ok_or(HidError::NotRunning)
    }
}
