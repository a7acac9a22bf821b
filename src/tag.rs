/// Tag pipeline: beacon advertising plus RFID scan forwarding.
///
/// The beacon is started once at boot and left running. The card reader is
/// polled every cycle; a read UID is published to
/// `warehouse/scanner/rack_scan` only when it differs from the previous
/// read UID, so a card resting on the reader reports once.
use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::bus::{BusManager, BusTransport};
use crate::config::TagConfig;
use crate::defaults::{BEACON_RETRY_MS, RACK_SCAN_TOPIC};
use crate::node::{CycleReport, Node, Phase};
use crate::protocol::{MsgBuffer, ScanEvent, UidString};

/// Longest ISO 14443 UID (triple size)
pub const MAX_UID_LEN: usize = 10;

/// Raw UID bytes as read from a card
pub type CardUid = Vec<u8, MAX_UID_LEN>;

/// Identity-card reader.
pub trait CardReader {
    /// Poll for a card. `None` covers both "no card" and "serial unreadable".
    fn poll(&mut self) -> Option<CardUid>;

    /// Halt the card and stop any crypto session so the next poll starts
    /// clean.
    fn end_session(&mut self);
}

/// Discoverable beacon.
pub trait BeaconAdvertiser {
    type Error: core::fmt::Debug;

    /// Start advertising `name` until power-off.
    fn start_advertising(&mut self, name: &str) -> Result<(), Self::Error>;
}

/// Format UID bytes as uppercase hex, two digits per byte, no separators.
pub fn format_uid(uid: &[u8], out: &mut UidString) {
    out.clear();
    for b in uid.iter().take(MAX_UID_LEN) {
        let _ = write!(out, "{:02X}", b);
    }
}

/// Single-slot duplicate filter over read UIDs.
///
/// Only the immediately previous UID is remembered: `A, B, A` reports all
/// three.
#[derive(Debug, Default)]
pub struct ScanDedup {
    last: Option<UidString>,
}

impl ScanDedup {
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Record a read. Returns true when `uid` differs from the previous one.
    pub fn observe(&mut self, uid: &str) -> bool {
        if self.last.as_deref() == Some(uid) {
            return false;
        }
        self.last = UidString::try_from(uid).ok();
        true
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

/// Tag node loop state.
pub struct TagNode<T, D, R> {
    config: TagConfig,
    bus: BusManager<T, D>,
    reader: R,
    dedup: ScanDedup,
    buf: MsgBuffer,
}

impl<T, D, R> TagNode<T, D, R>
where
    T: BusTransport,
    D: DelayNs,
    R: CardReader,
{
    pub fn new(config: TagConfig, bus: BusManager<T, D>, reader: R) -> Self {
        Self {
            config,
            bus,
            reader,
            dedup: ScanDedup::new(),
            buf: MsgBuffer::new(),
        }
    }

    /// Start the identity beacon. Call once at boot.
    ///
    /// Retries every [`BEACON_RETRY_MS`] until the radio accepts the
    /// advertisement and returns the number of attempts. Returns 0 without
    /// touching the radio if the beacon name cannot be built.
    pub fn start<A: BeaconAdvertiser>(&mut self, advertiser: &mut A) -> u32 {
        let name = match self.config.beacon_name() {
            Ok(name) => name,
            Err(_) => {
                log::error!("Beacon name for {} does not fit", self.config.id);
                return 0;
            }
        };
        let mut attempts = 0;
        loop {
            attempts += 1;
            match advertiser.start_advertising(&name) {
                Ok(()) => {
                    log::info!("Tag broadcasting BLE beacon as '{}'", name);
                    return attempts;
                }
                Err(e) => {
                    log::error!(
                        "BLE advertising failed: {:?}, retrying in {} ms",
                        e,
                        BEACON_RETRY_MS
                    );
                    self.bus.delay_mut().delay_ms(BEACON_RETRY_MS);
                }
            }
        }
    }

    pub fn bus(&self) -> &BusManager<T, D> {
        &self.bus
    }

    pub fn dedup(&self) -> &ScanDedup {
        &self.dedup
    }

    /// Handle one card read. Returns whether a scan event was published.
    fn handle_card(&mut self, uid: &[u8]) -> bool {
        let mut hex = UidString::new();
        format_uid(uid, &mut hex);

        if !self.dedup.observe(&hex) {
            log::debug!("UID {} still present, suppressed", hex);
            return false;
        }

        log::info!("Scanned RFID UID: {}", hex);
        let event = ScanEvent {
            uid: hex,
            tag_id: self.config.id.clone(),
        };
        if event.write_json(&mut self.buf).is_err() {
            log::warn!("Scan event exceeds buffer, dropped");
            return false;
        }
        self.bus.publish(RACK_SCAN_TOPIC, &self.buf)
    }
}

impl<T, D, R> Node for TagNode<T, D, R>
where
    T: BusTransport,
    D: DelayNs,
    R: CardReader,
{
    fn cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            connect_attempts: self.bus.ensure_connected(),
            idle_ms: self.config.no_card_idle_ms,
            ..CycleReport::default()
        };

        self.bus.service();

        log::trace!("{}: RFID poll", Phase::Sense.as_str());
        let Some(uid) = self.reader.poll() else {
            return report;
        };
        report.sensed = 1;

        if self.handle_card(&uid) {
            report.published = 1;
        } else {
            report.skipped = 1;
        }

        self.reader.end_session();
        report.idle_ms = self.config.card_idle_ms;
        report
    }
}
