/// BLE discovery boundary for anchors.
///
/// The radio driver is reached through [`BeaconScanner`]: one blocking scan
/// per call. The caller's filter runs on every advertisement report as it
/// arrives, so the fixed-size result only ever holds beacons the caller
/// wants. Drivers feed reports through a [`WindowCollector`], and use
/// [`parse_adv_name`] when they only have raw advertisement bytes.
use heapless::Vec;

use crate::protocol::NameString;

/// Maximum accepted sightings kept from one scan window.
pub const MAX_SIGHTINGS: usize = 32;

/// Advertiser address as reported by the radio
pub type BeaconAddr = [u8; 6];

/// One advertisement heard during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    /// Local name, if the advertisement carried a readable one
    pub name: Option<NameString>,
    pub rssi: i8,
}

impl Sighting {
    pub fn new(name: Option<&str>, rssi: i8) -> Self {
        Self {
            name: name.and_then(|n| NameString::try_from(n).ok()),
            rssi,
        }
    }

    /// Build a sighting from raw AD structures.
    pub fn from_adv(rssi: i8, ad_data: &[u8]) -> Self {
        Self {
            name: parse_adv_name(ad_data),
            rssi,
        }
    }
}

/// Sightings collected over one scan window
pub type Sightings = Vec<Sighting, MAX_SIGHTINGS>;

/// Synchronous discovery scan.
pub trait BeaconScanner {
    /// Scan for `window_ms` and return the sightings `accept` kept, at most
    /// one per advertiser. Blocks for the whole window.
    fn scan<F>(&mut self, window_ms: u32, accept: F) -> Sightings
    where
        F: FnMut(&Sighting) -> bool;
}

/// Builds one window's result from raw advertisement reports.
///
/// Reports from an address already kept are ignored. Everything else goes
/// through `accept` first; only accepted sightings take a slot, so
/// unrelated advertisers can never crowd out a beacon.
pub struct WindowCollector<F> {
    accept: F,
    seen: Vec<BeaconAddr, MAX_SIGHTINGS>,
    sightings: Sightings,
    dropped: u16,
}

impl<F> WindowCollector<F>
where
    F: FnMut(&Sighting) -> bool,
{
    pub fn new(accept: F) -> Self {
        Self {
            accept,
            seen: Vec::new(),
            sightings: Sightings::new(),
            dropped: 0,
        }
    }

    /// Offer one report. Returns `true` if it was kept.
    pub fn offer(&mut self, addr: BeaconAddr, sighting: Sighting) -> bool {
        if self.seen.contains(&addr) || !(self.accept)(&sighting) {
            return false;
        }
        if self.sightings.is_full() {
            self.dropped = self.dropped.saturating_add(1);
            return false;
        }
        // Same capacity, pushed together
        let _ = self.seen.push(addr);
        let _ = self.sightings.push(sighting);
        true
    }

    /// Accepted sightings that did not fit.
    pub fn dropped(&self) -> u16 {
        self.dropped
    }

    pub fn finish(self) -> Sightings {
        if self.dropped > 0 {
            log::warn!(
                "{} accepted sightings over the {} slot limit dropped",
                self.dropped,
                MAX_SIGHTINGS
            );
        }
        self.sightings
    }
}

/// Extract the local name from BLE advertisement data.
///
/// AD structure format: [length] [type] [data...]
///   0x08 = Shortened local name
///   0x09 = Complete local name
///
/// A complete name wins over a shortened one. Truncated structures end the
/// walk; names that are not UTF-8 or too long are ignored.
pub fn parse_adv_name(ad_data: &[u8]) -> Option<NameString> {
    let mut shortened = None;

    let mut pos = 0;
    while pos < ad_data.len() {
        let len = ad_data[pos] as usize;
        if len == 0 || pos + 1 + len > ad_data.len() {
            break;
        }

        let ad_type = ad_data[pos + 1];
        let data = &ad_data[pos + 2..pos + 1 + len];

        match ad_type {
            0x09 => {
                if let Some(name) = decode_name(data) {
                    return Some(name);
                }
            }
            0x08 => {
                if shortened.is_none() {
                    shortened = decode_name(data);
                }
            }
            _ => {}
        }

        pos += 1 + len;
    }

    shortened
}

fn decode_name(data: &[u8]) -> Option<NameString> {
    let s = core::str::from_utf8(data).ok()?;
    if s.is_empty() {
        return None;
    }
    NameString::try_from(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: usize) -> BeaconAddr {
        [n as u8, (n >> 8) as u8, 0, 0, 0, 0xAA]
    }

    fn is_tag(s: &Sighting) -> bool {
        matches!(s.name.as_deref(), Some(n) if n.starts_with("TAG_"))
    }

    fn ad(ad_type: u8, data: &[u8]) -> std::vec::Vec<u8> {
        let mut v = std::vec![(data.len() + 1) as u8, ad_type];
        v.extend_from_slice(data);
        v
    }

    #[test]
    fn complete_name_after_flags() {
        let mut adv = ad(0x01, &[0x06]);
        adv.extend(ad(0x09, b"TAG_001"));
        assert_eq!(parse_adv_name(&adv).as_deref(), Some("TAG_001"));
    }

    #[test]
    fn complete_name_preferred_over_shortened() {
        let mut adv = ad(0x08, b"TAG_");
        adv.extend(ad(0x09, b"TAG_042"));
        assert_eq!(parse_adv_name(&adv).as_deref(), Some("TAG_042"));
    }

    #[test]
    fn shortened_name_used_alone() {
        let adv = ad(0x08, b"TAG_9");
        assert_eq!(parse_adv_name(&adv).as_deref(), Some("TAG_9"));
    }

    #[test]
    fn no_name_structure() {
        let mut adv = ad(0x01, &[0x06]);
        adv.extend(ad(0xFF, &[0x4C, 0x00, 0x02]));
        assert_eq!(parse_adv_name(&adv), None);
    }

    #[test]
    fn truncated_structure_is_skipped() {
        // claims 10 bytes, carries 3
        let adv = [0x0A, 0x09, b'T', b'A', b'G'];
        assert_eq!(parse_adv_name(&adv), None);
        assert_eq!(parse_adv_name(&[]), None);
    }

    #[test]
    fn invalid_utf8_is_skipped() {
        let adv = ad(0x09, &[0xFF, 0xFE]);
        assert_eq!(parse_adv_name(&adv), None);
    }

    #[test]
    fn sighting_drops_oversized_name() {
        let long = "T".repeat(40);
        assert_eq!(Sighting::new(Some(&long), -60).name, None);
        assert_eq!(
            Sighting::new(Some("TAG_1"), -60).name.as_deref(),
            Some("TAG_1")
        );
    }

    // ── Window collection ───────────────────────────────────────────

    #[test]
    fn crowd_of_other_advertisers_does_not_hide_tag() {
        let mut window = WindowCollector::new(is_tag);
        for n in 0..(MAX_SIGHTINGS + 8) {
            assert!(!window.offer(addr(n), Sighting::new(Some("Phone"), -50)));
        }
        assert!(window.offer(addr(500), Sighting::new(Some("TAG_001"), -60)));

        let sightings = window.finish();
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].name.as_deref(), Some("TAG_001"));
        assert_eq!(sightings[0].rssi, -60);
    }

    #[test]
    fn one_sighting_per_address() {
        let mut window = WindowCollector::new(is_tag);
        assert!(window.offer(addr(1), Sighting::new(Some("TAG_001"), -60)));
        assert!(!window.offer(addr(1), Sighting::new(Some("TAG_001"), -55)));
        assert!(window.offer(addr(2), Sighting::new(Some("TAG_002"), -70)));

        let sightings = window.finish();
        assert_eq!(sightings.len(), 2);
        // first report wins
        assert_eq!(sightings[0].rssi, -60);
    }

    #[test]
    fn accept_sees_every_unkept_report() {
        let mut calls = 0;
        let mut window = WindowCollector::new(|s: &Sighting| {
            calls += 1;
            is_tag(s)
        });
        window.offer(addr(1), Sighting::new(Some("Phone"), -50));
        window.offer(addr(1), Sighting::new(Some("Phone"), -50));
        window.offer(addr(2), Sighting::new(Some("TAG_001"), -60));
        window.offer(addr(2), Sighting::new(Some("TAG_001"), -60));
        drop(window);
        assert_eq!(calls, 3);
    }

    #[test]
    fn accepted_overflow_is_counted() {
        let mut window = WindowCollector::new(is_tag);
        for n in 0..(MAX_SIGHTINGS + 3) {
            window.offer(addr(n), Sighting::new(Some("TAG_X"), -60));
        }
        assert_eq!(window.dropped(), 3);
        assert_eq!(window.finish().len(), MAX_SIGHTINGS);
    }
}
