/// Anchor pipeline: discovery scan → name filter → path-loss distance →
/// CSV record on `warehouse/anchors/<id>/data`.
///
/// Every matching sighting in every window is published, including repeats
/// of last cycle's reading. The positioning engine wants raw samples, not
/// change events.
use embedded_hal::delay::DelayNs;

use crate::bus::{BusManager, BusTransport};
use crate::config::AnchorConfig;
use crate::node::{CycleReport, Node, Phase};
use crate::protocol::{anchor_topic, FormatError, MsgBuffer, NameString, Observation, TopicString};
use crate::scanner::{BeaconScanner, Sighting};

/// Exact, case-sensitive prefix match. Unnamed advertisements never match.
pub fn tag_name_matches(name: Option<&str>, prefix: &str) -> bool {
    matches!(name, Some(n) if n.starts_with(prefix))
}

/// Immutable anchor context: configuration plus the derived topic.
#[derive(Debug, Clone)]
pub struct Anchor {
    config: AnchorConfig,
    topic: TopicString,
}

impl Anchor {
    pub fn new(config: AnchorConfig) -> Result<Self, FormatError> {
        let mut topic = TopicString::new();
        anchor_topic(&config.id, &mut topic)?;
        Ok(Self { config, topic })
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether a sighting is one of our tags.
    pub fn accepts(&self, sighting: &Sighting) -> bool {
        tag_name_matches(sighting.name.as_deref(), &self.config.tag_prefix)
    }

    /// Turn one sighting into an observation, or `None` if it is not a tag.
    pub fn observe(&self, sighting: &Sighting) -> Option<Observation> {
        if !self.accepts(sighting) {
            return None;
        }
        let tag_id = NameString::try_from(sighting.name.as_deref()?).ok()?;
        Some(Observation {
            anchor_id: self.config.id.clone(),
            x: self.config.x,
            y: self.config.y,
            distance: self.config.model.distance(sighting.rssi),
            rssi: sighting.rssi,
            tag_id,
        })
    }

    /// [`Anchor::observe`] as a plain closure, for drivers that deliver
    /// sightings through a callback.
    pub fn observer(&self) -> impl Fn(&Sighting) -> Option<Observation> + '_ {
        move |sighting| self.observe(sighting)
    }
}

/// Anchor node loop state.
pub struct AnchorNode<T, D, S> {
    anchor: Anchor,
    bus: BusManager<T, D>,
    scanner: S,
    buf: MsgBuffer,
}

impl<T, D, S> AnchorNode<T, D, S>
where
    T: BusTransport,
    D: DelayNs,
    S: BeaconScanner,
{
    pub fn new(anchor: Anchor, bus: BusManager<T, D>, scanner: S) -> Self {
        log::info!(
            "Anchor {} at ({:.2}, {:.2}), filtering '{}'",
            anchor.config.id,
            anchor.config.x,
            anchor.config.y,
            anchor.config.tag_prefix
        );
        Self {
            anchor,
            bus,
            scanner,
            buf: MsgBuffer::new(),
        }
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn bus(&self) -> &BusManager<T, D> {
        &self.bus
    }
}

fn publish<T, D>(
    bus: &mut BusManager<T, D>,
    buf: &mut MsgBuffer,
    topic: &str,
    obs: &Observation,
) -> bool
where
    T: BusTransport,
    D: DelayNs,
{
    if obs.write_record(buf).is_err() {
        log::warn!("Record for {} exceeds buffer, dropped", obs.tag_id);
        return false;
    }
    let ok = bus.publish(topic, &buf[..]);
    if ok {
        log::info!(
            "{} | RSSI {} | {:.2} m",
            obs.tag_id,
            obs.rssi,
            obs.distance
        );
    }
    ok
}

impl<T, D, S> Node for AnchorNode<T, D, S>
where
    T: BusTransport,
    D: DelayNs,
    S: BeaconScanner,
{
    fn cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            connect_attempts: self.bus.ensure_connected(),
            idle_ms: self.anchor.config.idle_ms,
            ..CycleReport::default()
        };

        self.bus.service();

        let Self {
            anchor,
            bus,
            scanner,
            buf,
        } = self;

        log::debug!("{}: BLE scan {} ms", Phase::Sense.as_str(), anchor.config.scan_window_ms);
        let mut rejected: u16 = 0;
        let sightings = scanner.scan(anchor.config.scan_window_ms, |s| {
            let keep = anchor.accepts(s);
            if !keep {
                rejected = rejected.saturating_add(1);
            }
            keep
        });
        report.sensed = (sightings.len() as u16).saturating_add(rejected);
        report.skipped = rejected;

        let observe = anchor.observer();
        for sighting in &sightings {
            let Some(obs) = observe(sighting) else {
                report.skipped += 1;
                continue;
            };
            if publish(bus, buf, &anchor.topic, &obs) {
                report.published += 1;
            }
        }

        report
    }
}
