/// Message bus connection manager.
///
/// Wraps one broker connection per node. The transport (MQTT client, test
/// fake) sits behind [`BusTransport`]; the manager adds the reconnect policy:
/// retry forever at a fixed interval and log every failure.
use core::fmt::Debug;

use embedded_hal::delay::DelayNs;

use crate::defaults::RECONNECT_DELAY_MS;
use crate::protocol::IdString;

/// Publish/subscribe transport.
pub trait BusTransport {
    type Error: Debug;

    /// Attempt one connection using `client_id`. Blocking.
    fn connect(&mut self, client_id: &str) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;

    /// Process inbound traffic and keep-alive.
    fn poll(&mut self) -> Result<(), Self::Error>;

    /// Fire-and-forget publish (QoS 0).
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;
}

/// Counters kept by the manager for status logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u32,
    pub failed: u32,
    /// Successful connections, including the first
    pub connects: u32,
}

pub struct BusManager<T, D> {
    transport: T,
    delay: D,
    client_id: IdString,
    retry_ms: u32,
    stats: BusStats,
}

impl<T: BusTransport, D: DelayNs> BusManager<T, D> {
    /// `client_id` longer than an [`IdString`] is truncated.
    pub fn new(transport: T, delay: D, client_id: &str) -> Self {
        let mut id = IdString::new();
        for c in client_id.chars() {
            if id.push(c).is_err() {
                break;
            }
        }
        Self {
            transport,
            delay,
            client_id: id,
            retry_ms: RECONNECT_DELAY_MS,
            stats: BusStats::default(),
        }
    }

    /// Override the reconnect interval.
    pub fn with_retry_ms(mut self, retry_ms: u32) -> Self {
        self.retry_ms = retry_ms;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Block until connected. Returns the number of connection attempts
    /// made (0 when already connected).
    pub fn ensure_connected(&mut self) -> u32 {
        let mut attempts = 0;
        while !self.transport.is_connected() {
            attempts += 1;
            log::info!("Attempting MQTT connection as '{}'", self.client_id);
            match self.transport.connect(&self.client_id) {
                Ok(()) => {
                    self.stats.connects += 1;
                    log::info!("MQTT connected after {} attempt(s)", attempts);
                    break;
                }
                Err(e) => {
                    log::warn!(
                        "MQTT connect failed: {:?}, retrying in {} ms",
                        e,
                        self.retry_ms
                    );
                    self.delay.delay_ms(self.retry_ms);
                }
            }
        }
        attempts
    }

    /// Service inbound traffic. Must run every loop iteration.
    pub fn service(&mut self) {
        if let Err(e) = self.transport.poll() {
            log::debug!("MQTT poll error: {:?}", e);
        }
    }

    /// Best-effort publish. Returns whether the transport accepted it;
    /// a rejected message is not retried.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.transport.publish(topic, payload) {
            Ok(()) => {
                self.stats.published += 1;
                true
            }
            Err(e) => {
                self.stats.failed += 1;
                log::warn!("Publish to {} failed: {:?}", topic, e);
                false
            }
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Delay handle shared with the node loop.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the bus, anchor and tag tests.

    use std::string::String;
    use std::vec::Vec;

    use embedded_hal::delay::DelayNs;

    use super::BusTransport;

    /// Records every delay in milliseconds.
    #[derive(Default)]
    pub struct FakeDelay {
        pub sleeps_ms: Vec<u32>,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.sleeps_ms.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.sleeps_ms.push(ms);
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Refused;

    /// Fails the first `fail_connects` attempts, then connects.
    #[derive(Default)]
    pub struct FakeTransport {
        pub connected: bool,
        pub fail_connects: u32,
        pub connect_ids: Vec<String>,
        pub polls: u32,
        pub fail_publish: bool,
        pub published: Vec<(String, String)>,
    }

    impl FakeTransport {
        pub fn connected() -> Self {
            Self {
                connected: true,
                ..Self::default()
            }
        }

        pub fn failing(n: u32) -> Self {
            Self {
                fail_connects: n,
                ..Self::default()
            }
        }
    }

    impl BusTransport for FakeTransport {
        type Error = Refused;

        fn connect(&mut self, client_id: &str) -> Result<(), Refused> {
            self.connect_ids.push(client_id.into());
            if self.fail_connects > 0 {
                self.fail_connects -= 1;
                return Err(Refused);
            }
            self.connected = true;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn poll(&mut self) -> Result<(), Refused> {
            self.polls += 1;
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Refused> {
            if self.fail_publish || !self.connected {
                return Err(Refused);
            }
            let payload = String::from_utf8_lossy(payload).into_owned();
            self.published.push((topic.into(), payload));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeDelay, FakeTransport};
    use super::*;

    #[test]
    fn already_connected_makes_no_attempts() {
        let mut bus = BusManager::new(FakeTransport::connected(), FakeDelay::default(), "ANCHOR_1");
        assert_eq!(bus.ensure_connected(), 0);
        assert!(bus.transport().connect_ids.is_empty());
        assert!(bus.delay_mut().sleeps_ms.is_empty());
    }

    #[test]
    fn n_failures_then_success_makes_n_plus_one_attempts() {
        let mut bus = BusManager::new(FakeTransport::failing(3), FakeDelay::default(), "TAG_001");
        assert_eq!(bus.ensure_connected(), 4);
        assert_eq!(bus.transport().connect_ids.len(), 4);
        assert!(bus.transport().connect_ids.iter().all(|id| id == "TAG_001"));
        assert_eq!(bus.delay_mut().sleeps_ms, [5_000, 5_000, 5_000]);
        assert!(bus.is_connected());
        assert_eq!(bus.stats().connects, 1);
    }

    #[test]
    fn nothing_published_before_success() {
        let mut bus = BusManager::new(FakeTransport::failing(2), FakeDelay::default(), "A");
        assert!(!bus.publish("t", b"early"));
        bus.ensure_connected();
        assert!(bus.publish("t", b"late"));
        let published = &bus.transport().published;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1, "late");
        assert_eq!(bus.stats().failed, 1);
        assert_eq!(bus.stats().published, 1);
    }

    #[test]
    fn custom_retry_interval() {
        let mut bus = BusManager::new(FakeTransport::failing(1), FakeDelay::default(), "A")
            .with_retry_ms(250);
        bus.ensure_connected();
        assert_eq!(bus.delay_mut().sleeps_ms, [250]);
    }

    #[test]
    fn publish_failure_is_not_retried() {
        let mut transport = FakeTransport::connected();
        transport.fail_publish = true;
        let mut bus = BusManager::new(transport, FakeDelay::default(), "A");
        assert!(!bus.publish("t", b"x"));
        assert!(bus.transport().published.is_empty());
        assert_eq!(bus.stats().failed, 1);
    }

    #[test]
    fn service_polls_transport() {
        let mut bus = BusManager::new(FakeTransport::connected(), FakeDelay::default(), "A");
        bus.service();
        bus.service();
        assert_eq!(bus.transport().polls, 2);
    }

    #[test]
    fn long_client_id_is_truncated() {
        let long = "N".repeat(40);
        let bus = BusManager::new(FakeTransport::default(), FakeDelay::default(), &long);
        assert_eq!(bus.client_id().len(), 32);
    }
}
