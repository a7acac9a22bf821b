//! Node control loop.
//!
//! Every node runs the same single-threaded cycle:
//!
//! 1. `ConnectCheck`: block until the broker connection is up
//! 2. `Service`: process bus traffic and keep-alive
//! 3. `Sense`: role-specific, discovery scan (anchor) or card poll (tag)
//! 4. `Publish`: send whatever the sense phase produced
//! 5. `Idle`: sleep for the interval the cycle reports
//!
//! A node implements phases 1–4 in [`Node::cycle`]; [`run`] owns phase 5.
//! An event-loop target can call `cycle` itself and schedule the next call
//! after [`CycleReport::idle_ms`] instead.

use embedded_hal::delay::DelayNs;

use crate::defaults::HALT_LOG_MS;

/// Loop phase, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ConnectCheck,
    Service,
    Sense,
    Publish,
    Idle,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::ConnectCheck => "connect",
            Phase::Service => "service",
            Phase::Sense => "sense",
            Phase::Publish => "publish",
            Phase::Idle => "idle",
        }
    }
}

/// What one pass through the loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Broker connection attempts made during `ConnectCheck`
    pub connect_attempts: u32,
    /// Items produced by `Sense` (sightings for an anchor, card reads for a tag)
    pub sensed: u16,
    /// Messages accepted by the bus
    pub published: u16,
    /// Sensed items that produced nothing (filtered or deduplicated)
    pub skipped: u16,
    /// Requested sleep before the next cycle
    pub idle_ms: u32,
}

pub trait Node {
    /// Run phases `ConnectCheck` through `Publish` once.
    fn cycle(&mut self) -> CycleReport;
}

/// Run `node` forever on the current thread.
pub fn run<N: Node, D: DelayNs>(node: &mut N, delay: &mut D) -> ! {
    loop {
        let report = node.cycle();
        if report.published > 0 {
            log::debug!(
                "cycle: sensed {} published {} skipped {}",
                report.sensed,
                report.published,
                report.skipped
            );
        }
        idle(delay, report.idle_ms);
    }
}

/// Park the node after a failed bring-up step.
///
/// Unattended nodes do not reboot-loop: the error is repeated on the
/// console every [`HALT_LOG_MS`] until someone resets the board.
pub fn halt<D: DelayNs>(delay: &mut D, reason: &dyn core::fmt::Display) -> ! {
    loop {
        log::error!("Bring-up failed: {:#}. Halted until reset", reason);
        delay.delay_ms(HALT_LOG_MS);
    }
}

/// Phase 5, split out so one cycle of `run` can be tested.
pub fn idle<D: DelayNs>(delay: &mut D, idle_ms: u32) {
    if idle_ms > 0 {
        log::trace!("{} {} ms", Phase::Idle.as_str(), idle_ms);
        delay.delay_ms(idle_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FakeDelay;

    #[test]
    fn idle_sleeps_reported_interval() {
        let mut delay = FakeDelay::default();
        idle(&mut delay, 1_000);
        idle(&mut delay, 0);
        idle(&mut delay, 50);
        assert_eq!(delay.sleeps_ms, [1_000, 50]);
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::ConnectCheck.as_str(), "connect");
        assert_eq!(Phase::Idle.as_str(), "idle");
    }
}
