/// Compiled-in defaults for anchor and tag units.
///
/// Calibration values come from field measurements with ESP32 tags at 1 m
/// in an open aisle. Per-unit identity and coordinates are supplied by the
/// firmware build, everything else lives here.

/// Calibrated RSSI at 1 m (dBm).
pub const MEASURED_POWER: i8 = -59;

/// Path-loss exponent. 2.0 is free space; cluttered racking is 2.7 to 3.5.
pub const PATH_LOSS_EXPONENT: f32 = 2.0;

/// Advertised-name prefix every tag beacon carries.
pub const TAG_PREFIX: &str = "TAG_";

/// Length of one blocking discovery scan.
pub const SCAN_WINDOW_MS: u32 = 2_000;

/// Anchor idle between scans.
pub const ANCHOR_IDLE_MS: u32 = 1_000;

/// Fixed back-off between broker connection attempts.
pub const RECONNECT_DELAY_MS: u32 = 5_000;

/// How often a halted node repeats its failure on the console.
pub const HALT_LOG_MS: u32 = 10_000;

/// Pause between attempts to start the tag beacon.
pub const BEACON_RETRY_MS: u32 = 1_000;

/// Longest beacon name that fits a legacy advertisement: 31 bytes minus
/// the flags structure (3) and the name header (2).
pub const MAX_BEACON_NAME_LEN: usize = 26;

/// Tag idle when the reader has nothing to report.
pub const NO_CARD_IDLE_MS: u32 = 50;

/// Tag idle after a card was read, whether published or suppressed.
pub const CARD_IDLE_MS: u32 = 1_000;

/// MQTT broker port.
pub const BROKER_PORT: u16 = 1883;

/// Topic prefix for anchor observations: `warehouse/anchors/<id>/data`.
pub const ANCHOR_TOPIC_PREFIX: &str = "warehouse/anchors/";

/// Topic suffix for anchor observations.
pub const ANCHOR_TOPIC_SUFFIX: &str = "/data";

/// Shared topic for RFID scan events.
pub const RACK_SCAN_TOPIC: &str = "warehouse/scanner/rack_scan";
