//! Warehouse RTLS ESP-IDF std firmware
//!
//! One binary, two roles selected at build time:
//! - `anchor`: scan for `TAG_*` beacons, publish distance estimates
//! - `tag`: advertise the tag beacon, forward RFID card reads
//!
//! Per-unit settings come from the build environment:
//! `NODE_ID`, `WIFI_SSID`, `WIFI_PASS`, `MQTT_HOST`, and for anchors
//! `ANCHOR_X` / `ANCHOR_Y` (meters).

#[cfg(all(feature = "anchor", feature = "tag"))]
compile_error!("features `anchor` and `tag` are mutually exclusive");
#[cfg(not(any(feature = "anchor", feature = "tag")))]
compile_error!("enable exactly one of `anchor` or `tag`");

mod ble;
mod mqtt;
#[cfg(feature = "tag")]
mod rfid;
mod wifi;

use anyhow::anyhow;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use warehouse_rtls::bus::BusManager;
use warehouse_rtls::config::BrokerConfig;
use warehouse_rtls::{board, node};

const NODE_ID: &str = match option_env!("NODE_ID") {
    Some(id) => id,
    None if cfg!(feature = "tag") => "TAG_001",
    None => "ANCHOR_1",
};
const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(s) => s,
    None => "WIFI_SSID",
};
const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(s) => s,
    None => "",
};
const MQTT_HOST: &str = match option_env!("MQTT_HOST") {
    Some(s) => s,
    None => "192.168.1.10",
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    esp_idf_svc::sys::link_patches();

    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!(
        "Warehouse RTLS v{} starting {} '{}' on {} (std)",
        VERSION,
        if cfg!(feature = "tag") { "tag" } else { "anchor" },
        NODE_ID,
        board::BOARD_NAME
    );

    // Only bring-up can fail; the node loop never returns
    if let Err(e) = run() {
        node::halt(&mut FreeRtos, &e);
    }
}

fn run() -> anyhow::Result<()> {
    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── BLE (before Wi-Fi, for coexistence) ─────────────────────────

    #[cfg(feature = "anchor")]
    let scanner = ble::NimbleScanner::new();
    #[cfg(feature = "tag")]
    let mut advertiser = ble::NimbleAdvertiser::new()?;

    // ── Network + bus ────────────────────────────────────────────────

    let _wifi = wifi::connect(peripherals.modem, sys_loop, nvs, WIFI_SSID, WIFI_PASS)?;

    let broker = BrokerConfig::new(MQTT_HOST).map_err(|_| anyhow!("MQTT_HOST too long"))?;
    let url = broker.url().map_err(|_| anyhow!("broker URL too long"))?;
    log::info!("Broker {}", url);
    let bus = BusManager::new(mqtt::EspBus::new(url), FreeRtos, NODE_ID);

    // ── Role loop ────────────────────────────────────────────────────

    #[cfg(feature = "anchor")]
    {
        use warehouse_rtls::anchor::{Anchor, AnchorNode};
        use warehouse_rtls::config::AnchorConfig;

        let config = AnchorConfig::new(NODE_ID)
            .map_err(|_| anyhow!("NODE_ID too long"))?
            .at(
                parse_coord("ANCHOR_X", option_env!("ANCHOR_X")),
                parse_coord("ANCHOR_Y", option_env!("ANCHOR_Y")),
            );
        let anchor = Anchor::new(config).map_err(|_| anyhow!("anchor topic too long"))?;
        let mut node = AnchorNode::new(anchor, bus, scanner);
        node::run(&mut node, &mut FreeRtos)
    }

    #[cfg(feature = "tag")]
    {
        use warehouse_rtls::config::TagConfig;
        use warehouse_rtls::tag::TagNode;

        let pins = peripherals.pins;
        log::info!(
            "MFRC522 on SS {} RST {} SCK {} MOSI {} MISO {}",
            board::RFID_SS_PIN,
            board::RFID_RST_PIN,
            board::RFID_SCK_PIN,
            board::RFID_MOSI_PIN,
            board::RFID_MISO_PIN,
        );
        let reader = rfid::Mfrc522Reader::new(
            peripherals.spi3,
            pins.gpio18,
            pins.gpio23,
            pins.gpio19,
            pins.gpio5,
            pins.gpio4,
        )?;
        log::info!("RFID reader ready. Hold tag near.");

        let config = TagConfig::new(NODE_ID)
            .map_err(|_| anyhow!("NODE_ID too long for a beacon name"))?;
        let mut node = TagNode::new(config, bus, reader);
        let attempts = node.start(&mut advertiser);
        if attempts == 0 {
            return Err(anyhow!("beacon name for {} does not fit", NODE_ID));
        }
        node::run(&mut node, &mut FreeRtos)
    }
}

/// Parse a compile-time coordinate, falling back to the origin.
#[cfg(feature = "anchor")]
fn parse_coord(name: &str, value: Option<&str>) -> f32 {
    match value.map(str::parse::<f32>) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            log::warn!("{} is not a number, using 0.0", name);
            0.0
        }
        None => 0.0,
    }
}
