//! NimBLE adapters: blocking discovery scan (anchor) and identity beacon (tag).

use anyhow::anyhow;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLEAdvertisementData, BLEDevice, BLEError, BLEScan};
use esp_idf_svc::hal::task::block_on;
use warehouse_rtls::board;
use warehouse_rtls::scanner::{BeaconScanner, Sighting, Sightings, WindowCollector};
use warehouse_rtls::tag::BeaconAdvertiser;

/// GATT service the tag exposes once connected. Not advertised: the legacy
/// payload is reserved for the name.
pub const TAG_SERVICE_UUID: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";

/// Active scanner reporting each advertiser once per window.
pub struct NimbleScanner {
    device: &'static mut BLEDevice,
    scan: BLEScan,
}

impl NimbleScanner {
    pub fn new() -> Self {
        let mut scan = BLEScan::new();
        scan.active_scan(true)
            .interval(board::BLE_SCAN_INTERVAL)
            .window(board::BLE_SCAN_WINDOW);
        Self {
            device: BLEDevice::take(),
            scan,
        }
    }
}

impl BeaconScanner for NimbleScanner {
    fn scan<F>(&mut self, window_ms: u32, accept: F) -> Sightings
    where
        F: FnMut(&Sighting) -> bool,
    {
        let mut window = WindowCollector::new(accept);

        let result = block_on(self.scan.start(&*self.device, window_ms as i32, |device, data| {
            let sighting = Sighting::from_adv(device.rssi(), data.payload());
            window.offer(device.addr().as_be_bytes(), sighting);
            None::<()> // Continue until the window closes
        }));
        if let Err(e) = result {
            log::warn!("BLE scan failed: {:?}", e);
        }

        window.finish()
    }
}

/// Connectable advertiser carrying only the tag's name.
pub struct NimbleAdvertiser {
    device: &'static mut BLEDevice,
    service_uuid: BleUuid,
}

impl NimbleAdvertiser {
    pub fn new() -> anyhow::Result<Self> {
        let service_uuid = BleUuid::from_uuid128_string(TAG_SERVICE_UUID)
            .map_err(|e| anyhow!("invalid service UUID: {:?}", e))?;
        Ok(Self {
            device: BLEDevice::take(),
            service_uuid,
        })
    }
}

impl BeaconAdvertiser for NimbleAdvertiser {
    type Error = BLEError;

    fn start_advertising(&mut self, name: &str) -> Result<(), BLEError> {
        BLEDevice::set_device_name(name)?;

        let _service = self.device.get_server().create_service(self.service_uuid);

        let mut adv_data = BLEAdvertisementData::new();
        adv_data.name(name);
        let mut advertising = self.device.get_advertising().lock();
        advertising.set_data(&mut adv_data)?;
        advertising.start()
    }
}
