/// Hardware constants for supported boards.
///
/// Each board module defines pin assignments and radio timing
/// selected at compile time via feature flags.

#[cfg(feature = "devkit")]
mod hw {
    // MFRC522 on VSPI
    pub const RFID_SS_PIN: u8 = 5;
    pub const RFID_RST_PIN: u8 = 4;
    pub const RFID_SCK_PIN: u8 = 18;
    pub const RFID_MOSI_PIN: u8 = 23;
    pub const RFID_MISO_PIN: u8 = 19;
    /// Active BLE scan interval, in 0.625 ms units
    pub const BLE_SCAN_INTERVAL: u16 = 100;
    /// Active BLE scan window, in 0.625 ms units
    pub const BLE_SCAN_WINDOW: u16 = 99;
    pub const HAS_RFID: bool = true;
    pub const BOARD_NAME: &str = "esp32_devkit";
}

#[cfg(not(feature = "devkit"))]
mod hw {
    pub const BLE_SCAN_INTERVAL: u16 = 100;
    pub const BLE_SCAN_WINDOW: u16 = 99;
    pub const HAS_RFID: bool = false;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
