//! MFRC522 card reader on SPI.

use anyhow::anyhow;
use esp_idf_svc::hal::gpio::{InputPin, Output, OutputPin, PinDriver};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::spi::config::Config as SpiConfig;
use esp_idf_svc::hal::spi::config::DriverConfig as SpiDriverConfig;
use esp_idf_svc::hal::spi::{SpiAnyPins, SpiDeviceDriver, SpiDriver};
use esp_idf_svc::hal::units::Hertz;
use mfrc522::comm::blocking::spi::SpiInterface;
use mfrc522::{Initialized, Mfrc522};

use warehouse_rtls::tag::{CardReader, CardUid};

const RFID_SPI_FREQ_HZ: u32 = 4_000_000;

type Spi = SpiDeviceDriver<'static, SpiDriver<'static>>;

pub struct Mfrc522Reader<R: OutputPin> {
    reader: Mfrc522<SpiInterface<Spi>, Initialized>,
    _rst: PinDriver<'static, R, Output>,
}

impl<R: OutputPin> Mfrc522Reader<R> {
    pub fn new(
        spi: impl Peripheral<P = impl SpiAnyPins> + 'static,
        sclk: impl Peripheral<P = impl OutputPin> + 'static,
        mosi: impl Peripheral<P = impl OutputPin> + 'static,
        miso: impl Peripheral<P = impl InputPin> + 'static,
        cs: impl Peripheral<P = impl OutputPin> + 'static,
        rst: impl Peripheral<P = R> + 'static,
    ) -> anyhow::Result<Self> {
        // Reset is active low; hold it released for the reader's lifetime
        let mut rst = PinDriver::output(rst)?;
        rst.set_high()?;

        let driver = SpiDriver::new(spi, sclk, mosi, Some(miso), &SpiDriverConfig::new())?;
        let config = SpiConfig::new()
            .baudrate(Hertz(RFID_SPI_FREQ_HZ))
            .data_mode(embedded_hal::spi::MODE_0);
        let device = SpiDeviceDriver::new(driver, Some(cs), &config)?;

        let mut reader = Mfrc522::new(SpiInterface::new(device))
            .init()
            .map_err(|e| anyhow!("MFRC522 init failed: {:?}", e))?;

        match reader.version() {
            Ok(v) => log::info!("MFRC522 ready, version 0x{:02X}", v),
            Err(e) => log::warn!("MFRC522 version read failed: {:?}", e),
        }

        Ok(Self { reader, _rst: rst })
    }
}

impl<R: OutputPin> CardReader for Mfrc522Reader<R> {
    fn poll(&mut self) -> Option<CardUid> {
        let atqa = self.reader.new_card_present().ok()?;
        let uid = self.reader.select(&atqa).ok()?;
        CardUid::from_slice(uid.as_bytes()).ok()
    }

    fn end_session(&mut self) {
        let _ = self.reader.hlta();
        let _ = self.reader.stop_crypto1();
    }
}
