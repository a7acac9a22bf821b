//! Station-mode Wi-Fi join.

use anyhow::anyhow;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

const JOIN_RETRY_MS: u32 = 500;

/// Join `ssid`, retrying until the access point accepts us. Only driver
/// bring-up errors are returned.
pub fn connect(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    ssid: &str,
    password: &str,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

    let auth_method = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("SSID '{}' too long", ssid))?,
        password: password
            .try_into()
            .map_err(|_| anyhow!("Wi-Fi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;

    log::info!("Connecting to {}", ssid);
    loop {
        match wifi.connect() {
            Ok(()) => break,
            Err(e) => {
                log::warn!("Wi-Fi join failed: {:?}, retrying", e);
                FreeRtos::delay_ms(JOIN_RETRY_MS);
            }
        }
    }
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    log::info!("Wi-Fi connected, IP address {}", ip_info.ip);

    Ok(wifi)
}
