//! MQTT transport over the ESP-IDF client.
//!
//! esp-mqtt runs the protocol on its own FreeRTOS task and reports state
//! through an event callback. The adapter mirrors that state into an atomic
//! flag so `BusManager` can drive connects the same way it does on any other
//! transport: one `connect` call is one attempt with a bounded wait.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
use esp_idf_svc::sys::EspError;

use warehouse_rtls::bus::BusTransport;
use warehouse_rtls::config::UrlString;

/// How long one connection attempt waits for CONNACK.
const CONNECT_WAIT: Duration = Duration::from_secs(3);

const KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub enum MqttError {
    /// Client creation or publish rejected by esp-mqtt
    Client(EspError),
    /// No CONNACK within `CONNECT_WAIT`; carries the last transport error code
    Timeout { last_error: Option<i32> },
    NotConnected,
}

pub struct EspBus {
    url: UrlString,
    client: Option<EspMqttClient<'static>>,
    connected: Arc<AtomicBool>,
    last_error: Arc<AtomicI32>,
}

impl EspBus {
    pub fn new(url: UrlString) -> Self {
        Self {
            url,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(AtomicI32::new(0)),
        }
    }

    fn create_client(&self, client_id: &str) -> Result<EspMqttClient<'static>, EspError> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            keep_alive_interval: Some(KEEP_ALIVE),
            ..Default::default()
        };

        let connected = self.connected.clone();
        let last_error = self.last_error.clone();
        EspMqttClient::new_cb(&self.url, &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => {
                connected.store(true, Ordering::Relaxed);
            }
            EventPayload::Disconnected => {
                if connected.swap(false, Ordering::Relaxed) {
                    log::warn!("MQTT disconnected");
                }
            }
            EventPayload::Error(e) => {
                last_error.store(e.code(), Ordering::Relaxed);
            }
            _ => {}
        })
    }
}

impl BusTransport for EspBus {
    type Error = MqttError;

    fn connect(&mut self, client_id: &str) -> Result<(), MqttError> {
        if self.client.is_none() {
            self.last_error.store(0, Ordering::Relaxed);
            self.client = Some(self.create_client(client_id).map_err(MqttError::Client)?);
        }

        let start = Instant::now();
        while start.elapsed() < CONNECT_WAIT {
            if self.connected.load(Ordering::Relaxed) {
                return Ok(());
            }
            FreeRtos::delay_ms(100);
        }

        // Drop the client so its own reconnect loop stops; the next attempt
        // starts from a fresh session.
        self.client = None;
        let code = self.last_error.load(Ordering::Relaxed);
        Err(MqttError::Timeout {
            last_error: (code != 0).then_some(code),
        })
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Relaxed)
    }

    // esp-mqtt services keep-alive and inbound traffic on its own task.
    fn poll(&mut self) -> Result<(), MqttError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MqttError::NotConnected)
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), MqttError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(MqttError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(MqttError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(MqttError::Client)
    }
}
