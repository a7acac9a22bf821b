/// Per-unit configuration.
///
/// Everything is fixed at build time: the firmware fills these from its
/// compile-time environment and [`crate::defaults`], then hands them to the
/// node. Nothing here changes after boot.
use core::fmt::Write;

use heapless::String;

use crate::defaults::{
    ANCHOR_IDLE_MS, BROKER_PORT, CARD_IDLE_MS, MAX_BEACON_NAME_LEN, NO_CARD_IDLE_MS,
    SCAN_WINDOW_MS, TAG_PREFIX,
};
use crate::pathloss::PathLossModel;
use crate::protocol::{FormatError, IdString, NameString};

/// Broker host name or address
pub type HostString = String<64>;

/// `mqtt://host:port`
pub type UrlString = String<80>;

#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub host: HostString,
    pub port: u16,
}

impl BrokerConfig {
    pub fn new(host: &str) -> Result<Self, FormatError> {
        Ok(Self {
            host: HostString::try_from(host).map_err(|_| FormatError)?,
            port: BROKER_PORT,
        })
    }

    pub fn url(&self) -> Result<UrlString, FormatError> {
        let mut url = UrlString::new();
        write!(url, "mqtt://{}:{}", self.host, self.port).map_err(|_| FormatError)?;
        Ok(url)
    }
}

/// Path-loss exponent that is zero, negative or not finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidModel;

/// Fixed anchor: identity, surveyed position and radio calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorConfig {
    pub id: IdString,
    pub x: f32,
    pub y: f32,
    pub model: PathLossModel,
    /// Only beacons whose name starts with this are reported
    pub tag_prefix: NameString,
    pub scan_window_ms: u32,
    pub idle_ms: u32,
}

impl AnchorConfig {
    /// Anchor at the origin with default calibration.
    pub fn new(id: &str) -> Result<Self, FormatError> {
        Ok(Self {
            id: IdString::try_from(id).map_err(|_| FormatError)?,
            x: 0.0,
            y: 0.0,
            model: PathLossModel::default(),
            tag_prefix: NameString::try_from(TAG_PREFIX).map_err(|_| FormatError)?,
            scan_window_ms: SCAN_WINDOW_MS,
            idle_ms: ANCHOR_IDLE_MS,
        })
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Fails on a model that cannot produce a finite distance.
    pub fn with_model(mut self, model: PathLossModel) -> Result<Self, InvalidModel> {
        if !model.is_valid() {
            return Err(InvalidModel);
        }
        self.model = model;
        Ok(self)
    }

    pub fn with_prefix(mut self, prefix: &str) -> Result<Self, FormatError> {
        self.tag_prefix = NameString::try_from(prefix).map_err(|_| FormatError)?;
        Ok(self)
    }

    pub fn with_timing(mut self, scan_window_ms: u32, idle_ms: u32) -> Self {
        self.scan_window_ms = scan_window_ms;
        self.idle_ms = idle_ms;
        self
    }
}

/// Mobile tag: identity plus card-reader pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct TagConfig {
    pub id: IdString,
    pub prefix: NameString,
    /// Idle when no card is present
    pub no_card_idle_ms: u32,
    /// Idle after a card was read
    pub card_idle_ms: u32,
}

impl TagConfig {
    /// Fails if the identity, or the beacon name built from it, is longer
    /// than [`MAX_BEACON_NAME_LEN`].
    pub fn new(id: &str) -> Result<Self, FormatError> {
        let config = Self {
            id: IdString::try_from(id).map_err(|_| FormatError)?,
            prefix: NameString::try_from(TAG_PREFIX).map_err(|_| FormatError)?,
            no_card_idle_ms: NO_CARD_IDLE_MS,
            card_idle_ms: CARD_IDLE_MS,
        };
        if config.beacon_name()?.len() > MAX_BEACON_NAME_LEN {
            return Err(FormatError);
        }
        Ok(config)
    }

    /// Name the beacon advertises. Identities are normally issued with the
    /// prefix already in place (`TAG_001`); bare identities get it prepended.
    pub fn beacon_name(&self) -> Result<NameString, FormatError> {
        if self.id.starts_with(self.prefix.as_str()) {
            return NameString::try_from(self.id.as_str()).map_err(|_| FormatError);
        }
        let mut name = self.prefix.clone();
        name.push_str(&self.id).map_err(|_| FormatError)?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_defaults() {
        let cfg = AnchorConfig::new("ANCHOR_1").unwrap();
        assert_eq!(cfg.tag_prefix.as_str(), "TAG_");
        assert_eq!(cfg.model, PathLossModel::new(-59, 2.0));
        assert_eq!(cfg.scan_window_ms, 2_000);
        assert_eq!(cfg.idle_ms, 1_000);
        assert_eq!((cfg.x, cfg.y), (0.0, 0.0));
    }

    #[test]
    fn anchor_builder() {
        let cfg = AnchorConfig::new("ANCHOR_3")
            .unwrap()
            .at(50.0, 50.0)
            .with_model(PathLossModel::new(-62, 3.0))
            .unwrap()
            .with_timing(500, 0)
            .with_prefix("BEACON-")
            .unwrap();
        assert_eq!((cfg.x, cfg.y), (50.0, 50.0));
        assert_eq!(cfg.model.exponent, 3.0);
        assert_eq!(cfg.scan_window_ms, 500);
        assert_eq!(cfg.tag_prefix.as_str(), "BEACON-");
    }

    #[test]
    fn oversized_identity_rejected() {
        let long = "A".repeat(33);
        assert_eq!(AnchorConfig::new(&long), Err(FormatError));
        assert_eq!(TagConfig::new(&long), Err(FormatError));
    }

    #[test]
    fn beacon_name_keeps_prefixed_identity() {
        let cfg = TagConfig::new("TAG_001").unwrap();
        assert_eq!(cfg.beacon_name().unwrap().as_str(), "TAG_001");
    }

    #[test]
    fn beacon_name_prefixes_bare_identity() {
        let cfg = TagConfig::new("017").unwrap();
        assert_eq!(cfg.beacon_name().unwrap().as_str(), "TAG_017");
    }

    #[test]
    fn broker_url() {
        let broker = BrokerConfig::new("192.168.1.20").unwrap();
        assert_eq!(broker.url().unwrap().as_str(), "mqtt://192.168.1.20:1883");
    }

    #[test]
    fn degenerate_model_rejected() {
        let cfg = AnchorConfig::new("A1").unwrap();
        for n in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            assert_eq!(
                cfg.clone().with_model(PathLossModel::new(-59, n)),
                Err(InvalidModel)
            );
        }
    }

    #[test]
    fn beacon_name_must_fit_advertisement() {
        // 4-byte prefix + 22 = 26
        let fits = "TAG_".to_string() + &"7".repeat(22);
        assert_eq!(TagConfig::new(&fits).unwrap().beacon_name().unwrap().len(), 26);
        assert!(TagConfig::new("TAG_00001").is_ok());

        let too_long = "TAG_".to_string() + &"7".repeat(23);
        assert_eq!(TagConfig::new(&too_long), Err(FormatError));
        // bare identity grows by the prefix
        assert_eq!(TagConfig::new(&"7".repeat(23)), Err(FormatError));
    }
}
