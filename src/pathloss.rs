/// Log-distance path-loss model.
///
/// Converts a single RSSI reading into an estimated distance:
///
/// ```text
/// distance = 10 ^ ((measured_power - rssi) / (10 * n))
/// ```
///
/// The result is deliberately unbounded and unsmoothed. One noisy reading
/// yields one outlier distance; filtering happens in the positioning engine
/// that consumes the published observations.
use crate::defaults::{MEASURED_POWER, PATH_LOSS_EXPONENT};

/// Calibration for one anchor's radio environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLossModel {
    /// RSSI observed at 1 m (dBm, negative).
    pub measured_power: i8,
    /// Environmental exponent `n`.
    pub exponent: f32,
}

impl PathLossModel {
    pub const fn new(measured_power: i8, exponent: f32) -> Self {
        Self {
            measured_power,
            exponent,
        }
    }

    /// The exponent is finite and positive.
    pub fn is_valid(&self) -> bool {
        self.exponent.is_finite() && self.exponent > 0.0
    }

    /// Estimated distance in meters for a raw RSSI reading.
    pub fn distance(&self, rssi: i8) -> f32 {
        debug_assert!(self.is_valid(), "path-loss exponent {}", self.exponent);
        let attenuation = f32::from(self.measured_power) - f32::from(rssi);
        libm::powf(10.0, attenuation / (10.0 * self.exponent))
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self::new(MEASURED_POWER, PATH_LOSS_EXPONENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn reference_strength_is_one_meter() {
        let model = PathLossModel::new(-59, 2.0);
        assert!(approx(model.distance(-59), 1.0));
    }

    #[test]
    fn twenty_db_down_is_ten_meters() {
        let model = PathLossModel::new(-59, 2.0);
        assert!(approx(model.distance(-79), 10.0));
    }

    #[test]
    fn weaker_than_reference_is_beyond_one_meter() {
        let model = PathLossModel::default();
        for rssi in -100..-59 {
            assert!(model.distance(rssi) > 1.0, "rssi {rssi}");
        }
    }

    #[test]
    fn stronger_than_reference_is_inside_one_meter() {
        let model = PathLossModel::default();
        assert!(model.distance(-40) < 1.0);
    }

    #[test]
    fn distance_strictly_decreases_with_rssi() {
        let model = PathLossModel::new(-59, 2.0);
        let mut prev = model.distance(-110);
        for rssi in -109..=-20 {
            let d = model.distance(rssi);
            assert!(d < prev, "rssi {rssi}: {d} !< {prev}");
            prev = d;
        }
    }

    #[test]
    fn higher_exponent_shrinks_estimate() {
        let free_space = PathLossModel::new(-59, 2.0);
        let cluttered = PathLossModel::new(-59, 3.0);
        assert!(cluttered.distance(-79) < free_space.distance(-79));
        assert!(approx(cluttered.distance(-89), 10.0));
    }

    #[test]
    fn no_clamping_on_extreme_readings() {
        let model = PathLossModel::new(-59, 2.0);
        // i8::MIN: 10^(69/20) ~ 2818 m
        assert!(model.distance(i8::MIN) > 2_500.0);
    }

    #[test]
    fn exponent_validity() {
        assert!(PathLossModel::default().is_valid());
        assert!(PathLossModel::new(-59, 3.5).is_valid());
        assert!(!PathLossModel::new(-59, 0.0).is_valid());
        assert!(!PathLossModel::new(-59, -1.0).is_valid());
        assert!(!PathLossModel::new(-59, f32::NAN).is_valid());
    }
}
