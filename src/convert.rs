//! Conversion between raw ADC counts and calibrated millivolts.
//!
//! The device reports its full-scale ADC codes per resolution; together with
//! the voltage range a channel was enabled at, the mapping is linear:
//! `mV = count * range_mV / max_adc`.

use crate::channel::VoltageRange;

/// Raw ADC codes corresponding to full scale at the active resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcLimits {
    pub min: i16,
    pub max: i16,
}

/// Convert one raw ADC count to millivolts for the given input range.
pub fn adc_to_millivolts(count: i16, range: VoltageRange, limits: AdcLimits) -> f64 {
    f64::from(count) * range.millivolts() / f64::from(limits.max)
}

/// Convert a whole buffer of raw counts to millivolts.
pub fn buffer_to_millivolts(counts: &[i16], range: VoltageRange, limits: AdcLimits) -> Vec<f64> {
    counts
        .iter()
        .map(|&count| adc_to_millivolts(count, range, limits))
        .collect()
}

/// Convert a millivolt value to the nearest raw ADC count.
pub fn millivolts_to_adc(millivolts: f64, range: VoltageRange, limits: AdcLimits) -> i16 {
    (millivolts / range.millivolts() * f64::from(limits.max)).round() as i16
}

/// Time units understood by the streaming capture path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Femtoseconds,
    Picoseconds,
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    /// Nanoseconds per tick of this unit.
    pub fn nanoseconds(self) -> f64 {
        match self {
            TimeUnit::Femtoseconds => 1e-6,
            TimeUnit::Picoseconds => 1e-3,
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1e3,
            TimeUnit::Milliseconds => 1e6,
            TimeUnit::Seconds => 1e9,
        }
    }
}
