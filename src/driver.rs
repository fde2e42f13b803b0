//! Capability seam to the low-level digitizer driver.
//!
//! Everything the acquisition engine needs from the device is expressed as
//! the [`ScopeDriver`] trait; the engine never talks to hardware directly.
//! Each call returns `Result<T, StatusCode>` and any non-success status is
//! fatal to the operation in progress — there is no retry anywhere in the
//! engine.

use std::fmt;

use crate::channel::{BandwidthLimit, Channel, Coupling, VoltageRange};
use crate::convert::{AdcLimits, TimeUnit};
use crate::scope::Waveform;
use crate::trigger::{ConditionEntry, DirectionEntry, PropertiesEntry, ThresholdDirection};

/// Raw status code reported by a driver call that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u32);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

pub type DriverResult<T> = Result<T, StatusCode>;

/// ADC resolution a unit is opened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Bits8,
    Bits10,
    Bits12,
}

/// Downsampling applied by the device before a value pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsampleMode {
    Raw,
    Aggregate,
    Average,
    Decimate,
}

/// How a buffer registration combines with the existing bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAction {
    /// Drop every prior binding, then add this one.
    ClearAll,
    /// Add this binding to the existing set.
    Add,
}

/// How a batch of trigger conditions combines with the device trigger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionsAction {
    /// Clear any previously programmed conditions, then add this batch.
    ClearThenAdd,
    /// Add this batch alongside the conditions already programmed.
    Add,
}

/// Progress report from one streaming latest-values pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingState {
    /// Samples delivered into the registered buffers so far.
    pub samples_collected: usize,
    /// The device stopped on its own after filling the requested window.
    pub auto_stopped: bool,
}

/// Trigger timing record for one rapid-block segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentTriggerInfo {
    /// Trigger time in sample-interval ticks since an arbitrary origin.
    pub timestamp: u64,
    /// The timestamp counter was reset before this segment triggered.
    pub timestamp_reset: bool,
}

/// The fixed capability set the acquisition engine consumes from a driver.
///
/// Buffer ownership follows the device contract: a buffer handed to
/// [`Self::set_data_buffer`] belongs to the driver until the capture's final
/// value pull, after which [`Self::take_buffer`] returns it to the caller.
pub trait ScopeDriver {
    fn open_unit(&mut self, resolution: Resolution) -> DriverResult<()>;
    fn close_unit(&mut self) -> DriverResult<()>;
    fn stop(&mut self) -> DriverResult<()>;

    fn set_channel_on(
        &mut self,
        channel: Channel,
        coupling: Coupling,
        range: VoltageRange,
        analogue_offset_v: f64,
        bandwidth: BandwidthLimit,
    ) -> DriverResult<()>;
    fn set_channel_off(&mut self, channel: Channel) -> DriverResult<()>;

    fn set_trigger_conditions(
        &mut self,
        conditions: &[ConditionEntry],
        action: ConditionsAction,
    ) -> DriverResult<()>;
    fn set_trigger_directions(&mut self, directions: &[DirectionEntry]) -> DriverResult<()>;
    fn set_trigger_properties(
        &mut self,
        properties: &[PropertiesEntry],
        aux_output_enable: bool,
        auto_trigger_us: u32,
    ) -> DriverResult<()>;
    fn set_simple_trigger(
        &mut self,
        enable: bool,
        source: Channel,
        threshold_adc: i16,
        direction: ThresholdDirection,
        delay_samples: u64,
        auto_trigger_us: u32,
    ) -> DriverResult<()>;

    /// Fastest timebase achievable with the given enabled-channel mask,
    /// returned as `(index, interval_seconds)`.
    fn get_minimum_timebase(
        &mut self,
        enabled_channels: u32,
        resolution: Resolution,
    ) -> DriverResult<(u32, f64)>;
    fn get_adc_limits(&mut self, resolution: Resolution) -> DriverResult<AdcLimits>;

    /// Partition capture memory into `count` segments; returns the maximum
    /// samples one segment can hold.
    fn memory_segments(&mut self, count: u32) -> DriverResult<u64>;
    fn set_capture_count(&mut self, count: u32) -> DriverResult<()>;
    fn get_trigger_info(
        &mut self,
        from_segment: u32,
        to_segment: u32,
    ) -> DriverResult<Vec<SegmentTriggerInfo>>;

    fn set_data_buffer(
        &mut self,
        channel: Channel,
        segment: u32,
        buffer: Vec<i16>,
        mode: DownsampleMode,
        action: BufferAction,
    ) -> DriverResult<()>;
    fn take_buffer(&mut self, channel: Channel, segment: u32) -> DriverResult<Vec<i16>>;

    /// Arm a block capture; returns the device's estimate of how long it
    /// will be busy, in milliseconds.
    fn run_block(
        &mut self,
        pre_samples: usize,
        post_samples: usize,
        timebase: u32,
        segment: u32,
    ) -> DriverResult<f64>;
    fn run_streaming(
        &mut self,
        sample_interval: u32,
        unit: TimeUnit,
        pre_samples: usize,
        post_samples: usize,
        auto_stop: bool,
        downsample_ratio: u64,
        mode: DownsampleMode,
    ) -> DriverResult<()>;
    fn is_ready(&mut self) -> DriverResult<bool>;

    /// Pull captured values for one segment into the registered buffers;
    /// returns the per-channel overvoltage bitmask.
    fn get_values(
        &mut self,
        start_index: u64,
        n_samples: u64,
        downsample_ratio: u64,
        mode: DownsampleMode,
        segment: u32,
    ) -> DriverResult<u16>;
    /// Pull captured values for a whole segment range in one call.
    fn get_values_bulk(
        &mut self,
        n_samples: u64,
        from_segment: u32,
        to_segment: u32,
        downsample_ratio: u64,
        mode: DownsampleMode,
    ) -> DriverResult<u16>;
    fn get_streaming_latest_values(&mut self) -> DriverResult<StreamingState>;

    fn sig_gen_waveform(&mut self, waveform: Waveform, buffer_length: usize) -> DriverResult<()>;
    fn sig_gen_range(&mut self, peak_to_peak_volts: f64, offset_volts: f64) -> DriverResult<()>;
    fn sig_gen_duty_cycle(&mut self, percent: f64) -> DriverResult<()>;
    fn sig_gen_frequency(&mut self, hz: f64) -> DriverResult<()>;
    fn sig_gen_apply(&mut self, enabled: bool) -> DriverResult<()>;
}
