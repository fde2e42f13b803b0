//! Device session: channel programming, trigger composition, the stimulus
//! generator and the three acquisition strategies.
//!
//! A session is single-threaded and blocking by design: every acquisition
//! call occupies the calling thread until the device reports completion, and
//! no call is safe to issue concurrently against the same unit. The one
//! concession to a stuck device is the bounded, cancellable completion poll
//! (see [`SpadScope::set_ready_timeout`] and [`SpadScope::cancel_token`]).

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::acquisition::{
    segment_offsets, time_axis, AcquisitionPlan, CancelToken, CaptureResult,
    DEFAULT_READY_TIMEOUT,
};
use crate::channel::{BandwidthLimit, Channel, ChannelConfig, ChannelSettings};
use crate::convert::{self, AdcLimits, TimeUnit};
use crate::driver::{
    BufferAction, ConditionsAction, DownsampleMode, Resolution, ScopeDriver, StatusCode,
};
use crate::timebase::{self, ResolvedTimebase, SampleInterval};
use crate::trigger::{
    ChannelTrigger, ThresholdDirection, ThresholdMode, TriggerConjunction, TriggerExpression,
    TriggerStage, DEFAULT_HYSTERESIS_FRACTION,
};

/// Errors surfaced by session, configuration and acquisition calls.
///
/// Any driver status code is fatal to the operation that hit it; no partial
/// results are returned and the caller owns session teardown.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("failed to open digitizer unit: {0}")]
    SessionOpen(StatusCode),

    #[error("failed to shut down digitizer unit: {0}")]
    SessionClose(StatusCode),

    #[error("failed to configure channel {channel}: {status}")]
    ChannelConfig { channel: Channel, status: StatusCode },

    #[error("channel {0} listed more than once in a configuration request")]
    DuplicateChannel(Channel),

    #[error("channel {0} is referenced by a trigger but not enabled")]
    ChannelNotEnabled(Channel),

    #[error("trigger {stage} programming failed: {status}")]
    TriggerConfig {
        stage: TriggerStage,
        status: StatusCode,
    },

    #[error("timebase resolution failed: {0}")]
    TimebaseResolution(StatusCode),

    #[error("buffer registration failed for channel {channel}, segment {segment}: {status}")]
    BufferRegistration {
        channel: Channel,
        segment: u32,
        status: StatusCode,
    },

    #[error("failed to start acquisition: {0}")]
    AcquisitionStart(StatusCode),

    #[error("data transfer failed: {0}")]
    DataTransfer(StatusCode),

    #[error("ADC limit query failed: {0}")]
    CalibrationQuery(StatusCode),

    #[error("stimulus generator programming failed: {0}")]
    SignalGenerator(StatusCode),

    #[error("capture would contain no samples")]
    EmptyCapture,

    #[error("acquisition did not complete within {0:?}")]
    AcquisitionTimedOut(Duration),

    #[error("acquisition cancelled by caller")]
    AcquisitionCancelled,
}

/// Stimulus generator waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    RampUp,
    RampDown,
    Dc,
}

/// Stimulus generator settings, applied in one shot by
/// [`SpadScope::generate_signal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalConfig {
    pub waveform: Waveform,
    pub peak_to_peak_volts: f64,
    pub offset_volts: f64,
    pub frequency_hz: f64,
    pub duty_cycle_percent: f64,
    pub buffer_length: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            peak_to_peak_volts: 2.0,
            offset_volts: 0.0,
            frequency_hz: 10_000.0,
            duty_cycle_percent: 50.0,
            buffer_length: 100_000,
        }
    }
}

/// An open digitizer session.
///
/// Owns the driver handle, the enabled-channel side table and the cached ADC
/// limits for the session's resolution. All acquisition entry points return
/// an owned [`CaptureResult`] with no back-reference to device buffers.
pub struct SpadScope<D: ScopeDriver> {
    driver: D,
    resolution: Resolution,
    adc_limits: AdcLimits,
    channels: BTreeMap<Channel, ChannelSettings>,
    ready_timeout: Option<Duration>,
    cancel: CancelToken,
}

impl<D: ScopeDriver> SpadScope<D> {
    /// Open a session on the unit at the given ADC resolution.
    ///
    /// The ADC full-scale limits are queried once here and reused for every
    /// threshold and waveform conversion; the resolution cannot change while
    /// the session is open.
    pub fn open(mut driver: D, resolution: Resolution) -> Result<Self, ScopeError> {
        driver
            .open_unit(resolution)
            .map_err(ScopeError::SessionOpen)?;
        let adc_limits = driver
            .get_adc_limits(resolution)
            .map_err(ScopeError::CalibrationQuery)?;
        log::debug!(
            "unit open at {:?}, ADC limits [{}, {}]",
            resolution,
            adc_limits.min,
            adc_limits.max
        );
        Ok(Self {
            driver,
            resolution,
            adc_limits,
            channels: BTreeMap::new(),
            ready_timeout: Some(DEFAULT_READY_TIMEOUT),
            cancel: CancelToken::new(),
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn adc_limits(&self) -> AdcLimits {
        self.adc_limits
    }

    /// The channels currently enabled, with the settings they were
    /// programmed with.
    pub fn enabled_channels(&self) -> &BTreeMap<Channel, ChannelSettings> {
        &self.channels
    }

    /// Bound the completion poll of the block strategies; `None` restores
    /// the unbounded spin, where a device that never signals ready hangs the
    /// caller indefinitely.
    pub fn set_ready_timeout(&mut self, timeout: Option<Duration>) {
        self.ready_timeout = timeout;
    }

    /// Handle for aborting an in-flight acquisition from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Enable exactly the listed channels and force every other channel of
    /// the fixed alphabet off.
    ///
    /// Calling again with a different subset fully replaces the enabled set.
    /// A failed on/off command aborts the whole configuration; the device is
    /// left partially configured and the session should be considered dead.
    pub fn configure_channels(&mut self, configs: &[ChannelConfig]) -> Result<(), ScopeError> {
        let mut table = BTreeMap::new();
        for config in configs {
            let settings = ChannelSettings {
                range: config.range,
                coupling: config.coupling,
            };
            if table.insert(config.channel, settings).is_some() {
                return Err(ScopeError::DuplicateChannel(config.channel));
            }
        }

        for config in configs {
            log::debug!(
                "enabling channel {} at {} ({:?})",
                config.channel,
                config.range,
                config.coupling
            );
            self.driver
                .set_channel_on(
                    config.channel,
                    config.coupling,
                    config.range,
                    0.0,
                    BandwidthLimit::Full,
                )
                .map_err(|status| ScopeError::ChannelConfig {
                    channel: config.channel,
                    status,
                })?;
        }
        for channel in Channel::ALL {
            if !table.contains_key(&channel) {
                self.driver
                    .set_channel_off(channel)
                    .map_err(|status| ScopeError::ChannelConfig { channel, status })?;
            }
        }

        self.channels = table;
        Ok(())
    }

    /// Build a level-trigger entry for an enabled channel, using the
    /// channel's programmed range and the default 2 % hysteresis band.
    pub fn trigger_condition(
        &self,
        channel: Channel,
        threshold_mv: f64,
        direction: ThresholdDirection,
    ) -> Result<ChannelTrigger, ScopeError> {
        let settings = self.settings_of(channel)?;
        Ok(ChannelTrigger::from_millivolts(
            channel,
            settings.range,
            self.adc_limits,
            threshold_mv,
            direction,
            ThresholdMode::Level,
            DEFAULT_HYSTERESIS_FRACTION,
            false,
        ))
    }

    /// Program a full DNF trigger expression.
    ///
    /// Conjunction 0 is written in clear-then-add mode so no stale entries
    /// from a previous composition survive; later conjunctions add. The
    /// direction and property unions are then written once each, as the
    /// flat arrays the device expects. A failure at any stage aborts the
    /// composition and leaves the device trigger state unusable.
    pub fn compose_trigger(
        &mut self,
        expression: &TriggerExpression,
        auto_trigger_us: u32,
    ) -> Result<(), ScopeError> {
        for entry in expression.entries() {
            self.settings_of(entry.channel)?;
        }

        for (index, conjunction) in expression.conjunctions.iter().enumerate() {
            let action = if index == 0 {
                ConditionsAction::ClearThenAdd
            } else {
                ConditionsAction::Add
            };
            let conditions: Vec<_> = conjunction
                .entries
                .iter()
                .map(ChannelTrigger::condition_entry)
                .collect();
            self.driver
                .set_trigger_conditions(&conditions, action)
                .map_err(|status| ScopeError::TriggerConfig {
                    stage: TriggerStage::Conditions,
                    status,
                })?;
        }

        let directions = expression.direction_entries();
        self.driver
            .set_trigger_directions(&directions)
            .map_err(|status| ScopeError::TriggerConfig {
                stage: TriggerStage::Directions,
                status,
            })?;

        let properties = expression.properties_entries();
        self.driver
            .set_trigger_properties(&properties, false, auto_trigger_us)
            .map_err(|status| ScopeError::TriggerConfig {
                stage: TriggerStage::Properties,
                status,
            })?;

        log::debug!(
            "trigger programmed: {} conjunction(s), {} channel entries",
            expression.conjunctions.len(),
            directions.len()
        );
        Ok(())
    }

    /// Trigger when every listed `(channel, threshold_mV, direction)`
    /// condition holds at once: a single-conjunction DNF expression.
    pub fn set_coincidence_trigger(
        &mut self,
        entries: &[(Channel, f64, ThresholdDirection)],
        auto_trigger_us: u32,
    ) -> Result<(), ScopeError> {
        let conjunction = entries
            .iter()
            .map(|&(channel, threshold_mv, direction)| {
                self.trigger_condition(channel, threshold_mv, direction)
            })
            .collect::<Result<TriggerConjunction, _>>()?;
        self.compose_trigger(&TriggerExpression::single(conjunction), auto_trigger_us)
    }

    /// Single-channel edge trigger: the degenerate one-conjunction,
    /// one-entry case of [`Self::set_coincidence_trigger`].
    pub fn set_simple_trigger(
        &mut self,
        channel: Channel,
        threshold_mv: f64,
        direction: ThresholdDirection,
        auto_trigger_us: u32,
    ) -> Result<(), ScopeError> {
        self.set_coincidence_trigger(&[(channel, threshold_mv, direction)], auto_trigger_us)
    }

    /// Program and enable the stimulus generator.
    pub fn generate_signal(&mut self, config: SignalConfig) -> Result<(), ScopeError> {
        self.driver
            .sig_gen_waveform(config.waveform, config.buffer_length)
            .map_err(ScopeError::SignalGenerator)?;
        self.driver
            .sig_gen_range(config.peak_to_peak_volts, config.offset_volts)
            .map_err(ScopeError::SignalGenerator)?;
        self.driver
            .sig_gen_duty_cycle(config.duty_cycle_percent)
            .map_err(ScopeError::SignalGenerator)?;
        self.driver
            .sig_gen_frequency(config.frequency_hz)
            .map_err(ScopeError::SignalGenerator)?;
        self.driver
            .sig_gen_apply(true)
            .map_err(ScopeError::SignalGenerator)?;
        log::debug!(
            "stimulus: {:?} at {} Hz, {} Vpp",
            config.waveform,
            config.frequency_hz,
            config.peak_to_peak_volts
        );
        Ok(())
    }

    /// Continuous ring-buffer capture until the sample quota is reached.
    ///
    /// The device streams into the registered buffers and stops on its own
    /// once `pre_samples + post_samples` values have been delivered. No
    /// trigger-time alignment applies; streaming has a single implicit
    /// segment.
    pub fn acquire_streaming(
        &mut self,
        pre_samples: usize,
        post_samples: usize,
        sample_interval: u32,
        unit: TimeUnit,
    ) -> Result<CaptureResult, ScopeError> {
        let total = pre_samples + post_samples;
        if total == 0 {
            return Err(ScopeError::EmptyCapture);
        }

        self.register_buffers(total, 1)?;
        self.driver
            .run_streaming(
                sample_interval,
                unit,
                pre_samples,
                post_samples,
                true,
                1,
                DownsampleMode::Raw,
            )
            .map_err(ScopeError::AcquisitionStart)?;
        log::debug!(
            "streaming started: {} samples at {} {:?}",
            total,
            sample_interval,
            unit
        );

        let started = Instant::now();
        loop {
            let state = self
                .driver
                .get_streaming_latest_values()
                .map_err(ScopeError::DataTransfer)?;
            if state.auto_stopped {
                break;
            }
            self.check_abort(started)?;
        }

        let interval_ns = f64::from(sample_interval) * unit.nanoseconds();
        let plan = AcquisitionPlan {
            pre_samples,
            post_samples,
            requested: SampleInterval::Nanos(interval_ns),
            sample_interval_ns: interval_ns,
            timebase: None,
            segments: 1,
        };
        let channels = self.converted_waveforms(1)?;
        Ok(CaptureResult {
            plan,
            channels,
            time_axes_ns: vec![time_axis(total, interval_ns, 0.0)],
            segment_offsets_ns: vec![0.0],
        })
    }

    /// Single pre/post-trigger block capture, polled to completion.
    pub fn acquire_block(
        &mut self,
        pre_samples: usize,
        post_samples: usize,
        interval: SampleInterval,
    ) -> Result<CaptureResult, ScopeError> {
        let total = pre_samples + post_samples;
        if total == 0 {
            return Err(ScopeError::EmptyCapture);
        }

        let resolved = self.resolve_timebase(interval)?;
        self.register_buffers(total, 1)?;
        let indisposed_ms = self
            .driver
            .run_block(pre_samples, post_samples, resolved.index, 0)
            .map_err(ScopeError::AcquisitionStart)?;
        log::debug!(
            "block armed: timebase {} ({} ns/sample), indisposed {} ms",
            resolved.index,
            resolved.interval_ns,
            indisposed_ms
        );

        self.wait_until_ready()?;
        let overflow = self
            .driver
            .get_values(0, total as u64, 1, DownsampleMode::Raw, 0)
            .map_err(ScopeError::DataTransfer)?;
        if overflow != 0 {
            log::warn!("overvoltage during capture, channel mask 0x{:02X}", overflow);
        }

        let plan = AcquisitionPlan {
            pre_samples,
            post_samples,
            requested: interval,
            sample_interval_ns: resolved.interval_ns,
            timebase: Some(resolved.index),
            segments: 1,
        };
        let channels = self.converted_waveforms(1)?;
        Ok(CaptureResult {
            plan,
            channels,
            time_axes_ns: vec![time_axis(total, resolved.interval_ns, 0.0)],
            segment_offsets_ns: vec![0.0],
        })
    }

    /// Multi-segment hardware-timed capture: the device arms once and fills
    /// `segments` independent captures across repeated trigger events.
    ///
    /// The capture window is split evenly around the trigger, so each
    /// segment holds `floor(window_ns / interval / 2)` samples on either
    /// side. Each segment's time axis is shifted by its trigger time
    /// relative to segment 0.
    pub fn acquire_rapid_block(
        &mut self,
        interval: SampleInterval,
        segments: u32,
        acquisition_window_ns: f64,
    ) -> Result<CaptureResult, ScopeError> {
        let resolved = self.resolve_timebase(interval)?;
        let half_window = (acquisition_window_ns / resolved.interval_ns / 2.0).floor() as usize;
        let (pre_samples, post_samples) = (half_window, half_window);
        let total = pre_samples + post_samples;
        if total == 0 || segments == 0 {
            return Err(ScopeError::EmptyCapture);
        }

        let max_samples = self
            .driver
            .memory_segments(segments)
            .map_err(ScopeError::AcquisitionStart)?;
        log::debug!(
            "rapid block: {} segments of {} samples (device limit {})",
            segments,
            total,
            max_samples
        );
        self.driver
            .set_capture_count(segments)
            .map_err(ScopeError::AcquisitionStart)?;

        self.register_buffers(total, segments)?;
        self.driver
            .run_block(pre_samples, post_samples, resolved.index, 0)
            .map_err(ScopeError::AcquisitionStart)?;
        self.wait_until_ready()?;

        let overflow = self
            .driver
            .get_values_bulk(total as u64, 0, segments - 1, 1, DownsampleMode::Raw)
            .map_err(ScopeError::DataTransfer)?;
        if overflow != 0 {
            log::warn!("overvoltage during capture, channel mask 0x{:02X}", overflow);
        }
        let trigger_info = self
            .driver
            .get_trigger_info(0, segments - 1)
            .map_err(ScopeError::DataTransfer)?;
        let offsets = segment_offsets(&trigger_info, resolved.interval_ns);

        let plan = AcquisitionPlan {
            pre_samples,
            post_samples,
            requested: interval,
            sample_interval_ns: resolved.interval_ns,
            timebase: Some(resolved.index),
            segments,
        };
        let channels = self.converted_waveforms(segments)?;
        let time_axes_ns = offsets
            .iter()
            .map(|&offset| time_axis(total, resolved.interval_ns, offset))
            .collect();
        Ok(CaptureResult {
            plan,
            channels,
            time_axes_ns,
            segment_offsets_ns: offsets,
        })
    }

    /// Stop any running capture, leaving the session usable.
    pub fn stop(&mut self) -> Result<(), ScopeError> {
        self.driver.stop().map_err(ScopeError::SessionClose)
    }

    /// Stop and release the unit.
    pub fn close(mut self) -> Result<(), ScopeError> {
        self.driver.stop().map_err(ScopeError::SessionClose)?;
        self.driver.close_unit().map_err(ScopeError::SessionClose)
    }

    fn settings_of(&self, channel: Channel) -> Result<ChannelSettings, ScopeError> {
        self.channels
            .get(&channel)
            .copied()
            .ok_or(ScopeError::ChannelNotEnabled(channel))
    }

    fn resolve_timebase(&mut self, interval: SampleInterval) -> Result<ResolvedTimebase, ScopeError> {
        match interval {
            SampleInterval::Nanos(requested_ns) => Ok(timebase::quantize(requested_ns)),
            SampleInterval::Fastest => {
                let mask = self
                    .channels
                    .keys()
                    .fold(0u32, |mask, channel| mask | channel.flag());
                let (index, interval_s) = self
                    .driver
                    .get_minimum_timebase(mask, self.resolution)
                    .map_err(ScopeError::TimebaseResolution)?;
                Ok(ResolvedTimebase {
                    index,
                    interval_ns: interval_s * 1e9,
                })
            }
        }
    }

    /// Register one capture buffer per (channel, segment) pair. The very
    /// first registration clears all prior bindings, the rest add.
    fn register_buffers(&mut self, samples_per_segment: usize, segments: u32) -> Result<(), ScopeError> {
        let channels: Vec<Channel> = self.channels.keys().copied().collect();
        let mut action = BufferAction::ClearAll;
        for channel in channels {
            for segment in 0..segments {
                self.driver
                    .set_data_buffer(
                        channel,
                        segment,
                        vec![0i16; samples_per_segment],
                        DownsampleMode::Raw,
                        action,
                    )
                    .map_err(|status| ScopeError::BufferRegistration {
                        channel,
                        segment,
                        status,
                    })?;
                action = BufferAction::Add;
            }
        }
        Ok(())
    }

    /// Spin on the ready flag until the device signals completion, the
    /// deadline passes or the caller cancels.
    fn wait_until_ready(&mut self) -> Result<(), ScopeError> {
        let started = Instant::now();
        loop {
            if self.driver.is_ready().map_err(ScopeError::DataTransfer)? {
                return Ok(());
            }
            self.check_abort(started)?;
            std::hint::spin_loop();
        }
    }

    fn check_abort(&self, started: Instant) -> Result<(), ScopeError> {
        if self.cancel.is_cancelled() {
            return Err(ScopeError::AcquisitionCancelled);
        }
        if let Some(timeout) = self.ready_timeout {
            if started.elapsed() >= timeout {
                return Err(ScopeError::AcquisitionTimedOut(timeout));
            }
        }
        Ok(())
    }

    /// Reclaim every registered buffer and convert it to millivolts with
    /// the channel's own range and the session's ADC limits.
    fn converted_waveforms(
        &mut self,
        segments: u32,
    ) -> Result<BTreeMap<Channel, Vec<Vec<f64>>>, ScopeError> {
        let table: Vec<(Channel, ChannelSettings)> = self
            .channels
            .iter()
            .map(|(channel, settings)| (*channel, *settings))
            .collect();
        let mut out = BTreeMap::new();
        for (channel, settings) in table {
            let mut per_segment = Vec::with_capacity(segments as usize);
            for segment in 0..segments {
                let raw = self
                    .driver
                    .take_buffer(channel, segment)
                    .map_err(ScopeError::DataTransfer)?;
                per_segment.push(convert::buffer_to_millivolts(
                    &raw,
                    settings.range,
                    self.adc_limits,
                ));
            }
            out.insert(channel, per_segment);
        }
        Ok(out)
    }
}

impl<D: ScopeDriver> Drop for SpadScope<D> {
    fn drop(&mut self) {
        // Leave the device disarmed even if the caller never closed the
        // session; the unit itself is released by `close`.
        let _ = self.driver.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Coupling, VoltageRange};
    use crate::driver::mock::{FailOp, MockDriver};
    use crate::driver::SegmentTriggerInfo;

    fn open_scope() -> SpadScope<MockDriver> {
        SpadScope::open(MockDriver::new(), Resolution::Bits10).unwrap()
    }

    fn enable_a(scope: &mut SpadScope<MockDriver>) {
        scope
            .configure_channels(&[ChannelConfig::new(
                Channel::A,
                VoltageRange::Mv50,
                Coupling::Dc,
            )])
            .unwrap();
    }

    #[test]
    fn test_open_queries_adc_limits() {
        let scope = open_scope();
        assert_eq!(scope.driver.opened, Some(Resolution::Bits10));
        assert_eq!(scope.adc_limits().max, 32_512);
    }

    #[test]
    fn test_open_failure() {
        let mut driver = MockDriver::new();
        driver.fail_op = Some(FailOp::OpenUnit);
        assert!(matches!(
            SpadScope::open(driver, Resolution::Bits8),
            Err(ScopeError::SessionOpen(_))
        ));
    }

    #[test]
    fn test_channel_exclusivity() {
        let mut scope = open_scope();
        scope
            .configure_channels(&[
                ChannelConfig::new(Channel::A, VoltageRange::Mv50, Coupling::Dc),
                ChannelConfig::new(Channel::B, VoltageRange::V1, Coupling::Ac),
            ])
            .unwrap();
        let on: Vec<Channel> = scope.driver.on.iter().map(|entry| entry.0).collect();
        assert_eq!(on, vec![Channel::A, Channel::B]);
        assert_eq!(scope.driver.off.len(), 6);
        assert!(!scope.driver.off.contains(&Channel::A));

        // Reconfiguring with a different subset turns the old one off.
        scope.driver.on.clear();
        scope.driver.off.clear();
        scope
            .configure_channels(&[ChannelConfig::new(
                Channel::C,
                VoltageRange::Mv100,
                Coupling::Dc,
            )])
            .unwrap();
        let on: Vec<Channel> = scope.driver.on.iter().map(|entry| entry.0).collect();
        assert_eq!(on, vec![Channel::C]);
        assert!(scope.driver.off.contains(&Channel::A));
        assert!(scope.driver.off.contains(&Channel::B));
        assert_eq!(scope.enabled_channels().len(), 1);
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut scope = open_scope();
        let result = scope.configure_channels(&[
            ChannelConfig::new(Channel::A, VoltageRange::Mv50, Coupling::Dc),
            ChannelConfig::new(Channel::A, VoltageRange::V1, Coupling::Dc),
        ]);
        assert!(matches!(result, Err(ScopeError::DuplicateChannel(Channel::A))));
        assert!(scope.driver.on.is_empty());
    }

    #[test]
    fn test_channel_config_failure_aborts() {
        let mut scope = open_scope();
        scope.driver.fail_op = Some(FailOp::ChannelOn);
        let result = scope.configure_channels(&[ChannelConfig::new(
            Channel::A,
            VoltageRange::Mv50,
            Coupling::Dc,
        )]);
        assert!(matches!(
            result,
            Err(ScopeError::ChannelConfig {
                channel: Channel::A,
                ..
            })
        ));
        assert!(scope.enabled_channels().is_empty());
    }

    #[test]
    fn test_trigger_requires_enabled_channel() {
        let scope = open_scope();
        assert!(matches!(
            scope.trigger_condition(Channel::B, -8.0, ThresholdDirection::Falling),
            Err(ScopeError::ChannelNotEnabled(Channel::B))
        ));
    }

    #[test]
    fn test_simple_trigger_is_degenerate_dnf() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        scope
            .set_simple_trigger(Channel::A, -8.0, ThresholdDirection::Falling, 250)
            .unwrap();

        assert_eq!(scope.driver.condition_batches.len(), 1);
        let (conditions, action) = &scope.driver.condition_batches[0];
        assert_eq!(conditions.len(), 1);
        assert_eq!(*action, ConditionsAction::ClearThenAdd);
        assert_eq!(scope.driver.directions.len(), 1);
        assert_eq!(scope.driver.properties.len(), 1);
        // -8 mV on the ±50 mV range against ±32512 full scale.
        assert_eq!(scope.driver.properties[0].threshold_upper_adc, -5_202);
        assert_eq!(scope.driver.properties[0].hysteresis_upper_adc, 104);
        assert_eq!(
            scope.driver.directions[0].direction,
            ThresholdDirection::Falling
        );
        assert_eq!(scope.driver.properties_auto_trigger_us, 250);
    }

    #[test]
    fn test_dnf_composition_cardinality() {
        let mut scope = open_scope();
        scope
            .configure_channels(&[
                ChannelConfig::new(Channel::A, VoltageRange::Mv50, Coupling::Dc),
                ChannelConfig::new(Channel::B, VoltageRange::Mv50, Coupling::Dc),
                ChannelConfig::new(Channel::C, VoltageRange::Mv50, Coupling::Dc),
            ])
            .unwrap();

        let entry = |channel| {
            scope
                .trigger_condition(channel, -8.0, ThresholdDirection::Falling)
                .unwrap()
        };
        let expression = TriggerExpression::new(vec![
            TriggerConjunction::new(vec![entry(Channel::A), entry(Channel::B)]),
            TriggerConjunction::single(entry(Channel::C)),
            TriggerConjunction::new(vec![
                entry(Channel::A),
                entry(Channel::B),
                entry(Channel::C),
            ]),
        ]);
        scope.compose_trigger(&expression, 0).unwrap();

        let sizes: Vec<usize> = scope
            .driver
            .condition_batches
            .iter()
            .map(|(batch, _)| batch.len())
            .collect();
        assert_eq!(sizes, vec![2, 1, 3]);
        let actions: Vec<ConditionsAction> = scope
            .driver
            .condition_batches
            .iter()
            .map(|(_, action)| *action)
            .collect();
        assert_eq!(
            actions,
            vec![
                ConditionsAction::ClearThenAdd,
                ConditionsAction::Add,
                ConditionsAction::Add
            ]
        );
        assert_eq!(scope.driver.directions.len(), 6);
        assert_eq!(scope.driver.properties.len(), 6);
    }

    #[test]
    fn test_trigger_stage_failure() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        scope.driver.fail_op = Some(FailOp::Directions);
        let result = scope.set_simple_trigger(Channel::A, -8.0, ThresholdDirection::Falling, 0);
        assert!(matches!(
            result,
            Err(ScopeError::TriggerConfig {
                stage: TriggerStage::Directions,
                ..
            })
        ));
    }

    #[test]
    fn test_block_end_to_end() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        scope
            .set_simple_trigger(Channel::A, -8.0, ThresholdDirection::Falling, 0)
            .unwrap();
        scope.driver.fill_value = 100;

        let capture = scope
            .acquire_block(10_000, 10_000, SampleInterval::Nanos(1.0))
            .unwrap();

        // 1 ns quantizes into the power-of-two regime: index 2, 0.8 ns.
        assert_eq!(scope.driver.run_blocks, vec![(10_000, 10_000, 2, 0)]);
        assert_eq!(capture.plan.timebase, Some(2));
        assert_eq!(capture.plan.sample_interval_ns, 0.8);

        let waveform = capture.waveform(Channel::A).unwrap();
        assert_eq!(waveform.len(), 20_000);
        assert_eq!(capture.time_axes_ns[0].len(), 20_000);
        assert_eq!(capture.time_axes_ns[0][0], 0.0);
        assert_eq!(capture.time_axes_ns[0][1], 0.8);
        // 100 counts of the ±50 mV range.
        assert_eq!(waveform[0], 100.0 * 50.0 / 32_512.0);
    }

    #[test]
    fn test_block_fastest_uses_device_query() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        let capture = scope
            .acquire_block(10, 10, SampleInterval::Fastest)
            .unwrap();
        assert_eq!(scope.driver.min_timebase_queries, vec![Channel::A.flag()]);
        assert_eq!(capture.plan.timebase, Some(2));
        assert!((capture.plan.sample_interval_ns - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_block_timeout() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        scope.driver.not_ready_polls = u32::MAX;
        scope.set_ready_timeout(Some(Duration::ZERO));
        assert!(matches!(
            scope.acquire_block(10, 10, SampleInterval::Nanos(2.0)),
            Err(ScopeError::AcquisitionTimedOut(_))
        ));
    }

    #[test]
    fn test_block_cancellation() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        scope.driver.not_ready_polls = u32::MAX;
        scope.set_ready_timeout(None);
        scope.cancel_token().cancel();
        assert!(matches!(
            scope.acquire_block(10, 10, SampleInterval::Nanos(2.0)),
            Err(ScopeError::AcquisitionCancelled)
        ));
    }

    #[test]
    fn test_empty_capture_rejected() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        assert!(matches!(
            scope.acquire_block(0, 0, SampleInterval::Nanos(2.0)),
            Err(ScopeError::EmptyCapture)
        ));
    }

    #[test]
    fn test_streaming_capture() {
        let mut scope = open_scope();
        scope
            .configure_channels(&[
                ChannelConfig::new(Channel::A, VoltageRange::Mv50, Coupling::Dc),
                ChannelConfig::new(Channel::B, VoltageRange::Mv50, Coupling::Dc),
            ])
            .unwrap();
        scope.driver.fill_value = 200;
        scope.driver.streaming_pulls_left = 3;

        let capture = scope
            .acquire_streaming(5_000, 5_000, 2, TimeUnit::Nanoseconds)
            .unwrap();

        assert_eq!(
            scope.driver.streaming_runs,
            vec![(2, TimeUnit::Nanoseconds, 5_000, 5_000, true)]
        );
        // One buffer per channel, first registration clears.
        assert_eq!(scope.driver.registrations, 2);
        assert_eq!(capture.plan.sample_interval_ns, 2.0);
        assert_eq!(capture.segment_count(), 1);
        let waveform = capture.waveform(Channel::B).unwrap();
        assert_eq!(waveform.len(), 10_000);
        assert_eq!(waveform[9_999], 200.0 * 50.0 / 32_512.0);
        assert_eq!(capture.time_axes_ns[0][1], 2.0);
    }

    #[test]
    fn test_streaming_microsecond_axis() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        let capture = scope
            .acquire_streaming(0, 100, 4, TimeUnit::Microseconds)
            .unwrap();
        // 4 µs per sample on a nanosecond axis.
        assert_eq!(capture.time_axes_ns[0][1], 4_000.0);
    }

    #[test]
    fn test_rapid_block_capture() {
        let mut scope = open_scope();
        enable_a(&mut scope);
        scope.driver.fill_value = 50;
        scope.driver.trigger_info = vec![
            SegmentTriggerInfo {
                timestamp: 1_000,
                timestamp_reset: false,
            },
            SegmentTriggerInfo {
                timestamp: 3_000,
                timestamp_reset: false,
            },
            SegmentTriggerInfo {
                timestamp: 6_000,
                timestamp_reset: false,
            },
        ];

        let capture = scope
            .acquire_rapid_block(SampleInterval::Nanos(2.0), 3, 16_000.0)
            .unwrap();

        // 2 ns resolves to 1.6 ns; half of a 16 µs window is 5000 samples.
        assert_eq!(capture.plan.pre_samples, 5_000);
        assert_eq!(capture.plan.post_samples, 5_000);
        assert_eq!(scope.driver.segments_declared, 3);
        assert_eq!(scope.driver.capture_count, 3);
        assert_eq!(scope.driver.registrations, 3);
        assert_eq!(scope.driver.value_pulls, vec![(0, 2)]);

        assert_eq!(capture.segment_offsets_ns, vec![0.0, 3_200.0, 8_000.0]);
        assert_eq!(capture.segment_count(), 3);
        for segment in 0..3 {
            let waveform = capture.segment(Channel::A, segment).unwrap();
            assert_eq!(waveform.len(), 10_000);
            assert_eq!(capture.time_axes_ns[segment].len(), 10_000);
        }
        assert_eq!(capture.time_axes_ns[1][0], 3_200.0);
        assert_eq!(capture.time_axes_ns[2][0], 8_000.0);
    }

    #[test]
    fn test_generate_signal_applies_all_settings() {
        let mut scope = open_scope();
        scope.generate_signal(SignalConfig::default()).unwrap();
        assert_eq!(scope.driver.sig_gen_calls.len(), 5);
        assert_eq!(scope.driver.sig_gen_calls[4], "apply true");
    }

    #[test]
    fn test_stop_leaves_session_usable() {
        let mut scope = open_scope();
        scope.stop().unwrap();
        assert_eq!(scope.driver.stops, 1);
        enable_a(&mut scope);
        assert_eq!(scope.enabled_channels().len(), 1);
    }

    #[test]
    fn test_close_stops_and_releases() {
        let scope = open_scope();
        scope.close().unwrap();
    }
}
