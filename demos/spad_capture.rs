// Capture demo running against a bundled synthetic driver.
//
// Exercises the three acquisition strategies without hardware: the fake
// driver below synthesizes SPAD-like negative pulses into whatever buffers
// the engine registers, so the full configure → trigger → acquire → convert
// path runs end to end.

use std::collections::BTreeMap;

use clap::{Parser, ValueEnum};
use spadscope_rs::{
    AdcLimits, BandwidthLimit, BufferAction, Channel, ChannelConfig, ConditionEntry,
    ConditionsAction, Coupling, DirectionEntry, DownsampleMode, DriverResult, PropertiesEntry,
    Resolution, SampleInterval, ScopeDriver, SegmentTriggerInfo, SpadScope, StatusCode,
    StreamingState, ThresholdDirection, TimeUnit, VoltageRange, Waveform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Block,
    Rapid,
    Streaming,
}

#[derive(Parser, Debug)]
#[command(about = "Synthetic SPAD readout demo")]
struct Args {
    /// Capture strategy to run
    #[arg(long, value_enum, default_value = "block")]
    mode: Mode,

    /// Channel for readout (A-H)
    #[arg(long, default_value = "A", value_parser = parse_channel)]
    channel: Channel,

    /// Number of pre-trigger samples
    #[arg(long, default_value_t = 10_000)]
    pretrigger: usize,

    /// Number of post-trigger samples
    #[arg(long, default_value_t = 10_000)]
    posttrigger: usize,

    /// Trigger threshold in mV
    #[arg(long, default_value_t = -8.0, allow_hyphen_values = true)]
    threshold: f64,

    /// Number of segments in rapid mode
    #[arg(long, default_value_t = 4)]
    segments: u32,
}

fn parse_channel(value: &str) -> Result<Channel, String> {
    Channel::ALL
        .into_iter()
        .find(|channel| value.eq_ignore_ascii_case(&channel.letter().to_string()))
        .ok_or_else(|| format!("unknown channel '{value}', expected A-H"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut scope = SpadScope::open(SyntheticScope::default(), Resolution::Bits10)?;
    scope.configure_channels(&[ChannelConfig::new(
        args.channel,
        VoltageRange::Mv50,
        Coupling::Dc,
    )])?;
    scope.set_simple_trigger(args.channel, args.threshold, ThresholdDirection::Falling, 0)?;

    let capture = match args.mode {
        Mode::Block => scope.acquire_block(
            args.pretrigger,
            args.posttrigger,
            SampleInterval::Nanos(1.0),
        )?,
        Mode::Rapid => scope.acquire_rapid_block(SampleInterval::Nanos(1.0), args.segments, 4_000.0)?,
        Mode::Streaming => {
            scope.acquire_streaming(args.pretrigger, args.posttrigger, 2, TimeUnit::Nanoseconds)?
        }
    };
    scope.close()?;

    let waveform = capture.waveform(args.channel).unwrap_or_default();
    let minimum = waveform.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    println!(
        "captured {} segment(s) of {} samples at {} ns/sample (peak {:.2} mV)",
        capture.segment_count(),
        capture.plan.total_samples(),
        capture.plan.sample_interval_ns,
        minimum,
    );
    println!("{}", capture.to_dataframe()?);
    Ok(())
}

/// Hardware stand-in: every registered buffer is filled with a negative
/// pulse at the trigger position, in raw ADC counts.
#[derive(Default)]
struct SyntheticScope {
    buffers: BTreeMap<(Channel, u32), Vec<i16>>,
    pre_samples: usize,
}

impl SyntheticScope {
    const PULSE_COUNTS: f64 = -6_000.0;
    const PULSE_WIDTH: f64 = 40.0;

    fn fill(&mut self) {
        let center = self.pre_samples as f64;
        for ((_, segment), buffer) in &mut self.buffers {
            // Slightly different amplitude per segment, so rapid captures
            // are distinguishable in the output.
            let scale = 1.0 - 0.05 * f64::from(*segment);
            for (i, value) in buffer.iter_mut().enumerate() {
                let distance = (i as f64 - center) / Self::PULSE_WIDTH;
                *value = (Self::PULSE_COUNTS * scale * (-distance * distance).exp()) as i16;
            }
        }
    }
}

impl ScopeDriver for SyntheticScope {
    fn open_unit(&mut self, _resolution: Resolution) -> DriverResult<()> {
        Ok(())
    }

    fn close_unit(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn set_channel_on(
        &mut self,
        _channel: Channel,
        _coupling: Coupling,
        _range: VoltageRange,
        _analogue_offset_v: f64,
        _bandwidth: BandwidthLimit,
    ) -> DriverResult<()> {
        Ok(())
    }

    fn set_channel_off(&mut self, _channel: Channel) -> DriverResult<()> {
        Ok(())
    }

    fn set_trigger_conditions(
        &mut self,
        _conditions: &[ConditionEntry],
        _action: ConditionsAction,
    ) -> DriverResult<()> {
        Ok(())
    }

    fn set_trigger_directions(&mut self, _directions: &[DirectionEntry]) -> DriverResult<()> {
        Ok(())
    }

    fn set_trigger_properties(
        &mut self,
        _properties: &[PropertiesEntry],
        _aux_output_enable: bool,
        _auto_trigger_us: u32,
    ) -> DriverResult<()> {
        Ok(())
    }

    fn set_simple_trigger(
        &mut self,
        _enable: bool,
        _source: Channel,
        _threshold_adc: i16,
        _direction: ThresholdDirection,
        _delay_samples: u64,
        _auto_trigger_us: u32,
    ) -> DriverResult<()> {
        Ok(())
    }

    fn get_minimum_timebase(
        &mut self,
        _enabled_channels: u32,
        _resolution: Resolution,
    ) -> DriverResult<(u32, f64)> {
        Ok((2, 0.8e-9))
    }

    fn get_adc_limits(&mut self, _resolution: Resolution) -> DriverResult<AdcLimits> {
        Ok(AdcLimits {
            min: -32_512,
            max: 32_512,
        })
    }

    fn memory_segments(&mut self, _count: u32) -> DriverResult<u64> {
        Ok(1 << 24)
    }

    fn set_capture_count(&mut self, _count: u32) -> DriverResult<()> {
        Ok(())
    }

    fn get_trigger_info(
        &mut self,
        from_segment: u32,
        to_segment: u32,
    ) -> DriverResult<Vec<SegmentTriggerInfo>> {
        Ok((from_segment..=to_segment)
            .map(|segment| SegmentTriggerInfo {
                timestamp: u64::from(segment) * 25_000,
                timestamp_reset: false,
            })
            .collect())
    }

    fn set_data_buffer(
        &mut self,
        channel: Channel,
        segment: u32,
        buffer: Vec<i16>,
        _mode: DownsampleMode,
        action: BufferAction,
    ) -> DriverResult<()> {
        if action == BufferAction::ClearAll {
            self.buffers.clear();
        }
        self.buffers.insert((channel, segment), buffer);
        Ok(())
    }

    fn take_buffer(&mut self, channel: Channel, segment: u32) -> DriverResult<Vec<i16>> {
        self.buffers
            .remove(&(channel, segment))
            .ok_or(StatusCode(1))
    }

    fn run_block(
        &mut self,
        pre_samples: usize,
        _post_samples: usize,
        _timebase: u32,
        _segment: u32,
    ) -> DriverResult<f64> {
        self.pre_samples = pre_samples;
        Ok(0.0)
    }

    fn run_streaming(
        &mut self,
        _sample_interval: u32,
        _unit: TimeUnit,
        pre_samples: usize,
        _post_samples: usize,
        _auto_stop: bool,
        _downsample_ratio: u64,
        _mode: DownsampleMode,
    ) -> DriverResult<()> {
        self.pre_samples = pre_samples;
        Ok(())
    }

    fn is_ready(&mut self) -> DriverResult<bool> {
        Ok(true)
    }

    fn get_values(
        &mut self,
        _start_index: u64,
        _n_samples: u64,
        _downsample_ratio: u64,
        _mode: DownsampleMode,
        _segment: u32,
    ) -> DriverResult<u16> {
        self.fill();
        Ok(0)
    }

    fn get_values_bulk(
        &mut self,
        _n_samples: u64,
        _from_segment: u32,
        _to_segment: u32,
        _downsample_ratio: u64,
        _mode: DownsampleMode,
    ) -> DriverResult<u16> {
        self.fill();
        Ok(0)
    }

    fn get_streaming_latest_values(&mut self) -> DriverResult<StreamingState> {
        self.fill();
        Ok(StreamingState {
            samples_collected: self.buffers.values().map(Vec::len).sum(),
            auto_stopped: true,
        })
    }

    fn sig_gen_waveform(&mut self, _waveform: Waveform, _buffer_length: usize) -> DriverResult<()> {
        Ok(())
    }

    fn sig_gen_range(&mut self, _peak_to_peak_volts: f64, _offset_volts: f64) -> DriverResult<()> {
        Ok(())
    }

    fn sig_gen_duty_cycle(&mut self, _percent: f64) -> DriverResult<()> {
        Ok(())
    }

    fn sig_gen_frequency(&mut self, _hz: f64) -> DriverResult<()> {
        Ok(())
    }

    fn sig_gen_apply(&mut self, _enabled: bool) -> DriverResult<()> {
        Ok(())
    }
}
