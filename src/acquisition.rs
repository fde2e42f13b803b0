//! Capture plans, capture results and the helpers shared by the three
//! acquisition strategies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use polars::prelude::*;

use crate::channel::Channel;
use crate::driver::SegmentTriggerInfo;
use crate::timebase::SampleInterval;

/// Default bound on the completion poll of the block strategies.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// One full wrap of the 64-bit trigger timestamp counter. Added to a
/// segment's raw timestamp when the device flags a counter reset, so a
/// wrapped counter never produces a negative offset. Only good to
/// microsecond-scale cross-segment accuracy, which is all the offsets are
/// used for.
const TIMESTAMP_COUNTER_PERIOD: f64 = u64::MAX as f64 + 1.0;

/// Sampling geometry of one capture, as actually programmed.
///
/// `sample_interval_ns` is the post-quantization interval; it generally
/// differs from the request and is the only value time axes are built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionPlan {
    pub pre_samples: usize,
    pub post_samples: usize,
    pub requested: SampleInterval,
    pub sample_interval_ns: f64,
    /// Discretized timebase index; `None` for streaming captures, which
    /// take their interval directly.
    pub timebase: Option<u32>,
    pub segments: u32,
}

impl AcquisitionPlan {
    pub fn total_samples(&self) -> usize {
        self.pre_samples + self.post_samples
    }
}

/// Calibrated waveforms for every enabled channel, plus per-segment time
/// axes.
///
/// The result is fully owned: device buffers are converted and released
/// before it is handed out, so it stays valid after the session moves on or
/// closes. Waveform length equals time-axis length equals
/// [`AcquisitionPlan::total_samples`] for every (channel, segment) pair.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub plan: AcquisitionPlan,
    /// Millivolt waveforms, one per segment, keyed by channel.
    pub channels: BTreeMap<Channel, Vec<Vec<f64>>>,
    /// Nanosecond time axes, one per segment, already shifted by that
    /// segment's trigger offset.
    pub time_axes_ns: Vec<Vec<f64>>,
    /// Trigger-time offset of each segment relative to segment 0.
    pub segment_offsets_ns: Vec<f64>,
}

impl CaptureResult {
    /// Segment-0 waveform of a channel.
    pub fn waveform(&self, channel: Channel) -> Option<&[f64]> {
        self.segment(channel, 0)
    }

    pub fn segment(&self, channel: Channel, segment: usize) -> Option<&[f64]> {
        self.channels
            .get(&channel)
            .and_then(|segments| segments.get(segment))
            .map(Vec::as_slice)
    }

    pub fn segment_count(&self) -> usize {
        self.time_axes_ns.len()
    }

    /// Flatten the capture into a `DataFrame`: a `time_ns` column, a
    /// `segment` index column and one millivolt column per channel, with
    /// segments stacked row-wise.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut time = Vec::new();
        let mut segment = Vec::new();
        for (index, axis) in self.time_axes_ns.iter().enumerate() {
            time.extend_from_slice(axis);
            segment.extend(std::iter::repeat(index as u32).take(axis.len()));
        }

        let mut columns: Vec<Column> = vec![
            Series::new("time_ns".into(), time).into(),
            Series::new("segment".into(), segment).into(),
        ];
        for (channel, segments) in &self.channels {
            let mut values = Vec::new();
            for waveform in segments {
                values.extend_from_slice(waveform);
            }
            let name = format!("channel_{}", channel.letter().to_ascii_lowercase());
            columns.push(Series::new(name.into(), values).into());
        }

        DataFrame::new(columns)
    }
}

/// Evenly spaced time axis of `n_samples` points, `interval_ns` apart,
/// starting at `offset_ns`.
pub(crate) fn time_axis(n_samples: usize, interval_ns: f64, offset_ns: f64) -> Vec<f64> {
    (0..n_samples)
        .map(|i| i as f64 * interval_ns + offset_ns)
        .collect()
}

/// Per-segment trigger offsets in nanoseconds, relative to segment 0.
pub(crate) fn segment_offsets(info: &[SegmentTriggerInfo], interval_ns: f64) -> Vec<f64> {
    let Some(first) = info.first() else {
        return Vec::new();
    };
    let origin = effective_timestamp(first);
    info.iter()
        .map(|segment| interval_ns * (effective_timestamp(segment) - origin))
        .collect()
}

fn effective_timestamp(info: &SegmentTriggerInfo) -> f64 {
    let raw = info.timestamp as f64;
    if info.timestamp_reset {
        raw + TIMESTAMP_COUNTER_PERIOD
    } else {
        raw
    }
}

/// Cooperative abort handle for a running acquisition.
///
/// Cloneable and cheap; hand a clone to another thread and call
/// [`Self::cancel`] to make the engine's completion poll bail out with a
/// cancellation error. The flag is sticky until [`Self::clear`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
