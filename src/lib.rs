//! # SpadScope RS
//!
//! A Rust acquisition engine for oscilloscope-class digitizers, built for
//! single-photon-detector characterization.
//!
//! This library turns a declarative description of channels, a trigger
//! condition and a desired sampling regime into a completed, unit-converted
//! waveform capture. It talks to the hardware exclusively through the
//! [`ScopeDriver`] trait, so any driver backend (or a test double) plugs in.
//!
//! ## Features
//!
//! - **Channel configuration**: enable a subset of channels A–H with range
//!   and coupling; everything else is forced off
//! - **DNF triggers**: OR-of-ANDs coincidence triggers over per-channel
//!   millivolt thresholds, with automatic ADC-count conversion
//! - **Three capture strategies**: continuous streaming, single-shot block
//!   and multi-segment rapid block with per-segment trigger alignment
//! - **Timebase quantization**: requested intervals snap to the device's
//!   discretized timebases; every time axis is built from the achieved
//!   interval
//! - **Calibrated output**: raw ADC counts convert to millivolts using the
//!   device-reported full-scale limits, with a `polars` DataFrame view
//!
//! ## Example
//!
//! ```
//! use spadscope_rs::{
//!     Channel, ChannelConfig, Coupling, Resolution, SampleInterval, ScopeDriver, SpadScope,
//!     ThresholdDirection, VoltageRange,
//! };
//!
//! fn capture_pulse<D: ScopeDriver>(driver: D) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scope = SpadScope::open(driver, Resolution::Bits10)?;
//!     scope.configure_channels(&[ChannelConfig::new(
//!         Channel::A,
//!         VoltageRange::Mv50,
//!         Coupling::Dc,
//!     )])?;
//!     scope.set_simple_trigger(Channel::A, -8.0, ThresholdDirection::Falling, 0)?;
//!
//!     let capture = scope.acquire_block(10_000, 10_000, SampleInterval::Nanos(1.0))?;
//!     println!(
//!         "captured {} samples at {} ns/sample",
//!         capture.waveform(Channel::A).map_or(0, <[f64]>::len),
//!         capture.plan.sample_interval_ns,
//!     );
//!     scope.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Coincidence trigger
//!
//! ```
//! use spadscope_rs::{Channel, ScopeDriver, SpadScope, ThresholdDirection};
//!
//! fn arm<D: ScopeDriver>(scope: &mut SpadScope<D>) -> Result<(), spadscope_rs::ScopeError> {
//!     // Fire only when both detectors pull below threshold together.
//!     scope.set_coincidence_trigger(
//!         &[
//!             (Channel::A, -8.0, ThresholdDirection::Falling),
//!             (Channel::B, -8.0, ThresholdDirection::Falling),
//!         ],
//!         0,
//!     )
//! }
//! ```

pub mod acquisition;
pub mod channel;
pub mod convert;
pub mod driver;
pub mod scope;
pub mod timebase;
pub mod trigger;

// Re-export the main types for convenience
pub use acquisition::{AcquisitionPlan, CancelToken, CaptureResult, DEFAULT_READY_TIMEOUT};

pub use channel::{BandwidthLimit, Channel, ChannelConfig, ChannelSettings, Coupling, VoltageRange};

pub use convert::{AdcLimits, TimeUnit};

pub use driver::{
    BufferAction, ConditionsAction, DownsampleMode, DriverResult, Resolution, ScopeDriver,
    SegmentTriggerInfo, StatusCode, StreamingState,
};

pub use scope::{ScopeError, SignalConfig, SpadScope, Waveform};

pub use timebase::{ResolvedTimebase, SampleInterval};

pub use trigger::{
    ChannelTrigger, ConditionEntry, ConditionState, DirectionEntry, PropertiesEntry,
    ThresholdDirection, ThresholdMode, TriggerConjunction, TriggerExpression, TriggerStage,
};
