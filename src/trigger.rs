//! DNF trigger model: a disjunction of conjunctions over per-channel
//! threshold conditions.
//!
//! The device consumes triggers as three parallel flat arrays (conditions,
//! directions, properties) that callers would otherwise have to keep in
//! lock-step by hand. Here every per-channel entry is a single
//! [`ChannelTrigger`] value bundling all three facets; the arrays only come
//! into existence at the driver-call boundary.

use std::fmt;

use crate::channel::{Channel, VoltageRange};
use crate::convert::{self, AdcLimits};

/// Which device programming step a trigger failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStage {
    Conditions,
    Directions,
    Properties,
}

impl fmt::Display for TriggerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStage::Conditions => write!(f, "conditions"),
            TriggerStage::Directions => write!(f, "directions"),
            TriggerStage::Properties => write!(f, "properties"),
        }
    }
}

/// Threshold crossing sense for one trigger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDirection {
    Above,
    Below,
    Rising,
    Falling,
    RisingOrFalling,
}

/// Level vs. window interpretation of the threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    Level,
    Window,
}

/// Polarity of one condition entry inside a conjunction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionState {
    True,
    False,
}

/// Default hysteresis band, as a fraction of the threshold magnitude.
pub const DEFAULT_HYSTERESIS_FRACTION: f64 = 0.02;

/// One per-channel trigger entry: condition polarity, crossing direction and
/// ADC-domain threshold/hysteresis in a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTrigger {
    pub channel: Channel,
    pub state: ConditionState,
    pub direction: ThresholdDirection,
    pub mode: ThresholdMode,
    pub threshold_adc: i16,
    pub hysteresis_adc: u16,
}

impl ChannelTrigger {
    /// Build an entry from a millivolt threshold.
    ///
    /// Threshold and hysteresis are converted into ADC counts using the
    /// channel's range and the device's full-scale limits; the hysteresis
    /// band is `|threshold * hysteresis_fraction|` converted the same way.
    pub fn from_millivolts(
        channel: Channel,
        range: VoltageRange,
        limits: AdcLimits,
        threshold_mv: f64,
        direction: ThresholdDirection,
        mode: ThresholdMode,
        hysteresis_fraction: f64,
        inverted: bool,
    ) -> Self {
        let threshold_adc = convert::millivolts_to_adc(threshold_mv, range, limits);
        let hysteresis_mv = (threshold_mv * hysteresis_fraction).abs();
        let hysteresis_adc =
            convert::millivolts_to_adc(hysteresis_mv, range, limits).unsigned_abs();
        Self {
            channel,
            state: if inverted {
                ConditionState::False
            } else {
                ConditionState::True
            },
            direction,
            mode,
            threshold_adc,
            hysteresis_adc,
        }
    }

    pub(crate) fn condition_entry(&self) -> ConditionEntry {
        ConditionEntry {
            source: self.channel,
            state: self.state,
        }
    }

    pub(crate) fn direction_entry(&self) -> DirectionEntry {
        DirectionEntry {
            channel: self.channel,
            direction: self.direction,
            mode: self.mode,
        }
    }

    pub(crate) fn properties_entry(&self) -> PropertiesEntry {
        PropertiesEntry {
            channel: self.channel,
            threshold_upper_adc: self.threshold_adc,
            hysteresis_upper_adc: self.hysteresis_adc,
            threshold_lower_adc: self.threshold_adc,
            hysteresis_lower_adc: self.hysteresis_adc,
        }
    }
}

/// Condition facet of one entry, as the device consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionEntry {
    pub source: Channel,
    pub state: ConditionState,
}

/// Direction facet of one entry, as the device consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionEntry {
    pub channel: Channel,
    pub direction: ThresholdDirection,
    pub mode: ThresholdMode,
}

/// Threshold/hysteresis facet of one entry, as the device consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertiesEntry {
    pub channel: Channel,
    pub threshold_upper_adc: i16,
    pub hysteresis_upper_adc: u16,
    pub threshold_lower_adc: i16,
    pub hysteresis_lower_adc: u16,
}

/// AND of per-channel conditions; fires only when every entry holds.
#[derive(Debug, Clone, Default)]
pub struct TriggerConjunction {
    pub entries: Vec<ChannelTrigger>,
}

impl TriggerConjunction {
    pub fn new(entries: Vec<ChannelTrigger>) -> Self {
        Self { entries }
    }

    pub fn single(entry: ChannelTrigger) -> Self {
        Self {
            entries: vec![entry],
        }
    }
}

impl FromIterator<ChannelTrigger> for TriggerConjunction {
    fn from_iter<I: IntoIterator<Item = ChannelTrigger>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// OR of conjunctions: the full disjunctive-normal-form trigger.
#[derive(Debug, Clone, Default)]
pub struct TriggerExpression {
    pub conjunctions: Vec<TriggerConjunction>,
}

impl TriggerExpression {
    pub fn new(conjunctions: Vec<TriggerConjunction>) -> Self {
        Self { conjunctions }
    }

    pub fn single(conjunction: TriggerConjunction) -> Self {
        Self {
            conjunctions: vec![conjunction],
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChannelTrigger> {
        self.conjunctions
            .iter()
            .flat_map(|conjunction| conjunction.entries.iter())
    }

    /// Flat union of direction entries across all conjunctions; the device
    /// wants these as a single array spanning every channel used anywhere in
    /// the expression.
    pub(crate) fn direction_entries(&self) -> Vec<DirectionEntry> {
        self.entries().map(ChannelTrigger::direction_entry).collect()
    }

    /// Flat union of threshold/hysteresis entries, same layout rule as
    /// [`Self::direction_entries`].
    pub(crate) fn properties_entries(&self) -> Vec<PropertiesEntry> {
        self.entries()
            .map(ChannelTrigger::properties_entry)
            .collect()
    }
}
