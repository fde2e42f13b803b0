//! Quantization of a requested sample interval to the device's discretized
//! timebase indices.
//!
//! The device does not accept an arbitrary interval: below 3.2 ns the
//! achievable intervals advance in powers of two above a 5 GS/s base rate,
//! from 3.2 ns upward they advance linearly in 6.4 ns steps. Resolving a
//! request is therefore lossy; every downstream time axis must be built from
//! the interval the resolver hands back, never from the request.

/// Requested sampling regime for a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleInterval {
    /// Let the device pick the fastest timebase available for the currently
    /// enabled channel set.
    Fastest,
    /// Closest achievable approximation of this interval, in nanoseconds.
    Nanos(f64),
}

/// A discretized timebase index together with the interval it produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTimebase {
    pub index: u32,
    pub interval_ns: f64,
}

/// Below this interval the timebase advances in powers of two.
const POW2_REGIME_LIMIT_NS: f64 = 3.2;
/// First timebase index of the linear regime.
const LINEAR_REGIME_START: u32 = 5;
/// Timebase steps per nanosecond in the linear regime.
const LINEAR_REGIME_SLOPE: f64 = 0.15625;
/// Index offset of the linear regime.
const LINEAR_REGIME_OFFSET: f64 = 4.0;
/// Base sample rate in GS/s backing the power-of-two regime.
const BASE_RATE_GSPS: f64 = 5.0;

/// Quantize a requested interval to the nearest supported timebase.
pub fn quantize(requested_ns: f64) -> ResolvedTimebase {
    let index = if requested_ns < POW2_REGIME_LIMIT_NS {
        (requested_ns * BASE_RATE_GSPS).log2().max(0.0).floor() as u32
    } else {
        (requested_ns * LINEAR_REGIME_SLOPE + LINEAR_REGIME_OFFSET).floor() as u32
    };
    ResolvedTimebase {
        index,
        interval_ns: interval_of(index),
    }
}

/// Interval in nanoseconds produced by a timebase index.
pub fn interval_of(index: u32) -> f64 {
    if index < LINEAR_REGIME_START {
        f64::from(1u32 << index) / BASE_RATE_GSPS
    } else {
        (f64::from(index) - LINEAR_REGIME_OFFSET) / LINEAR_REGIME_SLOPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow2_regime() {
        let resolved = quantize(2.0);
        assert_eq!(resolved.index, 3);
        assert_eq!(resolved.interval_ns, 1.6);
    }

    #[test]
    fn test_linear_regime() {
        let resolved = quantize(1_000.0);
        assert_eq!(resolved.index, 160);
        assert_eq!(resolved.interval_ns, 998.4);
    }

    #[test]
    fn test_quantization_is_idempotent() {
        for requested in [0.5, 1.0, 2.0, 3.2, 17.0, 1_000.0, 1e6] {
            let first = quantize(requested);
            let second = quantize(first.interval_ns);
            assert_eq!(second.index, first.index);
            assert_eq!(second.interval_ns, first.interval_ns);
        }
    }

    #[test]
    fn test_regime_boundary() {
        // 3.2 ns is representable in both regimes and must resolve cleanly.
        let resolved = quantize(POW2_REGIME_LIMIT_NS);
        assert_eq!(resolved.index, 4);
        assert_eq!(resolved.interval_ns, 3.2);
    }

    #[test]
    fn test_fastest_index_floor() {
        // Requests below the fastest achievable interval clamp to index 0.
        let resolved = quantize(0.05);
        assert_eq!(resolved.index, 0);
        assert_eq!(resolved.interval_ns, 0.2);
    }
}
