// ── Item states ──
//
// The semantic values pushed to items. A closed set: whatever the
// controller reports is converted into one of these before publishing.

use std::fmt;

use chrono::NaiveDateTime;

/// Fixed-point decimal: `unscaled / 10^scale`.
///
/// Numbers published to items are either integers (`scale == 0`) or
/// floating-point readings normalized to two decimals, so a plain
/// integer mantissa is enough and `Display` is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: i64,
    scale: u32,
}

impl Decimal {
    /// Largest scale whose divisor still fits a `u64`.
    pub const MAX_SCALE: u32 = 18;

    /// `None` when `scale` exceeds [`Decimal::MAX_SCALE`].
    pub const fn new(unscaled: i64, scale: u32) -> Option<Self> {
        if scale > Self::MAX_SCALE {
            return None;
        }
        Some(Self { unscaled, scale })
    }

    pub const fn from_integer(value: i64) -> Self {
        Self {
            unscaled: value,
            scale: 0,
        }
    }

    /// Round a binary float to `scale` decimals, ties to even.
    ///
    /// Works on the exact binary expansion of `value` (not on its shortest
    /// decimal rendering), so `0.125` is a true tie and rounds to `0.12`,
    /// while `22.299999237060546875` becomes `22.30`.
    ///
    /// Returns `None` for NaN, infinities, and results outside `i64`.
    pub fn round_half_even(value: f64, scale: u32) -> Option<Self> {
        if !value.is_finite() || scale > Self::MAX_SCALE {
            return None;
        }

        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased_exp = i32::try_from((bits >> 52) & 0x7ff).ok()?;
        let fraction = bits & ((1_u64 << 52) - 1);

        // value = mantissa * 2^exp, exactly
        let (mantissa, exp) = if biased_exp == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1_u64 << 52), biased_exp - 1075)
        };

        // Scaled numerator; fits comfortably: < 2^53 * 10^18 < 2^113.
        let numerator = u128::from(mantissa) * 10_u128.pow(scale);

        let magnitude = if exp >= 0 {
            let shift = u32::try_from(exp).ok()?;
            if shift >= 64 {
                return None;
            }
            numerator.checked_mul(1_u128 << shift)?
        } else {
            let shift = exp.unsigned_abs();
            if shift >= 127 {
                // numerator < 2^113 <= half of 2^shift: rounds to zero
                0
            } else {
                let quotient = numerator >> shift;
                let remainder = numerator & ((1_u128 << shift) - 1);
                let half = 1_u128 << (shift - 1);
                let round_up = remainder > half || (remainder == half && quotient & 1 == 1);
                quotient + u128::from(round_up)
            }
        };

        let magnitude = i64::try_from(magnitude).ok()?;
        let unscaled = if negative { -magnitude } else { magnitude };
        Self::new(unscaled, scale)
    }

}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.unscaled);
        }
        let divisor = 10_u64.pow(self.scale);
        let abs = self.unscaled.unsigned_abs();
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let width = usize::try_from(self.scale).map_err(|_| fmt::Error)?;
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / divisor,
            abs % divisor,
            width = width
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnOff {
    On,
    Off,
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenClosed {
    Open,
    Closed,
}

impl From<bool> for OpenClosed {
    fn from(open: bool) -> Self {
        if open { Self::Open } else { Self::Closed }
    }
}

/// A converted value ready for an item.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Decimal(Decimal),
    OnOff(OnOff),
    OpenClosed(OpenClosed),
    DateTime(NaiveDateTime),
    String(String),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal(d) => d.fmt(f),
            Self::OnOff(OnOff::On) => f.write_str("ON"),
            Self::OnOff(OnOff::Off) => f.write_str("OFF"),
            Self::OpenClosed(OpenClosed::Open) => f.write_str("OPEN"),
            Self::OpenClosed(OpenClosed::Closed) => f.write_str("CLOSED"),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Which engine path produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UpdateSource {
    /// Refresh scheduler query.
    Poll,
    /// Controller push notification.
    Notification,
}

/// One state update bound for the event bus.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub item_name: String,
    pub state: State,
    pub source: UpdateSource,
}
