// ── Wire-to-item value conversion ──
//
// Maps a controller `Value` onto the `State` an item of a given kind can
// hold. Pure and total: every unsupported pairing is an error, never a
// panic, and nothing here performs I/O.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use ihc_api::Value;

use crate::model::{Decimal, ItemKind, OnOff, OpenClosed, State};

/// Decimals kept when publishing floating-point readings.
const FLOAT_SCALE: u32 = 2;

/// Calendar date carried by time-of-day values: 1900-02-01.
///
/// The month is one past what a reader expects (February, not January).
/// Kept as-is so published timestamps stay identical across versions.
const TIME_ONLY_YEAR: i32 = 1900;
const TIME_ONLY_MONTH: u32 = 2;
const TIME_ONLY_DAY: u32 = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("Can't convert {value} to {kind} item")]
    Unsupported { value: &'static str, kind: ItemKind },

    #[error("Floating point value {value} can't be represented as a decimal")]
    NotRepresentable { value: f64 },

    #[error("Invalid date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("Invalid time {hours:02}:{minutes:02}:{seconds:02}")]
    InvalidTime { hours: u32, minutes: u32, seconds: u32 },
}

/// Convert a wire value into the state an item of `kind` accepts.
pub fn convert(kind: ItemKind, value: &Value) -> Result<State, ConversionError> {
    match kind {
        ItemKind::Number => to_number(value).map(State::Decimal),
        ItemKind::Switch => match value {
            Value::Boolean(b) => Ok(State::OnOff(OnOff::from(*b))),
            other => Err(unsupported(other, kind)),
        },
        ItemKind::Contact => match value {
            Value::Boolean(b) => Ok(State::OpenClosed(OpenClosed::from(*b))),
            other => Err(unsupported(other, kind)),
        },
        ItemKind::DateTime => to_date_time(value).map(State::DateTime),
        ItemKind::String => match value {
            Value::Enum { name } => Ok(State::String(name.clone())),
            other => Err(unsupported(other, kind)),
        },
    }
}

fn unsupported(value: &Value, kind: ItemKind) -> ConversionError {
    ConversionError::Unsupported {
        value: value.variant_name(),
        kind,
    }
}

fn to_number(value: &Value) -> Result<Decimal, ConversionError> {
    match value {
        Value::Boolean(b) => Ok(Decimal::from_integer(i64::from(*b))),
        Value::Integer(i) => Ok(Decimal::from_integer(*i)),
        Value::Timer { milliseconds } => Ok(Decimal::from_integer(*milliseconds)),
        Value::Weekday(n) => Ok(Decimal::from_integer(i64::from(*n))),
        // Controllers report single-precision readings widened to double
        // (22.3 arrives as 22.299999237060546875); two decimals strip that.
        Value::FloatingPoint(f) => Decimal::round_half_even(*f, FLOAT_SCALE)
            .ok_or(ConversionError::NotRepresentable { value: *f }),
        other => Err(unsupported(other, ItemKind::Number)),
    }
}

fn to_date_time(value: &Value) -> Result<NaiveDateTime, ConversionError> {
    match value {
        Value::Date { year, month, day } => NaiveDate::from_ymd_opt(*year, *month, *day)
            .map(|d| d.and_time(NaiveTime::MIN))
            .ok_or(ConversionError::InvalidDate {
                year: *year,
                month: *month,
                day: *day,
            }),
        Value::Time {
            hours,
            minutes,
            seconds,
        } => {
            let time = NaiveTime::from_hms_opt(*hours, *minutes, *seconds).ok_or(
                ConversionError::InvalidTime {
                    hours: *hours,
                    minutes: *minutes,
                    seconds: *seconds,
                },
            )?;
            let date = NaiveDate::from_ymd_opt(TIME_ONLY_YEAR, TIME_ONLY_MONTH, TIME_ONLY_DAY)
                .unwrap_or(NaiveDate::MIN);
            Ok(date.and_time(time))
        }
        other => Err(unsupported(other, ItemKind::DateTime)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn number(value: Value) -> String {
        convert(ItemKind::Number, &value).unwrap().to_string()
    }

    // ── Number ──────────────────────────────────────────────────────

    #[test]
    fn numbers_from_every_numeric_variant() {
        assert_eq!(number(Value::Boolean(true)), "1");
        assert_eq!(number(Value::Boolean(false)), "0");
        assert_eq!(number(Value::Integer(-12)), "-12");
        assert_eq!(number(Value::Timer { milliseconds: 90_000 }), "90000");
        assert_eq!(number(Value::Weekday(3)), "3");
    }

    #[test]
    fn floating_point_rounds_half_even_to_two_decimals() {
        assert_eq!(number(Value::FloatingPoint(22.299_999_237_060_546_875)), "22.30");
        assert_eq!(number(Value::FloatingPoint(0.125)), "0.12");
    }

    #[test]
    fn non_finite_float_is_a_conversion_error() {
        let err = convert(ItemKind::Number, &Value::FloatingPoint(f64::NAN)).unwrap_err();
        assert!(matches!(err, ConversionError::NotRepresentable { .. }));
    }

    #[test]
    fn enum_to_number_is_rejected() {
        let err = convert(ItemKind::Number, &Value::Enum { name: "Auto".into() }).unwrap_err();
        assert_eq!(
            err,
            ConversionError::Unsupported {
                value: "Enum",
                kind: ItemKind::Number
            }
        );
        assert_eq!(err.to_string(), "Can't convert Enum to number item");
    }

    // ── Switch / Contact ────────────────────────────────────────────

    #[test]
    fn booleans_map_to_switch_and_contact() {
        assert_eq!(
            convert(ItemKind::Switch, &Value::Boolean(true)).unwrap(),
            State::OnOff(OnOff::On)
        );
        assert_eq!(
            convert(ItemKind::Switch, &Value::Boolean(false)).unwrap(),
            State::OnOff(OnOff::Off)
        );
        assert_eq!(
            convert(ItemKind::Contact, &Value::Boolean(true)).unwrap(),
            State::OpenClosed(OpenClosed::Open)
        );
        assert_eq!(
            convert(ItemKind::Contact, &Value::Boolean(false)).unwrap(),
            State::OpenClosed(OpenClosed::Closed)
        );
    }

    #[test]
    fn only_booleans_drive_switches_and_contacts() {
        for kind in [ItemKind::Switch, ItemKind::Contact] {
            assert!(convert(kind, &Value::Integer(1)).is_err());
            assert!(convert(kind, &Value::FloatingPoint(1.0)).is_err());
        }
    }

    // ── DateTime ────────────────────────────────────────────────────

    #[test]
    fn date_becomes_midnight_of_that_day() {
        let state = convert(
            ItemKind::DateTime,
            &Value::Date {
                year: 2012,
                month: 6,
                day: 30,
            },
        )
        .unwrap();
        assert_eq!(state.to_string(), "2012-06-30T00:00:00");
    }

    #[test]
    fn time_lands_on_february_first_1900() {
        // Historical baseline: month index 1 of a zero-based calendar.
        let state = convert(
            ItemKind::DateTime,
            &Value::Time {
                hours: 7,
                minutes: 45,
                seconds: 9,
            },
        )
        .unwrap();
        assert_eq!(state.to_string(), "1900-02-01T07:45:09");
    }

    #[test]
    fn impossible_calendar_values_are_errors() {
        assert!(matches!(
            convert(
                ItemKind::DateTime,
                &Value::Date {
                    year: 2023,
                    month: 2,
                    day: 30
                }
            ),
            Err(ConversionError::InvalidDate { .. })
        ));
        assert!(matches!(
            convert(
                ItemKind::DateTime,
                &Value::Time {
                    hours: 25,
                    minutes: 0,
                    seconds: 0
                }
            ),
            Err(ConversionError::InvalidTime { .. })
        ));
        assert!(convert(ItemKind::DateTime, &Value::Boolean(true)).is_err());
    }

    // ── String ──────────────────────────────────────────────────────

    #[test]
    fn enum_name_becomes_text() {
        assert_eq!(
            convert(ItemKind::String, &Value::Enum { name: "Comfort".into() }).unwrap(),
            State::String("Comfort".into())
        );
        assert!(convert(ItemKind::String, &Value::Integer(4)).is_err());
    }
}
