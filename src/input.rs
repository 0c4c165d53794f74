//! Validation of user-entered numbers.
//!
//! Frequencies and thresholds arrive as free text. Anything that is not a
//! plain run of ASCII digits is rejected before it reaches the engine, and
//! the caller resets the field to its default.

use thiserror::Error;

/// A rejected frequency or threshold entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("frequency must be a whole number of seconds no lower than {min}, got {input:?}")]
    Frequency {
        input: String,
        min: u64,
        /// Value the field should be reset to.
        reset_to: u64,
    },

    #[error("threshold must be a whole number above zero, got {input:?}")]
    Threshold { input: String },
}

fn digits(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    (!trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit())).then_some(trimmed)
}

/// Parse an update frequency in seconds.
///
/// Accepts only digits and values of at least `min`. On rejection the error
/// carries `default` as the value to display instead.
pub fn parse_frequency(input: &str, min: u64, default: u64) -> Result<u64, InputError> {
    let reject = || InputError::Frequency {
        input: input.to_string(),
        min,
        reset_to: default,
    };
    let value: u64 = digits(input).and_then(|d| d.parse().ok()).ok_or_else(reject)?;
    if value < min {
        return Err(reject());
    }
    Ok(value)
}

/// Parse a threshold bound. Accepts only digits and values above zero.
pub fn parse_threshold(input: &str) -> Result<u32, InputError> {
    digits(input)
        .and_then(|d| d.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .ok_or_else(|| InputError::Threshold {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_accepts_digits_at_or_above_minimum() {
        assert_eq!(parse_frequency("5", 5, 60), Ok(5));
        assert_eq!(parse_frequency(" 120 ", 5, 60), Ok(120));
    }

    #[test]
    fn frequency_rejects_below_minimum() {
        let err = parse_frequency("4", 5, 60).unwrap_err();
        assert_eq!(
            err,
            InputError::Frequency {
                input: "4".into(),
                min: 5,
                reset_to: 60,
            }
        );
    }

    #[test]
    fn frequency_rejects_non_digits() {
        for input in ["", "ten", "-10", "10.5", "1e3", "+10"] {
            assert!(parse_frequency(input, 5, 60).is_err(), "{input:?}");
        }
    }

    #[test]
    fn frequency_rejects_overflow() {
        assert!(parse_frequency("99999999999999999999999", 5, 60).is_err());
    }

    #[test]
    fn threshold_accepts_positive_digits() {
        assert_eq!(parse_threshold("130"), Ok(130));
        assert_eq!(parse_threshold("1"), Ok(1));
    }

    #[test]
    fn threshold_rejects_zero_and_text() {
        for input in ["0", "000", "", "abc", "-5", "12.5"] {
            assert!(parse_threshold(input).is_err(), "{input:?}");
        }
    }
}
