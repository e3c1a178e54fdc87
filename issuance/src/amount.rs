//! Issued-currency values as the ledger accepts them.
//!
//! The ledger stores issued amounts as a 16-digit decimal mantissa with an
//! exponent between -96 and 80. Text is accepted in the form
//! `[+-]?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`.

use std::cmp::Ordering;

use crate::error::IssuanceError;

/// Significant digits the ledger keeps.
pub const MAX_PRECISION: usize = 16;
/// Exponent range of the normalized 16-digit mantissa.
pub const MIN_EXPONENT: i64 = -96;
pub const MAX_EXPONENT: i64 = 80;
/// The ledger rejects exponents written with more digits than this.
const MAX_EXPONENT_DIGITS: usize = 15;

/// A positive issued value in normalized form: significant digits without
/// leading or trailing zeros, and the decimal exponent of the first digit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedValue {
    digits: String,
    exponent: i64,
}

impl IssuedValue {
    /// Parse a strictly positive value the ledger can represent exactly.
    pub fn parse(text: &str) -> Result<Self, IssuanceError> {
        let invalid = || IssuanceError::InvalidAmount(text.to_string());
        let body = text.strip_prefix('+').unwrap_or(text);
        if body.starts_with('-') {
            return Err(invalid());
        }

        let (mantissa, exponent) = match body.find(['e', 'E']) {
            Some(at) => (&body[..at], parse_exponent(&body[at + 1..]).ok_or_else(invalid)?),
            None => (body, 0),
        };
        let (integer, fraction) = match mantissa.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (mantissa, ""),
        };
        let well_formed = !integer.is_empty()
            && integer.bytes().all(|b| b.is_ascii_digit())
            && (integer == "0" || !integer.starts_with('0'))
            && fraction.bytes().all(|b| b.is_ascii_digit())
            && (!fraction.is_empty() || !mantissa.contains('.'));
        if !well_formed {
            return Err(invalid());
        }

        let all_digits = format!("{integer}{fraction}");
        let leading = all_digits.len() - all_digits.trim_start_matches('0').len();
        let digits = all_digits.trim_matches('0');
        if digits.is_empty() {
            return Err(invalid());
        }
        if digits.len() > MAX_PRECISION {
            return Err(invalid());
        }
        // Exponent of the first significant digit.
        let exponent = exponent + integer.len() as i64 - 1 - leading as i64;
        let normalized = exponent - (MAX_PRECISION as i64 - 1);
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&normalized) {
            return Err(invalid());
        }
        Ok(Self {
            digits: digits.to_string(),
            exponent,
        })
    }
}

fn parse_exponent(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty()
        || digits.len() > MAX_EXPONENT_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    text.parse().ok()
}

impl Ord for IssuedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.exponent.cmp(&other.exponent).then_with(|| {
            let width = self.digits.len().max(other.digits.len());
            let lhs = format!("{:0<width$}", self.digits);
            let rhs = format!("{:0<width$}", other.digits);
            lhs.cmp(&rhs)
        })
    }
}

impl PartialOrd for IssuedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
