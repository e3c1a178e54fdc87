//! Currency-code codec.
//!
//! The ledger names issued currencies either by a short ISO-style code (at
//! most three characters, passed through verbatim) or by a 160-bit code
//! written as 40 hex digits. Longer human symbols are packed into the latter by
//! taking their ASCII bytes and right-padding with zero bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IssuanceError;

/// Width of a non-standard currency code in hex digits.
pub const HEX_CODE_LEN: usize = 40;
/// Longest symbol that still fits into a hex currency code.
pub const MAX_SYMBOL_BYTES: usize = HEX_CODE_LEN / 2;
/// Longest symbol passed to the ledger verbatim.
pub const MAX_STANDARD_LEN: usize = 3;

/// A currency code exactly as the ledger expects it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the 40-digit hex form.
    pub fn is_hex(&self) -> bool {
        is_hex_code(&self.0)
    }

    /// Human-readable symbol this code stands for.
    pub fn symbol(&self) -> String {
        decode(&self.0)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Convert a token symbol into its ledger currency code.
///
/// Symbols of up to three characters pass through unchanged, with two
/// exceptions the ledger itself refuses: the empty symbol and `XRP` in any
/// case, which names the native asset and cannot be issued.
pub fn encode(symbol: &str) -> Result<CurrencyCode, IssuanceError> {
    if symbol.is_empty() {
        return Err(IssuanceError::InvalidArgument("token symbol is empty"));
    }
    if !symbol.is_ascii() {
        return Err(IssuanceError::InvalidArgument(
            "token symbol must be ASCII",
        ));
    }
    if symbol.len() <= MAX_STANDARD_LEN {
        if symbol.eq_ignore_ascii_case("XRP") {
            return Err(IssuanceError::InvalidArgument(
                "XRP is reserved for the native asset",
            ));
        }
        return Ok(CurrencyCode(symbol.to_string()));
    }
    let hex = hex::encode_upper(symbol.as_bytes());
    if hex.len() > HEX_CODE_LEN {
        return Err(IssuanceError::SymbolTooLong {
            symbol: symbol.to_string(),
            bytes: symbol.len(),
        });
    }
    Ok(CurrencyCode(format!("{:0<width$}", hex, width = HEX_CODE_LEN)))
}

/// Turn a ledger currency code back into a symbol. Anything that is not a
/// 40-digit hex code is returned unchanged.
pub fn decode(code: &str) -> String {
    let upper = code.to_ascii_uppercase();
    if !is_hex_code(&upper) {
        return code.to_string();
    }
    let mut trimmed = upper.as_str();
    while let Some(rest) = trimmed.strip_suffix("00") {
        trimmed = rest;
    }
    match hex::decode(trimmed) {
        Ok(bytes) => bytes.into_iter().map(char::from).collect(),
        Err(_) => code.to_string(),
    }
}

fn is_hex_code(code: &str) -> bool {
    code.len() == HEX_CODE_LEN && code.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_symbols_pass_through() {
        for symbol in ["X", "AB", "XQN", "usd"] {
            assert_eq!(encode(symbol).unwrap().as_str(), symbol);
        }
    }

    #[test]
    fn long_symbols_are_hex_padded() {
        let code = encode("SHIBA").unwrap();
        assert_eq!(code.as_str(), format!("5348494241{}", "0".repeat(30)));
        assert!(code.is_hex());
        assert_eq!(code.symbol(), "SHIBA");
    }

    #[test]
    fn twenty_bytes_fit_exactly() {
        let symbol = "ABCDEFGHIJKLMNOPQRST";
        let code = encode(symbol).unwrap();
        assert_eq!(code.as_str().len(), HEX_CODE_LEN);
        assert!(!code.as_str().ends_with("00"));
        assert_eq!(decode(code.as_str()), symbol);
    }

    #[test]
    fn twenty_one_bytes_are_rejected() {
        let err = encode("ABCDEFGHIJKLMNOPQRSTU").unwrap_err();
        assert!(matches!(err, IssuanceError::SymbolTooLong { bytes: 21, .. }));
    }

    #[test]
    fn empty_and_native_symbols_are_rejected() {
        assert!(encode("").is_err());
        assert!(encode("xrp").is_err());
        assert!(encode("ŠIBA").is_err());
    }

    #[test]
    fn decode_is_case_insensitive_and_byte_aligned() {
        let lower = format!("5348494241{}", "0".repeat(30)).to_lowercase();
        assert_eq!(decode(&lower), "SHIBA");
        // "P" is 0x50: its trailing zero digit belongs to the byte, not padding.
        let code = encode("PPPP").unwrap();
        assert_eq!(decode(code.as_str()), "PPPP");
    }

    #[test]
    fn non_hex_codes_are_returned_unchanged() {
        assert_eq!(decode("USD"), "USD");
        assert_eq!(decode("not-a-forty-digit-code"), "not-a-forty-digit-code");
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(symbol in "[!-~]{1,20}") {
            prop_assume!(!symbol.eq_ignore_ascii_case("XRP"));
            let code = encode(&symbol).unwrap();
            prop_assert_eq!(decode(code.as_str()), symbol);
        }

        #[test]
        fn short_symbols_encode_to_themselves(symbol in "[A-Za-z0-9]{1,3}") {
            prop_assume!(!symbol.eq_ignore_ascii_case("XRP"));
            let code = encode(&symbol).unwrap();
            prop_assert_eq!(code.as_str(), symbol.as_str());
        }
    }
}
