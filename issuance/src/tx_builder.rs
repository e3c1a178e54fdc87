//! Payloads for each step of the issuance sequence.

use crate::config::{IssuancePolicy, PlatformFee};
use crate::currency::CurrencyCode;
use crate::ledger::{Amount, IssuedAmount, Transaction, TransactionBody};

/// `AccountSet` flag: trust lines to this account ripple by default.
pub const ASF_DEFAULT_RIPPLE: u32 = 8;
/// `AccountSet` flag: trust lines to this account need authorization.
pub const ASF_REQUIRE_AUTH: u32 = 2;
/// `AccountSet` transaction flag: incoming payments need a destination tag.
pub const TF_REQUIRE_DEST_TAG: u32 = 0x0001_0000;
/// `AccountSet` transaction flag: discourage incoming XRP.
pub const TF_DISALLOW_XRP: u32 = 0x0010_0000;

const SETTINGS_FLAGS: u32 = TF_DISALLOW_XRP | TF_REQUIRE_DEST_TAG;

pub fn platform_fee(issuer: &str, fee: &PlatformFee) -> Transaction {
    Transaction::new(
        issuer,
        TransactionBody::Payment {
            destination: fee.address.clone(),
            amount: Amount::drops(fee.amount),
            destination_tag: None,
        },
    )
}

pub fn issuer_settings(issuer: &str, policy: &IssuancePolicy, domain: Option<&str>) -> Transaction {
    Transaction::new(
        issuer,
        TransactionBody::AccountSet {
            set_flag: Some(ASF_DEFAULT_RIPPLE),
            transfer_rate: Some(policy.transfer_rate),
            tick_size: Some(policy.tick_size),
            domain: domain.map(encode_domain),
        },
    )
    .with_flags(SETTINGS_FLAGS)
}

pub fn receiver_settings(receiver: &str, domain: Option<&str>) -> Transaction {
    Transaction::new(
        receiver,
        TransactionBody::AccountSet {
            set_flag: Some(ASF_REQUIRE_AUTH),
            transfer_rate: None,
            tick_size: None,
            domain: domain.map(encode_domain),
        },
    )
    .with_flags(SETTINGS_FLAGS)
}

pub fn trust_line(
    receiver: &str,
    issuer: &str,
    currency: &CurrencyCode,
    policy: &IssuancePolicy,
) -> Transaction {
    Transaction::new(
        receiver,
        TransactionBody::TrustSet {
            limit_amount: IssuedAmount {
                currency: currency.clone(),
                issuer: issuer.to_string(),
                value: policy.trust_limit.clone(),
            },
        },
    )
}

pub fn issue_tokens(
    issuer: &str,
    receiver: &str,
    currency: &CurrencyCode,
    amount: &str,
    policy: &IssuancePolicy,
) -> Transaction {
    Transaction::new(
        issuer,
        TransactionBody::Payment {
            destination: receiver.to_string(),
            amount: Amount::Issued(IssuedAmount {
                currency: currency.clone(),
                issuer: issuer.to_string(),
                value: amount.to_string(),
            }),
            destination_tag: Some(policy.destination_tag),
        },
    )
}

/// The ledger stores `Domain` as uppercase hex of the ASCII domain.
pub fn encode_domain(domain: &str) -> String {
    hex::encode_upper(domain.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency;
    use crate::ledger::Drops;
    use serde_json::json;

    #[test]
    fn issuer_settings_flags() {
        let tx = issuer_settings("rIssuer", &IssuancePolicy::default(), Some("example.com"));
        let value = tx.to_json().unwrap();
        assert_eq!(value["TransactionType"], "AccountSet");
        assert_eq!(value["SetFlag"], 8);
        assert_eq!(value["Flags"], 0x0011_0000);
        assert_eq!(value["TickSize"], 5);
        assert_eq!(value["TransferRate"], 0);
        assert_eq!(value["Domain"], "6578616D706C652E636F6D");
    }

    #[test]
    fn receiver_settings_require_auth_without_domain() {
        let value = receiver_settings("rReceiver", None).to_json().unwrap();
        assert_eq!(value["SetFlag"], 2);
        assert!(value.get("Domain").is_none());
        assert!(value.get("TickSize").is_none());
    }

    #[test]
    fn issuance_payment_carries_destination_tag() {
        let code = currency::encode("SHIBA").unwrap();
        let tx = issue_tokens("rIssuer", "rReceiver", &code, "1000", &IssuancePolicy::default());
        let value = tx.to_json().unwrap();
        assert_eq!(value["DestinationTag"], 1);
        assert_eq!(
            value["Amount"],
            json!({ "currency": code.as_str(), "issuer": "rIssuer", "value": "1000" })
        );
    }

    #[test]
    fn fee_payment_is_native() {
        let fee = PlatformFee {
            address: "rPlatform".into(),
            amount: Drops::from_xrp(6),
        };
        let value = platform_fee("rIssuer", &fee).to_json().unwrap();
        assert_eq!(value["Amount"], "6000000");
        assert_eq!(value["Destination"], "rPlatform");
    }
}
