//! Ledger collaborator boundary.
//!
//! Everything the orchestration needs from the XRP Ledger goes through the
//! object-safe [`LedgerClient`] trait so the workflow can run against a real
//! `rippled` node ([`crate::rippled`]) or an in-memory test ledger.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::{Credential, Secret};
use crate::currency::CurrencyCode;
use crate::error::IssuanceError;

/// Result code of a transaction that was applied successfully.
pub const SUCCESS_CODE: &str = "tesSUCCESS";

pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Amount of the native asset in its smallest unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Drops(pub u64);

impl Drops {
    pub const fn from_xrp(xrp: u64) -> Self {
        Self(xrp * DROPS_PER_XRP)
    }

    /// Display-unit value.
    pub fn as_xrp(self) -> f64 {
        self.0 as f64 / DROPS_PER_XRP as f64
    }

    pub fn saturating_sub(self, other: Drops) -> Drops {
        Drops(self.0.saturating_sub(other.0))
    }

    pub fn parse(value: &str) -> Result<Self, IssuanceError> {
        value
            .trim()
            .parse::<u64>()
            .map(Drops)
            .map_err(|err| IssuanceError::Serialization(format!("invalid drops {value:?}: {err}")))
    }
}

impl fmt::Display for Drops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / DROPS_PER_XRP;
        let frac = self.0 % DROPS_PER_XRP;
        if frac == 0 {
            write!(f, "{whole} XRP")
        } else {
            let frac = format!("{frac:06}");
            write!(f, "{whole}.{} XRP", frac.trim_end_matches('0'))
        }
    }
}

/// Issued-currency amount as it appears in transaction JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub currency: CurrencyCode,
    pub issuer: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Amount {
    /// Native amount, serialized as a string of drops.
    Drops(String),
    Issued(IssuedAmount),
}

impl Amount {
    pub fn drops(drops: Drops) -> Self {
        Self::Drops(drops.0.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "TransactionType")]
pub enum TransactionBody {
    #[serde(rename_all = "PascalCase")]
    Payment {
        destination: String,
        amount: Amount,
        #[serde(skip_serializing_if = "Option::is_none")]
        destination_tag: Option<u32>,
    },
    #[serde(rename_all = "PascalCase")]
    AccountSet {
        #[serde(skip_serializing_if = "Option::is_none")]
        set_flag: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transfer_rate: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tick_size: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
    },
    #[serde(rename_all = "PascalCase")]
    TrustSet { limit_amount: IssuedAmount },
}

impl TransactionBody {
    pub fn transaction_type(&self) -> &'static str {
        match self {
            Self::Payment { .. } => "Payment",
            Self::AccountSet { .. } => "AccountSet",
            Self::TrustSet { .. } => "TrustSet",
        }
    }
}

/// Transaction JSON. `sequence`, `fee` and `last_ledger_sequence` are left
/// empty by the builders and filled in by [`LedgerClient::autofill`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    pub account: String,
    #[serde(flatten)]
    pub body: TransactionBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ledger_sequence: Option<u32>,
}

impl Transaction {
    pub fn new(account: impl Into<String>, body: TransactionBody) -> Self {
        Self {
            account: account.into(),
            body,
            flags: None,
            sequence: None,
            fee: None,
            last_ledger_sequence: None,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn is_autofilled(&self) -> bool {
        self.sequence.is_some() && self.fee.is_some()
    }

    pub fn to_json(&self) -> Result<serde_json::Value, IssuanceError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Signed blob ready for submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx_blob: String,
    pub hash: String,
    pub last_ledger_sequence: Option<u32>,
}

/// Definitive answer from the network for one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub hash: String,
    pub result_code: String,
    /// Whether the result comes from a validated ledger. Results that never
    /// reached a ledger (malformed, rejected locally) are not validated.
    pub validated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: String,
    pub balance: Drops,
    pub sequence: u32,
}

/// One row of `account_lines`, seen from the queried account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineEntry {
    pub currency: String,
    pub balance: String,
    /// Counterparty of the line.
    pub issuer: String,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address controlled by `secret`.
    async fn derive_address(&self, secret: &Secret) -> Result<String, IssuanceError>;

    /// Fill in sequence, fee and expiry fields from current ledger state.
    async fn autofill(&self, tx: Transaction) -> Result<Transaction, IssuanceError>;

    async fn sign(
        &self,
        tx: &Transaction,
        credential: &Credential,
    ) -> Result<SignedTransaction, IssuanceError>;

    /// Submit and suspend until the network reports a final result.
    async fn submit_and_wait(
        &self,
        signed: &SignedTransaction,
    ) -> Result<SubmitOutcome, IssuanceError>;

    /// Validated account state; [`IssuanceError::AccountNotFound`] when the
    /// address was never funded on this network.
    async fn account_info(&self, address: &str) -> Result<AccountInfo, IssuanceError>;

    async fn account_lines(&self, address: &str) -> Result<Vec<TrustLineEntry>, IssuanceError>;

    async fn disconnect(&self) -> Result<(), IssuanceError>;
}

/// Opens ledger clients. Each orchestration gets its own client.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn LedgerClient>, IssuanceError>;
}
