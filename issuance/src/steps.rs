use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::credential::SignerRole;
use crate::ledger::Transaction;

/// Ledger transactions of the issuance sequence, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    FeePayment,
    IssuerSettings,
    ReceiverSettings,
    TrustLine,
    Issuance,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::FeePayment,
        StepKind::IssuerSettings,
        StepKind::ReceiverSettings,
        StepKind::TrustLine,
        StepKind::Issuance,
    ];

    pub fn signer(self) -> SignerRole {
        match self {
            Self::ReceiverSettings | Self::TrustLine => SignerRole::Receiver,
            Self::FeePayment | Self::IssuerSettings | Self::Issuance => SignerRole::Issuer,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FeePayment => "FeePayment",
            Self::IssuerSettings => "IssuerSettings",
            Self::ReceiverSettings => "ReceiverSettings",
            Self::TrustLine => "TrustLine",
            Self::Issuance => "Issuance",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Confirmed { hash: String },
    Failed { code: String },
}

/// One transaction of the sequence. Created right before submission and
/// resolved exactly once.
#[derive(Clone, Debug)]
pub struct TransactionStep {
    kind: StepKind,
    payload: Transaction,
    status: StepStatus,
}

impl TransactionStep {
    pub fn new(kind: StepKind, payload: Transaction) -> Self {
        Self {
            kind,
            payload,
            status: StepStatus::Pending,
        }
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn signer(&self) -> SignerRole {
        self.kind.signer()
    }

    pub fn payload(&self) -> &Transaction {
        &self.payload
    }

    pub fn status(&self) -> &StepStatus {
        &self.status
    }

    pub fn confirm(&mut self, hash: impl Into<String>) {
        debug_assert_eq!(self.status, StepStatus::Pending);
        self.status = StepStatus::Confirmed { hash: hash.into() };
    }

    pub fn fail(&mut self, code: impl Into<String>) {
        debug_assert_eq!(self.status, StepStatus::Pending);
        self.status = StepStatus::Failed { code: code.into() };
    }
}

/// Hashes of confirmed steps, ordered by step.
pub type StepHashes = BTreeMap<StepKind, String>;
