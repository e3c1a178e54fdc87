use thiserror::Error;

use crate::config::NetworkProfile;
use crate::preflight::ActivationShortfall;
use crate::steps::StepKind;

/// Code reported when a step could not be confirmed before its deadline.
pub const TIMEOUT_CODE: &str = "timeout";

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("token symbol {symbol:?} is {bytes} bytes; at most 20 fit into a 160-bit currency code")]
    SymbolTooLong { symbol: String, bytes: usize },

    #[error("invalid token amount {0:?}")]
    InvalidAmount(String),

    #[error("token amount {amount} exceeds the trust line limit {limit}")]
    AmountExceedsTrustLimit { amount: String, limit: String },

    #[error("no ledger endpoint configured for {0}")]
    EndpointNotConfigured(NetworkProfile),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("account {0} not found on ledger")]
    AccountNotFound(String),

    #[error("{role} credential rejected: {reason}")]
    CredentialRejected { role: &'static str, reason: String },

    #[error("{}", format_shortfalls(.0))]
    PartiesNotActivated(Vec<ActivationShortfall>),

    #[error("preflight failed: {0}")]
    PreflightFailed(String),

    #[error("Platform fee tx failed: {code}")]
    FeeStepFailed { code: String },

    #[error("Issuer AccountSet failed: {code}")]
    IssuerSettingsFailed { code: String },

    #[error("Receiver AccountSet failed: {code}")]
    ReceiverSettingsFailed { code: String },

    #[error("TrustSet failed: {code}")]
    TrustLineFailed { code: String },

    #[error("Token issuance failed: {code}")]
    IssuanceFailed { code: String },

    #[error("transaction {hash} was not validated before its deadline")]
    SubmitTimeout { hash: String },

    #[error("balance fetch failed: {0}")]
    BalanceFetchFailed(String),
}

impl IssuanceError {
    /// Tag the ledger's native result code with the step that produced it.
    pub fn step_failed(step: StepKind, code: impl Into<String>) -> Self {
        let code = code.into();
        match step {
            StepKind::FeePayment => Self::FeeStepFailed { code },
            StepKind::IssuerSettings => Self::IssuerSettingsFailed { code },
            StepKind::ReceiverSettings => Self::ReceiverSettingsFailed { code },
            StepKind::TrustLine => Self::TrustLineFailed { code },
            StepKind::Issuance => Self::IssuanceFailed { code },
        }
    }

    /// Stable taxonomy name surfaced to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::SymbolTooLong { .. } => "SymbolTooLong",
            Self::InvalidAmount(_) => "InvalidAmount",
            Self::AmountExceedsTrustLimit { .. } => "AmountExceedsTrustLimit",
            Self::EndpointNotConfigured(_) => "EndpointNotConfigured",
            Self::Connection(_) => "ConnectionError",
            Self::Rpc(_) => "RpcError",
            Self::Serialization(_) => "SerializationError",
            Self::AccountNotFound(_) => "AccountNotFound",
            Self::CredentialRejected { .. } => "CredentialRejected",
            Self::PartiesNotActivated(_) => "PartiesNotActivated",
            Self::PreflightFailed(_) => "PreflightFailed",
            Self::FeeStepFailed { .. } => "FeeStepFailed",
            Self::IssuerSettingsFailed { .. } => "IssuerSettingsFailed",
            Self::ReceiverSettingsFailed { .. } => "ReceiverSettingsFailed",
            Self::TrustLineFailed { .. } => "TrustLineFailed",
            Self::IssuanceFailed { .. } => "IssuanceFailed",
            Self::SubmitTimeout { .. } => "SubmitTimeout",
            Self::BalanceFetchFailed(_) => "BalanceFetchFailed",
        }
    }

    /// Native ledger result code carried by step failures.
    pub fn ledger_code(&self) -> Option<&str> {
        match self {
            Self::FeeStepFailed { code }
            | Self::IssuerSettingsFailed { code }
            | Self::ReceiverSettingsFailed { code }
            | Self::TrustLineFailed { code }
            | Self::IssuanceFailed { code } => Some(code),
            Self::SubmitTimeout { .. } => Some(TIMEOUT_CODE),
            _ => None,
        }
    }

    /// Input problems the caller can fix without touching the ledger.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::SymbolTooLong { .. }
                | Self::InvalidAmount(_)
                | Self::AmountExceedsTrustLimit { .. }
        )
    }
}

fn format_shortfalls(shortfalls: &[ActivationShortfall]) -> String {
    let details: Vec<String> = shortfalls.iter().map(|s| s.to_string()).collect();
    format!(
        "One or more wallets not activated or underfunded. Fund them first: {}",
        details.join("; ")
    )
}

impl From<serde_json::Error> for IssuanceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for IssuanceError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Serialization(err.to_string())
    }
}
