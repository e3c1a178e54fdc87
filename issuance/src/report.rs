//! Turns orchestration outcomes into the result returned to callers.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::config::NetworkProfile;
use crate::currency::CurrencyCode;
use crate::error::IssuanceError;
use crate::ledger::TrustLineEntry;
use crate::steps::{StepHashes, StepKind};

pub const SOLOGENIC_TRADE_URL: &str = "https://sologenic.org/trade";

/// Trust-line balances of both parties after issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartyBalances {
    pub issuer: Vec<TrustLineEntry>,
    pub receiver: Vec<TrustLineEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureClass {
    /// Rejected before the ledger was contacted.
    InvalidInput,
    /// The ledger endpoint could not be reached.
    Unavailable,
    /// The ledger was reached and something in the sequence failed.
    Ledger,
}

/// Final outcome of one orchestration call. Built once by
/// [`ResultReporter`] and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuanceResult {
    success: bool,
    network: NetworkProfile,
    message: String,
    currency_code: Option<CurrencyCode>,
    issuer: Option<String>,
    step_hashes: StepHashes,
    failure_step: Option<StepKind>,
    failure_kind: Option<&'static str>,
    failure_code: Option<String>,
    failure_class: Option<FailureClass>,
    balances: Option<PartyBalances>,
    dex_url: Option<String>,
}

impl IssuanceResult {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn network(&self) -> NetworkProfile {
        self.network
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn currency_code(&self) -> Option<&CurrencyCode> {
        self.currency_code.as_ref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn step_hashes(&self) -> &StepHashes {
        &self.step_hashes
    }

    pub fn step_hash(&self, step: StepKind) -> Option<&str> {
        self.step_hashes.get(&step).map(String::as_str)
    }

    pub fn failure_step(&self) -> Option<StepKind> {
        self.failure_step
    }

    pub fn failure_kind(&self) -> Option<&'static str> {
        self.failure_kind
    }

    /// Native ledger result code of the failed step.
    pub fn failure_code(&self) -> Option<&str> {
        self.failure_code.as_deref()
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        self.failure_class
    }

    pub fn balances(&self) -> Option<&PartyBalances> {
        self.balances.as_ref()
    }

    pub fn dex_url(&self) -> Option<&str> {
        self.dex_url.as_deref()
    }

    pub fn http_status(&self) -> u16 {
        match self.failure_class {
            None => 200,
            Some(FailureClass::InvalidInput) => 400,
            Some(FailureClass::Unavailable) => 502,
            Some(FailureClass::Ledger) => 500,
        }
    }

    /// Response body of the token-creation endpoints.
    pub fn to_response(&self) -> CreateTokenResponse {
        let tx_hashes = TxHashes {
            issuer_settings: self.step_hashes.get(&StepKind::IssuerSettings).cloned(),
            receiver_settings: self.step_hashes.get(&StepKind::ReceiverSettings).cloned(),
            trust_line: self.step_hashes.get(&StepKind::TrustLine).cloned(),
            token_issue: self.step_hashes.get(&StepKind::Issuance).cloned(),
        };
        CreateTokenResponse {
            message: self.message.clone(),
            platform_fee_tx_hash: self.step_hashes.get(&StepKind::FeePayment).cloned(),
            tx_hashes: (self.success || !tx_hashes.is_empty()).then_some(tx_hashes),
            balances: self.balances.clone(),
            sologenic_url: self.dex_url.clone(),
            error: self.failure_kind,
            failed_step: self.failure_step,
            code: self.failure_code.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxHashes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_settings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_settings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_issue: Option<String>,
}

impl TxHashes {
    fn is_empty(&self) -> bool {
        self.issuer_settings.is_none()
            && self.receiver_settings.is_none()
            && self.trust_line.is_none()
            && self.token_issue.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fee_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hashes: Option<TxHashes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balances: Option<PartyBalances>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sologenic_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<StepKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Knows the context of one orchestration and assembles its result.
#[derive(Clone, Debug)]
pub struct ResultReporter {
    network: NetworkProfile,
    success_message: String,
    dex_link: bool,
    currency_code: Option<CurrencyCode>,
    issuer: Option<String>,
}

impl ResultReporter {
    pub fn new(network: NetworkProfile, success_message: impl Into<String>, dex_link: bool) -> Self {
        Self {
            network,
            success_message: success_message.into(),
            dex_link,
            currency_code: None,
            issuer: None,
        }
    }

    pub fn with_currency(mut self, code: CurrencyCode) -> Self {
        self.currency_code = Some(code);
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn build_success(
        &self,
        step_hashes: StepHashes,
        balances: Option<PartyBalances>,
    ) -> IssuanceResult {
        let dex_url = match (&self.currency_code, &self.issuer) {
            (Some(code), Some(issuer)) if self.dex_link => Some(sologenic_url(code, issuer)),
            _ => None,
        };
        IssuanceResult {
            success: true,
            network: self.network,
            message: self.success_message.clone(),
            currency_code: self.currency_code.clone(),
            issuer: self.issuer.clone(),
            step_hashes,
            failure_step: None,
            failure_kind: None,
            failure_code: None,
            failure_class: None,
            balances,
            dex_url,
        }
    }

    /// `step_hashes` holds the steps that confirmed before the failure; their
    /// ledger effects are permanent.
    pub fn build_failure(
        &self,
        failed_step: Option<StepKind>,
        reason: &IssuanceError,
        step_hashes: StepHashes,
    ) -> IssuanceResult {
        let failure_class = if reason.is_invalid_input() {
            FailureClass::InvalidInput
        } else if matches!(reason, IssuanceError::Connection(_)) {
            FailureClass::Unavailable
        } else {
            FailureClass::Ledger
        };
        IssuanceResult {
            success: false,
            network: self.network,
            message: reason.to_string(),
            currency_code: self.currency_code.clone(),
            issuer: self.issuer.clone(),
            step_hashes,
            failure_step: failed_step,
            failure_kind: Some(reason.kind()),
            failure_code: reason.ledger_code().map(str::to_string),
            failure_class: Some(failure_class),
            balances: None,
            dex_url: None,
        }
    }
}

/// Everything except the characters a URI component leaves unescaped.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Market link for the token against XRP. Always uses the encoded currency
/// code, never the raw symbol.
pub fn sologenic_url(code: &CurrencyCode, issuer: &str) -> String {
    let symbol = utf8_percent_encode(code.as_str(), URI_COMPONENT);
    let issuer = utf8_percent_encode(issuer, URI_COMPONENT);
    format!("{}?market={symbol}%2B{issuer}%2FXRP", SOLOGENIC_TRADE_URL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency;
    use serde_json::json;

    fn hashes(steps: &[StepKind]) -> StepHashes {
        steps
            .iter()
            .map(|step| (*step, format!("HASH_{step}")))
            .collect()
    }

    #[test]
    fn sologenic_url_embeds_encoded_code() {
        let code = currency::encode("SHIBA").unwrap();
        let url = sologenic_url(&code, "rIssuer");
        assert_eq!(
            url,
            format!(
                "https://sologenic.org/trade?market=5348494241{}%2BrIssuer%2FXRP",
                "0".repeat(30)
            )
        );
        assert!(!url.contains("SHIBA"));
    }

    #[test]
    fn sologenic_url_escapes_like_a_uri_component() {
        let code = currency::encode("A+B").unwrap();
        assert_eq!(
            sologenic_url(&code, "r Issuer"),
            "https://sologenic.org/trade?market=A%2BB%2Br%20Issuer%2FXRP"
        );
        let code = currency::encode("a.b").unwrap();
        assert!(sologenic_url(&code, "rIssuer").contains("market=a.b%2B"));
    }

    #[test]
    fn success_response_shape() {
        let reporter = ResultReporter::new(NetworkProfile::Testnet, "Token created successfully!", false)
            .with_currency(currency::encode("XQN").unwrap())
            .with_issuer("rIssuer");
        let result = reporter.build_success(
            hashes(&[
                StepKind::IssuerSettings,
                StepKind::ReceiverSettings,
                StepKind::TrustLine,
                StepKind::Issuance,
            ]),
            None,
        );
        assert_eq!(result.http_status(), 200);
        let body = serde_json::to_value(result.to_response()).unwrap();
        assert_eq!(
            body,
            json!({
                "message": "Token created successfully!",
                "txHashes": {
                    "issuerSettings": "HASH_IssuerSettings",
                    "receiverSettings": "HASH_ReceiverSettings",
                    "trustLine": "HASH_TrustLine",
                    "tokenIssue": "HASH_Issuance",
                }
            })
        );
    }

    #[test]
    fn failure_response_keeps_confirmed_hashes() {
        let reporter = ResultReporter::new(NetworkProfile::Mainnet, "ok", true);
        let err = IssuanceError::step_failed(StepKind::TrustLine, "tecNO_PERMISSION");
        let result = reporter.build_failure(
            Some(StepKind::TrustLine),
            &err,
            hashes(&[StepKind::FeePayment, StepKind::IssuerSettings]),
        );
        assert_eq!(result.http_status(), 500);
        assert_eq!(result.dex_url(), None);
        let body = serde_json::to_value(result.to_response()).unwrap();
        assert_eq!(body["message"], "TrustSet failed: tecNO_PERMISSION");
        assert_eq!(body["failedStep"], "trustLine");
        assert_eq!(body["code"], "tecNO_PERMISSION");
        assert_eq!(body["platformFeeTxHash"], "HASH_FeePayment");
        assert_eq!(body["txHashes"], json!({ "issuerSettings": "HASH_IssuerSettings" }));
    }

    #[test]
    fn input_errors_map_to_bad_request() {
        let reporter = ResultReporter::new(NetworkProfile::Testnet, "ok", false);
        let err = currency::encode("ABCDEFGHIJKLMNOPQRSTUVWXYZ").unwrap_err();
        let result = reporter.build_failure(None, &err, StepHashes::new());
        assert_eq!(result.http_status(), 400);
        assert!(serde_json::to_value(result.to_response())
            .unwrap()
            .get("txHashes")
            .is_none());
    }
}
