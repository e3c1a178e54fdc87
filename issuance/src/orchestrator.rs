//! The issuance sequence.
//!
//! One call to [`IssuanceOrchestrator::issue`] opens its own ledger session,
//! checks that both parties are activated and then runs
//! FeePayment (when the profile charges one) → IssuerSettings →
//! ReceiverSettings → TrustLine → Issuance. Every step must validate with
//! `tesSUCCESS` before the next one is built. There is no rollback: steps that
//! confirmed before a failure stay applied and are reported to the caller.

use std::sync::Arc;

use tracing::{info, warn};

use crate::amount::IssuedValue;
use crate::config::{IssuanceConfig, IssuancePolicy, NetworkProfile, ProfileConfig};
use crate::credential::{Credential, Secret, SignerRole};
use crate::currency::{self, CurrencyCode};
use crate::error::IssuanceError;
use crate::ledger::{Drops, LedgerConnector, Transaction};
use crate::preflight::PreflightChecker;
use crate::report::{IssuanceResult, PartyBalances, ResultReporter};
use crate::session::LedgerSession;
use crate::steps::{StepHashes, StepKind, StepStatus, TransactionStep};
use crate::tx_builder;

/// Input of one orchestration call.
#[derive(Clone, Debug)]
pub struct IssuanceRequest {
    pub issuer_secret: Secret,
    pub receiver_secret: Secret,
    pub token_symbol: String,
    pub token_amount: String,
    pub network: NetworkProfile,
}

/// Validate an issued-currency amount against the ledger's number format and
/// the receiver's trust line limit. The original text is kept so no precision
/// is lost.
pub fn validate_amount(amount: &str, trust_limit: &str) -> Result<String, IssuanceError> {
    let trimmed = amount.trim();
    let value = IssuedValue::parse(trimmed)
        .map_err(|_| IssuanceError::InvalidAmount(amount.to_string()))?;
    let limit = IssuedValue::parse(trust_limit).map_err(|_| {
        IssuanceError::Serialization(format!("trust limit {trust_limit:?} is not a valid amount"))
    })?;
    if value > limit {
        return Err(IssuanceError::AmountExceedsTrustLimit {
            amount: trimmed.to_string(),
            limit: trust_limit.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Steps attempted so far in this call.
#[derive(Default)]
struct Progress {
    steps: Vec<TransactionStep>,
    issuer: Option<String>,
}

impl Progress {
    fn hashes(&self) -> StepHashes {
        self.steps
            .iter()
            .filter_map(|step| match step.status() {
                StepStatus::Confirmed { hash } => Some((step.kind(), hash.clone())),
                _ => None,
            })
            .collect()
    }

    fn failed_step(&self) -> Option<StepKind> {
        self.steps
            .last()
            .filter(|step| !matches!(step.status(), StepStatus::Confirmed { .. }))
            .map(TransactionStep::kind)
    }
}

#[derive(Clone)]
pub struct IssuanceOrchestrator {
    connector: Arc<dyn LedgerConnector>,
    config: Arc<IssuanceConfig>,
}

impl IssuanceOrchestrator {
    pub fn new(connector: Arc<dyn LedgerConnector>, config: IssuanceConfig) -> Self {
        Self {
            connector,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &IssuanceConfig {
        &self.config
    }

    /// Run the whole sequence. Never panics on ledger errors; every failure is
    /// folded into the returned result.
    pub async fn issue(&self, request: IssuanceRequest) -> IssuanceResult {
        let profile = self.config.profile(request.network);
        let mut reporter = ResultReporter::new(
            request.network,
            profile.success_message.clone(),
            profile.dex_link,
        );

        let (currency, amount) = match validate_input(&request, &self.config.policy) {
            Ok(validated) => validated,
            Err(err) => {
                warn!(network = %request.network, error = %err, "rejected issuance request");
                return reporter.build_failure(None, &err, StepHashes::new());
            }
        };
        reporter = reporter.with_currency(currency.clone());
        info!(
            network = %request.network,
            symbol = %request.token_symbol,
            currency = %currency,
            amount = %amount,
            "starting token issuance"
        );

        let endpoint = match self.config.endpoint(request.network) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!(network = %request.network, error = %err, "no ledger endpoint");
                return reporter.build_failure(None, &err, StepHashes::new());
            }
        };
        let session = match LedgerSession::connect(self.connector.as_ref(), endpoint).await {
            Ok(session) => session,
            Err(err) => {
                warn!(endpoint, error = %err, "ledger connection failed");
                return reporter.build_failure(None, &err, StepHashes::new());
            }
        };

        let mut progress = Progress::default();
        let outcome = self
            .run(&session, profile, &request, &currency, &amount, &mut progress)
            .await;
        if let Err(err) = session.disconnect().await {
            warn!(error = %err, "ledger disconnect failed");
        }

        if let Some(issuer) = progress.issuer.clone() {
            reporter = reporter.with_issuer(issuer);
        }
        match outcome {
            Ok(balances) => {
                let result = reporter.build_success(progress.hashes(), balances);
                info!(network = %request.network, dex_url = ?result.dex_url(), "token issuance complete");
                result
            }
            Err(err) => {
                let failed_step = progress.failed_step();
                warn!(
                    step = ?failed_step,
                    kind = err.kind(),
                    error = %err,
                    confirmed = progress.hashes().len(),
                    "token issuance aborted"
                );
                reporter.build_failure(failed_step, &err, progress.hashes())
            }
        }
    }

    async fn run(
        &self,
        session: &LedgerSession,
        profile: &ProfileConfig,
        request: &IssuanceRequest,
        currency: &CurrencyCode,
        amount: &str,
        progress: &mut Progress,
    ) -> Result<Option<PartyBalances>, IssuanceError> {
        let issuer = session
            .resolve_credential(SignerRole::Issuer, request.issuer_secret.clone())
            .await?;
        let receiver = session
            .resolve_credential(SignerRole::Receiver, request.receiver_secret.clone())
            .await?;
        progress.issuer = Some(issuer.address().to_string());
        info!(issuer = issuer.address(), receiver = receiver.address(), "wallets resolved");
        if issuer.address() == receiver.address() {
            return Err(IssuanceError::InvalidArgument(
                "issuer and receiver must be different accounts",
            ));
        }

        PreflightChecker::new(session, profile)
            .check_parties(issuer.address(), receiver.address())
            .await?;
        info!("both wallets are activated");

        for kind in StepKind::ALL {
            let Some(payload) = self.build_payload(kind, profile, &issuer, &receiver, currency, amount)
            else {
                continue;
            };
            progress.steps.push(TransactionStep::new(kind, payload));
            let step = progress
                .steps
                .last_mut()
                .ok_or(IssuanceError::InvalidArgument("step list is empty"))?;
            let credential = match step.signer() {
                SignerRole::Issuer => &issuer,
                SignerRole::Receiver => &receiver,
            };
            execute_step(session, step, credential).await?;
        }

        if !profile.report_balances {
            return Ok(None);
        }
        match fetch_balances(session, issuer.address(), receiver.address()).await {
            Ok(balances) => Ok(Some(balances)),
            Err(err) => {
                warn!(error = %err, "post-issuance balance fetch failed");
                Ok(None)
            }
        }
    }

    /// Payload for `kind`, or `None` when the profile skips the step.
    fn build_payload(
        &self,
        kind: StepKind,
        profile: &ProfileConfig,
        issuer: &Credential,
        receiver: &Credential,
        currency: &CurrencyCode,
        amount: &str,
    ) -> Option<Transaction> {
        let policy = &self.config.policy;
        let domain = profile.domain.as_deref();
        let payload = match kind {
            StepKind::FeePayment => {
                tx_builder::platform_fee(issuer.address(), profile.platform_fee.as_ref()?)
            }
            StepKind::IssuerSettings => tx_builder::issuer_settings(issuer.address(), policy, domain),
            StepKind::ReceiverSettings => tx_builder::receiver_settings(receiver.address(), domain),
            StepKind::TrustLine => {
                tx_builder::trust_line(receiver.address(), issuer.address(), currency, policy)
            }
            StepKind::Issuance => tx_builder::issue_tokens(
                issuer.address(),
                receiver.address(),
                currency,
                amount,
                policy,
            ),
        };
        Some(payload)
    }

    /// Native balance of `address`, `None` if the account does not exist.
    pub async fn xrp_balance(
        &self,
        network: NetworkProfile,
        address: &str,
    ) -> Result<Option<Drops>, IssuanceError> {
        if address.trim().is_empty() {
            return Err(IssuanceError::InvalidArgument("wallet address is required"));
        }
        let endpoint = self.config.endpoint(network)?;
        let session = LedgerSession::connect(self.connector.as_ref(), endpoint).await?;
        let info = session.query_account_info(address.trim()).await;
        if let Err(err) = session.disconnect().await {
            warn!(error = %err, "ledger disconnect failed");
        }
        Ok(info?.map(|info| info.balance))
    }
}

fn validate_input(
    request: &IssuanceRequest,
    policy: &IssuancePolicy,
) -> Result<(CurrencyCode, String), IssuanceError> {
    if request.issuer_secret.is_empty() || request.receiver_secret.is_empty() {
        return Err(IssuanceError::InvalidArgument(
            "missing required fields (issuerSeed, receiverSeed)",
        ));
    }
    let currency = currency::encode(request.token_symbol.trim())?;
    let amount = validate_amount(&request.token_amount, &policy.trust_limit)?;
    Ok((currency, amount))
}

/// autofill → sign → submit-and-wait, accepting only `tesSUCCESS`.
async fn execute_step(
    session: &LedgerSession,
    step: &mut TransactionStep,
    credential: &Credential,
) -> Result<(), IssuanceError> {
    let kind = step.kind();
    info!(step = %kind, signer = %credential.role(), account = credential.address(), "submitting step");
    let prepared = session.autofill(step.payload().clone()).await?;
    let signed = session.sign(&prepared, credential).await?;
    let receipt = match session.submit(&signed).await {
        Ok(receipt) => receipt,
        Err(err) => {
            if let Some(code) = err.ledger_code() {
                step.fail(code);
            }
            return Err(err);
        }
    };
    if !receipt.confirmed {
        warn!(step = %kind, code = %receipt.result_code, hash = %receipt.hash, "step rejected by ledger");
        step.fail(receipt.result_code.clone());
        return Err(IssuanceError::step_failed(kind, receipt.result_code));
    }
    info!(step = %kind, hash = %receipt.hash, "step confirmed");
    step.confirm(receipt.hash);
    Ok(())
}

async fn fetch_balances(
    session: &LedgerSession,
    issuer: &str,
    receiver: &str,
) -> Result<PartyBalances, IssuanceError> {
    let issuer_lines = session
        .account_lines(issuer)
        .await
        .map_err(|err| IssuanceError::BalanceFetchFailed(err.to_string()))?;
    let receiver_lines = session
        .account_lines(receiver)
        .await
        .map_err(|err| IssuanceError::BalanceFetchFailed(err.to_string()))?;
    Ok(PartyBalances {
        issuer: issuer_lines,
        receiver: receiver_lines,
    })
}
