//! Single-use connection to one ledger endpoint.

use tracing::{debug, warn};

use crate::credential::{Credential, Secret, SignerRole};
use crate::error::IssuanceError;
use crate::ledger::{
    AccountInfo, LedgerClient, LedgerConnector, SignedTransaction, Transaction, TrustLineEntry,
    SUCCESS_CODE,
};

/// Outcome of one submission as seen by the orchestration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub confirmed: bool,
    pub result_code: String,
    pub hash: String,
}

/// One session serves one orchestration call. Submissions are awaited one at
/// a time; [`LedgerSession::disconnect`] must be called on every exit path.
pub struct LedgerSession {
    client: Box<dyn LedgerClient>,
    endpoint: String,
    open: bool,
}

impl LedgerSession {
    pub async fn connect(
        connector: &dyn LedgerConnector,
        endpoint: &str,
    ) -> Result<Self, IssuanceError> {
        debug!(endpoint, "connecting to ledger");
        let client = connector.connect(endpoint).await.map_err(|err| match err {
            IssuanceError::Connection(_) => err,
            other => IssuanceError::Connection(other.to_string()),
        })?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            open: true,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Bind a secret to the address it controls.
    pub async fn resolve_credential(
        &self,
        role: SignerRole,
        secret: Secret,
    ) -> Result<Credential, IssuanceError> {
        self.ensure_open()?;
        if secret.is_empty() {
            return Err(IssuanceError::CredentialRejected {
                role: role.as_str(),
                reason: "secret is empty".to_string(),
            });
        }
        let address = self
            .client
            .derive_address(&secret)
            .await
            .map_err(|err| IssuanceError::CredentialRejected {
                role: role.as_str(),
                reason: err.to_string(),
            })?;
        Ok(Credential::new(role, secret, address))
    }

    pub async fn autofill(&self, tx: Transaction) -> Result<Transaction, IssuanceError> {
        self.ensure_open()?;
        self.client.autofill(tx).await
    }

    pub async fn sign(
        &self,
        tx: &Transaction,
        credential: &Credential,
    ) -> Result<SignedTransaction, IssuanceError> {
        self.ensure_open()?;
        if !tx.is_autofilled() {
            return Err(IssuanceError::InvalidArgument(
                "transaction must be autofilled before signing",
            ));
        }
        if tx.account != credential.address() {
            return Err(IssuanceError::InvalidArgument(
                "transaction account does not match signing credential",
            ));
        }
        self.client.sign(tx, credential).await
    }

    /// Submit a signed blob and wait for the definitive result. Any code other
    /// than `tesSUCCESS` comes back as an unconfirmed receipt, not an error.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<SubmitReceipt, IssuanceError> {
        self.ensure_open()?;
        let outcome = self.client.submit_and_wait(signed).await?;
        let confirmed = outcome.validated && outcome.result_code == SUCCESS_CODE;
        Ok(SubmitReceipt {
            confirmed,
            result_code: outcome.result_code,
            hash: outcome.hash,
        })
    }

    /// Validated account state, or `None` when the account does not exist.
    pub async fn query_account_info(
        &self,
        address: &str,
    ) -> Result<Option<AccountInfo>, IssuanceError> {
        self.ensure_open()?;
        match self.client.account_info(address).await {
            Ok(info) => Ok(Some(info)),
            Err(IssuanceError::AccountNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn account_lines(&self, address: &str) -> Result<Vec<TrustLineEntry>, IssuanceError> {
        self.ensure_open()?;
        self.client.account_lines(address).await
    }

    pub async fn disconnect(mut self) -> Result<(), IssuanceError> {
        self.open = false;
        debug!(endpoint = %self.endpoint, "disconnecting from ledger");
        self.client.disconnect().await
    }

    fn ensure_open(&self) -> Result<(), IssuanceError> {
        if self.open {
            Ok(())
        } else {
            Err(IssuanceError::Connection("session already closed".into()))
        }
    }
}

impl Drop for LedgerSession {
    fn drop(&mut self) {
        if self.open {
            warn!(endpoint = %self.endpoint, "ledger session dropped without disconnect");
        }
    }
}
