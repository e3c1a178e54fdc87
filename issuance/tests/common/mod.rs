#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use issuance::config::IssuanceConfig;
use issuance::ledger::{
    AccountInfo, Drops, LedgerClient, LedgerConnector, SignedTransaction, SubmitOutcome,
    Transaction, TrustLineEntry, SUCCESS_CODE,
};
use issuance::{Credential, IssuanceError, IssuanceOrchestrator, Secret};

pub const ISSUER_SEED: &str = "sIssuerSeedForTests";
pub const ISSUER: &str = "rIssuerAddressForTests";
pub const RECEIVER_SEED: &str = "sReceiverSeedForTests";
pub const RECEIVER: &str = "rReceiverAddressForTests";
pub const PLATFORM: &str = "rDuaiuPVV3koHF6pFjZZu3EWatnjH5JG2K";
pub const MAINNET_NODE: &str = "wss://mainnet.rippled.test:6006";
pub const TESTNET_NODE: &str = "wss://testnet.rippled.test:6006";

/// Default config with both profiles pointed at the test nodes.
pub fn config() -> IssuanceConfig {
    let mut config = IssuanceConfig::default();
    config.mainnet.endpoint = Some(MAINNET_NODE.to_string());
    config.testnet.endpoint = Some(TESTNET_NODE.to_string());
    config
}

type FailurePredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Clone, Debug, Default)]
pub struct MockAccount {
    pub balance: Drops,
    pub sequence: u32,
    pub set_flags: BTreeSet<u32>,
    pub domain: Option<String>,
    pub lines: Vec<MockLine>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockLine {
    pub currency: String,
    pub counterparty: String,
    pub balance: f64,
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub tx: Value,
    pub hash: String,
    pub result_code: String,
}

#[derive(Default)]
struct LedgerState {
    seeds: HashMap<String, String>,
    accounts: HashMap<String, MockAccount>,
    submissions: Vec<Submission>,
    failures: Vec<(FailurePredicate, String)>,
    ledger_index: u32,
    connects: usize,
    disconnects: usize,
    endpoints: Vec<String>,
    refuse_connections: bool,
    fail_account_lines: bool,
}

/// In-memory ledger that applies the subset of transaction semantics the
/// issuance sequence relies on.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.state.lock().unwrap().ledger_index = 1_000;
        ledger
    }

    /// Ledger with both test parties funded well above every profile minimum.
    pub fn funded() -> Self {
        let ledger = Self::new();
        ledger.fund(ISSUER_SEED, ISSUER, Drops::from_xrp(100));
        ledger.fund(RECEIVER_SEED, RECEIVER, Drops::from_xrp(50));
        ledger
    }

    /// Make `seed` resolve to `address` without creating the account.
    pub fn register(&self, seed: &str, address: &str) {
        let mut state = self.state.lock().unwrap();
        state.seeds.insert(seed.to_string(), address.to_string());
    }

    pub fn fund(&self, seed: &str, address: &str, balance: Drops) {
        self.register(seed, address);
        let mut state = self.state.lock().unwrap();
        let account = state.accounts.entry(address.to_string()).or_insert(MockAccount {
            sequence: 1,
            ..MockAccount::default()
        });
        account.balance = balance;
    }

    /// Answer every submission matching `predicate` with `code`.
    pub fn fail_when(
        &self,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
        code: &str,
    ) {
        let mut state = self.state.lock().unwrap();
        state.failures.push((Box::new(predicate), code.to_string()));
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    pub fn fail_account_lines(&self) {
        self.state.lock().unwrap().fail_account_lines = true;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_types(&self) -> Vec<String> {
        self.submissions()
            .iter()
            .map(|s| s.tx["TransactionType"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn account(&self, address: &str) -> Option<MockAccount> {
        self.state.lock().unwrap().accounts.get(address).cloned()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.state.lock().unwrap().endpoints.clone()
    }

    pub fn connector(&self) -> Arc<MockConnector> {
        Arc::new(MockConnector {
            ledger: self.clone(),
        })
    }

    pub fn orchestrator(&self) -> IssuanceOrchestrator {
        IssuanceOrchestrator::new(self.connector(), config())
    }
}

pub struct MockConnector {
    ledger: MockLedger,
}

#[async_trait]
impl LedgerConnector for MockConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn LedgerClient>, IssuanceError> {
        let mut state = self.ledger.state.lock().unwrap();
        if state.refuse_connections {
            return Err(IssuanceError::Connection(format!(
                "failed to connect to {endpoint}: connection refused"
            )));
        }
        state.connects += 1;
        state.endpoints.push(endpoint.to_string());
        Ok(Box::new(MockClient {
            ledger: self.ledger.clone(),
        }))
    }
}

struct MockClient {
    ledger: MockLedger,
}

impl MockClient {
    fn apply(state: &mut LedgerState, tx: &Value) {
        let account = tx["Account"].as_str().unwrap_or_default().to_string();
        match tx["TransactionType"].as_str() {
            Some("AccountSet") => {
                if let Some(entry) = state.accounts.get_mut(&account) {
                    if let Some(flag) = tx["SetFlag"].as_u64() {
                        entry.set_flags.insert(flag as u32);
                    }
                    if let Some(domain) = tx["Domain"].as_str() {
                        entry.domain = Some(domain.to_string());
                    }
                }
            }
            Some("TrustSet") => {
                let limit = &tx["LimitAmount"];
                let line = MockLine {
                    currency: limit["currency"].as_str().unwrap_or_default().to_string(),
                    counterparty: limit["issuer"].as_str().unwrap_or_default().to_string(),
                    balance: 0.0,
                };
                if let Some(entry) = state.accounts.get_mut(&account) {
                    if !entry.lines.iter().any(|l| {
                        l.currency == line.currency && l.counterparty == line.counterparty
                    }) {
                        entry.lines.push(line);
                    }
                }
            }
            Some("Payment") => {
                let destination = tx["Destination"].as_str().unwrap_or_default().to_string();
                match &tx["Amount"] {
                    Value::String(drops) => {
                        let amount = drops.parse::<u64>().unwrap_or_default();
                        if let Some(from) = state.accounts.get_mut(&account) {
                            from.balance = from.balance.saturating_sub(Drops(amount));
                        }
                        let to = state.accounts.entry(destination).or_insert(MockAccount {
                            sequence: 1,
                            ..MockAccount::default()
                        });
                        to.balance = Drops(to.balance.0 + amount);
                    }
                    issued => {
                        let currency = issued["currency"].as_str().unwrap_or_default().to_string();
                        let value = issued["value"]
                            .as_str()
                            .and_then(|v| v.parse::<f64>().ok())
                            .unwrap_or_default();
                        adjust_line(state, &destination, &account, &currency, value);
                        adjust_line(state, &account, &destination, &currency, -value);
                    }
                }
            }
            _ => {}
        }
    }
}

fn adjust_line(state: &mut LedgerState, holder: &str, counterparty: &str, currency: &str, delta: f64) {
    let Some(entry) = state.accounts.get_mut(holder) else {
        return;
    };
    match entry
        .lines
        .iter_mut()
        .find(|l| l.currency == currency && l.counterparty == counterparty)
    {
        Some(line) => line.balance += delta,
        None => entry.lines.push(MockLine {
            currency: currency.to_string(),
            counterparty: counterparty.to_string(),
            balance: delta,
        }),
    }
}

#[async_trait]
impl LedgerClient for MockClient {
    async fn derive_address(&self, secret: &Secret) -> Result<String, IssuanceError> {
        let state = self.ledger.state.lock().unwrap();
        state
            .seeds
            .get(secret.expose())
            .cloned()
            .ok_or_else(|| IssuanceError::Rpc("wallet_propose failed: badSeed".into()))
    }

    async fn autofill(&self, mut tx: Transaction) -> Result<Transaction, IssuanceError> {
        let state = self.ledger.state.lock().unwrap();
        let account = state
            .accounts
            .get(&tx.account)
            .ok_or_else(|| IssuanceError::AccountNotFound(tx.account.clone()))?;
        tx.sequence.get_or_insert(account.sequence);
        tx.fee.get_or_insert_with(|| "12".to_string());
        tx.last_ledger_sequence.get_or_insert(state.ledger_index + 20);
        Ok(tx)
    }

    async fn sign(
        &self,
        tx: &Transaction,
        credential: &Credential,
    ) -> Result<SignedTransaction, IssuanceError> {
        let bytes = serde_json::to_vec(&tx.to_json()?)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hasher.update(credential.secret().expose().as_bytes());
        Ok(SignedTransaction {
            tx_blob: hex::encode_upper(&bytes),
            hash: hex::encode_upper(hasher.finalize()),
            last_ledger_sequence: tx.last_ledger_sequence,
        })
    }

    async fn submit_and_wait(
        &self,
        signed: &SignedTransaction,
    ) -> Result<SubmitOutcome, IssuanceError> {
        let tx: Value = serde_json::from_slice(&hex::decode(&signed.tx_blob)?)?;
        let mut state = self.ledger.state.lock().unwrap();
        let result_code = state
            .failures
            .iter()
            .find(|(predicate, _)| predicate(&tx))
            .map(|(_, code)| code.clone())
            .unwrap_or_else(|| SUCCESS_CODE.to_string());
        if result_code == SUCCESS_CODE {
            Self::apply(&mut state, &tx);
        }
        if let Some(account) = tx["Account"].as_str().and_then(|a| state.accounts.get_mut(a)) {
            account.sequence += 1;
        }
        state.ledger_index += 1;
        state.submissions.push(Submission {
            tx,
            hash: signed.hash.clone(),
            result_code: result_code.clone(),
        });
        Ok(SubmitOutcome {
            hash: signed.hash.clone(),
            result_code,
            validated: true,
        })
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, IssuanceError> {
        let state = self.ledger.state.lock().unwrap();
        let account = state
            .accounts
            .get(address)
            .ok_or_else(|| IssuanceError::AccountNotFound(address.to_string()))?;
        Ok(AccountInfo {
            address: address.to_string(),
            balance: account.balance,
            sequence: account.sequence,
        })
    }

    async fn account_lines(&self, address: &str) -> Result<Vec<TrustLineEntry>, IssuanceError> {
        let state = self.ledger.state.lock().unwrap();
        if state.fail_account_lines {
            return Err(IssuanceError::Rpc("account_lines failed: tooBusy".into()));
        }
        let account = state
            .accounts
            .get(address)
            .ok_or_else(|| IssuanceError::AccountNotFound(address.to_string()))?;
        Ok(account
            .lines
            .iter()
            .map(|line| TrustLineEntry {
                currency: line.currency.clone(),
                balance: line.balance.to_string(),
                issuer: line.counterparty.clone(),
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<(), IssuanceError> {
        self.ledger.state.lock().unwrap().disconnects += 1;
        Ok(())
    }
}
