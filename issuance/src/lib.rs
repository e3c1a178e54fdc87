pub mod amount;
pub mod api;
pub mod config;
pub mod credential;
pub mod currency;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod preflight;
pub mod report;
pub mod rippled;
pub mod session;
pub mod steps;
pub mod tx_builder;

pub use config::{IssuanceConfig, NetworkProfile, ProfileConfig};
pub use credential::{Credential, Secret, SignerRole};
pub use currency::CurrencyCode;
pub use error::IssuanceError;
pub use ledger::{Drops, LedgerClient, LedgerConnector};
pub use orchestrator::{IssuanceOrchestrator, IssuanceRequest};
pub use report::{IssuanceResult, ResultReporter};
pub use session::LedgerSession;
pub use steps::{StepKind, StepStatus};
