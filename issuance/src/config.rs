use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IssuanceError;
use crate::ledger::Drops;

/// Mainnet wallet that receives the platform fee.
pub const DEFAULT_PLATFORM_ADDRESS: &str = "rDuaiuPVV3koHF6pFjZZu3EWatnjH5JG2K";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NetworkProfile {
    Mainnet,
    Testnet,
}

impl NetworkProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkProfile {
    type Err = IssuanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            _ => Err(IssuanceError::InvalidArgument(
                "network profile must be mainnet or testnet",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFee {
    pub address: String,
    pub amount: Drops,
}

/// Everything that differs between networks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// rippled WebSocket URL. Must name a node that allows `sign` and
    /// `wallet_propose`, so there is no public default.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Fee paid by the issuer before anything else; `None` skips the step.
    #[serde(default)]
    pub platform_fee: Option<PlatformFee>,
    pub issuer_min: Drops,
    pub receiver_min: Drops,
    /// Plain-text domain written into both accounts' settings.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub report_balances: bool,
    #[serde(default)]
    pub dex_link: bool,
    pub success_message: String,
}

impl ProfileConfig {
    pub fn mainnet() -> Self {
        Self {
            endpoint: None,
            platform_fee: Some(PlatformFee {
                address: DEFAULT_PLATFORM_ADDRESS.to_string(),
                amount: Drops::from_xrp(6),
            }),
            issuer_min: Drops::from_xrp(10),
            receiver_min: Drops::from_xrp(3),
            domain: None,
            report_balances: false,
            dex_link: true,
            success_message: "Token created successfully on Mainnet!".to_string(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            endpoint: None,
            platform_fee: None,
            issuer_min: Drops(0),
            receiver_min: Drops(0),
            domain: Some("example.com".to_string()),
            report_balances: true,
            dex_link: false,
            success_message: "Token created successfully!".to_string(),
        }
    }
}

/// Constants of the issuance sequence itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuancePolicy {
    /// Ceiling of the receiver's trust line.
    pub trust_limit: String,
    pub destination_tag: u32,
    pub tick_size: u8,
    pub transfer_rate: u32,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            trust_limit: "10000000000".to_string(),
            destination_tag: 1,
            tick_size: 5,
            transfer_rate: 0,
        }
    }
}

/// Connection settings for the rippled client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RippledRpcConfig {
    #[serde(with = "duration_secs")]
    pub connection_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Upper bound on waiting for a submitted transaction to validate.
    #[serde(with = "duration_secs")]
    pub submit_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Ledgers a transaction stays valid for after autofill.
    pub ledger_offset: u32,
    /// Autofill never sets a fee above this.
    pub max_fee: Drops,
    pub max_reconnect_attempts: u32,
    #[serde(with = "duration_millis")]
    pub reconnect_delay: Duration,
}

impl Default for RippledRpcConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            submit_timeout: Duration::from_secs(90),
            poll_interval: Duration::from_millis(1000),
            ledger_offset: 20,
            max_fee: Drops::from_xrp(2),
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    pub api_addr: SocketAddr,
    /// Required bearer / `x-auth-token` value for the HTTP API, if any.
    pub api_token: Option<String>,
    pub mainnet: ProfileConfig,
    pub testnet: ProfileConfig,
    pub policy: IssuancePolicy,
    pub rpc: RippledRpcConfig,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            api_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            api_token: None,
            mainnet: ProfileConfig::mainnet(),
            testnet: ProfileConfig::testnet(),
            policy: IssuancePolicy::default(),
            rpc: RippledRpcConfig::default(),
        }
    }
}

impl IssuanceConfig {
    /// Read a JSON config file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IssuanceError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| {
            IssuanceError::Serialization(format!("failed to read {}: {err}", path.display()))
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn profile(&self, network: NetworkProfile) -> &ProfileConfig {
        match network {
            NetworkProfile::Mainnet => &self.mainnet,
            NetworkProfile::Testnet => &self.testnet,
        }
    }

    pub fn profile_mut(&mut self, network: NetworkProfile) -> &mut ProfileConfig {
        match network {
            NetworkProfile::Mainnet => &mut self.mainnet,
            NetworkProfile::Testnet => &mut self.testnet,
        }
    }

    /// Ledger endpoint of `network`.
    pub fn endpoint(&self, network: NetworkProfile) -> Result<&str, IssuanceError> {
        self.profile(network)
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .ok_or(IssuanceError::EndpointNotConfigured(network))
    }

    /// Fail unless every profile names its ledger endpoint.
    pub fn validate(&self) -> Result<(), IssuanceError> {
        for network in [NetworkProfile::Mainnet, NetworkProfile::Testnet] {
            self.endpoint(network)?;
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
