//! Account activation checks run before any mutating step.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::config::ProfileConfig;
use crate::credential::SignerRole;
use crate::error::IssuanceError;
use crate::ledger::Drops;
use crate::session::LedgerSession;

/// Snapshot of one account, derived fresh for every orchestration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountActivationState {
    pub address: String,
    pub balance: Drops,
    pub exists: bool,
    pub activated: bool,
}

/// A party that is missing from the ledger or below its role minimum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivationShortfall {
    pub role: SignerRole,
    pub address: String,
    pub balance: Drops,
    pub required: Drops,
    pub exists: bool,
}

impl ActivationShortfall {
    pub fn missing(&self) -> Drops {
        self.required.saturating_sub(self.balance)
    }
}

impl fmt::Display for ActivationShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exists {
            write!(
                f,
                "{} {} has {}, needs at least {} (short {})",
                self.role,
                self.address,
                self.balance,
                self.required,
                self.missing()
            )
        } else {
            write!(
                f,
                "{} {} is not activated, needs at least {}",
                self.role, self.address, self.required
            )
        }
    }
}

/// Derives activation verdicts from validated account state using the
/// profile's per-role minimum balances.
pub struct PreflightChecker<'a> {
    session: &'a LedgerSession,
    issuer_min: Drops,
    receiver_min: Drops,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(session: &'a LedgerSession, profile: &ProfileConfig) -> Self {
        Self {
            session,
            issuer_min: profile.issuer_min,
            receiver_min: profile.receiver_min,
        }
    }

    pub fn minimum(&self, role: SignerRole) -> Drops {
        match role {
            SignerRole::Issuer => self.issuer_min,
            SignerRole::Receiver => self.receiver_min,
        }
    }

    /// Never fails for an unknown account; that is reported as not activated.
    pub async fn check_activation(
        &self,
        address: &str,
        role: SignerRole,
    ) -> Result<AccountActivationState, IssuanceError> {
        let info = self
            .session
            .query_account_info(address)
            .await
            .map_err(|err| IssuanceError::PreflightFailed(format!("{role} {address}: {err}")))?;
        let state = match info {
            None => {
                info!(%role, address, "wallet not found or not activated");
                AccountActivationState {
                    address: address.to_string(),
                    balance: Drops(0),
                    exists: false,
                    activated: false,
                }
            }
            Some(info) => {
                let activated = info.balance >= self.minimum(role);
                info!(%role, address, balance_xrp = info.balance.as_xrp(), activated, "wallet balance");
                AccountActivationState {
                    address: address.to_string(),
                    balance: info.balance,
                    exists: true,
                    activated,
                }
            }
        };
        Ok(state)
    }

    /// Both parties must be activated before anything is submitted.
    pub async fn check_parties(
        &self,
        issuer: &str,
        receiver: &str,
    ) -> Result<(AccountActivationState, AccountActivationState), IssuanceError> {
        let issuer_state = self.check_activation(issuer, SignerRole::Issuer).await?;
        let receiver_state = self.check_activation(receiver, SignerRole::Receiver).await?;
        let shortfalls: Vec<ActivationShortfall> = [
            (SignerRole::Issuer, &issuer_state),
            (SignerRole::Receiver, &receiver_state),
        ]
        .into_iter()
        .filter(|(_, state)| !state.activated)
        .map(|(role, state)| ActivationShortfall {
            role,
            address: state.address.clone(),
            balance: state.balance,
            required: self.minimum(role),
            exists: state.exists,
        })
        .collect();
        if !shortfalls.is_empty() {
            return Err(IssuanceError::PartiesNotActivated(shortfalls));
        }
        Ok((issuer_state, receiver_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_reports_missing_amount() {
        let shortfall = ActivationShortfall {
            role: SignerRole::Issuer,
            address: "rIssuer".into(),
            balance: Drops::from_xrp(4),
            required: Drops::from_xrp(10),
            exists: true,
        };
        assert_eq!(shortfall.missing(), Drops::from_xrp(6));
        assert_eq!(
            shortfall.to_string(),
            "Issuer rIssuer has 4 XRP, needs at least 10 XRP (short 6 XRP)"
        );
    }

    #[test]
    fn unknown_account_shortfall_message() {
        let shortfall = ActivationShortfall {
            role: SignerRole::Receiver,
            address: "rReceiver".into(),
            balance: Drops(0),
            required: Drops::from_xrp(3),
            exists: false,
        };
        assert!(shortfall.to_string().contains("not activated"));
    }
}
