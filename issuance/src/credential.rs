use std::fmt;

use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Signing secret (family seed) supplied by the caller. Treated as opaque and
/// wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    Issuer,
    Receiver,
}

impl SignerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Receiver => "receiver",
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Issuer => "Issuer",
            Self::Receiver => "Receiver",
        })
    }
}

/// A secret bound to the address it controls. Lives only for one
/// orchestration call.
#[derive(Clone, Debug)]
pub struct Credential {
    role: SignerRole,
    secret: Secret,
    address: String,
}

impl Credential {
    pub fn new(role: SignerRole, secret: Secret, address: impl Into<String>) -> Self {
        Self {
            role,
            secret,
            address: address.into(),
        }
    }

    pub fn role(&self) -> SignerRole {
        self.role
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}
