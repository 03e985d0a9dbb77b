//! Core identity types shared across the gallery pipeline.

use crate::gallery::error::GalleryError;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix marking an input part as a name-service name rather than an address.
pub const NAME_SUFFIX: &str = ".eth";

/// A canonical wallet address: `0x` followed by 40 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and canonicalize an address. Mixed case input is accepted and lowercased.
    pub fn parse(input: &str) -> Result<Self, GalleryError> {
        let lowered = input.trim().to_ascii_lowercase();
        let valid = lowered
            .strip_prefix("0x")
            .map(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .unwrap_or(false);

        if valid {
            Ok(Self(lowered))
        } else {
            Err(GalleryError::InvalidInput {
                input: input.trim().to_string(),
            })
        }
    }

    /// The all-zero address, which name services return for unset records.
    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in headings, e.g. `0x1234...abcd`.
    pub fn abbreviated(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = GalleryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// A wallet after input resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWallet {
    /// Canonical address
    pub address: Address,
    /// Name-service name or profile display name, when known
    pub name: Option<String>,
}

impl ResolvedWallet {
    /// Human-readable label: the name if known, else the abbreviated address.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.abbreviated())
    }
}

/// Result of resolving a raw input string. Always holds at least one wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    /// Wallets in input order
    pub wallets: NonEmpty<ResolvedWallet>,
}

impl ResolvedInput {
    /// The first wallet of the input, used for headings.
    pub fn primary(&self) -> &ResolvedWallet {
        self.wallets.first()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.wallets.iter().map(|w| w.address.clone()).collect()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.tail.len() + 1
    }
}
