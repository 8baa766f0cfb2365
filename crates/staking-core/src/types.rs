//! Core type definitions for the staking engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AddressError;

/// Account or contract address (20 bytes, `0x`-prefixed lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Length of an address in bytes
    pub const BYTES: usize = 20;

    /// Parse and normalize an address string
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        let body = addr
            .strip_prefix("0x")
            .or_else(|| addr.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;

        if body.len() != Self::BYTES * 2 {
            return Err(AddressError::Length { chars: body.len() });
        }

        hex::decode(body).map_err(|e| AddressError::InvalidHex(e.to_string()))?;

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Build an address from raw bytes
    pub fn from_bytes(bytes: [u8; Self::BYTES]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// The all-zero sentinel address, used to denote the native asset
    pub fn zero() -> Self {
        Self::from_bytes([0u8; Self::BYTES])
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash returned by the ledger for a submitted operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Staking pool identifier.
///
/// The pool set is fixed: one native-asset pool and one fungible-asset pool.
/// The ledger addresses them by index (`0` and `1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolId {
    Native,
    Asset,
}

impl PoolId {
    /// Every pool, in ledger index order
    pub const ALL: [PoolId; 2] = [PoolId::Native, PoolId::Asset];

    /// Ledger-side pool index
    pub fn index(&self) -> u64 {
        match self {
            Self::Native => 0,
            Self::Asset => 1,
        }
    }

    pub fn from_index(index: u64) -> Option<Self> {
        match index {
            0 => Some(Self::Native),
            1 => Some(Self::Asset),
            _ => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Asset => "asset",
        }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PoolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" | "0" => Ok(Self::Native),
            "asset" | "1" => Ok(Self::Asset),
            other => Err(format!("unknown pool: {}", other)),
        }
    }
}

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Sepolia,
    Devnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Sepolia => "sepolia",
            Self::Devnet => "devnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Block number
pub type BlockNumber = u64;

/// Token amount in base units (1 token = 10^decimals base units)
pub type Amount = u128;

/// Constants
pub mod constants {
    use super::Amount;

    /// Decimals used by the native asset
    pub const NATIVE_DECIMALS: u8 = 18;

    /// 1 native coin in base units
    pub const WEI_PER_ETHER: Amount = 1_000_000_000_000_000_000;

    /// Default delay before re-reading the ledger after a submitted operation
    pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;
}
