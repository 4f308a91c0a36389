//! Market entities shared across the valuation core, ports and use cases.
//!
//! Raw on-chain state (`OnchainMarket`, `MarketSnapshot`, `OutcomeSupplies`)
//! is read-only from this crate's perspective: it is fetched fresh on every
//! poll and never mutated locally.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::error::PoolIdError;
use super::fixed_point::format_units;

// ────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────

/// 32-byte market identifier (the Uniswap v4 `PoolId` of the market's pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(B256);

impl PoolId {
    /// Parse a pool id from hex text, normalizing it to exactly 32 bytes.
    ///
    /// The `0x` prefix is optional. Short ids are left-padded with zeros the
    /// way Solidity pads `bytes32`; long ids keep their rightmost 64 digits.
    pub fn parse(text: &str) -> Result<Self, PoolIdError> {
        let trimmed = text.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.is_empty() {
            return Err(PoolIdError::Empty);
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PoolIdError::InvalidHex(text.to_string()));
        }

        let normalized = if hex.len() >= 64 {
            hex[hex.len() - 64..].to_string()
        } else {
            format!("{hex:0>64}")
        };

        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&normalized[i * 2..i * 2 + 2], 16)
                .map_err(|_| PoolIdError::InvalidHex(text.to_string()))?;
        }

        Ok(Self(B256::from(bytes)))
    }

    /// Raw 32-byte value for contract calls.
    pub const fn as_b256(&self) -> B256 {
        self.0
    }

    /// First ten characters of the hex form (`0x` + 8 digits), used in
    /// placeholder titles.
    pub fn short(&self) -> String {
        self.to_string()[..10].to_string()
    }
}

impl From<B256> for PoolId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl FromStr for PoolId {
    type Err = PoolIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ────────────────────────────────────────────
// Valuation inputs and outputs
// ────────────────────────────────────────────

/// Collateral currently escrowed for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Escrowed collateral in the collateral token's base units.
    pub total_collateral: U256,
    /// Decimal places of the collateral token (commonly 6 or 18).
    pub collateral_decimals: u8,
}

/// Outstanding minted amounts of the two outcome tokens (18-decimal units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSupplies {
    pub yes_supply: U256,
    pub no_supply: U256,
}

impl OutcomeSupplies {
    /// True when either side has never been minted.
    pub fn is_degenerate(&self) -> bool {
        self.yes_supply.is_zero() || self.no_supply.is_zero()
    }
}

/// Raw 18-decimal value triple, shaped like the contract's `getTokenValues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedTokenValues {
    pub yes_value: U256,
    pub no_value: U256,
    pub yes_probability: U256,
}

/// Display-ready token values and implied YES probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivedValue {
    pub yes_unit_value: String,
    pub no_unit_value: String,
    pub yes_probability: String,
}

impl DerivedValue {
    /// 50/50 prior used before any outcome tokens exist.
    pub fn degenerate() -> Self {
        Self {
            yes_unit_value: "0.5".to_string(),
            no_unit_value: "0.5".to_string(),
            yes_probability: "0.5".to_string(),
        }
    }
}

// ────────────────────────────────────────────
// Market lifecycle
// ────────────────────────────────────────────

/// On-chain market lifecycle state (`enum MarketState` in the hook).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketState {
    Active = 0,
    Resolved = 1,
    Claimed = 2,
}

impl MarketState {
    /// Resolved markets include those whose winnings were already claimed.
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved | Self::Claimed)
    }

    pub const fn is_claimed(self) -> bool {
        matches!(self, Self::Claimed)
    }
}

impl TryFrom<u8> for MarketState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Active),
            1 => Ok(Self::Resolved),
            2 => Ok(Self::Claimed),
            other => Err(other),
        }
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Resolved => write!(f, "Resolved"),
            Self::Claimed => write!(f, "Claimed"),
        }
    }
}

/// Side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeSide {
    Yes,
    No,
}

impl OutcomeSide {
    /// Swap direction flag expected by `executeSwap`: YES buys swap zero-for-one.
    pub const fn zero_for_one(self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl fmt::Display for OutcomeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Full market record as returned by the ViewHelper's `getMarket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnchainMarket {
    pub pool_id: PoolId,
    pub currency0: Address,
    pub currency1: Address,
    pub hooks: Address,
    pub oracle: Address,
    pub creator: Address,
    pub yes_token: Address,
    pub no_token: Address,
    pub state: MarketState,
    pub outcome: bool,
    pub total_collateral: U256,
    pub collateral_address: Address,
}

impl OnchainMarket {
    /// Valuation snapshot once the collateral token's decimals are known.
    pub const fn snapshot(&self, collateral_decimals: u8) -> MarketSnapshot {
        MarketSnapshot {
            total_collateral: self.total_collateral,
            collateral_decimals,
        }
    }
}

/// Human-readable market metadata stored in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMetadata {
    #[serde(rename = "poolId")]
    pub pool_id: String,
    pub description: String,
}

/// Listing view of a market, as shown on the market index and detail pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    pub id: PoolId,
    pub question: String,
    pub description: String,
    pub state: MarketState,
    pub resolved: bool,
    pub outcome: Option<bool>,
    pub collateral_token: Address,
    pub collateral_pool_size: String,
    pub yes_token: Address,
    pub no_token: Address,
    pub currency0: Address,
    pub currency1: Address,
    pub hook: Address,
    pub oracle: Address,
}

impl Market {
    /// Build the listing view with placeholder question and description.
    pub fn from_onchain(market: &OnchainMarket, hook: Address, collateral_decimals: u8) -> Self {
        let short = market.pool_id.short();
        let resolved = market.state.is_resolved();

        Self {
            id: market.pool_id,
            question: format!("Market for {short}..."),
            description: format!("This is a prediction market with ID {short}..."),
            state: market.state,
            resolved,
            outcome: resolved.then_some(market.outcome),
            collateral_token: market.collateral_address,
            collateral_pool_size: format_units(
                market.total_collateral,
                collateral_decimals,
                collateral_decimals,
            ),
            yes_token: market.yes_token,
            no_token: market.no_token,
            currency0: market.currency0,
            currency1: market.currency1,
            hook,
            oracle: market.oracle,
        }
    }

    /// Replace the placeholder description with blob-store metadata.
    pub fn apply_metadata(&mut self, metadata: &MarketMetadata) {
        self.description.clone_from(&metadata.description);
    }
}
