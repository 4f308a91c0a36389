//! Market Contract Interactions - ViewHelper, MarketMakerHook, ERC-20
//!
//! Implements the `MarketReader` and `MarketWriter` ports. Calldata is
//! ABI-encoded from the `sol!` call types and sent through the shared,
//! type-erased provider: reads are plain `eth_call`s, writes go through
//! `send_transaction` (wallet fillers sign them) and are awaited until the
//! receipt is mined.

use std::sync::Arc;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, Bytes, I256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::config::ContractAddresses;
use crate::domain::market::{
    FixedTokenValues, MarketState, OnchainMarket, OutcomeSide, OutcomeSupplies, PoolId,
};
use crate::ports::chain_client::{MarketReader, MarketWriter, TxOutcome};

use super::provider::ChainProvider;

sol! {
    #[derive(Debug)]
    interface IViewHelper {
        struct PoolKey {
            address currency0;
            address currency1;
            uint24 fee;
            int24 tickSpacing;
            address hooks;
        }

        struct Market {
            PoolKey poolKey;
            address oracle;
            address creator;
            address yesToken;
            address noToken;
            uint8 state;
            bool outcome;
            uint256 totalCollateral;
            address collateralAddress;
        }

        function getMarket(bytes32 poolId) external view returns (Market memory);
        function getTokenSupplies(bytes32 poolId) external view returns (uint256 yesSupply, uint256 noSupply);
        function getTokenValues(bytes32 poolId) external view returns (uint256 yesValue, uint256 noValue, uint256 yesProbability);
    }
}

sol! {
    interface IMarketMakerHook {
        function marketCount() external view returns (uint256);
        function marketPoolIds(uint256 index) external view returns (bytes32);
        function hasClaimed(bytes32 poolId, address account) external view returns (bool);
        function executeSwap(bytes32 poolId, bool zeroForOne, int256 amountSpecified) external;
        function claimWinnings(bytes32 poolId) external;
    }
}

sol! {
    interface IERC20 {
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Market contract bindings on one chain.
pub struct MarketContracts {
    /// Shared RPC provider.
    provider: Arc<ChainProvider>,
    /// Contract addresses from config.
    addresses: ContractAddresses,
}

impl MarketContracts {
    pub fn new(provider: Arc<ChainProvider>, addresses: ContractAddresses) -> Self {
        Self {
            provider,
            addresses,
        }
    }

    pub const fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    fn signer(&self) -> Result<Address> {
        match self.provider.account() {
            Some(account) => Ok(account),
            None => bail!("No wallet attached to the provider"),
        }
    }

    /// `eth_call` a view function and decode its return values.
    async fn view<C>(&self, to: Address, call: &C) -> Result<C::Return>
    where
        C: SolCall + Send + Sync,
    {
        let provider = self.provider.inner();
        let output = provider
            .call(&call_request(to, call))
            .await
            .with_context(|| format!("{} call failed", C::SIGNATURE))?;

        decode_returns::<C>(&output)
    }

    /// Sign and send a state-changing call, then wait for its receipt.
    async fn submit<C>(&self, to: Address, call: &C) -> Result<TransactionReceipt>
    where
        C: SolCall + Send + Sync,
    {
        let from = self.signer()?;
        let provider = self.provider.inner();

        let pending = provider
            .send_transaction(call_request(to, call).from(from))
            .await
            .with_context(|| format!("{} submission failed", C::SIGNATURE))?;
        debug!(tx_hash = %pending.tx_hash(), call = C::SIGNATURE, "Transaction submitted");

        pending
            .get_receipt()
            .await
            .with_context(|| format!("Failed to fetch {} receipt", C::SIGNATURE))
    }
}

/// Transaction request carrying `call`'s ABI-encoded calldata to `to`.
fn call_request<C: SolCall>(to: Address, call: &C) -> TransactionRequest {
    TransactionRequest::default()
        .to(to)
        .input(Bytes::from(call.abi_encode()).into())
}

fn decode_returns<C: SolCall>(output: &[u8]) -> Result<C::Return> {
    C::abi_decode_returns(output, true)
        .with_context(|| format!("Malformed {} return data", C::SIGNATURE))
}

impl TryFrom<(PoolId, IViewHelper::Market)> for OnchainMarket {
    type Error = anyhow::Error;

    fn try_from((pool_id, m): (PoolId, IViewHelper::Market)) -> Result<Self> {
        let state = MarketState::try_from(m.state)
            .map_err(|raw| anyhow::anyhow!("Unknown market state {raw} for {pool_id}"))?;

        Ok(Self {
            pool_id,
            currency0: m.poolKey.currency0,
            currency1: m.poolKey.currency1,
            hooks: m.poolKey.hooks,
            oracle: m.oracle,
            creator: m.creator,
            yes_token: m.yesToken,
            no_token: m.noToken,
            state,
            outcome: m.outcome,
            total_collateral: m.totalCollateral,
            collateral_address: m.collateralAddress,
        })
    }
}

fn tx_outcome(receipt: &TransactionReceipt) -> TxOutcome {
    TxOutcome {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        success: receipt.status(),
    }
}

#[async_trait]
impl MarketReader for MarketContracts {
    #[instrument(skip(self), fields(pool_id = %pool_id))]
    async fn read_market(&self, pool_id: &PoolId) -> Result<OnchainMarket> {
        let call = IViewHelper::getMarketCall {
            poolId: pool_id.as_b256(),
        };
        let market = self.view(self.addresses.view_helper, &call).await?._0;

        OnchainMarket::try_from((*pool_id, market))
    }

    #[instrument(skip(self), fields(pool_id = %pool_id))]
    async fn read_token_supplies(&self, pool_id: &PoolId) -> Result<OutcomeSupplies> {
        let call = IViewHelper::getTokenSuppliesCall {
            poolId: pool_id.as_b256(),
        };
        let supplies = self.view(self.addresses.view_helper, &call).await?;

        Ok(OutcomeSupplies {
            yes_supply: supplies.yesSupply,
            no_supply: supplies.noSupply,
        })
    }

    #[instrument(skip(self), fields(pool_id = %pool_id))]
    async fn read_token_values(&self, pool_id: &PoolId) -> Result<FixedTokenValues> {
        let call = IViewHelper::getTokenValuesCall {
            poolId: pool_id.as_b256(),
        };
        let values = self.view(self.addresses.view_helper, &call).await?;

        Ok(FixedTokenValues {
            yes_value: values.yesValue,
            no_value: values.noValue,
            yes_probability: values.yesProbability,
        })
    }

    async fn read_token_decimals(&self, token: Address) -> Result<u8> {
        let decimals = self
            .view(token, &IERC20::decimalsCall {})
            .await
            .with_context(|| format!("decimals() read failed for {token}"))?
            ._0;

        Ok(decimals)
    }

    async fn market_count(&self) -> Result<u64> {
        let count = self
            .view(self.addresses.market_maker_hook, &IMarketMakerHook::marketCountCall {})
            .await?
            ._0;

        u64::try_from(count).context("Market count does not fit in u64")
    }

    async fn market_pool_id(&self, index: u64) -> Result<PoolId> {
        let call = IMarketMakerHook::marketPoolIdsCall {
            index: U256::from(index),
        };
        let pool_id = self
            .view(self.addresses.market_maker_hook, &call)
            .await
            .with_context(|| format!("marketPoolIds({index}) read failed"))?
            ._0;

        Ok(PoolId::from(pool_id))
    }

    async fn has_claimed(&self, pool_id: &PoolId, account: Address) -> Result<bool> {
        let call = IMarketMakerHook::hasClaimedCall {
            poolId: pool_id.as_b256(),
            account,
        };
        let claimed = self.view(self.addresses.market_maker_hook, &call).await?._0;

        Ok(claimed)
    }

    async fn is_healthy(&self) -> bool {
        self.provider.is_healthy().await
    }
}

#[async_trait]
impl MarketWriter for MarketContracts {
    fn account(&self) -> Option<Address> {
        self.provider.account()
    }

    #[instrument(skip(self), fields(pool_id = %pool_id, side = %side))]
    async fn swap(&self, pool_id: &PoolId, side: OutcomeSide, amount: I256) -> Result<TxOutcome> {
        let call = IMarketMakerHook::executeSwapCall {
            poolId: pool_id.as_b256(),
            zeroForOne: side.zero_for_one(),
            amountSpecified: amount,
        };
        let receipt = self.submit(self.addresses.market_maker_hook, &call).await?;

        info!(tx_hash = %receipt.transaction_hash, "Swap mined");
        Ok(tx_outcome(&receipt))
    }

    #[instrument(skip(self))]
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxOutcome> {
        let call = IERC20::approveCall { spender, amount };
        let receipt = self.submit(token, &call).await?;

        info!(tx_hash = %receipt.transaction_hash, "Approval mined");
        Ok(tx_outcome(&receipt))
    }

    #[instrument(skip(self), fields(pool_id = %pool_id))]
    async fn claim(&self, pool_id: &PoolId) -> Result<TxOutcome> {
        let call = IMarketMakerHook::claimWinningsCall {
            poolId: pool_id.as_b256(),
        };
        let receipt = self.submit(self.addresses.market_maker_hook, &call).await?;

        info!(tx_hash = %receipt.transaction_hash, "Claim mined");
        Ok(tx_outcome(&receipt))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{TxKind, B256};

    use super::*;

    const VIEW_HELPER: Address = Address::repeat_byte(0x22);

    fn words(values: &[U256]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes::<32>()).collect()
    }

    #[test]
    fn test_call_request_encodes_selector_and_arguments() {
        let pool_id = PoolId::from(B256::repeat_byte(0x5a));
        let call = IViewHelper::getTokenValuesCall {
            poolId: pool_id.as_b256(),
        };

        let request = call_request(VIEW_HELPER, &call);
        assert_eq!(request.to, Some(TxKind::Call(VIEW_HELPER)));

        let input = request.input.input().unwrap();
        assert_eq!(&input[..4], IViewHelper::getTokenValuesCall::SELECTOR.as_slice());
        assert_eq!(&input[4..], pool_id.as_b256().as_slice());
    }

    #[test]
    fn test_write_request_carries_sender() {
        let from = Address::repeat_byte(0xaa);
        let call = IMarketMakerHook::claimWinningsCall {
            poolId: B256::repeat_byte(0x01),
        };

        let request = call_request(Address::repeat_byte(0x11), &call).from(from);
        assert_eq!(request.from, Some(from));
    }

    #[test]
    fn test_decode_token_values_return() {
        let output = words(&[U256::from(2u8), U256::from(3u8), U256::from(4u8)]);
        let values = decode_returns::<IViewHelper::getTokenValuesCall>(&output).unwrap();

        assert_eq!(values.yesValue, U256::from(2u8));
        assert_eq!(values.noValue, U256::from(3u8));
        assert_eq!(values.yesProbability, U256::from(4u8));
    }

    #[test]
    fn test_decode_decimals_return() {
        let output = words(&[U256::from(6u8)]);
        let decimals = decode_returns::<IERC20::decimalsCall>(&output).unwrap();
        assert_eq!(decimals._0, 6);
    }

    #[test]
    fn test_truncated_return_data_rejected() {
        let output = words(&[U256::from(2u8)]);
        let err = decode_returns::<IViewHelper::getTokenSuppliesCall>(&output).unwrap_err();
        assert!(err.to_string().contains("getTokenSupplies"));
    }
}
