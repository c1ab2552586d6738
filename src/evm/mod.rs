// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The destination-chain capability: submit the relay payload to the bridge
//! proxy contract and wait (bounded) for its receipt.

use std::sync::Arc;
use std::time::Duration;

use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::Middleware;
use ethers::types::{Bytes, U256, U64};
use futures::TryFutureExt;

use crate::context::RelayerContext;
use crate::error::DestinationMiddleware;
use crate::payload::RelayPayload;
use crate::probe;
use crate::types::RelayReceipt;

abigen!(
    BridgeProxy,
    r#"[
        function relay(address consumer, bytes relayData)
    ]"#
);

/// A capability over the destination EVM chain.
#[async_trait::async_trait]
pub trait DestinationChainClient: Send + Sync {
    /// Signs and submits a relay transaction carrying `payload` and waits
    /// for its receipt.
    ///
    /// A mined-but-reverted transaction yields
    /// [`crate::Error::ReceiptFailed`]: the submission succeeded and gas
    /// was spent, which an operator must be able to tell apart from a
    /// submission that never reached the chain.
    async fn relay(
        &self,
        payload: &RelayPayload,
    ) -> crate::Result<RelayReceipt>;
}

/// [`DestinationChainClient`] backed by the bridge proxy contract over an
/// Http JSON-RPC provider.
pub struct EvmBridgeClient {
    contract: BridgeProxy<DestinationMiddleware>,
    consumer: ethers::types::Address,
    gas_limit: U256,
    confirmation_timeout: Duration,
    chain_id: u64,
    explorer: Option<url::Url>,
}

impl EvmBridgeClient {
    /// Builds the client from the relayer context.
    pub fn new(ctx: &RelayerContext) -> crate::Result<Self> {
        let provider = ctx.evm_provider()?;
        let wallet = ctx.evm_wallet()?;
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let config = &ctx.config.destination;
        let contract = BridgeProxy::new(config.bridge_address, client);
        Ok(Self {
            contract,
            consumer: config.consumer_address,
            gas_limit: config.gas_limit.into(),
            confirmation_timeout: Duration::from_secs(
                config.confirmation_timeout_secs,
            ),
            chain_id: config.chain_id,
            explorer: config.explorer.clone(),
        })
    }
}

#[async_trait::async_trait]
impl DestinationChainClient for EvmBridgeClient {
    async fn relay(
        &self,
        payload: &RelayPayload,
    ) -> crate::Result<RelayReceipt> {
        let client = self.contract.client();
        let gas_price = client
            .get_gas_price()
            .map_err(|_| {
                crate::Error::Generic(
                    "Failed to fetch gas price from the destination chain",
                )
            })
            .await?;
        let call = self
            .contract
            .relay(
                self.consumer,
                Bytes::from(payload.as_bytes().to_vec()),
            )
            .gas(self.gas_limit)
            .gas_price(gas_price)
            .legacy();
        let pending = call.send().await?;
        let tx_hash = *pending;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::RelayTx,
            chain_id = %self.chain_id,
            pending = true,
            %tx_hash,
        );
        tracing::info!("Relay tx 0x{:x} is submitted and pending!", tx_hash);
        let receipt = tokio::time::timeout(
            self.confirmation_timeout,
            pending.interval(Duration::from_millis(1_000)),
        )
        .await
        .map_err(|_| {
            crate::Error::ReceiptTimeout(self.confirmation_timeout.as_secs())
        })??
        .ok_or(crate::Error::TxDropped(tx_hash))?;
        if receipt.status != Some(U64::one()) {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::RelayTx,
                chain_id = %self.chain_id,
                errored = true,
                reverted = true,
                tx_hash = %receipt.transaction_hash,
            );
            return Err(crate::Error::ReceiptFailed {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            });
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::RelayTx,
            chain_id = %self.chain_id,
            finalized = true,
            tx_hash = %receipt.transaction_hash,
        );
        tracing::info!(
            "Relay tx 0x{:x} finalized in block #{}",
            receipt.transaction_hash,
            receipt.block_number.unwrap_or_default()
        );
        if let Some(mut url) = self.explorer.clone() {
            url.set_path(&format!("tx/0x{:x}", receipt.transaction_hash));
            tracing::info!("Tx Explorer Link: {}", url);
        }
        Ok(RelayReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }
}
