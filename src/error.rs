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

use ethers::contract::ContractError;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::signers::{LocalWallet, WalletError};
use ethers::types::{H256, U64};

/// The middleware stack used for every destination-chain call.
pub type DestinationMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

/// An enum of all possible errors that could be encountered during the
/// execution of the BandTSS relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Error in the LCD Http client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Base64 decoding error for an LCD byte field.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ProviderError),
    /// Smart contract error.
    #[error(transparent)]
    EthersContractCall(#[from] ContractError<DestinationMiddleware>),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWallet(#[from] WalletError),
    /// Error while parsing the config file.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Cosmos SDK error (key derivation, tx signing, bech32, ...).
    #[error("Cosmos SDK error: {}", _0)]
    Cosmos(String),
    /// An LCD query returned an unexpected HTTP status.
    #[error("LCD query failed with status {}: {}", status, body)]
    Lcd {
        /// The HTTP status code of the response.
        status: u16,
        /// The response body, as text.
        body: String,
    },
    /// The retry budget of a poll was consumed without the resource
    /// becoming available.
    #[error("Failed to retrieve {} after {} attempts", label, attempts)]
    PollExhausted {
        /// Label of the polled resource.
        label: &'static str,
        /// Number of probe attempts that were made.
        attempts: usize,
    },
    /// The source chain rejected the request transaction at broadcast.
    #[error("Source transaction rejected (code {}): {}", code, raw_log)]
    SubmissionFailed {
        /// The ABCI code returned by CheckTx.
        code: u32,
        /// The raw log attached to the broadcast response.
        raw_log: String,
    },
    /// The relay transaction was mined but its status indicates failure.
    /// Distinct from a submission error: gas was spent on-chain.
    #[error("Relay tx {:?} reverted on-chain (block {:?})", tx_hash, block_number)]
    ReceiptFailed {
        /// Hash of the reverted transaction.
        tx_hash: H256,
        /// Block in which the transaction was mined, if known.
        block_number: Option<U64>,
    },
    /// The bounded wait for a destination-chain receipt elapsed.
    #[error("Timed out after {}s waiting for the relay tx receipt", _0)]
    ReceiptTimeout(u64),
    /// The relay transaction disappeared from the mempool before a
    /// receipt was produced.
    #[error("Relay tx {:?} dropped from the mempool", _0)]
    TxDropped(H256),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
}

impl Error {
    /// Wraps a foreign cosmos-side error that does not implement
    /// `std::error::Error` (eyre reports, tendermint errors, ...).
    pub(crate) fn cosmos(err: impl std::fmt::Display) -> Self {
        Self::Cosmos(err.to_string())
    }
}

/// A type alias for the result of the BandTSS relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
