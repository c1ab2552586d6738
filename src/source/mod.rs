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

//! The source-chain capability the relay pipeline is built against.
//!
//! All queries return `Ok(None)` for "the resource does not exist yet":
//! eventual consistency on the source chain makes absence an expected,
//! non-error outcome. Transport and protocol failures are real errors and
//! are consumed by the poll loop as retryable attempts.

use crate::config::OracleRequestConfig;
use crate::types::{
    RequestId, RequestStatus, SigningId, SigningResult, SourceTxResult,
    TxEvent,
};

mod band;
mod proto;

pub use band::BandLcdClient;

/// A thin capability over the oracle source chain.
#[async_trait::async_trait]
pub trait SourceChainClient: Send + Sync {
    /// Signs and broadcasts the oracle data request transaction.
    async fn submit_request_tx(
        &self,
        request: &OracleRequestConfig,
    ) -> crate::Result<SourceTxResult>;

    /// The events of a transaction, or `None` while it is not indexed yet.
    async fn tx_events(
        &self,
        tx_hash: &str,
    ) -> crate::Result<Option<Vec<TxEvent>>>;

    /// The signing status of a request, or `None` if the request record is
    /// not available yet.
    async fn request_status(
        &self,
        id: RequestId,
    ) -> crate::Result<Option<RequestStatus>>;

    /// The result of a threshold-signing session, or `None` if the session
    /// record is not available yet. A returned result may still carry an
    /// empty signature while the signer group is working.
    async fn signing_result(
        &self,
        id: SigningId,
    ) -> crate::Result<Option<SigningResult>>;
}
